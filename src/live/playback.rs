//! Jitter-buffered playback sequencing.
//!
//! Inbound frames arrive with arbitrary jitter. Each is scheduled at
//! `max(now, cursor)` and the cursor advances by the frame's duration, so frames
//! play back-to-back with no gap and no overlap while audio keeps arriving, and
//! playback restarts at `now` after the buffer ran dry.

use serde::Serialize;
use std::time::Duration;

/// Playback window of one frame on the sink clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledFrame {
    #[serde(serialize_with = "as_secs_f64")]
    pub start: Duration,
    #[serde(serialize_with = "as_secs_f64")]
    pub end: Duration,
}

fn as_secs_f64<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

impl ScheduledFrame {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaybackScheduler {
    cursor: Duration,
    scheduled: usize,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a frame of `duration` arriving at `now`.
    pub fn schedule(&mut self, now: Duration, duration: Duration) -> ScheduledFrame {
        let start = now.max(self.cursor);
        let end = start + duration;
        self.cursor = end;
        self.scheduled += 1;
        ScheduledFrame { start, end }
    }

    /// End of the last scheduled frame.
    pub fn cursor(&self) -> Duration {
        self.cursor
    }

    pub fn scheduled(&self) -> usize {
        self.scheduled
    }

    /// Time still buffered ahead of `now`.
    pub fn buffered(&self, now: Duration) -> Duration {
        self.cursor.saturating_sub(now)
    }

    /// Forget the cursor after playback was halted.
    pub fn reset(&mut self) {
        self.cursor = Duration::ZERO;
    }
}
