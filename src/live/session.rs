//! Session state machine: `Idle → Connecting → Live → Closing → Idle`, with a
//! direct path to `Idle` on any failure. Never reconnects.

use crate::error::SessionError;
use crate::live::framing::{FrameSlicer, UplinkEncoder};
use crate::live::playback::{PlaybackScheduler, ScheduledFrame};
use crate::live::transport::{ClientMessage, ServerEvent, SessionSetup};
use crate::media::{pcm, PcmFormat};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

/// Upper bound on waiting for the transport to close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Microphone-like audio source.
#[async_trait]
pub trait AudioCapture: Send {
    /// Acquire the device; returns its sample rate.
    async fn open(&mut self) -> Result<u32, SessionError>;

    /// Next block of mono samples in [-1.0, 1.0]. `None` once the source is
    /// exhausted. Must be cancel safe.
    async fn next_block(&mut self) -> Option<Vec<f32>>;

    /// Release the device.
    fn close(&mut self);
}

/// Speaker-like output that plays frames at scheduled times.
pub trait PlaybackSink: Send {
    /// Current time on the sink clock.
    fn now(&self) -> Duration;

    fn play(&mut self, frame: ScheduledFrame, samples: Vec<i16>) -> Result<(), SessionError>;

    /// Halt every scheduled source that has not finished yet.
    fn stop_all(&mut self);
}

/// Duplex message channel to the live collaborator.
#[async_trait]
pub trait LiveTransport: Send {
    async fn send(&mut self, message: &ClientMessage) -> Result<(), SessionError>;

    /// Next inbound event. A peer close is `Err(SessionError::ClosedByPeer)`.
    /// Must be cancel safe.
    async fn recv(&mut self) -> Result<ServerEvent, SessionError>;

    /// Close without waiting for the peer to acknowledge.
    async fn close(&mut self);
}

#[async_trait]
pub trait LiveConnector: Send + Sync {
    type Transport: LiveTransport;

    async fn connect(&self) -> Result<Self::Transport, SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Live,
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Live => "live",
            SessionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Why a session returned to Idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SessionEnd {
    /// Explicit user stop
    Stopped,
    /// Capture ran out and the peer finished its turn
    Completed,
    Failed(#[serde(serialize_with = "display")] SessionError),
}

fn display<S: serde::Serializer>(error: &SessionError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub transitions: Vec<SessionState>,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub interruptions: u64,
    pub turns: u64,
    pub discarded_samples: usize,
    pub playback: Vec<ScheduledFrame>,
    pub end: SessionEnd,
}

impl SessionReport {
    pub fn error(&self) -> Option<&SessionError> {
        match &self.end {
            SessionEnd::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Samples per uplink frame, at the capture rate
    pub frame_size: usize,
    pub input_format: PcmFormat,
    pub output_format: PcmFormat,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            frame_size: 4096,
            input_format: PcmFormat::INPUT_16K_MONO,
            output_format: PcmFormat::OUTPUT_24K_MONO,
        }
    }
}

/// Control side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    stop: Arc<Notify>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Request teardown. Takes effect even if the session has not started yet.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }
}

pub struct LiveSession<A, P, K> {
    capture: A,
    sink: P,
    connector: K,
    setup: SessionSetup,
    options: SessionOptions,
    stop: Arc<Notify>,
    state_tx: watch::Sender<SessionState>,
}

enum Step {
    Continue,
    End(SessionEnd),
}

struct Counters {
    transitions: Vec<SessionState>,
    frames_sent: u64,
    frames_received: u64,
    interruptions: u64,
    turns: u64,
    playback: Vec<ScheduledFrame>,
}

impl<A, P, K> LiveSession<A, P, K>
where
    A: AudioCapture,
    P: PlaybackSink,
    K: LiveConnector,
{
    pub fn new(
        capture: A,
        sink: P,
        connector: K,
        setup: SessionSetup,
        options: SessionOptions,
    ) -> (Self, SessionHandle) {
        let stop = Arc::new(Notify::new());
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let handle = SessionHandle {
            stop: Arc::clone(&stop),
            state: state_rx,
        };
        let session = Self {
            capture,
            sink,
            connector,
            setup,
            options,
            stop,
            state_tx,
        };
        (session, handle)
    }

    /// Drive the session until it returns to Idle. Hands the sink back so the
    /// caller can collect what was played.
    pub async fn run(self) -> (SessionReport, P) {
        let LiveSession {
            mut capture,
            mut sink,
            connector,
            setup,
            options,
            stop,
            state_tx,
        } = self;
        let started = Instant::now();
        let mut counters = Counters {
            transitions: Vec::new(),
            frames_sent: 0,
            frames_received: 0,
            interruptions: 0,
            turns: 0,
            playback: Vec::new(),
        };
        let enter = |state: SessionState, transitions: &mut Vec<SessionState>| {
            debug!(%state, "Session state");
            transitions.push(state);
            state_tx.send_replace(state);
        };

        enter(SessionState::Connecting, &mut counters.transitions);

        let capture_rate = match capture.open().await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(error = %e, "Capture unavailable");
                enter(SessionState::Idle, &mut counters.transitions);
                return (finish(counters, 0, SessionEnd::Failed(e)), sink);
            }
        };

        let connected = tokio::select! {
            biased;
            result = connector.connect() => Some(result),
            _ = stop.notified() => None,
        };
        let mut transport = match connected {
            Some(Ok(transport)) => transport,
            Some(Err(e)) => {
                warn!(error = %e, "Live connect failed");
                capture.close();
                enter(SessionState::Idle, &mut counters.transitions);
                return (finish(counters, 0, SessionEnd::Failed(e)), sink);
            }
            None => {
                capture.close();
                enter(SessionState::Idle, &mut counters.transitions);
                return (finish(counters, 0, SessionEnd::Stopped), sink);
            }
        };

        match send_or_stop(&mut transport, &stop, &ClientMessage::Setup(setup.clone())).await {
            Ok(()) => {}
            Err(SessionEnd::Failed(e)) => {
                warn!(error = %e, "Sending session setup failed");
                capture.close();
                close_transport(&mut transport).await;
                enter(SessionState::Idle, &mut counters.transitions);
                return (finish(counters, 0, SessionEnd::Failed(e)), sink);
            }
            Err(end) => {
                capture.close();
                enter(SessionState::Closing, &mut counters.transitions);
                close_transport(&mut transport).await;
                enter(SessionState::Idle, &mut counters.transitions);
                return (finish(counters, 0, end), sink);
            }
        }

        enter(SessionState::Live, &mut counters.transitions);
        info!(model = %setup.model, capture_rate, "Live session started");

        let mut slicer = FrameSlicer::new(options.frame_size);
        let encoder = UplinkEncoder::new(capture_rate, options.input_format);
        let mut scheduler = PlaybackScheduler::new();
        let mut capture_open = true;
        let mut discarded = 0usize;

        let end = loop {
            let step = tokio::select! {
                biased;
                _ = stop.notified() => Step::End(SessionEnd::Stopped),
                block = capture.next_block(), if capture_open => match block {
                    Some(samples) => {
                        let mut step = Step::Continue;
                        for frame in slicer.push(&samples) {
                            let chunk = encoder.encode(&frame);
                            let message = ClientMessage::Audio(chunk);
                            if let Err(end) = send_or_stop(&mut transport, &stop, &message).await {
                                step = Step::End(end);
                                break;
                            }
                            counters.frames_sent += 1;
                        }
                        step
                    }
                    None => {
                        capture_open = false;
                        let dropped = slicer.discard();
                        discarded += dropped;
                        debug!(dropped, "Capture exhausted");
                        match send_or_stop(&mut transport, &stop, &ClientMessage::AudioStreamEnd).await {
                            Ok(()) => Step::Continue,
                            Err(end) => Step::End(end),
                        }
                    }
                },
                event = transport.recv() => match event {
                    Ok(ServerEvent::Audio { data, .. }) => {
                        match play_audio(&data, options.output_format, &mut scheduler, &mut sink) {
                            Ok(frame) => {
                                counters.frames_received += 1;
                                counters.playback.push(frame);
                                Step::Continue
                            }
                            Err(e) => Step::End(SessionEnd::Failed(e)),
                        }
                    }
                    Ok(ServerEvent::Interrupted) => {
                        sink.stop_all();
                        scheduler.reset();
                        counters.interruptions += 1;
                        debug!("Playback interrupted by peer");
                        Step::Continue
                    }
                    Ok(ServerEvent::TurnComplete) => {
                        counters.turns += 1;
                        if capture_open {
                            Step::Continue
                        } else {
                            Step::End(SessionEnd::Completed)
                        }
                    }
                    Ok(ServerEvent::SetupComplete) => {
                        debug!("Session setup acknowledged");
                        Step::Continue
                    }
                    Ok(ServerEvent::GoAway { time_left }) => {
                        warn!(?time_left, "Peer announced disconnect");
                        Step::Continue
                    }
                    Err(e) => Step::End(SessionEnd::Failed(e)),
                },
            };
            if let Step::End(end) = step {
                break end;
            }
        };

        if end == SessionEnd::Completed {
            // Let the answer finish playing unless the user stops first
            let remaining = scheduler.buffered(sink.now());
            tokio::select! {
                _ = stop.notified() => {}
                _ = tokio::time::sleep(remaining) => {}
            }
        }

        capture.close();
        sink.stop_all();
        discarded += slicer.discard();
        match &end {
            SessionEnd::Failed(e) => {
                warn!(error = %e, "Live session failed");
                close_transport(&mut transport).await;
                enter(SessionState::Idle, &mut counters.transitions);
            }
            SessionEnd::Stopped | SessionEnd::Completed => {
                enter(SessionState::Closing, &mut counters.transitions);
                close_transport(&mut transport).await;
                enter(SessionState::Idle, &mut counters.transitions);
            }
        }
        info!(
            frames_sent = counters.frames_sent,
            frames_received = counters.frames_received,
            duration_ms = started.elapsed().as_millis() as u64,
            "Live session ended"
        );
        (finish(counters, discarded, end), sink)
    }
}

/// Send one message unless a stop request arrives first. A stalled write never
/// holds off teardown.
async fn send_or_stop<T: LiveTransport>(
    transport: &mut T,
    stop: &Notify,
    message: &ClientMessage,
) -> Result<(), SessionEnd> {
    tokio::select! {
        biased;
        _ = stop.notified() => Err(SessionEnd::Stopped),
        result = transport.send(message) => result.map_err(SessionEnd::Failed),
    }
}

async fn close_transport<T: LiveTransport>(transport: &mut T) {
    if tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await.is_err() {
        warn!(
            timeout_ms = CLOSE_TIMEOUT.as_millis() as u64,
            "Live transport did not close in time"
        );
    }
}

fn play_audio<P: PlaybackSink>(
    data: &str,
    format: PcmFormat,
    scheduler: &mut PlaybackScheduler,
    sink: &mut P,
) -> Result<ScheduledFrame, SessionError> {
    let bytes = pcm::decode_base64(data).map_err(|e| SessionError::Playback(e.to_string()))?;
    let samples = pcm::from_le_bytes(&bytes).map_err(|e| SessionError::Playback(e.to_string()))?;
    let frame = scheduler.schedule(sink.now(), format.duration_of(bytes.len()));
    sink.play(frame, samples)?;
    Ok(frame)
}

fn finish(counters: Counters, discarded_samples: usize, end: SessionEnd) -> SessionReport {
    SessionReport {
        transitions: counters.transitions,
        frames_sent: counters.frames_sent,
        frames_received: counters.frames_received,
        interruptions: counters.interruptions,
        turns: counters.turns,
        discarded_samples,
        playback: counters.playback,
        end,
    }
}
