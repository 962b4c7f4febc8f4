//! Realtime Audio Session
//!
//! A bidirectional voice session with the live collaborator. Captured audio is
//! sliced into fixed frames, quantized to 16-bit PCM and streamed upstream while
//! inbound audio is scheduled back-to-back on the playback sink.
//!
//! The session is a single task owning every resource: capture, transport and
//! sink are injected, driven from one `select!` loop, and torn down together.

pub mod file_io;
pub mod framing;
pub mod playback;
pub mod session;
pub mod transport;

pub use file_io::{WavFileCapture, WavFileSink};
pub use framing::{FrameSlicer, UplinkChunk, UplinkEncoder};
pub use playback::{PlaybackScheduler, ScheduledFrame};
pub use session::{
    AudioCapture, LiveConnector, LiveSession, LiveTransport, PlaybackSink, SessionEnd,
    SessionHandle, SessionOptions, SessionReport, SessionState,
};
pub use transport::{ClientMessage, GeminiLiveConnector, GeminiLiveTransport, ServerEvent, SessionSetup};
