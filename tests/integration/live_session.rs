//! Integration tests for a headless live session: WAV file in, scripted peer,
//! WAV timeline out.

use async_trait::async_trait;
use parking_lot::Mutex;
use shotlist::live::{
    ClientMessage, LiveConnector, LiveSession, LiveTransport, ServerEvent, SessionEnd,
    SessionOptions, SessionSetup, SessionState, WavFileCapture, WavFileSink,
};
use shotlist::media::{encode_wav, pcm, read_wav_header, DataUri, PcmFormat};
use shotlist::SessionError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

const OUTPUT: PcmFormat = PcmFormat::OUTPUT_24K_MONO;

/// Half a second of reply audio at the output rate.
fn reply_chunk() -> ServerEvent {
    let samples = vec![1000i16; OUTPUT.sample_rate as usize / 2];
    ServerEvent::Audio {
        mime_type: OUTPUT.mime_type(),
        data: DataUri::from_bytes("audio/pcm", &pcm::to_le_bytes(&samples))
            .data()
            .to_string(),
    }
}

/// Peer that answers once the client ends its audio stream.
struct ScriptedPeer {
    reply: Vec<ServerEvent>,
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    connects: Arc<Mutex<usize>>,
}

struct ScriptedTransport {
    reply: Vec<ServerEvent>,
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    outbox: mpsc::UnboundedSender<ServerEvent>,
    inbox: mpsc::UnboundedReceiver<ServerEvent>,
}

#[async_trait]
impl LiveTransport for ScriptedTransport {
    async fn send(&mut self, message: &ClientMessage) -> Result<(), SessionError> {
        self.sent.lock().push(message.clone());
        match message {
            ClientMessage::Setup(_) => {
                let _ = self.outbox.send(ServerEvent::SetupComplete);
            }
            ClientMessage::AudioStreamEnd => {
                for event in self.reply.drain(..) {
                    let _ = self.outbox.send(event);
                }
            }
            ClientMessage::Audio(_) => {}
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<ServerEvent, SessionError> {
        self.inbox
            .recv()
            .await
            .ok_or_else(|| SessionError::ClosedByPeer("script ended".to_string()))
    }

    async fn close(&mut self) {}
}

#[async_trait]
impl LiveConnector for ScriptedPeer {
    type Transport = ScriptedTransport;

    async fn connect(&self) -> Result<ScriptedTransport, SessionError> {
        *self.connects.lock() += 1;
        let (outbox, inbox) = mpsc::unbounded_channel();
        Ok(ScriptedTransport {
            reply: self.reply.clone(),
            sent: Arc::clone(&self.sent),
            outbox,
            inbox,
        })
    }
}

fn peer(reply: Vec<ServerEvent>) -> ScriptedPeer {
    ScriptedPeer {
        reply,
        sent: Arc::new(Mutex::new(Vec::new())),
        connects: Arc::new(Mutex::new(0)),
    }
}

fn write_input(dir: &Path, samples: usize) -> std::path::PathBuf {
    let tone: Vec<i16> = (0..samples).map(|i| ((i % 64) as i16 - 32) * 256).collect();
    let bytes = encode_wav(&pcm::to_le_bytes(&tone), PcmFormat::INPUT_16K_MONO).unwrap();
    let path = dir.join("question.wav");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn setup() -> SessionSetup {
    SessionSetup {
        model: "live-model".to_string(),
        voice: "Zephyr".to_string(),
        system_instruction: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_file_session_streams_question_and_records_reply() {
    let temp = TempDir::new().unwrap();
    let input = write_input(temp.path(), 10_000);
    let peer = peer(vec![reply_chunk(), reply_chunk(), reply_chunk(), ServerEvent::TurnComplete]);
    let sent = Arc::clone(&peer.sent);

    let (session, handle) = LiveSession::new(
        WavFileCapture::new(&input, 1024).unpaced(),
        WavFileSink::new(OUTPUT),
        peer,
        setup(),
        SessionOptions::default(),
    );
    let (report, sink) = session.run().await;

    assert_eq!(report.end, SessionEnd::Completed);
    assert_eq!(
        report.transitions,
        vec![
            SessionState::Connecting,
            SessionState::Live,
            SessionState::Closing,
            SessionState::Idle
        ]
    );
    assert_eq!(handle.state(), SessionState::Idle);
    assert_eq!(report.frames_sent, 2);
    assert_eq!(report.discarded_samples, 10_000 - 2 * 4096);
    assert_eq!(report.frames_received, 3);
    assert_eq!(report.turns, 1);

    let starts: Vec<Duration> = report.playback.iter().map(|f| f.start).collect();
    assert_eq!(
        starts,
        vec![Duration::ZERO, Duration::from_millis(500), Duration::from_millis(1000)]
    );

    let sent = sent.lock();
    assert!(matches!(sent.first(), Some(ClientMessage::Setup(_))));
    assert!(matches!(sent.last(), Some(ClientMessage::AudioStreamEnd)));
    match &sent[1] {
        ClientMessage::Audio(chunk) => assert_eq!(chunk.mime_type, "audio/pcm;rate=16000"),
        other => panic!("expected audio chunk, got {:?}", other),
    }

    assert_eq!(sink.halted(), 0);
    assert_eq!(sink.duration(), Duration::from_millis(1500));
    let header = read_wav_header(&sink.to_wav().unwrap()).unwrap();
    assert_eq!(header.sample_rate, 24_000);
    assert_eq!(header.frames, 36_000);
}

#[tokio::test(start_paused = true)]
async fn test_interruption_discards_queued_reply() {
    let temp = TempDir::new().unwrap();
    let input = write_input(temp.path(), 4096);
    let peer = peer(vec![
        reply_chunk(),
        reply_chunk(),
        ServerEvent::Interrupted,
        reply_chunk(),
        ServerEvent::TurnComplete,
    ]);

    let (session, _handle) = LiveSession::new(
        WavFileCapture::new(&input, 4096).unpaced(),
        WavFileSink::new(OUTPUT),
        peer,
        setup(),
        SessionOptions::default(),
    );
    let (report, sink) = session.run().await;

    assert_eq!(report.end, SessionEnd::Completed);
    assert_eq!(report.interruptions, 1);
    assert_eq!(report.frames_received, 3);
    assert_eq!(report.playback[2].start, Duration::ZERO);
    assert_eq!(sink.halted(), 1);
    assert_eq!(sink.duration(), Duration::from_millis(500));
}

#[tokio::test]
async fn test_missing_input_file_fails_without_connecting() {
    let temp = TempDir::new().unwrap();
    let peer = peer(vec![ServerEvent::TurnComplete]);
    let connects = Arc::clone(&peer.connects);

    let (session, _handle) = LiveSession::new(
        WavFileCapture::new(temp.path().join("missing.wav"), 1024),
        WavFileSink::new(OUTPUT),
        peer,
        setup(),
        SessionOptions::default(),
    );
    let (report, sink) = session.run().await;

    assert!(matches!(
        report.error(),
        Some(SessionError::CaptureUnavailable(_))
    ));
    assert_eq!(
        report.transitions,
        vec![SessionState::Connecting, SessionState::Idle]
    );
    assert_eq!(*connects.lock(), 0);
    assert!(sink.frames().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_user_stop_ends_paced_session() {
    let temp = TempDir::new().unwrap();
    // Ten seconds of audio, paced at real time
    let input = write_input(temp.path(), 160_000);
    let peer = peer(Vec::new());
    let sent = Arc::clone(&peer.sent);

    let (session, handle) = LiveSession::new(
        WavFileCapture::new(&input, 1600),
        WavFileSink::new(OUTPUT),
        peer,
        setup(),
        SessionOptions::default(),
    );
    let task = tokio::spawn(session.run());
    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.stop();
    let (report, _sink) = task.await.unwrap();

    assert_eq!(report.end, SessionEnd::Stopped);
    assert_eq!(report.transitions.last(), Some(&SessionState::Idle));
    assert!(report.frames_sent > 0);
    assert!(report.frames_sent < 160_000 / 4096);
    assert!(!sent
        .lock()
        .iter()
        .any(|m| matches!(m, ClientMessage::AudioStreamEnd)));
}
