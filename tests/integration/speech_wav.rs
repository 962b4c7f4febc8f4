//! Integration tests for speech generation and WAV packaging

use crate::integration::test_utils::ScriptedClient;
use shotlist::media::{pcm, read_wav, PcmFormat};
use shotlist::provider::{Modality, Part};
use shotlist::speech::{generate_speech, SpeechRequest};
use shotlist::StudioError;
use std::time::Duration;

#[tokio::test]
async fn test_speech_clip_is_packaged_as_wav() {
    let samples: Vec<i16> = (0..12_000).map(|i| (i % 200) as i16 * 100 - 10_000).collect();
    let client = ScriptedClient::new().with_audio(pcm::to_le_bytes(&samples));
    let mut request = SpeechRequest::new("Koleksi linen terbaru kami");
    request.voice = "Kore".to_string();
    request.instruction = Some("Say warmly".to_string());

    let clip = generate_speech(&client, "speech-model", &request, PcmFormat::OUTPUT_24K_MONO)
        .await
        .unwrap();

    assert_eq!(clip.duration(), Duration::from_millis(500));
    let (header, decoded) = read_wav(&clip.to_wav().unwrap()).unwrap();
    assert_eq!(header.sample_rate, 24_000);
    assert_eq!(header.channels, 1);
    assert_eq!(header.bits_per_sample, 16);
    assert_eq!(decoded, samples);

    let sent = &client.requests()[0];
    assert_eq!(sent.model, "speech-model");
    assert_eq!(sent.settings.voice.as_deref(), Some("Kore"));
    assert_eq!(sent.settings.response_modalities, vec![Modality::Audio]);
    assert_eq!(
        sent.parts,
        vec![Part::text("Say warmly: Koleksi linen terbaru kami")]
    );
}

#[tokio::test]
async fn test_blank_text_is_rejected_before_request() {
    let client = ScriptedClient::new().with_audio(vec![0, 0]);

    let err = generate_speech(
        &client,
        "speech-model",
        &SpeechRequest::new("   "),
        PcmFormat::OUTPUT_24K_MONO,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StudioError::Preflight(_)));
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn test_odd_length_audio_is_rejected() {
    let client = ScriptedClient::new().with_audio(vec![1, 2, 3]);

    let result = generate_speech(
        &client,
        "speech-model",
        &SpeechRequest::new("Halo"),
        PcmFormat::OUTPUT_24K_MONO,
    )
    .await;

    assert!(result.is_err());
}
