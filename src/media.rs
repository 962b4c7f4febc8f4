//! Media encodings at the collaborator boundary.
//!
//! Images cross the boundary as self-describing data URIs, microphone audio as
//! base64 16-bit PCM frames, and downloadable speech as a RIFF/WAVE container.

pub mod data_uri;
pub mod pcm;
pub mod wav;

pub use data_uri::DataUri;
pub use pcm::PcmFormat;
pub use wav::{encode_wav, read_wav, read_wav_header, WavHeader};
