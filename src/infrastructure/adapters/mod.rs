//! Adapters - 外部服务适配器

pub mod decoder;
pub mod speech;
pub mod track;

pub use decoder::{decode_to_pcm, DecodeError};
pub use speech::{FakeSpeechClient, FakeSpeechClientConfig, HttpSpeechClient, HttpSpeechClientConfig};
pub use track::{HttpTrackSource, HttpTrackSourceConfig};
