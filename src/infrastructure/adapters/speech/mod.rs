//! Speech Adapters - 语音合成端口实现

mod fake_speech_client;
mod http_speech_client;

pub use fake_speech_client::{FakeSpeechClient, FakeSpeechClientConfig, ScriptedFailure};
pub use http_speech_client::{HttpSpeechClient, HttpSpeechClientConfig};
