//! Background Track Port - 背景音轨抽象
//!
//! 按名称获取背景音轨并解码为 PCM 缓冲

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::DecodedAudio;

/// 音轨获取错误
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("unknown track: {0}")]
    UnknownTrack(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Background Track Port
///
/// 背景音轨来源的抽象接口。实现方负责把音轨交付为与语音管线
/// 兼容的格式（采样率 / 声道数），混音运算本身不做任何转换。
#[async_trait]
pub trait BackgroundTrackPort: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<DecodedAudio, TrackError>;
}
