//! Compressed Exporter Port - 压缩容器导出抽象
//!
//! 压缩编码在独立的 worker 中进行，本端口是调用方看到的接口

use async_trait::async_trait;
use thiserror::Error;

/// 导出错误
///
/// `CompressionUnavailable` 只影响压缩产物，不影响已生成的未压缩 WAV。
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    #[error("compression backend unavailable")]
    CompressionUnavailable,

    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// Compressed Exporter Port
///
/// 将 i16 样本序列编码为压缩音频容器。样本所有权移交给实现方
/// （大缓冲不复制）。无可用编码器时必须以错误收场，绝不产出损坏文件。
#[async_trait]
pub trait CompressedExporterPort: Send + Sync {
    async fn export(
        &self,
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u8,
        bitrate: u32,
    ) -> Result<Vec<u8>, ExportError>;
}
