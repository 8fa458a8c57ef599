//! Export - 音频容器导出
//!
//! - wav: 标准未压缩 PCM 容器（同步，逐位确定）
//! - ogg: Opus/OGG 压缩容器（经由后台 worker）

mod ogg;
mod wav;

pub use ogg::CompressionService;
pub use wav::export_wav;
