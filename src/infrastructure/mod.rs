//! Infrastructure Layer
//!
//! - adapters: 语音合成客户端、背景音轨来源、通用音频解码
//! - export: WAV / OGG 容器导出
//! - worker: 后台压缩编码
//! - events: 进度事件广播

pub mod adapters;
pub mod events;
pub mod export;
pub mod worker;
