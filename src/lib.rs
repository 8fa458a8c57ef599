//! Soundweave - 长文本语音合成流水线
//!
//! 将任意长度的文本切分为有界块，按受控并发调用远程合成服务，
//! 按原始顺序装配结果，可选混入循环背景音轨，导出 WAV 与 Opus/OGG。
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - chunk / segmenter: 文本分段
//! - audio: PCM 样本缓冲及拼接 / 混音 / 重编码
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechSynthesizer, BackgroundTrack, CompressedExporter）
//! - Retry: 远程调用退避重试
//! - Dispatcher: 批次并发派发
//! - Controller: 会话状态机（校验 -> 分段 -> 派发 -> 装配 -> 混音 -> 导出）
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP/Fake 合成客户端、背景音轨来源、symphonia 解码
//! - Export: WAV 容器、Opus/OGG 压缩服务
//! - Worker: 后台压缩编码
//! - Events: 进度事件广播

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
