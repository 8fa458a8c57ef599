//! Application Layer - 用例编排
//!
//! - ports: 出站端口定义（语音合成 / 背景音轨 / 压缩导出）
//! - retry: 单次远程调用的退避重试
//! - dispatcher: 批次并发派发
//! - controller: 会话状态机与裁决
//! - error: 会话级错误

pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod ports;
pub mod retry;

pub use controller::{
    BackgroundMix, ControllerConfig, GeneratedAudio, GenerationController, GenerationRequest,
    GenerationState,
};
pub use dispatcher::{BatchDispatcher, ChunkResult};
pub use error::GenerationError;
pub use retry::RetryPolicy;
