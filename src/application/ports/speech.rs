//! Speech Synthesizer Port - 远程语音合成抽象
//!
//! 定义语音合成的抽象接口与远程失败的封闭分类。
//! 分类器是重试策略的唯一事实来源：所有适配器都必须经由
//! [`ErrorKind::classify`] 归类失败，调用点不做零散的字符串判断。

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::domain::DecodedAudio;

/// 远程失败分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// 配额受限；`retry_after` 为服务端指定的冷却时长
    ///
    /// 带冷却时长时不做内部重试，立即上抛，由会话层执行更长的冷却。
    RateLimited { retry_after: Option<Duration> },
    /// 服务端瞬时过载，可重试
    Overloaded,
    /// 传输成功但负载为空，可有限次重试
    EmptyResult,
    /// 凭证被拒，不重试，对会话致命
    Unauthenticated,
    /// 重试等待期间被协作取消
    Cancelled,
    /// 未归类失败，不重试
    Other,
}

impl ErrorKind {
    /// 是否允许内部退避重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited { retry_after: None }
                | ErrorKind::Overloaded
                | ErrorKind::EmptyResult
        )
    }

    /// 根据状态码 / Retry-After / 消息子串归类远程失败
    pub fn classify(status: Option<u16>, retry_after: Option<Duration>, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();

        if let Some(code) = status {
            match code {
                401 | 403 => return ErrorKind::Unauthenticated,
                429 => return ErrorKind::RateLimited { retry_after },
                503 => return ErrorKind::Overloaded,
                _ => {}
            }
        }

        if lower.contains("resource_exhausted") || lower.contains("quota") {
            return ErrorKind::RateLimited { retry_after };
        }
        if lower.contains("overload") || lower.contains("unavailable") {
            return ErrorKind::Overloaded;
        }
        if lower.contains("unauthenticated") || lower.contains("api key") {
            return ErrorKind::Unauthenticated;
        }

        ErrorKind::Other
    }
}

/// 语音合成错误：分类 + 可读消息
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SynthesisError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SynthesisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn empty_result() -> Self {
        Self::new(
            ErrorKind::EmptyResult,
            "speech service returned no audio payload",
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled while waiting to retry")
    }
}

/// 语音合成请求
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    /// 要合成的文本
    pub text: String,
    /// 音色标识
    pub voice: String,
}

/// Speech Synthesizer Port
///
/// 外部语音合成服务的抽象接口，返回解码后的 PCM 缓冲
#[async_trait]
pub trait SpeechSynthesizerPort: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<DecodedAudio, SynthesisError>;
}
