//! 会话级错误定义
//!
//! 远程调用级的失败先由重试层分类处理，未消化的以单块失败形式
//! 汇聚到派发结果里，最终由控制器裁决为这里的会话级结局。

use thiserror::Error;

use crate::application::ports::TrackError;
use crate::domain::AudioError;

/// 会话级生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 输入校验失败（空输入 / 超长），不重试，立即上抛
    #[error("validation failed: {0}")]
    Validation(String),

    /// 分段没有产出任何内容
    #[error("segmentation produced no content")]
    NoContent,

    /// 一个或多个块耗尽重试仍失败；整个会话失败，绝不拼装部分音频
    #[error("{failed} of {total} chunks failed after retries: {first_message}")]
    PartialGeneration {
        failed: usize,
        total: usize,
        first_message: String,
    },

    /// 服务端要求冷却；调用方应执行会话级冷却后再重试
    #[error("rate limited by speech service, cooldown of {cooldown_ms} ms required")]
    RateLimited { cooldown_ms: u64 },

    /// 凭证被拒，对会话致命
    #[error("speech service rejected credentials")]
    Unauthenticated,

    /// 用户主动取消：终态但非错误
    #[error("generation cancelled")]
    Cancelled,

    /// 样本域契约违反（格式不一致等），视同断言失败
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// 背景音轨获取/解码失败
    #[error("background track unavailable: {0}")]
    Track(#[from] TrackError),
}

impl GenerationError {
    /// 是否用户主动取消（终态非错误，调用方通常不当作失败上报）
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled)
    }
}
