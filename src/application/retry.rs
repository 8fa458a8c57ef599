//! 单次远程调用的有界指数退避重试
//!
//! 重试与否完全由 [`ErrorKind`] 的分类结果决定：
//! - `Unauthenticated` / `Other` 不重试，立即上抛
//! - 携带服务端冷却时长的 `RateLimited` 不在此处重试，立即上抛，
//!   由会话层执行更长的冷却
//! - 其余可重试分类按 `initial_delay` 起步、每次翻倍退避，
//!   最多 `max_retries` 次
//!
//! 每次等待前通过 `on_wait` 回调上报进度，这是重试进度的唯一侧信道。

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::ports::SynthesisError;

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    /// 首次退避时长，之后每次翻倍
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

/// 以退避重试执行一次远程操作
///
/// 退避等待期间响应取消令牌：取消时立刻以 `Cancelled` 分类返回，
/// 不再等完剩余延时。耗尽重试后返回最后一次的分类错误。
pub async fn execute_with_retry<T, F, Fut, W>(
    mut operation: F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    on_wait: W,
) -> Result<T, SynthesisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SynthesisError>>,
    W: Fn(Duration, u32, &str),
{
    let mut delay = policy.initial_delay;
    let mut retries_left = policy.max_retries;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.kind.is_retryable() || retries_left == 0 {
            return Err(err);
        }
        retries_left -= 1;

        on_wait(delay, retries_left, &err.message);
        tokio::select! {
            _ = cancel.cancelled() => return Err(SynthesisError::cancelled()),
            _ = tokio::time::sleep(delay) => {}
        }
        delay *= 2;
    }
}
