//! 批次派发器
//!
//! 将文本块按并发上限切成顺序批次：同批内的远程调用并发进行并整批落定，
//! 下一批才开始。这样任意时刻在途调用数不超过上限，且无需工作窃取队列。
//!
//! 不变量：输出序列的顺序恒等于输入块的顺序，与远程完成顺序无关。
//! 单块失败不影响同批其余块，只记录在该块的槽位上；
//! 会话级成败由调用方（控制器）裁决，派发器自身不抛单块错误。

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use super::ports::SynthesisError;
use super::retry::{execute_with_retry, RetryPolicy};
use crate::domain::{DecodedAudio, TextChunk};

/// 单块的落定结果
///
/// 由派发器在远程调用落定时产生，装配阶段消费一次，之后不再保留。
#[derive(Debug)]
pub struct ChunkResult {
    pub index: usize,
    pub outcome: Result<DecodedAudio, SynthesisError>,
}

/// 批次派发器
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    concurrency: usize,
    policy: RetryPolicy,
}

impl BatchDispatcher {
    pub fn new(concurrency: usize, policy: RetryPolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            policy,
        }
    }

    /// 派发全部文本块
    ///
    /// - `synthesize`: 单块的远程操作，内部逐块套用退避重试
    /// - `on_progress`: 每块落定（成功或失败）后回调一次
    /// - `on_retry_wait`: 某块进入退避等待时回调（块序号、延时、剩余次数、消息）
    ///
    /// 取消令牌在每个批次开始前检查：已在途的调用允许落定，
    /// 其结果由调用方丢弃；后续批次不再派发。
    pub async fn dispatch_all<F, Fut, P, W>(
        &self,
        chunks: &[TextChunk],
        cancel: &CancellationToken,
        synthesize: F,
        on_progress: P,
        on_retry_wait: W,
    ) -> Vec<ChunkResult>
    where
        F: Fn(&TextChunk) -> Fut,
        Fut: Future<Output = Result<DecodedAudio, SynthesisError>>,
        P: Fn(&TextChunk),
        W: Fn(usize, Duration, u32, &str),
    {
        let mut results: Vec<ChunkResult> = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.concurrency) {
            if cancel.is_cancelled() {
                tracing::info!(
                    dispatched = results.len(),
                    total = chunks.len(),
                    "cancellation requested, stopping batch dispatch"
                );
                break;
            }

            let settled = join_all(batch.iter().map(|chunk| {
                let synthesize = &synthesize;
                let on_progress = &on_progress;
                let on_retry_wait = &on_retry_wait;
                async move {
                    let outcome = execute_with_retry(
                        || synthesize(chunk),
                        &self.policy,
                        cancel,
                        |delay, remaining, message| {
                            on_retry_wait(chunk.index, delay, remaining, message)
                        },
                    )
                    .await;

                    if let Err(ref err) = outcome {
                        tracing::warn!(
                            chunk_index = chunk.index,
                            error = %err,
                            "chunk synthesis failed after retries"
                        );
                    }
                    on_progress(chunk);

                    ChunkResult {
                        index: chunk.index,
                        outcome,
                    }
                }
            }))
            .await;

            results.extend(settled);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ErrorKind;
    use crate::domain::segmenter::{segment, SegmentConfig};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn chunks(n: usize) -> Vec<TextChunk> {
        (0..n)
            .map(|i| TextChunk::new(i, format!("sentence number {}.", i)))
            .collect()
    }

    fn tone(index: usize) -> DecodedAudio {
        DecodedAudio::mono(24000, vec![index as f32 / 100.0; 10]).unwrap()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_input_order_despite_jitter() {
        let chunks = chunks(7);
        let dispatcher = BatchDispatcher::new(3, policy());
        let cancel = CancellationToken::new();

        let results = dispatcher
            .dispatch_all(
                &chunks,
                &cancel,
                |chunk| {
                    let index = chunk.index;
                    async move {
                        // 同批内完成顺序与序号相反
                        let jitter = 50 - (index % 3) * 15;
                        tokio::time::sleep(Duration::from_millis(jitter as u64)).await;
                        Ok(tone(index))
                    }
                },
                |_| {},
                |_, _, _, _| {},
            )
            .await;

        assert_eq!(results.len(), 7);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.index, i);
            let audio = result.outcome.as_ref().unwrap();
            assert_eq!(audio.channel(0)[0], i as f32 / 100.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_never_exceeds_concurrency_limit() {
        let chunks = chunks(9);
        let dispatcher = BatchDispatcher::new(3, policy());
        let cancel = CancellationToken::new();
        let in_flight = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);

        dispatcher
            .dispatch_all(
                &chunks,
                &cancel,
                |chunk| {
                    let index = chunk.index;
                    let in_flight = &in_flight;
                    let max_seen = &max_seen;
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5 + index as u64)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(tone(index))
                    }
                },
                |_| {},
                |_, _, _, _| {},
            )
            .await;

        assert_eq!(max_seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_isolated_to_its_slot() {
        let chunks = chunks(5);
        let dispatcher = BatchDispatcher::new(2, policy());
        let cancel = CancellationToken::new();

        let results = dispatcher
            .dispatch_all(
                &chunks,
                &cancel,
                |chunk| {
                    let index = chunk.index;
                    async move {
                        if index == 2 {
                            // Other 不重试，立即落定为失败
                            Err(SynthesisError::new(ErrorKind::Other, "broken"))
                        } else {
                            Ok(tone(index))
                        }
                    }
                },
                |_| {},
                |_, _, _, _| {},
            )
            .await;

        assert_eq!(results.len(), 5);
        for result in &results {
            if result.index == 2 {
                assert!(result.outcome.is_err());
            } else {
                assert!(result.outcome.is_ok());
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_inside_batch() {
        let chunks = chunks(4);
        let dispatcher = BatchDispatcher::new(4, policy());
        let cancel = CancellationToken::new();
        let attempts: Mutex<HashMap<usize, u32>> = Mutex::new(HashMap::new());

        let results = dispatcher
            .dispatch_all(
                &chunks,
                &cancel,
                |chunk| {
                    let index = chunk.index;
                    let attempt = {
                        let mut map = attempts.lock().unwrap();
                        let entry = map.entry(index).or_insert(0);
                        *entry += 1;
                        *entry
                    };
                    async move {
                        if index == 1 && attempt <= 2 {
                            Err(SynthesisError::new(ErrorKind::Overloaded, "overloaded"))
                        } else {
                            Ok(tone(index))
                        }
                    }
                },
                |_| {},
                |_, _, _, _| {},
            )
            .await;

        assert!(results.iter().all(|r| r.outcome.is_ok()));
        assert_eq!(attempts.lock().unwrap()[&1], 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_following_batches() {
        let chunks = chunks(9);
        let dispatcher = BatchDispatcher::new(3, policy());
        let cancel = CancellationToken::new();
        let started: Mutex<Vec<usize>> = Mutex::new(Vec::new());

        let results = dispatcher
            .dispatch_all(
                &chunks,
                &cancel,
                |chunk| {
                    let index = chunk.index;
                    started.lock().unwrap().push(index);
                    // 第一批落定时请求取消
                    let cancel = cancel.clone();
                    async move {
                        cancel.cancel();
                        Ok(tone(index))
                    }
                },
                |_| {},
                |_, _, _, _| {},
            )
            .await;

        // 批次 2、3 从未开始
        assert_eq!(results.len(), 3);
        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reports_every_settled_chunk() {
        let chunks = segment(
            "Alpha beta gamma. Delta epsilon. Zeta eta theta iota.",
            &SegmentConfig {
                max_chunk_chars: 20,
                ..Default::default()
            },
        );
        let total: usize = chunks.iter().map(|c| c.length).sum();
        let dispatcher = BatchDispatcher::new(2, policy());
        let cancel = CancellationToken::new();
        let chars_done = AtomicUsize::new(0);

        dispatcher
            .dispatch_all(
                &chunks,
                &cancel,
                |chunk| {
                    let index = chunk.index;
                    async move { Ok(tone(index)) }
                },
                |chunk| {
                    chars_done.fetch_add(chunk.length, Ordering::SeqCst);
                },
                |_, _, _, _| {},
            )
            .await;

        assert_eq!(chars_done.load(Ordering::SeqCst), total);
    }
}
