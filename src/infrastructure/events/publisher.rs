//! Progress Publisher - 进度事件广播
//!
//! 控制器在状态转移与块落定时发布观测事件，UI 层订阅后自行渲染
//! （显示层的百分比平滑不在此处，事件只携带真实目标值）。

use serde::Serialize;
use tokio::sync::broadcast;

/// 生成进度事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum GenerationEvent {
    /// 状态机转移
    StateChanged {
        state: String,
        /// 面向用户的状态描述
        label: String,
        elapsed_ms: u64,
    },
    /// 字符进度（按块的字符数累计，块大小不均时比块计数更准）
    Progress {
        chars_processed: usize,
        total_chars: usize,
        elapsed_ms: u64,
    },
    /// 某块进入重试退避等待
    RetryWait {
        chunk_index: usize,
        delay_ms: u64,
        retries_remaining: u32,
        message: String,
    },
    /// 会话成功收尾
    Completed {
        audio_duration_ms: u64,
        elapsed_ms: u64,
        wav_bytes: usize,
        compressed_bytes: Option<usize>,
    },
    /// 会话以失败或取消收尾
    Failed { error: String, elapsed_ms: u64 },
}

/// 进度事件发布器
pub struct ProgressPublisher {
    channel: broadcast::Sender<GenerationEvent>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { channel: tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.channel.subscribe()
    }

    pub fn publish(&self, event: GenerationEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::debug!(error = %e, "failed to publish event (no receivers)");
        }
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_events() {
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe();

        publisher.publish(GenerationEvent::Progress {
            chars_processed: 10,
            total_chars: 100,
            elapsed_ms: 5,
        });

        match rx.recv().await.unwrap() {
            GenerationEvent::Progress {
                chars_processed, ..
            } => assert_eq!(chars_processed, 10),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let publisher = ProgressPublisher::new();
        publisher.publish(GenerationEvent::Failed {
            error: "x".to_string(),
            elapsed_ms: 1,
        });
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let json = serde_json::to_string(&GenerationEvent::StateChanged {
            state: "dispatching".to_string(),
            label: "Generating speech".to_string(),
            elapsed_ms: 12,
        })
        .unwrap();
        assert!(json.contains("\"event\":\"StateChanged\""));
    }
}
