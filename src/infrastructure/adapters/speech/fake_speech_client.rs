//! Fake Speech Client - 用于测试与离线运行的合成客户端
//!
//! 不触网，按文本长度生成固定频率的正弦音。失败可脚本化注入，
//! 用来验证重试与会话级裁决路径。

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{
    ErrorKind, SpeechSynthesizerPort, SynthesisError, SynthesisRequest,
};
use crate::domain::DecodedAudio;

/// Fake 客户端配置
#[derive(Debug, Clone)]
pub struct FakeSpeechClientConfig {
    pub sample_rate: u32,
    /// 每个字符折算的音频时长（毫秒）
    pub ms_per_char: u64,
    /// 模拟的单次调用耗时
    pub call_delay: Duration,
}

impl Default for FakeSpeechClientConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            ms_per_char: 50,
            call_delay: Duration::from_millis(20),
        }
    }
}

/// 脚本化失败：命中子串的前 `times` 次调用返回指定分类的错误
#[derive(Debug, Clone)]
pub struct ScriptedFailure {
    pub text_contains: String,
    pub kind: ErrorKind,
    pub times: u32,
}

/// Fake 语音客户端
pub struct FakeSpeechClient {
    config: FakeSpeechClientConfig,
    failures: Mutex<Vec<ScriptedFailure>>,
}

impl FakeSpeechClient {
    pub fn new(config: FakeSpeechClientConfig) -> Self {
        Self {
            config,
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeSpeechClientConfig::default())
    }

    /// 注入脚本化失败
    pub fn fail_when(self, text_contains: impl Into<String>, kind: ErrorKind, times: u32) -> Self {
        self.failures.lock().unwrap().push(ScriptedFailure {
            text_contains: text_contains.into(),
            kind,
            times,
        });
        self
    }

    fn scripted_failure(&self, text: &str) -> Option<SynthesisError> {
        let mut failures = self.failures.lock().unwrap();
        for failure in failures.iter_mut() {
            if failure.times > 0 && text.contains(&failure.text_contains) {
                failure.times -= 1;
                return Some(SynthesisError::new(
                    failure.kind.clone(),
                    format!("scripted failure for '{}'", failure.text_contains),
                ));
            }
        }
        None
    }
}

#[async_trait]
impl SpeechSynthesizerPort for FakeSpeechClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<DecodedAudio, SynthesisError> {
        tokio::time::sleep(self.config.call_delay).await;

        if let Some(err) = self.scripted_failure(&request.text) {
            return Err(err);
        }

        let chars = request.text.chars().count() as u64;
        let frames = (chars * self.config.ms_per_char * self.config.sample_rate as u64 / 1000)
            .max(1) as usize;
        let step = 220.0 * std::f32::consts::TAU / self.config.sample_rate as f32;
        let samples: Vec<f32> = (0..frames).map(|i| (i as f32 * step).sin() * 0.1).collect();

        DecodedAudio::mono(self.config.sample_rate, samples)
            .map_err(|e| SynthesisError::new(ErrorKind::Other, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duration_scales_with_text_length() {
        let client = FakeSpeechClient::with_defaults();
        let short = client
            .synthesize(SynthesisRequest {
                text: "hi".to_string(),
                voice: "v".to_string(),
            })
            .await
            .unwrap();
        let long = client
            .synthesize(SynthesisRequest {
                text: "a much longer sentence".to_string(),
                voice: "v".to_string(),
            })
            .await
            .unwrap();
        assert!(long.frames() > short.frames());
    }

    #[tokio::test]
    async fn test_scripted_failure_consumed_then_recovers() {
        let client = FakeSpeechClient::with_defaults().fail_when("boom", ErrorKind::Overloaded, 1);
        let request = SynthesisRequest {
            text: "boom here".to_string(),
            voice: "v".to_string(),
        };

        assert!(client.synthesize(request.clone()).await.is_err());
        assert!(client.synthesize(request).await.is_ok());
    }
}
