//! HTTP Speech Client - 调用远程语音合成服务
//!
//! 实现 SpeechSynthesizerPort trait，通过 HTTP 调用远程合成服务
//!
//! 远程 API:
//! POST {base_url}/api/speech/synthesize
//! Request: {"text": "...", "voice": "..."}  (JSON)
//! Response: {"encodedAudio": "<base64 PCM16LE>", "sampleRate": 24000, "channelCount": 1}
//!
//! 失败统一交给 [`ErrorKind::classify`] 归类，本文件不自带重试逻辑。

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{
    ErrorKind, SpeechSynthesizerPort, SynthesisError, SynthesisRequest,
};
use crate::domain::DecodedAudio;

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SpeechHttpRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

/// 合成响应体 (JSON)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechHttpResponse {
    /// base64 编码的 PCM16LE 样本
    encoded_audio: String,
    sample_rate: u32,
    channel_count: u16,
}

/// HTTP 语音客户端配置
#[derive(Debug, Clone)]
pub struct HttpSpeechClientConfig {
    /// 合成服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpSpeechClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
        }
    }
}

impl HttpSpeechClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP 语音客户端
pub struct HttpSpeechClient {
    client: Client,
    config: HttpSpeechClientConfig,
}

impl HttpSpeechClient {
    pub fn new(config: HttpSpeechClientConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SynthesisError::new(ErrorKind::Other, e.to_string()))?;

        Ok(Self { client, config })
    }

    fn synthesize_url(&self) -> String {
        format!("{}/api/speech/synthesize", self.config.base_url)
    }
}

#[async_trait]
impl SpeechSynthesizerPort for HttpSpeechClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<DecodedAudio, SynthesisError> {
        let body = SpeechHttpRequest {
            text: &request.text,
            voice: &request.voice,
        };

        tracing::debug!(
            url = %self.synthesize_url(),
            text_len = request.text.len(),
            voice = %request.voice,
            "sending synthesis request"
        );

        let response = self
            .client
            .post(self.synthesize_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::new(ErrorKind::Overloaded, "request timeout")
                } else {
                    SynthesisError::new(
                        ErrorKind::classify(None, None, &e.to_string()),
                        e.to_string(),
                    )
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            let kind = ErrorKind::classify(Some(status.as_u16()), retry_after, &text);
            return Err(SynthesisError::new(
                kind,
                format!("HTTP {}: {}", status, text),
            ));
        }

        let payload: SpeechHttpResponse = response.json().await.map_err(|e| {
            SynthesisError::new(ErrorKind::Other, format!("invalid response body: {}", e))
        })?;

        // 空负载与传输失败是两类错误
        if payload.encoded_audio.is_empty() {
            return Err(SynthesisError::empty_result());
        }
        if payload.channel_count != 1 {
            return Err(SynthesisError::new(
                ErrorKind::Other,
                format!(
                    "pipeline expects mono payloads, got {} channels",
                    payload.channel_count
                ),
            ));
        }

        let pcm_bytes = BASE64.decode(&payload.encoded_audio).map_err(|e| {
            SynthesisError::new(ErrorKind::Other, format!("invalid base64 payload: {}", e))
        })?;
        if pcm_bytes.is_empty() {
            return Err(SynthesisError::empty_result());
        }

        let samples: Vec<f32> = pcm_bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect();

        tracing::debug!(
            sample_rate = payload.sample_rate,
            frames = samples.len(),
            "synthesis payload decoded"
        );

        DecodedAudio::mono(payload.sample_rate, samples)
            .map_err(|e| SynthesisError::new(ErrorKind::Other, e.to_string()))
    }
}
