//! HTTP Track Source - 按名称下载背景音轨
//!
//! 实现 BackgroundTrackPort trait。音轨名到 URL 的映射来自配置，
//! 下载后用 symphonia 解码，再统一转换为语音管线的格式
//! （单声道 + 目标采样率），混音端因此拿到的永远是兼容缓冲。

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use crate::application::ports::{BackgroundTrackPort, TrackError};
use crate::domain::{AudioError, DecodedAudio};
use crate::infrastructure::adapters::decoder::decode_to_pcm;

/// HTTP 音轨源配置
#[derive(Debug, Clone)]
pub struct HttpTrackSourceConfig {
    /// 音轨名 -> 下载 URL
    pub tracks: HashMap<String, String>,
    /// 语音管线的目标采样率
    pub target_sample_rate: u32,
    /// 下载超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpTrackSourceConfig {
    fn default() -> Self {
        Self {
            tracks: HashMap::new(),
            target_sample_rate: 24000,
            timeout_secs: 60,
        }
    }
}

/// HTTP 音轨源
pub struct HttpTrackSource {
    client: Client,
    config: HttpTrackSourceConfig,
}

impl HttpTrackSource {
    pub fn new(config: HttpTrackSourceConfig) -> Result<Self, TrackError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TrackError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl BackgroundTrackPort for HttpTrackSource {
    async fn fetch(&self, name: &str) -> Result<DecodedAudio, TrackError> {
        let url = self
            .config
            .tracks
            .get(name)
            .ok_or_else(|| TrackError::UnknownTrack(name.to_string()))?;

        tracing::info!(track = %name, url = %url, "fetching background track");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TrackError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TrackError::Network(format!(
                "HTTP {} fetching track '{}'",
                response.status(),
                name
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TrackError::Network(e.to_string()))?;

        let decoded = decode_to_pcm(bytes.to_vec()).map_err(|e| TrackError::Decode(e.to_string()))?;

        let mono = downmix_to_mono(&decoded).map_err(|e| TrackError::Decode(e.to_string()))?;
        let converted = resample_mono(&mono, self.config.target_sample_rate)
            .map_err(|e| TrackError::Decode(e.to_string()))?;

        tracing::info!(
            track = %name,
            duration_ms = converted.duration_ms(),
            sample_rate = converted.sample_rate(),
            "background track ready"
        );

        Ok(converted)
    }
}

/// 多声道按均值折叠为单声道
fn downmix_to_mono(buffer: &DecodedAudio) -> Result<DecodedAudio, AudioError> {
    if buffer.channel_count() == 1 {
        return Ok(buffer.clone());
    }

    let channel_count = buffer.channel_count() as f32;
    let samples: Vec<f32> = (0..buffer.frames())
        .map(|i| {
            let sum: f32 = (0..buffer.channel_count())
                .map(|ch| buffer.channel(ch)[i])
                .sum();
            sum / channel_count
        })
        .collect();

    DecodedAudio::mono(buffer.sample_rate(), samples)
}

/// 线性插值重采样（单声道）
///
/// 背景音乐不要求高保真，线性插值足够。
fn resample_mono(buffer: &DecodedAudio, target_rate: u32) -> Result<DecodedAudio, AudioError> {
    if buffer.sample_rate() == target_rate {
        return Ok(buffer.clone());
    }

    let source = buffer.channel(0);
    let ratio = buffer.sample_rate() as f64 / target_rate as f64;
    let out_frames = ((source.len() as f64) / ratio).floor() as usize;

    let mut out = Vec::with_capacity(out_frames);
    for i in 0..out_frames {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;

        let a = source[idx];
        let b = if idx + 1 < source.len() {
            source[idx + 1]
        } else {
            a
        };
        out.push(a + (b - a) * frac);
    }

    DecodedAudio::mono(target_rate, out)
}
