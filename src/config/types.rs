//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::application::{ControllerConfig, RetryPolicy};
use crate::domain::SegmentConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 语音合成服务配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 文本分段配置
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// 音频与背景音轨配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 压缩导出配置
    #[serde(default)]
    pub export: ExportConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 折算为控制器配置
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            max_input_chars: self.segmentation.max_input_chars,
            segment: SegmentConfig {
                max_chunk_chars: self.segmentation.max_chunk_chars,
                terminators: self.segmentation.terminators.clone(),
            },
            concurrency: self.tts.concurrency,
            retry: RetryPolicy {
                max_retries: self.tts.max_retries,
                initial_delay: Duration::from_millis(self.tts.initial_backoff_ms),
            },
            opus_bitrate: self.export.opus_bitrate,
        }
    }
}

/// 语音合成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// 合成服务基础 URL
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,

    /// 默认音色标识
    #[serde(default = "default_voice")]
    pub voice: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout_secs")]
    pub timeout_secs: u64,

    /// 批次并发上限
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// 单块最大重试次数（不含首次尝试）
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 首次退避时长（毫秒），之后每次翻倍
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_tts_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_voice() -> String {
    "narrator".to_string()
}

fn default_tts_timeout_secs() -> u64 {
    120
}

fn default_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_base_url(),
            voice: default_voice(),
            timeout_secs: default_tts_timeout_secs(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// 文本分段配置
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    /// 单次请求的输入字符数上限
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// 单块最大字符数（贪心打包上限）
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// 句末终止符集合
    #[serde(default = "default_terminators")]
    pub terminators: Vec<char>,
}

fn default_max_input_chars() -> usize {
    100_000
}

fn default_max_chunk_chars() -> usize {
    crate::domain::segmenter::DEFAULT_MAX_CHUNK_CHARS
}

fn default_terminators() -> Vec<char> {
    SegmentConfig::default().terminators
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            max_chunk_chars: default_max_chunk_chars(),
            terminators: default_terminators(),
        }
    }
}

/// 音频与背景音轨配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 语音管线采样率
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// 默认语音增益 [0, 1]
    #[serde(default = "default_speech_gain")]
    pub speech_gain: f32,

    /// 默认背景音乐增益 [0, 1]
    #[serde(default = "default_music_gain")]
    pub music_gain: f32,

    /// 背景音轨名 -> 下载 URL
    #[serde(default)]
    pub tracks: HashMap<String, String>,

    /// 音轨下载超时时间（秒）
    #[serde(default = "default_track_timeout_secs")]
    pub track_timeout_secs: u64,
}

fn default_sample_rate() -> u32 {
    24000
}

fn default_speech_gain() -> f32 {
    1.0
}

fn default_music_gain() -> f32 {
    0.3
}

fn default_track_timeout_secs() -> u64 {
    60
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            speech_gain: default_speech_gain(),
            music_gain: default_music_gain(),
            tracks: HashMap::new(),
            track_timeout_secs: default_track_timeout_secs(),
        }
    }
}

/// 压缩导出配置
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Opus 码率 (bps)
    #[serde(default = "default_opus_bitrate")]
    pub opus_bitrate: u32,
}

fn default_opus_bitrate() -> u32 {
    32_000
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            opus_bitrate: default_opus_bitrate(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别 (trace/debug/info/warn/error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_coherent() {
        let config = AppConfig::default();
        assert_eq!(config.tts.concurrency, 4);
        assert_eq!(config.segmentation.max_chunk_chars, 900);
        assert_eq!(config.audio.sample_rate, 24000);
        assert!(config.audio.tracks.is_empty());
    }

    #[test]
    fn test_controller_config_conversion() {
        let mut config = AppConfig::default();
        config.tts.max_retries = 5;
        config.tts.initial_backoff_ms = 250;

        let controller = config.controller_config();
        assert_eq!(controller.retry.max_retries, 5);
        assert_eq!(
            controller.retry.initial_delay,
            Duration::from_millis(250)
        );
        assert_eq!(controller.opus_bitrate, 32_000);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [tts]
            base_url = "http://speech:9000"

            [segmentation]
            max_chunk_chars = 400
            "#,
        )
        .unwrap();

        assert_eq!(config.tts.base_url, "http://speech:9000");
        assert_eq!(config.tts.concurrency, 4);
        assert_eq!(config.segmentation.max_chunk_chars, 400);
        assert_eq!(config.segmentation.max_input_chars, 100_000);
    }
}
