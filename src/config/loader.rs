//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `SOUNDWEAVE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `SOUNDWEAVE_TTS__BASE_URL=http://speech-server:8000`
/// - `SOUNDWEAVE_TTS__CONCURRENCY=8`
/// - `SOUNDWEAVE_AUDIO__SAMPLE_RATE=24000`
/// - `SOUNDWEAVE_LOG__LEVEL=debug`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("tts.base_url", "http://localhost:8000")?
        .set_default("tts.voice", "narrator")?
        .set_default("tts.timeout_secs", 120)?
        .set_default("tts.concurrency", 4)?
        .set_default("tts.max_retries", 3)?
        .set_default("tts.initial_backoff_ms", 1000)?
        .set_default("segmentation.max_input_chars", 100_000)?
        .set_default("segmentation.max_chunk_chars", 900)?
        .set_default("audio.sample_rate", 24000)?
        .set_default("audio.speech_gain", 1.0)?
        .set_default("audio.music_gain", 0.3)?
        .set_default("audio.track_timeout_secs", 60)?
        .set_default("export.opus_bitrate", 32_000)?
        .set_default("log.level", "info")?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: SOUNDWEAVE_
    // 层级分隔符: __ (双下划线)
    // 例如: SOUNDWEAVE_TTS__BASE_URL=http://speech-server:8000
    builder = builder.add_source(
        Environment::with_prefix("SOUNDWEAVE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.tts.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS base URL cannot be empty".to_string(),
        ));
    }

    if config.tts.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "TTS concurrency cannot be 0".to_string(),
        ));
    }

    if config.segmentation.max_chunk_chars == 0 {
        return Err(ConfigError::ValidationError(
            "Max chunk chars cannot be 0".to_string(),
        ));
    }

    if config.audio.sample_rate == 0 {
        return Err(ConfigError::ValidationError(
            "Audio sample rate cannot be 0".to_string(),
        ));
    }

    for gain in [config.audio.speech_gain, config.audio.music_gain] {
        if !(0.0..=1.0).contains(&gain) {
            return Err(ConfigError::ValidationError(format!(
                "Gain {} is outside [0, 1]",
                gain
            )));
        }
    }

    // libopus 的合法码率区间
    if !(500..=512_000).contains(&config.export.opus_bitrate) {
        return Err(ConfigError::ValidationError(format!(
            "Opus bitrate {} is outside [500, 512000]",
            config.export.opus_bitrate
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("TTS Base URL: {}", config.tts.base_url);
    tracing::info!("TTS Voice: {}", config.tts.voice);
    tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::info!("TTS Concurrency: {}", config.tts.concurrency);
    tracing::info!("TTS Max Retries: {}", config.tts.max_retries);
    tracing::info!("Max Chunk Chars: {}", config.segmentation.max_chunk_chars);
    tracing::info!("Max Input Chars: {}", config.segmentation.max_input_chars);
    tracing::info!("Sample Rate: {} Hz", config.audio.sample_rate);
    tracing::info!("Background Tracks: {}", config.audio.tracks.len());
    tracing::info!("Opus Bitrate: {} bps", config.export.opus_bitrate);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_empty_base_url() {
        let mut config = AppConfig::default();
        config.tts.base_url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_concurrency() {
        let mut config = AppConfig::default();
        config.tts.concurrency = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_out_of_range_gain() {
        let mut config = AppConfig::default();
        config.audio.music_gain = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_absurd_bitrate() {
        let mut config = AppConfig::default();
        config.export.opus_bitrate = 100;
        assert!(validate_config(&config).is_err());
    }
}
