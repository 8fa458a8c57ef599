//! Soundweave CLI - 单次长文本合成
//!
//! 用法: soundweave <input.txt> [output.wav] [--compress] [--track <name>]
//!
//! 读取文本文件，执行一次完整生成会话，写出 WAV（以及可选的 Opus/OGG）。
//! Ctrl-C 触发协作取消：在途调用落定后以 Cancelled 收尾，不写残缺文件。

use std::path::PathBuf;
use std::sync::Arc;

use soundweave::application::{
    BackgroundMix, GenerationController, GenerationRequest,
};
use soundweave::config::{load_config, print_config};
use soundweave::domain::MixParams;
use soundweave::infrastructure::adapters::{
    HttpSpeechClient, HttpSpeechClientConfig, HttpTrackSource, HttpTrackSourceConfig,
};
use soundweave::infrastructure::events::{GenerationEvent, ProgressPublisher};
use soundweave::infrastructure::export::CompressionService;

/// 命令行参数
struct CliArgs {
    input: PathBuf,
    output: PathBuf,
    compress: bool,
    track: Option<String>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut compress = false;
    let mut track: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--compress" => compress = true,
            "--track" => {
                track = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("--track requires a track name"))?,
                );
            }
            _ if input.is_none() => input = Some(PathBuf::from(arg)),
            _ if output.is_none() => output = Some(PathBuf::from(arg)),
            other => anyhow::bail!("unexpected argument: {}", other),
        }
    }

    let input = input
        .ok_or_else(|| anyhow::anyhow!("usage: soundweave <input.txt> [output.wav] [--compress] [--track <name>]"))?;
    let output = output.unwrap_or_else(|| input.with_extension("wav"));

    Ok(CliArgs {
        input,
        output,
        compress,
        track,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},soundweave={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Soundweave - 长文本语音合成流水线");
    print_config(&config);

    let args = parse_args()?;
    let text = tokio::fs::read_to_string(&args.input).await?;

    // 创建 HTTP 合成客户端
    let speech_config = HttpSpeechClientConfig {
        base_url: config.tts.base_url.clone(),
        timeout_secs: config.tts.timeout_secs,
    };
    let synthesizer = Arc::new(HttpSpeechClient::new(speech_config)?);

    // 创建事件发布器与控制器
    let publisher = Arc::new(ProgressPublisher::new());
    let mut controller = GenerationController::new(
        config.controller_config(),
        synthesizer,
        publisher.clone(),
    );

    // 背景音轨来源（配置了音轨映射才创建）
    if !config.audio.tracks.is_empty() {
        let track_config = HttpTrackSourceConfig {
            tracks: config.audio.tracks.clone(),
            target_sample_rate: config.audio.sample_rate,
            timeout_secs: config.audio.track_timeout_secs,
        };
        controller = controller.with_background_tracks(Arc::new(HttpTrackSource::new(track_config)?));
    }

    // 压缩导出服务（请求压缩才启动 worker）
    let compression = if args.compress {
        let service = Arc::new(CompressionService::spawn());
        controller = controller.with_compressor(service.clone());
        Some(service)
    } else {
        None
    };

    let controller = Arc::new(controller);

    // 订阅进度事件并落到日志
    let mut events = publisher.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                GenerationEvent::StateChanged { label, elapsed_ms, .. } => {
                    tracing::info!(elapsed_ms, "{}", label);
                }
                GenerationEvent::Progress {
                    chars_processed,
                    total_chars,
                    ..
                } => {
                    tracing::info!("progress: {}/{} chars", chars_processed, total_chars);
                }
                GenerationEvent::RetryWait {
                    chunk_index,
                    delay_ms,
                    retries_remaining,
                    message,
                } => {
                    tracing::warn!(
                        chunk_index,
                        delay_ms,
                        retries_remaining,
                        "retrying after transient failure: {}",
                        message
                    );
                }
                GenerationEvent::Completed { .. } | GenerationEvent::Failed { .. } => break,
            }
        }
    });

    // Ctrl-C -> 协作取消
    {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling generation");
                controller.cancel().await;
            }
        });
    }

    let background = match args.track {
        Some(track) => Some(BackgroundMix {
            track,
            params: MixParams::new(config.audio.speech_gain, config.audio.music_gain)
                .map_err(|e| anyhow::anyhow!("invalid gain configuration: {}", e))?,
        }),
        None => None,
    };

    let request = GenerationRequest {
        text,
        voice: config.tts.voice.clone(),
        background,
        compress: args.compress,
    };

    let output = controller.generate(request).await?;

    tokio::fs::write(&args.output, &output.wav).await?;
    tracing::info!(
        path = %args.output.display(),
        bytes = output.wav.len(),
        duration_ms = output.duration_ms,
        "wav written"
    );

    if let Some(compressed) = &output.compressed {
        let ogg_path = args.output.with_extension("ogg");
        tokio::fs::write(&ogg_path, compressed).await?;
        tracing::info!(path = %ogg_path.display(), bytes = compressed.len(), "ogg written");
    } else if let Some(err) = &output.compression_error {
        tracing::warn!(error = %err, "compressed artifact skipped");
    }

    if let Some(service) = compression {
        service.shutdown();
    }

    Ok(())
}
