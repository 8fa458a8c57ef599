//! 生成控制器 - 会话状态机
//!
//! 串起完整管线：校验 -> 分段 -> 批次派发 -> 装配 -> （可选）混音 -> 导出。
//! 每个阶段边界检查取消令牌并发布状态事件；单块失败由派发器落在槽位上，
//! 最终在装配阶段裁决为会话级结局（全有或全无，绝不拼装部分音频）。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::dispatcher::BatchDispatcher;
use super::error::GenerationError;
use super::ports::{
    BackgroundTrackPort, CompressedExporterPort, ErrorKind, ExportError, SpeechSynthesizerPort,
    SynthesisRequest, TrackError,
};
use super::retry::RetryPolicy;
use crate::domain::segmenter::{segment, SegmentConfig};
use crate::domain::{concatenate, mix, reencode_to_i16, DecodedAudio, MixParams};
use crate::infrastructure::events::{GenerationEvent, ProgressPublisher};
use crate::infrastructure::export::export_wav;

/// 会话状态
///
/// `Exported` / `Failed` / `Cancelled` 是终态；其余为推进中状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Segmenting,
    Dispatching,
    Assembling,
    Mixing,
    Exported,
    Failed,
    Cancelled,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::Segmenting => "segmenting",
            GenerationState::Dispatching => "dispatching",
            GenerationState::Assembling => "assembling",
            GenerationState::Mixing => "mixing",
            GenerationState::Exported => "exported",
            GenerationState::Failed => "failed",
            GenerationState::Cancelled => "cancelled",
        }
    }

    /// 面向用户的状态描述
    pub fn label(&self) -> &'static str {
        match self {
            GenerationState::Idle => "Waiting",
            GenerationState::Segmenting => "Preparing text",
            GenerationState::Dispatching => "Generating speech",
            GenerationState::Assembling => "Assembling audio",
            GenerationState::Mixing => "Mixing background track",
            GenerationState::Exported => "Done",
            GenerationState::Failed => "Failed",
            GenerationState::Cancelled => "Cancelled",
        }
    }
}

/// 背景音轨混音请求
#[derive(Debug, Clone)]
pub struct BackgroundMix {
    /// 配置里登记的音轨名
    pub track: String,
    pub params: MixParams,
}

/// 单次生成请求
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub voice: String,
    pub background: Option<BackgroundMix>,
    /// 是否同时产出压缩容器（失败不影响 WAV）
    pub compress: bool,
}

/// 生成产物
#[derive(Debug)]
pub struct GeneratedAudio {
    /// 最终 PCM（含混音）
    pub audio: DecodedAudio,
    /// 未压缩 WAV 容器字节
    pub wav: Vec<u8>,
    /// 压缩容器字节（请求压缩且成功时）
    pub compressed: Option<Vec<u8>>,
    /// 压缩失败原因（非致命，仅随产物上报）
    pub compression_error: Option<ExportError>,
    pub duration_ms: u64,
    pub elapsed_ms: u64,
}

/// 控制器配置
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// 单次请求的输入字符数上限
    pub max_input_chars: usize,
    pub segment: SegmentConfig,
    /// 批次并发上限
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// 压缩导出码率 (bps)
    pub opus_bitrate: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 100_000,
            segment: SegmentConfig::default(),
            concurrency: 4,
            retry: RetryPolicy::default(),
            opus_bitrate: 32_000,
        }
    }
}

/// 生成控制器
pub struct GenerationController {
    config: ControllerConfig,
    synthesizer: Arc<dyn SpeechSynthesizerPort>,
    tracks: Option<Arc<dyn BackgroundTrackPort>>,
    compressor: Option<Arc<dyn CompressedExporterPort>>,
    publisher: Arc<ProgressPublisher>,
    state: Mutex<GenerationState>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl GenerationController {
    pub fn new(
        config: ControllerConfig,
        synthesizer: Arc<dyn SpeechSynthesizerPort>,
        publisher: Arc<ProgressPublisher>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            tracks: None,
            compressor: None,
            publisher,
            state: Mutex::new(GenerationState::Idle),
            cancel: Mutex::new(None),
        }
    }

    pub fn with_background_tracks(mut self, tracks: Arc<dyn BackgroundTrackPort>) -> Self {
        self.tracks = Some(tracks);
        self
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn CompressedExporterPort>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub async fn state(&self) -> GenerationState {
        *self.state.lock().await
    }

    /// 请求协作取消
    ///
    /// 已在途的远程调用允许落定，其结果被丢弃；会话以 `Cancelled` 终态收尾。
    /// 无进行中会话时为空操作。
    pub async fn cancel(&self) {
        if let Some(token) = self.cancel.lock().await.as_ref() {
            tracing::info!("cancellation requested");
            token.cancel();
        }
    }

    /// 执行一次完整生成会话
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedAudio, GenerationError> {
        let started = Instant::now();
        let token = CancellationToken::new();
        {
            // 新会话取代旧会话：残留的旧令牌直接取消
            let mut slot = self.cancel.lock().await;
            if let Some(previous) = slot.replace(token.clone()) {
                previous.cancel();
            }
        }

        let result = self.run_pipeline(&request, &token, started).await;
        *self.cancel.lock().await = None;

        match &result {
            Ok(output) => {
                self.transition(GenerationState::Exported, started).await;
                self.publisher.publish(GenerationEvent::Completed {
                    audio_duration_ms: output.duration_ms,
                    elapsed_ms: output.elapsed_ms,
                    wav_bytes: output.wav.len(),
                    compressed_bytes: output.compressed.as_ref().map(Vec::len),
                });
                tracing::info!(
                    duration_ms = output.duration_ms,
                    elapsed_ms = output.elapsed_ms,
                    "generation completed"
                );
            }
            Err(err) => {
                let terminal = if err.is_cancelled() {
                    GenerationState::Cancelled
                } else {
                    GenerationState::Failed
                };
                self.transition(terminal, started).await;
                self.publisher.publish(GenerationEvent::Failed {
                    error: err.to_string(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
                tracing::warn!(error = %err, "generation did not complete");
            }
        }

        result
    }

    async fn transition(&self, state: GenerationState, started: Instant) {
        *self.state.lock().await = state;
        self.publisher.publish(GenerationEvent::StateChanged {
            state: state.as_str().to_string(),
            label: state.label().to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }

    async fn run_pipeline(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<GeneratedAudio, GenerationError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(GenerationError::Validation("input text is empty".to_string()));
        }
        let input_chars = text.chars().count();
        if input_chars > self.config.max_input_chars {
            return Err(GenerationError::Validation(format!(
                "input is {} chars, limit is {}",
                input_chars, self.config.max_input_chars
            )));
        }

        self.transition(GenerationState::Segmenting, started).await;
        let chunks = segment(text, &self.config.segment);
        if chunks.is_empty() {
            return Err(GenerationError::NoContent);
        }
        tracing::info!(
            chunks = chunks.len(),
            input_chars,
            "text segmented for dispatch"
        );

        self.transition(GenerationState::Dispatching, started).await;
        let total_chars: usize = chunks.iter().map(|c| c.length).sum();
        let chars_done = AtomicUsize::new(0);
        let dispatcher = BatchDispatcher::new(self.config.concurrency, self.config.retry.clone());

        let mut results = dispatcher
            .dispatch_all(
                &chunks,
                cancel,
                |chunk| {
                    let request = SynthesisRequest {
                        text: chunk.content.clone(),
                        voice: request.voice.clone(),
                    };
                    async move { self.synthesizer.synthesize(request).await }
                },
                |chunk| {
                    let done = chars_done.fetch_add(chunk.length, Ordering::SeqCst) + chunk.length;
                    self.publisher.publish(GenerationEvent::Progress {
                        chars_processed: done,
                        total_chars,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                },
                |chunk_index, delay, retries_remaining, message| {
                    self.publisher.publish(GenerationEvent::RetryWait {
                        chunk_index,
                        delay_ms: delay.as_millis() as u64,
                        retries_remaining,
                        message: message.to_string(),
                    });
                },
            )
            .await;

        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        // 有任何失败块就不进装配阶段
        self.adjudicate(&results, chunks.len())?;
        self.transition(GenerationState::Assembling, started).await;

        // 派发器保序，但装配以块序号为准
        results.sort_by_key(|r| r.index);
        let buffers: Vec<DecodedAudio> =
            results.into_iter().filter_map(|r| r.outcome.ok()).collect();
        let mut audio = concatenate(&buffers)?;

        if let Some(background) = &request.background {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            self.transition(GenerationState::Mixing, started).await;
            let tracks = self.tracks.as_ref().ok_or_else(|| {
                GenerationError::Track(TrackError::UnknownTrack(background.track.clone()))
            })?;
            let music = tracks.fetch(&background.track).await?;
            audio = mix(&audio, &music, &background.params)?;
        }

        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let wav = export_wav(&audio);
        let (compressed, compression_error) = if request.compress {
            self.compress(&audio).await
        } else {
            (None, None)
        };

        Ok(GeneratedAudio {
            duration_ms: audio.duration_ms(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            audio,
            wav,
            compressed,
            compression_error,
        })
    }

    /// 将派发结果裁决为会话级结局
    ///
    /// 失败分类的优先级：凭证被拒 > 带冷却的限流 > 其余一律按部分失败上报。
    fn adjudicate(
        &self,
        results: &[super::dispatcher::ChunkResult],
        total: usize,
    ) -> Result<(), GenerationError> {
        let failures: Vec<_> = results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err())
            .collect();
        if failures.is_empty() {
            return Ok(());
        }

        if failures
            .iter()
            .any(|e| e.kind == ErrorKind::Unauthenticated)
        {
            return Err(GenerationError::Unauthenticated);
        }
        if let Some(cooldown) = failures.iter().find_map(|e| match e.kind {
            ErrorKind::RateLimited {
                retry_after: Some(delay),
            } => Some(delay),
            _ => None,
        }) {
            return Err(GenerationError::RateLimited {
                cooldown_ms: cooldown.as_millis() as u64,
            });
        }

        Err(GenerationError::PartialGeneration {
            failed: failures.len(),
            total,
            first_message: failures[0].message.clone(),
        })
    }

    /// 压缩导出；失败不致命，原因随产物上报
    async fn compress(&self, audio: &DecodedAudio) -> (Option<Vec<u8>>, Option<ExportError>) {
        let compressor = match &self.compressor {
            Some(compressor) => compressor,
            None => {
                tracing::warn!("compression requested but no encoder configured");
                return (None, Some(ExportError::CompressionUnavailable));
            }
        };

        let samples = reencode_to_i16(audio);
        match compressor
            .export(
                samples,
                audio.sample_rate(),
                audio.channel_count() as u8,
                self.config.opus_bitrate,
            )
            .await
        {
            Ok(bytes) => (Some(bytes), None),
            Err(err) => {
                tracing::warn!(error = %err, "compressed export failed, keeping wav only");
                (None, Some(err))
            }
        }
    }
}
