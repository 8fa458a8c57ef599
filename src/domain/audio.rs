//! PCM 样本缓冲与样本域运算
//!
//! `DecodedAudio` 是按声道平面存储的 f32 PCM。缓冲一经产生不再原地修改，
//! 每个变换（拼接 / 混音 / 重编码）都产出新缓冲。
//!
//! 参与同一运算的缓冲必须采样率与声道数一致，不一致是硬错误，
//! 绝不隐式重采样。

use thiserror::Error;

/// 样本域错误
#[derive(Debug, Error)]
pub enum AudioError {
    /// 缓冲间格式不一致（数据契约违反，正常运行不应出现）
    #[error("incompatible audio format: {0}")]
    IncompatibleFormat(String),

    /// 运算要求至少一个输入缓冲
    #[error("no input buffers")]
    EmptyInput,

    /// 缓冲本身不合法
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    /// 增益超出 [0, 1]
    #[error("gain out of range: {0}")]
    GainOutOfRange(f32),
}

/// 解码后的 PCM 音频缓冲（按声道平面存储）
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    sample_rate: u32,
    /// 每声道一个样本序列，长度一致
    channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// 构造缓冲，校验声道非空且等长
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidBuffer("sample rate is 0".to_string()));
        }
        if channels.is_empty() {
            return Err(AudioError::InvalidBuffer("no channels".to_string()));
        }
        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::InvalidBuffer(
                "channels differ in length".to_string(),
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// 单声道缓冲（本管线的常规形态）
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Result<Self, AudioError> {
        Self::new(sample_rate, vec![samples])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// 每声道样本数
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn duration_ms(&self) -> u64 {
        (self.frames() as u64 * 1000) / self.sample_rate as u64
    }

    fn format_matches(&self, other: &DecodedAudio) -> bool {
        self.sample_rate == other.sample_rate && self.channel_count() == other.channel_count()
    }
}

/// 混音参数（纯配置）
#[derive(Debug, Clone, Copy)]
pub struct MixParams {
    speech_gain: f32,
    music_gain: f32,
}

impl MixParams {
    /// 构造混音参数，增益限定在 [0, 1]
    pub fn new(speech_gain: f32, music_gain: f32) -> Result<Self, AudioError> {
        for gain in [speech_gain, music_gain] {
            if !(0.0..=1.0).contains(&gain) {
                return Err(AudioError::GainOutOfRange(gain));
            }
        }
        Ok(Self {
            speech_gain,
            music_gain,
        })
    }

    pub fn speech_gain(&self) -> f32 {
        self.speech_gain
    }

    pub fn music_gain(&self) -> f32 {
        self.music_gain
    }
}

impl Default for MixParams {
    fn default() -> Self {
        Self {
            speech_gain: 1.0,
            music_gain: 0.3,
        }
    }
}

/// 按输入顺序拼接缓冲
///
/// 要求非空输入且格式一致；结果长度为各输入之和，样本原样复制，不改增益。
pub fn concatenate(buffers: &[DecodedAudio]) -> Result<DecodedAudio, AudioError> {
    let first = buffers.first().ok_or(AudioError::EmptyInput)?;

    for (i, buffer) in buffers.iter().enumerate().skip(1) {
        if !first.format_matches(buffer) {
            return Err(AudioError::IncompatibleFormat(format!(
                "buffer {} is {} Hz / {} ch, expected {} Hz / {} ch",
                i,
                buffer.sample_rate,
                buffer.channel_count(),
                first.sample_rate,
                first.channel_count()
            )));
        }
    }

    let total_frames: usize = buffers.iter().map(|b| b.frames()).sum();
    let mut channels: Vec<Vec<f32>> = (0..first.channel_count())
        .map(|_| Vec::with_capacity(total_frames))
        .collect();

    for buffer in buffers {
        for (ch, out) in channels.iter_mut().enumerate() {
            out.extend_from_slice(buffer.channel(ch));
        }
    }

    DecodedAudio::new(first.sample_rate, channels)
}

/// 时域混音：语音 + 循环背景音乐
///
/// 输出长度为两者较长一方。音乐短于语音时按模循环；语音不循环，
/// 超出其长度的部分按 0 参与。求和后钳制到 [-1, 1]，
/// 防止溢出削波（有损但安全的既定策略）。
pub fn mix(
    speech: &DecodedAudio,
    music: &DecodedAudio,
    params: &MixParams,
) -> Result<DecodedAudio, AudioError> {
    if !speech.format_matches(music) {
        return Err(AudioError::IncompatibleFormat(format!(
            "speech is {} Hz / {} ch, music is {} Hz / {} ch",
            speech.sample_rate,
            speech.channel_count(),
            music.sample_rate,
            music.channel_count()
        )));
    }

    let out_frames = speech.frames().max(music.frames());
    let music_frames = music.frames();
    let mut channels: Vec<Vec<f32>> = Vec::with_capacity(speech.channel_count());

    for ch in 0..speech.channel_count() {
        let speech_samples = speech.channel(ch);
        let music_samples = music.channel(ch);
        let mut out = Vec::with_capacity(out_frames);

        for i in 0..out_frames {
            let s = speech_samples.get(i).copied().unwrap_or(0.0) * params.speech_gain;
            let m = if music_frames > 0 {
                music_samples[i % music_frames] * params.music_gain
            } else {
                0.0
            };
            out.push((s + m).clamp(-1.0, 1.0));
        }

        channels.push(out);
    }

    DecodedAudio::new(speech.sample_rate, channels)
}

/// f32 样本重编码为 i16 序列，按声道顺序平铺（非交织）
///
/// 非对称缩放避免有符号范围溢出：负半轴乘 32768，正半轴乘 32767。
/// 该公式必须保持逐位一致，导出容器依赖它。
pub fn reencode_to_i16(buffer: &DecodedAudio) -> Vec<i16> {
    let mut out = Vec::with_capacity(buffer.frames() * buffer.channel_count());

    for ch in 0..buffer.channel_count() {
        for &sample in buffer.channel(ch) {
            let s = sample.clamp(-1.0, 1.0);
            let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
            out.push(scaled as i16);
        }
    }

    out
}
