//! 通用音频解码 - 基于 symphonia
//!
//! 线上格式不限（WAV/MP3/OGG/FLAC），统一解码为平面 f32 PCM。
//! 解码上下文随调用作用域创建与释放，所有退出路径（含错误路径）
//! 都不会滞留句柄。

use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::domain::DecodedAudio;

/// 解码错误
#[derive(Debug, Error)]
#[error("audio decode failed: {0}")]
pub struct DecodeError(pub String);

/// 将编码音频字节解码为 PCM 缓冲
pub fn decode_to_pcm(data: Vec<u8>) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError(format!("probe failed: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| DecodeError("no audio track found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError("unknown sample rate".to_string()))?;
    let channel_count = track
        .codec_params
        .channels
        .map(|c| c.count())
        .ok_or_else(|| DecodeError("unknown channel count".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError(format!("decoder creation failed: {}", e)))?;

    let track_id = track.id;
    let mut channels: Vec<Vec<f32>> = vec![Vec::new(); channel_count];

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(DecodeError(format!("packet read error: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("decode error (skipping packet): {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        let mut sample_buf = SampleBuffer::<f32>::new(frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // 交织样本按声道拆回平面布局
        let interleaved = &sample_buf.samples()[..frames * channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }
    }

    DecodedAudio::new(sample_rate, channels).map_err(|e| DecodeError(e.to_string()))
}
