//! Encode Worker - Opus/OGG 后台编码器
//!
//! 长驻 worker 任务：从请求通道消费编码作业，在主执行流之外完成
//! CPU 密集的 Opus 编码，结果按关联 ID 回送到响应通道。
//! 样本缓冲随消息移动所有权，大缓冲不发生复制。

use opus::{Application, Bitrate, Channels, Encoder};
use tokio::sync::mpsc;
use uuid::Uuid;

/// OGG 逻辑流序列号（单流）
const STREAM_SERIAL: u32 = 0;

/// Opus 帧长 20ms，即每秒 50 帧
const FRAMES_PER_SEC: usize = 50;

/// OGG granule 位置按 48kHz 折算（RFC 7845）
const GRANULE_RATE: u64 = 48000;

/// 编码请求
#[derive(Debug)]
pub struct EncodeRequest {
    /// 关联 ID，响应按此 ID 配对
    pub id: Uuid,
    /// i16 样本序列（立体声时交织）
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u8,
    /// 目标比特率（bps）
    pub bitrate: u32,
}

/// 编码响应
#[derive(Debug)]
pub struct EncodeResponse {
    pub id: Uuid,
    pub result: Result<Vec<u8>, String>,
}

/// 后台编码 worker
///
/// 响应间无顺序保证，调用侧只凭关联 ID 配对。
pub struct EncodeWorker {
    request_rx: mpsc::Receiver<EncodeRequest>,
    response_tx: mpsc::Sender<EncodeResponse>,
}

impl EncodeWorker {
    pub fn new(
        request_rx: mpsc::Receiver<EncodeRequest>,
        response_tx: mpsc::Sender<EncodeResponse>,
    ) -> Self {
        Self {
            request_rx,
            response_tx,
        }
    }

    /// worker 主循环：请求通道关闭后退出，随之关闭响应通道
    pub async fn run(mut self) {
        tracing::info!("EncodeWorker started");

        while let Some(request) = self.request_rx.recv().await {
            let id = request.id;
            let result = encode_ogg_opus(request);

            if let Err(ref e) = result {
                tracing::warn!(id = %id, error = %e, "opus encoding failed");
            }
            if self.response_tx.send(EncodeResponse { id, result }).await.is_err() {
                break;
            }
        }

        tracing::info!("EncodeWorker stopped");
    }
}

/// 将 i16 样本编码为 Opus 包并装入 OGG 容器
///
/// 采样率必须是 Opus 原生支持的档位，这里不做重采样；
/// 管线固定在 24kHz，天然在支持范围内。
fn encode_ogg_opus(request: EncodeRequest) -> Result<Vec<u8>, String> {
    let channels = match request.channels {
        1 => Channels::Mono,
        2 => Channels::Stereo,
        n => return Err(format!("opus supports 1 or 2 channels, got {}", n)),
    };
    if !matches!(request.sample_rate, 8000 | 12000 | 16000 | 24000 | 48000) {
        return Err(format!(
            "sample rate {} not supported by opus",
            request.sample_rate
        ));
    }

    let mut encoder = Encoder::new(request.sample_rate, channels, Application::Audio)
        .map_err(|e| format!("encoder init failed: {}", e))?;
    encoder
        .set_bitrate(Bitrate::Bits(request.bitrate as i32))
        .map_err(|e| format!("set bitrate failed: {}", e))?;

    // 编码器前置延迟（encoder 采样率下的样本数）
    let pre_skip = encoder.get_lookahead().map(|l| l as u64).unwrap_or(312);

    let channel_count = request.channels as usize;
    let frame_samples = request.sample_rate as usize / FRAMES_PER_SEC;
    let frame_values = frame_samples * channel_count;
    // granule 统一按 48kHz 折算
    let granule_per_frame = GRANULE_RATE / FRAMES_PER_SEC as u64;
    let pre_skip_48k = pre_skip * GRANULE_RATE / request.sample_rate as u64;

    let mut ogg_data = Vec::new();
    {
        let mut writer = ogg::writing::PacketWriter::new(&mut ogg_data);

        writer
            .write_packet(
                id_header(request.channels, request.sample_rate, pre_skip_48k as u16),
                STREAM_SERIAL,
                ogg::PacketWriteEndInfo::EndPage,
                0,
            )
            .map_err(|e| format!("write id header failed: {}", e))?;
        writer
            .write_packet(
                comment_header(),
                STREAM_SERIAL,
                ogg::PacketWriteEndInfo::EndPage,
                0,
            )
            .map_err(|e| format!("write comment header failed: {}", e))?;

        // 数据帧之后补足够的静音帧，把编码器延迟里滞留的样本刷出来
        let flush_frames = (pre_skip as usize).div_ceil(frame_samples).max(1);
        let data_frames = request.samples.len().div_ceil(frame_values);
        let total_frames = data_frames + flush_frames;

        let silence = vec![0i16; frame_values];
        let mut frame_buf = vec![0i16; frame_values];
        let mut packet_buf = vec![0u8; 4000];
        let mut granule = pre_skip_48k;

        for frame_index in 0..total_frames {
            let frame: &[i16] = if frame_index < data_frames {
                let start = frame_index * frame_values;
                let end = (start + frame_values).min(request.samples.len());
                let chunk = &request.samples[start..end];
                if chunk.len() == frame_values {
                    chunk
                } else {
                    // 末帧补零
                    frame_buf[..chunk.len()].copy_from_slice(chunk);
                    frame_buf[chunk.len()..].fill(0);
                    &frame_buf
                }
            } else {
                &silence
            };

            let written = encoder
                .encode(frame, &mut packet_buf)
                .map_err(|e| format!("opus encode failed: {}", e))?;
            granule += granule_per_frame;

            let end_info = if frame_index == total_frames - 1 {
                ogg::PacketWriteEndInfo::EndStream
            } else {
                ogg::PacketWriteEndInfo::NormalPacket
            };
            writer
                .write_packet(
                    packet_buf[..written].to_vec(),
                    STREAM_SERIAL,
                    end_info,
                    granule,
                )
                .map_err(|e| format!("write audio packet failed: {}", e))?;
        }
    }

    Ok(ogg_data)
}

/// OpusHead 包（RFC 7845 §5.1）
fn id_header(channels: u8, sample_rate: u32, pre_skip: u16) -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1); // version
    head.push(channels);
    head.extend_from_slice(&pre_skip.to_le_bytes());
    head.extend_from_slice(&sample_rate.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes()); // output gain
    head.push(0); // channel mapping family
    head
}

/// OpusTags 包（RFC 7845 §5.2）
fn comment_header() -> Vec<u8> {
    let vendor = b"soundweave";
    let mut tags = Vec::new();
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    tags.extend_from_slice(vendor);
    tags.extend_from_slice(&0u32.to_le_bytes()); // no user comments
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(sample_rate: u32, channels: u8, samples: Vec<i16>) -> EncodeRequest {
        EncodeRequest {
            id: Uuid::new_v4(),
            samples,
            sample_rate,
            channels,
            bitrate: 32000,
        }
    }

    #[test]
    fn test_encode_produces_ogg_stream() {
        let samples: Vec<i16> = (0..24000)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let data = encode_ogg_opus(request(24000, 1, samples)).unwrap();

        assert_eq!(&data[0..4], b"OggS");
        // 首页携带 OpusHead
        assert!(data.windows(8).any(|w| w == b"OpusHead"));
        assert!(data.windows(8).any(|w| w == b"OpusTags"));
    }

    #[test]
    fn test_unsupported_sample_rate_fails_closed() {
        let err = encode_ogg_opus(request(44100, 1, vec![0; 100])).unwrap_err();
        assert!(err.contains("not supported"));
    }

    #[test]
    fn test_unsupported_channel_count_fails_closed() {
        let err = encode_ogg_opus(request(24000, 6, vec![0; 100])).unwrap_err();
        assert!(err.contains("channels"));
    }

    #[test]
    fn test_empty_input_still_closes_stream() {
        // 只有静音刷新帧，仍应产出合法的封闭流
        let data = encode_ogg_opus(request(24000, 1, vec![])).unwrap();
        assert_eq!(&data[0..4], b"OggS");
    }

    #[tokio::test]
    async fn test_worker_responds_with_matching_id() {
        let (req_tx, req_rx) = mpsc::channel(4);
        let (resp_tx, mut resp_rx) = mpsc::channel(4);
        tokio::spawn(EncodeWorker::new(req_rx, resp_tx).run());

        let req = request(24000, 1, vec![0; 4800]);
        let id = req.id;
        req_tx.send(req).await.unwrap();

        let response = resp_rx.recv().await.unwrap();
        assert_eq!(response.id, id);
        assert!(response.result.is_ok());
    }
}
