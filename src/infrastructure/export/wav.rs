//! WAV 导出 - 标准未压缩 PCM 容器
//!
//! 44 字节小端规范头 + 16 位样本数据。头部字段布局必须逐位精确，
//! 导出产物要能被任何标准播放工具直接打开。
//!
//! 数据区按声道顺序平铺（本管线只产单声道，交织与平铺此时等价）。

use crate::domain::{reencode_to_i16, DecodedAudio};

const BITS_PER_SAMPLE: u16 = 16;

/// 将 PCM 缓冲序列化为 WAV 字节流
pub fn export_wav(buffer: &DecodedAudio) -> Vec<u8> {
    let num_channels = buffer.channel_count() as u16;
    let sample_rate = buffer.sample_rate();
    let bytes_per_sample = (BITS_PER_SAMPLE / 8) as u32;
    let byte_rate = sample_rate * num_channels as u32 * bytes_per_sample;
    let block_align = num_channels * (BITS_PER_SAMPLE / 8);

    let samples = reencode_to_i16(buffer);
    let data_size = samples.len() * 2;
    let riff_size = 36 + data_size;

    let mut wav = Vec::with_capacity(44 + data_size);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(riff_size as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format tag
    wav.extend_from_slice(&num_channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_size as u32).to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u16(data: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([data[at], data[at + 1]])
    }

    fn read_u32(data: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
    }

    #[test]
    fn test_header_layout_is_canonical() {
        let buffer = DecodedAudio::mono(24000, vec![0.0; 24000]).unwrap();
        let wav = export_wav(&buffer);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(read_u32(&wav, 16), 16); // fmt chunk size
        assert_eq!(read_u16(&wav, 20), 1); // PCM
        assert_eq!(read_u16(&wav, 22), 1); // channels
        assert_eq!(read_u32(&wav, 24), 24000); // sample rate
        assert_eq!(read_u32(&wav, 28), 48000); // byte rate = rate * ch * 2
        assert_eq!(read_u16(&wav, 32), 2); // block align = ch * 2
        assert_eq!(read_u16(&wav, 34), 16); // bit depth
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(read_u32(&wav, 40), 48000); // data size = samples * 2
        assert_eq!(wav.len(), 44 + 48000);
        assert_eq!(read_u32(&wav, 4) as usize, wav.len() - 8);
    }

    #[test]
    fn test_data_chunk_matches_reencoded_samples() {
        let buffer = DecodedAudio::mono(24000, vec![1.0, -1.0, 0.0, 0.5]).unwrap();
        let wav = export_wav(&buffer);

        let data = &wav[44..];
        assert_eq!(i16::from_le_bytes([data[0], data[1]]), 32767);
        assert_eq!(i16::from_le_bytes([data[2], data[3]]), -32768);
        assert_eq!(i16::from_le_bytes([data[4], data[5]]), 0);
        assert_eq!(i16::from_le_bytes([data[6], data[7]]), 16383);
    }

    #[test]
    fn test_empty_buffer_yields_header_only() {
        let buffer = DecodedAudio::mono(24000, vec![]).unwrap();
        let wav = export_wav(&buffer);
        assert_eq!(wav.len(), 44);
        assert_eq!(read_u32(&wav, 40), 0);
    }
}
