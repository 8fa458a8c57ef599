//! Domain Layer - 纯领域逻辑
//!
//! - chunk: 文本块值对象
//! - segmenter: 长文本分段
//! - audio: PCM 样本缓冲及其运算（拼接 / 混音 / 重编码）

pub mod audio;
pub mod chunk;
pub mod segmenter;

pub use audio::{concatenate, mix, reencode_to_i16, AudioError, DecodedAudio, MixParams};
pub use chunk::TextChunk;
pub use segmenter::{segment, SegmentConfig};
