//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod export;
mod speech;
mod track;

pub use export::{CompressedExporterPort, ExportError};
pub use speech::{ErrorKind, SpeechSynthesizerPort, SynthesisError, SynthesisRequest};
pub use track::{BackgroundTrackPort, TrackError};
