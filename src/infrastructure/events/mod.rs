//! Events - 生成进度事件发布

mod publisher;

pub use publisher::{GenerationEvent, ProgressPublisher};
