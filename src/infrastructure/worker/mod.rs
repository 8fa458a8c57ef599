//! Worker - 后台压缩编码

mod encode_worker;

pub use encode_worker::{EncodeRequest, EncodeResponse, EncodeWorker};
