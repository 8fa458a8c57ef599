//! Track Adapters - 背景音轨端口实现

mod http_track_source;

pub use http_track_source::{HttpTrackSource, HttpTrackSourceConfig};
