mod chunker;
pub mod config;
mod crypto;
mod fountain;
mod integrity;
mod packet;
pub mod pipeline;
pub mod video;

pub use config::FramevaultConfig;
pub use pipeline::decode::decode_file;
pub use pipeline::encode::encode_file;
pub use pipeline::hook::{NoopHook, PipelineHook};
pub use pipeline::{roundtrip, RoundtripResult};
