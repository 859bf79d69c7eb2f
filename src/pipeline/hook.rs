use std::path::{Path, PathBuf};

use anyhow::Result;

/// A hook invoked between encoding and decoding in a [`roundtrip`](super::roundtrip).
///
/// Implement this to put the encoded video through some outside channel
/// before it is decoded, typically uploading it to a video host and pulling
/// the transcoded copy back down.
///
/// # Example
///
/// ```rust
/// use std::path::{Path, PathBuf};
/// use anyhow::Result;
/// use framevault::PipelineHook;
///
/// struct RemoteHook;
///
/// impl PipelineHook for RemoteHook {
///     fn after_encode(&self, encoded_path: &Path) -> Result<PathBuf> {
///         // upload encoded_path, fetch it back to a local file,
///         // and return the path of the fetched copy
///         Ok(encoded_path.to_path_buf()) // placeholder
///     }
/// }
/// ```
pub trait PipelineHook {
    /// Called after encoding completes. `encoded_path` is the local path of
    /// the freshly written video. Return the path the decoder should read
    /// from, which may be the same file or a fetched copy.
    fn after_encode(&self, encoded_path: &Path) -> Result<PathBuf>;
}

/// Passes the encoded path through unchanged.
pub struct NoopHook;

impl PipelineHook for NoopHook {
    fn after_encode(&self, encoded_path: &Path) -> Result<PathBuf> {
        Ok(encoded_path.to_path_buf())
    }
}
