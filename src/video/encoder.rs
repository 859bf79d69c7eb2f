use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::config::{ConfigError, FramevaultConfig};
use crate::video::dct::BlockTables;
use crate::video::frame::FrameCodec;

/// Write per-frame data buffers into an FFV1/MKV video file.
///
/// Each frame is an 8-bit grayscale image rendered by the frame codec.
/// Frames are fed to the ffmpeg CLI in order; the block-level parallelism
/// lives inside the codec, so this stays a plain sequential pipe writer.
pub struct VideoEncoder {
    width: u32,
    height: u32,
    fps: u32,
    codec: FrameCodec,
}

impl VideoEncoder {
    pub fn new(cfg: &FramevaultConfig, tables: Arc<BlockTables>) -> Result<Self, ConfigError> {
        let codec = FrameCodec::new(cfg.frame_width, cfg.frame_height, tables)?;
        Ok(Self {
            width: cfg.frame_width,
            height: cfg.frame_height,
            fps: cfg.fps,
            codec,
        })
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.codec.bytes_per_frame()
    }

    /// Render each buffer in `frames` as one video frame and encode the lot
    /// losslessly. Every buffer must fit within `bytes_per_frame`.
    pub fn encode_to_file(&self, output_path: &str, frames: &[Vec<u8>]) -> Result<()> {
        info!(
            "encoding {} frames ({}x{} @ {} fps) to {}",
            frames.len(),
            self.width,
            self.height,
            self.fps,
            output_path
        );

        // Scale FFV1 slice count to available threads for intra-frame
        // parallelism inside ffmpeg. Clamped to 16 (a reasonable FFV1 upper
        // bound).
        let ffv1_slices = rayon::current_num_threads().min(16).to_string();

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-pixel_format",
                "gray",
                "-video_size",
                &format!("{}x{}", self.width, self.height),
                "-framerate",
                &self.fps.to_string(),
                "-i",
                "pipe:0",
                "-c:v",
                "ffv1",
                "-level",
                "3",
                "-slices",
                &ffv1_slices,
                "-slicecrc",
                "1",
                output_path,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg - is ffmpeg installed?")?;

        let written = child
            .stdin
            .as_mut()
            .context("ffmpeg stdin was not captured")
            .and_then(|stdin| self.write_frames(stdin, frames));
        drop(child.stdin.take());
        if let Err(e) = written {
            // Reap the child before surfacing the error.
            child.kill().ok();
            child.wait().ok();
            return Err(e);
        }

        let status = child.wait().context("ffmpeg process failed")?;
        if !status.success() {
            anyhow::bail!("ffmpeg exited with status: {}", status);
        }

        info!("video encoding complete: {}", output_path);
        Ok(())
    }

    /// Render each buffer as one grayscale frame and stream it into `sink`.
    fn write_frames(&self, sink: &mut impl Write, frames: &[Vec<u8>]) -> Result<()> {
        for frame_data in frames {
            let pixels = self.codec.encode_frame(frame_data);
            sink.write_all(&pixels)
                .context("failed to write frame data to ffmpeg")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_encoder() -> VideoEncoder {
        let cfg = FramevaultConfig {
            frame_width: 16,
            frame_height: 16,
            ..Default::default()
        };
        let tables = Arc::new(BlockTables::new(1, cfg.coefficient_strength).unwrap());
        VideoEncoder::new(&cfg, tables).unwrap()
    }

    #[test]
    fn write_frames_renders_one_raster_per_buffer() {
        let encoder = test_encoder();
        let mut sink = Vec::new();
        encoder
            .write_frames(&mut sink, &[vec![0xAA], vec![0x55]])
            .unwrap();
        assert_eq!(sink.len(), 2 * 16 * 16);
    }

    #[test]
    fn write_frames_surfaces_sink_errors() {
        struct ClosedSink;
        impl Write for ClosedSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "pipe closed",
                ))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let encoder = test_encoder();
        let err = encoder.write_frames(&mut ClosedSink, &[vec![1u8]]).unwrap_err();
        assert!(err.to_string().contains("ffmpeg"));
    }
}
