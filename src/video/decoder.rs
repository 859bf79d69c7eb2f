use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::config::{ConfigError, FramevaultConfig};
use crate::video::dct::BlockTables;
use crate::video::frame::FrameCodec;

/// Read a lossless video back into per-frame data buffers.
pub struct VideoDecoder {
    width: u32,
    height: u32,
    codec: FrameCodec,
}

impl VideoDecoder {
    pub fn new(cfg: &FramevaultConfig, tables: Arc<BlockTables>) -> Result<Self, ConfigError> {
        let codec = FrameCodec::new(cfg.frame_width, cfg.frame_height, tables)?;
        Ok(Self {
            width: cfg.frame_width,
            height: cfg.frame_height,
            codec,
        })
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.codec.bytes_per_frame()
    }

    /// Decode every frame of `input_path` and return one byte buffer per
    /// frame, each holding the frame's full data capacity. Packets never
    /// span frames, so the caller scans each buffer independently and a
    /// damaged frame costs only its own packets.
    pub fn decode_from_file(&self, input_path: &str) -> Result<Vec<Vec<u8>>> {
        info!("decoding video: {}", input_path);

        // Point sampling: if ffmpeg has to convert the pixel format, any
        // interpolation would smear data across block boundaries.
        let mut child = Command::new("ffmpeg")
            .args([
                "-i",
                input_path,
                "-f",
                "rawvideo",
                "-pixel_format",
                "gray",
                "-video_size",
                &format!("{}x{}", self.width, self.height),
                "-sws_flags",
                "neighbor",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg - is ffmpeg installed?")?;

        let pulled = child
            .stdout
            .as_mut()
            .context("ffmpeg stdout was not captured")
            .and_then(|stdout| self.read_frames(stdout));
        let frames = match pulled {
            Ok(frames) => frames,
            Err(e) => {
                // Reap the child before surfacing the error.
                child.kill().ok();
                child.wait().ok();
                return Err(e);
            }
        };

        let status = child.wait().context("ffmpeg decode process failed")?;
        if !status.success() {
            anyhow::bail!("ffmpeg decode exited with status: {}", status);
        }

        info!("decoded {} frames", frames.len());
        Ok(frames)
    }

    /// Pull whole rasters from `source` until it cleanly ends, decoding each
    /// into its data bytes.
    fn read_frames(&self, source: &mut impl std::io::Read) -> Result<Vec<Vec<u8>>> {
        let frame_size = self.codec.frame_size();
        let mut frames = Vec::new();
        loop {
            let mut pixels = vec![0u8; frame_size];
            match read_exact_or_eof(source, &mut pixels) {
                Ok(true) => frames.push(self.codec.decode_frame(&pixels)),
                Ok(false) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(frames)
    }
}

/// Read exactly `buf.len()` bytes, returning Ok(false) on clean EOF.
fn read_exact_or_eof(reader: &mut impl std::io::Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "partial frame read",
                ));
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
