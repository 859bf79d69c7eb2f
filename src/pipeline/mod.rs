pub mod decode;
pub mod encode;
pub mod hook;

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::FramevaultConfig;
use crate::integrity;
use hook::PipelineHook;

/// Result of a full encode -> hook -> decode roundtrip.
pub struct RoundtripResult {
    /// SHA-256 hex digest of the original input file.
    pub original_hash: String,
    /// SHA-256 hex digest of the decoded output file.
    pub decoded_hash: String,
    /// `true` if the hashes match (lossless round-trip).
    pub matched: bool,
}

/// Run a full encode -> hook -> decode roundtrip.
///
/// Steps:
/// 1. SHA-256 hashes `input`.
/// 2. Encodes `input` -> `encoded_path`.
/// 3. Calls `hook.after_encode(encoded_path)`; any remote round-trip of the
///    video happens there.
/// 4. Decodes the path returned by the hook -> `output`.
/// 5. SHA-256 hashes `output` and compares with the original.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use framevault::{roundtrip, FramevaultConfig, NoopHook};
///
/// let result = roundtrip(
///     Path::new("input.txt"),
///     "encoded.mkv",
///     Path::new("output.txt"),
///     Some("my-password"),
///     &FramevaultConfig::default(),
///     &NoopHook,
/// ).unwrap();
///
/// assert!(result.matched, "round-trip failed: {} != {}", result.original_hash, result.decoded_hash);
/// ```
pub fn roundtrip<H: PipelineHook>(
    input: &Path,
    encoded_path: &str,
    output: &Path,
    password: Option<&str>,
    cfg: &FramevaultConfig,
    hook: &H,
) -> Result<RoundtripResult> {
    let original_hash = integrity::sha256_file(input)?.to_hex();

    encode::encode_file(input, encoded_path, password, cfg)?;

    let decode_from = hook.after_encode(Path::new(encoded_path))?;
    let decode_path = decode_from
        .to_str()
        .context("hook returned a non-UTF-8 path")?;
    decode::decode_file(decode_path, output, password, cfg)?;

    let decoded_hash = integrity::sha256_file(output)?.to_hex();
    let matched = original_hash == decoded_hash;

    Ok(RoundtripResult {
        original_hash,
        decoded_hash,
        matched,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chunker;
    use crate::config;
    use crate::crypto::{self, SessionKey};
    use crate::packet;
    use crate::video::dct::BlockTables;
    use crate::video::frame::FrameCodec;

    fn test_config() -> FramevaultConfig {
        FramevaultConfig {
            frame_width: 640,
            frame_height: 480,
            fps: 30,
            bits_per_block: 1,
            coefficient_strength: config::DEFAULT_COEFFICIENT_STRENGTH,
            chunk_size: 512,
            symbol_size: 64,
            repair_overhead: 1.0,
        }
    }

    fn sample_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 131 + i / 7) % 256) as u8).collect()
    }

    /// bytes -> packets -> frames -> pixels -> frames -> packets -> bytes,
    /// exercising everything except the video container.
    fn pixel_roundtrip(
        data: &[u8],
        encode_password: Option<&str>,
        decode_password: Option<&str>,
        cfg: &FramevaultConfig,
        drop_frame: Option<usize>,
    ) -> Result<Vec<u8>> {
        cfg.validate()?;
        let tables = Arc::new(BlockTables::new(
            cfg.bits_per_block,
            cfg.coefficient_strength,
        )?);
        let codec = FrameCodec::new(cfg.frame_width, cfg.frame_height, tables)?;

        let file_id = crypto::generate_file_id();
        let key = match encode_password {
            Some(pw) => Some(SessionKey::derive(pw.as_bytes(), &file_id)?),
            None => None,
        };
        let chunk_size = if key.is_some() {
            config::chunk_size_for_encryption(cfg.chunk_size)
        } else {
            cfg.chunk_size
        };
        let chunks = chunker::chunk_bytes(data, chunk_size);
        let packets = encode::build_packets(&chunks, &file_id, key.as_ref(), cfg)?;
        let frames = encode::pack_frames(packets, codec.bytes_per_frame())?;

        let mut received = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            if drop_frame == Some(i) {
                continue;
            }
            let pixels = codec.encode_frame(frame);
            received.push(codec.decode_frame(&pixels));
        }

        let scanned = decode::scan_frames(&received);
        decode::assemble_file(&scanned, decode_password)
    }

    #[test]
    fn end_to_end_plain() {
        let cfg = test_config();
        let data = sample_bytes(2000);
        let out = pixel_roundtrip(&data, None, None, &cfg, None).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn end_to_end_encrypted() {
        let cfg = test_config();
        let data = sample_bytes(1700);
        let out = pixel_roundtrip(&data, Some("hunter2"), Some("hunter2"), &cfg, None).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn end_to_end_empty_input() {
        let cfg = test_config();
        assert!(pixel_roundtrip(&[], None, None, &cfg, None)
            .unwrap()
            .is_empty());
        assert!(pixel_roundtrip(&[], Some("pw"), Some("pw"), &cfg, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn end_to_end_survives_a_lost_frame() {
        // Full repair overhead: every source symbol has a duplicate far
        // enough away that one missing frame never removes both copies.
        let cfg = test_config();
        let data = sample_bytes(2000);
        let out = pixel_roundtrip(&data, None, None, &cfg, Some(1)).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn end_to_end_wider_blocks() {
        let mut cfg = test_config();
        cfg.bits_per_block = 4;
        cfg.symbol_size = 100;
        let data = sample_bytes(3000);
        let out = pixel_roundtrip(&data, None, None, &cfg, None).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let cfg = test_config();
        let data = sample_bytes(600);
        assert!(pixel_roundtrip(&data, Some("right"), Some("wrong"), &cfg, None).is_err());
        let err = pixel_roundtrip(&data, Some("right"), None, &cfg, None).unwrap_err();
        assert!(err.to_string().contains("password required"));
    }

    #[test]
    fn frame_too_small_for_one_packet_is_rejected() {
        let mut cfg = test_config();
        cfg.frame_width = 64;
        cfg.frame_height = 64;
        let err = pixel_roundtrip(&sample_bytes(100), None, None, &cfg, None).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn losing_every_copy_of_a_chunk_is_an_error() {
        let cfg = test_config();
        // Three chunks; chunk 0's packets all sit in the first four frames.
        // Dropping those frames must fail loudly, not emit a short file.
        let data = sample_bytes(1200);
        let tables =
            Arc::new(BlockTables::new(cfg.bits_per_block, cfg.coefficient_strength).unwrap());
        let codec = FrameCodec::new(cfg.frame_width, cfg.frame_height, tables).unwrap();
        let file_id = crypto::generate_file_id();
        let chunks = chunker::chunk_bytes(&data, cfg.chunk_size);
        assert_eq!(chunks.len(), 3);
        let packets = encode::build_packets(&chunks, &file_id, None, &cfg).unwrap();
        let frames = encode::pack_frames(packets, codec.bytes_per_frame()).unwrap();

        let received: Vec<Vec<u8>> = frames
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= 4)
            .map(|(_, frame)| codec.decode_frame(&codec.encode_frame(frame)))
            .collect();
        let scanned = decode::scan_frames(&received);
        let err = decode::assemble_file(&scanned, None).unwrap_err();
        assert!(err.to_string().contains("completely lost"));
    }

    #[test]
    fn zero_symbol_size_packet_never_reaches_recovery() {
        // A CRC-valid header can still declare a zero symbol size; the scan
        // has to shed it before the FEC layer divides by it.
        let forged = packet::serialize_packet(
            &[7u8; 16],
            0,
            100,
            0,
            0,
            1,
            100,
            config::FLAG_LAST_CHUNK,
            &[],
        );
        let scanned = decode::scan_frames(&[forged]);
        assert!(scanned.is_empty());
        assert!(decode::assemble_file(&scanned, None).is_err());
    }

    #[test]
    fn forged_last_chunk_index_fails_fast() {
        // A stray last-chunk header claiming an enormous index must yield
        // the lost-chunks error without walking the whole nominal range.
        let cfg = test_config();
        let file_id = [9u8; 16];
        let chunks = chunker::chunk_bytes(&sample_bytes(600), cfg.chunk_size);
        let mut packets = encode::build_packets(&chunks, &file_id, None, &cfg).unwrap();
        packets.push(packet::serialize_packet(
            &file_id,
            u32::MAX,
            cfg.symbol_size as u32,
            cfg.symbol_size as u16,
            0,
            1,
            cfg.symbol_size as u32,
            config::FLAG_LAST_CHUNK,
            &vec![0u8; cfg.symbol_size],
        ));

        let stream = packets.concat();
        let scanned = decode::scan_frames(&[stream]);
        let err = decode::assemble_file(&scanned, None).unwrap_err();
        assert!(err.to_string().contains("completely lost"));
    }

    #[test]
    fn empty_stream_is_an_error() {
        let err = decode::assemble_file(&[], None).unwrap_err();
        assert!(err.to_string().contains("no valid packets"));
    }
}
