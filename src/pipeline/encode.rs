use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;

use crate::chunker::{self, Chunk};
use crate::config::{self, FramevaultConfig};
use crate::crypto::{self, SessionKey};
use crate::fountain;
use crate::packet;
use crate::video::dct::BlockTables;
use crate::video::encoder::VideoEncoder;

/// Full encode pipeline: file -> chunks -> [encrypt] -> fountain -> packets
/// -> frames -> video.
pub fn encode_file(
    input_path: &Path,
    output_path: &str,
    password: Option<&str>,
    cfg: &FramevaultConfig,
) -> Result<()> {
    cfg.validate()?;
    let tables = Arc::new(BlockTables::new(
        cfg.bits_per_block,
        cfg.coefficient_strength,
    )?);
    let encoder = VideoEncoder::new(cfg, Arc::clone(&tables))?;

    let file_id = crypto::generate_file_id();
    let key = match password {
        Some(pw) => Some(SessionKey::derive(pw.as_bytes(), &file_id)?),
        None => None,
    };

    // Encrypted chunks grow by the AEAD tag; shrink the plaintext slices so
    // the ciphertext still fits the configured chunk size.
    let chunk_size = if key.is_some() {
        config::chunk_size_for_encryption(cfg.chunk_size)
    } else {
        cfg.chunk_size
    };

    info!("chunking input file: {}", input_path.display());
    let chunks =
        chunker::chunk_file(input_path, chunk_size).context("failed to chunk input file")?;
    info!("split into {} chunks", chunks.len());

    let packets = build_packets(&chunks, &file_id, key.as_ref(), cfg)?;
    info!("serialized {} packets", packets.len());

    let frames = pack_frames(packets, encoder.bytes_per_frame())?;
    encoder.encode_to_file(output_path, &frames)?;

    info!("encode complete: {}", output_path);
    Ok(())
}

/// Encrypt (when a key is given) and fountain-encode every chunk, then wrap
/// each symbol as one wire packet. Chunks are independent, so they are
/// processed in parallel.
pub(crate) fn build_packets(
    chunks: &[Chunk],
    file_id: &[u8; config::FILE_ID_SIZE],
    key: Option<&SessionKey>,
    cfg: &FramevaultConfig,
) -> Result<Vec<Vec<u8>>> {
    let parity_group = fountain::parity_group_size(cfg.repair_overhead);

    let progress = ProgressBar::new(chunks.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks ({eta})")
            .unwrap()
            .progress_chars("##-"),
    );

    let per_chunk: Vec<Vec<Vec<u8>>> = chunks
        .par_iter()
        .map(|chunk| -> Result<Vec<Vec<u8>>> {
            let chunk_data = match key {
                Some(k) => crypto::encrypt_chunk(k, file_id, chunk.index, &chunk.data)
                    .with_context(|| format!("failed to encrypt chunk {}", chunk.index))?,
                None => chunk.data.clone(),
            };

            let symbols = fountain::encode_chunk(&chunk_data, cfg.symbol_size, cfg.repair_overhead)
                .with_context(|| format!("failed to fountain-encode chunk {}", chunk.index))?;

            let mut flags = 0u8;
            if key.is_some() {
                flags |= config::FLAG_ENCRYPTED;
            }
            if chunk.is_last {
                flags |= config::FLAG_LAST_CHUNK;
            }

            let chunk_packets = symbols
                .iter()
                .map(|sym| {
                    let mut sym_flags = flags;
                    if sym.is_repair {
                        sym_flags |= config::FLAG_REPAIR_SYMBOL;
                    }
                    packet::serialize_packet(
                        file_id,
                        chunk.index,
                        chunk_data.len() as u32,
                        cfg.symbol_size as u16,
                        sym.esi,
                        parity_group,
                        chunk.data.len() as u32,
                        sym_flags,
                        &sym.data,
                    )
                })
                .collect();

            progress.inc(1);
            Ok(chunk_packets)
        })
        .collect::<Result<_>>()?;

    progress.finish_and_clear();
    Ok(per_chunk.into_iter().flatten().collect())
}

/// Pack serialized packets into frame-sized buffers. Packets never span a
/// frame boundary and each frame tail is zero-padded, so losing a frame
/// loses whole packets and nothing else.
pub(crate) fn pack_frames(packets: Vec<Vec<u8>>, bytes_per_frame: usize) -> Result<Vec<Vec<u8>>> {
    let packet_len = match packets.first() {
        Some(p) => p.len(),
        None => return Ok(Vec::new()),
    };
    let per_frame = bytes_per_frame / packet_len;
    if per_frame == 0 {
        anyhow::bail!(
            "one frame carries {} bytes, too small for a {}-byte packet; \
             grow the frame or shrink the symbol size",
            bytes_per_frame,
            packet_len
        );
    }

    let frames = packets
        .chunks(per_frame)
        .map(|group| {
            let mut buf = Vec::with_capacity(bytes_per_frame);
            for pkt in group {
                buf.extend_from_slice(pkt);
            }
            buf.resize(bytes_per_frame, 0);
            buf
        })
        .collect();
    Ok(frames)
}
