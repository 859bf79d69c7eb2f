use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::FramevaultConfig;
use crate::crypto::{self, SessionKey};
use crate::fountain;
use crate::packet::{self, Packet, ScanEnd};
use crate::video::dct::BlockTables;
use crate::video::decoder::VideoDecoder;

/// Full decode pipeline: video -> frames -> packets -> fountain recover ->
/// [decrypt] -> reassembled file.
pub fn decode_file(
    input_path: &str,
    output_path: &Path,
    password: Option<&str>,
    cfg: &FramevaultConfig,
) -> Result<()> {
    cfg.validate()?;
    let tables = Arc::new(BlockTables::new(
        cfg.bits_per_block,
        cfg.coefficient_strength,
    )?);
    let decoder = VideoDecoder::new(cfg, tables)?;

    let frames = decoder.decode_from_file(input_path)?;
    let packets = scan_frames(&frames);
    let bytes = assemble_file(&packets, password)?;

    info!("writing {} bytes to {}", bytes.len(), output_path.display());
    let mut outfile = File::create(output_path).context("failed to create output file")?;
    outfile
        .write_all(&bytes)
        .context("failed to write output data")?;
    outfile.flush()?;

    info!("decode complete: {}", output_path.display());
    Ok(())
}

/// Scan every frame buffer independently for packets. Corrupt packets and
/// unreadable frame tails are dropped here; whatever survives goes to the
/// FEC layer, which decides whether enough arrived.
pub(crate) fn scan_frames(frames: &[Vec<u8>]) -> Vec<Packet> {
    let mut packets = Vec::new();
    let mut dropped = 0usize;
    let mut truncated_frames = 0usize;

    for frame in frames {
        let report = packet::scan_packets(frame, 0);
        packets.extend(report.packets);
        dropped += report.dropped;
        if let ScanEnd::Truncated { .. } = report.end {
            truncated_frames += 1;
        }
    }

    if dropped > 0 {
        warn!("dropped {} corrupt packets", dropped);
    }
    if truncated_frames > 0 {
        // Packets are never split across frames on encode, so a truncated
        // frame means damaged length fields or a config mismatch.
        warn!("{} frames ended mid-packet", truncated_frames);
    }
    info!(
        "recovered {} packets from {} frames",
        packets.len(),
        frames.len()
    );
    packets
}

struct ChunkMeta {
    chunk_size: u32,
    original_size: Option<u32>,
    symbol_size: u16,
    parity_group: u8,
    is_last: bool,
}

/// Group packets by chunk, fountain-recover and decrypt each chunk, and
/// concatenate them in order.
pub(crate) fn assemble_file(packets: &[Packet], password: Option<&str>) -> Result<Vec<u8>> {
    if packets.is_empty() {
        anyhow::bail!("no valid packets found in video");
    }

    let file_id = packets[0].header.file_id;
    let encrypted = packets[0].header.is_encrypted();

    let key = if encrypted {
        let pw = password.ok_or_else(|| anyhow::anyhow!("file is encrypted, password required"))?;
        Some(SessionKey::derive(pw.as_bytes(), &file_id)?)
    } else {
        if password.is_some() {
            warn!("stream is not encrypted, ignoring the provided password");
        }
        None
    };

    let mut chunk_packets: HashMap<u32, Vec<&Packet>> = HashMap::new();
    let mut chunk_meta: HashMap<u32, ChunkMeta> = HashMap::new();
    let mut foreign = 0usize;
    for pkt in packets {
        if pkt.header.file_id != file_id {
            foreign += 1;
            continue;
        }
        let ci = pkt.header.chunk_index;
        chunk_packets.entry(ci).or_default().push(pkt);
        chunk_meta.entry(ci).or_insert(ChunkMeta {
            chunk_size: pkt.header.chunk_size,
            original_size: pkt.header.original_size,
            symbol_size: pkt.header.symbol_size,
            parity_group: pkt.header.parity_group,
            is_last: pkt.header.is_last_chunk(),
        });
    }
    if foreign > 0 {
        warn!("ignored {} packets from a different file id", foreign);
    }

    // The last-chunk flag tells us how many chunks there should be; a whole
    // chunk whose every packet was lost would otherwise vanish silently.
    let last_index = chunk_meta
        .iter()
        .filter(|(_, m)| m.is_last)
        .map(|(&ci, _)| ci)
        .max()
        .ok_or_else(|| anyhow::anyhow!("stream tail missing: no last-chunk packet found"))?;
    // Look for the first gap instead of materializing every missing index;
    // a forged last-chunk header can claim an index anywhere in the u32
    // range, and the search stops within one step of the chunks we hold.
    if let Some(first_missing) = (0..=last_index).find(|ci| !chunk_packets.contains_key(ci)) {
        let expected = u64::from(last_index) + 1;
        let present = chunk_packets.keys().filter(|&&ci| ci <= last_index).count() as u64;
        anyhow::bail!(
            "{} of {} chunks completely lost (first missing: chunk {})",
            expected - present,
            expected,
            first_missing
        );
    }

    let mut indices: Vec<u32> = chunk_packets.keys().copied().collect();
    indices.sort_unstable();
    info!("recovering {} chunks", indices.len());

    let progress = ProgressBar::new(indices.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.green/black} {pos}/{len} chunks ({eta})")
            .unwrap()
            .progress_chars("##-"),
    );

    let mut decoded: Vec<(u32, Vec<u8>)> = indices
        .par_iter()
        .map(|&ci| -> Result<(u32, Vec<u8>)> {
            let meta = &chunk_meta[&ci];
            let k = fountain::source_symbol_count(meta.chunk_size as usize, meta.symbol_size as usize);

            let mut chunk_decoder =
                fountain::ChunkDecoder::new(k, meta.symbol_size as usize, meta.parity_group);
            for pkt in &chunk_packets[&ci] {
                chunk_decoder.add_symbol(pkt.header.esi, &pkt.payload, pkt.header.is_repair());
            }
            let lost = chunk_decoder.missing_sources();
            if lost > 0 {
                debug!("chunk {}: {} source symbols lost, rebuilding from parity", ci, lost);
            }
            let recovered = chunk_decoder
                .recover(meta.chunk_size as usize)
                .with_context(|| format!("chunk {} cannot be recovered", ci))?;

            let chunk_data = match &key {
                Some(k) => crypto::decrypt_chunk(k, &file_id, ci, &recovered)
                    .with_context(|| format!("failed to decrypt chunk {}", ci))?,
                None => recovered,
            };

            if let Some(original) = meta.original_size {
                if original as usize != chunk_data.len() {
                    warn!(
                        "chunk {}: header claims {} bytes, recovered {}",
                        ci,
                        original,
                        chunk_data.len()
                    );
                }
            }

            progress.inc(1);
            Ok((ci, chunk_data))
        })
        .collect::<Result<_>>()?;
    progress.finish_and_clear();

    decoded.sort_by_key(|(ci, _)| *ci);
    let mut bytes = Vec::new();
    for (_, data) in decoded {
        bytes.extend_from_slice(&data);
    }
    Ok(bytes)
}
