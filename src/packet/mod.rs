use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::config;
use crate::integrity;

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("bad magic, expected {:?}", config::MAGIC)]
    BadMagic,
    #[error("unsupported packet version {0}")]
    UnsupportedVersion(u8),
    #[error("header declares a zero-length symbol")]
    ZeroSymbolSize,
    #[error("CRC mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    CrcMismatch { stored: u32, computed: u32 },
    #[error("truncated packet: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

// Header field offsets, shared by both versions. The v2 header appends
// `original_size` after the CRC field; everything before it is identical.
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_FLAGS: usize = 5;
const OFF_FILE_ID: usize = 6;
const OFF_CHUNK_INDEX: usize = 22;
const OFF_CHUNK_SIZE: usize = 26;
const OFF_SYMBOL_SIZE: usize = 30;
const OFF_ESI: usize = 32;
const OFF_PARITY_GROUP: usize = 34;
const OFF_CRC: usize = 36;
const OFF_ORIGINAL_SIZE: usize = 40;

/// Parsed packet header fields.
#[derive(Debug, Clone)]
pub struct PacketHeader {
    pub version: u8,
    pub flags: u8,
    pub file_id: [u8; config::FILE_ID_SIZE],
    pub chunk_index: u32,
    /// Length in bytes of the FEC input this symbol belongs to.
    pub chunk_size: u32,
    pub symbol_size: u16,
    /// Encoding symbol id: `esi < k` is a source symbol, `esi >= k` repair.
    pub esi: u16,
    /// Source symbols folded into each repair symbol.
    pub parity_group: u8,
    /// Pre-encryption chunk length. Not carried by v1 headers.
    pub original_size: Option<u32>,
    pub crc: u32,
}

impl PacketHeader {
    pub fn is_repair(&self) -> bool {
        self.flags & config::FLAG_REPAIR_SYMBOL != 0
    }

    pub fn is_last_chunk(&self) -> bool {
        self.flags & config::FLAG_LAST_CHUNK != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & config::FLAG_ENCRYPTED != 0
    }
}

/// A complete packet: header + symbol payload.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

/// Serialize one symbol as a v2 packet. `payload` must be exactly
/// `symbol_size` bytes; short symbols are zero-padded by the FEC layer.
#[allow(clippy::too_many_arguments)]
pub fn serialize_packet(
    file_id: &[u8; config::FILE_ID_SIZE],
    chunk_index: u32,
    chunk_size: u32,
    symbol_size: u16,
    esi: u16,
    parity_group: u8,
    original_size: u32,
    flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    debug_assert_eq!(payload.len(), symbol_size as usize);

    let mut header = vec![0u8; config::PACKET_HEADER_V2];
    header[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(&config::MAGIC);
    header[OFF_VERSION] = config::PACKET_VERSION_V2;
    header[OFF_FLAGS] = flags;
    header[OFF_FILE_ID..OFF_FILE_ID + config::FILE_ID_SIZE].copy_from_slice(file_id);
    LittleEndian::write_u32(&mut header[OFF_CHUNK_INDEX..], chunk_index);
    LittleEndian::write_u32(&mut header[OFF_CHUNK_SIZE..], chunk_size);
    LittleEndian::write_u16(&mut header[OFF_SYMBOL_SIZE..], symbol_size);
    LittleEndian::write_u16(&mut header[OFF_ESI..], esi);
    header[OFF_PARITY_GROUP] = parity_group;
    LittleEndian::write_u32(&mut header[OFF_ORIGINAL_SIZE..], original_size);

    let crc = integrity::packet_crc32(&header, OFF_CRC, payload);
    LittleEndian::write_u32(&mut header[OFF_CRC..], crc);

    let mut packet_bytes = Vec::with_capacity(header.len() + payload.len());
    packet_bytes.extend_from_slice(&header);
    packet_bytes.extend_from_slice(payload);
    packet_bytes
}

/// Parse one packet from the front of `data`. Returns the packet and the
/// number of bytes it occupied.
pub fn deserialize_packet(data: &[u8]) -> Result<(Packet, usize), PacketError> {
    if data.len() < config::PACKET_HEADER_V1 {
        return Err(PacketError::Truncated {
            need: config::PACKET_HEADER_V1,
            have: data.len(),
        });
    }
    if data[OFF_MAGIC..OFF_MAGIC + 4] != config::MAGIC {
        return Err(PacketError::BadMagic);
    }

    let version = data[OFF_VERSION];
    let header_len = match version {
        config::PACKET_VERSION_V1 => config::PACKET_HEADER_V1,
        config::PACKET_VERSION_V2 => config::PACKET_HEADER_V2,
        other => return Err(PacketError::UnsupportedVersion(other)),
    };
    let symbol_size = LittleEndian::read_u16(&data[OFF_SYMBOL_SIZE..]);
    let packet_len = header_len + symbol_size as usize;
    if data.len() < packet_len {
        return Err(PacketError::Truncated {
            need: packet_len,
            have: data.len(),
        });
    }
    // Encoders never emit an empty payload, so a zero size field is
    // corruption no matter what the CRC says.
    if symbol_size == 0 {
        return Err(PacketError::ZeroSymbolSize);
    }

    let header_bytes = &data[..header_len];
    let payload = &data[header_len..packet_len];
    let stored = LittleEndian::read_u32(&header_bytes[OFF_CRC..]);
    let computed = integrity::packet_crc32(header_bytes, OFF_CRC, payload);
    if computed != stored {
        return Err(PacketError::CrcMismatch { stored, computed });
    }

    let mut file_id = [0u8; config::FILE_ID_SIZE];
    file_id.copy_from_slice(&header_bytes[OFF_FILE_ID..OFF_FILE_ID + config::FILE_ID_SIZE]);
    let original_size = if version == config::PACKET_VERSION_V2 {
        Some(LittleEndian::read_u32(&header_bytes[OFF_ORIGINAL_SIZE..]))
    } else {
        None
    };

    let header = PacketHeader {
        version,
        flags: header_bytes[OFF_FLAGS],
        file_id,
        chunk_index: LittleEndian::read_u32(&header_bytes[OFF_CHUNK_INDEX..]),
        chunk_size: LittleEndian::read_u32(&header_bytes[OFF_CHUNK_SIZE..]),
        symbol_size,
        esi: LittleEndian::read_u16(&header_bytes[OFF_ESI..]),
        parity_group: header_bytes[OFF_PARITY_GROUP],
        original_size,
        crc: stored,
    };

    Ok((
        Packet {
            header,
            payload: payload.to_vec(),
        },
        packet_len,
    ))
}

/// How a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    /// No magic at the cursor: the packed region of the buffer is over.
    Ended,
    /// A packet started but ran off the end of the buffer.
    Truncated { need: usize, have: usize },
}

/// Result of scanning one byte buffer for packets.
#[derive(Debug)]
pub struct ScanReport {
    pub packets: Vec<Packet>,
    /// Offset of the byte after the last packet boundary the scan reached.
    pub consumed: usize,
    /// Packets skipped because their CRC did not match.
    pub dropped: usize,
    pub end: ScanEnd,
}

/// Walk `data` from `start`, parsing back-to-back packets until the magic
/// stops matching. Corrupt packets are skipped by their declared length;
/// a packet cut off by the end of the buffer stops the scan with
/// `ScanEnd::Truncated` so the caller can decide whether more bytes exist.
pub fn scan_packets(data: &[u8], start: usize) -> ScanReport {
    let mut packets = Vec::new();
    let mut offset = start.min(data.len());
    let mut dropped = 0usize;

    let end = loop {
        let remaining = &data[offset..];
        if remaining.len() < 4 || remaining[..4] != config::MAGIC {
            break ScanEnd::Ended;
        }
        match deserialize_packet(remaining) {
            Ok((packet, consumed)) => {
                packets.push(packet);
                offset += consumed;
            }
            Err(PacketError::CrcMismatch { .. } | PacketError::ZeroSymbolSize) => {
                // The length fields already passed the bounds check, so step
                // over the damaged packet and keep scanning.
                match declared_packet_len(remaining) {
                    Some(len) => {
                        dropped += 1;
                        offset += len;
                    }
                    None => break ScanEnd::Ended,
                }
            }
            Err(PacketError::Truncated { need, have }) => break ScanEnd::Truncated { need, have },
            Err(_) => break ScanEnd::Ended,
        }
    };

    ScanReport {
        packets,
        consumed: offset,
        dropped,
        end,
    }
}

fn declared_packet_len(data: &[u8]) -> Option<usize> {
    let header_len = match *data.get(OFF_VERSION)? {
        config::PACKET_VERSION_V1 => config::PACKET_HEADER_V1,
        config::PACKET_VERSION_V2 => config::PACKET_HEADER_V2,
        _ => return None,
    };
    if data.len() < OFF_SYMBOL_SIZE + 2 {
        return None;
    }
    Some(header_len + LittleEndian::read_u16(&data[OFF_SYMBOL_SIZE..]) as usize)
}
