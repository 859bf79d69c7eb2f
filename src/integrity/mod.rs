use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crc::{Crc, CRC_32_MPEG_2};
use sha2::{Digest, Sha256};

/// CRC-32/MPEG-2 calculator (no reflection, no final XOR).
const CRC_MPEG2: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Compute CRC-32/MPEG-2 over a byte slice.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    CRC_MPEG2.checksum(data)
}

/// Compute CRC-32/MPEG-2 with a seed.
///
/// A nonzero seed behaves as if its 4-byte little-endian encoding preceded
/// `data` in the input stream; a zero seed is the plain checksum.
pub fn crc32_mpeg2_seeded(data: &[u8], seed: u32) -> u32 {
    if seed == 0 {
        return crc32_mpeg2(data);
    }
    let mut digest = CRC_MPEG2.digest();
    digest.update(&seed.to_le_bytes());
    digest.update(data);
    digest.finalize()
}

/// Checksum of the logical concatenation `a || b` without materializing it.
pub fn crc32_mpeg2_concat(a: &[u8], b: &[u8]) -> u32 {
    let mut digest = CRC_MPEG2.digest();
    digest.update(a);
    digest.update(b);
    digest.finalize()
}

/// Compute CRC-32/MPEG-2 for a packet: header (with CRC field zeroed) + payload.
pub fn packet_crc32(header: &[u8], crc_field_offset: usize, payload: &[u8]) -> u32 {
    let mut digest = CRC_MPEG2.digest();

    // Feed header bytes before the CRC field
    digest.update(&header[..crc_field_offset]);
    // Feed 4 zero bytes in place of the CRC field
    digest.update(&[0u8; 4]);
    // Feed header bytes after the CRC field (present in v2 headers)
    if crc_field_offset + 4 < header.len() {
        digest.update(&header[crc_field_offset + 4..]);
    }
    // Feed the payload
    digest.update(payload);

    digest.finalize()
}

/// Verify the CRC field in a packet.
pub fn verify_packet_crc(
    header: &[u8],
    crc_field_offset: usize,
    payload: &[u8],
    expected_crc: u32,
) -> bool {
    packet_crc32(header, crc_field_offset, payload) == expected_crc
}

/// A SHA-256 digest with a lowercase-hex rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    /// Lowercase hexadecimal form, 64 characters.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute SHA-256 of a byte slice.
pub fn sha256(data: &[u8]) -> Sha256Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Sha256Digest(digest)
}

/// Compute SHA-256 of a file without loading it whole.
pub fn sha256_file(path: &Path) -> io::Result<Sha256Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Ok(Sha256Digest(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_crc32_mpeg2_known_value() {
        // "123456789" has a well-known CRC-32/MPEG-2 checksum
        let data = b"123456789";
        let crc = crc32_mpeg2(data);
        assert_eq!(crc, 0x0376E6E7);
    }

    #[test]
    fn test_crc32_empty() {
        let crc = crc32_mpeg2(b"");
        assert_eq!(crc, 0xFFFFFFFF);
    }

    #[test]
    fn test_crc32_zero_seed_is_plain() {
        let data = b"some packet bytes";
        assert_eq!(crc32_mpeg2_seeded(data, 0), crc32_mpeg2(data));
    }

    #[test]
    fn test_crc32_seed_prepends_le_bytes() {
        let seed = 0xDEADBEEFu32;
        let data = b"payload";

        let mut prefixed = seed.to_le_bytes().to_vec();
        prefixed.extend_from_slice(data);

        assert_eq!(crc32_mpeg2_seeded(data, seed), crc32_mpeg2(&prefixed));
    }

    #[test]
    fn test_crc32_concat_matches_materialized() {
        let a = b"first half ";
        let b = b"second half";
        let mut joined = a.to_vec();
        joined.extend_from_slice(b);

        assert_eq!(crc32_mpeg2_concat(a, b), crc32_mpeg2(&joined));
        assert_eq!(crc32_mpeg2_concat(b"", b), crc32_mpeg2(b));
        assert_eq!(crc32_mpeg2_concat(a, b""), crc32_mpeg2(a));
    }

    #[test]
    fn test_sha256_known_value() {
        let hash = sha256(b"hello");
        assert_eq!(
            hash.to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(format!("{hash}"), hash.to_hex());
    }

    #[test]
    fn test_sha256_file_matches_in_memory() {
        let dir = std::env::temp_dir().join("framevault_test_integrity");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hashed.bin");

        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&data).unwrap();
        }

        assert_eq!(sha256_file(&path).unwrap(), sha256(&data));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_packet_crc_roundtrip() {
        let header = vec![0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00, 0x09, 0x0A];
        let payload = b"test payload";
        let crc_offset = 4;

        let crc = packet_crc32(&header, crc_offset, payload);
        assert!(verify_packet_crc(&header, crc_offset, payload, crc));
        assert!(!verify_packet_crc(&header, crc_offset, payload, crc ^ 1));
    }

    #[test]
    fn test_packet_crc_covers_bytes_after_field() {
        // Trailing header bytes (v2 metadata) must change the checksum.
        let mut header = vec![0u8; 12];
        header[0] = 0xAB;
        let crc_offset = 4;
        let base = packet_crc32(&header, crc_offset, b"p");

        header[10] ^= 0x01;
        assert_ne!(packet_crc32(&header, crc_offset, b"p"), base);
    }
}
