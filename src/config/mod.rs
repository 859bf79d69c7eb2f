use thiserror::Error;

/// Packet magic, the first four bytes of every packet header.
pub const MAGIC: [u8; 4] = *b"MVYT";

/// Version byte for the 40-byte legacy header.
pub const PACKET_VERSION_V1: u8 = 1;
/// Version byte for the 44-byte extended header.
pub const PACKET_VERSION_V2: u8 = 2;

/// Header lengths, selected purely by the version byte.
pub const PACKET_HEADER_V1: usize = 40;
pub const PACKET_HEADER_V2: usize = 44;

// Video parameters
pub const DEFAULT_FRAME_WIDTH: u32 = 3840;
pub const DEFAULT_FRAME_HEIGHT: u32 = 2160;
pub const DEFAULT_FPS: u32 = 30;
pub const BLOCK_SIZE: usize = 8;
pub const DEFAULT_BITS_PER_BLOCK: usize = 1;
pub const DEFAULT_COEFFICIENT_STRENGTH: f64 = 150.0;

// Data parameters
pub const DEFAULT_CHUNK_SIZE: usize = 1_048_576; // 1 MiB
pub const DEFAULT_SYMBOL_SIZE: usize = 256;
pub const DEFAULT_REPAIR_OVERHEAD: f64 = 1.0; // 100% redundancy

// Encryption overhead: 16-byte poly1305 tag appended to each chunk.
// The exact ciphertext length travels in the packet header, so no
// length prefix is stored in the chunk itself.
pub const AEAD_TAG_SIZE: usize = 16;
pub const ENCRYPTION_OVERHEAD: usize = AEAD_TAG_SIZE;

// File ID size
pub const FILE_ID_SIZE: usize = 16;

// Nonce size for XChaCha20-Poly1305
pub const NONCE_SIZE: usize = 24;

// Argon2id parameters
pub const ARGON2_MEM_COST: u32 = 65536; // 64 MiB
pub const ARGON2_TIME_COST: u32 = 3;
pub const ARGON2_PARALLELISM: u32 = 4;
pub const ARGON2_OUTPUT_LEN: usize = 32;

// Packet flag bits
pub const FLAG_REPAIR_SYMBOL: u8 = 0x01;
pub const FLAG_LAST_CHUNK: u8 = 0x02;
pub const FLAG_ENCRYPTED: u8 = 0x04;

/// DCT coefficient positions carrying payload bits, one per bit index.
/// Bit 0 (the most significant of a block's pattern) uses the first entry.
pub const EMBED_POSITIONS: [(usize, usize); 4] = [(0, 1), (1, 0), (1, 1), (0, 2)];

/// Largest supported `bits_per_block`; bounded by the embed position list.
pub const MAX_BITS_PER_BLOCK: usize = EMBED_POSITIONS.len();

/// Compute the number of 8x8 blocks in a frame.
pub fn blocks_per_frame(width: u32, height: u32) -> usize {
    (width as usize / BLOCK_SIZE) * (height as usize / BLOCK_SIZE)
}

/// Compute how many whole data bytes fit in a single frame.
pub fn bytes_per_frame(width: u32, height: u32, bits_per_block: usize) -> usize {
    blocks_per_frame(width, height) * bits_per_block / 8
}

/// Compute the maximum chunk size when encryption is enabled.
pub fn chunk_size_for_encryption(chunk_size: usize) -> usize {
    chunk_size - ENCRYPTION_OVERHEAD
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("frame dimensions {width}x{height} must be nonzero multiples of 8")]
    BadFrameDimensions { width: u32, height: u32 },
    #[error("bits_per_block must be 1, 2 or 4, got {0}")]
    UnsupportedBitsPerBlock(usize),
    #[error("coefficient strength must be positive and finite, got {0}")]
    BadStrength(f64),
    #[error(
        "coefficient strength {strength} cannot round-trip pattern {pattern:#x} \
         (clamping or quantization collision); adjust it"
    )]
    DestructiveStrength { strength: f64, pattern: u8 },
    #[error("symbol size must be in 1..=65535, got {0}")]
    BadSymbolSize(usize),
    #[error("chunk size must be larger than the {ENCRYPTION_OVERHEAD}-byte encryption overhead, got {0}")]
    BadChunkSize(usize),
    #[error("chunk size {chunk_size} holds too many {symbol_size}-byte symbols for a u16 ESI")]
    ChunkTooLarge {
        chunk_size: usize,
        symbol_size: usize,
    },
    #[error("repair overhead must be in (0.0, 1.0], got {0}")]
    BadRepairOverhead(f64),
}

/// Runtime configuration for an encode/decode operation.
#[derive(Debug, Clone)]
pub struct FramevaultConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: u32,
    pub bits_per_block: usize,
    pub coefficient_strength: f64,
    pub chunk_size: usize,
    pub symbol_size: usize,
    pub repair_overhead: f64,
}

impl Default for FramevaultConfig {
    fn default() -> Self {
        Self {
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            fps: DEFAULT_FPS,
            bits_per_block: DEFAULT_BITS_PER_BLOCK,
            coefficient_strength: DEFAULT_COEFFICIENT_STRENGTH,
            chunk_size: DEFAULT_CHUNK_SIZE,
            symbol_size: DEFAULT_SYMBOL_SIZE,
            repair_overhead: DEFAULT_REPAIR_OVERHEAD,
        }
    }
}

impl FramevaultConfig {
    /// Check every tunable before any table is built or any frame rendered.
    ///
    /// This covers the cheap structural rules. The expensive check, that the
    /// coefficient strength survives clamping for every bit pattern, runs
    /// when the block tables are built and reports
    /// [`ConfigError::DestructiveStrength`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = self.frame_width;
        let h = self.frame_height;
        if w == 0 || h == 0 || w as usize % BLOCK_SIZE != 0 || h as usize % BLOCK_SIZE != 0 {
            return Err(ConfigError::BadFrameDimensions {
                width: w,
                height: h,
            });
        }
        // 8 must divide evenly into whole blocks per byte.
        if !matches!(self.bits_per_block, 1 | 2 | 4) {
            return Err(ConfigError::UnsupportedBitsPerBlock(self.bits_per_block));
        }
        if !self.coefficient_strength.is_finite() || self.coefficient_strength <= 0.0 {
            return Err(ConfigError::BadStrength(self.coefficient_strength));
        }
        if self.symbol_size == 0 || self.symbol_size > u16::MAX as usize {
            return Err(ConfigError::BadSymbolSize(self.symbol_size));
        }
        // Leave room for the AEAD tag when encryption shrinks the plaintext
        // slice, and keep the chunker's ceiling division well defined.
        if self.chunk_size <= ENCRYPTION_OVERHEAD {
            return Err(ConfigError::BadChunkSize(self.chunk_size));
        }
        // Source + repair ESIs must both fit a u16; repair count never
        // exceeds the source count, so 2k is the bound.
        let k = ((self.chunk_size + self.symbol_size - 1) / self.symbol_size).max(1);
        if 2 * k > u16::MAX as usize {
            return Err(ConfigError::ChunkTooLarge {
                chunk_size: self.chunk_size,
                symbol_size: self.symbol_size,
            });
        }
        if !(self.repair_overhead > 0.0 && self.repair_overhead <= 1.0) {
            return Err(ConfigError::BadRepairOverhead(self.repair_overhead));
        }
        Ok(())
    }
}
