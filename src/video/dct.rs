use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::config::{self, ConfigError};

/// The 8x8 DCT-II cosine table: `values[i][j] = cos((2i+1) * j * pi / 16)`.
pub struct CosineTable {
    pub values: [[f64; 8]; 8],
}

static COSINE_TABLE: OnceLock<CosineTable> = OnceLock::new();

/// Process-wide cosine table, computed exactly once on first use.
pub fn cosine_table() -> &'static CosineTable {
    COSINE_TABLE.get_or_init(|| {
        let mut values = [[0.0f64; 8]; 8];
        for (i, row) in values.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = ((2 * i + 1) as f64 * j as f64 * PI / 16.0).cos();
            }
        }
        CosineTable { values }
    })
}

/// DCT-II normalization factor.
fn alpha(u: usize) -> f64 {
    if u == 0 {
        1.0 / 2.0f64.sqrt()
    } else {
        1.0
    }
}

/// Precomputed pixel patterns and bit projections for one codec configuration.
///
/// Encoding an n-bit pattern is a table lookup into `patterns`; decoding
/// projects the raw pixels onto each bit's basis image and takes the sign.
pub struct BlockTables {
    bits_per_block: usize,
    /// One clamped 8x8 pixel block per n-bit pattern value (2^n entries).
    patterns: Vec<[u8; 64]>,
    /// Unscaled basis image per bit, MSB first.
    projections: Vec<[f64; 64]>,
}

impl BlockTables {
    /// Build the pattern and projection tables for `bits_per_block` data bits
    /// embedded at `coefficient_strength`. Every pattern is round-tripped
    /// through decode before the tables are handed out, so a strength that
    /// clamps or quantizes a pattern into ambiguity is rejected here rather
    /// than surfacing as corrupt frames later.
    pub fn new(bits_per_block: usize, coefficient_strength: f64) -> Result<Self, ConfigError> {
        if !matches!(bits_per_block, 1 | 2 | 4) {
            return Err(ConfigError::UnsupportedBitsPerBlock(bits_per_block));
        }
        if !coefficient_strength.is_finite() || coefficient_strength <= 0.0 {
            return Err(ConfigError::BadStrength(coefficient_strength));
        }

        let cos = &cosine_table().values;

        // Inverse transform of a block whose only nonzero coefficient is the
        // DC term of a uniform 128 image. The result is flat mid-gray.
        let dc_value = 0.25 * alpha(0) * alpha(0) * 64.0 * 128.0;
        let mut dc_image = [0.0f64; 64];
        for x in 0..8 {
            for y in 0..8 {
                dc_image[x * 8 + y] = 0.25 * alpha(0) * alpha(0) * dc_value * cos[x][0] * cos[y][0];
            }
        }

        // Scaled basis image for each embedded bit.
        let mut bases = vec![[0.0f64; 64]; bits_per_block];
        for (b, basis) in bases.iter_mut().enumerate() {
            let (u, v) = config::EMBED_POSITIONS[b];
            let scale = 0.25 * alpha(u) * alpha(v) * coefficient_strength;
            for x in 0..8 {
                for y in 0..8 {
                    basis[x * 8 + y] = scale * cos[x][u] * cos[y][v];
                }
            }
        }

        // One pixel block per pattern value: DC background plus or minus each
        // bit's basis image, clamped to the pixel range.
        let pattern_count = 1usize << bits_per_block;
        let mut patterns = Vec::with_capacity(pattern_count);
        for pattern in 0..pattern_count {
            let mut block = [0u8; 64];
            for (i, pixel) in block.iter_mut().enumerate() {
                let mut value = dc_image[i];
                for (b, basis) in bases.iter().enumerate() {
                    // MSB of the pattern is bit 0 of the embed order.
                    if (pattern >> (bits_per_block - 1 - b)) & 1 == 1 {
                        value += basis[i];
                    } else {
                        value -= basis[i];
                    }
                }
                *pixel = value.clamp(0.0, 255.0).round() as u8;
            }
            patterns.push(block);
        }

        // Projection per bit. Strength and DCT scale factors only stretch the
        // dot product, so the unscaled cosine product is enough for the sign.
        let mut projections = Vec::with_capacity(bits_per_block);
        for b in 0..bits_per_block {
            let (u, v) = config::EMBED_POSITIONS[b];
            let mut proj = [0.0f64; 64];
            for x in 0..8 {
                for y in 0..8 {
                    proj[x * 8 + y] = cos[x][u] * cos[y][v];
                }
            }
            projections.push(proj);
        }

        let tables = Self {
            bits_per_block,
            patterns,
            projections,
        };

        for pattern in 0..pattern_count as u8 {
            if tables.decode_block(&tables.patterns[pattern as usize]) != pattern {
                return Err(ConfigError::DestructiveStrength {
                    strength: coefficient_strength,
                    pattern,
                });
            }
        }

        Ok(tables)
    }

    pub fn bits_per_block(&self) -> usize {
        self.bits_per_block
    }

    /// The pixel block carrying `pattern`. The caller guarantees the pattern
    /// fits in `bits_per_block` bits.
    pub fn encode_block(&self, pattern: u8) -> &[u8; 64] {
        &self.patterns[pattern as usize]
    }

    /// Recover the n-bit pattern from an 8x8 pixel block, MSB first. Each bit
    /// is the sign of the block's dot product with that bit's basis image.
    pub fn decode_block(&self, block: &[u8; 64]) -> u8 {
        let mut pattern = 0u8;
        for proj in &self.projections {
            let mut dot = 0.0f64;
            for i in 0..64 {
                dot += block[i] as f64 * proj[i];
            }
            pattern = (pattern << 1) | if dot > 0.0 { 1 } else { 0 };
        }
        pattern
    }
}
