use std::sync::Arc;

use rayon::prelude::*;

use crate::config::{self, ConfigError};
use crate::video::dct::BlockTables;

/// Tiles the block codec across a full frame raster.
///
/// One instance serves both the encode and decode paths; the shared
/// `BlockTables` are immutable, so a codec can be used from many threads.
pub struct FrameCodec {
    width: usize,
    height: usize,
    bits_per_block: usize,
    blocks_per_row: usize,
    total_blocks: usize,
    bytes_per_frame: usize,
    tables: Arc<BlockTables>,
}

impl FrameCodec {
    pub fn new(width: u32, height: u32, tables: Arc<BlockTables>) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 || width % 8 != 0 || height % 8 != 0 {
            return Err(ConfigError::BadFrameDimensions { width, height });
        }
        let bits_per_block = tables.bits_per_block();
        let blocks_per_row = width as usize / config::BLOCK_SIZE;
        let total_blocks = blocks_per_row * (height as usize / config::BLOCK_SIZE);
        Ok(Self {
            width: width as usize,
            height: height as usize,
            bits_per_block,
            blocks_per_row,
            total_blocks,
            bytes_per_frame: total_blocks * bits_per_block / 8,
            tables,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.width * self.height
    }

    /// Whole data bytes one frame can carry.
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_frame
    }

    /// Render `data` into a grayscale frame, row-major block order, MSB-first
    /// within each byte. Blocks past the end of the data stay mid-gray.
    pub fn encode_frame(&self, data: &[u8]) -> Vec<u8> {
        let mut pixels = vec![128u8; self.frame_size()];
        let bit_count = data.len() * 8;
        let needed = (bit_count + self.bits_per_block - 1) / self.bits_per_block;
        let active_blocks = self.total_blocks.min(needed);

        // Each band is one row of blocks, so the bands write disjoint pixels.
        let band = self.width * config::BLOCK_SIZE;
        pixels
            .par_chunks_mut(band)
            .enumerate()
            .for_each(|(block_row, band_pixels)| {
                for block_col in 0..self.blocks_per_row {
                    let block_index = block_row * self.blocks_per_row + block_col;
                    if block_index >= active_blocks {
                        return;
                    }

                    let mut pattern = 0u8;
                    for b in 0..self.bits_per_block {
                        let bit_index = block_index * self.bits_per_block + b;
                        pattern <<= 1;
                        if bit_index < bit_count {
                            pattern |= (data[bit_index / 8] >> (7 - bit_index % 8)) & 1;
                        }
                    }

                    let block = self.tables.encode_block(pattern);
                    let px = block_col * config::BLOCK_SIZE;
                    for row in 0..config::BLOCK_SIZE {
                        let offset = row * self.width + px;
                        let block_offset = row * config::BLOCK_SIZE;
                        band_pixels[offset..offset + config::BLOCK_SIZE].copy_from_slice(
                            &block[block_offset..block_offset + config::BLOCK_SIZE],
                        );
                    }
                }
            });

        pixels
    }

    /// Read back every whole byte a frame can carry. Blocks that were never
    /// written decode to arbitrary patterns; the packet layer's magic and CRC
    /// checks weed those bytes out.
    ///
    /// Panics if `pixels` is not exactly one frame's raster.
    pub fn decode_frame(&self, pixels: &[u8]) -> Vec<u8> {
        assert_eq!(
            pixels.len(),
            self.frame_size(),
            "pixel buffer does not match the {}x{} frame",
            self.width,
            self.height
        );

        let blocks_per_byte = 8 / self.bits_per_block;
        (0..self.bytes_per_frame)
            .into_par_iter()
            .map(|byte_index| {
                let mut byte = 0u8;
                for i in 0..blocks_per_byte {
                    let block_index = byte_index * blocks_per_byte + i;
                    let block_row = block_index / self.blocks_per_row;
                    let block_col = block_index % self.blocks_per_row;

                    let px = block_col * config::BLOCK_SIZE;
                    let py = block_row * config::BLOCK_SIZE;
                    let mut block = [0u8; 64];
                    for row in 0..config::BLOCK_SIZE {
                        let offset = (py + row) * self.width + px;
                        let block_offset = row * config::BLOCK_SIZE;
                        block[block_offset..block_offset + config::BLOCK_SIZE]
                            .copy_from_slice(&pixels[offset..offset + config::BLOCK_SIZE]);
                    }

                    byte = (byte << self.bits_per_block) | self.tables.decode_block(&block);
                }
                byte
            })
            .collect()
    }
}
