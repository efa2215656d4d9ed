//! Fixed-precision 4x4 block-transform codec.
//!
//! Stream layout:
//!
//! ```text
//! "FPB1" | width: u32 LE | height: u32 LE | precision: u8 | deflate(blocks)
//! ```
//!
//! Each 4x4 block (edge blocks padded by repeating the last row/column) is
//! written as:
//!
//! 1. one flag bit, 0 for an all-zero block (nothing follows)
//! 2. the block's common exponent, 9 bits, biased by [`EXPONENT_BIAS`]
//! 3. the top `precision` bit planes of the 16 transformed coefficients,
//!    16 bits per plane, most significant plane first
//!
//! Values are quantized to 30-bit integers relative to the block exponent,
//! decorrelated with an integer lifting transform along rows then columns,
//! and mapped to negabinary so that truncating low planes rounds towards
//! zero symmetrically.

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use super::{check_precision, BlockCodec, CodecError, CodecResult};

const MAGIC: &[u8; 4] = b"FPB1";
const HEADER_LEN: usize = 13;
const BLOCK: usize = 4;
const BLOCK_VALUES: usize = BLOCK * BLOCK;
const QUANT_BITS: i32 = 30;
const EXPONENT_BITS: u32 = 9;
/// Added to block exponents so they fit an unsigned field.
pub const EXPONENT_BIAS: i32 = 160;
const NEGABINARY_MASK: u32 = 0xaaaa_aaaa;

/// Coefficient order: low sequency first.
const SEQUENCY_ORDER: [usize; BLOCK_VALUES] = [0, 1, 4, 5, 2, 8, 6, 9, 3, 12, 10, 7, 13, 11, 14, 15];

/// Block-transform codec selected by `CompressionType::Zfp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZfpCodec;

impl BlockCodec for ZfpCodec {
    fn name(&self) -> &'static str {
        "zfp"
    }

    fn compress(&self, data: &[f32], width: usize, height: usize, precision: u32) -> CodecResult<Vec<u8>> {
        check_precision(precision)?;
        if data.len() < width * height {
            return Err(CodecError::ShapeMismatch {
                width,
                height,
                actual: data.len(),
            });
        }
        let w = u32::try_from(width).map_err(|_| CodecError::corrupt("width exceeds u32"))?;
        let h = u32::try_from(height).map_err(|_| CodecError::corrupt("height exceeds u32"))?;

        let mut bits = BitWriter::default();
        let mut block = [0f32; BLOCK_VALUES];
        for by in (0..height).step_by(BLOCK) {
            for bx in (0..width).step_by(BLOCK) {
                gather_block(data, width, height, bx, by, &mut block);
                encode_block(&block, precision, &mut bits);
            }
        }

        let mut out = Vec::with_capacity(HEADER_LEN + width * height / 2);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&w.to_le_bytes());
        out.extend_from_slice(&h.to_le_bytes());
        out.push(precision as u8);

        let mut encoder = DeflateEncoder::new(out, Compression::default());
        encoder.write_all(&bits.finish())?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, bytes: &[u8]) -> CodecResult<(Vec<f32>, usize, usize)> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(CodecError::corrupt("missing stream header"));
        }
        let width = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let height = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let precision = u32::from(bytes[12]);
        check_precision(precision)?;

        let len = width
            .checked_mul(height)
            .ok_or_else(|| CodecError::corrupt(format!("{width}x{height} overflows")))?;

        let mut payload = Vec::new();
        DeflateDecoder::new(&bytes[HEADER_LEN..]).read_to_end(&mut payload)?;

        // every block costs at least its flag bit
        let blocks = width.div_ceil(BLOCK).saturating_mul(height.div_ceil(BLOCK));
        if blocks > payload.len().saturating_mul(8) {
            return Err(CodecError::corrupt(format!(
                "{width}x{height} needs {blocks} blocks, payload holds {} bytes",
                payload.len()
            )));
        }

        let mut reader = BitReader::new(&payload);
        let mut out = vec![0f32; len];
        let mut block = [0f32; BLOCK_VALUES];
        for by in (0..height).step_by(BLOCK) {
            for bx in (0..width).step_by(BLOCK) {
                decode_block(&mut reader, precision, &mut block)?;
                scatter_block(&block, &mut out, width, height, bx, by);
            }
        }
        Ok((out, width, height))
    }
}

fn gather_block(data: &[f32], width: usize, height: usize, bx: usize, by: usize, block: &mut [f32; BLOCK_VALUES]) {
    for j in 0..BLOCK {
        let y = (by + j).min(height - 1);
        for i in 0..BLOCK {
            let x = (bx + i).min(width - 1);
            let v = data[y * width + x];
            block[j * BLOCK + i] = if v.is_finite() { v } else { 0.0 };
        }
    }
}

fn scatter_block(block: &[f32; BLOCK_VALUES], out: &mut [f32], width: usize, height: usize, bx: usize, by: usize) {
    for j in 0..BLOCK.min(height - by) {
        for i in 0..BLOCK.min(width - bx) {
            out[(by + j) * width + bx + i] = block[j * BLOCK + i];
        }
    }
}

/// Exponent `e` with `|v| < 2^e` (frexp convention), for non-zero `v`.
fn exponent(v: f32) -> i32 {
    let bits = f64::from(v).abs().to_bits();
    ((bits >> 52) & 0x7ff) as i32 - 1022
}

fn encode_block(block: &[f32; BLOCK_VALUES], precision: u32, bits: &mut BitWriter) {
    let emax = block
        .iter()
        .filter(|v| **v != 0.0)
        .map(|&v| exponent(v))
        .max();
    let Some(emax) = emax else {
        bits.write(0, 1);
        return;
    };
    bits.write(1, 1);
    bits.write((emax + EXPONENT_BIAS) as u64, EXPONENT_BITS);

    let scale = 2f64.powi(QUANT_BITS - emax);
    let mut ints = [0i64; BLOCK_VALUES];
    for (q, &v) in ints.iter_mut().zip(block) {
        *q = (f64::from(v) * scale) as i64;
    }

    for row in 0..BLOCK {
        fwd_lift(&mut ints, row * BLOCK, 1);
    }
    for col in 0..BLOCK {
        fwd_lift(&mut ints, col, BLOCK);
    }

    let mut coeffs = [0u32; BLOCK_VALUES];
    for (c, &idx) in coeffs.iter_mut().zip(&SEQUENCY_ORDER) {
        *c = to_negabinary(ints[idx] as i32);
    }

    for plane in (32 - precision..32).rev() {
        let mut word = 0u64;
        for (i, c) in coeffs.iter().enumerate() {
            word |= u64::from((c >> plane) & 1) << i;
        }
        bits.write(word, BLOCK_VALUES as u32);
    }
}

fn decode_block(reader: &mut BitReader<'_>, precision: u32, block: &mut [f32; BLOCK_VALUES]) -> CodecResult<()> {
    if reader.read(1)? == 0 {
        block.fill(0.0);
        return Ok(());
    }
    let emax = reader.read(EXPONENT_BITS)? as i32 - EXPONENT_BIAS;

    let mut coeffs = [0u32; BLOCK_VALUES];
    for plane in (32 - precision..32).rev() {
        let word = reader.read(BLOCK_VALUES as u32)?;
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c |= (((word >> i) & 1) as u32) << plane;
        }
    }

    let mut ints = [0i64; BLOCK_VALUES];
    for (&c, &idx) in coeffs.iter().zip(&SEQUENCY_ORDER) {
        ints[idx] = i64::from(from_negabinary(c));
    }

    for col in 0..BLOCK {
        inv_lift(&mut ints, col, BLOCK);
    }
    for row in 0..BLOCK {
        inv_lift(&mut ints, row * BLOCK, 1);
    }

    let scale = 2f64.powi(emax - QUANT_BITS);
    for (v, &q) in block.iter_mut().zip(&ints) {
        *v = (q as f64 * scale) as f32;
    }
    Ok(())
}

/// Forward decorrelating lift of four values at `offset`, `offset + stride`, ...
fn fwd_lift(p: &mut [i64; BLOCK_VALUES], offset: usize, stride: usize) {
    let (mut x, mut y, mut z, mut w) = (
        p[offset],
        p[offset + stride],
        p[offset + 2 * stride],
        p[offset + 3 * stride],
    );

    x += w;
    x >>= 1;
    w -= x;
    z += y;
    z >>= 1;
    y -= z;
    x += z;
    x >>= 1;
    z -= x;
    w += y;
    w >>= 1;
    y -= w;
    w += y >> 1;
    y -= w >> 1;

    p[offset] = x;
    p[offset + stride] = y;
    p[offset + 2 * stride] = z;
    p[offset + 3 * stride] = w;
}

fn inv_lift(p: &mut [i64; BLOCK_VALUES], offset: usize, stride: usize) {
    let (mut x, mut y, mut z, mut w) = (
        p[offset],
        p[offset + stride],
        p[offset + 2 * stride],
        p[offset + 3 * stride],
    );

    y += w >> 1;
    w -= y >> 1;
    y += w;
    w <<= 1;
    w -= y;
    z += x;
    x <<= 1;
    x -= z;
    y += z;
    z <<= 1;
    z -= y;
    w += x;
    x <<= 1;
    x -= w;

    p[offset] = x;
    p[offset + stride] = y;
    p[offset + 2 * stride] = z;
    p[offset + 3 * stride] = w;
}

#[inline]
fn to_negabinary(x: i32) -> u32 {
    (x as u32).wrapping_add(NEGABINARY_MASK) ^ NEGABINARY_MASK
}

#[inline]
fn from_negabinary(x: u32) -> i32 {
    (x ^ NEGABINARY_MASK).wrapping_sub(NEGABINARY_MASK) as i32
}

/// LSB-first bit packer.
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    filled: u32,
}

impl BitWriter {
    fn write(&mut self, value: u64, bits: u32) {
        debug_assert!(bits <= 32);
        self.acc |= (value & ((1u64 << bits) - 1)) << self.filled;
        self.filled += bits;
        while self.filled >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.filled -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    acc: u64,
    filled: u32,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            acc: 0,
            filled: 0,
        }
    }

    fn read(&mut self, bits: u32) -> CodecResult<u64> {
        while self.filled < bits {
            let byte = self
                .bytes
                .get(self.pos)
                .ok_or_else(|| CodecError::corrupt("stream ended inside a block"))?;
            self.acc |= u64::from(*byte) << self.filled;
            self.filled += 8;
            self.pos += 1;
        }
        let value = self.acc & ((1u64 << bits) - 1);
        self.acc >>= bits;
        self.filled -= bits;
        Ok(value)
    }
}
