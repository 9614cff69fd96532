//! Quantization implementation for JPEG 1.
//! Handles quantization tables and the quantization of DCT coefficients.

use crate::constants::{MAXIMUM_QUALITY, MINIMUM_QUALITY};
use crate::error::JpegError;
use crate::jpeg1::dct::{BLOCK_DIM, BLOCK_SIZE};

/// Zigzag scan index to natural (row-major) index.
#[rustfmt::skip]
pub const ZIGZAG_ORDER: [usize; BLOCK_DIM] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Standard JPEG luminance quantization table (ISO/IEC 10918-1 Table K.1).
#[rustfmt::skip]
pub const STD_LUMINANCE_QUANT_TABLE: [u8; BLOCK_DIM] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Standard JPEG chrominance quantization table (Table K.2).
#[rustfmt::skip]
pub const STD_CHROMINANCE_QUANT_TABLE: [u8; BLOCK_DIM] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Quantization table in natural order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizationTable {
    pub values: [u16; BLOCK_DIM],
}

impl QuantizationTable {
    pub fn from_zigzag(zigzag: &[u16; BLOCK_DIM]) -> Self {
        let mut values = [0u16; BLOCK_DIM];
        for (k, &value) in zigzag.iter().enumerate() {
            values[ZIGZAG_ORDER[k]] = value;
        }
        Self { values }
    }

    pub fn to_zigzag(&self) -> [u16; BLOCK_DIM] {
        let mut zigzag = [0u16; BLOCK_DIM];
        for (k, slot) in zigzag.iter_mut().enumerate() {
            *slot = self.values[ZIGZAG_ORDER[k]];
        }
        zigzag
    }

    /// Scales a base table by a quality factor (1-100) the way libjpeg does.
    pub fn scaled(base: &[u8; BLOCK_DIM], quality: u8) -> Result<Self, JpegError> {
        let scale = quality_scaling(quality)?;
        let mut values = [0u16; BLOCK_DIM];
        for (slot, &base_value) in values.iter_mut().zip(base.iter()) {
            *slot = ((base_value as u32 * scale + 50) / 100).clamp(1, 255) as u16;
        }
        Ok(Self { values })
    }

    pub fn luminance(quality: u8) -> Result<Self, JpegError> {
        Self::scaled(&STD_LUMINANCE_QUANT_TABLE, quality)
    }

    pub fn chrominance(quality: u8) -> Result<Self, JpegError> {
        Self::scaled(&STD_CHROMINANCE_QUANT_TABLE, quality)
    }

    pub fn transposed(&self) -> Self {
        let mut values = [0u16; BLOCK_DIM];
        for v in 0..BLOCK_SIZE {
            for u in 0..BLOCK_SIZE {
                values[u * BLOCK_SIZE + v] = self.values[v * BLOCK_SIZE + u];
            }
        }
        Self { values }
    }

    /// True when the table must be written with 16-bit precision.
    pub fn is_16_bit(&self) -> bool {
        self.values.iter().any(|&value| value > 255)
    }
}

/// libjpeg's quality to percentage scaling curve.
pub fn quality_scaling(quality: u8) -> Result<u32, JpegError> {
    if !(MINIMUM_QUALITY..=MAXIMUM_QUALITY).contains(&quality) {
        return Err(JpegError::InvalidArgumentQuality);
    }
    let quality = quality as u32;
    Ok(if quality < 50 { 5000 / quality } else { 200 - 2 * quality })
}

/// Quantizes coefficients produced by the forward DCT (scaled by 8),
/// rounding half away from zero.
pub fn quantize_block(dct_block: &[i32; BLOCK_DIM], table: &QuantizationTable, output: &mut [i16; BLOCK_DIM]) {
    for i in 0..BLOCK_DIM {
        let divisor = (table.values[i] as i32).max(1) << 3;
        let value = dct_block[i];
        let magnitude = (value.abs() + (divisor >> 1)) / divisor;
        let quantized = if value < 0 { -magnitude } else { magnitude };
        output[i] = quantized.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
}

/// De-quantizes coefficients for the inverse DCT.
pub fn dequantize_block(block: &[i16; BLOCK_DIM], table: &QuantizationTable, output: &mut [i32; BLOCK_DIM]) {
    for i in 0..BLOCK_DIM {
        output[i] = block[i] as i32 * table.values[i] as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_50_is_the_base_table() {
        let table = QuantizationTable::luminance(50).unwrap();
        for i in 0..BLOCK_DIM {
            assert_eq!(table.values[i], STD_LUMINANCE_QUANT_TABLE[i] as u16);
        }
    }

    #[test]
    fn quality_extremes_clamp() {
        assert!(QuantizationTable::luminance(100).unwrap().values.iter().all(|&v| v == 1));
        assert!(QuantizationTable::chrominance(1).unwrap().values.iter().all(|&v| v == 255));
        assert_eq!(
            QuantizationTable::luminance(0),
            Err(JpegError::InvalidArgumentQuality)
        );
        assert_eq!(quality_scaling(101), Err(JpegError::InvalidArgumentQuality));
    }

    #[test]
    fn zigzag_round_trip() {
        let table = QuantizationTable::luminance(75).unwrap();
        assert_eq!(QuantizationTable::from_zigzag(&table.to_zigzag()), table);
        // Entry 2 in zigzag order is row 1, column 0.
        assert_eq!(table.to_zigzag()[2], table.values[8]);
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let table = QuantizationTable::luminance(50).unwrap();
        let transposed = table.transposed();
        assert_eq!(transposed.values[1], table.values[8]);
        assert_eq!(transposed.transposed(), table);
    }

    #[test]
    fn quantize_rounds_half_away_from_zero() {
        let mut table = QuantizationTable { values: [1; BLOCK_DIM] };
        table.values[0] = 10;
        let mut dct = [0i32; BLOCK_DIM];
        dct[0] = 8 * 15;
        dct[1] = -8 * 3 - 4;
        dct[2] = -8 * 3 - 3;
        let mut out = [0i16; BLOCK_DIM];
        quantize_block(&dct, &table, &mut out);
        assert_eq!(out[0], 2);
        assert_eq!(out[1], -4);
        assert_eq!(out[2], -3);
    }
}
