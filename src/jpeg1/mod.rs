//! JPEG 1 sequential DCT codec (ISO/IEC 10918-1 / ITU-T T.81)
//!
//! This module implements the classic DCT-based baseline and extended
//! sequential processes with Huffman entropy coding.
//!
//! Features:
//! - 8-bit grayscale, YCbCr, RGB, CMYK and YCCK frames.
//! - Huffman coding with standard or optimized tables.
//! - Restart markers (DRI/RSTm) with resynchronisation on corrupt data.
//! - Interleaved and non-interleaved scans.
//! - Scaled decoding (N/8) and lossless DCT-domain transforms.

pub mod bit_io;
pub mod coefficients;
pub mod color;
pub mod dct;
pub mod decoder;
pub mod encoder;
pub mod huffman;
pub mod quantization;
pub mod sampling;
pub mod transform;

pub use decoder::Jpeg1Decoder;
pub use encoder::Jpeg1Encoder;
