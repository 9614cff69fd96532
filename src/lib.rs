//! Baseline JPEG codec with lossless transforms and a tensor-oriented buffer API.
//!
//! The crate decodes and encodes sequential Huffman-coded JPEG (ISO/IEC 10918-1
//! processes 1 and 2, 8-bit), performs lossless DCT-domain transforms, and hands
//! pixel data out as HWC/CHW `u8` tensors ready for numerical frameworks.
//!
//! ```no_run
//! use jpegtensor_rs::{DecodeOptions, JpegCodec, PixelFormat, TensorLayout};
//!
//! let jpeg = std::fs::read("photo.jpg").unwrap();
//! let codec = JpegCodec::new();
//! let header = codec.decode_header(&jpeg).unwrap();
//! let tensor = codec
//!     .decode_tensor(&jpeg, &DecodeOptions::default(), TensorLayout::Chw)
//!     .unwrap();
//! assert_eq!(tensor.shape(), [3, header.height as usize, header.width as usize]);
//! # let _ = PixelFormat::Rgb;
//! ```

pub mod codec;
pub mod constants;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod jpeg1;
pub mod jpeg_marker_code;
pub mod jpeg_stream_reader;
pub mod jpeg_stream_writer;
pub mod options;
pub mod pixel_format;
pub mod tensor;

pub use codec::{DecodedImage, JpegCodec};
pub use error::{JpegError, JpegWarning};
pub use jpeg1::coefficients::CoefficientImage;
pub use jpeg1::sampling::{Plane, Subsampling, YuvPlanes};
pub use jpeg1::transform::{CropRegion, Transform, TransformOperation, TransformOptions};
pub use jpeg_stream_reader::JpegHeader;
pub use options::{DecodeOptions, EncodeOptions, SCALING_FACTORS, ScalingFactor};
pub use pixel_format::{ColorSpace, PixelFormat};
pub use tensor::{BatchTensor, ImageTensor, TensorLayout, TensorView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: i32,
    pub component_count: i32,
}
