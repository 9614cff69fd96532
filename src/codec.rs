//! TurboJPEG-style codec handle.
//!
//! `JpegCodec` bundles the header query, decode, encode and transform entry
//! points behind one value, the way a `tjhandle` does. It is cheap to create
//! and holds no per-image state.

use crate::error::{JpegError, JpegWarning};
use crate::jpeg_stream_reader::JpegHeader;
use crate::jpeg1::decoder::Jpeg1Decoder;
use crate::jpeg1::encoder::{Jpeg1Encoder, SourceImage, max_encoded_size};
use crate::jpeg1::sampling::{Subsampling, YuvPlanes};
use crate::jpeg1::transform::{CropRegion, Transform, TransformOperation, transform_jpeg};
use crate::options::{DecodeOptions, EncodeOptions, SCALING_FACTORS, ScalingFactor};
use crate::pixel_format::PixelFormat;
use tracing::debug;

/// Packed pixels produced by [`JpegCodec::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
    /// Recoverable corruption met while decoding.
    pub warnings: Vec<JpegWarning>,
}

impl DecodedImage {
    pub fn pitch(&self) -> usize {
        self.width as usize * self.pixel_format.pixel_size()
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let pitch = self.pitch();
        &self.data[y * pitch..(y + 1) * pitch]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec {
    /// Stop reading transform sources at the first warning.
    pub strict: bool,
}

impl JpegCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self { strict: true }
    }

    fn source_options(&self) -> DecodeOptions {
        DecodeOptions {
            stop_on_warning: self.strict,
            ..DecodeOptions::default()
        }
    }

    pub fn decode_header(&self, jpeg: &[u8]) -> Result<JpegHeader, JpegError> {
        Jpeg1Decoder::new(jpeg).read_header()
    }

    /// Size of the decoded image at `scaling`.
    pub fn scaled_size(&self, header: &JpegHeader, scaling: ScalingFactor) -> Result<(u32, u32), JpegError> {
        let scaling = scaling.validate()?;
        Ok((scaling.scale(header.width), scaling.scale(header.height)))
    }

    pub fn decode(&self, jpeg: &[u8], options: &DecodeOptions) -> Result<DecodedImage, JpegError> {
        let mut decoder = Jpeg1Decoder::new(jpeg);
        let header = decoder.read_header()?;
        let (width, height) = self.scaled_size(&header, options.scaling)?;
        let mut data = vec![0u8; width as usize * height as usize * options.pixel_format.pixel_size()];
        decoder.decode(options, &mut data, 0)?;
        debug!(width, height, pixel_format = ?options.pixel_format, "decoded image");
        Ok(DecodedImage {
            width,
            height,
            pixel_format: options.pixel_format,
            data,
            warnings: decoder.warnings().to_vec(),
        })
    }

    /// Decodes into a caller buffer with row pitch `pitch` (0 means packed).
    /// Returns the warnings raised while decoding.
    pub fn decode_into(
        &self,
        jpeg: &[u8],
        options: &DecodeOptions,
        destination: &mut [u8],
        pitch: usize,
    ) -> Result<Vec<JpegWarning>, JpegError> {
        let mut decoder = Jpeg1Decoder::new(jpeg);
        decoder.decode(options, destination, pitch)?;
        Ok(decoder.warnings().to_vec())
    }

    pub fn decode_to_yuv(&self, jpeg: &[u8], options: &DecodeOptions) -> Result<YuvPlanes, JpegError> {
        Jpeg1Decoder::new(jpeg).decode_to_yuv(options)
    }

    /// Encodes packed pixels laid out as `options.pixel_format`.
    pub fn encode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        pitch: usize,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, JpegError> {
        let source = SourceImage::packed(pixels, width, height, pitch, options.pixel_format)?;
        Jpeg1Encoder::new(*options).encode_to_vec(&source)
    }

    /// Encodes planar YUV. The subsampling comes from the planes, not from
    /// `options`.
    pub fn encode_yuv(&self, yuv: &YuvPlanes, options: &EncodeOptions) -> Result<Vec<u8>, JpegError> {
        let options = EncodeOptions {
            subsampling: yuv.subsampling,
            ..*options
        };
        Jpeg1Encoder::new(options).encode_yuv_to_vec(yuv)
    }

    pub fn transform(&self, jpeg: &[u8], transform: &Transform) -> Result<Vec<u8>, JpegError> {
        let mut outputs = transform_jpeg(jpeg, std::slice::from_ref(transform), &self.source_options())?;
        outputs.pop().ok_or(JpegError::InvalidOperation)
    }

    /// Applies several transforms to one source, decoding it once.
    pub fn transform_multiple(&self, jpeg: &[u8], transforms: &[Transform]) -> Result<Vec<Vec<u8>>, JpegError> {
        transform_jpeg(jpeg, transforms, &self.source_options())
    }

    pub fn crop(&self, jpeg: &[u8], region: CropRegion, align: bool) -> Result<Vec<u8>, JpegError> {
        let mut outputs = self.crop_multiple(jpeg, std::slice::from_ref(&region), align)?;
        outputs.pop().ok_or(JpegError::InvalidOperation)
    }

    /// Lossless crops of one source. With `align`, each region's origin is
    /// moved up and left onto the iMCU grid and the size grown to still
    /// cover the requested area.
    pub fn crop_multiple(&self, jpeg: &[u8], regions: &[CropRegion], align: bool) -> Result<Vec<Vec<u8>>, JpegError> {
        let header = self.decode_header(jpeg)?;
        let (mcu_width, mcu_height) = (header.mcu_width as u32, header.mcu_height as u32);
        let transforms: Vec<Transform> = regions
            .iter()
            .map(|&region| {
                let region = if align {
                    region.aligned_outward(mcu_width, mcu_height)
                } else {
                    region
                };
                Transform::new(TransformOperation::None).with_crop(region)
            })
            .collect();
        self.transform_multiple(jpeg, &transforms)
    }

    /// Decodes to YUV at `scaling` and re-encodes at `quality`, keeping the
    /// source subsampling.
    pub fn scale_with_quality(&self, jpeg: &[u8], scaling: ScalingFactor, quality: u8) -> Result<Vec<u8>, JpegError> {
        let options = DecodeOptions {
            scaling,
            ..self.source_options()
        };
        let yuv = self.decode_to_yuv(jpeg, &options)?;
        let encode_options = EncodeOptions {
            quality,
            ..EncodeOptions::default()
        };
        self.encode_yuv(&yuv, &encode_options)
    }

    pub fn scaling_factors(&self) -> &'static [ScalingFactor] {
        &SCALING_FACTORS
    }

    /// Worst-case size of a JPEG encoded from a `width` x `height` image.
    pub fn buffer_size(&self, width: u32, height: u32, subsampling: Subsampling) -> usize {
        max_encoded_size(width, height, subsampling)
    }
}
