//! `u8` image tensors for numerical frameworks.
//!
//! Decoded images come out as owned [`ImageTensor`]s in HWC or CHW order, or
//! stacked into a [`BatchTensor`]. Encoding accepts a borrowed, possibly
//! strided [`TensorView`].

use crate::codec::JpegCodec;
use crate::error::JpegError;
use crate::options::{DecodeOptions, EncodeOptions};
use std::borrow::Cow;
use std::io::Write;
use tracing::debug;

const NPY_MAGIC: [u8; 8] = [0x93, b'N', b'U', b'M', b'P', b'Y', 0x01, 0x00];
const NPY_ALIGNMENT: usize = 64;

/// Axis order of an image tensor. Batches prepend the image index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TensorLayout {
    /// Height, width, channels (interleaved pixels).
    #[default]
    Hwc,
    /// Channels, height, width (planar).
    Chw,
}

impl TensorLayout {
    fn shape(self, height: usize, width: usize, channels: usize) -> [usize; 3] {
        match self {
            Self::Hwc => [height, width, channels],
            Self::Chw => [channels, height, width],
        }
    }
}

/// Owned, contiguous image tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTensor {
    data: Vec<u8>,
    height: usize,
    width: usize,
    channels: usize,
    layout: TensorLayout,
}

impl ImageTensor {
    pub fn from_vec(
        data: Vec<u8>,
        height: usize,
        width: usize,
        channels: usize,
        layout: TensorLayout,
    ) -> Result<Self, JpegError> {
        if height == 0 || width == 0 || channels == 0 || data.len() != height * width * channels {
            return Err(JpegError::TensorShapeMismatch);
        }
        Ok(Self {
            data,
            height,
            width,
            channels,
            layout,
        })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.layout.shape(self.height, self.width, self.channels)
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Sample at row `y`, column `x`, channel `c` regardless of layout.
    pub fn get(&self, y: usize, x: usize, c: usize) -> u8 {
        self.view().get(y, x, c)
    }

    /// Returns the tensor in `layout`, copying only when the order changes.
    pub fn into_layout(self, layout: TensorLayout) -> Self {
        if layout == self.layout {
            return self;
        }
        let view = self.view();
        let mut data = Vec::with_capacity(self.data.len());
        match layout {
            TensorLayout::Hwc => {
                for y in 0..self.height {
                    for x in 0..self.width {
                        data.extend((0..self.channels).map(|c| view.get(y, x, c)));
                    }
                }
            }
            TensorLayout::Chw => {
                for c in 0..self.channels {
                    for y in 0..self.height {
                        data.extend((0..self.width).map(|x| view.get(y, x, c)));
                    }
                }
            }
        }
        Self {
            data,
            layout,
            ..self
        }
    }

    pub fn view(&self) -> TensorView<'_> {
        let (h, w, c) = (self.height, self.width, self.channels);
        let strides = match self.layout {
            TensorLayout::Hwc => [w * c, c, 1],
            TensorLayout::Chw => [w, 1, h * w],
        };
        TensorView {
            data: &self.data,
            height: h,
            width: w,
            channels: c,
            strides,
        }
    }

    /// `.npy` (format 1.0, `|u1`) serialization in the tensor's own axis
    /// order.
    pub fn to_npy(&self) -> Vec<u8> {
        npy_bytes(&self.shape(), &self.data)
    }

    pub fn write_npy<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&npy_header(&self.shape()))?;
        writer.write_all(&self.data)
    }
}

/// Borrowed (H, W, C) view with per-axis strides in bytes.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    data: &'a [u8],
    height: usize,
    width: usize,
    channels: usize,
    strides: [usize; 3],
}

impl<'a> TensorView<'a> {
    /// `strides` are (row, column, channel) steps. Every addressed sample
    /// must lie inside `data`.
    pub fn new(
        data: &'a [u8],
        height: usize,
        width: usize,
        channels: usize,
        strides: [usize; 3],
    ) -> Result<Self, JpegError> {
        if height == 0 || width == 0 || channels == 0 {
            return Err(JpegError::TensorShapeMismatch);
        }
        let last = (height - 1)
            .checked_mul(strides[0])
            .zip((width - 1).checked_mul(strides[1]))
            .zip((channels - 1).checked_mul(strides[2]))
            .and_then(|((rows, columns), channel)| rows.checked_add(columns)?.checked_add(channel))
            .ok_or(JpegError::SourceTooSmall)?;
        if last >= data.len() {
            return Err(JpegError::SourceTooSmall);
        }
        Ok(Self {
            data,
            height,
            width,
            channels,
            strides,
        })
    }

    /// Packed HWC view.
    pub fn packed(data: &'a [u8], height: usize, width: usize, channels: usize) -> Result<Self, JpegError> {
        Self::new(data, height, width, channels, [width * channels, channels, 1])
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    pub fn strides(&self) -> [usize; 3] {
        self.strides
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize, c: usize) -> u8 {
        self.data[y * self.strides[0] + x * self.strides[1] + c * self.strides[2]]
    }

    /// Whether each row is a run of interleaved pixels, so the data can be
    /// handed to the encoder as is with the row stride as pitch.
    pub fn has_packed_rows(&self) -> bool {
        self.strides[2] == 1 && self.strides[1] == self.channels && self.strides[0] >= self.width * self.channels
    }

    /// Pixel rows and their pitch, copied into packed HWC when the view is
    /// strided.
    pub fn to_packed(&self) -> (Cow<'a, [u8]>, usize) {
        if self.has_packed_rows() {
            return (Cow::Borrowed(self.data), self.strides[0]);
        }
        let mut data = Vec::with_capacity(self.height * self.width * self.channels);
        for y in 0..self.height {
            for x in 0..self.width {
                data.extend((0..self.channels).map(|c| self.get(y, x, c)));
            }
        }
        (Cow::Owned(data), self.width * self.channels)
    }
}

/// N images of one size stacked as NHWC or NCHW.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTensor {
    data: Vec<u8>,
    count: usize,
    height: usize,
    width: usize,
    channels: usize,
    layout: TensorLayout,
}

impl BatchTensor {
    /// Stacks images that share size, channel count and layout.
    pub fn stack(images: Vec<ImageTensor>) -> Result<Self, JpegError> {
        let first = images.first().ok_or(JpegError::EmptyBatch)?;
        let (height, width, channels, layout) = (first.height, first.width, first.channels, first.layout);
        if images
            .iter()
            .any(|image| (image.height, image.width, image.channels, image.layout) != (height, width, channels, layout))
        {
            return Err(JpegError::BatchDimensionMismatch);
        }
        let count = images.len();
        let mut data = Vec::with_capacity(count * height * width * channels);
        for image in images {
            data.extend_from_slice(&image.data);
        }
        Ok(Self {
            data,
            count,
            height,
            width,
            channels,
            layout,
        })
    }

    pub fn shape(&self) -> [usize; 4] {
        let [a, b, c] = self.layout.shape(self.height, self.width, self.channels);
        [self.count, a, b, c]
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Copy of image `index`.
    pub fn image(&self, index: usize) -> Option<ImageTensor> {
        let size = self.height * self.width * self.channels;
        let data = self.data.get(index * size..(index + 1) * size)?.to_vec();
        Some(ImageTensor {
            data,
            height: self.height,
            width: self.width,
            channels: self.channels,
            layout: self.layout,
        })
    }

    pub fn to_npy(&self) -> Vec<u8> {
        npy_bytes(&self.shape(), &self.data)
    }
}

fn npy_header(shape: &[usize]) -> Vec<u8> {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    // One-element tuples keep their trailing comma.
    let shape = if dims.len() == 1 {
        format!("({},)", dims[0])
    } else {
        format!("({})", dims.join(", "))
    };
    let mut dict = format!("{{'descr': '|u1', 'fortran_order': False, 'shape': {shape}, }}");
    let unpadded = NPY_MAGIC.len() + 2 + dict.len() + 1;
    let padding = (NPY_ALIGNMENT - unpadded % NPY_ALIGNMENT) % NPY_ALIGNMENT;
    dict.extend(std::iter::repeat_n(' ', padding));
    dict.push('\n');

    let mut header = Vec::with_capacity(NPY_MAGIC.len() + 2 + dict.len());
    header.extend_from_slice(&NPY_MAGIC);
    header.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    header.extend_from_slice(dict.as_bytes());
    header
}

fn npy_bytes(shape: &[usize], data: &[u8]) -> Vec<u8> {
    let mut bytes = npy_header(shape);
    bytes.extend_from_slice(data);
    bytes
}

impl JpegCodec {
    /// Decodes into a tensor with one channel per byte of
    /// `options.pixel_format`.
    pub fn decode_tensor(&self, jpeg: &[u8], options: &DecodeOptions, layout: TensorLayout) -> Result<ImageTensor, JpegError> {
        let image = self.decode(jpeg, options)?;
        let tensor = ImageTensor::from_vec(
            image.data,
            image.height as usize,
            image.width as usize,
            image.pixel_format.pixel_size(),
            TensorLayout::Hwc,
        )?;
        Ok(tensor.into_layout(layout))
    }

    /// Encodes a view whose channel count matches `options.pixel_format`.
    pub fn encode_tensor(&self, view: &TensorView, options: &EncodeOptions) -> Result<Vec<u8>, JpegError> {
        if view.channels != options.pixel_format.pixel_size() {
            return Err(JpegError::TensorShapeMismatch);
        }
        let width = u32::try_from(view.width).map_err(|_| JpegError::InvalidArgumentWidth)?;
        let height = u32::try_from(view.height).map_err(|_| JpegError::InvalidArgumentHeight)?;
        let (pixels, pitch) = view.to_packed();
        self.encode(&pixels, width, height, pitch, options)
    }

    /// Decodes same-sized images into one batch tensor.
    pub fn decode_batch(&self, jpegs: &[&[u8]], options: &DecodeOptions, layout: TensorLayout) -> Result<BatchTensor, JpegError> {
        if jpegs.is_empty() {
            return Err(JpegError::EmptyBatch);
        }
        let mut expected = None;
        let mut images = Vec::with_capacity(jpegs.len());
        for jpeg in jpegs {
            let header = self.decode_header(jpeg)?;
            let size = self.scaled_size(&header, options.scaling)?;
            if *expected.get_or_insert(size) != size {
                return Err(JpegError::BatchDimensionMismatch);
            }
            images.push(self.decode_tensor(jpeg, options, layout)?);
        }
        let batch = BatchTensor::stack(images)?;
        debug!(shape = ?batch.shape(), "decoded batch");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(height: usize, width: usize, channels: usize) -> ImageTensor {
        let data = (0..height * width * channels).map(|i| i as u8).collect();
        ImageTensor::from_vec(data, height, width, channels, TensorLayout::Hwc).unwrap()
    }

    #[test]
    fn layout_conversion_moves_channels_to_front() {
        let tensor = numbered(2, 3, 3);
        let planar = tensor.clone().into_layout(TensorLayout::Chw);
        assert_eq!(planar.shape(), [3, 2, 3]);
        assert_eq!(&planar.as_slice()[..6], &[0, 3, 6, 9, 12, 15]);
        assert_eq!(planar.get(1, 2, 1), tensor.get(1, 2, 1));
        assert_eq!(planar.into_layout(TensorLayout::Hwc), tensor);
    }

    #[test]
    fn npy_header_is_aligned() {
        let tensor = numbered(2, 3, 1);
        let npy = tensor.to_npy();
        assert_eq!(&npy[..8], &NPY_MAGIC);
        let header_len = u16::from_le_bytes([npy[8], npy[9]]) as usize;
        assert_eq!((10 + header_len) % NPY_ALIGNMENT, 0);
        let dict = std::str::from_utf8(&npy[10..10 + header_len]).unwrap();
        assert!(dict.starts_with("{'descr': '|u1', 'fortran_order': False, 'shape': (2, 3, 1), }"));
        assert!(dict.ends_with('\n'));
        assert_eq!(&npy[10 + header_len..], tensor.as_slice());

        let mut written = Vec::new();
        tensor.write_npy(&mut written).unwrap();
        assert_eq!(written, npy);
        let vector = npy_header(&[7]);
        assert_eq!(&vector[..8], &NPY_MAGIC);
        assert_eq!(vector.len() % NPY_ALIGNMENT, 0);
        assert!(std::str::from_utf8(&vector[10..]).unwrap().contains("'shape': (7,)"));
    }

    #[test]
    fn strided_views_are_bounds_checked() {
        let data = vec![0u8; 100];
        assert!(TensorView::new(&data, 4, 4, 3, [24, 3, 1]).is_ok());
        assert_eq!(
            TensorView::new(&data, 5, 4, 3, [24, 3, 1]).unwrap_err(),
            JpegError::SourceTooSmall
        );
        assert_eq!(
            TensorView::new(&data, 0, 4, 3, [24, 3, 1]).unwrap_err(),
            JpegError::TensorShapeMismatch
        );

        let planar = numbered(2, 2, 3).into_layout(TensorLayout::Chw);
        let view = planar.view();
        assert!(!view.has_packed_rows());
        let (packed, pitch) = view.to_packed();
        assert_eq!(pitch, 6);
        assert_eq!(packed.as_ref(), numbered(2, 2, 3).as_slice());
    }

    #[test]
    fn batches_need_matching_images() {
        assert_eq!(BatchTensor::stack(Vec::new()).unwrap_err(), JpegError::EmptyBatch);
        assert_eq!(
            BatchTensor::stack(vec![numbered(2, 2, 3), numbered(2, 3, 3)]).unwrap_err(),
            JpegError::BatchDimensionMismatch
        );
        let batch = BatchTensor::stack(vec![numbered(2, 2, 3), numbered(2, 2, 3)]).unwrap();
        assert_eq!(batch.shape(), [2, 2, 2, 3]);
        assert_eq!(batch.image(1).unwrap(), numbered(2, 2, 3));
        assert!(batch.image(2).is_none());
    }
}
