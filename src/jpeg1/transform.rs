//! Lossless transforms in the DCT domain.
//!
//! Every operation is expressed as an optional transpose followed by
//! horizontal and/or vertical mirroring in the output space. Mirroring a
//! block negates its odd horizontal (or vertical) frequencies; transposing it
//! transposes the block and the quantization tables. Edge blocks that do not
//! fill a whole iMCU cannot be mirrored and stay where they are unless the
//! caller asks for TRIM or PERFECT.

use crate::error::JpegError;
use crate::jpeg1::coefficients::{Block, CoefficientImage, ComponentInfo};
use crate::jpeg1::dct::{BLOCK_DIM, BLOCK_SIZE};
use crate::jpeg1::decoder::Jpeg1Decoder;
use crate::jpeg1::encoder::{CoefficientWriteOptions, write_coefficients_to_vec};
use crate::options::DecodeOptions;
use crate::pixel_format::ColorSpace;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::debug;

/// Transform operation, numbered like TurboJPEG's `TJXOP_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TransformOperation {
    #[default]
    None = 0,
    HFlip = 1,
    VFlip = 2,
    Transpose = 3,
    Transverse = 4,
    Rot90 = 5,
    Rot180 = 6,
    Rot270 = 7,
}

impl TransformOperation {
    pub fn from_code(code: u8) -> Result<Self, JpegError> {
        Self::try_from_primitive(code).map_err(|_| JpegError::InvalidArgumentTransformOperation)
    }

    /// (transpose, mirror columns, mirror rows), mirrors applied after the
    /// transpose.
    pub const fn steps(self) -> (bool, bool, bool) {
        match self {
            Self::None => (false, false, false),
            Self::HFlip => (false, true, false),
            Self::VFlip => (false, false, true),
            Self::Transpose => (true, false, false),
            Self::Transverse => (true, true, true),
            Self::Rot90 => (true, true, false),
            Self::Rot180 => (false, true, true),
            Self::Rot270 => (true, false, true),
        }
    }

    pub const fn transposes(self) -> bool {
        self.steps().0
    }
}

/// Transform option bits (TurboJPEG `TJXOPT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformOptions {
    pub perfect: bool,
    pub trim: bool,
    pub crop: bool,
    pub gray: bool,
    pub no_output: bool,
    pub progressive: bool,
    pub copy_none: bool,
}

impl TransformOptions {
    pub const PERFECT: u32 = 1;
    pub const TRIM: u32 = 2;
    pub const CROP: u32 = 4;
    pub const GRAY: u32 = 8;
    pub const NOOUTPUT: u32 = 16;
    pub const PROGRESSIVE: u32 = 32;
    pub const COPYNONE: u32 = 64;

    pub fn from_bits(bits: u32) -> Self {
        Self {
            perfect: bits & Self::PERFECT != 0,
            trim: bits & Self::TRIM != 0,
            crop: bits & Self::CROP != 0,
            gray: bits & Self::GRAY != 0,
            no_output: bits & Self::NOOUTPUT != 0,
            progressive: bits & Self::PROGRESSIVE != 0,
            copy_none: bits & Self::COPYNONE != 0,
        }
    }

    pub fn bits(&self) -> u32 {
        [
            (self.perfect, Self::PERFECT),
            (self.trim, Self::TRIM),
            (self.crop, Self::CROP),
            (self.gray, Self::GRAY),
            (self.no_output, Self::NOOUTPUT),
            (self.progressive, Self::PROGRESSIVE),
            (self.copy_none, Self::COPYNONE),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |bits, (_, bit)| bits | bit)
    }
}

/// Crop rectangle in transformed coordinates. A zero width or height
/// extends the region to the image edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Grows the region outward so its origin sits on the iMCU grid.
    pub fn aligned_outward(self, mcu_width: u32, mcu_height: u32) -> Self {
        let x = self.x / mcu_width * mcu_width;
        let y = self.y / mcu_height * mcu_height;
        Self {
            x,
            y,
            width: if self.width == 0 { 0 } else { self.width + (self.x - x) },
            height: if self.height == 0 { 0 } else { self.height + (self.y - y) },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transform {
    pub operation: TransformOperation,
    pub options: TransformOptions,
    /// Used when `options.crop` is set.
    pub region: CropRegion,
}

impl Transform {
    pub fn new(operation: TransformOperation) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_crop(mut self, region: CropRegion) -> Self {
        self.options.crop = true;
        self.region = region;
        self
    }
}

/// Output-space layout of a transform before cropping.
struct OutputLayout {
    components: Vec<ComponentInfo>,
    // Source component feeding each output component.
    sources: Vec<usize>,
    width: u32,
    height: u32,
    mcu_width: u32,
    mcu_height: u32,
    color_space: ColorSpace,
}

impl OutputLayout {
    fn new(image: &CoefficientImage, transform: &Transform) -> Result<Self, JpegError> {
        let transpose = transform.operation.transposes();
        let (color_space, sources): (ColorSpace, Vec<usize>) = if transform.options.gray {
            if !matches!(image.color_space, ColorSpace::YCbCr | ColorSpace::Gray) {
                return Err(JpegError::CannotTransformToGrayscale);
            }
            (ColorSpace::Gray, vec![0])
        } else {
            (image.color_space, (0..image.components.len()).collect())
        };

        let mut components: Vec<ComponentInfo> = sources
            .iter()
            .map(|&source| {
                let mut info = image.components[source].info;
                if transpose {
                    std::mem::swap(&mut info.h_samp_factor, &mut info.v_samp_factor);
                }
                info
            })
            .collect();
        if components.len() == 1 {
            components[0].h_samp_factor = 1;
            components[0].v_samp_factor = 1;
        }
        let max_h = components.iter().map(|c| c.h_samp_factor).max().unwrap_or(1) as u32;
        let max_v = components.iter().map(|c| c.v_samp_factor).max().unwrap_or(1) as u32;
        let (width, height) = if transpose {
            (image.height, image.width)
        } else {
            (image.width, image.height)
        };
        Ok(Self {
            components,
            sources,
            width,
            height,
            mcu_width: max_h * BLOCK_SIZE as u32,
            mcu_height: max_v * BLOCK_SIZE as u32,
            color_space,
        })
    }

    /// Blocks per iMCU of component `c` horizontally and vertically.
    fn blocks_per_mcu(&self, c: usize) -> (usize, usize) {
        let info = &self.components[c];
        (info.h_samp_factor as usize, info.v_samp_factor as usize)
    }
}

/// iMCU size of the output of `transform`, the grid crop offsets must
/// follow.
pub fn output_mcu_size(image: &CoefficientImage, transform: &Transform) -> Result<(u32, u32), JpegError> {
    let layout = OutputLayout::new(image, transform)?;
    Ok((layout.mcu_width, layout.mcu_height))
}

/// Applies `transform` to quantized coefficients.
pub fn transform_coefficients(image: &CoefficientImage, transform: &Transform) -> Result<CoefficientImage, JpegError> {
    if transform.options.progressive {
        return Err(JpegError::ProgressiveNotSupported);
    }
    let (transpose, mirror_columns, mirror_rows) = transform.operation.steps();
    let layout = OutputLayout::new(image, transform)?;
    let (mcu_width, mcu_height) = (layout.mcu_width, layout.mcu_height);

    let partial_columns = mirror_columns && layout.width % mcu_width != 0;
    let partial_rows = mirror_rows && layout.height % mcu_height != 0;
    if transform.options.perfect && (partial_columns || partial_rows) {
        return Err(JpegError::NonPerfectTransform);
    }

    // Full transformed size, trimmed when asked to and possible.
    let mut full_width = layout.width;
    let mut full_height = layout.height;
    if transform.options.trim {
        if partial_columns && full_width >= mcu_width {
            full_width = full_width / mcu_width * mcu_width;
        }
        if partial_rows && full_height >= mcu_height {
            full_height = full_height / mcu_height * mcu_height;
        }
    }

    let region = if transform.options.crop {
        resolve_crop(transform.region, full_width, full_height, mcu_width, mcu_height)?
    } else {
        CropRegion::new(0, 0, full_width, full_height)
    };

    let mut tables = image.quantization_tables;
    if transpose {
        for table in tables.iter_mut().flatten() {
            *table = table.transposed();
        }
    }
    let mut output = CoefficientImage::new(region.width, region.height, layout.color_space, &layout.components, tables)?;

    // Mirroring only covers whole iMCUs of the untrimmed transformed image.
    let full_mcu_columns = (layout.width / mcu_width) as usize;
    let full_mcu_rows = (layout.height / mcu_height) as usize;
    for (c, component) in output.components.iter_mut().enumerate() {
        let (h, v) = layout.blocks_per_mcu(c);
        let flip_width = full_mcu_columns * h;
        let flip_height = full_mcu_rows * v;
        let offset_x = (region.x / mcu_width) as usize * h;
        let offset_y = (region.y / mcu_height) as usize * v;
        let source = &image.components[layout.sources[c]];

        for block_y in 0..component.blocks_high {
            for block_x in 0..component.blocks_wide {
                let mut x = block_x + offset_x;
                let mut y = block_y + offset_y;
                let flip_x = mirror_columns && x < flip_width;
                let flip_y = mirror_rows && y < flip_height;
                if flip_x {
                    x = flip_width - 1 - x;
                }
                if flip_y {
                    y = flip_height - 1 - y;
                }
                let (source_x, source_y) = if transpose { (y, x) } else { (x, y) };
                if source_x >= source.blocks_wide || source_y >= source.blocks_high {
                    continue;
                }
                *component.block_mut(block_x, block_y) =
                    transform_block(source.block(source_x, source_y), transpose, flip_x, flip_y);
            }
        }
    }

    debug!(
        operation = ?transform.operation,
        width = output.width,
        height = output.height,
        "transformed coefficients"
    );
    Ok(output)
}

fn resolve_crop(
    region: CropRegion,
    width: u32,
    height: u32,
    mcu_width: u32,
    mcu_height: u32,
) -> Result<CropRegion, JpegError> {
    if region.x % mcu_width != 0 || region.y % mcu_height != 0 || region.x >= width || region.y >= height {
        return Err(JpegError::InvalidCropRegion);
    }
    let crop_width = if region.width == 0 { width - region.x } else { region.width };
    let crop_height = if region.height == 0 { height - region.y } else { region.height };
    if region.x + crop_width > width || region.y + crop_height > height {
        return Err(JpegError::InvalidCropRegion);
    }
    Ok(CropRegion::new(region.x, region.y, crop_width, crop_height))
}

fn transform_block(block: &Block, transpose: bool, flip_x: bool, flip_y: bool) -> Block {
    let mut out = [0i16; BLOCK_DIM];
    for v in 0..BLOCK_SIZE {
        for u in 0..BLOCK_SIZE {
            let mut value = if transpose {
                block[u * BLOCK_SIZE + v]
            } else {
                block[v * BLOCK_SIZE + u]
            };
            if (flip_x && u % 2 == 1) != (flip_y && v % 2 == 1) {
                value = value.wrapping_neg();
            }
            out[v * BLOCK_SIZE + u] = value;
        }
    }
    out
}

/// Decodes `source` once and applies each transform to it, returning one
/// JPEG per transform (empty for NOOUTPUT).
pub fn transform_jpeg(source: &[u8], transforms: &[Transform], options: &DecodeOptions) -> Result<Vec<Vec<u8>>, JpegError> {
    if transforms.is_empty() {
        return Err(JpegError::InvalidArgument);
    }
    let mut decoder = Jpeg1Decoder::new(source);
    let image = decoder.read_coefficients(options)?;
    let markers = decoder.markers().to_vec();

    transforms
        .iter()
        .map(|transform| {
            let output = transform_coefficients(&image, transform)?;
            if transform.options.no_output {
                return Ok(Vec::new());
            }
            let write_options = CoefficientWriteOptions {
                optimize_huffman: true,
                markers: if transform.options.copy_none { &[] } else { &markers },
                ..CoefficientWriteOptions::default()
            };
            write_coefficients_to_vec(&output, &write_options)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg1::quantization::QuantizationTable;

    fn numbered_image(width: u32, height: u32) -> CoefficientImage {
        let info = ComponentInfo {
            id: 1,
            h_samp_factor: 1,
            v_samp_factor: 1,
            quant_table_index: 0,
        };
        let mut tables = [None; 4];
        tables[0] = Some(QuantizationTable::luminance(50).unwrap());
        let mut image = CoefficientImage::new(width, height, ColorSpace::Gray, &[info], tables).unwrap();
        let component = &mut image.components[0];
        for y in 0..component.blocks_high {
            for x in 0..component.blocks_wide {
                let block = component.block_mut(x, y);
                block[0] = (y * 16 + x) as i16;
                block[1] = 5;
                block[8] = 7;
            }
        }
        image
    }

    #[test]
    fn operations_decompose_into_steps() {
        assert_eq!(TransformOperation::Rot90.steps(), (true, true, false));
        assert_eq!(TransformOperation::Rot270.steps(), (true, false, true));
        assert_eq!(
            TransformOperation::from_code(8),
            Err(JpegError::InvalidArgumentTransformOperation)
        );
        let options = TransformOptions::from_bits(TransformOptions::PERFECT | TransformOptions::COPYNONE);
        assert!(options.perfect && options.copy_none && !options.trim);
        assert_eq!(options.bits(), 65);
    }

    #[test]
    fn hflip_mirrors_blocks_and_negates_odd_columns() {
        let image = numbered_image(24, 8);
        let out = transform_coefficients(&image, &Transform::new(TransformOperation::HFlip)).unwrap();
        let component = &out.components[0];
        assert_eq!(component.block(0, 0)[0], 2);
        assert_eq!(component.block(2, 0)[0], 0);
        assert_eq!(component.block(0, 0)[1], -5);
        assert_eq!(component.block(0, 0)[8], 7);
    }

    #[test]
    fn partial_edge_stays_in_place() {
        let image = numbered_image(20, 8);
        let out = transform_coefficients(&image, &Transform::new(TransformOperation::HFlip)).unwrap();
        let component = &out.components[0];
        assert_eq!(component.block(0, 0)[0], 1);
        assert_eq!(component.block(1, 0)[0], 0);
        assert_eq!(component.block(2, 0)[0], 2);
        assert_eq!(component.block(2, 0)[1], 5);

        let perfect = Transform::new(TransformOperation::HFlip).with_options(TransformOptions::from_bits(TransformOptions::PERFECT));
        assert_eq!(
            transform_coefficients(&image, &perfect).unwrap_err(),
            JpegError::NonPerfectTransform
        );

        let trim = Transform::new(TransformOperation::HFlip).with_options(TransformOptions::from_bits(TransformOptions::TRIM));
        let trimmed = transform_coefficients(&image, &trim).unwrap();
        assert_eq!((trimmed.width, trimmed.height), (16, 8));
    }

    #[test]
    fn rot90_moves_blocks_and_swaps_dimensions() {
        let image = numbered_image(16, 24);
        let out = transform_coefficients(&image, &Transform::new(TransformOperation::Rot90)).unwrap();
        assert_eq!((out.width, out.height), (24, 16));
        let component = &out.components[0];
        // Output (0, 0) comes from the bottom-left source block (0, 2).
        assert_eq!(component.block(0, 0)[0], 32);
        assert_eq!(component.block(2, 0)[0], 0);
        // Transposed, then columns mirrored.
        assert_eq!(component.block(0, 0)[1], -7);
        assert_eq!(component.block(0, 0)[8], 5);
        assert_eq!(
            out.quantization_tables[0].unwrap(),
            image.quantization_tables[0].unwrap().transposed()
        );
    }

    #[test]
    fn four_rotations_are_identity() {
        let image = numbered_image(32, 16);
        let mut current = image.clone();
        for _ in 0..4 {
            current = transform_coefficients(&current, &Transform::new(TransformOperation::Rot90)).unwrap();
        }
        assert_eq!(current, image);
    }

    #[test]
    fn crop_selects_mcu_aligned_window() {
        let image = numbered_image(32, 32);
        let crop = Transform::new(TransformOperation::None).with_crop(CropRegion::new(8, 16, 16, 0));
        let out = transform_coefficients(&image, &crop).unwrap();
        assert_eq!((out.width, out.height), (16, 16));
        assert_eq!(out.components[0].block(0, 0)[0], 2 * 16 + 1);

        let misaligned = Transform::new(TransformOperation::None).with_crop(CropRegion::new(4, 0, 8, 8));
        assert_eq!(
            transform_coefficients(&image, &misaligned).unwrap_err(),
            JpegError::InvalidCropRegion
        );
        let outside = Transform::new(TransformOperation::None).with_crop(CropRegion::new(0, 0, 40, 8));
        assert_eq!(
            transform_coefficients(&image, &outside).unwrap_err(),
            JpegError::InvalidCropRegion
        );
        assert_eq!(CropRegion::new(13, 9, 10, 10).aligned_outward(8, 8), CropRegion::new(8, 8, 15, 11));
    }

    #[test]
    fn gray_requires_ycbcr_or_gray() {
        let mut image = numbered_image(8, 8);
        image.color_space = ColorSpace::Cmyk;
        let gray = Transform::new(TransformOperation::None).with_options(TransformOptions::from_bits(TransformOptions::GRAY));
        assert_eq!(
            transform_coefficients(&image, &gray).unwrap_err(),
            JpegError::CannotTransformToGrayscale
        );
        let progressive =
            Transform::new(TransformOperation::None).with_options(TransformOptions::from_bits(TransformOptions::PROGRESSIVE));
        assert_eq!(
            transform_coefficients(&numbered_image(8, 8), &progressive).unwrap_err(),
            JpegError::ProgressiveNotSupported
        );
    }
}
