//! Decode and encode options, and the TurboJPEG flag words they map from.

use crate::constants::{DEFAULT_QUALITY, MAXIMUM_QUALITY, MINIMUM_QUALITY};
use crate::error::JpegError;
use crate::jpeg1::dct::{BLOCK_SIZE, DctMethod};
use crate::jpeg1::sampling::Subsampling;
use crate::pixel_format::PixelFormat;

/// TurboJPEG `TJFLAG_*` bit values.
pub mod flags {
    pub const BOTTOMUP: u32 = 2;
    pub const FASTUPSAMPLE: u32 = 256;
    pub const FASTDCT: u32 = 2048;
    pub const ACCURATEDCT: u32 = 4096;
    pub const STOPONWARNING: u32 = 8192;
    pub const PROGRESSIVE: u32 = 16384;
    pub const LIMITSCANS: u32 = 32768;
}

/// Output scale `num/denom` applied during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalingFactor {
    pub num: u32,
    pub denom: u32,
}

impl ScalingFactor {
    pub const UNSCALED: Self = Self { num: 1, denom: 1 };

    pub const fn new(num: u32, denom: u32) -> Self {
        Self { num, denom }
    }

    /// Scaled dimension, rounded up (TurboJPEG's `TJSCALED`).
    pub fn scale(self, dimension: u32) -> u32 {
        ((dimension as u64 * self.num as u64).div_ceil(self.denom as u64)) as u32
    }

    /// Side of the inverse DCT output block for this factor.
    pub fn block_size(self) -> usize {
        BLOCK_SIZE * self.num as usize / self.denom as usize
    }

    pub fn validate(self) -> Result<Self, JpegError> {
        SCALING_FACTORS
            .iter()
            .copied()
            .find(|factor| factor.num as u64 * self.denom as u64 == self.num as u64 * factor.denom as u64)
            .ok_or(JpegError::InvalidArgumentScalingFactor)
    }
}

impl Default for ScalingFactor {
    fn default() -> Self {
        Self::UNSCALED
    }
}

impl std::fmt::Display for ScalingFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.denom)
    }
}

/// Every factor the decoder supports, largest first.
pub const SCALING_FACTORS: [ScalingFactor; 16] = [
    ScalingFactor::new(2, 1),
    ScalingFactor::new(15, 8),
    ScalingFactor::new(7, 4),
    ScalingFactor::new(13, 8),
    ScalingFactor::new(3, 2),
    ScalingFactor::new(11, 8),
    ScalingFactor::new(5, 4),
    ScalingFactor::new(9, 8),
    ScalingFactor::new(1, 1),
    ScalingFactor::new(7, 8),
    ScalingFactor::new(3, 4),
    ScalingFactor::new(5, 8),
    ScalingFactor::new(1, 2),
    ScalingFactor::new(3, 8),
    ScalingFactor::new(1, 4),
    ScalingFactor::new(1, 8),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub pixel_format: PixelFormat,
    pub scaling: ScalingFactor,
    pub dct_method: DctMethod,
    pub fast_upsample: bool,
    pub bottom_up: bool,
    pub stop_on_warning: bool,
    pub limit_scans: bool,
    /// Refuse frames with more pixels than this.
    pub max_pixels: Option<u64>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Rgb,
            scaling: ScalingFactor::UNSCALED,
            dct_method: DctMethod::IntegerSlow,
            fast_upsample: false,
            bottom_up: false,
            stop_on_warning: false,
            limit_scans: false,
            max_pixels: None,
        }
    }
}

impl DecodeOptions {
    pub fn from_flags(pixel_format: PixelFormat, flags: u32) -> Self {
        Self {
            pixel_format,
            dct_method: dct_method_from_flags(flags),
            fast_upsample: flags & flags::FASTUPSAMPLE != 0,
            bottom_up: flags & flags::BOTTOMUP != 0,
            stop_on_warning: flags & flags::STOPONWARNING != 0,
            limit_scans: flags & flags::LIMITSCANS != 0,
            ..Self::default()
        }
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn with_scaling(mut self, scaling: ScalingFactor) -> Self {
        self.scaling = scaling;
        self
    }
}

/// Restart interval written to the DRI segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartInterval {
    #[default]
    None,
    /// Every n MCUs.
    Mcus(u16),
    /// Every n MCU rows.
    Rows(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub quality: u8,
    pub subsampling: Subsampling,
    pub pixel_format: PixelFormat,
    pub dct_method: DctMethod,
    pub bottom_up: bool,
    pub progressive: bool,
    pub optimize_huffman: bool,
    pub restart_interval: RestartInterval,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            subsampling: Subsampling::default(),
            pixel_format: PixelFormat::Rgb,
            dct_method: DctMethod::IntegerSlow,
            bottom_up: false,
            progressive: false,
            optimize_huffman: false,
            restart_interval: RestartInterval::None,
        }
    }
}

impl EncodeOptions {
    pub fn from_flags(pixel_format: PixelFormat, subsampling: Subsampling, quality: u8, flags: u32) -> Self {
        Self {
            quality,
            subsampling,
            pixel_format,
            dct_method: dct_method_from_flags(flags),
            bottom_up: flags & flags::BOTTOMUP != 0,
            progressive: flags & flags::PROGRESSIVE != 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), JpegError> {
        if !(MINIMUM_QUALITY..=MAXIMUM_QUALITY).contains(&self.quality) {
            return Err(JpegError::InvalidArgumentQuality);
        }
        if self.progressive {
            return Err(JpegError::ProgressiveNotSupported);
        }
        Ok(())
    }

    /// Grayscale output is requested either by the pixel format or the
    /// subsampling mode.
    pub fn is_gray(&self) -> bool {
        self.pixel_format == PixelFormat::Gray || self.subsampling == Subsampling::Gray
    }
}

fn dct_method_from_flags(flags: u32) -> DctMethod {
    if flags & flags::FASTDCT != 0 && flags & flags::ACCURATEDCT == 0 {
        DctMethod::Float
    } else {
        DctMethod::IntegerSlow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_factors_cover_one_to_sixteen_eighths() {
        let sizes: Vec<usize> = SCALING_FACTORS.iter().map(|f| f.block_size()).collect();
        assert_eq!(sizes, (1..=16).rev().collect::<Vec<_>>());
        assert_eq!(ScalingFactor::new(1, 2).scale(33), 17);
        assert_eq!(ScalingFactor::new(15, 8).scale(10), 19);
        assert_eq!(ScalingFactor::new(2, 4).validate(), Ok(ScalingFactor::new(1, 2)));
        assert_eq!(
            ScalingFactor::new(1, 3).validate(),
            Err(JpegError::InvalidArgumentScalingFactor)
        );
    }

    #[test]
    fn huge_scaling_factors_are_rejected_without_overflow() {
        assert_eq!(
            ScalingFactor::new(u32::MAX, 1).validate(),
            Err(JpegError::InvalidArgumentScalingFactor)
        );
        assert_eq!(
            ScalingFactor::new(3, u32::MAX).validate(),
            Err(JpegError::InvalidArgumentScalingFactor)
        );
        assert_eq!(ScalingFactor::new(u32::MAX, u32::MAX).validate(), Ok(ScalingFactor::UNSCALED));
    }

    #[test]
    fn flags_map_onto_options() {
        let options = DecodeOptions::from_flags(
            PixelFormat::Bgra,
            flags::BOTTOMUP | flags::FASTDCT | flags::STOPONWARNING | flags::LIMITSCANS,
        );
        assert!(options.bottom_up && options.stop_on_warning && options.limit_scans);
        assert!(!options.fast_upsample);
        assert_eq!(options.dct_method, DctMethod::Float);

        let accurate = DecodeOptions::from_flags(PixelFormat::Rgb, flags::FASTDCT | flags::ACCURATEDCT);
        assert_eq!(accurate.dct_method, DctMethod::IntegerSlow);

        let encode = EncodeOptions::from_flags(PixelFormat::Rgb, Subsampling::S444, 90, flags::PROGRESSIVE);
        assert_eq!(encode.validate(), Err(JpegError::ProgressiveNotSupported));
        let encode = EncodeOptions { quality: 0, ..EncodeOptions::default() };
        assert_eq!(encode.validate(), Err(JpegError::InvalidArgumentQuality));
    }
}
