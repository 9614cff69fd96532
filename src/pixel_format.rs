//! Pixel formats and JPEG color spaces, numbered like the TurboJPEG API.

use crate::error::JpegError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Memory layout of one pixel in a packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PixelFormat {
    #[default]
    Rgb = 0,
    Bgr = 1,
    Rgbx = 2,
    Bgrx = 3,
    Xbgr = 4,
    Xrgb = 5,
    Gray = 6,
    Rgba = 7,
    Bgra = 8,
    Abgr = 9,
    Argb = 10,
    Cmyk = 11,
}

impl PixelFormat {
    pub fn from_code(code: u8) -> Result<Self, JpegError> {
        Self::try_from_primitive(code).map_err(|_| JpegError::InvalidArgumentPixelFormat)
    }

    /// Bytes per pixel.
    pub const fn pixel_size(self) -> usize {
        match self {
            Self::Rgb | Self::Bgr => 3,
            Self::Gray => 1,
            _ => 4,
        }
    }

    pub const fn red_offset(self) -> Option<usize> {
        match self {
            Self::Rgb | Self::Rgbx | Self::Rgba => Some(0),
            Self::Xrgb | Self::Argb => Some(1),
            Self::Bgr | Self::Bgrx | Self::Bgra => Some(2),
            Self::Xbgr | Self::Abgr => Some(3),
            Self::Gray | Self::Cmyk => None,
        }
    }

    pub const fn green_offset(self) -> Option<usize> {
        match self {
            Self::Rgb | Self::Bgr | Self::Rgbx | Self::Bgrx | Self::Rgba | Self::Bgra => Some(1),
            Self::Xbgr | Self::Xrgb | Self::Abgr | Self::Argb => Some(2),
            Self::Gray | Self::Cmyk => None,
        }
    }

    pub const fn blue_offset(self) -> Option<usize> {
        match self {
            Self::Bgr | Self::Bgrx | Self::Bgra => Some(0),
            Self::Xbgr | Self::Abgr => Some(1),
            Self::Rgb | Self::Rgbx | Self::Rgba => Some(2),
            Self::Xrgb | Self::Argb => Some(3),
            Self::Gray | Self::Cmyk => None,
        }
    }

    /// Offset of the alpha or padding byte. Decoders fill it with 0xFF.
    pub const fn filler_offset(self) -> Option<usize> {
        match self {
            Self::Rgbx | Self::Bgrx | Self::Rgba | Self::Bgra => Some(3),
            Self::Xbgr | Self::Xrgb | Self::Abgr | Self::Argb => Some(0),
            _ => None,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra | Self::Abgr | Self::Argb)
    }

    /// True for every format carrying red, green and blue samples.
    pub const fn is_rgb_family(self) -> bool {
        !matches!(self, Self::Gray | Self::Cmyk)
    }
}

/// Color space of the components stored in a JPEG frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ColorSpace {
    Rgb = 0,
    YCbCr = 1,
    Gray = 2,
    Cmyk = 3,
    Ycck = 4,
}

impl ColorSpace {
    pub fn from_code(code: u8) -> Result<Self, JpegError> {
        Self::try_from_primitive(code).map_err(|_| JpegError::InvalidArgument)
    }

    pub const fn component_count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb | Self::YCbCr => 3,
            Self::Cmyk | Self::Ycck => 4,
        }
    }

    /// Adobe APP14 transform flag recorded for this color space.
    pub const fn adobe_transform(self) -> Option<u8> {
        match self {
            Self::Rgb | Self::Cmyk => Some(0),
            Self::Ycck => Some(2),
            Self::YCbCr | Self::Gray => None,
        }
    }

    /// Whether decoding to `format` is a supported conversion.
    pub const fn converts_to(self, format: PixelFormat) -> bool {
        match self {
            Self::Cmyk | Self::Ycck => matches!(format, PixelFormat::Cmyk),
            Self::Gray | Self::YCbCr | Self::Rgb => !matches!(format, PixelFormat::Cmyk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_offsets_match_turbojpeg() {
        assert_eq!(PixelFormat::Bgra.red_offset(), Some(2));
        assert_eq!(PixelFormat::Bgra.blue_offset(), Some(0));
        assert_eq!(PixelFormat::Argb.red_offset(), Some(1));
        assert_eq!(PixelFormat::Xbgr.filler_offset(), Some(0));
        assert_eq!(PixelFormat::Gray.red_offset(), None);
        assert_eq!(PixelFormat::Rgbx.pixel_size(), 4);
    }

    #[test]
    fn numeric_codes_round_trip() {
        for code in 0..12u8 {
            let format = PixelFormat::from_code(code).unwrap();
            assert_eq!(u8::from(format), code);
        }
        assert_eq!(
            PixelFormat::from_code(12),
            Err(JpegError::InvalidArgumentPixelFormat)
        );
    }

    #[test]
    fn cmyk_only_converts_to_cmyk() {
        assert!(ColorSpace::Ycck.converts_to(PixelFormat::Cmyk));
        assert!(!ColorSpace::Cmyk.converts_to(PixelFormat::Rgb));
        assert!(!ColorSpace::YCbCr.converts_to(PixelFormat::Cmyk));
        assert!(ColorSpace::Gray.converts_to(PixelFormat::Bgra));
    }
}
