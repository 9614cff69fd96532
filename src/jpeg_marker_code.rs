use crate::error::JpegError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum JpegMarkerCode {
    /// TEM: Temporary private use in arithmetic coding.
    Temporary = 0x01,

    /// SOF0: Baseline DCT, Huffman coding.
    StartOfFrameBaseline = 0xC0,
    /// SOF1: Extended sequential DCT, Huffman coding.
    StartOfFrameExtendedSequential = 0xC1,
    /// SOF2: Progressive DCT, Huffman coding.
    StartOfFrameProgressive = 0xC2,
    /// SOF3: Lossless (sequential), Huffman coding.
    StartOfFrameLossless = 0xC3,
    /// DHT: Define Huffman table(s).
    DefineHuffmanTable = 0xC4,
    /// SOF5: Differential sequential DCT, Huffman coding.
    StartOfFrameDifferentialSequential = 0xC5,
    /// SOF6: Differential progressive DCT, Huffman coding.
    StartOfFrameDifferentialProgressive = 0xC6,
    /// SOF7: Differential lossless, Huffman coding.
    StartOfFrameDifferentialLossless = 0xC7,
    /// SOF9: Extended sequential DCT, arithmetic coding.
    StartOfFrameArithmeticSequential = 0xC9,
    /// SOF10: Progressive DCT, arithmetic coding.
    StartOfFrameArithmeticProgressive = 0xCA,
    /// SOF11: Lossless (sequential), arithmetic coding.
    StartOfFrameArithmeticLossless = 0xCB,
    /// DAC: Define arithmetic coding conditioning(s).
    DefineArithmeticCoding = 0xCC,
    /// SOF13: Differential sequential DCT, arithmetic coding.
    StartOfFrameArithmeticDifferentialSequential = 0xCD,
    /// SOF14: Differential progressive DCT, arithmetic coding.
    StartOfFrameArithmeticDifferentialProgressive = 0xCE,
    /// SOF15: Differential lossless, arithmetic coding.
    StartOfFrameArithmeticDifferentialLossless = 0xCF,

    /// RSTm: Restart markers, modulo 8 counter.
    Restart0 = 0xD0,
    Restart1 = 0xD1,
    Restart2 = 0xD2,
    Restart3 = 0xD3,
    Restart4 = 0xD4,
    Restart5 = 0xD5,
    Restart6 = 0xD6,
    Restart7 = 0xD7,

    /// SOI: Marks the start of an image.
    StartOfImage = 0xD8,
    /// EOI: Marks the end of an image.
    EndOfImage = 0xD9,
    /// SOS: Marks the start of scan.
    StartOfScan = 0xDA,
    /// DQT: Define quantization table(s).
    DefineQuantizationTable = 0xDB,
    /// DNL: Defines the number of lines in a scan.
    DefineNumberOfLines = 0xDC,
    /// DRI: Defines the restart interval used in succeeding scans.
    DefineRestartInterval = 0xDD,
    /// DHP: Define hierarchical progression.
    DefineHierarchicalProgression = 0xDE,
    /// EXP: Expand reference component(s).
    ExpandReferenceComponents = 0xDF,

    /// APP0: Application data 0: used for JFIF header.
    ApplicationData0 = 0xE0,
    /// APP1: Application data 1: used for EXIF or XMP header.
    ApplicationData1 = 0xE1,
    /// APP2: Application data 2: used for ICC profile.
    ApplicationData2 = 0xE2,
    ApplicationData3 = 0xE3,
    ApplicationData4 = 0xE4,
    ApplicationData5 = 0xE5,
    ApplicationData6 = 0xE6,
    ApplicationData7 = 0xE7,
    ApplicationData8 = 0xE8,
    ApplicationData9 = 0xE9,
    ApplicationData10 = 0xEA,
    ApplicationData11 = 0xEB,
    ApplicationData12 = 0xEC,
    /// APP13: Application data 13: used by PhotoShop IRB
    ApplicationData13 = 0xED,
    /// APP14: Application data 14: used by Adobe
    ApplicationData14 = 0xEE,
    ApplicationData15 = 0xEF,

    /// COM: Comment block.
    Comment = 0xFE,
}

impl JpegMarkerCode {
    pub fn from_byte(value: u8) -> Result<Self, JpegError> {
        Self::try_from_primitive(value).map_err(|_| JpegError::UnknownJpegMarkerFound)
    }

    pub fn restart(index: u32) -> Self {
        match index % JPEG_RESTART_MARKER_RANGE as u32 {
            0 => Self::Restart0,
            1 => Self::Restart1,
            2 => Self::Restart2,
            3 => Self::Restart3,
            4 => Self::Restart4,
            5 => Self::Restart5,
            6 => Self::Restart6,
            _ => Self::Restart7,
        }
    }

    pub fn is_restart(self) -> bool {
        is_restart_marker(self as u8)
    }

    /// Index 0..=15 of an APPn marker.
    pub fn application_index(self) -> Option<u8> {
        let code = self as u8;
        (0xE0..=0xEF).contains(&code).then(|| code - 0xE0)
    }

    pub fn application(index: u8) -> Result<Self, JpegError> {
        if index > 15 {
            return Err(JpegError::InvalidArgument);
        }
        Self::from_byte(0xE0 + index)
    }
}

pub fn is_restart_marker(code: u8) -> bool {
    (JPEG_RESTART_MARKER_BASE..JPEG_RESTART_MARKER_BASE + JPEG_RESTART_MARKER_RANGE).contains(&code)
}

pub const JPEG_MARKER_START_BYTE: u8 = 0xFF;
pub const JPEG_RESTART_MARKER_BASE: u8 = 0xD0;
pub const JPEG_RESTART_MARKER_RANGE: u8 = 8;
