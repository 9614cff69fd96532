// Largest image dimension accepted by the codec, same bound as libjpeg's JPEG_MAX_DIMENSION.
pub const MAXIMUM_DIMENSION: u32 = 65_500;

pub const MAXIMUM_COMPONENT_COUNT: usize = 4;
pub const MAXIMUM_COMPONENT_COUNT_IN_SCAN: usize = 4;
pub const MAXIMUM_SAMPLING_FACTOR: u8 = 4;

// ISO/IEC 10918-1, B.2.3: an interleaved MCU holds at most 10 data units.
pub const MAXIMUM_BLOCKS_IN_MCU: usize = 10;

// Number of quantization and Huffman table slots per class.
pub const TABLE_SLOT_COUNT: usize = 4;

// Scan limit applied when the caller asks for bounded scan counts.
pub const MAXIMUM_SCAN_COUNT: usize = 500;

pub const BITS_PER_SAMPLE: u8 = 8;
pub const CENTER_SAMPLE: i32 = 128;

pub const DEFAULT_QUALITY: u8 = 85;
pub const MINIMUM_QUALITY: u8 = 1;
pub const MAXIMUM_QUALITY: u8 = 100;

// The size in bytes of the segment length field.
pub const SEGMENT_LENGTH_SIZE: usize = 2;

// The maximum size of the data bytes that fit in a segment.
pub const SEGMENT_MAX_DATA_SIZE: usize = u16::MAX as usize - SEGMENT_LENGTH_SIZE;

pub const JFIF_IDENTIFIER: &[u8; 5] = b"JFIF\0";
pub const ADOBE_IDENTIFIER: &[u8; 5] = b"Adobe";

// Slack added to the entropy-coded size bound for headers and tables.
pub const HEADER_SIZE_BOUND: usize = 2048;
