use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegError {
    #[error("Invalid data")]
    InvalidData = 1,
    #[error("Destination too small")]
    DestinationTooSmall = 2,
    #[error("Source too small")]
    SourceTooSmall = 3,
    #[error("JPEG marker start byte not found")]
    JpegMarkerStartByteNotFound = 10,
    #[error("Start of image marker not found")]
    StartOfImageMarkerNotFound = 11,
    #[error("Unknown JPEG marker found")]
    UnknownJpegMarkerFound = 12,
    #[error("Unexpected start of scan marker")]
    UnexpectedStartOfScanMarker = 13,
    #[error("Invalid marker segment size")]
    InvalidMarkerSegmentSize = 14,
    #[error("Duplicate start of image marker")]
    DuplicateStartOfImageMarker = 15,
    #[error("Duplicate start of frame marker")]
    DuplicateStartOfFrameMarker = 16,
    #[error("Duplicate component ID in SOF segment")]
    DuplicateComponentIdInSofSegment = 17,
    #[error("Unexpected end of image marker")]
    UnexpectedEndOfImageMarker = 18,
    #[error("Unexpected restart marker")]
    UnexpectedRestartMarker = 19,
    #[error("Define number of lines marker not supported")]
    DefineNumberOfLinesNotSupported = 20,
    #[error("Unknown component ID")]
    UnknownComponentId = 21,
    #[error("Duplicate component ID in SOS segment")]
    DuplicateComponentIdInScan = 22,
    #[error("Invalid quantization table")]
    InvalidQuantizationTable = 23,
    #[error("Invalid Huffman table")]
    InvalidHuffmanTable = 24,
    #[error("Quantization table referenced but not defined")]
    MissingQuantizationTable = 25,
    #[error("Huffman table referenced but not defined")]
    MissingHuffmanTable = 26,
    #[error("Invalid scan parameters")]
    InvalidScanParameters = 27,
    #[error("Too many blocks in MCU")]
    TooManyBlocksInMcu = 28,
    #[error("Invalid sampling factor")]
    InvalidSamplingFactor = 29,
    #[error("Invalid parameter width")]
    InvalidParameterWidth = 30,
    #[error("Invalid parameter height")]
    InvalidParameterHeight = 31,
    #[error("Invalid parameter component count")]
    InvalidParameterComponentCount = 32,
    #[error("Unsupported sample precision")]
    UnsupportedPrecision = 33,
    #[error("Progressive JPEG not supported")]
    ProgressiveNotSupported = 34,
    #[error("Lossless JPEG not supported")]
    LosslessNotSupported = 35,
    #[error("Hierarchical JPEG not supported")]
    HierarchicalNotSupported = 36,
    #[error("Arithmetic coding not supported")]
    ArithmeticCodingNotSupported = 37,
    #[error("Too many scans")]
    TooManyScans = 38,
    #[error("No image data before end of image")]
    MissingScanData = 39,

    // Recoverable corruption, raised as errors only when stopping on warnings
    #[error("Premature end of JPEG data")]
    PrematureEndOfData = 60,
    #[error("Corrupt JPEG data: bad Huffman code")]
    CorruptHuffmanCode = 61,
    #[error("Corrupt JPEG data: restart marker mismatch")]
    RestartMarkerMismatch = 62,
    #[error("Corrupt JPEG data: extraneous bytes before marker")]
    ExtraneousBytesBeforeMarker = 63,

    // Logic errors
    #[error("Invalid operation")]
    InvalidOperation = 100,
    #[error("Invalid argument")]
    InvalidArgument = 101,
    #[error("Invalid argument width")]
    InvalidArgumentWidth = 102,
    #[error("Invalid argument height")]
    InvalidArgumentHeight = 103,
    #[error("Invalid argument pitch")]
    InvalidArgumentPitch = 104,
    #[error("Invalid argument quality")]
    InvalidArgumentQuality = 105,
    #[error("Invalid argument pixel format")]
    InvalidArgumentPixelFormat = 106,
    #[error("Invalid argument subsampling")]
    InvalidArgumentSubsampling = 107,
    #[error("Invalid argument scaling factor")]
    InvalidArgumentScalingFactor = 108,
    #[error("Invalid argument transform operation")]
    InvalidArgumentTransformOperation = 109,
    #[error("Unsupported color conversion")]
    UnsupportedColorConversion = 110,
    #[error("Transform is not perfect")]
    NonPerfectTransform = 111,
    #[error("Invalid crop region")]
    InvalidCropRegion = 112,
    #[error("Cannot transform this image to grayscale")]
    CannotTransformToGrayscale = 113,
    #[error("Tensor shape does not match pixel format")]
    TensorShapeMismatch = 114,
    #[error("Images in batch have different dimensions")]
    BatchDimensionMismatch = 115,
    #[error("Empty batch")]
    EmptyBatch = 116,
    #[error("Image exceeds the configured pixel limit")]
    ImageTooLarge = 117,
}

/// Recoverable stream corruption. Decoding continues past these unless the
/// caller asked to stop on the first warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegWarning {
    PrematureEndOfData,
    CorruptHuffmanCode,
    RestartMarkerMismatch,
    ExtraneousBytesBeforeMarker,
}

impl From<JpegWarning> for JpegError {
    fn from(warning: JpegWarning) -> Self {
        match warning {
            JpegWarning::PrematureEndOfData => JpegError::PrematureEndOfData,
            JpegWarning::CorruptHuffmanCode => JpegError::CorruptHuffmanCode,
            JpegWarning::RestartMarkerMismatch => JpegError::RestartMarkerMismatch,
            JpegWarning::ExtraneousBytesBeforeMarker => JpegError::ExtraneousBytesBeforeMarker,
        }
    }
}

impl std::fmt::Display for JpegWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", JpegError::from(*self))
    }
}
