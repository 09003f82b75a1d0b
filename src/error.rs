//! Error types for rawmeta-io

/// Result type for rawmeta-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding or rewriting an image container
///
/// Every error is terminal for the call that raised it: the input is an
/// immutable byte sequence, so retrying cannot succeed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A read went past the end of the backing bytes
    #[error("Truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Bad magic, endian marker, version, brand or marker byte
    #[error("Unrecognized container: {0}")]
    UnrecognizedContainer(String),

    /// IFD entry data type outside the TIFF 6 set
    #[error("Unsupported data type {data_type} for tag 0x{tag:04X}")]
    UnsupportedDataType { tag: u16, data_type: u16 },

    /// All preview heuristics were exhausted
    #[error("Could not find an embedded preview")]
    NoEmbeddedPreview,

    /// A SubIFD or EXIF pointer referenced bytes that cannot be read
    #[error("Unresolvable sub-IFD at offset {offset}")]
    UnresolvableSubIfd { offset: u32 },

    /// The entry asked to be rewritten is missing, not a string or too short
    #[error("Invalid mutation target: {0}")]
    InvalidMutationTarget(String),

    /// Malformed XMP packet or update payload
    #[error("Invalid XMP: {0}")]
    InvalidXmp(String),

    /// Data size exceeds maximum allowed
    #[error("Data too large: {size} bytes (max: {max})")]
    DataTooLarge { size: usize, max: usize },

    /// Integer does not fit the requested field width
    #[error("Value {value} does not fit in {width} bytes")]
    ValueOverflow { value: u64, width: usize },
}
