//! In-memory metadata and preview extraction for camera files.
//!
//! This crate reads the tag maps and embedded JPEG previews of TIFF, JPEG and
//! XMP files and of the vendor RAW containers built on them: Fujifilm RAF,
//! Canon CR3, Panasonic RW2 and Olympus ORF (plus the plain TIFF-based NEF,
//! ARW, DNG and CR2). It can also write metadata back: EXIF and XMP APP1
//! segments into a JPEG, XMP property edits into a packet, and string entries
//! into a TIFF, leaving every other byte untouched.
//!
//! # Design Principles
//!
//! - **Whole buffers**: inputs are byte slices, outputs are new `Vec<u8>`s
//! - **Lazy decoding**: nothing is parsed until metadata or a preview is asked for
//! - **Container agnostic**: one [`Decoder`] over every supported format
//!
//! # Quick Start
//!
//! ```
//! use rawmeta_io::{byte_io::Endian, test_utils::*};
//!
//! # fn main() -> rawmeta_io::Result<()> {
//! let tiff = TiffBuilder::new(Endian::Big).build(
//!     &IfdBuilder::new()
//!         .long(0x0100, 4928)
//!         .long(0x0101, 3264)
//!         .short(0x0112, 6)
//!         .ascii(0x010F, "NIKON CORPORATION"),
//! );
//!
//! let metadata = rawmeta_io::extract_metadata(&tiff)?;
//! assert_eq!(metadata.make.as_deref(), Some("NIKON CORPORATION"));
//! // rotated a quarter turn, so the displayed image is portrait
//! assert_eq!((metadata.width, metadata.height), (Some(3264), Some(4928)));
//! # Ok(())
//! # }
//! ```
//!
//! # Writing XMP into a JPEG
//!
//! ```
//! use rawmeta_io::{test_utils::JpegBuilder, MetadataValue, XmpEncoder, XmpUpdates};
//!
//! # fn main() -> rawmeta_io::Result<()> {
//! let jpeg = JpegBuilder::new(640, 480).build();
//! let xmp = XmpEncoder::encode(&XmpUpdates::new().set("Rating", 1).set("Label", "Red"), None)?;
//! let tagged = rawmeta_io::inject_xmp_metadata(&jpeg, &xmp)?;
//!
//! let raw = rawmeta_io::extract_raw_metadata(&tagged)?;
//! assert_eq!(raw["Rating"], MetadataValue::Integer(1));
//! assert_eq!(raw["Label"], MetadataValue::Text("Red".into()));
//! # Ok(())
//! # }
//! ```

pub mod byte_io;
mod containers;
mod error;
mod metadata;
pub mod normalize;
mod updates;
pub mod xmp;

pub use containers::{
    cr3_io::{BoxInfo, Cr3Decoder},
    detect_from_extension, detect_from_mime,
    fuji_io::{FujiDecoder, FujiHeader},
    jpeg_io::{JpegDecoder, JpegMarker, MarkerKind},
    tiff::{
        codes, find_jpeg_in_range, tags, DataType, Ifd, IfdEntry, IfdId, IfdTree, IfdValue, TiffDecoder,
        TiffEncoder, TiffHeader, TiffVariant, ENTRY_SIZE, MAX_IFD_ENTRIES,
    },
    xmp_io::{XmpDecoder, KEYWORDS_KEY},
    ContainerIO, ContainerKind, Decoder,
};
pub use error::{Error, Result};
pub use metadata::{Metadata, MetadataValue};
pub use normalize::{normalize, NormalizedMetadata, ParsedLens};
pub use updates::{ExtractOptions, MetadataUpdate, XmpUpdates};
pub use xmp::XmpEncoder;

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Container of `bytes`, or `None` when no decoder recognizes it
///
/// Sniffers run in a fixed order: RAF, CR3, TIFF, JPEG, XMP.
pub fn detect(bytes: &[u8]) -> Option<ContainerKind> {
    containers::detect(bytes).ok()
}

/// Decoder for whatever container `bytes` holds
pub fn decoder(bytes: &[u8], options: ExtractOptions) -> Result<Decoder<'_>> {
    Decoder::new(bytes, options)
}

/// Canonical metadata of any supported file
pub fn extract_metadata(bytes: &[u8]) -> Result<NormalizedMetadata> {
    Ok(normalize(extract_raw_metadata(bytes)?))
}

/// The merged tag map, before normalization
pub fn extract_raw_metadata(bytes: &[u8]) -> Result<Metadata> {
    decoder(bytes, ExtractOptions::default())?.extract_metadata()
}

/// The best embedded preview of any supported file
pub fn extract_jpeg(bytes: &[u8], options: &ExtractOptions) -> Result<Vec<u8>> {
    decoder(bytes, options.clone())?.extract_jpeg()
}

/// Writes `exif` (a TIFF block) as the EXIF APP1 segment of `jpeg`
pub fn inject_exif_metadata(jpeg: &[u8], exif: &[u8]) -> Result<Vec<u8>> {
    JpegDecoder::inject_exif_metadata(jpeg, exif)
}

/// Writes `xmp` as the XMP APP1 segment of `jpeg`
pub fn inject_xmp_metadata(jpeg: &[u8], xmp: &[u8]) -> Result<Vec<u8>> {
    JpegDecoder::inject_xmp_metadata(jpeg, xmp)
}

/// Copy of `tiff` with the string entry named `tag_name` set to `value`
pub fn replace_ifd_entry(tiff: &[u8], tag_name: &str, value: &str) -> Result<Vec<u8>> {
    TiffDecoder::new(tiff).replace_ifd_entry(tag_name, value)
}
