//! Fujifilm RAF container I/O
//!
//! A RAF file opens with a fixed header that points straight at a full JPEG,
//! EXIF included. Both the preview and the metadata come from that JPEG.

use std::cell::OnceCell;

use super::{jpeg_io::JpegDecoder, ContainerIO, ContainerKind};
use crate::{
    byte_io::{ByteReader, Endian},
    error::{Error, Result},
    metadata::Metadata,
    updates::ExtractOptions,
};

pub const FUJI_MAGIC: &[u8] = b"FUJIFILMCCD-RAW";

const KNOWN_VERSIONS: &[&str] = &["0200", "0201"];

/// Directory version and unknown bytes between the camera name and the JPEG pointer
const DIRECTORY_SKIP: usize = 24;

/// Fields of the RAF header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FujiHeader {
    pub version: String,
    /// Hex of the 8 byte camera id
    pub camera_id: String,
    pub camera_name: String,
    pub jpeg_offset: usize,
    pub jpeg_length: usize,
}

impl FujiHeader {
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::with_endian(bytes, Endian::Big);
        let magic = reader.read_as_slice(FUJI_MAGIC.len())?;
        if magic != FUJI_MAGIC {
            return Err(Error::UnrecognizedContainer("missing FUJIFILMCCD-RAW marker".into()));
        }
        reader.skip(1); // NUL terminator

        let version = reader.read_as_string(4)?;
        if !KNOWN_VERSIONS.contains(&version.as_str()) {
            return Err(Error::UnrecognizedContainer(format!("unrecognized Fuji version {version:?}")));
        }

        let camera_id = reader.read_as_hex(8)?;
        let camera_name = reader.read_as_string(32)?.trim_end_matches('\0').to_string();
        log::debug!("read from fujifilm raf - {camera_name} ({camera_id})");

        reader.skip(DIRECTORY_SKIP);
        let jpeg_offset = reader.read_u32()? as usize;
        let jpeg_length = reader.read_u32()? as usize;

        Ok(Self {
            version,
            camera_id,
            camera_name,
            jpeg_offset,
            jpeg_length,
        })
    }
}

/// Decoder for Fujifilm RAF files
///
/// The embedded JPEG already carries the camera's EXIF, so it is returned as
/// stored whatever the [`ExtractOptions`].
#[derive(Debug)]
pub struct FujiDecoder<'a> {
    bytes: &'a [u8],
    header: OnceCell<FujiHeader>,
}

impl<'a> FujiDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            header: OnceCell::new(),
        }
    }

    pub fn is_likely_fuji(bytes: &[u8]) -> bool {
        bytes.starts_with(FUJI_MAGIC)
    }

    pub fn header(&self) -> Result<&FujiHeader> {
        if let Some(header) = self.header.get() {
            return Ok(header);
        }
        let header = FujiHeader::read(self.bytes)?;
        Ok(self.header.get_or_init(|| header))
    }

    fn jpeg(&self) -> Result<&'a [u8]> {
        let header = self.header()?;
        let mut reader = ByteReader::new(self.bytes);
        reader.seek(header.jpeg_offset);
        reader.read_as_slice(header.jpeg_length)
    }

    pub fn extract_jpeg(&self) -> Result<Vec<u8>> {
        Ok(self.jpeg()?.to_vec())
    }

    pub fn extract_metadata(&self) -> Result<Metadata> {
        JpegDecoder::new(self.jpeg()?).extract_metadata()
    }
}

impl<'a> ContainerIO<'a> for FujiDecoder<'a> {
    fn container_type() -> ContainerKind {
        ContainerKind::Fuji
    }

    fn extensions() -> &'static [&'static str] {
        &["raf"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/x-fuji-raf"]
    }

    fn detect(header: &[u8]) -> Option<ContainerKind> {
        Self::is_likely_fuji(header).then_some(ContainerKind::Fuji)
    }

    fn with_options(bytes: &'a [u8], _options: ExtractOptions) -> Self {
        FujiDecoder::new(bytes)
    }

    fn extract_metadata(&self) -> Result<Metadata> {
        FujiDecoder::extract_metadata(self)
    }

    fn extract_jpeg(&self) -> Result<Vec<u8>> {
        FujiDecoder::extract_jpeg(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::MetadataValue,
        test_utils::{raf_bytes, IfdBuilder, JpegBuilder, TiffBuilder, RAF_JPEG_OFFSET},
    };

    fn jpeg() -> Vec<u8> {
        let exif = TiffBuilder::new(Endian::Big).build(
            &IfdBuilder::new()
                .ascii(0x010F, "FUJIFILM")
                .ascii(0x0110, "X-T10")
                .exif(IfdBuilder::new().short(0x8827, 1600)),
        );
        JpegBuilder::new(1920, 1280).exif(exif).build()
    }

    #[test]
    fn test_fuji_header() {
        let raf = raf_bytes("0201", &jpeg());
        let decoder = FujiDecoder::new(&raf);
        let header = decoder.header().unwrap();
        assert_eq!(header.version, "0201");
        assert_eq!(header.camera_id, hex::encode(b"FF129502"));
        assert_eq!(header.camera_name, "X-T3");
        assert_eq!(header.jpeg_offset, RAF_JPEG_OFFSET);
        assert_eq!(FujiDecoder::detect(&raf), Some(ContainerKind::Fuji));
    }

    #[test]
    fn test_fuji_extract_jpeg() {
        let jpeg = jpeg();
        let raf = raf_bytes("0200", &jpeg);
        assert_eq!(FujiDecoder::new(&raf).extract_jpeg().unwrap(), jpeg);
    }

    #[test]
    fn test_fuji_metadata_from_jpeg() {
        let raf = raf_bytes("0201", &jpeg());
        let metadata = FujiDecoder::new(&raf).extract_metadata().unwrap();
        assert_eq!(metadata["Make"], MetadataValue::Text("FUJIFILM".into()));
        assert_eq!(metadata["Model"], MetadataValue::Text("X-T10".into()));
        assert_eq!(metadata["ISO"], MetadataValue::Integer(1600));
        assert_eq!(metadata["ImageWidth"], MetadataValue::Integer(1920));
        assert_eq!(metadata["ImageLength"], MetadataValue::Integer(1280));
    }

    #[test]
    fn test_fuji_unknown_version() {
        let raf = raf_bytes("0300", &jpeg());
        assert!(matches!(
            FujiDecoder::new(&raf).extract_jpeg(),
            Err(Error::UnrecognizedContainer(_))
        ));
    }

    #[test]
    fn test_fuji_bad_magic() {
        let mut raf = raf_bytes("0201", &jpeg());
        raf[0] = b'X';
        assert_eq!(FujiDecoder::detect(&raf), None);
        assert!(matches!(
            FujiDecoder::new(&raf).extract_metadata(),
            Err(Error::UnrecognizedContainer(_))
        ));
    }

    #[test]
    fn test_fuji_truncated_jpeg() {
        let mut raf = raf_bytes("0201", &jpeg());
        raf.truncate(RAF_JPEG_OFFSET + 10);
        assert!(matches!(
            FujiDecoder::new(&raf).extract_jpeg(),
            Err(Error::Truncated { offset, .. }) if offset == RAF_JPEG_OFFSET
        ));
    }
}
