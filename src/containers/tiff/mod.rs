//! TIFF container and the TIFF-shaped RAW dialects
//!
//! Standard TIFF/EXIF (and DNG, NEF, ARW...), Olympus ORF and Panasonic RW2
//! share one decoder. The dialect is chosen by the version field that
//! follows the byte order marker and only changes the tag aliases and the
//! vendor preview search.
//!
//! TIFF Structure:
//! - Header: byte order (II/MM), version, first IFD offset
//! - IFD (Image File Directory): entry count, entries (12 bytes each), next IFD offset
//! - Entries: tag (2), type (2), count (4), value/offset (4)

mod encoder;
mod ifd;
mod preview;
pub mod tags;

use std::cell::OnceCell;

pub use encoder::TiffEncoder;
pub use ifd::{DataType, Ifd, IfdEntry, IfdId, IfdTree, IfdValue, ENTRY_SIZE, MAX_IFD_ENTRIES};
pub use preview::find_jpeg_in_range;
pub use tags::codes;

use super::{jpeg_io::JpegDecoder, ContainerIO, ContainerKind};
use crate::{
    byte_io::{ByteReader, Endian},
    error::{Error, Result},
    metadata::Metadata,
    updates::ExtractOptions,
};

const LITTLE_ENDIAN_MARKER: u16 = 0x4949;
const BIG_ENDIAN_MARKER: u16 = 0x4D4D;

const STANDARD_VERSION: u16 = 0x002A;
const OLYMPUS_VERSION: u16 = 0x4F52;
const PANASONIC_VERSION: u16 = 0x0055;

/// TIFF dialect, from the version field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffVariant {
    Standard,
    Olympus,
    Panasonic,
}

impl TiffVariant {
    pub fn from_version(version: u16) -> Option<Self> {
        match version {
            STANDARD_VERSION => Some(TiffVariant::Standard),
            OLYMPUS_VERSION => Some(TiffVariant::Olympus),
            PANASONIC_VERSION => Some(TiffVariant::Panasonic),
            _ => None,
        }
    }
}

/// The 8-byte TIFF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub endian: Endian,
    pub variant: TiffVariant,
    pub first_ifd_offset: u32,
}

impl TiffHeader {
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let endian = match reader.read_u16()? {
            LITTLE_ENDIAN_MARKER => Endian::Little,
            BIG_ENDIAN_MARKER => Endian::Big,
            other => {
                return Err(Error::UnrecognizedContainer(format!(
                    "invalid TIFF byte order marker 0x{other:04X}"
                )))
            }
        };
        reader.set_endian(endian);
        let version = reader.read_u16()?;
        let variant = TiffVariant::from_version(version)
            .ok_or_else(|| Error::UnrecognizedContainer(format!("unknown TIFF version 0x{version:04X}")))?;
        let first_ifd_offset = reader.read_u32()?;
        Ok(Self {
            endian,
            variant,
            first_ifd_offset,
        })
    }
}

/// Decoder for TIFF-based containers
///
/// The header is validated and the IFD tree walked on first use; metadata and
/// the preview are memoized. A decoder is cheap to create and is not `Sync`.
#[derive(Debug)]
pub struct TiffDecoder<'a> {
    bytes: &'a [u8],
    options: ExtractOptions,
    walked: OnceCell<(TiffHeader, IfdTree)>,
    metadata: OnceCell<Metadata>,
    jpeg: OnceCell<Vec<u8>>,
}

impl<'a> TiffDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_options(bytes, ExtractOptions::default())
    }

    pub fn with_options(bytes: &'a [u8], options: ExtractOptions) -> Self {
        Self {
            bytes,
            options,
            walked: OnceCell::new(),
            metadata: OnceCell::new(),
            jpeg: OnceCell::new(),
        }
    }

    /// True when `bytes` starts with a recognized byte order and version
    pub fn is_likely_tiff(bytes: &[u8]) -> bool {
        TiffHeader::read(bytes).is_ok()
    }

    pub fn header(&self) -> Result<TiffHeader> {
        Ok(self.walked()?.0)
    }

    /// Every IFD reachable from the header, in breadth-first order
    pub fn ifds(&self) -> Result<&IfdTree> {
        Ok(&self.walked()?.1)
    }

    fn walked(&self) -> Result<&(TiffHeader, IfdTree)> {
        if let Some(walked) = self.walked.get() {
            return Ok(walked);
        }
        let header = TiffHeader::read(self.bytes)?;
        let mut reader = ByteReader::with_endian(self.bytes, header.endian);
        let tree = IfdTree::walk(&mut reader, header.first_ifd_offset)?;
        log::debug!(
            "read {} IFDs from {:?} TIFF ({:?} endian)",
            tree.len(),
            header.variant,
            header.endian
        );
        Ok(self.walked.get_or_init(|| (header, tree)))
    }

    /// Merged tag map
    ///
    /// Entries outside the EXIF sub-directory go in first, EXIF entries
    /// override them, and the dimensions of a full-resolution SubIFD override
    /// both.
    pub fn extract_metadata(&self) -> Result<Metadata> {
        if let Some(metadata) = self.metadata.get() {
            return Ok(metadata.clone());
        }
        let metadata = self.read_metadata()?;
        Ok(self.metadata.get_or_init(|| metadata).clone())
    }

    fn read_metadata(&self) -> Result<Metadata> {
        let (header, tree) = self.walked()?;
        let mut reader = ByteReader::with_endian(self.bytes, header.endian);

        let mut tags = Metadata::new();
        let mut exif = Metadata::new();
        let mut full_resolution = Metadata::new();
        for (id, ifd) in tree.iter() {
            let target = if tree.is_exif(id, &mut reader)? {
                &mut exif
            } else {
                &mut tags
            };

            for entry in &ifd.entries {
                let alias = match header.variant {
                    TiffVariant::Panasonic => tags::panasonic_alias(entry.tag),
                    _ => None,
                };
                let names: Vec<&str> = entry.name().into_iter().chain(alias).collect();
                if names.is_empty() || matches!(entry.data_type()?, DataType::Undefined | DataType::Unknown) {
                    continue;
                }
                let Some(value) = entry.resolve(&mut reader)?.into_metadata() else {
                    continue;
                };
                log::trace!("{names:?} (0x{:04X}) = {value}", entry.tag);
                for name in names {
                    target.insert(name.to_string(), value.clone());
                }
            }

            if tree.is_sub_ifd(id, &mut reader)? && is_full_resolution(ifd, &mut reader)? {
                for tag in [codes::IMAGE_WIDTH, codes::IMAGE_LENGTH] {
                    let Some(entry) = ifd.entry(tag) else {
                        continue;
                    };
                    if let (Some(name), Some(value)) = (entry.name(), entry.resolve(&mut reader)?.into_metadata()) {
                        full_resolution.insert(name.to_string(), value);
                    }
                }
            }
        }

        tags.extend(exif);
        tags.extend(full_resolution);
        Ok(tags)
    }

    /// The best embedded JPEG, with this file's metadata injected unless
    /// [`ExtractOptions::skip_metadata`] is set
    pub fn extract_jpeg(&self) -> Result<Vec<u8>> {
        if let Some(jpeg) = self.jpeg.get() {
            return Ok(jpeg.clone());
        }
        let (header, tree) = self.walked()?;
        let mut jpeg = preview::find_preview(self.bytes, header, tree, &self.options)?;
        if !self.options.skip_metadata {
            jpeg = Self::inject_metadata_into_jpeg(&jpeg, &self.extract_metadata()?)?;
        }
        Ok(self.jpeg.get_or_init(|| jpeg).clone())
    }

    /// Every entry of every IFD, in walk order
    pub fn entries(&self) -> Result<Vec<IfdEntry>> {
        Ok(self.ifds()?.entries().cloned().collect())
    }

    /// Returns a copy of the TIFF with the string entry `tag_name` set to `value`
    ///
    /// Only out-of-line strings can be replaced, and the replacement must stay
    /// out of line (5 bytes or more with its NUL).
    pub fn replace_ifd_entry(&self, tag_name: &str, value: &str) -> Result<Vec<u8>> {
        let (header, tree) = self.walked()?;
        let entry = tags::code_of(tag_name)
            .and_then(|code| tree.find_entry(code))
            .ok_or_else(|| Error::InvalidMutationTarget(format!("no {tag_name} entry in buffer")))?;
        entry.mutate(self.bytes, header.endian, value)
    }

    /// Writes `metadata` as a synthetic EXIF block into `jpeg`
    ///
    /// Dimensions are dropped first; they describe the RAW, not the preview.
    pub fn inject_metadata_into_jpeg(jpeg: &[u8], metadata: &Metadata) -> Result<Vec<u8>> {
        let mut metadata = metadata.clone();
        for name in ["ImageWidth", "ImageLength", "ExifImageWidth", "ExifImageHeight"] {
            metadata.remove(name);
        }
        let exif = TiffEncoder::encode(&metadata)?;
        JpegDecoder::inject_exif_metadata(jpeg, &exif)
    }
}

fn is_full_resolution(ifd: &Ifd, reader: &mut ByteReader<'_>) -> Result<bool> {
    match ifd.entry(codes::NEW_SUBFILE_TYPE) {
        Some(entry) => Ok(entry.resolve(reader)?.as_u32() == Some(0)),
        None => Ok(true),
    }
}

impl<'a> ContainerIO<'a> for TiffDecoder<'a> {
    fn container_type() -> ContainerKind {
        ContainerKind::Tiff
    }

    fn extensions() -> &'static [&'static str] {
        &["tif", "tiff", "dng", "nef", "arw", "orf", "rw2", "cr2"]
    }

    fn mime_types() -> &'static [&'static str] {
        &[
            "image/tiff",
            "image/x-adobe-dng",
            "image/x-nikon-nef",
            "image/x-sony-arw",
            "image/x-olympus-orf",
            "image/x-panasonic-rw2",
            "image/x-canon-cr2",
        ]
    }

    fn detect(header: &[u8]) -> Option<ContainerKind> {
        Self::is_likely_tiff(header).then_some(ContainerKind::Tiff)
    }

    fn with_options(bytes: &'a [u8], options: ExtractOptions) -> Self {
        TiffDecoder::with_options(bytes, options)
    }

    fn extract_metadata(&self) -> Result<Metadata> {
        TiffDecoder::extract_metadata(self)
    }

    fn extract_jpeg(&self) -> Result<Vec<u8>> {
        TiffDecoder::extract_jpeg(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::MetadataValue,
        test_utils::{IfdBuilder, JpegBuilder, TiffBuilder},
    };

    #[test]
    fn test_header_validation() {
        assert!(matches!(
            TiffHeader::read(b"XX\x00\x2A\x00\x00\x00\x08"),
            Err(Error::UnrecognizedContainer(_))
        ));
        assert!(matches!(
            TiffHeader::read(b"MM\x00\x2B\x00\x00\x00\x08"),
            Err(Error::UnrecognizedContainer(_))
        ));
        assert!(matches!(TiffHeader::read(b"II"), Err(Error::Truncated { .. })));

        let header = TiffHeader::read(b"IIRO\x08\x00\x00\x00").unwrap();
        assert_eq!(header.variant, TiffVariant::Olympus);
        assert_eq!(header.endian, Endian::Little);
        assert_eq!(header.first_ifd_offset, 8);

        let header = TiffHeader::read(b"IIU\x00\x18\x00\x00\x00").unwrap();
        assert_eq!(header.variant, TiffVariant::Panasonic);
    }

    #[test]
    fn test_single_entry_big_endian() {
        let tiff = TiffBuilder::new(Endian::Big).build(&IfdBuilder::new().long(0x0100, 4928));
        let decoder = TiffDecoder::new(&tiff);
        let metadata = decoder.extract_metadata().unwrap();

        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["ImageWidth"], MetadataValue::Integer(4928));
        assert_eq!(decoder.ifds().unwrap().len(), 1);
    }

    #[test]
    fn test_metadata_precedence() {
        let root = IfdBuilder::new()
            .long(0x0100, 160)
            .long(0x0101, 120)
            .ascii(0x010F, "NIKON CORPORATION")
            .short(0x8827, 100)
            .sub_ifd(IfdBuilder::new().long(0x00FE, 1).long(0x0100, 640))
            .sub_ifd(IfdBuilder::new().long(0x00FE, 0).long(0x0100, 6048).long(0x0101, 4024))
            .exif(IfdBuilder::new().short(0x8827, 400).rational(0x829A, 1, 500));
        let tiff = TiffBuilder::new(Endian::Little).build(&root);
        let metadata = TiffDecoder::new(&tiff).extract_metadata().unwrap();

        assert_eq!(metadata["ISO"], MetadataValue::Integer(400), "EXIF overrides IFD0");
        assert_eq!(metadata["ExposureTime"], MetadataValue::Float(0.002));
        assert_eq!(metadata["ImageWidth"], MetadataValue::Integer(6048), "full-resolution SubIFD wins");
        assert_eq!(metadata["ImageLength"], MetadataValue::Integer(4024));
        assert_eq!(metadata["Make"], MetadataValue::Text("NIKON CORPORATION".into()));
    }

    #[test]
    fn test_panasonic_aliases() {
        let root = IfdBuilder::new().short(0x0017, 200).long(0x0118, 4096).ascii(0x010F, "Panasonic");
        let tiff = TiffBuilder::new(Endian::Little).version(0x0055).build(&root);
        let metadata = TiffDecoder::new(&tiff).extract_metadata().unwrap();
        assert_eq!(metadata["ISO"], MetadataValue::Integer(200));
        assert_eq!(metadata["PanasonicJPEGEnd"], MetadataValue::Integer(4096));
        assert_eq!(metadata["MinSampleValue"], MetadataValue::Integer(4096));

        let tiff = TiffBuilder::new(Endian::Little).build(&root);
        let metadata = TiffDecoder::new(&tiff).extract_metadata().unwrap();
        assert!(!metadata.contains_key("ISO"));
    }

    #[test]
    fn test_strip_beats_smaller_thumbnail() {
        let thumbnail = JpegBuilder::new(160, 120).scan_len(400_000).build();
        let strip = JpegBuilder::new(1620, 1080).scan_len(800_000).build();
        let root = IfdBuilder::new()
            .thumbnail(thumbnail)
            .sub_ifd(IfdBuilder::new().jpeg_strip(strip.clone()));
        let tiff = TiffBuilder::new(Endian::Big).build(&root);

        let decoder = TiffDecoder::with_options(&tiff, ExtractOptions::new().skip_metadata(true));
        assert_eq!(decoder.extract_jpeg().unwrap(), strip);
    }

    #[test]
    fn test_large_thumbnail_returned_immediately() {
        let thumbnail = JpegBuilder::new(1620, 1080).scan_len(600_000).build();
        let strip = JpegBuilder::new(6000, 4000).scan_len(700_000).build();
        let root = IfdBuilder::new()
            .thumbnail(thumbnail.clone())
            .sub_ifd(IfdBuilder::new().jpeg_strip(strip));
        let tiff = TiffBuilder::new(Endian::Big).build(&root);

        let decoder = TiffDecoder::with_options(&tiff, ExtractOptions::new().skip_metadata(true));
        assert_eq!(decoder.extract_jpeg().unwrap(), thumbnail);
    }

    #[test]
    fn test_multi_strip_is_not_a_preview() {
        use crate::test_utils::TestValue;

        let root = IfdBuilder::new()
            .short(codes::COMPRESSION, 7)
            .entry(codes::STRIP_OFFSETS, TestValue::Longs(vec![8, 8]))
            .entry(codes::STRIP_BYTE_COUNTS, TestValue::Longs(vec![2, 2]));
        let tiff = TiffBuilder::new(Endian::Big).build(&root);
        assert!(matches!(TiffDecoder::new(&tiff).extract_jpeg(), Err(Error::NoEmbeddedPreview)));
    }

    #[test]
    fn test_preview_gets_metadata_injected() {
        let thumbnail = JpegBuilder::new(160, 120).build();
        let root = IfdBuilder::new()
            .long(0x0100, 6000)
            .short(0x0112, 6)
            .thumbnail(thumbnail)
            .exif(IfdBuilder::new().short(0x8827, 800));
        let tiff = TiffBuilder::new(Endian::Little).build(&root);

        let jpeg = TiffDecoder::new(&tiff).extract_jpeg().unwrap();
        let metadata = JpegDecoder::new(&jpeg).extract_metadata().unwrap();
        assert_eq!(metadata["Orientation"], MetadataValue::Integer(6));
        assert_eq!(metadata["ISO"], MetadataValue::Integer(800));
        assert_eq!(metadata["ImageWidth"], MetadataValue::Integer(160), "SOF width, not the RAW's");
    }

    #[test]
    fn test_olympus_maker_note_preview() {
        let jpeg = JpegBuilder::new(1280, 960).build();
        // camera settings IFD fragment: PreviewImageStart then PreviewImageLength
        let mut maker_note = b"OLYMPUS\0II\x03\0".to_vec();
        maker_note.extend_from_slice(&[0u8; 20]);
        let table = maker_note.len();
        let preview_offset = (table + 24 + 8) as u32;
        maker_note.extend_from_slice(&[0x01, 0x01, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00]);
        maker_note.extend_from_slice(&preview_offset.to_le_bytes());
        maker_note.extend_from_slice(&[0x02, 0x01, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00]);
        maker_note.extend_from_slice(&(jpeg.len() as u32).to_le_bytes());
        maker_note.extend_from_slice(&[0u8; 8]);
        maker_note.extend_from_slice(&jpeg);

        let root = IfdBuilder::new()
            .ascii(0x010F, "OLYMPUS CORPORATION")
            .exif(IfdBuilder::new().undefined(codes::MAKER_NOTE, maker_note));
        let tiff = TiffBuilder::new(Endian::Little).version(0x4F52).build(&root);

        let decoder = TiffDecoder::with_options(&tiff, ExtractOptions::new().skip_metadata(true));
        assert_eq!(decoder.extract_jpeg().unwrap(), jpeg);
    }

    #[test]
    fn test_olympus_signature_at_end_of_maker_note() {
        let jpeg = JpegBuilder::new(1280, 960).build();
        // JPEG first, then the two entries as the last 24 bytes
        let mut maker_note = jpeg.clone();
        maker_note.extend_from_slice(&[0x01, 0x01, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00]);
        maker_note.extend_from_slice(&0u32.to_le_bytes());
        maker_note.extend_from_slice(&[0x02, 0x01, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00]);
        maker_note.extend_from_slice(&(jpeg.len() as u32).to_le_bytes());

        let root = IfdBuilder::new().exif(IfdBuilder::new().undefined(codes::MAKER_NOTE, maker_note));
        let tiff = TiffBuilder::new(Endian::Little).version(0x4F52).build(&root);

        let decoder = TiffDecoder::with_options(&tiff, ExtractOptions::new().skip_metadata(true));
        assert_eq!(decoder.extract_jpeg().unwrap(), jpeg);
    }

    #[test]
    fn test_panasonic_marker_search() {
        let jpeg = JpegBuilder::new(1920, 1080).scan_len(6_000).build();
        let root = IfdBuilder::new().ascii(0x010F, "Panasonic").long(codes::PANASONIC_JPEG_END, 0);
        let mut tiff = TiffBuilder::new(Endian::Little).version(0x0055).build(&root);
        let jpeg_start = tiff.len() + 16;
        tiff.extend_from_slice(&[0u8; 16]);
        tiff.extend_from_slice(&jpeg);
        let raw_offset = tiff.len() as u32;
        tiff.extend_from_slice(&[0u8; 64]);

        // patch PanasonicJPEGEnd (second entry, value slot at 8 + 2 + 12 + 8)
        tiff[30..34].copy_from_slice(&raw_offset.to_le_bytes());

        let decoder = TiffDecoder::with_options(&tiff, ExtractOptions::new().skip_metadata(true));
        assert_eq!(decoder.extract_jpeg().unwrap(), &tiff[jpeg_start..jpeg_start + jpeg.len()]);
    }

    #[test]
    fn test_replace_ifd_entry() {
        let tiff = TiffBuilder::new(Endian::Big).build(&IfdBuilder::new().ascii(0x0110, "DMC-GH4").short(0x0112, 1));
        let out = TiffDecoder::new(&tiff).replace_ifd_entry("Model", "DC-GH5S").unwrap();
        assert_eq!(out.len(), tiff.len());
        let metadata = TiffDecoder::new(&out).extract_metadata().unwrap();
        assert_eq!(metadata["Model"], MetadataValue::Text("DC-GH5S".into()));

        assert!(matches!(
            TiffDecoder::new(&tiff).replace_ifd_entry("Make", "Leica"),
            Err(Error::InvalidMutationTarget(_))
        ));
    }
}
