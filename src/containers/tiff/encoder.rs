//! Synthetic EXIF block for previews
//!
//! Not a general TIFF writer: only a fixed set of single-value integer
//! entries is written, and nothing that points elsewhere in the file.

use super::{codes, tags, DataType};
use crate::{
    byte_io::{ByteWriter, Endian},
    error::{Error, Result},
    metadata::Metadata,
};

/// Entries copied into the synthetic block, with the type they are written as
const WRITABLE_TAGS: &[(&str, DataType)] = &[
    ("ImageWidth", DataType::Long),
    ("ImageLength", DataType::Long),
    ("Orientation", DataType::Short),
    ("ISO", DataType::Short),
    ("Compression", DataType::Short),
    ("ResolutionUnit", DataType::Short),
    ("PhotometricInterpretation", DataType::Short),
    ("SamplesPerPixel", DataType::Short),
    ("PlanarConfiguration", DataType::Short),
    ("MeteringMode", DataType::Short),
    ("YCbCrPositioning", DataType::Short),
    ("BitsPerSample", DataType::Short),
    ("NewSubfileType", DataType::Long),
    ("CalibrationIlluminant1", DataType::Short),
    ("CalibrationIlluminant2", DataType::Short),
    ("WhiteLevel", DataType::Long),
    ("TileWidth", DataType::Long),
    ("TileLength", DataType::Long),
];

/// Pointers that would dangle once copied out of their file
const DANGLING_TAGS: &[u16] = &[
    codes::SUB_IFD,
    codes::EXIF_OFFSET,
    codes::GPS_INFO,
    codes::STRIP_OFFSETS,
    codes::STRIP_BYTE_COUNTS,
    codes::ROWS_PER_STRIP,
    codes::THUMBNAIL_OFFSET,
    codes::THUMBNAIL_LENGTH,
];

pub struct TiffEncoder;

impl TiffEncoder {
    /// Builds a big-endian TIFF with one IFD at offset 8
    pub fn encode(metadata: &Metadata) -> Result<Vec<u8>> {
        let mut entries: Vec<(u16, DataType, u32)> = WRITABLE_TAGS
            .iter()
            .filter_map(|(name, data_type)| {
                let code = tags::code_of(name)?;
                if DANGLING_TAGS.contains(&code) {
                    return None;
                }
                let value = metadata.get(*name)?.as_i64()?;
                let fits = match data_type {
                    DataType::Short => u16::try_from(value).is_ok(),
                    _ => u32::try_from(value).is_ok(),
                };
                fits.then_some((code, *data_type, value as u32))
            })
            .collect();
        entries.sort_by_key(|(code, _, _)| *code);
        log::debug!("encoding {} entries into synthetic EXIF", entries.len());

        let mut writer = ByteWriter::with_endian(Endian::Big);
        writer.write_bytes(b"MM");
        writer.write_u16(0x002A);
        writer.write_u32(8);

        let count = u16::try_from(entries.len()).map_err(|_| Error::DataTooLarge {
            size: entries.len(),
            max: u16::MAX as usize,
        })?;
        writer.write_u16(count);
        for (code, data_type, value) in entries {
            log::trace!("writing {value} to 0x{code:04X}");
            writer.write_u16(code);
            writer.write_u16(data_type.code());
            writer.write_u32(1);
            writer.write(value.into(), data_type.size())?;
            writer.skip(4 - data_type.size());
        }
        writer.write_u32(0);
        Ok(writer.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{containers::tiff::TiffDecoder, metadata::MetadataValue};

    #[test]
    fn test_encode_layout() {
        let mut metadata = Metadata::new();
        metadata.insert("Orientation".into(), 6.into());
        metadata.insert("ImageWidth".into(), 6000.into());

        let tiff = TiffEncoder::encode(&metadata).unwrap();
        assert_eq!(&tiff[..8], &[0x4D, 0x4D, 0x00, 0x2A, 0, 0, 0, 8]);
        assert_eq!(&tiff[8..10], &[0, 2]);
        // sorted by tag: ImageWidth (0x0100) before Orientation (0x0112)
        assert_eq!(&tiff[10..22], &[0x01, 0x00, 0, 4, 0, 0, 0, 1, 0, 0, 0x17, 0x70]);
        assert_eq!(&tiff[22..34], &[0x01, 0x12, 0, 3, 0, 0, 0, 1, 0, 6, 0, 0]);
        assert_eq!(&tiff[34..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_filters_entries() {
        let mut metadata = Metadata::new();
        metadata.insert("ISO".into(), 70_000.into());
        metadata.insert("Orientation".into(), 1.into());
        metadata.insert("ThumbnailOffset".into(), 1024.into());
        metadata.insert("Make".into(), "Canon".into());
        metadata.insert("ExposureTime".into(), MetadataValue::Float(0.01));
        metadata.insert("TileWidth".into(), (-1).into());

        let tiff = TiffEncoder::encode(&metadata).unwrap();
        let decoded = TiffDecoder::new(&tiff).extract_metadata().unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["Orientation"], MetadataValue::Integer(1));
    }

    #[test]
    fn test_encode_empty() {
        let tiff = TiffEncoder::encode(&Metadata::new()).unwrap();
        assert_eq!(tiff.len(), 14);
        assert!(TiffDecoder::new(&tiff).extract_metadata().unwrap().is_empty());
    }
}
