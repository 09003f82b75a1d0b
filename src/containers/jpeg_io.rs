//! JPEG marker walker
//!
//! Walks marker segments from SOI up to SOS or EOI, recording each one so
//! that APP1 segments can be swapped out while every other byte is copied
//! through unchanged.

use std::cell::OnceCell;

use super::{tiff::TiffDecoder, xmp_io::XmpDecoder, ContainerIO, ContainerKind};
use crate::{
    byte_io::{ByteReader, ByteWriter},
    error::{Error, Result},
    metadata::{Metadata, MetadataValue},
    updates::ExtractOptions,
};

// JPEG markers
const SOI: u16 = 0xFFD8; // Start of Image
const EOI: u16 = 0xFFD9; // End of Image
const SOS: u16 = 0xFFDA; // Start of Scan (image data follows)
const APP1: u16 = 0xFFE1; // EXIF / XMP

pub const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
pub const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Get human-readable label for a JPEG marker
fn marker_label(marker: u16) -> &'static str {
    match marker {
        SOI => "SOI",
        EOI => "EOI",
        SOS => "SOS",
        0xFFDB => "DQT",
        0xFFC4 => "DHT",
        0xFFDD => "DRI",
        0xFFFE => "COM",
        0xFFE0 => "APP0",
        APP1 => "APP1",
        0xFFE2..=0xFFEF => "APPn",
        m if is_start_of_frame(m) => "SOFn",
        _ => "OTHER",
    }
}

/// Every SOF variant; C4 (DHT), C8 (JPG) and CC (DAC) share the range but are not frames
fn is_start_of_frame(marker: u16) -> bool {
    matches!(marker, 0xFFC0..=0xFFC3 | 0xFFC5..=0xFFC7 | 0xFFC9..=0xFFCB | 0xFFCD..=0xFFCF)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Other,
    Exif,
    Xmp,
}

/// One marker segment
///
/// `data` holds everything after the two marker bytes: the length field and
/// payload for ordinary segments, nothing for SOI, and the rest of the file
/// for the final SOS/EOI marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegMarker<'a> {
    pub marker: u16,
    pub data: &'a [u8],
    pub kind: MarkerKind,
}

impl<'a> JpegMarker<'a> {
    /// APP1 payload with its signature stripped
    pub fn payload(&self) -> Option<&'a [u8]> {
        let signature = match self.kind {
            MarkerKind::Exif => EXIF_SIGNATURE,
            MarkerKind::Xmp => XMP_SIGNATURE,
            MarkerKind::Other => return None,
        };
        self.data.get(2 + signature.len()..)
    }
}

#[derive(Debug)]
struct JpegLayout<'a> {
    markers: Vec<JpegMarker<'a>>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Decoder for JPEG files and embedded JPEG previews
#[derive(Debug)]
pub struct JpegDecoder<'a> {
    bytes: &'a [u8],
    layout: OnceCell<JpegLayout<'a>>,
    metadata: OnceCell<Metadata>,
}

impl<'a> JpegDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            layout: OnceCell::new(),
            metadata: OnceCell::new(),
        }
    }

    /// SOI marker check
    pub fn is_jpeg(bytes: &[u8]) -> bool {
        bytes.starts_with(&[0xFF, 0xD8])
    }

    /// SOI followed by the start of another marker
    pub fn is_likely_jpeg(bytes: &[u8]) -> bool {
        bytes.starts_with(&[0xFF, 0xD8, 0xFF])
    }

    fn layout(&self) -> Result<&JpegLayout<'a>> {
        if let Some(layout) = self.layout.get() {
            return Ok(layout);
        }
        let layout = Self::read_markers(self.bytes)?;
        Ok(self.layout.get_or_init(|| layout))
    }

    fn read_markers(bytes: &'a [u8]) -> Result<JpegLayout<'a>> {
        let mut reader = ByteReader::new(bytes);
        if reader.read_u16()? != SOI {
            return Err(Error::UnrecognizedContainer("missing JPEG SOI marker".into()));
        }

        let mut layout = JpegLayout {
            markers: vec![JpegMarker {
                marker: SOI,
                data: &[],
                kind: MarkerKind::Other,
            }],
            width: None,
            height: None,
        };

        while reader.has_next() {
            let marker = reader.read_u16()?;
            if marker >> 8 != 0xFF {
                return Err(Error::UnrecognizedContainer(format!(
                    "unrecognized JPEG marker 0x{marker:04X} at offset {}",
                    reader.position() - 2
                )));
            }
            if marker == SOS || marker == EOI {
                // no metadata can follow the scan
                let rest = reader.read_as_slice(reader.remaining())?;
                layout.markers.push(JpegMarker {
                    marker,
                    data: rest,
                    kind: MarkerKind::Other,
                });
                break;
            }

            let length = reader.lookahead(|r| r.read_u16())? as usize;
            if length < 2 {
                return Err(Error::UnrecognizedContainer(format!(
                    "{} segment with length {length}",
                    marker_label(marker)
                )));
            }
            let data = reader.read_as_slice(length)?;
            let payload = &data[2..];
            log::trace!("{} (0x{marker:04X}): {} bytes", marker_label(marker), payload.len());

            let kind = match marker {
                APP1 if payload.starts_with(EXIF_SIGNATURE) => MarkerKind::Exif,
                APP1 if payload.starts_with(XMP_SIGNATURE) => MarkerKind::Xmp,
                _ => MarkerKind::Other,
            };
            if is_start_of_frame(marker) {
                let mut frame = ByteReader::new(payload);
                frame.skip(1);
                layout.height = Some(frame.read_u16()?.into());
                layout.width = Some(frame.read_u16()?.into());
            }
            layout.markers.push(JpegMarker { marker, data, kind });
        }

        Ok(layout)
    }

    /// Marker segments in file order, starting with SOI
    pub fn markers(&self) -> Result<&[JpegMarker<'a>]> {
        Ok(&self.layout()?.markers)
    }

    /// Frame dimensions from the SOF segment
    pub fn dimensions(&self) -> Result<(Option<u32>, Option<u32>)> {
        let layout = self.layout()?;
        Ok((layout.width, layout.height))
    }

    fn payloads(&self, kind: MarkerKind) -> Result<impl Iterator<Item = &'a [u8]> + '_> {
        Ok(self
            .layout()?
            .markers
            .iter()
            .filter(move |marker| marker.kind == kind)
            .filter_map(JpegMarker::payload))
    }

    /// TIFF block of the first EXIF APP1 segment
    pub fn exif_payload(&self) -> Result<Option<&'a [u8]>> {
        Ok(self.payloads(MarkerKind::Exif)?.next())
    }

    /// Packet text of the first XMP APP1 segment
    pub fn xmp_payload(&self) -> Result<Option<&'a [u8]>> {
        Ok(self.payloads(MarkerKind::Xmp)?.next())
    }

    /// Frame dimensions, then every EXIF block, then every XMP packet
    pub fn extract_metadata(&self) -> Result<Metadata> {
        if let Some(metadata) = self.metadata.get() {
            return Ok(metadata.clone());
        }

        let mut metadata = Metadata::new();
        let (width, height) = self.dimensions()?;
        if let Some(height) = height {
            metadata.insert("ImageLength".into(), MetadataValue::Integer(height.into()));
        }
        if let Some(width) = width {
            metadata.insert("ImageWidth".into(), MetadataValue::Integer(width.into()));
        }
        for exif in self.payloads(MarkerKind::Exif)? {
            metadata.extend(TiffDecoder::new(exif).extract_metadata()?);
        }
        for xmp in self.payloads(MarkerKind::Xmp)? {
            metadata.extend(XmpDecoder::new(xmp).extract_metadata()?);
        }

        Ok(self.metadata.get_or_init(|| metadata).clone())
    }

    /// A JPEG is its own preview
    pub fn extract_jpeg(&self) -> Result<Vec<u8>> {
        self.layout()?;
        Ok(self.bytes.to_vec())
    }

    /// Replaces the first EXIF APP1 payload, or inserts one right after SOI
    pub fn inject_exif_metadata(jpeg: &[u8], exif: &[u8]) -> Result<Vec<u8>> {
        Self::inject_app1(jpeg, MarkerKind::Exif, exif)
    }

    /// Replaces the first XMP APP1 payload, or inserts one right after SOI
    pub fn inject_xmp_metadata(jpeg: &[u8], xmp: &[u8]) -> Result<Vec<u8>> {
        Self::inject_app1(jpeg, MarkerKind::Xmp, xmp)
    }

    fn inject_app1(jpeg: &[u8], kind: MarkerKind, payload: &[u8]) -> Result<Vec<u8>> {
        let signature = match kind {
            MarkerKind::Exif => EXIF_SIGNATURE,
            _ => XMP_SIGNATURE,
        };
        let size = payload.len() + signature.len() + 2;
        let length = u16::try_from(size).map_err(|_| Error::DataTooLarge {
            size,
            max: u16::MAX as usize,
        })?;

        let decoder = JpegDecoder::new(jpeg);
        let markers = decoder.markers()?;
        let mut pending = true;
        let has_existing = markers.iter().any(|marker| marker.kind == kind);

        let mut writer = ByteWriter::new();
        for marker in markers {
            let replace = pending && marker.kind == kind;
            if !replace {
                writer.write_u16(marker.marker);
                writer.write_bytes(marker.data);
            }
            if replace || (marker.marker == SOI && !has_existing) {
                writer.write_u16(APP1);
                writer.write_u16(length);
                writer.write_bytes(signature);
                writer.write_bytes(payload);
                pending = false;
            }
        }
        log::debug!(
            "{} {kind:?} segment of {size} bytes",
            if has_existing { "replaced" } else { "inserted" }
        );
        Ok(writer.into_bytes())
    }
}

impl<'a> ContainerIO<'a> for JpegDecoder<'a> {
    fn container_type() -> ContainerKind {
        ContainerKind::Jpeg
    }

    fn extensions() -> &'static [&'static str] {
        &["jpg", "jpeg", "jpe", "jfif"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/jpeg", "image/jpg"]
    }

    fn detect(header: &[u8]) -> Option<ContainerKind> {
        Self::is_jpeg(header).then_some(ContainerKind::Jpeg)
    }

    fn with_options(bytes: &'a [u8], _options: ExtractOptions) -> Self {
        JpegDecoder::new(bytes)
    }

    fn extract_metadata(&self) -> Result<Metadata> {
        JpegDecoder::extract_metadata(self)
    }

    fn extract_jpeg(&self) -> Result<Vec<u8>> {
        JpegDecoder::extract_jpeg(self)
    }
}
