//! Synthetic fixture builders for tests.
//!
//! Real camera files are large and not redistributable, so tests assemble
//! byte-exact containers in memory instead:
//! - [`TiffBuilder`] / [`IfdBuilder`]: TIFF headers and nested IFD trees
//! - [`JpegBuilder`]: baseline JPEGs with optional EXIF/XMP APP1 segments
//! - [`cr3_bytes`]: ISO-BMFF CR3 files with CMT metadata boxes and PRVW previews
//! - [`raf_bytes`]: Fujifilm RAF headers pointing at an embedded JPEG
//!
//! # Usage
//!
//! ```
//! use rawmeta_io::{byte_io::Endian, test_utils::*};
//!
//! let tiff = TiffBuilder::new(Endian::Big).build(&IfdBuilder::new().long(0x0100, 4928));
//! assert_eq!(&tiff[..4], &[0x4D, 0x4D, 0x00, 0x2A]);
//! ```

use crate::byte_io::{ByteWriter, Endian};
use crate::containers::tiff::{codes, DataType};

/// Value of a synthetic IFD entry
#[derive(Debug, Clone)]
pub enum TestValue {
    Short(u16),
    Long(u32),
    Longs(Vec<u32>),
    Ascii(String),
    Rational(u32, u32),
    SignedRational(i32, i32),
    Undefined(Vec<u8>),
    /// A LONG holding the offset of these bytes, placed in the data area
    Blob(Vec<u8>),
    /// Arbitrary type/count/bytes, for malformed entries
    Raw {
        data_type: u16,
        count: u32,
        bytes: Vec<u8>,
    },
}

/// One directory and everything hanging off it
#[derive(Debug, Clone, Default)]
pub struct IfdBuilder {
    entries: Vec<(u16, TestValue)>,
    sub_ifds: Vec<IfdBuilder>,
    exif: Option<Box<IfdBuilder>>,
    next: Option<Box<IfdBuilder>>,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, tag: u16, value: TestValue) -> Self {
        self.entries.push((tag, value));
        self
    }

    pub fn short(self, tag: u16, value: u16) -> Self {
        self.entry(tag, TestValue::Short(value))
    }

    pub fn long(self, tag: u16, value: u32) -> Self {
        self.entry(tag, TestValue::Long(value))
    }

    pub fn ascii(self, tag: u16, value: &str) -> Self {
        self.entry(tag, TestValue::Ascii(value.to_string()))
    }

    pub fn rational(self, tag: u16, numerator: u32, denominator: u32) -> Self {
        self.entry(tag, TestValue::Rational(numerator, denominator))
    }

    pub fn undefined(self, tag: u16, bytes: Vec<u8>) -> Self {
        self.entry(tag, TestValue::Undefined(bytes))
    }

    /// `ThumbnailOffset`/`ThumbnailLength` pointing at `jpeg`
    pub fn thumbnail(self, jpeg: Vec<u8>) -> Self {
        let len = jpeg.len() as u32;
        self.entry(codes::THUMBNAIL_OFFSET, TestValue::Blob(jpeg))
            .long(codes::THUMBNAIL_LENGTH, len)
    }

    /// A single JPEG-compressed strip
    pub fn jpeg_strip(self, jpeg: Vec<u8>) -> Self {
        let len = jpeg.len() as u32;
        self.short(codes::COMPRESSION, 7)
            .entry(codes::STRIP_OFFSETS, TestValue::Blob(jpeg))
            .long(codes::STRIP_BYTE_COUNTS, len)
    }

    pub fn sub_ifd(mut self, child: IfdBuilder) -> Self {
        self.sub_ifds.push(child);
        self
    }

    pub fn exif(mut self, child: IfdBuilder) -> Self {
        self.exif = Some(Box::new(child));
        self
    }

    pub fn next(mut self, sibling: IfdBuilder) -> Self {
        self.next = Some(Box::new(sibling));
        self
    }
}

/// Assembles a TIFF byte stream with the root IFD at offset 8
#[derive(Debug, Clone)]
pub struct TiffBuilder {
    endian: Endian,
    version: u16,
}

impl TiffBuilder {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            version: 0x002A,
        }
    }

    /// Vendor version marker (0x4F52 Olympus, 0x0055 Panasonic)
    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn build(&self, root: &IfdBuilder) -> Vec<u8> {
        let mut writer = ByteWriter::with_endian(self.endian);
        writer.write_bytes(match self.endian {
            Endian::Big => b"MM",
            Endian::Little => b"II",
        });
        writer.write_u16(self.version);
        writer.write_u32(8);
        write_ifd(&mut writer, root);
        writer.into_bytes()
    }
}

fn encode(endian: Endian, value: &TestValue) -> (u16, u32, Vec<u8>) {
    let mut writer = ByteWriter::with_endian(endian);
    let (data_type, count) = match value {
        TestValue::Short(v) => {
            writer.write_u16(*v);
            (DataType::Short.code(), 1)
        }
        TestValue::Long(v) => {
            writer.write_u32(*v);
            (DataType::Long.code(), 1)
        }
        TestValue::Longs(values) => {
            values.iter().for_each(|v| writer.write_u32(*v));
            (DataType::Long.code(), values.len() as u32)
        }
        TestValue::Ascii(text) => {
            writer.write_str(text);
            (DataType::Ascii.code(), text.len() as u32 + 1)
        }
        TestValue::Rational(n, d) => {
            writer.write_u32(*n);
            writer.write_u32(*d);
            (DataType::Rational.code(), 1)
        }
        TestValue::SignedRational(n, d) => {
            writer.write_u32(*n as u32);
            writer.write_u32(*d as u32);
            (DataType::SignedRational.code(), 1)
        }
        TestValue::Undefined(bytes) => {
            writer.write_bytes(bytes);
            (DataType::Undefined.code(), bytes.len() as u32)
        }
        TestValue::Blob(_) => {
            writer.write_u32(0);
            (DataType::Long.code(), 1)
        }
        TestValue::Raw {
            data_type,
            count,
            bytes,
        } => {
            writer.write_bytes(bytes);
            (*data_type, *count)
        }
    };
    (data_type, count, writer.into_bytes())
}

fn patch_u32(writer: &mut ByteWriter, position: usize, value: u32) {
    writer.seek(position);
    writer.write_u32(value);
    let end = writer.len();
    writer.seek(end);
}

fn append(writer: &mut ByteWriter, bytes: &[u8]) -> u32 {
    let offset = writer.len();
    writer.seek(offset);
    writer.write_bytes(bytes);
    offset as u32
}

/// Writes `ifd` at the end of the buffer, followed by its data and children
fn write_ifd(writer: &mut ByteWriter, ifd: &IfdBuilder) -> u32 {
    let endian = writer.endian();
    let offset = writer.len();
    writer.seek(offset);

    let pointer_count = usize::from(!ifd.sub_ifds.is_empty()) + usize::from(ifd.exif.is_some());
    writer.write_u16((ifd.entries.len() + pointer_count) as u16);

    let mut out_of_line = Vec::new();
    let mut blobs = Vec::new();
    for (tag, value) in &ifd.entries {
        let (data_type, count, bytes) = encode(endian, value);
        writer.write_u16(*tag);
        writer.write_u16(data_type);
        writer.write_u32(count);
        let slot = writer.position();
        if let TestValue::Blob(blob) = value {
            blobs.push((slot, blob));
            writer.write_u32(0);
        } else if bytes.len() <= 4 {
            let mut padded = bytes.clone();
            padded.resize(4, 0);
            writer.write_bytes(&padded);
        } else {
            out_of_line.push((slot, bytes));
            writer.write_u32(0);
        }
    }

    let mut sub_slot = None;
    if !ifd.sub_ifds.is_empty() {
        writer.write_u16(codes::SUB_IFD);
        writer.write_u16(DataType::Long.code());
        writer.write_u32(ifd.sub_ifds.len() as u32);
        sub_slot = Some(writer.position());
        writer.write_u32(0);
    }
    let mut exif_slot = None;
    if ifd.exif.is_some() {
        writer.write_u16(codes::EXIF_OFFSET);
        writer.write_u16(DataType::Long.code());
        writer.write_u32(1);
        exif_slot = Some(writer.position());
        writer.write_u32(0);
    }
    let next_slot = writer.position();
    writer.write_u32(0);

    for (slot, bytes) in out_of_line {
        let data_offset = append(writer, &bytes);
        patch_u32(writer, slot, data_offset);
    }
    for (slot, blob) in blobs {
        let data_offset = append(writer, blob);
        patch_u32(writer, slot, data_offset);
    }

    let child_offsets: Vec<u32> = ifd.sub_ifds.iter().map(|child| write_ifd(writer, child)).collect();
    if let Some(slot) = sub_slot {
        if let [single] = child_offsets.as_slice() {
            patch_u32(writer, slot, *single);
        } else {
            let mut list = ByteWriter::with_endian(endian);
            child_offsets.iter().for_each(|o| list.write_u32(*o));
            let list_offset = append(writer, list.as_bytes());
            patch_u32(writer, slot, list_offset);
        }
    }
    if let (Some(slot), Some(exif)) = (exif_slot, &ifd.exif) {
        let exif_offset = write_ifd(writer, exif);
        patch_u32(writer, slot, exif_offset);
    }
    if let Some(next) = &ifd.next {
        let next_offset = write_ifd(writer, next);
        patch_u32(writer, next_slot, next_offset);
    }

    offset as u32
}

/// Baseline JPEG with a SOF0 frame and filler scan data
#[derive(Debug, Clone)]
pub struct JpegBuilder {
    width: u16,
    height: u16,
    scan_len: usize,
    exif: Option<Vec<u8>>,
    xmp: Option<Vec<u8>>,
}

impl JpegBuilder {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            scan_len: 64,
            exif: None,
            xmp: None,
        }
    }

    /// Number of entropy-coded bytes; they never contain 0xFF
    pub fn scan_len(mut self, scan_len: usize) -> Self {
        self.scan_len = scan_len;
        self
    }

    /// TIFF block to carry in an `Exif\0\0` APP1 segment
    pub fn exif(mut self, tiff: Vec<u8>) -> Self {
        self.exif = Some(tiff);
        self
    }

    /// XMP text to carry in an Adobe APP1 segment
    pub fn xmp(mut self, xmp: &str) -> Self {
        self.xmp = Some(xmp.as_bytes().to_vec());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_u16(0xFFD8);

        // JFIF APP0
        writer.write_u16(0xFFE0);
        writer.write_u16(16);
        writer.write_bytes(b"JFIF\0");
        writer.write_bytes(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);

        if let Some(exif) = &self.exif {
            writer.write_u16(0xFFE1);
            writer.write_u16((exif.len() + 8) as u16);
            writer.write_bytes(b"Exif\0\0");
            writer.write_bytes(exif);
        }
        if let Some(xmp) = &self.xmp {
            writer.write_u16(0xFFE1);
            writer.write_u16((xmp.len() + 31) as u16);
            writer.write_bytes(b"http://ns.adobe.com/xap/1.0/\0");
            writer.write_bytes(xmp);
        }

        writer.write_u16(0xFFC0);
        writer.write_u16(17);
        writer.write_u8(8);
        writer.write_u16(self.height);
        writer.write_u16(self.width);
        writer.write_u8(3);
        for component in 1..=3u8 {
            writer.write_bytes(&[component, 0x11, 0]);
        }

        writer.write_u16(0xFFDA);
        writer.write_u16(12);
        writer.write_u8(3);
        for component in 1..=3u8 {
            writer.write_bytes(&[component, 0]);
        }
        writer.write_bytes(&[0, 63, 0]);

        let scan: Vec<u8> = (0..self.scan_len).map(|i| (i % 251) as u8).collect();
        writer.write_bytes(&scan);
        writer.write_u16(0xFFD9);
        writer.into_bytes()
    }
}

const PRIMARY_UUID: [u8; 16] = [
    0x85, 0xc0, 0xb6, 0x87, 0x82, 0x0f, 0x11, 0xe0, 0x81, 0x11, 0xf4, 0xce, 0x46, 0x2b, 0x6a, 0x48,
];
const PREVIEW_UUID: [u8; 16] = [
    0xea, 0xf4, 0x2b, 0x5e, 0x1c, 0x98, 0x4b, 0x88, 0xb9, 0xfb, 0xb7, 0xdc, 0x40, 0x6e, 0x4d, 0x16,
];

fn bmff_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer.write_u32((payload.len() + 8) as u32);
    writer.write_bytes(fourcc);
    writer.write_bytes(payload);
    writer.into_bytes()
}

/// A CR3 file: `ftyp`, `moov` holding the metadata uuid box, then a preview uuid box
///
/// `cmt` pairs are (box type, TIFF block); `previews` are (width, height, JPEG).
pub fn cr3_bytes(cmt: &[(&[u8; 4], Vec<u8>)], previews: &[(u16, u16, Vec<u8>)]) -> Vec<u8> {
    let mut ftyp = Vec::new();
    ftyp.extend_from_slice(b"crx ");
    ftyp.extend_from_slice(&1u32.to_be_bytes());
    ftyp.extend_from_slice(b"crx isom");

    let mut primary = PRIMARY_UUID.to_vec();
    for (fourcc, tiff) in cmt {
        primary.extend(bmff_box(fourcc, tiff));
    }
    let moov = bmff_box(b"moov", &bmff_box(b"uuid", &primary));

    let mut preview = PREVIEW_UUID.to_vec();
    preview.extend_from_slice(&[0u8; 8]);
    for (width, height, jpeg) in previews {
        let mut writer = ByteWriter::new();
        writer.write_bytes(&[0u8; 6]);
        writer.write_u16(*width);
        writer.write_u16(*height);
        writer.write_bytes(&[0u8; 2]);
        writer.write_u32(jpeg.len() as u32);
        writer.write_bytes(jpeg);
        preview.extend(bmff_box(b"PRVW", writer.as_bytes()));
    }

    let mut out = bmff_box(b"ftyp", &ftyp);
    out.extend(moov);
    out.extend(bmff_box(b"uuid", &preview));
    out
}

/// Offset of the embedded JPEG inside [`raf_bytes`] output
pub const RAF_JPEG_OFFSET: usize = 100;

/// A Fujifilm RAF header followed by `jpeg`
pub fn raf_bytes(version: &str, jpeg: &[u8]) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer.write_bytes(b"FUJIFILMCCD-RAW");
    writer.write_u8(0);
    writer.write_bytes(version.as_bytes());
    writer.write_bytes(b"FF129502");
    let mut name = b"X-T3".to_vec();
    name.resize(32, 0);
    writer.write_bytes(&name);
    writer.write_bytes(&[0u8; 24]);
    writer.write_u32(RAF_JPEG_OFFSET as u32);
    writer.write_u32(jpeg.len() as u32);
    writer.seek(RAF_JPEG_OFFSET);
    writer.write_bytes(jpeg);
    writer.into_bytes()
}
