//! Canon CR3 container I/O
//!
//! CR3 is ISO-BMFF. Canon keeps its TIFF metadata blocks (`CMT1`-`CMT4`,
//! `CMTA`) inside a vendor `uuid` box under `moov`, and its JPEG previews
//! (`PRVW`) inside a second top-level `uuid` box.
//!
//! Reference: ISO/IEC 14496-12:2022

use std::{cell::OnceCell, collections::HashMap, fmt, ops::Range};

use atree::{Arena, Token};

use super::{tiff::TiffDecoder, ContainerIO, ContainerKind};
use crate::{
    byte_io::{ByteReader, Endian},
    error::{Error, Result},
    metadata::Metadata,
    updates::ExtractOptions,
};

const HEADER_SIZE: usize = 8; // 4 byte size + 4 byte type
const UUID_SIZE: usize = 16;

/// Boxes whose payload is a list of child boxes
const NESTED_BOX_TYPES: &[&str] = &["moov", "trak", "mdia", "minf", "dinf", "stbl"];

/// Boxes holding a complete TIFF structure
const TIFF_BOX_TYPES: &[&str] = &["CMT1", "CMT2", "CMT3", "CMT4", "CMTA"];

const UUID_PRIMARY: &str = "85c0b687820f11e08111f4ce462b6a48";
const UUID_PREVIEW: &str = "eaf42b5e1c984b88b9fbb7dc406e4d16";

/// Bytes between the preview uuid and its first child box
const PREVIEW_UUID_PADDING: usize = 8;

/// Deeper nesting is left unread
const MAX_BOX_DEPTH: usize = 16;

/// Box information stored in the tree structure
#[derive(Clone, Debug, PartialEq)]
pub struct BoxInfo {
    path: String,
    /// Offset of the box header
    pub offset: usize,
    /// Full box size, header included
    pub size: usize,
    /// Offset of the first payload byte
    pub data_offset: usize,
}

impl BoxInfo {
    /// Four character type
    pub fn fourcc(&self) -> &str {
        &self.path
    }

    pub fn data_range(&self) -> Range<usize> {
        self.data_offset..self.offset + self.size
    }
}

struct BoxHeader {
    fourcc: String,
    size: usize,
}

impl BoxHeader {
    /// Reads the header at the cursor; `end` bounds the enclosing box
    fn read(reader: &mut ByteReader<'_>, end: usize) -> Result<Self> {
        let start = reader.position();
        let size = reader.read_u32()?;
        let fourcc = reader.read_as_string(4)?;

        let size = match size {
            // 64-bit largesize follows the type; no camera file seen so far uses it
            1 => usize::try_from(reader.read_u64()?).unwrap_or(usize::MAX),
            // runs to the end of the enclosing box
            0 => end - start,
            size => size as usize,
        };

        let header_len = reader.position() - start;
        if size < header_len || size > end - start {
            return Err(Error::Truncated {
                offset: start,
                needed: size,
                available: end - start,
            });
        }
        Ok(Self { fourcc, size })
    }
}

/// Arena of every box read, plus lookup by path (`/moov/uuid/CMT1`)
struct BoxTree {
    arena: Arena<BoxInfo>,
    paths: HashMap<String, Vec<Token>>,
    order: Vec<Token>,
}

impl fmt::Debug for BoxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxTree").field("boxes", &self.order.len()).finish()
    }
}

impl BoxTree {
    fn read(bytes: &[u8]) -> Result<Self> {
        let root = BoxInfo {
            path: String::new(),
            offset: 0,
            size: bytes.len(),
            data_offset: 0,
        };
        let (arena, root) = Arena::with_data(root);
        let mut tree = Self {
            arena,
            paths: HashMap::new(),
            order: Vec::new(),
        };

        let mut reader = ByteReader::with_endian(bytes, Endian::Big);
        tree.build(&mut reader, 0, bytes.len(), &root, 0)?;
        Ok(tree)
    }

    fn path_from_token(&self, token: &Token) -> String {
        let mut path = self.arena[*token].data.path.clone();
        for parent in token.ancestors(&self.arena) {
            path = format!("{}/{}", parent.data.path, path);
        }
        path
    }

    fn build(&mut self, reader: &mut ByteReader<'_>, start: usize, end: usize, parent: &Token, depth: usize) -> Result<()> {
        if depth > MAX_BOX_DEPTH {
            log::warn!("CR3 boxes nested deeper than {MAX_BOX_DEPTH} levels, skipping");
            return Ok(());
        }

        let mut position = start;
        while position + HEADER_SIZE <= end {
            reader.seek(position);
            let header = BoxHeader::read(reader, end)?;
            let box_end = position + header.size;
            log::trace!("discovered {} box with size {}", header.fourcc, header.size);

            let info = BoxInfo {
                path: header.fourcc.clone(),
                offset: position,
                size: header.size,
                data_offset: reader.position(),
            };
            let token = parent.append(&mut self.arena, info);
            let path = self.path_from_token(&token);
            self.paths.entry(path).or_default().push(token);
            self.order.push(token);

            if NESTED_BOX_TYPES.contains(&header.fourcc.as_str()) {
                let data_offset = reader.position();
                self.build(reader, data_offset, box_end, &token, depth + 1)?;
            } else if header.fourcc == "uuid" && reader.position() + UUID_SIZE <= box_end {
                let uuid = reader.read_as_hex(UUID_SIZE)?;
                let children = reader.position();
                match uuid.as_str() {
                    UUID_PRIMARY => self.build(reader, children, box_end, &token, depth + 1)?,
                    UUID_PREVIEW => {
                        self.build(reader, children + PREVIEW_UUID_PADDING, box_end, &token, depth + 1)?
                    }
                    _ => {}
                }
            }

            position = box_end;
        }
        Ok(())
    }

    fn boxes(&self) -> impl DoubleEndedIterator<Item = &BoxInfo> {
        self.order.iter().map(|token| &self.arena[*token].data)
    }

    fn boxes_named<'s>(&'s self, fourccs: &'s [&str]) -> impl DoubleEndedIterator<Item = &'s BoxInfo> {
        self.boxes().filter(move |info| fourccs.contains(&info.fourcc()))
    }
}

/// Decoder for Canon CR3 files
#[derive(Debug)]
pub struct Cr3Decoder<'a> {
    bytes: &'a [u8],
    options: ExtractOptions,
    tree: OnceCell<BoxTree>,
    metadata: OnceCell<Metadata>,
}

impl<'a> Cr3Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_options(bytes, ExtractOptions::default())
    }

    pub fn with_options(bytes: &'a [u8], options: ExtractOptions) -> Self {
        Self {
            bytes,
            options,
            tree: OnceCell::new(),
            metadata: OnceCell::new(),
        }
    }

    /// An `ftyp` box at offset 0 whose major brand is `crx`
    pub fn is_likely_cr3(bytes: &[u8]) -> bool {
        bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && String::from_utf8_lossy(&bytes[8..12]).trim() == "crx"
    }

    fn tree(&self) -> Result<&BoxTree> {
        if let Some(tree) = self.tree.get() {
            return Ok(tree);
        }
        if !Self::is_likely_cr3(self.bytes) {
            return Err(Error::UnrecognizedContainer("missing crx ftyp box".into()));
        }
        let tree = BoxTree::read(self.bytes)?;
        log::debug!("read {} CR3 boxes", tree.order.len());
        Ok(self.tree.get_or_init(|| tree))
    }

    /// Every box read, in file order
    pub fn boxes(&self) -> Result<Vec<&BoxInfo>> {
        Ok(self.tree()?.boxes().collect())
    }

    /// Boxes at `path`, such as `/moov/uuid/CMT1`
    pub fn boxes_at(&self, path: &str) -> Result<Vec<&BoxInfo>> {
        let tree = self.tree()?;
        Ok(tree
            .paths
            .get(path)
            .map(|tokens| tokens.iter().map(|token| &tree.arena[*token].data).collect())
            .unwrap_or_default())
    }

    /// Tags of every CMT block, later blocks overriding earlier ones
    pub fn extract_metadata(&self) -> Result<Metadata> {
        if let Some(metadata) = self.metadata.get() {
            return Ok(metadata.clone());
        }
        let tree = self.tree()?;
        let mut metadata = Metadata::new();
        for info in tree.boxes_named(TIFF_BOX_TYPES) {
            let tiff = &self.bytes[info.data_range()];
            if !TiffDecoder::is_likely_tiff(tiff) {
                log::debug!("{} box at {} is not a TIFF", info.fourcc(), info.offset);
                continue;
            }
            metadata.extend(TiffDecoder::new(tiff).extract_metadata()?);
        }
        Ok(self.metadata.get_or_init(|| metadata).clone())
    }

    /// The largest `PRVW` JPEG, the first one on a tie
    pub fn extract_jpeg(&self) -> Result<Vec<u8>> {
        let preview = self
            .tree()?
            .boxes_named(&["PRVW"])
            .rev()
            .max_by_key(|info| info.data_range().len())
            .ok_or(Error::NoEmbeddedPreview)?;

        let mut reader = ByteReader::with_endian(self.bytes, Endian::Big);
        reader.seek(preview.data_offset);
        reader.skip(6);
        let width = reader.read_u16()?;
        let height = reader.read_u16()?;
        reader.skip(2);
        let length = reader.read_u32()? as usize;
        log::debug!("extracting jpeg preview {width}x{height}, {length} bytes");
        let jpeg = reader.read_as_slice(length)?;

        if self.options.skip_metadata {
            return Ok(jpeg.to_vec());
        }
        TiffDecoder::inject_metadata_into_jpeg(jpeg, &self.extract_metadata()?)
    }
}

impl<'a> ContainerIO<'a> for Cr3Decoder<'a> {
    fn container_type() -> ContainerKind {
        ContainerKind::Cr3
    }

    fn extensions() -> &'static [&'static str] {
        &["cr3"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/x-canon-cr3"]
    }

    fn detect(header: &[u8]) -> Option<ContainerKind> {
        Self::is_likely_cr3(header).then_some(ContainerKind::Cr3)
    }

    fn with_options(bytes: &'a [u8], options: ExtractOptions) -> Self {
        Cr3Decoder::with_options(bytes, options)
    }

    fn extract_metadata(&self) -> Result<Metadata> {
        Cr3Decoder::extract_metadata(self)
    }

    fn extract_jpeg(&self) -> Result<Vec<u8>> {
        Cr3Decoder::extract_jpeg(self)
    }
}
