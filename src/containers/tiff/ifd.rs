//! Image File Directories
//!
//! An IFD is a count, a run of 12-byte entries and a pointer to the next
//! sibling directory. Directories are kept in an arena ([`IfdTree`]) indexed by
//! [`IfdId`]; parent links are indices, never owning pointers.

use std::{
    borrow::Cow,
    collections::{HashSet, VecDeque},
};

use super::tags::{self, codes};
use crate::{
    byte_io::{ByteReader, ByteWriter, Endian},
    error::{Error, Result},
    metadata::MetadataValue,
};

/// Size of one directory entry in bytes
pub const ENTRY_SIZE: usize = 12;

/// Maximum number of entries accepted in a single IFD
pub const MAX_IFD_ENTRIES: u16 = 1000;

/// Index of an IFD inside an [`IfdTree`]
pub type IfdId = usize;

/// TIFF field types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Unknown,
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SignedByte,
    Undefined,
    SignedShort,
    SignedLong,
    SignedRational,
    Float,
    Double,
    /// TIFF-EP sub-directory pointer, laid out like `Long`
    Ifd,
}

impl DataType {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => DataType::Unknown,
            1 => DataType::Byte,
            2 => DataType::Ascii,
            3 => DataType::Short,
            4 => DataType::Long,
            5 => DataType::Rational,
            6 => DataType::SignedByte,
            7 => DataType::Undefined,
            8 => DataType::SignedShort,
            9 => DataType::SignedLong,
            10 => DataType::SignedRational,
            11 => DataType::Float,
            12 => DataType::Double,
            13 => DataType::Ifd,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        match self {
            DataType::Unknown => 0,
            DataType::Byte => 1,
            DataType::Ascii => 2,
            DataType::Short => 3,
            DataType::Long => 4,
            DataType::Rational => 5,
            DataType::SignedByte => 6,
            DataType::Undefined => 7,
            DataType::SignedShort => 8,
            DataType::SignedLong => 9,
            DataType::SignedRational => 10,
            DataType::Float => 11,
            DataType::Double => 12,
            DataType::Ifd => 13,
        }
    }

    /// Size of a single element in bytes
    pub fn size(self) -> usize {
        match self {
            DataType::Unknown
            | DataType::Byte
            | DataType::Ascii
            | DataType::SignedByte
            | DataType::Undefined => 1,
            DataType::Short | DataType::SignedShort => 2,
            DataType::Long | DataType::SignedLong | DataType::Float | DataType::Ifd => 4,
            DataType::Rational | DataType::SignedRational | DataType::Double => 8,
        }
    }
}

/// A resolved entry value
///
/// Multi-element numeric entries resolve to their first element; use
/// [`IfdEntry::resolve_integers`] to read every element.
#[derive(Debug, Clone, PartialEq)]
pub enum IfdValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl IfdValue {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            IfdValue::Integer(value) => u32::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Numbers and strings become metadata; raw bytes are dropped
    pub fn into_metadata(self) -> Option<MetadataValue> {
        match self {
            IfdValue::Integer(value) => Some(MetadataValue::Integer(value)),
            IfdValue::Float(value) if value.is_finite() => Some(MetadataValue::Float(value)),
            IfdValue::Text(text) => Some(MetadataValue::Text(text)),
            IfdValue::Float(_) | IfdValue::Bytes(_) => None,
        }
    }
}

/// One 12-byte directory entry with its value slot left unresolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    /// Absolute offset of the entry's tag field
    pub start_offset: usize,
    pub tag: u16,
    /// Raw field type, validated lazily by [`IfdEntry::data_type`]
    pub data_type: u16,
    pub count: u32,
    slot: [u8; 4],
}

impl IfdEntry {
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let start_offset = reader.position();
        let tag = reader.read_u16()?;
        let data_type = reader.read_u16()?;
        let count = reader.read_u32()?;
        let mut slot = [0u8; 4];
        slot.copy_from_slice(reader.read_as_slice(4)?);
        Ok(Self {
            start_offset,
            tag,
            data_type,
            count,
            slot,
        })
    }

    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_code(self.data_type).ok_or(Error::UnsupportedDataType {
            tag: self.tag,
            data_type: self.data_type,
        })
    }

    pub fn length_in_bytes(&self) -> Result<usize> {
        Ok(self.count as usize * self.data_type()?.size())
    }

    /// True when the value lives in the 4-byte slot itself
    pub fn is_inline(&self) -> Result<bool> {
        Ok(self.length_in_bytes()? <= 4)
    }

    /// Friendly name from the standard tag table
    pub fn name(&self) -> Option<&'static str> {
        tags::name_of(self.tag)
    }

    /// The slot read as an absolute offset
    pub fn value_offset(&self, endian: Endian) -> u32 {
        match endian {
            Endian::Big => u32::from_be_bytes(self.slot),
            Endian::Little => u32::from_le_bytes(self.slot),
        }
    }

    /// Raw bytes of the value, from the slot or from the surrounding buffer
    ///
    /// The reader's cursor is left where it was.
    pub fn value_bytes<'a>(&self, reader: &mut ByteReader<'a>) -> Result<Cow<'a, [u8]>> {
        let len = self.length_in_bytes()?;
        if len <= 4 {
            return Ok(Cow::Owned(self.slot[..len].to_vec()));
        }
        let offset = self.value_offset(reader.endian()) as usize;
        let bytes = reader.lookahead(|r| {
            r.seek(offset);
            r.read_as_slice(len)
        })?;
        Ok(Cow::Borrowed(bytes))
    }

    /// Decodes the value according to its field type
    pub fn resolve(&self, reader: &mut ByteReader<'_>) -> Result<IfdValue> {
        let data_type = self.data_type()?;
        let bytes = self.value_bytes(reader)?;

        match data_type {
            DataType::Ascii => {
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                Ok(IfdValue::Text(String::from_utf8_lossy(&bytes[..end]).into_owned()))
            }
            DataType::Undefined | DataType::Unknown => Ok(IfdValue::Bytes(bytes.into_owned())),
            _ if self.count == 0 => Ok(IfdValue::Bytes(Vec::new())),
            _ => decode_number(data_type, &bytes, reader.endian()),
        }
    }

    /// Every element of an unsigned integer entry
    pub fn resolve_integers(&self, reader: &mut ByteReader<'_>) -> Result<Vec<u32>> {
        let data_type = self.data_type()?;
        let bytes = self.value_bytes(reader)?;
        let mut value = ByteReader::with_endian(&bytes, reader.endian());
        (0..self.count)
            .map(|_| match data_type {
                DataType::Byte => Ok(value.read_u8()?.into()),
                DataType::Short => Ok(value.read_u16()?.into()),
                DataType::Long | DataType::Ifd => value.read_u32(),
                _ => Err(Error::UnsupportedDataType {
                    tag: self.tag,
                    data_type: self.data_type,
                }),
            })
            .collect()
    }

    /// Rewrites an out-of-line string value inside `buffer`
    ///
    /// The count field is updated in place and the old string bytes are
    /// spliced out for the NUL-terminated replacement. No other byte moves
    /// except those after the string, which shift by the length difference.
    pub fn mutate(&self, buffer: &[u8], endian: Endian, new_value: &str) -> Result<Vec<u8>> {
        let label = self.name().map(str::to_string).unwrap_or_else(|| format!("0x{:04X}", self.tag));
        if self.data_type()? != DataType::Ascii {
            return Err(Error::InvalidMutationTarget(format!("{label} is not a string entry")));
        }
        let old_length = self.length_in_bytes()?;
        if old_length <= 4 {
            return Err(Error::InvalidMutationTarget(format!(
                "{label} is stored inline and cannot be resized"
            )));
        }

        let mut data = new_value.as_bytes().to_vec();
        if data.last() != Some(&0) {
            data.push(0);
        }
        if data.len() <= 4 {
            return Err(Error::InvalidMutationTarget(format!(
                "replacement for {label} would have to move inline"
            )));
        }
        let count = u32::try_from(data.len()).map_err(|_| Error::DataTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        })?;

        let data_offset = self.value_offset(endian) as usize;
        let mut writer = ByteWriter::with_endian(endian);
        writer.write_bytes(buffer);
        writer.seek(self.start_offset + 4);
        writer.write_u32(count);
        ByteWriter::splice_range(writer.as_bytes(), &data, data_offset, data_offset + old_length)
    }
}

fn decode_number(data_type: DataType, bytes: &[u8], endian: Endian) -> Result<IfdValue> {
    let mut value = ByteReader::with_endian(bytes, endian);
    Ok(match data_type {
        DataType::Byte => IfdValue::Integer(value.read_u8()?.into()),
        DataType::SignedByte => IfdValue::Integer(value.read_i8()?.into()),
        DataType::Short => IfdValue::Integer(value.read_u16()?.into()),
        DataType::SignedShort => IfdValue::Integer(value.read_i16()?.into()),
        DataType::Long | DataType::Ifd => IfdValue::Integer(value.read_u32()?.into()),
        DataType::SignedLong => IfdValue::Integer(value.read_i32()?.into()),
        DataType::Rational => {
            let numerator = value.read_u32()?;
            let denominator = value.read_u32()?;
            IfdValue::Float(numerator as f64 / denominator as f64)
        }
        DataType::SignedRational => {
            let numerator = value.read_i32()?;
            let denominator = value.read_i32()?;
            IfdValue::Float(numerator as f64 / denominator as f64)
        }
        DataType::Float => IfdValue::Float(f32::from_bits(value.read_u32()?).into()),
        DataType::Double => IfdValue::Float(f64::from_bits(value.read_u64()?)),
        DataType::Ascii | DataType::Undefined | DataType::Unknown => IfdValue::Bytes(bytes.to_vec()),
    })
}

/// One directory and its links into the arena
#[derive(Debug, Clone)]
pub struct Ifd {
    pub offset: u32,
    pub entries: Vec<IfdEntry>,
    pub next_ifd_offset: u32,
    pub parent: Option<IfdId>,
    pub children: Vec<IfdId>,
}

impl Ifd {
    pub fn read(reader: &mut ByteReader<'_>, offset: u32, parent: Option<IfdId>) -> Result<Self> {
        reader.seek(offset as usize);
        let count = reader.read_u16()?;
        if count > MAX_IFD_ENTRIES {
            return Err(Error::UnrecognizedContainer(format!(
                "IFD at offset {offset} declares {count} entries"
            )));
        }
        let entries = (0..count)
            .map(|_| IfdEntry::read(reader))
            .collect::<Result<Vec<_>>>()?;
        let next_ifd_offset = reader.read_u32()?;
        Ok(Self {
            offset,
            entries,
            next_ifd_offset,
            parent,
            children: Vec::new(),
        })
    }

    pub fn entry(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    /// Offsets referenced by SubIFD and EXIF pointer entries
    pub fn sub_ifd_offsets(&self, reader: &mut ByteReader<'_>) -> Result<Vec<u32>> {
        let mut offsets = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|entry| entry.tag == codes::SUB_IFD || entry.tag == codes::EXIF_OFFSET)
        {
            let values = entry.resolve_integers(reader).map_err(|err| match err {
                Error::Truncated { .. } => Error::UnresolvableSubIfd {
                    offset: entry.value_offset(reader.endian()),
                },
                other => other,
            })?;
            offsets.extend(values);
        }
        Ok(offsets)
    }
}

/// Arena of every IFD reachable from a root offset
#[derive(Debug, Clone, Default)]
pub struct IfdTree {
    ifds: Vec<Ifd>,
}

impl IfdTree {
    /// Breadth-first walk from `root_offset`
    ///
    /// Sub-directories are queued with the current IFD as parent, the next
    /// directory with the current IFD's own parent. Offsets already visited are
    /// skipped, so circular chains terminate.
    pub fn walk(reader: &mut ByteReader<'_>, root_offset: u32) -> Result<Self> {
        let mut tree = IfdTree::default();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([(root_offset, None::<IfdId>)]);

        while let Some((offset, parent)) = queue.pop_front() {
            if offset == 0 || !visited.insert(offset) {
                continue;
            }
            let ifd = match Ifd::read(reader, offset, parent) {
                Ok(ifd) => ifd,
                Err(Error::Truncated { .. }) if parent.is_some() => {
                    return Err(Error::UnresolvableSubIfd { offset })
                }
                Err(err) => return Err(err),
            };

            let id = tree.ifds.len();
            log::trace!(
                "IFD #{id} at offset {offset}: {} entries, parent {parent:?}",
                ifd.entries.len()
            );
            for sub_offset in ifd.sub_ifd_offsets(reader)? {
                queue.push_back((sub_offset, Some(id)));
            }
            queue.push_back((ifd.next_ifd_offset, parent));

            if let Some(parent) = parent {
                tree.ifds[parent].children.push(id);
            }
            tree.ifds.push(ifd);
        }

        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.ifds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ifds.is_empty()
    }

    pub fn get(&self, id: IfdId) -> Option<&Ifd> {
        self.ifds.get(id)
    }

    /// Directories in walk order
    pub fn iter(&self) -> impl Iterator<Item = (IfdId, &Ifd)> {
        self.ifds.iter().enumerate()
    }

    pub fn entries(&self) -> impl Iterator<Item = &IfdEntry> {
        self.ifds.iter().flat_map(|ifd| ifd.entries.iter())
    }

    /// First entry with `tag` in walk order
    pub fn find_entry(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries().find(|entry| entry.tag == tag)
    }

    /// True when the parent's EXIF pointer targets this IFD
    pub fn is_exif(&self, id: IfdId, reader: &mut ByteReader<'_>) -> Result<bool> {
        let Some((ifd, parent)) = self.with_parent(id) else {
            return Ok(false);
        };
        match parent.entry(codes::EXIF_OFFSET) {
            Some(entry) => Ok(entry.resolve(reader)?.as_u32() == Some(ifd.offset)),
            None => Ok(false),
        }
    }

    /// True when the parent's SubIFD entry lists this IFD
    pub fn is_sub_ifd(&self, id: IfdId, reader: &mut ByteReader<'_>) -> Result<bool> {
        let Some((ifd, parent)) = self.with_parent(id) else {
            return Ok(false);
        };
        match parent.entry(codes::SUB_IFD) {
            Some(entry) => Ok(entry.resolve_integers(reader)?.contains(&ifd.offset)),
            None => Ok(false),
        }
    }

    fn with_parent(&self, id: IfdId) -> Option<(&Ifd, &Ifd)> {
        let ifd = self.ifds.get(id)?;
        let parent = self.ifds.get(ifd.parent?)?;
        Some((ifd, parent))
    }
}
