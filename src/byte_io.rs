//! Cursor-based readers and writers over in-memory bytes
//!
//! Every container decoder in this crate is built on [`ByteReader`]. It is a
//! position plus a byte order over a borrowed slice. [`ByteWriter`] is the
//! growable mirror used to build new segments, and [`ByteWriter::splice_range`]
//! is the single primitive used for all byte-preserving rewrites.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Byte order for reading multi-byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Motorola order (`MM`)
    #[default]
    Big,
    /// Intel order (`II`)
    Little,
}

/// Largest width accepted by [`ByteReader::read`] and [`ByteWriter::write`]
pub const MAX_INTEGER_WIDTH: usize = 8;

/// Read-only cursor over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    /// Creates a big-endian reader positioned at the start of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_endian(bytes, Endian::Big)
    }

    pub fn with_endian(bytes: &'a [u8], endian: Endian) -> Self {
        Self {
            bytes,
            position: 0,
            endian,
        }
    }

    /// The full backing slice, independent of the cursor
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// True while at least one byte remains after the cursor
    pub fn has_next(&self) -> bool {
        self.position < self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.position)
    }

    /// Moves the cursor to an absolute position
    ///
    /// Seeking past the end is allowed; the next read fails with
    /// [`Error::Truncated`].
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    pub fn skip(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(Error::Truncated {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            })?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Reads an unsigned integer of `width` bytes (1 to 8) in the reader's byte order
    pub fn read(&mut self, width: usize) -> Result<u64> {
        if width == 0 {
            return Ok(0);
        }
        if width > MAX_INTEGER_WIDTH {
            return Err(Error::DataTooLarge {
                size: width,
                max: MAX_INTEGER_WIDTH,
            });
        }
        let data = self.take(width)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_uint(data, width),
            Endian::Little => LittleEndian::read_uint(data, width),
        })
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let data = self.take(2)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u16(data),
            Endian::Little => LittleEndian::read_u16(data),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let data = self.take(4)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u32(data),
            Endian::Little => LittleEndian::read_u32(data),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let data = self.take(8)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u64(data),
            Endian::Little => LittleEndian::read_u64(data),
        })
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads `len` bytes as text, replacing invalid UTF-8
    pub fn read_as_string(&mut self, len: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    /// Reads `len` bytes as a lowercase hex string of the integer they encode
    ///
    /// In little-endian mode the most significant byte is the last one read.
    pub fn read_as_hex(&mut self, len: usize) -> Result<String> {
        let data = self.take(len)?;
        Ok(match self.endian {
            Endian::Big => hex::encode(data),
            Endian::Little => {
                let reversed: Vec<u8> = data.iter().rev().copied().collect();
                hex::encode(reversed)
            }
        })
    }

    /// Reads `len` bytes as a slice of the backing bytes
    pub fn read_as_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Reads `len` bytes as a new reader with its cursor at 0
    ///
    /// The sub-reader shares the backing bytes and inherits the byte order.
    pub fn read_as_reader(&mut self, len: usize) -> Result<ByteReader<'a>> {
        let bytes = self.take(len)?;
        Ok(ByteReader::with_endian(bytes, self.endian))
    }

    /// Runs `f` and restores the cursor afterwards, even when `f` fails
    pub fn lookahead<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.position;
        let result = f(self);
        self.position = saved;
        result
    }
}

/// Growable byte accumulator with an absolute cursor
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
    position: usize,
    endian: Endian,
}

impl ByteWriter {
    /// Creates an empty big-endian writer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endian(endian: Endian) -> Self {
        Self {
            endian,
            ..Self::default()
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Advances the cursor; skipped bytes are zero-filled on the next write
    pub fn skip(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// Writes `value` as a `width`-byte unsigned integer in the writer's byte order
    pub fn write(&mut self, value: u64, width: usize) -> Result<()> {
        let fits = width == MAX_INTEGER_WIDTH || (width < MAX_INTEGER_WIDTH && value >> (8 * width) == 0);
        if width == 0 || !fits {
            return Err(Error::ValueOverflow { value, width });
        }
        let mut buf = [0u8; MAX_INTEGER_WIDTH];
        match self.endian {
            Endian::Big => BigEndian::write_uint(&mut buf, value, width),
            Endian::Little => LittleEndian::write_uint(&mut buf, value, width),
        }
        self.write_bytes(&buf[..width]);
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        match self.endian {
            Endian::Big => BigEndian::write_u16(&mut buf, value),
            Endian::Little => LittleEndian::write_u16(&mut buf, value),
        }
        self.write_bytes(&buf);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        match self.endian {
            Endian::Big => BigEndian::write_u32(&mut buf, value),
            Endian::Little => LittleEndian::write_u32(&mut buf, value),
        }
        self.write_bytes(&buf);
    }

    /// Writes raw bytes at the cursor, overwriting or growing as needed
    pub fn write_bytes(&mut self, data: &[u8]) {
        if self.position > self.bytes.len() {
            self.bytes.resize(self.position, 0);
        }
        let overlap = (self.bytes.len() - self.position).min(data.len());
        self.bytes[self.position..self.position + overlap].copy_from_slice(&data[..overlap]);
        self.bytes.extend_from_slice(&data[overlap..]);
        self.position += data.len();
    }

    /// Writes `text` followed by a NUL terminator
    pub fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
        self.write_u8(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns `buffer[..start] ++ replacement ++ buffer[end..]` as a new vector
    ///
    /// The input is never modified.
    pub fn splice_range(buffer: &[u8], replacement: &[u8], start: usize, end: usize) -> Result<Vec<u8>> {
        if start > end || end > buffer.len() {
            return Err(Error::Truncated {
                offset: start,
                needed: end.saturating_sub(start),
                available: buffer.len().saturating_sub(start),
            });
        }
        let mut out = Vec::with_capacity(buffer.len() - (end - start) + replacement.len());
        out.extend_from_slice(&buffer[..start]);
        out.extend_from_slice(replacement);
        out.extend_from_slice(&buffer[end..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_byte_order() {
        let data = [0x12, 0x34, 0x56, 0x78];

        let mut le = ByteReader::with_endian(&data, Endian::Little);
        assert_eq!(le.read_u16().unwrap(), 0x3412);
        assert_eq!(le.read_u16().unwrap(), 0x7856);

        let mut be = ByteReader::new(&data);
        assert_eq!(be.read_u32().unwrap(), 0x12345678);
    }

    #[test]
    fn test_read_past_end_is_truncated() {
        let mut reader = ByteReader::new(&[1, 2, 3]);
        reader.skip(2);
        match reader.read_u16() {
            Err(Error::Truncated {
                offset,
                needed,
                available,
            }) => {
                assert_eq!((offset, needed, available), (2, 2, 1));
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        // failed reads leave the cursor in place
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn test_lookahead_restores_position() {
        let data = [0u8, 1, 2, 3, 4, 5];
        let mut reader = ByteReader::new(&data);
        reader.skip(1);
        let value = reader
            .lookahead(|r| {
                r.seek(4);
                r.read_u8()
            })
            .unwrap();
        assert_eq!(value, 4);
        assert_eq!(reader.position(), 1);

        assert!(reader.lookahead(|r| r.read_as_slice(100)).is_err());
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_read_as_hex_respects_endian() {
        let data = [0x85, 0xc0, 0xb6, 0x87];
        assert_eq!(ByteReader::new(&data).read_as_hex(4).unwrap(), "85c0b687");
        assert_eq!(
            ByteReader::with_endian(&data, Endian::Little).read_as_hex(4).unwrap(),
            "87b6c085"
        );
    }

    #[test]
    fn test_read_as_reader_is_bounded() {
        let data = b"abcdef";
        let mut reader = ByteReader::with_endian(data, Endian::Little);
        reader.skip(1);
        let mut sub = reader.read_as_reader(3).unwrap();
        assert_eq!(sub.position(), 0);
        assert_eq!(sub.endian(), Endian::Little);
        assert_eq!(sub.read_as_string(3).unwrap(), "bcd");
        assert!(!sub.has_next());
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_writer_seek_and_overwrite() {
        let mut writer = ByteWriter::new();
        writer.write_u16(0xFFD8);
        writer.skip(2);
        writer.write_str("ok");
        writer.seek(2);
        writer.write_u16(7);
        assert_eq!(writer.as_bytes(), &[0xFF, 0xD8, 0, 7, b'o', b'k', 0]);
    }

    #[test]
    fn test_writer_rejects_overflow() {
        let mut writer = ByteWriter::new();
        assert!(matches!(
            writer.write(0x1_0000, 2),
            Err(Error::ValueOverflow { width: 2, .. })
        ));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_splice_range_rejects_inverted_range() {
        assert!(ByteWriter::splice_range(&[1, 2, 3], &[], 2, 1).is_err());
        assert!(ByteWriter::splice_range(&[1, 2, 3], &[], 0, 4).is_err());
    }

    proptest! {
        #[test]
        fn splice_matches_concatenation(
            buffer in proptest::collection::vec(any::<u8>(), 0..256),
            replacement in proptest::collection::vec(any::<u8>(), 0..64),
            a in 0usize..256,
            b in 0usize..256,
        ) {
            let start = a.min(b).min(buffer.len());
            let end = a.max(b).min(buffer.len());
            let out = ByteWriter::splice_range(&buffer, &replacement, start, end).unwrap();

            let mut expected = buffer[..start].to_vec();
            expected.extend_from_slice(&replacement);
            expected.extend_from_slice(&buffer[end..]);
            prop_assert_eq!(out.len(), buffer.len() - (end - start) + replacement.len());
            prop_assert_eq!(out, expected);
        }

        #[test]
        fn write_then_read_is_symmetric(value in any::<u32>(), width in 1usize..=4, little in any::<bool>()) {
            let endian = if little { Endian::Little } else { Endian::Big };
            let value = if width == 4 { value as u64 } else { value as u64 & ((1u64 << (8 * width)) - 1) };

            let mut writer = ByteWriter::with_endian(endian);
            writer.write(value, width).unwrap();
            let bytes = writer.into_bytes();
            prop_assert_eq!(bytes.len(), width);

            let mut reader = ByteReader::with_endian(&bytes, endian);
            prop_assert_eq!(reader.read(width).unwrap(), value);
        }
    }
}
