//! Embedded preview selection for TIFF-based containers

use super::{codes, IfdTree, TiffHeader, TiffVariant};
use crate::{
    byte_io::{ByteReader, Endian},
    containers::jpeg_io::JpegDecoder,
    error::{Error, Result},
    updates::ExtractOptions,
};

/// Picks the best embedded JPEG
///
/// Order: the largest thumbnail when it exceeds the size threshold, else the
/// widest JPEG strip when it is strictly larger than the thumbnail, else the
/// thumbnail, else the vendor-specific searches.
pub(super) fn find_preview(
    bytes: &[u8],
    header: &TiffHeader,
    tree: &IfdTree,
    options: &ExtractOptions,
) -> Result<Vec<u8>> {
    let mut reader = ByteReader::with_endian(bytes, header.endian);

    let thumbnail = largest_thumbnail(&mut reader, tree)?;
    let thumbnail_size = thumbnail.map_or(0, <[u8]>::len);
    if let Some(thumbnail) = thumbnail {
        if thumbnail_size > options.preview_size_threshold {
            log::debug!("using {thumbnail_size} byte thumbnail preview");
            return Ok(thumbnail.to_vec());
        }
    }

    if let Some(strip) = widest_strip(&mut reader, tree)? {
        if strip.len() > thumbnail_size {
            log::debug!("using {} byte strip preview", strip.len());
            return Ok(strip.to_vec());
        }
    }
    if let Some(thumbnail) = thumbnail {
        log::debug!("using {thumbnail_size} byte thumbnail preview");
        return Ok(thumbnail.to_vec());
    }

    let vendor = match header.variant {
        TiffVariant::Panasonic => panasonic_preview(&mut reader, tree, options)?,
        TiffVariant::Olympus => olympus_preview(&mut reader, tree, options)?,
        TiffVariant::Standard => None,
    };
    vendor.ok_or(Error::NoEmbeddedPreview)
}

fn largest_thumbnail<'a>(reader: &mut ByteReader<'a>, tree: &IfdTree) -> Result<Option<&'a [u8]>> {
    let mut best: Option<(u32, u32)> = None;
    for (_, ifd) in tree.iter() {
        let (Some(offset), Some(length)) = (
            ifd.entry(codes::THUMBNAIL_OFFSET),
            ifd.entry(codes::THUMBNAIL_LENGTH),
        ) else {
            continue;
        };
        let (Some(offset), Some(length)) = (
            offset.resolve(reader)?.as_u32(),
            length.resolve(reader)?.as_u32(),
        ) else {
            continue;
        };
        if best.map_or(true, |(_, best_length)| length > best_length) {
            best = Some((offset, length));
        }
    }

    match best {
        Some((offset, length)) => {
            reader.seek(offset as usize);
            Ok(Some(reader.read_as_slice(length as usize)?))
        }
        None => Ok(None),
    }
}

fn widest_strip<'a>(reader: &mut ByteReader<'a>, tree: &IfdTree) -> Result<Option<&'a [u8]>> {
    let mut best: Option<(u32, &'a [u8])> = None;
    for (id, ifd) in tree.iter() {
        let (Some(compression), Some(offsets), Some(counts)) = (
            ifd.entry(codes::COMPRESSION),
            ifd.entry(codes::STRIP_OFFSETS),
            ifd.entry(codes::STRIP_BYTE_COUNTS),
        ) else {
            continue;
        };
        if !matches!(compression.resolve(reader)?.as_u32(), Some(6 | 7)) {
            continue;
        }
        let offsets = offsets.resolve_integers(reader)?;
        let counts = counts.resolve_integers(reader)?;
        let ([offset], [length]) = (offsets.as_slice(), counts.as_slice()) else {
            log::debug!("IFD #{id} has {} JPEG strips, skipping", offsets.len());
            continue;
        };

        let strip = reader.lookahead(|r| {
            r.seek(*offset as usize);
            r.read_as_slice(*length as usize)
        })?;
        if !JpegDecoder::is_likely_jpeg(strip) {
            continue;
        }
        let Ok((Some(width), Some(_))) = JpegDecoder::new(strip).dimensions() else {
            continue;
        };
        if best.map_or(true, |(best_width, _)| width > best_width) {
            best = Some((width, strip));
        }
    }
    Ok(best.map(|(_, strip)| strip))
}

fn panasonic_preview(reader: &mut ByteReader<'_>, tree: &IfdTree, options: &ExtractOptions) -> Result<Option<Vec<u8>>> {
    if let Some(entry) = tree.find_entry(codes::PANASONIC_JPG_FROM_RAW) {
        let bytes = entry.value_bytes(reader)?;
        if JpegDecoder::is_jpeg(&bytes) {
            log::debug!("using Panasonic JpgFromRaw preview");
            return Ok(Some(bytes.into_owned()));
        }
    }

    let search_start = tree.entries().map(|entry| entry.start_offset).max().unwrap_or(0);
    let Some(end_entry) = tree.get(0).and_then(|root| root.entry(codes::PANASONIC_JPEG_END)) else {
        return Ok(None);
    };
    let Some(search_end) = end_entry.resolve(reader)?.as_u32() else {
        return Ok(None);
    };
    if search_start == 0 {
        return Ok(None);
    }
    Ok(find_jpeg_in_range(reader.bytes(), search_start, search_end as usize, options).map(<[u8]>::to_vec))
}

/// 6-byte prefix of an IFD entry: tag, LONG type, low half of a count of 1
fn olympus_signature(tag: u16, endian: Endian) -> [u8; 6] {
    let (tag, data_type, count) = match endian {
        Endian::Big => (tag.to_be_bytes(), 4u16.to_be_bytes(), 1u32.to_be_bytes()),
        Endian::Little => (tag.to_le_bytes(), 4u16.to_le_bytes(), 1u32.to_le_bytes()),
    };
    [tag[0], tag[1], data_type[0], data_type[1], count[0], count[1]]
}

fn olympus_preview(reader: &mut ByteReader<'_>, tree: &IfdTree, options: &ExtractOptions) -> Result<Option<Vec<u8>>> {
    let Some(entry) = tree.find_entry(codes::MAKER_NOTE) else {
        return Ok(None);
    };
    let maker_note = entry.value_bytes(reader)?;
    let endian = reader.endian();

    let start_signature = olympus_signature(codes::OLYMPUS_PREVIEW_START, endian);
    let length_signature = olympus_signature(codes::OLYMPUS_PREVIEW_LENGTH, endian);
    let mut note = ByteReader::with_endian(&maker_note, endian);
    for index in 0..maker_note.len().saturating_sub(23) {
        if maker_note[index..index + 6] != start_signature || maker_note[index + 12..index + 18] != length_signature {
            continue;
        }
        note.seek(index + 8);
        let offset = note.read_u32()? as usize;
        note.seek(index + 20);
        let length = note.read_u32()? as usize;

        // Offsets are relative to the maker note on current bodies, absolute on some older ones
        for source in [&maker_note[..], reader.bytes()] {
            let candidate = offset
                .checked_add(length)
                .and_then(|end| source.get(offset..end));
            if let Some(jpeg) = candidate.filter(|jpeg| JpegDecoder::is_jpeg(jpeg)) {
                log::debug!("using Olympus maker note preview at {offset} ({length} bytes)");
                return Ok(Some(jpeg.to_vec()));
            }
        }
    }

    Ok(find_jpeg_in_range(&maker_note, 0, maker_note.len(), options).map(<[u8]>::to_vec))
}

/// Brute-force search for the widest JPEG between `start` and `end`
///
/// Returns `None` when there are more start/end pairings than
/// `options.max_search_pairs`, rather than guessing among them.
pub fn find_jpeg_in_range<'a>(buffer: &'a [u8], start: usize, end: usize, options: &ExtractOptions) -> Option<&'a [u8]> {
    let end = end.min(buffer.len().saturating_sub(1));
    if start >= end {
        return None;
    }

    let starts: Vec<usize> = (start..end)
        .filter(|&i| buffer.get(i..i + 3) == Some(&[0xFF, 0xD8, 0xFF][..]))
        .collect();
    let ends: Vec<usize> = (start + 1..=end)
        .rev()
        .filter(|&i| buffer[i - 1] == 0xFF && buffer[i] == 0xD9)
        .collect();

    let pairings = starts.len().saturating_mul(ends.len());
    if pairings > options.max_search_pairs {
        log::debug!("{pairings} JPEG marker pairings in range {start}..{end}, giving up");
        return None;
    }

    let mut best: Option<(u32, &'a [u8])> = None;
    for &jpeg_start in &starts {
        for &jpeg_end in &ends {
            if jpeg_end < jpeg_start || jpeg_end - jpeg_start < options.min_search_length {
                continue;
            }
            let candidate = &buffer[jpeg_start..=jpeg_end];
            let Ok((Some(width), _)) = JpegDecoder::new(candidate).dimensions() else {
                continue;
            };
            if best.map_or(true, |(best_width, _)| width >= best_width) {
                best = Some((width, candidate));
            }
        }
    }
    best.map(|(_, jpeg)| jpeg)
}
