//! Standalone XMP packets and sidecars
//!
//! Only `xmp:`, `exif:` and `tiff:` properties whose names are known TIFF
//! tags (or `Rating`, `Label`, `MetadataDate`) are decoded, from either the
//! attribute or the element form. The `dc:subject` bag becomes a JSON array
//! under `DCSubjectBagOfWords`.

use std::{borrow::Cow, cell::OnceCell};

use quick_xml::{events::Event, Reader};

use super::{tiff::tags, ContainerIO, ContainerKind};
use crate::{
    error::{Error, Result},
    metadata::{Metadata, MetadataValue},
    updates::ExtractOptions,
};

const DECODED_PREFIXES: &[&[u8]] = &[b"xmp", b"exif", b"tiff"];
const XMP_ONLY_TAGS: &[&str] = &["Rating", "Label", "MetadataDate"];

pub const KEYWORDS_KEY: &str = "DCSubjectBagOfWords";

fn is_decoded_prefix(prefix: &[u8]) -> bool {
    DECODED_PREFIXES.iter().any(|p| p.eq_ignore_ascii_case(prefix))
}

fn is_known_key(key: &str) -> bool {
    tags::code_of(key).is_some() || XMP_ONLY_TAGS.contains(&key)
}

/// `0` or an integer without leading zeros
fn is_simple_number(text: &str) -> bool {
    match text.as_bytes() {
        [b'0'] => true,
        [b'1'..=b'9', rest @ ..] => rest.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// `numerator/denominator`, both positive
fn parse_fraction(text: &str) -> Option<f64> {
    let (numerator, denominator) = text.split_once('/')?;
    if !is_simple_number(numerator) || !is_simple_number(denominator) || denominator == "0" || numerator == "0" {
        return None;
    }
    Some(numerator.parse::<f64>().ok()? / denominator.parse::<f64>().ok()?)
}

fn parse_value(text: &str) -> MetadataValue {
    if is_simple_number(text) {
        if let Ok(value) = text.parse::<i64>() {
            return MetadataValue::Integer(value);
        }
    }
    match parse_fraction(text) {
        Some(value) => MetadataValue::Float(value),
        None => MetadataValue::Text(text.to_string()),
    }
}

fn unescape(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

fn insert(metadata: &mut Metadata, key: &[u8], raw: &str) {
    let key = String::from_utf8_lossy(key);
    if !is_known_key(&key) {
        return;
    }
    let value = parse_value(unescape(raw).trim());
    log::trace!("XMP {key} = {value}");
    metadata.insert(key.into_owned(), value);
}

/// Decoder for XMP text
#[derive(Debug)]
pub struct XmpDecoder<'a> {
    bytes: &'a [u8],
    metadata: OnceCell<Metadata>,
}

impl<'a> XmpDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            metadata: OnceCell::new(),
        }
    }

    /// Starts with `<x:xmpmeta` or `<?xpacket`
    pub fn is_xmp(bytes: &[u8]) -> bool {
        bytes.starts_with(b"<x:xmpmeta") || bytes.starts_with(b"<?xpacket")
    }

    pub fn extract_metadata(&self) -> Result<Metadata> {
        if let Some(metadata) = self.metadata.get() {
            return Ok(metadata.clone());
        }
        let text = String::from_utf8_lossy(self.bytes);
        let metadata = Self::decode(&text);
        Ok(self.metadata.get_or_init(|| metadata).clone())
    }

    fn decode(text: &str) -> Metadata {
        let mut metadata = Metadata::new();
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    log::debug!("stopping XMP decode at {}: {err}", reader.buffer_position());
                    break;
                }
            };
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    for attr in e.attributes().with_checks(false).flatten() {
                        let key = attr.key;
                        let Some(prefix) = key.prefix() else {
                            continue;
                        };
                        if is_decoded_prefix(prefix.as_ref()) {
                            let raw = String::from_utf8_lossy(&attr.value);
                            insert(&mut metadata, key.local_name().as_ref(), &raw);
                        }
                    }

                    let Event::Start(ref e) = event else {
                        continue;
                    };
                    let name = e.name();
                    if name.as_ref() == b"dc:subject" {
                        match Self::read_subject(&mut reader) {
                            Ok(keywords) => {
                                let json = serde_json::Value::from(keywords).to_string();
                                metadata.insert(KEYWORDS_KEY.to_string(), MetadataValue::Text(json));
                            }
                            Err(err) => {
                                log::debug!("unreadable dc:subject: {err}");
                                break;
                            }
                        }
                        continue;
                    }
                    let Some(prefix) = name.prefix() else {
                        continue;
                    };
                    if !is_decoded_prefix(prefix.as_ref()) {
                        continue;
                    }
                    match reader.read_text(name) {
                        // structured values (rdf:Seq, rdf:Alt) are not flattened
                        Ok(content) if !content.contains('<') => {
                            insert(&mut metadata, name.local_name().as_ref(), &content);
                        }
                        Ok(_) => {}
                        Err(err) => {
                            log::debug!("stopping XMP decode: {err}");
                            break;
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        metadata
    }

    /// Collects `rdf:li` items up to the closing `dc:subject`
    fn read_subject(reader: &mut Reader<&[u8]>) -> Result<Vec<String>> {
        let mut keywords = Vec::new();
        loop {
            let event = reader.read_event().map_err(|err| Error::InvalidXmp(err.to_string()))?;
            match event {
                Event::Start(ref e) if e.name().as_ref() == b"rdf:li" => {
                    let text = reader
                        .read_text(e.name())
                        .map_err(|err| Error::InvalidXmp(err.to_string()))?;
                    keywords.push(unescape(text.trim()).into_owned());
                }
                Event::End(ref e) if e.name().as_ref() == b"dc:subject" => return Ok(keywords),
                Event::Eof => return Err(Error::InvalidXmp("unterminated dc:subject".into())),
                _ => {}
            }
        }
    }

    /// XMP carries no image data
    pub fn extract_jpeg(&self) -> Result<Vec<u8>> {
        Err(Error::NoEmbeddedPreview)
    }
}

impl<'a> ContainerIO<'a> for XmpDecoder<'a> {
    fn container_type() -> ContainerKind {
        ContainerKind::Xmp
    }

    fn extensions() -> &'static [&'static str] {
        &["xmp"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["application/rdf+xml", "application/xmp+xml"]
    }

    fn detect(header: &[u8]) -> Option<ContainerKind> {
        Self::is_xmp(header).then_some(ContainerKind::Xmp)
    }

    fn with_options(bytes: &'a [u8], _options: ExtractOptions) -> Self {
        XmpDecoder::new(bytes)
    }

    fn extract_metadata(&self) -> Result<Metadata> {
        XmpDecoder::extract_metadata(self)
    }

    fn extract_jpeg(&self) -> Result<Vec<u8>> {
        XmpDecoder::extract_jpeg(self)
    }
}
