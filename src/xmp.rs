//! XMP packet editing
//!
//! Edits are made on the packet text itself, so everything outside the
//! touched property keeps its bytes. When the packet is wrapped in
//! `<?xpacket?>` padding, the pad shrinks or grows to absorb the edit and the
//! packet keeps its length.
//!
//! Only a few properties are writable: `Rating`, `Label`, `MetadataDate`,
//! `DateTimeOriginal` and the `dc:subject` keyword bag.

use quick_xml::escape::escape;

use crate::{
    containers::xmp_io::KEYWORDS_KEY,
    error::{Error, Result},
    metadata::MetadataValue,
    updates::{MetadataUpdate, XmpUpdates},
};

const XMP_PACKET_START: &str = "<?xpacket begin=\"\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>";
const XMP_PACKET_END: &str = "<?xpacket end=\"w\"?>";
const PACKET_PADDING: usize = 2048;
const BASE_NEWLINE: &str = "\n   ";

const RDF_NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const NAMESPACES: &[(&str, &str)] = &[
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("tiff", "http://ns.adobe.com/tiff/1.0/"),
    ("exif", "http://ns.adobe.com/exif/1.0/"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
];

/// Prefixes an existing property may be found under
const MATCHED_PREFIXES: &[&str] = &["xmp", "exif", "tiff"];

const WRITABLE_KEYS: &[&str] = &["Rating", "Label", "MetadataDate", "DateTimeOriginal", KEYWORDS_KEY];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Attribute,
    Element,
}

/// Byte range of an existing property and how it was written
#[derive(Debug)]
struct Existing {
    start: usize,
    end: usize,
    form: Form,
    prefix: String,
}

fn description_scaffold() -> String {
    let mut scaffold = String::from("<rdf:Description rdf:about=\"\"");
    for (prefix, uri) in NAMESPACES {
        scaffold.push_str(&format!("\n    xmlns:{prefix}=\"{uri}\""));
    }
    scaffold.push_str(">\n  </rdf:Description>");
    scaffold
}

fn base_packet() -> String {
    format!(
        "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\" x:xmptk=\"rawmeta-io {}\">\n <rdf:RDF xmlns:rdf=\"{RDF_NAMESPACE}\">\n  {}\n </rdf:RDF>\n</x:xmpmeta>",
        env!("CARGO_PKG_VERSION"),
        description_scaffold()
    )
}

/// Index of the `>` closing the open tag that starts at `start`
fn open_tag_end(xmp: &str, start: usize) -> Result<usize> {
    let rest = &xmp[start + 1..];
    let end = rest
        .find(['<', '>'])
        .filter(|i| rest.as_bytes()[*i] == b'>')
        .ok_or_else(|| Error::InvalidXmp(format!("unterminated tag at offset {start}")))?;
    Ok(start + 1 + end)
}

/// Drops a trailing newline-and-indent
fn trim_trailing_indent(text: &str) -> &str {
    let trimmed = text.trim_end_matches(' ');
    match trimmed.strip_suffix('\n') {
        Some(without) if trimmed.len() < text.len() => without,
        _ => text,
    }
}

fn find_existing(xmp: &str, key: &str) -> Option<Existing> {
    let lower = xmp.to_ascii_lowercase();

    if key == KEYWORDS_KEY {
        let start = lower.find("<dc:subject")?;
        let end = if lower[start..].starts_with("<dc:subject/>") {
            start + "<dc:subject/>".len()
        } else {
            start + lower[start..].find("</dc:subject>")? + "</dc:subject>".len()
        };
        return Some(Existing {
            start,
            end,
            form: Form::Element,
            prefix: "dc".into(),
        });
    }

    let key = key.to_ascii_lowercase();
    let mut best: Option<Existing> = None;
    for prefix in MATCHED_PREFIXES {
        let name = format!("{prefix}:{key}");
        let mut candidates = Vec::new();

        let attribute = format!("{name}=\"");
        let bytes = lower.as_bytes();
        if let Some(start) = lower
            .match_indices(&attribute)
            .map(|(start, _)| start)
            .find(|start| *start == 0 || !(bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b':'))
        {
            let value_start = start + attribute.len();
            if let Some(close) = lower[value_start..].find('"') {
                candidates.push((start, value_start + close + 1, Form::Attribute, start));
            }
        }

        let open = format!("<{name}>");
        let close = format!("</{name}>");
        if let Some(start) = lower.find(&open) {
            if let Some(end) = lower[start..].find(&close) {
                candidates.push((start, start + end + close.len(), Form::Element, start + 1));
            }
        }
        let empty = format!("<{name}/>");
        if let Some(start) = lower.find(&empty) {
            candidates.push((start, start + empty.len(), Form::Element, start + 1));
        }

        for (start, end, form, prefix_start) in candidates {
            if best.as_ref().map_or(true, |best| start < best.start) {
                best = Some(Existing {
                    start,
                    end,
                    form,
                    prefix: xmp[prefix_start..prefix_start + prefix.len()].to_string(),
                });
            }
        }
    }
    best
}

fn default_prefix(key: &str) -> &'static str {
    match key {
        "DateTimeOriginal" => "exif",
        KEYWORDS_KEY => "dc",
        _ => "xmp",
    }
}

fn build_replacement(key: &str, value: &MetadataValue, form: Form, prefix: &str) -> Result<String> {
    if key == KEYWORDS_KEY {
        let keywords = value
            .as_str()
            .and_then(|json| serde_json::from_str::<Vec<serde_json::Value>>(json).ok())
            .ok_or_else(|| Error::InvalidXmp(format!("invalid keywords payload {value}")))?;
        let mut lines = vec!["<dc:subject>".to_string(), " <rdf:Bag>".to_string()];
        for keyword in keywords {
            let keyword = match keyword {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            lines.push(format!("  <rdf:li>{}</rdf:li>", escape(keyword.as_str())));
        }
        lines.push(" </rdf:Bag>".into());
        lines.push("</dc:subject>".into());
        return Ok(lines.join(BASE_NEWLINE));
    }

    let text = value.to_string();
    let value = escape(text.as_str());
    Ok(match form {
        Form::Attribute => format!("{prefix}:{key}=\"{value}\""),
        Form::Element => format!("<{prefix}:{key}>{value}</{prefix}:{key}>"),
    })
}

/// Index of the `>` that closes the `rdf:Description` open tag
fn description_end(xmp: &str) -> Result<usize> {
    let start = xmp
        .to_ascii_lowercase()
        .find("<rdf:description")
        .ok_or_else(|| Error::InvalidXmp("missing rdf:Description".into()))?;
    open_tag_end(xmp, start)
}

/// Makes sure an open `rdf:Description` tag exists, synthesizing the missing levels
fn ensure_description(mut xmp: String) -> Result<String> {
    let lower = xmp.to_ascii_lowercase();

    if lower.contains("<rdf:description") {
        let end = description_end(&xmp)?;
        if xmp[..end].ends_with('/') {
            xmp.replace_range(end - 1..=end, "></rdf:Description>");
        }
        return Ok(xmp);
    }

    if let Some(start) = lower.find("<rdf:rdf") {
        let end = open_tag_end(&xmp, start)?;
        if xmp[..end].ends_with('/') {
            return Err(Error::InvalidXmp("empty rdf:RDF".into()));
        }
        log::debug!("adding rdf:Description to XMP packet");
        xmp.insert_str(end + 1, &description_scaffold());
        return Ok(xmp);
    }

    if let Some(start) = lower.find("<x:xmpmeta") {
        let mut end = open_tag_end(&xmp, start)?;
        if xmp[..end].ends_with('/') {
            xmp.replace_range(end - 1..=end, "></x:xmpmeta>");
            end -= 1;
        }
        log::debug!("adding rdf:RDF to XMP packet");
        let rdf = format!(
            "\n <rdf:RDF xmlns:rdf=\"{RDF_NAMESPACE}\">\n  {}\n </rdf:RDF>\n",
            description_scaffold()
        );
        xmp.insert_str(end + 1, &rdf);
        return Ok(xmp);
    }

    Err(Error::InvalidXmp("packet did not contain x:xmpmeta or rdf:RDF".into()))
}

/// Declares `prefix` on `rdf:Description` when nothing in the packet does
fn ensure_namespace(mut xmp: String, prefix: &str) -> Result<String> {
    if xmp.to_ascii_lowercase().contains(&format!("xmlns:{prefix}=")) {
        return Ok(xmp);
    }
    let Some((_, uri)) = NAMESPACES.iter().find(|(known, _)| *known == prefix) else {
        return Ok(xmp);
    };
    let end = description_end(&xmp)?;
    xmp.insert_str(end, &format!("\n    xmlns:{prefix}=\"{uri}\""));
    Ok(xmp)
}

/// Writes XMP packets
pub struct XmpEncoder;

impl XmpEncoder {
    /// Applies `updates` to `original`, or to a fresh packet when there is none
    ///
    /// Existing properties are replaced in the form they were written
    /// (attribute or element); new ones are added as attributes of the first
    /// `rdf:Description`. Keys outside the writable set are ignored.
    pub fn encode(updates: &XmpUpdates, original: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut xmp = match original {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => base_packet(),
        };
        let original_len = xmp.len();

        for (key, update) in updates.iter() {
            if !WRITABLE_KEYS.contains(&key) {
                log::debug!("skipping {key} which is not a writable XMP tag");
                continue;
            }
            xmp = Self::process_entry(xmp, key, update)?;
        }

        if Self::is_wrapped_in_packet(xmp.as_bytes()) {
            xmp = Self::adjust_padding(xmp, original_len)?;
        }
        Ok(xmp.into_bytes())
    }

    fn process_entry(xmp: String, key: &str, update: &MetadataUpdate) -> Result<String> {
        let existing = find_existing(&xmp, key);

        let value = match update {
            MetadataUpdate::Keep => return Ok(xmp),
            MetadataUpdate::Remove => {
                let Some(existing) = existing else {
                    log::trace!("{key} already missing from XMP");
                    return Ok(xmp);
                };
                log::trace!("removing {key}");
                let mut preamble = &xmp[..existing.start];
                let postamble = &xmp[existing.end..];
                if postamble.starts_with(['\n', '>']) {
                    preamble = trim_trailing_indent(preamble);
                }
                return Ok(format!("{preamble}{postamble}"));
            }
            MetadataUpdate::Set(value) => value,
        };

        if let Some(existing) = existing {
            log::trace!("replacing {key} with {value}");
            let replacement = build_replacement(key, value, existing.form, &existing.prefix)?;
            let mut xmp = xmp;
            xmp.replace_range(existing.start..existing.end, &replacement);
            return Ok(xmp);
        }

        log::trace!("adding {key} = {value}");
        let prefix = default_prefix(key);
        let replacement = build_replacement(key, value, Form::Attribute, prefix)?;
        let xmp = ensure_description(xmp)?;
        let mut xmp = ensure_namespace(xmp, prefix)?;
        let end = description_end(&xmp)?;
        // the keyword bag is a child element, attributes go inside the open tag
        let at = if key == KEYWORDS_KEY { end + 1 } else { end };
        xmp.insert_str(at, &format!("{BASE_NEWLINE}{replacement}"));
        Ok(xmp)
    }

    /// Gives the size change back to (or takes it from) the padding before `<?xpacket end`
    fn adjust_padding(xmp: String, original_len: usize) -> Result<String> {
        let extra = xmp.len() as i64 - original_len as i64;
        let end = xmp
            .to_ascii_lowercase()
            .find("<?xpacket end")
            .ok_or_else(|| Error::InvalidXmp("cannot find XMP packet end".into()))?;
        let pad_start = xmp[..end].trim_end().len();
        let existing = (end - pad_start) as i64;
        if existing <= extra {
            log::debug!("{extra} extra bytes do not fit into {existing} bytes of XMP padding");
            return Ok(xmp);
        }
        let padding = Self::whitespace_of_length((existing - extra) as usize);
        Ok(format!("{}{padding}{}", &xmp[..pad_start], &xmp[end..]))
    }

    /// Starts with an `<?xpacket` processing instruction
    pub fn is_wrapped_in_packet(xmp: &[u8]) -> bool {
        xmp.starts_with(b"<?xpacket")
    }

    /// Spaces, with a newline every 100 bytes and as the last byte
    pub fn whitespace_of_length(len: usize) -> String {
        (0..len)
            .map(|i| if i % 100 == 0 || i + 1 == len { '\n' } else { ' ' })
            .collect()
    }

    /// Adds the `<?xpacket?>` envelope with 2 KB of padding
    pub fn wrap_in_packet(xmp: &[u8]) -> Vec<u8> {
        if Self::is_wrapped_in_packet(xmp) {
            return xmp.to_vec();
        }
        [
            XMP_PACKET_START,
            &String::from_utf8_lossy(xmp),
            &Self::whitespace_of_length(PACKET_PADDING),
            XMP_PACKET_END,
        ]
        .join("\n")
        .into_bytes()
    }
}
