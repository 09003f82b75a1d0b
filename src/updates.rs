//! Extraction options and XMP updates

use crate::metadata::MetadataValue;

/// Thumbnails larger than this are taken without looking at JPEG strips
pub const DEFAULT_PREVIEW_SIZE_THRESHOLD: usize = 500_000;

/// Marker searches with more start/end pairings than this give up
pub const DEFAULT_MAX_SEARCH_PAIRS: usize = 25;

/// Marker search candidates shorter than this are ignored
pub const DEFAULT_MIN_SEARCH_LENGTH: usize = 4_000;

/// Options controlling preview extraction
///
/// Options are fixed when a decoder is created, so memoized previews always
/// reflect the options they were extracted with.
///
/// # Example
///
/// ```
/// use rawmeta_io::ExtractOptions;
///
/// let options = ExtractOptions::new().skip_metadata(true);
/// assert!(options.skip_metadata);
/// assert_eq!(options.preview_size_threshold, 500_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Return the embedded JPEG as stored, without injecting the RAW's metadata
    pub skip_metadata: bool,

    /// Byte size above which a thumbnail wins outright
    pub preview_size_threshold: usize,

    /// Cap on start/end pairings tried by the brute-force JPEG search
    pub max_search_pairs: usize,

    /// Minimum candidate length for the brute-force JPEG search
    pub min_search_length: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            skip_metadata: false,
            preview_size_threshold: DEFAULT_PREVIEW_SIZE_THRESHOLD,
            max_search_pairs: DEFAULT_MAX_SEARCH_PAIRS,
            min_search_length: DEFAULT_MIN_SEARCH_LENGTH,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_metadata(mut self, skip: bool) -> Self {
        self.skip_metadata = skip;
        self
    }

    pub fn preview_size_threshold(mut self, bytes: usize) -> Self {
        self.preview_size_threshold = bytes;
        self
    }

    pub fn max_search_pairs(mut self, pairs: usize) -> Self {
        self.max_search_pairs = pairs;
        self
    }

    pub fn min_search_length(mut self, bytes: usize) -> Self {
        self.min_search_length = bytes;
        self
    }
}

/// Metadata update strategy for one XMP key
///
/// By default a key is left as it is in the packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MetadataUpdate {
    /// Keep the existing value (default)
    #[default]
    Keep,
    /// Remove the value from the packet
    Remove,
    /// Replace or add the value
    Set(MetadataValue),
}

/// Updates to apply to an XMP packet
///
/// Keys are applied in the order they were first given; giving a key again
/// replaces its update in place.
///
/// # Example
///
/// ```
/// use rawmeta_io::{XmpEncoder, XmpUpdates};
///
/// # fn main() -> rawmeta_io::Result<()> {
/// let updates = XmpUpdates::new()
///     .set("Rating", 4)
///     .set("Label", "Blue")
///     .set_keywords(&["yosemite", "valley"]);
/// let xmp = XmpEncoder::encode(&updates, None)?;
///
/// // Remove the rating again, keep everything else
/// let xmp = XmpEncoder::encode(&XmpUpdates::new().remove("Rating"), Some(&xmp))?;
/// assert!(!String::from_utf8_lossy(&xmp).contains("xmp:Rating"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmpUpdates {
    updates: Vec<(String, MetadataUpdate)>,
}

impl XmpUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, key: &str, update: MetadataUpdate) -> Self {
        match self.updates.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => *slot = update,
            None => self.updates.push((key.to_string(), update)),
        }
        self
    }

    /// Set `key` to `value`
    pub fn set(self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.with(key, MetadataUpdate::Set(value.into()))
    }

    /// Remove `key` from the packet
    pub fn remove(self, key: &str) -> Self {
        self.with(key, MetadataUpdate::Remove)
    }

    /// Leave `key` untouched (explicit, same as default)
    pub fn keep(self, key: &str) -> Self {
        self.with(key, MetadataUpdate::Keep)
    }

    /// Set the `dc:subject` keyword bag
    pub fn set_keywords(self, keywords: &[&str]) -> Self {
        let json = serde_json::Value::from(keywords.to_vec()).to_string();
        self.set("DCSubjectBagOfWords", json)
    }

    /// Keys with a pending change, in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataUpdate)> {
        self.updates
            .iter()
            .filter(|(_, update)| *update != MetadataUpdate::Keep)
            .map(|(key, update)| (key.as_str(), update))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
