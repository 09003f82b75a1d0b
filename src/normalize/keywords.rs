//! Keyword list from the `dc:subject` bag

use crate::{containers::xmp_io::KEYWORDS_KEY, metadata::Metadata};

/// The keywords stored as a JSON array under [`KEYWORDS_KEY`]
///
/// Anything that is not a JSON array of strings gives `None`.
pub fn parse_keywords(metadata: &Metadata) -> Option<Vec<String>> {
    let json = metadata.get(KEYWORDS_KEY)?.as_str()?;
    match serde_json::from_str(json) {
        Ok(keywords) => Some(keywords),
        Err(err) => {
            log::debug!("ignoring malformed keyword list: {err}");
            None
        }
    }
}
