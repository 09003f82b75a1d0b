//! Canonical metadata built from a raw tag map
//!
//! Every canonical field has an ordered list of raw tags to read it from; the
//! first one that is present and has the right type wins. Dates, the lens and
//! keywords are parsed rather than copied.

mod date;
mod keywords;
mod lens;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use date::parse_date;
pub use keywords::parse_keywords;
pub use lens::{parse_lens, ParsedLens};

use crate::metadata::{Metadata, MetadataValue};

/// Metadata in a fixed schema, with the raw map it came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMetadata {
    pub make: Option<String>,
    pub model: Option<String>,

    /// Displayed width, after orientation
    pub width: Option<i64>,
    /// Displayed height, after orientation
    pub height: Option<i64>,
    pub x_resolution: Option<f64>,
    pub y_resolution: Option<f64>,

    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,

    pub iso: Option<i64>,
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    pub focal_length: Option<f64>,
    /// 35mm-equivalent focal length when known
    pub normalized_focal_length: Option<f64>,
    pub exposure_compensation: Option<f64>,

    pub lens: Option<ParsedLens>,

    pub rating: Option<i64>,
    pub color_label: Option<String>,
    pub keywords: Option<Vec<String>>,

    pub raw: Metadata,
}

/// Reads the first key present; a value of the wrong type ends the search
fn first<T>(raw: &Metadata, keys: &[&str], read: impl Fn(&MetadataValue) -> Option<T>) -> Option<T> {
    keys.iter().find_map(|key| raw.get(*key)).and_then(read)
}

/// Reads the first key whose value parses
fn first_parsed<T>(raw: &Metadata, keys: &[&str], parse: impl Fn(&MetadataValue) -> Option<T>) -> Option<T> {
    keys.iter().filter_map(|key| raw.get(*key)).find_map(parse)
}

fn text(raw: &Metadata, keys: &[&str]) -> Option<String> {
    first(raw, keys, |value| value.as_str().map(str::to_string))
}

fn integer(raw: &Metadata, keys: &[&str]) -> Option<i64> {
    first(raw, keys, MetadataValue::as_i64)
}

fn number(raw: &Metadata, keys: &[&str]) -> Option<f64> {
    first(raw, keys, MetadataValue::as_f64)
}

/// Maps a raw tag map onto [`NormalizedMetadata`]
///
/// Orientations 5 to 8 turn the image a quarter, so width and height are
/// swapped to describe the displayed image.
pub fn normalize(raw: Metadata) -> NormalizedMetadata {
    let mut normalized = NormalizedMetadata {
        make: text(&raw, &["Make"]),
        model: text(&raw, &["Model"]),

        width: integer(&raw, &["ImageWidth"]),
        height: integer(&raw, &["ImageLength"]),
        x_resolution: number(&raw, &["XResolution"]),
        y_resolution: number(&raw, &["YResolution"]),

        created_at: first_parsed(&raw, &["DateTimeOriginal", "CreateDate"], parse_date),
        modified_at: first_parsed(&raw, &["ModifyDate"], parse_date),

        iso: integer(&raw, &["ISO"]),
        exposure_time: number(&raw, &["ExposureTime"]),
        f_number: number(&raw, &["FNumber"]),
        focal_length: number(&raw, &["FocalLength", "FocalLengthIn35mmFormat"]),
        normalized_focal_length: number(&raw, &["FocalLengthIn35mmFormat", "FocalLength"]),
        exposure_compensation: number(&raw, &["ExposureCompensation"]),

        lens: first(&raw, &["LensModel"], |value| value.as_str().and_then(parse_lens)),

        rating: integer(&raw, &["Rating"]),
        color_label: text(&raw, &["Label"]),
        keywords: parse_keywords(&raw),

        raw: Metadata::new(),
    };

    if integer(&raw, &["Orientation"]).unwrap_or(0) > 4 {
        std::mem::swap(&mut normalized.width, &mut normalized.height);
    }

    normalized.raw = raw;
    normalized
}
