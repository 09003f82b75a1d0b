//! Timestamp parsing for EXIF and XMP dates

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::metadata::MetadataValue;

/// EXIF `YYYY:MM:DD hh:mm:ss`, no zone
fn parse_colon_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn is_iso_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() > 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
        && bytes[10] == b'T'
}

/// ISO-8601; a missing offset is read as UTC
fn parse_iso_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// Parses a numeric unix timestamp, an EXIF colon date or an ISO date
pub fn parse_date(value: &MetadataValue) -> Option<DateTime<Utc>> {
    match value {
        MetadataValue::Integer(seconds) => DateTime::from_timestamp(*seconds, 0),
        MetadataValue::Float(seconds) if seconds.is_finite() => {
            DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
        }
        MetadataValue::Float(_) => None,
        MetadataValue::Text(text) => {
            let text = text.trim();
            if is_iso_date(text) {
                parse_iso_date(text)
            } else {
                parse_colon_date(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_colon_date() {
        assert_eq!(
            parse_date(&"2014:04:01 09:23:43".into()),
            Some(utc("2014-04-01T09:23:43Z"))
        );
        assert_eq!(parse_date(&"0000:00:00 00:00:00".into()), None);
        assert_eq!(parse_date(&"2014:04:01".into()), None);
    }

    #[test]
    fn test_iso_dates() {
        assert_eq!(
            parse_date(&"2014-04-01T09:23:43.29".into()),
            Some(utc("2014-04-01T09:23:43.290Z"))
        );
        assert_eq!(
            parse_date(&"2014-04-01T09:23:43.29-01:00".into()),
            Some(utc("2014-04-01T10:23:43.290Z"))
        );
        assert_eq!(
            parse_date(&"2019-12-04T12:01".into()),
            Some(utc("2019-12-04T12:01:00Z"))
        );
        assert_eq!(parse_date(&"2014-04-01Tnoon".into()), None);
    }

    #[test]
    fn test_numeric_dates() {
        assert_eq!(parse_date(&1_396_344_223.into()), Some(utc("2014-04-01T09:23:43Z")));
        assert_eq!(
            parse_date(&MetadataValue::Float(1_396_344_223.5)),
            Some(utc("2014-04-01T09:23:43.500Z"))
        );
        assert_eq!(parse_date(&MetadataValue::Float(f64::NAN)), None);
    }

    #[test]
    fn test_unrecognized_text() {
        assert_eq!(parse_date(&"yesterday".into()), None);
        assert_eq!(parse_date(&"".into()), None);
    }
}
