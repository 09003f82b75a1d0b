//! Raw metadata values shared by every decoder

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A decoded tag value: only numbers and strings survive extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Raw tag map keyed by friendly tag name
pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Integer(value) => Some(*value as f64),
            MetadataValue::Float(value) => Some(*value),
            MetadataValue::Text(_) => None,
        }
    }

    /// Integral value, accepting floats with no fractional part
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(value) => Some(*value),
            MetadataValue::Float(value) if value.fract() == 0.0 && value.is_finite() => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Integer(value) => write!(f, "{value}"),
            MetadataValue::Float(value) => write!(f, "{value}"),
            MetadataValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(value.into())
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Integer(value.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(MetadataValue::from(4928).as_i64(), Some(4928));
        assert_eq!(MetadataValue::Float(200.0).as_i64(), Some(200));
        assert_eq!(MetadataValue::Float(0.5).as_i64(), None);
        assert_eq!(MetadataValue::from("Canon").as_str(), Some("Canon"));
        assert_eq!(MetadataValue::from("Canon").as_f64(), None);
    }

    #[test]
    fn test_display_and_json() {
        assert_eq!(MetadataValue::Float(0.5).to_string(), "0.5");
        assert_eq!(MetadataValue::Integer(3).to_string(), "3");

        let mut map = Metadata::new();
        map.insert("ISO".into(), 200.into());
        map.insert("Make".into(), "Nikon".into());
        assert_eq!(
            serde_json::to_string(&map).unwrap(),
            r#"{"ISO":200,"Make":"Nikon"}"#
        );
    }
}
