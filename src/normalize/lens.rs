//! Lens descriptor parsing
//!
//! Lens models are free text (`EF-M15-45mm f/3.5-6.3 IS STM`,
//! `XF23mmF1.4 R`). Make, focal length and aperture are picked out with word
//! boundary rules over ASCII word characters.

use serde::{Deserialize, Serialize};

/// Parts of a `LensModel` string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLens {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
}

fn is_word(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Word boundary between `at - 1` and `at`
fn is_boundary(bytes: &[u8], at: usize) -> bool {
    let before = at > 0 && is_word(bytes[at - 1]);
    let after = at < bytes.len() && is_word(bytes[at]);
    before != after
}

/// End of the run starting at `start` whose bytes satisfy `accept`
fn run_end(bytes: &[u8], start: usize, accept: impl Fn(u8) -> bool) -> usize {
    start + bytes[start.min(bytes.len())..].iter().take_while(|b| accept(**b)).count()
}

/// Leading word, e.g. `Canon` from `Canon EF 50mm`
fn parse_make(model: &str) -> Option<&str> {
    let end = run_end(model.as_bytes(), 0, is_word);
    (end > 0).then(|| &model[..end])
}

/// `\b\d+(-\d+)?mm\b`
fn parse_focal_length(model: &str) -> Option<&str> {
    let bytes = model.as_bytes();
    for start in 0..bytes.len() {
        if !bytes[start].is_ascii_digit() || !is_boundary(bytes, start) {
            continue;
        }
        let digits = run_end(bytes, start, |b| b.is_ascii_digit());

        let mut ends = Vec::with_capacity(2);
        if bytes.get(digits) == Some(&b'-') {
            let range = run_end(bytes, digits + 1, |b| b.is_ascii_digit());
            if range > digits + 1 {
                ends.push(range);
            }
        }
        ends.push(digits);

        let matched = ends
            .into_iter()
            .find(|end| bytes[*end..].starts_with(b"mm") && is_boundary(bytes, end + 2));
        if let Some(end) = matched {
            return Some(&model[start..end + 2]);
        }
    }
    None
}

/// `\bF[\d.]+(-[\d.]+)?\b`
fn parse_aperture(model: &str) -> Option<&str> {
    let bytes = model.as_bytes();
    let aperture_byte = |b: u8| b.is_ascii_digit() || b == b'.';
    for start in 0..bytes.len() {
        if bytes[start] != b'F' || !is_boundary(bytes, start) {
            continue;
        }
        let longest = run_end(bytes, start + 1, aperture_byte);
        // shorter runs are retried the way a backtracking matcher would
        for end in (start + 2..=longest).rev() {
            if bytes.get(end) == Some(&b'-') {
                let range = run_end(bytes, end + 1, aperture_byte);
                if let Some(range_end) = (end + 2..=range).rev().find(|at| is_boundary(bytes, *at)) {
                    return Some(&model[start..range_end]);
                }
            }
            if is_boundary(bytes, end) {
                return Some(&model[start..end]);
            }
        }
    }
    None
}

/// Splits a lens model into its parts; `None` for an empty model
pub fn parse_lens(model: &str) -> Option<ParsedLens> {
    if model.is_empty() {
        return None;
    }
    Some(ParsedLens {
        model: model.to_string(),
        make: parse_make(model).map(str::to_string),
        focal_length: parse_focal_length(model).map(str::to_string),
        aperture: parse_aperture(model).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(model: &str) -> (Option<String>, Option<String>, Option<String>) {
        let lens = parse_lens(model).unwrap();
        (lens.make, lens.focal_length, lens.aperture)
    }

    fn some(text: &str) -> Option<String> {
        Some(text.to_string())
    }

    #[test]
    fn test_parse_zoom() {
        assert_eq!(
            parts("Canon EF 24-70mm F2.8 L USM"),
            (some("Canon"), some("24-70mm"), some("F2.8"))
        );
        assert_eq!(
            parts("FE 24-105mm F4-5.6 G OSS"),
            (some("FE"), some("24-105mm"), some("F4-5.6"))
        );
    }

    #[test]
    fn test_parse_prime() {
        assert_eq!(parts("Sigma 35mm F1.4 DG"), (some("Sigma"), some("35mm"), some("F1.4")));
    }

    #[test]
    fn test_boundaries_are_respected() {
        // "M15" and "mmF" are inside words
        assert_eq!(parts("EF-M15-45mm f/3.5-6.3 IS STM"), (some("EF"), some("45mm"), None));
        assert_eq!(parts("XF18-55mmF2.8-4 R LM OIS"), (some("XF18"), None, None));
    }

    #[test]
    fn test_trailing_dot_backtracks() {
        assert_eq!(parts("Lens 50mm F2. wide"), (some("Lens"), some("50mm"), some("F2")));
    }

    #[test]
    fn test_no_parts() {
        assert_eq!(parts("-"), (None, None, None));
        assert_eq!(parse_lens(""), None);
    }
}
