//! Memory size string parsing (`4Gi`, `4096Mi`, `4g`, `4G`, ...).
//!
//! The spec's suffix table is case-insensitive and treats the `i`-suffixed
//! and bare forms identically — both are binary (1024-based) multiples, so
//! `4Gi`, `4096Mi`, `4g` and `4G` all parse to the same byte count. Anything
//! else (`4GB`, a bare number, a negative value) is rejected.

use crate::error::CoreError;
use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*([gGmM])[iI]?$").unwrap())
}

/// Parse a memory size string into a byte count.
pub fn parse_memory(raw: &str) -> Result<u64, CoreError> {
    let trimmed = raw.trim();
    let caps = pattern()
        .captures(trimmed)
        .ok_or_else(|| CoreError::InvalidValue(format!("invalid memory value: {raw:?}")))?;

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| CoreError::InvalidValue(format!("invalid memory value: {raw:?}")))?;

    let exponent: u32 = match caps[2].to_ascii_lowercase().as_str() {
        "g" => 3,
        "m" => 2,
        _ => unreachable!("regex only captures g/m"),
    };

    let multiplier = 1024f64.powi(exponent as i32);
    Ok((value * multiplier).round() as u64)
}

/// `normalize_image`: appends `:latest` when no tag is present.
pub fn normalize_image(image: &str) -> String {
    // A tag separator is a `:` that appears after the last `/` (so a port
    // number in a registry host, e.g. `localhost:5000/foo`, isn't mistaken
    // for a tag).
    let last_slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    if image[last_slash..].contains(':') {
        image.to_string()
    } else {
        format!("{image}:latest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gi_mi_g_upper_g_all_equal() {
        let gi = parse_memory("4Gi").unwrap();
        let mi = parse_memory("4096Mi").unwrap();
        let g = parse_memory("4g").unwrap();
        let upper_g = parse_memory("4G").unwrap();
        assert_eq!(gi, 4 * 1024 * 1024 * 1024);
        assert_eq!(gi, mi);
        assert_eq!(gi, g);
        assert_eq!(gi, upper_g);
    }

    #[test]
    fn rejects_decimal_unit_suffix() {
        assert!(parse_memory("4GB").is_err());
        assert!(parse_memory("4").is_err());
        assert!(parse_memory("").is_err());
        assert!(parse_memory("-4Gi").is_err());
    }

    #[test]
    fn fractional_values_accepted() {
        let half_gi = parse_memory("0.5Gi").unwrap();
        assert_eq!(half_gi, 512 * 1024 * 1024);
    }

    #[test]
    fn normalize_image_appends_latest() {
        assert_eq!(normalize_image("python"), "python:latest");
        assert_eq!(normalize_image("python:3.11"), "python:3.11");
        assert_eq!(
            normalize_image("registry.example.com:5000/scorer"),
            "registry.example.com:5000/scorer:latest"
        );
        assert_eq!(
            normalize_image("registry.example.com:5000/scorer:v2"),
            "registry.example.com:5000/scorer:v2"
        );
    }
}
