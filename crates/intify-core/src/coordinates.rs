//! Grid reference parsing.
//!
//! Source sheets carry positions in one of two dialects:
//!
//! - a decimal pair, latitude first, optionally with a two letter unit
//!   suffix on each token: `19.2345mN  80.6345mE`
//! - degrees-minutes-seconds with cardinal suffixes: `19°14'0"N 80°38'0"E`
//!
//! The decimal pair is tried first. Every input resolves to either a
//! [`GeoPoint`] in `(lon, lat)` order or a [`CoordinateError`].

use crate::error::CoordinateError;
use crate::models::GeoPoint;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Length of the unit suffix that may trail a decimal token.
const UNIT_SUFFIX_LEN: usize = 2;

const DMS_PAIR_PATTERN: &str = concat!(
    r#"(\d+)\s*°\s*(\d+)\s*['′’]\s*(\d+(?:\.\d+)?)\s*["″”]\s*([NS])"#,
    r#"\s+"#,
    r#"(\d+)\s*°\s*(\d+)\s*['′’]\s*(\d+(?:\.\d+)?)\s*["″”]\s*([EW])"#,
);

/// Which encoding a grid reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    DecimalPair,
    Dms,
}

/// Resolve a raw grid reference to `(lon, lat)`.
pub fn resolve(raw: &str) -> Result<GeoPoint, CoordinateError> {
    resolve_tagged(raw).map(|(point, _)| point)
}

/// Resolve a raw grid reference and report which dialect matched.
pub fn resolve_tagged(raw: &str) -> Result<(GeoPoint, Dialect), CoordinateError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(CoordinateError::Empty);
    }

    let (point, dialect) = if let Some(point) = parse_decimal_pair(text) {
        (point, Dialect::DecimalPair)
    } else if let Some(point) = parse_dms_pair(text) {
        (point, Dialect::Dms)
    } else {
        return Err(CoordinateError::Unrecognized(text.to_string()));
    };

    if !point.is_valid() {
        return Err(CoordinateError::OutOfRange {
            lon: point.lon,
            lat: point.lat,
        });
    }
    Ok((point, dialect))
}

/// Two whitespace separated decimal tokens, latitude first.
fn parse_decimal_pair(text: &str) -> Option<GeoPoint> {
    let mut tokens = text.split_whitespace();
    let lat_token = tokens.next()?;
    let lon_token = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }

    let lat = parse_decimal_token(lat_token)?;
    let lon = parse_decimal_token(lon_token)?;
    Some(GeoPoint::new(lon, lat))
}

fn parse_decimal_token(token: &str) -> Option<f64> {
    let value: f64 = strip_unit_suffix(token).parse().ok()?;
    value.is_finite().then_some(value)
}

/// Drop a trailing unit suffix such as `mN` or `mE`.
///
/// Only an alphabetic suffix of exactly `UNIT_SUFFIX_LEN` characters is
/// removed; digits are never cut off a bare number.
fn strip_unit_suffix(token: &str) -> &str {
    let suffix_start = token
        .char_indices()
        .rev()
        .nth(UNIT_SUFFIX_LEN - 1)
        .map(|(idx, _)| idx);

    match suffix_start {
        Some(start) if start > 0 && token[start..].chars().all(|c| c.is_ascii_alphabetic()) => {
            &token[..start]
        }
        _ => token,
    }
}

fn dms_pair_regex() -> &'static Regex {
    static DMS_PAIR: OnceLock<Regex> = OnceLock::new();
    DMS_PAIR.get_or_init(|| Regex::new(DMS_PAIR_PATTERN).expect("DMS pattern compiles"))
}

fn parse_dms_pair(text: &str) -> Option<GeoPoint> {
    let caps = dms_pair_regex().captures(text)?;
    let lat = dms_to_decimal(&caps[1], &caps[2], &caps[3], &caps[4])?;
    let lon = dms_to_decimal(&caps[5], &caps[6], &caps[7], &caps[8])?;
    Some(GeoPoint::new(lon, lat))
}

/// `degrees + minutes/60 + seconds/3600`, negated for S and W.
pub fn dms_to_decimal(degrees: &str, minutes: &str, seconds: &str, direction: &str) -> Option<f64> {
    let degrees: f64 = degrees.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    if !value.is_finite() {
        return None;
    }

    match direction {
        "S" | "W" => Some(-value),
        _ => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_decimal_pair_swaps_to_lon_lat() {
        let point = resolve("19.2345  80.6345").unwrap();
        assert!((point.lon - 80.6345).abs() < EPS);
        assert!((point.lat - 19.2345).abs() < EPS);
    }

    #[test]
    fn test_decimal_pair_strips_unit_suffix() {
        let (point, dialect) = resolve_tagged("19.2345mN 80.6345mE").unwrap();
        assert_eq!(dialect, Dialect::DecimalPair);
        assert!((point.lon - 80.6345).abs() < EPS);
        assert!((point.lat - 19.2345).abs() < EPS);
    }

    #[test]
    fn test_decimal_pair_accepts_negative_values() {
        let point = resolve("-33.8688 151.2093").unwrap();
        assert!((point.lat + 33.8688).abs() < EPS);
        assert!((point.lon - 151.2093).abs() < EPS);
    }

    #[test]
    fn test_half_parseable_pair_is_unresolved() {
        assert!(matches!(
            resolve("19.2345 east"),
            Err(CoordinateError::Unrecognized(_))
        ));
        assert!(resolve("19.2345").is_err());
    }

    #[test]
    fn test_non_finite_tokens_are_rejected() {
        assert!(resolve("NaN 80.0").is_err());
        assert!(resolve("inf 80.0").is_err());
    }

    #[test]
    fn test_dms_north_east() {
        let (point, dialect) = resolve_tagged("19°14'0\"N 80°38'0\"E").unwrap();
        assert_eq!(dialect, Dialect::Dms);
        assert!((point.lat - (19.0 + 14.0 / 60.0)).abs() < EPS);
        assert!((point.lon - (80.0 + 38.0 / 60.0)).abs() < EPS);
    }

    #[test]
    fn test_dms_south_west_flips_sign() {
        let point = resolve("33°52'7.68\"S 151°12'33.48\"W").unwrap();
        let lat = 33.0 + 52.0 / 60.0 + 7.68 / 3600.0;
        let lon = 151.0 + 12.0 / 60.0 + 33.48 / 3600.0;
        assert!((point.lat + lat).abs() < EPS);
        assert!((point.lon + lon).abs() < EPS);
    }

    #[test]
    fn test_dms_tolerates_inner_spacing() {
        let point = resolve("19 ° 14 ' 30 \" N   80° 38' 15\" E").unwrap();
        assert!((point.lat - (19.0 + 14.0 / 60.0 + 30.0 / 3600.0)).abs() < EPS);
        assert!((point.lon - (80.0 + 38.0 / 60.0 + 15.0 / 3600.0)).abs() < EPS);
    }

    #[test]
    fn test_empty_and_garbage_are_unresolved() {
        assert_eq!(resolve(""), Err(CoordinateError::Empty));
        assert_eq!(resolve("   "), Err(CoordinateError::Empty));
        assert_eq!(
            resolve("garbage"),
            Err(CoordinateError::Unrecognized("garbage".into()))
        );
    }

    #[test]
    fn test_out_of_range_is_unresolved() {
        assert!(matches!(
            resolve("95.0 80.0"),
            Err(CoordinateError::OutOfRange { .. })
        ));
        assert!(matches!(
            resolve("10.0 200.0"),
            Err(CoordinateError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_suffix_stripping_leaves_plain_numbers_alone() {
        assert_eq!(strip_unit_suffix("19.2345"), "19.2345");
        assert_eq!(strip_unit_suffix("19.2345mN"), "19.2345");
        assert_eq!(strip_unit_suffix("mN"), "mN");
    }
}
