//! Core data models for intelligence records.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved field name addressing the record date.
pub const DATE_FIELD: &str = "Date";
/// Reserved field name addressing the raw grid reference.
pub const GRID_FIELD: &str = "GR";

/// Date format used by the source sheets (`dd/mm/yyyy`).
pub const SHEET_DATE_FORMAT: &str = "%d/%m/%Y";
/// ISO date format used by date pickers and filter files.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A categorical attribute value as it arrives from the record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Text form used for every comparison.
    ///
    /// Whole numbers render without a fractional part, so `5.0` compares
    /// equal to the string `"5"`.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, FieldValue::Number(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// True when both components are finite and inside WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Great-circle distance in meters (Haversine formula).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let dphi = (other.lat - self.lat).to_radians();
        let dlambda = (other.lon - self.lon).to_radians();
        let a = (dphi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// `[lon, lat]`, the order GeoJSON and KML expect.
    pub fn to_lon_lat(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// One intelligence record.
///
/// Records are immutable once ingested; every engine operation borrows them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Parsed calendar date (None when absent or unparseable)
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Date text exactly as the source supplied it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_date: Option<String>,
    /// Raw grid reference, possibly empty
    #[serde(default)]
    pub grid_reference: String,
    /// Categorical attributes keyed by canonical field name
    #[serde(default)]
    pub attributes: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(grid_reference: impl Into<String>) -> Self {
        Self {
            grid_reference: grid_reference.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the date from source text, keeping the raw text for display.
    pub fn with_date_text(mut self, text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.date = None;
            self.raw_date = None;
        } else {
            self.date = parse_date(trimmed);
            self.raw_date = Some(trimmed.to_string());
        }
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self.raw_date = Some(date.format(SHEET_DATE_FORMAT).to_string());
        self
    }

    pub fn with_attribute(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Text of a named field.
    ///
    /// Besides attributes this resolves the reserved names `Date` and `GR`,
    /// so filters, legends and selectors can address every column the same
    /// way. Returns None for absent fields and blank grid references.
    pub fn field_text(&self, field: &str) -> Option<String> {
        match field {
            DATE_FIELD => match self.date {
                Some(date) => Some(date.format(SHEET_DATE_FORMAT).to_string()),
                None => self.raw_date.clone(),
            },
            GRID_FIELD => {
                let gr = self.grid_reference.trim();
                (!gr.is_empty()).then(|| gr.to_string())
            }
            _ => self.attributes.get(field).map(FieldValue::as_text),
        }
    }

    /// Every populated field value as text (attributes, grid reference, date).
    pub fn field_texts(&self) -> impl Iterator<Item = String> + '_ {
        self.attributes
            .values()
            .map(FieldValue::as_text)
            .chain(self.field_text(GRID_FIELD))
            .chain(self.field_text(DATE_FIELD))
    }
}

/// Deterministic `#rrggbb` color for a legend value.
///
/// Equal text always maps to the same color, so renderers can group markers
/// and legend entries by it.
pub fn legend_color(text: &str) -> String {
    let hash = text.encode_utf16().fold(0i32, |hash, unit| {
        i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    let mut color = String::with_capacity(7);
    color.push('#');
    for shift in [0, 8, 16] {
        color.push_str(&format!("{:02x}", (hash >> shift) & 0xFF));
    }
    color
}

/// Parse a record or filter date.
///
/// Accepts `dd/mm/yyyy` (sheet cells), `yyyy-mm-dd` and ISO timestamps
/// whose date part is `yyyy-mm-dd`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, SHEET_DATE_FORMAT) {
        return Some(date);
    }
    let date_part = text.split('T').next().unwrap_or(text);
    NaiveDate::parse_from_str(date_part, ISO_DATE_FORMAT).ok()
}

/// Convert a spreadsheet serial day number (1900 date system) to a date.
pub fn date_from_sheet_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}
