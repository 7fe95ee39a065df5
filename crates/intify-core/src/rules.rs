//! Tunable parameters for placement, filtering and ingestion.

use serde::{Deserialize, Serialize};

/// Configuration for cluster placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRules {
    /// Offset radius in degrees for the first ring of co-located markers
    pub base_radius_deg: f64,
    /// The radius grows by one `base_radius_deg` step every this many markers
    pub radius_step: usize,
    /// Decimal places kept when forming cluster keys
    pub key_precision: u32,
    /// Field whose text picks each marker's color
    pub color_field: String,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            base_radius_deg: 0.0001,
            radius_step: 8,
            key_precision: 6,
            color_field: "Name_".into(),
        }
    }
}

impl PlacementRules {
    /// Multiplier that turns degrees into integer cluster key units.
    pub fn key_scale(&self) -> f64 {
        10f64.powi(self.key_precision as i32)
    }
}

/// How "unknown" sentinel tokens are matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelMatch {
    /// Literal, case-sensitive comparison
    #[default]
    Exact,
    /// Comparison after lowercasing both sides
    CaseInsensitive,
}

/// Configuration for filtering and value suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Tokens that stand for "no information" in source sheets
    pub unknown_sentinels: Vec<String>,
    pub sentinel_match: SentinelMatch,
    /// Fields whose values are numeric codes; suggestions keep them verbatim
    pub numeric_fields: Vec<String>,
    /// Value that marks a record for removal, compared ignoring case
    pub removal_marker: String,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            unknown_sentinels: vec!["Unknown".into(), "ukn".into()],
            sentinel_match: SentinelMatch::Exact,
            numeric_fields: vec![
                "Month".into(),
                "Strength".into(),
                "IntUniqueNo".into(),
                "Week".into(),
            ],
            removal_marker: "unknown".into(),
        }
    }
}

impl FilterRules {
    /// True when `value` is one of the configured sentinel tokens.
    pub fn is_sentinel(&self, value: &str) -> bool {
        match self.sentinel_match {
            SentinelMatch::Exact => self.unknown_sentinels.iter().any(|s| s == value),
            SentinelMatch::CaseInsensitive => self
                .unknown_sentinels
                .iter()
                .any(|s| s.to_lowercase() == value.to_lowercase()),
        }
    }

    pub fn is_numeric_field(&self, field: &str) -> bool {
        self.numeric_fields.iter().any(|f| f == field)
    }

    pub fn is_removal_marker(&self, value: &str) -> bool {
        value.to_lowercase() == self.removal_marker.to_lowercase()
    }
}

/// Which source columns feed the fixed parts of the record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRules {
    pub date_field: String,
    pub grid_field: String,
    /// Column used as the stable record id (also kept as an attribute)
    pub id_field: String,
}

impl Default for IngestRules {
    fn default() -> Self {
        Self {
            date_field: crate::models::DATE_FIELD.into(),
            grid_field: crate::models::GRID_FIELD.into(),
            id_field: "IntUniqueNo".into(),
        }
    }
}
