//! CLI configuration from environment.

use intify_core::{FilterRules, IngestRules, PlacementRules, SentinelMatch};
use std::env;

/// Field used to name exported placemarks when none is given.
pub const DEFAULT_LEGEND: &str = "Name_";
/// Workbook tab holding intelligence records.
pub const DEFAULT_RECORD_SHEET: &str = "Int Main Sheet";
/// Workbook tab holding cadre profiles.
pub const DEFAULT_PROFILE_SHEET: &str = "Naxal Profile";

#[derive(Debug, Clone)]
pub struct Config {
    pub placement: PlacementRules,
    pub filter: FilterRules,
    pub ingest: IngestRules,
    pub legend: String,
    pub record_sheet: String,
    pub profile_sheet: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparseable values fall back to
    /// the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut placement = PlacementRules::default();
        if let Some(radius) = lookup("INTIFY_BASE_RADIUS").and_then(|s| s.parse().ok()) {
            placement.base_radius_deg = radius;
        }
        if let Some(field) = lookup("INTIFY_COLOR_FIELD") {
            placement.color_field = field;
        }
        if let Some(step) = lookup("INTIFY_CLUSTER_STEP")
            .and_then(|s| s.parse().ok())
            .filter(|&step: &usize| step > 0)
        {
            placement.radius_step = step;
        }

        let mut filter = FilterRules::default();
        if let Some(list) = lookup("INTIFY_UNKNOWN_SENTINELS") {
            filter.unknown_sentinels = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        let case_insensitive = lookup("INTIFY_SENTINEL_CASE_INSENSITIVE")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if case_insensitive {
            filter.sentinel_match = SentinelMatch::CaseInsensitive;
        }

        Self {
            placement,
            filter,
            ingest: IngestRules::default(),
            legend: lookup("INTIFY_LEGEND").unwrap_or_else(|| DEFAULT_LEGEND.to_string()),
            record_sheet: lookup("INTIFY_RECORD_SHEET")
                .unwrap_or_else(|| DEFAULT_RECORD_SHEET.to_string()),
            profile_sheet: lookup("INTIFY_PROFILE_SHEET")
                .unwrap_or_else(|| DEFAULT_PROFILE_SHEET.to_string()),
        }
    }
}
