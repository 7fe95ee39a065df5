//! Record filtering and value suggestions.
//!
//! A [`FilterSpec`] maps field names to accepted value sets and optionally
//! carries inclusive `startDate` / `endDate` bounds. Evaluation runs in two
//! phases that are combined with AND:
//!
//! 1. date phase: a record with a parseable date must fall inside the bounds;
//!    records without a usable date always pass.
//! 2. attribute phase: for every field with a non-empty value set, the
//!    record's field text must equal one of the values, ignoring case.

use crate::error::FilterError;
use crate::models::{parse_date, FieldValue, Record, ISO_DATE_FORMAT};
use crate::rules::FilterRules;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Reserved filter field for the inclusive lower date bound.
pub const START_DATE_FIELD: &str = "startDate";
/// Reserved filter field for the inclusive upper date bound.
pub const END_DATE_FIELD: &str = "endDate";

pub fn is_date_bound_field(field: &str) -> bool {
    field == START_DATE_FIELD || field == END_DATE_FIELD
}

/// A date bound as supplied by the user.
///
/// Bound text that does not parse is kept as `Invalid`; such a bound admits
/// no dated record but does not fail the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateBound {
    Valid(NaiveDate),
    Invalid(String),
}

impl DateBound {
    pub fn parse(text: &str) -> Self {
        match parse_date(text) {
            Some(date) => DateBound::Valid(date),
            None => {
                tracing::warn!(bound = %text, "date bound does not parse; it will match no dated record");
                DateBound::Invalid(text.trim().to_string())
            }
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateBound::Valid(date) => Some(*date),
            DateBound::Invalid(_) => None,
        }
    }

    pub fn to_text(&self, format: &str) -> String {
        match self {
            DateBound::Valid(date) => date.format(format).to_string(),
            DateBound::Invalid(text) => text.clone(),
        }
    }
}

impl From<NaiveDate> for DateBound {
    fn from(date: NaiveDate) -> Self {
        DateBound::Valid(date)
    }
}

/// One entry of a raw filter map: a single value or a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFilterValue {
    One(FieldValue),
    Many(Vec<FieldValue>),
}

impl RawFilterValue {
    fn into_values(self) -> Vec<FieldValue> {
        match self {
            RawFilterValue::One(value) => vec![value],
            RawFilterValue::Many(values) => values,
        }
    }
}

/// The `{field: [values]}` shape filter selections are exchanged in.
pub type RawFilterSpec = BTreeMap<String, RawFilterValue>;

/// Declarative record filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilterSpec", into = "RawFilterSpec")]
pub struct FilterSpec {
    values: BTreeMap<String, Vec<String>>,
    start_date: Option<DateBound>,
    end_date: Option<DateBound>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the spec constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.values.values().all(Vec::is_empty)
    }

    /// Accept `values` for `field` (OR semantics within the field).
    pub fn with_values<I, V>(mut self, field: &str, values: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        if is_date_bound_field(field) {
            let values: Vec<FieldValue> = values.into_iter().map(Into::into).collect();
            if values.len() > 1 {
                return Err(FilterError::ValueSetOnDateField {
                    field: field.to_string(),
                    count: values.len(),
                });
            }
            if let Some(value) = values.first() {
                self.set_date_bound(field, &value.as_text())?;
            }
            return Ok(self);
        }

        // Selecting a field with no values yet keeps it present but unconstrained.
        self.values.entry(field.to_string()).or_default();
        for value in values {
            self.add_value(field, value)?;
        }
        Ok(self)
    }

    pub fn with_date_bound(mut self, field: &str, text: &str) -> Result<Self, FilterError> {
        self.set_date_bound(field, text)?;
        Ok(self)
    }

    /// Add one accepted value to a field; duplicates are ignored.
    pub fn add_value(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), FilterError> {
        if is_date_bound_field(field) {
            return Err(FilterError::ValueSetOnDateField {
                field: field.to_string(),
                count: 1,
            });
        }
        let text = value.into().as_text();
        let values = self.values.entry(field.to_string()).or_default();
        if !values.contains(&text) {
            values.push(text);
        }
        Ok(())
    }

    /// Remove one value; a field left without values is dropped.
    pub fn remove_value(&mut self, field: &str, value: &str) {
        if let Some(values) = self.values.get_mut(field) {
            values.retain(|v| v != value);
            if values.is_empty() {
                self.values.remove(field);
            }
        }
    }

    /// Set `startDate` or `endDate` from user text.
    pub fn set_date_bound(&mut self, field: &str, text: &str) -> Result<(), FilterError> {
        let bound = DateBound::parse(text);
        match field {
            START_DATE_FIELD => self.start_date = Some(bound),
            END_DATE_FIELD => self.end_date = Some(bound),
            _ => {
                return Err(FilterError::DateBoundOnValueField {
                    field: field.to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn clear_field(&mut self, field: &str) {
        match field {
            START_DATE_FIELD => self.start_date = None,
            END_DATE_FIELD => self.end_date = None,
            _ => {
                self.values.remove(field);
            }
        }
    }

    pub fn start_date(&self) -> Option<&DateBound> {
        self.start_date.as_ref()
    }

    pub fn end_date(&self) -> Option<&DateBound> {
        self.end_date.as_ref()
    }

    /// Value-set constraints in field name order.
    pub fn value_constraints(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(field, values)| (field.as_str(), values.as_slice()))
    }

    /// Phase 1: inclusive date bounds.
    pub fn matches_date(&self, record: &Record) -> bool {
        let Some(date) = record.date else {
            return true;
        };
        let after_start = match &self.start_date {
            Some(bound) => bound.date().is_some_and(|start| date >= start),
            None => true,
        };
        let before_end = match &self.end_date {
            Some(bound) => bound.date().is_some_and(|end| date <= end),
            None => true,
        };
        after_start && before_end
    }

    /// Phase 2: every non-empty value set must contain the record's value.
    pub fn matches_attributes(&self, record: &Record) -> bool {
        self.values
            .iter()
            .filter(|(_, accepted)| !accepted.is_empty())
            .all(|(field, accepted)| {
                let Some(text) = record.field_text(field) else {
                    return false;
                };
                let text = text.to_lowercase();
                accepted.iter().any(|value| value.to_lowercase() == text)
            })
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.matches_date(record) && self.matches_attributes(record)
    }
}

impl TryFrom<RawFilterSpec> for FilterSpec {
    type Error = FilterError;

    fn try_from(raw: RawFilterSpec) -> Result<Self, Self::Error> {
        raw.into_iter().try_fold(FilterSpec::new(), |spec, (field, value)| {
            spec.with_values(&field, value.into_values())
        })
    }
}

impl From<FilterSpec> for RawFilterSpec {
    fn from(spec: FilterSpec) -> Self {
        let mut raw: RawFilterSpec = spec
            .values
            .into_iter()
            .map(|(field, values)| {
                let values = values.into_iter().map(FieldValue::Text).collect();
                (field, RawFilterValue::Many(values))
            })
            .collect();
        for (field, bound) in [(START_DATE_FIELD, spec.start_date), (END_DATE_FIELD, spec.end_date)] {
            if let Some(bound) = bound {
                let text = FieldValue::Text(bound.to_text(ISO_DATE_FORMAT));
                raw.insert(field.to_string(), RawFilterValue::Many(vec![text]));
            }
        }
        raw
    }
}

/// Records matching `spec`, in input order.
///
/// An empty result is a valid outcome, not an error.
pub fn apply<'a>(records: &'a [Record], spec: &FilterSpec) -> Vec<&'a Record> {
    if spec.is_empty() {
        return records.iter().collect();
    }
    let matched: Vec<&Record> = records.iter().filter(|r| spec.matches(r)).collect();
    tracing::debug!(total = records.len(), matched = matched.len(), "filter applied");
    matched
}

/// Distinct values observed for `field`, in first-seen order.
///
/// Values of numeric-coded fields are returned verbatim, everything else is
/// lowercased. With `exclude_sentinels` the configured "unknown" tokens are
/// dropped before normalization.
pub fn suggestions_for(
    records: &[Record],
    field: &str,
    rules: &FilterRules,
    exclude_sentinels: bool,
) -> Vec<String> {
    if is_date_bound_field(field) {
        return Vec::new();
    }
    let numeric = rules.is_numeric_field(field);
    let mut seen = HashSet::new();
    let mut suggestions = Vec::new();

    for text in records.iter().filter_map(|r| r.field_text(field)) {
        if exclude_sentinels && rules.is_sentinel(&text) {
            continue;
        }
        let normalized = if numeric { text } else { text.to_lowercase() };
        if seen.insert(normalized.clone()) {
            suggestions.push(normalized);
        }
    }
    suggestions
}

/// Check that a chosen value is one of the suggestions for its field.
pub fn validate_choice(field: &str, value: &str, suggestions: &[String]) -> Result<(), FilterError> {
    if is_date_bound_field(field) {
        return Ok(());
    }
    let wanted = value.to_lowercase();
    if suggestions.iter().any(|s| s.to_lowercase() == wanted) {
        Ok(())
    } else {
        Err(FilterError::UnknownChoice {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Drop records where any field equals the removal marker (`unknown` by
/// default), ignoring case.
///
/// Only the marker counts here; the wider sentinel set of `rules` is for
/// suggestions.
pub fn drop_unknown<'a, I>(records: I, rules: &FilterRules) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|record| !record.field_texts().any(|text| rules.is_removal_marker(&text)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::SentinelMatch;

    fn sample() -> Vec<Record> {
        vec![
            Record::new("19.1 80.1")
                .with_date_text("01/01/2020")
                .with_attribute("Name_", "a")
                .with_attribute("District", "Narayanpur")
                .with_attribute("Month", 1i64),
            Record::new("19.2 80.2")
                .with_date_text("15/01/2020")
                .with_attribute("Name_", "B")
                .with_attribute("District", "Kanker")
                .with_attribute("Month", 1i64),
            Record::new("")
                .with_date_text("not recorded")
                .with_attribute("Name_", "c")
                .with_attribute("District", "Unknown")
                .with_attribute("Month", 2i64),
            Record::new("19.3 80.3")
                .with_attribute("Name_", "a")
                .with_attribute("District", "ukn"),
            Record::new("19.4 80.4")
                .with_date_text("31/01/2020")
                .with_attribute("Name_", "d"),
        ]
    }

    fn names(records: &[&Record]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.field_text("Name_"))
            .collect()
    }

    #[test]
    fn test_empty_spec_matches_everything() {
        let records = sample();
        assert_eq!(apply(&records, &FilterSpec::new()).len(), records.len());
    }

    #[test]
    fn test_values_match_case_insensitively_with_or_semantics() {
        let records = sample();
        let spec = FilterSpec::new().with_values("Name_", ["A", "b"]).unwrap();
        assert_eq!(names(&apply(&records, &spec)), vec!["a", "B", "a"]);
    }

    #[test]
    fn test_fields_combine_with_and_semantics() {
        let records = sample();
        let spec = FilterSpec::new()
            .with_values("Name_", ["a", "b"])
            .unwrap()
            .with_values("District", ["kanker"])
            .unwrap();
        assert_eq!(names(&apply(&records, &spec)), vec!["B"]);
    }

    #[test]
    fn test_numeric_values_compare_as_text() {
        let records = sample();
        let spec = FilterSpec::new().with_values("Month", [1i64]).unwrap();
        assert_eq!(apply(&records, &spec).len(), 2);
    }

    #[test]
    fn test_field_without_values_imposes_no_constraint() {
        let records = sample();
        let spec = FilterSpec::new()
            .with_values("Name_", Vec::<String>::new())
            .unwrap();
        assert_eq!(apply(&records, &spec).len(), records.len());
    }

    #[test]
    fn test_date_bounds_are_inclusive_and_keep_undated_records() {
        let records = sample();
        let spec = FilterSpec::new()
            .with_date_bound(START_DATE_FIELD, "2020-01-01")
            .unwrap()
            .with_date_bound(END_DATE_FIELD, "2020-01-15")
            .unwrap();
        // both endpoints plus the unparseable and the missing date
        assert_eq!(names(&apply(&records, &spec)), vec!["a", "B", "c", "a"]);
    }

    #[test]
    fn test_single_sided_bounds() {
        let records = sample();
        let from = FilterSpec::new()
            .with_date_bound(START_DATE_FIELD, "2020-01-15")
            .unwrap();
        assert_eq!(names(&apply(&records, &from)), vec!["B", "c", "a", "d"]);

        let until = FilterSpec::new()
            .with_date_bound(END_DATE_FIELD, "2020-01-14")
            .unwrap();
        assert_eq!(names(&apply(&records, &until)), vec!["a", "c", "a"]);
    }

    #[test]
    fn test_invalid_bound_matches_no_dated_record() {
        let records = sample();
        let spec = FilterSpec::new()
            .with_date_bound(START_DATE_FIELD, "yesterday")
            .unwrap();
        assert_eq!(spec.start_date(), Some(&DateBound::Invalid("yesterday".into())));
        assert_eq!(names(&apply(&records, &spec)), vec!["c", "a"]);
    }

    #[test]
    fn test_superset_constraint_never_returns_more() {
        let records = sample();
        let narrow = FilterSpec::new().with_values("Name_", ["a"]).unwrap();
        let wide = FilterSpec::new().with_values("Name_", ["a", "b", "d"]).unwrap();
        let combined = wide.clone().with_values("District", ["kanker"]).unwrap();

        assert!(apply(&records, &narrow).len() <= apply(&records, &wide).len());
        assert!(apply(&records, &combined).len() <= apply(&records, &wide).len());
    }

    #[test]
    fn test_value_set_on_date_field_is_rejected() {
        let err = FilterSpec::new()
            .with_values(START_DATE_FIELD, ["2020-01-01", "2020-02-01"])
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::ValueSetOnDateField {
                field: START_DATE_FIELD.into(),
                count: 2
            }
        );

        let mut spec = FilterSpec::new();
        assert!(spec.add_value(END_DATE_FIELD, "2020-01-01").is_err());
    }

    #[test]
    fn test_date_bound_on_value_field_is_rejected() {
        let err = FilterSpec::new()
            .with_date_bound("Name_", "2020-01-01")
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::DateBoundOnValueField {
                field: "Name_".into()
            }
        );
    }

    #[test]
    fn test_raw_map_round_trip() {
        let json = serde_json::json!({
            "Name_": ["a", "b"],
            "Month": [3],
            "startDate": "2020-01-01",
            "endDate": ["2020-01-31T00:00:00.000Z"]
        });
        let spec: FilterSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.start_date().and_then(DateBound::date), NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(spec.end_date().and_then(DateBound::date), NaiveDate::from_ymd_opt(2020, 1, 31));
        let constraints: Vec<_> = spec.value_constraints().collect();
        assert_eq!(constraints[0], ("Month", &["3".to_string()][..]));

        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["endDate"], serde_json::json!(["2020-01-31"]));
        assert_eq!(back["Name_"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_raw_map_with_multiple_dates_fails_to_deserialize() {
        let json = serde_json::json!({ "endDate": ["2020-01-01", "2020-02-01"] });
        assert!(serde_json::from_value::<FilterSpec>(json).is_err());
    }

    #[test]
    fn test_remove_value_drops_empty_fields() {
        let mut spec = FilterSpec::new().with_values("Name_", ["a"]).unwrap();
        spec.remove_value("Name_", "a");
        assert!(spec.is_empty());
        assert_eq!(spec.value_constraints().count(), 0);
    }

    #[test]
    fn test_suggestions_normalize_and_exclude_sentinels() {
        let records = sample();
        let rules = FilterRules::default();

        let districts = suggestions_for(&records, "District", &rules, false);
        assert_eq!(districts, vec!["narayanpur", "kanker", "unknown", "ukn"]);

        let known = suggestions_for(&records, "District", &rules, true);
        assert_eq!(known, vec!["narayanpur", "kanker"]);

        let months = suggestions_for(&records, "Month", &rules, true);
        assert_eq!(months, vec!["1", "2"]);

        assert!(suggestions_for(&records, START_DATE_FIELD, &rules, false).is_empty());
    }

    #[test]
    fn test_sentinel_case_sensitivity_is_configurable() {
        let records = vec![Record::new("").with_attribute("Rank", "UNKNOWN")];
        let exact = FilterRules::default();
        assert_eq!(suggestions_for(&records, "Rank", &exact, true), vec!["unknown"]);

        let folded = FilterRules {
            sentinel_match: SentinelMatch::CaseInsensitive,
            ..FilterRules::default()
        };
        assert!(suggestions_for(&records, "Rank", &folded, true).is_empty());
    }

    #[test]
    fn test_choices_must_come_from_suggestions() {
        let suggestions = vec!["kanker".to_string()];
        assert!(validate_choice("District", "Kanker", &suggestions).is_ok());
        assert!(validate_choice("District", "Bastar", &suggestions).is_err());
        assert!(validate_choice(START_DATE_FIELD, "2020-01-01", &suggestions).is_ok());
    }

    #[test]
    fn test_drop_unknown_removes_marked_rows_only() {
        let records = sample();
        let kept = drop_unknown(&records, &FilterRules::default());
        assert_eq!(names(&kept), vec!["a", "B", "a", "d"]);

        let shouting = vec![Record::new("").with_attribute("Rank", "UNKNOWN")];
        assert!(drop_unknown(&shouting, &FilterRules::default()).is_empty());
    }
}
