//! Mapping raw source rows to [`Record`]s.
//!
//! Two row shapes are supported: JSON objects keyed by column header (what a
//! spreadsheet export produces) and positional value rows as returned by a
//! sheet values API, header row first.

use crate::error::IngestError;
use crate::models::{date_from_sheet_serial, FieldValue, Record};
use crate::rules::IngestRules;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Column kinds of the positional sheet layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Integer,
}

/// Column position, canonical field name and kind of the intelligence sheet.
const SHEET_COLUMNS: &[(usize, &str, ColumnKind)] = &[
    (0, "Date", ColumnKind::Text),
    (1, "IntUniqueNo", ColumnKind::Integer),
    (2, "IntContent", ColumnKind::Text),
    (3, "Name_", ColumnKind::Text),
    (4, "Name", ColumnKind::Text),
    (5, "GR", ColumnKind::Text),
    (8, "Strength", ColumnKind::Integer),
    (10, "Source", ColumnKind::Text),
    (11, "Type", ColumnKind::Text),
    (12, "Rank", ColumnKind::Text),
    (13, "AreaCommittee", ColumnKind::Text),
    (14, "District", ColumnKind::Text),
    (15, "PoliceStation", ColumnKind::Text),
    (17, "Division", ColumnKind::Text),
    (18, "Week", ColumnKind::Integer),
    (19, "Month", ColumnKind::Integer),
    (21, "UID", ColumnKind::Text),
];

/// Canonical name for a source column header.
pub fn canonical_field_name(name: &str) -> &str {
    match name.trim() {
        "Police Station" => "PoliceStation",
        "Area Committee" => "AreaCommittee",
        "Int Unique No" => "IntUniqueNo",
        "Int Content" => "IntContent",
        other => other,
    }
}

/// Records produced from one batch of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Every row, in ingestion order
    pub records: Vec<Record>,
    /// Ids carried by more than one row, each listed once
    pub duplicate_ids: Vec<String>,
}

/// Accumulates records and notes ids shared between rows.
///
/// One intelligence number often covers several cadres, so rows sharing an
/// id are all kept.
struct Collector<'r> {
    rules: &'r IngestRules,
    seen_ids: HashSet<String>,
    report: IngestReport,
}

impl<'r> Collector<'r> {
    fn new(rules: &'r IngestRules) -> Self {
        Self {
            rules,
            seen_ids: HashSet::new(),
            report: IngestReport::default(),
        }
    }

    fn push(&mut self, fields: Vec<(String, FieldValue)>) {
        let record = build_record(fields, self.rules);
        if let Some(id) = &record.id {
            if !self.seen_ids.insert(id.clone()) && !self.report.duplicate_ids.contains(id) {
                tracing::debug!(id = %id, "id shared by several rows");
                self.report.duplicate_ids.push(id.clone());
            }
        }
        self.report.records.push(record);
    }

    fn finish(self) -> IngestReport {
        tracing::debug!(
            records = self.report.records.len(),
            duplicates = self.report.duplicate_ids.len(),
            "rows ingested"
        );
        self.report
    }
}

fn build_record(fields: Vec<(String, FieldValue)>, rules: &IngestRules) -> Record {
    let mut record = Record::default();
    for (field, value) in fields {
        if field == rules.date_field {
            record = match value {
                FieldValue::Number(serial) => match date_from_sheet_serial(serial) {
                    Some(date) => record.with_date(date),
                    None => record.with_date_text(&serial.to_string()),
                },
                FieldValue::Text(text) => record.with_date_text(&text),
            };
        } else if field == rules.grid_field {
            record.grid_reference = value.as_text().trim().to_string();
        } else {
            if field == rules.id_field {
                record.id = Some(value.as_text());
            }
            record.attributes.insert(field, value);
        }
    }
    record
}

fn json_scalar(value: &Value) -> Option<Result<FieldValue, ()>> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(Ok(FieldValue::Text(s.clone()))),
        Value::Number(n) => n.as_f64().map(|n| Ok(FieldValue::Number(n))),
        Value::Bool(b) => Some(Ok(FieldValue::Text(b.to_string()))),
        Value::Array(_) | Value::Object(_) => Some(Err(())),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Records from a JSON array of objects keyed by column header.
///
/// Null and blank cells are omitted.
pub fn records_from_json(value: &Value, rules: &IngestRules) -> Result<IngestReport, IngestError> {
    let rows = value
        .as_array()
        .ok_or_else(|| IngestError::NotAnArray(json_kind(value)))?;

    let mut collector = Collector::new(rules);
    for (index, row) in rows.iter().enumerate() {
        let object = row.as_object().ok_or(IngestError::RowNotObject { index })?;
        let mut fields = Vec::with_capacity(object.len());
        for (header, cell) in object {
            let field = canonical_field_name(header).to_string();
            match json_scalar(cell) {
                None => {}
                Some(Ok(value)) => fields.push((field, value)),
                Some(Err(())) => return Err(IngestError::NestedValue { index, field }),
            }
        }
        collector.push(fields);
    }
    Ok(collector.finish())
}

/// Leading integer of a cell, the way spreadsheet exports coerce them.
pub(crate) fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let digits_start = usize::from(text.starts_with(['-', '+']));
    let digits_len = text[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    text[..digits_start + digits_len].parse().ok()
}

/// Records from positional sheet rows. The first row is the header.
///
/// Short rows are allowed; missing cells are treated as blank.
pub fn records_from_sheet_rows(rows: &[Vec<String>], rules: &IngestRules) -> IngestReport {
    let mut collector = Collector::new(rules);
    for row in rows.iter().skip(1) {
        let fields = SHEET_COLUMNS
            .iter()
            .filter_map(|&(column, field, kind)| {
                let cell = row.get(column)?.trim();
                let value = match kind {
                    ColumnKind::Integer => FieldValue::from(parse_leading_int(cell)?),
                    ColumnKind::Text if cell.is_empty() => return None,
                    ColumnKind::Text => FieldValue::Text(cell.to_string()),
                };
                Some((field.to_string(), value))
            })
            .collect();
        collector.push(fields);
    }
    collector.finish()
}
