//! Loading records, profiles and filter specs from disk.

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use intify_core::{
    profiles_from_json, profiles_from_sheet_rows, records_from_json, records_from_sheet_rows,
    FilterSpec, IngestReport, IngestRules, Profile,
};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Extensions opened as spreadsheet workbooks.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Shape of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Array of objects keyed by column header
    Records,
    /// Array of positional value rows, header row first
    SheetRows,
    /// Spreadsheet workbook; one named tab is read
    Workbook,
}

impl InputFormat {
    /// Workbooks are recognized by extension; JSON files default to
    /// `Records` unless `sheet_rows` is set.
    pub fn detect(path: &Path, sheet_rows: bool) -> Self {
        let is_workbook = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| WORKBOOK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_workbook {
            InputFormat::Workbook
        } else if sheet_rows {
            InputFormat::SheetRows
        } else {
            InputFormat::Records
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Positional rows from a JSON array of arrays. Scalar cells become text.
pub fn sheet_rows(value: &Value) -> Result<Vec<Vec<String>>> {
    let rows = value.as_array().context("sheet rows must be a JSON array")?;
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let cells = row
                .as_array()
                .with_context(|| format!("sheet row {} is not an array", index))?;
            Ok(cells.iter().map(cell_text).collect())
        })
        .collect()
}

/// JSON value of a workbook cell. Dates become serial day numbers.
fn workbook_cell(cell: &Data) -> Value {
    match cell {
        Data::Int(n) => Value::from(*n),
        Data::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => serde_json::Number::from_f64(dt.as_f64()).map_or(Value::Null, Value::Number),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        _ => Value::Null,
    }
}

/// Workbook rows as JSON objects keyed by the header row.
///
/// Columns with a blank header and empty cells are left out.
pub fn workbook_objects(rows: &[Vec<Data>]) -> Value {
    let Some((header, body)) = rows.split_first() else {
        return Value::Array(Vec::new());
    };
    let headers: Vec<String> = header
        .iter()
        .map(|cell| cell_text(&workbook_cell(cell)).trim().to_string())
        .collect();

    let objects = body
        .iter()
        .map(|row| {
            let object: Map<String, Value> = headers
                .iter()
                .zip(row)
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, cell)| (name.clone(), workbook_cell(cell)))
                .filter(|(_, value)| !value.is_null())
                .collect();
            Value::Object(object)
        })
        .filter(|object| object.as_object().is_some_and(|o| !o.is_empty()))
        .collect();
    Value::Array(objects)
}

/// Workbook rows as positional text rows.
pub fn workbook_text_rows(rows: &[Vec<Data>]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell_text(&workbook_cell(cell))).collect())
        .collect()
}

fn read_workbook_sheet(path: &Path, sheet: &str) -> Result<Vec<Vec<Data>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range(sheet)
        .with_context(|| format!("workbook {} has no readable sheet {:?}", path.display(), sheet))?;
    Ok(range.rows().map(|row| row.to_vec()).collect())
}

pub fn parse_records(value: &Value, format: InputFormat, rules: &IngestRules) -> Result<IngestReport> {
    match format {
        InputFormat::Records | InputFormat::Workbook => Ok(records_from_json(value, rules)?),
        InputFormat::SheetRows => Ok(records_from_sheet_rows(&sheet_rows(value)?, rules)),
    }
}

/// Load records; `sheet` names the workbook tab and is ignored for JSON.
pub fn load_records(
    path: &Path,
    format: InputFormat,
    sheet: &str,
    rules: &IngestRules,
) -> Result<IngestReport> {
    let value = match format {
        InputFormat::Workbook => workbook_objects(&read_workbook_sheet(path, sheet)?),
        InputFormat::Records | InputFormat::SheetRows => read_json(path)?,
    };
    let report = parse_records(&value, format, rules)
        .with_context(|| format!("failed to load records from {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        records = report.records.len(),
        shared_ids = report.duplicate_ids.len(),
        "records loaded"
    );
    Ok(report)
}

/// Profiles from parsed JSON: an array of profile objects, or positional
/// sheet rows when the first entry is itself an array.
pub fn parse_profiles(value: &Value) -> Result<Vec<Profile>> {
    let positional = value
        .as_array()
        .and_then(|rows| rows.first())
        .is_some_and(Value::is_array);
    if positional {
        Ok(profiles_from_sheet_rows(&sheet_rows(value)?))
    } else {
        Ok(profiles_from_json(value)?)
    }
}

/// Load profiles from a JSON file or a workbook tab.
pub fn load_profiles(path: &Path, sheet: &str) -> Result<Vec<Profile>> {
    let profiles = match InputFormat::detect(path, false) {
        InputFormat::Workbook => {
            profiles_from_sheet_rows(&workbook_text_rows(&read_workbook_sheet(path, sheet)?))
        }
        _ => parse_profiles(&read_json(path)?)
            .with_context(|| format!("failed to load profiles from {}", path.display()))?,
    };
    tracing::info!(path = %path.display(), profiles = profiles.len(), "profiles loaded");
    Ok(profiles)
}

/// A filter spec saved as JSON (`{"District": ["a"], "startDate": "2020-01-01"}`).
pub fn load_filter_spec(path: &Path) -> Result<FilterSpec> {
    let value = read_json(path)?;
    serde_json::from_value(value).with_context(|| format!("invalid filter spec in {}", path.display()))
}
