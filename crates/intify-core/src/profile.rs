//! Cadre profiles.
//!
//! Intelligence records carry a `UID` that points at a row of the profile
//! sheet. Profile ids are the concatenation of two sheet columns, so lookup
//! is by exact id text.

use crate::error::IngestError;
use crate::ingest::{json_kind, parse_leading_int};
use crate::models::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record attribute holding the profile id.
pub const PROFILE_LINK_FIELD: &str = "UID";

/// Sheet columns whose concatenation forms the profile id.
const ID_COLUMNS: [usize; 2] = [22, 24];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rank: String,
    pub level: String,
    pub central: String,
    pub zonal: String,
    pub sub_zonal: String,
    pub division: String,
    pub area_committee: String,
    pub company: String,
    pub platoon: String,
    pub rpc: String,
    pub weapon: String,
    pub electronic_gadget: String,
    pub status: String,
    pub other_info: String,
    pub resident: String,
    pub district: String,
    pub work_area: String,
}

impl Profile {
    /// Build from one positional profile sheet row.
    fn from_sheet_row(row: &[String]) -> Self {
        let cell = |column: usize| row.get(column).map(|c| c.trim().to_string()).unwrap_or_default();
        Self {
            id: ID_COLUMNS.iter().map(|&c| cell(c)).collect(),
            name: cell(1),
            description: cell(3),
            rank: cell(4),
            level: cell(5),
            central: cell(6),
            zonal: cell(7),
            sub_zonal: cell(8),
            division: cell(9),
            area_committee: cell(10),
            company: cell(11),
            platoon: cell(12),
            rpc: cell(13),
            weapon: cell(14),
            electronic_gadget: cell(15),
            status: cell(16),
            other_info: cell(17),
            resident: cell(18),
            district: cell(19),
            work_area: cell(20),
        }
    }
}

/// Profiles from positional sheet rows, header row first.
///
/// Only rows whose first cell starts with a non-zero serial number are
/// profiles; the rest are section headings and notes.
pub fn profiles_from_sheet_rows(rows: &[Vec<String>]) -> Vec<Profile> {
    rows.iter()
        .skip(1)
        .filter(|row| {
            row.first()
                .and_then(|serial| parse_leading_int(serial))
                .is_some_and(|serial| serial != 0)
        })
        .map(|row| Profile::from_sheet_row(row))
        .collect()
}

fn scalar_as_text(value: Value) -> Value {
    match value {
        Value::Number(_) | Value::Bool(_) => Value::String(value.to_string()),
        other => other,
    }
}

/// Profiles from a JSON array of objects with camelCase keys.
///
/// Null and numeric placeholder entries are skipped.
pub fn profiles_from_json(value: &Value) -> Result<Vec<Profile>, IngestError> {
    let rows = value
        .as_array()
        .ok_or_else(|| IngestError::NotAnArray(json_kind(value)))?;

    let mut profiles = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let object = match row {
            Value::Object(object) => object,
            Value::Null | Value::Number(_) | Value::Bool(_) => continue,
            _ => return Err(IngestError::RowNotObject { index }),
        };
        let object: serde_json::Map<String, Value> = object
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), scalar_as_text(v.clone())))
            .collect();
        let profile = serde_json::from_value(Value::Object(object)).map_err(|err| {
            IngestError::InvalidRow {
                index,
                reason: err.to_string(),
            }
        })?;
        profiles.push(profile);
    }
    Ok(profiles)
}

/// The profile whose id equals `uid`.
pub fn find_profile<'a>(profiles: &'a [Profile], uid: &str) -> Option<&'a Profile> {
    let uid = uid.trim();
    if uid.is_empty() {
        return None;
    }
    profiles.iter().find(|p| p.id == uid)
}

/// The profile a record links to through its `UID` attribute.
pub fn profile_for<'a>(profiles: &'a [Profile], record: &Record) -> Option<&'a Profile> {
    find_profile(profiles, &record.field_text(PROFILE_LINK_FIELD)?)
}
