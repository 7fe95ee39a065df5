//! Placemark (KML) export formatting.

use crate::filter::FilterSpec;
use crate::models::ISO_DATE_FORMAT;
use serde::{Deserialize, Serialize};

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// A named point handed to the export sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPoint {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// Render a KML 2.2 document with one placemark per point.
pub fn render_kml(points: &[ExportPoint]) -> String {
    let mut kml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    kml.push_str(&format!("<kml xmlns=\"{}\">\n<Document>\n", KML_NAMESPACE));

    for point in points {
        kml.push_str("  <Placemark>\n");
        kml.push_str(&format!("    <name>{}</name>\n", escape_xml(&point.name)));
        kml.push_str("    <Point>\n");
        kml.push_str(&format!(
            "      <coordinates>{},{}</coordinates>\n",
            point.longitude, point.latitude
        ));
        kml.push_str("    </Point>\n");
        kml.push_str("  </Placemark>\n");
    }

    kml.push_str("</Document>\n</kml>\n");
    kml
}

/// Escape the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Replace every character outside `[a-zA-Z0-9-_=.]` with `_`.
pub fn sanitize_file_name(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File name describing the filters and legend an export was made with.
///
/// Shape: `kml_{field=v1,v2}_..._startDate=..._endDate=..._legend=X.kml`,
/// sanitized.
pub fn export_file_name(spec: &FilterSpec, legend: &str) -> String {
    let fields = spec
        .value_constraints()
        .map(|(field, values)| format!("{}={}", field, values.join(",")))
        .collect::<Vec<_>>()
        .join("_");

    let mut name = format!("kml_{}", fields);
    if let Some(bound) = spec.start_date() {
        name.push_str(&format!("_startDate={}", bound.to_text(ISO_DATE_FORMAT)));
    }
    if let Some(bound) = spec.end_date() {
        name.push_str(&format!("_endDate={}", bound.to_text(ISO_DATE_FORMAT)));
    }
    name.push_str(&format!("_legend={}.kml", legend));

    sanitize_file_name(&name)
}
