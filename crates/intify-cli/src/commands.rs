//! Subcommand implementations. Each takes loaded records and returns a
//! serializable result; `main` handles argument parsing and printing.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use intify_core::filter::{END_DATE_FIELD, START_DATE_FIELD};
use intify_core::{
    apply, build_route, drop_unknown, export_file_name, find_profile, place, render_kml,
    suggestions_for, validate_choice, Bounds, FilterRules, FilterSpec, GeoPoint, Placement,
    Profile, Record, Route, RouteSelector,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Which records a command operates on.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub spec: FilterSpec,
    /// Drop records carrying an "unknown" sentinel in any field
    pub remove_unknown: bool,
}

/// Parse a `Field=v1,v2` filter argument.
pub fn parse_filter_arg(arg: &str) -> Result<(String, Vec<String>)> {
    let Some((field, values)) = arg.split_once('=') else {
        bail!("filter `{}` must look like Field=value1,value2", arg);
    };
    let field = field.trim();
    if field.is_empty() {
        bail!("filter `{}` has no field name", arg);
    }
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect();
    Ok((field.to_string(), values))
}

/// Merge command line filters into an optional base spec.
pub fn build_spec(
    base: Option<FilterSpec>,
    filters: &[String],
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<FilterSpec> {
    let mut spec = base.unwrap_or_default();
    for arg in filters {
        let (field, values) = parse_filter_arg(arg)?;
        spec = spec.with_values(&field, values)?;
    }
    if let Some(text) = start_date {
        spec.set_date_bound(START_DATE_FIELD, text)?;
    }
    if let Some(text) = end_date {
        spec.set_date_bound(END_DATE_FIELD, text)?;
    }
    Ok(spec)
}

/// Warn about filter values that never occur in the data.
pub fn check_choices(records: &[Record], spec: &FilterSpec, rules: &FilterRules) -> usize {
    let mut unknown = 0;
    for (field, values) in spec.value_constraints() {
        let suggestions = suggestions_for(records, field, rules, false);
        for value in values {
            if let Err(err) = validate_choice(field, value, &suggestions) {
                tracing::warn!(error = %err, "filter value matches no record");
                unknown += 1;
            }
        }
    }
    unknown
}

/// Records accepted by the selection, in input order.
pub fn select<'a>(records: &'a [Record], selection: &Selection, rules: &FilterRules) -> Vec<&'a Record> {
    check_choices(records, &selection.spec, rules);
    let mut selected = apply(records, &selection.spec);
    if selection.remove_unknown {
        selected = drop_unknown(selected, rules);
    }
    if selected.is_empty() {
        tracing::info!("No data found");
    } else {
        tracing::info!(total = records.len(), selected = selected.len(), "records selected");
    }
    selected
}

#[derive(Debug, Serialize)]
pub struct FilterOutput<'a> {
    pub total: usize,
    pub matched: usize,
    pub records: Vec<&'a Record>,
}

pub fn run_filter<'a>(records: &'a [Record], selection: &Selection, config: &Config) -> FilterOutput<'a> {
    let selected = select(records, selection, &config.filter);
    FilterOutput {
        total: records.len(),
        matched: selected.len(),
        records: selected,
    }
}

#[derive(Debug, Serialize)]
pub struct PlaceOutput<'a> {
    #[serde(flatten)]
    pub placement: Placement<'a>,
    pub bounds: Option<Bounds>,
    pub spokes: Vec<[GeoPoint; 2]>,
}

pub fn run_place<'a>(records: &'a [Record], selection: &Selection, config: &Config) -> PlaceOutput<'a> {
    let selected = select(records, selection, &config.filter);
    let placement = place(selected, &config.placement);
    if !placement.unplaced.is_empty() {
        tracing::info!(unplaced = placement.unplaced.len(), "records without a usable grid reference");
    }
    PlaceOutput {
        bounds: placement.bounds(),
        spokes: placement.spokes(),
        placement,
    }
}

#[derive(Debug, Serialize)]
pub struct RouteOutput<'a> {
    #[serde(flatten)]
    pub route: Route<'a>,
    pub path: Vec<GeoPoint>,
    pub total_distance_m: f64,
}

/// Route through the selection, optionally narrowed to one field value.
pub fn run_route<'a>(
    records: &'a [Record],
    selection: &Selection,
    selector: Option<&RouteSelector>,
    config: &Config,
) -> RouteOutput<'a> {
    let selected = select(records, selection, &config.filter);
    let route = build_route(selected, |record| selector.map_or(true, |s| s.matches(record)));
    tracing::info!(
        stops = route.len(),
        skipped = route.skipped.len(),
        "route built"
    );
    RouteOutput {
        path: route.path(),
        total_distance_m: route.total_distance_m(),
        route,
    }
}

pub fn run_suggest(records: &[Record], field: &str, exclude_unknown: bool, config: &Config) -> Vec<String> {
    suggestions_for(records, field, &config.filter, exclude_unknown)
}

#[derive(Debug, Serialize)]
pub struct ExportOutput {
    /// None when the selection was empty and nothing was written
    pub path: Option<PathBuf>,
    pub placemarks: usize,
}

/// Write the placed selection as a KML document into `out_dir`.
pub fn run_export(
    records: &[Record],
    selection: &Selection,
    legend: &str,
    out_dir: &Path,
    config: &Config,
) -> Result<ExportOutput> {
    let selected = select(records, selection, &config.filter);
    let placement = place(selected, &config.placement);
    let points = placement.export_points(legend);
    if points.is_empty() {
        return Ok(ExportOutput {
            path: None,
            placemarks: 0,
        });
    }

    let path = out_dir.join(export_file_name(&selection.spec, legend));
    fs::write(&path, render_kml(&points))
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), placemarks = points.len(), "KML exported");

    Ok(ExportOutput {
        path: Some(path),
        placemarks: points.len(),
    })
}

/// The profile with id `uid`.
pub fn run_profile<'a>(profiles: &'a [Profile], uid: &str) -> Result<&'a Profile> {
    match find_profile(profiles, uid) {
        Some(profile) => Ok(profile),
        None => bail!("Profile not found: {}", uid),
    }
}
