//! Intify core: turns intelligence records into a queryable geospatial
//! dataset.
//!
//! Grid references are resolved to coordinates, co-located records are
//! clustered and fanned out around their center, record sets are filtered
//! by attribute values and date ranges, and chronological routes are built
//! from record subsets. Records link to cadre profiles by UID. Everything
//! here is a pure function over borrowed records; rendering and transport
//! live elsewhere.

pub mod clustering;
pub mod coordinates;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod profile;
pub mod route;
pub mod rules;

pub use clustering::{place, Bounds, ClusterAnchor, Placement, PlacedMarker};
pub use coordinates::{resolve, resolve_tagged, Dialect};
pub use error::{CoordinateError, FilterError, IngestError};
pub use export::{export_file_name, render_kml, ExportPoint};
pub use filter::{apply, drop_unknown, suggestions_for, validate_choice, DateBound, FilterSpec};
pub use ingest::{records_from_json, records_from_sheet_rows, IngestReport};
pub use models::{legend_color, FieldValue, GeoPoint, Record};
pub use profile::{find_profile, profile_for, profiles_from_json, profiles_from_sheet_rows, Profile};
pub use route::{build_route, Route, RoutePhase, RouteSelector, RouteState, RouteStop, StopRole};
pub use rules::{FilterRules, IngestRules, PlacementRules, SentinelMatch};
