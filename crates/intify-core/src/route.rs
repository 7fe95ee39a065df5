//! Chronological routes through a record subset.
//!
//! Selected records are ordered by date (undated last, stable among ties)
//! and walked once. Records whose grid reference does not resolve are
//! skipped without breaking the chain: the day gap of the next stop is
//! measured from the nearest earlier stop that did resolve.

use crate::coordinates;
use crate::models::{GeoPoint, Record};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How a stop should be styled by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopRole {
    /// Earliest stop
    Start,
    Waypoint,
    /// Latest stop
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStop<'a> {
    /// Index of the record in the input slice
    pub index: usize,
    pub record: &'a Record,
    pub position: GeoPoint,
    pub date: Option<NaiveDate>,
    /// Whole days since the previous stop; None for the first stop or when
    /// either date is unknown
    pub day_gap: Option<u64>,
    /// Great-circle distance from the previous stop
    pub distance_from_previous_m: Option<f64>,
    pub role: StopRole,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Route<'a> {
    pub stops: Vec<RouteStop<'a>>,
    /// Selected records left out because their grid reference did not resolve
    pub skipped: Vec<usize>,
}

impl<'a> Route<'a> {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Polyline through every stop, in order.
    pub fn path(&self) -> Vec<GeoPoint> {
        self.stops.iter().map(|s| s.position).collect()
    }

    pub fn start(&self) -> Option<&RouteStop<'a>> {
        self.stops.first()
    }

    pub fn end(&self) -> Option<&RouteStop<'a>> {
        self.stops.last()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.stops
            .iter()
            .filter_map(|s| s.distance_from_previous_m)
            .sum()
    }
}

/// Select records whose field text equals a value exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSelector {
    pub field: String,
    pub value: String,
}

impl RouteSelector {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.field_text(&self.field).as_deref() == Some(self.value.as_str())
    }
}

/// Undated records sort after dated ones.
fn compare_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Whole days between two dates.
pub fn day_gap(earlier: NaiveDate, later: NaiveDate) -> u64 {
    (later - earlier).num_days().unsigned_abs()
}

/// Build the route through every record accepted by `selector`.
///
/// Stop indices refer to positions in `records`.
pub fn build_route<'a, I, F>(records: I, selector: F) -> Route<'a>
where
    I: IntoIterator<Item = &'a Record>,
    F: Fn(&Record) -> bool,
{
    let mut selected: Vec<(usize, &'a Record)> = records
        .into_iter()
        .enumerate()
        .filter(|&(_, record)| selector(record))
        .collect();
    selected.sort_by(|(_, a), (_, b)| compare_dates(a.date, b.date));

    let mut stops: Vec<RouteStop<'a>> = Vec::with_capacity(selected.len());
    let mut skipped = Vec::new();

    for (index, record) in selected {
        let position = match coordinates::resolve(&record.grid_reference) {
            Ok(position) => position,
            Err(err) => {
                tracing::debug!(index, error = %err, "route skips record with unresolved grid reference");
                skipped.push(index);
                continue;
            }
        };

        let previous = stops.last();
        let gap = previous.and_then(|prev| match (prev.date, record.date) {
            (Some(earlier), Some(later)) => Some(day_gap(earlier, later)),
            _ => None,
        });
        let distance_from_previous_m = previous.map(|prev| prev.position.distance_m(&position));

        stops.push(RouteStop {
            index,
            record,
            position,
            date: record.date,
            day_gap: gap,
            distance_from_previous_m,
            role: StopRole::Waypoint,
        });
    }

    let last = stops.len().saturating_sub(1);
    for (i, stop) in stops.iter_mut().enumerate() {
        stop.role = if i == 0 {
            StopRole::Start
        } else if i == last {
            StopRole::End
        } else {
            StopRole::Waypoint
        };
    }

    Route { stops, skipped }
}

/// Lifecycle phase of an interactively generated route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePhase {
    Empty,
    Built,
}

/// Holds at most one built route.
///
/// `Empty -> Built -> Empty`. Building always discards the previous route
/// first, so repeated builds never accumulate stops.
#[derive(Debug, Clone, Default)]
pub struct RouteState<'a> {
    route: Option<Route<'a>>,
}

impl<'a> RouteState<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RoutePhase {
        if self.route.is_some() {
            RoutePhase::Built
        } else {
            RoutePhase::Empty
        }
    }

    pub fn route(&self) -> Option<&Route<'a>> {
        self.route.as_ref()
    }

    pub fn build<I, F>(&mut self, records: I, selector: F) -> &Route<'a>
    where
        I: IntoIterator<Item = &'a Record>,
        F: Fn(&Record) -> bool,
    {
        self.clear();
        self.route.insert(build_route(records, selector))
    }

    pub fn clear(&mut self) {
        self.route = None;
    }

    /// Build when empty, clear when built. Returns the route if one is now shown.
    pub fn toggle<I, F>(&mut self, records: I, selector: F) -> Option<&Route<'a>>
    where
        I: IntoIterator<Item = &'a Record>,
        F: Fn(&Record) -> bool,
    {
        match self.phase() {
            RoutePhase::Built => {
                self.clear();
                None
            }
            RoutePhase::Empty => Some(self.build(records, selector)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(date: &str, gr: &str, name: &str) -> Record {
        Record::new(gr)
            .with_date_text(date)
            .with_attribute("Name_", name)
    }

    fn records() -> Vec<Record> {
        vec![
            sighting("03/01/2020", "19.3 80.3", "smd"),
            sighting("01/01/2020", "19.1 80.1", "smd"),
            sighting("02/01/2020", "19.9 80.9", "other"),
            sighting("", "19.4 80.4", "smd"),
            sighting("10/01/2020", "nowhere", "smd"),
            sighting("12/01/2020", "19.5 80.5", "smd"),
        ]
    }

    #[test]
    fn test_orders_by_date_with_undated_last() {
        let records = records();
        let selector = RouteSelector::new("Name_", "smd");
        let route = build_route(&records, |r| selector.matches(r));

        let order: Vec<usize> = route.stops.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![1, 0, 5, 3]);
        assert_eq!(route.skipped, vec![4]);

        let dates: Vec<NaiveDate> = route.stops.iter().filter_map(|s| s.date).collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_gaps_are_measured_between_resolved_neighbours() {
        let records = records();
        let selector = RouteSelector::new("Name_", "smd");
        let route = build_route(&records, |r| selector.matches(r));

        let gaps: Vec<Option<u64>> = route.stops.iter().map(|s| s.day_gap).collect();
        // 01/01 -> 03/01, then 03/01 -> 12/01 across the unresolved 10/01
        // record, then an undated stop
        assert_eq!(gaps, vec![None, Some(2), Some(9), None]);
    }

    #[test]
    fn test_endpoints_are_tagged() {
        let records = records();
        let route = build_route(&records, |r| r.field_text("Name_").as_deref() == Some("smd"));
        let roles: Vec<StopRole> = route.stops.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![StopRole::Start, StopRole::Waypoint, StopRole::Waypoint, StopRole::End]
        );

        let single = build_route(&records, |r| r.field_text("Name_").as_deref() == Some("other"));
        assert_eq!(single.len(), 1);
        assert_eq!(single.stops[0].role, StopRole::Start);
        assert_eq!(single.stops[0].day_gap, None);
    }

    #[test]
    fn test_empty_selection_is_an_empty_route() {
        let records = records();
        let route = build_route(&records, |_| false);
        assert!(route.is_empty());
        assert!(route.path().is_empty());
        assert_eq!(route.total_distance_m(), 0.0);
    }

    #[test]
    fn test_equal_dates_keep_input_order() {
        let records = vec![
            sighting("05/01/2020", "19.1 80.1", "x"),
            sighting("05/01/2020", "19.2 80.2", "x"),
        ];
        let route = build_route(&records, |_| true);
        let order: Vec<usize> = route.stops.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![0, 1]);
        assert_eq!(route.stops[1].day_gap, Some(0));
    }

    #[test]
    fn test_distances_accumulate_along_the_path() {
        let records = vec![
            sighting("01/01/2020", "0.0 0.0", "x"),
            sighting("02/01/2020", "1.0 0.0", "x"),
        ];
        let route = build_route(&records, |_| true);
        assert!((route.total_distance_m() - 111_194.0).abs() < 100.0);
        assert_eq!(route.path(), vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)]);
    }

    #[test]
    fn test_state_rebuild_is_idempotent() {
        let records = records();
        let selector = RouteSelector::new("Name_", "smd");
        let mut state = RouteState::new();
        assert_eq!(state.phase(), RoutePhase::Empty);

        let first = state.build(&records, |r| selector.matches(r)).clone();
        let second = state.build(&records, |r| selector.matches(r)).clone();
        assert_eq!(first, second);
        assert_eq!(state.route().map(Route::len), Some(4));
        assert_eq!(state.phase(), RoutePhase::Built);
    }

    #[test]
    fn test_toggle_alternates_between_phases() {
        let records = records();
        let mut state = RouteState::new();

        assert!(state.toggle(&records, |_| true).is_some());
        assert_eq!(state.phase(), RoutePhase::Built);
        assert!(state.toggle(&records, |_| true).is_none());
        assert_eq!(state.phase(), RoutePhase::Empty);
        assert!(state.route().is_none());
    }
}
