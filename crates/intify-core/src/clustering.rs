//! Co-located record clustering and marker placement.
//!
//! Records resolving to the same coordinate (after quantization) form a
//! cluster. Each member is drawn on a ring around the cluster center:
//! member `i` of `N` sits at angle `2π·i/N` and radius
//! `base_radius * ceil(N / radius_step)`. The center itself is surfaced as
//! a hub anchor.

use crate::coordinates;
use crate::error::CoordinateError;
use crate::export::ExportPoint;
use crate::models::{legend_color, GeoPoint, Record};
use crate::rules::PlacementRules;
use serde::Serialize;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Quantized coordinate used to group records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClusterKey {
    lon_units: i64,
    lat_units: i64,
}

impl ClusterKey {
    pub fn from_point(point: &GeoPoint, rules: &PlacementRules) -> Self {
        let scale = rules.key_scale();
        Self {
            lon_units: (point.lon * scale).round() as i64,
            lat_units: (point.lat * scale).round() as i64,
        }
    }

    /// The quantized coordinate this key stands for.
    pub fn center(&self, rules: &PlacementRules) -> GeoPoint {
        let scale = rules.key_scale();
        GeoPoint::new(self.lon_units as f64 / scale, self.lat_units as f64 / scale)
    }
}

/// Records sharing one quantized coordinate, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub key: ClusterKey,
    pub center: GeoPoint,
    /// Indices into the input record slice
    pub members: Vec<usize>,
}

/// A record with its display position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedMarker<'a> {
    /// Index of the record in the input slice
    pub index: usize,
    pub record: &'a Record,
    /// Cluster center plus the angular offset
    pub position: GeoPoint,
    pub center: GeoPoint,
    pub cluster_size: usize,
    /// Position of the record within its cluster
    pub slot: usize,
    pub angle_rad: f64,
    /// `#rrggbb` derived from the record's color field; equal values share it
    pub color: String,
}

/// Hub marker drawn at a cluster center. Not selectable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAnchor {
    pub center: GeoPoint,
    pub size: usize,
    pub radius_deg: f64,
}

/// A record left off the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnplacedRecord {
    pub index: usize,
    pub reason: String,
}

/// Axis-aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    fn around(point: GeoPoint) -> Self {
        Self {
            min_lon: point.lon,
            min_lat: point.lat,
            max_lon: point.lon,
            max_lat: point.lat,
        }
    }

    fn extend(&mut self, point: GeoPoint) {
        self.min_lon = self.min_lon.min(point.lon);
        self.min_lat = self.min_lat.min(point.lat);
        self.max_lon = self.max_lon.max(point.lon);
        self.max_lat = self.max_lat.max(point.lat);
    }
}

/// Result of placing a batch of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement<'a> {
    /// One marker per placed record, in input order
    pub markers: Vec<PlacedMarker<'a>>,
    /// One anchor per cluster, in order of first appearance
    pub anchors: Vec<ClusterAnchor>,
    pub unplaced: Vec<UnplacedRecord>,
}

impl Placement<'_> {
    /// Box around all cluster centers, None when nothing was placed.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut centers = self.anchors.iter().map(|a| a.center);
        let mut bounds = Bounds::around(centers.next()?);
        for center in centers {
            bounds.extend(center);
        }
        Some(bounds)
    }

    /// Center-to-marker segments, one per marker.
    pub fn spokes(&self) -> Vec<[GeoPoint; 2]> {
        self.markers.iter().map(|m| [m.center, m.position]).collect()
    }

    /// Export points named by the record's `legend_field` text.
    pub fn export_points(&self, legend_field: &str) -> Vec<ExportPoint> {
        self.markers
            .iter()
            .map(|m| ExportPoint {
                name: m.record.field_text(legend_field).unwrap_or_default(),
                longitude: m.position.lon,
                latitude: m.position.lat,
            })
            .collect()
    }
}

/// Ring radius for a cluster of `size` records.
pub fn cluster_radius(size: usize, rules: &PlacementRules) -> f64 {
    let step = rules.radius_step.max(1);
    rules.base_radius_deg * size.div_ceil(step) as f64
}

/// Angle of member `slot` in a cluster of `size`.
pub fn slot_angle(slot: usize, size: usize) -> f64 {
    if size == 0 {
        return 0.0;
    }
    2.0 * PI * slot as f64 / size as f64
}

/// `center + (radius·cos θ, radius·sin θ)` in (lon, lat).
pub fn offset_position(center: GeoPoint, radius_deg: f64, angle_rad: f64) -> GeoPoint {
    GeoPoint::new(
        center.lon + radius_deg * angle_rad.cos(),
        center.lat + radius_deg * angle_rad.sin(),
    )
}

/// Group records by resolved coordinate.
///
/// Returns clusters in order of first appearance and the records whose grid
/// reference could not be resolved.
pub fn group_by_location<'a, I>(
    records: I,
    rules: &PlacementRules,
) -> (Vec<Cluster>, Vec<UnplacedRecord>)
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut by_key: HashMap<ClusterKey, usize> = HashMap::new();
    let mut unplaced = Vec::new();

    for (index, record) in records.into_iter().enumerate() {
        let point = match coordinates::resolve(&record.grid_reference) {
            Ok(point) => point,
            Err(err) => {
                if !matches!(err, CoordinateError::Empty) {
                    tracing::debug!(index, error = %err, "skipping record with unresolved grid reference");
                }
                unplaced.push(UnplacedRecord {
                    index,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let key = ClusterKey::from_point(&point, rules);
        let slot = *by_key.entry(key).or_insert_with(|| {
            clusters.push(Cluster {
                key,
                center: key.center(rules),
                members: Vec::new(),
            });
            clusters.len() - 1
        });
        clusters[slot].members.push(index);
    }

    (clusters, unplaced)
}

/// Place every resolvable record around its cluster center.
///
/// Marker indices refer to positions in `records`.
pub fn place<'a, I>(records: I, rules: &PlacementRules) -> Placement<'a>
where
    I: IntoIterator<Item = &'a Record>,
{
    let records: Vec<&'a Record> = records.into_iter().collect();
    let (clusters, unplaced) = group_by_location(records.iter().copied(), rules);
    let mut markers = Vec::with_capacity(records.len() - unplaced.len());
    let mut anchors = Vec::with_capacity(clusters.len());

    for cluster in &clusters {
        let size = cluster.members.len();
        let radius_deg = cluster_radius(size, rules);

        for (slot, &index) in cluster.members.iter().enumerate() {
            let angle_rad = slot_angle(slot, size);
            markers.push(PlacedMarker {
                index,
                record: records[index],
                position: offset_position(cluster.center, radius_deg, angle_rad),
                center: cluster.center,
                cluster_size: size,
                slot,
                angle_rad,
                color: legend_color(
                    &records[index]
                        .field_text(&rules.color_field)
                        .unwrap_or_default(),
                ),
            });
        }

        anchors.push(ClusterAnchor {
            center: cluster.center,
            size,
            radius_deg,
        });
    }

    markers.sort_by_key(|m| m.index);

    tracing::debug!(
        placed = markers.len(),
        clusters = anchors.len(),
        unplaced = unplaced.len(),
        "records placed"
    );

    Placement {
        markers,
        anchors,
        unplaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn at(gr: &str, name: &str) -> Record {
        Record::new(gr).with_attribute("Name_", name)
    }

    #[test]
    fn test_radius_grows_every_eight_members() {
        let rules = PlacementRules::default();
        assert!((cluster_radius(1, &rules) - 0.0001).abs() < EPS);
        assert!((cluster_radius(8, &rules) - 0.0001).abs() < EPS);
        assert!((cluster_radius(9, &rules) - 0.0002).abs() < EPS);
        assert!((cluster_radius(17, &rules) - 0.0003).abs() < EPS);
    }

    #[test]
    fn test_single_record_uses_the_same_formula() {
        let records = vec![at("19.5 80.5", "solo")];
        let placement = place(&records, &PlacementRules::default());

        assert_eq!(placement.markers.len(), 1);
        let marker = &placement.markers[0];
        assert_eq!(marker.angle_rad, 0.0);
        assert!((marker.position.lon - (80.5 + 0.0001)).abs() < EPS);
        assert!((marker.position.lat - 19.5).abs() < EPS);
        assert_eq!(placement.anchors.len(), 1);
    }

    #[test]
    fn test_cluster_members_get_distinct_angles() {
        let records: Vec<Record> = (0..5).map(|i| at("19.5 80.5", &i.to_string())).collect();
        let placement = place(&records, &PlacementRules::default());

        let angles: Vec<f64> = placement.markers.iter().map(|m| m.angle_rad).collect();
        for (i, angle) in angles.iter().enumerate() {
            assert!((angle - 2.0 * PI * i as f64 / 5.0).abs() < EPS);
        }
        for i in 0..angles.len() {
            for j in (i + 1)..angles.len() {
                assert!((angles[i] - angles[j]).abs() > EPS);
                assert_ne!(placement.markers[i].position, placement.markers[j].position);
            }
        }
    }

    #[test]
    fn test_output_follows_input_order_not_cluster_order() {
        let records = vec![
            at("19.5 80.5", "a"),
            at("20.0 81.0", "b"),
            at("19.5 80.5", "c"),
            at("garbage", "d"),
            at("", "e"),
        ];
        let placement = place(&records, &PlacementRules::default());

        let indices: Vec<usize> = placement.markers.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(placement.markers[2].slot, 1);
        assert_eq!(placement.markers[2].cluster_size, 2);
        assert_eq!(placement.anchors.len(), 2);
        assert_eq!(placement.anchors[0].size, 2);

        let unplaced: Vec<usize> = placement.unplaced.iter().map(|u| u.index).collect();
        assert_eq!(unplaced, vec![3, 4]);
    }

    #[test]
    fn test_nearly_equal_coordinates_share_a_cluster() {
        let records = vec![at("19.5000001 80.5", "a"), at("19.4999999 80.5", "b")];
        let (clusters, _) = group_by_location(&records, &PlacementRules::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![0, 1]);
    }

    #[test]
    fn test_dialects_resolving_to_one_point_cluster_together() {
        let records = vec![
            at("19°30'0\"N 80°30'0\"E", "dms"),
            at("19.5mN 80.5mE", "decimal"),
        ];
        let (clusters, unplaced) = group_by_location(&records, &PlacementRules::default());
        assert!(unplaced.is_empty());
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_markers_are_colored_by_name() {
        let records = vec![
            at("19.5 80.5", "smd"),
            at("20.0 81.0", "dkmsk"),
            at("19.5 80.5", "smd"),
            Record::new("19.6 80.6"),
        ];
        let placement = place(&records, &PlacementRules::default());
        let colors: Vec<&str> = placement.markers.iter().map(|m| m.color.as_str()).collect();

        assert_eq!(colors[0], legend_color("smd"));
        assert_eq!(colors[0], colors[2]);
        assert_ne!(colors[0], colors[1]);
        assert_eq!(colors[3], "#000000");
    }

    #[test]
    fn test_placement_is_idempotent() {
        let records = vec![
            at("19.5 80.5", "a"),
            at("19.5 80.5", "b"),
            at("19.6 80.6", "c"),
        ];
        let rules = PlacementRules::default();
        assert_eq!(place(&records, &rules), place(&records, &rules));
    }

    #[test]
    fn test_bounds_cover_cluster_centers() {
        let records = vec![at("19.5 80.5", "a"), at("20.0 81.0", "b")];
        let placement = place(&records, &PlacementRules::default());
        let bounds = placement.bounds().unwrap();
        assert!((bounds.min_lon - 80.5).abs() < EPS);
        assert!((bounds.max_lat - 20.0).abs() < EPS);

        let none: Vec<Record> = Vec::new();
        let empty = place(&none, &PlacementRules::default());
        assert!(empty.bounds().is_none());
    }

    #[test]
    fn test_export_points_use_offset_position_and_legend() {
        let records = vec![at("19.5 80.5", "a"), at("19.5 80.5", "b")];
        let placement = place(&records, &PlacementRules::default());

        let points = placement.export_points("Name_");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].name, "a");
        assert!((points[1].longitude - (80.5 - 0.0001)).abs() < EPS);

        let unnamed = placement.export_points("Rank");
        assert_eq!(unnamed[0].name, "");
        assert_eq!(placement.spokes()[1], [placement.markers[1].center, placement.markers[1].position]);
    }
}
