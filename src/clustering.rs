//! Near-duplicate clustering of GPS fixes.
//!
//! Greedy seed-based grouping: walk the fixes in order, and each fix not yet
//! assigned seeds a new cluster that absorbs every unassigned fix within
//! `max_distance_km` of the seed. Every fix lands in exactly one cluster.
//!
//! The partition is order-dependent (it is not DBSCAN or union-find): two
//! fixes within range of each other may still end up apart if an earlier
//! seed absorbed one of them. This looseness is accepted; the clusters are
//! meant for suppressing stacked markers, not for analysis.
//!
//! [`cluster`] is the plain O(n²) scan and is fine for decimated tracks.
//! [`cluster_indexed`] produces the identical partition using an R-tree to
//! find candidates and should be used on larger inputs.

use log::debug;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, Result};
use crate::geo_utils::{compute_center, distance_km, km_to_lat_degrees, km_to_lon_degrees};
use crate::{Cluster, GpsPoint};

/// Default clustering radius (~11 m).
pub const DEFAULT_CLUSTER_DISTANCE_KM: f64 = 0.011;

/// Configuration for clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum distance from a cluster's seed to any member (km).
    /// Default: 0.011 (~11 m)
    pub max_distance_km: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_distance_km: DEFAULT_CLUSTER_DISTANCE_KM,
        }
    }
}

impl ClusterConfig {
    /// Check that the radius is usable.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("max_distance_km", self.max_distance_km)
    }
}

/// Partition fixes into clusters, returning member indices.
///
/// Each inner vector starts with its seed, followed by the absorbed members
/// in ascending index order.
pub fn cluster_members(points: &[GpsPoint], max_distance_km: f64) -> Vec<Vec<usize>> {
    let mut processed = vec![false; points.len()];
    let mut groups = Vec::new();

    for seed in 0..points.len() {
        if processed[seed] {
            continue;
        }
        processed[seed] = true;
        let mut members = vec![seed];

        // Every index before `seed` has already been assigned
        for j in (seed + 1)..points.len() {
            if !processed[j] && distance_km(&points[seed], &points[j]) <= max_distance_km {
                processed[j] = true;
                members.push(j);
            }
        }

        groups.push(members);
    }

    groups
}

/// Cluster fixes and reduce each cluster to its centroid.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use trajectory_engine::{cluster, GpsPoint};
///
/// let now = Utc::now();
/// let points = vec![
///     GpsPoint::new(40.41680, -3.70380, now),
///     GpsPoint::new(40.41682, -3.70381, now),
///     GpsPoint::new(40.42000, -3.70000, now),
/// ];
/// let clusters = cluster(&points, 0.011);
/// assert_eq!(clusters.len(), 2);
/// assert_eq!(clusters[0].member_count, 2);
/// ```
pub fn cluster(points: &[GpsPoint], max_distance_km: f64) -> Vec<Cluster> {
    let groups = cluster_members(points, max_distance_km);
    let clusters = to_clusters(points, &groups);
    debug!(
        "[Clusterer] {} points -> {} clusters",
        points.len(),
        clusters.len()
    );
    clusters
}

/// A fix with its index, for R-tree candidate queries.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

fn build_rtree(points: &[GpsPoint]) -> RTree<IndexedPoint> {
    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(i, p)| IndexedPoint {
            idx: i,
            lat: p.latitude,
            lng: p.longitude,
        })
        .collect();
    RTree::bulk_load(indexed)
}

/// Partition identical to [`cluster_members`], using an R-tree for candidates.
pub fn cluster_members_indexed(points: &[GpsPoint], max_distance_km: f64) -> Vec<Vec<usize>> {
    let tree = build_rtree(points);
    let mut processed = vec![false; points.len()];
    let mut groups = Vec::new();

    // Pad the search box slightly so rounding never drops an in-range fix
    let search_km = max_distance_km * 1.01 + 1e-9;
    let lat_pad = km_to_lat_degrees(search_km);

    for seed in 0..points.len() {
        if processed[seed] {
            continue;
        }
        processed[seed] = true;
        let origin = &points[seed];

        // Widest longitude span occurs at the box edge farthest from the equator
        let far_lat = (origin.latitude.abs() + lat_pad).min(90.0);
        let lng_pad = km_to_lon_degrees(search_km, far_lat);

        let mut candidates: Vec<usize> =
            if origin.longitude - lng_pad < -180.0 || origin.longitude + lng_pad > 180.0 {
                // Box crosses the antimeridian; fall back to a full scan
                ((seed + 1)..points.len()).collect()
            } else {
                let envelope = AABB::from_corners(
                    [origin.latitude - lat_pad, origin.longitude - lng_pad],
                    [origin.latitude + lat_pad, origin.longitude + lng_pad],
                );
                tree.locate_in_envelope(&envelope)
                    .map(|p| p.idx)
                    .filter(|&j| j > seed)
                    .collect()
            };
        candidates.sort_unstable();

        let mut members = vec![seed];
        for j in candidates {
            if !processed[j] && distance_km(origin, &points[j]) <= max_distance_km {
                processed[j] = true;
                members.push(j);
            }
        }
        groups.push(members);
    }

    groups
}

/// Cluster fixes using an R-tree; same output as [`cluster`].
pub fn cluster_indexed(points: &[GpsPoint], max_distance_km: f64) -> Vec<Cluster> {
    let groups = cluster_members_indexed(points, max_distance_km);
    let clusters = to_clusters(points, &groups);
    debug!(
        "[Clusterer] {} points -> {} clusters (indexed)",
        points.len(),
        clusters.len()
    );
    clusters
}

/// Build a centroid for each member group.
fn to_clusters(points: &[GpsPoint], groups: &[Vec<usize>]) -> Vec<Cluster> {
    groups
        .iter()
        .filter_map(|members| {
            let seed = points.get(*members.first()?)?;
            let member_points: Vec<GpsPoint> = members.iter().map(|&i| points[i]).collect();
            let (latitude, longitude) = compute_center(&member_points)?;
            Some(Cluster {
                centroid: GpsPoint {
                    latitude,
                    longitude,
                    ..*seed
                },
                member_count: members.len(),
            })
        })
        .collect()
}
