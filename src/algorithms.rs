//! # Algorithm Toolbox
//!
//! Flat access to every algorithm in the crate, for callers who want one
//! import path instead of the module tree.
//!
//! ## Core Algorithms
//!
//! - **Decimation**: greedy significance-based point reduction
//! - **Clustering**: near-duplicate grouping with centroids
//! - **Heatmap**: dwell-weighted density cells
//! - **Playback**: smoothstep-eased interpolation
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: great-circle distance in km
//! - **Turn Angle**: planar heading change at a vertex
//! - **Bounds / Centre**: bounding box and mean position
//! - **Douglas-Peucker**: globally-optimal line simplification, for comparison
//!
//! # Example
//!
//! ```rust
//! use trajectory_engine::algorithms::haversine_distance_km;
//!
//! let madrid_to_toledo = haversine_distance_km(40.4168, -3.7038, 39.8628, -4.0273);
//! println!("Madrid to Toledo: {:.0} km", madrid_to_toledo);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Bounds, Cluster, GpsPoint, WeightedCell};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    compute_bounds, compute_center, distance_km, haversine_distance_km, is_chronological,
    minutes_between, retain_valid, sort_chronologically, turn_angle_degrees,
};

// =============================================================================
// Trajectory Algorithms
// =============================================================================

/// Greedy single-pass decimation and its configuration.
pub use crate::decimation::{decimate, DecimationConfig};

/// Near-duplicate clustering (naive and R-tree indexed).
pub use crate::clustering::{
    cluster, cluster_indexed, cluster_members, cluster_members_indexed, ClusterConfig,
};

/// Dwell-weighted heatmap accumulation.
pub use crate::heatmap::{
    accumulate_weights, accumulate_weights_with, cell_key, detect_dwell_zones, HeatmapConfig,
};

/// Playback easing and interpolation.
pub use crate::playback::{interpolate, smoothstep};

// =============================================================================
// Line Simplification
// =============================================================================

/// Douglas-Peucker line simplification.
///
/// Globally better than [`decimate`] at preserving shape for a given vertex
/// budget, but it ignores speed and stops and costs O(n log n) to O(n²), so
/// it is offered only as a reference point. Retained vertices keep their
/// timestamps and annotations.
///
/// # Arguments
/// * `points` - Input polyline
/// * `tolerance` - Maximum deviation from the original line, in degrees
///
/// # Example
/// ```rust
/// use chrono::Utc;
/// use trajectory_engine::algorithms::{douglas_peucker, GpsPoint};
///
/// let now = Utc::now();
/// let track = vec![
///     GpsPoint::new(40.4168, -3.7038, now),
///     GpsPoint::new(40.4169, -3.7039, now),
///     GpsPoint::new(40.4180, -3.7050, now),
/// ];
/// let simplified = douglas_peucker(&track, 0.0001);
/// assert_eq!(simplified.len(), 2);
/// ```
pub fn douglas_peucker(points: &[GpsPoint], tolerance: f64) -> Vec<GpsPoint> {
    use geo::{Coord, LineString, SimplifyIdx};

    if points.len() <= 2 {
        return points.to_vec();
    }

    let coords: Vec<Coord<f64>> = points
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    LineString::new(coords)
        .simplify_idx(&tolerance)
        .into_iter()
        .map(|i| points[i])
        .collect()
}

// =============================================================================
// Spatial Indexing
// =============================================================================

/// R-tree spatial index for custom geographic queries.
pub use rstar::RTree;

/// Axis-aligned bounding box for spatial queries.
pub use rstar::AABB;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_douglas_peucker_keeps_corner_and_annotations() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let track: Vec<GpsPoint> = vec![
            GpsPoint::new(40.000, -3.000, t0),
            GpsPoint::new(40.001, -3.000, t0 + Duration::seconds(10)),
            GpsPoint::new(40.002, -3.000, t0 + Duration::seconds(20)).with_speed(12.0),
            GpsPoint::new(40.002, -2.999, t0 + Duration::seconds(30)),
            GpsPoint::new(40.002, -2.998, t0 + Duration::seconds(40)),
        ];

        let simplified = douglas_peucker(&track, 0.0001);
        assert_eq!(simplified, vec![track[0], track[2], track[4]]);
        assert_eq!(simplified[1].speed, Some(12.0));
    }

    #[test]
    fn test_douglas_peucker_short_input() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let one = vec![GpsPoint::new(40.0, -3.0, t0)];
        assert_eq!(douglas_peucker(&one, 0.001), one);
        assert!(douglas_peucker(&[], 0.001).is_empty());
    }
}
