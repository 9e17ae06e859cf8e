//! # Trajectory Engine
//!
//! GPS trajectory processing for interactive investigation maps.
//!
//! This library turns a raw, time-ordered sequence of GPS fixes for one
//! vehicle into the structures a map view needs:
//! - A decimated point set that keeps the route shape with far fewer vertices
//! - Spatial clusters of near-duplicate fixes, annotated with member counts
//! - A weighted density surface where dwell zones outweigh transit
//! - Eased positions for animated route playback
//!
//! All algorithms are pure functions over `&[GpsPoint]`. Inputs must already
//! be filtered for invalid coordinates and sorted by timestamp; the engine
//! never re-sorts or validates on its own.
//!
//! ## Features
//!
//! - **`parallel`** - Render many layers in parallel with rayon
//! - **`async`** - Offload decimation/clustering onto tokio's blocking pool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use trajectory_engine::{cluster, decimate, DecimationConfig, GpsPoint};
//!
//! let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
//! let track: Vec<GpsPoint> = (0..100)
//!     .map(|i| {
//!         GpsPoint::new(40.4168 + i as f64 * 0.0002, -3.7038, start + Duration::seconds(i * 5))
//!             .with_speed(50.0)
//!     })
//!     .collect();
//!
//! let reduced = decimate(&track, &DecimationConfig::default());
//! assert!(reduced.len() < track.len());
//!
//! let markers = cluster(&reduced, 0.011);
//! let total: usize = markers.iter().map(|c| c.member_count).sum();
//! assert_eq!(total, reduced.len());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrajectoryError};

// Geographic utilities (distance, turn angle, ordering, bounds)
pub mod geo_utils;
pub use geo_utils::{haversine_distance_km, turn_angle_degrees};

// Greedy single-pass trajectory decimation
pub mod decimation;
pub use decimation::{decimate, DecimationConfig};

// Near-duplicate clustering
pub mod clustering;
pub use clustering::{cluster, cluster_indexed, cluster_members, ClusterConfig};

// Dwell-weighted heatmap accumulation
pub mod heatmap;
pub use heatmap::{accumulate_weights, to_heat_triples, to_heat_triples_json, HeatmapConfig};

// Route playback interpolation
pub mod playback;
pub use playback::{
    interpolate, position_changed, smoothstep, PlaybackConfig, PlaybackState, PlaybackStatus,
};

// Named point layers and the per-layer render pipeline
pub mod layers;
#[cfg(feature = "parallel")]
pub use layers::render_active_layers_parallel;
pub use layers::{render_active_layers, render_layer, GpsLayer, LayerView};

// Background execution and caller-side request invalidation
pub mod worker;
#[cfg(feature = "async")]
pub use worker::{cluster_async, decimate_async};
pub use worker::{
    run_pipeline, spawn_clustering, spawn_decimation, spawn_render_pipeline, JobHandle,
    RenderOutput, RequestId, RequestTracker,
};

// Algorithm toolbox - flat access to every algorithm
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// A single GPS fix for a vehicle.
///
/// Speed is in km/h. `stop_duration_minutes` is set by the data source on
/// fixes that begin a detected stop.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use trajectory_engine::GpsPoint;
///
/// let fix = GpsPoint::new(40.4168, -3.7038, Utc::now())
///     .with_speed(42.0)
///     .with_stop_duration(12.5);
/// assert!(fix.is_stop());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_duration_minutes: Option<f64>,
}

impl GpsPoint {
    /// Create a fix with no speed or stop annotation.
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            speed: None,
            stop_duration_minutes: None,
        }
    }

    /// Set the speed in km/h.
    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed = Some(speed_kmh);
        self
    }

    /// Mark this fix as the start of a stop lasting `minutes`.
    pub fn with_stop_duration(mut self, minutes: f64) -> Self {
        self.stop_duration_minutes = Some(minutes);
        self
    }

    /// Speed in km/h, treating a missing reading as stationary.
    #[inline]
    pub fn speed_or_zero(&self) -> f64 {
        self.speed.unwrap_or(0.0)
    }

    /// Whether this fix carries a positive stop duration.
    #[inline]
    pub fn is_stop(&self) -> bool {
        self.stop_duration_minutes.map_or(false, |m| m > 0.0)
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// `(latitude, longitude)` pair.
    #[inline]
    pub fn coords(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Bounding box for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center of the bounds as `(latitude, longitude)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// A group of near-duplicate fixes reduced to one marker.
///
/// The centroid takes the mean coordinates of all members; its timestamp,
/// speed and stop annotation come from the first member (the seed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub centroid: GpsPoint,
    pub member_count: usize,
}

impl Cluster {
    /// True when the cluster stands for a single fix (no count badge).
    pub fn is_singleton(&self) -> bool {
        self.member_count <= 1
    }
}

/// One cell of the heatmap surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedCell {
    pub latitude: f64,
    pub longitude: f64,
    pub weight: f64,
}

// ============================================================================
// Tests
// ============================================================================
