//! Dwell-weighted heatmap accumulation.
//!
//! A plain density map of GPS pings mostly shows where the sampling rate was
//! high. Investigators care about where a vehicle *stayed*, so each fix is
//! weighted before accumulation:
//!
//! 1. **Dwell detection**: consecutive fixes that are more than a minute apart
//!    but still within ~11 m of each other mark a dwell. The gap (minutes) is
//!    credited to the first fix's grid cell.
//! 2. **Weighting**: every fix contributes a faint base weight. Fixes in a
//!    dwell cell add `ln(dwell + 1) * 0.7`, and fixes with an explicit stop
//!    annotation add `ln(stop + 1) * 0.7` on top.
//!
//! Cells are keyed by coordinates rounded to 5 decimal places (~1.1 m at the
//! equator). The constants are tuned for visual effect and kept as-is.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, Result};
use crate::geo_utils::{distance_km, is_chronological, minutes_between};
use crate::{GpsPoint, WeightedCell};

/// Weight every fix contributes, so pure transit leaves a faint trace.
pub const BASE_WEIGHT: f64 = 0.02;

/// Scale applied to `ln(minutes + 1)` for dwell and stop contributions.
pub const LOG_WEIGHT_FACTOR: f64 = 0.7;

/// Minimum gap between consecutive fixes for a dwell (minutes).
pub const DWELL_MIN_GAP_MINUTES: f64 = 1.0;

/// Maximum movement between consecutive fixes for a dwell (km).
pub const DWELL_PROXIMITY_KM: f64 = 0.011;

/// Grid resolution: coordinates are rounded to this many decimal places.
pub const CELL_PRECISION: i32 = 5;

const CELL_SCALE: f64 = 100_000.0;

/// Integer grid key for a coordinate pair.
pub type CellKey = (i64, i64);

/// Configuration for heatmap rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Visual intensity scalar applied to every cell.
    /// Default: 1.65
    pub multiplier: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self { multiplier: 1.65 }
    }
}

impl HeatmapConfig {
    /// Check that the multiplier is usable.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("multiplier", self.multiplier)
    }
}

/// Grid cell containing a coordinate.
#[inline]
pub fn cell_key(latitude: f64, longitude: f64) -> CellKey {
    (
        (latitude * CELL_SCALE).round() as i64,
        (longitude * CELL_SCALE).round() as i64,
    )
}

/// Centre coordinate of a grid cell.
#[inline]
pub fn cell_coords(key: CellKey) -> (f64, f64) {
    (key.0 as f64 / CELL_SCALE, key.1 as f64 / CELL_SCALE)
}

/// Total dwell minutes per cell, from consecutive close fixes with a long gap.
pub fn detect_dwell_zones(points: &[GpsPoint]) -> HashMap<CellKey, f64> {
    let mut dwell: HashMap<CellKey, f64> = HashMap::new();

    for pair in points.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        let gap = minutes_between(&current.timestamp, &next.timestamp);
        if gap > DWELL_MIN_GAP_MINUTES && distance_km(current, next) < DWELL_PROXIMITY_KM {
            *dwell
                .entry(cell_key(current.latitude, current.longitude))
                .or_insert(0.0) += gap;
        }
    }

    dwell
}

/// Accumulate dwell-weighted heat per grid cell.
///
/// Cells are returned in ascending (latitude, longitude) order. Every weight
/// is the summed per-fix contribution times `multiplier`; a negative
/// multiplier is treated as zero.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use trajectory_engine::{accumulate_weights, GpsPoint};
///
/// let t0 = Utc::now();
/// let parked = vec![
///     GpsPoint::new(40.4168, -3.7038, t0),
///     GpsPoint::new(40.4168, -3.7038, t0 + Duration::minutes(30)),
///     GpsPoint::new(40.4300, -3.7000, t0 + Duration::minutes(35)),
/// ];
/// let cells = accumulate_weights(&parked, 1.0);
/// assert_eq!(cells.len(), 2);
/// assert!(cells.iter().any(|c| c.weight > 1.0)); // the parking spot dominates
/// ```
pub fn accumulate_weights(points: &[GpsPoint], multiplier: f64) -> Vec<WeightedCell> {
    if points.is_empty() {
        return Vec::new();
    }

    let ordered = is_chronological(points);
    debug_assert!(ordered, "accumulate_weights() requires time-ordered input");
    if !ordered {
        warn!("[Heatmap] Input is not time-ordered, dwell zones may be inaccurate");
    }

    let multiplier = if multiplier < 0.0 {
        warn!("[Heatmap] Negative multiplier {} clamped to 0", multiplier);
        0.0
    } else {
        multiplier
    };

    let dwell = detect_dwell_zones(points);

    let mut cells: BTreeMap<CellKey, f64> = BTreeMap::new();
    for point in points {
        let key = cell_key(point.latitude, point.longitude);
        let mut weight = BASE_WEIGHT;

        if let Some(&minutes) = dwell.get(&key) {
            weight += (minutes + 1.0).ln() * LOG_WEIGHT_FACTOR;
        }
        if let Some(stop) = point.stop_duration_minutes.filter(|&m| m > 0.0) {
            weight += (stop + 1.0).ln() * LOG_WEIGHT_FACTOR;
        }

        *cells.entry(key).or_insert(0.0) += weight;
    }

    debug!(
        "[Heatmap] {} points -> {} cells ({} dwell cells)",
        points.len(),
        cells.len(),
        dwell.len()
    );

    cells
        .into_iter()
        .map(|(key, weight)| {
            let (latitude, longitude) = cell_coords(key);
            WeightedCell {
                latitude,
                longitude,
                weight: weight * multiplier,
            }
        })
        .collect()
}

/// [`accumulate_weights`] using a [`HeatmapConfig`].
pub fn accumulate_weights_with(points: &[GpsPoint], config: &HeatmapConfig) -> Vec<WeightedCell> {
    accumulate_weights(points, config.multiplier)
}

/// `[lat, lon, weight]` triples for a generic heat-layer renderer.
pub fn to_heat_triples(cells: &[WeightedCell]) -> Vec<[f64; 3]> {
    cells
        .iter()
        .map(|c| [c.latitude, c.longitude, c.weight])
        .collect()
}

/// Heat triples as a JSON array, or `"[]"` if serialization fails.
pub fn to_heat_triples_json(cells: &[WeightedCell]) -> String {
    serde_json::to_string(&to_heat_triples(cells)).unwrap_or_else(|_| "[]".to_string())
}
