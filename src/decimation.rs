//! Greedy single-pass decimation of GPS tracks.
//!
//! Walks the interior of a track once, comparing each fix against the last
//! fix that was kept. A fix survives when it marks a stop, a speed change, a
//! turn, or enough distance travelled. Straight, moving stretches use a
//! coarser distance threshold than turns, so highways collapse to a handful
//! of vertices while junctions keep their shape.
//!
//! The pass is O(n) and intentionally not globally optimal: it has to stay
//! cheap enough to rerun whenever the user adjusts a filter.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, Result, TrajectoryError};
use crate::geo_utils::{distance_km, is_chronological, turn_angle_degrees};
use crate::GpsPoint;

/// Distance threshold applied while moving in a straight line (km).
pub const LINEAR_MIN_DISTANCE_KM: f64 = 0.1;

/// Speed above which a fix counts as moving (km/h).
pub const MOVING_SPEED_KMH: f64 = 5.0;

/// Configuration for [`decimate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationConfig {
    /// Minimum distance from the last kept fix before a new one is kept (km).
    /// Default: 0.05 (50 m)
    pub min_distance_km: f64,

    /// Turns sharper than this are always kept (degrees).
    /// Default: 30.0
    pub max_turn_angle_deg: f64,

    /// Keep fixes that carry a stop duration.
    /// Default: true
    pub keep_stops: bool,

    /// Keep fixes whose speed differs sharply from the last kept fix.
    /// Default: true
    pub keep_speed_changes: bool,

    /// Speed difference that counts as a change (km/h).
    /// Default: 10.0
    pub speed_change_threshold_kmh: f64,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self {
            min_distance_km: 0.05,
            max_turn_angle_deg: 30.0,
            keep_stops: true,
            keep_speed_changes: true,
            speed_change_threshold_kmh: 10.0,
        }
    }
}

impl DecimationConfig {
    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("min_distance_km", self.min_distance_km)?;
        ensure_non_negative("speed_change_threshold_kmh", self.speed_change_threshold_kmh)?;
        ensure_non_negative("max_turn_angle_deg", self.max_turn_angle_deg)?;
        if self.max_turn_angle_deg > 180.0 {
            return Err(TrajectoryError::InvalidConfig {
                field: "max_turn_angle_deg",
                message: format!("must be at most 180, got {}", self.max_turn_angle_deg),
            });
        }
        Ok(())
    }
}

/// Reduce a time-ordered track to its significant fixes.
///
/// The first and last fixes are always kept. Tracks of two fixes or fewer
/// are returned unchanged.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use trajectory_engine::{decimate, DecimationConfig, GpsPoint};
///
/// let t0 = Utc::now();
/// let track: Vec<GpsPoint> = (0..5)
///     .map(|i| GpsPoint::new(40.0 + i as f64 * 0.0001, -3.0, t0 + Duration::seconds(i)).with_speed(40.0))
///     .collect();
///
/// let reduced = decimate(&track, &DecimationConfig::default());
/// assert_eq!(reduced.len(), 2);
/// ```
pub fn decimate(points: &[GpsPoint], config: &DecimationConfig) -> Vec<GpsPoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let ordered = is_chronological(points);
    debug_assert!(ordered, "decimate() requires time-ordered input");
    if !ordered {
        warn!("[Decimator] Input is not time-ordered, output may be inaccurate");
    }

    let last_index = points.len() - 1;
    let mut result = Vec::with_capacity(points.len() / 4 + 2);
    result.push(points[0]);
    let mut last_kept = &points[0];

    for i in 1..last_index {
        let current = &points[i];

        let distance_to_last = distance_km(last_kept, current);
        let angle = turn_angle_degrees(&points[i - 1], current, &points[i + 1]);

        let is_moving = current.speed_or_zero() > MOVING_SPEED_KMH;
        let linear_movement = is_moving && angle < config.max_turn_angle_deg;
        let effective_min_distance = if linear_movement {
            LINEAR_MIN_DISTANCE_KM
        } else {
            config.min_distance_km
        };

        let keep_as_stop = config.keep_stops && current.is_stop();
        let keep_as_speed_change = config.keep_speed_changes
            && (current.speed_or_zero() - last_kept.speed_or_zero()).abs()
                > config.speed_change_threshold_kmh;
        let keep_as_distance = distance_to_last > effective_min_distance;
        let keep_as_turn = angle > config.max_turn_angle_deg;

        if keep_as_stop || keep_as_speed_change || keep_as_distance || keep_as_turn {
            result.push(*current);
            last_kept = current;
        }
    }

    result.push(points[last_index]);

    debug!(
        "[Decimator] {} -> {} points",
        points.len(),
        result.len()
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    /// Straight northward track with a fixed latitude step.
    fn straight_track(count: usize, lat_step: f64, speed: f64) -> Vec<GpsPoint> {
        (0..count)
            .map(|i| {
                GpsPoint::new(40.0 + i as f64 * lat_step, -3.0, t(i as i64 * 10)).with_speed(speed)
            })
            .collect()
    }

    #[test]
    fn test_short_tracks_unchanged() {
        let config = DecimationConfig::default();
        for n in 0..=2 {
            let track = straight_track(n, 0.01, 50.0);
            assert_eq!(decimate(&track, &config), track);
        }
    }

    #[test]
    fn test_close_straight_track_keeps_endpoints_only() {
        // ~11 m apart, constant speed, no stops
        let track = straight_track(5, 0.0001, 50.0);
        let reduced = decimate(&track, &DecimationConfig::default());

        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0], track[0]);
        assert_eq!(reduced[1], track[4]);
    }

    #[test]
    fn test_linear_movement_uses_coarser_threshold() {
        // ~30 m steps: beyond 50 m after two steps, beyond 100 m after four
        let moving = straight_track(7, 0.00027, 50.0);
        let kept: Vec<f64> = decimate(&moving, &DecimationConfig::default())
            .iter()
            .map(|p| p.latitude)
            .collect();
        assert_eq!(
            kept,
            vec![moving[0].latitude, moving[4].latitude, moving[6].latitude]
        );

        // Stationary speed readings never count as linear movement
        let crawling = straight_track(7, 0.00027, 0.0);
        let kept: Vec<f64> = decimate(&crawling, &DecimationConfig::default())
            .iter()
            .map(|p| p.latitude)
            .collect();
        assert_eq!(
            kept,
            vec![
                crawling[0].latitude,
                crawling[2].latitude,
                crawling[4].latitude,
                crawling[6].latitude
            ]
        );
    }

    #[test]
    fn test_stop_is_always_kept() {
        let mut track = straight_track(7, 0.0001, 80.0);
        track[3] = track[3].with_stop_duration(15.0);

        let reduced = decimate(&track, &DecimationConfig::default());
        assert!(reduced.contains(&track[3]));
        assert_eq!(reduced.len(), 3);

        let config = DecimationConfig {
            keep_stops: false,
            ..Default::default()
        };
        assert!(!decimate(&track, &config).contains(&track[3]));
    }

    #[test]
    fn test_sharp_turn_is_kept() {
        let track = vec![
            GpsPoint::new(0.0, 0.0, t(0)).with_speed(50.0),
            GpsPoint::new(0.0001, 0.0, t(1)).with_speed(50.0),
            GpsPoint::new(0.0001, 0.0001, t(2)).with_speed(50.0),
            GpsPoint::new(0.0001, 0.0002, t(3)).with_speed(50.0),
        ];
        let reduced = decimate(&track, &DecimationConfig::default());
        assert_eq!(reduced, vec![track[0], track[1], track[3]]);
    }

    #[test]
    fn test_speed_change_is_kept() {
        let mut track = straight_track(5, 0.0001, 30.0);
        track[2] = track[2].with_speed(55.0);

        let reduced = decimate(&track, &DecimationConfig::default());
        assert!(reduced.contains(&track[2]));

        let config = DecimationConfig {
            keep_speed_changes: false,
            ..Default::default()
        };
        assert!(!decimate(&track, &config).contains(&track[2]));
    }

    #[test]
    fn test_long_track_retains_endpoints() {
        let track: Vec<GpsPoint> = (0..500)
            .map(|i| {
                let angle = i as f64 * 0.05;
                GpsPoint::new(
                    40.0 + angle.sin() * 0.01,
                    -3.0 + angle.cos() * 0.01,
                    t(i as i64 * 5),
                )
                .with_speed(20.0 + (i % 7) as f64 * 3.0)
            })
            .collect();

        let reduced = decimate(&track, &DecimationConfig::default());
        assert!(reduced.len() < track.len());
        assert_eq!(reduced.first(), track.first());
        assert_eq!(reduced.last(), track.last());
    }

    #[test]
    fn test_config_validation() {
        assert!(DecimationConfig::default().validate().is_ok());

        let bad = DecimationConfig {
            min_distance_km: -0.01,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(TrajectoryError::InvalidConfig { field: "min_distance_km", .. })
        ));

        let bad_angle = DecimationConfig {
            max_turn_angle_deg: 270.0,
            ..Default::default()
        };
        assert!(bad_angle.validate().is_err());
    }

    #[test]
    fn test_config_partial_json() {
        let config: DecimationConfig =
            serde_json::from_str(r#"{"min_distance_km": 0.2, "keep_stops": false}"#).unwrap();
        assert_eq!(config.min_distance_km, 0.2);
        assert!(!config.keep_stops);
        assert_eq!(config.max_turn_angle_deg, 30.0);
    }
}
