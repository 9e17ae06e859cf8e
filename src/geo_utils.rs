//! Geographic utilities shared by every stage of the engine.
//!
//! Distances are great-circle kilometres on a spherical Earth. Turn angles use
//! a planar approximation on raw latitude/longitude deltas, which is adequate
//! at the sub-kilometre scale between consecutive fixes but should not be
//! reused for long-haul headings.

use chrono::{DateTime, Utc};

use crate::{Bounds, GpsPoint};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Map centre used when a track has no usable coordinate.
pub const FALLBACK_CENTER: (f64, f64) = (40.416775, -3.703790);

/// Zoom level for a view centred on a real fix.
pub const TRACK_ZOOM: u8 = 13;

/// Zoom level for the fallback view.
pub const FALLBACK_ZOOM: u8 = 10;

/// Great-circle distance between two coordinates, in kilometres.
///
/// NaN inputs propagate to a NaN result; callers filter invalid coordinates
/// beforehand (see [`retain_valid`]).
///
/// # Example
/// ```
/// use trajectory_engine::geo_utils::haversine_distance_km;
///
/// let d = haversine_distance_km(51.5074, -0.1278, 48.8566, 2.3522);
/// assert!((d - 343.5).abs() < 1.0); // London to Paris
/// ```
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points
    let a = if a > 1.0 { 1.0 } else { a };

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Great-circle distance between two points, in kilometres.
#[inline]
pub fn distance_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine_distance_km(p1.latitude, p1.longitude, p2.latitude, p2.longitude)
}

/// Angle in degrees between the heading p1→p2 and the heading p2→p3.
///
/// Returns a value in `[0, 180]`: 0 for straight-ahead motion, 180 for a
/// full reversal. If either leg has zero length the heading is undefined and
/// the turn counts as 0.
pub fn turn_angle_degrees(p1: &GpsPoint, p2: &GpsPoint, p3: &GpsPoint) -> f64 {
    let (d_lat1, d_lon1) = (p2.latitude - p1.latitude, p2.longitude - p1.longitude);
    let (d_lat2, d_lon2) = (p3.latitude - p2.latitude, p3.longitude - p2.longitude);

    if (d_lat1 == 0.0 && d_lon1 == 0.0) || (d_lat2 == 0.0 && d_lon2 == 0.0) {
        return 0.0;
    }

    let heading1 = d_lon1.atan2(d_lat1);
    let heading2 = d_lon2.atan2(d_lat2);

    let angle = (heading1 - heading2).abs().to_degrees();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

/// Absolute time between two instants, in minutes.
pub fn minutes_between(a: &DateTime<Utc>, b: &DateTime<Utc>) -> f64 {
    (*b - *a).num_milliseconds().abs() as f64 / 60_000.0
}

/// Whether timestamps never decrease along the sequence.
pub fn is_chronological(points: &[GpsPoint]) -> bool {
    points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Stable sort by timestamp, for callers that receive unordered fixes.
pub fn sort_chronologically(points: &mut [GpsPoint]) {
    points.sort_by_key(|p| p.timestamp);
}

/// Drop fixes with NaN or out-of-range coordinates.
pub fn retain_valid(points: &[GpsPoint]) -> Vec<GpsPoint> {
    points.iter().filter(|p| p.is_valid()).cloned().collect()
}

/// Compute the bounding box of a set of points.
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    Bounds::from_points(points)
}

/// Arithmetic mean of the coordinates, or `None` for an empty slice.
pub fn compute_center(points: &[GpsPoint]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sum_lat, sum_lon) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.latitude, lon + p.longitude));
    Some((sum_lat / n, sum_lon / n))
}

/// Initial map centre and zoom for a track.
///
/// Centres on the first valid fix; with none, falls back to a fixed
/// city-level view.
pub fn initial_view(points: &[GpsPoint]) -> ((f64, f64), u8) {
    points
        .iter()
        .find(|p| p.is_valid())
        .map(|p| ((p.latitude, p.longitude), TRACK_ZOOM))
        .unwrap_or((FALLBACK_CENTER, FALLBACK_ZOOM))
}

/// Approximate number of degrees of latitude spanned by `km`.
pub fn km_to_lat_degrees(km: f64) -> f64 {
    km / (EARTH_RADIUS_KM.to_radians())
}

/// Approximate number of degrees of longitude spanned by `km` at `latitude`.
///
/// Near the poles the conversion blows up; it is capped at 360°.
pub fn km_to_lon_degrees(km: f64, latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos().abs();
    if cos_lat < 1e-9 {
        return 360.0;
    }
    (km / (EARTH_RADIUS_KM.to_radians() * cos_lat)).min(360.0)
}
