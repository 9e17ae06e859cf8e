//! Named point layers and the per-layer render pipeline.
//!
//! A layer is a saved, colour-coded selection of fixes (one vehicle over some
//! time window). When point optimisation is on, each active layer is
//! decimated and then clustered, so the map shows one badge-annotated marker
//! per group of near-duplicates instead of thousands of stacked pins.

use log::info;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::clustering::{cluster_indexed, ClusterConfig};
use crate::decimation::{decimate, DecimationConfig};
use crate::{Cluster, GpsPoint};

/// A named, colour-coded set of fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsLayer {
    pub id: u64,
    pub name: String,
    /// CSS colour used for the layer's markers and polyline
    pub color: String,
    /// Inactive layers are kept but not drawn
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Time-ordered fixes
    pub points: Vec<GpsPoint>,
}

impl GpsLayer {
    pub fn new(id: u64, name: impl Into<String>, color: impl Into<String>, points: Vec<GpsPoint>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            active: true,
            description: None,
            points,
        }
    }
}

/// Markers ready to draw for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerView {
    pub layer_id: u64,
    pub color: String,
    pub markers: Vec<Cluster>,
}

impl LayerView {
    /// Number of original fixes represented by the markers.
    pub fn represented_points(&self) -> usize {
        self.markers.iter().map(|m| m.member_count).sum()
    }
}

/// Build the markers for one layer.
///
/// With `optimize`, fixes are decimated and then clustered; otherwise every
/// fix becomes its own single-member marker.
pub fn render_layer(
    layer: &GpsLayer,
    optimize: bool,
    decimation: &DecimationConfig,
    clustering: &ClusterConfig,
) -> LayerView {
    let markers = if optimize {
        let reduced = decimate(&layer.points, decimation);
        cluster_indexed(&reduced, clustering.max_distance_km)
    } else {
        layer
            .points
            .iter()
            .map(|&p| Cluster {
                centroid: p,
                member_count: 1,
            })
            .collect()
    };

    LayerView {
        layer_id: layer.id,
        color: layer.color.clone(),
        markers,
    }
}

/// Render every active layer, in order.
pub fn render_active_layers(
    layers: &[GpsLayer],
    optimize: bool,
    decimation: &DecimationConfig,
    clustering: &ClusterConfig,
) -> Vec<LayerView> {
    let views: Vec<LayerView> = layers
        .iter()
        .filter(|l| l.active)
        .map(|l| render_layer(l, optimize, decimation, clustering))
        .collect();
    log_rendered(&views);
    views
}

/// Parallel version of [`render_active_layers`]; output order is preserved.
#[cfg(feature = "parallel")]
pub fn render_active_layers_parallel(
    layers: &[GpsLayer],
    optimize: bool,
    decimation: &DecimationConfig,
    clustering: &ClusterConfig,
) -> Vec<LayerView> {
    let views: Vec<LayerView> = layers
        .par_iter()
        .filter(|l| l.active)
        .map(|l| render_layer(l, optimize, decimation, clustering))
        .collect();
    log_rendered(&views);
    views
}

fn log_rendered(views: &[LayerView]) {
    info!(
        "[Layers] Rendered {} active layers ({} markers)",
        views.len(),
        views.iter().map(|v| v.markers.len()).sum::<usize>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn parked_then_driving() -> Vec<GpsPoint> {
        let mut points: Vec<GpsPoint> = (0..20)
            .map(|i| GpsPoint::new(40.4168, -3.7038, t(i * 30)))
            .collect();
        points.extend((1..=30).map(|i| {
            GpsPoint::new(40.4168 + i as f64 * 0.001, -3.7038, t(600 + i * 10)).with_speed(60.0)
        }));
        points
    }

    #[test]
    fn test_render_without_optimization_is_passthrough() {
        let layer = GpsLayer::new(1, "Van", "#228be6", parked_then_driving());
        let view = render_layer(
            &layer,
            false,
            &DecimationConfig::default(),
            &ClusterConfig::default(),
        );
        assert_eq!(view.markers.len(), layer.points.len());
        assert!(view.markers.iter().all(|m| m.is_singleton()));
        assert_eq!(view.color, "#228be6");
    }

    #[test]
    fn test_render_with_optimization_reduces_markers() {
        let layer = GpsLayer::new(2, "Car", "#fa5252", parked_then_driving());
        let decimation = DecimationConfig::default();
        let view = render_layer(&layer, true, &decimation, &ClusterConfig::default());

        let reduced = decimate(&layer.points, &decimation);
        assert!(view.markers.len() < layer.points.len());
        assert_eq!(view.represented_points(), reduced.len());
    }

    #[test]
    fn test_only_active_layers_render() {
        let mut hidden = GpsLayer::new(1, "Hidden", "#000", parked_then_driving());
        hidden.active = false;
        let shown = GpsLayer::new(2, "Shown", "#fff", parked_then_driving());

        let views = render_active_layers(
            &[hidden, shown],
            true,
            &DecimationConfig::default(),
            &ClusterConfig::default(),
        );
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].layer_id, 2);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let layers: Vec<GpsLayer> = (0..6)
            .map(|i| GpsLayer::new(i, format!("L{}", i), "#123", parked_then_driving()))
            .collect();
        let d = DecimationConfig::default();
        let c = ClusterConfig::default();
        assert_eq!(
            render_active_layers_parallel(&layers, true, &d, &c),
            render_active_layers(&layers, true, &d, &c)
        );
    }

    #[test]
    fn test_layer_json_roundtrip_defaults() {
        let json = r#"{"id":4,"name":"Truck","color":"red","active":false,"points":[]}"#;
        let layer: GpsLayer = serde_json::from_str(json).unwrap();
        assert!(!layer.active);
        assert!(layer.description.is_none());
    }
}
