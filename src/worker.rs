//! Background execution for the heavy stages.
//!
//! Decimation and clustering are O(n) and O(n²) over tracks that can hold
//! tens of thousands of fixes, so they must not run on the thread that
//! drives the UI. Each `spawn_*` function moves its input to a fresh worker
//! thread and returns a [`JobHandle`] that can be polled without blocking.
//!
//! There is no cooperative cancellation. Instead a [`RequestTracker`] hands
//! out increasing request ids; issuing a new request makes every earlier one
//! stale, and [`RequestTracker::accept`] refuses stale results. When the user
//! switches vehicles mid-computation, the old job runs to completion and its
//! result is simply dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::clustering::{cluster_indexed, ClusterConfig};
use crate::decimation::{decimate, DecimationConfig};
use crate::error::{Result, TrajectoryError};
use crate::heatmap::{accumulate_weights, HeatmapConfig};
use crate::{Cluster, GpsPoint, WeightedCell};

/// Identifier of one background request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues request ids and recognises stale results.
///
/// Shareable across threads (`&RequestTracker` is `Sync`).
#[derive(Debug, Default)]
pub struct RequestTracker {
    generation: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding all earlier ones.
    pub fn issue(&self) -> RequestId {
        RequestId(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The most recently issued request.
    pub fn current(&self) -> RequestId {
        RequestId(self.generation.load(Ordering::SeqCst))
    }

    /// Make every outstanding request stale without starting a new one.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.current() == id
    }

    /// Wait for a job and return its result if the request is still current.
    pub fn accept<T>(&self, handle: JobHandle<T>) -> Result<T> {
        let request = handle.request;
        let value = handle.recv()?;
        self.check_current(request)?;
        Ok(value)
    }

    /// Non-blocking [`accept`](Self::accept): `None` while the job is running.
    pub fn try_accept<T>(&self, handle: &JobHandle<T>) -> Option<Result<T>> {
        match handle.receiver.try_recv() {
            Ok(value) => Some(self.check_current(handle.request).map(|_| value)),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(TrajectoryError::WorkerDisconnected)),
        }
    }

    fn check_current(&self, request: RequestId) -> Result<()> {
        let current = self.current();
        if current != request {
            debug!("[Worker] Discarding stale result for request {}", request);
            return Err(TrajectoryError::StaleResult {
                requested: request.0,
                current: current.0,
            });
        }
        Ok(())
    }
}

/// Handle for a job running on a worker thread.
#[derive(Debug)]
pub struct JobHandle<T> {
    request: RequestId,
    receiver: mpsc::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// The request this job was issued under.
    pub fn request_id(&self) -> RequestId {
        self.request
    }

    /// Check if the job is complete (non-blocking).
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the job to complete (blocking).
    pub fn recv(self) -> Result<T> {
        self.receiver
            .recv()
            .map_err(|_| TrajectoryError::WorkerDisconnected)
    }
}

fn spawn_job<T, F>(request: RequestId, name: &str, job: F) -> JobHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name(format!("trajectory-{}", name))
        .spawn(move || {
            let result = job();
            if tx.send(result).is_err() {
                debug!("[Worker] Request {} finished after its handle was dropped", request);
            }
        });
    // On failure the closure, and with it the sender, is dropped, so the
    // handle reports WorkerDisconnected.
    if let Err(e) = spawned {
        warn!("[Worker] Failed to spawn {} thread: {}", name, e);
    }

    JobHandle {
        request,
        receiver: rx,
    }
}

/// Decimate a track on a worker thread.
pub fn spawn_decimation(
    tracker: &RequestTracker,
    points: Vec<GpsPoint>,
    config: DecimationConfig,
) -> JobHandle<Vec<GpsPoint>> {
    let request = tracker.issue();
    spawn_job(request, "decimate", move || {
        let start = Instant::now();
        let result = decimate(&points, &config);
        info!(
            "[Worker] Request {} decimated {} -> {} points in {:?}",
            request,
            points.len(),
            result.len(),
            start.elapsed()
        );
        result
    })
}

/// Cluster fixes on a worker thread.
pub fn spawn_clustering(
    tracker: &RequestTracker,
    points: Vec<GpsPoint>,
    config: ClusterConfig,
) -> JobHandle<Vec<Cluster>> {
    let request = tracker.issue();
    spawn_job(request, "cluster", move || {
        let start = Instant::now();
        let result = cluster_indexed(&points, config.max_distance_km);
        info!(
            "[Worker] Request {} clustered {} points into {} clusters in {:?}",
            request,
            points.len(),
            result.len(),
            start.elapsed()
        );
        result
    })
}

/// Everything the map needs for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    /// Decimated fixes, for the polyline and table/point rendering
    pub decimated: Vec<GpsPoint>,
    /// Clusters of the decimated fixes, for badge markers
    pub clusters: Vec<Cluster>,
    /// Heat cells of the decimated fixes
    pub heat: Vec<WeightedCell>,
}

/// Run the full render pipeline: decimate, then cluster and weight the result.
pub fn run_pipeline(
    points: &[GpsPoint],
    decimation: &DecimationConfig,
    clustering: &ClusterConfig,
    heatmap: &HeatmapConfig,
) -> RenderOutput {
    let decimated = decimate(points, decimation);
    let clusters = cluster_indexed(&decimated, clustering.max_distance_km);
    let heat = accumulate_weights(&decimated, heatmap.multiplier);
    RenderOutput {
        decimated,
        clusters,
        heat,
    }
}

/// [`run_pipeline`] on a worker thread.
pub fn spawn_render_pipeline(
    tracker: &RequestTracker,
    points: Vec<GpsPoint>,
    decimation: DecimationConfig,
    clustering: ClusterConfig,
    heatmap: HeatmapConfig,
) -> JobHandle<RenderOutput> {
    let request = tracker.issue();
    spawn_job(request, "pipeline", move || {
        let start = Instant::now();
        let output = run_pipeline(&points, &decimation, &clustering, &heatmap);
        info!(
            "[Worker] Request {} rendered {} points: {} decimated, {} clusters, {} heat cells in {:?}",
            request,
            points.len(),
            output.decimated.len(),
            output.clusters.len(),
            output.heat.len(),
            start.elapsed()
        );
        output
    })
}

/// Decimate on tokio's blocking pool.
#[cfg(feature = "async")]
pub async fn decimate_async(points: Vec<GpsPoint>, config: DecimationConfig) -> Result<Vec<GpsPoint>> {
    tokio::task::spawn_blocking(move || decimate(&points, &config))
        .await
        .map_err(|e| TrajectoryError::Join {
            message: e.to_string(),
        })
}

/// Cluster on tokio's blocking pool.
#[cfg(feature = "async")]
pub async fn cluster_async(points: Vec<GpsPoint>, config: ClusterConfig) -> Result<Vec<Cluster>> {
    tokio::task::spawn_blocking(move || cluster_indexed(&points, config.max_distance_km))
        .await
        .map_err(|e| TrajectoryError::Join {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::time::Duration as StdDuration;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn track(count: usize) -> Vec<GpsPoint> {
        (0..count)
            .map(|i| {
                GpsPoint::new(40.0 + i as f64 * 0.0001, -3.0, t(i as i64 * 5)).with_speed(50.0)
            })
            .collect()
    }

    #[test]
    fn test_request_ids_increase() {
        let tracker = RequestTracker::new();
        let a = tracker.issue();
        let b = tracker.issue();
        assert!(b > a);
        assert!(tracker.is_current(b));
        assert!(!tracker.is_current(a));

        tracker.invalidate();
        assert!(!tracker.is_current(b));
    }

    #[test]
    fn test_spawn_decimation_matches_sync() {
        let tracker = RequestTracker::new();
        let points = track(2_000);
        let expected = decimate(&points, &DecimationConfig::default());

        let handle = spawn_decimation(&tracker, points, DecimationConfig::default());
        assert_eq!(tracker.accept(handle).unwrap(), expected);
    }

    #[test]
    fn test_stale_result_is_rejected() {
        let tracker = RequestTracker::new();
        let first = spawn_clustering(&tracker, track(50), ClusterConfig::default());
        let second = spawn_clustering(&tracker, track(60), ClusterConfig::default());

        assert!(matches!(
            tracker.accept(first),
            Err(TrajectoryError::StaleResult { requested: 1, current: 2 })
        ));
        let clusters = tracker.accept(second).unwrap();
        assert_eq!(clusters.iter().map(|c| c.member_count).sum::<usize>(), 60);
    }

    #[test]
    fn test_try_accept_polls_until_done() {
        let tracker = RequestTracker::new();
        let handle = spawn_render_pipeline(
            &tracker,
            track(500),
            DecimationConfig::default(),
            ClusterConfig::default(),
            HeatmapConfig::default(),
        );

        let output = loop {
            match tracker.try_accept(&handle) {
                Some(result) => break result.unwrap(),
                None => thread::sleep(StdDuration::from_millis(1)),
            }
        };
        assert_eq!(output.decimated.first(), Some(&track(500)[0]));
        assert_eq!(
            output.clusters.iter().map(|c| c.member_count).sum::<usize>(),
            output.decimated.len()
        );
        assert!(!output.heat.is_empty());
    }

    #[test]
    fn test_dropped_handle_does_not_panic_worker() {
        let tracker = RequestTracker::new();
        drop(spawn_decimation(&tracker, track(100), DecimationConfig::default()));
        let handle = spawn_decimation(&tracker, track(10), DecimationConfig::default());
        assert_eq!(handle.request_id().value(), 2);
        assert!(handle.recv().is_ok());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_async_workers() {
        let points = track(300);
        let expected = decimate(&points, &DecimationConfig::default());
        let decimated = decimate_async(points, DecimationConfig::default())
            .await
            .unwrap();
        assert_eq!(decimated, expected);

        let clusters = cluster_async(decimated.clone(), ClusterConfig::default())
            .await
            .unwrap();
        assert_eq!(
            clusters.iter().map(|c| c.member_count).sum::<usize>(),
            decimated.len()
        );
    }
}
