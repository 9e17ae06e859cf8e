//! Route playback: eased marker motion between consecutive fixes.
//!
//! The caller owns a [`PlaybackState`] and drives it from its frame loop:
//! every tick it calls [`PlaybackState::advance`] with the elapsed time and
//! then [`PlaybackState::position`] to place the moving marker. Neither call
//! allocates, logs or blocks, so both are safe on a 60 Hz render path.
//!
//! Progress between two fixes runs from 0 to 1 over `1000 ms / speed`. It is
//! eased with smoothstep so the marker slows into and out of each fix instead
//! of jumping at constant velocity, which looks jittery at low sample rates.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, Result};
use crate::GpsPoint;

/// Minimum coordinate change (degrees) worth redrawing the marker for.
pub const POSITION_EPSILON_DEG: f64 = 0.00001;

/// Base time to travel between two consecutive fixes at 1x speed (ms).
pub const BASE_STEP_MS: f64 = 1000.0;

/// Smoothstep easing: `t² · (3 − 2t)`, with `t` clamped to `[0, 1]`.
#[inline]
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Eased position between two fixes.
///
/// `progress` is clamped to `[0, 1]`; NaN counts as 0. The endpoints are
/// exact: progress 0 yields `current` and progress 1 yields `next`.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use trajectory_engine::{interpolate, GpsPoint};
///
/// let a = GpsPoint::new(40.0, -3.0, Utc::now());
/// let b = GpsPoint::new(41.0, -4.0, Utc::now());
/// assert_eq!(interpolate(&a, &b, 0.5), (40.5, -3.5));
/// assert_eq!(interpolate(&a, &b, 1.0), (41.0, -4.0));
/// ```
#[inline]
pub fn interpolate(current: &GpsPoint, next: &GpsPoint, progress: f32) -> (f64, f64) {
    if !(progress > 0.0) {
        return current.coords();
    }
    if progress >= 1.0 {
        return next.coords();
    }

    let t = smoothstep(f64::from(progress));
    (
        current.latitude + (next.latitude - current.latitude) * t,
        current.longitude + (next.longitude - current.longitude) * t,
    )
}

/// True when the marker moved enough to be worth redrawing.
#[inline]
pub fn position_changed(previous: (f64, f64), current: (f64, f64)) -> bool {
    (previous.0 - current.0).abs() > POSITION_EPSILON_DEG
        || (previous.1 - current.1).abs() > POSITION_EPSILON_DEG
}

/// Playback speed settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Speed relative to one fix per second.
    /// Default: 1.0
    pub speed_multiplier: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
        }
    }
}

impl PlaybackConfig {
    /// Check that the speed is usable.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("speed_multiplier", self.speed_multiplier)
    }

    /// Time to travel from one fix to the next (ms).
    pub fn step_duration_ms(&self) -> f64 {
        BASE_STEP_MS / self.speed_multiplier
    }
}

/// Where playback currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    /// Reached the last fix; [`PlaybackState::play`] restarts from the beginning.
    Stopped,
}

/// Caller-owned playback cursor over one layer's fixes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub layer_id: u64,
    pub current_index: usize,
    /// Progress from `current_index` towards the next fix, in `[0, 1]`.
    pub sub_progress: f32,
    pub status: PlaybackStatus,
}

impl PlaybackState {
    /// Paused at the first fix of a layer.
    pub fn new(layer_id: u64) -> Self {
        Self {
            layer_id,
            current_index: 0,
            sub_progress: 0.0,
            status: PlaybackStatus::Paused,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Start or resume playback. A stopped playback restarts at the first fix.
    pub fn play(self) -> Self {
        match self.status {
            PlaybackStatus::Stopped => Self {
                current_index: 0,
                sub_progress: 0.0,
                status: PlaybackStatus::Playing,
                ..self
            },
            _ => Self {
                status: PlaybackStatus::Playing,
                ..self
            },
        }
    }

    /// Pause, keeping the current position.
    pub fn pause(self) -> Self {
        match self.status {
            PlaybackStatus::Playing => Self {
                status: PlaybackStatus::Paused,
                ..self
            },
            _ => self,
        }
    }

    /// Back to the first fix, paused.
    pub fn reset(self) -> Self {
        Self::new(self.layer_id)
    }

    /// Jump to a fix, clamped to the track. Progress restarts at 0.
    pub fn seek(self, index: usize, len: usize) -> Self {
        let current_index = index.min(len.saturating_sub(1));
        let status = match self.status {
            PlaybackStatus::Stopped if current_index + 1 < len => PlaybackStatus::Paused,
            status => status,
        };
        Self {
            current_index,
            sub_progress: 0.0,
            status,
            ..self
        }
    }

    /// Advance by `elapsed_ms` of wall time over a track of `len` fixes.
    ///
    /// Progress accumulates until it reaches 1, at which point the cursor
    /// moves to the next fix and progress resets to 0. Reaching the last fix
    /// stops playback. Paused or stopped states are returned unchanged.
    pub fn advance(self, elapsed_ms: f64, config: &PlaybackConfig, len: usize) -> Self {
        if self.status != PlaybackStatus::Playing {
            return self;
        }
        if len == 0 || self.current_index + 1 >= len {
            return Self {
                current_index: len.saturating_sub(1),
                sub_progress: 0.0,
                status: PlaybackStatus::Stopped,
                ..self
            };
        }

        let step_ms = config.step_duration_ms();
        let delta = if step_ms > 0.0 && elapsed_ms > 0.0 {
            (elapsed_ms / step_ms) as f32
        } else {
            0.0
        };
        let progress = self.sub_progress + delta;

        if progress < 1.0 {
            return Self {
                sub_progress: progress,
                ..self
            };
        }

        let current_index = self.current_index + 1;
        let status = if current_index + 1 >= len {
            PlaybackStatus::Stopped
        } else {
            PlaybackStatus::Playing
        };
        Self {
            current_index,
            sub_progress: 0.0,
            status,
            ..self
        }
    }

    /// Marker position for this state, or `None` if the index is off the track.
    pub fn position(&self, points: &[GpsPoint]) -> Option<(f64, f64)> {
        let current = points.get(self.current_index)?;
        match points.get(self.current_index + 1) {
            Some(next) => Some(interpolate(current, next, self.sub_progress)),
            None => Some(current.coords()),
        }
    }

    /// Fixes already passed, including the current one, for the trail line.
    pub fn trail<'a>(&self, points: &'a [GpsPoint]) -> &'a [GpsPoint] {
        if points.is_empty() {
            return points;
        }
        let end = self.current_index.min(points.len() - 1);
        &points[..=end]
    }
}
