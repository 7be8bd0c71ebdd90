//! Inside/outside decision for a single reading against a session geofence.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerificationError};
use crate::geo;
use crate::models::{GeofenceDefinition, GeofenceVerdict, LocationReading};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Reported accuracy beyond this adds nothing to the allowed distance.
pub const DEFAULT_ACCURACY_CAP_M: f64 = 20.0;

/// Fixed margin for residual jitter and device-to-hand offset.
pub const DEFAULT_SAFETY_MARGIN_M: f64 = 5.0;

/// Tolerance constants for the geofence decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeofenceConfig {
    /// Upper bound on how much reported accuracy may widen the fence
    pub accuracy_cap_m: f64,

    /// Added to every fence regardless of accuracy
    pub safety_margin_m: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            accuracy_cap_m: DEFAULT_ACCURACY_CAP_M,
            safety_margin_m: DEFAULT_SAFETY_MARGIN_M,
        }
    }
}

impl GeofenceConfig {
    /// Cap and margin must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("accuracy cap", self.accuracy_cap_m),
            ("safety margin", self.safety_margin_m),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(VerificationError::invalid_config(format!(
                    "geofence {name} {value} must be a non-negative distance"
                )));
            }
        }
        Ok(())
    }

    /// Radius plus capped accuracy plus the fixed margin.
    pub fn allowed_distance(&self, radius_meters: f64, accuracy_meters: f64) -> f64 {
        let accuracy_buffer = accuracy_meters.min(self.accuracy_cap_m);
        radius_meters + accuracy_buffer + self.safety_margin_m
    }
}

/// Evaluates `reading` against `fence`.
///
/// The reading must already be validated; negative accuracy is the caller's bug
/// and is rejected upstream by [`LocationReading::validate`]. The verdict is
/// computed fresh for every reading.
pub fn evaluate(
    reading: &LocationReading,
    fence: &GeofenceDefinition,
    config: &GeofenceConfig,
) -> GeofenceVerdict {
    let distance_meters = geo::distance_meters(reading.coordinate, fence.center);
    let allowed_distance_meters =
        config.allowed_distance(fence.radius_meters, reading.accuracy_meters);
    let within_fence = distance_meters <= allowed_distance_meters;

    log_debug!(
        "geofence: distance={:.2}m allowed={:.2}m (radius={:.2}m accuracy={:.2}m) within={}",
        distance_meters,
        allowed_distance_meters,
        fence.radius_meters,
        reading.accuracy_meters,
        within_fence
    );

    GeofenceVerdict {
        within_fence,
        distance_meters,
        allowed_distance_meters,
    }
}
