//! Verdicts handed to the external check-in recorder.
//!
//! Everything here is derived and immutable once built. The recorder owns
//! persistence and user-facing messaging; these types only carry the decision
//! and the evidence behind it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SensorError;
use crate::models::LocationReading;
use crate::sensors::SampleWindow;

/// Result of one geofence evaluation. Never cached across readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceVerdict {
    pub within_fence: bool,
    pub distance_meters: f64,
    pub allowed_distance_meters: f64,
}

/// Trust level, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStatus {
    Clean,
    Suspicious,
    Rejected,
}

impl Default for TrustStatus {
    fn default() -> Self {
        TrustStatus::Clean
    }
}

impl TrustStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustStatus::Clean => "clean",
            TrustStatus::Suspicious => "suspicious",
            TrustStatus::Rejected => "rejected",
        }
    }
}

/// Audit code for one triggered spoofing heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    SensorDataUnavailable,
    ImplausibleAccuracy,
    FrozenSensorStream,
    MultipleAnomalies,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::SensorDataUnavailable => "sensor-data-unavailable",
            ReasonCode::ImplausibleAccuracy => "implausible-accuracy",
            ReasonCode::FrozenSensorStream => "frozen-sensor-stream",
            ReasonCode::MultipleAnomalies => "multiple-anomalies",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The inputs a trust decision was made from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub window: SampleWindow,
    pub reading: LocationReading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustVerdict {
    pub status: TrustStatus,
    /// Triggered checks in checklist order.
    pub reasons: Vec<ReasonCode>,
    pub evidence: Evidence,
}

impl TrustVerdict {
    pub fn has_reason(&self, reason: ReasonCode) -> bool {
        self.reasons.contains(&reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceOutcome {
    Present,
    OutsideFence,
    Flagged,
    SensorUnavailable,
}

impl AttendanceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceOutcome::Present => "present",
            AttendanceOutcome::OutsideFence => "outside_fence",
            AttendanceOutcome::Flagged => "flagged",
            AttendanceOutcome::SensorUnavailable => "sensor_unavailable",
        }
    }
}

/// Why a verdict carries no trust block even though the reading was inside the fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedMode {
    SensorsDisabled,
    SensorsUnsupported,
    PermissionDenied,
}

impl From<SensorError> for DegradedMode {
    fn from(err: SensorError) -> Self {
        match err {
            SensorError::PermissionDenied => DegradedMode::PermissionDenied,
            SensorError::SensorUnsupported => DegradedMode::SensorsUnsupported,
        }
    }
}

/// The sole output handed to the check-in recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceVerdict {
    pub verification_id: Uuid,
    pub verified_at: DateTime<Utc>,
    pub outcome: AttendanceOutcome,
    pub geofence: GeofenceVerdict,
    pub trust: Option<TrustVerdict>,
    /// Set when sensor evidence was skipped or could not be gathered.
    pub degraded: Option<DegradedMode>,
}

impl AttendanceVerdict {
    /// Present with a suspicious trust block: recorded, but worth a warning.
    pub fn needs_review(&self) -> bool {
        self.outcome == AttendanceOutcome::Present
            && self
                .trust
                .as_ref()
                .map(|trust| trust.status == TrustStatus::Suspicious)
                .unwrap_or(false)
    }
}
