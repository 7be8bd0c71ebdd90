//! Location-based attendance verification.
//!
//! A check-in is accepted when the device fix lies inside the session
//! geofence (with an accuracy allowance) and, optionally, when a short window
//! of motion and orientation data does not look like a spoofed or emulated
//! device. Platform location and sensor APIs are injected; this crate owns the
//! decision.

pub mod error;
pub mod geo;
pub mod geofence;
pub mod metrics;
pub mod models;
pub mod sensors;
pub mod settings;
pub mod spoofing;
pub mod verifier;
mod utils;

pub use error::{Result, SensorError, VerificationError};
pub use geofence::GeofenceConfig;
pub use metrics::{MetricsSnapshot, VerificationMetrics};
pub use models::{
    AttendanceOutcome, AttendanceVerdict, Coordinate, DegradedMode, Evidence, GeofenceDefinition,
    GeofenceVerdict, LocationReading, ReasonCode, TrustStatus, TrustVerdict,
};
pub use sensors::sampler::WindowCollector;
pub use sensors::{
    SampleWindow, SensorEvent, SensorHub, SensorProvider, SensorSampler, SensorSource,
};
pub use settings::{SettingsStore, VerificationSettings};
pub use spoofing::{ClassifierConfig, FreezeScope, SpoofingClassifier};
pub use utils::logging::init_logging;
pub use verifier::{AttendanceVerifier, SensorConfig, VerifierConfig};

use tokio_util::sync::CancellationToken;

/// Geofence check with the default accuracy cap and safety margin.
pub fn evaluate_geofence(reading: &LocationReading, fence: &GeofenceDefinition) -> GeofenceVerdict {
    geofence::evaluate(reading, fence, &GeofenceConfig::default())
}

/// Gathers one sample window from `provider`.
///
/// Resolves when the duration elapses or `cancel` fires, whichever is first.
pub async fn collect_sensor_window<P: SensorProvider>(
    provider: P,
    duration_ms: u64,
    sample_rate_hz: f64,
    cancel: CancellationToken,
) -> Result<SampleWindow> {
    SensorSampler::new(provider)
        .collect(duration_ms, sample_rate_hz, cancel)
        .await
}

/// Classifies a window against the default checklist.
pub fn classify_spoofing(window: &SampleWindow, reading: &LocationReading) -> TrustVerdict {
    SpoofingClassifier::default().classify(window, reading)
}

/// Full pipeline with default tuning: geofence first, then sensors only when
/// the reading is inside the fence.
pub async fn verify_attendance<C: WindowCollector>(
    reading: &LocationReading,
    fence: &GeofenceDefinition,
    sensors: SensorConfig,
    collector: C,
) -> Result<AttendanceVerdict> {
    AttendanceVerifier::new(collector)
        .verify(reading, fence, sensors)
        .await
}
