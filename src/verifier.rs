//! Attendance verification pipeline.
//!
//! validate → geofence → (inside only) sensor window → classify → verdict.
//!
//! Every branch is terminal and there is no retry loop: re-requesting a GPS
//! fix is the caller's job. Only malformed input comes back as `Err`; sensor
//! permission and support problems degrade to a geofence-only verdict.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, VerificationError};
use crate::geofence::{self, GeofenceConfig};
use crate::metrics::VerificationMetrics;
use crate::models::{
    AttendanceOutcome, AttendanceVerdict, DegradedMode, GeofenceDefinition, GeofenceVerdict,
    LocationReading, TrustStatus,
};
use crate::sensors::sampler::WindowCollector;
use crate::spoofing::{ClassifierConfig, SpoofingClassifier};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Whether and how to gather motion evidence for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum SensorConfig {
    Disabled,
    #[serde(rename_all = "camelCase")]
    Enabled { duration_ms: u64, sample_rate_hz: f64 },
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig::Disabled
    }
}

impl SensorConfig {
    pub fn enabled(duration_ms: u64, sample_rate_hz: f64) -> Self {
        SensorConfig::Enabled {
            duration_ms,
            sample_rate_hz,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let SensorConfig::Enabled {
            duration_ms,
            sample_rate_hz,
        } = *self
        {
            if duration_ms == 0 {
                return Err(VerificationError::invalid_sensor_config(
                    "duration must be greater than zero",
                ));
            }
            if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
                return Err(VerificationError::invalid_sensor_config(format!(
                    "sample rate {sample_rate_hz} must be a positive frequency"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifierConfig {
    pub geofence: GeofenceConfig,
    pub classifier: ClassifierConfig,
    /// When set, an inside-fence reading without sensor evidence is reported
    /// as `sensor_unavailable` instead of geofence-only `present`.
    pub require_sensor_evidence: bool,
}

impl VerifierConfig {
    pub fn validate(&self) -> Result<()> {
        self.geofence.validate()?;
        self.classifier.validate()
    }
}

pub struct AttendanceVerifier<C> {
    collector: C,
    config: VerifierConfig,
    classifier: SpoofingClassifier,
    metrics: Option<VerificationMetrics>,
}

impl<C: WindowCollector> AttendanceVerifier<C> {
    pub fn new(collector: C) -> Self {
        Self::with_config(collector, VerifierConfig::default())
    }

    pub fn with_config(collector: C, config: VerifierConfig) -> Self {
        Self {
            collector,
            classifier: SpoofingClassifier::new(config.classifier),
            config,
            metrics: None,
        }
    }

    /// Records every verdict into `metrics`.
    pub fn with_metrics(mut self, metrics: VerificationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub async fn verify(
        &self,
        reading: &LocationReading,
        fence: &GeofenceDefinition,
        sensors: SensorConfig,
    ) -> Result<AttendanceVerdict> {
        self.verify_with_cancel(reading, fence, sensors, CancellationToken::new())
            .await
    }

    /// Like [`verify`](Self::verify), with a token that cuts sensor collection
    /// short. A cancelled collection is still classified on what it gathered.
    pub async fn verify_with_cancel(
        &self,
        reading: &LocationReading,
        fence: &GeofenceDefinition,
        sensors: SensorConfig,
        cancel: CancellationToken,
    ) -> Result<AttendanceVerdict> {
        self.config.validate()?;
        reading.validate()?;
        fence.validate()?;
        sensors.validate()?;

        let started = Instant::now();
        let verification_id = Uuid::new_v4();
        let geofence = geofence::evaluate(reading, fence, &self.config.geofence);

        let verdict = self
            .decide(verification_id, reading, geofence, sensors, cancel)
            .await?;

        log_info!(
            "verification {} -> {} (distance {:.1}m / allowed {:.1}m)",
            verdict.verification_id,
            verdict.outcome.as_str(),
            verdict.geofence.distance_meters,
            verdict.geofence.allowed_distance_meters
        );

        if let Some(metrics) = &self.metrics {
            metrics
                .record(&verdict, started.elapsed().as_millis() as u64)
                .await;
        }

        Ok(verdict)
    }

    async fn decide(
        &self,
        verification_id: Uuid,
        reading: &LocationReading,
        geofence: GeofenceVerdict,
        sensors: SensorConfig,
        cancel: CancellationToken,
    ) -> Result<AttendanceVerdict> {
        let verdict = |outcome, trust, degraded| AttendanceVerdict {
            verification_id,
            verified_at: Utc::now(),
            outcome,
            geofence,
            trust,
            degraded,
        };

        if !geofence.within_fence {
            return Ok(verdict(AttendanceOutcome::OutsideFence, None, None));
        }

        let (duration_ms, sample_rate_hz) = match sensors {
            SensorConfig::Disabled => {
                return Ok(verdict(
                    self.degraded_outcome(),
                    None,
                    Some(DegradedMode::SensorsDisabled),
                ));
            }
            SensorConfig::Enabled {
                duration_ms,
                sample_rate_hz,
            } => (duration_ms, sample_rate_hz),
        };

        if !self.collector.is_supported() {
            return Ok(verdict(
                self.degraded_outcome(),
                None,
                Some(DegradedMode::SensorsUnsupported),
            ));
        }

        let window = match self
            .collector
            .collect(duration_ms, sample_rate_hz, cancel)
            .await
        {
            Ok(window) => window,
            Err(VerificationError::Sensor(err)) => {
                log_warn!("sensor evidence unavailable ({err}), falling back to geofence only");
                return Ok(verdict(self.degraded_outcome(), None, Some(err.into())));
            }
            Err(err) => return Err(err),
        };

        let trust = self.classifier.classify(&window, reading);
        let outcome = match trust.status {
            TrustStatus::Clean | TrustStatus::Suspicious => AttendanceOutcome::Present,
            TrustStatus::Rejected => AttendanceOutcome::Flagged,
        };
        Ok(verdict(outcome, Some(trust), None))
    }

    /// Outcome for an inside-fence reading that carries no sensor evidence.
    fn degraded_outcome(&self) -> AttendanceOutcome {
        if self.config.require_sensor_evidence {
            AttendanceOutcome::SensorUnavailable
        } else {
            AttendanceOutcome::Present
        }
    }
}
