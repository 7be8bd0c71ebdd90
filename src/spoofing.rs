//! Spoofing classifier: an ordered checklist of independent heuristics.
//!
//! Each check either passes or contributes one reason code at `Suspicious`.
//! Status is the most severe triggered outcome, and enough corroborating
//! suspicious findings escalate to `Rejected`. There is no scoring or model;
//! every verdict lists exactly which checks fired, in checklist order.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerificationError};
use crate::models::{Evidence, LocationReading, ReasonCode, TrustStatus, TrustVerdict};
use crate::sensors::{SampleWindow, SensorSample};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Consumer GPS never honestly reports a fix tighter than this.
pub const DEFAULT_MIN_PLAUSIBLE_ACCURACY_M: f64 = 1.0;

/// A channel needs at least this many values before a freeze can be judged.
pub const DEFAULT_FROZEN_MIN_SAMPLES: usize = 10;

/// Independent suspicious findings needed to reject.
pub const DEFAULT_ESCALATION_THRESHOLD: usize = 2;

/// Which channels must be frozen for the frozen-stream check to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FreezeScope {
    /// Every channel with enough samples is frozen.
    AllChannels,
    /// At least one channel with enough samples is frozen.
    AnyChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierConfig {
    pub min_plausible_accuracy_m: f64,
    pub frozen_min_samples: usize,
    pub freeze_scope: FreezeScope,
    pub escalation_threshold: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_plausible_accuracy_m: DEFAULT_MIN_PLAUSIBLE_ACCURACY_M,
            frozen_min_samples: DEFAULT_FROZEN_MIN_SAMPLES,
            freeze_scope: FreezeScope::AllChannels,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_plausible_accuracy_m.is_finite() || self.min_plausible_accuracy_m < 0.0 {
            return Err(VerificationError::invalid_config(format!(
                "min plausible accuracy {} must be a non-negative distance",
                self.min_plausible_accuracy_m
            )));
        }
        Ok(())
    }
}

/// One checklist entry.
struct Check {
    reason: ReasonCode,
    severity: TrustStatus,
    triggered: fn(&SampleWindow, &LocationReading, &ClassifierConfig) -> bool,
}

const CHECKLIST: [Check; 3] = [
    Check {
        reason: ReasonCode::SensorDataUnavailable,
        severity: TrustStatus::Suspicious,
        triggered: no_motion_evidence,
    },
    Check {
        reason: ReasonCode::ImplausibleAccuracy,
        severity: TrustStatus::Suspicious,
        triggered: implausible_accuracy,
    },
    Check {
        reason: ReasonCode::FrozenSensorStream,
        severity: TrustStatus::Suspicious,
        triggered: frozen_sensor_stream,
    },
];

/// Nothing in the window carries a sensor value. Legitimate devices can lack
/// sensors, so this never rejects on its own.
fn no_motion_evidence(window: &SampleWindow, _: &LocationReading, _: &ClassifierConfig) -> bool {
    window.has_no_motion_evidence()
}

/// Mock-location tools like to report perfect fixes.
fn implausible_accuracy(
    _: &SampleWindow,
    reading: &LocationReading,
    config: &ClassifierConfig,
) -> bool {
    reading.accuracy_meters < config.min_plausible_accuracy_m
}

/// A replayed or injected feed repeats the exact same bits.
fn frozen_sensor_stream(
    window: &SampleWindow,
    _: &LocationReading,
    config: &ClassifierConfig,
) -> bool {
    let samples = window.samples();
    let channels: [Vec<[u64; 3]>; 4] = [
        channel_bits(samples, |s| s.acceleration.map(|v| v.to_bits())),
        channel_bits(samples, |s| s.acceleration_with_gravity.map(|v| v.to_bits())),
        channel_bits(samples, |s| s.rotation_rate.map(|r| r.to_bits())),
        channel_bits(samples, |s| s.orientation.map(|r| r.to_bits())),
    ];

    let judged: Vec<bool> = channels
        .iter()
        .filter(|values| values.len() >= config.frozen_min_samples.max(2))
        .map(|values| values.windows(2).all(|pair| pair[0] == pair[1]))
        .collect();

    if judged.is_empty() {
        return false;
    }
    match config.freeze_scope {
        FreezeScope::AllChannels => judged.iter().all(|frozen| *frozen),
        FreezeScope::AnyChannel => judged.iter().any(|frozen| *frozen),
    }
}

fn channel_bits(
    samples: &[SensorSample],
    extract: impl Fn(&SensorSample) -> Option<[u64; 3]>,
) -> Vec<[u64; 3]> {
    samples.iter().filter_map(extract).collect()
}

#[derive(Debug, Clone, Default)]
pub struct SpoofingClassifier {
    config: ClassifierConfig,
}

impl SpoofingClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Runs the checklist. Never fails: every window, including an empty one,
    /// maps to a verdict.
    pub fn classify(&self, window: &SampleWindow, reading: &LocationReading) -> TrustVerdict {
        let mut status = TrustStatus::Clean;
        let mut reasons = Vec::new();
        let mut suspicious = 0usize;

        for check in &CHECKLIST {
            if (check.triggered)(window, reading, &self.config) {
                log_debug!("spoofing check fired: {}", check.reason);
                reasons.push(check.reason);
                status = status.max(check.severity);
                if check.severity == TrustStatus::Suspicious {
                    suspicious += 1;
                }
            }
        }

        // A lone anomaly never rejects, whatever the configured threshold.
        if suspicious >= self.config.escalation_threshold.max(2) {
            reasons.push(ReasonCode::MultipleAnomalies);
            status = TrustStatus::Rejected;
        }

        if status != TrustStatus::Clean {
            let codes: Vec<&str> = reasons.iter().map(ReasonCode::as_str).collect();
            log_info!(
                "trust verdict {} over {} samples: [{}]",
                status.as_str(),
                window.len(),
                codes.join(", ")
            );
        }

        TrustVerdict {
            status,
            reasons,
            evidence: Evidence {
                window: window.clone(),
                reading: reading.clone(),
            },
        }
    }
}
