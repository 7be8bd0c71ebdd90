use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AttendanceOutcome, ReasonCode, TrustStatus};

/// Compact record of one verification, kept for the recent-history view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictSummary {
    pub verification_id: Uuid,
    pub verified_at: DateTime<Utc>,
    pub outcome: AttendanceOutcome,
    pub distance_meters: f64,
    pub trust_status: Option<TrustStatus>,
    pub reasons: Vec<ReasonCode>,
    pub sample_count: usize,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub present: u64,
    pub outside_fence: u64,
    pub flagged: u64,
    pub sensor_unavailable: u64,
}

impl OutcomeCounts {
    pub fn bump(&mut self, outcome: AttendanceOutcome) {
        match outcome {
            AttendanceOutcome::Present => self.present += 1,
            AttendanceOutcome::OutsideFence => self.outside_fence += 1,
            AttendanceOutcome::Flagged => self.flagged += 1,
            AttendanceOutcome::SensorUnavailable => self.sensor_unavailable += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.present + self.outside_fence + self.flagged + self.sensor_unavailable
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonCounts {
    pub sensor_data_unavailable: u64,
    pub implausible_accuracy: u64,
    pub frozen_sensor_stream: u64,
    pub multiple_anomalies: u64,
}

impl ReasonCounts {
    pub fn bump(&mut self, reason: ReasonCode) {
        match reason {
            ReasonCode::SensorDataUnavailable => self.sensor_data_unavailable += 1,
            ReasonCode::ImplausibleAccuracy => self.implausible_accuracy += 1,
            ReasonCode::FrozenSensorStream => self.frozen_sensor_stream += 1,
            ReasonCode::MultipleAnomalies => self.multiple_anomalies += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub outcomes: OutcomeCounts,
    pub reasons: ReasonCounts,
    /// Inside-fence verdicts that carried no trust block.
    pub degraded_count: u64,
    pub recent: Vec<VerdictSummary>,
}
