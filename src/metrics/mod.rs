mod types;

pub use types::{MetricsSnapshot, OutcomeCounts, ReasonCounts, VerdictSummary};

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::AttendanceVerdict;

const MAX_RECENT_VERDICTS: usize = 50;

/// Process-wide verification counters. Cloning shares the same counters.
///
/// Only summaries are kept; the full verdict (with its sample window) belongs
/// to the check-in recorder.
pub struct VerificationMetrics {
    inner: Arc<Mutex<MetricsState>>,
}

#[derive(Default)]
struct MetricsState {
    outcomes: OutcomeCounts,
    reasons: ReasonCounts,
    degraded_count: u64,
    recent: Vec<VerdictSummary>,
}

impl VerificationMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent: Vec::with_capacity(MAX_RECENT_VERDICTS),
                ..MetricsState::default()
            })),
        }
    }

    pub async fn record(&self, verdict: &AttendanceVerdict, total_ms: u64) {
        let mut state = self.inner.lock().await;

        state.outcomes.bump(verdict.outcome);
        if verdict.degraded.is_some() {
            state.degraded_count += 1;
        }
        if let Some(trust) = &verdict.trust {
            for reason in &trust.reasons {
                state.reasons.bump(*reason);
            }
        }

        state.recent.push(VerdictSummary {
            verification_id: verdict.verification_id,
            verified_at: verdict.verified_at,
            outcome: verdict.outcome,
            distance_meters: verdict.geofence.distance_meters,
            trust_status: verdict.trust.as_ref().map(|trust| trust.status),
            reasons: verdict
                .trust
                .as_ref()
                .map(|trust| trust.reasons.clone())
                .unwrap_or_default(),
            sample_count: verdict
                .trust
                .as_ref()
                .map(|trust| trust.evidence.window.len())
                .unwrap_or(0),
            total_ms,
        });

        if state.recent.len() > MAX_RECENT_VERDICTS {
            state.recent.remove(0);
        }
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let state = self.inner.lock().await;
        MetricsSnapshot {
            outcomes: state.outcomes.clone(),
            reasons: state.reasons.clone(),
            degraded_count: state.degraded_count,
            recent: state.recent.clone(),
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        *state = MetricsState::default();
    }
}

impl Default for VerificationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for VerificationMetrics {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
