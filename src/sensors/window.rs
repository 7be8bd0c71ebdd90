//! Sample windows: fixed-duration, fixed-rate series of sensor snapshots.
//!
//! A [`WindowRecorder`] is open while a collection runs and is consumed by
//! [`WindowRecorder::seal`]; the resulting [`SampleWindow`] has no mutators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Rotation, SensorSource, Vector3};

/// Snapshot of the most recent value from every source at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    /// Milliseconds since the window started.
    pub timestamp_ms: u64,
    pub acceleration: Option<Vector3>,
    pub acceleration_with_gravity: Option<Vector3>,
    pub rotation_rate: Option<Rotation>,
    pub orientation: Option<Rotation>,
}

impl SensorSample {
    pub fn empty(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }

    /// True when no source had delivered anything by this tick.
    pub fn is_empty(&self) -> bool {
        self.acceleration.is_none()
            && self.acceleration_with_gravity.is_none()
            && self.rotation_rate.is_none()
            && self.orientation.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The requested duration elapsed.
    Completed,
    /// The caller stopped collection early; samples so far are kept.
    Cancelled,
}

/// A sealed, immutable sample series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleWindow {
    started_at: DateTime<Utc>,
    duration_ms: u64,
    sample_rate_hz: f64,
    elapsed_ms: u64,
    end_reason: EndReason,
    sources: Vec<SensorSource>,
    samples: Vec<SensorSample>,
}

impl SampleWindow {
    /// Builds a completed window from already-recorded samples.
    ///
    /// Used for replays and offline re-classification. Samples are sorted by
    /// timestamp; the live sources are inferred from which fields appear.
    pub fn from_samples(
        mut samples: Vec<SensorSample>,
        duration_ms: u64,
        sample_rate_hz: f64,
    ) -> Self {
        samples.sort_by_key(|sample| sample.timestamp_ms);

        let mut sources = Vec::new();
        if samples
            .iter()
            .any(|s| s.acceleration.is_some() || s.acceleration_with_gravity.is_some())
        {
            sources.push(SensorSource::Motion);
        }
        if samples.iter().any(|s| s.rotation_rate.is_some()) {
            sources.push(SensorSource::RotationRate);
        }
        if samples.iter().any(|s| s.orientation.is_some()) {
            sources.push(SensorSource::Orientation);
        }

        Self {
            started_at: Utc::now(),
            duration_ms,
            sample_rate_hz,
            elapsed_ms: duration_ms,
            end_reason: EndReason::Completed,
            sources,
            samples,
        }
    }

    /// A completed window with nothing in it.
    pub fn empty(duration_ms: u64, sample_rate_hz: f64) -> Self {
        Self::from_samples(Vec::new(), duration_ms, sample_rate_hz)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Requested duration.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Time actually spent collecting before sealing.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn end_reason(&self) -> EndReason {
        self.end_reason
    }

    pub fn was_cancelled(&self) -> bool {
        self.end_reason == EndReason::Cancelled
    }

    /// Sources that were subscribed during collection.
    pub fn sources(&self) -> &[SensorSource] {
        &self.sources
    }

    pub fn samples(&self) -> &[SensorSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// No sample carries any sensor value (including the zero-sample case).
    pub fn has_no_motion_evidence(&self) -> bool {
        self.samples.iter().all(SensorSample::is_empty)
    }
}

/// Open window that a single collection appends to.
#[derive(Debug)]
pub struct WindowRecorder {
    started_at: DateTime<Utc>,
    duration_ms: u64,
    sample_rate_hz: f64,
    capacity: usize,
    sources: Vec<SensorSource>,
    samples: Vec<SensorSample>,
}

impl WindowRecorder {
    pub fn new(duration_ms: u64, sample_rate_hz: f64, sources: Vec<SensorSource>) -> Self {
        let capacity = expected_samples(duration_ms, sample_rate_hz);
        Self {
            started_at: Utc::now(),
            duration_ms,
            sample_rate_hz,
            capacity,
            sources,
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Appends a tick snapshot. Returns `false` once the window is full.
    pub fn push(&mut self, sample: SensorSample) -> bool {
        if self.samples.len() >= self.capacity {
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Most samples this window will accept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn seal(self, end_reason: EndReason, elapsed_ms: u64) -> SampleWindow {
        SampleWindow {
            started_at: self.started_at,
            duration_ms: self.duration_ms,
            sample_rate_hz: self.sample_rate_hz,
            elapsed_ms,
            end_reason,
            sources: self.sources,
            samples: self.samples,
        }
    }
}

/// Ticks that fit in `duration_ms` at `sample_rate_hz`.
pub fn expected_samples(duration_ms: u64, sample_rate_hz: f64) -> usize {
    // Epsilon keeps 1000ms at 3Hz from flooring 2.999… down to 2.
    ((duration_ms as f64 / 1000.0) * sample_rate_hz + 1e-9).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oriented(timestamp_ms: u64) -> SensorSample {
        SensorSample {
            timestamp_ms,
            orientation: Some(Rotation::new(90.0, 0.0, 0.0)),
            ..SensorSample::default()
        }
    }

    #[test]
    fn test_recorder_respects_capacity() {
        let mut recorder = WindowRecorder::new(1000, 5.0, vec![SensorSource::Orientation]);
        for i in 0..8 {
            recorder.push(oriented(i * 200));
        }
        assert_eq!(recorder.len(), 5);

        let window = recorder.seal(EndReason::Completed, 1000);
        assert_eq!(window.len(), 5);
        assert_eq!(window.end_reason(), EndReason::Completed);
        assert_eq!(window.sources(), &[SensorSource::Orientation]);
    }

    #[test]
    fn test_empty_window_has_no_motion_evidence() {
        let window = SampleWindow::empty(2000, 10.0);
        assert!(window.is_empty());
        assert!(window.has_no_motion_evidence());
        assert!(window.sources().is_empty());
    }

    #[test]
    fn test_from_samples_sorts_and_infers_sources() {
        let window = SampleWindow::from_samples(
            vec![oriented(300), SensorSample::empty(100), oriented(200)],
            1000,
            10.0,
        );
        let stamps: Vec<u64> = window.samples().iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
        assert_eq!(window.sources(), &[SensorSource::Orientation]);
        assert!(!window.has_no_motion_evidence());
    }

    #[test]
    fn test_expected_samples() {
        assert_eq!(expected_samples(1000, 20.0), 20);
        assert_eq!(expected_samples(1500, 4.0), 6);
        assert_eq!(expected_samples(100, 5.0), 0);
    }
}
