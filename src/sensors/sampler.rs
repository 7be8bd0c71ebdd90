//! Timer-driven sensor window collection.
//!
//! One call to [`SensorSampler::collect`] owns its subscriptions and its
//! accumulator; nothing is shared between concurrent collections except the
//! provider, which fans events out. Subscriptions are RAII guards, so every exit
//! path (completion, cancellation, the future being dropped) releases them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::window::{EndReason, SampleWindow, SensorSample, WindowRecorder};
use super::{
    PermissionStatus, Rotation, SensorAccess, SensorEvent, SensorProvider, SensorSource,
    Subscription, Vector3,
};
use crate::error::{Result, SensorError, VerificationError};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const DEFAULT_MAX_SAMPLE_RATE_HZ: f64 = 100.0;
pub const DEFAULT_MAX_DURATION_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerConfig {
    /// Requested rates above this are clamped
    pub max_sample_rate_hz: f64,

    /// Requested durations above this are clamped
    pub max_duration_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_sample_rate_hz: DEFAULT_MAX_SAMPLE_RATE_HZ,
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.max_sample_rate_hz.is_finite() || self.max_sample_rate_hz <= 0.0 {
            return Err(VerificationError::invalid_config(format!(
                "max sample rate {} must be a positive frequency",
                self.max_sample_rate_hz
            )));
        }
        if self.max_duration_ms == 0 {
            return Err(VerificationError::invalid_config(
                "max duration must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Anything that can produce a sealed sample window on demand.
///
/// The verifier depends on this rather than on [`SensorSampler`] directly.
#[async_trait]
pub trait WindowCollector: Send + Sync {
    fn is_supported(&self) -> bool;

    async fn collect(
        &self,
        duration_ms: u64,
        sample_rate_hz: f64,
        cancel: CancellationToken,
    ) -> Result<SampleWindow>;
}

/// Latest value seen per field, owned by exactly one in-flight collection.
#[derive(Debug, Default)]
struct LatestReadings {
    acceleration: Option<Vector3>,
    acceleration_with_gravity: Option<Vector3>,
    rotation_rate: Option<Rotation>,
    orientation: Option<Rotation>,
}

impl LatestReadings {
    fn apply(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Motion {
                acceleration,
                acceleration_with_gravity,
            } => {
                // A motion callback may omit one of the two vectors; keep the last known.
                if acceleration.is_some() {
                    self.acceleration = acceleration;
                }
                if acceleration_with_gravity.is_some() {
                    self.acceleration_with_gravity = acceleration_with_gravity;
                }
            }
            SensorEvent::RotationRate(rate) => self.rotation_rate = Some(rate),
            SensorEvent::Orientation(orientation) => self.orientation = Some(orientation),
        }
    }

    fn snapshot(&self, timestamp_ms: u64) -> SensorSample {
        SensorSample {
            timestamp_ms,
            acceleration: self.acceleration,
            acceleration_with_gravity: self.acceleration_with_gravity,
            rotation_rate: self.rotation_rate,
            orientation: self.orientation,
        }
    }
}

/// Subscriptions held by one collection, indexed by source.
#[derive(Default)]
struct ActiveSources {
    motion: Option<Subscription>,
    rotation_rate: Option<Subscription>,
    orientation: Option<Subscription>,
}

impl ActiveSources {
    fn insert(&mut self, subscription: Subscription) {
        match subscription.source() {
            SensorSource::Motion => self.motion = Some(subscription),
            SensorSource::RotationRate => self.rotation_rate = Some(subscription),
            SensorSource::Orientation => self.orientation = Some(subscription),
        }
    }

    fn sources(&self) -> Vec<SensorSource> {
        [&self.motion, &self.rotation_rate, &self.orientation]
            .into_iter()
            .flatten()
            .map(Subscription::source)
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.motion.is_none() && self.rotation_rate.is_none() && self.orientation.is_none()
    }

    fn release_all(&mut self) {
        self.motion = None;
        self.rotation_rate = None;
        self.orientation = None;
    }
}

/// Waits on an optional subscription; never resolves when it is absent.
async fn next_event(subscription: &mut Option<Subscription>) -> Option<SensorEvent> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

pub struct SensorSampler<P> {
    provider: P,
    config: SamplerConfig,
}

impl<P: SensorProvider> SensorSampler<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, SamplerConfig::default())
    }

    pub fn with_config(provider: P, config: SamplerConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Collects one window of `duration_ms` at `sample_rate_hz`.
    ///
    /// Suspends for at most `duration_ms` regardless of sensor liveness, and
    /// that bound includes waiting on the permission prompt. Cancelling `cancel`
    /// seals the samples gathered so far. A platform with no usable source
    /// yields an empty completed window; a refused permission prompt yields
    /// [`SensorError::PermissionDenied`].
    pub async fn collect(
        &self,
        duration_ms: u64,
        sample_rate_hz: f64,
        cancel: CancellationToken,
    ) -> Result<SampleWindow> {
        let (duration_ms, sample_rate_hz) = self.effective_request(duration_ms, sample_rate_hz)?;
        let start = Instant::now();
        let deadline = start + Duration::from_millis(duration_ms);

        if !self.provider.is_supported() {
            log_info!("sensor platform unsupported, sealing empty window");
            return Ok(WindowRecorder::new(duration_ms, sample_rate_hz, Vec::new())
                .seal(EndReason::Completed, 0));
        }

        let permission = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log_info!("sensor collection cancelled while awaiting permission");
                return Ok(WindowRecorder::new(duration_ms, sample_rate_hz, Vec::new())
                    .seal(EndReason::Cancelled, elapsed_ms(start, duration_ms)));
            }
            _ = time::sleep_until(deadline) => {
                log_warn!(
                    "permission prompt unanswered after {}ms, sealing empty window",
                    duration_ms
                );
                return Ok(WindowRecorder::new(duration_ms, sample_rate_hz, Vec::new())
                    .seal(EndReason::Completed, duration_ms));
            }
            status = self.provider.request_permission() => status,
        };

        if permission == PermissionStatus::Denied {
            log_warn!("sensor permission denied");
            return Err(SensorError::PermissionDenied.into());
        }

        let mut active = ActiveSources::default();
        let mut denied = 0usize;
        for source in SensorSource::ALL {
            match self.provider.subscribe(source) {
                SensorAccess::Granted(subscription) => active.insert(subscription),
                SensorAccess::Unavailable => {
                    log_info!("sensor source {} unavailable", source.as_str());
                }
                SensorAccess::Denied => {
                    log_warn!("sensor source {} denied", source.as_str());
                    denied += 1;
                }
            }
        }

        if active.is_empty() {
            if denied > 0 {
                return Err(SensorError::PermissionDenied.into());
            }
            log_info!("no sensor source available, sealing empty window");
            return Ok(WindowRecorder::new(duration_ms, sample_rate_hz, Vec::new())
                .seal(EndReason::Completed, 0));
        }

        let recorder = WindowRecorder::new(duration_ms, sample_rate_hz, active.sources());
        let window = run_window(recorder, &mut active, start, sample_rate_hz, &cancel).await;
        active.release_all();

        log_info!(
            "sensor window sealed: {} samples over {}ms ({:?})",
            window.len(),
            window.elapsed_ms(),
            window.end_reason()
        );
        Ok(window)
    }

    fn effective_request(&self, duration_ms: u64, sample_rate_hz: f64) -> Result<(u64, f64)> {
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

        self.config.validate()?;

        let mut duration_ms = duration_ms;
        if duration_ms > self.config.max_duration_ms {
            log_warn!(
                "requested {}ms collection clamped to {}ms",
                duration_ms,
                self.config.max_duration_ms
            );
            duration_ms = self.config.max_duration_ms;
        }

        let mut sample_rate_hz = sample_rate_hz;
        if sample_rate_hz > self.config.max_sample_rate_hz {
            log_warn!(
                "requested {}Hz sampling clamped to {}Hz",
                sample_rate_hz,
                self.config.max_sample_rate_hz
            );
            sample_rate_hz = self.config.max_sample_rate_hz;
        }

        Ok((duration_ms, sample_rate_hz))
    }
}

/// Milliseconds since `start`, capped at the window length.
fn elapsed_ms(start: Instant, duration_ms: u64) -> u64 {
    (start.elapsed().as_millis() as u64).min(duration_ms)
}

/// Offset of tick `k` (1-based) from window start.
///
/// Computed from `k` directly rather than by adding a rounded period, so the
/// last tick of a window lands on or before the deadline at any rate.
fn tick_offset(k: usize, sample_rate_hz: f64, duration: Duration) -> Duration {
    let nanos = (k as f64 * 1e9 / sample_rate_hz).round();
    Duration::from_nanos(nanos as u64).min(duration)
}

/// The tick loop. Returns once the deadline passes or `cancel` fires.
///
/// Ticks already in the past when the loop starts (time spent on the
/// permission prompt) are skipped rather than replayed.
async fn run_window(
    mut recorder: WindowRecorder,
    active: &mut ActiveSources,
    start: Instant,
    sample_rate_hz: f64,
    cancel: &CancellationToken,
) -> SampleWindow {
    let duration_ms = recorder.duration_ms();
    let duration = Duration::from_millis(duration_ms);
    let ticks = recorder.capacity();

    let now = Instant::now();
    let mut next_tick = 1;
    while next_tick <= ticks && start + tick_offset(next_tick, sample_rate_hz, duration) < now {
        next_tick += 1;
    }

    let tick = time::sleep_until(start + tick_offset(next_tick, sample_rate_hz, duration));
    tokio::pin!(tick);
    let expiry = time::sleep_until(start + duration);
    tokio::pin!(expiry);

    let mut latest = LatestReadings::default();

    let end_reason = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log_info!("sensor collection cancelled after {}ms", start.elapsed().as_millis());
                break EndReason::Cancelled;
            }
            _ = &mut tick, if next_tick <= ticks => {
                let offset = tick_offset(next_tick, sample_rate_hz, duration);
                let timestamp_ms = offset.as_millis() as u64;
                if !recorder.push(latest.snapshot(timestamp_ms)) {
                    log_debug!("window full at {}ms, dropping tick", timestamp_ms);
                }
                next_tick += 1;
                if next_tick <= ticks {
                    tick.as_mut()
                        .reset(start + tick_offset(next_tick, sample_rate_hz, duration));
                }
            }
            _ = &mut expiry => {
                break EndReason::Completed;
            }
            event = next_event(&mut active.motion) => match event {
                Some(event) => latest.apply(event),
                None => active.motion = None,
            },
            event = next_event(&mut active.rotation_rate) => match event {
                Some(event) => latest.apply(event),
                None => active.rotation_rate = None,
            },
            event = next_event(&mut active.orientation) => match event {
                Some(event) => latest.apply(event),
                None => active.orientation = None,
            },
        }
    };

    recorder.seal(end_reason, elapsed_ms(start, duration_ms))
}

#[async_trait]
impl<P: SensorProvider> WindowCollector for SensorSampler<P> {
    fn is_supported(&self) -> bool {
        self.provider.is_supported()
    }

    async fn collect(
        &self,
        duration_ms: u64,
        sample_rate_hz: f64,
        cancel: CancellationToken,
    ) -> Result<SampleWindow> {
        SensorSampler::collect(self, duration_ms, sample_rate_hz, cancel).await
    }
}
