//! Motion and orientation sensing behind an injected capability provider.
//!
//! Platform glue (browser event listeners, mobile sensor managers) lives outside
//! this crate. It reaches the core through [`SensorProvider`]: one permission
//! prompt per collection, then one [`Subscription`] per source that either
//! streams events, is unavailable, or was denied.

pub mod hub;
pub mod replay;
pub mod sampler;
pub mod window;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use hub::{
    PermissionGate, PlatformListener, SensorHub, SensorHubBuilder, StaticPermission,
};
pub use replay::{spawn_replay, RecordedEvent};
pub use sampler::{SamplerConfig, SensorSampler};
pub use window::{EndReason, SampleWindow, SensorSample, WindowRecorder};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// One independently available capability on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SensorSource {
    /// Linear acceleration and acceleration including gravity.
    Motion,
    RotationRate,
    /// Absolute (compass-referenced) orientation.
    Orientation,
}

impl SensorSource {
    pub const ALL: [SensorSource; 3] = [
        SensorSource::Motion,
        SensorSource::RotationRate,
        SensorSource::Orientation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorSource::Motion => "motion",
            SensorSource::RotationRate => "rotationRate",
            SensorSource::Orientation => "orientation",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            SensorSource::Motion => 0,
            SensorSource::RotationRate => 1,
            SensorSource::Orientation => 2,
        }
    }
}

/// Three-axis acceleration in m/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Exact bit pattern, so `-0.0` and `0.0` differ and NaN payloads compare.
    pub fn to_bits(&self) -> [u64; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits()]
    }
}

/// Euler angles in degrees (orientation) or degrees per second (rotation rate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Rotation {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self { alpha, beta, gamma }
    }

    pub fn to_bits(&self) -> [u64; 3] {
        [self.alpha.to_bits(), self.beta.to_bits(), self.gamma.to_bits()]
    }
}

/// A single platform sensor callback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SensorEvent {
    #[serde(rename_all = "camelCase")]
    Motion {
        acceleration: Option<Vector3>,
        acceleration_with_gravity: Option<Vector3>,
    },
    RotationRate(Rotation),
    Orientation(Rotation),
}

impl SensorEvent {
    pub fn source(&self) -> SensorSource {
        match self {
            SensorEvent::Motion { .. } => SensorSource::Motion,
            SensorEvent::RotationRate(_) => SensorSource::RotationRate,
            SensorEvent::Orientation(_) => SensorSource::Orientation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The platform does not gate sensors behind a prompt.
    NotRequired,
}

/// Outcome of subscribing to one source.
pub enum SensorAccess {
    Granted(Subscription),
    Unavailable,
    Denied,
}

impl std::fmt::Debug for SensorAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorAccess::Granted(sub) => f.debug_tuple("Granted").field(&sub.source).finish(),
            SensorAccess::Unavailable => f.write_str("Unavailable"),
            SensorAccess::Denied => f.write_str("Denied"),
        }
    }
}

/// Platform capability interface consumed by the sampler.
#[async_trait]
pub trait SensorProvider: Send + Sync {
    /// Whether the platform exposes any motion/orientation API at all.
    fn is_supported(&self) -> bool;

    /// Runtime permission prompt. The sampler calls this once per collection.
    async fn request_permission(&self) -> PermissionStatus;

    fn subscribe(&self, source: SensorSource) -> SensorAccess;
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A live listener on one source. Dropping it releases the listener.
pub struct Subscription {
    source: SensorSource,
    events: broadcast::Receiver<SensorEvent>,
    release: Option<ReleaseHook>,
}

impl Subscription {
    pub fn new(
        source: SensorSource,
        events: broadcast::Receiver<SensorEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            source,
            events,
            release: Some(Box::new(release)),
        }
    }

    pub fn source(&self) -> SensorSource {
        self.source
    }

    /// Next event, or `None` once the source has shut down.
    ///
    /// Only the latest value per source matters to a window, so a lagging
    /// receiver skips ahead instead of failing.
    pub async fn recv(&mut self) -> Option<SensorEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log_debug!(
                        "{} subscriber lagged, skipped {skipped} events",
                        self.source.as_str()
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscription_drop_runs_release_hook() {
        let (_tx, rx) = broadcast::channel(4);
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let sub = Subscription::new(SensorSource::Orientation, rx, move || {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(!released.load(Ordering::SeqCst));
        drop(sub);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_subscription_skips_lag_and_ends_on_close() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = Subscription::new(SensorSource::RotationRate, rx, || {});
        for i in 0..5 {
            tx.send(SensorEvent::RotationRate(Rotation::new(i as f64, 0.0, 0.0)))
                .unwrap();
        }
        drop(tx);

        let first = sub.recv().await;
        assert_eq!(
            first,
            Some(SensorEvent::RotationRate(Rotation::new(3.0, 0.0, 0.0)))
        );
        assert!(sub.recv().await.is_some());
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_event_wire_format() {
        let json = r#"{
            "kind": "motion",
            "acceleration": {"x": 0.1, "y": 0.0, "z": -0.2},
            "accelerationWithGravity": null
        }"#;
        let event: SensorEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.source(), SensorSource::Motion);

        let json = r#"{"kind":"orientation","alpha":120.0,"beta":4.5,"gamma":-2.0}"#;
        let event: SensorEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, SensorEvent::Orientation(Rotation::new(120.0, 4.5, -2.0)));
    }
}
