//! Fan-out provider over process-wide platform sensors.
//!
//! Platform sensor APIs are singletons, so concurrent collections cannot each
//! own the platform listener. The hub owns one broadcast channel per available
//! source; the platform glue publishes into it and every subscription gets its
//! own receiver. The platform listener is started on the first subscriber and
//! stopped when the last one is released.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    PermissionStatus, SensorAccess, SensorEvent, SensorProvider, SensorSource, Subscription,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Per-source channel depth. A collection keeps only the latest value, so
/// this only has to absorb bursts between two polls.
const CHANNEL_CAPACITY: usize = 64;

/// Runtime permission prompt collaborator.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request(&self) -> PermissionStatus;
}

/// Fixed answer, for platforms without prompts and for replays.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub PermissionStatus);

#[async_trait]
impl PermissionGate for StaticPermission {
    async fn request(&self) -> PermissionStatus {
        self.0
    }
}

/// Hooks into the platform's real listener registration.
pub trait PlatformListener: Send + Sync {
    fn start(&self, source: SensorSource);
    fn stop(&self, source: SensorSource);
}

struct HubInner {
    supported: bool,
    channels: [Option<broadcast::Sender<SensorEvent>>; 3],
    denied: [bool; 3],
    listeners: [AtomicUsize; 3],
    permission: Arc<dyn PermissionGate>,
    platform: Option<Arc<dyn PlatformListener>>,
    permission_requests: AtomicUsize,
}

impl HubInner {
    fn release(&self, source: SensorSource) {
        let previous = self.listeners[source.index()].fetch_sub(1, Ordering::SeqCst);
        log_debug!("released {} listener ({} left)", source.as_str(), previous - 1);
        if previous == 1 {
            if let Some(platform) = &self.platform {
                platform.stop(source);
            }
        }
    }
}

#[derive(Clone)]
pub struct SensorHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for SensorHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorHub")
            .field("supported", &self.inner.supported)
            .field("available", &self.available_sources())
            .field("active_listeners", &self.total_listeners())
            .finish()
    }
}

pub struct SensorHubBuilder {
    supported: bool,
    sources: Vec<SensorSource>,
    denied: Vec<SensorSource>,
    permission: Arc<dyn PermissionGate>,
    platform: Option<Arc<dyn PlatformListener>>,
}

impl SensorHubBuilder {
    /// Marks `source` as present on this device.
    pub fn source(mut self, source: SensorSource) -> Self {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
        self
    }

    pub fn all_sources(mut self) -> Self {
        self.sources = SensorSource::ALL.to_vec();
        self
    }

    /// Source exists but the platform refuses it individually.
    pub fn deny_source(mut self, source: SensorSource) -> Self {
        if !self.denied.contains(&source) {
            self.denied.push(source);
        }
        self
    }

    pub fn permission(mut self, gate: impl PermissionGate + 'static) -> Self {
        self.permission = Arc::new(gate);
        self
    }

    pub fn platform_listener(mut self, platform: impl PlatformListener + 'static) -> Self {
        self.platform = Some(Arc::new(platform));
        self
    }

    /// The platform has no sensor API whatsoever.
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn build(self) -> SensorHub {
        let mut channels: [Option<broadcast::Sender<SensorEvent>>; 3] = [None, None, None];
        let mut denied = [false; 3];
        if self.supported {
            for source in &self.sources {
                let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
                channels[source.index()] = Some(tx);
            }
            for source in &self.denied {
                denied[source.index()] = true;
            }
        }

        SensorHub {
            inner: Arc::new(HubInner {
                supported: self.supported,
                channels,
                denied,
                listeners: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
                permission: self.permission,
                platform: self.platform,
                permission_requests: AtomicUsize::new(0),
            }),
        }
    }
}

impl SensorHub {
    pub fn builder() -> SensorHubBuilder {
        SensorHubBuilder {
            supported: true,
            sources: Vec::new(),
            denied: Vec::new(),
            permission: Arc::new(StaticPermission(PermissionStatus::NotRequired)),
            platform: None,
        }
    }

    /// Delivers a platform callback to every live subscriber of its source.
    ///
    /// Returns how many subscribers received it. Events for unavailable sources
    /// are dropped.
    pub fn publish(&self, event: SensorEvent) -> usize {
        match &self.inner.channels[event.source().index()] {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn available_sources(&self) -> Vec<SensorSource> {
        SensorSource::ALL
            .into_iter()
            .filter(|source| self.inner.channels[source.index()].is_some())
            .collect()
    }

    /// Live subscriptions on `source` across all collections.
    pub fn active_listeners(&self, source: SensorSource) -> usize {
        self.inner.listeners[source.index()].load(Ordering::SeqCst)
    }

    pub fn total_listeners(&self) -> usize {
        SensorSource::ALL
            .iter()
            .map(|source| self.active_listeners(*source))
            .sum()
    }

    pub fn permission_requests(&self) -> usize {
        self.inner.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorProvider for SensorHub {
    fn is_supported(&self) -> bool {
        self.inner.supported
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.inner.permission_requests.fetch_add(1, Ordering::SeqCst);
        let status = self.inner.permission.request().await;
        log_info!("sensor permission request answered: {:?}", status);
        status
    }

    fn subscribe(&self, source: SensorSource) -> SensorAccess {
        let index = source.index();
        if self.inner.denied[index] {
            return SensorAccess::Denied;
        }
        let Some(tx) = &self.inner.channels[index] else {
            return SensorAccess::Unavailable;
        };

        let receiver = tx.subscribe();
        let previous = self.inner.listeners[index].fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            if let Some(platform) = &self.inner.platform {
                platform.start(source);
            }
        }
        log_debug!("subscribed to {} ({} listeners)", source.as_str(), previous + 1);

        let inner = Arc::clone(&self.inner);
        SensorAccess::Granted(Subscription::new(source, receiver, move || {
            inner.release(source)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::Rotation;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPlatform {
        calls: Mutex<Vec<(&'static str, SensorSource)>>,
    }

    impl PlatformListener for Arc<RecordingPlatform> {
        fn start(&self, source: SensorSource) {
            self.calls.lock().unwrap().push(("start", source));
        }

        fn stop(&self, source: SensorSource) {
            self.calls.lock().unwrap().push(("stop", source));
        }
    }

    fn granted(access: SensorAccess) -> Subscription {
        match access {
            SensorAccess::Granted(sub) => sub,
            other => panic!("expected a subscription, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_concurrent_subscribers() {
        let hub = SensorHub::builder().source(SensorSource::Orientation).build();
        let mut first = granted(hub.subscribe(SensorSource::Orientation));
        let mut second = granted(hub.subscribe(SensorSource::Orientation));
        assert_eq!(hub.active_listeners(SensorSource::Orientation), 2);

        let event = SensorEvent::Orientation(Rotation::new(10.0, 1.0, 2.0));
        assert_eq!(hub.publish(event), 2);
        assert_eq!(first.recv().await, Some(event));
        assert_eq!(second.recv().await, Some(event));
    }

    #[test]
    fn test_platform_listener_follows_first_and_last_subscriber() {
        let platform = Arc::new(RecordingPlatform::default());
        let hub = SensorHub::builder()
            .source(SensorSource::Motion)
            .platform_listener(platform.clone())
            .build();

        let a = granted(hub.subscribe(SensorSource::Motion));
        let b = granted(hub.subscribe(SensorSource::Motion));
        drop(a);
        assert_eq!(hub.active_listeners(SensorSource::Motion), 1);
        drop(b);
        assert_eq!(hub.total_listeners(), 0);

        let calls = platform.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![("start", SensorSource::Motion), ("stop", SensorSource::Motion)]
        );
    }

    #[test]
    fn test_missing_and_denied_sources() {
        let hub = SensorHub::builder()
            .source(SensorSource::Motion)
            .source(SensorSource::RotationRate)
            .deny_source(SensorSource::RotationRate)
            .build();

        assert!(matches!(
            hub.subscribe(SensorSource::Orientation),
            SensorAccess::Unavailable
        ));
        assert!(matches!(hub.subscribe(SensorSource::RotationRate), SensorAccess::Denied));
        assert_eq!(hub.total_listeners(), 0);
        assert_eq!(
            hub.publish(SensorEvent::Orientation(Rotation::new(0.0, 0.0, 0.0))),
            0
        );
    }

    #[test]
    fn test_unsupported_platform_has_no_sources() {
        let hub = SensorHub::builder().all_sources().unsupported().build();
        assert!(!hub.is_supported());
        assert!(hub.available_sources().is_empty());
    }
}
