//! End-to-end checks through the public entry points.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use geoattend::geo::distance_meters;
use geoattend::sensors::{
    spawn_replay, PermissionStatus, RecordedEvent, Rotation, SensorSample, StaticPermission,
    Vector3,
};
use geoattend::{
    classify_spoofing, collect_sensor_window, evaluate_geofence, verify_attendance,
    AttendanceOutcome, AttendanceVerifier, Coordinate, GeofenceDefinition, LocationReading,
    ReasonCode, Result, SampleWindow, SensorConfig, SensorEvent, SensorHub, SensorSampler,
    TrustStatus, VerificationMetrics, WindowCollector,
};

const M_PER_DEG_LAT: f64 = 111_194.93;

fn office() -> Coordinate {
    Coordinate::new(52.3676, 4.9041).unwrap()
}

fn fence(radius_meters: f64) -> GeofenceDefinition {
    GeofenceDefinition::new(office(), radius_meters).unwrap()
}

fn reading_north(meters: f64, accuracy_meters: f64) -> LocationReading {
    let center = office();
    LocationReading::new(
        Coordinate::new(center.latitude + meters / M_PER_DEG_LAT, center.longitude).unwrap(),
        accuracy_meters,
        Utc::now(),
    )
    .unwrap()
}

/// Counts calls and hands back an empty window.
#[derive(Clone, Default)]
struct CountingCollector {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl WindowCollector for CountingCollector {
    fn is_supported(&self) -> bool {
        true
    }

    async fn collect(
        &self,
        duration_ms: u64,
        sample_rate_hz: f64,
        _cancel: CancellationToken,
    ) -> Result<SampleWindow> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SampleWindow::empty(duration_ms, sample_rate_hz))
    }
}

/// A handheld device: small, continuously changing motion on every source.
fn handheld_trace(duration_ms: u64, every_ms: u64) -> Vec<RecordedEvent> {
    let mut events = Vec::new();
    let mut offset_ms = every_ms;
    while offset_ms <= duration_ms {
        let t = offset_ms as f64 / 1000.0;
        events.push(RecordedEvent {
            offset_ms,
            event: SensorEvent::Motion {
                acceleration: Some(Vector3::new(0.02 * t.sin(), 0.01 * t.cos(), 0.03)),
                acceleration_with_gravity: Some(Vector3::new(
                    0.02 * t.sin(),
                    0.01,
                    9.80 + t / 100.0,
                )),
            },
        });
        events.push(RecordedEvent {
            offset_ms,
            event: SensorEvent::RotationRate(Rotation::new(t, -t / 2.0, 0.1)),
        });
        events.push(RecordedEvent {
            offset_ms,
            event: SensorEvent::Orientation(Rotation::new(90.0 + t, 10.0, -3.0)),
        });
        offset_ms += every_ms;
    }
    events
}

#[test]
fn distance_properties_hold() {
    let a = office();
    let b = Coordinate::new(a.latitude + 0.0009, a.longitude).unwrap();

    assert_eq!(distance_meters(a, a), 0.0);
    assert!((distance_meters(a, b) - distance_meters(b, a)).abs() < 1e-9);
    let d = distance_meters(a, b);
    assert!(d > 95.0 && d < 115.0, "got {d}");
}

#[test]
fn geofence_boundary_and_accuracy_cap() {
    let radius = 40.0;

    let exact_fix_on_edge = reading_north(radius, 0.0);
    assert!(evaluate_geofence(&exact_fix_on_edge, &fence(radius)).within_fence);

    let inflated_accuracy = reading_north(radius + 26.0, 100.0);
    let verdict = evaluate_geofence(&inflated_accuracy, &fence(radius));
    assert!(!verdict.within_fence);
    assert!((verdict.allowed_distance_meters - (radius + 25.0)).abs() < 1e-9);
}

#[test]
fn frozen_feed_with_perfect_fix_is_rejected() {
    let frozen = SensorSample {
        timestamp_ms: 0,
        acceleration: Some(Vector3::new(0.0, 0.0, 0.0)),
        acceleration_with_gravity: Some(Vector3::new(0.0, 0.0, 9.81)),
        rotation_rate: Some(Rotation::new(0.0, 0.0, 0.0)),
        orientation: Some(Rotation::new(45.0, 0.0, 0.0)),
    };
    let samples = (0..12)
        .map(|i| SensorSample {
            timestamp_ms: i * 100,
            ..frozen
        })
        .collect();
    let window = SampleWindow::from_samples(samples, 1200, 10.0);

    let honest = classify_spoofing(&window, &reading_north(3.0, 8.0));
    assert_eq!(honest.status, TrustStatus::Suspicious);
    assert_eq!(honest.reasons, vec![ReasonCode::FrozenSensorStream]);

    let spoofed = classify_spoofing(&window, &reading_north(3.0, 0.1));
    assert_eq!(spoofed.status, TrustStatus::Rejected);
    assert!(spoofed.has_reason(ReasonCode::FrozenSensorStream));
    assert!(spoofed.has_reason(ReasonCode::ImplausibleAccuracy));
    assert!(spoofed.has_reason(ReasonCode::MultipleAnomalies));
}

#[test]
fn empty_window_is_never_clean() {
    let verdict = classify_spoofing(&SampleWindow::empty(3000, 10.0), &reading_north(0.0, 6.0));
    assert_eq!(verdict.status, TrustStatus::Suspicious);
    assert_eq!(verdict.reasons, vec![ReasonCode::SensorDataUnavailable]);
}

#[tokio::test]
async fn inside_with_sensors_disabled_is_present() {
    let collector = CountingCollector::default();
    let calls = Arc::clone(&collector.calls);

    let verdict = verify_attendance(
        &reading_north(5.0, 10.0),
        &fence(15.0),
        SensorConfig::Disabled,
        collector,
    )
    .await
    .unwrap();

    assert_eq!(verdict.outcome, AttendanceOutcome::Present);
    assert!(verdict.trust.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn outside_fence_skips_collection() {
    let collector = CountingCollector::default();
    let calls = Arc::clone(&collector.calls);

    let verdict = verify_attendance(
        &reading_north(50.0, 5.0),
        &fence(15.0),
        SensorConfig::enabled(3000, 10.0),
        collector,
    )
    .await
    .unwrap();

    assert_eq!(verdict.outcome, AttendanceOutcome::OutsideFence);
    assert!(verdict.trust.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_halfway_seals_partial_window_and_releases_listeners() {
    let hub = SensorHub::builder()
        .all_sources()
        .permission(StaticPermission(PermissionStatus::Granted))
        .build();
    let replay = spawn_replay(hub.clone(), handheld_trace(2000, 25));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        trigger.cancel();
    });

    let window = collect_sensor_window(hub.clone(), 2000, 10.0, cancel)
        .await
        .unwrap();

    assert!(window.was_cancelled());
    assert!(!window.is_empty());
    assert!(window.samples().iter().all(|s| s.timestamp_ms <= 1000));
    assert_eq!(hub.total_listeners(), 0);
    assert_eq!(hub.permission_requests(), 1);
    replay.abort();
}

#[tokio::test(start_paused = true)]
async fn handheld_device_checks_in_clean() {
    let hub = SensorHub::builder().all_sources().build();
    let metrics = VerificationMetrics::new();
    let verifier =
        AttendanceVerifier::new(SensorSampler::new(hub.clone())).with_metrics(metrics.clone());
    let replay = spawn_replay(hub.clone(), handheld_trace(3000, 20));

    let verdict = verifier
        .verify(
            &reading_north(8.0, 6.0),
            &fence(15.0),
            SensorConfig::enabled(2000, 10.0),
        )
        .await
        .unwrap();

    let trust = verdict.trust.as_ref().unwrap();
    assert_eq!(verdict.outcome, AttendanceOutcome::Present);
    assert_eq!(trust.status, TrustStatus::Clean);
    assert!(trust.reasons.is_empty());
    assert_eq!(trust.evidence.window.len(), 20);
    assert_eq!(hub.total_listeners(), 0);

    let snapshot = metrics.get_snapshot().await;
    assert_eq!(snapshot.outcomes.present, 1);
    assert_eq!(snapshot.recent[0].sample_count, 20);
    replay.abort();
}

#[tokio::test(start_paused = true)]
async fn overlapping_checkins_share_one_platform_stream() {
    let hub = SensorHub::builder().all_sources().build();
    let replay = spawn_replay(hub.clone(), handheld_trace(3000, 20));

    let first = AttendanceVerifier::new(SensorSampler::new(hub.clone()));
    let second = AttendanceVerifier::new(SensorSampler::new(hub.clone()));
    let reading = reading_north(2.0, 5.0);
    let fence = fence(20.0);

    let (a, b) = tokio::join!(
        first.verify(&reading, &fence, SensorConfig::enabled(1000, 10.0)),
        second.verify(&reading, &fence, SensorConfig::enabled(2000, 5.0)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.trust.as_ref().unwrap().evidence.window.len(), 10);
    assert_eq!(b.trust.as_ref().unwrap().evidence.window.len(), 10);
    assert_ne!(a.verification_id, b.verification_id);
    assert_eq!(hub.total_listeners(), 0);
    assert_eq!(hub.permission_requests(), 2);
    replay.abort();
}
