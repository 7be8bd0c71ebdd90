//! Replays a recorded check-in and prints the verdict as JSON.
//!
//! Usage:
//!   geoattend-verify request.json
//!   geoattend-verify request.json --settings settings.json --pretty
//!   geoattend-verify request.json --cancel-after-ms 1500
//!
//! The request carries the location fix, the session fence, the sensor mode
//! and a device profile with the sensor trace to replay on the tokio clock.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use geoattend::sensors::{spawn_replay, PermissionStatus, RecordedEvent, StaticPermission};
use geoattend::{
    init_logging, AttendanceVerdict, AttendanceVerifier, GeofenceDefinition, LocationReading,
    MetricsSnapshot, SensorConfig, SensorHub, SensorSampler, SensorSource, SettingsStore,
    VerificationMetrics, VerificationSettings,
};

#[derive(Parser)]
#[command(name = "geoattend-verify")]
#[command(about = "Verify a recorded attendance check-in")]
struct Args {
    /// Path to the check-in request JSON
    request: PathBuf,

    /// Settings file with geofence, classifier and sampler tuning
    #[arg(short = 's', long)]
    settings: Option<PathBuf>,

    /// Cancel sensor collection after this many milliseconds
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// Include the metrics snapshot in the output
    #[arg(long)]
    metrics: bool,

    /// Pretty-print the output
    #[arg(short = 'p', long)]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckInRequest {
    reading: LocationReading,
    fence: GeofenceDefinition,
    #[serde(default)]
    sensors: SensorConfig,
    #[serde(default)]
    device: DeviceProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DeviceProfile {
    supported: bool,
    sources: Vec<SensorSource>,
    denied: Vec<SensorSource>,
    permission: PermissionStatus,
    events: Vec<RecordedEvent>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            supported: true,
            sources: SensorSource::ALL.to_vec(),
            denied: Vec::new(),
            permission: PermissionStatus::NotRequired,
            events: Vec::new(),
        }
    }
}

impl DeviceProfile {
    fn build_hub(&self) -> SensorHub {
        let mut builder = SensorHub::builder().permission(StaticPermission(self.permission));
        if !self.supported {
            builder = builder.unsupported();
        }
        for source in &self.sources {
            builder = builder.source(*source);
        }
        for source in &self.denied {
            builder = builder.deny_source(*source);
        }
        builder.build()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    verdict: AttendanceVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<MetricsSnapshot>,
}

fn load_settings(path: Option<PathBuf>) -> Result<VerificationSettings> {
    match path {
        Some(path) => Ok(SettingsStore::new(path)?.settings()),
        None => Ok(VerificationSettings::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let raw = fs::read_to_string(&args.request)
        .with_context(|| format!("Failed to read request {}", args.request.display()))?;
    let request: CheckInRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed request in {}", args.request.display()))?;
    let settings = load_settings(args.settings)?;

    let hub = request.device.build_hub();
    let sampler = SensorSampler::with_config(hub.clone(), settings.sampler);
    let metrics = VerificationMetrics::new();
    let verifier = AttendanceVerifier::with_config(sampler, settings.verifier_config())
        .with_metrics(metrics.clone());

    let cancel = CancellationToken::new();
    if let Some(after_ms) = args.cancel_after_ms {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            cancel.cancel();
        });
    }

    let replay = spawn_replay(hub, request.device.events);
    let verdict = verifier
        .verify_with_cancel(&request.reading, &request.fence, request.sensors, cancel)
        .await?;
    replay.abort();

    let report = Report {
        verdict,
        metrics: if args.metrics {
            Some(metrics.get_snapshot().await)
        } else {
            None
        },
    };
    let output = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");
    Ok(())
}
