//! Persisted verification tuning.
//!
//! Stored as one JSON document. A missing or unreadable file falls back to
//! defaults so a bad edit never blocks check-ins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::error::Result as VerificationResult;
use crate::geofence::GeofenceConfig;
use crate::sensors::SamplerConfig;
use crate::spoofing::ClassifierConfig;
use crate::verifier::VerifierConfig;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationSettings {
    pub geofence: GeofenceConfig,
    pub classifier: ClassifierConfig,
    pub sampler: SamplerConfig,
    pub require_sensor_evidence: bool,
}

impl VerificationSettings {
    pub fn validate(&self) -> VerificationResult<()> {
        self.geofence.validate()?;
        self.classifier.validate()?;
        self.sampler.validate()
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            geofence: self.geofence,
            classifier: self.classifier,
            require_sensor_evidence: self.require_sensor_evidence,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<VerificationSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match parse_settings(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    log_warn!("ignoring settings at {}: {:#}", path.display(), err);
                    VerificationSettings::default()
                }
            }
        } else {
            VerificationSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> VerificationSettings {
        *self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        self.settings().verifier_config()
    }

    /// Rejects invalid tuning without touching the file or the cache.
    pub fn update(&self, settings: VerificationSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = self.persist(&settings) {
            log_error!("settings update not saved: {:#}", err);
            return Err(err);
        }
        *guard = settings;
        Ok(())
    }

    /// Re-reads the file. Unlike [`new`](Self::new), a malformed or invalid
    /// file is an error here and the in-memory settings are left untouched.
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data = parse_settings(&contents)
            .with_context(|| format!("Rejected settings in {}", self.path.display()))?;
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &VerificationSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn parse_settings(contents: &str) -> Result<VerificationSettings> {
    let settings: VerificationSettings = serde_json::from_str(contents)?;
    settings.validate()?;
    Ok(settings)
}
