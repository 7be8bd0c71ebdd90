//! Error taxonomy for the verification core.
//!
//! Only malformed input is a hard failure. Sensor permission and support
//! problems are carried as [`SensorError`] so the verifier can degrade to
//! geofence-only verification. Cancelling a collection is not an error at all:
//! the window comes back sealed with `EndReason::Cancelled`.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The user refused the runtime permission prompt.
    #[error("sensor permission denied")]
    PermissionDenied,
    /// The platform exposes no motion/orientation sensor API.
    #[error("sensors unsupported on this platform")]
    SensorUnsupported,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerificationError {
    #[error("invalid location reading: {reason}")]
    InvalidReading { reason: String },

    #[error("invalid geofence: {reason}")]
    InvalidGeofence { reason: String },

    #[error("invalid sensor configuration: {reason}")]
    InvalidSensorConfig { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Sensor(#[from] SensorError),
}

impl VerificationError {
    pub(crate) fn invalid_reading(reason: impl Into<String>) -> Self {
        Self::InvalidReading {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_geofence(reason: impl Into<String>) -> Self {
        Self::InvalidGeofence {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_sensor_config(reason: impl Into<String>) -> Self {
        Self::InvalidSensorConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// True for errors the verifier absorbs into a geofence-only verdict.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Sensor(_))
    }
}

pub type Result<T, E = VerificationError> = std::result::Result<T, E>;
