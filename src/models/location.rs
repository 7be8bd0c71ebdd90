//! Location inputs: coordinates, device fixes and session geofences.
//!
//! Readings come from the geolocation collaborator and fences from the session
//! service; this crate only validates and reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VerificationError};

/// A WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Checks latitude ∈ [-90, 90] and longitude ∈ [-180, 180].
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(VerificationError::invalid_reading(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(VerificationError::invalid_reading(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// A single fix delivered by the geolocation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReading {
    pub coordinate: Coordinate,
    /// Reported horizontal accuracy radius in meters. Zero means the provider
    /// claims an exact fix.
    pub accuracy_meters: f64,
    pub captured_at: DateTime<Utc>,
}

impl LocationReading {
    pub fn new(
        coordinate: Coordinate,
        accuracy_meters: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<Self> {
        let reading = Self {
            coordinate,
            accuracy_meters,
            captured_at,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Rejects out-of-range coordinates and negative or non-finite accuracy.
    ///
    /// Readings deserialized from the wire bypass [`LocationReading::new`], so the
    /// verifier calls this before any evaluation.
    pub fn validate(&self) -> Result<()> {
        self.coordinate.validate()?;
        if !self.accuracy_meters.is_finite() {
            return Err(VerificationError::invalid_reading(
                "accuracy is missing or not finite",
            ));
        }
        if self.accuracy_meters < 0.0 {
            return Err(VerificationError::invalid_reading(format!(
                "accuracy {} is negative",
                self.accuracy_meters
            )));
        }
        Ok(())
    }
}

/// Circular attendance boundary attached to a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceDefinition {
    pub center: Coordinate,
    pub radius_meters: f64,
}

impl GeofenceDefinition {
    pub fn new(center: Coordinate, radius_meters: f64) -> Result<Self> {
        let fence = Self {
            center,
            radius_meters,
        };
        fence.validate()?;
        Ok(fence)
    }

    pub fn validate(&self) -> Result<()> {
        self.center
            .validate()
            .map_err(|err| VerificationError::invalid_geofence(err.to_string()))?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(VerificationError::invalid_geofence(format!(
                "radius {} must be a positive distance",
                self.radius_meters
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_ranges() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.0001, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_reading_rejects_negative_accuracy() {
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        let err = LocationReading::new(origin, -1.0, Utc::now()).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidReading { .. }));

        let err = LocationReading::new(origin, f64::NAN, Utc::now()).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidReading { .. }));

        assert!(LocationReading::new(origin, 0.0, Utc::now()).is_ok());
    }

    #[test]
    fn test_geofence_requires_positive_radius() {
        let center = Coordinate::new(10.0, 10.0).unwrap();
        assert!(GeofenceDefinition::new(center, 15.0).is_ok());
        assert!(matches!(
            GeofenceDefinition::new(center, 0.0),
            Err(VerificationError::InvalidGeofence { .. })
        ));
        assert!(GeofenceDefinition::new(center, -3.0).is_err());
    }

    #[test]
    fn test_reading_wire_format_is_camel_case() {
        let json = r#"{
            "coordinate": { "latitude": 51.5, "longitude": -0.12 },
            "accuracyMeters": 8.0,
            "capturedAt": "2026-03-01T09:00:00Z"
        }"#;
        let reading: LocationReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.accuracy_meters, 8.0);
        assert!(reading.validate().is_ok());
    }
}
