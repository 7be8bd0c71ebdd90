pub mod location;
pub mod verdict;

pub use location::{Coordinate, GeofenceDefinition, LocationReading};
pub use verdict::{
    AttendanceOutcome, AttendanceVerdict, DegradedMode, Evidence, GeofenceVerdict, ReasonCode,
    TrustStatus, TrustVerdict,
};
