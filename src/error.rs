use crate::entity::{EntityId, Timestamp, ValidationError};
use crate::geometry::GeometryError;
use std::fmt;

/// Errors returned by plan mutations and queries
///
/// Every failure reaches the immediate caller; a failed mutation leaves the
/// store unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    /// Malformed geometry or attribute
    Validation(ValidationError),
    /// Referenced id is not stored (or is not of the required kind)
    NotFound(EntityId),
    /// Reading timestamp earlier than the sensor's last recorded one
    InvalidReading {
        sensor_id: EntityId,
        timestamp: Timestamp,
        last: Timestamp,
    },
    /// Aggregate matched no sensor or no reading
    EmptySelection,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::Validation(e) => write!(f, "validation failed: {}", e),
            PlanError::NotFound(id) => write!(f, "entity {} not found", id),
            PlanError::InvalidReading {
                sensor_id,
                timestamp,
                last,
            } => write!(
                f,
                "reading at {} for sensor {} precedes last recorded timestamp {}",
                timestamp, sensor_id, last
            ),
            PlanError::EmptySelection => write!(f, "no sensor readings match the selection"),
        }
    }
}

impl std::error::Error for PlanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlanError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for PlanError {
    fn from(e: ValidationError) -> Self {
        PlanError::Validation(e)
    }
}

impl From<GeometryError> for PlanError {
    fn from(source: GeometryError) -> Self {
        PlanError::Validation(ValidationError::Geometry {
            field: "geometry",
            source,
        })
    }
}

pub type Result<T, E = PlanError> = std::result::Result<T, E>;
