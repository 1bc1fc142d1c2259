use super::{BuildingSpec, EntityId, Footprint, FootprintSpec, RoadSpec, Timestamp, ZoneSpec};
use crate::geometry::{Coordinate, GeometryError, GeometryKernel, Polygon};
use std::fmt;

/// Entity invariant violations reported by the `add_*` and update operations
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Geometry of the named field failed a kernel precondition
    Geometry {
        field: &'static str,
        source: GeometryError,
    },
    InvalidNumber {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    NoFloors,
    PathTooShort(usize),
    InvalidTimeWindow {
        start: Timestamp,
        end: Timestamp,
    },
    UnknownVariant {
        field: &'static str,
        value: String,
    },
    DuplicateId(EntityId),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Geometry { field, source } => write!(f, "{}: {}", field, source),
            ValidationError::InvalidNumber {
                field,
                value,
                expected,
            } => write!(f, "{} must be {}, got {}", field, expected, value),
            ValidationError::NoFloors => write!(f, "floors must be at least 1"),
            ValidationError::PathTooShort(points) => {
                write!(f, "road path needs at least 2 points, got {}", points)
            }
            ValidationError::InvalidTimeWindow { start, end } => {
                write!(f, "time window start {} is after end {}", start, end)
            }
            ValidationError::UnknownVariant { field, value } => {
                write!(f, "unknown {} '{}'", field, value)
            }
            ValidationError::DuplicateId(id) => write!(f, "duplicate entity id {}", id),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidationError::Geometry { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn geometry(field: &'static str) -> impl Fn(GeometryError) -> ValidationError {
    move |source| ValidationError::Geometry { field, source }
}

/// Check a point location against the kernel's bounds
pub fn validate_location(
    kernel: &GeometryKernel,
    field: &'static str,
    location: Coordinate,
) -> Result<Coordinate, ValidationError> {
    kernel.check(location).map_err(geometry(field))
}

/// Validates a zone spec and returns its boundary polygon.
pub fn validate_zone(kernel: &GeometryKernel, spec: &ZoneSpec) -> Result<Polygon, ValidationError> {
    kernel
        .polygon(spec.boundary.clone())
        .map_err(geometry("boundary"))
}

pub fn validate_footprint(
    kernel: &GeometryKernel,
    footprint: &FootprintSpec,
) -> Result<Footprint, ValidationError> {
    match footprint {
        FootprintSpec::Point(c) => validate_location(kernel, "footprint", *c).map(Footprint::Point),
        FootprintSpec::Outline(vertices) => kernel
            .polygon(vertices.clone())
            .map(Footprint::Outline)
            .map_err(geometry("footprint")),
    }
}

/// Validates a building spec and returns its footprint.
///
/// Rules:
/// - Footprint: valid point, or polygon with ≥3 distinct in-range vertices
/// - Height: finite and positive (meters)
/// - Floors: at least one
pub fn validate_building(
    kernel: &GeometryKernel,
    spec: &BuildingSpec,
) -> Result<Footprint, ValidationError> {
    let footprint = validate_footprint(kernel, &spec.footprint)?;

    if !spec.height.is_finite() || spec.height <= 0.0 {
        return Err(ValidationError::InvalidNumber {
            field: "height",
            value: spec.height,
            expected: "finite and positive",
        });
    }

    if spec.floors == 0 {
        return Err(ValidationError::NoFloors);
    }

    Ok(footprint)
}

/// Validates a road spec.
///
/// Rules:
/// - Path: at least 2 in-range points, no point repeating its predecessor
/// - Width: finite and positive (meters)
/// - Traffic flow: finite and non-negative
pub fn validate_road(kernel: &GeometryKernel, spec: &RoadSpec) -> Result<(), ValidationError> {
    if spec.path.len() < 2 {
        return Err(ValidationError::PathTooShort(spec.path.len()));
    }

    for point in &spec.path {
        validate_location(kernel, "path", *point)?;
    }

    if let Some(index) = (1..spec.path.len()).find(|&i| spec.path[i] == spec.path[i - 1]) {
        return Err(ValidationError::Geometry {
            field: "path",
            source: GeometryError::RepeatedVertex { index },
        });
    }

    if !spec.width.is_finite() || spec.width <= 0.0 {
        return Err(ValidationError::InvalidNumber {
            field: "width",
            value: spec.width,
            expected: "finite and positive",
        });
    }

    validate_traffic_flow(spec.traffic_flow)
}

pub fn validate_traffic_flow(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidNumber {
            field: "traffic_flow",
            value,
            expected: "finite and non-negative",
        });
    }
    Ok(())
}

pub fn validate_reading_value(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidNumber {
            field: "value",
            value,
            expected: "finite",
        });
    }
    Ok(())
}
