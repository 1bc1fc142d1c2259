use serde::{Deserialize, Serialize};
use std::fmt;


/// Position as a (latitude, longitude) pair, treated as planar (y, x)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Geometry precondition failures
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Component not finite or outside the configured bounds
    InvalidCoordinate { latitude: f64, longitude: f64 },
    /// Fewer than three distinct vertices
    DegeneratePolygon { distinct_points: usize },
    /// Vertex identical to its predecessor
    RepeatedVertex { index: usize },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::InvalidCoordinate {
                latitude,
                longitude,
            } => write!(
                f,
                "invalid coordinate ({}, {}): outside valid range",
                latitude, longitude
            ),
            GeometryError::DegeneratePolygon { distinct_points } => write!(
                f,
                "degenerate polygon: {} distinct point(s), at least 3 required",
                distinct_points
            ),
            GeometryError::RepeatedVertex { index } => {
                write!(f, "vertex {} repeats the previous vertex", index)
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Implicitly closed ring of vertices (last connects back to first)
///
/// Construction guarantees finite components, at least three distinct
/// vertices and no two consecutive identical vertices. Deserialization goes
/// through the same checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Polygon {
    vertices: Vec<Coordinate>,
}

impl Polygon {
    /// Build a polygon from its boundary vertices
    ///
    /// An explicitly closed ring (last vertex equal to the first) is accepted
    /// and the closing vertex dropped. A ring closed more than once is
    /// rejected.
    pub fn new(mut vertices: Vec<Coordinate>) -> Result<Self, GeometryError> {
        if let Some(bad) = vertices.iter().find(|c| !c.is_finite()) {
            return Err(GeometryError::InvalidCoordinate {
                latitude: bad.latitude,
                longitude: bad.longitude,
            });
        }

        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        if let Some(index) = (1..vertices.len()).find(|&i| vertices[i] == vertices[i - 1]) {
            return Err(GeometryError::RepeatedVertex { index });
        }

        // The implicit closing edge must not be zero-length either
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            return Err(GeometryError::RepeatedVertex { index: 0 });
        }

        let distinct = count_distinct(&vertices, 3);
        if distinct < 3 {
            return Err(GeometryError::DegeneratePolygon {
                distinct_points: distinct,
            });
        }

        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Coordinate] {
        &self.vertices
    }

    /// Boundary edges in vertex order, including the closing edge
    pub fn edges(&self) -> impl Iterator<Item = (Coordinate, Coordinate)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Shoelace sum; positive for counter-clockwise rings
    pub fn signed_area(&self) -> f64 {
        let twice: f64 = self
            .edges()
            .map(|(a, b)| a.longitude * b.latitude - b.longitude * a.latitude)
            .sum();
        twice / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Area centroid, or the vertex mean when the ring encloses no area
    pub fn centroid(&self) -> Coordinate {
        let area = self.signed_area();

        if area.abs() <= f64::EPSILON {
            let n = self.vertices.len() as f64;
            let (lat, lon) = self
                .vertices
                .iter()
                .fold((0.0, 0.0), |(lat, lon), v| (lat + v.latitude, lon + v.longitude));
            return Coordinate::new(lat / n, lon / n);
        }

        let (mut cx, mut cy) = (0.0, 0.0);
        for (a, b) in self.edges() {
            let cross = a.longitude * b.latitude - b.longitude * a.latitude;
            cx += (a.longitude + b.longitude) * cross;
            cy += (a.latitude + b.latitude) * cross;
        }
        Coordinate::new(cy / (6.0 * area), cx / (6.0 * area))
    }
}

impl TryFrom<Vec<Coordinate>> for Polygon {
    type Error = GeometryError;

    fn try_from(vertices: Vec<Coordinate>) -> Result<Self, Self::Error> {
        Polygon::new(vertices)
    }
}

impl From<Polygon> for Vec<Coordinate> {
    fn from(polygon: Polygon) -> Self {
        polygon.vertices
    }
}

/// Count distinct points, stopping early once `cap` is reached
fn count_distinct(points: &[Coordinate], cap: usize) -> usize {
    let mut seen: Vec<Coordinate> = Vec::with_capacity(cap);
    for p in points {
        if !seen.contains(p) {
            seen.push(*p);
            if seen.len() == cap {
                break;
            }
        }
    }
    seen.len()
}

/// Valid coordinate range for one plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl CoordinateBounds {
    pub fn contains(&self, c: Coordinate) -> bool {
        c.is_finite()
            && c.latitude >= self.min_latitude
            && c.latitude <= self.max_latitude
            && c.longitude >= self.min_longitude
            && c.longitude <= self.max_longitude
    }
}

impl Default for CoordinateBounds {
    fn default() -> Self {
        Self {
            min_latitude: -90.0,
            max_latitude: 90.0,
            min_longitude: -180.0,
            max_longitude: 180.0,
        }
    }
}

/// Pure geometric computations bound to one plan's coordinate range
#[derive(Clone, Debug)]
pub struct GeometryKernel {
    bounds: CoordinateBounds,
    /// Distance within which a point counts as lying on a polygon edge
    tolerance: f64,
}

impl GeometryKernel {
    pub fn new(bounds: CoordinateBounds, tolerance: f64) -> Self {
        Self {
            bounds,
            tolerance: tolerance.abs(),
        }
    }

    pub fn bounds(&self) -> &CoordinateBounds {
        &self.bounds
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Reject coordinates that are not finite or fall outside the bounds
    pub fn check(&self, c: Coordinate) -> Result<Coordinate, GeometryError> {
        if self.bounds.contains(c) {
            Ok(c)
        } else {
            Err(GeometryError::InvalidCoordinate {
                latitude: c.latitude,
                longitude: c.longitude,
            })
        }
    }

    /// Euclidean distance in coordinate units
    pub fn distance(&self, a: Coordinate, b: Coordinate) -> Result<f64, GeometryError> {
        self.check(a)?;
        self.check(b)?;
        Ok(planar_distance(a, b))
    }

    /// Validate vertices structurally and against the bounds
    pub fn polygon(&self, vertices: Vec<Coordinate>) -> Result<Polygon, GeometryError> {
        let polygon = Polygon::new(vertices)?;
        for v in polygon.vertices() {
            self.check(*v)?;
        }
        Ok(polygon)
    }

    pub fn polygon_area(&self, polygon: &Polygon) -> Result<f64, GeometryError> {
        for v in polygon.vertices() {
            self.check(*v)?;
        }
        Ok(polygon.area())
    }

    /// Inclusive point-in-polygon test
    ///
    /// Points within `tolerance` of an edge are contained; otherwise an
    /// even-odd ray cast towards +longitude decides. Edges are visited in
    /// vertex order so repeated calls agree.
    pub fn contains(&self, polygon: &Polygon, point: Coordinate) -> bool {
        if !point.is_finite() {
            return false;
        }

        if polygon
            .edges()
            .any(|(a, b)| on_segment(a, b, point, self.tolerance))
        {
            return true;
        }

        let (px, py) = (point.longitude, point.latitude);
        let mut inside = false;
        for (a, b) in polygon.edges() {
            let (xi, yi) = (a.longitude, a.latitude);
            let (xj, yj) = (b.longitude, b.latitude);
            if (yi > py) != (yj > py) {
                let x_cross = (xj - xi) * (py - yi) / (yj - yi) + xi;
                if px < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Total length of a polyline
    pub fn path_length(&self, path: &[Coordinate]) -> Result<f64, GeometryError> {
        path.windows(2)
            .map(|pair| self.distance(pair[0], pair[1]))
            .sum()
    }
}

impl Default for GeometryKernel {
    fn default() -> Self {
        Self::new(CoordinateBounds::default(), 1e-9)
    }
}

/// Euclidean distance without range checks
pub fn planar_distance(a: Coordinate, b: Coordinate) -> f64 {
    (a.latitude - b.latitude).hypot(a.longitude - b.longitude)
}

fn on_segment(a: Coordinate, b: Coordinate, p: Coordinate, tolerance: f64) -> bool {
    let (ax, ay) = (a.longitude, a.latitude);
    let (bx, by) = (b.longitude, b.latitude);
    let (px, py) = (p.longitude, p.latitude);

    if px < ax.min(bx) - tolerance
        || px > ax.max(bx) + tolerance
        || py < ay.min(by) - tolerance
        || py > ay.max(by) + tolerance
    {
        return false;
    }

    let length = (bx - ax).hypot(by - ay);
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    cross.abs() <= tolerance * length
}
