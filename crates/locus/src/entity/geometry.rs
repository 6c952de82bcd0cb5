//! Coordinates and the point/line/polygon shapes stored for entities.
//!
//! Shapes are `geo` geometries with x = longitude and y = latitude. Distances
//! between a coordinate and a shape are Euclidean distances measured in degrees
//! of the longitude/latitude reference system. They order candidates correctly at
//! street scale; use [`Coordinate::haversine_km`] for real-world distances.
use geo::{
    BoundingRect, Centroid, Contains, Destination, Distance, Euclidean, Haversine,
    LineInterpolatePoint, LineString, Point, Polygon, Rect, coord,
};
use thiserror::Error;

const METRES_PER_KM: f64 = 1000.0;

#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
    #[error("Unknown geometry type '{0}'")]
    UnknownType(String),
    #[error("Coordinate lists differ in length: {xs} longitudes, {ys} latitudes")]
    LengthMismatch { xs: usize, ys: usize },
    #[error("Geometry of type '{0}' has too few coordinates")]
    TooFewCoordinates(&'static str),
}

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Finite and within the longitude/latitude ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Great-circle distance in kilometres.
    #[must_use]
    pub fn haversine_km(&self, other: &Self) -> f64 {
        Haversine.distance(Point::from(*self), Point::from(*other)) / METRES_PER_KM
    }
}

impl From<Coordinate> for Point {
    fn from(c: Coordinate) -> Self {
        Self::new(c.lon, c.lat)
    }
}

impl From<Point> for Coordinate {
    fn from(p: Point) -> Self {
        Self::new(p.x(), p.y())
    }
}

/// A lon/lat box enclosing the circle of `radius_km` around `center`.
///
/// Returns `None` when the circle touches a pole or crosses the antimeridian,
/// where a single lon/lat box cannot enclose it.
#[must_use]
pub fn bounds_around(center: Coordinate, radius_km: f64) -> Option<Rect> {
    let origin = Point::from(center);
    let radius = radius_km * METRES_PER_KM;

    let north = Haversine.destination(origin, 0.0, radius);
    let south = Haversine.destination(origin, 180.0, radius);
    if north.y() <= center.lat || north.y() >= 90.0 || south.y() >= center.lat || south.y() <= -90.0
    {
        return None;
    }

    // Widest on the poleward edge.
    let poleward = if north.y().abs() >= south.y().abs() { north } else { south };
    let east = Haversine.destination(poleward, 90.0, radius);
    let west = Haversine.destination(poleward, 270.0, radius);
    if east.x() <= center.lon || west.x() >= center.lon {
        return None;
    }

    Some(Rect::new(
        coord! { x: west.x(), y: south.y() },
        coord! { x: east.x(), y: north.y() },
    ))
}

/// A stored entity shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    LineString(LineString),
    /// The closing coordinate of the exterior ring may or may not repeat the
    /// first one in the stored row.
    Polygon(Polygon),
}

impl Geometry {
    /// Assemble a geometry from the `geometry_type`, `xs` and `ys` columns of a
    /// geometry frame row.
    pub fn from_parts(geometry_type: &str, xs: &[f64], ys: &[f64]) -> Result<Self, GeometryError> {
        if xs.len() != ys.len() {
            return Err(GeometryError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let coords: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        match geometry_type {
            "point" => coords
                .first()
                .map(|&(x, y)| Self::Point(Point::new(x, y)))
                .ok_or(GeometryError::TooFewCoordinates("point")),
            "linestring" if coords.len() >= 2 => Ok(Self::LineString(LineString::from(coords))),
            "linestring" => Err(GeometryError::TooFewCoordinates("linestring")),
            "polygon" if coords.len() >= 3 => Ok(Self::Polygon(Polygon::new(
                LineString::from(coords),
                Vec::new(),
            ))),
            "polygon" => Err(GeometryError::TooFewCoordinates("polygon")),
            other => Err(GeometryError::UnknownType(other.to_string())),
        }
    }

    #[must_use]
    pub fn geometry_type(&self) -> &'static str {
        match self {
            Self::Point(_) => "point",
            Self::LineString(_) => "linestring",
            Self::Polygon(_) => "polygon",
        }
    }

    #[must_use]
    pub fn bbox(&self) -> Option<Rect> {
        match self {
            Self::Point(p) => Some(p.bounding_rect()),
            Self::LineString(line) => line.bounding_rect(),
            Self::Polygon(polygon) => polygon.bounding_rect(),
        }
    }

    /// Distance in degrees from `point` to the nearest part of the shape.
    /// Zero when the point lies inside a polygon.
    #[must_use]
    pub fn distance_to(&self, point: Coordinate) -> f64 {
        let point = Point::from(point);
        match self {
            Self::Point(p) => Euclidean.distance(*p, point),
            Self::LineString(line) => Euclidean.distance(&point, line),
            Self::Polygon(polygon) if polygon.contains(&point) => 0.0,
            Self::Polygon(polygon) => Euclidean.distance(&point, polygon.exterior()),
        }
    }

    /// Point-in-shape test; only polygons contain anything.
    #[must_use]
    pub fn contains(&self, point: Coordinate) -> bool {
        match self {
            Self::Polygon(polygon) => polygon.contains(&Point::from(point)),
            Self::Point(_) | Self::LineString(_) => false,
        }
    }

    /// The point `fraction` (clamped to `0..=1`) of the way along a line.
    #[must_use]
    pub fn interpolate(&self, fraction: f64) -> Option<Coordinate> {
        match self {
            Self::LineString(line) if !line.0.is_empty() => line
                .line_interpolate_point(fraction.clamp(0.0, 1.0))
                .map(Coordinate::from),
            _ => None,
        }
    }

    /// A representative point: the halfway point of a line, the centroid of a
    /// polygon, or the point itself.
    #[must_use]
    pub fn center(&self) -> Option<Coordinate> {
        match self {
            Self::Point(p) => Some(Coordinate::from(*p)),
            Self::LineString(_) => self.interpolate(0.5),
            Self::Polygon(polygon) => polygon.centroid().map(Coordinate::from),
        }
    }
}
