//! Polygon ring storage
//!
//! Rings are plain vertex lists in degrees, longitude as `x` and latitude as
//! `y`. By convention the last vertex repeats the first one. Validity (simple,
//! non self-intersecting) is the producer's responsibility; the grid only
//! detects violations indirectly.

use geo::{Coord, LineString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single ring vertex: `x` is longitude, `y` is latitude, both in degrees
pub type Vertex = Coord<f64>;

/// Closed ring of vertices, in either winding order
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    vertices: Vec<Vertex>,
}

impl Polygon {
    /// Create a polygon from an already closed ring
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    /// Create a polygon from `(lon, lat)` pairs
    pub fn from_lon_lat<I>(coords: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        Self {
            vertices: coords.into_iter().map(|(x, y)| Coord { x, y }).collect(),
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn vertices_mut(&mut self) -> &mut Vec<Vertex> {
        &mut self.vertices
    }

    #[inline]
    pub fn push(&mut self, vertex: Vertex) {
        self.vertices.push(vertex);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether the last vertex repeats the first one
    pub fn is_closed(&self) -> bool {
        match (self.vertices.first(), self.vertices.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }
}

impl From<LineString<f64>> for Polygon {
    fn from(line: LineString<f64>) -> Self {
        Self { vertices: line.0 }
    }
}

/// Only the exterior ring is kept; interiors are ignored.
impl From<&geo::Polygon<f64>> for Polygon {
    fn from(polygon: &geo::Polygon<f64>) -> Self {
        Self {
            vertices: polygon.exterior().0.clone(),
        }
    }
}

/// Ordered collection of polygons
///
/// Order only affects the order of the emitted addresses.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonSet {
    polygons: Vec<Polygon>,
}

impl PolygonSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a polygon to the set
    #[inline]
    pub fn add_polygon(&mut self, polygon: Polygon) {
        self.polygons.push(polygon);
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Polygon> {
        self.polygons.get(index)
    }

    #[inline]
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Polygon> {
        self.polygons.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

impl From<Polygon> for PolygonSet {
    fn from(polygon: Polygon) -> Self {
        Self {
            polygons: vec![polygon],
        }
    }
}

impl From<Vec<Polygon>> for PolygonSet {
    fn from(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }
}

impl From<&geo::MultiPolygon<f64>> for PolygonSet {
    fn from(multi: &geo::MultiPolygon<f64>) -> Self {
        Self {
            polygons: multi.iter().map(Polygon::from).collect(),
        }
    }
}

impl FromIterator<Polygon> for PolygonSet {
    fn from_iter<I: IntoIterator<Item = Polygon>>(iter: I) -> Self {
        Self {
            polygons: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PolygonSet {
    type Item = &'a Polygon;
    type IntoIter = std::slice::Iter<'a, Polygon>;

    fn into_iter(self) -> Self::IntoIter {
        self.polygons.iter()
    }
}
