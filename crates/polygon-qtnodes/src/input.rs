//! Polygon input from GeoJSON
//!
//! Only the exterior ring of each `Polygon` / `MultiPolygon` member is used.
//! Other geometry types are skipped.

use crate::error::{CliError, Result};
use geo::{Coord, LineString};
use polygon_qtnodes_lib::Polygon;
use serde::Deserialize;

/// `[lon, lat, ...]`; extra ordinates such as altitude are ignored
type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    FeatureCollection {
        features: Vec<Feature>,
    },
    Feature(Feature),
    GeometryCollection {
        geometries: Vec<GeoJson>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Box<GeoJson>>,
}

/// Parse every polygon exterior ring out of a GeoJSON document, in document order
pub fn parse_geojson(text: &str) -> Result<Vec<Polygon>> {
    let document: GeoJson = serde_json::from_str(text)?;
    let mut polygons = Vec::new();
    collect_polygons(&document, &mut polygons)?;
    tracing::debug!(polygons = polygons.len(), "parsed GeoJSON");
    Ok(polygons)
}

fn collect_polygons(node: &GeoJson, out: &mut Vec<Polygon>) -> Result<()> {
    match node {
        GeoJson::FeatureCollection { features } => {
            for feature in features {
                if let Some(geometry) = &feature.geometry {
                    collect_polygons(geometry, out)?;
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                collect_polygons(geometry, out)?;
            }
        }
        GeoJson::GeometryCollection { geometries } => {
            for geometry in geometries {
                collect_polygons(geometry, out)?;
            }
        }
        GeoJson::Polygon { coordinates } => {
            if let Some(exterior) = coordinates.first() {
                out.push(ring_to_polygon(exterior)?);
            }
        }
        GeoJson::MultiPolygon { coordinates } => {
            for rings in coordinates {
                if let Some(exterior) = rings.first() {
                    out.push(ring_to_polygon(exterior)?);
                }
            }
        }
        GeoJson::Unsupported => {
            tracing::debug!("Skipping unsupported GeoJSON geometry");
        }
    }
    Ok(())
}

fn ring_to_polygon(ring: &[Position]) -> Result<Polygon> {
    let coords = ring
        .iter()
        .map(|position| match position.as_slice() {
            [lon, lat, ..] => Ok(Coord { x: *lon, y: *lat }),
            _ => Err(CliError::InvalidGeoJson(format!(
                "position needs longitude and latitude, got {position:?}"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::from(LineString::new(coords)))
}

/// Non-empty trimmed lines, for reading flat paths
pub fn parse_paths(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
