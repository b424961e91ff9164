//! Loads search footprints from GeoJSON and formats them for CMR.

use std::{fs, path::Path};

use geo::{
    orient::{Direction, Orient},
    Coord, LineString, Polygon,
};
use geojson::{GeoJson, PolygonType, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeometryError>;

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("IO error {0}")]
    IOError(#[from] std::io::Error),

    #[error("GeoJSON error {0}")]
    GeoJsonError(#[from] geojson::Error),

    #[error("no polygons found in `{0}`")]
    NoPolygons(String),

    #[error("polygon ring has fewer than three distinct positions")]
    DegenerateRing,

    #[error("position needs at least two coordinates")]
    ShortPosition,
}

/// Reads every Polygon and MultiPolygon member of a GeoJSON document.
pub fn load_polygons(path: &Path) -> Result<Vec<Polygon<f64>>> {
    let text = fs::read_to_string(path)?;
    let polygons = parse_polygons(&text)?;

    if polygons.is_empty() {
        return Err(GeometryError::NoPolygons(path.display().to_string()));
    }

    tracing::debug!(count = polygons.len(), path = %path.display(), "loaded polygons");
    Ok(polygons)
}

pub fn parse_polygons(text: &str) -> Result<Vec<Polygon<f64>>> {
    let geojson: GeoJson = text.parse()?;
    let mut polygons = Vec::new();

    match geojson {
        GeoJson::FeatureCollection(collection) => {
            for feature in collection.features {
                if let Some(geometry) = feature.geometry {
                    collect_polygons(&geometry.value, &mut polygons)?;
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = feature.geometry {
                collect_polygons(&geometry.value, &mut polygons)?;
            }
        }
        GeoJson::Geometry(geometry) => collect_polygons(&geometry.value, &mut polygons)?,
    }

    Ok(polygons)
}

fn collect_polygons(value: &Value, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    match value {
        Value::Polygon(rings) => out.push(to_polygon(rings)?),
        Value::MultiPolygon(parts) => {
            for rings in parts {
                out.push(to_polygon(rings)?);
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_polygons(&geometry.value, out)?;
            }
        }
        _ => {}
    }

    Ok(())
}

fn to_polygon(rings: &PolygonType) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| to_line_string(ring));

    let exterior = rings.next().ok_or(GeometryError::DegenerateRing)??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn to_line_string(ring: &[Vec<f64>]) -> Result<LineString<f64>> {
    let coords = ring
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(GeometryError::ShortPosition),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut distinct = coords.clone();
    distinct.dedup();
    if distinct.first() == distinct.last() && distinct.len() > 1 {
        distinct.pop();
    }
    if distinct.len() < 3 {
        return Err(GeometryError::DegenerateRing);
    }

    Ok(LineString::from(coords))
}

/// Formats the exterior ring as CMR's `polygon` parameter: counter-clockwise,
/// closed, `lon1,lat1,lon2,lat2,...`. Holes are not supported by CMR and dropped.
pub fn to_cmr_polygon(polygon: &Polygon<f64>) -> String {
    let oriented = polygon.orient(Direction::Default);

    oriented
        .exterior()
        .coords()
        .map(|c| format!("{},{}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(",")
}

// -- Tests -------------------------------------------------------------------
