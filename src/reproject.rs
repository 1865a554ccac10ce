//! Coordinate transformation of vector layers between reference systems.

use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::proj::Proj;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Crs, Feature, VectorLayer};

/// Transforms coordinates from one CRS to another.
///
/// Geographic systems take and return degrees; proj4rs works in radians.
pub struct Transformer {
    source: Proj,
    target: Proj,
}

impl Transformer {
    pub fn new(source: &Crs, target: &Crs) -> Result<Self> {
        Ok(Self {
            source: source.to_proj()?,
            target: target.to_proj()?,
        })
    }

    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.source.is_latlong() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        proj4rs::transform::transform(&self.source, &self.target, &mut point).map_err(|e| {
            Error::Projection(format!("cannot transform ({}, {}): {:?}", coord.x, coord.y, e))
        })?;

        if self.target.is_latlong() {
            Ok(Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            })
        } else {
            Ok(Coord {
                x: point.0,
                y: point.1,
            })
        }
    }

    pub fn transform(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }
}

/// Return a copy of `layer` expressed in `target`.
///
/// The source layer is not modified. A layer already in `target` is cloned
/// without touching its coordinates.
pub fn reproject(layer: &VectorLayer, target: &Crs) -> Result<VectorLayer> {
    let source = layer.crs().ok_or(Error::UndefinedCrs { layer: "source" })?;

    if source == target {
        return Ok(layer.clone());
    }

    let transformer = Transformer::new(source, target)?;
    let features = layer
        .features()
        .iter()
        .map(|feature| {
            Ok(Feature {
                geometry: transformer.transform(&feature.geometry)?,
                values: feature.values.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Reprojected {} features from {} to {}",
        features.len(),
        source,
        target
    );

    Ok(layer.with_features(Some(target.clone()), features))
}
