//! Scalar summaries of the delineation outputs

use super::config::AreaPolicy;
use crate::vector::area;
use catchment_core::io::{read_features, read_geotiff, write_features};
use catchment_core::raster::Raster;
use catchment_core::{Error, FieldDef, FieldKind, Result};
use std::path::Path;
use tracing::debug;

/// Field added to the watershed layer schema
pub const AREA_FIELD: &str = "Area";

/// Planar area of the watershed layer, aggregated by `policy`.
///
/// Adds an `Area` real field (width 32) to the layer schema and persists
/// it; the field is left null.
pub fn watershed_area(path: &Path, policy: AreaPolicy) -> Result<f64> {
    let mut layer = read_features(path)?;
    let name = path.display().to_string();
    if layer.is_empty() {
        return Err(Error::EmptyLayer(name));
    }

    if layer.create_field(FieldDef::new(AREA_FIELD, FieldKind::Real).with_width(32)) {
        write_features(&layer, path)?;
    }

    let areas = layer
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            feature
                .geometry
                .as_ref()
                .map(area)
                .ok_or_else(|| Error::NoGeometry { layer: name.clone(), index })
        })
        .collect::<Result<Vec<f64>>>()?;
    debug!(features = areas.len(), %policy, "watershed areas measured");

    match (policy, areas.as_slice()) {
        (AreaPolicy::Single, [only]) => Ok(*only),
        (AreaPolicy::Single, _) => Err(Error::MultipleFeatures { layer: name, count: areas.len() }),
        (AreaPolicy::Sum, _) => Ok(areas.iter().sum()),
        (AreaPolicy::Last, _) => areas.last().copied().ok_or(Error::EmptyLayer(name)),
    }
}

/// Length of stream in a raster: sum of valid cells times the mean
/// absolute cell dimension. Square cells are assumed, not checked.
pub fn raster_stream_length(raster: &Raster<f64>) -> f64 {
    raster.valid_sum() * raster.transform().mean_cell_size()
}

/// [`raster_stream_length`] of band 1 of a GeoTIFF
pub fn stream_length(path: &Path) -> Result<f64> {
    let raster: Raster<f64> = read_geotiff(path)?;
    Ok(raster_stream_length(&raster))
}
