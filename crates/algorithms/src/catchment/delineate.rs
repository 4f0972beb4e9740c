//! Watershed and stream delineation
//!
//! A [`Delineator`] turns a DEM and an outlet point into three files: the
//! watershed polygon, the snapped outlet point and the stream raster. The
//! pipeline only relies on those files, so any implementation can be
//! plugged in.

use super::config::{create_parent, positive, CatchmentPaths};
use crate::hydrology::{
    flow_accumulation, flow_direction, polygonize, snap_pour_point, stream_network, watershed,
    SnapParams, StreamNetworkParams, WatershedParams,
};
use catchment_core::io::{read_features, read_geotiff, write_features, write_geotiff};
use catchment_core::raster::Raster;
use catchment_core::{AttributeValue, Error, Feature, FeatureCollection, FieldDef, FieldKind, Result};
use geo::{Geometry, Point};
use std::path::Path;
use tracing::{debug, warn};

/// Basin id stored on the watershed polygon feature
pub const WATERSHED_ID_FIELD: &str = "ws_id";

/// Inputs of one delineation
#[derive(Debug, Clone, Copy)]
pub struct DelineationRequest<'a> {
    /// Filled, projected DEM (GeoTIFF)
    pub dem: &'a Path,
    /// Outlet point layer (GeoJSON)
    pub outlet: &'a Path,
    /// Search radius in cells for snapping the outlet
    pub snap_distance: usize,
    /// Minimum contributing cell count for a stream cell
    pub flow_threshold: usize,
    /// Where the outputs go
    pub paths: &'a CatchmentPaths,
}

/// What a delineation reports besides the files it wrote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelineationOutputs {
    /// Cell `(row, col)` the outlet point falls in
    pub outlet_cell: (usize, usize),
    /// Cell `(row, col)` the outlet was snapped to
    pub snapped_cell: (usize, usize),
    /// Whether snapping moved the outlet
    pub moved: bool,
    /// Number of cells draining to the snapped outlet, itself included
    pub basin_cells: usize,
}

/// Produces the watershed polygon, snapped outlet and stream raster files
pub trait Delineator {
    fn name(&self) -> &'static str;

    fn delineate(&self, request: &DelineationRequest<'_>) -> Result<DelineationOutputs>;
}

/// Built-in D8 delineation.
///
/// Flow direction, flow accumulation, stream thresholding, outlet snapping,
/// upstream tracing and polygonization of the basin mask.
#[derive(Debug, Clone, Copy, Default)]
pub struct D8Delineator;

impl Delineator for D8Delineator {
    fn name(&self) -> &'static str {
        "D8"
    }

    fn delineate(&self, request: &DelineationRequest<'_>) -> Result<DelineationOutputs> {
        positive("snap_distance", request.snap_distance)?;
        positive("flow_threshold", request.flow_threshold)?;

        let dem: Raster<f64> = read_geotiff(request.dem)?;
        let outlet = read_outlet(request.outlet)?;
        let outlet_cell = dem
            .geo_to_cell(outlet.x(), outlet.y())
            .ok_or(Error::OutletOutsideRaster { x: outlet.x(), y: outlet.y() })?;
        debug!(rows = dem.rows(), cols = dem.cols(), ?outlet_cell, "DEM loaded");

        let fdir = flow_direction(&dem)?;
        let facc = flow_accumulation(&fdir)?;
        let streams = stream_network(
            &facc,
            StreamNetworkParams { threshold: request.flow_threshold },
        )?;

        let snapped = snap_pour_point(
            &streams,
            &facc,
            outlet_cell,
            &SnapParams { snap_distance: request.snap_distance },
        )?;
        if snapped.moved() {
            debug!(
                from = ?outlet_cell,
                to = ?(snapped.row, snapped.col),
                distance = snapped.distance,
                "outlet snapped to stream"
            );
        }

        let basins = watershed(
            &fdir,
            WatershedParams { pour_points: vec![(snapped.row, snapped.col)] },
        )?;
        let basin_cells = basins.data().iter().filter(|&&id| id == 1).count();
        let polygon = polygonize(&basins, 1)?;

        let paths = request.paths;
        for path in [&paths.watershed, &paths.snapped_outlet, &paths.stream] {
            create_parent(path)?;
        }

        let geometry = match polygon.0.as_slice() {
            [single] => Geometry::Polygon(single.clone()),
            _ => Geometry::MultiPolygon(polygon),
        };
        let mut basin = Feature::new(geometry);
        basin.set_property(WATERSHED_ID_FIELD, AttributeValue::Int(1));
        let layer = FeatureCollection {
            fields: vec![FieldDef::new(WATERSHED_ID_FIELD, FieldKind::Integer)],
            features: vec![basin],
        };
        write_features(&layer, &paths.watershed)?;

        let (x, y) = dem.pixel_to_geo(snapped.col, snapped.row);
        write_features(
            &FeatureCollection::from(Geometry::Point(Point::new(x, y))),
            &paths.snapped_outlet,
        )?;
        write_geotiff(&streams, &paths.stream)?;

        Ok(DelineationOutputs {
            outlet_cell,
            snapped_cell: (snapped.row, snapped.col),
            moved: snapped.moved(),
            basin_cells,
        })
    }
}

/// First point of the outlet layer
fn read_outlet(path: &Path) -> Result<Point<f64>> {
    let layer = read_features(path)?;
    let mut points = layer.iter().filter_map(|f| match &f.geometry {
        Some(Geometry::Point(p)) => Some(*p),
        Some(Geometry::MultiPoint(mp)) => mp.0.first().copied(),
        _ => None,
    });

    let first = match points.next() {
        Some(p) => p,
        None if layer.is_empty() => return Err(Error::EmptyLayer(path.display().to_string())),
        None => {
            return Err(Error::Vector(format!(
                "{} holds no point geometry",
                path.display()
            )))
        }
    };

    let extra = points.count();
    if extra > 0 {
        warn!(
            layer = %path.display(),
            points = extra + 1,
            "outlet layer holds several points, using the first"
        );
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catchment_core::GeoTransform;

    fn write_outlet(path: &Path, points: &[(f64, f64)]) {
        let layer = FeatureCollection {
            fields: Vec::new(),
            features: points
                .iter()
                .map(|&(x, y)| Feature::new(Point::new(x, y)))
                .collect(),
        };
        write_features(&layer, path).unwrap();
    }

    /// 20x20 grid of 30 m cells tilted south, with a V-shaped valley along
    /// column 10
    fn valley_dem(path: &Path) {
        let mut dem: Raster<f64> = Raster::new(20, 20);
        dem.set_transform(GeoTransform::new(500_000.0, 4_200_600.0, 30.0, -30.0));
        for row in 0..20 {
            for col in 0..20 {
                let side = (col as f64 - 10.0).abs() * 2.0;
                dem.set(row, col, 200.0 - row as f64 + side).unwrap();
            }
        }
        write_geotiff(&dem, path).unwrap();
    }

    #[test]
    fn test_outlet_layer_first_point_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outlet.geojson");
        write_outlet(&path, &[(1.0, 2.0), (3.0, 4.0)]);
        assert_eq!(read_outlet(&path).unwrap(), Point::new(1.0, 2.0));
    }

    #[test]
    fn test_empty_outlet_layer_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outlet.geojson");
        write_outlet(&path, &[]);
        assert!(matches!(read_outlet(&path), Err(Error::EmptyLayer(_))));
    }

    #[test]
    fn test_valley_delineation_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let dem = dir.path().join("dem.tif");
        let outlet = dir.path().join("outlet_in.geojson");
        valley_dem(&dem);
        // Cell (18, 11): one column east of the valley floor
        write_outlet(&outlet, &[(500_000.0 + 11.5 * 30.0, 4_200_600.0 - 18.5 * 30.0)]);

        let paths = CatchmentPaths::in_dir(dir.path().join("temp"));
        let request = DelineationRequest {
            dem: &dem,
            outlet: &outlet,
            snap_distance: 3,
            flow_threshold: 10,
            paths: &paths,
        };
        let outputs = D8Delineator.delineate(&request).unwrap();

        assert_eq!(outputs.outlet_cell, (18, 11));
        assert_eq!(outputs.snapped_cell, (18, 10));
        assert!(outputs.moved);
        assert!(outputs.basin_cells > 19);

        let layer = read_features(&paths.watershed).unwrap();
        assert_eq!(layer.len(), 1);
        assert!(layer.field(WATERSHED_ID_FIELD).is_some());
        assert_eq!(read_features(&paths.snapped_outlet).unwrap().len(), 1);

        let streams: Raster<u8> = read_geotiff(&paths.stream).unwrap();
        assert_eq!(streams.shape(), (20, 20));
        assert_eq!(streams.get(18, 10).unwrap(), 1);
    }

    #[test]
    fn test_outlet_outside_dem() {
        let dir = tempfile::tempdir().unwrap();
        let dem = dir.path().join("dem.tif");
        let outlet = dir.path().join("outlet.geojson");
        valley_dem(&dem);
        write_outlet(&outlet, &[(0.0, 0.0)]);

        let paths = CatchmentPaths::in_dir(dir.path());
        let request = DelineationRequest {
            dem: &dem,
            outlet: &outlet,
            snap_distance: 10,
            flow_threshold: 10,
            paths: &paths,
        };
        assert!(matches!(
            D8Delineator.delineate(&request),
            Err(Error::OutletOutsideRaster { .. })
        ));
    }

    #[test]
    fn test_zero_threshold_rejected_before_reading() {
        let paths = CatchmentPaths::in_dir("unused");
        let request = DelineationRequest {
            dem: Path::new("missing.tif"),
            outlet: Path::new("missing.geojson"),
            snap_distance: 10,
            flow_threshold: 0,
            paths: &paths,
        };
        assert!(matches!(
            D8Delineator.delineate(&request),
            Err(Error::InvalidParameter { name: "flow_threshold", .. })
        ));
    }
}
