//! Delineate, measure, clip, summarize

use super::clipper::{CutlineClipper, RasterClipper};
use super::config::{CatchmentConfig, CatchmentPaths};
use super::delineate::{D8Delineator, DelineationRequest, Delineator};
use super::summary::{stream_length, watershed_area};
use catchment_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Metrics of one catchment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatchmentMetrics {
    /// Total stream length inside the catchment, DEM linear units
    pub stream_length: f64,
    /// Planar catchment area, DEM units squared
    pub area: f64,
}

impl CatchmentMetrics {
    /// Both metrics NaN: the clip step failed
    pub fn undefined() -> Self {
        Self {
            stream_length: f64::NAN,
            area: f64::NAN,
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.stream_length.is_nan() && !self.area.is_nan()
    }
}

/// Delineation and clipping collaborators plus the run parameters
#[derive(Debug, Clone)]
pub struct CatchmentPipeline<D, C> {
    delineator: D,
    clipper: C,
    config: CatchmentConfig,
}

impl CatchmentPipeline<D8Delineator, CutlineClipper> {
    /// D8 delineation with the in-process clipper
    pub fn with_config(config: CatchmentConfig) -> Self {
        Self::new(D8Delineator, CutlineClipper, config)
    }
}

impl Default for CatchmentPipeline<D8Delineator, CutlineClipper> {
    fn default() -> Self {
        Self::with_config(CatchmentConfig::default())
    }
}

impl<D: Delineator, C: RasterClipper> CatchmentPipeline<D, C> {
    pub fn new(delineator: D, clipper: C, config: CatchmentConfig) -> Self {
        Self {
            delineator,
            clipper,
            config,
        }
    }

    pub fn config(&self) -> &CatchmentConfig {
        &self.config
    }

    /// Run every step. A failed clip yields [`CatchmentMetrics::undefined`]
    /// instead of an error; every other failure is returned.
    pub fn run(&self, outlet: &Path, dem: &Path, paths: &CatchmentPaths) -> Result<CatchmentMetrics> {
        match self.try_run(outlet, dem, paths) {
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "clip failed, catchment metrics are undefined");
                Ok(CatchmentMetrics::undefined())
            }
            other => other,
        }
    }

    /// Run every step, returning any failure as an error
    pub fn try_run(
        &self,
        outlet: &Path,
        dem: &Path,
        paths: &CatchmentPaths,
    ) -> Result<CatchmentMetrics> {
        self.config.validate()?;
        paths.create_dirs()?;

        info!(
            delineator = self.delineator.name(),
            dem = %dem.display(),
            outlet = %outlet.display(),
            "delineating catchment"
        );
        let outputs = self.delineator.delineate(&DelineationRequest {
            dem,
            outlet,
            snap_distance: self.config.snap_distance,
            flow_threshold: self.config.flow_threshold,
            paths,
        })?;
        debug!(
            snapped = ?outputs.snapped_cell,
            moved = outputs.moved,
            basin_cells = outputs.basin_cells,
            "delineation done"
        );

        let area = watershed_area(&paths.watershed, self.config.area_policy)?;

        debug!(clipper = self.clipper.name(), "clipping stream raster");
        self.clipper
            .clip(&paths.watershed, &paths.stream, &paths.stream_trim)?;

        let stream_length = stream_length(&paths.stream_trim)?;
        info!(area, stream_length, "catchment metrics computed");

        Ok(CatchmentMetrics {
            stream_length,
            area,
        })
    }
}

/// Catchment area and stream length for the basin draining to `outlet`,
/// using D8 delineation and the in-process clipper.
///
/// Returns [`CatchmentMetrics::undefined`] when the clip fails.
pub fn compute_catchment_metrics(
    outlet: &Path,
    dem: &Path,
    config: &CatchmentConfig,
    paths: &CatchmentPaths,
) -> Result<CatchmentMetrics> {
    CatchmentPipeline::with_config(config.clone()).run(outlet, dem, paths)
}
