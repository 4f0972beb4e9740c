//! Crop the stream raster to the watershed polygon
//!
//! Every clipper failure surfaces as [`Error::ClipFailed`], the one error
//! the pipeline recovers from.

use super::config::create_parent;
use crate::clip::clip_to_cutline;
use crate::vector::polygonal_parts;
use catchment_core::io::{read_features, read_geotiff, write_geotiff};
use catchment_core::raster::Raster;
use catchment_core::{Error, Result};
use geo::{MultiPolygon, Polygon};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Clips a raster file by a polygon layer into a new raster file
pub trait RasterClipper {
    fn name(&self) -> &'static str;

    /// Write `source` cropped to `cutline` into `destination`, replacing
    /// any existing file.
    fn clip(&self, cutline: &Path, source: &Path, destination: &Path) -> Result<()>;
}

/// In-process clip: center-in-polygon masking, extent cropped to the
/// cutline's bounding box
#[derive(Debug, Clone, Copy, Default)]
pub struct CutlineClipper;

impl CutlineClipper {
    fn clip_files(cutline: &Path, source: &Path, destination: &Path) -> Result<()> {
        let layer = read_features(cutline)?;
        let polygons: Vec<Polygon<f64>> = layer
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(|g| polygonal_parts(g).0)
            .collect();

        let raster: Raster<f64> = read_geotiff(source)?;
        let clipped = clip_to_cutline(&raster, &MultiPolygon::new(polygons))?;
        debug!(rows = clipped.rows(), cols = clipped.cols(), "raster clipped");

        create_parent(destination)?;
        write_geotiff(&clipped, destination)
    }
}

impl RasterClipper for CutlineClipper {
    fn name(&self) -> &'static str {
        "cutline"
    }

    fn clip(&self, cutline: &Path, source: &Path, destination: &Path) -> Result<()> {
        Self::clip_files(cutline, source, destination).map_err(|e| match e {
            Error::ClipFailed { .. } => e,
            other => Error::ClipFailed {
                tool: self.name().into(),
                code: None,
                reason: other.to_string(),
            },
        })
    }
}

/// Clip with GDAL's `gdalwarp` in a child process.
///
/// Runs `gdalwarp -cutline <cutline> -crop_to_cutline -overwrite <source>
/// <destination>` and blocks until it exits.
#[derive(Debug, Clone)]
pub struct GdalWarpClipper {
    program: PathBuf,
}

impl GdalWarpClipper {
    pub fn new() -> Self {
        Self::with_program("gdalwarp")
    }

    /// Use another executable, e.g. a full path to `gdalwarp`
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Check if the program is installed and runs
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command(&self, cutline: &Path, source: &Path, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-cutline")
            .arg(cutline)
            .arg("-crop_to_cutline")
            .arg("-overwrite")
            .arg(source)
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Default for GdalWarpClipper {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterClipper for GdalWarpClipper {
    fn name(&self) -> &'static str {
        "gdalwarp"
    }

    fn clip(&self, cutline: &Path, source: &Path, destination: &Path) -> Result<()> {
        create_parent(destination)?;
        debug!(program = %self.program.display(), "spawning clip process");

        let output = self
            .command(cutline, source, destination)
            .output()
            .map_err(|e| Error::ClipFailed {
                tool: self.name().into(),
                code: None,
                reason: format!("could not run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ClipFailed {
                tool: self.name().into(),
                code: output.status.code(),
                reason: stderr.trim().lines().last().unwrap_or("no output").to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catchment_core::io::write_features;
    use catchment_core::{FeatureCollection, GeoTransform};
    use geo::{Geometry, LineString};

    fn fixtures(dir: &Path) -> (PathBuf, PathBuf) {
        let cutline = dir.join("cutline.geojson");
        let source = dir.join("source.tif");

        let square = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0), (0.0, 0.0)]),
            vec![],
        );
        write_features(&FeatureCollection::from(Geometry::Polygon(square)), &cutline).unwrap();

        let mut raster: Raster<f64> = Raster::filled(4, 4, 1.0);
        raster.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        raster.set_nodata(Some(0.0));
        write_geotiff(&raster, &source).unwrap();

        (cutline, source)
    }

    #[test]
    fn test_cutline_clipper_writes_cropped_raster() {
        let dir = tempfile::tempdir().unwrap();
        let (cutline, source) = fixtures(dir.path());
        let destination = dir.path().join("out").join("trim.tif");

        CutlineClipper.clip(&cutline, &source, &destination).unwrap();

        let clipped: Raster<f64> = read_geotiff(&destination).unwrap();
        assert_eq!(clipped.shape(), (2, 2));
        assert_eq!(clipped.nodata(), Some(0.0));
        assert_eq!(clipped.valid_sum(), 4.0);
    }

    #[test]
    fn test_cutline_clipper_reports_missing_input_as_clip_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (cutline, _) = fixtures(dir.path());
        let err = CutlineClipper
            .clip(&cutline, &dir.path().join("missing.tif"), &dir.path().join("o.tif"))
            .unwrap_err();
        assert!(matches!(err, Error::ClipFailed { ref tool, .. } if tool == "cutline"));
    }

    #[test]
    fn test_missing_program_is_clip_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (cutline, source) = fixtures(dir.path());
        let clipper = GdalWarpClipper::with_program("catchment-no-such-gdalwarp");

        assert!(!clipper.is_available());
        let err = clipper
            .clip(&cutline, &source, &dir.path().join("o.tif"))
            .unwrap_err();
        assert!(matches!(err, Error::ClipFailed { code: None, .. }));
        assert!(err.is_recoverable());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_clip_failure_with_code() {
        let dir = tempfile::tempdir().unwrap();
        let (cutline, source) = fixtures(dir.path());
        let clipper = GdalWarpClipper::with_program("false");

        let err = clipper
            .clip(&cutline, &source, &dir.path().join("o.tif"))
            .unwrap_err();
        assert!(matches!(err, Error::ClipFailed { code: Some(1), .. }));
    }

    #[test]
    fn test_command_line() {
        let clipper = GdalWarpClipper::new();
        let cmd = clipper.command(Path::new("ws.geojson"), Path::new("s.tif"), Path::new("t.tif"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "gdalwarp");
        assert_eq!(
            args,
            ["-cutline", "ws.geojson", "-crop_to_cutline", "-overwrite", "s.tif", "t.tif"]
        );
    }
}
