//! Pipeline parameters and per-run file locations

use catchment_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the watershed area is taken when the polygon layer has several
/// features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaPolicy {
    /// Area of the last feature visited
    #[default]
    Last,
    /// Sum over all features
    Sum,
    /// Exactly one feature is required
    Single,
}

impl fmt::Display for AreaPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AreaPolicy::Last => "last",
            AreaPolicy::Sum => "sum",
            AreaPolicy::Single => "single",
        };
        f.write_str(name)
    }
}

impl FromStr for AreaPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "last" => Ok(AreaPolicy::Last),
            "sum" => Ok(AreaPolicy::Sum),
            "single" => Ok(AreaPolicy::Single),
            _ => Err(Error::InvalidParameter {
                name: "area_policy",
                value: s.to_string(),
                reason: "expected one of last, sum, single".into(),
            }),
        }
    }
}

/// Parameters of one catchment run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchmentConfig {
    /// Search radius in cells for moving the outlet onto a stream
    pub snap_distance: usize,
    /// Minimum contributing cell count for a stream cell
    pub flow_threshold: usize,
    pub area_policy: AreaPolicy,
}

impl Default for CatchmentConfig {
    fn default() -> Self {
        Self {
            snap_distance: 10,
            flow_threshold: 10,
            area_policy: AreaPolicy::Last,
        }
    }
}

impl CatchmentConfig {
    /// Reject parameters delineation cannot work with
    pub fn validate(&self) -> Result<()> {
        positive("snap_distance", self.snap_distance)?;
        positive("flow_threshold", self.flow_threshold)
    }
}

pub(crate) fn positive(name: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must be a positive cell count".into(),
        });
    }
    Ok(())
}

/// Intermediate files of one run. Every file is overwritten on each run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchmentPaths {
    /// Watershed polygon layer (GeoJSON)
    pub watershed: PathBuf,
    /// Snapped outlet point layer (GeoJSON)
    pub snapped_outlet: PathBuf,
    /// Stream raster over the full DEM extent (GeoTIFF)
    pub stream: PathBuf,
    /// Stream raster clipped to the watershed (GeoTIFF)
    pub stream_trim: PathBuf,
}

impl CatchmentPaths {
    /// Fixed file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::named(dir.as_ref(), "")
    }

    /// File names inside `dir` prefixed with `id_`, so runs with distinct
    /// ids never share a file
    pub fn for_run(dir: impl AsRef<Path>, id: &str) -> Self {
        Self::named(dir.as_ref(), &format!("{id}_"))
    }

    fn named(dir: &Path, prefix: &str) -> Self {
        Self {
            watershed: dir.join(format!("{prefix}watershed.geojson")),
            snapped_outlet: dir.join(format!("{prefix}outlet.geojson")),
            stream: dir.join(format!("{prefix}stream.tif")),
            stream_trim: dir.join(format!("{prefix}stream_trim.tif")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [
            self.watershed.as_path(),
            self.snapped_outlet.as_path(),
            self.stream.as_path(),
            self.stream_trim.as_path(),
        ]
        .into_iter()
    }

    /// Create the parent directory of every file
    pub fn create_dirs(&self) -> Result<()> {
        for path in self.iter() {
            create_parent(path)?;
        }
        Ok(())
    }
}

impl Default for CatchmentPaths {
    fn default() -> Self {
        Self::in_dir("temp")
    }
}

pub(crate) fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(std::fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}
