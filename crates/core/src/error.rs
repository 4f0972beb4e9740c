//! Error types for catchment analysis

use thiserror::Error;

/// Main error type shared by every step of the catchment pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("Raster has no georeferencing (ModelPixelScale + ModelTiepoint or ModelTransformation)")]
    NotGeoreferenced,

    #[error("Vector error: {0}")]
    Vector(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Outlet ({x}, {y}) lies outside the raster extent")]
    OutletOutsideRaster { x: f64, y: f64 },

    #[error("No stream cell within {snap_distance} cells of outlet cell ({row}, {col})")]
    NoStreamNearOutlet {
        row: usize,
        col: usize,
        snap_distance: usize,
    },

    #[error("Layer {0} contains no features")]
    EmptyLayer(String),

    #[error("Feature {index} of {layer} has no geometry")]
    NoGeometry { layer: String, index: usize },

    #[error("Expected exactly one feature in {layer}, found {count}")]
    MultipleFeatures { layer: String, count: usize },

    #[error("Clip with {tool} failed (exit code {code:?}): {reason}")]
    ClipFailed {
        tool: String,
        code: Option<i32>,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a batch caller can skip this catchment and keep going.
    ///
    /// Only a failed clip is recoverable; input and delineation errors
    /// point at bad data or a programming error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ClipFailed { .. })
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

/// Result type alias for catchment operations
pub type Result<T> = std::result::Result<T, Error>;
