//! Reading and writing rasters (GeoTIFF) and vector layers (GeoJSON)

mod geojson;
mod geotiff;

pub use self::geojson::{parse_features, read_features, write_features};
pub use self::geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
