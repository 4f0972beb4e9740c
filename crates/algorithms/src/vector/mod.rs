//! Vector measurements used by the catchment summary
//!
//! - Area: planar area of polygonal geometries
//! - Polygonal parts: collect the polygons of any geometry, used to build
//!   cutlines for raster clipping

mod measurements;

pub use measurements::{area, polygonal_parts};
