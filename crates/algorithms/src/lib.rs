//! # Catchment Algorithms
//!
//! Watershed analysis on gridded DEMs.
//!
//! ## Modules
//!
//! - **hydrology**: D8 flow direction with flat routing, flow accumulation, stream network,
//!   pour point snapping, watershed labelling, basin polygonization
//! - **vector**: polygon area
//! - **clip**: crop a raster to a polygon cutline
//! - **catchment**: the catchment metrics pipeline (area and stream length)

pub mod catchment;
pub mod clip;
pub mod hydrology;
pub mod vector;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::catchment::{
        compute_catchment_metrics, AreaPolicy, CatchmentConfig, CatchmentMetrics,
        CatchmentPaths, CatchmentPipeline, CutlineClipper, D8Delineator, Delineator,
        GdalWarpClipper, RasterClipper,
    };
    pub use crate::clip::clip_to_cutline;
    pub use crate::hydrology::{
        flow_accumulation, flow_direction, polygonize, resolve_flats, snap_pour_point,
        stream_network, watershed,
    };
    pub use crate::vector::area;
    pub use catchment_core::prelude::*;
}
