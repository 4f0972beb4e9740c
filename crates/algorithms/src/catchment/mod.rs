//! Catchment area and stream length for a single outlet
//!
//! The pipeline runs four steps, each reading the previous step's files:
//!
//! 1. delineation ([`Delineator`]): watershed polygon, snapped outlet and
//!    stream raster
//! 2. area of the watershed polygon ([`watershed_area`])
//! 3. clip of the stream raster to the polygon ([`RasterClipper`])
//! 4. stream length of the clipped raster ([`stream_length`])
//!
//! Only a clip failure is recovered from: [`CatchmentPipeline::run`] then
//! returns [`CatchmentMetrics::undefined`].

mod clipper;
mod config;
mod delineate;
mod pipeline;
mod summary;

pub use clipper::{CutlineClipper, GdalWarpClipper, RasterClipper};
pub use config::{AreaPolicy, CatchmentConfig, CatchmentPaths};
pub use delineate::{D8Delineator, DelineationOutputs, DelineationRequest, Delineator, WATERSHED_ID_FIELD};
pub use pipeline::{compute_catchment_metrics, CatchmentMetrics, CatchmentPipeline};
pub use summary::{raster_stream_length, stream_length, watershed_area, AREA_FIELD};
