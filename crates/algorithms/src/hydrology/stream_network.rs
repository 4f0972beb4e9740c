//! Stream network extraction
//!
//! A cell is a channel when at least `threshold` upstream cells drain
//! through it. Output is binary: 1 = stream, 0 = non-stream, and 0 is also
//! the declared no-data value.

use catchment_core::raster::Raster;
use catchment_core::{Error, Result};
use ndarray::Zip;

/// Parameters for stream network extraction
#[derive(Debug, Clone)]
pub struct StreamNetworkParams {
    /// Minimum upstream contributing cell count for a stream cell
    pub threshold: usize,
}

impl Default for StreamNetworkParams {
    fn default() -> Self {
        Self { threshold: 10 }
    }
}

/// Extract a binary stream raster from flow accumulation
pub fn stream_network(flow_acc: &Raster<f64>, params: StreamNetworkParams) -> Result<Raster<u8>> {
    if params.threshold == 0 {
        return Err(Error::InvalidParameter {
            name: "flow_threshold",
            value: "0".into(),
            reason: "must be a positive cell count".into(),
        });
    }

    let (rows, cols) = flow_acc.shape();
    let threshold = params.threshold as f64;

    let mut output = flow_acc.with_same_meta::<u8>(rows, cols);
    Zip::from(output.data_mut())
        .and(flow_acc.data())
        .for_each(|out, &acc| {
            if !flow_acc.is_nodata(acc) && acc >= threshold {
                *out = 1;
            }
        });
    output.set_nodata(Some(0));

    Ok(output)
}
