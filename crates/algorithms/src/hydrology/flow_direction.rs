//! D8 flow direction
//!
//! Each cell drains to its steepest downslope neighbor. Distance to the
//! diagonal neighbors is scaled by √2. Flats are then routed to their spill
//! points (see [`resolve_flats`]). Pits, no-data cells and edge cells with
//! no lower neighbor keep code 0.

use super::flats::resolve_flats;
use super::D8_OFFSETS;
use crate::maybe_rayon::*;
use catchment_core::raster::Raster;
use catchment_core::{Error, Result};
use ndarray::Array2;
use tracing::debug;

const D8_DIST: [f64; 8] = [
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
];

fn steepest_neighbor(dem: &Raster<f64>, row: usize, col: usize, cell_size: f64) -> u8 {
    let center = dem.data()[(row, col)];
    if dem.is_nodata(center) {
        return 0;
    }

    let mut max_drop = 0.0_f64;
    let mut best_dir = 0u8;

    for (idx, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
        let Some((nr, nc)) = dem.neighbor(row, col, dr, dc) else {
            continue;
        };

        let neighbor = dem.data()[(nr, nc)];
        if dem.is_nodata(neighbor) {
            continue;
        }

        let drop = (center - neighbor) / (D8_DIST[idx] * cell_size);
        if drop > max_drop {
            max_drop = drop;
            best_dir = (idx + 1) as u8;
        }
    }

    best_dir
}

/// Calculate D8 flow direction codes from a filled DEM, flats included.
///
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let mut output = steepest_descent(dem)?;
    let routed = resolve_flats(dem, &mut output)?;
    if routed > 0 {
        debug!(cells = routed, "flat cells routed to their spill points");
    }
    Ok(output)
}

/// Steepest-descent codes only; flats are left at 0
pub(crate) fn steepest_descent(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let cell_size = dem.cell_size();
    if cell_size.is_nan() || cell_size <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: cell_size.to_string(),
            reason: "DEM cell size must be positive".into(),
        });
    }

    let codes: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| steepest_neighbor(dem, row, col, cell_size))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = dem.with_same_meta::<u8>(rows, cols);
    *output.data_mut() = Array2::from_shape_vec((rows, cols), codes)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
