//! Raster clipping by a polygon cutline
//!
//! The output covers the cutline's bounding box, snapped outward to the
//! source grid and intersected with the source extent. Cells whose center
//! lies strictly inside the cutline keep their value; every other cell is
//! set to the source no-data value, or the cell type's default no-data when
//! the source declares none. The output always declares that no-data value.

use crate::maybe_rayon::*;
use catchment_core::raster::{Raster, RasterElement};
use catchment_core::{Error, Result};
use geo::{BoundingRect, Contains, MultiPolygon, Point};

const CLIP_TOOL: &str = "cutline";

/// Grid coordinates closer than this to a cell boundary count as on it
const GRID_EPSILON: f64 = 1e-9;

fn clip_failed(reason: impl Into<String>) -> Error {
    Error::ClipFailed {
        tool: CLIP_TOOL.into(),
        code: None,
        reason: reason.into(),
    }
}

/// Cell window `(row, col, rows, cols)` covering the cutline's bounding box
fn cutline_window<T: RasterElement>(
    raster: &Raster<T>,
    cutline: &MultiPolygon<f64>,
) -> Result<(usize, usize, usize, usize)> {
    let bbox = cutline
        .bounding_rect()
        .ok_or_else(|| clip_failed("cutline has no polygons"))?;

    let (min, max) = (bbox.min(), bbox.max());
    let transform = raster.transform();
    let corners = [
        transform.geo_to_pixel(min.x, min.y),
        transform.geo_to_pixel(max.x, min.y),
        transform.geo_to_pixel(min.x, max.y),
        transform.geo_to_pixel(max.x, max.y),
    ];
    if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
        return Err(clip_failed("raster has a degenerate geotransform"));
    }

    let (col_lo, row_lo, col_hi, row_hi) = corners.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(c0, r0, c1, r1), &(c, r)| (c0.min(c), r0.min(r), c1.max(c), r1.max(r)),
    );

    let clamp = |v: f64, limit: usize| v.max(0.0).min(limit as f64) as usize;
    let (rows, cols) = raster.shape();
    let col0 = clamp((col_lo + GRID_EPSILON).floor(), cols);
    let col1 = clamp((col_hi - GRID_EPSILON).ceil(), cols);
    let row0 = clamp((row_lo + GRID_EPSILON).floor(), rows);
    let row1 = clamp((row_hi - GRID_EPSILON).ceil(), rows);

    if col0 >= col1 || row0 >= row1 {
        return Err(clip_failed("cutline does not overlap the raster"));
    }

    Ok((row0, col0, row1 - row0, col1 - col0))
}

/// Crop `raster` to the cutline and mask cells outside it.
///
/// Fails with [`Error::ClipFailed`] when the cutline is empty or does not
/// overlap the raster.
pub fn clip_to_cutline<T: RasterElement>(
    raster: &Raster<T>,
    cutline: &MultiPolygon<f64>,
) -> Result<Raster<T>> {
    let (row0, col0, rows, cols) = cutline_window(raster, cutline)?;
    let mut output = raster.window(row0, col0, rows, cols)?;
    let nodata = raster.nodata().unwrap_or_else(T::default_nodata);

    let transform = *output.transform();
    let outside: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let (x, y) = transform.pixel_to_geo(col, row);
                    !cutline.contains(&Point::new(x, y))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    for (cell, &masked) in output.data_mut().iter_mut().zip(&outside) {
        if masked {
            *cell = nodata;
        }
    }
    output.set_nodata(Some(nodata));

    Ok(output)
}
