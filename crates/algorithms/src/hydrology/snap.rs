//! Pour point snapping
//!
//! Moves an outlet cell onto the nearest stream cell inside a square search
//! window. Ties on distance go to the cell with the larger accumulation, then
//! to the first in row-major order.

use catchment_core::raster::Raster;
use catchment_core::{Error, Result};

/// Parameters for pour point snapping
#[derive(Debug, Clone)]
pub struct SnapParams {
    /// Search radius in cells
    pub snap_distance: usize,
}

impl Default for SnapParams {
    fn default() -> Self {
        Self { snap_distance: 10 }
    }
}

/// Result of snapping an outlet cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedPoint {
    pub row: usize,
    pub col: usize,
    /// Euclidean displacement in cells
    pub distance: f64,
}

impl SnappedPoint {
    pub fn moved(&self) -> bool {
        self.distance > 0.0
    }
}

/// Snap `(row, col)` to the nearest stream cell within `snap_distance` cells.
///
/// Fails with [`Error::NoStreamNearOutlet`] when the window holds no stream.
pub fn snap_pour_point(
    streams: &Raster<u8>,
    flow_acc: &Raster<f64>,
    (row, col): (usize, usize),
    params: &SnapParams,
) -> Result<SnappedPoint> {
    let (rows, cols) = streams.shape();
    if flow_acc.shape() != (rows, cols) {
        let (ar, ac) = flow_acc.shape();
        return Err(Error::SizeMismatch { er: rows, ec: cols, ar, ac });
    }
    if row >= rows || col >= cols {
        return Err(Error::IndexOutOfBounds { row, col, rows, cols });
    }

    let radius = params.snap_distance;
    let mut best: Option<(f64, f64, usize, usize)> = None;

    for r in row.saturating_sub(radius)..=(row + radius).min(rows - 1) {
        for c in col.saturating_sub(radius)..=(col + radius).min(cols - 1) {
            if streams.data()[(r, c)] == 0 {
                continue;
            }

            let dr = r as f64 - row as f64;
            let dc = c as f64 - col as f64;
            let dist = (dr * dr + dc * dc).sqrt();
            let acc = flow_acc.data()[(r, c)];

            let better = match best {
                None => true,
                Some((best_dist, best_acc, _, _)) => {
                    dist < best_dist || (dist == best_dist && acc > best_acc)
                }
            };
            if better {
                best = Some((dist, acc, r, c));
            }
        }
    }

    match best {
        Some((distance, _, r, c)) => Ok(SnappedPoint { row: r, col: c, distance }),
        None => Err(Error::NoStreamNearOutlet {
            row,
            col,
            snap_distance: radius,
        }),
    }
}
