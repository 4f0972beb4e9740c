//! Drainage across flats
//!
//! Filling a DEM leaves level areas where depressions used to be, and D8
//! finds no downslope neighbor on them. Flat cells are routed breadth-first
//! toward the nearest cell of the same elevation that already drains, so
//! flow crosses a flat along the shortest path to its spill point. Edge
//! cells drain off the grid and act as spill points as well.

use super::{opposite_dir, D8_OFFSETS};
use catchment_core::raster::Raster;
use catchment_core::{Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// Give every flat cell of `flow_dir` a direction toward its spill point.
///
/// Only interior cells with code 0 that are connected, through cells of
/// equal elevation, to a draining cell are changed. Pits surrounded by
/// higher ground keep code 0. Returns the number of cells routed.
pub fn resolve_flats(dem: &Raster<f64>, flow_dir: &mut Raster<u8>) -> Result<usize> {
    let (rows, cols) = dem.shape();
    if flow_dir.shape() != (rows, cols) {
        let (ar, ac) = flow_dir.shape();
        return Err(Error::SizeMismatch { er: rows, ec: cols, ar, ac });
    }

    let mut drained = Array2::<bool>::from_elem((rows, cols), false);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for ((row, col), &z) in dem.data().indexed_iter() {
        if dem.is_nodata(z) {
            continue;
        }
        let on_edge = row == 0 || col == 0 || row + 1 == rows || col + 1 == cols;
        if on_edge || flow_dir.data()[(row, col)] != 0 {
            drained[(row, col)] = true;
            queue.push_back((row, col));
        }
    }

    let mut routed = 0;
    while let Some((row, col)) = queue.pop_front() {
        let z = dem.data()[(row, col)];

        for (idx, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
            let Some(next) = dem.neighbor(row, col, dr, dc) else {
                continue;
            };
            if drained[next] || dem.data()[next] != z {
                continue;
            }

            flow_dir.data_mut()[next] = opposite_dir((idx + 1) as u8);
            drained[next] = true;
            queue.push_back(next);
            routed += 1;
        }
    }

    Ok(routed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::steepest_descent;
    use crate::hydrology::{flow_accumulation, watershed, WatershedParams};
    use catchment_core::GeoTransform;

    fn dem_from(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, f(row, col)).unwrap();
            }
        }
        dem
    }

    /// 3x3 filled lake at 5.0 inside a rim at 9.0, spilling east through
    /// a channel along row 2 that leaves the grid at (2, 6)
    fn filled_lake() -> Raster<f64> {
        dem_from(5, 7, |row, col| match (row, col) {
            (1..=3, 1..=3) => 5.0,
            (2, 4) => 4.0,
            (2, 5) => 3.0,
            (2, 6) => 2.0,
            _ => 9.0,
        })
    }

    #[test]
    fn test_lake_routes_to_spill_point() {
        let dem = filled_lake();
        let mut fdir = steepest_descent(&dem).unwrap();
        assert_eq!(fdir.get(2, 1).unwrap(), 0);

        let routed = resolve_flats(&dem, &mut fdir).unwrap();
        assert_eq!(routed, 6);
        for row in 1..=3 {
            for col in 1..=3 {
                assert_ne!(fdir.get(row, col).unwrap(), 0, "({row}, {col}) still flat");
            }
        }
        assert_eq!(fdir.get(1, 1).unwrap(), 1, "expected E toward the spill");

        let basins = watershed(&fdir, WatershedParams { pour_points: vec![(2, 6)] }).unwrap();
        for row in 1..=3 {
            for col in 1..=3 {
                assert_eq!(basins.get(row, col).unwrap(), 1);
            }
        }
    }

    #[test]
    fn test_closed_pit_keeps_no_outflow() {
        let mut dem = dem_from(3, 3, |_, _| 5.0);
        dem.set(1, 1, 1.0).unwrap();
        let mut fdir = steepest_descent(&dem).unwrap();

        assert_eq!(resolve_flats(&dem, &mut fdir).unwrap(), 0);
        assert_eq!(fdir.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_level_grid_drains_to_its_edges() {
        let dem = dem_from(5, 5, |_, _| 100.0);
        let mut fdir = steepest_descent(&dem).unwrap();

        assert_eq!(resolve_flats(&dem, &mut fdir).unwrap(), 9);
        for row in 0..5 {
            for col in 0..5 {
                let edge = row == 0 || col == 0 || row == 4 || col == 4;
                assert_eq!(fdir.get(row, col).unwrap() == 0, edge, "({row}, {col})");
            }
        }

        // Every interior cell ends on an edge cell
        let acc = flow_accumulation(&fdir).unwrap();
        let on_edges: f64 = (0..5)
            .flat_map(|row| (0..5).map(move |col| (row, col)))
            .filter(|&(row, col)| row == 0 || col == 0 || row == 4 || col == 4)
            .map(|(row, col)| acc.get(row, col).unwrap())
            .sum();
        assert_eq!(on_edges, 9.0);
    }

    #[test]
    fn test_nodata_is_never_routed() {
        let mut dem = dem_from(4, 4, |_, _| 7.0);
        dem.set_nodata(Some(-9999.0));
        dem.set(1, 1, -9999.0).unwrap();
        let mut fdir = steepest_descent(&dem).unwrap();

        resolve_flats(&dem, &mut fdir).unwrap();
        assert_eq!(fdir.get(1, 1).unwrap(), 0);
        assert_ne!(fdir.get(2, 2).unwrap(), 0);
    }

    #[test]
    fn test_shape_mismatch() {
        let dem = dem_from(3, 3, |_, _| 1.0);
        let mut fdir: Raster<u8> = Raster::new(2, 3);
        assert!(matches!(
            resolve_flats(&dem, &mut fdir),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
