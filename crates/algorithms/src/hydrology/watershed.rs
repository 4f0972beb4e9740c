//! Watershed delineation from pour points
//!
//! Every cell whose D8 path reaches a pour point gets that pour point's
//! basin label (1-indexed, in the order given). Unlabelled cells are 0.

use super::{opposite_dir, D8_OFFSETS};
use catchment_core::raster::Raster;
use catchment_core::{Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// Parameters for watershed delineation
#[derive(Debug, Clone, Default)]
pub struct WatershedParams {
    /// Pour points as (row, col)
    pub pour_points: Vec<(usize, usize)>,
}

/// Label the cells draining to each pour point.
///
/// A pour point that lies inside an earlier pour point's basin keeps its
/// own label only for the cells upstream of it.
pub fn watershed(flow_dir: &Raster<u8>, params: WatershedParams) -> Result<Raster<i32>> {
    if params.pour_points.is_empty() {
        return Err(Error::InvalidParameter {
            name: "pour_points",
            value: "[]".into(),
            reason: "at least one pour point is required".into(),
        });
    }

    let (rows, cols) = flow_dir.shape();
    let mut basins = Array2::<i32>::zeros((rows, cols));
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for (id, &(row, col)) in params.pour_points.iter().enumerate() {
        if row >= rows || col >= cols {
            return Err(Error::IndexOutOfBounds { row, col, rows, cols });
        }
        basins[(row, col)] = (id + 1) as i32;
        queue.push_back((row, col));
    }

    // BFS upstream: neighbor in direction d drains here when its code is opposite(d)
    while let Some((row, col)) = queue.pop_front() {
        let basin_id = basins[(row, col)];

        for (idx, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
            let Some(next) = flow_dir.neighbor(row, col, dr, dc) else {
                continue;
            };
            if basins[next] != 0 {
                continue;
            }
            if flow_dir.data()[next] == opposite_dir((idx + 1) as u8) {
                basins[next] = basin_id;
                queue.push_back(next);
            }
        }
    }

    let mut output = flow_dir.with_same_meta::<i32>(rows, cols);
    output.set_nodata(Some(0));
    *output.data_mut() = basins;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::flow_direction;
    use catchment_core::GeoTransform;

    fn ridge_dem() -> Raster<f64> {
        // Ridge at col 3: the left half drains west, the right half east,
        // and everything also tilts south
        let mut dem = Raster::new(5, 7);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        for row in 0..5 {
            for col in 0..7 {
                let dist_from_ridge = (col as f64 - 3.0).abs();
                dem.set(row, col, 10.0 - dist_from_ridge - 0.1 * row as f64).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_watershed_from_pour_point() {
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        for row in 0..5 {
            for col in 0..5 {
                dem.set(row, col, (5 - row) as f64 * 10.0).unwrap();
            }
        }

        let fdir = flow_direction(&dem).unwrap();
        let basins = watershed(&fdir, WatershedParams { pour_points: vec![(4, 2)] }).unwrap();

        // South slope: only column 2 drains to (4, 2)
        for row in 0..5 {
            assert_eq!(basins.get(row, 2).unwrap(), 1);
            assert_eq!(basins.get(row, 1).unwrap(), 0);
        }
    }

    #[test]
    fn test_watershed_two_pour_points_on_ridge() {
        let fdir = flow_direction(&ridge_dem()).unwrap();
        let basins = watershed(
            &fdir,
            WatershedParams { pour_points: vec![(2, 0), (2, 6)] },
        )
        .unwrap();

        assert_eq!(basins.get(2, 0).unwrap(), 1);
        assert_eq!(basins.get(2, 6).unwrap(), 2);
        assert_eq!(basins.get(2, 1).unwrap(), 1);
        assert_eq!(basins.get(2, 5).unwrap(), 2);
    }

    #[test]
    fn test_watershed_rejects_bad_pour_points() {
        let fdir: Raster<u8> = Raster::new(3, 3);
        assert!(watershed(&fdir, WatershedParams::default()).is_err());
        assert!(matches!(
            watershed(&fdir, WatershedParams { pour_points: vec![(3, 0)] }),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }
}
