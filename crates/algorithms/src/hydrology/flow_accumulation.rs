//! Flow accumulation
//!
//! Number of upstream cells draining through each cell under D8 routing.
//! A cell does not count itself, so headwater cells have accumulation 0.

use super::d8_offset;
use catchment_core::raster::Raster;
use catchment_core::Result;
use ndarray::Array2;

fn downstream(flow_dir: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    let (dr, dc) = d8_offset(flow_dir.data()[(row, col)])?;
    flow_dir.neighbor(row, col, dr, dc)
}

/// Calculate flow accumulation from a D8 flow direction raster.
///
/// Topological pass: cells with no inflow are queued first, and a cell is
/// queued once every upstream neighbor has handed its count down.
pub fn flow_accumulation(flow_dir: &Raster<u8>) -> Result<Raster<f64>> {
    let (rows, cols) = flow_dir.shape();

    let mut in_degree = Array2::<u32>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            if let Some(cell) = downstream(flow_dir, row, col) {
                in_degree[cell] += 1;
            }
        }
    }

    let mut queue: Vec<(usize, usize)> = in_degree
        .indexed_iter()
        .filter(|(_, n)| **n == 0)
        .map(|(idx, _)| idx)
        .collect();
    let mut accumulation = Array2::<f64>::zeros((rows, cols));

    while let Some((row, col)) = queue.pop() {
        let Some(next) = downstream(flow_dir, row, col) else {
            continue;
        };

        accumulation[next] += accumulation[(row, col)] + 1.0;
        in_degree[next] -= 1;
        if in_degree[next] == 0 {
            queue.push(next);
        }
    }

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    *output.data_mut() = accumulation;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::flow_direction;
    use catchment_core::GeoTransform;

    #[test]
    fn test_flow_accumulation_linear() {
        // 1x5 strip sloping east
        let mut dem = Raster::new(1, 5);
        dem.set_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        for col in 0..5 {
            dem.set(0, col, (5 - col) as f64).unwrap();
        }

        let acc = flow_accumulation(&flow_direction(&dem).unwrap()).unwrap();
        let values: Vec<f64> = (0..5).map(|c| acc.get(0, c).unwrap()).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_flow_accumulation_convergent() {
        //  5 5 5
        //  5 1 5
        //  5 5 5
        let mut dem = Raster::filled(3, 3, 5.0);
        dem.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        dem.set(1, 1, 1.0).unwrap();

        let acc = flow_accumulation(&flow_direction(&dem).unwrap()).unwrap();
        assert_eq!(acc.get(1, 1).unwrap(), 8.0);
    }

    #[test]
    fn test_flow_accumulation_total_is_conserved() {
        // 4 rows sloping south: every column is an independent chain of 4
        let mut dem = Raster::new(4, 3);
        dem.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        for row in 0..4 {
            for col in 0..3 {
                dem.set(row, col, (10 - row) as f64).unwrap();
            }
        }

        let acc = flow_accumulation(&flow_direction(&dem).unwrap()).unwrap();
        for col in 0..3 {
            assert_eq!(acc.get(0, col).unwrap(), 0.0);
            assert_eq!(acc.get(3, col).unwrap(), 3.0);
        }
    }
}
