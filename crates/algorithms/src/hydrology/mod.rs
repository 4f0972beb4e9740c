//! D8 hydrology used by the built-in delineation collaborator
//!
//! - Flow direction: steepest descent to one of eight neighbors
//! - Flats: routing across level areas to their spill points
//! - Flow accumulation: upstream contributing cell count
//! - Stream network: accumulation thresholding
//! - Pour point snapping: move an outlet onto the nearest stream cell
//! - Watershed: all cells draining to a pour point
//! - Polygonize: trace a basin mask into a cell-aligned polygon

mod flats;
pub(crate) mod flow_accumulation;
pub(crate) mod flow_direction;
mod polygonize;
mod snap;
mod stream_network;
mod watershed;

pub use flats::resolve_flats;
pub use flow_accumulation::flow_accumulation;
pub use flow_direction::flow_direction;
pub use polygonize::polygonize;
pub use snap::{snap_pour_point, SnapParams, SnappedPoint};
pub use stream_network::{stream_network, StreamNetworkParams};
pub use watershed::{watershed, WatershedParams};

/// D8 neighbor offsets `(row, col)` indexed by direction code - 1:
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
pub(crate) const D8_OFFSETS: [(isize, isize); 8] = [
    (0, 1),   // 1: E
    (-1, 1),  // 2: NE
    (-1, 0),  // 3: N
    (-1, -1), // 4: NW
    (0, -1),  // 5: W
    (1, -1),  // 6: SW
    (1, 0),   // 7: S
    (1, 1),   // 8: SE
];

/// Offset a direction code points to, `None` for pits (0) and invalid codes
pub(crate) fn d8_offset(dir: u8) -> Option<(isize, isize)> {
    match dir {
        1..=8 => Some(D8_OFFSETS[(dir - 1) as usize]),
        _ => None,
    }
}

/// Direction code pointing back at the cell that lies in direction `dir`
pub(crate) fn opposite_dir(dir: u8) -> u8 {
    if dir == 0 {
        return 0;
    }
    ((dir - 1 + 4) % 8) + 1
}
