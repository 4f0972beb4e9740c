//! Basin mask to polygon
//!
//! Traces the outline of all cells carrying one label along cell
//! boundaries. Each boundary edge is walked with the basin on its right
//! (in row-down grid space); at a vertex shared by two diagonal cells the
//! walk turns right, so cells touching only at a corner end up in separate
//! rings. Rings whose orientation matches a single cell are exteriors, the
//! others are holes. Output exteriors are counter-clockwise and holes
//! clockwise in world coordinates.

use catchment_core::raster::{GeoTransform, Raster};
use catchment_core::{Error, Result};
use geo::orient::{Direction, Orient};
use geo::{Area, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use std::collections::BTreeMap;

type Vertex = (usize, usize); // (x = col, y = row) in grid-vertex space

fn direction(from: Vertex, to: Vertex) -> (isize, isize) {
    (
        to.0 as isize - from.0 as isize,
        to.1 as isize - from.1 as isize,
    )
}

/// Right turn of a heading in row-down coordinates
fn right_of((dx, dy): (isize, isize)) -> (isize, isize) {
    (-dy, dx)
}

fn boundary_edges(labels: &Raster<i32>, label: i32) -> BTreeMap<Vertex, Vec<Vertex>> {
    let (rows, cols) = labels.shape();
    let inside = |r: isize, c: isize| {
        r >= 0
            && c >= 0
            && (r as usize) < rows
            && (c as usize) < cols
            && labels.data()[(r as usize, c as usize)] == label
    };

    let mut outgoing: BTreeMap<Vertex, Vec<Vertex>> = BTreeMap::new();
    let mut add = |from: Vertex, to: Vertex| outgoing.entry(from).or_default().push(to);

    for row in 0..rows {
        for col in 0..cols {
            if labels.data()[(row, col)] != label {
                continue;
            }
            let (r, c) = (row as isize, col as isize);
            if !inside(r - 1, c) {
                add((col, row), (col + 1, row));
            }
            if !inside(r, c + 1) {
                add((col + 1, row), (col + 1, row + 1));
            }
            if !inside(r + 1, c) {
                add((col + 1, row + 1), (col, row + 1));
            }
            if !inside(r, c - 1) {
                add((col, row + 1), (col, row));
            }
        }
    }

    outgoing
}

fn take_edge(outgoing: &mut BTreeMap<Vertex, Vec<Vertex>>, from: Vertex, to: Vertex) {
    if let Some(ends) = outgoing.get_mut(&from) {
        if let Some(pos) = ends.iter().position(|&v| v == to) {
            ends.swap_remove(pos);
        }
        if ends.is_empty() {
            outgoing.remove(&from);
        }
    }
}

fn trace_rings(mut outgoing: BTreeMap<Vertex, Vec<Vertex>>) -> Vec<Vec<Vertex>> {
    let mut rings = Vec::new();

    while let Some((&start, ends)) = outgoing.iter().next() {
        let first = ends[0];
        take_edge(&mut outgoing, start, first);

        let mut ring = vec![start];
        let mut prev = start;
        let mut current = first;

        loop {
            let heading = direction(prev, current);
            let mut candidates: Vec<Vertex> = outgoing.get(&current).cloned().unwrap_or_default();
            if current == start {
                candidates.push(first);
            }
            if candidates.is_empty() {
                break;
            }

            let turn = right_of(heading);
            let next = candidates
                .iter()
                .copied()
                .find(|&v| direction(current, v) == turn)
                .unwrap_or(candidates[0]);

            if current == start && next == first {
                break;
            }

            ring.push(current);
            take_edge(&mut outgoing, current, next);
            prev = current;
            current = next;
        }

        rings.push(drop_collinear(ring));
    }

    rings
}

fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    // Traced rings advance one cell edge at a time, so headings are unit steps
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            direction(prev, ring[i]) != direction(ring[i], next)
        })
        .map(|i| ring[i])
        .collect()
}

fn to_world(ring: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|&(x, y)| {
            let (wx, wy) = transform.pixel_to_geo_corner(x, y);
            Coord { x: wx, y: wy }
        })
        .collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

fn signed_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).signed_area()
}

/// Center of the cell on the outer side of a ring's first edge, in world
/// coordinates. For a hole this cell lies inside the hole.
fn point_outside_first_edge(ring: &[Vertex], transform: &GeoTransform) -> Option<Point<f64>> {
    let (x, y) = *ring.first()?;
    let (dx, dy) = direction((x, y), *ring.get(1)?);
    let (x, y) = (x as isize, y as isize);

    // The basin is on the right of every edge, so the cell on the left is outside it
    let (col, row) = match (dx.signum(), dy.signum()) {
        (1, 0) => (x, y - 1),
        (0, 1) => (x, y),
        (-1, 0) => (x - 1, y),
        (0, -1) => (x - 1, y - 1),
        _ => return None,
    };
    if col < 0 || row < 0 {
        return None;
    }

    let (px, py) = transform.pixel_to_geo(col as usize, row as usize);
    Some(Point::new(px, py))
}

/// Trace every cell equal to `label` into a multipolygon in world
/// coordinates.
///
/// The result's area equals the labelled cell count times the cell area.
pub fn polygonize(labels: &Raster<i32>, label: i32) -> Result<MultiPolygon<f64>> {
    let outgoing = boundary_edges(labels, label);
    if outgoing.is_empty() {
        return Err(Error::Other(format!("no cells carry label {label}")));
    }

    let transform = labels.transform();
    let reference = signed_area(&to_world(&[(0, 0), (1, 0), (1, 1), (0, 1)], transform)).signum();

    let mut exteriors: Vec<(LineString<f64>, f64)> = Vec::new();
    let mut holes: Vec<(LineString<f64>, Option<Point<f64>>)> = Vec::new();

    for ring in trace_rings(outgoing) {
        let world = to_world(&ring, transform);
        let area = signed_area(&world);
        if area.signum() == reference {
            exteriors.push((world, area.abs()));
        } else {
            holes.push((world, point_outside_first_edge(&ring, transform)));
        }
    }

    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); exteriors.len()];
    for (hole, outside) in holes {
        let owner = outside.and_then(|p| {
            exteriors
                .iter()
                .enumerate()
                .filter(|(_, (ext, _))| Polygon::new(ext.clone(), vec![]).contains(&p))
                .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
                .map(|(i, _)| i)
        });
        match owner {
            Some(i) => interiors[i].push(hole),
            None => {
                return Err(Error::Other(
                    "hole ring is not enclosed by any exterior ring".into(),
                ))
            }
        }
    }

    let polygons = exteriors
        .into_iter()
        .zip(interiors)
        .map(|((exterior, _), holes)| Polygon::new(exterior, holes).orient(Direction::Default))
        .collect();

    Ok(MultiPolygon::new(polygons))
}
