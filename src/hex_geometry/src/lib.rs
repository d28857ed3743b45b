#![warn(clippy::pedantic)]

use std::collections::{HashMap, VecDeque};

use itertools::Itertools;
use thiserror::Error;

/// Axial coordinate offsets of the six directions around a cell. Direction
/// `d` and direction `(d + 3) % 6` point opposite each other.
pub const DU: [i32; 6] = [-1, 0, 1, 1, 0, -1];
pub const DV: [i32; 6] = [0, 1, 1, 0, -1, -1];

pub const MIN_N: usize = 2;
pub const MAX_N: usize = 27;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HexGeometryError {
    #[error("Board size parameter must be between {MIN_N} and {MAX_N}, got {n}")]
    UnsupportedSize { n: usize },
    #[error("Cell {cell} has no neighbor in direction {direction} after wrapping")]
    UnmappedNeighbor { cell: usize, direction: usize },
}

/// The immutable board a search runs on: a hexagon of `2n - 1` rows whose
/// opposite edges are glued together, so that every cell has exactly six
/// neighbors.
#[derive(Debug, Clone)]
pub struct HexGeometry {
    n: usize,
    size: usize,
    center: usize,
    coords: Box<[(i32, i32)]>,
    rot: Box<[[u32; 6]]>,
    dist: Box<[u32]>,
    target_pos_to_tok: Box<[u32]>,
    target_tok_to_pos: Box<[u32]>,
}

/// Number of cells in row `u` of a board with parameter `n`.
fn row_len(n: i32, u: i32) -> i32 {
    2 * n - 1 - (u - (n - 1)).abs()
}

impl HexGeometry {
    /// Build the rotation table, the distance table and the target layout
    /// for board size parameter `n`.
    ///
    /// # Errors
    ///
    /// If `n` is out of range, or if wrapping fails to map some neighbor back
    /// onto the board.
    pub fn new(n: usize) -> Result<Self, HexGeometryError> {
        if !(MIN_N..=MAX_N).contains(&n) {
            return Err(HexGeometryError::UnsupportedSize { n });
        }
        let ni = n as i32;

        // Translations of the lattice that tiles the plane with copies of
        // the board.
        let translations = [
            (0, 0),
            (2 * ni - 1, ni - 1),
            (ni - 1, -ni),
            (-ni, -(2 * ni - 1)),
            (-(2 * ni - 1), -(ni - 1)),
            (-(ni - 1), ni),
            (ni, 2 * ni - 1),
        ];

        let coords = (0..2 * ni - 1)
            .flat_map(|u| (0..row_len(ni, u)).map(move |icol| (u, icol + (u - (ni - 1)).max(0))))
            .collect::<Box<[_]>>();
        let size = coords.len();

        let mut from_coord = HashMap::with_capacity(size * translations.len());
        for (cell, &(u, v)) in coords.iter().enumerate() {
            for (tu, tv) in translations {
                from_coord.insert((u + tu, v + tv), cell as u32);
            }
        }

        let center = from_coord[&(ni - 1, ni - 1)] as usize;

        let mut rot = vec![[0; 6]; size].into_boxed_slice();
        for (cell, &(u, v)) in coords.iter().enumerate() {
            for direction in 0..6 {
                rot[cell][direction] = *from_coord
                    .get(&(u + DU[direction], v + DV[direction]))
                    .ok_or(HexGeometryError::UnmappedNeighbor { cell, direction })?;
            }
        }

        let dist = all_pairs_distances(&rot);

        let target_pos_to_tok = (0..size)
            .map(|pos| match pos.cmp(&center) {
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Less => pos as u32 + 1,
                std::cmp::Ordering::Greater => pos as u32,
            })
            .collect::<Box<[_]>>();
        let mut target_tok_to_pos = vec![0; size].into_boxed_slice();
        for (pos, &tok) in target_pos_to_tok.iter().enumerate() {
            target_tok_to_pos[tok as usize] = pos as u32;
        }

        Ok(Self {
            n,
            size,
            center,
            coords,
            rot,
            dist,
            target_pos_to_tok,
            target_tok_to_pos,
        })
    }

    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of cells, including the hole.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn center(&self) -> usize {
        self.center
    }

    /// The neighbor of `cell` in `direction`.
    #[inline(always)]
    #[must_use]
    pub fn neighbor(&self, cell: usize, direction: usize) -> usize {
        self.rot[cell][direction] as usize
    }

    /// Shortest path length between two cells.
    #[inline(always)]
    #[must_use]
    pub fn dist(&self, a: usize, b: usize) -> u32 {
        self.dist[a * self.size + b]
    }

    /// The largest distance between any two cells.
    #[must_use]
    pub fn diameter(&self) -> u32 {
        self.dist.iter().copied().max().unwrap_or(0)
    }

    /// Axial coordinate of a cell.
    #[must_use]
    pub fn coord(&self, cell: usize) -> (i32, i32) {
        self.coords[cell]
    }

    #[must_use]
    pub fn target_pos_to_tok(&self) -> &[u32] {
        &self.target_pos_to_tok
    }

    #[must_use]
    pub fn target_tok_to_pos(&self) -> &[u32] {
        &self.target_tok_to_pos
    }

    /// Cell ids grouped by board row, top to bottom.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<usize>> {
        let rows = (0..self.size).chunk_by(|&cell| self.coords[cell].0);
        rows.into_iter().map(|(_, row)| row.collect()).collect()
    }
}

fn all_pairs_distances(rot: &[[u32; 6]]) -> Box<[u32]> {
    let size = rot.len();
    let mut dist = vec![u32::MAX; size * size].into_boxed_slice();
    let mut queue = VecDeque::with_capacity(size);
    for source in 0..size {
        let row = &mut dist[source * size..(source + 1) * size];
        row[source] = 0;
        queue.push_back(source);
        while let Some(cell) = queue.pop_front() {
            let next = row[cell] + 1;
            for &neighbor in &rot[cell] {
                let neighbor = neighbor as usize;
                if row[neighbor] == u32::MAX {
                    row[neighbor] = next;
                    queue.push_back(neighbor);
                }
            }
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_counts() {
        for n in MIN_N..=12 {
            let geometry = HexGeometry::new(n).unwrap();
            assert_eq!(geometry.size(), 3 * n * n - 3 * n + 1);
        }
        assert_eq!(HexGeometry::new(3).unwrap().size(), 19);
        assert_eq!(HexGeometry::new(27).unwrap().size(), 2107);
    }

    #[test]
    fn test_rejects_unsupported_sizes() {
        assert_eq!(
            HexGeometry::new(1).unwrap_err(),
            HexGeometryError::UnsupportedSize { n: 1 }
        );
        assert!(HexGeometry::new(MAX_N + 1).is_err());
    }

    #[test]
    fn test_center_is_hole_of_target() {
        let geometry = HexGeometry::new(3).unwrap();
        assert_eq!(geometry.center(), 9);
        assert_eq!(geometry.coord(geometry.center()), (2, 2));
        assert_eq!(geometry.target_pos_to_tok()[geometry.center()], 0);
        assert_eq!(geometry.target_tok_to_pos()[0] as usize, geometry.center());
        for pos in 0..geometry.size() {
            let tok = geometry.target_pos_to_tok()[pos];
            assert_eq!(geometry.target_tok_to_pos()[tok as usize] as usize, pos);
        }
    }

    #[test]
    fn test_rotation_table_is_consistent() {
        for n in [2, 3, 4, 7] {
            let geometry = HexGeometry::new(n).unwrap();
            for a in 0..geometry.size() {
                let neighbors = (0..6).map(|d| geometry.neighbor(a, d)).collect_vec();
                assert!(neighbors.iter().all_unique());
                for d in 0..6 {
                    let b = geometry.neighbor(a, d);
                    assert_eq!(geometry.neighbor(b, (d + 3) % 6), a);
                    // Walking two sides of a triangle lands on the third
                    // corner, which makes `(m + 3) % 6` the inverse move.
                    assert_eq!(
                        geometry.neighbor(b, (d + 2) % 6),
                        geometry.neighbor(a, (d + 1) % 6)
                    );
                }
            }
        }
    }

    #[test]
    fn test_distances_form_a_metric() {
        let geometry = HexGeometry::new(4).unwrap();
        let size = geometry.size();
        for a in 0..size {
            assert_eq!(geometry.dist(a, a), 0);
            for d in 0..6 {
                assert_eq!(geometry.dist(a, geometry.neighbor(a, d)), 1);
            }
            for b in 0..size {
                assert_eq!(geometry.dist(a, b), geometry.dist(b, a));
                assert!(a == b || geometry.dist(a, b) > 0);
                for c in 0..size {
                    assert!(geometry.dist(a, c) <= geometry.dist(a, b) + geometry.dist(b, c));
                }
            }
        }
        assert_eq!(geometry.diameter(), 3);
    }

    #[test]
    fn test_rows() {
        let geometry = HexGeometry::new(3).unwrap();
        let lens = geometry.rows().iter().map(Vec::len).collect_vec();
        assert_eq!(lens, vec![3, 4, 5, 4, 3]);
    }
}
