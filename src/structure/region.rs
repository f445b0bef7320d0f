use crate::spreadsheet::{Bounds, Grid};
use std::collections::BTreeSet;

/// One maximal 4-connected blob of non-empty cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub bounds: Bounds,
    /// Number of member cells
    pub area: usize,
    /// Member cells as `(row, col)`
    pub cells: BTreeSet<(usize, usize)>,
}

impl Region {
    /// Share of the bounding box occupied by member cells.
    pub fn density(&self) -> f64 {
        self.area as f64 / (self.bounds.height() * self.bounds.width()) as f64
    }
}

/// Finds all 4-connected regions of non-empty cells with an area above one.
///
/// Seeds are visited row-major from `(0, 0)`, so the order of the returned
/// regions is stable for identical grids.
pub fn find_regions(grid: &Grid) -> Vec<Region> {
    let height = grid.height();
    let width = grid.width();
    let filled: Vec<Vec<bool>> = (0..height)
        .map(|row| (0..width).map(|col| !grid.get(row, col).is_blank()).collect())
        .collect();
    let mut visited = vec![vec![false; width]; height];
    let mut regions = vec![];

    for row in 0..height {
        for col in 0..width {
            if !filled[row][col] || visited[row][col] {
                continue;
            }
            let cells = flood_fill(&filled, &mut visited, row, col);
            if cells.len() > 1 {
                regions.push(to_region(cells));
            }
        }
    }
    regions
}

fn flood_fill(
    filled: &[Vec<bool>],
    visited: &mut [Vec<bool>],
    row: usize,
    col: usize,
) -> BTreeSet<(usize, usize)> {
    let mut cells = BTreeSet::new();
    let mut stack = vec![(row, col)];
    visited[row][col] = true;
    while let Some((row, col)) = stack.pop() {
        cells.insert((row, col));
        let mut neighbours = Vec::with_capacity(4);
        if row > 0 {
            neighbours.push((row - 1, col));
        }
        if row + 1 < filled.len() {
            neighbours.push((row + 1, col));
        }
        if col > 0 {
            neighbours.push((row, col - 1));
        }
        if col + 1 < filled[row].len() {
            neighbours.push((row, col + 1));
        }
        for (next_row, next_col) in neighbours {
            if filled[next_row][next_col] && !visited[next_row][next_col] {
                visited[next_row][next_col] = true;
                stack.push((next_row, next_col));
            }
        }
    }
    cells
}

fn to_region(cells: BTreeSet<(usize, usize)>) -> Region {
    let (mut min_row, mut max_row) = (usize::MAX, 0);
    let (mut min_col, mut max_col) = (usize::MAX, 0);
    for &(row, col) in &cells {
        min_row = min_row.min(row);
        max_row = max_row.max(row);
        min_col = min_col.min(col);
        max_col = max_col.max(col);
    }
    Region {
        bounds: Bounds::new(min_row, max_row, min_col, max_col),
        area: cells.len(),
        cells,
    }
}
