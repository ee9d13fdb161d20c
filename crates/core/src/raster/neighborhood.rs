//! Neighborhood patterns for focal raster operations

/// Defines a neighborhood pattern around a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// 3x3 neighborhood (8 neighbors + center)
    Queen3x3,
    /// 3x3 without corners (4 neighbors + center)
    Rook3x3,
    /// Square neighborhood of given radius in cells
    Square(usize),
}

impl Neighborhood {
    pub fn radius(&self) -> usize {
        match self {
            Neighborhood::Queen3x3 | Neighborhood::Rook3x3 => 1,
            Neighborhood::Square(r) => *r,
        }
    }

    /// Check if a relative position (drow, dcol) is within this neighborhood
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        match self {
            Neighborhood::Queen3x3 => dr.abs() <= 1 && dc.abs() <= 1,
            Neighborhood::Rook3x3 => dr.abs() + dc.abs() <= 1,
            Neighborhood::Square(r) => {
                let r = *r as isize;
                dr.abs() <= r && dc.abs() <= r
            }
        }
    }

    /// Relative positions in row-major order, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        (-r..=r)
            .flat_map(|dr| (-r..=r).map(move |dc| (dr, dc)))
            .filter(|&(dr, dc)| self.contains(dr, dc))
            .collect()
    }

    /// Relative positions excluding the center cell
    pub fn offsets_no_center(&self) -> Vec<(isize, isize)> {
        self.offsets()
            .into_iter()
            .filter(|&(dr, dc)| dr != 0 || dc != 0)
            .collect()
    }

    /// Cells of `(rows, cols)` neighboring (row, col), clipped at the raster edge
    pub fn cells_around(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (usize, usize)> {
        self.offsets_no_center()
            .into_iter()
            .filter_map(move |(dr, dc)| {
                let r = row as isize + dr;
                let c = col as isize + dc;
                (r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols)
                    .then_some((r as usize, c as usize))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queen_has_eight_neighbors() {
        assert_eq!(Neighborhood::Queen3x3.offsets_no_center().len(), 8);
        assert_eq!(Neighborhood::Rook3x3.offsets_no_center().len(), 4);
        assert_eq!(Neighborhood::Square(2).offsets_no_center().len(), 24);
    }

    #[test]
    fn test_cells_around_corner() {
        let cells: Vec<_> = Neighborhood::Queen3x3.cells_around(0, 0, 5, 5).collect();
        assert_eq!(cells, vec![(0, 1), (1, 0), (1, 1)]);
    }
}
