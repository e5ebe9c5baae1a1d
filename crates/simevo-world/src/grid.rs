//! 2D grid of cell codes.

use serde::{Deserialize, Serialize};
use simevo_core::{CellCode, Position};
use std::fmt;

/// A square toroidal grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    size: i32,
    cells: Vec<CellCode>,
}

impl Grid {
    pub fn new(size: i32) -> Self {
        let side = size.max(0) as usize;
        Self {
            size,
            cells: vec![CellCode::Empty; side * side],
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Get the code at position (with toroidal wrapping)
    pub fn get(&self, pos: Position) -> CellCode {
        self.cells[pos.wrap(self.size).index(self.size)]
    }

    /// Set the code at position
    pub fn set(&mut self, pos: Position, code: CellCode) {
        let index = pos.wrap(self.size).index(self.size);
        self.cells[index] = code;
    }

    pub fn is_obstacle(&self, pos: Position) -> bool {
        self.get(pos).is_obstacle()
    }

    /// Reset every cell except obstacles to empty
    pub fn clear_dynamic(&mut self) {
        for cell in &mut self.cells {
            if !cell.is_obstacle() {
                *cell = CellCode::Empty;
            }
        }
    }

    pub fn index_to_pos(&self, index: usize) -> Position {
        Position::from_index(index, self.size)
    }

    /// Iterator over all positions
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.cells.len()).map(move |i| self.index_to_pos(i))
    }

    /// Iterator over all cells with positions
    pub fn iter(&self) -> impl Iterator<Item = (Position, CellCode)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, code)| (self.index_to_pos(i), *code))
    }

    pub fn count(&self, code: CellCode) -> usize {
        self.cells.iter().filter(|c| **c == code).count()
    }

    /// Cell codes as `size` rows of `size` values, row `y` holding cells `(0..size, y)`
    pub fn rows(&self) -> Vec<Vec<u8>> {
        let side = self.size.max(0) as usize;
        self.cells
            .chunks(side.max(1))
            .map(|row| row.iter().map(|c| c.as_u8()).collect())
            .collect()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = self.size.max(1) as usize;
        for row in self.cells.chunks(side) {
            for cell in row {
                let glyph = match cell {
                    CellCode::Empty => '.',
                    CellCode::Food => 'f',
                    CellCode::Organism => 'o',
                    CellCode::OrganismOnFood => '@',
                    CellCode::Obstacle => '#',
                    CellCode::Predator => 'P',
                };
                write!(f, "{glyph}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
