//! Static 2x2 trees.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use simevo_core::{Error, Position, Result};

/// A tree blocking a 2x2 block of cells, anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub origin: Position,
}

impl Tree {
    pub fn new(origin: Position) -> Self {
        Self { origin }
    }

    /// The four covered cells, wrapped onto a grid of side `size`
    pub fn footprint(&self, size: i32) -> [Position; 4] {
        [
            self.origin.wrap(size),
            self.origin.add(1, 0).wrap(size),
            self.origin.add(0, 1).wrap(size),
            self.origin.add(1, 1).wrap(size),
        ]
    }
}

/// Place `count` non-overlapping trees on a grid of side `size`.
///
/// Origins come from the lattice `(2i + ox, 2j + oy)` with a random offset, so any
/// count up to `(size / 2)²` always fits.
pub fn place_trees<R: Rng>(size: i32, count: usize, rng: &mut R) -> Result<Vec<Tree>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let per_side = size.max(0) / 2;
    let capacity = (per_side as usize).pow(2);
    if count > capacity {
        return Err(Error::Placement(format!(
            "{count} trees do not fit on a {size}x{size} grid (at most {capacity})"
        )));
    }

    let offset = Position::new(rng.gen_range(0..size), rng.gen_range(0..size));
    let mut origins: Vec<Position> = (0..per_side)
        .flat_map(|j| (0..per_side).map(move |i| Position::new(2 * i, 2 * j)))
        .map(|p| p.add(offset.x, offset.y).wrap(size))
        .collect();
    origins.shuffle(rng);

    Ok(origins.into_iter().take(count).map(Tree::new).collect())
}
