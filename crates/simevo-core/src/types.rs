//! Core type definitions for the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an organism, unique within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismId(pub u32);

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 2D position on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Apply toroidal wrapping on a square grid of side `size`
    pub fn wrap(&self, size: i32) -> Self {
        Self {
            x: self.x.rem_euclid(size),
            y: self.y.rem_euclid(size),
        }
    }

    /// Row-major cell index. The position must already be wrapped.
    pub fn index(&self, size: i32) -> usize {
        (self.y * size + self.x) as usize
    }

    pub fn from_index(index: usize, size: i32) -> Self {
        let index = index as i32;
        Self::new(index % size, index / size)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// One random step an organism may take in a generation.
///
/// The order matches the classic nine-entry move table, staying put included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    West,
    East,
    North,
    South,
    Stay,
    NorthWest,
    SouthWest,
    NorthEast,
    SouthEast,
}

impl Step {
    pub const ALL: [Step; 9] = [
        Step::West,
        Step::East,
        Step::North,
        Step::South,
        Step::Stay,
        Step::NorthWest,
        Step::SouthWest,
        Step::NorthEast,
        Step::SouthEast,
    ];

    pub fn to_delta(&self) -> (i32, i32) {
        match self {
            Step::West => (-1, 0),
            Step::East => (1, 0),
            Step::North => (0, -1),
            Step::South => (0, 1),
            Step::Stay => (0, 0),
            Step::NorthWest => (-1, -1),
            Step::SouthWest => (-1, 1),
            Step::NorthEast => (1, -1),
            Step::SouthEast => (1, 1),
        }
    }
}

/// Code stored in each grid cell. Values are stable and used in exported frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellCode {
    #[default]
    Empty = 0,
    Food = 1,
    Organism = 2,
    OrganismOnFood = 3,
    Obstacle = 4,
    Predator = 5,
}

impl CellCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CellCode::Empty),
            1 => Some(CellCode::Food),
            2 => Some(CellCode::Organism),
            3 => Some(CellCode::OrganismOnFood),
            4 => Some(CellCode::Obstacle),
            5 => Some(CellCode::Predator),
            _ => None,
        }
    }

    pub fn is_obstacle(self) -> bool {
        self == CellCode::Obstacle
    }
}

/// Species an organism belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeciesKind {
    /// Food eater, and prey for predators
    Microbe,
    Predator,
}

impl SpeciesKind {
    /// Whether an organism of this kind may step onto a cell held by `occupant`
    pub fn can_enter(self, occupant: SpeciesKind) -> bool {
        matches!((self, occupant), (SpeciesKind::Predator, SpeciesKind::Microbe))
    }
}

impl fmt::Display for SpeciesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeciesKind::Microbe => write!(f, "microbe"),
            SpeciesKind::Predator => write!(f, "predator"),
        }
    }
}
