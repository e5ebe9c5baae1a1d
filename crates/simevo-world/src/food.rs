//! Food items.

use serde::{Deserialize, Serialize};
use simevo_core::Position;

/// A food item. `position == None` marks it as consumed and waiting to respawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    pub position: Option<Position>,
    pub energy: i32,
}

impl Food {
    pub fn new(position: Position, energy: i32) -> Self {
        Self {
            position: Some(position),
            energy,
        }
    }

    pub fn is_available(&self) -> bool {
        self.position.is_some()
    }

    /// Mark the item consumed and return the energy it grants
    pub fn consume(&mut self) -> i32 {
        match self.position.take() {
            Some(_) => self.energy,
            None => 0,
        }
    }

    pub fn respawn(&mut self, position: Position) {
        self.position = Some(position);
    }
}
