//! Organism state and management.

use serde::{Deserialize, Serialize};
use simevo_core::{OrganismId, OrganismMetrics, Position, SpeciesKind};
use std::collections::HashSet;

/// An organism in the simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organism {
    pub id: OrganismId,
    pub kind: SpeciesKind,
    pub position: Position,
    pub energy: i32,
    /// Moves taken per generation
    pub speed: u32,
    pub alive: bool,
    pub age: u64,
    pub metrics: OrganismMetrics,
    pub visited_tiles: HashSet<Position>,
}

impl Organism {
    pub fn new(
        id: OrganismId,
        kind: SpeciesKind,
        position: Position,
        energy: i32,
        speed: u32,
    ) -> Self {
        let mut visited = HashSet::new();
        visited.insert(position);

        Self {
            id,
            kind,
            position,
            energy,
            speed,
            alive: true,
            age: 0,
            metrics: OrganismMetrics {
                tiles_explored: 1,
                ..OrganismMetrics::new()
            },
            visited_tiles: visited,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive && self.energy > 0
    }

    pub fn add_energy(&mut self, amount: i32) {
        self.energy = self.energy.saturating_add(amount);
    }

    pub fn consume_energy(&mut self, amount: i32) -> bool {
        if self.energy >= amount {
            self.energy -= amount;
            true
        } else {
            self.energy = 0;
            false
        }
    }

    pub fn move_to(&mut self, new_position: Position) {
        self.position = new_position;
        self.visited_tiles.insert(new_position);
        self.metrics.tiles_explored = self.visited_tiles.len() as u32;
    }

    pub fn tick(&mut self) {
        self.age += 1;
        self.metrics.lifetime = self.age;
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn record_meal(&mut self) {
        self.metrics.times_eaten += 1;
    }

    pub fn record_kill(&mut self) {
        self.metrics.kills += 1;
    }

    pub fn record_blocked_move(&mut self) {
        self.metrics.blocked_moves += 1;
    }
}

/// Compact organism record reported in run results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganismData {
    pub id: OrganismId,
    pub kind: SpeciesKind,
    pub position: Position,
    pub energy: i32,
    pub age: u64,
    pub metrics: OrganismMetrics,
}

impl From<&Organism> for OrganismData {
    fn from(org: &Organism) -> Self {
        Self {
            id: org.id,
            kind: org.kind,
            position: org.position,
            energy: org.energy,
            age: org.age,
            metrics: org.metrics.clone(),
        }
    }
}
