//! Per-organism and per-generation statistics.

use serde::{Deserialize, Serialize};

/// Lifetime metrics for an organism
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganismMetrics {
    /// Number of generations survived
    pub lifetime: u64,
    /// Food items consumed
    pub times_eaten: u32,
    /// Microbes eaten (predators only)
    pub kills: u32,
    /// Number of distinct tiles visited
    pub tiles_explored: u32,
    /// Moves that ended in place because the target was blocked
    pub blocked_moves: u32,
}

impl OrganismMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Snapshot of the world after one generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u64,
    pub microbes_alive: usize,
    pub predators_alive: usize,
    /// Food items on the grid after respawning
    pub food_available: usize,
    /// Food items eaten this generation
    pub food_eaten: usize,
    /// Microbes eaten by predators this generation
    pub prey_eaten: usize,
    /// Organisms that ran out of energy this generation
    pub starved: usize,
    pub mean_energy: f64,
}

impl GenerationStats {
    pub fn population(&self) -> usize {
        self.microbes_alive + self.predators_alive
    }

    pub fn is_extinct(&self) -> bool {
        self.population() == 0
    }
}

/// Aggregate view over a sequence of generations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub generations_run: u64,
    pub final_population: usize,
    pub peak_population: usize,
    pub total_food_eaten: usize,
    pub total_prey_eaten: usize,
    pub total_starved: usize,
    /// First generation in which no organism was left alive
    pub extinct_at: Option<u64>,
}

impl RunSummary {
    pub fn from_history(initial_population: usize, history: &[GenerationStats]) -> Self {
        let mut summary = RunSummary {
            generations_run: history.len() as u64,
            final_population: history
                .last()
                .map(|s| s.population())
                .unwrap_or(initial_population),
            peak_population: initial_population,
            ..Default::default()
        };

        for stats in history {
            summary.peak_population = summary.peak_population.max(stats.population());
            summary.total_food_eaten += stats.food_eaten;
            summary.total_prey_eaten += stats.prey_eaten;
            summary.total_starved += stats.starved;
            if summary.extinct_at.is_none() && stats.is_extinct() {
                summary.extinct_at = Some(stats.generation);
            }
        }

        summary
    }
}
