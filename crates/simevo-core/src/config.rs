//! Configuration types for the simulation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest supported grid side length
pub const MAX_GRID_SIZE: i32 = 1024;

/// Largest number of generations a single run may request
pub const MAX_GENERATIONS: u64 = 1_000_000;

/// Cells covered by a single tree
pub const TREE_FOOTPRINT: usize = 4;

/// World layout and population parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Side length of the square grid
    pub size: i32,
    /// Number of food items kept on the grid
    pub num_food: usize,
    /// Number of initial microbes
    pub num_microbes: usize,
    /// Number of initial predators
    pub num_predators: usize,
    /// Number of 2x2 trees placed at startup
    pub num_trees: usize,
    /// Moves a microbe makes per generation
    pub microbe_speed: u32,
    /// Moves a predator makes per generation
    pub predator_speed: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            size: 20,
            num_food: 30,
            num_microbes: 10,
            num_predators: 0,
            num_trees: 0,
            microbe_speed: 1,
            predator_speed: 1,
        }
    }
}

impl WorldConfig {
    pub fn total_cells(&self) -> usize {
        (self.size.max(0) as usize).pow(2)
    }

    /// Trees that always fit without overlap: one per 2x2 block of the torus
    pub fn max_trees(&self) -> usize {
        (self.size.max(0) as usize / 2).pow(2)
    }

    /// Cells left once every tree is placed
    pub fn free_cells(&self) -> usize {
        self.total_cells()
            .saturating_sub(self.num_trees.saturating_mul(TREE_FOOTPRINT))
    }

    pub fn num_organisms(&self) -> usize {
        self.num_microbes + self.num_predators
    }
}

/// Energy gains and costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Starting energy for microbes
    pub microbe_initial_energy: i32,
    /// Starting energy for predators
    pub predator_initial_energy: i32,
    /// Energy granted by one food item
    pub food_energy: i32,
    /// Energy a predator gains from eating a microbe
    pub prey_energy: i32,
    /// Energy spent on every move, blocked or not
    pub move_cost: i32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            microbe_initial_energy: 15,
            predator_initial_energy: 30,
            food_energy: 5,
            prey_energy: 10,
            move_cost: 1,
        }
    }
}

/// Log output format for the runner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Frame, checkpoint and logging output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving one frame file per captured generation
    pub frame_dir: Option<String>,
    /// Capture every Nth generation
    pub frame_every: u64,
    /// Leave frame files on disk after the run
    pub keep_frames: bool,
    /// Directory for checkpoints
    pub checkpoint_dir: Option<String>,
    /// Checkpoint every Nth generation (0 disables)
    pub checkpoint_every: u64,
    /// Number of checkpoints retained on disk
    pub checkpoints_kept: usize,
    pub log_format: LogFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frame_dir: None,
            frame_every: 1,
            keep_frames: true,
            checkpoint_dir: None,
            checkpoint_every: 0,
            checkpoints_kept: 3,
            log_format: LogFormat::Pretty,
        }
    }
}

/// Full simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of generations to simulate
    pub generations: u64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// End the run early once every organism is dead
    pub stop_on_extinction: bool,
    pub world: WorldConfig,
    pub energy: EnergyConfig,
    pub output: OutputConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            generations: 100,
            seed: 0,
            stop_on_extinction: true,
            world: WorldConfig::default(),
            energy: EnergyConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether two configs build the same world: layout, energy rules and seed.
    /// Run length and output settings are ignored.
    pub fn same_world(&self, other: &SimConfig) -> bool {
        self.world == other.world && self.energy == other.energy && self.seed == other.seed
    }

    pub fn validate(&self) -> Result<()> {
        let world = &self.world;
        let energy = &self.energy;

        if world.size <= 0 || world.size > MAX_GRID_SIZE {
            return Err(Error::Validation(format!(
                "grid size must be in 1..={MAX_GRID_SIZE}, got {}",
                world.size
            )));
        }
        if world.num_trees > world.max_trees() {
            return Err(Error::Validation(format!(
                "{} trees do not fit on a {}x{} grid (at most {})",
                world.num_trees,
                world.size,
                world.size,
                world.max_trees()
            )));
        }
        if world.num_organisms() > world.free_cells() {
            return Err(Error::Validation(format!(
                "{} organisms exceed the {} free cells",
                world.num_organisms(),
                world.free_cells()
            )));
        }
        if world.num_food > world.free_cells() {
            return Err(Error::Validation(format!(
                "{} food items exceed the {} free cells",
                world.num_food,
                world.free_cells()
            )));
        }
        if world.microbe_speed == 0 || world.predator_speed == 0 {
            return Err(Error::Validation("speed must be positive".to_string()));
        }
        if energy.microbe_initial_energy <= 0 || energy.predator_initial_energy <= 0 {
            return Err(Error::Validation(
                "initial energy must be positive".to_string(),
            ));
        }
        if energy.move_cost <= 0 {
            return Err(Error::Validation("move cost must be positive".to_string()));
        }
        if energy.food_energy < 0 || energy.prey_energy < 0 {
            return Err(Error::Validation(
                "energy gains cannot be negative".to_string(),
            ));
        }
        if self.generations > MAX_GENERATIONS {
            return Err(Error::Validation(format!(
                "generations ({}) exceed supported maximum ({MAX_GENERATIONS})",
                self.generations
            )));
        }
        if self.output.frame_every == 0 {
            return Err(Error::Validation("frame_every must be positive".to_string()));
        }
        Ok(())
    }
}
