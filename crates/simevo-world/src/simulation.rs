//! Simulation engine for the grid world.

use crate::checkpoint::CheckpointStore;
use crate::food::Food;
use crate::frames::{Frame, FrameSink};
use crate::grid::Grid;
use crate::obstacle::{place_trees, Tree};
use crate::organism::{Organism, OrganismData};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use simevo_core::{
    CellCode, Error, GenerationStats, OrganismId, Position, Result, RunId, RunSummary, SimConfig,
    SpeciesKind, Step,
};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use tracing::{debug, event, info, instrument, trace, warn, Level};

/// Generations between population snapshots in the log
const METRICS_INTERVAL: u64 = 100;

pub struct Simulation {
    run_id: RunId,
    grid: Grid,
    trees: Vec<Tree>,
    food: Vec<Food>,
    organisms: Vec<Organism>,
    organism_positions: HashMap<Position, usize>,
    food_positions: HashMap<Position, usize>,
    config: SimConfig,
    rng: ChaCha8Rng,
    generation: u64,
    next_organism_id: u32,
    initial_population: usize,
    history: Vec<GenerationStats>,
    frame_sink: Option<Box<dyn FrameSink>>,
    checkpoints: Option<CheckpointStore>,
}

/// Everything needed to resume a simulation exactly where it stopped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationState {
    pub run_id: RunId,
    pub config: SimConfig,
    pub grid: Grid,
    pub trees: Vec<Tree>,
    pub food: Vec<Food>,
    pub organisms: Vec<Organism>,
    pub rng: ChaCha8Rng,
    pub generation: u64,
    pub next_organism_id: u32,
    pub initial_population: usize,
    pub history: Vec<GenerationStats>,
}

/// Counters accumulated while one generation runs
#[derive(Debug, Default)]
struct StepCounters {
    food_eaten: usize,
    prey_eaten: usize,
    starved: usize,
}

enum MoveOutcome {
    Moved,
    Blocked,
    Ate(usize),
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let size = config.world.size;

        let mut grid = Grid::new(size);
        let trees = place_trees(size, config.world.num_trees, &mut rng)?;
        for tree in &trees {
            for cell in tree.footprint(size) {
                grid.set(cell, CellCode::Obstacle);
            }
        }

        let mut sim = Self {
            run_id: RunId::new(),
            grid,
            trees,
            food: Vec::new(),
            organisms: Vec::new(),
            organism_positions: HashMap::new(),
            food_positions: HashMap::new(),
            initial_population: config.world.num_organisms(),
            config,
            rng,
            generation: 0,
            next_organism_id: 0,
            history: Vec::new(),
            frame_sink: None,
            checkpoints: None,
        };

        sim.init_placements()?;
        sim.set_grid_values();

        info!(
            run_id = %sim.run_id,
            size,
            trees = sim.trees.len(),
            microbes = sim.config.world.num_microbes,
            predators = sim.config.world.num_predators,
            food = sim.food.len(),
            "Simulation initialized"
        );

        Ok(sim)
    }

    /// Rebuild a simulation from a snapshot
    pub fn restore(state: SimulationState) -> Result<Self> {
        state.config.validate()?;
        let size = state.config.world.size;

        if state.grid.size() != size {
            return Err(Error::InvalidState(format!(
                "grid size {} does not match configured size {}",
                state.grid.size(),
                size
            )));
        }

        let mut sim = Self {
            run_id: state.run_id,
            grid: state.grid,
            trees: state.trees,
            food: state.food,
            organisms: state.organisms,
            organism_positions: HashMap::new(),
            food_positions: HashMap::new(),
            config: state.config,
            rng: state.rng,
            generation: state.generation,
            next_organism_id: state.next_organism_id,
            initial_population: state.initial_population,
            history: state.history,
            frame_sink: None,
            checkpoints: None,
        };

        sim.rebuild_grid_obstacles();
        sim.rebuild_organism_positions();
        sim.rebuild_food_positions();
        sim.check_placement_invariants()?;
        sim.set_grid_values();

        info!(
            run_id = %sim.run_id,
            generation = sim.generation,
            population = sim.organisms.len(),
            "Simulation restored"
        );

        Ok(sim)
    }

    pub fn snapshot(&self) -> SimulationState {
        SimulationState {
            run_id: self.run_id,
            config: self.config.clone(),
            grid: self.grid.clone(),
            trees: self.trees.clone(),
            food: self.food.clone(),
            organisms: self.organisms.clone(),
            rng: self.rng.clone(),
            generation: self.generation,
            next_organism_id: self.next_organism_id,
            initial_population: self.initial_population,
            history: self.history.clone(),
        }
    }

    pub fn set_frame_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.frame_sink = Some(sink);
    }

    pub fn set_checkpoint_store(&mut self, store: CheckpointStore) {
        self.checkpoints = Some(store);
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn food(&self) -> &[Food] {
        &self.food
    }

    pub fn organisms(&self) -> &[Organism] {
        &self.organisms
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    pub fn population(&self) -> usize {
        self.organisms.iter().filter(|o| o.is_alive()).count()
    }

    /// Put organisms and food on distinct random cells clear of trees
    fn init_placements(&mut self) -> Result<()> {
        let free: Vec<Position> = self
            .grid
            .iter()
            .filter(|(_, code)| !code.is_obstacle())
            .map(|(pos, _)| pos)
            .collect();

        let world = self.config.world.clone();
        let energy = self.config.energy.clone();
        let num_organisms = world.num_organisms();

        if num_organisms > free.len() || world.num_food > free.len() {
            return Err(Error::Placement(format!(
                "{} organisms and {} food items need more than {} free cells",
                num_organisms,
                world.num_food,
                free.len()
            )));
        }

        let organism_cells = index::sample(&mut self.rng, free.len(), num_organisms);
        for (n, i) in organism_cells.into_iter().enumerate() {
            let (kind, initial_energy, speed) = if n < world.num_microbes {
                (SpeciesKind::Microbe, energy.microbe_initial_energy, world.microbe_speed)
            } else {
                (SpeciesKind::Predator, energy.predator_initial_energy, world.predator_speed)
            };
            let id = self.allocate_organism_id()?;
            self.organisms
                .push(Organism::new(id, kind, free[i], initial_energy, speed));
        }

        let food_cells = index::sample(&mut self.rng, free.len(), world.num_food);
        self.food = food_cells
            .into_iter()
            .map(|i| Food::new(free[i], energy.food_energy))
            .collect();

        self.rebuild_organism_positions();
        self.rebuild_food_positions();
        Ok(())
    }

    fn allocate_organism_id(&mut self) -> Result<OrganismId> {
        let id = OrganismId(self.next_organism_id);
        self.next_organism_id = self
            .next_organism_id
            .checked_add(1)
            .ok_or_else(|| Error::InvalidState("organism ids exhausted".to_string()))?;
        Ok(id)
    }

    /// Run the simulation for the configured number of generations
    #[instrument(skip(self), fields(run_id = %self.run_id, generations = self.config.generations))]
    pub fn run(&mut self) -> Result<SimulationResult> {
        info!(
            "Starting simulation for {} generations at generation {}",
            self.config.generations, self.generation
        );

        if self.generation == 0 {
            self.emit_frame()?;
        }

        while self.generation < self.config.generations {
            let stats = self.step()?;

            if stats.is_extinct() && self.config.stop_on_extinction {
                info!(
                    generation = stats.generation,
                    "All organisms died, stopping early"
                );
                break;
            }
        }

        let result = self.collect_results();
        self.emit_run_summary(&result.summary);
        Ok(result)
    }

    /// Execute one generation
    pub fn step(&mut self) -> Result<GenerationStats> {
        self.generation += 1;
        let mut counters = StepCounters::default();

        // Shuffle for fairness
        let mut order: Vec<usize> = (0..self.organisms.len()).collect();
        order.shuffle(&mut self.rng);

        for idx in order {
            self.process_organism(idx, &mut counters);
        }

        self.remove_dead_organisms();
        self.respawn_food();
        self.set_grid_values();

        let stats = self.collect_stats(&counters);
        self.history.push(stats.clone());

        if self.generation % self.config.output.frame_every == 0 {
            self.emit_frame()?;
        }
        self.maybe_checkpoint()?;

        if self.generation % METRICS_INTERVAL == 0 {
            self.emit_population_metrics(&stats);
        }

        Ok(stats)
    }

    fn process_organism(&mut self, idx: usize, counters: &mut StepCounters) {
        let (kind, speed) = {
            let organism = &mut self.organisms[idx];
            if !organism.is_alive() {
                return;
            }
            organism.tick();
            (organism.kind, organism.speed)
        };

        let size = self.grid.size();
        let move_cost = self.config.energy.move_cost;

        for _ in 0..speed {
            let step = Step::ALL[self.rng.gen_range(0..Step::ALL.len())];
            let (dx, dy) = step.to_delta();
            let from = self.organisms[idx].position;
            let target = from.add(dx, dy).wrap(size);

            match self.resolve_move(idx, kind, from, target) {
                MoveOutcome::Blocked => {
                    self.organisms[idx].record_blocked_move();
                    trace!(
                        organism_id = %self.organisms[idx].id,
                        from = %from,
                        target = %target,
                        "Move blocked"
                    );
                }
                MoveOutcome::Moved => self.relocate(idx, from, target),
                MoveOutcome::Ate(prey_idx) => {
                    self.eat_prey(idx, prey_idx);
                    counters.prey_eaten += 1;
                    self.relocate(idx, from, target);
                }
            }

            if kind == SpeciesKind::Microbe && self.eat_food(idx) {
                counters.food_eaten += 1;
            }

            let organism = &mut self.organisms[idx];
            organism.consume_energy(move_cost);
            if organism.energy <= 0 {
                organism.kill();
                counters.starved += 1;
                let position = organism.position;
                self.organism_positions.remove(&position);
                break;
            }
        }
    }

    fn resolve_move(
        &self,
        idx: usize,
        kind: SpeciesKind,
        from: Position,
        target: Position,
    ) -> MoveOutcome {
        if target == from {
            return MoveOutcome::Moved;
        }
        if self.grid.is_obstacle(target) {
            return MoveOutcome::Blocked;
        }

        match self.organism_positions.get(&target) {
            Some(&other) if other != idx => {
                if kind.can_enter(self.organisms[other].kind) {
                    MoveOutcome::Ate(other)
                } else {
                    MoveOutcome::Blocked
                }
            }
            _ => MoveOutcome::Moved,
        }
    }

    fn relocate(&mut self, idx: usize, from: Position, target: Position) {
        if from == target {
            return;
        }
        self.organism_positions.remove(&from);
        self.organism_positions.insert(target, idx);
        self.organisms[idx].move_to(target);
    }

    fn eat_prey(&mut self, predator_idx: usize, prey_idx: usize) {
        let prey_energy = self.config.energy.prey_energy;

        let prey = &mut self.organisms[prey_idx];
        prey.kill();
        let prey_id = prey.id;
        let prey_position = prey.position;
        self.organism_positions.remove(&prey_position);

        let predator = &mut self.organisms[predator_idx];
        predator.add_energy(prey_energy);
        predator.record_kill();

        debug!(
            predator_id = %predator.id,
            prey_id = %prey_id,
            position = %prey_position,
            generation = self.generation,
            "Microbe eaten"
        );
    }

    fn eat_food(&mut self, idx: usize) -> bool {
        let position = self.organisms[idx].position;
        let Some(food_idx) = self.food_positions.remove(&position) else {
            return false;
        };

        let gained = self.food[food_idx].consume();
        let organism = &mut self.organisms[idx];
        organism.add_energy(gained);
        organism.record_meal();
        true
    }

    fn remove_dead_organisms(&mut self) {
        let generation = self.generation;
        let before = self.organisms.len();

        self.organisms.retain(|organism| {
            if organism.is_alive() {
                return true;
            }

            let cause = if organism.energy <= 0 { "starved" } else { "eaten" };
            debug!(
                event = "organism_death",
                organism_id = %organism.id,
                kind = %organism.kind,
                cause,
                generation,
                age = organism.age,
                times_eaten = organism.metrics.times_eaten,
                kills = organism.metrics.kills,
                tiles_explored = organism.metrics.tiles_explored,
                "Organism died"
            );
            false
        });

        if self.organisms.len() != before {
            self.rebuild_organism_positions();
        }
    }

    /// Move every consumed food item to a random free cell
    fn respawn_food(&mut self) {
        let consumed: Vec<usize> = self
            .food
            .iter()
            .enumerate()
            .filter(|(_, food)| !food.is_available())
            .map(|(i, _)| i)
            .collect();

        if consumed.is_empty() {
            return;
        }

        let mut free: Vec<Position> = self
            .grid
            .positions()
            .filter(|pos| {
                !self.grid.is_obstacle(*pos)
                    && !self.food_positions.contains_key(pos)
                    && !self.organism_positions.contains_key(pos)
            })
            .collect();

        for food_idx in consumed {
            if free.is_empty() {
                warn!(
                    generation = self.generation,
                    "No free cell left, food stays consumed"
                );
                break;
            }
            let pick = self.rng.gen_range(0..free.len());
            let position = free.swap_remove(pick);
            self.food[food_idx].respawn(position);
            self.food_positions.insert(position, food_idx);
            debug!(position = %position, generation = self.generation, "Food respawned");
        }
    }

    /// Write the current entities into the grid codes
    fn set_grid_values(&mut self) {
        self.grid.clear_dynamic();

        for food in &self.food {
            if let Some(position) = food.position {
                self.grid.set(position, CellCode::Food);
            }
        }

        for organism in self.organisms.iter().filter(|o| o.is_alive()) {
            let code = match organism.kind {
                SpeciesKind::Predator => CellCode::Predator,
                SpeciesKind::Microbe if self.grid.get(organism.position) == CellCode::Food => {
                    CellCode::OrganismOnFood
                }
                SpeciesKind::Microbe => CellCode::Organism,
            };
            self.grid.set(organism.position, code);
        }
    }

    fn rebuild_grid_obstacles(&mut self) {
        let size = self.grid.size();
        self.grid = Grid::new(size);
        for tree in &self.trees {
            for cell in tree.footprint(size) {
                self.grid.set(cell, CellCode::Obstacle);
            }
        }
    }

    fn rebuild_organism_positions(&mut self) {
        self.organism_positions = self
            .organisms
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_alive())
            .map(|(i, o)| (o.position, i))
            .collect();
    }

    fn rebuild_food_positions(&mut self) {
        self.food_positions = self
            .food
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.position.map(|p| (p, i)))
            .collect();
    }

    fn check_placement_invariants(&self) -> Result<()> {
        let size = self.grid.size();
        let mut seen = HashSet::new();

        for organism in self.organisms.iter().filter(|o| o.is_alive()) {
            let pos = organism.position;
            if pos.wrap(size) != pos || self.grid.is_obstacle(pos) {
                return Err(Error::InvalidState(format!(
                    "organism {} sits on invalid cell {}",
                    organism.id, pos
                )));
            }
            if !seen.insert(pos) {
                return Err(Error::InvalidState(format!(
                    "two organisms share cell {pos}"
                )));
            }
        }

        for position in self.food.iter().filter_map(|f| f.position) {
            if position.wrap(size) != position || self.grid.is_obstacle(position) {
                return Err(Error::InvalidState(format!(
                    "food sits on invalid cell {position}"
                )));
            }
        }

        Ok(())
    }

    fn collect_stats(&self, counters: &StepCounters) -> GenerationStats {
        let living: Vec<&Organism> = self.organisms.iter().filter(|o| o.is_alive()).collect();
        let microbes_alive = living
            .iter()
            .filter(|o| o.kind == SpeciesKind::Microbe)
            .count();
        let mean_energy = if living.is_empty() {
            0.0
        } else {
            living.iter().map(|o| o.energy as f64).sum::<f64>() / living.len() as f64
        };

        GenerationStats {
            generation: self.generation,
            microbes_alive,
            predators_alive: living.len() - microbes_alive,
            food_available: self.food.iter().filter(|f| f.is_available()).count(),
            food_eaten: counters.food_eaten,
            prey_eaten: counters.prey_eaten,
            starved: counters.starved,
            mean_energy,
        }
    }

    pub fn frame(&self) -> Frame {
        Frame {
            run_id: self.run_id,
            generation: self.generation,
            size: self.grid.size(),
            cells: self.grid.rows(),
        }
    }

    fn emit_frame(&mut self) -> Result<()> {
        if self.frame_sink.is_none() {
            return Ok(());
        }
        let frame = self.frame();
        if let Some(sink) = self.frame_sink.as_mut() {
            sink.write_frame(&frame)?;
        }
        Ok(())
    }

    fn maybe_checkpoint(&mut self) -> Result<()> {
        let every = self.config.output.checkpoint_every;
        if every == 0 || self.generation % every != 0 {
            return Ok(());
        }
        if let Some(store) = &self.checkpoints {
            let path = store.save(&self.snapshot())?;
            store.cleanup_old(self.config.output.checkpoints_kept)?;
            debug!(generation = self.generation, path = ?path, "Checkpoint written");
        }
        Ok(())
    }

    /// Emit population metrics
    fn emit_population_metrics(&self, stats: &GenerationStats) {
        let energies: Vec<i32> = self
            .organisms
            .iter()
            .filter(|o| o.is_alive())
            .map(|o| o.energy)
            .collect();
        let max_energy = energies.iter().max().copied().unwrap_or(0);
        let min_energy = energies.iter().min().copied().unwrap_or(0);
        let max_age = self.organisms.iter().map(|o| o.age).max().unwrap_or(0);

        info!(
            event = "population_metrics",
            generation = stats.generation,
            microbes_alive = stats.microbes_alive,
            predators_alive = stats.predators_alive,
            food_available = stats.food_available,
            mean_energy = format!("{:.2}", stats.mean_energy),
            max_energy,
            min_energy,
            max_age,
            "Population metrics snapshot"
        );

        event!(
            Level::INFO,
            gauge_name = "population_total",
            gauge_value = stats.population(),
            generation = stats.generation,
            "Population gauge"
        );
    }

    fn emit_run_summary(&self, summary: &RunSummary) {
        info!(
            event = "run_summary",
            run_id = %self.run_id,
            generations_run = summary.generations_run,
            final_population = summary.final_population,
            peak_population = summary.peak_population,
            total_food_eaten = summary.total_food_eaten,
            total_prey_eaten = summary.total_prey_eaten,
            total_starved = summary.total_starved,
            extinct_at = ?summary.extinct_at,
            "Simulation complete"
        );
    }

    fn collect_results(&self) -> SimulationResult {
        SimulationResult {
            run_id: self.run_id,
            summary: RunSummary::from_history(self.initial_population, &self.history),
            history: self.history.clone(),
            survivors: self
                .organisms
                .iter()
                .filter(|o| o.is_alive())
                .map(OrganismData::from)
                .collect(),
        }
    }

    /// Food positions, one `[x,y]` per line
    pub fn show_food(&self) -> String {
        let mut out = String::from("Food\n");
        for position in self.food.iter().filter_map(|f| f.position) {
            let _ = writeln!(out, "{position}");
        }
        out
    }

    /// Organism positions, one `[x,y]` per line
    pub fn show_species(&self) -> String {
        let mut out = String::from("Species\n");
        for organism in self.organisms.iter().filter(|o| o.is_alive()) {
            let _ = writeln!(out, "{}", organism.position);
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub run_id: RunId,
    pub summary: RunSummary,
    pub history: Vec<GenerationStats>,
    pub survivors: Vec<OrganismData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::MemoryFrameSink;

    fn config(size: i32, microbes: usize, predators: usize, food: usize) -> SimConfig {
        let mut config = SimConfig {
            generations: 20,
            seed: 42,
            ..Default::default()
        };
        config.world.size = size;
        config.world.num_microbes = microbes;
        config.world.num_predators = predators;
        config.world.num_food = food;
        config
    }

    /// A world with no random placement, for exercising single moves
    fn hand_built(config: SimConfig, organisms: Vec<Organism>, food: Vec<Food>) -> Simulation {
        let mut sim = Simulation::new(SimConfig {
            world: simevo_core::WorldConfig {
                num_microbes: 0,
                num_predators: 0,
                num_food: 0,
                num_trees: 0,
                ..config.world.clone()
            },
            ..config.clone()
        })
        .unwrap();
        sim.config = config;
        sim.organisms = organisms;
        sim.food = food;
        sim.rebuild_organism_positions();
        sim.rebuild_food_positions();
        sim.set_grid_values();
        sim
    }

    #[test]
    fn test_simulation_creation() {
        let sim = Simulation::new(config(20, 10, 2, 30)).unwrap();
        assert_eq!(sim.organisms().len(), 12);
        assert_eq!(sim.food().len(), 30);
        assert_eq!(sim.generation(), 0);

        let microbes = sim
            .organisms()
            .iter()
            .filter(|o| o.kind == SpeciesKind::Microbe)
            .count();
        assert_eq!(microbes, 10);
        assert!(sim
            .organisms()
            .iter()
            .filter(|o| o.kind == SpeciesKind::Microbe)
            .all(|o| o.energy == 15));
    }

    #[test]
    fn test_placement_is_distinct_and_clear_of_trees() {
        let mut config = config(12, 20, 5, 40);
        config.world.num_trees = 6;
        let sim = Simulation::new(config).unwrap();

        let positions: HashSet<Position> = sim.organisms().iter().map(|o| o.position).collect();
        assert_eq!(positions.len(), 25);

        let food: HashSet<Position> = sim.food().iter().filter_map(|f| f.position).collect();
        assert_eq!(food.len(), 40);

        assert!(positions.iter().chain(food.iter()).all(|p| !sim.grid().is_obstacle(*p)));
        assert_eq!(sim.grid().count(CellCode::Obstacle), 24);
    }

    #[test]
    fn test_grid_codes_after_init() {
        let sim = Simulation::new(config(10, 30, 0, 30)).unwrap();
        let grid = sim.grid();

        let organisms = grid.count(CellCode::Organism) + grid.count(CellCode::OrganismOnFood);
        assert_eq!(organisms, 30);

        let food_cells = grid.count(CellCode::Food) + grid.count(CellCode::OrganismOnFood);
        assert_eq!(food_cells, 30);
    }

    #[test]
    fn test_same_seed_same_history() {
        let mut a = Simulation::new(config(15, 8, 2, 20)).unwrap();
        let mut b = Simulation::new(config(15, 8, 2, 20)).unwrap();

        let ra = a.run().unwrap();
        let rb = b.run().unwrap();
        assert_eq!(ra.history, rb.history);
        assert_eq!(a.grid(), b.grid());
    }

    #[test]
    fn test_energy_decays_one_per_move() {
        let mut config = config(5, 0, 0, 0);
        config.energy.move_cost = 1;
        let microbe = Organism::new(
            OrganismId(0),
            SpeciesKind::Microbe,
            Position::new(2, 2),
            15,
            3,
        );
        let mut sim = hand_built(config, vec![microbe], vec![]);

        sim.step().unwrap();
        assert_eq!(sim.organisms()[0].energy, 12);
        assert_eq!(sim.organisms()[0].age, 1);
    }

    #[test]
    fn test_starvation_removes_organism() {
        let config = config(5, 0, 0, 0);
        let microbe = Organism::new(
            OrganismId(0),
            SpeciesKind::Microbe,
            Position::new(2, 2),
            1,
            1,
        );
        let mut sim = hand_built(config, vec![microbe], vec![]);

        let stats = sim.step().unwrap();
        assert_eq!(stats.starved, 1);
        assert!(stats.is_extinct());
        assert!(sim.organisms().is_empty());
        assert_eq!(sim.grid().count(CellCode::Empty), 25);
    }

    #[test]
    fn test_microbe_eats_food_it_stands_on() {
        // A 1x1 grid forces every step onto the same cell
        let mut config = config(1, 0, 0, 0);
        config.energy.food_energy = 5;
        let microbe = Organism::new(
            OrganismId(0),
            SpeciesKind::Microbe,
            Position::new(0, 0),
            15,
            1,
        );
        let food = Food::new(Position::new(0, 0), 5);
        let mut sim = hand_built(config, vec![microbe], vec![food]);
        assert_eq!(sim.grid().get(Position::new(0, 0)), CellCode::OrganismOnFood);

        let stats = sim.step().unwrap();
        assert_eq!(stats.food_eaten, 1);
        assert_eq!(sim.organisms()[0].energy, 15 + 5 - 1);
        assert_eq!(sim.organisms()[0].metrics.times_eaten, 1);
        // No free cell to respawn into
        assert_eq!(stats.food_available, 0);
        assert!(!sim.food()[0].is_available());
    }

    #[test]
    fn test_consumed_food_respawns_on_free_cell() {
        let mut config = config(3, 0, 0, 0);
        config.energy.food_energy = 4;
        let microbe = Organism::new(
            OrganismId(0),
            SpeciesKind::Microbe,
            Position::new(1, 1),
            50,
            1,
        );
        let mut sim = hand_built(config, vec![microbe], vec![]);
        // Food on every cell, so whichever step is drawn the microbe eats
        sim.food = (0..9)
            .map(|i| Food::new(Position::from_index(i, 3), 4))
            .collect();
        sim.rebuild_food_positions();

        let stats = sim.step().unwrap();
        assert_eq!(stats.food_eaten, 1);
        // Every other cell still holds food
        assert_eq!(stats.food_available, 8);

        // Free one cell; the consumed item must land there
        let spare = sim
            .food
            .iter()
            .position(|f| f.is_available())
            .unwrap();
        let freed = sim.food[spare].position.unwrap();
        sim.food.remove(spare);
        sim.rebuild_food_positions();
        sim.respawn_food();

        let consumed = sim.food.iter().filter(|f| !f.is_available()).count();
        assert_eq!(consumed, 0);
        assert!(sim.food.iter().any(|f| f.position == Some(freed)));
    }

    #[test]
    fn test_trees_block_movement() {
        let config = config(2, 0, 0, 0);
        let microbe = Organism::new(
            OrganismId(0),
            SpeciesKind::Microbe,
            Position::new(0, 0),
            100,
            1,
        );
        let mut sim = hand_built(config, vec![microbe], vec![]);
        sim.grid.set(Position::new(1, 0), CellCode::Obstacle);
        sim.grid.set(Position::new(0, 1), CellCode::Obstacle);
        sim.grid.set(Position::new(1, 1), CellCode::Obstacle);

        for _ in 0..30 {
            sim.step().unwrap();
            assert_eq!(sim.organisms()[0].position, Position::new(0, 0));
        }
        assert!(sim.organisms()[0].metrics.blocked_moves > 0);
    }

    #[test]
    fn test_microbes_never_share_a_cell() {
        let mut sim = Simulation::new(config(6, 20, 0, 5)).unwrap();
        for _ in 0..15 {
            sim.step().unwrap();
            let positions: HashSet<Position> =
                sim.organisms().iter().map(|o| o.position).collect();
            assert_eq!(positions.len(), sim.organisms().len());
        }
    }

    #[test]
    fn test_predator_eats_adjacent_prey() {
        // On a 2x2 torus every non-stay step lands on a neighbour
        let mut config = config(2, 0, 0, 0);
        config.energy.prey_energy = 10;
        let predator = Organism::new(
            OrganismId(0),
            SpeciesKind::Predator,
            Position::new(0, 0),
            1000,
            1,
        );
        let prey: Vec<Organism> = [(1, 0), (0, 1), (1, 1)]
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                Organism::new(
                    OrganismId(i as u32 + 1),
                    SpeciesKind::Microbe,
                    Position::new(x, y),
                    1000,
                    1,
                )
            })
            .collect();
        let mut organisms = vec![predator];
        organisms.extend(prey);
        let mut sim = hand_built(config, organisms, vec![]);

        let mut eaten = 0;
        for _ in 0..50 {
            eaten += sim.step().unwrap().prey_eaten;
        }

        assert!(eaten > 0);
        let predator = sim
            .organisms()
            .iter()
            .find(|o| o.kind == SpeciesKind::Predator)
            .unwrap();
        assert_eq!(predator.metrics.kills as usize, eaten);
        assert_eq!(sim.organisms().len(), 4 - eaten);
    }

    #[test]
    fn test_predator_leaves_food_alone() {
        let mut config = config(1, 0, 0, 0);
        config.energy.predator_initial_energy = 50;
        let predator = Organism::new(
            OrganismId(0),
            SpeciesKind::Predator,
            Position::new(0, 0),
            50,
            1,
        );
        let food = Food::new(Position::new(0, 0), 5);
        let mut sim = hand_built(config, vec![predator], vec![food]);
        assert_eq!(sim.grid().get(Position::new(0, 0)), CellCode::Predator);

        let stats = sim.step().unwrap();
        assert_eq!(stats.food_eaten, 0);
        assert_eq!(stats.food_available, 1);
        assert_eq!(sim.organisms()[0].energy, 49);
        assert_eq!(sim.organisms()[0].metrics.times_eaten, 0);
        assert!(sim.food()[0].is_available());
        assert_eq!(sim.grid().get(Position::new(0, 0)), CellCode::Predator);
    }

    #[test]
    fn test_microbe_blocked_by_predators() {
        let config = config(2, 0, 0, 0);
        let microbe = Organism::new(
            OrganismId(0),
            SpeciesKind::Microbe,
            Position::new(0, 0),
            1000,
            1,
        );
        let mut organisms = vec![microbe];
        for (i, (x, y)) in [(1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
            organisms.push(Organism::new(
                OrganismId(i as u32 + 1),
                SpeciesKind::Predator,
                Position::new(x, y),
                1000,
                1,
            ));
        }
        let mut sim = hand_built(config, organisms, vec![]);

        let home = Position::new(0, 0);
        for target in [(1, 0), (0, 1), (1, 1)].map(|(x, y)| Position::new(x, y)) {
            assert!(matches!(
                sim.resolve_move(0, SpeciesKind::Microbe, home, target),
                MoveOutcome::Blocked
            ));
        }

        // Predators can only reach the microbe's cell by eating it
        for _ in 0..30 {
            sim.step().unwrap();
            match sim.organisms().iter().find(|o| o.kind == SpeciesKind::Microbe) {
                Some(microbe) => assert_eq!(microbe.position, home),
                None => break,
            }
        }
    }

    #[test]
    fn test_run_stops_on_extinction() {
        let mut config = config(10, 5, 0, 0);
        config.generations = 100;
        config.energy.microbe_initial_energy = 3;
        let mut sim = Simulation::new(config).unwrap();

        let result = sim.run().unwrap();
        assert_eq!(result.summary.extinct_at, Some(3));
        assert_eq!(result.summary.generations_run, 3);
        assert_eq!(result.summary.total_starved, 5);
        assert!(result.survivors.is_empty());
    }

    #[test]
    fn test_frames_captured_per_generation() {
        let mut config = config(8, 4, 0, 6);
        config.generations = 6;
        config.output.frame_every = 2;
        let mut sim = Simulation::new(config).unwrap();
        let sink = MemoryFrameSink::new();
        sim.set_frame_sink(Box::new(sink.clone()));

        sim.run().unwrap();

        let frames = sink.frames();
        let generations: Vec<u64> = frames.iter().map(|f| f.generation).collect();
        assert_eq!(generations, vec![0, 2, 4, 6]);
        assert_eq!(frames.last().unwrap().cells, sim.grid().rows());
        assert!(frames.iter().all(|f| f.run_id == sim.run_id() && f.size == 8));
    }

    #[test]
    fn test_snapshot_restore_continues_identically() {
        let mut config = config(12, 10, 2, 15);
        config.generations = 30;
        let mut original = Simulation::new(config).unwrap();
        for _ in 0..10 {
            original.step().unwrap();
        }

        let mut restored = Simulation::restore(original.snapshot()).unwrap();
        assert_eq!(restored.generation(), 10);
        assert_eq!(restored.grid(), original.grid());

        let a = original.run().unwrap();
        let b = restored.run().unwrap();
        assert_eq!(a.history, b.history);
        assert_eq!(original.grid(), restored.grid());
    }

    #[test]
    fn test_restore_rejects_organism_on_tree() {
        let mut config = config(6, 1, 0, 0);
        config.world.num_trees = 1;
        let sim = Simulation::new(config).unwrap();

        let mut state = sim.snapshot();
        state.organisms[0].position = state.trees[0].origin.wrap(6);
        assert!(matches!(
            Simulation::restore(state),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_show_listings() {
        let config = config(5, 0, 0, 0);
        let microbe = Organism::new(
            OrganismId(0),
            SpeciesKind::Microbe,
            Position::new(1, 2),
            15,
            1,
        );
        let sim = hand_built(config, vec![microbe], vec![Food::new(Position::new(3, 4), 5)]);

        assert_eq!(sim.show_food(), "Food\n[3,4]\n");
        assert_eq!(sim.show_species(), "Species\n[1,2]\n");
    }
}
