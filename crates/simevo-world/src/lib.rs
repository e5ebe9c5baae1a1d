//! Grid world simulation engine.
//!
//! Microbes and predators wander a toroidal grid, eat, spend energy and die.
//! Each generation is captured as a frame of cell codes.

pub mod grid;
pub mod obstacle;
pub mod food;
pub mod organism;
pub mod simulation;
pub mod frames;
pub mod checkpoint;

pub use grid::Grid;
pub use obstacle::Tree;
pub use food::Food;
pub use organism::Organism;
pub use simulation::{Simulation, SimulationResult, SimulationState};
pub use frames::{Frame, FrameSink, JsonFrameWriter, MemoryFrameSink};
pub use checkpoint::{Checkpoint, CheckpointStore};
