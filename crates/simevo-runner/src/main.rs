//! Runs one grid world simulation and prints its summary.
//!
//! Usage: `simevo [config.json]`. Without a path the default configuration is used.

mod telemetry;

use anyhow::{Context, Result};
use simevo_core::SimConfig;
use simevo_world::frames::remove_frames;
use simevo_world::{CheckpointStore, JsonFrameWriter, Simulation};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let config = load_config()?;

    telemetry::init_telemetry(config.output.log_format)?;

    info!(
        "Starting Simulating Evolution on a {0}x{0} grid",
        config.world.size
    );

    let mut simulation = build_simulation(&config)?;
    debug!(
        "Initial placement\n{}{}",
        simulation.show_food(),
        simulation.show_species()
    );

    let result = simulation.run()?;

    if let Some(dir) = config.output.frame_dir.as_deref() {
        if config.output.keep_frames {
            info!("Frames kept in {}", dir);
        } else {
            let removed = remove_frames(Path::new(dir))?;
            info!("Removed {} frame files from {}", removed, dir);
        }
    }

    println!("{}", serde_json::to_string_pretty(&result.summary)?);
    Ok(())
}

fn load_config() -> Result<SimConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            SimConfig::from_json(&json).with_context(|| format!("loading config file {path}"))
        }
        None => Ok(SimConfig::default()),
    }
}

/// Create a fresh simulation, or resume from the latest checkpoint when one exists
fn build_simulation(config: &SimConfig) -> Result<Simulation> {
    let store = config
        .output
        .checkpoint_dir
        .as_deref()
        .map(|dir| CheckpointStore::new(dir))
        .transpose()?;

    let mut simulation = match store.as_ref().map(|s| s.load_latest()) {
        Some(Ok(checkpoint)) => {
            let mut state = checkpoint.state;
            info!(
                "Resuming run {} from generation {}",
                state.run_id, state.generation
            );
            if !state.config.same_world(config) {
                warn!(
                    "Checkpoint world, energy and seed settings differ from the config file; \
                     keeping the checkpoint's"
                );
            }
            state.config.generations = config.generations;
            state.config.output = config.output.clone();
            Simulation::restore(state)?
        }
        Some(Err(e)) => {
            warn!("Failed to restore from checkpoint: {}", e);
            Simulation::new(config.clone())?
        }
        None => Simulation::new(config.clone())?,
    };

    if let Some(dir) = config.output.frame_dir.as_deref() {
        simulation.set_frame_sink(Box::new(JsonFrameWriter::new(dir)?));
    }
    if let Some(store) = store {
        simulation.set_checkpoint_store(store);
    }

    Ok(simulation)
}
