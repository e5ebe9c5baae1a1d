//! Checkpoint and restore functionality.

use crate::simulation::SimulationState;
use serde::{Deserialize, Serialize};
use simevo_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub timestamp: i64,
    pub state: SimulationState,
}

/// Stores `checkpoint_{generation}.bin` files in one directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    checkpoint_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Result<Self> {
        let checkpoint_dir = checkpoint_dir.into();
        fs::create_dir_all(&checkpoint_dir)?;
        Ok(Self { checkpoint_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Write a checkpoint for the state's generation
    pub fn save(&self, state: &SimulationState) -> Result<PathBuf> {
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            timestamp: chrono::Utc::now().timestamp(),
            state: state.clone(),
        };

        let bytes = bincode::serialize(&checkpoint)
            .map_err(|e| Error::Serialization(format!("Failed to serialize checkpoint: {}", e)))?;

        let path = self
            .checkpoint_dir
            .join(format!("checkpoint_{:08}.bin", state.generation));
        fs::write(&path, &bytes)?;

        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Checkpoint> {
        let bytes = fs::read(path)?;
        let checkpoint: Checkpoint = bincode::deserialize(&bytes).map_err(|e| {
            Error::Serialization(format!("Failed to deserialize checkpoint: {}", e))
        })?;

        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(Error::InvalidState(format!(
                "checkpoint version {} is not supported (expected {})",
                checkpoint.version, CHECKPOINT_VERSION
            )));
        }

        Ok(checkpoint)
    }

    /// Checkpoint files with their generation, oldest first
    pub fn list(&self) -> Result<Vec<(PathBuf, u64)>> {
        if !self.checkpoint_dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.checkpoint_dir)? {
            let path = entry?.path();
            let generation = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|name| name.strip_prefix("checkpoint_"))
                .and_then(|s| s.strip_suffix(".bin"))
                .and_then(|s| s.parse::<u64>().ok());

            if let Some(generation) = generation {
                checkpoints.push((path, generation));
            }
        }

        checkpoints.sort_by_key(|(_, generation)| *generation);
        Ok(checkpoints)
    }

    /// Restore from the latest checkpoint
    pub fn load_latest(&self) -> Result<Checkpoint> {
        let latest = self.list()?.pop();
        match latest {
            Some((path, _)) => {
                let checkpoint = Self::load(&path)?;
                info!("Loaded checkpoint: {:?}", path);
                Ok(checkpoint)
            }
            None => Err(Error::NotFound(format!(
                "no checkpoint files in {:?}",
                self.checkpoint_dir
            ))),
        }
    }

    /// Clean up old checkpoints, keeping only the most recent N
    pub fn cleanup_old(&self, keep_count: usize) -> Result<usize> {
        let checkpoints = self.list()?;
        if checkpoints.len() <= keep_count {
            return Ok(0);
        }

        let mut removed = 0;
        let excess = checkpoints.len() - keep_count;
        for (path, _) in checkpoints.iter().take(excess) {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove old checkpoint {:?}: {}", path, e);
            } else {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Simulation;
    use simevo_core::{RunId, SimConfig};

    fn temp_store() -> CheckpointStore {
        let dir = std::env::temp_dir().join(format!("simevo-checkpoints-{}", RunId::new()));
        CheckpointStore::new(dir).unwrap()
    }

    fn small_config() -> SimConfig {
        let mut config = SimConfig {
            generations: 12,
            seed: 3,
            ..Default::default()
        };
        config.world.size = 10;
        config.world.num_microbes = 6;
        config.world.num_food = 10;
        config
    }

    #[test]
    fn test_checkpoint_serialization() {
        let store = temp_store();
        let sim = Simulation::new(small_config()).unwrap();

        let path = store.save(&sim.snapshot()).unwrap();
        assert!(path.ends_with("checkpoint_00000000.bin"));

        let checkpoint = CheckpointStore::load(&path).unwrap();
        assert_eq!(checkpoint.version, CHECKPOINT_VERSION);
        assert_eq!(checkpoint.state.run_id, sim.run_id());
        assert_eq!(checkpoint.state.organisms.len(), 6);

        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_load_latest_empty_dir() {
        let store = temp_store();
        assert!(matches!(store.load_latest(), Err(Error::NotFound(_))));
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_periodic_checkpoints_and_cleanup() {
        let store = temp_store();
        let mut config = small_config();
        config.output.checkpoint_every = 2;
        config.output.checkpoints_kept = 2;
        config.stop_on_extinction = false;

        let mut sim = Simulation::new(config).unwrap();
        sim.set_checkpoint_store(store.clone());
        sim.run().unwrap();

        let generations: Vec<u64> = store.list().unwrap().into_iter().map(|(_, g)| g).collect();
        assert_eq!(generations, vec![10, 12]);

        let latest = store.load_latest().unwrap();
        assert_eq!(latest.state.generation, 12);

        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_rejects_unknown_version() {
        let store = temp_store();
        let sim = Simulation::new(small_config()).unwrap();
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION + 1,
            timestamp: 0,
            state: sim.snapshot(),
        };
        let path = store.dir().join("checkpoint_00000001.bin");
        fs::write(&path, bincode::serialize(&checkpoint).unwrap()).unwrap();

        assert!(matches!(
            CheckpointStore::load(&path),
            Err(Error::InvalidState(_))
        ));
        fs::remove_dir_all(store.dir()).unwrap();
    }
}
