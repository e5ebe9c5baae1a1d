//! Per-generation frames of grid codes.

use serde::{Deserialize, Serialize};
use simevo_core::{Result, RunId};
use std::cell::{Ref, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

const FRAME_PREFIX: &str = "frame_";
const FRAME_SUFFIX: &str = ".json";

/// The grid codes of one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub run_id: RunId,
    pub generation: u64,
    pub size: i32,
    /// `size` rows of cell codes
    pub cells: Vec<Vec<u8>>,
}

/// Destination for captured frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
}

/// Keeps frames in memory. Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameSink {
    frames: Rc<RefCell<Vec<Frame>>>,
}

impl MemoryFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Ref<'_, Vec<Frame>> {
        self.frames.borrow()
    }

    pub fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }
}

impl FrameSink for MemoryFrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frames.borrow_mut().push(frame.clone());
        Ok(())
    }
}

/// Writes each frame to `frame_{generation}.json` inside a directory
#[derive(Debug)]
pub struct JsonFrameWriter {
    dir: PathBuf,
}

impl JsonFrameWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_path(&self, generation: u64) -> PathBuf {
        self.dir
            .join(format!("{FRAME_PREFIX}{generation:05}{FRAME_SUFFIX}"))
    }

    pub fn read_frame(path: &Path) -> Result<Frame> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl FrameSink for JsonFrameWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let path = self.frame_path(frame.generation);
        let json = serde_json::to_vec(frame)?;
        fs::write(&path, json)?;
        Ok(())
    }
}

/// Delete every frame file in `dir`, including ones left by earlier runs
pub fn remove_frames(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.starts_with(FRAME_PREFIX) && name.ends_with(FRAME_SUFFIX))
            .unwrap_or(false);

        if is_frame {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove frame {:?}: {}", path, e);
            } else {
                removed += 1;
            }
        }
    }

    debug!(removed, dir = ?dir, "Removed frame files");
    Ok(removed)
}
