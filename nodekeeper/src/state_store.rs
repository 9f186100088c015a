//! File-backed record of the container this supervisor owns.
//!
//! The file holds a single `container_id: <id>` record. Its presence is the
//! "something is managed" flag. No locking is done: one supervisor process
//! per host is an operating assumption.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::driver::ContainerId;
use crate::errors::{NodekeeperError, NodekeeperResult};

/// Persisted "which container is mine" record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedContainerState {
    pub container_id: ContainerId,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `id` as the managed container, replacing any prior record.
    ///
    /// The record is written to a temporary file next to the target and
    /// renamed over it, so readers never observe a partial write.
    pub fn save(&self, id: &ContainerId) -> NodekeeperResult<()> {
        let record = ManagedContainerState {
            container_id: id.clone(),
        };
        let content = serde_yaml::to_string(&record)
            .map_err(|e| NodekeeperError::Persistence(format!("failed to encode state: {}", e)))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| {
            NodekeeperError::Persistence(format!(
                "failed to create state dir {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| {
            NodekeeperError::Persistence(format!(
                "could not create container ID file in {}: {}",
                dir.display(),
                e
            ))
        })?;
        tmp.write_all(content.as_bytes()).map_err(|e| {
            NodekeeperError::Persistence(format!("could not write container ID file: {}", e))
        })?;
        tmp.persist(&self.path).map_err(|e| {
            NodekeeperError::Persistence(format!(
                "could not persist container ID file {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        tracing::debug!(path = %self.path.display(), container_id = %id, "Saved state");
        Ok(())
    }

    /// Read the recorded container, if any.
    ///
    /// Unreadable or malformed content is reported as absent with a warning.
    pub fn load(&self) -> Option<ContainerId> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read state file: {}", e);
                return None;
            }
        };

        match serde_yaml::from_str::<ManagedContainerState>(&content) {
            Ok(record) if !record.container_id.as_str().trim().is_empty() => {
                Some(record.container_id)
            }
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "State file has an empty container ID");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Invalid state file: {}", e);
                None
            }
        }
    }

    /// Remove the record. A missing file is not an error.
    pub fn clear(&self) -> NodekeeperResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Cleared state");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NodekeeperError::Persistence(format!(
                "could not remove state file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
