use crate::config::Target;
use crate::traits::FileSystem;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Records which bucket holds an environment's remote state
pub const STATE_REFERENCE_FILE: &str = ".remote-state.yaml";

/// Present while a bootstrap apply has run but its state is not yet migrated
pub const CHECKPOINT_FILE: &str = ".gtf-bootstrap.yaml";

/// Bucket reference persisted next to backend.tf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateReference {
    pub bucket: String,
    pub project_id: String,
    pub recorded_at: DateTime<Utc>,
}

impl StateReference {
    pub fn new(bucket: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            project_id: project_id.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(STATE_REFERENCE_FILE)
    }

    pub fn load(fs: &dyn FileSystem, dir: &Path) -> Result<Option<Self>> {
        read_yaml(fs, &Self::path(dir))
    }

    pub fn save(&self, fs: &dyn FileSystem, dir: &Path) -> Result<()> {
        write_yaml(fs, &Self::path(dir), self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapPhase {
    /// Bootstrap configuration applied, local state waiting for migration
    Applied,
}

/// Intermediate record between the bootstrap apply and the state migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapCheckpoint {
    pub phase: BootstrapPhase,
    pub environment: String,
    pub project_id: String,
    pub applied_by: String,
    pub applied_at: DateTime<Utc>,
}

impl BootstrapCheckpoint {
    pub fn applied(target: &Target) -> Self {
        Self {
            phase: BootstrapPhase::Applied,
            environment: target.environment.to_string(),
            project_id: target.project_id.clone(),
            applied_by: whoami::username(),
            applied_at: Utc::now(),
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(CHECKPOINT_FILE)
    }

    pub fn load(fs: &dyn FileSystem, dir: &Path) -> Result<Option<Self>> {
        read_yaml(fs, &Self::path(dir))
    }

    pub fn save(&self, fs: &dyn FileSystem, dir: &Path) -> Result<()> {
        write_yaml(fs, &Self::path(dir), self)
    }

    pub fn clear(fs: &dyn FileSystem, dir: &Path) -> Result<()> {
        let path = Self::path(dir);
        if fs.exists(&path) {
            fs.remove_file(&path)?;
        }
        Ok(())
    }
}

fn read_yaml<T: for<'de> Deserialize<'de>>(fs: &dyn FileSystem, path: &Path) -> Result<Option<T>> {
    if !fs.exists(path) {
        return Ok(None);
    }
    let content = fs.read_to_string(path)?;
    let value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_yaml<T: Serialize>(fs: &dyn FileSystem, path: &Path, value: &T) -> Result<()> {
    let content = serde_yaml::to_string(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs.write(path, &content)
}
