use crate::error::GtfError;
use crate::traits::FileSystem;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

const TFVARS_EXTENSION: &str = "tfvars";
const AUTO_TFVARS_SUFFIX: &str = ".auto.tfvars";

/// Finds the project an environment deploys to and the variable files it uses
pub struct ProjectResolver;

impl ProjectResolver {
    /// `.tfvars` files directly inside `dir`, sorted by file name
    pub fn tfvars_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs
            .read_dir(dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == TFVARS_EXTENSION))
            .filter(|p| fs.is_file(p))
            .collect();
        files.sort();
        Ok(files)
    }

    /// The first `project_id = "..."` assignment found across the directory's .tfvars files
    pub fn resolve_project_id(fs: &dyn FileSystem, dir: &Path) -> Result<String> {
        let pattern = Regex::new(r#"(?m)^\s*project_id\s*=\s*"([^"]+)""#)?;

        for file in Self::tfvars_files(fs, dir)? {
            let content = fs.read_to_string(&file)?;
            if let Some(captures) = pattern.captures(&content) {
                let project_id = captures[1].to_string();
                tracing::debug!(file = %file.display(), project_id, "project id resolved");
                return Ok(project_id);
            }
        }

        Err(GtfError::ProjectNotFound(dir.to_path_buf()).into())
    }

    /// `-var-file=<name>` flags for every .tfvars file terraform does not load on its own
    pub fn var_file_flags(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<String>> {
        Ok(Self::tfvars_files(fs, dir)?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .filter(|name| !name.ends_with(AUTO_TFVARS_SUFFIX))
            .map(|name| format!("-var-file={}", name))
            .collect())
    }
}
