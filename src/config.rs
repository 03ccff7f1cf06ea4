use crate::environment::Environment;
use crate::executor::backend::validate_backend_type;
use crate::traits::FileSystem;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the repository root
pub const CONFIG_FILE: &str = ".gtf.yaml";

/// Repository-level settings, typically loaded from .gtf.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend type written into backend.tf
    pub backend_type: String,

    /// Files that make up the bootstrap configuration of an environment
    pub bootstrap_files: Vec<String>,

    /// Regex patterns a bucket name must match to be taken as the remote state bucket
    pub bucket_patterns: Vec<String>,

    /// Suffix appended to the project id to form the plan archive bucket
    pub plans_bucket_suffix: String,

    /// First path segment under the plan bucket (e.g. "local")
    pub plan_origin: String,

    /// Cloud Build configuration submitted by --cloud-build, relative to the working directory
    pub cloud_build_config: String,

    /// Optional `prefix` passed to the backend configuration
    pub state_prefix: Option<String>,

    /// Working directory overrides per environment, relative to the root
    pub environments: BTreeMap<String, PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_type: "gcs".to_string(),
            bootstrap_files: vec![
                "setup.tf".to_string(),
                "provider.tf".to_string(),
                "variables.tf".to_string(),
                "setup.auto.tfvars".to_string(),
            ],
            bucket_patterns: vec![
                "terraform-remote-backend$".to_string(),
                "tf-state-remote-backend".to_string(),
            ],
            plans_bucket_suffix: "-tf-plans".to_string(),
            plan_origin: "local".to_string(),
            cloud_build_config: "cloudbuild.yaml".to_string(),
            state_prefix: None,
            environments: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file does not exist
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        if !fs.exists(path) {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = fs.read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        validate_backend_type(&self.backend_type)?;

        if self.bootstrap_files.is_empty() {
            anyhow::bail!("bootstrap_files must name at least one file");
        }

        if self.bucket_patterns.is_empty() {
            anyhow::bail!("bucket_patterns must contain at least one pattern");
        }
        self.bucket_regexes()?;

        for name in self.environments.keys() {
            name.parse::<Environment>()?;
        }

        Ok(())
    }

    pub fn bucket_regexes(&self) -> Result<Vec<Regex>> {
        self.bucket_patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid bucket pattern '{}'", p)))
            .collect()
    }

    /// Working directory of `env`: the configured override, or `<root>/<env>`
    pub fn working_dir(&self, root: &Path, env: Environment) -> PathBuf {
        match self.environments.get(env.as_str()) {
            Some(dir) => root.join(dir),
            None => root.join(env.as_str()),
        }
    }

    pub fn plans_bucket(&self, project_id: &str) -> String {
        format!("{}{}", project_id, self.plans_bucket_suffix)
    }
}

/// Everything the linker and runner need to know about the environment being driven
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub environment: Environment,
    pub project_id: String,
    pub working_dir: PathBuf,
    /// Bucket name given explicitly (flag or TF_BACKEND_BUCKET)
    pub bucket_override: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    #[test]
    fn test_missing_file_yields_defaults() {
        let fs = MockFileSystem::new();
        let settings = Settings::load(&fs, Path::new("/repo/.gtf.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.backend_type, "gcs");
        assert_eq!(settings.bootstrap_files.len(), 4);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let fs = MockFileSystem::new();
        fs.write(
            Path::new("/repo/.gtf.yaml"),
            "plan_origin: cloudbuild\nenvironments:\n  prod: live/production\n",
        )
        .unwrap();

        let settings = Settings::load(&fs, Path::new("/repo/.gtf.yaml")).unwrap();
        assert_eq!(settings.plan_origin, "cloudbuild");
        assert_eq!(settings.plans_bucket_suffix, "-tf-plans");
        assert_eq!(
            settings.working_dir(Path::new("/repo"), Environment::Prod),
            PathBuf::from("/repo/live/production")
        );
        assert_eq!(
            settings.working_dir(Path::new("/repo"), Environment::Dev),
            PathBuf::from("/repo/dev")
        );
    }

    #[test]
    fn test_unsupported_backend_rejected() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/repo/.gtf.yaml"), "backend_type: floppy\n")
            .unwrap();
        assert!(Settings::load(&fs, Path::new("/repo/.gtf.yaml")).is_err());
    }

    #[test]
    fn test_unknown_environment_key_rejected() {
        let fs = MockFileSystem::new();
        fs.write(
            Path::new("/repo/.gtf.yaml"),
            "environments:\n  qa: qa\n",
        )
        .unwrap();
        assert!(Settings::load(&fs, Path::new("/repo/.gtf.yaml")).is_err());
    }

    #[test]
    fn test_invalid_bucket_pattern_rejected() {
        let settings = Settings {
            bucket_patterns: vec!["(".to_string()],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_plans_bucket_name() {
        assert_eq!(
            Settings::default().plans_bucket("acme-dev"),
            "acme-dev-tf-plans"
        );
    }
}
