use crate::error::GtfError;
use anyhow::Result;
use std::path::Path;
use std::process::Output;

/// Values handed to `terraform init -backend-config=...`
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub bucket: String,
    pub prefix: Option<String>,
}

impl BackendConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![format!("-backend-config=bucket={}", self.bucket)];
        if let Some(prefix) = &self.prefix {
            args.push(format!("-backend-config=prefix={}", prefix));
        }
        args
    }
}

/// How `init` should treat the backend
#[derive(Debug, Clone, Copy)]
pub enum InitMode<'a> {
    /// Skip backend initialization entirely (`-backend=false`)
    NoBackend,
    /// Plain init, for directories without a backend block
    Local,
    /// Attach to an existing remote backend
    Attach(&'a BackendConfig),
    /// Move local state into the remote backend
    MigrateState(&'a BackendConfig),
}

/// Trait for Infrastructure as Code executors
pub trait Executor: Send + Sync {
    /// Initialize the working directory
    fn init(&self, working_dir: &Path, mode: InitMode) -> Result<()>;

    /// Apply the configuration without a saved plan and without prompting
    fn apply_auto_approve(&self, working_dir: &Path) -> Result<()>;

    /// Compute a plan into `plan_file`; runs with inherited stdio
    fn plan(&self, working_dir: &Path, var_file_flags: &[String], plan_file: &str) -> Result<()>;

    /// Human-readable rendering of a saved plan
    fn show(&self, working_dir: &Path, plan_file: &str) -> Result<String>;

    /// Apply a saved plan; runs with inherited stdio
    fn apply_plan(&self, working_dir: &Path, plan_file: &str) -> Result<()>;

    /// Get the name of this executor (e.g., "terraform")
    fn get_name(&self) -> &str;
}

/// Turn a captured non-zero exit into a `CommandFailed` error carrying stderr
pub fn ensure_success(command_line: &str, output: &Output) -> Result<(), GtfError> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    };

    Err(GtfError::CommandFailed {
        command: command_line.to_string(),
        exit_code: output.status.code(),
        message,
    })
}

/// Same as `ensure_success` for interactive runs, where output already went to the terminal
pub fn ensure_exit_code(command_line: &str, code: i32) -> Result<(), GtfError> {
    if code == 0 {
        return Ok(());
    }

    Err(GtfError::CommandFailed {
        command: command_line.to_string(),
        exit_code: Some(code),
        message: "see output above".to_string(),
    })
}
