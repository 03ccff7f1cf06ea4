use std::path::PathBuf;
use thiserror::Error;

/// Failures that decide the process exit code
#[derive(Debug, Error)]
pub enum GtfError {
    #[error("required command '{0}' was not found on PATH")]
    MissingDependency(String),

    #[error("invalid {name} '{value}': expected {expected}")]
    InvalidArgument {
        name: String,
        value: String,
        expected: String,
    },

    #[error("{0}")]
    Usage(String),

    #[error("missing required files in {}: {}", .dir.display(), .files.join(", "))]
    MissingFiles { dir: PathBuf, files: Vec<String> },

    #[error("no project_id assignment found in the .tfvars files of {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("'{command}' failed{}: {message}", .exit_code.map(|c| format!(" (exit code {})", c)).unwrap_or_default())]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("{0} was declined")]
    Declined(String),

    #[error("no bucket matching {patterns} in project {project}")]
    BucketNotFound { project: String, patterns: String },

    #[error("several buckets match the remote state pattern: {}; pass --state-bucket to choose one", .0.join(", "))]
    AmbiguousBucket(Vec<String>),

    #[error("no plan archive found for build id '{0}'")]
    PlanNotFound(String),
}

impl GtfError {
    /// Process exit code for this failure: 2 for a missing tool, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            GtfError::MissingDependency(_) => 2,
            _ => 1,
        }
    }
}

/// Exit code for any error surfaced from a command
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<GtfError>())
        .map(GtfError::exit_code)
        .unwrap_or(1)
}
