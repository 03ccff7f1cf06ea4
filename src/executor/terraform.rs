use super::executor::{BackendConfig, Executor, InitMode, ensure_exit_code, ensure_success};
use crate::traits::CommandExecutor;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Environment variable carrying the remote state bucket name into terraform
pub const BUCKET_ENV_VAR: &str = "TF_BACKEND_BUCKET";

/// Terraform executor implementation
pub struct TerraformExecutor {
    command: Arc<dyn CommandExecutor>,
}

impl TerraformExecutor {
    pub const BINARY: &'static str = "terraform";

    pub fn new(command: Arc<dyn CommandExecutor>) -> Self {
        Self { command }
    }

    fn init_args<'a>(mode: InitMode<'a>) -> (Vec<String>, Option<&'a BackendConfig>) {
        let mut args = vec!["init".to_string(), "-input=false".to_string()];
        let backend = match mode {
            InitMode::NoBackend => {
                args.push("-backend=false".to_string());
                None
            }
            InitMode::Local => None,
            InitMode::Attach(backend) => {
                args.extend(backend.to_args());
                Some(backend)
            }
            InitMode::MigrateState(backend) => {
                args.push("-migrate-state".to_string());
                args.push("-force-copy".to_string());
                args.extend(backend.to_args());
                Some(backend)
            }
        };
        (args, backend)
    }

    fn run_interactive(&self, working_dir: &Path, args: &[&str]) -> Result<()> {
        let line = format!("{} {}", Self::BINARY, args.join(" "));
        let code = self
            .command
            .execute_interactive(Self::BINARY, args, working_dir, &[])?;
        ensure_exit_code(&line, code)?;
        Ok(())
    }
}

impl Executor for TerraformExecutor {
    fn init(&self, working_dir: &Path, mode: InitMode) -> Result<()> {
        let (args, backend) = Self::init_args(mode);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let env: Vec<(&str, &str)> = backend
            .map(|b| vec![(BUCKET_ENV_VAR, b.bucket.as_str())])
            .unwrap_or_default();

        let output = self
            .command
            .execute(Self::BINARY, &args, working_dir, &env)?;
        ensure_success(&format!("{} {}", Self::BINARY, args.join(" ")), &output)?;
        Ok(())
    }

    fn apply_auto_approve(&self, working_dir: &Path) -> Result<()> {
        self.run_interactive(working_dir, &["apply", "-auto-approve", "-input=false"])
    }

    fn plan(&self, working_dir: &Path, var_file_flags: &[String], plan_file: &str) -> Result<()> {
        let out = format!("-out={}", plan_file);
        let mut args = vec!["plan", "-input=false", out.as_str()];
        args.extend(var_file_flags.iter().map(String::as_str));
        self.run_interactive(working_dir, &args)
    }

    fn show(&self, working_dir: &Path, plan_file: &str) -> Result<String> {
        let args = ["show", "-no-color", plan_file];
        let output = self
            .command
            .execute(Self::BINARY, &args, working_dir, &[])?;
        ensure_success(&format!("{} {}", Self::BINARY, args.join(" ")), &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn apply_plan(&self, working_dir: &Path, plan_file: &str) -> Result<()> {
        self.run_interactive(working_dir, &["apply", "-input=false", plan_file])
    }

    fn get_name(&self) -> &str {
        Self::BINARY
    }
}
