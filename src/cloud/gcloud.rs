use crate::executor::executor::{ensure_exit_code, ensure_success};
use crate::traits::CommandExecutor;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const GCLOUD: &str = "gcloud";
pub const GSUTIL: &str = "gsutil";

/// Thin client over the gcloud and gsutil CLIs
pub struct GcloudClient {
    command: Arc<dyn CommandExecutor>,
    working_dir: PathBuf,
}

/// Parameters of a `gcloud builds submit` call
#[derive(Debug, Clone)]
pub struct BuildSubmission<'a> {
    pub project_id: &'a str,
    pub config: &'a Path,
    pub source_dir: &'a Path,
    pub substitutions: Vec<(String, String)>,
}

impl GcloudClient {
    pub fn new(command: Arc<dyn CommandExecutor>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            working_dir: working_dir.into(),
        }
    }

    fn capture(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = self
            .command
            .execute(program, args, &self.working_dir, &[])?;
        ensure_success(&format!("{} {}", program, args.join(" ")), &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn interactive(&self, program: &str, args: &[&str]) -> Result<()> {
        let code = self
            .command
            .execute_interactive(program, args, &self.working_dir, &[])?;
        ensure_exit_code(&format!("{} {}", program, args.join(" ")), code)?;
        Ok(())
    }

    /// Currently active gcloud account, if any
    pub fn active_account(&self) -> Result<Option<String>> {
        let stdout = self.capture(
            GCLOUD,
            &[
                "auth",
                "list",
                "--filter=status:ACTIVE",
                "--format=value(account)",
            ],
        )?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string))
    }

    pub fn login(&self) -> Result<()> {
        self.interactive(GCLOUD, &["auth", "login"])
    }

    pub fn has_application_default_credentials(&self) -> Result<bool> {
        let output = self.command.execute(
            GCLOUD,
            &["auth", "application-default", "print-access-token"],
            &self.working_dir,
            &[],
        )?;
        Ok(output.status.success())
    }

    pub fn application_default_login(&self) -> Result<()> {
        self.interactive(GCLOUD, &["auth", "application-default", "login"])
    }

    pub fn set_project(&self, project_id: &str) -> Result<()> {
        self.capture(GCLOUD, &["config", "set", "project", project_id])?;
        Ok(())
    }

    /// Bucket names (without the gs:// scheme) visible in `project_id`
    pub fn list_buckets(&self, project_id: &str) -> Result<Vec<String>> {
        let stdout = self.capture(GSUTIL, &["ls", "-p", project_id])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                l.trim_start_matches("gs://")
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect())
    }

    /// Object or prefix URLs directly under `url`
    pub fn list(&self, url: &str) -> Result<Vec<String>> {
        let stdout = self.capture(GSUTIL, &["ls", url])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.capture(GSUTIL, &["cp", from, to])?;
        Ok(())
    }

    pub fn submit_build(&self, submission: &BuildSubmission) -> Result<()> {
        let project = format!("--project={}", submission.project_id);
        let config = format!("--config={}", submission.config.display());
        let substitutions = submission
            .substitutions
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        let substitutions = format!("--substitutions={}", substitutions);
        let source = submission.source_dir.display().to_string();

        self.interactive(
            GCLOUD,
            &[
                "builds",
                "submit",
                &project,
                &config,
                &substitutions,
                &source,
            ],
        )
    }
}
