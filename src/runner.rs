use crate::archive::{self, BuildId, BuildRef};
use crate::cloud::GcloudClient;
use crate::config::{Settings, Target};
use crate::context::Context;
use crate::error::GtfError;
use crate::executor::Executor;
use crate::traits::FileSystem;
use anyhow::{Context as AnyhowContext, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PLAN_FILE: &str = "tfplan";
pub const PLAN_TEXT_FILE: &str = "tfplan.txt";
pub const PLAN_ARCHIVE_FILE: &str = "tfplan.tar.gz";

/// Plan files in the working directory, deleted when dropped
struct LocalArtifacts {
    fs: Arc<dyn FileSystem>,
    paths: Vec<PathBuf>,
}

impl LocalArtifacts {
    fn new(fs: Arc<dyn FileSystem>, dir: &Path) -> Self {
        let paths = [PLAN_FILE, PLAN_TEXT_FILE, PLAN_ARCHIVE_FILE]
            .iter()
            .map(|name| dir.join(name))
            .collect();
        Self { fs, paths }
    }
}

impl Drop for LocalArtifacts {
    fn drop(&mut self) {
        for path in &self.paths {
            if !self.fs.exists(path) {
                continue;
            }
            if let Err(err) = self.fs.remove_file(path) {
                tracing::warn!(path = %path.display(), %err, "failed to remove plan artifact");
            }
        }
    }
}

/// Produces plans, stores them in the plan bucket and applies them by build id
pub struct TerraformRunner<'a> {
    ctx: &'a Context,
    settings: &'a Settings,
    executor: &'a dyn Executor,
    cloud: &'a GcloudClient,
}

impl<'a> TerraformRunner<'a> {
    pub fn new(
        ctx: &'a Context,
        settings: &'a Settings,
        executor: &'a dyn Executor,
        cloud: &'a GcloudClient,
    ) -> Self {
        Self {
            ctx,
            settings,
            executor,
            cloud,
        }
    }

    /// gs:// prefix holding every build of this origin
    fn origin_url(&self, target: &Target) -> String {
        format!(
            "gs://{}/{}/",
            self.settings.plans_bucket(&target.project_id),
            self.settings.plan_origin
        )
    }

    fn build_url(&self, target: &Target, id: &BuildId, file: &str) -> String {
        format!("{}{}/{}", self.origin_url(target), id, file)
    }

    pub fn plan(&self, target: &Target, var_file_flags: &[String]) -> Result<BuildId> {
        let dir = &target.working_dir;
        let fs = &*self.ctx.fs;
        let _artifacts = LocalArtifacts::new(self.ctx.fs.clone(), dir);

        self.ctx.output.section(&format!(
            "Planning {} ({})",
            target.environment, target.project_id
        ));
        self.executor.plan(dir, var_file_flags, PLAN_FILE)?;

        let rendering = self.executor.show(dir, PLAN_FILE)?;
        fs.write(&dir.join(PLAN_TEXT_FILE), &rendering)?;

        let plan = fs
            .read(&dir.join(PLAN_FILE))
            .context("terraform plan did not produce a plan file")?;
        let packed = archive::pack(&[(PLAN_FILE, plan.as_slice())])?;
        fs.write_bytes(&dir.join(PLAN_ARCHIVE_FILE), &packed)?;

        let id = BuildId::generate(chrono::Local::now().date_naive());
        for file in [PLAN_ARCHIVE_FILE, PLAN_TEXT_FILE] {
            let local = dir.join(file);
            self.cloud
                .copy(&local.to_string_lossy(), &self.build_url(target, &id, file))
                .with_context(|| format!("Failed to upload {}", file))?;
        }

        self.ctx.output.success("Plan stored");
        self.ctx.output.key_value("Build id", id.as_str());
        self.ctx.output.dimmed(&format!(
            "Apply it with: gtf {} apply {}",
            target.environment, id
        ));
        Ok(id)
    }

    pub fn apply(&self, target: &Target, build: &BuildRef) -> Result<()> {
        let dir = &target.working_dir;
        let fs = &*self.ctx.fs;
        let _artifacts = LocalArtifacts::new(self.ctx.fs.clone(), dir);

        let id = self.resolve_build(target, build)?;
        self.ctx.output.section(&format!("Applying build {}", id));

        for file in [PLAN_ARCHIVE_FILE, PLAN_TEXT_FILE] {
            let local = dir.join(file);
            self.cloud
                .copy(&self.build_url(target, &id, file), &local.to_string_lossy())
                .with_context(|| format!("Failed to download {} of build {}", file, id))?;
        }

        let packed = fs.read(&dir.join(PLAN_ARCHIVE_FILE))?;
        let plan = archive::unpack(&packed)?
            .into_iter()
            .find(|(name, _)| name == PLAN_FILE)
            .map(|(_, contents)| contents)
            .with_context(|| format!("{} of build {} holds no {}", PLAN_ARCHIVE_FILE, id, PLAN_FILE))?;
        fs.write_bytes(&dir.join(PLAN_FILE), &plan)?;

        let rendering = fs.read_to_string(&dir.join(PLAN_TEXT_FILE))?;
        self.ctx.output.dimmed(rendering.trim_end());
        self.ctx.output.blank();

        let confirmed = self.ctx.input.confirm(&format!(
            "Apply build {} to {} in project {}?",
            id, target.environment, target.project_id
        ))?;
        if !confirmed {
            return Err(GtfError::Declined(format!("Apply of build {}", id)).into());
        }

        self.executor.apply_plan(dir, PLAN_FILE)?;
        self.ctx.output.success(&format!("Build {} applied", id));
        Ok(())
    }

    fn resolve_build(&self, target: &Target, build: &BuildRef) -> Result<BuildId> {
        match build {
            BuildRef::Full(id) => Ok(id.clone()),
            BuildRef::Hex(_) => {
                let keys = self
                    .cloud
                    .list(&self.origin_url(target))
                    .with_context(|| format!("Failed to look up build {}", build))?;
                let id = build.find_in(&keys)?;
                tracing::debug!(build = %build, resolved = %id, "build id resolved");
                Ok(id)
            }
        }
    }
}
