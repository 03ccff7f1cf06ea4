use super::reference::{BootstrapCheckpoint, StateReference};
use super::scratch::ScratchDir;
use crate::cloud::GcloudClient;
use crate::config::{Settings, Target};
use crate::context::Context;
use crate::error::GtfError;
use crate::executor::backend::{BACKEND_FILE, declares_backend, render_backend_declaration};
use crate::executor::{BackendConfig, Executor, InitMode};
use anyhow::{Context as AnyhowContext, Result};
use std::path::{Path, PathBuf};

const LOCAL_STATE_FILE: &str = "terraform.tfstate";

/// Where an environment's working directory stands with respect to remote state
#[derive(Debug, Clone, PartialEq)]
pub enum LinkState {
    /// No backend.tf: remote state has never been set up
    NoBackend,
    /// Bootstrap applied but its local state has not reached the bucket yet
    PendingMigration(BootstrapCheckpoint),
    /// backend.tf present, nothing pending
    Linked,
}

/// Makes sure a working directory is bound to its remote state bucket
pub struct RemoteStateLinker<'a> {
    ctx: &'a Context,
    settings: &'a Settings,
    executor: &'a dyn Executor,
    cloud: &'a GcloudClient,
    scratch_root: PathBuf,
}

impl<'a> RemoteStateLinker<'a> {
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
            scratch_root: std::env::temp_dir(),
        }
    }

    /// Create scratch directories under `root` instead of the system temp dir
    #[cfg(test)]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    pub fn detect(&self, dir: &Path) -> Result<LinkState> {
        if let Some(checkpoint) = BootstrapCheckpoint::load(&*self.ctx.fs, dir)? {
            return Ok(LinkState::PendingMigration(checkpoint));
        }

        if self.ctx.fs.exists(&dir.join(BACKEND_FILE)) {
            Ok(LinkState::Linked)
        } else {
            Ok(LinkState::NoBackend)
        }
    }

    /// Bootstrap, resume or attach as the working directory requires
    pub fn ensure_linked(&self, target: &Target) -> Result<BackendConfig> {
        let dir = &target.working_dir;

        match self.detect(dir)? {
            LinkState::NoBackend => {
                self.ctx.output.section("Bootstrapping remote state");
                self.bootstrap(target)
            }
            LinkState::PendingMigration(checkpoint) => {
                self.ctx.output.section("Resuming remote state migration");
                self.ctx.output.warning(&format!(
                    "Bootstrap for {} was applied by {} at {} but its state was never migrated",
                    checkpoint.environment, checkpoint.applied_by, checkpoint.applied_at
                ));
                self.migrate(target)
            }
            LinkState::Linked => {
                self.ctx.output.section("Linking remote state");
                self.attach(target)
            }
        }
    }

    fn bootstrap(&self, target: &Target) -> Result<BackendConfig> {
        let dir = &target.working_dir;

        let confirmed = self.ctx.input.confirm(&format!(
            "No {} in {}. Bootstrap remote state for {} in project {}?",
            BACKEND_FILE,
            dir.display(),
            target.environment,
            target.project_id
        ))?;
        if !confirmed {
            return Err(GtfError::Declined("Remote state bootstrap".to_string()).into());
        }

        self.ctx.output.info(&format!(
            "Initializing {} without a backend",
            self.executor.get_name()
        ));
        self.executor.init(dir, InitMode::NoBackend)?;

        self.verify_bootstrap_files(dir)?;
        self.apply_in_scratch(target)?;
        self.ctx.output.success("Bootstrap configuration applied");

        self.migrate(target)
    }

    fn verify_bootstrap_files(&self, dir: &Path) -> Result<()> {
        let missing: Vec<String> = self
            .settings
            .bootstrap_files
            .iter()
            .filter(|name| !self.ctx.fs.is_file(&dir.join(name)))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(GtfError::MissingFiles {
                dir: dir.to_path_buf(),
                files: missing,
            }
            .into());
        }

        if self.ctx.fs.exists(&dir.join(LOCAL_STATE_FILE)) {
            anyhow::bail!(
                "{} already holds a local {}; move it away before bootstrapping",
                dir.display(),
                LOCAL_STATE_FILE
            );
        }

        Ok(())
    }

    /// Apply the bootstrap files in isolation and bring the resulting state back
    fn apply_in_scratch(&self, target: &Target) -> Result<()> {
        let dir = &target.working_dir;
        let scratch = ScratchDir::create(self.ctx.fs.clone(), &self.scratch_root, "gtf-bootstrap")?;

        for name in &self.settings.bootstrap_files {
            self.ctx
                .fs
                .copy(&dir.join(name), &scratch.path().join(name))
                .with_context(|| format!("Failed to stage {}", name))?;
        }
        self.ctx
            .output
            .dimmed(&format!("Staged bootstrap files in {}", scratch.path().display()));

        self.executor
            .init(scratch.path(), InitMode::Local)
            .context("Bootstrap init failed")?;
        self.executor
            .apply_auto_approve(scratch.path())
            .context("Bootstrap apply failed")?;

        let state = scratch.path().join(LOCAL_STATE_FILE);
        if self.ctx.fs.exists(&state) {
            self.ctx.fs.copy(&state, &dir.join(LOCAL_STATE_FILE))?;
        } else {
            self.ctx
                .output
                .warning("Bootstrap apply produced no local state file");
        }

        BootstrapCheckpoint::applied(target).save(&*self.ctx.fs, dir)?;
        Ok(())
    }

    /// Declare the backend, find the bucket and move local state into it
    fn migrate(&self, target: &Target) -> Result<BackendConfig> {
        let dir = &target.working_dir;

        self.ensure_backend_declaration(dir)?;
        let backend = self.backend_config(target)?;

        self.ctx.output.info("Migrating local state to the remote backend");
        self.executor
            .init(dir, InitMode::MigrateState(&backend))
            .context("State migration failed; rerun to retry the migration")?;

        BootstrapCheckpoint::clear(&*self.ctx.fs, dir)?;
        self.ctx.output.success(&format!(
            "Remote state linked to gs://{}",
            backend.bucket
        ));
        Ok(backend)
    }

    fn attach(&self, target: &Target) -> Result<BackendConfig> {
        let backend = self.backend_config(target)?;
        self.executor
            .init(&target.working_dir, InitMode::Attach(&backend))?;
        self.ctx.output.success(&format!(
            "Remote state linked to gs://{}",
            backend.bucket
        ));
        Ok(backend)
    }

    fn ensure_backend_declaration(&self, dir: &Path) -> Result<()> {
        let path = dir.join(BACKEND_FILE);
        let backend_type = &self.settings.backend_type;

        if self.ctx.fs.exists(&path) {
            let content = self.ctx.fs.read_to_string(&path)?;
            if !declares_backend(&content, backend_type) {
                self.ctx.output.warning(&format!(
                    "{} exists but declares no backend \"{}\" block; leaving it unmodified",
                    path.display(),
                    backend_type
                ));
            }
            return Ok(());
        }

        self.ctx
            .fs
            .write(&path, &render_backend_declaration(backend_type)?)?;
        self.ctx
            .output
            .success(&format!("Wrote {}", path.display()));
        Ok(())
    }

    fn backend_config(&self, target: &Target) -> Result<BackendConfig> {
        let bucket = self.resolve_bucket(target)?;
        self.ctx.output.key_value("State bucket", &bucket);
        Ok(BackendConfig::new(bucket).with_prefix(self.settings.state_prefix.clone()))
    }

    /// Explicit override, then the persisted reference, then discovery
    pub fn resolve_bucket(&self, target: &Target) -> Result<String> {
        let fs = &*self.ctx.fs;
        let dir = &target.working_dir;
        let stored = StateReference::load(fs, dir)?;

        if let Some(bucket) = &target.bucket_override {
            if stored.is_none() {
                StateReference::new(bucket, &target.project_id).save(fs, dir)?;
            }
            return Ok(bucket.clone());
        }

        match stored {
            Some(reference) if reference.project_id == target.project_id => {
                return Ok(reference.bucket);
            }
            Some(reference) => {
                self.ctx.output.warning(&format!(
                    "Recorded state bucket {} belongs to project {}, not {}; discovering again",
                    reference.bucket, reference.project_id, target.project_id
                ));
            }
            None => {}
        }

        let bucket = self.discover_bucket(&target.project_id)?;
        StateReference::new(&bucket, &target.project_id).save(fs, dir)?;
        Ok(bucket)
    }

    fn discover_bucket(&self, project_id: &str) -> Result<String> {
        let patterns = self.settings.bucket_regexes()?;
        let candidates: Vec<String> = self
            .cloud
            .list_buckets(project_id)?
            .into_iter()
            .filter(|name| patterns.iter().any(|p| p.is_match(name)))
            .collect();

        match candidates.as_slice() {
            [] => Err(GtfError::BucketNotFound {
                project: project_id.to_string(),
                patterns: self.settings.bucket_patterns.join(" or "),
            }
            .into()),
            [bucket] => Ok(bucket.clone()),
            _ => Err(GtfError::AmbiguousBucket(candidates).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::executor::TerraformExecutor;
    use crate::state::reference::CHECKPOINT_FILE;
    use crate::traits::{
        FileSystem, MockCommandExecutor, MockCommandResult, MockFileSystem, MockOutput,
        MockUserInput,
    };
    use std::sync::Arc;

    const DIR: &str = "/repo/dev";
    const BUCKETS: &str = "gs://acme-dev-assets/\ngs://acme-dev-terraform-remote-backend/\n";

    struct Harness {
        fs: Arc<MockFileSystem>,
        input: Arc<MockUserInput>,
        output: Arc<MockOutput>,
        command: Arc<MockCommandExecutor>,
        ctx: Context,
        settings: Settings,
    }

    impl Harness {
        fn new(answers: &[&str], command: MockCommandExecutor) -> Self {
            let fs = Arc::new(MockFileSystem::new());
            let input = Arc::new(MockUserInput::with_answers(answers));
            let output = Arc::new(MockOutput::new());
            let command = Arc::new(command);
            let ctx = Context::test_with(fs.clone(), input.clone(), output.clone(), command.clone());
            fs.create_dir_all(Path::new(DIR)).unwrap();
            Self {
                fs,
                input,
                output,
                command,
                ctx,
                settings: Settings::default(),
            }
        }

        fn with_buckets(answers: &[&str]) -> Self {
            Self::new(
                answers,
                MockCommandExecutor::with_outputs(vec![
                    MockCommandResult::new("gsutil", &["ls", "-p"], 0).stdout(BUCKETS),
                ]),
            )
        }

        fn write_bootstrap_files(&self) {
            for name in &self.settings.bootstrap_files {
                self.fs
                    .write(&Path::new(DIR).join(name), "# bootstrap")
                    .unwrap();
            }
        }

        fn target(&self) -> Target {
            Target {
                environment: Environment::Dev,
                project_id: "acme-dev".to_string(),
                working_dir: PathBuf::from(DIR),
                bucket_override: None,
            }
        }

        fn run(&self) -> Result<BackendConfig> {
            let executor = TerraformExecutor::new(self.command.clone());
            let cloud = GcloudClient::new(self.command.clone(), "/repo");
            RemoteStateLinker::new(&self.ctx, &self.settings, &executor, &cloud)
                .with_scratch_root("/tmp")
                .ensure_linked(&self.target())
        }

        fn scratch_dirs(&self) -> Vec<PathBuf> {
            self.command
                .invocations()
                .iter()
                .map(|i| i.working_dir.clone())
                .filter(|d| d.starts_with("/tmp"))
                .collect()
        }
    }

    #[test]
    fn test_bootstrap_runs_when_backend_missing() {
        let h = Harness::with_buckets(&["y"]);
        h.write_bootstrap_files();

        let backend = h.run().unwrap();
        assert_eq!(backend.bucket, "acme-dev-terraform-remote-backend");

        let lines = h.command.lines();
        assert_eq!(
            lines,
            vec![
                "terraform init -input=false -backend=false",
                "terraform init -input=false",
                "terraform apply -auto-approve -input=false",
                "gsutil ls -p acme-dev",
                "terraform init -input=false -migrate-state -force-copy -backend-config=bucket=acme-dev-terraform-remote-backend",
            ]
        );

        let calls = h.command.invocations();
        assert_eq!(calls[0].working_dir, PathBuf::from(DIR));
        assert!(calls[1].working_dir.starts_with("/tmp"));
        assert_eq!(calls[1].working_dir, calls[2].working_dir);
        assert_eq!(calls[4].working_dir, PathBuf::from(DIR));

        let backend_tf = h.fs.get_file_contents(&Path::new(DIR).join(BACKEND_FILE)).unwrap();
        assert!(backend_tf.contains("backend \"gcs\" {}"));
        assert!(!h.fs.has_file(&Path::new(DIR).join(CHECKPOINT_FILE)));

        let reference = StateReference::load(&*h.fs, Path::new(DIR)).unwrap().unwrap();
        assert_eq!(reference.bucket, "acme-dev-terraform-remote-backend");
    }

    #[test]
    fn test_bootstrap_stages_files_and_removes_scratch() {
        let h = Harness::with_buckets(&["y"]);
        h.write_bootstrap_files();

        h.run().unwrap();

        let scratch = h.scratch_dirs();
        assert!(!scratch.is_empty());
        for dir in scratch {
            assert!(!h.fs.exists(&dir), "{} survived", dir.display());
        }
        assert!(h.fs.list_files().iter().all(|f| !f.starts_with("/tmp")));
    }

    #[test]
    fn test_scratch_removed_when_bootstrap_apply_fails() {
        let h = Harness::new(
            &["y"],
            MockCommandExecutor::with_outputs(vec![MockCommandResult::new(
                "terraform",
                &["apply"],
                1,
            )]),
        );
        h.write_bootstrap_files();

        let err = h.run().unwrap_err();
        assert!(format!("{:#}", err).contains("Bootstrap apply failed"));

        let scratch = h.scratch_dirs();
        assert_eq!(scratch.len(), 2);
        assert!(!h.fs.exists(&scratch[0]));
        assert!(!h.fs.has_file(&Path::new(DIR).join(BACKEND_FILE)));
        assert!(!h.fs.has_file(&Path::new(DIR).join(CHECKPOINT_FILE)));
        assert!(!h.command.lines().iter().any(|l| l.contains("-migrate-state")));
    }

    #[test]
    fn test_scratch_removed_when_bootstrap_init_fails() {
        let h = Harness::new(
            &["y"],
            MockCommandExecutor::with_outputs(vec![
                // The first init (-backend=false in the working dir) succeeds
                MockCommandResult::new("terraform", &["init", "-input=false", "-backend=false"], 0),
                MockCommandResult::new("terraform", &["init"], 1).stderr("provider not found"),
            ]),
        );
        h.write_bootstrap_files();

        assert!(h.run().is_err());
        let scratch = h.scratch_dirs();
        assert_eq!(scratch.len(), 1);
        assert!(!h.fs.exists(&scratch[0]));
        assert!(!h.command.lines().iter().any(|l| l.starts_with("terraform apply")));
    }

    #[test]
    fn test_declined_bootstrap_runs_nothing() {
        let h = Harness::with_buckets(&["n"]);
        h.write_bootstrap_files();

        let err = h.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GtfError>(),
            Some(GtfError::Declined(_))
        ));
        assert!(h.command.invocations().is_empty());
        assert!(h.input.prompts()[0].contains("acme-dev"));
    }

    #[test]
    fn test_any_non_yes_answer_declines() {
        let h = Harness::with_buckets(&["whatever"]);
        h.write_bootstrap_files();
        assert!(h.run().is_err());
        assert!(h.command.invocations().is_empty());
    }

    #[test]
    fn test_missing_bootstrap_files_reported() {
        let h = Harness::with_buckets(&["y"]);
        h.fs.write(&Path::new(DIR).join("setup.tf"), "").unwrap();

        let err = h.run().unwrap_err();
        match err.downcast_ref::<GtfError>() {
            Some(GtfError::MissingFiles { files, .. }) => assert_eq!(
                files,
                &vec![
                    "provider.tf".to_string(),
                    "variables.tf".to_string(),
                    "setup.auto.tfvars".to_string()
                ]
            ),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(h.scratch_dirs().is_empty());
        assert!(!h.command.lines().iter().any(|l| l.starts_with("terraform apply")));
    }

    #[test]
    fn test_linked_directory_attaches_without_bootstrap() {
        let h = Harness::with_buckets(&[]);
        h.fs.write(
            &Path::new(DIR).join(BACKEND_FILE),
            &render_backend_declaration("gcs").unwrap(),
        )
        .unwrap();

        h.run().unwrap();

        assert_eq!(
            h.command.lines(),
            vec![
                "gsutil ls -p acme-dev",
                "terraform init -input=false -backend-config=bucket=acme-dev-terraform-remote-backend",
            ]
        );
        assert!(h.input.prompts().is_empty());
        assert!(h.scratch_dirs().is_empty());
    }

    #[test]
    fn test_attach_uses_persisted_reference() {
        let h = Harness::new(&[], MockCommandExecutor::new());
        h.fs.write(&Path::new(DIR).join(BACKEND_FILE), "terraform {\n  backend \"gcs\" {}\n}\n")
            .unwrap();
        StateReference::new("recorded-bucket", "acme-dev")
            .save(&*h.fs, Path::new(DIR))
            .unwrap();

        let backend = h.run().unwrap();
        assert_eq!(backend.bucket, "recorded-bucket");
        assert_eq!(
            h.command.lines(),
            vec!["terraform init -input=false -backend-config=bucket=recorded-bucket"]
        );
    }

    #[test]
    fn test_ambiguous_discovery_fails() {
        let h = Harness::new(
            &[],
            MockCommandExecutor::with_outputs(vec![
                MockCommandResult::new("gsutil", &["ls"], 0).stdout(
                    "gs://a-terraform-remote-backend/\ngs://b-tf-state-remote-backend/\n",
                ),
            ]),
        );
        h.fs.write(&Path::new(DIR).join(BACKEND_FILE), "terraform {\n  backend \"gcs\" {}\n}\n")
            .unwrap();

        let err = h.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GtfError>(),
            Some(GtfError::AmbiguousBucket(names)) if names.len() == 2
        ));
        assert!(!h.command.lines().iter().any(|l| l.starts_with("terraform")));
    }

    #[test]
    fn test_no_matching_bucket_fails() {
        let h = Harness::new(
            &[],
            MockCommandExecutor::with_outputs(vec![
                MockCommandResult::new("gsutil", &["ls"], 0).stdout("gs://acme-dev-assets/\n"),
            ]),
        );
        h.fs.write(&Path::new(DIR).join(BACKEND_FILE), "terraform {\n  backend \"gcs\" {}\n}\n")
            .unwrap();

        let err = h.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GtfError>(),
            Some(GtfError::BucketNotFound { .. })
        ));
    }

    #[test]
    fn test_failed_migration_leaves_checkpoint_and_resumes() {
        let h = Harness::new(
            &["y"],
            MockCommandExecutor::with_outputs(vec![
                MockCommandResult::new("gsutil", &["ls", "-p"], 0).stdout(BUCKETS),
                MockCommandResult::new("terraform", &["init", "-input=false", "-migrate-state"], 1)
                    .stderr("Error acquiring the state lock"),
            ]),
        );
        h.write_bootstrap_files();

        assert!(h.run().is_err());
        assert!(h.fs.has_file(&Path::new(DIR).join(CHECKPOINT_FILE)));
        assert!(h.fs.has_file(&Path::new(DIR).join(BACKEND_FILE)));

        let applies_before = h
            .command
            .lines()
            .iter()
            .filter(|l| l.starts_with("terraform apply"))
            .count();

        // Second run resumes at the migration without asking or re-applying
        h.run().unwrap();
        let lines = h.command.lines();
        assert_eq!(
            lines.iter().filter(|l| l.starts_with("terraform apply")).count(),
            applies_before
        );
        assert_eq!(
            lines.last().unwrap(),
            "terraform init -input=false -migrate-state -force-copy -backend-config=bucket=acme-dev-terraform-remote-backend"
        );
        assert!(!h.fs.has_file(&Path::new(DIR).join(CHECKPOINT_FILE)));
        assert!(h.output.has_warning());
    }

    #[test]
    fn test_existing_backend_without_block_left_untouched() {
        let h = Harness::with_buckets(&[]);
        let path = Path::new(DIR).join(BACKEND_FILE);
        h.fs.write(&path, "# placeholder\n").unwrap();
        BootstrapCheckpoint::applied(&h.target())
            .save(&*h.fs, Path::new(DIR))
            .unwrap();

        h.run().unwrap();

        assert_eq!(h.fs.get_file_contents(&path).unwrap(), "# placeholder\n");
        assert!(h.output.get_warnings().iter().any(|w| w.contains("leaving it unmodified")));
    }

    #[test]
    fn test_bootstrap_state_copied_back_before_migration() {
        let fs_probe: Arc<std::sync::Mutex<Option<Arc<MockFileSystem>>>> =
            Arc::new(std::sync::Mutex::new(None));
        let probe = fs_probe.clone();
        let command = MockCommandExecutor::with_handler(move |call| {
            if call.line() == "terraform apply -auto-approve -input=false" {
                if let Some(fs) = probe.lock().unwrap().as_ref() {
                    fs.write(&call.working_dir.join(LOCAL_STATE_FILE), "{\"version\": 4}")
                        .unwrap();
                }
            }
            if call.line().starts_with("gsutil ls -p") {
                return Some(MockCommandResult::new("gsutil", &[], 0).stdout(BUCKETS));
            }
            None
        });
        let h = Harness::new(&["y"], command);
        *fs_probe.lock().unwrap() = Some(h.fs.clone());
        h.write_bootstrap_files();

        h.run().unwrap();

        assert_eq!(
            h.fs
                .get_file_contents(&Path::new(DIR).join(LOCAL_STATE_FILE))
                .unwrap(),
            "{\"version\": 4}"
        );
    }

    #[test]
    fn test_existing_local_state_blocks_bootstrap() {
        let h = Harness::with_buckets(&["y"]);
        h.write_bootstrap_files();
        h.fs.write(&Path::new(DIR).join(LOCAL_STATE_FILE), "{}").unwrap();

        assert!(h.run().is_err());
        assert!(h.scratch_dirs().is_empty());
    }

    #[test]
    fn test_override_bucket_skips_discovery() {
        let h = Harness::new(&[], MockCommandExecutor::new());
        h.fs.write(&Path::new(DIR).join(BACKEND_FILE), "terraform {\n  backend \"gcs\" {}\n}\n")
            .unwrap();

        let executor = TerraformExecutor::new(h.command.clone());
        let cloud = GcloudClient::new(h.command.clone(), "/repo");
        let target = Target {
            bucket_override: Some("explicit-bucket".to_string()),
            ..h.target()
        };
        let backend = RemoteStateLinker::new(&h.ctx, &h.settings, &executor, &cloud)
            .ensure_linked(&target)
            .unwrap();

        assert_eq!(backend.bucket, "explicit-bucket");
        assert!(!h.command.lines().iter().any(|l| l.starts_with("gsutil")));
    }

    #[test]
    fn test_override_wins_over_reference_without_rewriting_it() {
        let h = Harness::new(&[], MockCommandExecutor::new());
        h.fs.write(&Path::new(DIR).join(BACKEND_FILE), "terraform {\n  backend \"gcs\" {}\n}\n")
            .unwrap();
        StateReference::new("old", "acme-dev")
            .save(&*h.fs, Path::new(DIR))
            .unwrap();

        let executor = TerraformExecutor::new(h.command.clone());
        let cloud = GcloudClient::new(h.command.clone(), "/repo");
        let target = Target {
            bucket_override: Some("explicit-bucket".to_string()),
            ..h.target()
        };
        let backend = RemoteStateLinker::new(&h.ctx, &h.settings, &executor, &cloud)
            .ensure_linked(&target)
            .unwrap();

        assert_eq!(backend.bucket, "explicit-bucket");
        assert!(!h.command.lines().iter().any(|l| l.starts_with("gsutil")));
        let stored = StateReference::load(&*h.fs, Path::new(DIR)).unwrap().unwrap();
        assert_eq!(stored.bucket, "old");
    }

    #[test]
    fn test_reference_for_other_project_is_rediscovered() {
        let h = Harness::with_buckets(&[]);
        h.fs.write(&Path::new(DIR).join(BACKEND_FILE), "terraform {\n  backend \"gcs\" {}\n}\n")
            .unwrap();
        StateReference::new("old", "other-project")
            .save(&*h.fs, Path::new(DIR))
            .unwrap();

        let backend = h.run().unwrap();

        assert_eq!(backend.bucket, "acme-dev-terraform-remote-backend");
        assert!(h.command.lines().iter().any(|l| l == "gsutil ls -p acme-dev"));
        assert!(h
            .output
            .get_warnings()
            .iter()
            .any(|w| w.contains("other-project")));

        let stored = StateReference::load(&*h.fs, Path::new(DIR)).unwrap().unwrap();
        assert_eq!(stored.bucket, "acme-dev-terraform-remote-backend");
        assert_eq!(stored.project_id, "acme-dev");
    }
}
