use crate::archive::BuildRef;
use crate::cloud::{BuildSubmission, GCLOUD, GSUTIL, GcloudClient};
use crate::config::{CONFIG_FILE, Settings, Target};
use crate::context::Context;
use crate::environment::{Action, Environment};
use crate::error::GtfError;
use crate::executor::TerraformExecutor;
use crate::project::ProjectResolver;
use crate::runner::TerraformRunner;
use crate::state::RemoteStateLinker;
use crate::validation::validate_pattern;
use anyhow::{Context as AnyhowContext, Result};
use regex::Regex;
use std::path::PathBuf;

const REQUIRED_COMMANDS: [&str; 3] = [GCLOUD, GSUTIL, TerraformExecutor::BINARY];
const BUCKET_NAME_FORMAT: &str = "a GCS bucket name (lowercase letters, digits, '-', '_' and '.')";

/// Raw, unvalidated invocation as parsed from the command line
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
    pub environment: String,
    pub action: String,
    pub build_id: Option<String>,
    pub state_bucket: Option<String>,
    pub cloud_build: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Request {
    Plan,
    Apply(BuildRef),
}

impl Request {
    fn action(&self) -> Action {
        match self {
            Request::Plan => Action::Plan,
            Request::Apply(_) => Action::Apply,
        }
    }
}

/// Handles `gtf <environment> <action> [build_id]`
pub struct RunCommand;

impl RunCommand {
    pub fn execute(ctx: &Context, args: &RunArgs) -> Result<()> {
        let (environment, request) = Self::validate(ctx, args)?;
        Self::check_dependencies(ctx)?;

        let config_path = args
            .config
            .clone()
            .unwrap_or_else(|| args.root.join(CONFIG_FILE));
        let settings = Settings::load(&*ctx.fs, &config_path)?;

        let working_dir = settings.working_dir(&args.root, environment);
        if !ctx.fs.exists(&working_dir) {
            anyhow::bail!(
                "Working directory {} for {} does not exist",
                working_dir.display(),
                environment
            );
        }

        let project_id = ProjectResolver::resolve_project_id(&*ctx.fs, &working_dir)?;
        let target = Target {
            environment,
            project_id,
            working_dir,
            bucket_override: args.state_bucket.clone(),
        };

        ctx.output.section(&format!("gtf {} {}", environment, request.action()));
        ctx.output.key_value("Project", &target.project_id);
        ctx.output
            .key_value("Working directory", &target.working_dir.display().to_string());

        let cloud = GcloudClient::new(ctx.command.clone(), &target.working_dir);
        Self::authenticate(ctx, &cloud)?;
        cloud
            .set_project(&target.project_id)
            .context("Failed to select the gcloud project")?;

        if args.cloud_build {
            return Self::submit_to_cloud_build(ctx, &settings, &cloud, &target, &request);
        }

        let executor = TerraformExecutor::new(ctx.command.clone());
        RemoteStateLinker::new(ctx, &settings, &executor, &cloud).ensure_linked(&target)?;

        let runner = TerraformRunner::new(ctx, &settings, &executor, &cloud);
        match &request {
            Request::Plan => {
                let flags = ProjectResolver::var_file_flags(&*ctx.fs, &target.working_dir)?;
                runner.plan(&target, &flags)?;
            }
            Request::Apply(build) => runner.apply(&target, build)?,
        }

        Ok(())
    }

    /// Everything checkable without touching the outside world
    fn validate(ctx: &Context, args: &RunArgs) -> Result<(Environment, Request), GtfError> {
        let environment: Environment = args.environment.parse()?;
        let action: Action = args.action.parse()?;

        if let Some(bucket) = &args.state_bucket {
            let pattern = Regex::new(r"^[a-z0-9][a-z0-9._-]{1,220}[a-z0-9]$")
                .map_err(|e| GtfError::Usage(e.to_string()))?;
            validate_pattern("state bucket", bucket, &pattern, BUCKET_NAME_FORMAT)?;
        }

        let request = match action {
            Action::Plan => {
                if let Some(id) = &args.build_id {
                    ctx.output
                        .warning(&format!("Ignoring build id {} for plan", id));
                }
                Request::Plan
            }
            Action::Apply => {
                let id = args.build_id.as_deref().ok_or_else(|| {
                    GtfError::Usage(format!(
                        "apply requires the build id printed by plan: gtf {} apply <build_id>",
                        environment
                    ))
                })?;
                Request::Apply(BuildRef::parse(id)?)
            }
        };

        Ok((environment, request))
    }

    fn check_dependencies(ctx: &Context) -> Result<(), GtfError> {
        for command in REQUIRED_COMMANDS {
            if !ctx.command.is_available(command) {
                return Err(GtfError::MissingDependency(command.to_string()));
            }
        }
        Ok(())
    }

    fn authenticate(ctx: &Context, cloud: &GcloudClient) -> Result<()> {
        match cloud.active_account()? {
            Some(account) => ctx.output.key_value("Account", &account),
            None => {
                ctx.output.warning("No active gcloud account, starting login");
                cloud.login()?;
            }
        }

        if !cloud.has_application_default_credentials()? {
            ctx.output
                .warning("No application default credentials, starting login");
            cloud.application_default_login()?;
        }

        Ok(())
    }

    fn submit_to_cloud_build(
        ctx: &Context,
        settings: &Settings,
        cloud: &GcloudClient,
        target: &Target,
        request: &Request,
    ) -> Result<()> {
        let config = target.working_dir.join(&settings.cloud_build_config);
        if !ctx.fs.is_file(&config) {
            return Err(GtfError::MissingFiles {
                dir: target.working_dir.clone(),
                files: vec![settings.cloud_build_config.clone()],
            }
            .into());
        }

        let mut substitutions = vec![
            ("_ENVIRONMENT".to_string(), target.environment.to_string()),
            ("_ACTION".to_string(), request.action().to_string()),
        ];
        if let Request::Apply(build) = request {
            substitutions.push(("_BUILD_ID".to_string(), build.to_string()));
        }

        ctx.output.info("Submitting to Cloud Build");
        cloud.submit_build(&BuildSubmission {
            project_id: &target.project_id,
            config: &config,
            source_dir: &target.working_dir,
            substitutions,
        })?;
        ctx.output.success("Cloud Build finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::exit_code_for;
    use crate::executor::backend::BACKEND_FILE;
    use crate::traits::{
        FileSystem, MockCommandExecutor, MockCommandResult, MockFileSystem, MockOutput,
        MockUserInput,
    };
    use std::path::Path;
    use std::sync::Arc;

    struct Harness {
        fs: Arc<MockFileSystem>,
        command: Arc<MockCommandExecutor>,
        ctx: Context,
    }

    impl Harness {
        fn new() -> Self {
            let fs = Arc::new(MockFileSystem::new());
            let command = Arc::new(MockCommandExecutor::with_outputs(vec![
                MockCommandResult::new("gcloud", &["auth", "list"], 0).stdout("ops@acme.io\n"),
            ]));
            let ctx = Context::test_with(
                fs.clone(),
                Arc::new(MockUserInput::new()),
                Arc::new(MockOutput::new()),
                command.clone(),
            );
            fs.write(
                Path::new("/repo/dev/dev.tfvars"),
                "project_id = \"acme-dev\"\n",
            )
            .unwrap();
            Self { fs, command, ctx }
        }

        fn linked(self) -> Self {
            self.fs
                .write(
                    Path::new("/repo/dev").join(BACKEND_FILE).as_path(),
                    "terraform {\n  backend \"gcs\" {}\n}\n",
                )
                .unwrap();
            self
        }

        fn run(&self, environment: &str, action: &str, build_id: Option<&str>) -> Result<()> {
            RunCommand::execute(
                &self.ctx,
                &RunArgs {
                    root: PathBuf::from("/repo"),
                    environment: environment.to_string(),
                    action: action.to_string(),
                    build_id: build_id.map(str::to_string),
                    state_bucket: Some("acme-dev-terraform-remote-backend".to_string()),
                    ..RunArgs::default()
                },
            )
        }
    }

    #[test]
    fn test_invalid_environment_rejected_before_any_command() {
        let h = Harness::new();
        let err = h.run("qa", "plan", None).unwrap_err();

        assert!(err.to_string().contains("sandbox, dev, staging, prod"));
        assert_eq!(exit_code_for(&err), 1);
        assert!(h.command.invocations().is_empty());
    }

    #[test]
    fn test_invalid_action_rejected() {
        let h = Harness::new();
        let err = h.run("dev", "destroy", None).unwrap_err();
        assert!(err.to_string().contains("plan, apply"));
        assert!(h.command.invocations().is_empty());
    }

    #[test]
    fn test_apply_without_build_id_is_usage_error() {
        let h = Harness::new();
        let err = h.run("dev", "apply", None).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<GtfError>(),
            Some(GtfError::Usage(_))
        ));
        assert_eq!(exit_code_for(&err), 1);
        assert!(h.command.invocations().is_empty());
    }

    #[test]
    fn test_malformed_build_id_rejected() {
        let h = Harness::new();
        assert!(h.run("dev", "apply", Some("../../etc")).is_err());
        assert!(h.command.invocations().is_empty());
    }

    #[test]
    fn test_missing_tool_exits_with_two() {
        let h = Harness::new();
        h.command.set_missing("gsutil");

        let err = h.run("dev", "plan", None).unwrap_err();
        assert_eq!(exit_code_for(&err), 2);
        assert!(h.command.invocations().is_empty());
    }

    #[test]
    fn test_validation_precedes_dependency_check() {
        let h = Harness::new();
        h.command.set_missing("terraform");

        let err = h.run("qa", "plan", None).unwrap_err();
        assert_eq!(exit_code_for(&err), 1);
    }

    #[test]
    fn test_missing_project_id_fails_before_cloud_calls() {
        let h = Harness::new();
        h.fs.write(Path::new("/repo/dev/dev.tfvars"), "region = \"x\"\n")
            .unwrap();

        let err = h.run("dev", "plan", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GtfError>(),
            Some(GtfError::ProjectNotFound(_))
        ));
        assert!(h.command.invocations().is_empty());
    }

    #[test]
    fn test_plan_authenticates_links_then_plans() {
        let h = Harness::new().linked();
        h.command.add_output(
            MockCommandResult::new("gcloud", &["auth", "application-default"], 1),
        );
        h.fs.write_bytes(Path::new("/repo/dev/tfplan"), b"plan").unwrap();

        h.run("dev", "plan", None).unwrap();

        let lines = h.command.lines();
        assert_eq!(
            &lines[..5],
            &[
                "gcloud auth list --filter=status:ACTIVE --format=value(account)",
                "gcloud auth application-default print-access-token",
                "gcloud auth application-default login",
                "gcloud config set project acme-dev",
                "terraform init -input=false -backend-config=bucket=acme-dev-terraform-remote-backend",
            ]
        );
        assert_eq!(
            lines[5],
            "terraform plan -input=false -out=tfplan -var-file=dev.tfvars"
        );
        assert!(lines.iter().any(|l| l.starts_with("gsutil cp")));
    }

    #[test]
    fn test_login_when_no_active_account() {
        let command = Arc::new(MockCommandExecutor::with_outputs(vec![
            MockCommandResult::new("gcloud", &["auth", "list"], 0).stdout("\n"),
        ]));
        let ctx = Context::test_with(
            Arc::new(MockFileSystem::new()),
            Arc::new(MockUserInput::new()),
            Arc::new(MockOutput::new()),
            command.clone(),
        );
        let cloud = GcloudClient::new(command.clone(), "/repo/dev");

        RunCommand::authenticate(&ctx, &cloud).unwrap();

        assert_eq!(command.lines()[1], "gcloud auth login");
        assert!(command.invocations()[1].interactive);
        assert_eq!(
            command.lines()[2],
            "gcloud auth application-default print-access-token"
        );
    }

    #[test]
    fn test_cloud_build_submits_instead_of_running_terraform() {
        let h = Harness::new();
        h.fs.write(Path::new("/repo/dev/cloudbuild.yaml"), "steps: []\n")
            .unwrap();

        RunCommand::execute(
            &h.ctx,
            &RunArgs {
                root: PathBuf::from("/repo"),
                environment: "dev".to_string(),
                action: "apply".to_string(),
                build_id: Some("2026-10-14__0011223344556677".to_string()),
                cloud_build: true,
                ..RunArgs::default()
            },
        )
        .unwrap();

        let lines = h.command.lines();
        assert_eq!(
            lines.last().unwrap(),
            "gcloud builds submit --project=acme-dev --config=/repo/dev/cloudbuild.yaml --substitutions=_ENVIRONMENT=dev,_ACTION=apply,_BUILD_ID=2026-10-14__0011223344556677 /repo/dev"
        );
        assert!(!lines.iter().any(|l| l.starts_with("terraform")));
    }

    #[test]
    fn test_cloud_build_requires_config_file() {
        let h = Harness::new();
        let err = RunCommand::execute(
            &h.ctx,
            &RunArgs {
                root: PathBuf::from("/repo"),
                environment: "dev".to_string(),
                action: "plan".to_string(),
                cloud_build: true,
                ..RunArgs::default()
            },
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<GtfError>(),
            Some(GtfError::MissingFiles { .. })
        ));
        assert!(!h.command.lines().iter().any(|l| l.contains("builds submit")));
    }

    #[test]
    fn test_invalid_bucket_override_rejected() {
        let h = Harness::new();
        let err = RunCommand::execute(
            &h.ctx,
            &RunArgs {
                root: PathBuf::from("/repo"),
                environment: "dev".to_string(),
                action: "plan".to_string(),
                state_bucket: Some("Not A Bucket".to_string()),
                ..RunArgs::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("state bucket"));
        assert!(h.command.invocations().is_empty());
    }
}
