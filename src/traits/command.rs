use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Trait for executing system commands, allowing for mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments and extra environment variables, capturing output
    fn execute(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        env: &[(&str, &str)],
    ) -> Result<Output>;

    /// Execute a command interactively (inherits stdin/stdout/stderr) and return its exit code
    fn execute_interactive(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        env: &[(&str, &str)],
    ) -> Result<i32>;

    /// Check whether a command can be found on PATH
    fn is_available(&self, command: &str) -> bool;
}

/// Real command executor using std::process::Command
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        env: &[(&str, &str)],
    ) -> Result<Output> {
        tracing::debug!(command, ?args, dir = %working_dir.display(), "running");

        let output = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .envs(env.iter().copied())
            .output()
            .with_context(|| format!("Failed to execute {}", command))?;

        tracing::debug!(command, code = ?output.status.code(), "finished");
        Ok(output)
    }

    fn execute_interactive(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        env: &[(&str, &str)],
    ) -> Result<i32> {
        tracing::debug!(command, ?args, dir = %working_dir.display(), "running interactively");

        let mut child = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .envs(env.iter().copied())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to execute {}", command))?;

        let status = child.wait()?;
        tracing::debug!(command, code = ?status.code(), "finished");
        Ok(status.code().unwrap_or(-1))
    }

    fn is_available(&self, command: &str) -> bool {
        which::which(command).is_ok()
    }
}

/// A single recorded call made against the mock executor
#[cfg(test)]
#[derive(Clone, Debug)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: std::path::PathBuf,
    pub env: Vec<(String, String)>,
    pub interactive: bool,
}

#[cfg(test)]
impl Invocation {
    /// The command line joined by spaces, e.g. "terraform init -input=false"
    pub fn line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
#[derive(Clone, Debug)]
pub struct MockCommandResult {
    pub command: String,
    /// Leading arguments that must match for this result to be used
    pub args_prefix: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
impl MockCommandResult {
    pub fn new(command: &str, args_prefix: &[&str], exit_code: i32) -> Self {
        Self {
            command: command.to_string(),
            args_prefix: args_prefix.iter().map(|a| a.to_string()).collect(),
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    pub fn stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    fn matches(&self, command: &str, args: &[&str]) -> bool {
        self.command == command
            && self.args_prefix.len() <= args.len()
            && self.args_prefix.iter().zip(args).all(|(p, a)| p == a)
    }
}

#[cfg(test)]
type MockHandler = Box<dyn Fn(&Invocation) -> Option<MockCommandResult> + Send + Sync>;

/// Mock command executor for testing
#[cfg(test)]
pub struct MockCommandExecutor {
    /// Pre-configured outputs for commands, consumed on first match
    outputs: std::sync::Mutex<Vec<MockCommandResult>>,
    invocations: std::sync::Mutex<Vec<Invocation>>,
    missing: std::sync::Mutex<Vec<String>>,
    handler: Option<MockHandler>,
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self {
            outputs: std::sync::Mutex::new(Vec::new()),
            invocations: std::sync::Mutex::new(Vec::new()),
            missing: std::sync::Mutex::new(Vec::new()),
            handler: None,
        }
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        let executor = Self::new();
        *executor.outputs.lock().unwrap() = outputs;
        executor
    }

    /// Run `handler` on every call that has no pre-configured output
    pub fn with_handler(
        handler: impl Fn(&Invocation) -> Option<MockCommandResult> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    pub fn add_output(&self, output: MockCommandResult) {
        self.outputs.lock().unwrap().push(output);
    }

    /// Make `is_available` report the command as absent from PATH
    pub fn set_missing(&self, command: &str) {
        self.missing.lock().unwrap().push(command.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// All recorded command lines, in call order
    pub fn lines(&self) -> Vec<String> {
        self.invocations().iter().map(Invocation::line).collect()
    }

    fn record(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        env: &[(&str, &str)],
        interactive: bool,
    ) -> MockCommandResult {
        let invocation = Invocation {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: working_dir.to_path_buf(),
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            interactive,
        };
        self.invocations.lock().unwrap().push(invocation.clone());

        let mut outputs = self.outputs.lock().unwrap();
        if let Some(index) = outputs.iter().position(|r| r.matches(command, args)) {
            return outputs.remove(index);
        }
        drop(outputs);

        if let Some(result) = self.handler.as_ref().and_then(|h| h(&invocation)) {
            return result;
        }

        // Default: successful empty output
        MockCommandResult::new(command, &[], 0)
    }
}

#[cfg(test)]
impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        env: &[(&str, &str)],
    ) -> Result<Output> {
        let result = self.record(command, args, working_dir, env, false);
        Ok(Output {
            status: create_exit_status(result.exit_code),
            stdout: result.stdout.into_bytes(),
            stderr: result.stderr.into_bytes(),
        })
    }

    fn execute_interactive(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        env: &[(&str, &str)],
    ) -> Result<i32> {
        Ok(self.record(command, args, working_dir, env, true).exit_code)
    }

    fn is_available(&self, command: &str) -> bool {
        !self.missing.lock().unwrap().iter().any(|m| m == command)
    }
}

#[cfg(test)]
fn create_exit_status(code: i32) -> std::process::ExitStatus {
    // ExitStatus can't be constructed directly; build one from a raw wait status
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }
}
