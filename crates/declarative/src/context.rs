//! Apply context and collaborator traits
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific process runner, UI, or prompt library.

use crate::state::StateRegistry;
use crate::types::{ApplyResult, CommandOutput};
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A command to run: program, arguments, environment and working directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Variables added on top of the inherited environment
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A command ran to completion but exited unsuccessfully
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("`{command}` exited with {}: {stderr}", exit_status(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
}

/// Process execution collaborator
///
/// Implementations block until the process exits.
pub trait CommandRunner {
    /// Run a command to completion and return its output
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput>;

    /// Run a command and fail on a non-zero exit
    fn run_checked(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(cmd)?;
        if !output.success {
            return Err(CommandError::Failed {
                command: cmd.to_string(),
                code: output.code,
                stderr: output.stderr_str().trim().to_string(),
            }
            .into());
        }
        Ok(output)
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called before the first resource is applied
    fn on_run_start(&mut self, count: usize);

    /// Called when starting to apply a single resource
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called when a resource application completes
    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called after the last resource
    fn on_run_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _count: usize) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_run_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to resource apply operations
pub struct ApplyContext<'a> {
    /// Whether this is a dry run (no external side effects)
    pub dry_run: bool,
    /// Runner used for every subprocess
    pub runner: &'a dyn CommandRunner,
    /// Shared state for the current run
    pub state: &'a mut StateRegistry,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(runner: &'a dyn CommandRunner, state: &'a mut StateRegistry) -> Self {
        Self {
            dry_run: false,
            runner,
            state,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ExitWith(i32);

    impl CommandRunner for ExitWith {
        fn run(&self, _cmd: &CommandSpec) -> Result<CommandOutput> {
            Ok(CommandOutput {
                stderr: b"no such table\n".to_vec(),
                success: self.0 == 0,
                code: Some(self.0),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_command_spec_display() {
        let cmd = CommandSpec::new("python")
            .args(["manage.py", "migrate", "--noinput"])
            .current_dir("/srv/app");
        assert_eq!(cmd.to_string(), "python manage.py migrate --noinput");
        assert_eq!(cmd.cwd.as_deref(), Some(Path::new("/srv/app")));
    }

    #[test]
    fn test_run_checked_reports_failure() {
        let cmd = CommandSpec::new("python").arg("manage.py");
        let err = ExitWith(2).run_checked(&cmd).unwrap_err();
        let failure = err.downcast_ref::<CommandError>().unwrap();
        let CommandError::Failed {
            command,
            code,
            stderr,
        } = failure;
        assert_eq!(command, "python manage.py");
        assert_eq!(*code, Some(2));
        assert_eq!(stderr, "no such table");
        assert!(err.to_string().contains("status 2"));
    }

    #[test]
    fn test_run_checked_passes_success() {
        let cmd = CommandSpec::new("true");
        assert!(ExitWith(0).run_checked(&cmd).is_ok());
    }
}
