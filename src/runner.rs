use anyhow::{Context, Result};
use declarative::{CommandOutput, CommandRunner, CommandSpec};
use std::process::Command;

/// Runs commands as child processes and waits for them to exit
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).envs(&spec.env);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute: {spec}"))?;
        log::debug!("`{spec}` exited with {}", output.status);
        Ok(output.into())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_passes_env_and_cwd() {
        let dir = TempDir::new().unwrap();
        let env = BTreeMap::from([("DJANGO_SETTINGS_MODULE".into(), "mysite.settings".into())]);
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s %s' \"$DJANGO_SETTINGS_MODULE\" \"$(pwd -P)\""])
            .envs(&env)
            .current_dir(dir.path());

        let output = SystemRunner.run(&spec).unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert!(output.success);
        assert_eq!(
            output.stdout_str(),
            format!("mysite.settings {}", canonical.display())
        );
    }

    #[test]
    fn test_nonzero_exit_is_checked() {
        let spec = CommandSpec::new("sh").args(["-c", "echo nope >&2; exit 3"]);
        let err = SystemRunner.run_checked(&spec).unwrap_err();
        assert!(err.to_string().contains("status 3"));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let spec = CommandSpec::new("djdeploy-no-such-program");
        assert!(SystemRunner.run(&spec).is_err());
    }
}
