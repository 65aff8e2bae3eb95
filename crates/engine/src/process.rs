//! Subprocess execution for the `sys` host primitive.
//!
//! Commands run synchronously with stdout and stderr captured. A non-zero
//! exit is not an error at this layer; the recipe receives the exit code and
//! decides for itself.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

/// Captured result of one spawned command.
#[derive(Debug, Clone)]
pub struct SysOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Spawn `argv` with `cwd` as working directory, wait for it, and capture
/// its output. `env` entries are overlaid on the inherited environment.
pub fn run_command(
    argv: &[String],
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> io::Result<SysOutcome> {
    info!(program = %argv[0], cwd = %cwd.display(), "spawning command");

    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in env {
        command.env(key, value);
    }

    let output = command.output()?;
    let exit_code = output.status.code().unwrap_or(-1);

    debug!(program = %argv[0], exit_code, "command finished");

    Ok(SysOutcome {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn captures_stdout_and_exit_code() -> io::Result<()> {
        let temp = TempDir::new()?;
        let outcome = run_command(&sh("printf hello"), temp.path(), &BTreeMap::new())?;
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout, "hello");
        assert!(outcome.stderr.is_empty());
        Ok(())
    }

    #[test]
    fn captures_stderr_and_nonzero_exit() -> io::Result<()> {
        let temp = TempDir::new()?;
        let outcome = run_command(&sh("printf oops >&2; exit 3"), temp.path(), &BTreeMap::new())?;
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.stderr, "oops");
        Ok(())
    }

    #[test]
    fn runs_in_the_given_cwd() -> io::Result<()> {
        let temp = TempDir::new()?;
        run_command(&sh("touch marker"), temp.path(), &BTreeMap::new())?;
        assert!(temp.path().join("marker").exists());
        Ok(())
    }

    #[test]
    fn env_entries_are_visible() -> io::Result<()> {
        let temp = TempDir::new()?;
        let mut env = BTreeMap::new();
        env.insert("REBUILD_TEST_VAR".to_string(), "42".to_string());
        let outcome = run_command(&sh("printf \"$REBUILD_TEST_VAR\""), temp.path(), &env)?;
        assert_eq!(outcome.stdout, "42");
        Ok(())
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        let argv = vec!["/definitely/not/a/program".to_string()];
        assert!(run_command(&argv, temp.path(), &BTreeMap::new()).is_err());
    }
}
