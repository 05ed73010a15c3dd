// Package powershell runs host scripts on behalf of the management APIs.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_PROGRAM: &str = "powershell.exe";

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("script exited with {status}, stdout: {stdout:?}, stderr: {stderr:?}")]
    Failed {
        status: String,
        stdout: String,
        stderr: String,
    },
}

/// ScriptRunner executes a script with the given extra environment.
///
/// User supplied values must travel through `env`, never through the script text.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Runs the script and returns its standard output.
    async fn run(&self, script: &str, env: &[(&str, &str)]) -> Result<String, ShellError>;
}

/// PowerShell runs scripts through a non-interactive powershell process.
pub struct PowerShell {
    program: String,
}

impl PowerShell {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PowerShell {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

#[async_trait]
impl ScriptRunner for PowerShell {
    async fn run(&self, script: &str, env: &[(&str, &str)]) -> Result<String, ShellError> {
        debug!(
            component = "powershell",
            event = "run",
            program = %self.program,
            env_vars = env.len(),
            "running script"
        );

        let output = Command::new(&self.program)
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ShellError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(ShellError::Failed {
                status: output.status.to_string(),
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(stdout)
    }
}
