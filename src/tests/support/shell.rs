// Recording script runner.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::powershell::{ScriptRunner, ShellError};

/// One recorded script run.
#[derive(Debug, Clone)]
pub struct Run {
    pub script: String,
    pub env: Vec<(String, String)>,
}

impl Run {
    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// FakeShell records every script and answers with a fixed output.
#[derive(Default)]
pub struct FakeShell {
    output: String,
    failure: Option<String>,
    runs: Mutex<Vec<Run>>,
}

impl FakeShell {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            failure: Some(stderr.to_string()),
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<Run> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl ScriptRunner for FakeShell {
    async fn run(&self, script: &str, env: &[(&str, &str)]) -> Result<String, ShellError> {
        self.runs.lock().push(Run {
            script: script.to_string(),
            env: env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        });
        match &self.failure {
            Some(stderr) => Err(ShellError::Failed {
                status: "exit code: 1".to_string(),
                stdout: String::new(),
                stderr: stderr.clone(),
            }),
            None => Ok(self.output.clone()),
        }
    }
}
