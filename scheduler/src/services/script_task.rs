//! External command job

use std::process::Stdio;

use tokio::process::Command;

use crate::error::{SchedulerError, SchedulerResult};
use crate::job::JobTask;

/// Runs an external program per fire and waits for it to exit
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTask {
    program: String,
    args: Vec<String>,
}

impl ScriptTask {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line; `None` when it is blank
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait::async_trait]
impl JobTask for ScriptTask {
    fn describe(&self) -> String {
        format!("script '{}'", self.command_line())
    }

    async fn run(&self) -> SchedulerResult<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SchedulerError::ScriptSpawn {
                command: self.command_line(),
                source,
            })?;

        if !output.status.success() {
            return Err(SchedulerError::ScriptFailed {
                command: self.command_line(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
