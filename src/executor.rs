use crate::error::AdminError;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Outcome of one external command. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn from_output(output: &Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Stdout on success, `ControlChannel` otherwise.
    pub fn control_outcome(&self, command: &str) -> Result<&str, AdminError> {
        if self.success {
            Ok(&self.stdout)
        } else {
            Err(AdminError::ControlChannel {
                command: command.to_string(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// Stdout on success, `ProcessControl` otherwise.
    pub fn service_outcome(&self, action: &str) -> Result<&str, AdminError> {
        if self.success {
            Ok(&self.stdout)
        } else {
            Err(AdminError::ProcessControl {
                action: action.to_string(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external programs and captures their output as text.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    use_sudo: bool,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self { use_sudo: false }
    }

    /// Runs every command through non-interactive `sudo -n`.
    pub fn privileged() -> Self {
        Self { use_sudo: true }
    }

    pub fn is_privileged(&self) -> bool {
        self.use_sudo
    }

    /// One invocation, no retries. A spawn failure becomes a failed result
    /// carrying the OS error on stderr.
    pub async fn run(&self, program: &str, args: &[String]) -> CommandResult {
        let output = if self.use_sudo {
            info!("Running privileged command: {} {:?}", program, args);
            Command::new("sudo")
                .args(["-n", program])
                .args(args)
                .output()
                .await
        } else {
            debug!("Running command: {} {:?}", program, args);
            Command::new(program).args(args).output().await
        };

        match output {
            Ok(output) => {
                debug!(
                    "Command finished with exit code: {:?}",
                    output.status.code()
                );
                CommandResult::from_output(&output)
            }
            Err(e) => {
                warn!("Failed to spawn '{}': {}", program, e);
                CommandResult::failed("", format!("failed to run {}: {}", program, e))
            }
        }
    }
}
