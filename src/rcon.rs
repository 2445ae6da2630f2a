use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::RconConfig;
use crate::executor::{CommandExecutor, CommandResult};

/// Out-of-band command interface to the running game server.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    async fn execute(&self, command: &str, argument: Option<&str>) -> CommandResult;
}

/// Space-joined command line as the server expects it.
pub fn command_line(command: &str, argument: Option<&str>) -> String {
    match argument {
        Some(arg) if !arg.is_empty() => format!("{} {}", command, arg),
        _ => command.to_string(),
    }
}

/// Drives the `rcon` executable with a fixed config file and profile.
pub struct RconClient {
    executor: CommandExecutor,
    program: String,
    config_path: PathBuf,
    profile: String,
}

impl RconClient {
    pub fn new(program: impl Into<String>, config_path: PathBuf, profile: impl Into<String>) -> Self {
        Self {
            executor: CommandExecutor::new(),
            program: program.into(),
            config_path,
            profile: profile.into(),
        }
    }

    pub fn from_config(config: &RconConfig) -> Self {
        Self::new(
            config.path.display().to_string(),
            config.config_path.clone(),
            config.profile.clone(),
        )
    }

    fn args(&self, line: String) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.config_path.display().to_string(),
            "-e".to_string(),
            self.profile.clone(),
            line,
        ]
    }
}

#[async_trait]
impl RemoteControl for RconClient {
    async fn execute(&self, command: &str, argument: Option<&str>) -> CommandResult {
        let line = command_line(command, argument);
        tracing::debug!(command = %line, profile = %self.profile, "rcon");
        self.executor.run(&self.program, &self.args(line)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_with_single_space() {
        assert_eq!(command_line("Info", None), "Info");
        assert_eq!(command_line("KickPlayer", Some("7656")), "KickPlayer 7656");
        assert_eq!(command_line("Save", Some("")), "Save");
    }

    #[test]
    fn args_carry_config_and_profile() {
        let client = RconClient::new("rcon", PathBuf::from("/etc/rcon.yaml"), "palworld");
        assert_eq!(
            client.args("ShowPlayers".into()),
            vec!["-c", "/etc/rcon.yaml", "-e", "palworld", "ShowPlayers"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        // `false` ignores its arguments and exits 1.
        let client = RconClient::new("false", PathBuf::from("/dev/null"), "p");
        let result = client.execute("Info", None).await;
        assert!(!result.success);
    }
}
