use async_trait::async_trait;

use crate::executor::{CommandExecutor, CommandResult};

/// Character budget for any output shown to a chat client.
pub const DISPLAY_BUDGET: usize = 2000;
pub const TRUNCATION_MARKER: &str = "...";

/// Host service manager controlling the game server unit.
#[async_trait]
pub trait ProcessController: Send + Sync {
    async fn start(&self) -> CommandResult;
    async fn stop(&self) -> CommandResult;
    async fn restart(&self) -> CommandResult;
    async fn status(&self) -> CommandResult;

    /// Heading shown above status output.
    fn status_heading(&self) -> String;
}

pub struct SystemdController {
    executor: CommandExecutor,
    service_name: String,
}

impl SystemdController {
    pub fn new(service_name: impl Into<String>, use_sudo: bool) -> Self {
        Self {
            executor: if use_sudo {
                CommandExecutor::privileged()
            } else {
                CommandExecutor::new()
            },
            service_name: service_name.into(),
        }
    }

    async fn systemctl(&self, verb: &str) -> CommandResult {
        tracing::info!(service = %self.service_name, "systemctl {}", verb);
        self.executor
            .run("systemctl", &[verb.to_string(), self.service_name.clone()])
            .await
    }
}

#[async_trait]
impl ProcessController for SystemdController {
    async fn start(&self) -> CommandResult {
        self.systemctl("start").await
    }

    async fn stop(&self) -> CommandResult {
        self.systemctl("stop").await
    }

    async fn restart(&self) -> CommandResult {
        self.systemctl("restart").await
    }

    async fn status(&self) -> CommandResult {
        self.systemctl("status").await
    }

    fn status_heading(&self) -> String {
        format!("# systemctl status {}", self.service_name)
    }
}

/// Fit `text` into `budget` characters. Over-budget text keeps only whole
/// lines whose total (newlines included) stays within the budget, then the
/// truncation marker.
pub fn truncate_output(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for line in text.split('\n') {
        let cost = line.chars().count() + 1;
        if used + cost > budget {
            break;
        }
        out.push_str(line);
        out.push('\n');
        used += cost;
    }
    out.push_str(TRUNCATION_MARKER);
    out
}
