use async_trait::async_trait;
use std::path::PathBuf;

use crate::executor::{CommandExecutor, CommandResult};

/// External package-update tool for the server application.
#[async_trait]
pub trait AppUpdater: Send + Sync {
    async fn update(&self) -> CommandResult;
}

/// Anonymous `steamcmd` install with validation.
pub struct SteamCmdUpdater {
    executor: CommandExecutor,
    program: String,
    install_dir: PathBuf,
    app_id: String,
}

impl SteamCmdUpdater {
    pub fn new(program: impl Into<String>, install_dir: PathBuf, app_id: impl Into<String>) -> Self {
        Self {
            executor: CommandExecutor::new(),
            program: program.into(),
            install_dir,
            app_id: app_id.into(),
        }
    }

    fn args(&self) -> Vec<String> {
        vec![
            "+login".to_string(),
            "anonymous".to_string(),
            "+force_install_dir".to_string(),
            self.install_dir.display().to_string(),
            "+app_update".to_string(),
            self.app_id.clone(),
            "validate".to_string(),
            "+quit".to_string(),
        ]
    }
}

#[async_trait]
impl AppUpdater for SteamCmdUpdater {
    async fn update(&self) -> CommandResult {
        tracing::info!(app_id = %self.app_id, dir = %self.install_dir.display(), "Updating server application");
        self.executor.run(&self.program, &self.args()).await
    }
}
