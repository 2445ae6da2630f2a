use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::clienv::{self, EnvVar};

const DEFAULT_INSTALL_DIR: &str = "/home/steam/dedicated-server/palworld";
const DEFAULT_BACKUP_DIR: &str = "/home/steam/backup/palworld";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub server: ServerConfig,
    pub rcon: RconConfig,
    pub backup: BackupConfig,
    pub access: AccessConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// systemd unit controlling the game server
    pub service_name: String,
    pub install_dir: PathBuf,
    /// Directory archived by every backup
    pub save_dir: PathBuf,
    pub banlist_path: PathBuf,
    /// Live settings file
    pub settings_path: PathBuf,
    /// Settings file shipped with the server, used as the diff baseline
    pub default_settings_path: PathBuf,
    /// Run systemctl through `sudo -n`
    pub use_sudo: bool,
    pub steamcmd_path: String,
    pub app_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let install_dir = PathBuf::from(DEFAULT_INSTALL_DIR);
        let saved = install_dir.join("Pal").join("Saved");
        Self {
            service_name: "palworld".to_string(),
            save_dir: saved.clone(),
            banlist_path: saved.join("SaveGames").join("banlist.txt"),
            settings_path: saved
                .join("Config")
                .join("LinuxServer")
                .join("PalWorldSettings.ini"),
            default_settings_path: install_dir.join("DefaultPalWorldSettings.ini"),
            install_dir,
            use_sudo: false,
            steamcmd_path: "steamcmd".to_string(),
            app_id: "2394010".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RconConfig {
    /// rcon executable
    pub path: PathBuf,
    pub config_path: PathBuf,
    pub profile: String,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/usr/local/bin/rcon"),
            config_path: clienv::config_dir().join("rcon.yaml"),
            profile: "palworld".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub dir: PathBuf,
    pub base_name: String,
    /// Retention count; older archives beyond this are pruned
    pub max_backups: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            base_name: "backup-palworld".to_string(),
            max_backups: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    pub allowed_users: Vec<String>,
    pub allowed_roles: Vec<String>,
    pub relay_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    /// Lifecycle lock shared by the daemon and `exec`; every palbot process
    /// managing the same server must agree on it
    pub lock_path: Option<PathBuf>,
    /// Mirror every report to this chat webhook
    pub report_webhook_url: Option<String>,
    /// Wait after starting the service before querying it again during update
    pub update_grace_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            log_path: None,
            lock_path: None,
            report_webhook_url: None,
            update_grace_secs: 10,
        }
    }
}

impl AdminConfig {
    /// Load from `path`, falling back to defaults when the file does not exist,
    /// then apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::trace!(path = %path.display(), "Loading admin config");

        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "Config file does not exist, using defaults");
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    /// Environment values win over the file.
    pub fn apply_env(&mut self) {
        if let Some(users) = clienv::env_list(EnvVar::AllowedUsers) {
            self.access.allowed_users = users;
        }
        if let Some(roles) = clienv::env_list(EnvVar::AllowedRoles) {
            self.access.allowed_roles = roles;
        }
        if let Some(token) = clienv::env_opt(EnvVar::RelayToken) {
            self.access.relay_token = Some(token);
        }
        if let Some(url) = clienv::env_opt(EnvVar::ReportWebhookUrl) {
            self.daemon.report_webhook_url = Some(url);
        }
        if let Some(socket) = clienv::env_opt(EnvVar::PalbotSocket) {
            self.daemon.socket_path = Some(PathBuf::from(socket));
        }
        if let Some(log) = clienv::env_opt(EnvVar::PalbotLog) {
            self.daemon.log_path = Some(PathBuf::from(log));
        }
        tracing::trace!(
            users = self.access.allowed_users.len(),
            roles = self.access.allowed_roles.len(),
            relay = self.access.relay_token.is_some(),
            "Environment overrides applied"
        );
    }

    pub fn validate(&self) -> Result<()> {
        if self.backup.max_backups == 0 {
            anyhow::bail!("backup.max_backups must be at least 1");
        }
        if self.server.service_name.trim().is_empty() {
            anyhow::bail!("server.service_name must not be empty");
        }
        if self.rcon.profile.trim().is_empty() {
            anyhow::bail!("rcon.profile must not be empty");
        }
        Ok(())
    }

    pub fn socket_path(&self) -> PathBuf {
        self.daemon
            .socket_path
            .clone()
            .unwrap_or_else(clienv::default_socket_path)
    }

    pub fn log_path(&self) -> PathBuf {
        self.daemon
            .log_path
            .clone()
            .unwrap_or_else(clienv::default_log_path)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.daemon
            .lock_path
            .clone()
            .unwrap_or_else(clienv::default_lock_path)
    }
}
