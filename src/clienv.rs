use std::path::PathBuf;

/// Environment variables read by palbot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVar {
    PalbotConfig,
    PalbotSocket,
    PalbotLog,
    AllowedUsers,
    AllowedRoles,
    RelayToken,
    ReportWebhookUrl,
    User,
}

impl EnvVar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PalbotConfig => "PALBOT_CONFIG",
            Self::PalbotSocket => "PALBOT_SOCKET",
            Self::PalbotLog => "PALBOT_LOG",
            Self::AllowedUsers => "ALLOWED_USERS",
            Self::AllowedRoles => "ALLOWED_ROLES",
            Self::RelayToken => "RELAY_TOKEN",
            Self::ReportWebhookUrl => "REPORT_WEBHOOK_URL",
            Self::User => "USER",
        }
    }
}

const FALLBACK_CONFIG_DIR: &str = "~/.config";
const FALLBACK_DATA_DIR: &str = "~/.local/share";
const PALBOT_SUBDIR: &str = "palbot";

/// Non-empty value of an environment variable.
pub fn env_opt(var: EnvVar) -> Option<String> {
    std::env::var(var.as_str())
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Comma-separated list from an environment variable; `None` when unset.
pub fn env_list(var: EnvVar) -> Option<Vec<String>> {
    env_opt(var).map(|raw| split_list(&raw))
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// palbot config directory (~/.config/palbot)
pub fn config_dir() -> PathBuf {
    let dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(FALLBACK_CONFIG_DIR))
        .join(PALBOT_SUBDIR);
    tracing::trace!(dir = %dir.display(), "Resolved config directory");
    dir
}

/// palbot data directory (~/.local/share/palbot)
pub fn data_dir() -> PathBuf {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
        .join(PALBOT_SUBDIR);
    tracing::trace!(dir = %dir.display(), "Resolved data directory");
    dir
}

/// Config file path ($PALBOT_CONFIG or ~/.config/palbot/config.toml)
pub fn config_path() -> PathBuf {
    let path = env_opt(EnvVar::PalbotConfig)
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir().join("config.toml"));
    tracing::trace!(path = %path.display(), "Config path");
    path
}

/// Dotenv file next to the config (~/.config/palbot/.env)
pub fn dotenv_path() -> PathBuf {
    config_dir().join(".env")
}

/// Default daemon socket path (~/.local/share/palbot/palbot.sock)
pub fn default_socket_path() -> PathBuf {
    data_dir().join("palbot.sock")
}

/// Default daemon log path (~/.local/share/palbot/logs/palbot.log)
pub fn default_log_path() -> PathBuf {
    data_dir().join("logs").join("palbot.log")
}

/// Default lifecycle lock path (~/.local/share/palbot/lifecycle.lock)
pub fn default_lock_path() -> PathBuf {
    data_dir().join("lifecycle.lock")
}

/// Calling user for locally issued commands ($USER)
pub fn current_user() -> String {
    let user = env_opt(EnvVar::User).unwrap_or_else(|| "unknown".to_string());
    tracing::trace!(user = %user, "Current user");
    user
}

/// Trusted relay token ($RELAY_TOKEN)
pub fn relay_token() -> Option<String> {
    let token = env_opt(EnvVar::RelayToken);
    tracing::trace!(present = token.is_some(), "RELAY_TOKEN env var");
    token
}
