use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("access denied for caller '{caller}'")]
    AccessDenied { caller: String },

    #[error("control command '{command}' failed: {stderr}")]
    ControlChannel { command: String, stderr: String },

    #[error("service manager call '{action}' failed: {stderr}")]
    ProcessControl { action: String, stderr: String },

    #[error("malformed settings file {}: {reason}", path.display())]
    ConfigFormat { path: PathBuf, reason: String },

    #[error("backup archive {}: {reason}", path.display())]
    BackupIo { path: PathBuf, reason: String },

    #[error("{what} not found at {}", path.display())]
    ResourceNotFound { what: &'static str, path: PathBuf },

    #[error("another lifecycle procedure ({running}) is already in progress")]
    Busy { running: String },

    #[error("invalid arguments for '{command}': expected {expected}")]
    InvalidArguments { command: String, expected: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AdminError {
    /// Stable identifier for structured logs.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "access-denied",
            Self::ControlChannel { .. } => "control-channel",
            Self::ProcessControl { .. } => "process-control",
            Self::ConfigFormat { .. } => "config-format",
            Self::BackupIo { .. } => "backup-io",
            Self::ResourceNotFound { .. } => "resource-not-found",
            Self::Busy { .. } => "busy",
            Self::InvalidArguments { .. } => "invalid-arguments",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Join(_) => "join",
        }
    }

    /// Whether the handler boundary renders this error as a report instead of
    /// propagating it.
    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Join(_))
    }
}

pub type Result<T> = std::result::Result<T, AdminError>;
