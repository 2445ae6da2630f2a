pub mod access;
pub mod backup;
pub mod banlist;
pub mod clienv;
pub mod completions;
pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod lockfile;
pub mod orchestrator;
pub mod rcon;
pub mod reporter;
pub mod service;
pub mod settings;
pub mod updater;

pub use access::{AccessClaim, AccessPolicy, AllowListPolicy};
pub use config::AdminConfig;
pub use dispatcher::{Command, DispatchOutcome, Dispatcher, InboundRequest};
pub use error::{AdminError, Result};
pub use orchestrator::{Orchestrator, OrchestratorSettings, Procedure};
pub use reporter::Reporter;
