//! palbot daemon: long-running process that owns the command dispatcher.
//!
//! Chat-side frontends (the `send` and `hook` subcommands, or a bot that shells
//! out to them) talk to it over a Unix socket using rkyv frames. Lifecycle
//! procedures run inside the daemon, so a dropped client never leaves the
//! server half-restarted.
//!
//! ```text
//! ┌────────────┐   Invoke    ┌──────────────────────────────┐
//! │ palbot send│ ──────────▶ │ DaemonServer                 │
//! │ palbot hook│ ◀────────── │   Dispatcher ─▶ Orchestrator │
//! └────────────┘  Message*   │   (rcon, systemd, backups)   │
//!                 + terminal └──────────────────────────────┘
//! ```

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{DaemonClient, InvokeOutcome};
pub use protocol::{Request, Response};
pub use server::DaemonServer;
