use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "palbot")]
#[command(version)]
#[command(about = "Admin bot for a Palworld dedicated server", long_about = None)]
pub(crate) struct Cli {
    /// Config file (default: $PALBOT_CONFIG or <config_dir>/palbot/config.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the admin daemon in the foreground
    Serve,

    /// Send a command to the running daemon
    Send(Invocation),

    /// Send a command as the trusted relay (uses RELAY_TOKEN)
    Hook {
        /// Command name, e.g. backup
        command: String,

        /// Command arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a command in-process without a daemon
    Exec(Invocation),

    /// Check that the daemon is alive
    Ping,

    /// Generate shell completions
    Completions {
        /// Target shell (default: detected from $SHELL)
        #[arg(value_enum)]
        shell: Option<Shell>,
    },
}

#[derive(Args)]
pub(crate) struct Invocation {
    /// Caller identity (default: $USER)
    #[arg(long, short)]
    pub user: Option<String>,

    /// Role held by the caller; repeatable
    #[arg(long = "role", short)]
    pub roles: Vec<String>,

    /// Command name, e.g. restart
    pub command: String,

    /// Command arguments, e.g. 30
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// `name` and `args` joined back into command text.
pub(crate) fn command_text(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, args.join(" "))
    }
}
