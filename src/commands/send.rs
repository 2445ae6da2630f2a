use crate::args::{command_text, Invocation};
use anyhow::{bail, Result};
use palbot::daemon::{DaemonClient, InvokeOutcome};
use palbot::{clienv, AccessClaim, AdminConfig};

pub(crate) async fn cmd_send(config: &AdminConfig, invocation: Invocation) -> Result<()> {
    let caller = invocation.user.unwrap_or_else(clienv::current_user);
    let claim = AccessClaim::user(caller).with_roles(invocation.roles);
    let text = command_text(&invocation.command, &invocation.args);
    invoke(config, &text, &claim).await
}

/// Relay trigger: the caller is the relay itself, authorized by token.
pub(crate) async fn cmd_hook(config: &AdminConfig, command: &str, args: &[String]) -> Result<()> {
    let Some(token) = config.access.relay_token.clone() else {
        bail!("RELAY_TOKEN is not set");
    };
    let claim = AccessClaim::user("relay").relayed(token);
    invoke(config, &command_text(command, args), &claim).await
}

pub(crate) async fn cmd_ping(config: &AdminConfig) -> Result<()> {
    let client = DaemonClient::new(config.socket_path());
    if !client.socket_exists() {
        bail!("Daemon is not running (no socket at {})", client.socket_path().display());
    }
    let (uptime, version) = client.ping().await?;
    println!("palbot daemon v{} is up ({}s)", version, uptime);
    Ok(())
}

async fn invoke(config: &AdminConfig, text: &str, claim: &AccessClaim) -> Result<()> {
    let client = DaemonClient::new(config.socket_path());
    tracing::debug!(socket = %client.socket_path().display(), command = %text, "Sending command");

    let outcome = client
        .invoke(text, claim, |message| println!("{}\n", message))
        .await?;

    match outcome {
        InvokeOutcome::Done => Ok(()),
        InvokeOutcome::Denied { caller } => bail!("Access denied for '{}'", caller),
        InvokeOutcome::Unknown { name } => bail!("Unknown command '{}' (try `help`)", name),
        InvokeOutcome::Failed { message } => bail!("Daemon failed to run the command: {}", message),
    }
}
