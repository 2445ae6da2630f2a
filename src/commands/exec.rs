use crate::args::{command_text, Invocation};
use anyhow::{bail, Result};
use palbot::reporter::StdoutReporter;
use palbot::{
    clienv, AccessClaim, AdminConfig, AllowListPolicy, Command, DispatchOutcome, Dispatcher,
    InboundRequest, Orchestrator,
};
use std::sync::Arc;

/// Same dispatcher as the daemon, run once in-process (for cron jobs).
pub(crate) async fn cmd_exec(config: &AdminConfig, invocation: Invocation) -> Result<()> {
    let text = command_text(&invocation.command, &invocation.args);
    let Some(command) = Command::parse(&text) else {
        bail!("Empty command");
    };
    let caller = invocation.user.unwrap_or_else(clienv::current_user);
    let request = InboundRequest {
        command,
        claim: AccessClaim::user(caller).with_roles(invocation.roles),
    };

    let policy = Arc::new(AllowListPolicy::from_config(&config.access));
    let orchestrator = Arc::new(Orchestrator::from_config(config));
    let dispatcher = Dispatcher::new(policy, orchestrator)?;

    match dispatcher.dispatch(&request, &StdoutReporter).await? {
        DispatchOutcome::Completed | DispatchOutcome::Rejected => Ok(()),
        DispatchOutcome::Denied => bail!("Access denied for '{}'", request.claim.caller),
        DispatchOutcome::Unknown => bail!("Unknown command '{}' (try `help`)", request.command.name),
    }
}
