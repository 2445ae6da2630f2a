//! Inbound command handling: name lookup in a static table, access check,
//! argument parsing by declared shape, then exactly one orchestrator call.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::access::{AccessClaim, AccessPolicy};
use crate::error::{AdminError, Result};
use crate::orchestrator::{Orchestrator, Procedure};
use crate::reporter::Reporter;

pub const COMMAND_PREFIX: char = '/';

/// What a command accepts after its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// No arguments; anything given is ignored
    Nothing,
    /// One required whitespace-free token
    Identifier(&'static str),
    /// Required free-form remainder
    Text(&'static str),
    /// Optional delay in seconds
    Delay,
}

impl ArgShape {
    pub fn usage(&self) -> String {
        match self {
            Self::Nothing => String::new(),
            Self::Identifier(name) | Self::Text(name) => format!("<{}>", name),
            Self::Delay => "[delay]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Help,
    Info,
    ShowPlayers,
    Broadcast,
    KickPlayer,
    BanPlayer,
    BanList,
    UnbanPlayer,
    Backup,
    Status,
    Restart,
    Stop,
    Start,
    Update,
    ShowConfig,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::Help,
        Operation::Info,
        Operation::ShowPlayers,
        Operation::Broadcast,
        Operation::KickPlayer,
        Operation::BanPlayer,
        Operation::BanList,
        Operation::UnbanPlayer,
        Operation::Backup,
        Operation::Status,
        Operation::Restart,
        Operation::Stop,
        Operation::Start,
        Operation::Update,
        Operation::ShowConfig,
    ];

    fn procedure(&self) -> Option<Procedure> {
        match self {
            Self::Start => Some(Procedure::Start),
            Self::Stop => Some(Procedure::Stop),
            Self::Restart => Some(Procedure::Restart),
            Self::Update => Some(Procedure::Update),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub brief: &'static str,
    pub shape: ArgShape,
    pub operation: Operation,
}

const fn spec(name: &'static str, brief: &'static str, shape: ArgShape, operation: Operation) -> CommandSpec {
    CommandSpec {
        name,
        brief,
        shape,
        operation,
    }
}

pub const COMMANDS: &[CommandSpec] = &[
    spec("help", "List available commands", ArgShape::Nothing, Operation::Help),
    spec("info", "Show server information", ArgShape::Nothing, Operation::Info),
    spec(
        "showplayers",
        "Show connected players (name,playeruid,steamid)",
        ArgShape::Nothing,
        Operation::ShowPlayers,
    ),
    spec(
        "broadcast",
        "Send a message to every player (ASCII only)",
        ArgShape::Text("message"),
        Operation::Broadcast,
    ),
    spec("kickplayer", "Kick a player", ArgShape::Identifier("steamid"), Operation::KickPlayer),
    spec("banplayer", "Ban a player", ArgShape::Identifier("steamid"), Operation::BanPlayer),
    spec("banlist", "Show banned players", ArgShape::Nothing, Operation::BanList),
    spec(
        "unbanplayer",
        "Lift a player's ban",
        ArgShape::Identifier("steamid"),
        Operation::UnbanPlayer,
    ),
    spec("backup", "Take a backup of the save data", ArgShape::Nothing, Operation::Backup),
    spec("status", "Show the service status", ArgShape::Nothing, Operation::Status),
    spec("restart", "Restart the server after a delay", ArgShape::Delay, Operation::Restart),
    spec("stop", "Stop the server after a delay", ArgShape::Delay, Operation::Stop),
    spec("start", "Start the server after a delay", ArgShape::Delay, Operation::Start),
    spec("update", "Update the server after a delay", ArgShape::Delay, Operation::Update),
    spec(
        "showconfig",
        "Show settings that differ from the defaults",
        ArgShape::Nothing,
        Operation::ShowConfig,
    ),
];

/// Startup check: unique well-formed names and every operation bound once.
pub fn validate_table(table: &[CommandSpec]) -> Result<()> {
    let mut names = HashSet::new();
    let mut operations = HashSet::new();
    for spec in table {
        if spec.name.is_empty() || spec.name.chars().any(char::is_whitespace) {
            return Err(AdminError::Config(format!(
                "malformed command name '{}'",
                spec.name
            )));
        }
        if !names.insert(spec.name) {
            return Err(AdminError::Config(format!(
                "duplicate command '{}'",
                spec.name
            )));
        }
        if !operations.insert(spec.operation) {
            return Err(AdminError::Config(format!(
                "operation {:?} bound to more than one command",
                spec.operation
            )));
        }
        if spec.operation.procedure().is_some() != (spec.shape == ArgShape::Delay) {
            return Err(AdminError::Config(format!(
                "command '{}' has the wrong argument shape",
                spec.name
            )));
        }
    }
    if let Some(missing) = Operation::ALL.iter().find(|op| !operations.contains(*op)) {
        return Err(AdminError::Config(format!(
            "operation {:?} has no command",
            missing
        )));
    }
    Ok(())
}

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// A command as received: name plus raw argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: String,
}

impl Command {
    /// `"/restart 30"` or `"restart 30"`. `None` for blank input.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix(COMMAND_PREFIX).unwrap_or(text);
        let (name, args) = match text.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (text, ""),
        };
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            args: args.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub command: Command,
    pub claim: AccessClaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Denied,
    Unknown,
    /// Arguments did not match the declared shape; usage was reported
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arguments {
    Empty,
    Value(String),
    Delay(u64),
}

fn parse_arguments(spec: &CommandSpec, args: &str) -> Result<Arguments> {
    let invalid = || AdminError::InvalidArguments {
        command: spec.name.to_string(),
        expected: spec.shape.usage(),
    };
    match spec.shape {
        ArgShape::Nothing => Ok(Arguments::Empty),
        ArgShape::Identifier(_) => args
            .split_whitespace()
            .next()
            .map(|token| Arguments::Value(token.to_string()))
            .ok_or_else(invalid),
        ArgShape::Text(_) if args.is_empty() => Err(invalid()),
        ArgShape::Text(_) => Ok(Arguments::Value(args.to_string())),
        ArgShape::Delay => match args.split_whitespace().next() {
            None => Ok(Arguments::Delay(
                spec.operation
                    .procedure()
                    .map(|p| p.default_delay())
                    .unwrap_or_default(),
            )),
            Some(token) => token.parse().map(Arguments::Delay).map_err(|_| invalid()),
        },
    }
}

pub fn help_text() -> String {
    let mut out = String::from("Commands:\n");
    for spec in COMMANDS {
        let usage = spec.shape.usage();
        let signature = if usage.is_empty() {
            format!("{}{}", COMMAND_PREFIX, spec.name)
        } else {
            format!("{}{} {}", COMMAND_PREFIX, spec.name, usage)
        };
        out.push_str(&format!("  {:<24} {}\n", signature, spec.brief));
    }
    out
}

/// Single entry point for every inbound request.
pub struct Dispatcher {
    policy: Arc<dyn AccessPolicy>,
    orchestrator: Arc<Orchestrator>,
}

impl Dispatcher {
    pub fn new(policy: Arc<dyn AccessPolicy>, orchestrator: Arc<Orchestrator>) -> Result<Self> {
        validate_table(COMMANDS)?;
        debug!(commands = COMMANDS.len(), "Command table validated");
        Ok(Self {
            policy,
            orchestrator,
        })
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Classified failures are reported through `out`; only unclassified
    /// errors come back as `Err`.
    pub async fn dispatch(&self, request: &InboundRequest, out: &dyn Reporter) -> Result<DispatchOutcome> {
        let command = &request.command;
        let Some(spec) = lookup(&command.name) else {
            info!(command = %command.name, "Command not found");
            return Ok(DispatchOutcome::Unknown);
        };

        if !self.policy.is_authorized(&request.claim) {
            let denied = AdminError::AccessDenied {
                caller: request.claim.caller.clone(),
            };
            warn!(command = %spec.name, kind = denied.slug(), "{}", denied);
            return Ok(DispatchOutcome::Denied);
        }

        let arguments = match parse_arguments(spec, &command.args) {
            Ok(arguments) => arguments,
            Err(e) => {
                info!(command = %spec.name, "{}", e);
                out.report(&format!(
                    ":warning: Usage: {}{} {}",
                    COMMAND_PREFIX,
                    spec.name,
                    spec.shape.usage()
                ))
                .await;
                return Ok(DispatchOutcome::Rejected);
            }
        };

        info!(
            command = %spec.name,
            args = %command.args,
            caller = %request.claim.caller,
            relayed = request.claim.relay_token.is_some(),
            "Dispatching command"
        );
        self.invoke(spec.operation, arguments, out).await?;
        Ok(DispatchOutcome::Completed)
    }

    async fn invoke(&self, operation: Operation, arguments: Arguments, out: &dyn Reporter) -> Result<()> {
        let orchestrator = &self.orchestrator;
        match (operation, arguments) {
            (Operation::Help, _) => {
                out.report(&format!("```\n{}```", help_text())).await;
                Ok(())
            }
            (Operation::Info, _) => orchestrator.info(out).await,
            (Operation::ShowPlayers, _) => orchestrator.show_players(out).await,
            (Operation::BanList, _) => orchestrator.show_banlist(out).await,
            (Operation::Backup, _) => orchestrator.backup(out).await,
            (Operation::Status, _) => orchestrator.status(out).await,
            (Operation::ShowConfig, _) => orchestrator.show_config(out).await,
            (Operation::Broadcast, Arguments::Value(message)) => {
                orchestrator.broadcast(&message, out).await
            }
            (Operation::KickPlayer, Arguments::Value(id)) => orchestrator.kick_player(&id, out).await,
            (Operation::BanPlayer, Arguments::Value(id)) => orchestrator.ban_player(&id, out).await,
            (Operation::UnbanPlayer, Arguments::Value(id)) => {
                orchestrator.unban_player(&id, out).await
            }
            (op, Arguments::Delay(delay)) => match op.procedure() {
                Some(procedure) => orchestrator.run_lifecycle(procedure, delay, out).await,
                None => Err(AdminError::Config(format!("{:?} does not take a delay", op))),
            },
            (op, _) => Err(AdminError::Config(format!(
                "{:?} invoked with mismatched arguments",
                op
            ))),
        }
    }
}
