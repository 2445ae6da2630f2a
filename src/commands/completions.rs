use crate::args::Cli;
use anyhow::Result;
use clap_complete::Shell;
use palbot::completions::{generate_completions, resolve_shell};

pub(crate) fn cmd_completions(shell: Option<Shell>) -> Result<()> {
    let shell = resolve_shell(shell)?;
    generate_completions::<Cli>(shell, "palbot", &mut std::io::stdout());
    Ok(())
}
