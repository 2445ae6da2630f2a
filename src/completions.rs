//! Completion scripts for the `palbot` binary.
//!
//! The shell comes from the command line or, failing that, from `$SHELL`.

use std::io::Write;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::error::{AdminError, Result};

/// Explicit shell, else the login shell named by `$SHELL`.
pub fn resolve_shell(requested: Option<Shell>) -> Result<Shell> {
    requested.or_else(Shell::from_env).ok_or_else(|| {
        AdminError::Config("cannot tell the shell from $SHELL; pass one explicitly".to_string())
    })
}

pub fn generate_completions<C: CommandFactory>(shell: Shell, bin_name: &str, buf: &mut dyn Write) {
    let mut cmd = C::command();
    generate(shell, &mut cmd, bin_name, buf);
}
