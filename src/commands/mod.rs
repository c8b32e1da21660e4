pub mod deploy;
pub mod pools;
pub mod status;
pub mod teardown;
pub mod validate;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Result;
use colored::{ColoredString, Colorize};

use crate::config::Config;
use crate::health::CheckStatus;
use crate::pools::ConfirmationToken;
use crate::runtime::lxd::LxdRuntime;
use crate::runtime::EnvironmentRuntime;

pub(crate) fn runtime(config: &Config) -> Arc<dyn EnvironmentRuntime> {
    Arc::new(LxdRuntime::new(&config.exec))
}

pub(crate) fn status_glyph(status: CheckStatus) -> ColoredString {
    match status {
        CheckStatus::Pass => "ok".green().bold(),
        CheckStatus::Warn => "!!".yellow().bold(),
        CheckStatus::Fail => "!!".red().bold(),
        CheckStatus::Skipped => "--".dimmed(),
    }
}

/// Ask the operator to type the confirmation literal.
///
/// Returns `None` without prompting when stdin is not a terminal, so
/// unattended runs never assume consent.
pub(crate) fn ask_confirmation(prompt: &str) -> Result<Option<ConfirmationToken>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }
    eprint!("{} {} Type 'yes' to continue: ", "??".blue().bold(), prompt);
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(Some(ConfirmationToken::new(input.trim())))
}
