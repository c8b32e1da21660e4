//! `cephforge teardown`: delete every member environment.

use anyhow::Result;
use colored::Colorize;

use crate::commands::{ask_confirmation, runtime};
use crate::config::Config;
use crate::driver::Orchestrator;
use crate::pools::ConfirmationToken;

pub fn run(config: &Config, confirm: Option<String>) -> Result<()> {
    let token = match confirm {
        Some(typed) => Some(ConfirmationToken::new(typed)),
        None => ask_confirmation(&format!(
            "Every environment named {}* will be deleted.",
            config.cluster.prefix.bold()
        ))?,
    };
    if !token.as_ref().is_some_and(ConfirmationToken::confirms) {
        eprintln!("{} Teardown not confirmed, nothing deleted", "!!".red().bold());
        eprintln!("   Pass --confirm yes when running non-interactively.");
        std::process::exit(1);
    }

    // the payload is only used when creating environments
    let orchestrator = Orchestrator::new(runtime(config), config.clone(), String::new());
    let rt = tokio::runtime::Runtime::new()?;
    let removed = rt.block_on(orchestrator.teardown())?;

    if removed.is_empty() {
        println!("{} Nothing to delete", "::".blue().bold());
    }
    for name in &removed {
        println!("{} Deleted {}", "ok".green().bold(), name);
    }
    Ok(())
}
