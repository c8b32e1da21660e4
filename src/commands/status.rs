//! `cephforge status`: member environments, their state and address.

use anyhow::Result;
use colored::Colorize;

use crate::commands::runtime;
use crate::config::Config;
use crate::topology::{NodeState, Topology};

pub fn run(config: &Config, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let runtime = runtime(config);
    let topology = rt.block_on(Topology::discover(runtime.as_ref(), &config.cluster.prefix));

    if json {
        println!("{}", serde_json::to_string_pretty(&topology)?);
        return Ok(());
    }

    if topology.nodes.is_empty() {
        println!(
            "{} No environments found with prefix {}",
            "::".blue().bold(),
            config.cluster.prefix
        );
        return Ok(());
    }

    println!("{}", "Cluster Members".bold());
    match topology.primary() {
        Some(primary) => println!(
            "  primary: {} ({})",
            primary.name,
            primary.address.as_deref().unwrap_or("no address")
        ),
        None => println!(
            "  primary: {} {}",
            topology.primary_name(),
            "missing".red()
        ),
    }
    println!();
    for node in &topology.nodes {
        let glyph = if node.state == NodeState::Ready {
            "ok".green().bold()
        } else {
            "!!".red().bold()
        };
        println!(
            "  {} {} {} {}",
            glyph,
            node.name.bold(),
            node.address.as_deref().unwrap_or("no address").dimmed(),
            if node.state == NodeState::Ready {
                "running"
            } else {
                "stopped"
            }
        );
    }
    println!();
    Ok(())
}
