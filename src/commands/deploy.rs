//! `cephforge deploy`: provision, bootstrap, validate, optionally configure pools.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::commands::{runtime, validate};
use crate::config::Config;
use crate::driver::{DeployRequest, DeploymentReport, Orchestrator};
use crate::health::{CheckStatus, HealthCheck};
use crate::pools::{BundleType, StepOutcome};
use crate::topology::NodeState;

pub struct DeployArgs {
    pub nodes: u32,
    pub profile: Option<String>,
    pub bridge: Option<String>,
    pub storage: Option<String>,
    pub payload: Option<PathBuf>,
    pub pools: Option<BundleType>,
    pub autoscale: bool,
    pub detailed: bool,
}

pub fn run(config: &Config, args: DeployArgs) -> Result<()> {
    let mut config = config.clone();

    // CLI flags override config values
    if let Some(profile) = args.profile {
        config.cluster.profile = profile;
    }
    if let Some(bridge) = args.bridge {
        config.cluster.bridge = bridge;
    }
    if let Some(storage) = args.storage {
        config.cluster.storage_pool = storage;
    }
    if let Some(payload) = args.payload {
        config.cluster.payload = payload;
    }
    if args.nodes == 0 {
        bail!("--nodes must be at least 1");
    }

    let payload = std::fs::read_to_string(&config.cluster.payload).with_context(|| {
        format!(
            "reading bootstrap payload {}",
            config.cluster.payload.display()
        )
    })?;

    println!(
        "{} Deploying {} node(s) with prefix {} (image {}, profile {})",
        ">>".blue().bold(),
        args.nodes,
        config.cluster.prefix.bold(),
        config.cluster.image,
        config.cluster.profile
    );

    let request = DeployRequest {
        node_count: args.nodes,
        bundle: args.pools,
        autoscale: args.autoscale,
        detailed: args.detailed,
    };

    let orchestrator = Orchestrator::new(runtime(&config), config, payload);
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(orchestrator.deploy(&request))?;

    print_summary(&report, args.detailed);

    if !report.success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(report: &DeploymentReport, detailed: bool) {
    println!();
    println!("{}", "── Nodes ──".yellow());
    for node in &report.topology.nodes {
        let glyph = match node.state {
            NodeState::Ready => "ok".green().bold(),
            _ => "!!".red().bold(),
        };
        println!(
            "  {} {} {} {}",
            glyph,
            node.name.bold(),
            node.address.as_deref().unwrap_or("-").dimmed(),
            node.state.label()
        );
        if let Some(reason) = &node.failure {
            println!("     {}", reason);
        }
    }

    if let Some(health) = &report.health {
        println!();
        validate::print_report(health, detailed);
        let no_pools = health.status_of(HealthCheck::Pools) == Some(CheckStatus::Warn);
        if report.pools.is_none() && no_pools {
            println!(
                "  {} No pools yet. Run `cephforge pools --bundle <name>` to create some.",
                "::".blue().bold()
            );
        }
    }

    if let Some(pools) = &report.pools {
        println!();
        println!("{} {}", "── Pools ──".yellow(), pools.status());
        for step in &pools.steps {
            let (glyph, note) = match &step.outcome {
                StepOutcome::Created => ("ok".green().bold(), "created".to_string()),
                StepOutcome::Existing => ("::".blue().bold(), "already present".to_string()),
                StepOutcome::Skipped(reason) => {
                    ("!!".yellow().bold(), format!("skipped: {reason}"))
                }
            };
            println!("  {} {:<28} {}", glyph, step.target, note);
        }
    }
    if let Some(err) = &report.pool_error {
        println!("  {} pool configuration failed: {}", "!!".red().bold(), err);
    }
    if let Some(summary) = &report.autoscale {
        println!(
            "  {} autoscale enabled on {} pool(s)",
            "ok".green().bold(),
            summary.enabled.len()
        );
        for (pool, err) in &summary.failed {
            println!("  {} {}: {}", "!!".yellow().bold(), pool, err);
        }
    }

    println!();
    if report.success() {
        println!("{} Deployment complete", "ok".green().bold());
    } else {
        println!("{} Deployment failed", "!!".red().bold());
    }
}
