//! `cephforge validate`: run the health battery against one environment.

use anyhow::Result;
use colored::Colorize;

use crate::commands::{runtime, status_glyph};
use crate::config::Config;
use crate::health::{CheckStatus, ClusterHealthReport, HealthValidator};
use crate::topology::node_name;

pub fn run(config: &Config, target: Option<String>, detailed: bool, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(run_async(config, target, detailed))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.record())?);
    } else {
        print_report(&report, detailed);
    }

    if report.overall == CheckStatus::Fail {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_async(
    config: &Config,
    target: Option<String>,
    detailed: bool,
) -> Result<ClusterHealthReport> {
    let target = target.unwrap_or_else(|| node_name(&config.cluster.prefix, 1));
    let validator = HealthValidator::new(
        runtime(config),
        &config.cluster.prefix,
        config.endpoints.object_gateway_port,
    );
    Ok(validator.validate(&target, detailed).await)
}

pub(crate) fn print_report(report: &ClusterHealthReport, detailed: bool) {
    println!("{}", "═══ Cluster Health ═══".cyan().bold());
    println!("  Environment:   {}", report.environment.bold());
    println!(
        "  Address:       {}",
        report.address.as_deref().unwrap_or("unknown")
    );
    println!("  Nodes:         {}", report.topology.node_count);
    println!();

    for r in &report.results {
        let first = r.detail.lines().next().unwrap_or("");
        println!(
            "  {} {:<22} {}",
            status_glyph(r.status),
            r.check.title(),
            first
        );
        if detailed {
            for line in r.detail.lines().skip(1) {
                println!("       {}", line.dimmed());
            }
        }
    }

    println!();
    if let Some(url) = &report.endpoints.dashboard {
        println!("  Dashboard:     {}", url);
    }
    if let Some(url) = &report.endpoints.object_gateway {
        println!("  Object GW:     {}", url);
    }

    let overall = match report.overall {
        CheckStatus::Fail => "fail".red().bold(),
        CheckStatus::Warn => "warn".yellow().bold(),
        _ => "pass".green().bold(),
    };
    println!("  Overall:       {}", overall);
    println!(
        "  {} {}",
        "Checked:".dimmed(),
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
