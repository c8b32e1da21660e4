//! `cephforge pools`: create bundles, list, resize, autoscale, and remove pools.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use crate::commands::{ask_confirmation, runtime};
use crate::config::Config;
use crate::error::Error;
use crate::health::{fmt_bytes, CheckStatus};
use crate::pools::{BundleType, ConfirmationToken, PoolManager, StepOutcome, StoragePool};
use crate::topology::node_name;

#[derive(Args, Debug)]
pub struct PoolsArgs {
    /// Environment to run pool commands in (default: first node)
    #[arg(long)]
    target: Option<String>,

    /// Bundle to create: block, filesystem, object, archival or all
    #[arg(long)]
    bundle: Option<BundleType>,

    /// Replica size for new pools (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    size: Option<u32>,

    /// Placement-group count for new pools (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pg: Option<u32>,

    /// Remove this pool (irreversible)
    #[arg(long, conflicts_with_all = ["bundle", "list", "resize", "autoscale"])]
    remove: Option<String>,

    /// Confirmation for --remove; must be exactly "yes"
    #[arg(long, requires = "remove")]
    confirm: Option<String>,

    /// List pools and exit
    #[arg(long, conflicts_with_all = ["bundle", "resize", "autoscale"])]
    list: bool,

    /// Set --size and/or --pg on an existing pool
    #[arg(long, conflicts_with = "bundle")]
    resize: Option<String>,

    /// Enable placement-group autoscaling on every pool
    #[arg(long)]
    autoscale: bool,
}

enum Action {
    List,
    Remove(String, Option<ConfirmationToken>),
    Resize(String),
    Configure {
        bundle: Option<BundleType>,
        autoscale: bool,
    },
}

impl PoolsArgs {
    fn action(&self) -> Action {
        if self.list {
            Action::List
        } else if let Some(name) = &self.remove {
            Action::Remove(name.clone(), self.confirm.clone().map(ConfirmationToken::new))
        } else if let Some(name) = &self.resize {
            Action::Resize(name.clone())
        } else {
            // with no explicit bundle, --autoscale alone only toggles autoscale
            let bundle = match (self.bundle, self.autoscale) {
                (Some(b), _) => Some(b),
                (None, true) => None,
                (None, false) => Some(BundleType::All),
            };
            Action::Configure {
                bundle,
                autoscale: self.autoscale,
            }
        }
    }
}

pub fn run(config: &Config, args: PoolsArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(config, args))
}

async fn run_async(config: &Config, args: PoolsArgs) -> Result<()> {
    let target = args
        .target
        .clone()
        .unwrap_or_else(|| node_name(&config.cluster.prefix, 1));
    let manager = PoolManager::new(runtime(config), &target, config.pools.erasure.clone())
        .with_gateway_port(config.endpoints.object_gateway_port);

    match args.action() {
        Action::List => {
            let pools = manager.list_pools().await?;
            print_pools(&target, &pools);
        }
        Action::Remove(name, token) => {
            let token = match token {
                Some(t) => Some(t),
                None => ask_confirmation(&format!(
                    "Pool {} on {} will be deleted with all its data.",
                    name.bold(),
                    target
                ))?,
            };
            match manager.remove_pool(&name, token.as_ref()).await {
                Ok(()) => println!("{} Removed pool {}", "ok".green().bold(), name),
                Err(e @ Error::ConfirmationRequired(_)) => {
                    eprintln!("{} {}", "!!".red().bold(), e);
                    eprintln!("   Pass --confirm yes when running non-interactively.");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Action::Resize(name) => {
            if args.size.is_none() && args.pg.is_none() {
                bail!("--resize needs --size and/or --pg");
            }
            manager.resize_pool(&name, args.size, args.pg).await?;
            println!("{} Resized pool {}", "ok".green().bold(), name);
        }
        Action::Configure { bundle, autoscale } => {
            if let Some(bundle) = bundle {
                let size = args.size.unwrap_or(config.pools.replica_size);
                let pg = args.pg.unwrap_or(config.pools.pg_count);
                println!(
                    "{} Creating {} pools on {} (size {}, pg {})",
                    ">>".blue().bold(),
                    bundle,
                    target.bold(),
                    size,
                    pg
                );
                let report = manager.create_bundle(bundle, size, pg).await?;
                for step in &report.steps {
                    match &step.outcome {
                        StepOutcome::Created => {
                            println!("  {} {} created", "ok".green().bold(), step.target)
                        }
                        StepOutcome::Existing => {
                            println!("  {} {} already present", "::".blue().bold(), step.target)
                        }
                        StepOutcome::Skipped(reason) => println!(
                            "  {} {} skipped: {}",
                            "!!".yellow().bold(),
                            step.target,
                            reason
                        ),
                    }
                }
                if report.status() == CheckStatus::Warn {
                    println!(
                        "{} Finished with {} warning(s)",
                        "!!".yellow().bold(),
                        report.warnings.len()
                    );
                }
            }
            if autoscale {
                let summary = manager.enable_autoscale().await?;
                println!(
                    "{} Autoscale enabled on {} pool(s)",
                    "ok".green().bold(),
                    summary.enabled.len()
                );
                for (pool, err) in &summary.failed {
                    println!("  {} {}: {}", "!!".yellow().bold(), pool, err);
                }
            }
        }
    }
    Ok(())
}

fn print_pools(target: &str, pools: &[StoragePool]) {
    println!("{} {}", "═══ Pools on".cyan().bold(), target.cyan().bold());
    if pools.is_empty() {
        println!("  (none)");
        return;
    }
    println!(
        "  {:<28} {:<20} {:>4} {:>6} {:>10} {:>10} {:>6}",
        "NAME".dimmed(),
        "WORKLOAD".dimmed(),
        "SIZE".dimmed(),
        "PGS".dimmed(),
        "STORED".dimmed(),
        "AVAIL".dimmed(),
        "AUTO".dimmed()
    );
    for p in pools {
        let workload = p
            .workload
            .map(|w| w.to_string())
            .or_else(|| p.application.clone())
            .unwrap_or_else(|| "-".into());
        let (stored, avail) = match &p.usage {
            Some(u) => (fmt_bytes(u.stored_bytes), fmt_bytes(u.max_avail_bytes)),
            None => ("-".into(), "-".into()),
        };
        println!(
            "  {:<28} {:<20} {:>4} {:>6} {:>10} {:>10} {:>6}",
            p.name,
            workload,
            p.replica_size,
            p.pg_count,
            stored,
            avail,
            if p.autoscale { "on" } else { "off" }
        );
        if let Some(profile) = &p.erasure_profile {
            println!("    {} {}", "erasure profile:".dimmed(), profile);
        }
    }
}
