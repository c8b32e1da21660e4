mod bootstrap;
mod ceph;
mod commands;
mod config;
mod driver;
mod error;
mod health;
mod pools;
mod runtime;
mod telemetry;
mod topology;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::pools::BundleType;

#[derive(Parser)]
#[command(name = "cephforge", version, about = "Build, validate, and manage Ceph clusters on LXD")]
struct Cli {
    /// Path to config file (default: ~/.config/cephforge/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides config; RUST_LOG wins over both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision nodes, wait for bootstrap, and validate the primary
    Deploy {
        /// Number of member nodes
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        nodes: u32,

        /// LXD profile (overrides config)
        #[arg(long)]
        profile: Option<String>,

        /// Network bridge (overrides config)
        #[arg(long)]
        bridge: Option<String>,

        /// LXD storage pool for the environments (overrides config)
        #[arg(long)]
        storage: Option<String>,

        /// Cloud-init payload file (overrides config)
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Pool bundle to create once the cluster validates
        #[arg(long)]
        pools: Option<BundleType>,

        /// Enable placement-group autoscaling after pool creation
        #[arg(long)]
        autoscale: bool,

        /// Include verbatim probe output in the health report
        #[arg(long)]
        detailed: bool,
    },

    /// Run the health checks against one environment
    Validate {
        /// Environment to validate (default: first node)
        #[arg(long)]
        target: Option<String>,

        /// Include verbatim probe output
        #[arg(long)]
        detailed: bool,

        /// Print a single JSON record instead of the table
        #[arg(long)]
        json: bool,
    },

    /// Create, list, resize, and remove storage pools
    Pools(commands::pools::PoolsArgs),

    /// Show member environments and their addresses
    Status {
        /// Print JSON instead of the table
        #[arg(long)]
        json: bool,
    },

    /// Delete every member environment
    Teardown {
        /// Confirmation; must be exactly "yes"
        #[arg(long)]
        confirm: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref())?;
    telemetry::init(&config.log, cli.log_level.as_deref());

    match cli.command {
        Commands::Deploy {
            nodes,
            profile,
            bridge,
            storage,
            payload,
            pools,
            autoscale,
            detailed,
        } => commands::deploy::run(
            &config,
            commands::deploy::DeployArgs {
                nodes,
                profile,
                bridge,
                storage,
                payload,
                pools,
                autoscale,
                detailed,
            },
        ),
        Commands::Validate {
            target,
            detailed,
            json,
        } => commands::validate::run(&config, target, detailed, json),
        Commands::Pools(args) => commands::pools::run(&config, args),
        Commands::Status { json } => commands::status::run(&config, json),
        Commands::Teardown { confirm } => commands::teardown::run(&config, confirm),
    }
}
