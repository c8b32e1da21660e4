use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "CEPHFORGE_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub bootstrap: BootstrapConfig,
    pub exec: ExecConfig,
    pub pools: PoolsConfig,
    pub endpoints: EndpointsConfig,
    pub log: LogConfig,
}

// ── Cluster ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub prefix: String,
    pub image: String,
    pub profile: String,
    pub bridge: String,
    pub storage_pool: String,
    pub payload: PathBuf,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            prefix: "ceph-node-".into(),
            image: "ubuntu:22.04".into(),
            profile: "default".into(),
            bridge: "lxdbr0".into(),
            storage_pool: "default".into(),
            payload: PathBuf::from("cloud-init.yaml"),
        }
    }
}

// ── Bootstrap ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 1800,
            poll_interval_secs: 10,
        }
    }
}

impl BootstrapConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

// ── Exec ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    pub lxc_bin: String,
    pub timeout_secs: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            lxc_bin: "lxc".into(),
            timeout_secs: 60,
        }
    }
}

// ── Pools ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolsConfig {
    pub replica_size: u32,
    pub pg_count: u32,
    pub erasure: ErasureConfig,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            replica_size: 3,
            pg_count: 128,
            erasure: ErasureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErasureConfig {
    pub profile: String,
    pub k: u32,
    pub m: u32,
    pub failure_domain: String,
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            profile: "archive-ec".into(),
            k: 4,
            m: 2,
            failure_domain: "host".into(),
        }
    }
}

impl ErasureConfig {
    /// Data nodes needed to place every shard on its own failure domain.
    pub fn required_data_nodes(&self) -> u32 {
        self.k + self.m
    }
}

// ── Endpoints / Log ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub object_gateway_port: u16,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            object_gateway_port: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl Config {
    /// Replica, placement-group and erasure data counts must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.pools.replica_size == 0 {
            bail!("pools.replica_size must be at least 1");
        }
        if self.pools.pg_count == 0 {
            bail!("pools.pg_count must be at least 1");
        }
        if self.pools.erasure.k == 0 {
            bail!("pools.erasure.k must be at least 1");
        }
        Ok(())
    }

    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("cephforge").join("config.yaml"))
    }

    /// Defaults, then the YAML file (if present), then `CEPHFORGE_*` env vars.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

pub fn load(custom_path: Option<&Path>) -> Result<Config> {
    let path = match custom_path {
        Some(p) => p.to_path_buf(),
        None => Config::path()?,
    };
    let config: Config = Config::figment(&path)
        .extract()
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
