//! LXD-backed runtime driven through the `lxc` CLI.

use std::collections::HashMap;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{EnvState, EnvironmentDescriptor, EnvironmentRuntime, EnvironmentSpec, ExecOutput};
use crate::config::ExecConfig;
use crate::error::{Error, Result};

pub struct LxdRuntime {
    lxc_bin: String,
    timeout: Duration,
}

impl LxdRuntime {
    pub fn new(config: &ExecConfig) -> Self {
        Self {
            lxc_bin: config.lxc_bin.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run `lxc` with `args`, killing it if it outlives the exec deadline.
    async fn run(&self, args: &[String]) -> Result<Output> {
        let rendered = args.join(" ");
        debug!(command = %rendered, "running lxc");

        let child = Command::new(&self.lxc_bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.lxc_bin.clone(),
                source,
            })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(Error::Spawn {
                program: self.lxc_bin.clone(),
                source,
            }),
            Err(_) => Err(Error::ExecTimeout {
                command: rendered,
                timeout: self.timeout,
            }),
        }
    }

    async fn describe(&self, name: &str) -> Option<EnvironmentDescriptor> {
        self.list(name).await.into_iter().find(|d| d.name == name)
    }
}

#[async_trait]
impl EnvironmentRuntime for LxdRuntime {
    async fn create(&self, spec: &EnvironmentSpec) -> Result<()> {
        if self.describe(&spec.name).await.is_some() {
            return Err(Error::AlreadyExists(spec.name.clone()));
        }

        let args = vec![
            "launch".to_string(),
            spec.image.clone(),
            spec.name.clone(),
            "--profile".into(),
            spec.profile.clone(),
            "--network".into(),
            spec.bridge.clone(),
            "--storage".into(),
            spec.storage_pool.clone(),
            "--config".into(),
            format!("user.user-data={}", spec.payload),
        ];

        let output = self.run(&args).await?;
        if output.status.success() {
            info!(name = %spec.name, image = %spec.image, "environment launched");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("already exists") {
            return Err(Error::AlreadyExists(spec.name.clone()));
        }
        Err(Error::CreationRejected {
            name: spec.name.clone(),
            reason: stderr,
        })
    }

    async fn exec(&self, name: &str, command: &[String]) -> Result<ExecOutput> {
        match self.describe(name).await {
            Some(d) if d.state == EnvState::Running => {}
            _ => return Err(Error::EnvironmentNotRunning(name.to_string())),
        }

        let mut args = vec!["exec".to_string(), name.to_string(), "--".to_string()];
        args.extend(command.iter().cloned());

        let output = self.run(&args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let code = output.status.code().unwrap_or(-1);

        if code == 0 {
            return Ok(ExecOutput { stdout, code });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut captured = stdout;
        if !stderr.trim().is_empty() {
            if !captured.is_empty() && !captured.ends_with('\n') {
                captured.push('\n');
            }
            captured.push_str(&stderr);
        }
        Err(Error::CommandFailed {
            command: command.join(" "),
            code,
            output: captured,
        })
    }

    async fn list(&self, prefix: &str) -> Vec<EnvironmentDescriptor> {
        let args = vec![
            "list".to_string(),
            prefix.to_string(),
            "--format".into(),
            "json".into(),
        ];

        let output = match self.run(&args).await {
            Ok(o) if o.status.success() => o,
            Ok(o) => {
                warn!(
                    prefix,
                    stderr = %String::from_utf8_lossy(&o.stderr).trim(),
                    "lxc list failed"
                );
                return Vec::new();
            }
            Err(e) => {
                warn!(prefix, error = %e, "lxc list failed");
                return Vec::new();
            }
        };

        match parse_instances(&String::from_utf8_lossy(&output.stdout)) {
            Ok(all) => all
                .into_iter()
                .filter(|d| d.name.starts_with(prefix))
                .collect(),
            Err(e) => {
                warn!(prefix, error = %e, "could not parse lxc list output");
                Vec::new()
            }
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let args = vec!["delete".to_string(), name.to_string(), "--force".into()];
        let output = self.run(&args).await?;
        if output.status.success() {
            info!(name, "environment deleted");
            return Ok(());
        }
        Err(Error::CommandFailed {
            command: args.join(" "),
            code: output.status.code().unwrap_or(-1),
            output: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

// ── lxc list JSON ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LxdInstance {
    name: String,
    status: String,
    #[serde(default)]
    state: Option<LxdInstanceState>,
}

#[derive(Debug, Deserialize)]
struct LxdInstanceState {
    #[serde(default)]
    network: Option<HashMap<String, LxdNic>>,
}

#[derive(Debug, Deserialize)]
struct LxdNic {
    #[serde(default)]
    addresses: Vec<LxdAddress>,
}

#[derive(Debug, Deserialize)]
struct LxdAddress {
    family: String,
    address: String,
    scope: String,
}

fn parse_instances(json: &str) -> Result<Vec<EnvironmentDescriptor>> {
    let instances: Vec<LxdInstance> = serde_json::from_str(json).map_err(|e| Error::Parse {
        command: "lxc list --format json".into(),
        reason: e.to_string(),
    })?;

    Ok(instances
        .into_iter()
        .map(|inst| {
            let state = if inst.status.eq_ignore_ascii_case("running") {
                EnvState::Running
            } else {
                EnvState::Stopped
            };
            let address = inst
                .state
                .and_then(|s| s.network)
                .and_then(|nics| primary_address(&nics));
            EnvironmentDescriptor {
                name: inst.name,
                state,
                address,
            }
        })
        .collect())
}

/// First global IPv4 address, preferring `eth0` over other interfaces.
fn primary_address(nics: &HashMap<String, LxdNic>) -> Option<String> {
    let global_v4 = |nic: &LxdNic| {
        nic.addresses
            .iter()
            .find(|a| a.family == "inet" && a.scope == "global")
            .map(|a| a.address.clone())
    };

    if let Some(addr) = nics.get("eth0").and_then(global_v4) {
        return Some(addr);
    }
    let mut names: Vec<&String> = nics.keys().filter(|n| n.as_str() != "lo").collect();
    names.sort();
    names.into_iter().find_map(|n| global_v4(&nics[n]))
}
