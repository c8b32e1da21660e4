//! Scripted in-memory runtime for tests.
//!
//! Simulates a set of environments and the Ceph cluster reachable through
//! them. Every exec is recorded so tests can assert on call order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{EnvState, EnvironmentDescriptor, EnvironmentRuntime, EnvironmentSpec, ExecOutput};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub enum BootstrapScript {
    /// `status: done` from the nth probe onwards.
    DoneAfter(u32),
    /// `status: done` on every probe, but with this exit code.
    DoneWithExit(i32),
    Never,
    Error,
}

#[derive(Debug, Clone)]
struct FakeEnv {
    running: bool,
    address: String,
    script: BootstrapScript,
    probes: u32,
}

#[derive(Debug, Clone)]
pub struct FakePool {
    pub size: u32,
    pub pg_num: u32,
    pub application: Option<String>,
    pub erasure_profile: Option<String>,
    pub autoscale: bool,
}

#[derive(Debug, Clone)]
pub struct FakeCluster {
    pub installed: bool,
    pub health: String,
    pub mons: u32,
    pub mgr_available: bool,
    pub osds: u32,
    pub osds_up: u32,
    pub pools: BTreeMap<String, FakePool>,
    pub erasure_profiles: BTreeMap<String, String>,
    /// (name, metadata pool, data pool)
    pub filesystems: Vec<(String, String, String)>,
    pub rgw_daemons: Vec<String>,
    pub iscsi_daemons: Vec<String>,
    pub rgw_users: Vec<String>,
    pub dashboard: bool,
    pub allow_pool_delete: bool,
    pub cpus: u32,
    pub memory_bytes: u64,
}

impl FakeCluster {
    pub fn healthy(osds: u32) -> Self {
        Self {
            installed: true,
            health: "HEALTH_OK".into(),
            mons: osds.min(3).max(1),
            mgr_available: true,
            osds,
            osds_up: osds,
            pools: BTreeMap::new(),
            erasure_profiles: BTreeMap::new(),
            filesystems: Vec::new(),
            rgw_daemons: Vec::new(),
            iscsi_daemons: Vec::new(),
            rgw_users: Vec::new(),
            dashboard: false,
            allow_pool_delete: false,
            cpus: 4,
            memory_bytes: 8 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
enum Injected {
    Exit(i32, String),
    Timeout,
}

struct FakeState {
    envs: BTreeMap<String, FakeEnv>,
    scripts: HashMap<String, BootstrapScript>,
    rejected: Vec<String>,
    failures: Vec<(String, Injected)>,
    cluster: FakeCluster,
    calls: Vec<(String, String)>,
}

pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::with_cluster(FakeCluster::healthy(3))
    }

    pub fn with_cluster(cluster: FakeCluster) -> Self {
        Self {
            state: Mutex::new(FakeState {
                envs: BTreeMap::new(),
                scripts: HashMap::new(),
                rejected: Vec::new(),
                failures: Vec::new(),
                cluster,
                calls: Vec::new(),
            }),
        }
    }

    /// Register an already-running environment.
    pub fn add_environment(&self, name: &str, script: BootstrapScript) {
        let mut state = self.state.lock().unwrap();
        let address = format!("10.0.0.{}", state.envs.len() + 10);
        state.envs.insert(
            name.to_string(),
            FakeEnv {
                running: true,
                address,
                script,
                probes: 0,
            },
        );
    }

    /// Bootstrap behaviour for an environment created later through `create`.
    pub fn script(&self, name: &str, script: BootstrapScript) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(name.to_string(), script);
    }

    pub fn set_running(&self, name: &str, running: bool) {
        if let Some(env) = self.state.lock().unwrap().envs.get_mut(name) {
            env.running = running;
        }
    }

    pub fn reject_create(&self, name: &str) {
        self.state.lock().unwrap().rejected.push(name.to_string());
    }

    /// Make every command starting with `prefix` exit with `code`.
    pub fn fail_command(&self, prefix: &str, code: i32, output: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((prefix.to_string(), Injected::Exit(code, output.to_string())));
    }

    /// Make every command starting with `prefix` hit the exec deadline.
    pub fn time_out_command(&self, prefix: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((prefix.to_string(), Injected::Timeout));
    }

    pub fn update_cluster(&self, f: impl FnOnce(&mut FakeCluster)) {
        f(&mut self.state.lock().unwrap().cluster);
    }

    pub fn cluster(&self) -> FakeCluster {
        self.state.lock().unwrap().cluster.clone()
    }

    pub fn pool_names(&self) -> Vec<String> {
        self.cluster().pools.keys().cloned().collect()
    }

    pub fn has_environment(&self, name: &str) -> bool {
        self.state.lock().unwrap().envs.contains_key(name)
    }

    /// Every command run so far, as `(environment, command line)`.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Commands only, in order.
    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, c)| c).collect()
    }

    pub fn count_calls(&self, env: &str, command: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(e, c)| e == env && c == command)
            .count()
    }

    pub fn position(&self, command: &str) -> Option<usize> {
        self.commands().iter().position(|c| c == command)
    }
}

fn failed(line: &str, code: i32, output: impl Into<String>) -> Result<ExecOutput> {
    Err(Error::CommandFailed {
        command: line.to_string(),
        code,
        output: output.into(),
    })
}

fn ok(stdout: impl Into<String>) -> Result<ExecOutput> {
    Ok(ExecOutput {
        stdout: stdout.into(),
        code: 0,
    })
}

fn bootstrap_probe(env: &mut FakeEnv, line: &str) -> Result<ExecOutput> {
    env.probes += 1;
    match env.script {
        BootstrapScript::DoneAfter(n) if env.probes >= n => ok("status: done\n"),
        BootstrapScript::DoneWithExit(code) => failed(line, code, "status: done\n"),
        BootstrapScript::Error => failed(line, 1, "status: error\n"),
        _ => ok("status: running\n"),
    }
}

fn ceph(cluster: &mut FakeCluster, args: &[&str], line: &str) -> Result<ExecOutput> {
    let enoent = |what: &str| failed(line, 2, format!("Error ENOENT: {what} does not exist"));

    match args {
        ["ceph", "health"] => ok(format!("{}\n", cluster.health)),
        ["ceph", "mon", "stat", "--format", "json"] => {
            let quorum: Vec<_> = (0..cluster.mons)
                .map(|i| json!({"rank": i, "name": format!("mon{i}")}))
                .collect();
            ok(json!({"num_mons": cluster.mons, "quorum": quorum}).to_string())
        }
        ["ceph", "mgr", "stat", "--format", "json"] => ok(json!({
            "available": cluster.mgr_available,
            "active_name": if cluster.mgr_available { "mgr0" } else { "" },
        })
        .to_string()),
        ["ceph", "osd", "stat", "--format", "json"] => ok(json!({
            "num_osds": cluster.osds,
            "num_up_osds": cluster.osds_up,
            "num_in_osds": cluster.osds,
        })
        .to_string()),
        ["ceph", "osd", "tree"] => ok(format!(
            "ID  CLASS  WEIGHT  TYPE NAME\n-1  {} osds\n",
            cluster.osds
        )),
        ["ceph", "osd", "df"] => ok("ID  CLASS  WEIGHT  SIZE  USE  AVAIL\n"),
        ["ceph", "osd", "pool", "ls"] => ok(cluster
            .pools
            .keys()
            .map(|p| format!("{p}\n"))
            .collect::<String>()),
        ["ceph", "osd", "pool", "ls", "detail"] => ok(cluster
            .pools
            .iter()
            .map(|(name, p)| format!("pool '{name}' size {} pg_num {}\n", p.size, p.pg_num))
            .collect::<String>()),
        ["ceph", "osd", "pool", "ls", "detail", "--format", "json"] => {
            let pools: Vec<_> = cluster
                .pools
                .iter()
                .map(|(name, p)| {
                    let mut apps = serde_json::Map::new();
                    if let Some(app) = &p.application {
                        apps.insert(app.clone(), json!({}));
                    }
                    json!({
                        "pool_name": name,
                        "size": p.size,
                        "pg_num": p.pg_num,
                        "pg_autoscale_mode": if p.autoscale { "on" } else { "off" },
                        "erasure_code_profile": p.erasure_profile.clone().unwrap_or_default(),
                        "application_metadata": apps,
                    })
                })
                .collect();
            ok(serde_json::Value::Array(pools).to_string())
        }
        ["ceph", "df", "--format", "json"] => {
            let pools: Vec<_> = cluster
                .pools
                .keys()
                .map(|name| {
                    json!({
                        "name": name,
                        "stats": {"stored": 1024, "max_avail": 1_048_576, "percent_used": 0.1},
                    })
                })
                .collect();
            ok(json!({"pools": pools}).to_string())
        }
        ["ceph", "fs", "ls", "--format", "json"] => {
            let fs: Vec<_> = cluster
                .filesystems
                .iter()
                .map(|(n, m, d)| json!({"name": n, "metadata_pool": m, "data_pools": [d]}))
                .collect();
            ok(serde_json::Value::Array(fs).to_string())
        }
        ["ceph", "fs", "new", fs, meta, data] => {
            for pool in [meta, data] {
                if !cluster.pools.contains_key(*pool) {
                    return enoent(&format!("pool '{pool}'"));
                }
            }
            cluster
                .filesystems
                .push((fs.to_string(), meta.to_string(), data.to_string()));
            ok(format!("new fs with metadata pool {meta} and data pool {data}\n"))
        }
        ["ceph", "service", "dump", "--format", "json"] => {
            let daemons = |names: &[String]| {
                let mut map = serde_json::Map::new();
                map.insert("summary".into(), json!(""));
                for n in names {
                    map.insert(n.clone(), json!({}));
                }
                json!({ "daemons": map })
            };
            ok(json!({"services": {
                "rgw": daemons(&cluster.rgw_daemons),
                "tcmu-runner": daemons(&cluster.iscsi_daemons),
            }})
            .to_string())
        }
        ["ceph", "mgr", "module", "ls", "--format", "json"] => {
            let mut enabled = vec!["iostat", "restful"];
            if cluster.dashboard {
                enabled.push("dashboard");
            }
            ok(json!({"enabled_modules": enabled}).to_string())
        }
        ["ceph", "mgr", "services", "--format", "json"] => {
            if cluster.dashboard {
                ok(json!({"dashboard": "https://10.0.0.10:8443/"}).to_string())
            } else {
                ok("{}")
            }
        }
        ["ceph", "osd", "pool", "create", name, pg, rest @ ..] => {
            if cluster.pools.contains_key(*name) {
                return ok(format!("pool '{name}' already exists\n"));
            }
            let pg_num: u32 = pg.parse().unwrap_or(0);
            let erasure_profile = match rest {
                [_, "erasure", profile] => {
                    if !cluster.erasure_profiles.contains_key(*profile) {
                        return enoent(&format!("erasure-code-profile '{profile}'"));
                    }
                    Some(profile.to_string())
                }
                _ => None,
            };
            cluster.pools.insert(
                name.to_string(),
                FakePool {
                    size: 3,
                    pg_num,
                    application: None,
                    erasure_profile,
                    autoscale: false,
                },
            );
            ok(format!("pool '{name}' created\n"))
        }
        ["ceph", "osd", "pool", "set", name, key, value] => {
            let Some(pool) = cluster.pools.get_mut(*name) else {
                return enoent(&format!("pool '{name}'"));
            };
            match *key {
                "size" => pool.size = value.parse().unwrap_or(pool.size),
                "pg_num" => pool.pg_num = value.parse().unwrap_or(pool.pg_num),
                "pg_autoscale_mode" => pool.autoscale = *value == "on",
                other => return failed(line, 22, format!("Error EINVAL: unknown key {other}")),
            }
            ok(format!("set pool {name} {key} to {value}\n"))
        }
        ["ceph", "osd", "pool", "application", "enable", name, app] => {
            let Some(pool) = cluster.pools.get_mut(*name) else {
                return enoent(&format!("pool '{name}'"));
            };
            pool.application = Some(app.to_string());
            ok(format!("enabled application '{app}' on pool '{name}'\n"))
        }
        ["ceph", "osd", "erasure-code-profile", "set", profile, params @ ..] => {
            cluster
                .erasure_profiles
                .insert(profile.to_string(), params.join(" "));
            ok("")
        }
        ["ceph", "orch", "apply", "rgw", service, ..] => {
            let daemon = format!("rgw.{service}");
            if !cluster.rgw_daemons.contains(&daemon) {
                cluster.rgw_daemons.push(daemon);
            }
            ok(format!("Scheduled rgw.{service} update...\n"))
        }
        ["ceph", "config", "set", "mon", "mon_allow_pool_delete", "true"] => {
            cluster.allow_pool_delete = true;
            ok("")
        }
        ["ceph", "osd", "pool", "delete", name, again, "--yes-i-really-really-mean-it"] => {
            if name != again {
                return failed(line, 1, "Error EPERM: pool names do not match");
            }
            if !cluster.allow_pool_delete {
                return failed(line, 1, "Error EPERM: pool deletion is disabled");
            }
            if cluster.pools.remove(*name).is_none() {
                return ok(format!("pool '{name}' does not exist\n"));
            }
            ok(format!("pool '{name}' removed\n"))
        }
        _ => failed(line, 127, format!("fake runtime: unknown command `{line}`")),
    }
}

#[async_trait]
impl EnvironmentRuntime for FakeRuntime {
    async fn create(&self, spec: &EnvironmentSpec) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.envs.contains_key(&spec.name) {
            return Err(Error::AlreadyExists(spec.name.clone()));
        }
        if state.rejected.contains(&spec.name) {
            return Err(Error::CreationRejected {
                name: spec.name.clone(),
                reason: "quota exceeded".into(),
            });
        }
        let script = state
            .scripts
            .get(&spec.name)
            .copied()
            .unwrap_or(BootstrapScript::DoneAfter(1));
        let address = format!("10.0.0.{}", state.envs.len() + 10);
        state.envs.insert(
            spec.name.clone(),
            FakeEnv {
                running: true,
                address,
                script,
                probes: 0,
            },
        );
        Ok(())
    }

    async fn exec(&self, name: &str, command: &[String]) -> Result<ExecOutput> {
        let line = command.join(" ");
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        match state.envs.get(name) {
            Some(env) if env.running => {}
            _ => return Err(Error::EnvironmentNotRunning(name.to_string())),
        }
        state.calls.push((name.to_string(), line.clone()));

        let injected = state
            .failures
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()));
        match injected {
            Some((_, Injected::Exit(code, output))) => {
                return failed(&line, *code, output.clone())
            }
            Some((_, Injected::Timeout)) => {
                return Err(Error::ExecTimeout {
                    command: line,
                    timeout: Duration::from_secs(60),
                })
            }
            None => {}
        }

        let args: Vec<&str> = command.iter().map(String::as_str).collect();
        let cluster = &mut state.cluster;

        match args.as_slice() {
            ["cloud-init", "status"] => match state.envs.get_mut(name) {
                Some(env) => bootstrap_probe(env, &line),
                None => Err(Error::EnvironmentNotRunning(name.to_string())),
            },
            ["sh", "-c", "command -v ceph"] => {
                if cluster.installed {
                    ok("/usr/bin/ceph\n")
                } else {
                    failed(&line, 1, "")
                }
            }
            ["nproc"] => ok(format!("{}\n", cluster.cpus)),
            ["free", "-b"] => ok(format!(
                "              total        used        free\nMem:    {}  0  {}\n",
                cluster.memory_bytes, cluster.memory_bytes
            )),
            _ if !cluster.installed => failed(&line, 127, "sh: 1: ceph: not found"),
            ["rbd", "ls", "-p", pool] => {
                if cluster.pools.contains_key(*pool) {
                    ok("")
                } else {
                    failed(&line, 2, format!("rbd: error opening pool '{pool}'"))
                }
            }
            ["radosgw-admin", "user", "list"] => {
                ok(serde_json::to_string(&cluster.rgw_users).unwrap_or_default())
            }
            _ => ceph(cluster, &args, &line),
        }
    }

    async fn list(&self, prefix: &str) -> Vec<EnvironmentDescriptor> {
        self.state
            .lock()
            .unwrap()
            .envs
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, env)| EnvironmentDescriptor {
                name: name.clone(),
                state: if env.running {
                    EnvState::Running
                } else {
                    EnvState::Stopped
                },
                address: Some(env.address.clone()),
            })
            .collect()
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.state.lock().unwrap().envs.remove(name);
        Ok(())
    }
}
