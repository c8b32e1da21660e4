//! Health validator: runs a fixed battery of probes against the primary
//! environment and folds the results into one report.
//!
//! Probes run concurrently but results are always reported in check order.
//! A failing probe degrades its own check and never aborts the run.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ceph;
use crate::error::Error;
use crate::runtime::EnvironmentRuntime;
use crate::topology::Topology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Skipped,
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    /// Worst of the given statuses. Skipped results do not count; an empty
    /// input is a pass.
    pub fn worst<I: IntoIterator<Item = CheckStatus>>(statuses: I) -> CheckStatus {
        statuses
            .into_iter()
            .filter(|s| *s != CheckStatus::Skipped)
            .max()
            .unwrap_or(CheckStatus::Pass)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Skipped => write!(f, "skipped"),
            CheckStatus::Pass => write!(f, "pass"),
            CheckStatus::Warn => write!(f, "warn"),
            CheckStatus::Fail => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCheck {
    Installation,
    HealthStatus,
    ConsensusMembers,
    Manager,
    DataNodes,
    Pools,
    Filesystem,
    BlockStorage,
    BlockGateway,
    ObjectGateway,
    Dashboard,
    HostResources,
}

impl HealthCheck {
    pub const ALL: [HealthCheck; 12] = [
        HealthCheck::Installation,
        HealthCheck::HealthStatus,
        HealthCheck::ConsensusMembers,
        HealthCheck::Manager,
        HealthCheck::DataNodes,
        HealthCheck::Pools,
        HealthCheck::Filesystem,
        HealthCheck::BlockStorage,
        HealthCheck::BlockGateway,
        HealthCheck::ObjectGateway,
        HealthCheck::Dashboard,
        HealthCheck::HostResources,
    ];

    pub fn title(self) -> &'static str {
        match self {
            HealthCheck::Installation => "Ceph installation",
            HealthCheck::HealthStatus => "Cluster health",
            HealthCheck::ConsensusMembers => "Monitors",
            HealthCheck::Manager => "Manager",
            HealthCheck::DataNodes => "OSDs",
            HealthCheck::Pools => "Pools",
            HealthCheck::Filesystem => "CephFS",
            HealthCheck::BlockStorage => "RBD",
            HealthCheck::BlockGateway => "iSCSI gateway",
            HealthCheck::ObjectGateway => "Object gateway",
            HealthCheck::Dashboard => "Dashboard",
            HealthCheck::HostResources => "Host resources",
        }
    }

    /// Without these the cluster does not exist in any useful sense.
    pub fn is_foundational(self) -> bool {
        matches!(
            self,
            HealthCheck::Installation
                | HealthCheck::ConsensusMembers
                | HealthCheck::Manager
                | HealthCheck::DataNodes
        )
    }

    /// Whether the result feeds the overall status.
    pub fn is_aggregated(self) -> bool {
        self != HealthCheck::HostResources
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub check: HealthCheck,
    pub status: CheckStatus,
    pub detail: String,
    pub metric: Option<u64>,
}

impl HealthCheckResult {
    fn new(check: HealthCheck, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            check,
            status,
            detail: detail.into(),
            metric: None,
        }
    }

    fn with_metric(mut self, metric: u64) -> Self {
        self.metric = Some(metric);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Endpoints {
    pub dashboard: Option<String>,
    #[serde(rename = "objectGateway")]
    pub object_gateway: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopologySummary {
    pub node_count: usize,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterHealthReport {
    pub environment: String,
    pub address: Option<String>,
    pub results: Vec<HealthCheckResult>,
    pub overall: CheckStatus,
    pub topology: TopologySummary,
    pub endpoints: Endpoints,
    pub timestamp: DateTime<Utc>,
}

impl ClusterHealthReport {
    pub fn result(&self, check: HealthCheck) -> Option<&HealthCheckResult> {
        self.results.iter().find(|r| r.check == check)
    }

    pub fn status_of(&self, check: HealthCheck) -> Option<CheckStatus> {
        self.result(check).map(|r| r.status)
    }

    fn metric_of(&self, check: HealthCheck) -> u64 {
        self.result(check).and_then(|r| r.metric).unwrap_or(0)
    }

    /// True if any foundational check failed.
    pub fn foundational_failure(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.check.is_foundational() && r.status == CheckStatus::Fail)
    }

    /// The single-record machine-readable summary.
    pub fn record(&self) -> ValidationRecord {
        ValidationRecord {
            environment: self.environment.clone(),
            address: self.address.clone(),
            health_status: self.overall,
            consensus_member_count: self.metric_of(HealthCheck::ConsensusMembers),
            data_node_count: self.metric_of(HealthCheck::DataNodes),
            pool_count: self.metric_of(HealthCheck::Pools),
            endpoints: self.endpoints.clone(),
            timestamp_utc: self.timestamp.to_rfc3339(),
        }
    }
}

/// Overall status across aggregated checks.
pub fn aggregate(results: &[HealthCheckResult]) -> CheckStatus {
    CheckStatus::worst(
        results
            .iter()
            .filter(|r| r.check.is_aggregated())
            .map(|r| r.status),
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub environment: String,
    pub address: Option<String>,
    pub health_status: CheckStatus,
    pub consensus_member_count: u64,
    pub data_node_count: u64,
    pub pool_count: u64,
    pub endpoints: Endpoints,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: String,
}

pub struct HealthValidator {
    runtime: Arc<dyn EnvironmentRuntime>,
    prefix: String,
    gateway_port: u16,
}

impl HealthValidator {
    pub fn new(runtime: Arc<dyn EnvironmentRuntime>, prefix: &str, gateway_port: u16) -> Self {
        Self {
            runtime,
            prefix: prefix.to_string(),
            gateway_port,
        }
    }

    pub async fn validate(&self, primary: &str, detailed: bool) -> ClusterHealthReport {
        info!(target_env = primary, detailed, "validating cluster health");

        let topology = Topology::discover(self.runtime.as_ref(), &self.prefix).await;
        let address = match topology.get(primary) {
            Some(node) => node.address.clone(),
            None => self
                .runtime
                .list(primary)
                .await
                .into_iter()
                .find(|d| d.name == primary)
                .and_then(|d| d.address),
        };

        let probe = Prober {
            runtime: self.runtime.as_ref(),
            env: primary,
            detailed,
        };

        let (installation, health, mons, mgr, osds, pools, fs, rbd, iscsi, rgw, dashboard, host) =
            tokio::join!(
                probe.installation(),
                probe.health_status(),
                probe.consensus_members(),
                probe.manager(),
                probe.data_nodes(),
                probe.pools(),
                probe.filesystem(),
                probe.block_storage(),
                probe.block_gateway(),
                probe.object_gateway(),
                probe.dashboard(),
                probe.host_resources(),
            );
        let results = vec![
            installation, health, mons, mgr, osds, pools, fs, rbd, iscsi, rgw, dashboard, host,
        ];
        debug_assert!(results.iter().map(|r| r.check).eq(HealthCheck::ALL));
        let overall = aggregate(&results);

        for r in &results {
            match r.status {
                CheckStatus::Fail => warn!(
                    check = r.check.title(),
                    detail = %first_line(&r.detail),
                    "health check failed"
                ),
                CheckStatus::Warn => debug!(
                    check = r.check.title(),
                    detail = %first_line(&r.detail),
                    "health check warning"
                ),
                _ => {}
            }
        }

        let endpoints = self
            .discover_endpoints(&probe, &results, address.as_deref())
            .await;

        info!(target_env = primary, overall = %overall, "health validation finished");

        ClusterHealthReport {
            environment: primary.to_string(),
            address,
            results,
            overall,
            topology: TopologySummary {
                node_count: topology.nodes.len(),
                addresses: topology.addresses(),
            },
            endpoints,
            timestamp: Utc::now(),
        }
    }

    async fn discover_endpoints(
        &self,
        probe: &Prober<'_>,
        results: &[HealthCheckResult],
        address: Option<&str>,
    ) -> Endpoints {
        let passed = |check| {
            results
                .iter()
                .any(|r| r.check == check && r.status == CheckStatus::Pass)
        };

        let dashboard = if passed(HealthCheck::Dashboard) {
            probe
                .run(&ceph::mgr_services())
                .await
                .ok()
                .and_then(|out| ceph::parse_dashboard_url(&out))
        } else {
            None
        };

        let object_gateway = match address {
            Some(addr) if passed(HealthCheck::ObjectGateway) => {
                Some(format!("http://{}:{}", addr, self.gateway_port))
            }
            _ => None,
        };

        Endpoints {
            dashboard,
            object_gateway,
        }
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

/// Runs probe commands for one validation pass.
struct Prober<'a> {
    runtime: &'a dyn EnvironmentRuntime,
    env: &'a str,
    detailed: bool,
}

impl Prober<'_> {
    async fn run(&self, command: &[String]) -> Result<String, Error> {
        self.runtime
            .exec(self.env, command)
            .await
            .map(|out| out.stdout)
    }

    /// Append verbatim probe output to a summary when running detailed.
    fn detail(&self, summary: String, outputs: &[(&[String], &str)]) -> String {
        if !self.detailed {
            return summary;
        }
        let mut detail = summary;
        for (command, output) in outputs {
            detail.push_str(&format!("\n$ {}\n{}", command.join(" "), output.trim_end()));
        }
        detail
    }

    fn error_detail(&self, summary: &str, command: &[String], err: &Error) -> String {
        let output = err.captured_output().unwrap_or("");
        self.detail(format!("{summary}: {err}"), &[(command, output)])
    }

    async fn installation(&self) -> HealthCheckResult {
        let check = HealthCheck::Installation;
        let cmd = ceph::installed();
        match self.run(&cmd).await {
            Ok(out) => HealthCheckResult::new(
                check,
                CheckStatus::Pass,
                self.detail(format!("ceph CLI at {}", out.trim()), &[(&cmd[..], &out[..])]),
            ),
            Err(e) => HealthCheckResult::new(
                check,
                CheckStatus::Fail,
                self.error_detail("ceph CLI not found", &cmd, &e),
            ),
        }
    }

    async fn health_status(&self) -> HealthCheckResult {
        let check = HealthCheck::HealthStatus;
        let cmd = ceph::health();
        match self.run(&cmd).await {
            Ok(out) => {
                let summary = out.trim().to_string();
                let status = if summary.starts_with("HEALTH_OK") {
                    CheckStatus::Pass
                } else if summary.starts_with("HEALTH_WARN") {
                    CheckStatus::Warn
                } else {
                    CheckStatus::Fail
                };
                let headline = first_line(&summary).to_string();
                let detail = self.detail(headline, &[(&cmd[..], &out[..])]);
                HealthCheckResult::new(check, status, detail)
            }
            Err(e) => HealthCheckResult::new(
                check,
                CheckStatus::Fail,
                self.error_detail("cluster unreachable", &cmd, &e),
            ),
        }
    }

    async fn consensus_members(&self) -> HealthCheckResult {
        let check = HealthCheck::ConsensusMembers;
        let cmd = ceph::mon_stat();
        let out = match self.run(&cmd).await {
            Ok(out) => out,
            Err(e) => {
                return HealthCheckResult::new(
                    check,
                    CheckStatus::Fail,
                    self.error_detail("monitors unreachable", &cmd, &e),
                )
            }
        };
        match ceph::parse_json::<ceph::MonStat>(&cmd[..], &out[..]) {
            Ok(stat) if stat.reachable() > 0 => HealthCheckResult::new(
                check,
                CheckStatus::Pass,
                self.detail(
                    format!("{} in quorum ({} in map)", stat.reachable(), stat.num_mons),
                    &[(&cmd[..], &out[..])],
                ),
            )
            .with_metric(stat.reachable() as u64),
            Ok(_) => HealthCheckResult::new(
                check,
                CheckStatus::Fail,
                self.detail("no monitors reachable".into(), &[(&cmd[..], &out[..])]),
            )
            .with_metric(0),
            Err(e) => HealthCheckResult::new(
                check,
                CheckStatus::Fail,
                self.error_detail("monitor status unreadable", &cmd, &e),
            ),
        }
    }

    async fn manager(&self) -> HealthCheckResult {
        let check = HealthCheck::Manager;
        let cmd = ceph::mgr_stat();
        let out = match self.run(&cmd).await {
            Ok(out) => out,
            Err(e) => {
                return HealthCheckResult::new(
                    check,
                    CheckStatus::Fail,
                    self.error_detail("manager unreachable", &cmd, &e),
                )
            }
        };
        match ceph::parse_json::<ceph::MgrStat>(&cmd[..], &out[..]) {
            Ok(stat) if stat.available => HealthCheckResult::new(
                check,
                CheckStatus::Pass,
                self.detail(format!("active: {}", stat.active_name), &[(&cmd[..], &out[..])]),
            ),
            Ok(_) => HealthCheckResult::new(
                check,
                CheckStatus::Fail,
                self.detail("no active manager".into(), &[(&cmd[..], &out[..])]),
            ),
            Err(e) => HealthCheckResult::new(
                check,
                CheckStatus::Fail,
                self.error_detail("manager status unreadable", &cmd, &e),
            ),
        }
    }

    async fn data_nodes(&self) -> HealthCheckResult {
        let check = HealthCheck::DataNodes;
        let cmd = ceph::osd_stat();
        let out = match self.run(&cmd).await {
            Ok(out) => out,
            Err(e) => {
                return HealthCheckResult::new(
                    check,
                    CheckStatus::Fail,
                    self.error_detail("OSD count unavailable", &cmd, &e),
                )
            }
        };
        let stat = match ceph::parse_json::<ceph::OsdStat>(&cmd[..], &out[..]) {
            Ok(stat) => stat,
            Err(e) => {
                return HealthCheckResult::new(
                    check,
                    CheckStatus::Fail,
                    self.error_detail("OSD status unreadable", &cmd, &e),
                )
            }
        };

        let status = if stat.num_osds == 0 {
            CheckStatus::Fail
        } else if stat.num_up_osds < stat.num_osds {
            CheckStatus::Warn
        } else {
            CheckStatus::Pass
        };
        let summary = format!(
            "{} OSDs, {} up, {} in",
            stat.num_osds, stat.num_up_osds, stat.num_in_osds
        );

        let detail = if self.detailed {
            let tree_cmd = ceph::osd_tree();
            let df_cmd = ceph::osd_df();
            let (tree, df) = tokio::join!(self.run(&tree_cmd), self.run(&df_cmd));
            let tree = tree.unwrap_or_else(|e| e.to_string());
            let df = df.unwrap_or_else(|e| e.to_string());
            self.detail(
                summary,
                &[
                    (&cmd[..], &out[..]),
                    (&tree_cmd[..], &tree[..]),
                    (&df_cmd[..], &df[..]),
                ],
            )
        } else {
            summary
        };

        HealthCheckResult::new(check, status, detail).with_metric(stat.num_osds as u64)
    }

    async fn pools(&self) -> HealthCheckResult {
        let check = HealthCheck::Pools;
        let cmd = ceph::pool_ls();
        let out = match self.run(&cmd).await {
            Ok(out) => out,
            Err(e) => {
                return HealthCheckResult::new(
                    check,
                    CheckStatus::Warn,
                    self.error_detail("pool list unavailable", &cmd, &e),
                )
            }
        };
        let names = ceph::parse_lines(&out);
        let count = names.len() as u64;

        if names.is_empty() {
            return HealthCheckResult::new(
                check,
                CheckStatus::Warn,
                self.detail("no pools configured".into(), &[(&cmd[..], &out[..])]),
            )
            .with_metric(0);
        }

        let summary = format!("{} pools: {}", count, names.join(", "));
        let detail = if self.detailed {
            let detail_cmd = ceph::pool_ls_detail();
            let listing = self
                .run(&detail_cmd)
                .await
                .unwrap_or_else(|e| e.to_string());
            self.detail(
                summary,
                &[(&cmd[..], &out[..]), (&detail_cmd[..], &listing[..])],
            )
        } else {
            summary
        };
        HealthCheckResult::new(check, CheckStatus::Pass, detail).with_metric(count)
    }

    async fn filesystem(&self) -> HealthCheckResult {
        let check = HealthCheck::Filesystem;
        let cmd = ceph::fs_ls();
        let parsed = match self.run(&cmd).await {
            Ok(out) => {
                ceph::parse_json::<Vec<ceph::FsEntry>>(&cmd[..], &out[..]).map(|fs| (fs, out))
            }
            Err(e) => Err(e),
        };
        match parsed {
            Ok((fs, out)) if !fs.is_empty() => {
                let names: Vec<String> = fs
                    .iter()
                    .map(|f| {
                        format!(
                            "{} (metadata {}, data {})",
                            f.name,
                            f.metadata_pool,
                            f.data_pools.join("+")
                        )
                    })
                    .collect();
                HealthCheckResult::new(
                    check,
                    CheckStatus::Pass,
                    self.detail(names.join(", "), &[(&cmd[..], &out[..])]),
                )
                .with_metric(fs.len() as u64)
            }
            Ok((_, out)) => HealthCheckResult::new(
                check,
                CheckStatus::Warn,
                self.detail("no filesystem configured".into(), &[(&cmd[..], &out[..])]),
            )
            .with_metric(0),
            Err(e) => HealthCheckResult::new(
                check,
                CheckStatus::Warn,
                self.error_detail("filesystem status unavailable", &cmd, &e),
            ),
        }
    }

    async fn block_storage(&self) -> HealthCheckResult {
        let check = HealthCheck::BlockStorage;
        let cmd = ceph::pool_ls_detail_json();
        let parsed = match self.run(&cmd).await {
            Ok(out) => {
                ceph::parse_json::<Vec<ceph::PoolDetail>>(&cmd[..], &out[..]).map(|p| (p, out))
            }
            Err(e) => Err(e),
        };
        let (pools, pools_out) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                return HealthCheckResult::new(
                    check,
                    CheckStatus::Warn,
                    self.error_detail("block pools unavailable", &cmd, &e),
                )
            }
        };

        let rbd_pools: Vec<&ceph::PoolDetail> = pools
            .iter()
            .filter(|p| p.application() == Some("rbd"))
            .collect();
        if rbd_pools.is_empty() {
            return HealthCheckResult::new(
                check,
                CheckStatus::Warn,
                self.detail("no RBD pools".into(), &[(&cmd[..], &pools_out[..])]),
            )
            .with_metric(0);
        }

        let mut parts = Vec::new();
        let mut outputs = vec![(cmd.clone(), pools_out)];
        for pool in &rbd_pools {
            let ls = ceph::rbd_ls(&pool.pool_name);
            match self.run(&ls).await {
                Ok(out) => {
                    let images = ceph::parse_lines(&out).len();
                    parts.push(format!("{} ({} images)", pool.pool_name, images));
                    outputs.push((ls, out));
                }
                Err(e) => {
                    parts.push(format!("{} (images unavailable)", pool.pool_name));
                    outputs.push((ls, e.to_string()));
                }
            }
        }
        let listed: Vec<(&[String], &str)> = outputs
            .iter()
            .map(|(c, o)| (c.as_slice(), o.as_str()))
            .collect();

        HealthCheckResult::new(check, CheckStatus::Pass, self.detail(parts.join(", "), &listed))
            .with_metric(rbd_pools.len() as u64)
    }

    async fn service_daemons(&self, kinds: &[&str]) -> Result<(Vec<String>, String), Error> {
        let cmd = ceph::service_dump();
        let out = self.run(&cmd).await?;
        let map: ceph::ServiceMap = ceph::parse_json(&cmd[..], &out[..])?;
        Ok((map.daemons(kinds), out))
    }

    async fn block_gateway(&self) -> HealthCheckResult {
        let check = HealthCheck::BlockGateway;
        let cmd = ceph::service_dump();
        match self.service_daemons(&["iscsi", "tcmu-runner"]).await {
            Ok((daemons, out)) if !daemons.is_empty() => HealthCheckResult::new(
                check,
                CheckStatus::Pass,
                self.detail(format!("gateways: {}", daemons.join(", ")), &[(&cmd[..], &out[..])]),
            )
            .with_metric(daemons.len() as u64),
            Ok(_) => HealthCheckResult::new(check, CheckStatus::Warn, "no iSCSI gateway registered")
                .with_metric(0),
            Err(e) => HealthCheckResult::new(
                check,
                CheckStatus::Warn,
                self.error_detail("service map unavailable", &cmd, &e),
            ),
        }
    }

    async fn object_gateway(&self) -> HealthCheckResult {
        let check = HealthCheck::ObjectGateway;
        let cmd = ceph::service_dump();
        let daemons = match self.service_daemons(&["rgw"]).await {
            Ok((daemons, _)) if !daemons.is_empty() => daemons,
            Ok(_) => {
                return HealthCheckResult::new(
                    check,
                    CheckStatus::Warn,
                    "no object gateway registered",
                )
            }
            Err(e) => {
                return HealthCheckResult::new(
                    check,
                    CheckStatus::Warn,
                    self.error_detail("service map unavailable", &cmd, &e),
                )
            }
        };

        let users_cmd = ceph::rgw_users();
        let users = match self.run(&users_cmd).await {
            Ok(out) => ceph::parse_json::<Vec<String>>(&users_cmd[..], &out[..]).map(|u| (u, out)),
            Err(e) => Err(e),
        };
        match users {
            Ok((users, out)) => HealthCheckResult::new(
                check,
                CheckStatus::Pass,
                self.detail(
                    format!("gateways: {}; {} users", daemons.join(", "), users.len()),
                    &[(&users_cmd[..], &out[..])],
                ),
            )
            .with_metric(users.len() as u64),
            Err(e) => HealthCheckResult::new(
                check,
                CheckStatus::Pass,
                self.error_detail(
                    &format!("gateways: {}; user count unavailable", daemons.join(", ")),
                    &users_cmd,
                    &e,
                ),
            ),
        }
    }

    async fn dashboard(&self) -> HealthCheckResult {
        let check = HealthCheck::Dashboard;
        let cmd = ceph::mgr_modules();
        let parsed = match self.run(&cmd).await {
            Ok(out) => ceph::parse_json::<ceph::MgrModules>(&cmd[..], &out[..]).map(|m| (m, out)),
            Err(e) => Err(e),
        };
        match parsed {
            Ok((modules, out)) if modules.is_enabled("dashboard") => HealthCheckResult::new(
                check,
                CheckStatus::Pass,
                self.detail("dashboard module enabled".into(), &[(&cmd[..], &out[..])]),
            ),
            Ok((_, out)) => HealthCheckResult::new(
                check,
                CheckStatus::Warn,
                self.detail("dashboard module disabled".into(), &[(&cmd[..], &out[..])]),
            ),
            Err(e) => HealthCheckResult::new(
                check,
                CheckStatus::Warn,
                self.error_detail("module list unavailable", &cmd, &e),
            ),
        }
    }

    async fn host_resources(&self) -> HealthCheckResult {
        let check = HealthCheck::HostResources;
        let (nproc_cmd, free_cmd) = (ceph::nproc(), ceph::free());
        let (cpus, mem) = tokio::join!(self.run(&nproc_cmd), self.run(&free_cmd));

        let cpu_count = cpus.as_ref().ok().and_then(|o| o.trim().parse::<u64>().ok());
        let mem_total = mem.as_ref().ok().and_then(|o| ceph::parse_free_total(o));

        if cpu_count.is_none() && mem_total.is_none() {
            return HealthCheckResult::new(
                check,
                CheckStatus::Skipped,
                "host resources unavailable",
            );
        }

        let summary = format!(
            "{} CPUs, {} memory",
            cpu_count.map_or("?".to_string(), |c| c.to_string()),
            mem_total.map_or("?".to_string(), fmt_bytes)
        );
        let cpus = cpus.unwrap_or_else(|e| e.to_string());
        let mem = mem.unwrap_or_else(|e| e.to_string());
        let result = HealthCheckResult::new(
            check,
            CheckStatus::Pass,
            self.detail(summary, &[(&nproc_cmd[..], &cpus[..]), (&free_cmd[..], &mem[..])]),
        );
        match cpu_count {
            Some(c) => result.with_metric(c),
            None => result,
        }
    }
}

pub fn fmt_bytes(bytes: u64) -> String {
    if bytes >= 1_099_511_627_776 {
        format!("{:.1} TB", bytes as f64 / 1_099_511_627_776.0)
    } else if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
