//! Pool lifecycle: create, enumerate, resize, and remove Ceph pools, alone
//! or as named bundles.
//!
//! Creation is idempotent by name. Removal needs a typed confirmation token
//! and is irreversible once issued.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::bail;
use serde::Serialize;
use tracing::{info, warn};

use crate::ceph;
use crate::config::ErasureConfig;
use crate::error::{Error, Result};
use crate::health::CheckStatus;
use crate::runtime::EnvironmentRuntime;

/// The literal an operator must type before a pool is deleted.
pub const CONFIRMATION_LITERAL: &str = "yes";

pub const FILESYSTEM_NAME: &str = "cephfs";
const FILESYSTEM_METADATA_POOL: &str = "cephfs_metadata";
const FILESYSTEM_DATA_POOL: &str = "cephfs_data";
/// Service id of the gateway the object bundle deploys.
pub const OBJECT_GATEWAY_SERVICE: &str = "default";
const DEFAULT_GATEWAY_PORT: u16 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadClass {
    Block,
    FilesystemMetadata,
    FilesystemData,
    ObjectRoot,
    ObjectControl,
    ObjectIndex,
    ObjectData,
    Archival,
}

impl WorkloadClass {
    /// Ceph application tag applied to pools of this class.
    pub fn application(self) -> &'static str {
        match self {
            WorkloadClass::Block => "rbd",
            WorkloadClass::FilesystemMetadata | WorkloadClass::FilesystemData => "cephfs",
            WorkloadClass::ObjectRoot
            | WorkloadClass::ObjectControl
            | WorkloadClass::ObjectIndex
            | WorkloadClass::ObjectData
            | WorkloadClass::Archival => "rgw",
        }
    }

    pub fn is_erasure_coded(self) -> bool {
        self == WorkloadClass::Archival
    }

    /// Best guess at the class of an existing pool.
    fn infer(name: &str, application: Option<&str>, erasure: bool) -> Option<WorkloadClass> {
        if erasure {
            return Some(WorkloadClass::Archival);
        }
        if let Some(spec) = Bundle::ALL
            .iter()
            .flat_map(|b| b.pools())
            .find(|p| p.name == name)
        {
            return Some(spec.workload);
        }
        match application? {
            "rbd" => Some(WorkloadClass::Block),
            "cephfs" if name.contains("meta") => Some(WorkloadClass::FilesystemMetadata),
            "cephfs" => Some(WorkloadClass::FilesystemData),
            "rgw" if name.ends_with(".index") => Some(WorkloadClass::ObjectIndex),
            "rgw" if name.ends_with(".control") => Some(WorkloadClass::ObjectControl),
            "rgw" => Some(WorkloadClass::ObjectData),
            _ => None,
        }
    }
}

impl fmt::Display for WorkloadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkloadClass::Block => "block",
            WorkloadClass::FilesystemMetadata => "filesystem-metadata",
            WorkloadClass::FilesystemData => "filesystem-data",
            WorkloadClass::ObjectRoot => "object-root",
            WorkloadClass::ObjectControl => "object-control",
            WorkloadClass::ObjectIndex => "object-index",
            WorkloadClass::ObjectData => "object-data",
            WorkloadClass::Archival => "archival",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bundle {
    Block,
    Filesystem,
    Object,
    Archival,
}

impl Bundle {
    pub const ALL: [Bundle; 4] = [
        Bundle::Block,
        Bundle::Filesystem,
        Bundle::Object,
        Bundle::Archival,
    ];

    /// Pools in creation order.
    pub fn pools(self) -> &'static [PoolSpec] {
        match self {
            Bundle::Block => &[PoolSpec {
                name: "rbd",
                workload: WorkloadClass::Block,
            }],
            Bundle::Filesystem => &[
                PoolSpec {
                    name: FILESYSTEM_METADATA_POOL,
                    workload: WorkloadClass::FilesystemMetadata,
                },
                PoolSpec {
                    name: FILESYSTEM_DATA_POOL,
                    workload: WorkloadClass::FilesystemData,
                },
            ],
            Bundle::Object => &[
                PoolSpec {
                    name: ".rgw.root",
                    workload: WorkloadClass::ObjectRoot,
                },
                PoolSpec {
                    name: "default.rgw.control",
                    workload: WorkloadClass::ObjectControl,
                },
                PoolSpec {
                    name: "default.rgw.buckets.index",
                    workload: WorkloadClass::ObjectIndex,
                },
                PoolSpec {
                    name: "default.rgw.buckets.data",
                    workload: WorkloadClass::ObjectData,
                },
            ],
            Bundle::Archival => &[PoolSpec {
                name: "archive",
                workload: WorkloadClass::Archival,
            }],
        }
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bundle::Block => write!(f, "block"),
            Bundle::Filesystem => write!(f, "filesystem"),
            Bundle::Object => write!(f, "object"),
            Bundle::Archival => write!(f, "archival"),
        }
    }
}

/// A bundle request as typed on the command line: one bundle or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleType {
    One(Bundle),
    All,
}

impl BundleType {
    pub fn bundles(self) -> Vec<Bundle> {
        match self {
            BundleType::One(b) => vec![b],
            BundleType::All => Bundle::ALL.to_vec(),
        }
    }
}

impl FromStr for BundleType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "block" => Ok(BundleType::One(Bundle::Block)),
            "filesystem" | "fs" => Ok(BundleType::One(Bundle::Filesystem)),
            "object" => Ok(BundleType::One(Bundle::Object)),
            "archival" => Ok(BundleType::One(Bundle::Archival)),
            "all" => Ok(BundleType::All),
            other => bail!(
                "unknown bundle '{}' (expected block, filesystem, object, archival or all)",
                other
            ),
        }
    }
}

impl fmt::Display for BundleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleType::One(b) => write!(f, "{b}"),
            BundleType::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSpec {
    pub name: &'static str,
    pub workload: WorkloadClass,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolUsage {
    pub stored_bytes: u64,
    pub max_avail_bytes: u64,
    pub percent_used: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoragePool {
    pub name: String,
    pub workload: Option<WorkloadClass>,
    pub replica_size: u32,
    pub pg_count: u32,
    pub application: Option<String>,
    pub erasure_profile: Option<String>,
    pub autoscale: bool,
    pub usage: Option<PoolUsage>,
}

/// Operator-supplied confirmation for destructive actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationToken(String);

impl ConfirmationToken {
    pub fn new(typed: impl Into<String>) -> Self {
        Self(typed.into())
    }

    pub fn confirms(&self) -> bool {
        self.0 == CONFIRMATION_LITERAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Created,
    Existing,
    Skipped(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleStep {
    pub bundle: Bundle,
    pub target: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BundleReport {
    pub steps: Vec<BundleStep>,
    pub warnings: Vec<String>,
}

impl BundleReport {
    pub fn status(&self) -> CheckStatus {
        if self.warnings.is_empty() {
            CheckStatus::Pass
        } else {
            CheckStatus::Warn
        }
    }

    fn push(&mut self, bundle: Bundle, target: &str, outcome: StepOutcome) {
        self.steps.push(BundleStep {
            bundle,
            target: target.to_string(),
            outcome,
        });
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoscaleSummary {
    pub enabled: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct PoolManager {
    runtime: Arc<dyn EnvironmentRuntime>,
    target: String,
    erasure: ErasureConfig,
    gateway_port: u16,
    delete_guard_disabled: AtomicBool,
}

impl PoolManager {
    pub fn new(runtime: Arc<dyn EnvironmentRuntime>, target: &str, erasure: ErasureConfig) -> Self {
        Self {
            runtime,
            target: target.to_string(),
            erasure,
            gateway_port: DEFAULT_GATEWAY_PORT,
            delete_guard_disabled: AtomicBool::new(false),
        }
    }

    /// Port the object gateway listens on once the object bundle deploys it.
    pub fn with_gateway_port(mut self, port: u16) -> Self {
        self.gateway_port = port;
        self
    }

    async fn run(&self, command: &[String]) -> Result<String> {
        self.runtime
            .exec(&self.target, command)
            .await
            .map(|out| out.stdout)
    }

    pub async fn pool_names(&self) -> Result<Vec<String>> {
        Ok(ceph::parse_lines(&self.run(&ceph::pool_ls()).await?))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.pool_names().await?.iter().any(|p| p == name))
    }

    /// Create `name` unless it already exists. Existing pools are never touched.
    pub async fn create_pool(
        &self,
        name: &str,
        workload: WorkloadClass,
        replica_size: u32,
        pg_count: u32,
    ) -> Result<CreateOutcome> {
        positive(name, "replica size", replica_size)?;
        positive(name, "placement-group count", pg_count)?;
        if self.exists(name).await? {
            info!(pool = name, "pool already exists, leaving it unchanged");
            return Ok(CreateOutcome::AlreadyExists);
        }

        if workload.is_erasure_coded() {
            self.run(&ceph::pool_create_erasure(name, pg_count, &self.erasure.profile))
                .await?;
        } else {
            self.run(&ceph::pool_create(name, pg_count)).await?;
            self.run(&ceph::pool_set(name, "size", &replica_size.to_string()))
                .await?;
        }

        let app = workload.application();
        if let Err(e) = self.run(&ceph::pool_application_enable(name, app)).await {
            warn!(pool = name, application = app, error = %e, "could not tag pool");
        }

        info!(pool = name, workload = %workload, replica_size, pg_count, "pool created");
        Ok(CreateOutcome::Created)
    }

    /// Create every pool in `bundle_type`, in declared order.
    ///
    /// Stops at the first hard error. Pools created before it stay in place.
    pub async fn create_bundle(
        &self,
        bundle_type: BundleType,
        replica_size: u32,
        pg_count: u32,
    ) -> Result<BundleReport> {
        let label = format!("bundle {bundle_type}");
        positive(&label, "replica size", replica_size)?;
        positive(&label, "placement-group count", pg_count)?;

        let mut report = BundleReport::default();
        for bundle in bundle_type.bundles() {
            self.create_one_bundle(bundle, replica_size, pg_count, &mut report)
                .await?;
        }
        Ok(report)
    }

    async fn create_one_bundle(
        &self,
        bundle: Bundle,
        replica_size: u32,
        pg_count: u32,
        report: &mut BundleReport,
    ) -> Result<()> {
        info!(bundle = %bundle, "creating pool bundle");

        if bundle == Bundle::Archival {
            let osds = self.data_node_count().await?;
            let required = self.erasure.required_data_nodes();
            if osds < required {
                let reason = format!(
                    "archival bundle needs {} OSDs for k={} m={}, cluster has {}",
                    required, self.erasure.k, self.erasure.m, osds
                );
                warn!(bundle = %bundle, osds, required, "skipping bundle");
                for spec in bundle.pools() {
                    report.push(bundle, spec.name, StepOutcome::Skipped(reason.clone()));
                }
                report.warnings.push(reason);
                return Ok(());
            }
            self.run(&ceph::erasure_profile_set(
                &self.erasure.profile,
                self.erasure.k,
                self.erasure.m,
                &self.erasure.failure_domain,
            ))
            .await?;
            info!(
                profile = %self.erasure.profile,
                k = self.erasure.k,
                m = self.erasure.m,
                "erasure-code profile set"
            );
        }

        for spec in bundle.pools() {
            let outcome = match self
                .create_pool(spec.name, spec.workload, replica_size, pg_count)
                .await?
            {
                CreateOutcome::Created => StepOutcome::Created,
                CreateOutcome::AlreadyExists => StepOutcome::Existing,
            };
            report.push(bundle, spec.name, outcome);
        }

        match bundle {
            Bundle::Filesystem => {
                let outcome = self.ensure_filesystem().await?;
                report.push(bundle, FILESYSTEM_NAME, outcome);
            }
            Bundle::Object => {
                let outcome = self.ensure_object_gateway().await?;
                report.push(bundle, &format!("rgw.{OBJECT_GATEWAY_SERVICE}"), outcome);
            }
            Bundle::Block | Bundle::Archival => {}
        }
        Ok(())
    }

    /// Bring up the object gateway on top of its pools, once. Tenants and
    /// users are left to the operator.
    async fn ensure_object_gateway(&self) -> Result<StepOutcome> {
        let cmd = ceph::service_dump();
        let services: ceph::ServiceMap = ceph::parse_json(&cmd, &self.run(&cmd).await?)?;
        if !services.daemons(&["rgw"]).is_empty() {
            info!(service = OBJECT_GATEWAY_SERVICE, "object gateway already running");
            return Ok(StepOutcome::Existing);
        }

        let pools = self.pool_names().await?;
        for needed in Bundle::Object.pools() {
            if !pools.iter().any(|p| p == needed.name) {
                return Err(Error::DependencyUnavailable {
                    step: format!("object gateway {OBJECT_GATEWAY_SERVICE}"),
                    missing: format!("pool {}", needed.name),
                });
            }
        }

        self.run(&ceph::orch_apply_rgw(OBJECT_GATEWAY_SERVICE, self.gateway_port))
            .await?;
        info!(
            service = OBJECT_GATEWAY_SERVICE,
            port = self.gateway_port,
            "object gateway deployed"
        );
        Ok(StepOutcome::Created)
    }

    /// Bind the filesystem to its metadata and data pools, once.
    async fn ensure_filesystem(&self) -> Result<StepOutcome> {
        let cmd = ceph::fs_ls();
        let existing: Vec<ceph::FsEntry> = ceph::parse_json(&cmd, &self.run(&cmd).await?)?;
        if existing.iter().any(|fs| fs.name == FILESYSTEM_NAME) {
            info!(fs = FILESYSTEM_NAME, "filesystem already exists");
            return Ok(StepOutcome::Existing);
        }

        let pools = self.pool_names().await?;
        for needed in [FILESYSTEM_METADATA_POOL, FILESYSTEM_DATA_POOL] {
            if !pools.iter().any(|p| p == needed) {
                return Err(Error::DependencyUnavailable {
                    step: format!("filesystem {FILESYSTEM_NAME}"),
                    missing: format!("pool {needed}"),
                });
            }
        }

        self.run(&ceph::fs_new(
            FILESYSTEM_NAME,
            FILESYSTEM_METADATA_POOL,
            FILESYSTEM_DATA_POOL,
        ))
        .await?;
        info!(fs = FILESYSTEM_NAME, "filesystem created");
        Ok(StepOutcome::Created)
    }

    async fn data_node_count(&self) -> Result<u32> {
        let cmd = ceph::osd_stat();
        let stat: ceph::OsdStat = ceph::parse_json(&cmd, &self.run(&cmd).await?)?;
        Ok(stat.num_osds)
    }

    /// All pools with their settings and, when `ceph df` answers, usage.
    pub async fn list_pools(&self) -> Result<Vec<StoragePool>> {
        let cmd = ceph::pool_ls_detail_json();
        let details: Vec<ceph::PoolDetail> = ceph::parse_json(&cmd, &self.run(&cmd).await?)?;

        let df_cmd = ceph::df_json();
        let usage = match self.run(&df_cmd).await {
            Ok(out) => ceph::parse_json::<ceph::DfReport>(&df_cmd, &out)
                .map(|df| df.pools)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "could not parse pool usage");
                    Vec::new()
                }),
            Err(e) => {
                warn!(error = %e, "could not read pool usage");
                Vec::new()
            }
        };

        Ok(details
            .into_iter()
            .map(|d| {
                let usage = usage
                    .iter()
                    .find(|u| u.name == d.pool_name)
                    .map(|u| PoolUsage {
                        stored_bytes: u.stats.stored,
                        max_avail_bytes: u.stats.max_avail,
                        percent_used: u.stats.percent_used,
                    });
                StoragePool {
                    workload: WorkloadClass::infer(
                        &d.pool_name,
                        d.application(),
                        d.erasure_profile().is_some(),
                    ),
                    application: d.application().map(String::from),
                    erasure_profile: d.erasure_profile().map(String::from),
                    autoscale: d.pg_autoscale_mode == "on",
                    replica_size: d.size,
                    pg_count: d.pg_num,
                    name: d.pool_name,
                    usage,
                }
            })
            .collect())
    }

    /// Set replica size and/or placement-group count on an existing pool.
    pub async fn resize_pool(
        &self,
        name: &str,
        size: Option<u32>,
        pg_count: Option<u32>,
    ) -> Result<()> {
        if let Some(size) = size {
            positive(name, "replica size", size)?;
        }
        if let Some(pg) = pg_count {
            positive(name, "placement-group count", pg)?;
        }
        if !self.exists(name).await? {
            return Err(Error::DependencyUnavailable {
                step: "resize".into(),
                missing: format!("pool {name}"),
            });
        }
        if let Some(size) = size {
            self.run(&ceph::pool_set(name, "size", &size.to_string()))
                .await?;
        }
        if let Some(pg) = pg_count {
            self.run(&ceph::pool_set(name, "pg_num", &pg.to_string()))
                .await?;
        }
        info!(pool = name, ?size, ?pg_count, "pool resized");
        Ok(())
    }

    pub async fn set_autoscale(&self, name: &str, on: bool) -> Result<()> {
        let mode = if on { "on" } else { "off" };
        self.run(&ceph::pool_set(name, "pg_autoscale_mode", mode))
            .await
            .map(|_| ())
    }

    /// Turn on PG autoscaling for every pool. One pool failing does not stop
    /// the others.
    pub async fn enable_autoscale(&self) -> Result<AutoscaleSummary> {
        let mut summary = AutoscaleSummary::default();
        for pool in self.pool_names().await? {
            match self.set_autoscale(&pool, true).await {
                Ok(()) => summary.enabled.push(pool),
                Err(e) => {
                    warn!(pool = %pool, error = %e, "could not enable autoscale");
                    summary.failed.push((pool, e.to_string()));
                }
            }
        }
        Ok(summary)
    }

    /// Delete `name` for good. Without a confirming token nothing is sent.
    pub async fn remove_pool(
        &self,
        name: &str,
        confirmation: Option<&ConfirmationToken>,
    ) -> Result<()> {
        if !confirmation.is_some_and(ConfirmationToken::confirms) {
            return Err(Error::ConfirmationRequired(name.to_string()));
        }

        if !self.exists(name).await? {
            return Err(Error::DependencyUnavailable {
                step: "remove".into(),
                missing: format!("pool {name}"),
            });
        }

        if !self.delete_guard_disabled.load(Ordering::Acquire) {
            self.run(&ceph::allow_pool_delete()).await?;
            self.delete_guard_disabled.store(true, Ordering::Release);
        }

        self.run(&ceph::pool_delete(name)).await?;
        warn!(pool = name, "pool deleted");
        Ok(())
    }
}

fn positive(pool: &str, setting: &'static str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidPoolSetting {
            pool: pool.to_string(),
            setting,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::{BootstrapScript, FakeCluster, FakeRuntime};

    const PRIMARY: &str = "ceph-node-01";

    fn manager_for(cluster: FakeCluster) -> (Arc<FakeRuntime>, PoolManager) {
        let fake = Arc::new(FakeRuntime::with_cluster(cluster));
        fake.add_environment(PRIMARY, BootstrapScript::DoneAfter(1));
        let manager = PoolManager::new(fake.clone(), PRIMARY, ErasureConfig::default());
        (fake, manager)
    }

    fn yes() -> ConfirmationToken {
        ConfirmationToken::new("yes")
    }

    #[test]
    fn bundle_names_parse() {
        assert_eq!("all".parse::<BundleType>().unwrap(), BundleType::All);
        assert_eq!(
            "filesystem".parse::<BundleType>().unwrap(),
            BundleType::One(Bundle::Filesystem)
        );
        assert!("tape".parse::<BundleType>().is_err());
        assert_eq!(BundleType::All.bundles(), Bundle::ALL);
    }

    #[test]
    fn confirmation_requires_exact_literal() {
        assert!(yes().confirms());
        assert!(!ConfirmationToken::new("YES").confirms());
        assert!(!ConfirmationToken::new("y").confirms());
        assert!(!ConfirmationToken::new("").confirms());
    }

    #[test]
    fn workload_inference() {
        assert_eq!(
            WorkloadClass::infer("cephfs_metadata", Some("cephfs"), false),
            Some(WorkloadClass::FilesystemMetadata)
        );
        assert_eq!(
            WorkloadClass::infer("images", Some("rbd"), false),
            Some(WorkloadClass::Block)
        );
        assert_eq!(
            WorkloadClass::infer("cold", None, true),
            Some(WorkloadClass::Archival)
        );
        assert_eq!(WorkloadClass::infer("scratch", None, false), None);
    }

    #[tokio::test]
    async fn create_pool_is_idempotent() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));

        let first = manager
            .create_pool("x", WorkloadClass::Block, 3, 128)
            .await
            .unwrap();
        let second = manager
            .create_pool("x", WorkloadClass::Block, 2, 64)
            .await
            .unwrap();

        assert_eq!(first, CreateOutcome::Created);
        assert_eq!(second, CreateOutcome::AlreadyExists);
        assert_eq!(fake.pool_names(), ["x"]);
        let pool = &fake.cluster().pools["x"];
        assert_eq!((pool.size, pool.pg_num), (3, 128));
        assert_eq!(pool.application.as_deref(), Some("rbd"));
        let creates = fake
            .commands()
            .iter()
            .filter(|c| c.starts_with("ceph osd pool create"))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn zero_size_or_pg_is_rejected_before_any_command() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));

        let err = manager
            .create_pool("x", WorkloadClass::Block, 0, 128)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidPoolSetting { setting: "replica size", value: 0, .. }
        ));
        let err = manager
            .create_pool("x", WorkloadClass::Block, 3, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPoolSetting { .. }));
        let err = manager
            .create_bundle(BundleType::All, 3, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPoolSetting { .. }));
        assert!(fake.calls().is_empty());
        assert!(fake.pool_names().is_empty());

        manager
            .create_pool("x", WorkloadClass::Block, 3, 32)
            .await
            .unwrap();
        let calls_before = fake.calls().len();
        let err = manager.resize_pool("x", Some(0), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPoolSetting { .. }));
        let err = manager.resize_pool("x", None, Some(0)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPoolSetting { .. }));
        assert_eq!(fake.calls().len(), calls_before);
        let pool = &fake.cluster().pools["x"];
        assert_eq!((pool.size, pool.pg_num), (3, 32));
    }

    #[tokio::test]
    async fn tag_failure_is_not_fatal() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));
        fake.fail_command("ceph osd pool application enable", 1, "Error EPERM");

        let outcome = manager
            .create_pool("images", WorkloadClass::Block, 3, 32)
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Created);
        assert_eq!(fake.cluster().pools["images"].application, None);
    }

    #[tokio::test]
    async fn filesystem_pools_exist_before_fs_new() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));

        let report = manager
            .create_bundle(BundleType::One(Bundle::Filesystem), 3, 128)
            .await
            .unwrap();

        let meta = fake.position("ceph osd pool create cephfs_metadata 128").unwrap();
        let data = fake.position("ceph osd pool create cephfs_data 128").unwrap();
        let fs_new = fake
            .position("ceph fs new cephfs cephfs_metadata cephfs_data")
            .unwrap();
        assert!(meta < data && data < fs_new);

        let targets: Vec<_> = report.steps.iter().map(|s| s.target.as_str()).collect();
        assert_eq!(targets, ["cephfs_metadata", "cephfs_data", "cephfs"]);
        assert_eq!(report.status(), CheckStatus::Pass);
        assert_eq!(fake.cluster().filesystems.len(), 1);

        // second run leaves everything in place
        let again = manager
            .create_bundle(BundleType::One(Bundle::Filesystem), 3, 128)
            .await
            .unwrap();
        assert!(again.steps.iter().all(|s| s.outcome == StepOutcome::Existing));
        assert_eq!(fake.cluster().filesystems.len(), 1);
    }

    #[tokio::test]
    async fn filesystem_without_pools_is_dependency_error() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));
        fake.fail_command("ceph osd pool create cephfs_data", 34, "Error ERANGE: pg_num too large");

        let err = manager
            .create_bundle(BundleType::One(Bundle::Filesystem), 3, 128)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
        // the metadata pool created before the failure is not rolled back
        assert_eq!(fake.pool_names(), ["cephfs_metadata"]);

        let err = manager.ensure_filesystem().await.unwrap_err();
        assert!(matches!(err, Error::DependencyUnavailable { .. }));
        assert!(fake.position("ceph fs new cephfs cephfs_metadata cephfs_data").is_none());
    }

    #[tokio::test]
    async fn object_pools_exist_before_gateway_starts() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));
        let manager = manager.with_gateway_port(7480);

        let report = manager
            .create_bundle(BundleType::One(Bundle::Object), 3, 32)
            .await
            .unwrap();

        let last_pool = fake
            .position("ceph osd pool create default.rgw.buckets.data 32")
            .unwrap();
        let apply = fake
            .position("ceph orch apply rgw default --port=7480")
            .unwrap();
        assert!(last_pool < apply);
        assert_eq!(report.steps.last().unwrap().target, "rgw.default");
        assert_eq!(report.steps.last().unwrap().outcome, StepOutcome::Created);
        assert_eq!(fake.cluster().rgw_daemons, ["rgw.default"]);
        assert!(fake.cluster().rgw_users.is_empty());

        // second run finds the gateway and does not apply again
        let again = manager
            .create_bundle(BundleType::One(Bundle::Object), 3, 32)
            .await
            .unwrap();
        assert!(again.steps.iter().all(|s| s.outcome == StepOutcome::Existing));
        let applies = fake
            .commands()
            .iter()
            .filter(|c| c.starts_with("ceph orch apply rgw"))
            .count();
        assert_eq!(applies, 1);
    }

    #[tokio::test]
    async fn object_gateway_without_pools_is_dependency_error() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));
        manager
            .create_pool(".rgw.root", WorkloadClass::ObjectRoot, 3, 32)
            .await
            .unwrap();

        let err = manager.ensure_object_gateway().await.unwrap_err();
        match err {
            Error::DependencyUnavailable { missing, .. } => {
                assert_eq!(missing, "pool default.rgw.control")
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(fake.commands().iter().all(|c| !c.starts_with("ceph orch apply")));
        assert!(fake.cluster().rgw_daemons.is_empty());
    }

    #[tokio::test]
    async fn archival_bundle_skipped_on_small_cluster() {
        let (fake, manager) = manager_for(FakeCluster::healthy(2));

        let report = manager
            .create_bundle(BundleType::One(Bundle::Archival), 3, 128)
            .await
            .unwrap();

        assert_eq!(report.status(), CheckStatus::Warn);
        assert!(matches!(report.steps[0].outcome, StepOutcome::Skipped(_)));
        assert!(fake.pool_names().is_empty());
        assert!(fake.cluster().erasure_profiles.is_empty());
    }

    #[tokio::test]
    async fn archival_bundle_creates_profile_then_pool() {
        let (fake, manager) = manager_for(FakeCluster::healthy(6));

        let report = manager
            .create_bundle(BundleType::One(Bundle::Archival), 3, 64)
            .await
            .unwrap();

        assert_eq!(report.status(), CheckStatus::Pass);
        let cluster = fake.cluster();
        assert_eq!(
            cluster.erasure_profiles["archive-ec"],
            "k=4 m=2 crush-failure-domain=host"
        );
        assert_eq!(cluster.pools["archive"].erasure_profile.as_deref(), Some("archive-ec"));
        assert!(fake.commands().iter().all(|c| !c.starts_with("ceph osd pool set archive size")));
    }

    #[tokio::test]
    async fn all_bundle_runs_in_declared_order() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));

        let report = manager.create_bundle(BundleType::All, 3, 32).await.unwrap();

        let created: Vec<&str> = report
            .steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Created)
            .map(|s| s.target.as_str())
            .collect();
        assert_eq!(
            created,
            [
                "rbd",
                "cephfs_metadata",
                "cephfs_data",
                "cephfs",
                ".rgw.root",
                "default.rgw.control",
                "default.rgw.buckets.index",
                "default.rgw.buckets.data",
                "rgw.default",
            ]
        );
        // three OSDs cannot hold k=4 m=2
        assert_eq!(report.status(), CheckStatus::Warn);
        assert_eq!(fake.pool_names().len(), 7);
        assert!(fake.cluster().rgw_users.is_empty());
    }

    #[tokio::test]
    async fn removal_without_confirmation_touches_nothing() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));
        manager
            .create_pool("x", WorkloadClass::Block, 3, 128)
            .await
            .unwrap();
        let calls_before = fake.calls().len();

        let err = manager.remove_pool("x", None).await.unwrap_err();
        assert!(matches!(err, Error::ConfirmationRequired(_)));
        let err = manager
            .remove_pool("x", Some(&ConfirmationToken::new("no")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfirmationRequired(_)));

        assert_eq!(fake.calls().len(), calls_before);
        let listed = manager.list_pools().await.unwrap();
        assert!(listed.iter().any(|p| p.name == "x"));
    }

    #[tokio::test]
    async fn confirmed_removal_disables_guard_once() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));
        for name in ["a", "b", "c"] {
            manager
                .create_pool(name, WorkloadClass::Block, 3, 16)
                .await
                .unwrap();
        }

        manager.remove_pool("a", Some(&yes())).await.unwrap();
        manager.remove_pool("b", Some(&yes())).await.unwrap();

        assert_eq!(fake.pool_names(), ["c"]);
        let guard_sets = fake
            .commands()
            .iter()
            .filter(|c| c.contains("mon_allow_pool_delete"))
            .count();
        assert_eq!(guard_sets, 1);
        assert!(fake
            .commands()
            .contains(&"ceph osd pool delete a a --yes-i-really-really-mean-it".to_string()));

        let err = manager.remove_pool("zzz", Some(&yes())).await.unwrap_err();
        assert!(matches!(err, Error::DependencyUnavailable { .. }));
    }

    #[tokio::test]
    async fn autoscale_continues_past_failures() {
        let (fake, manager) = manager_for(FakeCluster::healthy(3));
        for name in ["a", "b", "c"] {
            manager
                .create_pool(name, WorkloadClass::Block, 3, 16)
                .await
                .unwrap();
        }
        fake.fail_command("ceph osd pool set b pg_autoscale_mode", 1, "Error EINVAL");

        let summary = manager.enable_autoscale().await.unwrap();

        assert_eq!(summary.enabled, ["a", "c"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "b");
        let cluster = fake.cluster();
        assert!(cluster.pools["a"].autoscale && cluster.pools["c"].autoscale);
        assert!(!cluster.pools["b"].autoscale);
    }

    #[tokio::test]
    async fn resize_and_list() {
        let (_fake, manager) = manager_for(FakeCluster::healthy(3));
        manager
            .create_bundle(BundleType::One(Bundle::Block), 3, 128)
            .await
            .unwrap();

        manager.resize_pool("rbd", Some(2), Some(256)).await.unwrap();

        let pools = manager.list_pools().await.unwrap();
        assert_eq!(pools.len(), 1);
        let rbd = &pools[0];
        assert_eq!((rbd.replica_size, rbd.pg_count), (2, 256));
        assert_eq!(rbd.workload, Some(WorkloadClass::Block));
        assert_eq!(rbd.usage.as_ref().unwrap().stored_bytes, 1024);

        let err = manager.resize_pool("nope", Some(2), None).await.unwrap_err();
        assert!(matches!(err, Error::DependencyUnavailable { .. }));
    }
}
