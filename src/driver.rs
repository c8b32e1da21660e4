//! Orchestration driver: provision every node, wait for all of them, then
//! validate and optionally configure pools against the primary.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::bootstrap::BootstrapWaiter;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::health::{CheckStatus, ClusterHealthReport, Endpoints, HealthValidator};
use crate::pools::{AutoscaleSummary, BundleReport, BundleType, PoolManager};
use crate::runtime::{EnvironmentRuntime, EnvironmentSpec};
use crate::topology::{NodeState, Topology};

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub node_count: u32,
    pub bundle: Option<BundleType>,
    pub autoscale: bool,
    pub detailed: bool,
}

impl Default for DeployRequest {
    fn default() -> Self {
        Self {
            node_count: 1,
            bundle: None,
            autoscale: false,
            detailed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub topology: Topology,
    pub health: Option<ClusterHealthReport>,
    pub pools: Option<BundleReport>,
    pub pool_error: Option<String>,
    pub autoscale: Option<AutoscaleSummary>,
    pub endpoints: Endpoints,
}

impl DeploymentReport {
    /// Every node is ready, no health check failed, and any requested pool
    /// bundle went through. Warnings still count as success.
    pub fn success(&self) -> bool {
        self.topology.all_ready()
            && self
                .health
                .as_ref()
                .is_some_and(|h| h.overall != CheckStatus::Fail)
            && self.pool_error.is_none()
    }
}

pub struct Orchestrator {
    runtime: Arc<dyn EnvironmentRuntime>,
    config: Config,
    payload: String,
}

impl Orchestrator {
    /// `payload` is the bootstrap user data handed to every new environment.
    pub fn new(runtime: Arc<dyn EnvironmentRuntime>, config: Config, payload: String) -> Self {
        Self {
            runtime,
            config,
            payload,
        }
    }

    fn spec_for(&self, name: &str) -> EnvironmentSpec {
        let cluster = &self.config.cluster;
        EnvironmentSpec {
            name: name.to_string(),
            image: cluster.image.clone(),
            profile: cluster.profile.clone(),
            bridge: cluster.bridge.clone(),
            storage_pool: cluster.storage_pool.clone(),
            payload: self.payload.clone(),
        }
    }

    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeploymentReport> {
        let prefix = &self.config.cluster.prefix;
        info!(nodes = request.node_count, prefix = %prefix, "starting deployment");

        let mut topology = Topology::planned(prefix, request.node_count);
        self.provision(&mut topology).await?;
        self.await_bootstrap(&mut topology).await?;
        topology.absorb_addresses(&self.runtime.list(prefix).await)?;

        let mut report = DeploymentReport {
            topology,
            health: None,
            pools: None,
            pool_error: None,
            autoscale: None,
            endpoints: Endpoints::default(),
        };

        if !report.topology.all_ready() {
            for node in report.topology.failed() {
                warn!(
                    node = %node.name,
                    reason = node.failure.as_deref().unwrap_or(""),
                    "node failed"
                );
            }
            warn!("not every node is ready, skipping validation");
            return Ok(report);
        }

        let primary = report.topology.primary_name();
        let validator = HealthValidator::new(
            self.runtime.clone(),
            prefix,
            self.config.endpoints.object_gateway_port,
        );
        let health = validator.validate(&primary, request.detailed).await;
        report.endpoints = health.endpoints.clone();
        let foundational_failure = health.foundational_failure();
        report.health = Some(health);

        if foundational_failure {
            warn!(primary = %primary, "foundational check failed, skipping pool configuration");
            return Ok(report);
        }

        let manager = PoolManager::new(
            self.runtime.clone(),
            &primary,
            self.config.pools.erasure.clone(),
        )
        .with_gateway_port(self.config.endpoints.object_gateway_port);
        if let Some(bundle) = request.bundle {
            match manager
                .create_bundle(bundle, self.config.pools.replica_size, self.config.pools.pg_count)
                .await
            {
                Ok(pools) => report.pools = Some(pools),
                Err(e) => {
                    warn!(bundle = %bundle, error = %e, "pool bundle failed");
                    report.pool_error = Some(e.to_string());
                }
            }
        }
        if request.autoscale {
            match manager.enable_autoscale().await {
                Ok(summary) => report.autoscale = Some(summary),
                Err(e) => warn!(error = %e, "could not enable autoscale"),
            }
        }

        info!(success = report.success(), "deployment finished");
        Ok(report)
    }

    /// Create every planned node in index order. A name that already exists
    /// is adopted as-is; a rejected creation fails that node only.
    async fn provision(&self, topology: &mut Topology) -> Result<()> {
        for node in topology.nodes.iter_mut() {
            node.transition(NodeState::Creating)?;
            match self.runtime.create(&self.spec_for(&node.name)).await {
                Ok(()) => {
                    info!(node = %node.name, "environment created");
                    node.transition(NodeState::AwaitingBootstrap)?;
                }
                Err(Error::AlreadyExists(_)) => {
                    warn!(node = %node.name, "environment already exists, skipping creation");
                    node.transition(NodeState::AwaitingBootstrap)?;
                }
                Err(e) => {
                    warn!(node = %node.name, error = %e, "environment creation failed");
                    node.fail(e.to_string())?;
                }
            }
        }
        Ok(())
    }

    /// Wait on every node concurrently. A node's timeout never affects its
    /// siblings.
    async fn await_bootstrap(&self, topology: &mut Topology) -> Result<()> {
        let waiter = BootstrapWaiter::from_config(self.runtime.clone(), &self.config.bootstrap);
        let mut waits = JoinSet::new();

        for node in topology
            .nodes
            .iter()
            .filter(|n| n.state == NodeState::AwaitingBootstrap)
        {
            let waiter = waiter.clone();
            let name = node.name.clone();
            waits.spawn(async move {
                let outcome = waiter.wait(&name).await;
                (name, outcome)
            });
        }

        while let Some(joined) = waits.join_next().await {
            let (name, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "bootstrap task did not complete");
                    continue;
                }
            };
            let Some(node) = topology.get_mut(&name) else {
                continue;
            };
            match outcome {
                Ok(_) => node.transition(NodeState::Ready)?,
                Err(e) => {
                    warn!(node = %name, error = %e, "bootstrap failed");
                    node.fail(e.to_string())?;
                }
            }
        }

        for node in topology
            .nodes
            .iter_mut()
            .filter(|n| n.state == NodeState::AwaitingBootstrap)
        {
            node.fail("bootstrap task aborted")?;
        }
        Ok(())
    }

    /// Delete every environment matching the prefix. Returns the names removed.
    pub async fn teardown(&self) -> Result<Vec<String>> {
        let prefix = &self.config.cluster.prefix;
        let topology = Topology::discover(self.runtime.as_ref(), prefix).await;
        let mut removed = Vec::new();
        for node in &topology.nodes {
            self.runtime.delete(&node.name).await?;
            warn!(node = %node.name, "environment deleted");
            removed.push(node.name.clone());
        }
        Ok(removed)
    }
}
