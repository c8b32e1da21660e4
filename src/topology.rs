//! Cluster topology: which member nodes exist, what they are called, and
//! where they can be reached.
//!
//! Node names are `<prefix><index>` with the index zero-padded to two digits
//! (`ceph-node-01`). Index 1 is always the primary.

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::runtime::{EnvState, EnvironmentDescriptor, EnvironmentRuntime};

/// Provisioning lifecycle of a single member node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Unprovisioned,
    Creating,
    AwaitingBootstrap,
    Ready,
    Failed,
}

impl NodeState {
    pub fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Unprovisioned, Creating)
                | (Creating, AwaitingBootstrap)
                | (Creating, Failed)
                | (AwaitingBootstrap, Ready)
                | (AwaitingBootstrap, Failed)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeState::Unprovisioned => "unprovisioned",
            NodeState::Creating => "creating",
            NodeState::AwaitingBootstrap => "awaiting-bootstrap",
            NodeState::Ready => "ready",
            NodeState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterNode {
    pub index: u32,
    pub name: String,
    pub address: Option<String>,
    pub state: NodeState,
    /// Last failure observed for this node, kept for reporting.
    pub failure: Option<String>,
}

impl ClusterNode {
    pub fn new(prefix: &str, index: u32) -> Self {
        Self {
            index,
            name: node_name(prefix, index),
            address: None,
            state: NodeState::Unprovisioned,
            failure: None,
        }
    }

    pub fn transition(&mut self, next: NodeState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                name: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        debug!(
            node = %self.name,
            from = self.state.label(),
            to = next.label(),
            "node state change"
        );
        self.state = next;
        Ok(())
    }

    /// Record a failure and move to `Failed`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(NodeState::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    /// Set the network address. Once assigned it never changes.
    pub fn assign_address(&mut self, address: &str) -> Result<()> {
        match &self.address {
            None => {
                self.address = Some(address.to_string());
                Ok(())
            }
            Some(current) if current == address => Ok(()),
            Some(current) => Err(Error::AddressConflict {
                name: self.name.clone(),
                current: current.clone(),
                proposed: address.to_string(),
            }),
        }
    }
}

pub fn node_name(prefix: &str, index: u32) -> String {
    format!("{prefix}{index:02}")
}

/// Parse the ordinal back out of a member name, if it follows the convention.
pub fn node_index(prefix: &str, name: &str) -> Option<u32> {
    let suffix = name.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().filter(|i| *i > 0)
}

#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    pub prefix: String,
    pub nodes: Vec<ClusterNode>,
}

impl Topology {
    /// A fresh registry for `count` unprovisioned nodes.
    pub fn planned(prefix: &str, count: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            nodes: (1..=count).map(|i| ClusterNode::new(prefix, i)).collect(),
        }
    }

    /// Rebuild the registry from what the runtime currently reports.
    ///
    /// Running environments count as `Ready`; anything else as `Failed`,
    /// since the registry cannot tell a stopped node from a broken one.
    pub fn from_descriptors(prefix: &str, descriptors: &[EnvironmentDescriptor]) -> Self {
        let mut nodes: Vec<ClusterNode> = descriptors
            .iter()
            .filter_map(|d| {
                let index = node_index(prefix, &d.name)?;
                Some(ClusterNode {
                    index,
                    name: d.name.clone(),
                    address: d.address.clone(),
                    state: match d.state {
                        EnvState::Running => NodeState::Ready,
                        EnvState::Stopped => NodeState::Failed,
                    },
                    failure: match d.state {
                        EnvState::Running => None,
                        EnvState::Stopped => Some("environment is not running".into()),
                    },
                })
            })
            .collect();
        nodes.sort_by_key(|n| n.index);
        Self {
            prefix: prefix.to_string(),
            nodes,
        }
    }

    pub async fn discover(runtime: &dyn EnvironmentRuntime, prefix: &str) -> Self {
        Self::from_descriptors(prefix, &runtime.list(prefix).await)
    }

    pub fn primary(&self) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.index == 1)
    }

    pub fn primary_name(&self) -> String {
        node_name(&self.prefix, 1)
    }

    pub fn get(&self, name: &str) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClusterNode> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.nodes.iter().filter_map(|n| n.address.clone()).collect()
    }

    pub fn all_ready(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.iter().all(|n| n.state == NodeState::Ready)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.iter().filter(|n| n.state == NodeState::Failed)
    }

    /// Copy addresses reported by the runtime onto known nodes.
    pub fn absorb_addresses(&mut self, descriptors: &[EnvironmentDescriptor]) -> Result<()> {
        for d in descriptors {
            if let (Some(node), Some(addr)) = (self.get_mut(&d.name), d.address.as_deref()) {
                node.assign_address(addr)?;
            }
        }
        Ok(())
    }
}
