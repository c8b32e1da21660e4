//! Environment runtime: the seam between orchestration logic and whatever
//! creates isolated compute environments.
//!
//! Operations are synchronous from the caller's point of view and never
//! retry; retry policy belongs to the caller.

#[cfg(test)]
pub mod fake;
pub mod lxd;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Everything needed to launch one member environment.
#[derive(Debug, Clone)]
pub struct EnvironmentSpec {
    pub name: String,
    pub image: String,
    pub profile: String,
    pub bridge: String,
    pub storage_pool: String,
    /// Bootstrap payload (cloud-init user data) passed to the environment.
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentDescriptor {
    pub name: String,
    pub state: EnvState,
    pub address: Option<String>,
}

/// Output of a command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub code: i32,
}

#[async_trait]
pub trait EnvironmentRuntime: Send + Sync {
    /// Launch a new environment. Fails with `AlreadyExists` if the name is taken.
    async fn create(&self, spec: &EnvironmentSpec) -> Result<()>;

    /// Run `command` inside a running environment.
    ///
    /// Non-zero exit becomes `CommandFailed` carrying the captured output.
    async fn exec(&self, name: &str, command: &[String]) -> Result<ExecOutput>;

    /// Environments whose name starts with `prefix`. Never fails.
    async fn list(&self, prefix: &str) -> Vec<EnvironmentDescriptor>;

    async fn delete(&self, name: &str) -> Result<()>;
}

/// Build an owned argv from string literals.
pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
