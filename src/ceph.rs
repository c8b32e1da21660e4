//! Ceph command lines and the parsers for their output.
//!
//! Every command the orchestrator sends into the primary environment is
//! built here, so the rest of the crate never assembles argv by hand.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::runtime::argv;

// ── Probes ─────────────────────────────────────────────────

pub fn bootstrap_status() -> Vec<String> {
    argv(&["cloud-init", "status"])
}

pub fn installed() -> Vec<String> {
    argv(&["sh", "-c", "command -v ceph"])
}

pub fn health() -> Vec<String> {
    argv(&["ceph", "health"])
}

pub fn mon_stat() -> Vec<String> {
    argv(&["ceph", "mon", "stat", "--format", "json"])
}

pub fn mgr_stat() -> Vec<String> {
    argv(&["ceph", "mgr", "stat", "--format", "json"])
}

pub fn osd_stat() -> Vec<String> {
    argv(&["ceph", "osd", "stat", "--format", "json"])
}

pub fn osd_tree() -> Vec<String> {
    argv(&["ceph", "osd", "tree"])
}

pub fn osd_df() -> Vec<String> {
    argv(&["ceph", "osd", "df"])
}

pub fn pool_ls() -> Vec<String> {
    argv(&["ceph", "osd", "pool", "ls"])
}

pub fn pool_ls_detail() -> Vec<String> {
    argv(&["ceph", "osd", "pool", "ls", "detail"])
}

pub fn pool_ls_detail_json() -> Vec<String> {
    argv(&["ceph", "osd", "pool", "ls", "detail", "--format", "json"])
}

pub fn df_json() -> Vec<String> {
    argv(&["ceph", "df", "--format", "json"])
}

pub fn fs_ls() -> Vec<String> {
    argv(&["ceph", "fs", "ls", "--format", "json"])
}

pub fn rbd_ls(pool: &str) -> Vec<String> {
    argv(&["rbd", "ls", "-p", pool])
}

pub fn service_dump() -> Vec<String> {
    argv(&["ceph", "service", "dump", "--format", "json"])
}

pub fn rgw_users() -> Vec<String> {
    argv(&["radosgw-admin", "user", "list"])
}

pub fn mgr_modules() -> Vec<String> {
    argv(&["ceph", "mgr", "module", "ls", "--format", "json"])
}

pub fn mgr_services() -> Vec<String> {
    argv(&["ceph", "mgr", "services", "--format", "json"])
}

pub fn nproc() -> Vec<String> {
    argv(&["nproc"])
}

pub fn free() -> Vec<String> {
    argv(&["free", "-b"])
}

// ── Mutations ──────────────────────────────────────────────

pub fn pool_create(name: &str, pg_count: u32) -> Vec<String> {
    let pg = pg_count.to_string();
    argv(&["ceph", "osd", "pool", "create", name, &pg])
}

pub fn pool_create_erasure(name: &str, pg_count: u32, profile: &str) -> Vec<String> {
    let pg = pg_count.to_string();
    argv(&["ceph", "osd", "pool", "create", name, &pg, &pg, "erasure", profile])
}

pub fn pool_set(name: &str, key: &str, value: &str) -> Vec<String> {
    argv(&["ceph", "osd", "pool", "set", name, key, value])
}

pub fn pool_application_enable(name: &str, application: &str) -> Vec<String> {
    argv(&["ceph", "osd", "pool", "application", "enable", name, application])
}

pub fn erasure_profile_set(profile: &str, k: u32, m: u32, failure_domain: &str) -> Vec<String> {
    argv(&[
        "ceph",
        "osd",
        "erasure-code-profile",
        "set",
        profile,
        &format!("k={k}"),
        &format!("m={m}"),
        &format!("crush-failure-domain={failure_domain}"),
    ])
}

pub fn fs_new(fs: &str, metadata_pool: &str, data_pool: &str) -> Vec<String> {
    argv(&["ceph", "fs", "new", fs, metadata_pool, data_pool])
}

pub fn orch_apply_rgw(service: &str, port: u16) -> Vec<String> {
    let port = format!("--port={port}");
    argv(&["ceph", "orch", "apply", "rgw", service, &port])
}

pub fn allow_pool_delete() -> Vec<String> {
    argv(&["ceph", "config", "set", "mon", "mon_allow_pool_delete", "true"])
}

pub fn pool_delete(name: &str) -> Vec<String> {
    argv(&[
        "ceph",
        "osd",
        "pool",
        "delete",
        name,
        name,
        "--yes-i-really-really-mean-it",
    ])
}

// ── Output shapes ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MonStat {
    #[serde(default)]
    pub num_mons: u32,
    #[serde(default)]
    pub quorum: Vec<serde_json::Value>,
}

impl MonStat {
    /// Members currently in quorum, or the map size if quorum is not reported.
    pub fn reachable(&self) -> u32 {
        if self.quorum.is_empty() {
            self.num_mons
        } else {
            self.quorum.len() as u32
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MgrStat {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub active_name: String,
}

#[derive(Debug, Deserialize)]
pub struct OsdStat {
    #[serde(default)]
    pub num_osds: u32,
    #[serde(default)]
    pub num_up_osds: u32,
    #[serde(default)]
    pub num_in_osds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolDetail {
    pub pool_name: String,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub pg_num: u32,
    #[serde(default)]
    pub pg_autoscale_mode: String,
    #[serde(default)]
    pub erasure_code_profile: String,
    #[serde(default)]
    pub application_metadata: BTreeMap<String, serde_json::Value>,
}

impl PoolDetail {
    pub fn application(&self) -> Option<&str> {
        self.application_metadata.keys().next().map(String::as_str)
    }

    pub fn erasure_profile(&self) -> Option<&str> {
        Some(self.erasure_code_profile.as_str()).filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct DfReport {
    #[serde(default)]
    pub pools: Vec<DfPool>,
}

#[derive(Debug, Deserialize)]
pub struct DfPool {
    pub name: String,
    pub stats: DfPoolStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DfPoolStats {
    #[serde(default)]
    pub stored: u64,
    #[serde(default)]
    pub max_avail: u64,
    #[serde(default)]
    pub percent_used: f64,
}

#[derive(Debug, Deserialize)]
pub struct FsEntry {
    pub name: String,
    #[serde(default)]
    pub metadata_pool: String,
    #[serde(default)]
    pub data_pools: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceMap {
    #[serde(default)]
    pub services: HashMap<String, ServiceEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceEntry {
    #[serde(default)]
    pub daemons: HashMap<String, serde_json::Value>,
}

impl ServiceMap {
    /// Registered daemons for any of `kinds`, ignoring the `summary` pseudo-entry.
    pub fn daemons(&self, kinds: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = kinds
            .iter()
            .filter_map(|k| self.services.get(*k))
            .flat_map(|s| s.daemons.keys())
            .filter(|k| k.as_str() != "summary")
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[derive(Debug, Deserialize)]
pub struct MgrModules {
    #[serde(default)]
    pub enabled_modules: Vec<String>,
}

impl MgrModules {
    pub fn is_enabled(&self, module: &str) -> bool {
        self.enabled_modules.iter().any(|m| m == module)
    }
}

// ── Parsing ────────────────────────────────────────────────

pub fn parse_json<T: DeserializeOwned>(command: &[String], output: &str) -> Result<T> {
    serde_json::from_str(output.trim()).map_err(|e| Error::Parse {
        command: command.join(" "),
        reason: e.to_string(),
    })
}

/// One name per non-empty line (`ceph osd pool ls`, `rbd ls`).
pub fn parse_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Total memory in bytes from `free -b`.
pub fn parse_free_total(output: &str) -> Option<u64> {
    output
        .lines()
        .find(|l| l.starts_with("Mem:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

/// The dashboard URL from `ceph mgr services`.
pub fn parse_dashboard_url(output: &str) -> Option<String> {
    let services: HashMap<String, String> = serde_json::from_str(output.trim()).ok()?;
    services.get("dashboard").cloned()
}
