//! Bootstrap waiter: polls a freshly launched environment until cloud-init
//! reports a terminal state or the deadline passes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::ceph;
use crate::config::BootstrapConfig;
use crate::error::{Error, Result};
use crate::runtime::EnvironmentRuntime;

/// What a single status probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Probe {
    Done,
    Pending(String),
    Failed(String),
}

#[derive(Clone)]
pub struct BootstrapWaiter {
    runtime: Arc<dyn EnvironmentRuntime>,
    timeout: Duration,
    poll_interval: Duration,
}

impl BootstrapWaiter {
    pub fn new(
        runtime: Arc<dyn EnvironmentRuntime>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            runtime,
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(runtime: Arc<dyn EnvironmentRuntime>, config: &BootstrapConfig) -> Self {
        Self::new(runtime, config.timeout(), config.poll_interval())
    }

    /// Block until `name` finishes bootstrapping. Returns the time it took.
    ///
    /// The first probe fires immediately, then once per poll interval. The
    /// deadline also bounds an in-flight probe.
    pub async fn wait(&self, name: &str) -> Result<Duration> {
        let start = Instant::now();
        let deadline = start + self.timeout;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let timed_out = || Error::BootstrapTimeout {
            name: name.to_string(),
            elapsed: start.elapsed(),
        };

        loop {
            tokio::select! {
                biased;
                _ = tokio::time::sleep_until(deadline) => return Err(timed_out()),
                _ = ticker.tick() => {}
            }

            let probe = match tokio::time::timeout_at(deadline, self.probe(name)).await {
                Ok(probe) => probe,
                Err(_) => return Err(timed_out()),
            };

            match probe {
                Probe::Done => {
                    let elapsed = start.elapsed();
                    info!(node = name, elapsed_secs = elapsed.as_secs(), "bootstrap complete");
                    return Ok(elapsed);
                }
                Probe::Failed(output) => {
                    warn!(node = name, "bootstrap reported an error");
                    return Err(Error::BootstrapFailed {
                        name: name.to_string(),
                        output,
                    });
                }
                Probe::Pending(status) => {
                    debug!(node = name, status = %status, "bootstrap still running");
                }
            }
        }
    }

    async fn probe(&self, name: &str) -> Probe {
        match self.runtime.exec(name, &ceph::bootstrap_status()).await {
            Ok(out) => classify(&out.stdout, out.code),
            Err(Error::CommandFailed { output, code, .. }) => classify(&output, code),
            Err(e) => Probe::Pending(e.to_string()),
        }
    }
}

/// Only a zero-exit `status: done` counts as completion. A non-zero exit is
/// kept in the pending status so it shows up in the poll log.
fn classify(output: &str, code: i32) -> Probe {
    let status = output
        .lines()
        .find_map(|l| l.trim().strip_prefix("status:"))
        .map(str::trim)
        .unwrap_or("")
        .to_string();

    match status.as_str() {
        "done" if code == 0 => Probe::Done,
        "error" => Probe::Failed(output.trim().to_string()),
        "" => Probe::Pending(output.trim().to_string()),
        _ if code != 0 => Probe::Pending(format!("{status} (exit {code})")),
        _ => Probe::Pending(status),
    }
}
