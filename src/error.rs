//! Error taxonomy for provisioning, probing, and pool management.

use std::time::Duration;

use thiserror::Error;

use crate::topology::NodeState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("environment {0} already exists")]
    AlreadyExists(String),

    #[error("runtime rejected creation of {name}: {reason}")]
    CreationRejected { name: String, reason: String },

    #[error("environment {0} is not running")]
    EnvironmentNotRunning(String),

    #[error("command `{command}` exited with status {code}: {output}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    #[error("command `{command}` did not finish within {timeout:?}")]
    ExecTimeout { command: String, timeout: Duration },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bootstrap of {name} did not complete after {elapsed:?}")]
    BootstrapTimeout { name: String, elapsed: Duration },

    #[error("bootstrap of {name} reported an error: {output}")]
    BootstrapFailed { name: String, output: String },

    #[error("removing {0} requires typing 'yes' to confirm")]
    ConfirmationRequired(String),

    #[error("{setting} for pool {pool} must be at least 1, got {value}")]
    InvalidPoolSetting {
        pool: String,
        setting: &'static str,
        value: u32,
    },

    #[error("{step} needs {missing}, which does not exist")]
    DependencyUnavailable { step: String, missing: String },

    #[error("unexpected output from `{command}`: {reason}")]
    Parse { command: String, reason: String },

    #[error("node {name} already has address {current}, refusing {proposed}")]
    AddressConflict {
        name: String,
        current: String,
        proposed: String,
    },

    #[error("node {name} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        name: String,
        from: NodeState,
        to: NodeState,
    },
}

impl Error {
    /// Output captured from the failing command, if there was one.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Error::CommandFailed { output, .. } | Error::BootstrapFailed { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
