//! Command implementations for winhpc

pub mod cluster;
pub mod job;
pub mod submit;

pub use cluster::{clusters, headnode, version};
pub use job::{cancel, job, requeue, task};
pub use submit::{submit, SubmitRequest, DEFAULT_JOB_NAME};

use anyhow::{bail, Result};
use winhpc_client::Outcome;

use crate::output::OutputContext;

/// Unwrap a successful outcome, or print the captured response and fail
pub(crate) fn require<T>(outcome: Outcome<T>, what: &str, ctx: &OutputContext) -> Result<T> {
    match outcome {
        Outcome::Success { value, .. } => Ok(value),
        Outcome::Failed(exchange) => {
            ctx.error(&format!("Error: {}", exchange.body));
            match exchange.status {
                Some(status) => bail!("{} failed (HTTP {})", what, status),
                None => bail!("{} failed (no response from server)", what),
            }
        }
    }
}

/// Optional name filter from a `--properties` list
pub(crate) fn requested(names: &[String]) -> Option<Vec<&str>> {
    if names.is_empty() {
        None
    } else {
        Some(names.iter().map(String::as_str).collect())
    }
}
