//! Job commands - show, cancel, requeue

use anyhow::Result;
use winhpc_client::HpcClient;

use super::{require, requested};
use crate::output::OutputContext;

/// Show job properties
pub async fn job(
    client: &HpcClient,
    id: &str,
    properties: &[String],
    ctx: &OutputContext,
) -> Result<()> {
    let names = requested(properties);
    let outcome = client.get_job(id, names.as_deref()).await?;
    let job = require(outcome, &format!("Job {} query", id), ctx)?;

    ctx.print_properties(&job);
    Ok(())
}

/// Show task properties
pub async fn task(
    client: &HpcClient,
    job: &str,
    task: &str,
    properties: &[String],
    ctx: &OutputContext,
) -> Result<()> {
    let names = requested(properties);
    let outcome = client.get_task(job, task, names.as_deref()).await?;
    let task = require(outcome, &format!("Task {}.{} query", job, task), ctx)?;

    ctx.print_properties(&task);
    Ok(())
}

/// Cancel a job
pub async fn cancel(
    client: &HpcClient,
    id: &str,
    forced: bool,
    message: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let outcome = client.cancel_job(id, forced, message).await?;
    require(outcome, &format!("Cancel of job {}", id), ctx)?;

    ctx.success(&format!("Canceled job {}", id));
    Ok(())
}

/// Requeue a canceled or failed job
pub async fn requeue(client: &HpcClient, id: &str, ctx: &OutputContext) -> Result<()> {
    let outcome = client.requeue_job(id).await?;
    require(outcome, &format!("Requeue of job {}", id), ctx)?;

    ctx.success(&format!("Requeued job {}", id));
    Ok(())
}
