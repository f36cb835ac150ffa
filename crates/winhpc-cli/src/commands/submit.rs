//! Submit command - create a single-task job and submit it

use anyhow::Result;
use tracing::info;
use winhpc_client::{HpcClient, Properties};

use super::require;
use crate::output::OutputContext;

pub const DEFAULT_JOB_NAME: &str = "Job submitted by winhpc";
pub const TASK_NAME: &str = "Task created by winhpc";

/// Parameters of a `submit` invocation
#[derive(Debug, Clone)]
pub struct SubmitRequest<'a> {
    pub command: &'a str,
    pub name: &'a str,
    pub priority: &'a str,
    pub workdir: Option<&'a str>,
}

impl SubmitRequest<'_> {
    fn job_properties(&self) -> Properties {
        winhpc_client::properties([("Name", self.name), ("Priority", self.priority)])
    }

    fn task_properties(&self) -> Properties {
        let mut props =
            winhpc_client::properties([("Name", TASK_NAME), ("CommandLine", self.command)]);
        if let Some(workdir) = self.workdir {
            props.insert("WorkDirectory".to_string(), workdir.to_string());
        }
        props
    }
}

/// Create the job, add its task and submit it; yields the job id
pub async fn submit(
    client: &HpcClient,
    request: &SubmitRequest<'_>,
    ctx: &OutputContext,
) -> Result<String> {
    let outcome = client.create_job(&request.job_properties()).await?;
    let job_id = require(outcome, "Job creation", ctx)?;
    info!(job_id = %job_id, "Created job");

    let outcome = client.add_task(&job_id, &request.task_properties()).await?;
    let task_id = require(outcome, &format!("Task creation for job {}", job_id), ctx)?;
    info!(job_id = %job_id, task_id = %task_id, "Added task");

    let outcome = client.submit_job(&job_id, &Properties::new()).await?;
    require(outcome, &format!("Submission of job {}", job_id), ctx)?;

    ctx.success(&format!("Successfully submitted job {}", job_id));
    Ok(job_id)
}
