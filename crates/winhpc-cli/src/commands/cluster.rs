//! Cluster-level commands - clusters, version, headnode

use anyhow::Result;
use winhpc_client::HpcClient;

use super::require;
use crate::output::{ClusterRow, OutputContext};

/// List clusters served by the head node
pub async fn clusters(client: &HpcClient, ctx: &OutputContext) -> Result<()> {
    let names = require(client.get_clusters().await?, "Cluster listing", ctx)?;

    let rows: Vec<ClusterRow> = names.into_iter().map(|name| ClusterRow { name }).collect();
    ctx.print(&rows);
    Ok(())
}

/// Show the installed HPC Pack version
pub async fn version(client: &HpcClient, ctx: &OutputContext) -> Result<()> {
    let version = require(client.get_version().await?, "Version query", ctx)?;
    ctx.print_value("version", &version);
    Ok(())
}

/// Show the active head node
pub async fn headnode(client: &HpcClient, ctx: &OutputContext) -> Result<()> {
    let node = require(client.get_active_head_node().await?, "Head node query", ctx)?;
    ctx.print_value("headnode", &node);
    Ok(())
}
