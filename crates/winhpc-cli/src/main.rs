//! winhpc - command-line tool for the Windows HPC Server Web API
//!
//! Submits single-task jobs and inspects or controls existing jobs.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use winhpc_client::HpcClient;

use crate::commands::SubmitRequest;
use crate::config::{ApiVersionSetting, Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "winhpc")]
#[command(author, version, about = "Windows HPC Server Web API CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Head node host name
    #[arg(long, global = true, env = "WINHPC_HOST")]
    hostname: Option<String>,

    /// User name (DOMAIN\user)
    #[arg(long, global = true, env = "WINHPC_USERNAME")]
    username: Option<String>,

    /// Password
    #[arg(long, global = true, env = "WINHPC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Web API port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Cluster name (discovered when omitted)
    #[arg(long, global = true)]
    cluster: Option<String>,

    /// api-version header: 2011-11-01, 2012-03-31.3.4, 2012-11-01.4.0 or none
    #[arg(long, global = true)]
    api_version: Option<ApiVersionSetting>,

    /// Accept self-signed head node certificates
    #[arg(long, global = true)]
    insecure: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "WINHPC_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a job with one task and submit it
    Submit {
        /// Command line of the task
        #[arg(long)]
        command: String,

        /// Job name
        #[arg(long, default_value = commands::DEFAULT_JOB_NAME)]
        name: String,

        /// Job priority
        #[arg(long, default_value = "Normal")]
        priority: String,

        /// Working directory of the task
        #[arg(long)]
        workdir: Option<String>,
    },

    /// List clusters served by the head node
    Clusters,

    /// Show the installed HPC Pack version
    Version,

    /// Show the active head node (api-version 2012-03-31.3.4 or later)
    Headnode,

    /// Show job properties
    Job {
        /// Job ID
        id: String,

        /// Only these properties (comma separated)
        #[arg(long, value_delimiter = ',')]
        properties: Vec<String>,
    },

    /// Show task properties
    Task {
        /// Job ID
        job: String,

        /// Task ID
        task: String,

        /// Only these properties (comma separated)
        #[arg(long, value_delimiter = ',')]
        properties: Vec<String>,
    },

    /// Cancel a job
    Cancel {
        /// Job ID
        id: String,

        /// Cancel running tasks immediately
        #[arg(long)]
        forced: bool,

        /// Message recorded with the cancellation
        #[arg(long, default_value = "")]
        message: String,
    },

    /// Requeue a canceled or failed job
    Requeue {
        /// Job ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let merged = config.merge_with_args(
        cli.hostname.as_deref(),
        cli.username.as_deref(),
        cli.port,
        cli.cluster.as_deref(),
        cli.api_version,
        cli.insecure,
        cli.output,
        cli.no_color,
    );

    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);
    let client = create_client(&merged, cli.password).await?;

    match &cli.command {
        Commands::Submit {
            command,
            name,
            priority,
            workdir,
        } => {
            let request = SubmitRequest {
                command,
                name,
                priority,
                workdir: workdir.as_deref(),
            };
            commands::submit(&client, &request, &ctx).await?;
        }

        Commands::Clusters => commands::clusters(&client, &ctx).await?,

        Commands::Version => commands::version(&client, &ctx).await?,

        Commands::Headnode => commands::headnode(&client, &ctx).await?,

        Commands::Job { id, properties } => {
            commands::job(&client, id, properties, &ctx).await?;
        }

        Commands::Task {
            job,
            task,
            properties,
        } => {
            commands::task(&client, job, task, properties, &ctx).await?;
        }

        Commands::Cancel {
            id,
            forced,
            message,
        } => {
            commands::cancel(&client, id, *forced, message, &ctx).await?;
        }

        Commands::Requeue { id } => commands::requeue(&client, id, &ctx).await?,
    }

    Ok(())
}

/// Connect to the configured head node, discovering the cluster if needed
async fn create_client(merged: &MergedConfig, password: Option<String>) -> Result<HpcClient> {
    let password = password.context("No password given (use --password or WINHPC_PASSWORD)")?;
    let config = merged.client_config(password)?;
    HpcClient::connect(config)
        .await
        .context("Failed to connect to the HPC Web API")
}
