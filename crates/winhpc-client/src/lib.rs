//! Windows HPC Server Web API client
//!
//! Provides a typed async client for the HTTP/XML administrative API of
//! Windows HPC Server (HPC Pack 2008 R2 SP3 and later).
//!
//! # Example
//!
//! ```rust,no_run
//! use winhpc_client::{properties, ClientConfig, HpcClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new("headnode.example.org", "DOMAIN\\alice", "secret");
//!     // Cluster name is discovered when not configured
//!     let client = HpcClient::connect(config).await?;
//!
//!     let job = client
//!         .create_job(&properties([("Name", "nightly"), ("Priority", "Normal")]))
//!         .await?;
//!     let Some(job_id) = job.into_value() else {
//!         anyhow::bail!("job creation failed");
//!     };
//!
//!     client
//!         .add_task(&job_id, &properties([("CommandLine", "hostname")]))
//!         .await?;
//!     let submitted = client.submit_job(&job_id, &Default::default()).await?;
//!     if !submitted.is_success() {
//!         eprintln!("submission failed: {}", submitted.body());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Failures
//!
//! Endpoint methods return `Result<Outcome<T>>`. A request that fails on the
//! wire (connection refused, non-200 status) is `Ok(Outcome::Failed(exchange))`
//! with the response body or failure description in the [`Exchange`]. `Err` is
//! reserved for faults: malformed responses, unsupported api-versions and
//! configuration mistakes.
//!
//! # Testing
//!
//! The `testing` module provides a scripted [`testing::RecordingTransport`]
//! and an axum-backed [`testing::TestServer`].

mod client;
mod config;
mod error;
pub mod testing;
pub mod transport;
mod types;
mod version;
pub mod xml;

pub use client::HpcClient;
pub use config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{HpcClientError, Result};
pub use transport::{HttpRequest, HttpTransport, Method, Transport};
pub use types::*;
pub use version::ApiVersion;
