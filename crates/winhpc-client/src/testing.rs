//! Test utilities for winhpc-client
//!
//! Two ways to exercise the client without a real head node:
//!
//! - [`RecordingTransport`] answers from a script and records every request,
//!   for tests that assert on URLs, headers or the absence of network calls.
//! - [`TestServer`] serves an axum router that mimics the Web API over plain
//!   HTTP on an ephemeral port.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::{HttpRequest, Transport};
use crate::types::Exchange;
use crate::xml::SERIALIZATION_NS;

/// Wrap a value in the serialization `string` document the service returns for ids
pub fn string_response(value: &str) -> String {
    format!("<string xmlns=\"{}\">{}</string>", SERIALIZATION_NS, value)
}

// =============================================================================
// Recording transport
// =============================================================================

/// Scripted transport that records requests.
///
/// Responses are served in the order they were queued; once the script runs
/// out every request gets a 404 with an empty body.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    script: Mutex<VecDeque<Exchange>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completed exchange
    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.script.lock().push_back(Exchange::completed(status, body));
        self
    }

    /// Queue a connection-level failure
    pub fn refuse(self, description: impl Into<String>) -> Self {
        self.script.lock().push_back(Exchange::unreachable(description));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Exchange {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Exchange::completed(404, ""))
    }
}

// =============================================================================
// Test server
// =============================================================================

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve an axum Router on an ephemeral local port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use winhpc_client::testing::TestServer;
    /// use winhpc_client::HpcClient;
    ///
    /// let server = TestServer::start(mock_web_api()).await?;
    /// let client = HpcClient::connect(server.config()).await?;
    /// ```
    pub async fn start(router: axum::Router) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Plain-HTTP client settings pointing at this server
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.addr.ip().to_string(), "tester", "secret")
            .with_port(self.addr.port())
            .with_tls(false)
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(2))
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
