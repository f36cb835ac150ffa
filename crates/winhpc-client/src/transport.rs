//! HTTP transport
//!
//! [`Transport`] is the seam between endpoint methods and the network. The
//! production implementation, [`HttpTransport`], wraps a `reqwest` client with
//! basic authentication; tests substitute a scripted transport.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{HpcClientError, Result};
use crate::types::Exchange;

/// HTTP methods used by the Web API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = HpcClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            _ => Err(HpcClientError::Configuration(format!(
                "HTTP method {} is not supported",
                s
            ))),
        }
    }
}

/// A fully prepared request: absolute URL, merged headers and optional XML body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Performs one HTTP exchange.
///
/// Implementations never fail: a request that cannot complete is reported as
/// an [`Exchange`] without status whose body describes the failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Exchange;
}

/// Merge per-call headers over the defaults; names compare case-insensitively
pub(crate) fn merge_headers(
    defaults: &[(String, String)],
    overrides: &[(&str, &str)],
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = defaults
        .iter()
        .filter(|(k, _)| !overrides.iter().any(|(o, _)| o.eq_ignore_ascii_case(k)))
        .cloned()
        .collect();
    merged.extend(overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    merged
}

/// Build a header map, rejecting names or values HTTP cannot carry
pub(crate) fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            HpcClientError::Configuration(format!("Invalid header name {:?}: {}", name, e))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            HpcClientError::Configuration(format!("Invalid header value for {}: {}", name, e))
        })?;
        map.insert(header, value);
    }
    Ok(map)
}

// =============================================================================
// reqwest-backed transport
// =============================================================================

/// Transport over `reqwest` with basic authentication
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!(host = %config.host, "TLS certificate verification disabled");
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Exchange {
        let headers = match header_map(&request.headers) {
            Ok(headers) => headers,
            Err(e) => return Exchange::unreachable(e.to_string()),
        };

        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
        };
        let mut builder = builder
            .headers(headers)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!(method = %request.method, url = %request.url, "Sending request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Exchange::unreachable(e.to_string()),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => Exchange::completed(status, body),
            Err(e) => Exchange::unreachable(e.to_string()),
        }
    }
}
