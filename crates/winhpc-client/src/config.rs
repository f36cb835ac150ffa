//! Client connection settings
//!
//! Can be loaded from TOML/YAML through serde or built programmatically.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::version::ApiVersion;

/// Default HTTPS port of the Web API
pub const DEFAULT_PORT: u16 = 443;
/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for an [`crate::HpcClient`]
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Head node host name
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    #[serde(default, skip_serializing)]
    pub password: String,

    /// Target cluster; discovered from the service when absent
    #[serde(default)]
    pub cluster: Option<String>,

    /// `api-version` header value; `None` omits the header
    #[serde(default = "default_api_version")]
    pub api_version: Option<ApiVersion>,

    /// Use `https` (default) or plain `http`
    #[serde(default = "default_true")]
    pub use_tls: bool,

    /// Skip TLS certificate verification (self-signed head nodes)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_api_version() -> Option<ApiVersion> {
    Some(ApiVersion::default())
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl ClientConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            cluster: None,
            api_version: default_api_version(),
            use_tls: true,
            accept_invalid_certs: false,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    pub fn with_api_version(mut self, version: Option<ApiVersion>) -> Self {
        self.api_version = version;
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_timeouts(mut self, timeout: Duration, connect_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = connect_timeout;
        self
    }

    fn scheme(&self) -> &'static str {
        if self.use_tls {
            "https"
        } else {
            "http"
        }
    }

    /// `{scheme}://{host}:{port}/WindowsHPC/`
    pub fn service_root(&self) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}://{}:{}/WindowsHPC/",
            self.scheme(),
            self.host,
            self.port
        ))?)
    }

    /// `{scheme}://{host}:{port}/WindowsHPC/{cluster}/`
    pub fn cluster_url(&self, cluster: &str) -> Result<Url> {
        let mut url = self.service_root()?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(cluster)
            .push("");
        Ok(url)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("cluster", &self.cluster)
            .field("api_version", &self.api_version)
            .field("use_tls", &self.use_tls)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
