//! Configuration file handling for winhpc

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use winhpc_client::{ApiVersion, ClientConfig, DEFAULT_PORT};

use crate::output::OutputFormat;

/// `api-version` setting; `none` leaves the header off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ApiVersionSetting {
    Omitted,
    Version(ApiVersion),
}

impl ApiVersionSetting {
    pub fn version(self) -> Option<ApiVersion> {
        match self {
            Self::Omitted => None,
            Self::Version(version) => Some(version),
        }
    }
}

impl FromStr for ApiVersionSetting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self::Omitted);
        }
        s.parse().map(Self::Version).map_err(|e| format!("{} (or none)", e))
    }
}

impl TryFrom<String> for ApiVersionSetting {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ApiVersionSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Omitted => f.write_str("none"),
            Self::Version(version) => f.write_str(version.as_str()),
        }
    }
}

impl From<ApiVersionSetting> for String {
    fn from(setting: ApiVersionSetting) -> Self {
        setting.to_string()
    }
}

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default head node
    pub hostname: Option<String>,
    /// Default user name
    pub username: Option<String>,
    /// Web API port
    pub port: Option<u16>,
    /// Cluster name
    pub cluster: Option<String>,
    /// api-version header value, or `none`
    pub api_version: Option<ApiVersionSetting>,
    /// Accept self-signed certificates
    pub insecure: Option<bool>,
    /// Default output format
    pub output: Option<OutputFormat>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("winhpc");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    #[allow(clippy::too_many_arguments)]
    pub fn merge_with_args(
        &self,
        hostname: Option<&str>,
        username: Option<&str>,
        port: Option<u16>,
        cluster: Option<&str>,
        api_version: Option<ApiVersionSetting>,
        insecure: bool,
        output: Option<OutputFormat>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            hostname: hostname.map(String::from).or_else(|| self.hostname.clone()),
            username: username.map(String::from).or_else(|| self.username.clone()),
            port: port.or(self.port).unwrap_or(DEFAULT_PORT),
            cluster: cluster.map(String::from).or_else(|| self.cluster.clone()),
            api_version: api_version
                .or(self.api_version)
                .map_or(Some(ApiVersion::default()), ApiVersionSetting::version),
            insecure: insecure || self.insecure.unwrap_or(false),
            output: output.or(self.output).unwrap_or_default(),
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub port: u16,
    pub cluster: Option<String>,
    pub api_version: Option<ApiVersion>,
    pub insecure: bool,
    pub output: OutputFormat,
    pub no_color: bool,
}

impl MergedConfig {
    /// Client settings; host and user name must be known by now
    pub fn client_config(&self, password: String) -> Result<ClientConfig> {
        let hostname = self
            .hostname
            .clone()
            .context("No head node given (use --hostname, WINHPC_HOST or the config file)")?;
        let username = self
            .username
            .clone()
            .context("No user name given (use --username, WINHPC_USERNAME or the config file)")?;

        let mut config = ClientConfig::new(hostname, username, password)
            .with_port(self.port)
            .with_api_version(self.api_version)
            .accept_invalid_certs(self.insecure);
        if let Some(cluster) = &self.cluster {
            config = config.with_cluster(cluster.clone());
        }
        Ok(config)
    }
}
