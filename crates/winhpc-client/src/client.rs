//! Windows HPC Web API client implementation

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::form_urlencoded::byte_serialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{HpcClientError, Result};
use crate::transport::{header_map, merge_headers, HttpRequest, HttpTransport, Method, Transport};
use crate::types::{Exchange, Outcome, Properties, PropertyMap};
use crate::version::ApiVersion;
use crate::xml;

/// Oldest revision that serves `GET /ActiveHeadnode`
const ACTIVE_HEAD_NODE_MIN_VERSION: ApiVersion = ApiVersion::HpcPack2008R2Sp4;

/// Join requested property names into a query value.
///
/// Each name is form-encoded on its own so the `,` separator stays literal.
fn join_names(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| byte_serialize(name.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
}

fn with_query(mut url: Url, key: &str, names: Option<&[&str]>) -> Url {
    if let Some(names) = names {
        url.set_query(Some(&format!("{}={}", key, join_names(names))));
    }
    url
}

/// Windows HPC Server Web API client
///
/// Holds the connection settings and the resolved cluster; every endpoint
/// method returns an [`Outcome`] that carries its own [`Exchange`], so a client
/// can be shared across tasks.
#[derive(Clone)]
pub struct HpcClient {
    config: ClientConfig,
    cluster: String,
    base_url: Url,
    default_headers: Vec<(String, String)>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for HpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HpcClient")
            .field("config", &self.config)
            .field("cluster", &self.cluster)
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HpcClient {
    /// Connect using the `reqwest` transport.
    ///
    /// When `config.cluster` is unset the first cluster reported by the
    /// service is used.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport)).await
    }

    /// Connect through a caller-supplied transport
    pub async fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let mut default_headers = vec![("Content-Type".to_string(), "application/xml".to_string())];
        if let Some(version) = config.api_version {
            default_headers.push(("api-version".to_string(), version.as_str().to_string()));
        }

        let cluster = match &config.cluster {
            Some(cluster) => cluster.clone(),
            None => {
                let outcome =
                    Self::fetch_clusters(&config, &default_headers, transport.as_ref()).await?;
                match outcome {
                    Outcome::Success { value, exchange } => value.into_iter().next().ok_or_else(|| {
                        HpcClientError::ClusterDiscovery(format!(
                            "service listed no clusters: {}",
                            exchange.body
                        ))
                    })?,
                    Outcome::Failed(exchange) => {
                        return Err(HpcClientError::ClusterDiscovery(exchange.body));
                    }
                }
            }
        };
        info!(cluster = %cluster, host = %config.host, "Using HPC cluster");

        let base_url = config.cluster_url(&cluster)?;

        Ok(Self {
            config,
            cluster,
            base_url,
            default_headers,
            transport,
        })
    }

    /// Resolved cluster name
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// `{scheme}://{host}:{port}/WindowsHPC/{cluster}/`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api_version(&self) -> Option<ApiVersion> {
        self.config.api_version
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Low-level entry point: issue one request with the default headers.
    ///
    /// `method` must be GET, POST or PUT and every header must be a valid
    /// HTTP name and value; anything else is a configuration error raised
    /// before any network activity.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> Result<Exchange> {
        let method: Method = method.parse()?;
        header_map(&merge_headers(&self.default_headers, headers))?;
        Ok(Self::send(
            self.transport.as_ref(),
            &self.default_headers,
            method,
            url.to_string(),
            body,
            headers,
        )
        .await)
    }

    async fn send(
        transport: &dyn Transport,
        default_headers: &[(String, String)],
        method: Method,
        url: String,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> Exchange {
        let request = HttpRequest {
            method,
            url,
            headers: merge_headers(default_headers, headers),
            body,
        };
        let (method, url) = (request.method, request.url.clone());

        let exchange = transport.send(request).await;
        match exchange.status {
            Some(200) => debug!(%method, %url, "Request succeeded"),
            Some(status) => warn!(%method, %url, status, "Request failed"),
            None => warn!(%method, %url, error = %exchange.body, "Request did not complete"),
        }
        exchange
    }

    async fn call(&self, method: Method, url: Url, body: Option<String>) -> Exchange {
        self.call_with_headers(method, url, body, &[]).await
    }

    async fn call_with_headers(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> Exchange {
        Self::send(
            self.transport.as_ref(),
            &self.default_headers,
            method,
            url.into(),
            body,
            headers,
        )
        .await
    }

    /// Append path segments to the cluster URL. Each segment is pushed
    /// literally, so ids containing `/`, `?` or `#` stay a single segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        if let Some(segment) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(HpcClientError::Configuration(format!(
                "Invalid path segment {:?}",
                segment
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                HpcClientError::Configuration(format!("{} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // =========================================================================
    // Outcome helpers
    // =========================================================================

    fn status_only(exchange: Exchange) -> Outcome<()> {
        if exchange.is_success() {
            Outcome::Success {
                value: (),
                exchange,
            }
        } else {
            Outcome::Failed(exchange)
        }
    }

    fn parsed<T>(exchange: Exchange, parse: impl FnOnce(&str) -> Result<T>) -> Result<Outcome<T>> {
        if !exchange.is_success() {
            return Ok(Outcome::Failed(exchange));
        }
        let value = parse(&exchange.body)?;
        Ok(Outcome::Success { value, exchange })
    }

    fn raw(exchange: Exchange) -> Outcome<String> {
        if exchange.is_success() {
            Outcome::Success {
                value: exchange.body.clone(),
                exchange,
            }
        } else {
            Outcome::Failed(exchange)
        }
    }

    // =========================================================================
    // Cluster Operations
    // =========================================================================

    /// List cluster names served by this Web API host, in document order
    #[instrument(skip(self))]
    pub async fn get_clusters(&self) -> Result<Outcome<Vec<String>>> {
        Self::fetch_clusters(&self.config, &self.default_headers, self.transport.as_ref()).await
    }

    async fn fetch_clusters(
        config: &ClientConfig,
        default_headers: &[(String, String)],
        transport: &dyn Transport,
    ) -> Result<Outcome<Vec<String>>> {
        let url = config.service_root()?.join("Clusters")?;
        let exchange = Self::send(
            transport,
            default_headers,
            Method::Get,
            url.into(),
            None,
            &[],
        )
        .await;
        Self::parsed(exchange, xml::parse_cluster_names)
    }

    /// Installed HPC Pack version
    #[instrument(skip(self))]
    pub async fn get_version(&self) -> Result<Outcome<String>> {
        let exchange = self.call(Method::Get, self.url(&["Version"])?, None).await;
        Self::parsed(exchange, xml::parse_string)
    }

    /// Name of the active head node.
    ///
    /// Requires api-version 2012-03-31.3.4 or later.
    #[instrument(skip(self))]
    pub async fn get_active_head_node(&self) -> Result<Outcome<String>> {
        match self.config.api_version {
            Some(version) if version >= ACTIVE_HEAD_NODE_MIN_VERSION => {}
            configured => {
                return Err(HpcClientError::Unsupported {
                    operation: "get_active_head_node",
                    required: ACTIVE_HEAD_NODE_MIN_VERSION,
                    configured,
                })
            }
        }

        let exchange = self.call(Method::Get, self.url(&["ActiveHeadnode"])?, None).await;
        Self::parsed(exchange, xml::parse_string)
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Create a job with the given properties; yields the new job id
    #[instrument(skip(self, properties))]
    pub async fn create_job(&self, properties: &Properties) -> Result<Outcome<String>> {
        let body = xml::property_xml(properties);
        let exchange = self.call(Method::Post, self.url(&["Jobs"])?, Some(body)).await;
        Self::parsed(exchange, xml::parse_string)
    }

    /// Create a job from a job XML document (as produced by [`Self::get_job_as_xml`])
    #[instrument(skip(self, job_xml))]
    pub async fn create_job_from_xml(&self, job_xml: &str) -> Result<Outcome<String>> {
        let exchange = self
            .call(Method::Post, self.url(&["Jobs", "JobFile"])?, Some(job_xml.to_string()))
            .await;
        Self::parsed(exchange, xml::parse_string)
    }

    /// Submit a job, optionally setting properties at submission time
    #[instrument(skip(self, properties))]
    pub async fn submit_job(&self, job_id: &str, properties: &Properties) -> Result<Outcome<()>> {
        let url = self.url(&["Job", job_id, "Submit"])?;
        let exchange = self
            .call(Method::Post, url, Some(xml::property_xml(properties)))
            .await;
        Ok(Self::status_only(exchange))
    }

    /// Cancel a job
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: &str, forced: bool, message: &str) -> Result<Outcome<()>> {
        let url = self.url(&["Job", job_id, "Cancel"])?;
        let forced = if forced { "True" } else { "False" };
        let exchange = self
            .call_with_headers(
                Method::Post,
                url,
                Some(xml::string_xml(message)),
                &[("forced", forced)],
            )
            .await;
        Ok(Self::status_only(exchange))
    }

    /// Requeue a job.
    ///
    /// The service only accepts this for jobs in the Canceled or Failed state.
    #[instrument(skip(self))]
    pub async fn requeue_job(&self, job_id: &str) -> Result<Outcome<()>> {
        let url = self.url(&["Job", job_id, "Requeue"])?;
        let body = xml::property_xml(&Properties::new());
        let exchange = self.call(Method::Post, url, Some(body)).await;
        Ok(Self::status_only(exchange))
    }

    /// Job properties; all of them unless `requested` names a subset
    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: &str, requested: Option<&[&str]>) -> Result<Outcome<PropertyMap>> {
        let url = with_query(self.url(&["Job", job_id])?, "properties", requested);
        let exchange = self.call(Method::Get, url, None).await;
        Self::parsed(exchange, xml::parse_properties)
    }

    /// Job rendered as job XML, suitable for [`Self::create_job_from_xml`]
    #[instrument(skip(self))]
    pub async fn get_job_as_xml(&self, job_id: &str) -> Result<Outcome<String>> {
        let mut url = self.url(&["Job", job_id])?;
        url.set_query(Some("Render=HpcJobXml"));
        Ok(Self::raw(self.call(Method::Get, url, None).await))
    }

    /// Single job property; `None` when the property is missing or empty
    #[instrument(skip(self))]
    pub async fn get_job_property(&self, job_id: &str, name: &str) -> Result<Outcome<Option<String>>> {
        let outcome = self.get_job(job_id, Some(std::slice::from_ref(&name))).await?;
        Ok(outcome.map(|mut properties| properties.remove(name).flatten()))
    }

    /// Set job properties; requires an api-version to be configured
    #[instrument(skip(self, properties))]
    pub async fn set_job_properties(&self, job_id: &str, properties: &Properties) -> Result<Outcome<()>> {
        if self.config.api_version.is_none() {
            return Err(HpcClientError::Configuration(format!(
                "set_job_properties requires an api-version (minimum {})",
                ApiVersion::HpcPack2008R2Sp3
            )));
        }

        let url = self.url(&["Job", job_id])?;
        let exchange = self
            .call(Method::Put, url, Some(xml::property_xml(properties)))
            .await;
        Ok(Self::status_only(exchange))
    }

    /// Custom job properties; all of them unless `requested` names a subset
    #[instrument(skip(self))]
    pub async fn get_job_custom_properties(
        &self,
        job_id: &str,
        requested: Option<&[&str]>,
    ) -> Result<Outcome<PropertyMap>> {
        let url = with_query(
            self.url(&["Job", job_id, "CustomProperties"])?,
            "Names",
            requested,
        );
        let exchange = self.call(Method::Get, url, None).await;
        Self::parsed(exchange, xml::parse_properties)
    }

    #[instrument(skip(self, properties))]
    pub async fn set_job_custom_properties(
        &self,
        job_id: &str,
        properties: &Properties,
    ) -> Result<Outcome<()>> {
        let url = self.url(&["Job", job_id, "CustomProperties"])?;
        let exchange = self
            .call(Method::Post, url, Some(xml::property_xml(properties)))
            .await;
        Ok(Self::status_only(exchange))
    }

    /// Job environment variables; all of them unless `requested` names a subset
    #[instrument(skip(self))]
    pub async fn get_job_environment_variables(
        &self,
        job_id: &str,
        requested: Option<&[&str]>,
    ) -> Result<Outcome<PropertyMap>> {
        let url = with_query(
            self.url(&["Job", job_id, "EnvVariables"])?,
            "properties",
            requested,
        );
        let exchange = self.call(Method::Get, url, None).await;
        Self::parsed(exchange, xml::parse_properties)
    }

    #[instrument(skip(self, variables))]
    pub async fn set_job_environment_variables(
        &self,
        job_id: &str,
        variables: &Properties,
    ) -> Result<Outcome<()>> {
        let url = self.url(&["Job", job_id, "EnvVariables"])?;
        let exchange = self
            .call(Method::Post, url, Some(xml::property_xml(variables)))
            .await;
        Ok(Self::status_only(exchange))
    }

    // =========================================================================
    // Task Operations
    // =========================================================================

    /// Add a task to a job; yields the new task id
    #[instrument(skip(self, properties))]
    pub async fn add_task(&self, job_id: &str, properties: &Properties) -> Result<Outcome<String>> {
        let url = self.url(&["Job", job_id, "Tasks"])?;
        let exchange = self
            .call(Method::Post, url, Some(xml::property_xml(properties)))
            .await;
        Self::parsed(exchange, xml::parse_string)
    }

    /// Cancel a task
    #[instrument(skip(self))]
    pub async fn cancel_task(
        &self,
        job_id: &str,
        task_id: &str,
        forced: bool,
        message: &str,
    ) -> Result<Outcome<()>> {
        let mut url = self.url(&["Job", job_id, "Task", task_id, "Cancel"])?;
        if forced {
            url.set_query(Some("Forced=True"));
        }
        let exchange = self
            .call(Method::Post, url, Some(xml::string_xml(message)))
            .await;
        Ok(Self::status_only(exchange))
    }

    /// Task properties; all of them unless `requested` names a subset
    #[instrument(skip(self))]
    pub async fn get_task(
        &self,
        job_id: &str,
        task_id: &str,
        requested: Option<&[&str]>,
    ) -> Result<Outcome<PropertyMap>> {
        let url = with_query(
            self.url(&["Job", job_id, "Task", task_id])?,
            "Properties",
            requested,
        );
        let exchange = self.call(Method::Get, url, None).await;
        Self::parsed(exchange, xml::parse_properties)
    }

    #[instrument(skip(self, properties))]
    pub async fn set_task_properties(
        &self,
        job_id: &str,
        task_id: &str,
        properties: &Properties,
    ) -> Result<Outcome<()>> {
        let url = self.url(&["Job", job_id, "Task", task_id])?;
        let exchange = self
            .call(Method::Put, url, Some(xml::property_xml(properties)))
            .await;
        Ok(Self::status_only(exchange))
    }

    /// Task environment variables; all of them unless `requested` names a subset
    #[instrument(skip(self))]
    pub async fn get_task_environment_variables(
        &self,
        job_id: &str,
        task_id: &str,
        requested: Option<&[&str]>,
    ) -> Result<Outcome<PropertyMap>> {
        let url = with_query(
            self.url(&["Job", job_id, "Task", task_id, "EnvVariables"])?,
            "Names",
            requested,
        );
        let exchange = self.call(Method::Get, url, None).await;
        Self::parsed(exchange, xml::parse_properties)
    }

    #[instrument(skip(self, variables))]
    pub async fn set_task_environment_variables(
        &self,
        job_id: &str,
        task_id: &str,
        variables: &Properties,
    ) -> Result<Outcome<()>> {
        let url = self.url(&["Job", job_id, "Task", task_id, "EnvVariables"])?;
        let exchange = self
            .call(Method::Post, url, Some(xml::property_xml(variables)))
            .await;
        Ok(Self::status_only(exchange))
    }

    // =========================================================================
    // Subtask Operations
    // =========================================================================

    /// Subtask properties; all of them unless `requested` names a subset
    #[instrument(skip(self))]
    pub async fn get_subtask(
        &self,
        job_id: &str,
        task_id: &str,
        subtask_id: &str,
        requested: Option<&[&str]>,
    ) -> Result<Outcome<PropertyMap>> {
        let url = with_query(
            self.url(&["Job", job_id, "Task", task_id, "SubTask", subtask_id])?,
            "Properties",
            requested,
        );
        let exchange = self.call(Method::Get, url, None).await;
        Self::parsed(exchange, xml::parse_properties)
    }

    #[instrument(skip(self))]
    pub async fn get_subtask_as_xml(
        &self,
        job_id: &str,
        task_id: &str,
        subtask_id: &str,
    ) -> Result<Outcome<String>> {
        let mut url =
            self.url(&["Job", job_id, "Task", task_id, "SubTask", subtask_id])?;
        url.set_query(Some("Render=HpcJobXml"));
        Ok(Self::raw(self.call(Method::Get, url, None).await))
    }
}
