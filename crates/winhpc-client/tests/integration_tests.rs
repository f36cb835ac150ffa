//! Integration tests for winhpc-client
//!
//! These tests serve a small in-memory imitation of the Windows HPC Web API
//! over HTTP and drive it through the real reqwest transport.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use winhpc_client::testing::{string_response, TestServer};
use winhpc_client::xml::{parse_properties, property_xml};
use winhpc_client::{properties, ApiVersion, HpcClient, HpcClientError, Outcome, Properties};

// =============================================================================
// Mock Web API
// =============================================================================

const CLUSTER: &str = "ClusterA";

#[derive(Default)]
struct MockJob {
    properties: BTreeMap<String, String>,
    tasks: Vec<BTreeMap<String, String>>,
    env: BTreeMap<String, String>,
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    jobs: HashMap<String, MockJob>,
}

type Shared = Arc<Mutex<MockState>>;

type Reply = (StatusCode, String);

fn not_found(what: &str) -> Reply {
    (StatusCode::NOT_FOUND, format!("{} not found", what))
}

fn check_cluster(cluster: &str) -> Result<(), Reply> {
    if cluster == CLUSTER {
        Ok(())
    } else {
        Err(not_found(&format!("Cluster {}", cluster)))
    }
}

fn check_auth(headers: &HeaderMap) -> Result<(), Reply> {
    match headers.get(header::AUTHORIZATION) {
        Some(value) if value.as_bytes().starts_with(b"Basic ") => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "Authentication required".to_string())),
    }
}

fn selected(props: &BTreeMap<String, String>, query: &HashMap<String, String>, key: &str) -> String {
    match query.get(key) {
        Some(names) => {
            let wanted: Vec<&str> = names.split(',').collect();
            property_xml(props.iter().filter(|(k, _)| wanted.contains(&k.as_str())))
        }
        None => property_xml(props),
    }
}

async fn clusters(headers: HeaderMap) -> Reply {
    if let Err(reply) = check_auth(&headers) {
        return reply;
    }
    let body = format!(
        r#"<ArrayOfObject xmlns="http://schemas.microsoft.com/HPCS2008R2/common">
            <Object><Properties><Property><Name>Name</Name><Value>{}</Value></Property></Properties></Object>
            <Object><Properties><Property><Name>Name</Name><Value>ClusterB</Value></Property></Properties></Object>
        </ArrayOfObject>"#,
        CLUSTER
    );
    (StatusCode::OK, body)
}

async fn version(Path(cluster): Path<String>) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    (StatusCode::OK, string_response("4.0.3906.0"))
}

async fn active_head_node(Path(cluster): Path<String>, headers: HeaderMap) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    match headers.get("api-version").and_then(|v| v.to_str().ok()) {
        Some("2012-03-31.3.4") | Some("2012-11-01.4.0") => {
            (StatusCode::OK, string_response("HEADNODE1"))
        }
        _ => (StatusCode::BAD_REQUEST, "Unsupported api-version".to_string()),
    }
}

async fn create_job(
    State(state): State<Shared>,
    Path(cluster): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster).and_then(|_| check_auth(&headers)) {
        return reply;
    }
    let parsed = match parse_properties(&body) {
        Ok(parsed) => parsed,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()),
    };

    let mut state = state.lock();
    state.next_id += 1;
    let id = state.next_id.to_string();
    let mut job = MockJob::default();
    job.properties = parsed
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect();
    job.properties.insert("Id".to_string(), id.clone());
    job.properties
        .insert("State".to_string(), "Configuring".to_string());
    state.jobs.insert(id.clone(), job);

    (StatusCode::OK, string_response(&id))
}

async fn get_job(
    State(state): State<Shared>,
    Path((cluster, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    let state = state.lock();
    let Some(job) = state.jobs.get(&id) else {
        return not_found(&format!("Job {}", id));
    };
    if query.get("Render").map(String::as_str) == Some("HpcJobXml") {
        let name = job.properties.get("Name").cloned().unwrap_or_default();
        return (StatusCode::OK, format!("<Job Id=\"{}\" Name=\"{}\" />", id, name));
    }
    (StatusCode::OK, selected(&job.properties, &query, "properties"))
}

async fn submit_job(
    State(state): State<Shared>,
    Path((cluster, id)): Path<(String, String)>,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    let mut state = state.lock();
    match state.jobs.get_mut(&id) {
        Some(job) if job.tasks.is_empty() => {
            (StatusCode::BAD_REQUEST, "Job has no tasks".to_string())
        }
        Some(job) => {
            job.properties
                .insert("State".to_string(), "Queued".to_string());
            (StatusCode::OK, String::new())
        }
        None => not_found(&format!("Job {}", id)),
    }
}

async fn cancel_job(
    State(state): State<Shared>,
    Path((cluster, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    let forced = headers
        .get("forced")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("False")
        .to_string();
    let message = winhpc_client::xml::parse_string(&body).unwrap_or_default();

    let mut state = state.lock();
    let Some(job) = state.jobs.get_mut(&id) else {
        return not_found(&format!("Job {}", id));
    };
    job.properties
        .insert("State".to_string(), "Canceled".to_string());
    job.properties.insert("CancelForced".to_string(), forced);
    job.properties.insert("CancelMessage".to_string(), message);
    (StatusCode::OK, String::new())
}

async fn requeue_job(
    State(state): State<Shared>,
    Path((cluster, id)): Path<(String, String)>,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    let mut state = state.lock();
    let Some(job) = state.jobs.get_mut(&id) else {
        return not_found(&format!("Job {}", id));
    };
    match job.properties.get("State").map(String::as_str) {
        Some("Canceled") | Some("Failed") => {
            job.properties
                .insert("State".to_string(), "Queued".to_string());
            (StatusCode::OK, String::new())
        }
        _ => (
            StatusCode::BAD_REQUEST,
            "Only jobs in the Canceled or Failed state can be requeued".to_string(),
        ),
    }
}

async fn add_task(
    State(state): State<Shared>,
    Path((cluster, id)): Path<(String, String)>,
    body: String,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    let parsed = match parse_properties(&body) {
        Ok(parsed) => parsed,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()),
    };
    let mut state = state.lock();
    let Some(job) = state.jobs.get_mut(&id) else {
        return not_found(&format!("Job {}", id));
    };
    job.tasks.push(
        parsed
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_or_default()))
            .collect(),
    );
    (StatusCode::OK, string_response(&job.tasks.len().to_string()))
}

async fn get_task(
    State(state): State<Shared>,
    Path((cluster, id, task)): Path<(String, String, usize)>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    let state = state.lock();
    match state
        .jobs
        .get(&id)
        .and_then(|job| job.tasks.get(task.wrapping_sub(1)))
    {
        Some(props) => (StatusCode::OK, selected(props, &query, "Properties")),
        None => not_found(&format!("Task {}.{}", id, task)),
    }
}

async fn job_env(
    State(state): State<Shared>,
    Path((cluster, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    let state = state.lock();
    match state.jobs.get(&id) {
        Some(job) => (StatusCode::OK, selected(&job.env, &query, "properties")),
        None => not_found(&format!("Job {}", id)),
    }
}

async fn set_job_env(
    State(state): State<Shared>,
    Path((cluster, id)): Path<(String, String)>,
    body: String,
) -> Reply {
    if let Err(reply) = check_cluster(&cluster) {
        return reply;
    }
    let parsed = match parse_properties(&body) {
        Ok(parsed) => parsed,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()),
    };
    let mut state = state.lock();
    let Some(job) = state.jobs.get_mut(&id) else {
        return not_found(&format!("Job {}", id));
    };
    job.env
        .extend(parsed.into_iter().map(|(k, v)| (k, v.unwrap_or_default())));
    (StatusCode::OK, String::new())
}

fn mock_web_api() -> Router {
    let state: Shared = Arc::new(Mutex::new(MockState::default()));

    Router::new()
        .route("/WindowsHPC/Clusters", get(clusters))
        .route("/WindowsHPC/{cluster}/Version", get(version))
        .route("/WindowsHPC/{cluster}/ActiveHeadnode", get(active_head_node))
        .route("/WindowsHPC/{cluster}/Jobs", post(create_job))
        .route("/WindowsHPC/{cluster}/Job/{id}", get(get_job))
        .route("/WindowsHPC/{cluster}/Job/{id}/Submit", post(submit_job))
        .route("/WindowsHPC/{cluster}/Job/{id}/Cancel", post(cancel_job))
        .route("/WindowsHPC/{cluster}/Job/{id}/Requeue", post(requeue_job))
        .route("/WindowsHPC/{cluster}/Job/{id}/Tasks", post(add_task))
        .route("/WindowsHPC/{cluster}/Job/{id}/Task/{task}", get(get_task))
        .route(
            "/WindowsHPC/{cluster}/Job/{id}/EnvVariables",
            get(job_env).post(set_job_env),
        )
        .with_state(state)
}

async fn create_test_server() -> TestServer {
    TestServer::start(mock_web_api())
        .await
        .expect("Failed to start test server")
}

fn job_props(name: &str) -> Properties {
    properties([("Name", name), ("Priority", "Normal")])
}

// =============================================================================
// Cluster Discovery
// =============================================================================

#[tokio::test]
async fn test_discovers_first_cluster() {
    let server = create_test_server().await;

    let client = HpcClient::connect(server.config()).await.unwrap();
    assert_eq!(client.cluster(), "ClusterA");
    assert!(client.base_url().as_str().ends_with("/WindowsHPC/ClusterA/"));

    let clusters = client.get_clusters().await.unwrap().into_value().unwrap();
    assert_eq!(clusters, vec!["ClusterA".to_string(), "ClusterB".to_string()]);
}

#[tokio::test]
async fn test_explicit_cluster_skips_discovery() {
    let server = create_test_server().await;

    let client = HpcClient::connect(server.config().with_cluster("ClusterB"))
        .await
        .unwrap();
    assert_eq!(client.cluster(), "ClusterB");

    // The mock only serves ClusterA
    let version = client.get_version().await.unwrap();
    assert!(!version.is_success());
    assert_eq!(version.status(), Some(404));
    assert_eq!(version.body(), "Cluster ClusterB not found");
}

#[tokio::test]
async fn test_get_version() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();

    let version = client.get_version().await.unwrap();
    assert_eq!(version.into_value().as_deref(), Some("4.0.3906.0"));
}

#[tokio::test]
async fn test_active_head_node() {
    let server = create_test_server().await;
    let client = HpcClient::connect(
        server
            .config()
            .with_api_version(Some(ApiVersion::HpcPack2012)),
    )
    .await
    .unwrap();

    let head = client.get_active_head_node().await.unwrap();
    assert_eq!(head.into_value().as_deref(), Some("HEADNODE1"));
}

// =============================================================================
// Job Lifecycle
// =============================================================================

#[tokio::test]
async fn test_create_add_task_submit() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();

    let job_id = client
        .create_job(&job_props("nightly"))
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(job_id, "1");

    let task_id = client
        .add_task(
            &job_id,
            &properties([
                ("Name", "step 1"),
                ("CommandLine", "run.exe < in.txt && echo done"),
                ("WorkDirectory", r"C:\work"),
            ]),
        )
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(task_id, "1");

    let submitted = client.submit_job(&job_id, &Properties::new()).await.unwrap();
    assert!(submitted.is_success());

    let state = client.get_job_property(&job_id, "State").await.unwrap();
    assert_eq!(state.into_value().flatten().as_deref(), Some("Queued"));

    let task = client
        .get_task(&job_id, &task_id, Some(&["CommandLine"]))
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(task.len(), 1);
    assert_eq!(
        task["CommandLine"].as_deref(),
        Some("run.exe < in.txt && echo done")
    );
}

#[tokio::test]
async fn test_submit_without_tasks_fails_with_body() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();

    let job_id = client
        .create_job(&job_props("empty"))
        .await
        .unwrap()
        .into_value()
        .unwrap();

    let submitted = client.submit_job(&job_id, &Properties::new()).await.unwrap();
    assert!(!submitted.is_success());
    assert_eq!(submitted.status(), Some(400));
    assert_eq!(submitted.body(), "Job has no tasks");
}

#[tokio::test]
async fn test_get_job_requested_properties() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();

    let job_id = client
        .create_job(&job_props("report"))
        .await
        .unwrap()
        .into_value()
        .unwrap();

    let all = client.get_job(&job_id, None).await.unwrap().into_value().unwrap();
    assert_eq!(all["Name"].as_deref(), Some("report"));
    assert_eq!(all["Priority"].as_deref(), Some("Normal"));

    let subset = client
        .get_job(&job_id, Some(&["Name", "State"]))
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(subset.len(), 2);
    assert_eq!(subset["State"].as_deref(), Some("Configuring"));
}

#[tokio::test]
async fn test_get_job_property_missing() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();

    let job_id = client
        .create_job(&job_props("x"))
        .await
        .unwrap()
        .into_value()
        .unwrap();

    let missing = client.get_job_property(&job_id, "NoSuchProperty").await.unwrap();
    assert!(missing.is_success());
    assert_eq!(missing.into_value().flatten(), None);

    let unknown_job = client.get_job_property("999", "State").await.unwrap();
    assert!(!unknown_job.is_success());
    assert_eq!(unknown_job.body(), "Job 999 not found");
}

#[tokio::test]
async fn test_cancel_and_requeue() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();

    let job_id = client
        .create_job(&job_props("to-cancel"))
        .await
        .unwrap()
        .into_value()
        .unwrap();

    // Requeue is only accepted from Canceled or Failed
    let early = client.requeue_job(&job_id).await.unwrap();
    assert!(!early.is_success());
    assert_eq!(early.status(), Some(400));

    let canceled = client
        .cancel_job(&job_id, true, "maintenance <window>")
        .await
        .unwrap();
    assert!(canceled.is_success());

    let job = client
        .get_job(&job_id, Some(&["State", "CancelForced", "CancelMessage"]))
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(job["State"].as_deref(), Some("Canceled"));
    assert_eq!(job["CancelForced"].as_deref(), Some("True"));
    assert_eq!(job["CancelMessage"].as_deref(), Some("maintenance <window>"));

    assert!(client.requeue_job(&job_id).await.unwrap().is_success());
}

#[tokio::test]
async fn test_job_xml_and_environment() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();

    let job_id = client
        .create_job(&job_props("env"))
        .await
        .unwrap()
        .into_value()
        .unwrap();

    let xml = client.get_job_as_xml(&job_id).await.unwrap().into_value().unwrap();
    assert_eq!(xml, format!("<Job Id=\"{}\" Name=\"env\" />", job_id));

    let set = client
        .set_job_environment_variables(&job_id, &properties([("PATH", "C:\\bin"), ("MODE", "fast")]))
        .await
        .unwrap();
    assert!(set.is_success());

    let env = client
        .get_job_environment_variables(&job_id, Some(&["MODE"]))
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(env.len(), 1);
    assert_eq!(env["MODE"].as_deref(), Some("fast"));
}

// =============================================================================
// Failure Paths
// =============================================================================

#[tokio::test]
async fn test_connection_refused_is_an_outcome() {
    // Reserve a port, then free it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = winhpc_client::ClientConfig::new("127.0.0.1", "tester", "secret")
        .with_port(port)
        .with_tls(false)
        .with_cluster(CLUSTER);
    let client = HpcClient::connect(config).await.unwrap();

    let outcome = client.create_job(&job_props("x")).await.unwrap();
    match outcome {
        Outcome::Failed(exchange) => {
            assert!(exchange.is_unreachable());
            assert!(!exchange.body.is_empty());
        }
        Outcome::Success { .. } => panic!("expected a failed outcome"),
    }
}

#[tokio::test]
async fn test_server_gone_after_connect() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();
    assert!(client.get_version().await.unwrap().is_success());

    server.shutdown().await;

    let outcome = client.get_version().await.unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.status(), None);
}

#[tokio::test]
async fn test_discovery_failure_is_an_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = winhpc_client::ClientConfig::new("127.0.0.1", "tester", "secret")
        .with_port(port)
        .with_tls(false);
    let result = HpcClient::connect(config).await;
    assert!(matches!(result, Err(HpcClientError::ClusterDiscovery(_))));
}

#[tokio::test]
async fn test_low_level_request() {
    let server = create_test_server().await;
    let client = HpcClient::connect(server.config()).await.unwrap();

    let url = format!("{}/WindowsHPC/{}/Version", server.base_url(), CLUSTER);
    let exchange = client.request("get", &url, None, &[]).await.unwrap();
    assert!(exchange.is_success());

    let err = client.request("DELETE", &url, None, &[]).await.unwrap_err();
    assert!(matches!(err, HpcClientError::Configuration(_)));
}
