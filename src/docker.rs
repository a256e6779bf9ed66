//! Docker Engine API client for Swarm services, tasks and nodes.

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::trace;
#[cfg(unix)]
use {
    http_body_util::{BodyExt, Empty},
    hyper::body::Bytes,
    hyper::client::conn::http1,
    hyper::{header, Request},
    hyper_util::rt::TokioIo,
    std::path::{Path, PathBuf},
    tokio::net::UnixStream,
    tracing::debug,
};

use crate::cluster::{ClusterService, NetworkAttachment, Node, Orchestrator, Task, TaskState};
use crate::config::DockerConfig;
use crate::error::{DnsError, OrchestratorError};

/// Wire shapes of the Docker Engine API (only the fields we read).
mod wire {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub struct Service {
        #[serde(rename = "ID")]
        pub id: String,
        #[serde(rename = "Spec")]
        pub spec: ServiceSpec,
    }

    #[derive(Debug, Deserialize)]
    pub struct ServiceSpec {
        #[serde(rename = "Name")]
        pub name: String,
        #[serde(rename = "Labels", default)]
        pub labels: HashMap<String, String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Task {
        #[serde(rename = "ID")]
        pub id: String,
        #[serde(rename = "Slot", default)]
        pub slot: u64,
        #[serde(rename = "NodeID", default)]
        pub node_id: String,
        #[serde(rename = "Status")]
        pub status: TaskStatus,
        #[serde(rename = "NetworksAttachments", default)]
        pub networks_attachments: Vec<NetworkAttachment>,
    }

    #[derive(Debug, Deserialize)]
    pub struct TaskStatus {
        #[serde(rename = "State")]
        pub state: TaskState,
    }

    #[derive(Debug, Deserialize)]
    pub struct NetworkAttachment {
        #[serde(rename = "Network")]
        pub network: Network,
        #[serde(rename = "Addresses", default)]
        pub addresses: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Network {
        #[serde(rename = "ID")]
        pub id: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Node {
        #[serde(rename = "ID")]
        pub id: String,
        #[serde(rename = "Description")]
        pub description: NodeDescription,
    }

    #[derive(Debug, Deserialize)]
    pub struct NodeDescription {
        #[serde(rename = "Hostname")]
        pub hostname: String,
    }
}

impl From<wire::Service> for ClusterService {
    fn from(service: wire::Service) -> Self {
        Self {
            id: service.id,
            name: service.spec.name,
            labels: service.spec.labels,
        }
    }
}

impl From<wire::Task> for Task {
    fn from(task: wire::Task) -> Self {
        Self {
            id: task.id,
            slot: task.slot,
            node_id: task.node_id,
            state: task.status.state,
            networks: task
                .networks_attachments
                .into_iter()
                .map(|attachment| NetworkAttachment {
                    network_id: attachment.network.id,
                    addresses: attachment.addresses,
                })
                .collect(),
        }
    }
}

impl From<wire::Node> for Node {
    fn from(node: wire::Node) -> Self {
        Self {
            id: node.id,
            hostname: node.description.hostname,
        }
    }
}

const USER_AGENT: &str = concat!("kallax/", env!("CARGO_PKG_VERSION"));

/// How requests reach the Docker Engine.
#[derive(Debug, Clone)]
enum Transport {
    /// TCP host, e.g. `http://manager:2375`.
    Http {
        client: reqwest::Client,
        base_url: String,
    },
    /// The engine's local socket, e.g. `/var/run/docker.sock`.
    #[cfg(unix)]
    Unix { socket: PathBuf },
}

/// [`Orchestrator`] talking to a Swarm manager's Docker Engine API, either
/// over the engine's unix socket (`unix://...`) or over HTTP.
///
/// No request timeout is configured; a hung manager blocks the query.
#[derive(Debug, Clone)]
pub struct DockerClient {
    transport: Transport,
    api_prefix: String,
}

impl DockerClient {
    /// Create a client for the configured Docker host.
    pub fn new(config: &DockerConfig) -> Result<Self, DnsError> {
        let transport = match config.host.strip_prefix("unix://") {
            Some(socket) => unix_transport(socket)?,
            None => Transport::Http {
                client: reqwest::Client::builder().user_agent(USER_AGENT).build()?,
                base_url: config.host.trim_end_matches('/').to_string(),
            },
        };

        let api_prefix = config
            .api_version
            .as_deref()
            .map(|version| format!("/{}", version.trim_matches('/')))
            .unwrap_or_default();

        Ok(Self {
            transport,
            api_prefix,
        })
    }

    /// Path and query of an API call, filters URL-encoded.
    fn request_target(
        &self,
        path: &str,
        filters: Option<&serde_json::Value>,
    ) -> Result<String, OrchestratorError> {
        let mut url = Url::parse("http://docker")
            .map_err(|e| OrchestratorError::Unavailable(format!("invalid request url: {e}")))?;
        url.set_path(&format!("{}{}", self.api_prefix, path));
        if let Some(filters) = filters {
            url.query_pairs_mut()
                .append_pair("filters", &filters.to_string());
        }

        Ok(match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: Option<serde_json::Value>,
    ) -> Result<T, OrchestratorError> {
        let target = self.request_target(path, filters.as_ref())?;
        trace!(%target, "docker api request");

        match &self.transport {
            Transport::Http { client, base_url } => {
                let body = client
                    .get(format!("{base_url}{target}"))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                Ok(body)
            }
            #[cfg(unix)]
            Transport::Unix { socket } => {
                let body = unix_get(socket, &target).await?;
                Ok(serde_json::from_slice(&body)?)
            }
        }
    }
}

#[cfg(unix)]
fn unix_transport(socket: &str) -> Result<Transport, DnsError> {
    Ok(Transport::Unix {
        socket: PathBuf::from(socket),
    })
}

#[cfg(not(unix))]
fn unix_transport(socket: &str) -> Result<Transport, DnsError> {
    Err(DnsError::Config(format!(
        "unix socket docker host {socket:?} is not supported on this platform"
    )))
}

/// One HTTP/1.1 GET over a fresh connection to the engine socket.
#[cfg(unix)]
async fn unix_get(socket: &Path, target: &str) -> Result<Bytes, OrchestratorError> {
    let stream = UnixStream::connect(socket).await?;
    let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(error = %e, "docker socket connection closed");
        }
    });

    let request = Request::get(target)
        .header(header::HOST, "docker")
        .header(header::USER_AGENT, USER_AGENT)
        .body(Empty::<Bytes>::new())
        .map_err(|e| OrchestratorError::Unavailable(format!("invalid request {target:?}: {e}")))?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    if !status.is_success() {
        return Err(OrchestratorError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).trim().to_string(),
        });
    }
    Ok(body)
}

#[async_trait]
impl Orchestrator for DockerClient {
    async fn list_services(&self, label: &str) -> Result<Vec<ClusterService>, OrchestratorError> {
        let services: Vec<wire::Service> = self
            .get("/services", Some(serde_json::json!({ "label": [label] })))
            .await?;
        Ok(services.into_iter().map(ClusterService::from).collect())
    }

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<Task>, OrchestratorError> {
        let tasks: Vec<wire::Task> = self
            .get("/tasks", Some(serde_json::json!({ "service": [service_id] })))
            .await?;
        Ok(tasks.into_iter().map(Task::from).collect())
    }

    async fn inspect_task(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        let task: wire::Task = self.get(&format!("/tasks/{task_id}"), None).await?;
        Ok(task.into())
    }

    async fn inspect_node(&self, node_id: &str) -> Result<Node, OrchestratorError> {
        let node: wire::Node = self.get(&format!("/nodes/{node_id}"), None).await?;
        Ok(node.into())
    }
}
