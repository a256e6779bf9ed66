//! Cluster state adapter.
//!
//! Turns orchestrator objects (services, tasks, nodes, labels) into
//! [`Endpoint`]s and task addresses. Nothing is cached except node display
//! names: every group and address resolution goes to the control plane.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::SchemaVersion;
use crate::error::{OrchestratorError, ResolveError};
use crate::grammar::TaskName;
use crate::metrics;

/// A named, ported access point exposed by one running task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Task name relative to the base domain (see [`TaskName`]).
    pub name: String,
    /// Port from the endpoint spec.
    pub port: u16,
}

/// Declared configuration of one logical endpoint of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    /// Port the endpoint listens on.
    pub port: u16,
    /// Network the endpoint is reachable on; absent under the legacy schema.
    pub network: Option<String>,
}

#[derive(Deserialize)]
struct CurrentSpec {
    port: u16,
    network: String,
}

/// Decode a discovery label value into endpoint name -> spec.
pub fn decode_endpoint_specs(
    value: &str,
    schema: SchemaVersion,
) -> Result<BTreeMap<String, EndpointSpec>, serde_json::Error> {
    match schema {
        SchemaVersion::Current => {
            let specs: BTreeMap<String, CurrentSpec> = serde_json::from_str(value)?;
            Ok(specs
                .into_iter()
                .map(|(name, spec)| {
                    let spec = EndpointSpec {
                        port: spec.port,
                        network: Some(spec.network),
                    };
                    (name, spec)
                })
                .collect())
        }
        SchemaVersion::Legacy => {
            let ports: BTreeMap<String, u16> = serde_json::from_str(value)?;
            Ok(ports
                .into_iter()
                .map(|(name, port)| (name, EndpointSpec { port, network: None }))
                .collect())
        }
    }
}

/// An orchestrator-visible deployment unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterService {
    /// Service id.
    pub id: String,
    /// Service name.
    pub name: String,
    /// Service labels.
    pub labels: HashMap<String, String>,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Task was created.
    New,
    /// Task is waiting for resources or scheduling.
    Pending,
    /// Task is assigned to a node.
    Assigned,
    /// Task is preparing to run.
    Preparing,
    /// Task is starting.
    Starting,
    /// Task is running; the only state that contributes endpoints.
    Running,
    /// Task exited successfully.
    Complete,
    /// Task was shut down.
    Shutdown,
    /// Task failed.
    Failed,
    /// Task was rejected.
    Rejected,
    /// Any other state.
    #[serde(other)]
    Other,
}

/// One instance of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Task id.
    pub id: String,
    /// Slot within the service (0 for global services).
    pub slot: u64,
    /// Node the task is scheduled on.
    pub node_id: String,
    /// Current state.
    pub state: TaskState,
    /// Network attachments in orchestrator order.
    pub networks: Vec<NetworkAttachment>,
}

/// Addresses a task holds on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// Network id.
    pub network_id: String,
    /// Addresses, usually in CIDR notation ("10.0.0.5/24").
    pub addresses: Vec<String>,
}

/// A cluster node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node id.
    pub id: String,
    /// Node hostname, used as its display name.
    pub hostname: String,
}

/// Control-plane operations the adapter needs.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// List services carrying `label` (any value).
    async fn list_services(&self, label: &str) -> Result<Vec<ClusterService>, OrchestratorError>;

    /// List all tasks of a service.
    async fn list_tasks(&self, service_id: &str) -> Result<Vec<Task>, OrchestratorError>;

    /// Inspect a single task.
    async fn inspect_task(&self, task_id: &str) -> Result<Task, OrchestratorError>;

    /// Inspect a single node.
    async fn inspect_node(&self, node_id: &str) -> Result<Node, OrchestratorError>;
}

/// Resolution interface consumed by the query router.
#[async_trait]
pub trait ClusterState: Send + Sync {
    /// All endpoints of running tasks of services labelled for `group`.
    async fn resolve_group(&self, group: &str) -> Result<Vec<Endpoint>, ResolveError>;

    /// Address of a task on a network, CIDR suffix stripped. The network id
    /// is matched ASCII case-insensitively, as it arrives in a DNS name.
    async fn resolve_task_address(
        &self,
        task_id: &str,
        network_id: &str,
    ) -> Result<String, ResolveError>;

    /// Every address of a task, unfiltered (legacy schema).
    async fn resolve_task_addresses(&self, task_id: &str) -> Result<Vec<String>, ResolveError>;
}

/// [`ClusterState`] backed by a Swarm-style orchestrator.
pub struct SwarmAdapter {
    orchestrator: Arc<dyn Orchestrator>,
    label_prefix: String,
    schema: SchemaVersion,
    /// node_id -> hostname; filled on first miss, never evicted.
    node_names: Mutex<HashMap<String, String>>,
}

impl SwarmAdapter {
    /// Create an adapter using `<label_prefix>.<group>` discovery labels.
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        label_prefix: impl Into<String>,
        schema: SchemaVersion,
    ) -> Self {
        Self {
            orchestrator,
            label_prefix: label_prefix.into(),
            schema,
            node_names: Mutex::new(HashMap::new()),
        }
    }

    /// Label key for a group.
    pub fn group_label(&self, group: &str) -> String {
        format!("{}.{}", self.label_prefix, group)
    }

    /// Read-through node name lookup.
    ///
    /// The lock is held across the inspect call, so concurrent misses are
    /// serialized and each node id is inspected at most once.
    async fn node_name(&self, node_id: &str) -> Result<String, ResolveError> {
        let mut names = self.node_names.lock().await;
        if let Some(name) = names.get(node_id) {
            metrics::record_node_cache(true);
            return Ok(name.clone());
        }
        metrics::record_node_cache(false);

        let node = self
            .orchestrator
            .inspect_node(node_id)
            .await
            .map_err(|source| ResolveError::NodeLookup {
                node_id: node_id.to_string(),
                source,
            })?;

        debug!(node_id, hostname = %node.hostname, "cached node name");
        names.insert(node_id.to_string(), node.hostname.clone());
        Ok(node.hostname)
    }

    /// Display name for a task's node, falling back to the raw id.
    async fn node_display_name(&self, node_id: &str) -> String {
        if self.schema == SchemaVersion::Legacy {
            return node_id.to_string();
        }
        match self.node_name(node_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(node_id, error = %e, "node lookup failed, using node id");
                node_id.to_string()
            }
        }
    }
}

#[async_trait]
impl ClusterState for SwarmAdapter {
    async fn resolve_group(&self, group: &str) -> Result<Vec<Endpoint>, ResolveError> {
        let label = self.group_label(group);
        let services = self.orchestrator.list_services(&label).await?;

        let mut endpoints = Vec::new();
        for service in services {
            let value = service.labels.get(&label).map(String::as_str).unwrap_or("");
            let specs = decode_endpoint_specs(value, self.schema).map_err(|source| {
                ResolveError::LabelDecode {
                    label: label.clone(),
                    service: service.name.clone(),
                    source,
                }
            })?;

            let tasks = self.orchestrator.list_tasks(&service.id).await?;
            for task in tasks.iter().filter(|t| t.state == TaskState::Running) {
                let node = self.node_display_name(&task.node_id).await;

                for (endpoint, spec) in &specs {
                    let name = TaskName {
                        endpoint: endpoint.clone(),
                        slot: task.slot,
                        task_id: task.id.clone(),
                        service: service.name.clone(),
                        node: node.clone(),
                        network: spec.network.clone(),
                    };
                    endpoints.push(Endpoint {
                        name: name.to_string(),
                        port: spec.port,
                    });
                }
            }
        }

        debug!(group, count = endpoints.len(), "resolved group endpoints");
        metrics::record_endpoints_returned(endpoints.len());
        Ok(endpoints)
    }

    async fn resolve_task_address(
        &self,
        task_id: &str,
        network_id: &str,
    ) -> Result<String, ResolveError> {
        let task = self.orchestrator.inspect_task(task_id).await?;

        task.networks
            .iter()
            .find(|n| {
                n.network_id.eq_ignore_ascii_case(network_id) && !n.addresses.is_empty()
            })
            .and_then(|n| n.addresses.first())
            .map(|addr| canonical_address(addr))
            .ok_or_else(|| ResolveError::NotAttached {
                task_id: task_id.to_string(),
                network_id: network_id.to_string(),
            })
    }

    async fn resolve_task_addresses(&self, task_id: &str) -> Result<Vec<String>, ResolveError> {
        let task = self.orchestrator.inspect_task(task_id).await?;

        Ok(task
            .networks
            .iter()
            .flat_map(|n| n.addresses.iter())
            .map(|addr| canonical_address(addr))
            .collect())
    }
}

/// Strip a CIDR suffix and normalize the address text.
///
/// Unparsable input is returned stripped but otherwise untouched; record
/// construction rejects it later.
pub fn canonical_address(addr: &str) -> String {
    let host = addr.split_once('/').map_or(addr, |(host, _)| host);
    match host.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => host.to_string(),
    }
}
