//! Shared test infrastructure for resolution and server tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::SRV;
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use kallax::chain::{self, Handler};
use kallax::cluster::{ClusterService, NetworkAttachment, Node, Orchestrator, Task, TaskState};
use kallax::server::DnsHandler;
use kallax::{OrchestratorError, QueryRouter, SchemaVersion, SwarmAdapter};

// --- Constants ---

pub const BASE_DOMAIN: &str = "kallax.local";
pub const LABEL_PREFIX: &str = "kallax.group";

// --- FakeOrchestrator ---

#[derive(Default)]
struct FakeCluster {
    services: Vec<ClusterService>,
    tasks: HashMap<String, Vec<Task>>,
    nodes: HashMap<String, String>,
}

/// In-memory Swarm control plane that counts the calls made against it.
#[derive(Default)]
pub struct FakeOrchestrator {
    cluster: Mutex<FakeCluster>,
    pub service_lists: AtomicUsize,
    pub task_inspects: AtomicUsize,
    pub node_inspects: AtomicUsize,
    unavailable: Mutex<bool>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service carrying `kallax.group.<group> = <label_value>`.
    pub fn add_service(&self, id: &str, name: &str, group: &str, label_value: &str) {
        let mut labels = HashMap::new();
        labels.insert(format!("{LABEL_PREFIX}.{group}"), label_value.to_string());
        self.cluster.lock().unwrap().services.push(ClusterService {
            id: id.to_string(),
            name: name.to_string(),
            labels,
        });
    }

    pub fn add_task(&self, service_id: &str, task: Task) {
        self.cluster
            .lock()
            .unwrap()
            .tasks
            .entry(service_id.to_string())
            .or_default()
            .push(task);
    }

    pub fn add_node(&self, id: &str, hostname: &str) {
        self.cluster
            .lock()
            .unwrap()
            .nodes
            .insert(id.to_string(), hostname.to_string());
    }

    /// Make every subsequent call fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check_available(&self) -> Result<(), OrchestratorError> {
        if *self.unavailable.lock().unwrap() {
            return Err(OrchestratorError::Unavailable("manager unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn list_services(&self, label: &str) -> Result<Vec<ClusterService>, OrchestratorError> {
        self.service_lists.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let cluster = self.cluster.lock().unwrap();
        Ok(cluster
            .services
            .iter()
            .filter(|s| s.labels.contains_key(label))
            .cloned()
            .collect())
    }

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<Task>, OrchestratorError> {
        self.check_available()?;
        let cluster = self.cluster.lock().unwrap();
        Ok(cluster.tasks.get(service_id).cloned().unwrap_or_default())
    }

    async fn inspect_task(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        self.task_inspects.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let cluster = self.cluster.lock().unwrap();
        cluster
            .tasks
            .values()
            .flatten()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::Unavailable(format!("no such task {task_id}")))
    }

    async fn inspect_node(&self, node_id: &str) -> Result<Node, OrchestratorError> {
        self.node_inspects.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let cluster = self.cluster.lock().unwrap();
        cluster
            .nodes
            .get(node_id)
            .map(|hostname| Node {
                id: node_id.to_string(),
                hostname: hostname.clone(),
            })
            .ok_or_else(|| OrchestratorError::Unavailable(format!("no such node {node_id}")))
    }
}

// --- Task builders ---

/// A task with a single network attachment.
pub fn task(id: &str, slot: u64, node_id: &str, state: TaskState, network: &str, addr: &str) -> Task {
    Task {
        id: id.to_string(),
        slot,
        node_id: node_id.to_string(),
        state,
        networks: vec![NetworkAttachment {
            network_id: network.to_string(),
            addresses: vec![addr.to_string()],
        }],
    }
}

pub fn running_task(id: &str, slot: u64, node_id: &str, network: &str, addr: &str) -> Task {
    task(id, slot, node_id, TaskState::Running, network, addr)
}

/// The cluster from the end-to-end scenario: group `web`, one running task.
pub fn web_cluster() -> FakeOrchestrator {
    let orchestrator = FakeOrchestrator::new();
    orchestrator.add_node("node-id-1", "worker-1");
    orchestrator.add_service(
        "svc-web",
        "web",
        "web",
        r#"{"http":{"port":8080,"network":"netA"}}"#,
    );
    orchestrator.add_task(
        "svc-web",
        running_task("abc123", 1, "node-id-1", "netA", "10.0.0.9/24"),
    );
    orchestrator
}

// --- Handler wiring ---

pub fn adapter(orchestrator: Arc<FakeOrchestrator>, schema: SchemaVersion) -> Arc<SwarmAdapter> {
    Arc::new(SwarmAdapter::new(orchestrator, LABEL_PREFIX, schema))
}

pub fn router(orchestrator: Arc<FakeOrchestrator>, schema: SchemaVersion) -> Arc<QueryRouter> {
    Arc::new(QueryRouter::new(
        adapter(orchestrator, schema),
        BASE_DOMAIN,
        schema,
    ))
}

/// Router wrapped in a latency adapter that counts observations.
pub fn chained_handler(
    orchestrator: Arc<FakeOrchestrator>,
    schema: SchemaVersion,
) -> (Handler, Arc<AtomicUsize>) {
    let observations = Arc::new(AtomicUsize::new(0));
    let counter = observations.clone();
    let handler = chain::chain(
        chain::router_handler(router(orchestrator, schema)),
        [chain::observe_latency(move |_elapsed| {
            counter.fetch_add(1, Ordering::SeqCst);
        })],
    );
    (handler, observations)
}

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and
/// stored as raw wire-format bytes.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// The captured response, or `None` if nothing was sent.
    pub fn message(&self) -> Option<Message> {
        let buf = self.buf.lock().unwrap();
        if buf.is_empty() {
            return None;
        }
        Some(Message::from_vec(&buf).expect("failed to parse captured DNS response"))
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(io::Error::other)?;
        Ok(info)
    }
}

// --- Query/Request construction ---

/// Build a query message with the given questions.
pub fn build_query(questions: &[(&str, RecordType)], id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    for (name, record_type) in questions {
        let mut query = Query::new();
        query.set_name(Name::from_ascii(name).unwrap());
        query.set_query_type(*record_type);
        query.set_query_class(DNSClass::IN);
        msg.add_query(query);
    }
    msg
}

/// Build wire-format bytes for a single-question DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    build_query(&[(name, record_type)], id).to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

pub fn test_src() -> SocketAddr {
    "10.0.0.1:12345".parse().unwrap()
}

/// Run wire bytes through a `DnsHandler` and return the reply, if any.
pub async fn execute_bytes(handler: &DnsHandler, bytes: &[u8]) -> Option<Message> {
    let request = Request::new(parse_message_request(bytes), test_src(), Protocol::Udp);
    let response = TestResponseHandler::new();
    handler.handle_request(&request, response.clone()).await;
    response.message()
}

// --- Response helpers ---

/// Extract A addresses from a response.
pub fn extract_a(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(a.0),
            _ => None,
        })
        .collect()
}

/// Extract SRV rdata from a response.
pub fn extract_srv(msg: &Message) -> Vec<SRV> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::SRV(srv) => Some(srv.clone()),
            _ => None,
        })
        .collect()
}

/// SRV targets as strings, sorted.
pub fn srv_targets(msg: &Message) -> Vec<String> {
    let mut targets: Vec<String> = extract_srv(msg)
        .iter()
        .map(|srv| srv.target().to_ascii())
        .collect();
    targets.sort();
    targets
}
