//! Error types for kallax.

use thiserror::Error;

/// Process-level errors: startup, configuration and transport.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (socket bind, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error (from orchestrator client initialization)
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Metrics exporter could not be started
    #[error("Metrics exporter error: {0}")]
    Metrics(String),
}

/// A call against the orchestrator control plane failed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Transport failure or non-success HTTP status.
    #[error("orchestrator request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Connecting to the Docker socket failed.
    #[error("orchestrator socket error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP exchange over the Docker socket failed.
    #[error("orchestrator connection failed: {0}")]
    Hyper(#[from] hyper::Error),

    /// The orchestrator answered with a non-success status.
    #[error("orchestrator returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("failed to decode orchestrator response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The orchestrator could not serve the request.
    #[error("orchestrator unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while resolving a single DNS question.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The question name does not follow the name grammar.
    #[error("name {0:?} does not match the name grammar")]
    NameNotMatched(String),

    /// A discovery label value could not be decoded.
    #[error("failed to decode label {label:?} on service {service:?}: {source}")]
    LabelDecode {
        /// Label key.
        label: String,
        /// Service carrying the label.
        service: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Listing services/tasks or inspecting a task failed.
    #[error("cluster query failed: {0}")]
    ClusterQuery(#[from] OrchestratorError),

    /// Resolving a node's hostname failed.
    #[error("failed to inspect node {node_id:?}: {source}")]
    NodeLookup {
        /// Node that could not be inspected.
        node_id: String,
        /// Underlying orchestrator error.
        #[source]
        source: OrchestratorError,
    },

    /// The task has no address on the requested network.
    #[error("task {task_id:?} is not attached to network {network_id:?}")]
    NotAttached {
        /// Task id from the question name.
        task_id: String,
        /// Network id from the question name.
        network_id: String,
    },

    /// A resource record could not be built.
    #[error("failed to construct {rtype} record for {name}: {reason}")]
    RecordConstruction {
        /// Record type being built.
        rtype: &'static str,
        /// Owner name of the record.
        name: String,
        /// What was wrong with the input.
        reason: String,
    },
}

impl ResolveError {
    /// Whether this error stops answering the remaining questions of a message.
    pub fn aborts_message(&self) -> bool {
        matches!(
            self,
            ResolveError::NameNotMatched(_)
                | ResolveError::LabelDecode { .. }
                | ResolveError::ClusterQuery(_)
                | ResolveError::NotAttached { .. }
        )
    }
}
