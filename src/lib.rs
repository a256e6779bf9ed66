//! Kallax - DNS service discovery for Docker Swarm.
//!
//! Answers A and SRV queries by translating a fixed name grammar into live
//! lookups against the Swarm control plane. Nothing but node display names is
//! cached; every answer reflects the tasks running at query time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             kallax                               │
//! │                                                                  │
//! │  UDP :5454 ──▶ DnsHandler ──▶ chain (latency) ──▶ QueryRouter    │
//! │                                                      │           │
//! │                       grammar ◀──────────────────────┤           │
//! │                                                      ▼           │
//! │  ┌──────────────┐      ┌──────────────────┐    ┌───────────┐     │
//! │  │ DockerClient │◀─────│   SwarmAdapter   │◀───│  records  │     │
//! │  │  (reqwest)   │      │ (node name cache)│    │  A / SRV  │     │
//! │  └──────────────┘      └──────────────────┘    └───────────┘     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! web.kallax.local. SRV
//!   → services labelled kallax.group.web = {"http":{"port":8080,"network":"netA"}}
//!   → running tasks of those services
//!   → 15 IN SRV 10 0 8080 http.task-1-abc123.web.worker-1.netA.kallax.local.
//!
//! http.task-1-abc123.web.worker-1.netA.kallax.local. A
//!   → inspect task abc123, address on network netA
//!   → 15 IN A 10.0.0.9
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kallax::{app, Config, DnsServer, DockerClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let docker = Arc::new(DockerClient::new(&config.docker).unwrap());
//!
//!     let socket = DnsServer::bind(config.dns.listen_addr).await.unwrap();
//!     app::serve(config, docker, socket, CancellationToken::new())
//!         .await
//!         .unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod app;
pub mod chain;
pub mod cluster;
pub mod config;
pub mod docker;
pub mod error;
pub mod grammar;
pub mod metrics;
pub mod records;
pub mod router;
pub mod server;
pub mod telemetry;

// Re-export main types
pub use cluster::{ClusterState, Endpoint, Orchestrator, SwarmAdapter};
pub use config::{Config, DnsConfig, DockerConfig, SchemaVersion, TelemetryConfig};
pub use docker::DockerClient;
pub use error::{DnsError, OrchestratorError, ResolveError};
pub use router::QueryRouter;
pub use server::DnsServer;
