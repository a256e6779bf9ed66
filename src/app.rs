//! Resolver assembly shared by the binary and the integration tests.

use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::chain::{self, Handler};
use crate::cluster::{Orchestrator, SwarmAdapter};
use crate::config::{Config, DnsConfig};
use crate::error::DnsError;
use crate::router::QueryRouter;
use crate::server::DnsServer;
use crate::telemetry;

/// Wire adapter, router and the latency histogram around `orchestrator`.
pub fn build_handler(dns: &DnsConfig, orchestrator: Arc<dyn Orchestrator>) -> Handler {
    let cluster = Arc::new(SwarmAdapter::new(
        orchestrator,
        dns.label_prefix.clone(),
        dns.schema,
    ));
    let router = Arc::new(QueryRouter::new(
        cluster,
        dns.base_domain.clone(),
        dns.schema,
    ));
    chain::chain(
        chain::router_handler(router),
        [chain::processing_time_histogram()],
    )
}

/// Start the metrics endpoint, then answer DNS on `socket` until `shutdown`
/// is cancelled.
///
/// A metrics endpoint that cannot start is logged and skipped; only the DNS
/// server's own failure is returned.
pub async fn serve(
    config: Config,
    orchestrator: Arc<dyn Orchestrator>,
    socket: UdpSocket,
    shutdown: CancellationToken,
) -> Result<(), DnsError> {
    if let Err(e) = telemetry::init_metrics(&config.telemetry) {
        warn!(error = %e, "metrics endpoint failed, serving DNS without it");
    }

    let handler = build_handler(&config.dns, orchestrator);
    DnsServer::new(config.dns, handler)
        .serve(socket, shutdown)
        .await
}
