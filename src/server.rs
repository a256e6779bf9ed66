//! DNS server setup and lifecycle management.

use async_trait::async_trait;
use hickory_proto::op::Message;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use hickory_server::ServerFuture;
use std::iter;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::chain::Handler;
use crate::config::DnsConfig;
use crate::error::DnsError;

/// Bridges hickory's request handling to a chained message [`Handler`].
pub struct DnsHandler {
    handler: Handler,
}

impl DnsHandler {
    /// Wrap a chained handler.
    pub fn new(handler: Handler) -> Self {
        Self { handler }
    }
}

/// Rebuild the parsed request as a plain message for the handler chain.
fn to_message(request: &Request) -> Message {
    let mut message = Message::new();
    message.set_header(*request.header());
    message.add_queries(request.queries().iter().map(|q| q.original().clone()));
    message
}

#[async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let Some(reply) = (self.handler)(to_message(request)).await else {
            return ResponseInfo::from(*request.header());
        };

        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(
            *reply.header(),
            reply.answers().iter(),
            iter::empty(),
            iter::empty(),
            iter::empty(),
        );

        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!(id = reply.id(), error = %e, "failed to write DNS reply");
                ResponseInfo::from(*reply.header())
            }
        }
    }
}

/// UDP DNS server answering through a chained handler.
pub struct DnsServer {
    config: DnsConfig,
    handler: Handler,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration and handler.
    pub fn new(config: DnsConfig, handler: Handler) -> Self {
        Self { config, handler }
    }

    /// Bind a UDP listen address.
    pub async fn bind(addr: SocketAddr) -> Result<UdpSocket, DnsError> {
        let socket = UdpSocket::bind(addr).await?;
        info!(%addr, "DNS UDP listening");
        Ok(socket)
    }

    /// Bind the configured address and serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        let socket = Self::bind(self.config.listen_addr).await?;
        self.serve(socket, shutdown).await
    }

    /// Serve on an already bound socket until `shutdown` is cancelled.
    ///
    /// On shutdown the socket stops accepting new messages; in-flight
    /// orchestrator calls are not cancelled.
    pub async fn serve(self, socket: UdpSocket, shutdown: CancellationToken) -> Result<(), DnsError> {
        info!(
            base_domain = %self.config.base_domain,
            schema = ?self.config.schema,
            "DNS server ready to serve queries"
        );

        let mut server = ServerFuture::new(DnsHandler::new(self.handler));
        server.register_socket(socket);

        let shutdown_requested = tokio::select! {
            _ = shutdown.cancelled() => true,
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
                false
            }
        };

        if shutdown_requested {
            info!("DNS server shutdown requested");
            server.shutdown_gracefully().await?;
        }

        info!("DNS server stopped");
        Ok(())
    }
}
