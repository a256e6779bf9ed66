//! Query router: answers the questions of one DNS message.

use hickory_proto::op::{Header, Message, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Record, RecordType};
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::cluster::ClusterState;
use crate::config::SchemaVersion;
use crate::error::ResolveError;
use crate::grammar::{self, TaskName};
use crate::metrics::{self, QueryResult};
use crate::records;

/// Dispatches questions by type and assembles the reply.
pub struct QueryRouter {
    cluster: Arc<dyn ClusterState>,
    base_domain: String,
    schema: SchemaVersion,
}

impl QueryRouter {
    /// Create a router answering for `base_domain`.
    pub fn new(
        cluster: Arc<dyn ClusterState>,
        base_domain: impl Into<String>,
        schema: SchemaVersion,
    ) -> Self {
        Self {
            cluster,
            base_domain: base_domain.into().trim_matches('.').to_string(),
            schema,
        }
    }

    /// Handle one message.
    ///
    /// Returns `None` for anything but a standard query. A message whose first
    /// question lies outside the base domain is refused. Otherwise questions
    /// are answered in order; the first error that [aborts the
    /// message](ResolveError::aborts_message) stops further questions, and the
    /// reply carries whatever was answered before it.
    pub async fn handle(&self, request: &Message) -> Option<Message> {
        if request.op_code() != OpCode::Query {
            debug!(id = request.id(), op_code = ?request.op_code(), "ignoring non-query message");
            return None;
        }

        let mut reply = Message::new();
        reply.set_header(Header::response_from_request(request.header()));
        reply.add_queries(request.queries().iter().cloned());

        if let Some(first) = request.queries().first() {
            if !grammar::in_zone(&first.name().to_ascii(), &self.base_domain) {
                debug!(name = %first.name(), "question outside zone, refusing");
                metrics::record_question(first.query_type(), QueryResult::Refused);
                reply.set_response_code(ResponseCode::Refused);
                return Some(reply);
            }
        }

        for query in request.queries() {
            let rtype = query.query_type();
            match self.answer(query).await {
                Ok(answers) => {
                    metrics::record_question(rtype, QueryResult::Answered);
                    reply.add_answers(answers);
                }
                Err(e) if e.aborts_message() => {
                    match &e {
                        ResolveError::NameNotMatched(_) | ResolveError::NotAttached { .. } => {
                            debug!(name = %query.name(), error = %e, "no answer, stopping")
                        }
                        _ => error!(name = %query.name(), rtype = ?rtype, error = %e, "query failed"),
                    }
                    metrics::record_question(rtype, QueryResult::from(&e));
                    break;
                }
                Err(e) => {
                    debug!(name = %query.name(), rtype = ?rtype, error = %e, "no answer");
                    metrics::record_question(rtype, QueryResult::from(&e));
                }
            }
        }

        Some(reply)
    }

    /// Answer a single question.
    async fn answer(&self, query: &Query) -> Result<Vec<Record>, ResolveError> {
        let qname = query.name();
        let name = qname.to_ascii();
        trace!(name = %name, rtype = ?query.query_type(), "query");

        match query.query_type() {
            RecordType::A => {
                let task = TaskName::parse(&name, &self.base_domain, self.schema)?;
                let addresses = match &task.network {
                    Some(network) => vec![
                        self.cluster
                            .resolve_task_address(&task.task_id, network)
                            .await?,
                    ],
                    None => self.cluster.resolve_task_addresses(&task.task_id).await?,
                };

                Ok(addresses
                    .iter()
                    .filter_map(|address| {
                        skip_failed(records::a_record(qname, address))
                            .inspect(|_| debug!(name = %name, %address, "A answer"))
                    })
                    .collect())
            }
            RecordType::SRV => {
                let group = grammar::group_name(&name, &self.base_domain)?;
                let endpoints = self.cluster.resolve_group(group).await?;

                Ok(endpoints
                    .iter()
                    .filter_map(|endpoint| {
                        skip_failed(records::srv_record(qname, endpoint, &self.base_domain))
                            .inspect(|_| {
                                debug!(name = %name, target = %endpoint.name, port = endpoint.port, "SRV answer")
                            })
                    })
                    .collect())
            }
            _ => {
                trace!(name = %name, rtype = ?query.query_type(), "unsupported record type");
                Ok(Vec::new())
            }
        }
    }
}

fn skip_failed(record: Result<Record, ResolveError>) -> Option<Record> {
    record
        .map_err(|e| error!(error = %e, "skipping record"))
        .ok()
}
