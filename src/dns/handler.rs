//! DNS Request Handler
//!
//! Drives one inbound message to its response: decode, classify, then
//! either synthesize answers or relay the upstream's reply.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::Metrics;
use crate::config::ResolverConfig;
use crate::dns::rules::{self, Rule};
use crate::dns::synth;
use crate::dns::upstream::UpstreamProxy;
use crate::dns::wire::{self, Rcode, WireError};
use crate::types::{Query, Transport};

/// Everything needed to answer one inbound message independently
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Message bytes exactly as received
    pub raw: Vec<u8>,

    /// Address of the querying client
    pub client_addr: SocketAddr,

    /// Transport the message arrived on
    pub transport: Transport,
}

/// DNS handler shared by the UDP and TCP listeners
pub struct ClusterDnsHandler {
    /// Configuration
    config: Arc<ResolverConfig>,

    /// Passthrough target
    proxy: UpstreamProxy,

    /// Counters
    metrics: Arc<Metrics>,
}

impl ClusterDnsHandler {
    /// Create a new DNS handler
    pub fn new(config: Arc<ResolverConfig>, metrics: Arc<Metrics>) -> Self {
        let proxy = UpstreamProxy::new(config.upstream, config.upstream_timeout());
        Self {
            config,
            proxy,
            metrics,
        }
    }

    /// Produce the response for a transaction.
    ///
    /// Returns `None` when the message is not worth answering at all (too
    /// short to carry an ID, or itself a response).
    pub async fn handle(&self, tx: &Transaction) -> Option<Vec<u8>> {
        self.metrics.inc_queries();

        let request = match wire::parse_request(&tx.raw) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.inc_malformed();
                debug!("Malformed query from {}: {}", tx.client_addr, e);
                return match e {
                    WireError::ShortHeader(_) | WireError::NotAQuery => None,
                    WireError::UnsupportedOpcode(_) => wire::build_error_response(&tx.raw, Rcode::NotImp),
                    _ => wire::build_error_response(&tx.raw, Rcode::FormErr),
                };
            }
        };

        let query = Query {
            name: request.question.name.clone(),
            record_type: request.question.qtype,
            record_class: request.question.qclass,
            client_addr: tx.client_addr,
        };

        let rule = rules::classify(&query, &self.config.alias_suffix);
        debug!("DNS query: {} from {} via {:?} -> {:?}", query, tx.client_addr, tx.transport, rule);

        if rule.is_passthrough() {
            return self.passthrough(tx, &query).await;
        }

        match rule {
            Rule::NodeAddress { .. } => self.metrics.inc_node_answers(),
            _ => self.metrics.inc_alias_answers(),
        }

        let answers = synth::synthesize(&rule, &query, &self.config);
        match wire::build_answer_response(&request, &tx.raw, &answers, tx.transport.max_response_size()) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Cannot answer {} for {}: {}", query, tx.client_addr.ip(), e);
                self.server_failure(&tx.raw)
            }
        }
    }

    /// Relay the query upstream, answering SERVFAIL if that fails
    async fn passthrough(&self, tx: &Transaction, query: &Query) -> Option<Vec<u8>> {
        self.metrics.inc_proxied();

        match self.proxy.forward(&tx.raw).await {
            Ok(response) => {
                debug!(
                    "client {} asked {} relayed {} bytes from {}",
                    tx.client_addr.ip(),
                    query,
                    response.len(),
                    self.proxy.upstream()
                );
                Some(response)
            }
            Err(e) => {
                self.metrics.inc_upstream_failures();
                warn!("Passthrough of {} for {} failed: {}", query, tx.client_addr.ip(), e);
                self.server_failure(&tx.raw)
            }
        }
    }

    fn server_failure(&self, raw: &[u8]) -> Option<Vec<u8>> {
        self.metrics.inc_servfail();
        wire::build_error_response(raw, Rcode::ServFail)
    }
}
