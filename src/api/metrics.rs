//! Metrics Collection
//!
//! Counters for monitoring the resolver. Purely observational: nothing
//! here influences how a query is answered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics collector for the resolver
#[derive(Default)]
pub struct Metrics {
    /// Start time for uptime calculation
    start_time: Option<Instant>,

    /// Messages received on either transport
    pub queries: AtomicU64,

    /// Queries answered from a node name
    pub node_answers: AtomicU64,

    /// Queries answered from the cluster alias
    pub alias_answers: AtomicU64,

    /// Queries forwarded upstream
    pub proxied: AtomicU64,

    /// Upstream timeouts and I/O errors
    pub upstream_failures: AtomicU64,

    /// SERVFAIL responses sent
    pub servfail: AtomicU64,

    /// Messages that could not be decoded
    pub malformed: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn inc_queries(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_node_answers(&self) {
        self.node_answers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alias_answers(&self) {
        self.alias_answers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_proxied(&self) {
        self.proxied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_failures(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_servfail(&self) {
        self.servfail.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        // Uptime
        output.push_str(&format!(
            "# HELP cluster_dns_uptime_seconds Resolver uptime in seconds\n\
             # TYPE cluster_dns_uptime_seconds gauge\n\
             cluster_dns_uptime_seconds {}\n\n",
            self.uptime_secs()
        ));

        let counters = [
            ("queries_total", "DNS messages received", &self.queries),
            ("node_answers_total", "Queries answered from a node name", &self.node_answers),
            ("alias_answers_total", "Queries answered from the cluster alias", &self.alias_answers),
            ("proxied_total", "Queries forwarded upstream", &self.proxied),
            ("upstream_failures_total", "Upstream timeouts and errors", &self.upstream_failures),
            ("servfail_total", "SERVFAIL responses sent", &self.servfail),
            ("malformed_total", "Undecodable messages", &self.malformed),
        ];

        for (name, help, counter) in counters {
            output.push_str(&format!(
                "# HELP cluster_dns_{name} {help}\n\
                 # TYPE cluster_dns_{name} counter\n\
                 cluster_dns_{name} {}\n\n",
                counter.load(Ordering::Relaxed)
            ));
        }

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_secs": self.uptime_secs(),
            "queries": self.queries.load(Ordering::Relaxed),
            "answers": {
                "node": self.node_answers.load(Ordering::Relaxed),
                "alias": self.alias_answers.load(Ordering::Relaxed),
            },
            "upstream": {
                "proxied": self.proxied.load(Ordering::Relaxed),
                "failures": self.upstream_failures.load(Ordering::Relaxed),
            },
            "servfail": self.servfail.load(Ordering::Relaxed),
            "malformed": self.malformed.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.inc_queries();
        metrics.inc_queries();
        metrics.inc_proxied();

        assert_eq!(metrics.queries.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.proxied.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.inc_node_answers();
        metrics.inc_upstream_failures();

        let output = metrics.to_prometheus();

        assert!(output.contains("cluster_dns_node_answers_total 1"));
        assert!(output.contains("cluster_dns_upstream_failures_total 1"));
        assert!(output.contains("# TYPE cluster_dns_queries_total counter"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.inc_alias_answers();

        let json = metrics.to_json();

        assert_eq!(json["answers"]["alias"], 1);
        assert_eq!(json["upstream"]["failures"], 0);
    }
}
