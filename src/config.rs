//! Resolver Configuration
//!
//! Values consumed once at startup: the network prefix used to build
//! synthetic addresses, the per-role node lists, and the upstream resolver
//! that receives every query no rule answers.
//!
//! Layering is file, then CLI/environment overrides, then `validate()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Main configuration for the resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    // === Network ===

    /// Address the UDP and TCP listeners bind to
    pub listen_addr: IpAddr,

    /// Port for both DNS listeners
    pub dns_port: u16,

    /// Port for the HTTP API (disabled when unset)
    pub api_port: Option<u16>,

    // === Synthesis ===

    /// Three-octet prefix joined with a node index, e.g. "10.11.12"
    pub network_prefix: String,

    /// Names ending with this suffix resolve to every worker
    pub alias_suffix: String,

    /// Worker nodes, space-separated `worker-<index>` entries
    pub workers: NodeList,

    /// Controller nodes, space-separated `controller-<index>` entries
    pub controllers: NodeList,

    // === Upstream ===

    /// Resolver that receives every query no rule answers
    pub upstream: SocketAddr,

    /// Bound on a single upstream round trip (milliseconds)
    pub upstream_timeout_ms: u64,

    // === Limits ===

    /// Idle TCP connections are closed after this many seconds
    pub tcp_idle_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            // Network
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dns_port: 53,
            api_port: None,

            // Synthesis
            network_prefix: "10.11.12".to_string(),
            alias_suffix: "k8s".to_string(),
            workers: NodeList::default(),
            controllers: NodeList::default(),

            // Upstream (VirtualBox NAT resolver)
            upstream: SocketAddr::from(([10, 0, 2, 2], 53)),
            upstream_timeout_ms: 3000,

            // Limits
            tcp_idle_timeout_secs: 30,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Address both DNS listeners bind to
    pub fn dns_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.dns_port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn tcp_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_idle_timeout_secs)
    }

    /// Render the synthetic address for a node index
    pub fn node_address(&self, index: &str) -> String {
        format!("{}.{}", self.network_prefix, index)
    }

    // Builder-style methods for CLI overrides

    pub fn with_listen_addr(mut self, addr: Option<IpAddr>) -> Self {
        if let Some(addr) = addr {
            self.listen_addr = addr;
        }
        self
    }

    pub fn with_dns_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.dns_port = port;
        }
        self
    }

    pub fn with_api_port(mut self, port: Option<u16>) -> Self {
        if port.is_some() {
            self.api_port = port;
        }
        self
    }

    pub fn with_network_prefix(mut self, prefix: Option<String>) -> Self {
        if let Some(prefix) = prefix {
            self.network_prefix = prefix;
        }
        self
    }

    pub fn with_upstream(mut self, upstream: Option<SocketAddr>) -> Self {
        if let Some(upstream) = upstream {
            self.upstream = upstream;
        }
        self
    }

    pub fn with_upstream_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        if let Some(timeout_ms) = timeout_ms {
            self.upstream_timeout_ms = timeout_ms;
        }
        self
    }

    pub fn with_alias_suffix(mut self, suffix: Option<String>) -> Self {
        if let Some(suffix) = suffix {
            self.alias_suffix = suffix;
        }
        self
    }

    pub fn with_workers(mut self, workers: Option<String>) -> Self {
        if let Some(workers) = workers {
            self.workers = NodeList::from(workers);
        }
        self
    }

    pub fn with_controllers(mut self, controllers: Option<String>) -> Self {
        if let Some(controllers) = controllers {
            self.controllers = NodeList::from(controllers);
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        // Every synthesized address must encode, so the prefix must too
        let octets = self.network_prefix.split('.').count();
        if octets != 3 || format!("{}.0", self.network_prefix).parse::<Ipv4Addr>().is_err() {
            anyhow::bail!(
                "network_prefix ({:?}) must be three dot-separated octets, e.g. 10.11.12",
                self.network_prefix
            );
        }

        if self.upstream_timeout_ms == 0 {
            anyhow::bail!("upstream_timeout_ms must be greater than zero");
        }

        if self.alias_suffix.is_empty() {
            anyhow::bail!("alias_suffix must not be empty");
        }

        for (role, list) in [("workers", &self.workers), ("controllers", &self.controllers)] {
            for entry in list.entries() {
                if parse_node_entry(entry).is_none() {
                    warn!("{} entry {:?} is not <role>-<index> and will be ignored", role, entry);
                }
            }
        }

        Ok(())
    }
}

/// Ordered node identifiers sourced from a space-separated string.
///
/// Entries are kept verbatim; malformed ones are skipped by
/// [`NodeList::indices`] and duplicates are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodeList(Vec<String>);

impl NodeList {
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Index strings of every well-formed entry, in list order
    pub fn indices(&self) -> impl Iterator<Item = &str> {
        self.entries().filter_map(parse_node_entry).map(|(_, index)| index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for NodeList {
    fn from(value: String) -> Self {
        NodeList::from(value.as_str())
    }
}

impl From<&str> for NodeList {
    fn from(value: &str) -> Self {
        NodeList(value.split_whitespace().map(str::to_string).collect())
    }
}

impl From<NodeList> for String {
    fn from(value: NodeList) -> Self {
        value.0.join(" ")
    }
}

impl fmt::Display for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Split a `<role>-<index>` node identifier.
///
/// Returns `None` unless the role is non-empty and the index is one or more
/// ASCII digits.
pub fn parse_node_entry(entry: &str) -> Option<(&str, &str)> {
    let (role, index) = entry.split_once('-')?;
    if role.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((role, index))
}
