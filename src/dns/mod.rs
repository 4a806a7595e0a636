//! DNS Server Module
//!
//! Answers node-name queries from the network prefix, answers the cluster
//! alias with every worker, and relays everything else upstream.
//!
//! ## Resolution
//!
//! - `worker-<n>`, `controller-<n>`: one A record `<prefix>.<n>`
//! - `*k8s`: one A record per configured worker, in random order
//! - anything else (and any non-A query): relayed to the upstream resolver

mod handler;
mod rules;
mod server;
mod synth;
mod upstream;
mod wire;

pub use handler::ClusterDnsHandler;
pub use server::DnsListeners;
