//! cluster-dns
//!
//! DNS responder for virtualized clusters. Node names resolve to synthetic
//! private addresses, the cluster alias resolves to every worker, and all
//! other queries are relayed to an upstream resolver.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CLUSTER DNS                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  UDP/TCP Listener (53)  ←── Client queries                  │
//! │  Rule Matcher           ←── node name / alias / passthrough │
//! │  Address Synthesizer    ←── <prefix>.<index>, TTL 10        │
//! │  Upstream Proxy         ──→ Upstream resolver (UDP)         │
//! │  HTTP API (optional)    ←── Health and metrics              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

mod api;
mod config;
mod dns;
mod types;

use api::Metrics;
use config::ResolverConfig;
use dns::{ClusterDnsHandler, DnsListeners};

/// cluster-dns - node-name DNS responder with upstream passthrough
#[derive(Parser, Debug)]
#[command(name = "cluster-dns")]
#[command(version)]
#[command(about = "Resolves cluster node names and relays everything else upstream", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cluster-dns.toml")]
    config: PathBuf,

    /// Address to bind the DNS listeners to
    #[arg(long, env = "DNS_LISTEN_ADDR")]
    listen_addr: Option<IpAddr>,

    /// DNS server port, UDP and TCP (port 53 requires root or CAP_NET_BIND_SERVICE)
    #[arg(long, env = "DNS_PORT")]
    dns_port: Option<u16>,

    /// Three-octet network prefix for synthetic addresses, e.g. 10.11.12
    #[arg(long, env = "IP_PREFIX")]
    ip_prefix: Option<String>,

    /// Upstream resolver for passthrough queries (host:port)
    #[arg(long, env = "DNS_UPSTREAM")]
    upstream: Option<SocketAddr>,

    /// Upstream round-trip timeout in milliseconds
    #[arg(long)]
    upstream_timeout_ms: Option<u64>,

    /// Suffix of names that resolve to every worker
    #[arg(long)]
    alias_suffix: Option<String>,

    /// Space-separated worker nodes, e.g. "worker-1 worker-2"
    #[arg(long, env = "WORKERS")]
    workers: Option<String>,

    /// Space-separated controller nodes, e.g. "controller-1"
    #[arg(long, env = "CONTROLLERS")]
    controllers: Option<String>,

    /// HTTP API port for health and metrics (disabled when unset)
    #[arg(long)]
    api_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into())
        )
        .init();

    info!("🌐 cluster-dns v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        ResolverConfig::load(&args.config)?
    } else {
        warn!("Config file {:?} not found, using defaults", args.config);
        ResolverConfig::default()
    };

    // Override config with CLI args and environment
    let config = config
        .with_listen_addr(args.listen_addr)
        .with_dns_port(args.dns_port)
        .with_network_prefix(args.ip_prefix)
        .with_upstream(args.upstream)
        .with_upstream_timeout_ms(args.upstream_timeout_ms)
        .with_alias_suffix(args.alias_suffix)
        .with_workers(args.workers)
        .with_controllers(args.controllers)
        .with_api_port(args.api_port);

    config.validate()?;

    info!("⚙️  Configuration:");
    info!("   DNS address: {}", config.dns_addr());
    info!("   Network prefix: {}", config.network_prefix);
    info!("   Alias suffix: {}", config.alias_suffix);
    info!("   Workers: [{}]", config.workers);
    info!("   Controllers: [{}]", config.controllers);
    info!("   Upstream: {} (timeout {}ms)", config.upstream, config.upstream_timeout_ms);

    let shared_config = Arc::new(config);
    let metrics = Arc::new(Metrics::new());

    // Bind before serving anything; a bind failure ends the process here
    let listeners = DnsListeners::bind(shared_config.dns_addr()).await?;

    let handler = Arc::new(ClusterDnsHandler::new(shared_config.clone(), metrics.clone()));

    let dns_handle = tokio::spawn(listeners.serve(handler, shared_config.tcp_idle_timeout()));

    let api_handle = match shared_config.api_port {
        Some(port) => tokio::spawn(api::run_api_server(shared_config.clone(), metrics.clone(), port)),
        None => tokio::spawn(std::future::pending::<anyhow::Result<()>>()),
    };

    info!("✅ Resolver started");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
        }
        result = dns_handle => {
            error!("DNS server exited: {:?}", result);
            result??;
        }
        result = api_handle => {
            error!("HTTP API exited: {:?}", result);
            result??;
        }
    }

    info!("👋 cluster-dns shutting down");
    Ok(())
}
