//! DNS Listeners
//!
//! Binds UDP and TCP on the same address and hands every inbound message
//! to the shared handler in its own task, so a slow upstream round trip
//! never holds up other queries.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::dns::handler::{ClusterDnsHandler, Transaction};
use crate::types::Transport;

/// Largest datagram read from a UDP client
const UDP_RECV_BUFFER: usize = 65535;

/// Bound sockets, ready to serve.
///
/// Binding happens before serving so a partial bind never answers anything.
pub struct DnsListeners {
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
}

impl DnsListeners {
    /// Bind UDP and TCP on `addr`. Either failing is fatal.
    ///
    /// With port 0 the TCP listener takes the port the UDP socket was given.
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let udp = UdpSocket::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind UDP {}: {}", addr, e))?;
        let bound = udp.local_addr()?;

        let tcp = TcpListener::bind(bound)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind TCP {}: {}", bound, e))?;

        Ok(Self {
            udp: Arc::new(udp),
            tcp,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    /// Serve both transports until one of the loops fails
    pub async fn serve(
        self,
        handler: Arc<ClusterDnsHandler>,
        tcp_idle_timeout: Duration,
    ) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        info!("🌐 DNS server listening on {} (UDP+TCP)", addr);

        tokio::select! {
            result = run_udp(self.udp, handler.clone()) => result,
            result = run_tcp(self.tcp, handler, tcp_idle_timeout) => result,
        }
    }
}

/// Receive datagrams and answer each one from its own task
async fn run_udp(socket: Arc<UdpSocket>, handler: Arc<ClusterDnsHandler>) -> anyhow::Result<()> {
    let mut buf = vec![0u8; UDP_RECV_BUFFER];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                let tx = Transaction {
                    raw: buf[..len].to_vec(),
                    client_addr: src,
                    transport: Transport::Udp,
                };
                let handler = handler.clone();
                let socket = socket.clone();

                tokio::spawn(async move {
                    if let Some(response) = handler.handle(&tx).await {
                        if let Err(e) = socket.send_to(&response, src).await {
                            debug!("DNS send error to {}: {}", src, e);
                        }
                    }
                });
            }
            Err(e) => {
                // ICMP errors from earlier sends surface here; keep serving
                error!("DNS UDP socket error: {}", e);
            }
        }
    }
}

/// Accept TCP connections
async fn run_tcp(
    listener: TcpListener,
    handler: Arc<ClusterDnsHandler>,
    idle_timeout: Duration,
) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let handler = handler.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer_addr, handler, idle_timeout).await {
                        debug!("DNS TCP connection error from {}: {}", peer_addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Read length-prefixed messages until EOF or the idle timeout.
///
/// Each message is answered from its own task; responses share the writer.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<ClusterDnsHandler>,
    idle_timeout: Duration,
) -> anyhow::Result<()> {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));

    loop {
        // Read message length (2 bytes, big-endian)
        let mut len_buf = [0u8; 2];
        match tokio::time::timeout(idle_timeout, reader.read_exact(&mut len_buf)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                debug!("Closing idle DNS TCP connection from {}", peer_addr);
                return Ok(());
            }
        }

        let msg_len = u16::from_be_bytes(len_buf) as usize;
        if msg_len == 0 {
            return Ok(());
        }

        let mut raw = vec![0u8; msg_len];
        tokio::time::timeout(idle_timeout, reader.read_exact(&mut raw))
            .await
            .map_err(|_| anyhow::anyhow!("Connection timeout"))??;

        let tx = Transaction {
            raw,
            client_addr: peer_addr,
            transport: Transport::Tcp,
        };
        let handler = handler.clone();
        let writer = writer.clone();

        tokio::spawn(async move {
            if let Some(response) = handler.handle(&tx).await {
                if let Err(e) = send_framed(&writer, &response).await {
                    debug!("DNS TCP send error to {}: {}", peer_addr, e);
                }
            }
        });
    }
}

/// Write one length-prefixed message
async fn send_framed(writer: &Mutex<OwnedWriteHalf>, message: &[u8]) -> anyhow::Result<()> {
    let len = u16::try_from(message.len())
        .map_err(|_| anyhow::anyhow!("Response too large for TCP framing: {} bytes", message.len()))?;

    let mut framed = Vec::with_capacity(message.len() + 2);
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(message);

    let mut writer = writer.lock().await;
    writer.write_all(&framed).await?;
    writer.flush().await?;

    Ok(())
}
