use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use reachr_common::{ProbeResult, ProbeTarget, Prober, ProxyEndpoint};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::http::parse_status_line;
use super::timed_out;

pub const DEFAULT_TCP_PORT: u16 = 443;
const MAX_REPLY_HEAD: usize = 8 * 1024;

/// Reachable when a TCP handshake to `port` completes, or when the proxy
/// accepts a `CONNECT` tunnel to it.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnectProber {
    port: u16,
}

impl Default for TcpConnectProber {
    fn default() -> Self {
        Self { port: DEFAULT_TCP_PORT }
    }
}

impl TcpConnectProber {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl Prober for TcpConnectProber {
    async fn probe(
        &self,
        target: &ProbeTarget,
        probe_timeout: Duration,
        proxy: Option<&ProxyEndpoint>,
    ) -> ProbeResult {
        let Some(proxy) = proxy else {
            let socket_addr: SocketAddr = SocketAddr::new(target.addr, self.port);
            return match timeout(probe_timeout, TcpStream::connect(socket_addr)).await {
                Ok(Ok(_)) => ProbeResult::reachable(*target),
                Ok(Err(e)) => ProbeResult::unreachable(*target, e.to_string()),
                Err(_elapsed) => ProbeResult::unreachable(*target, timed_out(probe_timeout)),
            };
        };

        match timeout(probe_timeout, tunnel(proxy, target, self.port)).await {
            Ok(Ok((_, 200))) => ProbeResult::reachable(*target),
            Ok(Ok((_, status))) => ProbeResult::unreachable(*target, connect_refused(status)),
            Ok(Err(e)) => ProbeResult::unreachable(*target, e.to_string()),
            Err(_elapsed) => ProbeResult::unreachable(*target, timed_out(probe_timeout)),
        }
    }
}

pub(crate) fn connect_refused(status: u16) -> String {
    format!("proxy CONNECT answered HTTP {status}")
}

/// Asks `proxy` for a tunnel to `target:port`. Returns the proxy's status and
/// the stream, positioned right after the reply head when the status is 200.
pub(crate) async fn tunnel(proxy: &ProxyEndpoint, target: &ProbeTarget, port: u16) -> io::Result<(TcpStream, u16)> {
    let authority = format!("{}:{}", target.url_host(), port);
    let mut request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
    if let Some(auth) = proxy.authorization() {
        request.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
    }
    request.push_str("\r\n");

    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;
    stream.write_all(request.as_bytes()).await?;
    let status = read_reply_head(&mut stream).await?;
    Ok((stream, status))
}

/// Reads up to the blank line ending the reply head, one byte at a time, so
/// nothing past it is consumed.
async fn read_reply_head(stream: &mut TcpStream) -> io::Result<u16> {
    let mut head: Vec<u8> = Vec::with_capacity(128);

    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_REPLY_HEAD {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "proxy reply head too long"));
        }
        match stream.read_u8().await {
            Ok(byte) => head.push(byte),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !head.is_empty() => break,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before a response arrived",
                ));
            }
            Err(e) => return Err(e),
        }
    }

    let text = String::from_utf8_lossy(&head);
    let line = text.lines().next().unwrap_or_default();
    parse_status_line(line).ok_or_else(|| {
        let shown: String = line.chars().take(64).collect();
        io::Error::new(io::ErrorKind::InvalidData, format!("unrecognized response: {shown:?}"))
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
