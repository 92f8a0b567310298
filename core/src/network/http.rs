//! HTTP/1.1 reachability probe, direct or through an HTTP forward proxy.
//!
//! Only the status line is read; the body is never downloaded. The request
//! and status-line helpers are shared with the TLS prober.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;
use url::Url;

use reachr_common::{ConfigError, ProbeResult, ProbeTarget, Prober, ProxyEndpoint};

use super::timed_out;

pub const DEFAULT_HTTP_PORT: u16 = 80;
const MAX_STATUS_LINE: u64 = 1024;
pub(crate) const ROOT_PATH: &str = "/";
const USER_AGENT: &str = concat!("reachr/", env!("CARGO_PKG_VERSION"));

/// Which HTTP statuses count as reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any status line at all: the path is alive.
    #[default]
    AnyResponse,
    /// Only `200 OK`.
    Exact200,
}

impl StatusPolicy {
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            StatusPolicy::AnyResponse => true,
            StatusPolicy::Exact200 => status == 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpProber {
    port: u16,
    policy: StatusPolicy,
}

impl Default for HttpProber {
    fn default() -> Self {
        Self {
            port: DEFAULT_HTTP_PORT,
            policy: StatusPolicy::default(),
        }
    }
}

impl HttpProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch_status(&self, target: &ProbeTarget, proxy: Option<&ProxyEndpoint>) -> io::Result<u16> {
        let request = GetRequest::new(target.url_host(), self.port, ROOT_PATH);

        let mut stream = match proxy {
            Some(proxy) => TcpStream::connect((proxy.host.as_str(), proxy.port)).await?,
            None => TcpStream::connect(SocketAddr::new(target.addr, self.port)).await?,
        };

        stream.write_all(request.render(proxy).as_bytes()).await?;
        read_status(&mut stream).await
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(
        &self,
        target: &ProbeTarget,
        timeout: Duration,
        proxy: Option<&ProxyEndpoint>,
    ) -> ProbeResult {
        match time::timeout(timeout, self.fetch_status(target, proxy)).await {
            Ok(Ok(status)) if self.policy.accepts(status) => ProbeResult::reachable(*target),
            Ok(Ok(status)) => ProbeResult::unreachable(*target, format!("HTTP {status}")),
            Ok(Err(e)) => ProbeResult::unreachable(*target, e.to_string()),
            Err(_elapsed) => ProbeResult::unreachable(*target, timed_out(timeout)),
        }
    }
}

/// Sends one request through `proxy` to `url` and expects any HTTP answer
/// other than `407`.
pub async fn check_proxy(proxy: &ProxyEndpoint, url: &Url, timeout: Duration) -> Result<u16, ConfigError> {
    let unavailable = |reason: String| ConfigError::ProxyUnavailable {
        proxy: proxy.to_string(),
        reason,
    };

    let host = url
        .host_str()
        .ok_or_else(|| unavailable(format!("check URL '{url}' has no host")))?;
    let port = url.port_or_known_default().unwrap_or(DEFAULT_HTTP_PORT);
    let path = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };

    let request = GetRequest::new(host.to_string(), port, &path);
    let exchange = async {
        let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;
        stream.write_all(request.render(Some(proxy)).as_bytes()).await?;
        read_status(&mut stream).await
    };

    match time::timeout(timeout, exchange).await {
        Ok(Ok(407)) => Err(unavailable("proxy rejected the credentials (HTTP 407)".into())),
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => Err(unavailable(e.to_string())),
        Err(_elapsed) => Err(unavailable(timed_out(timeout))),
    }
}

pub(crate) struct GetRequest<'a> {
    host: String,
    port: u16,
    default_port: u16,
    path: &'a str,
}

impl<'a> GetRequest<'a> {
    pub(crate) fn new(host: String, port: u16, path: &'a str) -> Self {
        Self {
            host,
            port,
            default_port: DEFAULT_HTTP_PORT,
            path,
        }
    }

    /// Port left out of the `Host` header.
    pub(crate) fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    fn host_header(&self) -> String {
        if self.port == self.default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Origin-form when direct, absolute-form through a proxy.
    pub(crate) fn render(&self, proxy: Option<&ProxyEndpoint>) -> String {
        let host = self.host_header();
        let target = match proxy {
            Some(_) => format!("http://{host}{}", self.path),
            None => self.path.to_string(),
        };

        let mut request = format!(
            "GET {target} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: {USER_AGENT}\r\nAccept: */*\r\nConnection: close\r\n"
        );
        if let Some(auth) = proxy.and_then(ProxyEndpoint::authorization) {
            request.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
        }
        request.push_str("\r\n");
        request
    }
}

/// Reads and parses the first line of an HTTP response.
pub(crate) async fn read_status<S>(stream: &mut S) -> io::Result<u16>
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new((&mut *stream).take(MAX_STATUS_LINE));
    let mut line = String::new();

    if reader.read_line(&mut line).await? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before a response arrived",
        ));
    }

    parse_status_line(&line).ok_or_else(|| {
        let shown: String = line.trim_end().chars().take(64).collect();
        io::Error::new(io::ErrorKind::InvalidData, format!("unrecognized response: {shown:?}"))
    })
}

/// `HTTP/1.1 404 Not Found` -> `404`.
pub(crate) fn parse_status_line(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse::<u16>().ok().filter(|c| (100..=599).contains(c))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
