//! HTTPS reachability probe. Certificates are not verified: targets are bare
//! IP addresses, so no certificate could match them anyway.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reachr_common::{ProbeResult, ProbeTarget, Prober, ProxyEndpoint};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_rustls::TlsConnector;

use super::http::{GetRequest, ROOT_PATH, StatusPolicy, read_status};
use super::tcp::{connect_refused, tunnel};
use super::timed_out;

pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Accepts whatever certificate the peer presents.
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// HTTP/1.1 GET over TLS, direct or through a proxy `CONNECT` tunnel.
#[derive(Clone)]
pub struct HttpsProber {
    port: u16,
    policy: StatusPolicy,
    connector: TlsConnector,
}

impl Default for HttpsProber {
    fn default() -> Self {
        let config = ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth();

        Self {
            port: DEFAULT_HTTPS_PORT,
            policy: StatusPolicy::default(),
            connector: TlsConnector::from(Arc::new(config)),
        }
    }
}

impl HttpsProber {
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
        let stream = match proxy {
            Some(proxy) => match tunnel(proxy, target, self.port).await? {
                (stream, 200) => stream,
                (_, status) => return Err(io::Error::other(connect_refused(status))),
            },
            None => TcpStream::connect(SocketAddr::new(target.addr, self.port)).await?,
        };

        let mut tls = self
            .connector
            .connect(ServerName::IpAddress(target.addr), stream)
            .await?;

        let request = GetRequest::new(target.url_host(), self.port, ROOT_PATH).with_default_port(DEFAULT_HTTPS_PORT);
        tls.write_all(request.render(None).as_bytes()).await?;
        tls.flush().await?;
        read_status(&mut tls).await
    }
}

#[async_trait]
impl Prober for HttpsProber {
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

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
