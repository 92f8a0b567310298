//! Forward proxy endpoint, threaded explicitly into every probe of a run.

use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::ConfigError;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// An HTTP forward proxy: host, port and optional Basic credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Value for a `Proxy-Authorization` header, when credentials are set.
    pub fn authorization(&self) -> Option<String> {
        self.credentials.as_ref().map(|c| {
            let token = general_purpose::STANDARD.encode(format!("{}:{}", c.username, c.password));
            format!("Basic {token}")
        })
    }
}

/// Redacts the password.
impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credentials {
            Some(c) => write!(f, "http://{}:***@{}", c.username, self.authority()),
            None => write!(f, "http://{}", self.authority()),
        }
    }
}

impl FromStr for ProxyEndpoint {
    type Err = ConfigError;

    /// Parses `[http://][user:pass@]host[:port]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidProxy {
            input: redact(s),
            reason: reason.to_string(),
        };

        let raw = s.trim();
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{raw}")
        };

        let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;

        if url.scheme() != "http" {
            return Err(invalid("only http:// forward proxies are supported"));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = url.port_or_known_default().unwrap_or(80);
        let endpoint = ProxyEndpoint::new(host, port);

        if url.username().is_empty() {
            return Ok(endpoint);
        }

        // Userinfo stays percent-encoded in the URL; the header needs the raw text.
        let decode = |raw: &str| {
            percent_decode_str(raw)
                .decode_utf8()
                .map(|text| text.into_owned())
                .map_err(|_| invalid("credentials are not valid UTF-8"))
        };
        let username = decode(url.username())?;
        let password = decode(url.password().unwrap_or(""))?;
        Ok(endpoint.with_credentials(username, password))
    }
}

/// Masks anything between `:` and `@` in the userinfo part of a proxy string.
fn redact(s: &str) -> String {
    let Some((userinfo, rest)) = s.rsplit_once('@') else {
        return s.to_string();
    };
    match userinfo.rsplit_once(':') {
        Some((user, _)) => format!("{user}:***@{rest}"),
        None => s.to_string(),
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
