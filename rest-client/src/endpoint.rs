//! Hub endpoint and credentials

use base64::Engine;
use std::fmt;
use url::Url;

use crate::error::RestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    fn websocket(&self) -> &'static str {
        match self {
            Scheme::Http => "ws",
            Scheme::Https => "wss",
        }
    }
}

/// Where a hub lives: scheme, host, port and an optional webroot prefix
/// (hubs behind a reverse proxy are served under a path).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HubEndpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    webroot: String,
}

impl HubEndpoint {
    /// Parse `http[s]://host[:port][/webroot]`.
    ///
    /// The port defaults to 80 or 443 by scheme. Any other scheme is an
    /// [`RestError::InvalidEndpoint`].
    pub fn parse(raw: &str) -> Result<Self, RestError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| RestError::InvalidEndpoint(format!("{}: {}", raw, e)))?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(RestError::InvalidEndpoint(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RestError::InvalidEndpoint(format!("{}: missing host", raw)))?
            .to_string();

        Ok(Self {
            scheme,
            host,
            port: url.port().unwrap_or_else(|| scheme.default_port()),
            webroot: url.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path prefix without trailing slash; empty when served at the root
    pub fn webroot(&self) -> &str {
        &self.webroot
    }

    /// Full URL of a REST path such as `/rest/nodes`
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}://{}:{}{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.webroot,
            path
        )
    }

    /// URL of the event subscription socket
    pub fn websocket_url(&self) -> String {
        format!(
            "{}://{}:{}{}/rest/subscribe",
            self.scheme.websocket(),
            self.host,
            self.port,
            self.webroot
        )
    }
}

impl fmt::Display for HubEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url_for(""))
    }
}

/// HTTP basic-auth credentials. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value for an `Authorization` header
    pub fn basic_auth_header(&self) -> String {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
