//! Proxy routing and `CONNECT` tunnels.

use super::auth::basic_credentials;
use super::exchange::{Exchange, parse_status_line};
use super::response::Response;
use super::{url, validator};
use crate::network::Connection;
use crate::network::error::{Error, ErrorKind, Result};
use tracing::debug;

/// Proxy endpoint parsed from `scheme://[user:pass@]host[:port]`.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// `http` or `https`.
    pub scheme: String,
    /// Proxy host.
    pub host: String,
    /// Proxy port; the scheme default when the URL omits it.
    pub port: u16,
    /// User embedded in the proxy URL.
    pub username: String,
    /// Password embedded in the proxy URL.
    pub password: String,
}

impl core::fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProxySettings")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("has_credentials", &!self.username.is_empty())
            .finish()
    }
}

/// How a request reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Straight to the destination host.
    Direct,
    /// To the proxy, with an absolute-form request target.
    Forward,
    /// Through a `CONNECT` tunnel opened on the proxy.
    Tunnel,
}

/// Proxy decorator built once from the client options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proxy {
    settings: Option<ProxySettings>,
}

impl Proxy {
    /// Parse `proxy_url`. An empty URL disables the proxy.
    pub fn new(proxy_url: &str) -> Result<Self> {
        if proxy_url.is_empty() {
            return Ok(Self::default());
        }
        validator::validate_proxy_url(proxy_url)?;
        let port = url::extract_port(proxy_url)
            .ok_or_else(|| Error::new(ErrorKind::InvalidProxyUrl, "invalid proxy port"))?;
        let (username, password) = url::extract_userinfo(proxy_url).unwrap_or_default();
        Ok(Self {
            settings: Some(ProxySettings {
                scheme: url::extract_scheme(proxy_url).to_ascii_lowercase(),
                host: url::extract_host(proxy_url).to_string(),
                port,
                username: username.to_string(),
                password: password.to_string(),
            }),
        })
    }

    /// Whether a proxy URL was configured.
    pub fn is_enabled(&self) -> bool {
        self.settings.is_some()
    }

    /// Parsed settings, if enabled.
    pub fn settings(&self) -> Option<&ProxySettings> {
        self.settings.as_ref()
    }

    /// Route for a request to `target`.
    pub fn route(&self, target: &str) -> Route {
        match &self.settings {
            None => Route::Direct,
            Some(settings) if settings.scheme == "https" || url::is_https(target) => Route::Tunnel,
            Some(_) => Route::Forward,
        }
    }

    /// Where to open the TCP connection for a request to `target`.
    pub fn connect_target<'a>(&'a self, target: &'a str) -> (&'a str, u16) {
        match &self.settings {
            Some(settings) => (settings.host.as_str(), settings.port),
            None => (
                url::extract_host(target),
                url::extract_port(target).unwrap_or_else(|| {
                    url::default_port(url::extract_scheme(target))
                }),
            ),
        }
    }

    /// `Proxy-Authorization` value, when the proxy URL carries credentials.
    pub fn authorization(&self) -> Option<String> {
        let settings = self.settings.as_ref()?;
        if settings.username.is_empty() {
            return None;
        }
        Some(format!(
            "Basic {}",
            basic_credentials(&settings.username, &settings.password)
        ))
    }

    /// Serialized `CONNECT host:port` request for `target`.
    pub fn connect_request(&self, target: &str) -> String {
        let authority = authority_form(target);
        let mut request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
        if let Some(auth) = self.authorization() {
            request.push_str("Proxy-Authorization: ");
            request.push_str(&auth);
            request.push_str("\r\n");
        }
        request.push_str("\r\n");
        request
    }

    /// Open a tunnel to `target` over `exchange`'s connection to the proxy.
    ///
    /// Only a `200` answer establishes the tunnel; `407` maps to
    /// [`ErrorKind::ProxyAuthenticationRequired`], anything else to
    /// [`ErrorKind::NetworkError`].
    pub fn establish_tunnel<C: Connection>(
        &self,
        exchange: &mut Exchange<'_, C>,
        target: &str,
    ) -> Result<()> {
        exchange.write_all(self.connect_request(target).as_bytes())?;
        let line = exchange.read_line()?;
        let (status, _) = parse_status_line(&line)?;
        // The answer's headers are drained and discarded.
        exchange.read_headers(&mut Response::default())?;
        match status {
            200 => {
                debug!(authority = %authority_form(target), "proxy tunnel established");
                Ok(())
            }
            407 => Err(Error::new(
                ErrorKind::ProxyAuthenticationRequired,
                "proxy requires authentication",
            )),
            status => Err(Error::network(format!(
                "proxy refused tunnel with status {status}"
            ))),
        }
    }
}

fn host_for_authority(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// `host:port` of `target`, port always present.
pub fn authority_form(target: &str) -> String {
    let port = url::extract_port(target)
        .unwrap_or_else(|| url::default_port(url::extract_scheme(target)));
    format!("{}:{port}", host_for_authority(url::extract_host(target)))
}

/// `scheme://host:port/path` of `target`, as sent to a forwarding proxy.
pub fn absolute_form(target: &str) -> String {
    format!(
        "{}://{}{}",
        url::extract_scheme(target),
        authority_form(target),
        url::extract_path(target)
    )
}
