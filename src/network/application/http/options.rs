//! Client configuration.

use super::pool::PoolSettings;
use crate::network::error::{Error, ErrorKind, Result};
use core::str::FromStr;
use core::time::Duration;
use serde::Deserialize;

/// Default deadline for each of connect, read and write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication scheme applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// No `Authorization` header.
    #[default]
    None,
    /// `Authorization: Basic base64(username:password)`
    Basic,
    /// `Authorization: Bearer <token>`
    Bearer,
}

impl FromStr for AuthType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("none") || s.is_empty() {
            Ok(AuthType::None)
        } else if s.eq_ignore_ascii_case("basic") {
            Ok(AuthType::Basic)
        } else if s.eq_ignore_ascii_case("bearer") {
            Ok(AuthType::Bearer)
        } else {
            Err(Error::new(
                ErrorKind::InvalidOption,
                format!("unknown auth type {s:?}"),
            ))
        }
    }
}

/// Per-phase deadlines. A zero duration disables the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Deadline for establishing the connection.
    pub connect: Duration,
    /// Longest stall allowed while waiting for response bytes.
    pub read: Duration,
    /// Deadline for writing the request.
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
            write: DEFAULT_TIMEOUT,
        }
    }
}

/// Configuration for a [`Client`](super::Client).
///
/// Options are read by every stage of the request lifecycle and are never
/// changed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Follow `3xx` responses carrying a `Location` header.
    pub follow_redirects: bool,
    /// Longest redirect chain that is followed.
    pub max_redirects: u32,
    /// Extra attempts after a retryable failure.
    pub max_retries: u32,
    /// Pause before each retry.
    pub retry_delay: Duration,
    /// Also retry responses with a `5xx` status.
    pub retry_on_server_error: bool,
    /// Verify the peer certificate.
    pub verify_ssl: bool,
    /// `scheme://[user:pass@]host[:port]` of a proxy, or empty for none.
    pub proxy_url: String,
    /// Authentication scheme.
    pub auth_type: AuthType,
    /// Basic auth user.
    pub username: String,
    /// Basic auth password.
    pub password: String,
    /// Bearer token.
    pub bearer_token: String,
    /// Root CA in PEM form.
    pub root_ca: String,
    /// Client certificate in PEM form.
    pub client_cert: String,
    /// Client private key in PEM form.
    pub client_private_key: String,
    /// Store `Set-Cookie` values and send matching cookies.
    pub cookies_enabled: bool,
    /// Connect, read and write deadlines.
    pub timeouts: Timeouts,
    /// Pool capacity.
    pub max_connections: usize,
    /// Idle time after which a pooled connection is closed.
    pub max_idle_time: Duration,
    /// Upper bound on wire requests per second, if any.
    pub requests_per_second: Option<u32>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            max_redirects: 5,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            retry_on_server_error: false,
            verify_ssl: true,
            proxy_url: String::new(),
            auth_type: AuthType::None,
            username: String::new(),
            password: String::new(),
            bearer_token: String::new(),
            root_ca: String::new(),
            client_cert: String::new(),
            client_private_key: String::new(),
            cookies_enabled: false,
            timeouts: Timeouts::default(),
            max_connections: 10,
            max_idle_time: Duration::from_secs(60),
            requests_per_second: None,
        }
    }
}

/// Wire shape of [`ClientOptions::from_json`]. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawOptions<'a> {
    follow_redirects: Option<bool>,
    max_redirects: Option<u32>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    retry_on_server_error: Option<bool>,
    verify_ssl: Option<bool>,
    #[serde(borrow)]
    proxy_url: Option<&'a str>,
    #[serde(borrow)]
    auth_type: Option<&'a str>,
    #[serde(borrow)]
    username: Option<&'a str>,
    #[serde(borrow)]
    password: Option<&'a str>,
    #[serde(borrow)]
    bearer_token: Option<&'a str>,
    #[serde(borrow, alias = "rootCA")]
    root_ca: Option<&'a str>,
    #[serde(borrow)]
    client_cert: Option<&'a str>,
    #[serde(borrow)]
    client_private_key: Option<&'a str>,
    cookies_enabled: Option<bool>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    max_connections: Option<usize>,
    max_idle_time_ms: Option<u64>,
    requests_per_second: Option<u32>,
}

impl ClientOptions {
    /// Load options from a flat JSON object, starting from the defaults.
    ///
    /// Keys are camelCase (`followRedirects`, `maxRedirects`, `maxRetries`,
    /// `retryDelayMs`, `verifySsl`, `proxyUrl`, `authType`, `username`,
    /// `password`, `bearerToken`, `rootCa` (or `rootCA`), `clientCert`,
    /// `clientPrivateKey`, `cookiesEnabled`, `connectTimeoutMs`, ...).
    /// String values are borrowed from the input and may not contain JSON
    /// escape sequences; install PEM material with newlines directly on the
    /// struct instead.
    ///
    /// ```rust
    /// use libiot_http::network::application::http::{AuthType, ClientOptions};
    ///
    /// let options = ClientOptions::from_json(
    ///     r#"{"maxRetries":1,"authType":"bearer","bearerToken":"abc"}"#,
    /// ).unwrap();
    /// assert_eq!(options.max_retries, 1);
    /// assert_eq!(options.auth_type, AuthType::Bearer);
    /// assert!(options.follow_redirects);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let (raw, _): (RawOptions<'_>, usize) = serde_json_core::from_str(json)
            .map_err(|e| Error::new(ErrorKind::InvalidOption, format!("bad options: {e}")))?;

        let mut options = Self::default();
        let text = |value: Option<&str>, slot: &mut String| {
            if let Some(value) = value {
                *slot = value.to_string();
            }
        };

        if let Some(v) = raw.follow_redirects {
            options.follow_redirects = v;
        }
        if let Some(v) = raw.max_redirects {
            options.max_redirects = v;
        }
        if let Some(v) = raw.max_retries {
            options.max_retries = v;
        }
        if let Some(v) = raw.retry_delay_ms {
            options.retry_delay = Duration::from_millis(v);
        }
        if let Some(v) = raw.retry_on_server_error {
            options.retry_on_server_error = v;
        }
        if let Some(v) = raw.verify_ssl {
            options.verify_ssl = v;
        }
        if let Some(v) = raw.auth_type {
            options.auth_type = v.parse()?;
        }
        text(raw.proxy_url, &mut options.proxy_url);
        text(raw.username, &mut options.username);
        text(raw.password, &mut options.password);
        text(raw.bearer_token, &mut options.bearer_token);
        text(raw.root_ca, &mut options.root_ca);
        text(raw.client_cert, &mut options.client_cert);
        text(raw.client_private_key, &mut options.client_private_key);
        if let Some(v) = raw.cookies_enabled {
            options.cookies_enabled = v;
        }
        if let Some(v) = raw.connect_timeout_ms {
            options.timeouts.connect = Duration::from_millis(v);
        }
        if let Some(v) = raw.read_timeout_ms {
            options.timeouts.read = Duration::from_millis(v);
        }
        if let Some(v) = raw.write_timeout_ms {
            options.timeouts.write = Duration::from_millis(v);
        }
        if let Some(v) = raw.max_connections {
            options.max_connections = v;
        }
        if let Some(v) = raw.max_idle_time_ms {
            options.max_idle_time = Duration::from_millis(v);
        }
        if raw.requests_per_second.is_some() {
            options.requests_per_second = raw.requests_per_second;
        }

        options.validate()?;
        Ok(options)
    }

    /// Reject combinations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::new(
                ErrorKind::InvalidOption,
                "max_connections must be at least 1",
            ));
        }
        if self.requests_per_second == Some(0) {
            return Err(Error::new(
                ErrorKind::InvalidOption,
                "requests_per_second must be positive",
            ));
        }
        Ok(())
    }

    /// Pool configuration derived from these options.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            max_idle_time: self.max_idle_time,
            verify_ssl: self.verify_ssl,
            root_ca: self.root_ca.clone(),
            client_cert: self.client_cert.clone(),
            client_private_key: self.client_private_key.clone(),
        }
    }
}
