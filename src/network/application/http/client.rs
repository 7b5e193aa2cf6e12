//! The request engine.
//!
//! [`Client::send`] runs a request through its whole lifecycle: validation,
//! authentication, connection acquisition, the optional proxy tunnel,
//! serialization, response parsing, cookie processing and redirect
//! evaluation. Redirect hops and retries are explicit bounded loops; each
//! hop re-runs authentication and proxy routing for the new target.

use super::auth::Auth;
use super::cookie;
use super::exchange::{BodyCallback, BodySink, Exchange, Framing, ProgressCallback};
use super::options::{ClientOptions, Timeouts};
use super::pool::{ConnectionPool, Lease};
use super::proxy::{self, Proxy, Route};
use super::rate_limit::RateLimiter;
use super::request::{Method, Request};
use super::response::Response;
use super::{url, validator};
use crate::network::error::{Error, ErrorKind, Result};
use crate::network::{Close, Connect, Connection};
use core::fmt::Write as _;
use core::time::Duration;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// `User-Agent` sent when the request does not carry one.
pub const USER_AGENT: &str = concat!("libiot-http/", env!("CARGO_PKG_VERSION"));

/// Length of generated multipart boundaries.
pub const BOUNDARY_LEN: usize = 16;

/// Earliest wall clock time, in epoch seconds, taken as synchronized.
const MIN_SYNCED_EPOCH: i64 = 9 * 3600;

/// Handle that cancels in-flight requests of a [`Client`] from elsewhere,
/// for example another thread.
pub struct Canceller<N: Connect> {
    pool: Arc<ConnectionPool<N>>,
}

impl<N: Connect> Clone for Canceller<N> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<N: Connect> core::fmt::Debug for Canceller<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Canceller").finish_non_exhaustive()
    }
}

impl<N: Connect> Canceller<N> {
    /// Close every pooled connection. Running exchanges fail with
    /// [`ErrorKind::RequestCancelled`].
    pub fn cancel(&self) {
        info!("cancelling in-flight requests");
        self.pool.disconnect_all();
    }
}

/// Blocking HTTP/1.1 client.
///
/// ```rust
/// use libiot_http::network::application::http::{Client, ClientOptions, Request};
/// use libiot_http::network::mock::MockNetwork;
///
/// let network = MockNetwork::new();
/// network.queue_response(
///     "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
/// );
///
/// let mut client = Client::new(network.clone(), ClientOptions::default()).unwrap();
/// let response = client.send(&Request::get("http://example.com/wiki")).unwrap();
///
/// assert_eq!(response.body, b"Wikipedia");
/// assert!(network.log().sent_contains(b"GET /wiki HTTP/1.1\r\n"));
/// ```
pub struct Client<N: Connect> {
    pool: Arc<ConnectionPool<N>>,
    options: ClientOptions,
    timeouts: Timeouts,
    auth: Auth,
    proxy: Proxy,
    rate_limiter: RateLimiter,
    on_body: Option<Box<BodyCallback>>,
    on_progress: Option<Box<ProgressCallback>>,
}

impl<N: Connect> core::fmt::Debug for Client<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("timeouts", &self.timeouts)
            .field("auth", &self.auth)
            .field("proxy", &self.proxy)
            .field("rate_limiter", &self.rate_limiter)
            .field("pooled_connections", &self.pool.len())
            .finish_non_exhaustive()
    }
}

impl<N: Connect> Client<N> {
    /// Create a client with its own pool around `connector`.
    ///
    /// Fails with [`ErrorKind::TimeNotSet`] when the connector validates
    /// certificates and the wall clock has not been synchronized, and with
    /// [`ErrorKind::InvalidProxyUrl`] or [`ErrorKind::InvalidOption`] for
    /// unusable options.
    pub fn new(connector: N, options: ClientOptions) -> Result<Self> {
        if connector.requires_synced_clock() && cookie::now() < MIN_SYNCED_EPOCH {
            return Err(Error::new(
                ErrorKind::TimeNotSet,
                "system clock is not synchronized",
            ));
        }
        let pool = Arc::new(ConnectionPool::new(connector, options.pool_settings()));
        Self::with_pool(pool, options)
    }

    /// Create a client sharing `pool`, and with it the cookie jar, with
    /// other clients. The pool's own settings take precedence over the
    /// pool-related fields of `options`.
    pub fn with_pool(pool: Arc<ConnectionPool<N>>, options: ClientOptions) -> Result<Self> {
        options.validate()?;
        let proxy = Proxy::new(&options.proxy_url)?;
        Ok(Self {
            pool,
            timeouts: options.timeouts,
            auth: Auth::new(&options),
            proxy,
            rate_limiter: RateLimiter::new(options.requests_per_second),
            options,
            on_body: None,
            on_progress: None,
        })
    }

    /// The options this client was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The pool this client draws connections from.
    pub fn pool(&self) -> &Arc<ConnectionPool<N>> {
        &self.pool
    }

    /// Current deadlines.
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Replace all deadlines.
    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    /// Replace the connect deadline.
    pub fn set_connection_timeout(&mut self, timeout: Duration) {
        self.timeouts.connect = timeout;
    }

    /// Replace the read stall deadline.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.timeouts.read = timeout;
    }

    /// Replace the write deadline.
    pub fn set_write_timeout(&mut self, timeout: Duration) {
        self.timeouts.write = timeout;
    }

    /// Turn cookie handling on or off.
    pub fn enable_cookies(&mut self, enabled: bool) {
        self.options.cookies_enabled = enabled;
    }

    /// Limit wire requests per second; `None` removes the limit.
    pub fn set_rate_limit(&mut self, requests_per_second: Option<u32>) {
        self.options.requests_per_second = requests_per_second;
        self.rate_limiter = RateLimiter::new(requests_per_second);
    }

    /// Stream response bodies to `callback` instead of buffering them.
    pub fn set_response_body_callback(&mut self, callback: impl FnMut(&[u8]) + Send + 'static) {
        self.on_body = Some(Box::new(callback));
    }

    /// Report `(received, total)` after every body block; `total` is 0 when
    /// the length is unknown.
    pub fn set_progress_callback(&mut self, callback: impl FnMut(usize, usize) + Send + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Remove both body callbacks.
    pub fn clear_callbacks(&mut self) {
        self.on_body = None;
        self.on_progress = None;
    }

    /// Abort in-flight requests by closing every pooled connection.
    pub fn cancel(&self) {
        self.canceller().cancel();
    }

    /// A handle that can cancel this client's requests from another thread.
    pub fn canceller(&self) -> Canceller<N> {
        Canceller {
            pool: Arc::clone(&self.pool),
        }
    }

    /// Streaming uploads are not implemented.
    pub fn send_streaming(&mut self, _request: &Request) -> Result<Response> {
        Err(Error::new(
            ErrorKind::UnsupportedOperation,
            "streaming requests are not supported",
        ))
    }

    /// Send `request` and return the final response.
    ///
    /// Network failures and timeouts are retried up to `max_retries` times
    /// with `retry_delay` between attempts, as are `5xx` responses when
    /// `retry_on_server_error` is set. Every attempt follows redirects from
    /// the original request.
    pub fn send(&mut self, request: &Request) -> Result<Response> {
        validator::validate_url(&request.url)?;

        let mut retries = 0;
        loop {
            let outcome = self.follow_redirects(request);
            let can_retry = retries < self.options.max_retries;
            match outcome {
                Ok(response)
                    if can_retry
                        && self.options.retry_on_server_error
                        && response.status_code >= 500 =>
                {
                    warn!(
                        status = response.status_code,
                        attempt = retries + 1,
                        "server error, retrying"
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if can_retry && e.kind().is_retryable() => {
                    warn!(error = %e, attempt = retries + 1, "request failed, retrying");
                }
                Err(e) => return Err(e),
            }
            retries += 1;
            std::thread::sleep(self.options.retry_delay);
        }
    }

    fn follow_redirects(&mut self, original: &Request) -> Result<Response> {
        let mut current = Cow::Borrowed(original);
        let mut redirects = 0;
        loop {
            let response = self.execute(&current)?;
            if !self.options.follow_redirects || !response.is_redirect() {
                return Ok(response);
            }
            let Some(location) = response
                .header("Location")
                .map(str::trim)
                .filter(|location| !location.is_empty())
            else {
                return Ok(response);
            };
            if redirects >= self.options.max_redirects {
                return Err(Error::new(
                    ErrorKind::TooManyRedirects,
                    format!("more than {} redirects", self.options.max_redirects),
                ));
            }

            let next = url::resolve_location(&current.url, location);
            validator::validate_url(&next)?;
            info!(
                status = response.status_code,
                from = %current.url,
                to = %next,
                "following redirect"
            );

            let hop = current.to_mut();
            if url::extract_base_url(&hop.url) != url::extract_base_url(&next) {
                hop.headers.remove("Host");
            }
            if response.status_code == 303 && hop.method != Method::Head {
                hop.method = Method::Get;
                hop.body.clear();
                hop.multipart_form = None;
                hop.headers.remove("Content-Length");
                hop.headers.remove("Content-Type");
            }
            hop.url = next;
            redirects += 1;
        }
    }

    /// One wire exchange for `request`, without redirects or retries.
    fn execute(&mut self, request: &Request) -> Result<Response> {
        let mut request = request.clone();
        self.auth.apply(&mut request);

        let route = self.proxy.route(&request.url);
        let tls_proxy = self.proxy.settings().is_some_and(|p| p.scheme == "https");
        if (url::is_https(&request.url) || tls_proxy) && !self.pool.connector().supports_tls() {
            return Err(Error::new(
                ErrorKind::SslError,
                "connector cannot establish TLS",
            ));
        }
        let (host, port) = self.proxy.connect_target(&request.url);
        let host = host.to_string();
        debug!(method = %request.method, url = %request.url, ?route, "sending request");

        self.rate_limiter.acquire();
        let lease = self.pool.get_connection(&host, port)?;
        let outcome = self.exchange(&lease, &request, route, &host, port);
        match &outcome {
            Ok((_, true)) => {}
            Ok((_, false)) => lease.lock().disconnect(),
            Err(e) => {
                debug!(error = %e, "closing connection after failed exchange");
                lease.lock().disconnect();
            }
        }
        self.pool.release_connection(lease);
        outcome.map(|(response, _)| response)
    }

    /// Run the exchange on a leased connection. Returns the response and
    /// whether the connection can be reused.
    fn exchange(
        &mut self,
        lease: &Lease<N::Connection>,
        request: &Request,
        route: Route,
        host: &str,
        port: u16,
    ) -> Result<(Response, bool)> {
        let timeouts = self.timeouts;
        let mut conn = lease.lock();
        conn.set_timeouts(timeouts.connect, timeouts.read, timeouts.write);

        if !conn.is_connected() {
            connect(&mut *conn, lease, host, port, timeouts.connect)?;
        }

        let mut exchange = Exchange::new(&mut *conn, timeouts, lease.cancel_flag());
        if route == Route::Tunnel {
            self.proxy.establish_tunnel(&mut exchange, &request.url)?;
        }

        let wire = self.serialize(request, route)?;
        exchange.write_all(&wire)?;

        let mut response = Response::default();
        exchange.read_head(&mut response)?;
        let framing = Framing::of(request.method, &response)?;
        let mut sink = BodySink {
            on_body: self.on_body.as_deref_mut(),
            on_progress: self.on_progress.as_deref_mut(),
        };
        exchange.read_body(framing, &mut response, &mut sink)?;
        debug!(
            status = response.status_code,
            bytes = response.body.len(),
            ?framing,
            "response received"
        );

        let reusable = framing.leaves_connection_reusable()
            && route != Route::Tunnel
            && !wants_close(&response);

        if self.options.cookies_enabled {
            self.process_cookies(&request.url, &mut response);
        }
        Ok((response, reusable))
    }

    fn process_cookies(&self, effective_url: &str, response: &mut Response) {
        let values: Vec<String> = response
            .header_values("Set-Cookie")
            .map(str::to_string)
            .collect();
        for value in values {
            if let Some(cookie) = self.pool.set_cookie(effective_url, &value) {
                response.cookies.push(cookie);
            }
        }
    }

    /// Serialize `request` for the wire.
    fn serialize(&self, request: &Request, route: Route) -> Result<Vec<u8>> {
        let target = match route {
            Route::Forward => proxy::absolute_form(&request.url),
            Route::Direct | Route::Tunnel => url::extract_path(&request.url).into_owned(),
        };
        let multipart = request.multipart_form.as_deref();

        let mut head = String::new();
        let _ = write!(head, "{} {} HTTP/1.1\r\n", request.method, target);
        if !request.headers.contains("Host") {
            let _ = write!(head, "Host: {}\r\n", url::host_header(&request.url));
        }
        for header in &request.headers {
            if multipart.is_some() && header.name.eq_ignore_ascii_case("Content-Type") {
                continue;
            }
            check_header(&header.name, &header.value)?;
            let _ = write!(head, "{}: {}\r\n", header.name, header.value);
        }
        if !request.headers.contains("User-Agent") {
            let _ = write!(head, "User-Agent: {USER_AGENT}\r\n");
        }
        if route == Route::Forward && !request.headers.contains("Proxy-Authorization") {
            if let Some(auth) = self.proxy.authorization() {
                let _ = write!(head, "Proxy-Authorization: {auth}\r\n");
            }
        }
        if self.options.cookies_enabled && !request.headers.contains("Cookie") {
            let cookies = self.pool.cookies_for_url(&request.url);
            if !cookies.is_empty() {
                let _ = write!(head, "Cookie: {}\r\n", cookies.join("; "));
            }
        }

        let body: Cow<'_, [u8]> = match multipart {
            Some(fields) => {
                let boundary = generate_boundary();
                let _ = write!(
                    head,
                    "Content-Type: multipart/form-data; boundary={boundary}\r\n"
                );
                Cow::Owned(multipart_body(fields, &boundary)?)
            }
            None => Cow::Borrowed(&request.body),
        };
        if !body.is_empty() && !request.headers.contains("Content-Length") {
            let _ = write!(head, "Content-Length: {}\r\n", body.len());
        }
        head.push_str("\r\n");

        let mut wire = head.into_bytes();
        wire.extend_from_slice(&body);
        Ok(wire)
    }
}

fn connect<C: Connection>(
    conn: &mut C,
    lease: &Lease<C>,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<()> {
    if lease.is_cancelled() {
        return Err(Error::new(ErrorKind::RequestCancelled, "request cancelled"));
    }
    debug!(host, port, "connecting");
    let start = Instant::now();
    let connected = conn.connect(host, port);
    let elapsed = start.elapsed();
    let late = !timeout.is_zero() && elapsed > timeout;
    if connected && !late {
        return Ok(());
    }
    if connected {
        conn.disconnect();
    }
    if lease.is_cancelled() {
        return Err(Error::new(ErrorKind::RequestCancelled, "request cancelled"));
    }
    if late {
        Err(Error::timeout(format!(
            "connect to {host}:{port} timed out after {} ms",
            elapsed.as_millis()
        )))
    } else {
        Err(Error::network(format!("failed to connect to {host}:{port}")))
    }
}

fn wants_close(response: &Response) -> bool {
    response.header("Connection").is_some_and(|value| {
        value
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("close"))
    })
}

fn check_header(name: &str, value: &str) -> Result<()> {
    let bad_name = name.is_empty()
        || name
            .bytes()
            .any(|b| b <= b' ' || b == b':' || b == 0x7f);
    if bad_name || value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::new(
            ErrorKind::InvalidHeader,
            format!("invalid header {name:?}"),
        ));
    }
    Ok(())
}

/// A random alphanumeric multipart boundary.
pub fn generate_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LEN)
        .map(char::from)
        .collect()
}

/// `multipart/form-data` body for `fields` delimited by `boundary`.
pub fn multipart_body(fields: &[(String, String)], boundary: &str) -> Result<Vec<u8>> {
    let mut body = String::new();
    for (name, value) in fields {
        if name.bytes().any(|b| matches!(b, b'"' | b'\r' | b'\n')) {
            return Err(Error::new(
                ErrorKind::InvalidBody,
                format!("invalid form field name {name:?}"),
            ));
        }
        let _ = write!(
            body,
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        );
    }
    let _ = write!(body, "--{boundary}--\r\n");
    Ok(body.into_bytes())
}
