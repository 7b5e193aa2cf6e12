//! Connection pool keyed by `host:port`.
//!
//! The pool owns every cached handle. A caller borrows one through a
//! [`Lease`] for the duration of a single exchange and hands it back with
//! [`ConnectionPool::release_connection`], which refreshes its idle timer
//! without closing it. The pool also owns the cookie jar shared by every
//! client built on it; pool entries and jar sit behind one mutex.

use super::cookie::{self, Cookie, CookieJar};
use crate::network::error::{Error, Result};
use crate::network::{Close, Connect, Connection};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Instant;
use tracing::{debug, info, trace};

/// Pool capacity, idle policy and the TLS material installed on new handles.
#[derive(Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Most connections kept at once.
    pub max_connections: usize,
    /// Idle time after which a cached connection is closed.
    pub max_idle_time: Duration,
    /// Verify peer certificates.
    pub verify_ssl: bool,
    /// Root CA PEM; empty for none.
    pub root_ca: String,
    /// Client certificate PEM; empty for none.
    pub client_cert: String,
    /// Client private key PEM; empty for none.
    pub client_private_key: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            max_idle_time: Duration::from_secs(60),
            verify_ssl: true,
            root_ca: String::new(),
            client_cert: String::new(),
            client_private_key: String::new(),
        }
    }
}

impl core::fmt::Debug for PoolSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolSettings")
            .field("max_connections", &self.max_connections)
            .field("max_idle_time", &self.max_idle_time)
            .field("verify_ssl", &self.verify_ssl)
            .field("has_root_ca", &!self.root_ca.is_empty())
            .field("has_client_cert", &!self.client_cert.is_empty())
            .finish()
    }
}

struct Entry<C> {
    id: u64,
    host: String,
    port: u16,
    conn: Arc<Mutex<C>>,
    cancelled: Arc<AtomicBool>,
    last_used: Instant,
}

impl<C> Entry<C> {
    fn lease(&self, key: &str) -> Lease<C> {
        Lease {
            key: key.to_string(),
            id: self.id,
            conn: Arc::clone(&self.conn),
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

struct PoolState<C> {
    entries: HashMap<String, Entry<C>>,
    jar: CookieJar,
    next_id: u64,
}

/// Exclusive use of a pooled connection for one exchange.
pub struct Lease<C> {
    key: String,
    id: u64,
    conn: Arc<Mutex<C>>,
    cancelled: Arc<AtomicBool>,
}

impl<C> Lease<C> {
    /// Lock the connection for reading and writing.
    pub fn lock(&self) -> MutexGuard<'_, C> {
        lock(&self.conn)
    }

    /// Stable identity of the underlying handle within its pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `host:port` the connection was created for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the pool was torn down while this lease was out.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn cancel_flag(&self) -> &AtomicBool {
        &self.cancelled
    }
}

impl<C> core::fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Lease")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cache of live connections plus the shared cookie jar.
pub struct ConnectionPool<N: Connect> {
    connector: N,
    settings: PoolSettings,
    state: Mutex<PoolState<N::Connection>>,
}

impl<N: Connect> ConnectionPool<N> {
    /// An empty pool creating handles through `connector`.
    pub fn new(connector: N, settings: PoolSettings) -> Self {
        Self {
            connector,
            settings,
            state: Mutex::new(PoolState {
                entries: HashMap::new(),
                jar: CookieJar::new(),
                next_id: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState<N::Connection>> {
        lock(&self.state)
    }

    /// The connector new handles come from.
    pub fn connector(&self) -> &N {
        &self.connector
    }

    /// Pool configuration.
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Borrow the cached connection for `host:port`, creating one on a miss.
    ///
    /// Idle entries are closed before the lookup. On a miss at capacity the
    /// least recently used entry is evicted. New handles get the configured
    /// TLS material but are not connected yet.
    pub fn get_connection(&self, host: &str, port: u16) -> Result<Lease<N::Connection>> {
        let key = format!("{host}:{port}");
        let now = Instant::now();
        let mut state = self.state();

        self.evict_idle(&mut state, now);

        if let Some(entry) = state.entries.get_mut(&key) {
            entry.last_used = now;
            trace!(key = %key, id = entry.id, "pooled connection reused");
            return Ok(entry.lease(&key));
        }

        if state.entries.len() >= self.settings.max_connections {
            evict_least_recently_used(&mut state);
        }

        let mut conn = self
            .connector
            .create()
            .map_err(|e| Error::network(format!("failed to create connection: {e:?}")))?;
        self.install_tls(&mut conn);

        let id = state.next_id;
        state.next_id += 1;
        let entry = Entry {
            id,
            host: host.to_string(),
            port,
            conn: Arc::new(Mutex::new(conn)),
            cancelled: Arc::new(AtomicBool::new(false)),
            last_used: now,
        };
        let lease = entry.lease(&key);
        debug!(key = %key, id, "pooled connection created");
        state.entries.insert(key, entry);
        Ok(lease)
    }

    /// Hand a lease back. The connection stays open for reuse unless it was
    /// evicted or the pool was cleared while it was out, in which case it is
    /// closed now.
    pub fn release_connection(&self, lease: Lease<N::Connection>) {
        let orphaned = {
            let mut state = self.state();
            match state.entries.get_mut(&lease.key) {
                Some(entry) if entry.id == lease.id => {
                    entry.last_used = Instant::now();
                    false
                }
                _ => true,
            }
        };
        if orphaned {
            debug!(key = %lease.key, id = lease.id, "closing orphaned connection");
            lease.lock().disconnect();
        }
    }

    /// Close and forget every cached connection. Exchanges running on a
    /// leased connection observe the cancellation and abort.
    pub fn disconnect_all(&self) {
        let mut state = self.state();
        let count = state.entries.len();
        for (_, entry) in state.entries.drain() {
            entry.cancelled.store(true, Ordering::Release);
            close_if_idle(&entry.conn);
        }
        info!(count, "connection pool cleared");
    }

    /// Number of cached connections.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// Whether no connection is cached.
    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    /// Destinations currently cached, as `(host, port)`.
    pub fn destinations(&self) -> Vec<(String, u16)> {
        self.state()
            .entries
            .values()
            .map(|e| (e.host.clone(), e.port))
            .collect()
    }

    /// `name=value` pairs the jar holds for `url`.
    pub fn cookies_for_url(&self, url: &str) -> Vec<String> {
        self.state().jar.cookies_for_url(url)
    }

    /// Parse a `Set-Cookie` value received from `url` into the jar.
    pub fn set_cookie(&self, url: &str, header: &str) -> Option<Cookie> {
        self.state().jar.set_cookie(url, header)
    }

    /// Store an already parsed cookie.
    pub fn store_cookie(&self, cookie: Cookie) {
        self.state().jar.insert(cookie, cookie::now());
    }

    /// Run `f` with exclusive access to the jar.
    pub fn with_cookie_jar<R>(&self, f: impl FnOnce(&mut CookieJar) -> R) -> R {
        f(&mut self.state().jar)
    }

    fn evict_idle(&self, state: &mut PoolState<N::Connection>, now: Instant) {
        let max_idle = self.settings.max_idle_time;
        state.entries.retain(|key, entry| {
            let idle = now.saturating_duration_since(entry.last_used);
            if idle <= max_idle {
                return true;
            }
            debug!(key = %key, id = entry.id, idle_ms = idle.as_millis() as u64, "evicting idle connection");
            close_if_idle(&entry.conn);
            false
        });
    }

    fn install_tls(&self, conn: &mut N::Connection) {
        conn.set_verify_ssl(self.settings.verify_ssl);
        if !self.settings.root_ca.is_empty() {
            conn.set_ca_cert(&self.settings.root_ca);
        }
        if !self.settings.client_cert.is_empty() {
            conn.set_client_cert(&self.settings.client_cert);
        }
        if !self.settings.client_private_key.is_empty() {
            conn.set_client_private_key(&self.settings.client_private_key);
        }
    }
}

impl<N: Connect + core::fmt::Debug> core::fmt::Debug for ConnectionPool<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connector", &self.connector)
            .field("settings", &self.settings)
            .field("connections", &self.len())
            .finish()
    }
}

fn evict_least_recently_used<C: Close>(state: &mut PoolState<C>) {
    let oldest = state
        .entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        if let Some(entry) = state.entries.remove(&key) {
            debug!(key = %key, id = entry.id, "evicting least recently used connection");
            close_if_idle(&entry.conn);
        }
    }
}

// A connection locked by an in-flight exchange is closed by its holder on
// release instead.
fn close_if_idle<C: Close>(conn: &Mutex<C>) {
    match conn.try_lock() {
        Ok(mut conn) => conn.disconnect(),
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().disconnect(),
        Err(TryLockError::WouldBlock) => {}
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
