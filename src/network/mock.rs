//! Mock connection implementation for engine testing
//!
//! [`MockNetwork`] is a [`Connect`] implementation whose handles replay
//! queued responses instead of talking to a peer. All handles created by one
//! network share a single script: the response queue, the injected
//! behaviors, the connect attempt counter and the [`CommunicationLog`].
//!
//! Every `write` on a handle loads the next queued response into that
//! handle's receive buffer, so a request written as one block is answered by
//! exactly one queued response. A CONNECT handshake followed by the tunneled
//! request therefore consumes two responses.
//!
//! Production code never uses this module.

use super::error::{Error, ErrorKind};
use super::{Close, Connect, Connection, Read, Write};
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Direction of a logged transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes written by the client.
    Sent,
    /// Bytes handed to the client by a read.
    Received,
}

/// One chronological log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Transfer direction.
    pub direction: Direction,
    /// Identity of the handle that performed the transfer.
    pub connection: usize,
    /// Transferred bytes.
    pub data: Vec<u8>,
}

/// Chronological record of everything sent and received through the mock.
#[derive(Debug, Clone, Default)]
pub struct CommunicationLog {
    entries: Vec<Entry>,
}

impl CommunicationLog {
    fn add_sent(&mut self, connection: usize, buf: &[u8]) {
        self.entries.push(Entry {
            direction: Direction::Sent,
            connection,
            data: buf.to_vec(),
        });
    }

    fn add_received(&mut self, connection: usize, buf: &[u8]) {
        // Byte-at-a-time reads are merged into the preceding record.
        if let Some(last) = self.entries.last_mut() {
            if last.direction == Direction::Received && last.connection == connection {
                last.data.extend_from_slice(buf);
                return;
            }
        }
        self.entries.push(Entry {
            direction: Direction::Received,
            connection,
            data: buf.to_vec(),
        });
    }

    /// All records, oldest first.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Every block written by the client, in order.
    pub fn sent(&self) -> Vec<&[u8]> {
        self.entries
            .iter()
            .filter(|e| e.direction == Direction::Sent)
            .map(|e| e.data.as_slice())
            .collect()
    }

    /// Every block written by the client, lossily decoded as text.
    pub fn sent_text(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|data| String::from_utf8_lossy(data).into_owned())
            .collect()
    }

    /// Whether any written block contains `needle`.
    pub fn sent_contains(&self, needle: &[u8]) -> bool {
        self.sent()
            .into_iter()
            .any(|data| find_slice(data, needle).is_some())
    }

    /// Drop all records.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// TLS material most recently installed on any handle of the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsState {
    /// Peer verification flag.
    pub verify_ssl: bool,
    /// Root CA PEM.
    pub ca_cert: String,
    /// Client certificate PEM.
    pub client_cert: String,
    /// Client private key PEM.
    pub client_private_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectBehavior {
    Succeed,
    AlwaysFail,
    FailTimes(u32),
}

#[derive(Debug)]
struct Script {
    responses: VecDeque<Vec<u8>>,
    connect_behavior: ConnectBehavior,
    connect_delay: Duration,
    response_delay: Duration,
    drop_after: Option<usize>,
    fail_writes: bool,
    write_delay: Duration,
    fail_create: bool,
    connect_attempts: usize,
    disconnects: usize,
    next_id: usize,
    tls: TlsState,
    log: CommunicationLog,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            responses: VecDeque::new(),
            connect_behavior: ConnectBehavior::Succeed,
            connect_delay: Duration::ZERO,
            response_delay: Duration::ZERO,
            drop_after: None,
            fail_writes: false,
            write_delay: Duration::ZERO,
            fail_create: false,
            connect_attempts: 0,
            disconnects: 0,
            next_id: 0,
            tls: TlsState::default(),
            log: CommunicationLog::default(),
        }
    }
}

/// Scripted connector. Clones share the same script.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    script: Arc<Mutex<Script>>,
}

impl MockNetwork {
    /// Create a network whose connections always succeed and have nothing to
    /// say until a response is queued.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        lock(&self.script)
    }

    /// Queue a raw response for the next request written to any handle.
    pub fn queue_response(&self, response: impl AsRef<[u8]>) {
        self.script()
            .responses
            .push_back(response.as_ref().to_vec());
    }

    /// Number of responses not yet consumed.
    pub fn pending_responses(&self) -> usize {
        self.script().responses.len()
    }

    /// Make every connect attempt fail.
    pub fn fail_connect_always(&self) {
        self.script().connect_behavior = ConnectBehavior::AlwaysFail;
    }

    /// Fail the next `times` connect attempts, then succeed.
    pub fn fail_connect_times(&self, times: u32) {
        self.script().connect_behavior = ConnectBehavior::FailTimes(times);
    }

    /// Make connect attempts succeed again.
    pub fn succeed_connect(&self) {
        self.script().connect_behavior = ConnectBehavior::Succeed;
    }

    /// Block every connect attempt for `delay` before it resolves.
    pub fn connect_delay(&self, delay: Duration) {
        self.script().connect_delay = delay;
    }

    /// Hold back each response for `delay` after the request is written.
    pub fn slow_response(&self, delay: Duration) {
        self.script().response_delay = delay;
    }

    /// Drop the connection after `bytes` bytes of a response were delivered.
    pub fn drop_after(&self, bytes: usize) {
        self.script().drop_after = Some(bytes);
    }

    /// Make every write report that nothing was accepted.
    pub fn fail_writes(&self) {
        self.script().fail_writes = true;
    }

    /// Block every write for `delay` before it resolves.
    pub fn write_delay(&self, delay: Duration) {
        self.script().write_delay = delay;
    }

    /// Make the connector refuse to create handles.
    pub fn fail_create(&self) {
        self.script().fail_create = true;
    }

    /// Number of connect calls observed so far.
    pub fn connect_attempts(&self) -> usize {
        self.script().connect_attempts
    }

    /// Number of disconnect calls on open handles observed so far.
    pub fn disconnects(&self) -> usize {
        self.script().disconnects
    }

    /// Number of handles created so far.
    pub fn connections_created(&self) -> usize {
        self.script().next_id
    }

    /// TLS material most recently installed on a handle.
    pub fn tls_state(&self) -> TlsState {
        self.script().tls.clone()
    }

    /// Snapshot of the communication log.
    pub fn log(&self) -> CommunicationLog {
        self.script().log.clone()
    }

    /// Forget everything logged so far.
    pub fn clear_log(&self) {
        self.script().log.clear();
    }
}

impl Connect for MockNetwork {
    type Connection = MockConnection;
    type Error = Error;

    fn create(&self) -> Result<Self::Connection, Self::Error> {
        let mut script = self.script();
        if script.fail_create {
            return Err(Error::new(
                ErrorKind::NetworkError,
                "mock connector refused to create a connection",
            ));
        }
        let id = script.next_id;
        script.next_id += 1;
        Ok(MockConnection {
            id,
            script: Arc::clone(&self.script),
            connected: false,
            receive: VecDeque::new(),
            ready_at: None,
            delivered: 0,
            timeouts: (Duration::ZERO, Duration::ZERO, Duration::ZERO),
        })
    }

    fn requires_synced_clock(&self) -> bool {
        false
    }
}

/// A handle created by [`MockNetwork`].
#[derive(Debug)]
pub struct MockConnection {
    id: usize,
    script: Arc<Mutex<Script>>,
    connected: bool,
    receive: VecDeque<u8>,
    ready_at: Option<Instant>,
    delivered: usize,
    timeouts: (Duration, Duration, Duration),
}

impl MockConnection {
    /// Identity of this handle within its network.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Timeouts last configured on this handle as `(connect, read, write)`.
    pub fn timeouts(&self) -> (Duration, Duration, Duration) {
        self.timeouts
    }

    fn readable(&mut self) -> usize {
        if !self.connected {
            return 0;
        }
        if let Some(ready_at) = self.ready_at {
            if Instant::now() < ready_at {
                return 0;
            }
        }
        let drop_after = lock(&self.script).drop_after;
        match drop_after {
            Some(limit) if self.delivered >= limit => {
                self.connected = false;
                self.receive.clear();
                0
            }
            Some(limit) => self.receive.len().min(limit - self.delivered),
            None => self.receive.len(),
        }
    }
}

impl Read for MockConnection {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.readable());
        for (slot, byte) in buf.iter_mut().zip(self.receive.drain(..len)) {
            *slot = byte;
        }
        self.delivered += len;
        if len > 0 {
            lock(&self.script).log.add_received(self.id, &buf[..len]);
        }
        len
    }

    fn available(&mut self) -> usize {
        self.readable()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read(&mut byte) == 1).then_some(byte[0])
    }
}

impl Write for MockConnection {
    fn write(&mut self, buf: &[u8]) -> usize {
        if !self.connected {
            return 0;
        }
        let (delay, fail) = {
            let script = lock(&self.script);
            (script.write_delay, script.fail_writes)
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut script = lock(&self.script);
        script.log.add_sent(self.id, buf);
        if fail {
            return 0;
        }
        if let Some(response) = script.responses.pop_front() {
            self.receive = response.into();
            self.delivered = 0;
            self.ready_at = Some(Instant::now() + script.response_delay);
        }
        buf.len()
    }

    fn flush(&mut self) {}
}

impl Close for MockConnection {
    fn disconnect(&mut self) {
        if self.connected {
            lock(&self.script).disconnects += 1;
        }
        self.connected = false;
        self.receive.clear();
        self.ready_at = None;
    }
}

impl Connection for MockConnection {
    fn connect(&mut self, _host: &str, _port: u16) -> bool {
        let delay = {
            let mut script = lock(&self.script);
            script.connect_attempts += 1;
            script.connect_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut script = lock(&self.script);
        let ok = match script.connect_behavior {
            ConnectBehavior::Succeed => true,
            ConnectBehavior::AlwaysFail => false,
            ConnectBehavior::FailTimes(0) => {
                script.connect_behavior = ConnectBehavior::Succeed;
                true
            }
            ConnectBehavior::FailTimes(n) => {
                script.connect_behavior = ConnectBehavior::FailTimes(n - 1);
                false
            }
        };
        self.connected = ok;
        ok
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn set_timeouts(&mut self, connect: Duration, read: Duration, write: Duration) {
        self.timeouts = (connect, read, write);
    }

    fn set_verify_ssl(&mut self, verify: bool) {
        lock(&self.script).tls.verify_ssl = verify;
    }

    fn set_ca_cert(&mut self, pem: &str) {
        lock(&self.script).tls.ca_cert = pem.to_string();
    }

    fn set_client_cert(&mut self, pem: &str) {
        lock(&self.script).tls.client_cert = pem.to_string();
    }

    fn set_client_private_key(&mut self, pem: &str) {
        lock(&self.script).tls.client_private_key = pem.to_string();
    }
}

// A panicking test thread must not wedge every later assertion on the log.
fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Finds the first occurrence of a slice in another slice and returns its starting position.
pub(crate) fn find_slice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
