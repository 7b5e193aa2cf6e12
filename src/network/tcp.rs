//! Plain TCP backing of the connection contract.
//!
//! [`TcpConnection`] speaks cleartext over a [`std::net::TcpStream`]. It
//! records the TLS material the pool installs so that a TLS-capable wrapper
//! can pick it up, but it does not perform a handshake itself, so clients
//! driven by [`TcpNetwork`] refuse `https://` targets and TLS proxies. Use it
//! for `http://` destinations, for local proxies, and for host-side testing.

use super::{Close, Connect, Connection, Read, Write};
use core::time::Duration;
use std::collections::VecDeque;
use std::io::{ErrorKind as IoErrorKind, Read as StdRead, Write as StdWrite};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use tracing::{debug, trace};

const POLL_CHUNK: usize = 512;

/// Connector producing [`TcpConnection`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpNetwork;

impl Connect for TcpNetwork {
    type Connection = TcpConnection;
    type Error = core::convert::Infallible;

    fn create(&self) -> Result<Self::Connection, Self::Error> {
        Ok(TcpConnection::default())
    }

    fn requires_synced_clock(&self) -> bool {
        false
    }

    fn supports_tls(&self) -> bool {
        false
    }
}

/// TLS material recorded on a [`TcpConnection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    /// Peer verification flag.
    pub verify_ssl: bool,
    /// Root CA PEM.
    pub ca_cert: String,
    /// Client certificate PEM.
    pub client_cert: String,
    /// Client private key PEM.
    pub client_private_key: String,
}

/// A blocking TCP connection with a small look-ahead buffer used to answer
/// [`Read::available`] without blocking.
#[derive(Debug, Default)]
pub struct TcpConnection {
    stream: Option<TcpStream>,
    pending: VecDeque<u8>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    tls: TlsMaterial,
}

impl TcpConnection {
    /// TLS material installed on this handle.
    pub fn tls(&self) -> &TlsMaterial {
        &self.tls
    }

    fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn fill_nonblocking(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if stream.set_nonblocking(true).is_err() {
            return;
        }
        let mut chunk = [0u8; POLL_CHUNK];
        let outcome = stream.read(&mut chunk);
        let _ = stream.set_nonblocking(false);
        match outcome {
            Ok(0) => {
                trace!("peer closed the stream");
                self.close_stream();
            }
            Ok(n) => self.pending.extend(&chunk[..n]),
            Err(e) if e.kind() == IoErrorKind::WouldBlock => {}
            Err(e) => {
                debug!(error = %e, "poll failed, closing stream");
                self.close_stream();
            }
        }
    }
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

impl Read for TcpConnection {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.pending.is_empty() {
            let len = buf.len().min(self.pending.len());
            for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..len)) {
                *slot = byte;
            }
            return len;
        }
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        match stream.read(buf) {
            Ok(0) => {
                self.close_stream();
                0
            }
            Ok(n) => n,
            Err(e) if matches!(e.kind(), IoErrorKind::WouldBlock | IoErrorKind::TimedOut) => 0,
            Err(e) => {
                debug!(error = %e, "read failed, closing stream");
                self.close_stream();
                0
            }
        }
    }

    fn available(&mut self) -> usize {
        if self.pending.is_empty() {
            self.fill_nonblocking();
        }
        self.pending.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.available() == 0 {
            return None;
        }
        self.pending.pop_front()
    }
}

impl Write for TcpConnection {
    fn write(&mut self, buf: &[u8]) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        let mut written = 0;
        while written < buf.len() {
            match stream.write(&buf[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == IoErrorKind::Interrupted => {}
                Err(e) => {
                    debug!(error = %e, written, "write failed");
                    break;
                }
            }
        }
        written
    }

    fn flush(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let _ = stream.flush();
        }
    }
}

impl Close for TcpConnection {
    fn disconnect(&mut self) {
        self.close_stream();
        self.pending.clear();
    }
}

impl Connection for TcpConnection {
    fn connect(&mut self, host: &str, port: u16) -> bool {
        self.disconnect();
        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(host, port, error = %e, "name resolution failed");
                return false;
            }
        };
        for addr in addrs {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    let _ = stream.set_read_timeout(self.read_timeout);
                    let _ = stream.set_write_timeout(self.write_timeout);
                    let _ = stream.set_nodelay(true);
                    self.stream = Some(stream);
                    return true;
                }
                Err(e) => debug!(%addr, error = %e, "connect attempt failed"),
            }
        }
        false
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn set_timeouts(&mut self, connect: Duration, read: Duration, write: Duration) {
        self.connect_timeout = non_zero(connect);
        self.read_timeout = non_zero(read);
        self.write_timeout = non_zero(write);
        if let Some(stream) = self.stream.as_ref() {
            let _ = stream.set_read_timeout(self.read_timeout);
            let _ = stream.set_write_timeout(self.write_timeout);
        }
    }

    fn set_verify_ssl(&mut self, verify: bool) {
        self.tls.verify_ssl = verify;
    }

    fn set_ca_cert(&mut self, pem: &str) {
        self.tls.ca_cert = pem.to_string();
    }

    fn set_client_cert(&mut self, pem: &str) {
        self.tls.client_cert = pem.to_string();
    }

    fn set_client_private_key(&mut self, pem: &str) {
        self.tls.client_private_key = pem.to_string();
    }
}
