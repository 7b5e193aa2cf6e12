//! A network abstraction layer for embedded systems
//!
//! This module provides the transport traits the HTTP engine is written
//! against. A transport is any byte stream that can be connected to a
//! `host:port`, polled, read, written and closed. The engine never touches a
//! socket directly: a hardware TLS stack, a plain TCP socket or a scripted
//! test double are interchangeable as long as they implement [`Connection`].
//!
//! The contract reports failure through counts rather than error
//! values: a `write` that accepts fewer bytes than requested, or a `read`
//! that yields nothing where data was expected, tells the caller that the
//! connection is in trouble. The caller decides whether that is a timeout or
//! a network error by comparing elapsed time with its configured deadlines.

#![deny(unsafe_code)]

use core::time::Duration;

/// Common error types for network operations
pub mod error;

/// Scriptable connection double for exercising the engine without a network.
pub mod mock;

/// Plain TCP backing of the connection contract.
pub mod tcp;

/// Application layer protocols built on top of the transport traits.
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Write};
}

/// Byte-oriented input side of a connection.
pub trait Read {
    /// Read up to `buf.len()` bytes, returning how many were copied.
    ///
    /// Zero means no data was available before the transport gave up; it is
    /// not an error by itself.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> usize;

    /// Read a single byte, or `None` when nothing is buffered.
    fn read_byte(&mut self) -> Option<u8>;

    /// Read until a `\n` terminator or the end of buffered data.
    ///
    /// The terminator is included in the returned line.
    fn read_line(&mut self) -> Vec<u8> {
        let mut line = Vec::new();
        while let Some(byte) = self.read_byte() {
            line.push(byte);
            if byte == b'\n' {
                break;
            }
        }
        line
    }
}

/// Byte-oriented output side of a connection.
pub trait Write {
    /// Write `buf`, returning how many bytes the transport accepted.
    fn write(&mut self, buf: &[u8]) -> usize;
    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Tear-down side of a connection.
pub trait Close {
    /// Close the connection. Closing an already closed connection is a no-op.
    fn disconnect(&mut self);
}

/// A synchronous, TLS-capable connection.
pub trait Connection: Read + Write + Close {
    /// Open the connection to `host:port`. Returns `false` on failure.
    fn connect(&mut self, host: &str, port: u16) -> bool;

    /// Whether the connection is currently open.
    fn is_connected(&self) -> bool;

    /// Configure transport level deadlines.
    fn set_timeouts(&mut self, connect: Duration, read: Duration, write: Duration);

    /// Enable or disable peer certificate verification.
    fn set_verify_ssl(&mut self, verify: bool);

    /// Install a PEM encoded root CA.
    fn set_ca_cert(&mut self, pem: &str);

    /// Install a PEM encoded client certificate.
    fn set_client_cert(&mut self, pem: &str);

    /// Install a PEM encoded client private key.
    fn set_client_private_key(&mut self, pem: &str);
}

/// A connector that manufactures fresh, unconnected handles.
///
/// The connection pool owns one connector and asks it for a new handle
/// whenever it has no cached connection for a destination.
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Create a new, not yet connected, handle.
    fn create(&self) -> Result<Self::Connection, Self::Error>;

    /// Whether handles from this connector validate certificates against the
    /// wall clock, which then has to be synchronized before any request.
    fn requires_synced_clock(&self) -> bool {
        true
    }

    /// Whether handles from this connector can speak TLS. Requests that need
    /// TLS fail with `SslError` before anything is written otherwise.
    fn supports_tls(&self) -> bool {
        true
    }
}
