//! Timed request/response I/O over a polled connection.
//!
//! The connection contract only offers non-blocking polling (`available`,
//! `read_byte`) and best-effort `read`/`write` calls. [`Exchange`] turns that
//! into framed HTTP/1.1 reads: status line, header block, fixed-length,
//! close-delimited and chunked bodies. Every wait is bounded by the read
//! timeout, which acts as a stall timer re-armed whenever bytes arrive, and
//! checks the lease's cancellation flag.

use super::request::Method;
use super::response::Response;
use super::options::Timeouts;
use crate::network::Connection;
use crate::network::error::{Error, ErrorKind, Result};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use heapless::Vec as LineBuf;
use std::time::Instant;
use tracing::trace;

/// Longest status, header or chunk-size line accepted.
pub const MAX_LINE_LEN: usize = 2048;

const READ_CHUNK: usize = 512;
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A single protocol line without its terminator.
pub type Line = LineBuf<u8, MAX_LINE_LEN>;

/// Streaming body consumer.
pub type BodyCallback = dyn FnMut(&[u8]) + Send;
/// Progress observer receiving `(received, total)`; `total` is 0 when the
/// length is unknown.
pub type ProgressCallback = dyn FnMut(usize, usize) + Send;

/// Where body bytes go.
#[derive(Default)]
pub struct BodySink<'s> {
    /// Receives body bytes instead of [`Response::body`] when set.
    pub on_body: Option<&'s mut BodyCallback>,
    /// Notified after every delivered block.
    pub on_progress: Option<&'s mut ProgressCallback>,
}

impl core::fmt::Debug for BodySink<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BodySink")
            .field("on_body", &self.on_body.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl BodySink<'_> {
    fn deliver(&mut self, body: &mut Vec<u8>, bytes: &[u8], received: usize, total: usize) {
        match self.on_body.as_mut() {
            Some(on_body) => on_body(bytes),
            None => body.extend_from_slice(bytes),
        }
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(received, total);
        }
    }
}

/// How the body of a response is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body: `HEAD`, `1xx`, `204` and `304`.
    Empty,
    /// `Content-Length` bytes.
    Length(usize),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Everything until the peer closes the connection.
    UntilClose,
}

impl Framing {
    /// Pick the framing for a response to `method`.
    pub fn of(method: Method, response: &Response) -> Result<Self> {
        let status = response.status_code;
        if method == Method::Head || (100..200).contains(&status) || status == 204 || status == 304
        {
            return Ok(Framing::Empty);
        }
        if let Some(encoding) = response.header("Transfer-Encoding") {
            if encoding
                .split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
            {
                return Ok(Framing::Chunked);
            }
        }
        match response.header("Content-Length") {
            Some(value) => parse_decimal(value.trim())
                .map(Framing::Length)
                .ok_or_else(|| Error::invalid_response(format!("invalid Content-Length {value:?}"))),
            None => Ok(Framing::UntilClose),
        }
    }

    /// Whether the connection may carry another exchange afterwards.
    pub fn leaves_connection_reusable(self) -> bool {
        self != Framing::UntilClose
    }
}

struct Stall {
    limit: Duration,
    last_progress: Instant,
}

impl Stall {
    fn new(limit: Duration) -> Self {
        Self {
            limit,
            last_progress: Instant::now(),
        }
    }

    fn progress(&mut self) {
        self.last_progress = Instant::now();
    }

    fn expired(&self) -> bool {
        !self.limit.is_zero() && self.last_progress.elapsed() > self.limit
    }
}

/// One request/response exchange on a leased connection.
pub struct Exchange<'a, C: Connection> {
    conn: &'a mut C,
    timeouts: Timeouts,
    cancelled: &'a AtomicBool,
}

impl<C: Connection> core::fmt::Debug for Exchange<'_, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Exchange")
            .field("connected", &self.conn.is_connected())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl<'a, C: Connection> Exchange<'a, C> {
    /// Wrap a connection for one exchange.
    pub fn new(conn: &'a mut C, timeouts: Timeouts, cancelled: &'a AtomicBool) -> Self {
        Self {
            conn,
            timeouts,
            cancelled,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(Error::new(ErrorKind::RequestCancelled, "request cancelled"));
        }
        Ok(())
    }

    /// Write all of `bytes`. A short write is a timeout once the write
    /// deadline has passed, a network error otherwise.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_cancelled()?;
        let start = Instant::now();
        let mut written = 0;
        while written < bytes.len() {
            let n = self.conn.write(&bytes[written..]);
            if n == 0 {
                break;
            }
            written += n;
        }
        self.conn.flush();
        if written == bytes.len() {
            trace!(bytes = written, "request written");
            return Ok(());
        }
        self.check_cancelled()?;
        let limit = self.timeouts.write;
        if !limit.is_zero() && start.elapsed() > limit {
            Err(Error::timeout(format!(
                "write timed out after {written} of {} bytes",
                bytes.len()
            )))
        } else {
            Err(Error::network(format!(
                "short write: {written} of {} bytes",
                bytes.len()
            )))
        }
    }

    /// Wait until at least one byte is readable. `Ok(false)` means the peer
    /// closed the connection with nothing left to read.
    fn wait_for_data(&mut self, stall: &Stall) -> Result<bool> {
        loop {
            self.check_cancelled()?;
            if self.conn.available() > 0 {
                return Ok(true);
            }
            if !self.conn.is_connected() {
                return Ok(false);
            }
            if stall.expired() {
                return Err(Error::timeout(format!(
                    "no data for {} ms",
                    stall.limit.as_millis()
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Read at least one byte into `buf`, or return 0 on end of stream.
    fn read_some(&mut self, buf: &mut [u8], stall: &mut Stall) -> Result<usize> {
        loop {
            if !self.wait_for_data(stall)? {
                return Ok(0);
            }
            let n = self.conn.read(buf);
            if n > 0 {
                stall.progress();
                return Ok(n);
            }
        }
    }

    /// Read one line, stripping the `\r\n` or `\n` terminator.
    pub fn read_line(&mut self) -> Result<Line> {
        let mut line = Line::new();
        let mut stall = Stall::new(self.timeouts.read);
        loop {
            if !self.wait_for_data(&stall)? {
                return Err(Error::network("connection closed unexpectedly"));
            }
            while let Some(byte) = self.conn.read_byte() {
                stall.progress();
                if byte == b'\n' {
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    return Ok(line);
                }
                line.push(byte)
                    .map_err(|_| Error::invalid_response("line exceeds buffer"))?;
            }
        }
    }

    /// Read the status line and the header block into `response`.
    ///
    /// Interim `1xx` responses other than `101` are skipped.
    pub fn read_head(&mut self, response: &mut Response) -> Result<()> {
        loop {
            let line = self.read_line()?;
            let (code, message) = parse_status_line(&line)?;
            response.status_code = code;
            response.status_message = message.to_string();
            self.read_headers(response)?;
            if (100..200).contains(&code) && code != 101 {
                trace!(status = code, "skipping interim response");
                *response = Response::default();
                continue;
            }
            return Ok(());
        }
    }

    /// Read `name: value` lines up to the empty line.
    pub fn read_headers(&mut self, response: &mut Response) -> Result<()> {
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                return Ok(());
            }
            let line = core::str::from_utf8(&line)
                .map_err(|_| Error::invalid_response("header is not valid UTF-8"))?;
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::invalid_response(format!("malformed header {line:?}")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::invalid_response("header with empty name"));
            }
            response.push_header(name, value.trim());
        }
    }

    /// Read the body according to `framing`.
    pub fn read_body(
        &mut self,
        framing: Framing,
        response: &mut Response,
        sink: &mut BodySink<'_>,
    ) -> Result<()> {
        match framing {
            Framing::Empty => Ok(()),
            Framing::Length(len) => {
                let mut received = 0;
                self.read_exact_into(len, len, &mut received, response, sink)
            }
            Framing::UntilClose => self.read_to_close(response, sink),
            Framing::Chunked => self.read_chunked(response, sink),
        }
    }

    fn read_exact_into(
        &mut self,
        len: usize,
        total: usize,
        received: &mut usize,
        response: &mut Response,
        sink: &mut BodySink<'_>,
    ) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        let mut remaining = len;
        let mut stall = Stall::new(self.timeouts.read);
        while remaining > 0 {
            let want = remaining.min(buf.len());
            let n = self.read_some(&mut buf[..want], &mut stall)?;
            if n == 0 {
                return Err(Error::network("connection closed unexpectedly"));
            }
            remaining -= n;
            *received += n;
            sink.deliver(&mut response.body, &buf[..n], *received, total);
        }
        Ok(())
    }

    fn read_to_close(&mut self, response: &mut Response, sink: &mut BodySink<'_>) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        let mut received = 0;
        let mut stall = Stall::new(self.timeouts.read);
        loop {
            let n = self.read_some(&mut buf, &mut stall)?;
            if n == 0 {
                return Ok(());
            }
            received += n;
            sink.deliver(&mut response.body, &buf[..n], received, 0);
        }
    }

    fn read_chunked(&mut self, response: &mut Response, sink: &mut BodySink<'_>) -> Result<()> {
        let mut received = 0;
        loop {
            let line = self.read_line()?;
            let size = parse_chunk_size(&line)?;
            if size == 0 {
                // Trailer fields share the header grammar.
                return self.read_headers(response);
            }
            self.read_exact_into(size, 0, &mut received, response, sink)?;
            if !self.read_line()?.is_empty() {
                return Err(Error::invalid_response("chunk not terminated by CRLF"));
            }
        }
    }
}

/// Parse `HTTP/1.x <code> <message>`.
pub fn parse_status_line(line: &[u8]) -> Result<(u16, &str)> {
    let line = core::str::from_utf8(line)
        .map_err(|_| Error::invalid_response("status line is not valid UTF-8"))?;
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(Error::invalid_response(format!(
            "invalid status line {line:?}"
        )));
    }
    let code = parts
        .next()
        .filter(|code| code.len() == 3)
        .and_then(parse_decimal::<u16>)
        .ok_or_else(|| Error::invalid_response(format!("invalid status code in {line:?}")))?;
    Ok((code, parts.next().unwrap_or_default().trim()))
}

/// Parse a chunk-size line, ignoring chunk extensions.
pub fn parse_chunk_size(line: &[u8]) -> Result<usize> {
    let text = core::str::from_utf8(line).unwrap_or_default();
    let digits = text.split(';').next().unwrap_or_default().trim();
    if digits.is_empty() {
        return Err(Error::invalid_response("empty chunk size"));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::invalid_response(format!("invalid chunk size {digits:?}")));
    }
    usize::from_str_radix(digits, 16)
        .map_err(|_| Error::invalid_response(format!("invalid chunk size {digits:?}")))
}

/// Parse a decimal field made only of ASCII digits.
pub(crate) fn parse_decimal<T: core::str::FromStr>(text: &str) -> Option<T> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
