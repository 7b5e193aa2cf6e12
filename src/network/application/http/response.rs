//! Parsed response returned to the caller.

use super::cookie::Cookie;
use super::request::{Header, Headers};

/// The result of one completed exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Numeric status code.
    pub status_code: u16,
    /// Reason phrase following the status code.
    pub status_message: String,
    /// Headers with last-wins semantics for repeated names.
    pub headers: Headers,
    /// Every header line in arrival order, repeated names included. Chunked
    /// trailers are appended after the header block.
    pub raw_headers: Vec<Header>,
    /// Decoded body. Empty when a body callback consumed it.
    pub body: Vec<u8>,
    /// Cookies accepted from this exchange.
    pub cookies: Vec<Cookie>,
}

impl Response {
    /// Last value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Every value of header `name`, in arrival order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.raw_headers
            .iter()
            .filter(move |h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// `2xx`
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// `3xx`
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        super::exchange::parse_decimal(self.header("Content-Length")?.trim())
    }

    pub(crate) fn push_header(&mut self, name: &str, value: &str) {
        self.headers.set(name, value);
        self.raw_headers.push(Header::new(name, value));
    }
}
