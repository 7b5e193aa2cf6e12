//! Common error types for network operations

use std::borrow::Cow;

/// The kind of failure behind an [`Error`].
///
/// This enum defines the set of failures the HTTP engine can report. It is
/// designed to be simple and portable so it can be matched on cheaply and
/// logged with `defmt` on firmware builds.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ErrorKind {
    /// Connect, write or read failure, or a connection closed mid-exchange.
    NetworkError,
    /// A phase exceeded its configured deadline.
    Timeout,
    /// Reserved for failures inside the TLS layer.
    SslError,
    /// Malformed status line, header or chunk framing.
    InvalidResponse,
    /// The redirect chain exceeded the configured maximum.
    TooManyRedirects,
    /// The peer speaks a protocol the engine does not implement.
    UnsupportedProtocol,
    /// The request URL failed validation.
    InvalidUrl,
    /// The configured proxy URL failed validation.
    InvalidProxyUrl,
    /// The request was aborted by a call to cancel.
    RequestCancelled,
    /// The device clock has not been synchronized yet.
    TimeNotSet,
    /// The requested operation is not implemented.
    UnsupportedOperation,
    /// The proxy rejected the tunnel with `407`.
    ProxyAuthenticationRequired,
    /// A required header is missing.
    MissingHeader,
    /// A header is malformed.
    InvalidHeader,
    /// A header that must be unique appears more than once.
    DuplicateHeader,
    /// The request body is malformed.
    InvalidBody,
    /// A client option holds an unusable value.
    InvalidOption,
}

impl ErrorKind {
    /// Whether the outer retry loop may re-run a request that failed with
    /// this kind.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::NetworkError | ErrorKind::Timeout)
    }

    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::SslError => "SSLError",
            ErrorKind::InvalidResponse => "InvalidResponse",
            ErrorKind::TooManyRedirects => "TooManyRedirects",
            ErrorKind::UnsupportedProtocol => "UnsupportedProtocol",
            ErrorKind::InvalidUrl => "InvalidURL",
            ErrorKind::InvalidProxyUrl => "InvalidProxyURL",
            ErrorKind::RequestCancelled => "RequestCancelled",
            ErrorKind::TimeNotSet => "TimeNotSet",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
            ErrorKind::ProxyAuthenticationRequired => "ProxyAuthenticationRequired",
            ErrorKind::MissingHeader => "MissingHeader",
            ErrorKind::InvalidHeader => "InvalidHeader",
            ErrorKind::DuplicateHeader => "DuplicateHeader",
            ErrorKind::InvalidBody => "InvalidBody",
            ErrorKind::InvalidOption => "InvalidOption",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorKind {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

/// An error kind paired with a human readable message.
///
/// Every fallible operation in the crate returns this type; it never carries
/// a partial result alongside the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Details for logs and callers.
    pub message: Cow<'static, str>,
}

impl Error {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The message attached to this error.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn network(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub(crate) fn timeout(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub(crate) fn invalid_response(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind, kind.as_str())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
