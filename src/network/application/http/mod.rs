//! HTTP/1.1 protocol implementation for embedded systems.
//!
//! This module provides a blocking HTTP client designed for devices that
//! reach the network through a single TLS-capable socket abstraction. It
//! focuses on predictable control flow over an unreliable, byte-at-a-time
//! transport.
//!
//! # Features
//!
//! - HTTP/1.1 request serialization, including multipart form bodies
//! - Fixed-length, unbounded and chunked response bodies
//! - Bounded redirect following and retry with delay
//! - Connection pooling keyed by `host:port` with idle and LRU eviction
//! - Cookie jar shared through the pool
//! - Basic and Bearer authentication
//! - Plain HTTP proxies and `CONNECT` tunnels
//! - Streaming body and progress callbacks
//!
//! # Request lifecycle
//!
//! ```text
//! Validate -> Authenticate -> EstablishConnection -> (ProxyTunnel) -> Write
//!   -> ReadStatusAndHeaders -> ReadBody | ChunkedDecode -> ProcessCookies
//!   -> EvaluateRedirect -> (next hop | return)          [wrapped by Retry]
//! ```
//!
//! # Usage
//!
//! The main entry point is the [`client::Client`] which works with any
//! connector implementing [`crate::network::Connect`].
//!
//! ```rust
//! use libiot_http::network::application::http::{Client, ClientOptions, Request};
//! use libiot_http::network::mock::MockNetwork;
//!
//! let network = MockNetwork::new();
//! network.queue_response("HTTP/1.1 200 OK\r\nContent-Length: 13\r\n\r\nHello, World!");
//!
//! let mut client = Client::new(network, ClientOptions::default()).unwrap();
//! let response = client.send(&Request::get("http://example.com")).unwrap();
//!
//! assert_eq!(response.status_code, 200);
//! assert_eq!(response.text(), "Hello, World!");
//! ```

pub mod auth;
pub mod client;
pub mod cookie;
pub mod exchange;
pub mod options;
pub mod pool;
pub mod proxy;
pub mod rate_limit;
pub mod request;
pub mod response;
pub mod url;
pub mod validator;

pub use client::{Canceller, Client};
pub use cookie::{Cookie, CookieJar};
pub use options::{AuthType, ClientOptions, Timeouts};
pub use pool::{ConnectionPool, Lease, PoolSettings};
pub use request::{Header, Headers, Method, Request};
pub use response::Response;
