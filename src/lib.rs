//! # libiot-http - HTTP(S) client engine for IoT devices
//!
//! A blocking HTTP/1.1 client for devices that reach the network through a
//! single TLS-capable socket object. The engine drives every request through
//! connection acquisition, request serialization, response parsing (fixed
//! length, close delimited and chunked bodies), redirect chasing and retry
//! with delay, over a byte-at-a-time transport that may stall or drop at any
//! point.
//!
//! ## Features
//!
//! ### Request engine
//! - **Redirects**: bounded, with relative `Location` resolution
//! - **Retries**: network failures and timeouts, optionally `5xx` responses
//! - **Bodies**: buffered or streamed through callbacks with progress reports
//! - **Cancellation**: from any thread through a [`Canceller`](network::application::http::Canceller)
//!
//! ### Decorators
//! - **Authentication**: Basic and Bearer
//! - **Proxies**: absolute-form forwarding and `CONNECT` tunnels
//! - **Cookies**: domain-keyed jar shared through the connection pool
//!
//! ### Transports
//! - Any type implementing [`Connection`](network::Connection)
//! - [`TcpNetwork`](network::tcp::TcpNetwork) for plain sockets
//! - [`MockNetwork`](network::mock::MockNetwork) for scripted tests
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libiot-http = "0.1.0"
//! ```
//!
//! ### Basic Example
//!
//! ```rust
//! use libiot_http::network::application::http::{Client, ClientOptions, Request};
//! use libiot_http::network::mock::MockNetwork;
//!
//! let network = MockNetwork::new();
//! network.queue_response("HTTP/1.1 200 OK\r\nContent-Length: 13\r\n\r\nHello, World!");
//!
//! let mut client = Client::new(network, ClientOptions::default())?;
//! let response = client.send(&Request::get("http://example.com"))?;
//!
//! assert_eq!(response.status_code, 200);
//! assert_eq!(response.text(), "Hello, World!");
//! # Ok::<(), libiot_http::network::error::Error>(())
//! ```
//!
//! ### Configuration From JSON
//!
//! ```rust
//! use libiot_http::network::application::http::{Client, ClientOptions, Request};
//! use libiot_http::network::mock::MockNetwork;
//!
//! let options = ClientOptions::from_json(r#"{"cookiesEnabled":true,"maxRedirects":2}"#)?;
//!
//! let network = MockNetwork::new();
//! network.queue_response("HTTP/1.1 204 No Content\r\nSet-Cookie: sid=1\r\n\r\n");
//!
//! let mut client = Client::new(network, options)?;
//! let response = client.send(&Request::get("http://example.com/login"))?;
//! assert_eq!(response.cookies[0].name, "sid");
//! # Ok::<(), libiot_http::network::error::Error>(())
//! ```
//!
//! ## Optional Features
//!
//! - `defmt`: Enable defmt formatting of error kinds and methods for firmware logs

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libiot/")]

/// Network abstraction layer providing the transport contract and the HTTP engine.
///
/// This module contains the connection traits, the shared error taxonomy,
/// the connection backings and the HTTP/1.1 client built on top of them.
pub mod network;
