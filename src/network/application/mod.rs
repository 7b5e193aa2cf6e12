//! # Application Layer Network Protocols
//!
//! This module contains the application layer (OSI Layer 7) protocol built on
//! top of the transport traits in [`crate::network`].
//!
//! ## Available Protocols
//!
//! - **[`http`]**: HTTP/1.1 client with connection pooling, redirects,
//!   retries, cookies, authentication and proxy tunnels
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing [`Connection`](crate::network::Connection)
//! - **Blocking**: One call stack per request, no executor required
//! - **Resource Conscious**: Bounded line buffers and streaming body callbacks
//! - **Error Handling**: A single error taxonomy shared by every component
//!
//! ## Usage Pattern
//!
//! 1. Pick a connector for your transport (or [`MockNetwork`](crate::network::mock::MockNetwork) in tests)
//! 2. Wrap it with the protocol client
//! 3. Use protocol-specific methods for communication
//!
//! ```rust
//! use libiot_http::network::application::http::{Client, ClientOptions, Request};
//! use libiot_http::network::mock::MockNetwork;
//!
//! // 1. Create a connector
//! let network = MockNetwork::new();
//! network.queue_response("HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n");
//!
//! // 2. Wrap with protocol client
//! let mut client = Client::new(network, ClientOptions::default()).unwrap();
//!
//! // 3. Use protocol methods
//! let response = client.send(&Request::get("http://example.com/api/status")).unwrap();
//! assert_eq!(response.status_code, 204);
//! ```

/// HTTP client implementation.
///
/// Provides a blocking HTTP/1.1 client suitable for embedded systems,
/// supporting every request method, chunked responses and streaming bodies.
pub mod http;
