//! End-to-end engine tests driven through the scripted network.

use core::time::Duration;
use libiot_http::network::application::http::{Client, ClientOptions};
use libiot_http::network::mock::MockNetwork;

mod callbacks;
mod cancel;
mod loopback;
mod pool;
mod proxy;
mod redirect;
mod retry;
mod timeout;

pub const OK_EMPTY: &str = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";

/// Options with retries disabled so failures surface immediately.
pub fn no_retry() -> ClientOptions {
    ClientOptions {
        max_retries: 0,
        retry_delay: Duration::ZERO,
        ..ClientOptions::default()
    }
}

pub fn client_with(options: ClientOptions) -> (MockNetwork, Client<MockNetwork>) {
    let network = MockNetwork::new();
    let client = Client::new(network.clone(), options).unwrap();
    (network, client)
}
