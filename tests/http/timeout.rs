use super::*;
use libiot_http::network::application::http::{Request, Timeouts};
use libiot_http::network::error::ErrorKind;
use std::time::Instant;

#[test]
fn test_slow_response_times_out() {
    let (network, mut client) = client_with(no_retry());
    client.set_read_timeout(Duration::from_millis(50));
    network.slow_response(Duration::from_millis(500));
    network.queue_response(OK_EMPTY);

    let start = Instant::now();
    let err = client.send(&Request::get("http://example.com")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_slow_response_within_deadline() {
    let (network, mut client) = client_with(no_retry());
    client.set_read_timeout(Duration::from_millis(500));
    network.slow_response(Duration::from_millis(30));
    network.queue_response(OK_EMPTY);

    let response = client.send(&Request::get("http://example.com")).unwrap();
    assert_eq!(response.status_code, 200);
}

#[test]
fn test_slow_connect_times_out() {
    let (network, mut client) = client_with(no_retry());
    client.set_connection_timeout(Duration::from_millis(20));
    network.connect_delay(Duration::from_millis(80));
    network.queue_response(OK_EMPTY);

    let err = client.send(&Request::get("http://example.com")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(network.log().sent().len(), 0);
}

#[test]
fn test_timeouts_are_retried() {
    let (network, mut client) = client_with(ClientOptions {
        max_retries: 1,
        retry_delay: Duration::ZERO,
        ..ClientOptions::default()
    });
    client.set_connection_timeout(Duration::from_millis(20));
    network.connect_delay(Duration::from_millis(40));

    let err = client.send(&Request::get("http://example.com")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(network.connect_attempts(), 2);
}

#[test]
fn test_timeouts_applied_to_connection() {
    let (network, mut client) = client_with(ClientOptions::default());
    let timeouts = Timeouts {
        connect: Duration::from_secs(1),
        read: Duration::from_secs(2),
        write: Duration::from_secs(3),
    };
    client.set_timeouts(timeouts);
    network.queue_response(OK_EMPTY);

    client.send(&Request::get("http://example.com")).unwrap();

    let lease = client.pool().get_connection("example.com", 80).unwrap();
    assert_eq!(
        lease.lock().timeouts(),
        (timeouts.connect, timeouts.read, timeouts.write)
    );
    client.pool().release_connection(lease);
}
