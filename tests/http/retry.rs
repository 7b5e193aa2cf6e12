use super::*;
use libiot_http::network::application::http::Request;
use libiot_http::network::error::ErrorKind;
use std::time::Instant;

#[test]
fn test_retry_bound_on_connect_failure() {
    let (network, mut client) = client_with(ClientOptions {
        max_retries: 3,
        retry_delay: Duration::from_millis(40),
        ..ClientOptions::default()
    });
    network.fail_connect_always();

    let start = Instant::now();
    let err = client.send(&Request::get("http://example.com")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkError);
    assert_eq!(network.connect_attempts(), 4);
    assert!(start.elapsed() >= Duration::from_millis(120));
}

#[test]
fn test_recovers_after_transient_failures() {
    let (network, mut client) = client_with(ClientOptions {
        max_retries: 3,
        retry_delay: Duration::from_millis(10),
        ..ClientOptions::default()
    });
    network.fail_connect_times(2);
    network.queue_response(OK_EMPTY);

    let response = client.send(&Request::get("http://example.com")).unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(network.connect_attempts(), 3);
}

#[test]
fn test_connection_dropped_mid_body_is_retried() {
    let (network, mut client) = client_with(ClientOptions {
        max_retries: 1,
        retry_delay: Duration::ZERO,
        ..ClientOptions::default()
    });
    client.set_read_timeout(Duration::from_millis(200));
    // 40 bytes of head, then 4 of the promised 100 body bytes.
    network.queue_response("HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial");
    network.drop_after(44);

    let err = client.send(&Request::get("http://example.com")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkError);
    // The second attempt found no response left to read.
    assert_eq!(network.connect_attempts(), 2);
}

#[test]
fn test_server_errors_are_not_retried_by_default() {
    let (network, mut client) = client_with(ClientOptions {
        retry_delay: Duration::ZERO,
        ..ClientOptions::default()
    });
    network.queue_response("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n");
    network.queue_response(OK_EMPTY);

    let response = client.send(&Request::get("http://example.com")).unwrap();

    assert_eq!(response.status_code, 503);
    assert_eq!(network.pending_responses(), 1);
}

#[test]
fn test_server_errors_retried_when_enabled() {
    let (network, mut client) = client_with(ClientOptions {
        max_retries: 2,
        retry_delay: Duration::ZERO,
        retry_on_server_error: true,
        ..ClientOptions::default()
    });
    network.queue_response("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
    network.queue_response("HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\n\r\n");
    network.queue_response("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");

    let response = client.send(&Request::get("http://example.com")).unwrap();

    assert_eq!(response.text(), "ok");
    assert_eq!(network.log().sent().len(), 3);
}

#[test]
fn test_last_server_error_returned_when_retries_run_out() {
    let (network, mut client) = client_with(ClientOptions {
        max_retries: 1,
        retry_delay: Duration::ZERO,
        retry_on_server_error: true,
        ..ClientOptions::default()
    });
    network.queue_response("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
    network.queue_response("HTTP/1.1 504 Gateway Timeout\r\nContent-Length: 0\r\n\r\n");

    let response = client.send(&Request::get("http://example.com")).unwrap();

    assert_eq!(response.status_code, 504);
}

#[test]
fn test_validation_failures_are_not_retried() {
    let (network, mut client) = client_with(ClientOptions {
        max_retries: 5,
        ..ClientOptions::default()
    });
    network.queue_response(
        "HTTP/1.1 302 Found\r\nLocation: http://bad host/\r\nContent-Length: 0\r\n\r\n",
    );

    let err = client.send(&Request::get("http://example.com")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    assert_eq!(network.log().sent().len(), 1);
}
