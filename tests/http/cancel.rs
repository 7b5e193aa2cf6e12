use super::*;
use libiot_http::network::application::http::Request;
use libiot_http::network::error::ErrorKind;
use std::time::Instant;

#[test]
fn test_cancel_from_another_thread() {
    let (network, mut client) = client_with(no_retry());
    network.slow_response(Duration::from_secs(2));
    network.queue_response(OK_EMPTY);

    let canceller = client.canceller();
    let worker = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        canceller.cancel();
    });

    let start = Instant::now();
    let err = client.send(&Request::get("http://example.com")).unwrap_err();
    worker.join().unwrap();

    assert_eq!(err.kind(), ErrorKind::RequestCancelled);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(client.pool().is_empty());
}

#[test]
fn test_client_usable_after_cancel() {
    let (network, mut client) = client_with(no_retry());
    network.queue_response(OK_EMPTY);
    client.send(&Request::get("http://example.com")).unwrap();

    client.cancel();
    assert!(client.pool().is_empty());
    assert_eq!(network.disconnects(), 1);

    network.queue_response(OK_EMPTY);
    client.send(&Request::get("http://example.com")).unwrap();
    assert_eq!(network.connections_created(), 2);
}
