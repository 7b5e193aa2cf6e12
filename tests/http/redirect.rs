use super::*;
use libiot_http::network::application::http::{Method, Request};
use libiot_http::network::error::ErrorKind;
use tracing_test::traced_test;

fn redirect(status: &str, location: &str) -> String {
    format!("HTTP/1.1 {status}\r\nLocation: {location}\r\nContent-Length: 0\r\n\r\n")
}

#[test]
#[traced_test]
fn test_redirects_within_bound() {
    let (network, mut client) = client_with(ClientOptions {
        max_redirects: 2,
        ..no_retry()
    });
    network.queue_response(redirect("301 Moved Permanently", "/a"));
    network.queue_response(redirect("302 Found", "http://example.com/b"));
    network.queue_response("HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone");

    let response = client.send(&Request::get("http://example.com/start")).unwrap();

    assert_eq!(response.text(), "done");
    let sent = network.log().sent_text();
    assert_eq!(sent.len(), 3);
    assert!(sent[1].starts_with("GET /a HTTP/1.1\r\n"));
    assert!(sent[2].starts_with("GET /b HTTP/1.1\r\n"));
    // Every hop reused the same keep-alive connection.
    assert_eq!(network.connect_attempts(), 1);
    assert!(logs_contain("following redirect"));
}

#[test]
fn test_too_many_redirects() {
    let (network, mut client) = client_with(ClientOptions {
        max_redirects: 2,
        max_retries: 3,
        ..ClientOptions::default()
    });
    for hop in 0..3 {
        network.queue_response(redirect("302 Found", &format!("/hop{hop}")));
    }

    let err = client.send(&Request::get("http://example.com/")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TooManyRedirects);
    // Redirect exhaustion is not retried.
    assert_eq!(network.log().sent().len(), 3);
}

#[test]
fn test_redirects_disabled_returns_3xx() {
    let (network, mut client) = client_with(ClientOptions {
        follow_redirects: false,
        ..ClientOptions::default()
    });
    network.queue_response(redirect("302 Found", "/elsewhere"));

    let response = client.send(&Request::get("http://example.com/")).unwrap();

    assert_eq!(response.status_code, 302);
    assert_eq!(response.header("Location"), Some("/elsewhere"));
}

#[test]
fn test_see_other_switches_to_get() {
    let (network, mut client) = client_with(ClientOptions::default());
    network.queue_response(redirect("303 See Other", "/result"));
    network.queue_response(OK_EMPTY);

    let request = Request::post("http://example.com/submit")
        .with_header("Content-Type", "text/plain")
        .with_body("payload");
    client.send(&request).unwrap();

    let sent = network.log().sent_text();
    assert!(sent[0].starts_with("POST /submit HTTP/1.1\r\n"));
    assert!(sent[1].starts_with("GET /result HTTP/1.1\r\n"));
    assert!(!sent[1].contains("Content-Length"));
    assert!(!sent[1].contains("payload"));
}

#[test]
fn test_temporary_redirect_keeps_method_and_body() {
    let (network, mut client) = client_with(ClientOptions::default());
    network.queue_response(redirect("307 Temporary Redirect", "/v2/submit"));
    network.queue_response(OK_EMPTY);

    let request = Request::new(Method::Put, "http://example.com/submit").with_body("payload");
    client.send(&request).unwrap();

    let sent = network.log().sent_text();
    assert!(sent[1].starts_with("PUT /v2/submit HTTP/1.1\r\n"));
    assert!(sent[1].ends_with("payload"));
}

#[test]
fn test_cross_host_redirect_opens_new_connection() {
    let (network, mut client) = client_with(ClientOptions::default());
    network.queue_response(redirect("301 Moved Permanently", "https://cdn.example.net/file"));
    network.queue_response(OK_EMPTY);

    client.send(&Request::get("http://example.com/file")).unwrap();

    let sent = network.log().sent_text();
    assert!(sent[1].contains("Host: cdn.example.net\r\n"));
    assert_eq!(network.connections_created(), 2);
    let mut destinations = client.pool().destinations();
    destinations.sort();
    assert_eq!(
        destinations,
        vec![
            ("cdn.example.net".to_string(), 443),
            ("example.com".to_string(), 80)
        ]
    );
}

#[test]
fn test_empty_location_returns_redirect() {
    let (network, mut client) = client_with(no_retry());
    network.queue_response("HTTP/1.1 302 Found\r\nLocation: \r\nContent-Length: 0\r\n\r\n");
    network.queue_response(OK_EMPTY);

    let response = client.send(&Request::get("http://example.com/a/b")).unwrap();

    assert_eq!(response.status_code, 302);
    assert_eq!(network.log().sent().len(), 1);
    assert_eq!(network.pending_responses(), 1);
}

#[test]
fn test_caller_host_dropped_on_cross_host_redirect() {
    let (network, mut client) = client_with(no_retry());
    network.queue_response(redirect("301 Moved Permanently", "/same"));
    network.queue_response(redirect("301 Moved Permanently", "http://other.net/x"));
    network.queue_response(OK_EMPTY);

    let request = Request::get("http://example.com/").with_header("Host", "virtual.example.com");
    client.send(&request).unwrap();

    let sent = network.log().sent_text();
    assert!(sent[0].contains("Host: virtual.example.com\r\n"));
    assert!(sent[1].contains("Host: virtual.example.com\r\n"));
    assert!(sent[2].contains("Host: other.net\r\n"));
    assert!(!sent[2].contains("virtual.example.com"));
}

#[test]
fn test_query_only_location_keeps_path() {
    let (network, mut client) = client_with(no_retry());
    network.queue_response(redirect("302 Found", "?page=2"));
    network.queue_response(OK_EMPTY);

    client.send(&Request::get("http://example.com/a/b?page=1")).unwrap();

    assert!(network.log().sent_text()[1].starts_with("GET /a/b?page=2 HTTP/1.1\r\n"));
}
