use libiot_http::network::application::http::{AuthType, Client, ClientOptions, Request};
use libiot_http::network::error::ErrorKind;
use libiot_http::network::tcp::TcpNetwork;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::net::TcpListener;

#[test]
fn test_https_refused_without_tls_connector() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut client = Client::new(
        TcpNetwork,
        ClientOptions {
            auth_type: AuthType::Bearer,
            bearer_token: "secret-token".to_string(),
            ..super::no_retry()
        },
    )
    .unwrap();
    let err = client
        .send(&Request::get(format!("https://127.0.0.1:{port}/private")))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SslError);
    let accepted = listener.accept().map(|_| ()).map_err(|e| e.kind());
    assert_eq!(accepted, Err(IoErrorKind::WouldBlock));
    assert!(client.pool().is_empty());
}

#[test]
fn test_https_proxy_refused_without_tls_connector() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut client = Client::new(
        TcpNetwork,
        ClientOptions {
            proxy_url: format!("https://127.0.0.1:{port}"),
            ..super::no_retry()
        },
    )
    .unwrap();
    let err = client
        .send(&Request::get("http://example.com/"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SslError);
    let accepted = listener.accept().map(|_| ()).map_err(|e| e.kind());
    assert_eq!(accepted, Err(IoErrorKind::WouldBlock));
}

#[test]
fn test_plain_http_over_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            socket.read_exact(&mut byte).unwrap();
            head.push(byte[0]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
            .unwrap();
        String::from_utf8(head).unwrap()
    });

    let mut client = Client::new(TcpNetwork, super::no_retry()).unwrap();
    let response = client
        .send(&Request::get(format!("http://127.0.0.1:{port}/status")))
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.text(), "ok");
    let head = server.join().unwrap();
    assert!(head.starts_with("GET /status HTTP/1.1\r\n"));
    assert!(head.contains(&format!("Host: 127.0.0.1:{port}\r\n")));
}
