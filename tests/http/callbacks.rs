use super::*;
use libiot_http::network::application::http::Request;
use std::sync::{Arc, Mutex};

#[test]
fn test_body_callback_streams_instead_of_buffering() {
    let (network, mut client) = client_with(ClientOptions::default());
    network.queue_response(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
    );

    let chunks = Arc::new(Mutex::new(Vec::new()));
    let progress = Arc::new(Mutex::new(Vec::new()));
    {
        let chunks = Arc::clone(&chunks);
        client.set_response_body_callback(move |data| {
            chunks.lock().unwrap().extend_from_slice(data);
        });
        let progress = Arc::clone(&progress);
        client.set_progress_callback(move |received, total| {
            progress.lock().unwrap().push((received, total));
        });
    }

    let response = client.send(&Request::get("http://example.com/wiki")).unwrap();

    assert!(response.body.is_empty());
    assert_eq!(&*chunks.lock().unwrap(), b"Wikipedia");
    let progress = progress.lock().unwrap();
    assert_eq!(progress.last(), Some(&(9, 0)));
}

#[test]
fn test_progress_reports_known_total() {
    let (network, mut client) = client_with(ClientOptions::default());
    network.queue_response("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");

    let progress = Arc::new(Mutex::new(Vec::new()));
    {
        let progress = Arc::clone(&progress);
        client.set_progress_callback(move |received, total| {
            progress.lock().unwrap().push((received, total));
        });
    }

    let response = client.send(&Request::get("http://example.com")).unwrap();

    assert_eq!(response.text(), "hello");
    assert_eq!(progress.lock().unwrap().last(), Some(&(5, 5)));

    client.clear_callbacks();
    network.queue_response("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
    let before = progress.lock().unwrap().len();
    client.send(&Request::get("http://example.com")).unwrap();
    assert_eq!(progress.lock().unwrap().len(), before);
}
