use super::*;
use libiot_http::network::application::http::{ConnectionPool, PoolSettings, Request};
use libiot_http::network::Connection;

#[test]
fn test_release_then_get_returns_same_handle() {
    let network = MockNetwork::new();
    let pool = ConnectionPool::new(network.clone(), PoolSettings::default());

    let lease = pool.get_connection("example.com", 80).unwrap();
    let id = lease.id();
    let handle = lease.lock().id();
    pool.release_connection(lease);

    let again = pool.get_connection("example.com", 80).unwrap();
    assert_eq!(again.id(), id);
    assert_eq!(again.lock().id(), handle);
    assert_eq!(network.connections_created(), 1);
}

#[test]
fn test_idle_connections_are_evicted() {
    let network = MockNetwork::new();
    let pool = ConnectionPool::new(
        network.clone(),
        PoolSettings {
            max_idle_time: Duration::from_millis(20),
            ..PoolSettings::default()
        },
    );

    let lease = pool.get_connection("example.com", 80).unwrap();
    assert!(lease.lock().connect("example.com", 80));
    let id = lease.id();
    pool.release_connection(lease);

    std::thread::sleep(Duration::from_millis(60));
    let fresh = pool.get_connection("example.com", 80).unwrap();

    assert_ne!(fresh.id(), id);
    assert_eq!(network.disconnects(), 1);
}

#[test]
fn test_capacity_evicts_least_recently_used() {
    let (network, mut client) = client_with(ClientOptions {
        max_connections: 2,
        ..ClientOptions::default()
    });
    for _ in 0..4 {
        network.queue_response(OK_EMPTY);
    }

    client.send(&Request::get("http://a.example.com")).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    client.send(&Request::get("http://b.example.com")).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    client.send(&Request::get("http://a.example.com")).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    client.send(&Request::get("http://c.example.com")).unwrap();

    let mut hosts: Vec<String> = client
        .pool()
        .destinations()
        .into_iter()
        .map(|(host, _)| host)
        .collect();
    hosts.sort();
    assert_eq!(hosts, vec!["a.example.com", "c.example.com"]);
    assert_eq!(network.disconnects(), 1);
}

#[test]
fn test_concurrent_clients_share_pool() {
    use std::sync::Arc;

    let network = MockNetwork::new();
    for _ in 0..8 {
        network.queue_response(OK_EMPTY);
    }
    let pool = Arc::new(ConnectionPool::new(network.clone(), PoolSettings::default()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let mut client = Client::with_pool(pool, ClientOptions::default()).unwrap();
                for _ in 0..2 {
                    let url = format!("http://host{i}.example.com/");
                    assert_eq!(client.send(&Request::get(url)).unwrap().status_code, 200);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(pool.len(), 4);
    assert_eq!(network.pending_responses(), 0);
}
