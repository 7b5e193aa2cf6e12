use criterion::{BenchmarkId, Criterion, Throughput};
use libiot_http::network::application::http::exchange::{parse_chunk_size, parse_status_line};
use libiot_http::network::application::http::{Client, ClientOptions, CookieJar, Request};
use libiot_http::network::mock::MockNetwork;
use std::hint::black_box;

fn setup_client(options: ClientOptions) -> (MockNetwork, Client<MockNetwork>) {
    let network = MockNetwork::new();
    let client = Client::new(network.clone(), options).expect("mock client");
    (network, client)
}

fn chunked_response(chunks: usize, chunk_len: usize) -> Vec<u8> {
    let mut raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    let chunk = vec![b'x'; chunk_len];
    for _ in 0..chunks {
        raw.extend_from_slice(format!("{chunk_len:x}\r\n").as_bytes());
        raw.extend_from_slice(&chunk);
        raw.extend_from_slice(b"\r\n");
    }
    raw.extend_from_slice(b"0\r\n\r\n");
    raw
}

pub fn bench_fixed_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("http_fixed_length");
    for size in [64usize, 1024, 16 * 1024] {
        let mut raw = format!("HTTP/1.1 200 OK\r\nContent-Length: {size}\r\n\r\n").into_bytes();
        raw.resize(raw.len() + size, b'a');
        let (network, mut client) = setup_client(ClientOptions::default());
        let request = Request::get("http://bench.local/data");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &raw, |b, raw| {
            b.iter(|| {
                network.queue_response(raw);
                let response = client.send(black_box(&request)).expect("response");
                network.clear_log();
                black_box(response.body.len())
            })
        });
    }
    group.finish();
}

pub fn bench_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("http_chunked");
    for (chunks, chunk_len) in [(4usize, 256usize), (64, 256), (16, 4096)] {
        let raw = chunked_response(chunks, chunk_len);
        let (network, mut client) = setup_client(ClientOptions::default());
        let request = Request::get("http://bench.local/stream");

        group.throughput(Throughput::Bytes((chunks * chunk_len) as u64));
        group.bench_with_input(
            BenchmarkId::new("chunks", format!("{chunks}x{chunk_len}")),
            &raw,
            |b, raw| {
                b.iter(|| {
                    network.queue_response(raw);
                    let response = client.send(black_box(&request)).expect("response");
                    network.clear_log();
                    black_box(response.body.len())
                })
            },
        );
    }
    group.finish();
}

pub fn bench_redirect_chain(c: &mut Criterion) {
    let (network, mut client) = setup_client(ClientOptions::default());
    let request = Request::get("http://bench.local/start");

    c.bench_function("http_redirect_chain_3", |b| {
        b.iter(|| {
            for hop in 0..3 {
                network.queue_response(format!(
                    "HTTP/1.1 302 Found\r\nLocation: /hop{hop}\r\nContent-Length: 0\r\n\r\n"
                ));
            }
            network.queue_response("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
            let response = client.send(black_box(&request)).expect("response");
            network.clear_log();
            black_box(response.status_code)
        })
    });
}

pub fn bench_status_and_chunk_lines(c: &mut Criterion) {
    c.bench_function("http_parse_status_line", |b| {
        b.iter(|| parse_status_line(black_box(b"HTTP/1.1 404 Not Found")))
    });
    c.bench_function("http_parse_chunk_size", |b| {
        b.iter(|| parse_chunk_size(black_box(b"1f4a;name=value")))
    });
}

pub fn bench_cookie_jar(c: &mut Criterion) {
    let mut jar = CookieJar::new();
    for i in 0..16 {
        jar.set_cookie(
            "http://bench.local/",
            &format!("cookie{i}=value{i}; Path=/; Max-Age=3600"),
        );
    }

    c.bench_function("http_cookie_header", |b| {
        b.iter(|| jar.cookie_header(black_box("http://bench.local/account")))
    });
    c.bench_function("http_set_cookie", |b| {
        b.iter(|| {
            jar.set_cookie(
                black_box("http://bench.local/"),
                black_box("session=abc123; Path=/; HttpOnly"),
            )
        })
    });
}
