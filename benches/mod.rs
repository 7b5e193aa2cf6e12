use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    network::application::http::client::bench_fixed_length,
    network::application::http::client::bench_chunked,
    network::application::http::client::bench_redirect_chain,
    network::application::http::client::bench_status_and_chunk_lines,
    network::application::http::client::bench_cookie_jar
);
criterion_main!(benches);
