//! Micro-benchmarks for mariadb-session
//!
//! CPU-bound paths only, against the in-memory server:
//! - Value escaping and quoting
//! - Connection string parsing
//! - Statement and result round trips through the session layer
//!
//! Run with: cargo bench --bench micro_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mariadb_session::escape::{escape_backslashes, escape_quotes};
use mariadb_session::transport::memory::{MemoryResultSet, MemoryServer};
use mariadb_session::{ClientFlags, ConnectOptions, Connection, ConnectionString, TracingObserver};

fn escape_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("escape");

    for size in [16usize, 256, 4096] {
        let plain = "a".repeat(size);
        let hostile = "'\\\n".repeat(size / 3 + 1);
        let mut buf = vec![0u8; size * 2 + 8];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("backslashes_plain", size), &plain, |b, s| {
            b.iter(|| escape_backslashes(&mut buf, black_box(s.as_bytes())))
        });
        group.bench_with_input(BenchmarkId::new("backslashes_hostile", size), &hostile, |b, s| {
            b.iter(|| escape_backslashes(&mut buf, black_box(&s.as_bytes()[..size])))
        });
        group.bench_with_input(BenchmarkId::new("quotes_hostile", size), &hostile, |b, s| {
            b.iter(|| escape_quotes(&mut buf, black_box(&s.as_bytes()[..size])))
        });
    }

    group.finish();
}

fn connection_string_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("connection_string");

    group.bench_function("minimal", |b| {
        b.iter(|| ConnectionString::parse(black_box("mysql://localhost/db")))
    });
    group.bench_function("full", |b| {
        b.iter(|| {
            ConnectionString::parse(black_box(
                "mariadb://app%40corp:s3cr%2Ft@[::1]:3307/inventory\
                 ?ssl_ca=/etc/ca.pem&ssl_cipher=AES256-SHA&client_flags=found_rows,compress",
            ))
        })
    });

    group.finish();
}

fn session_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");

    let server = MemoryServer::new();
    let mut rows = MemoryResultSet::new(["id", "name"]);
    for i in 0..100 {
        rows = rows.row([Some(i.to_string()), Some(format!("name-{}", i))]);
    }
    server.on_query("SELECT id, name FROM t", rows);

    let mut conn = Connection::with_observer(server, TracingObserver);
    if conn
        .connect(&ConnectOptions::new(), 0, ClientFlags::NONE)
        .is_err()
    {
        return;
    }

    group.bench_function("quote", |b| {
        b.iter(|| conn.quote(black_box(Some("O'Brien's \"quoted\" value"))))
    });
    group.bench_function("exec", |b| b.iter(|| conn.exec(black_box("DO 1"))));
    group.throughput(Throughput::Elements(100));
    group.bench_function("query_fetch_all_100", |b| {
        b.iter(|| {
            let mut result = conn.query("SELECT id, name FROM t").ok()?;
            let rows = result.fetch_all(&mut conn).ok()?;
            result.close(&mut conn).ok()?;
            Some(rows.len())
        })
    });

    group.finish();
    conn.disconnect();
}

criterion_group!(
    benches,
    escape_benchmarks,
    connection_string_benchmarks,
    session_benchmarks
);
criterion_main!(benches);
