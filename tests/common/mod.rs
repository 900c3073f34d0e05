//! Shared helpers for integration tests

#![allow(dead_code)]

use mariadb_session::transport::memory::MemoryServer;
use mariadb_session::{AdvisoryLog, ClientFlags, ConnectOptions, Connection};
use std::sync::Once;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Options accepted by [`server`]
pub fn options() -> ConnectOptions {
    ConnectOptions::builder()
        .host("localhost")
        .user("app")
        .password("secret")
        .dbname("test")
        .build()
}

/// A server with a single `app`/`secret` account
pub fn server() -> MemoryServer {
    init_tracing();
    let server = MemoryServer::new();
    server.add_account("app", Some("secret"));
    server
}

/// A disconnected connection reporting to a fresh advisory log
pub fn connection(server: &MemoryServer) -> (Connection<MemoryServer>, AdvisoryLog) {
    let log = AdvisoryLog::new();
    (Connection::with_observer(server.clone(), log.clone()), log)
}

/// A connected connection reporting to a fresh advisory log
pub fn connected(server: &MemoryServer) -> (Connection<MemoryServer>, AdvisoryLog) {
    let (mut conn, log) = connection(server);
    conn.connect(&options(), 3306, ClientFlags::NONE)
        .expect("connect");
    (conn, log)
}
