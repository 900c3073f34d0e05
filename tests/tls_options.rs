//! TLS option bundling tests
//!
//! TLS material is handed to the transport as one bundle: either no TLS
//! call at all, or exactly one call carrying all five fields, absent ones
//! as `None`. These tests observe the calls through the in-memory server.

mod common;

use common::{connection, server};
use mariadb_session::transport::memory::{MemoryServer, ServerEvent};
use mariadb_session::{ClientFlags, ConnectOptions};

fn tls_events(server: &MemoryServer) -> Vec<ServerEvent> {
    server
        .events()
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::SetTls { .. }))
        .collect()
}

fn connect_with(options: ConnectOptions) -> MemoryServer {
    let server = server();
    let (mut conn, _) = connection(&server);
    conn.connect(&options, 3306, ClientFlags::NONE)
        .expect("connect");
    conn.disconnect();
    server
}

#[test]
fn test_no_tls_fields_no_tls_call() {
    let server = connect_with(
        ConnectOptions::builder()
            .user("app")
            .password("secret")
            .build(),
    );
    assert!(tls_events(&server).is_empty());
}

#[test]
fn test_full_bundle() {
    let server = connect_with(
        ConnectOptions::builder()
            .user("app")
            .password("secret")
            .ssl_key("/tls/client.key")
            .ssl_cert("/tls/client.crt")
            .ssl_ca("/tls/ca.pem")
            .ssl_capath("/tls/certs")
            .ssl_cipher("ECDHE-RSA-AES256-GCM-SHA384")
            .build(),
    );
    assert_eq!(
        tls_events(&server),
        vec![ServerEvent::SetTls {
            key: Some("/tls/client.key".into()),
            cert: Some("/tls/client.crt".into()),
            ca: Some("/tls/ca.pem".into()),
            ca_path: Some("/tls/certs".into()),
            cipher: Some("ECDHE-RSA-AES256-GCM-SHA384".into()),
        }]
    );
}

#[test]
fn test_partial_bundle_passes_absent_fields() {
    let server = connect_with(
        ConnectOptions::builder()
            .user("app")
            .password("secret")
            .ssl_ca("/tls/ca.pem")
            .build(),
    );
    assert_eq!(
        tls_events(&server),
        vec![ServerEvent::SetTls {
            key: None,
            cert: None,
            ca: Some("/tls/ca.pem".into()),
            ca_path: None,
            cipher: None,
        }]
    );
}

#[test]
fn test_tls_configured_before_handshake() {
    let server = connect_with(
        ConnectOptions::builder()
            .user("app")
            .password("secret")
            .ssl_cert("/tls/client.crt")
            .build(),
    );
    let events = server.events();
    let tls = events
        .iter()
        .position(|e| matches!(e, ServerEvent::SetTls { .. }))
        .expect("tls call");
    let connect = events
        .iter()
        .position(|e| matches!(e, ServerEvent::Connect { .. }))
        .expect("connect call");
    assert!(tls < connect);
}

#[test]
fn test_tls_from_connection_string() {
    let server = server();
    let (mut conn, _) = connection(&server);
    conn.connect_str("mariadb://app:secret@db/test?ssl_ca=%2Ftls%2Fca.pem&ssl_cipher=AES256-SHA")
        .expect("connect");
    conn.disconnect();

    assert_eq!(
        tls_events(&server),
        vec![ServerEvent::SetTls {
            key: None,
            cert: None,
            ca: Some("/tls/ca.pem".into()),
            ca_path: None,
            cipher: Some("AES256-SHA".into()),
        }]
    );
}
