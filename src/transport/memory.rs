//! In-memory transport.
//!
//! A scripted, in-process stand-in for a database server. Every transport
//! created from the same [`MemoryServer`] shares its script and its event
//! log, which makes it suitable for unit tests and for embedding the session
//! layer where no real server is available.

use super::{
    ClientOption, Column, Driver, HandshakeParams, Row, RowSource, ServerInfo, TlsParams,
    Transport, TransportError, TransportResult,
};
use crate::connection::ClientFlags;
use crate::escape;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Client library version reported by the memory driver
pub const CLIENT_VERSION: &str = concat!("mariadb-session-memory ", env!("CARGO_PKG_VERSION"));

/// Default server version string
pub const SERVER_VERSION: &str = "11.4.2-MariaDB";

/// `CR_SERVER_GONE_ERROR`
const ERR_SERVER_GONE: u32 = 2006;
/// `CR_CONNECTION_ERROR`
const ERR_CONNECTION: u32 = 2002;
/// `ER_ACCESS_DENIED_ERROR`
const ERR_ACCESS_DENIED: u32 = 1045;

/// Call recorded by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A transport handle was initialized
    Init,
    /// A pending option was set
    SetOption {
        /// Option name
        name: &'static str,
        /// Rendered value
        value: String,
    },
    /// TLS material was configured
    SetTls {
        /// Client key
        key: Option<String>,
        /// Client certificate
        cert: Option<String>,
        /// CA certificate
        ca: Option<String>,
        /// CA directory
        ca_path: Option<String>,
        /// Cipher list
        cipher: Option<String>,
    },
    /// A handshake was attempted
    Connect {
        /// Host
        host: Option<String>,
        /// User
        user: Option<String>,
        /// Database
        dbname: Option<String>,
        /// Port
        port: u16,
        /// Unix socket
        unix_socket: Option<String>,
        /// Client flags
        client_flags: ClientFlags,
    },
    /// A statement was dispatched
    Query(String),
    /// Commit primitive
    Commit,
    /// Rollback primitive
    Rollback,
    /// The handle was closed
    Close,
}

/// Scripted result set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryResultSet {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl MemoryResultSet {
    /// Create an empty result set with text columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|name| Column::new(name, "VARCHAR"))
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row
    pub fn row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        self.rows.push(values.into_iter().collect());
        self
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the set has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug)]
struct ServerState {
    accounts: HashMap<String, Option<String>>,
    connect_error: Option<String>,
    rejected_options: HashMap<&'static str, String>,
    results: HashMap<String, MemoryResultSet>,
    affected: HashMap<String, u64>,
    query_errors: HashMap<String, (u32, String)>,
    commit_error: Option<String>,
    rollback_error: Option<String>,
    close_error: Option<String>,
    no_backslash_escapes: bool,
    server_version: String,
    next_thread_id: u64,
    open_sessions: usize,
    events: Vec<ServerEvent>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
            connect_error: None,
            rejected_options: HashMap::new(),
            results: HashMap::new(),
            affected: HashMap::new(),
            query_errors: HashMap::new(),
            commit_error: None,
            rollback_error: None,
            close_error: None,
            no_backslash_escapes: false,
            server_version: SERVER_VERSION.to_string(),
            next_thread_id: 1,
            open_sessions: 0,
            events: Vec::new(),
        }
    }
}

/// Shared in-memory server; also the [`Driver`] handing out transports
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    /// Create a server that accepts any credentials
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an account; once any account exists, handshakes are
    /// authenticated against the registered set
    pub fn add_account(&self, user: impl Into<String>, password: Option<&str>) -> &Self {
        self.lock()
            .accounts
            .insert(user.into(), password.map(str::to_string));
        self
    }

    /// Fail every handshake with `message`
    pub fn refuse_connections(&self, message: impl Into<String>) -> &Self {
        self.lock().connect_error = Some(message.into());
        self
    }

    /// Fail `set_option` for the option called `name`
    pub fn reject_option(&self, name: &'static str, message: impl Into<String>) -> &Self {
        self.lock().rejected_options.insert(name, message.into());
        self
    }

    /// Answer `sql` with a result set
    pub fn on_query(&self, sql: impl Into<String>, result: MemoryResultSet) -> &Self {
        self.lock().results.insert(sql.into(), result);
        self
    }

    /// Report `rows` affected rows for `sql`
    pub fn on_statement(&self, sql: impl Into<String>, rows: u64) -> &Self {
        self.lock().affected.insert(sql.into(), rows);
        self
    }

    /// Fail `sql` with a server error
    pub fn fail_query(&self, sql: impl Into<String>, code: u32, message: impl Into<String>) -> &Self {
        self.lock()
            .query_errors
            .insert(sql.into(), (code, message.into()));
        self
    }

    /// Fail the commit primitive
    pub fn fail_commit(&self, message: impl Into<String>) -> &Self {
        self.lock().commit_error = Some(message.into());
        self
    }

    /// Fail the rollback primitive
    pub fn fail_rollback(&self, message: impl Into<String>) -> &Self {
        self.lock().rollback_error = Some(message.into());
        self
    }

    /// Fail `close`
    pub fn fail_close(&self, message: impl Into<String>) -> &Self {
        self.lock().close_error = Some(message.into());
        self
    }

    /// Toggle the `NO_BACKSLASH_ESCAPES` SQL mode
    pub fn set_no_backslash_escapes(&self, enabled: bool) -> &Self {
        self.lock().no_backslash_escapes = enabled;
        self
    }

    /// Set the reported server version
    pub fn set_server_version(&self, version: impl Into<String>) -> &Self {
        self.lock().server_version = version.into();
        self
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> Vec<ServerEvent> {
        self.lock().events.clone()
    }

    /// Dispatched statements, oldest first
    pub fn queries(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ServerEvent::Query(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded events equal to `event`
    pub fn count(&self, event: &ServerEvent) -> usize {
        self.lock().events.iter().filter(|e| *e == event).count()
    }

    /// Sessions that completed a handshake and are not closed yet
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    /// Clear the event log
    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    fn record(&self, event: ServerEvent) {
        self.lock().events.push(event);
    }
}

impl Driver for MemoryServer {
    type Transport = MemoryTransport;

    fn init(&self) -> MemoryTransport {
        self.record(ServerEvent::Init);
        MemoryTransport {
            server: self.clone(),
            session: None,
            pending: None,
            affected_rows: 0,
        }
    }

    fn client_version(&self) -> String {
        CLIENT_VERSION.to_string()
    }
}

#[derive(Debug, Clone)]
struct Session {
    host: String,
    user: String,
    dbname: Option<String>,
    via_socket: bool,
    thread_id: u64,
}

/// Transport handle of a [`MemoryServer`]
#[derive(Debug)]
pub struct MemoryTransport {
    server: MemoryServer,
    session: Option<Session>,
    pending: Option<MemoryRows>,
    affected_rows: u64,
}

impl MemoryTransport {
    fn session(&self) -> TransportResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| TransportError::new(ERR_SERVER_GONE, "MySQL server has gone away"))
    }
}

impl Transport for MemoryTransport {
    type Rows = MemoryRows;

    fn set_option(&mut self, option: ClientOption<'_>) -> TransportResult<()> {
        let mut state = self.server.lock();
        if let Some(message) = state.rejected_options.get(option.name()) {
            return Err(TransportError::new(0, message.clone()));
        }
        let value = match option {
            ClientOption::LocalInfile(enabled) => u8::from(enabled).to_string(),
            ClientOption::Charset(v)
            | ClientOption::ReadDefaultGroup(v)
            | ClientOption::ReadDefaultFile(v) => v.to_string(),
        };
        state.events.push(ServerEvent::SetOption {
            name: option.name(),
            value,
        });
        Ok(())
    }

    fn set_tls(&mut self, params: &TlsParams<'_>) -> TransportResult<()> {
        let owned = |v: Option<&str>| v.map(str::to_string);
        self.server.record(ServerEvent::SetTls {
            key: owned(params.key),
            cert: owned(params.cert),
            ca: owned(params.ca),
            ca_path: owned(params.ca_path),
            cipher: owned(params.cipher),
        });
        Ok(())
    }

    fn connect(&mut self, params: &HandshakeParams<'_>) -> TransportResult<()> {
        let owned = |v: Option<&str>| v.map(str::to_string);
        let mut state = self.server.lock();
        state.events.push(ServerEvent::Connect {
            host: owned(params.host),
            user: owned(params.user),
            dbname: owned(params.dbname),
            port: params.port,
            unix_socket: owned(params.unix_socket),
            client_flags: params.client_flags,
        });

        let host = params.host.unwrap_or("localhost").to_string();
        if let Some(message) = &state.connect_error {
            return Err(TransportError::new(
                ERR_CONNECTION,
                format!("Can't connect to server on '{}' ({})", host, message),
            ));
        }

        let user = params.user.unwrap_or("root").to_string();
        if !state.accounts.is_empty() {
            let expected = state.accounts.get(&user);
            if expected != Some(&params.password.map(str::to_string)) {
                return Err(TransportError::new(
                    ERR_ACCESS_DENIED,
                    format!(
                        "Access denied for user '{}'@'{}' (using password: {})",
                        user,
                        host,
                        if params.password.is_some() { "YES" } else { "NO" }
                    ),
                ));
            }
        }

        let thread_id = state.next_thread_id;
        state.next_thread_id += 1;
        state.open_sessions += 1;
        self.session = Some(Session {
            host,
            user,
            dbname: owned(params.dbname),
            via_socket: params.unix_socket.is_some(),
            thread_id,
        });
        Ok(())
    }

    fn query(&mut self, sql: &str) -> TransportResult<()> {
        self.session()?;
        self.pending = None;
        self.affected_rows = 0;

        let scripted = {
            let mut state = self.server.lock();
            state.events.push(ServerEvent::Query(sql.to_string()));
            if let Some((code, message)) = state.query_errors.get(sql) {
                return Err(TransportError::new(*code, message.clone()));
            }
            (state.results.get(sql).cloned(), state.affected.get(sql).copied())
        };

        match scripted {
            (Some(result), _) => {
                self.affected_rows = result.rows.len() as u64;
                self.pending = Some(MemoryRows {
                    columns: result.columns,
                    rows: result.rows.into(),
                });
            }
            (None, affected) => self.affected_rows = affected.unwrap_or(0),
        }

        if let Some(session) = self.session.as_mut() {
            if let Some(db) = sql.trim().strip_prefix("USE ") {
                session.dbname = Some(db.trim().trim_matches('`').to_string());
            }
        }
        Ok(())
    }

    fn store_result(&mut self) -> TransportResult<Option<MemoryRows>> {
        self.session()?;
        Ok(self.pending.take())
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn escape_string(&self, to: &mut [u8], from: &[u8]) -> Option<usize> {
        if self.server.lock().no_backslash_escapes {
            escape::escape_quotes(to, from)
        } else {
            escape::escape_backslashes(to, from)
        }
    }

    fn commit(&mut self) -> TransportResult<()> {
        self.session()?;
        let mut state = self.server.lock();
        state.events.push(ServerEvent::Commit);
        match &state.commit_error {
            Some(message) => Err(TransportError::new(0, message.clone())),
            None => Ok(()),
        }
    }

    fn rollback(&mut self) -> TransportResult<()> {
        self.session()?;
        let mut state = self.server.lock();
        state.events.push(ServerEvent::Rollback);
        match &state.rollback_error {
            Some(message) => Err(TransportError::new(0, message.clone())),
            None => Ok(()),
        }
    }

    fn server_info(&self) -> ServerInfo {
        let state = self.server.lock();
        let session = self.session.clone().unwrap_or(Session {
            host: String::new(),
            user: String::new(),
            dbname: None,
            via_socket: false,
            thread_id: 0,
        });
        let host_info = if session.via_socket {
            "Localhost via UNIX socket".to_string()
        } else {
            format!("{} via TCP/IP", session.host)
        };
        ServerInfo {
            host: session.host,
            user: session.user,
            dbname: session.dbname,
            host_info,
            server_version: state.server_version.clone(),
            protocol_version: 10,
            thread_id: session.thread_id,
        }
    }

    fn close(mut self) -> TransportResult<()> {
        let mut state = self.server.lock();
        state.events.push(ServerEvent::Close);
        if self.session.take().is_some() {
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
        match &state.close_error {
            Some(message) => Err(TransportError::new(0, message.clone())),
            None => Ok(()),
        }
    }
}

/// Buffered rows of a [`MemoryTransport`] result
#[derive(Debug)]
pub struct MemoryRows {
    columns: Vec<Column>,
    rows: VecDeque<Row>,
}

impl RowSource for MemoryRows {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> TransportResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(user: Option<&'static str>, password: Option<&'static str>) -> HandshakeParams<'static> {
        HandshakeParams {
            host: Some("db.test"),
            user,
            password,
            dbname: Some("app"),
            port: 3306,
            unix_socket: None,
            client_flags: ClientFlags::NONE,
        }
    }

    #[test]
    fn test_connect_records_params() {
        let server = MemoryServer::new();
        let mut transport = server.init();
        transport.connect(&handshake(Some("app"), None)).unwrap();

        assert_eq!(server.open_sessions(), 1);
        assert_eq!(
            server.events()[1],
            ServerEvent::Connect {
                host: Some("db.test".into()),
                user: Some("app".into()),
                dbname: Some("app".into()),
                port: 3306,
                unix_socket: None,
                client_flags: ClientFlags::NONE,
            }
        );
    }

    #[test]
    fn test_access_denied() {
        let server = MemoryServer::new();
        server.add_account("app", Some("secret"));
        let mut transport = server.init();

        let err = transport
            .connect(&handshake(Some("app"), Some("wrong")))
            .unwrap_err();
        assert_eq!(err.code, ERR_ACCESS_DENIED);
        assert!(err.message.contains("Access denied for user 'app'@'db.test'"));
        assert_eq!(server.open_sessions(), 0);

        transport
            .connect(&handshake(Some("app"), Some("secret")))
            .unwrap();
        assert_eq!(server.open_sessions(), 1);
    }

    #[test]
    fn test_query_before_connect_fails() {
        let server = MemoryServer::new();
        let mut transport = server.init();
        let err = transport.query("SELECT 1").unwrap_err();
        assert_eq!(err.code, ERR_SERVER_GONE);
    }

    #[test]
    fn test_scripted_result() {
        let server = MemoryServer::new();
        server.on_query(
            "SELECT x FROM t",
            MemoryResultSet::new(["x"]).row([Some("1")]).row([Some("2")]),
        );
        let mut transport = server.init();
        transport.connect(&handshake(None, None)).unwrap();
        transport.query("SELECT x FROM t").unwrap();

        let mut rows = transport.store_result().unwrap().unwrap();
        assert_eq!(rows.columns()[0].name, "x");
        assert_eq!(rows.next_row().unwrap().unwrap().get_str(0), Some("1"));
        assert_eq!(rows.next_row().unwrap().unwrap().get_str(0), Some("2"));
        assert_eq!(rows.next_row().unwrap(), None);
        assert!(transport.store_result().unwrap().is_none());
    }

    #[test]
    fn test_statement_without_result() {
        let server = MemoryServer::new();
        server.on_statement("DELETE FROM t", 4);
        let mut transport = server.init();
        transport.connect(&handshake(None, None)).unwrap();
        transport.query("DELETE FROM t").unwrap();

        assert!(transport.store_result().unwrap().is_none());
        assert_eq!(transport.affected_rows(), 4);
    }

    #[test]
    fn test_escape_mode_follows_server() {
        let server = MemoryServer::new();
        let transport = server.init();
        let mut buf = [0u8; 4];

        let n = transport.escape_string(&mut buf, b"a'").unwrap();
        assert_eq!(&buf[..n], b"a\\'");

        server.set_no_backslash_escapes(true);
        let n = transport.escape_string(&mut buf, b"a'").unwrap();
        assert_eq!(&buf[..n], b"a''");
    }

    #[test]
    fn test_use_changes_database() {
        let server = MemoryServer::new();
        let mut transport = server.init();
        transport.connect(&handshake(None, None)).unwrap();
        transport.query("USE `reports`").unwrap();
        assert_eq!(transport.server_info().dbname.as_deref(), Some("reports"));
    }

    #[test]
    fn test_close_releases_session() {
        let server = MemoryServer::new();
        let mut transport = server.init();
        transport.connect(&handshake(None, None)).unwrap();
        transport.close().unwrap();
        assert_eq!(server.open_sessions(), 0);
        assert_eq!(server.count(&ServerEvent::Close), 1);
    }

    #[test]
    fn test_clear_events_keeps_sessions() {
        let server = MemoryServer::new();
        let mut transport = server.init();
        transport.connect(&handshake(None, None)).unwrap();
        transport.query("SELECT 1").unwrap();

        server.clear_events();
        assert!(server.events().is_empty());
        assert!(server.queries().is_empty());
        assert_eq!(server.open_sessions(), 1);

        transport.query("SELECT 2").unwrap();
        assert_eq!(server.queries(), vec!["SELECT 2"]);
    }
}
