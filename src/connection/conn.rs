//! Core connection type

use super::info::ConnectionInfo;
use super::observer::{Advisory, SessionObserver, TracingObserver};
use super::options::ConnectOptions;
use super::state::TransactionState;
use super::ClientFlags;
use crate::client::ConnectionString;
use crate::metrics::{counters, histograms, labels};
use crate::result::{QueryResult, ResultId};
use crate::transport::{Column, Driver, Row, RowSource, Transport};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

// Process-wide source of connection ids
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type RowsOf<D> = <<D as Driver>::Transport as Transport>::Rows;

/// Process-unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The open result slot: the connection's side of a [`QueryResult`]
struct ActiveResult<R> {
    id: ResultId,
    live: Arc<AtomicBool>,
    rows: Option<R>,
}

impl<R> ActiveResult<R> {
    fn close(&mut self) {
        self.live.store(false, Ordering::Release);
        self.rows = None;
    }
}

/// One session to a database server
///
/// Owns its transport exclusively. At most one [`QueryResult`] is open at a
/// time; starting a new query force-closes the previous one.
///
/// # Examples
///
/// ```
/// use mariadb_session::{ClientFlags, ConnectOptions, Connection};
/// use mariadb_session::transport::memory::MemoryServer;
///
/// let mut conn = Connection::new(MemoryServer::new());
/// let options = ConnectOptions::builder().user("app").dbname("test").build();
/// conn.connect(&options, 3306, ClientFlags::NONE)?;
///
/// conn.exec("CREATE TABLE t(x INT)")?;
/// conn.begin_transaction()?;
/// conn.exec("INSERT INTO t VALUES (1)")?;
/// conn.commit()?;
///
/// assert_eq!(conn.quote(Some("O'Brien"))?, r"'O\'Brien'");
/// conn.disconnect();
/// # Ok::<(), mariadb_session::Error>(())
/// ```
pub struct Connection<D: Driver> {
    id: ConnectionId,
    driver: D,
    transport: Option<D::Transport>,
    current: Option<ActiveResult<RowsOf<D>>>,
    transaction: TransactionState,
    observer: Arc<dyn SessionObserver>,
    next_result_id: u64,
}

impl<D: Driver> Connection<D> {
    /// Create a disconnected connection that logs advisories through `tracing`
    pub fn new(driver: D) -> Self {
        Self::with_observer(driver, TracingObserver)
    }

    /// Create a disconnected connection reporting advisories to `observer`
    pub fn with_observer(driver: D, observer: impl SessionObserver + 'static) -> Self {
        Self {
            id: ConnectionId::next(),
            driver,
            transport: None,
            current: None,
            transaction: TransactionState::Idle,
            observer: Arc::new(observer),
            next_result_id: 1,
        }
    }

    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Driver this connection creates transports with
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Whether a transport is open
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Whether a transaction is in progress
    pub fn is_transacting(&self) -> bool {
        self.transaction == TransactionState::InTransaction
    }

    /// Current transaction state
    pub fn transaction_state(&self) -> TransactionState {
        self.transaction
    }

    /// Open a session.
    ///
    /// Initializes a fresh transport, applies `options` and performs the
    /// handshake. On failure the transport is released and the connection
    /// stays disconnected.
    pub fn connect(
        &mut self,
        options: &ConnectOptions,
        port: u16,
        client_flags: ClientFlags,
    ) -> Result<()> {
        let _span = tracing::info_span!(
            "connect",
            connection = %self.id,
            host = ?options.host,
            user = ?options.user,
            port
        )
        .entered();

        if self.is_connected() {
            return Err(Error::Connection(
                "already connected; call disconnect() first".into(),
            ));
        }

        let mut transport = self.driver.init();
        if let Err(e) = handshake(&mut transport, options, port, client_flags) {
            counters::connection_failed();
            if let Err(close_err) = transport.close() {
                tracing::debug!("error releasing failed transport: {}", close_err);
            }
            tracing::debug!("connect failed: {}", e);
            return Err(e);
        }

        self.transport = Some(transport);
        self.current = None;
        self.transaction = TransactionState::Idle;
        counters::connection_opened();
        tracing::info!("connection established");
        Ok(())
    }

    /// Open a session from a connection string
    ///
    /// See [`ConnectionString`] for the accepted format.
    pub fn connect_str(&mut self, connection_string: &str) -> Result<()> {
        let parsed = ConnectionString::parse(connection_string)?;
        self.connect(&parsed.options, parsed.port, parsed.client_flags)
    }

    /// Close the session. Safe to call any number of times.
    ///
    /// An open result is released as a side effect of closing the transport.
    pub fn disconnect(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };

        if let Some(mut result) = self.current.take() {
            self.advise(Advisory::DisconnectWithOpenResult);
            result.close();
        }
        self.transaction.reset();

        if let Err(e) = transport.close() {
            tracing::warn!(connection = %self.id, "error closing transport: {}", e);
        }
        counters::connection_closed();
        tracing::debug!(connection = %self.id, "disconnected");
    }

    /// Session metadata
    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        let transport = self.transport.as_ref().ok_or_else(Error::closed)?;
        Ok(ConnectionInfo::new(
            transport.server_info(),
            self.driver.client_version(),
        ))
    }

    /// Quote a value as an SQL literal.
    ///
    /// `None` becomes the bare `NULL` keyword. Present values are escaped by
    /// the transport (so the session character set and `NO_BACKSLASH_ESCAPES`
    /// are honoured) and wrapped in single quotes.
    pub fn quote(&self, value: Option<&str>) -> Result<String> {
        let transport = self.transport.as_ref().ok_or_else(Error::closed)?;
        let Some(value) = value else {
            return Ok("NULL".to_string());
        };

        // Every byte may expand to two, plus the surrounding quotes
        let input = value.as_bytes();
        let mut out = vec![0u8; input.len() * 2 + 2];
        out[0] = b'\'';
        let written = transport
            .escape_string(&mut out[1..=input.len() * 2], input)
            .ok_or_else(|| Error::Encoding("escaped value overflowed its buffer".into()))?;
        out.truncate(written + 1);
        out.push(b'\'');

        String::from_utf8(out).map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Execute a statement whose result, if any, is discarded
    pub fn exec(&mut self, sql: &str) -> Result<bool> {
        self.exec_affected(sql).map(|_| true)
    }

    /// Execute a statement whose result, if any, is discarded, returning the
    /// affected row count
    pub fn exec_affected(&mut self, sql: &str) -> Result<u64> {
        self.check_connection()?;
        let _span = tracing::debug_span!("exec", connection = %self.id, sql = %sql).entered();

        self.set_current_result(None);

        let start = Instant::now();
        let transport = self.transport_mut()?;
        let outcome = transport.query(sql).and_then(|()| {
            // Free any buffered result set right away
            drop(transport.store_result()?);
            Ok(transport.affected_rows())
        });
        histograms::query_duration(labels::KIND_EXEC, start.elapsed());

        match outcome {
            Ok(affected) => {
                counters::query_completed(labels::KIND_EXEC, labels::STATUS_OK);
                tracing::debug!(affected, "statement executed");
                Ok(affected)
            }
            Err(e) => {
                counters::query_completed(labels::KIND_EXEC, labels::STATUS_ERROR);
                tracing::debug!("statement failed: {}", e);
                Err(Error::Query(e.message))
            }
        }
    }

    /// Execute a statement and open a result handle on its output.
    ///
    /// Any result still open on this connection is closed first, with a
    /// [`Advisory::CancellingPreviousQuery`] advisory.
    pub fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.check_connection()?;
        let _span = tracing::debug_span!("query", connection = %self.id, sql = %sql).entered();

        let id = ResultId(self.next_result_id);
        self.next_result_id += 1;
        let live = Arc::new(AtomicBool::new(true));
        self.set_current_result(Some(ActiveResult {
            id,
            live: Arc::clone(&live),
            rows: None,
        }));

        let start = Instant::now();
        let transport = self.transport_mut()?;
        let outcome = transport.query(sql).and_then(|()| {
            let rows = transport.store_result()?;
            Ok((rows, transport.affected_rows()))
        });
        histograms::query_duration(labels::KIND_QUERY, start.elapsed());

        let (rows, affected) = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                counters::query_completed(labels::KIND_QUERY, labels::STATUS_ERROR);
                tracing::debug!("query failed: {}", e);
                self.set_current_result(None);
                return Err(Error::Query(e.message));
            }
        };
        counters::query_completed(labels::KIND_QUERY, labels::STATUS_OK);

        let columns: Vec<Column> = rows
            .as_ref()
            .map(|r| r.columns().to_vec())
            .unwrap_or_default();
        let complete = rows.is_none();
        if let Some(current) = self.current.as_mut() {
            current.rows = rows;
        }
        tracing::debug!(result = %id, columns = columns.len(), "result opened");

        Ok(QueryResult::new(
            self.id, id, live, sql, columns, affected, complete,
        ))
    }

    /// Rows for `result`, and whether its set is now exhausted
    pub(crate) fn fetch_rows(
        &mut self,
        result: &QueryResult,
        limit: Option<usize>,
    ) -> Result<(Vec<Row>, bool)> {
        if result.connection_id() != self.id {
            return Err(Error::InvalidResult(format!(
                "result {} belongs to connection {}, not {}",
                result.id(),
                result.connection_id(),
                self.id
            )));
        }
        let current = match self.current.as_mut() {
            Some(current) if current.id == result.id() => current,
            _ => {
                return Err(Error::InvalidResult(format!(
                    "result {} has been closed",
                    result.id()
                )))
            }
        };

        let mut rows = Vec::new();
        let Some(source) = current.rows.as_mut() else {
            return Ok((rows, true));
        };
        while limit.map_or(true, |n| rows.len() < n) {
            match source.next_row() {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => return Ok((rows, true)),
                Err(e) => return Err(Error::Query(e.message)),
            }
        }
        Ok((rows, false))
    }

    /// Begin a transaction. Nested transactions are rejected.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.check_connection()?;
        self.transaction.check(TransactionState::InTransaction)?;

        // Dispatched directly so an open result stays usable
        let transport = self.transport_mut()?;
        let outcome = transport
            .query("START TRANSACTION")
            .and_then(|()| transport.store_result().map(drop));
        if let Err(e) = outcome {
            counters::transaction(labels::TXN_BEGIN, labels::STATUS_ERROR);
            return Err(Error::Query(e.message));
        }
        self.transaction.transition(TransactionState::InTransaction)?;
        counters::transaction(labels::TXN_BEGIN, labels::STATUS_OK);
        tracing::debug!(connection = %self.id, "transaction started");
        Ok(())
    }

    /// Commit the transaction in progress.
    ///
    /// The connection is idle afterwards even if the commit primitive fails.
    pub fn commit(&mut self) -> Result<()> {
        self.end_transaction(labels::TXN_COMMIT)
    }

    /// Roll back the transaction in progress.
    ///
    /// The connection is idle afterwards even if the rollback primitive fails.
    pub fn rollback(&mut self) -> Result<()> {
        self.end_transaction(labels::TXN_ROLLBACK)
    }

    fn end_transaction(&mut self, op: &'static str) -> Result<()> {
        self.check_connection()?;
        self.transaction.transition(TransactionState::Idle)?;

        let transport = self.transport_mut()?;
        let outcome = if op == labels::TXN_COMMIT {
            transport.commit()
        } else {
            transport.rollback()
        };

        match outcome {
            Ok(()) => {
                counters::transaction(op, labels::STATUS_OK);
                tracing::debug!(connection = %self.id, op, "transaction finished");
                Ok(())
            }
            Err(e) => {
                counters::transaction(op, labels::STATUS_ERROR);
                Err(Error::Query(e.message))
            }
        }
    }

    /// Best-effort commit for teardown paths.
    ///
    /// Issues the commit primitive if a transaction is in progress and the
    /// connection is open; the transaction state is left as is. Failures are
    /// logged, never returned.
    pub fn autocommit_flush(&mut self) {
        if !self.is_transacting() {
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        match transport.commit() {
            Ok(()) => counters::transaction(labels::TXN_FLUSH, labels::STATUS_OK),
            Err(e) => {
                counters::transaction(labels::TXN_FLUSH, labels::STATUS_ERROR);
                tracing::warn!(connection = %self.id, "flush commit failed: {}", e);
            }
        }
    }

    /// Whether `result` is the open result of this connection
    pub fn is_current_result(&self, result: &QueryResult) -> bool {
        result.connection_id() == self.id
            && self.current.as_ref().map(|c| c.id) == Some(result.id())
    }

    /// Whether a result is open
    pub fn has_open_result(&self) -> bool {
        self.current.is_some()
    }

    /// Close the open result, if any, without an advisory
    pub fn clear_current_result(&mut self) {
        self.set_current_result(None);
    }

    /// Single choke point for the one-open-result rule
    fn set_current_result(&mut self, candidate: Option<ActiveResult<RowsOf<D>>>) {
        if self.current.as_ref().map(|c| c.id) == candidate.as_ref().map(|c| c.id) {
            return;
        }

        if let Some(mut previous) = self.current.take() {
            if candidate.is_some() {
                self.advise(Advisory::CancellingPreviousQuery);
                counters::result_cancelled();
            }
            previous.close();
            tracing::debug!(connection = %self.id, result = %previous.id, "result closed");
        }
        self.current = candidate;
    }

    fn check_connection(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::closed())
        }
    }

    fn transport_mut(&mut self) -> Result<&mut D::Transport> {
        self.transport.as_mut().ok_or_else(Error::closed)
    }

    fn advise(&self, advisory: Advisory) {
        counters::advisory(advisory.label());
        self.observer.advisory(advisory);
    }
}

fn handshake<T: Transport>(
    transport: &mut T,
    options: &ConnectOptions,
    port: u16,
    client_flags: ClientFlags,
) -> Result<()> {
    options.configure(transport)?;
    transport
        .connect(&options.handshake_params(port, client_flags))
        .map_err(|e| Error::Connection(format!("failed to connect: {}", e)))
}

impl<D: Driver> Drop for Connection<D> {
    fn drop(&mut self) {
        if self.is_connected() {
            self.advise(Advisory::DroppedWhileConnected);
            self.disconnect();
        }
    }
}

impl<D: Driver> std::fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("transaction", &self.transaction)
            .field("current_result", &self.current.as_ref().map(|c| c.id))
            .finish()
    }
}
