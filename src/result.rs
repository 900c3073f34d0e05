//! Result handles
//!
//! A [`QueryResult`] is a ticket, not an owner: it names its connection and
//! its slot, and shares a liveness flag with the connection. Row access goes
//! through the owning [`Connection`], which may revoke the ticket at any time
//! (a newer query, a disconnect). After revocation every row operation fails
//! with [`Error::InvalidResult`].

use crate::connection::{Connection, ConnectionId};
use crate::transport::{Column, Driver, Row};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifier of a result within its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultId(pub(crate) u64);

impl std::fmt::Display for ResultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to the result set of one query
#[derive(Debug)]
pub struct QueryResult {
    connection: ConnectionId,
    id: ResultId,
    live: Arc<AtomicBool>,
    sql: String,
    columns: Vec<Column>,
    rows_affected: u64,
    rows_fetched: u64,
    complete: bool,
}

impl QueryResult {
    pub(crate) fn new(
        connection: ConnectionId,
        id: ResultId,
        live: Arc<AtomicBool>,
        sql: &str,
        columns: Vec<Column>,
        rows_affected: u64,
        complete: bool,
    ) -> Self {
        Self {
            connection,
            id,
            live,
            sql: sql.to_string(),
            columns,
            rows_affected,
            rows_fetched: 0,
            complete,
        }
    }

    /// Connection this result belongs to
    pub fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    /// Identifier within the connection
    pub fn id(&self) -> ResultId {
        self.id
    }

    /// Statement text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Column metadata (empty for statements without a result set)
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows affected (or returned) by the statement
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Rows fetched so far
    pub fn rows_fetched(&self) -> u64 {
        self.rows_fetched
    }

    /// Whether every row has been fetched
    pub fn has_completed(&self) -> bool {
        self.complete
    }

    /// Whether the connection still considers this result open
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Fetch up to `n` rows
    pub fn fetch<D: Driver>(&mut self, conn: &mut Connection<D>, n: usize) -> Result<Vec<Row>> {
        self.fetch_limit(conn, Some(n))
    }

    /// Fetch every remaining row
    pub fn fetch_all<D: Driver>(&mut self, conn: &mut Connection<D>) -> Result<Vec<Row>> {
        self.fetch_limit(conn, None)
    }

    fn fetch_limit<D: Driver>(
        &mut self,
        conn: &mut Connection<D>,
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        if !self.is_live() {
            return Err(Error::InvalidResult(format!(
                "result {} has been closed",
                self.id
            )));
        }
        let (rows, complete) = conn.fetch_rows(self, limit)?;
        self.rows_fetched += rows.len() as u64;
        self.complete = complete;
        Ok(rows)
    }

    /// Close the result and release its slot on the connection.
    ///
    /// Closing an already closed result is a no-op. Fails if `conn` is not
    /// the connection that produced this result.
    pub fn close<D: Driver>(&mut self, conn: &mut Connection<D>) -> Result<()> {
        if conn.id() != self.connection {
            return Err(Error::InvalidResult(format!(
                "result {} belongs to connection {}, not {}",
                self.id,
                self.connection,
                conn.id()
            )));
        }
        if conn.is_current_result(self) {
            conn.clear_current_result();
        }
        self.live.store(false, Ordering::Release);
        Ok(())
    }
}
