//! Transport abstraction
//!
//! The session layer never speaks the wire protocol itself. A [`Driver`]
//! hands out fresh [`Transport`] handles, and the connection drives them
//! through the narrow set of operations below:
//! * pending option configuration (before the handshake)
//! * handshake, statement dispatch and buffered result retrieval
//! * context-aware string escaping
//! * commit / rollback primitives and close
//!
//! [`memory`] provides an in-process implementation.

pub mod memory;

use crate::connection::ClientFlags;
use serde::{Deserialize, Serialize};

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Error reported by a transport implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Driver error number (0 when the driver has none)
    pub code: u32,
    /// Driver error text
    pub message: String,
}

impl TransportError {
    /// Create a new transport error
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Option applied to a transport's pending configuration before the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOption<'a> {
    /// Allow `LOAD DATA LOCAL INFILE`
    LocalInfile(bool),
    /// Connection character set
    Charset(&'a str),
    /// Option-file group to read
    ReadDefaultGroup(&'a str),
    /// Option file to read
    ReadDefaultFile(&'a str),
}

impl ClientOption<'_> {
    /// Option name as used in MySQL option files
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalInfile(_) => "local-infile",
            Self::Charset(_) => "default-character-set",
            Self::ReadDefaultGroup(_) => "read-default-group",
            Self::ReadDefaultFile(_) => "read-default-file",
        }
    }
}

/// TLS material handed to the transport in a single call.
///
/// `None` is the explicit "no value" placeholder for an absent field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsParams<'a> {
    /// Client private key path
    pub key: Option<&'a str>,
    /// Client certificate path
    pub cert: Option<&'a str>,
    /// CA certificate path
    pub ca: Option<&'a str>,
    /// Directory of CA certificates
    pub ca_path: Option<&'a str>,
    /// Permitted cipher list
    pub cipher: Option<&'a str>,
}

/// Handshake parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeParams<'a> {
    /// Host name or address (`None` = driver default)
    pub host: Option<&'a str>,
    /// User name (`None` = driver default)
    pub user: Option<&'a str>,
    /// Password (`None` = no password)
    pub password: Option<&'a str>,
    /// Default database
    pub dbname: Option<&'a str>,
    /// TCP port (0 = driver default)
    pub port: u16,
    /// Unix socket path
    pub unix_socket: Option<&'a str>,
    /// Client capability flags
    pub client_flags: ClientFlags,
}

/// Column metadata of a result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Server type name (e.g. `INT`, `VARCHAR`)
    pub type_name: String,
}

impl Column {
    /// Create column metadata
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// One row of a result set, as raw nullable byte strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<Vec<u8>>>,
}

impl Row {
    /// Create a row from raw values
    pub fn new(values: Vec<Option<Vec<u8>>>) -> Self {
        Self { values }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index` (`None` for SQL NULL or out of range)
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.values.get(index)?.as_deref()
    }

    /// Value at `index` as UTF-8 text
    pub fn get_str(&self, index: usize) -> Option<&str> {
        std::str::from_utf8(self.get(index)?).ok()
    }

    /// Whether the value at `index` is SQL NULL
    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }

    /// Consume the row into its raw values
    pub fn into_values(self) -> Vec<Option<Vec<u8>>> {
        self.values
    }
}

impl<S: AsRef<str>> FromIterator<Option<S>> for Row {
    fn from_iter<I: IntoIterator<Item = Option<S>>>(iter: I) -> Self {
        Row::new(
            iter.into_iter()
                .map(|v| v.map(|s| s.as_ref().as_bytes().to_vec()))
                .collect(),
        )
    }
}

/// Session metadata reported by a connected transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Host the session is connected to
    pub host: String,
    /// Authenticated user
    pub user: String,
    /// Current default database
    pub dbname: Option<String>,
    /// Connection type description (e.g. `localhost via TCP/IP`)
    pub host_info: String,
    /// Server version string
    pub server_version: String,
    /// Protocol version number
    pub protocol_version: u32,
    /// Server thread id of the session
    pub thread_id: u64,
}

/// Factory for fresh transport handles
pub trait Driver {
    /// Transport handle type
    type Transport: Transport;

    /// Initialize a fresh, unconnected transport handle
    fn init(&self) -> Self::Transport;

    /// Client library version string
    fn client_version(&self) -> String;
}

/// Buffered result set produced by a transport
pub trait RowSource {
    /// Column metadata
    fn columns(&self) -> &[Column];

    /// Next row, or `None` once the set is exhausted
    fn next_row(&mut self) -> TransportResult<Option<Row>>;
}

/// One transport handle (one network session)
pub trait Transport {
    /// Buffered result set type
    type Rows: RowSource;

    /// Apply an option to the pending configuration (no I/O)
    fn set_option(&mut self, option: ClientOption<'_>) -> TransportResult<()>;

    /// Configure TLS material (no I/O)
    fn set_tls(&mut self, params: &TlsParams<'_>) -> TransportResult<()>;

    /// Perform the handshake
    fn connect(&mut self, params: &HandshakeParams<'_>) -> TransportResult<()>;

    /// Dispatch a statement
    fn query(&mut self, sql: &str) -> TransportResult<()>;

    /// Retrieve the buffered result of the last statement, if it produced one
    fn store_result(&mut self) -> TransportResult<Option<Self::Rows>>;

    /// Rows affected by the last statement
    fn affected_rows(&self) -> u64;

    /// Escape `from` into `to`, honouring the session character set and
    /// `NO_BACKSLASH_ESCAPES`.
    ///
    /// Returns the number of bytes written, or `None` if `to` is too small.
    fn escape_string(&self, to: &mut [u8], from: &[u8]) -> Option<usize>;

    /// Commit primitive
    fn commit(&mut self) -> TransportResult<()>;

    /// Rollback primitive
    fn rollback(&mut self) -> TransportResult<()>;

    /// Metadata of the connected session
    fn server_info(&self) -> ServerInfo;

    /// Close the session and release the handle
    fn close(self) -> TransportResult<()>
    where
        Self: Sized;
}
