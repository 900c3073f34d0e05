//! Error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Session error
#[derive(Debug, Error)]
pub enum Error {
    /// Handshake failure, or an operation that needs a live session was
    /// attempted while disconnected
    #[error("connection error: {0}")]
    Connection(String),

    /// Statement dispatch failure (carries the transport's error text)
    #[error("error executing query: {0}")]
    Query(String),

    /// Invalid transaction state transition
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Result handle used after it was closed, or with the wrong connection
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// Invalid configuration (connection string, options file)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Escaped text was not valid UTF-8
    #[error("encoding error: {0}")]
    Encoding(String),

    /// JSON (de)serialization of options
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Error returned by every operation that needs a live session
    pub(crate) fn closed() -> Self {
        Error::Connection("invalid or closed connection".into())
    }

    /// Whether this error was caused by a missing or failed connection
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Whether this error was raised by the transaction state machine
    pub fn is_transaction_error(&self) -> bool {
        matches!(self, Error::Transaction(_))
    }

    /// Whether this error came from statement dispatch
    pub fn is_query_error(&self) -> bool {
        matches!(self, Error::Query(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_message() {
        let err = Error::closed();
        assert!(err.is_connection_error());
        assert_eq!(
            err.to_string(),
            "connection error: invalid or closed connection"
        );
    }

    #[test]
    fn test_query_error_keeps_driver_text() {
        let err = Error::Query("Table 'db.t' doesn't exist".into());
        assert!(err.is_query_error());
        match err {
            Error::Query(text) => assert_eq!(text, "Table 'db.t' doesn't exist"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_json_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
