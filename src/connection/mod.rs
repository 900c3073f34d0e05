//! Connection management
//!
//! This module handles:
//! * Connection options and client flags
//! * Session lifecycle (connect, execute, disconnect)
//! * Transaction state machine enforcement
//! * Advisory reporting

mod conn;
mod flags;
mod info;
mod observer;
mod options;
mod state;

pub use conn::{Connection, ConnectionId};
pub use flags::ClientFlags;
pub use info::ConnectionInfo;
pub use observer::{Advisory, AdvisoryLog, SessionObserver, TracingObserver};
pub use options::{ConnectOptions, ConnectOptionsBuilder, TlsOptions, DEFAULT_CHARSET};
pub use state::TransactionState;
