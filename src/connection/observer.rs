//! Advisory diagnostics
//!
//! Advisories are non-fatal notices about lifecycle misuse. They never abort
//! the operation that raised them. Each connection reports them to an
//! injected [`SessionObserver`]; the default [`TracingObserver`] logs them.

use std::sync::{Arc, Mutex};

/// Non-fatal lifecycle notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advisory {
    /// The connection was dropped while still connected
    DroppedWhileConnected,
    /// `disconnect` ran while a result was still open
    DisconnectWithOpenResult,
    /// A new query superseded an open result
    CancellingPreviousQuery,
}

impl Advisory {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::DroppedWhileConnected => "dropped_while_connected",
            Self::DisconnectWithOpenResult => "disconnect_with_open_result",
            Self::CancellingPreviousQuery => "cancelling_previous_query",
        }
    }
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DroppedWhileConnected => write!(
                f,
                "call disconnect() when finished working with a connection"
            ),
            Self::DisconnectWithOpenResult => write!(
                f,
                "there is a result object still in use; \
                 it will be released when the connection is closed"
            ),
            Self::CancellingPreviousQuery => write!(f, "cancelling previous query"),
        }
    }
}

/// Receiver of advisories
pub trait SessionObserver: Send + Sync {
    /// Called once per advisory, synchronously, before the operation continues
    fn advisory(&self, advisory: Advisory);
}

/// Logs advisories as `tracing` warnings
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn advisory(&self, advisory: Advisory) {
        tracing::warn!(kind = advisory.label(), "{}", advisory);
    }
}

/// Collects advisories in memory so a front end can relay them to its users
#[derive(Debug, Clone, Default)]
pub struct AdvisoryLog {
    entries: Arc<Mutex<Vec<Advisory>>>,
}

impl AdvisoryLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded advisories
    pub fn entries(&self) -> Vec<Advisory> {
        self.lock().clone()
    }

    /// Remove and return the recorded advisories
    pub fn take(&self) -> Vec<Advisory> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of recorded advisories
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Advisory>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionObserver for AdvisoryLog {
    fn advisory(&self, advisory: Advisory) {
        tracing::debug!(kind = advisory.label(), "advisory recorded");
        self.lock().push(advisory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_records_in_order() {
        let log = AdvisoryLog::new();
        log.advisory(Advisory::CancellingPreviousQuery);
        log.advisory(Advisory::DisconnectWithOpenResult);

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.entries(),
            vec![
                Advisory::CancellingPreviousQuery,
                Advisory::DisconnectWithOpenResult
            ]
        );
    }

    #[test]
    fn test_take_drains() {
        let log = AdvisoryLog::new();
        log.advisory(Advisory::DroppedWhileConnected);
        assert_eq!(log.take(), vec![Advisory::DroppedWhileConnected]);
        assert!(log.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let log = AdvisoryLog::new();
        let observer: Arc<dyn SessionObserver> = Arc::new(log.clone());
        observer.advisory(Advisory::CancellingPreviousQuery);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Advisory::CancellingPreviousQuery.to_string(),
            "cancelling previous query"
        );
        assert!(Advisory::DroppedWhileConnected
            .to_string()
            .contains("disconnect()"));
        assert!(Advisory::DisconnectWithOpenResult
            .to_string()
            .contains("still in use"));
    }

    #[test]
    fn test_tracing_observer_does_not_panic() {
        TracingObserver.advisory(Advisory::CancellingPreviousQuery);
    }
}
