//! Metrics
//!
//! Thin wrappers over the `metrics` facade. Nothing is recorded unless the
//! application installs a recorder.
//!
//! * `counters`: lifecycle and query outcome counts
//! * `histograms`: query latency
//! * `labels`: label values shared by both

/// Label values
pub mod labels {
    /// Fire-and-forget statement
    pub const KIND_EXEC: &str = "exec";
    /// Statement producing a result handle
    pub const KIND_QUERY: &str = "query";

    /// Success
    pub const STATUS_OK: &str = "ok";
    /// Failure
    pub const STATUS_ERROR: &str = "error";

    /// Transaction begin
    pub const TXN_BEGIN: &str = "begin";
    /// Transaction commit
    pub const TXN_COMMIT: &str = "commit";
    /// Transaction rollback
    pub const TXN_ROLLBACK: &str = "rollback";
    /// Best-effort commit on teardown paths
    pub const TXN_FLUSH: &str = "flush";
}

/// Counters
pub mod counters {
    /// Successful handshake
    pub fn connection_opened() {
        ::metrics::counter!("mariadb_session_connections_opened_total").increment(1);
    }

    /// Failed handshake
    pub fn connection_failed() {
        ::metrics::counter!("mariadb_session_connections_failed_total").increment(1);
    }

    /// Transport released
    pub fn connection_closed() {
        ::metrics::counter!("mariadb_session_connections_closed_total").increment(1);
    }

    /// Statement finished
    pub fn query_completed(kind: &'static str, status: &'static str) {
        ::metrics::counter!(
            "mariadb_session_queries_total",
            "kind" => kind,
            "status" => status
        )
        .increment(1);
    }

    /// Open result force-closed by a newer query
    pub fn result_cancelled() {
        ::metrics::counter!("mariadb_session_results_cancelled_total").increment(1);
    }

    /// Transaction operation finished
    pub fn transaction(op: &'static str, status: &'static str) {
        ::metrics::counter!(
            "mariadb_session_transactions_total",
            "op" => op,
            "status" => status
        )
        .increment(1);
    }

    /// Advisory emitted
    pub fn advisory(kind: &'static str) {
        ::metrics::counter!("mariadb_session_advisories_total", "kind" => kind).increment(1);
    }
}

/// Histograms
pub mod histograms {
    use std::time::Duration;

    /// Statement latency in milliseconds
    pub fn query_duration(kind: &'static str, elapsed: Duration) {
        ::metrics::histogram!("mariadb_session_query_duration_ms", "kind" => kind)
            .record(elapsed.as_secs_f64() * 1_000.0);
    }
}
