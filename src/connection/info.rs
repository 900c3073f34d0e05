//! Session metadata

use crate::transport::ServerInfo;
use serde::Serialize;

/// Metadata about a connected session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    /// Host the session is connected to
    pub host: String,
    /// Authenticated user
    pub user: String,
    /// Current default database (empty if none)
    pub dbname: String,
    /// Connection type, e.g. `localhost via TCP/IP`
    pub con_type: String,
    /// Server version string
    pub server_version: String,
    /// Protocol version
    pub protocol_version: u32,
    /// Server thread id
    pub thread_id: u64,
    /// Client library version
    pub client: String,
}

impl ConnectionInfo {
    pub(crate) fn new(server: ServerInfo, client: String) -> Self {
        Self {
            host: server.host,
            user: server.user,
            dbname: server.dbname.unwrap_or_default(),
            con_type: server.host_info,
            server_version: server.server_version,
            protocol_version: server.protocol_version,
            thread_id: server.thread_id,
            client,
        }
    }
}
