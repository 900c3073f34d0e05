//! Client capability flags passed to the handshake

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Client capability bitmask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ClientFlags: u64 {
        /// Return found rows instead of affected rows
        const FOUND_ROWS = 1 << 1;
        /// Request extended column flags
        const LONG_FLAG = 1 << 2;
        /// Database name may be given in the handshake
        const CONNECT_WITH_DB = 1 << 3;
        /// Disallow `database.table.column` syntax
        const NO_SCHEMA = 1 << 4;
        /// Compressed protocol
        const COMPRESS = 1 << 5;
        /// ODBC client
        const ODBC = 1 << 6;
        /// `LOAD DATA LOCAL` support
        const LOCAL_FILES = 1 << 7;
        /// Ignore spaces before `(`
        const IGNORE_SPACE = 1 << 8;
        /// Interactive timeout instead of wait timeout
        const INTERACTIVE = 1 << 10;
        /// Switch to TLS after the handshake
        const SSL = 1 << 11;
        /// Do not install SIGPIPE handlers
        const IGNORE_SIGPIPE = 1 << 12;
        /// Transaction status in OK packets
        const TRANSACTIONS = 1 << 13;
        /// Multiple statements per query
        const MULTI_STATEMENTS = 1 << 16;
        /// Multiple result sets
        const MULTI_RESULTS = 1 << 17;
        /// Multiple result sets from prepared statements
        const PS_MULTI_RESULTS = 1 << 18;
        /// Keep options across failed connects
        const REMEMBER_OPTIONS = 1 << 31;
    }
}

impl ClientFlags {
    /// No flags
    pub const NONE: Self = Self::empty();

    /// Look up a flag by name (case-insensitive, optional `CLIENT_` prefix)
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_uppercase();
        Self::from_name(name.strip_prefix("CLIENT_").unwrap_or(&name))
    }
}

impl Default for ClientFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::fmt::Display for ClientFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect();
        if names.is_empty() {
            write!(f, "{:#x}", self.bits())
        } else {
            write!(f, "{}", names.join(","))
        }
    }
}

impl std::str::FromStr for ClientFlags {
    type Err = Error;

    /// Parse a decimal bitmask or a comma-separated list of flag names
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::NONE);
        }
        if let Ok(bits) = s.parse::<u64>() {
            return Ok(Self::from_bits_retain(bits));
        }

        let mut flags = Self::NONE;
        for name in s.split(',') {
            flags |= Self::lookup(name)
                .ok_or_else(|| Error::Config(format!("unknown client flag '{}'", name.trim())))?;
        }
        Ok(flags)
    }
}
