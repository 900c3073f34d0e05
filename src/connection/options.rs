//! Connection options
//!
//! Every field is optional and "unset" (`None`) is distinct from the empty
//! string, which some transports accept as a real value.

use crate::transport::{ClientOption, HandshakeParams, TlsParams, Transport};
use crate::{ClientFlags, Error, Result};
use serde::{Deserialize, Serialize};

/// Character set every session is configured with
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// TLS material
///
/// Applied as one bundle: if any field is present the transport receives a
/// single TLS configuration call with every field (absent ones as `None`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsOptions {
    /// Client private key path
    pub key: Option<String>,
    /// Client certificate path
    pub cert: Option<String>,
    /// CA certificate path
    pub ca: Option<String>,
    /// Directory of CA certificates
    pub ca_path: Option<String>,
    /// Permitted cipher list
    pub cipher: Option<String>,
}

impl TlsOptions {
    /// Whether any TLS field is present
    pub fn is_configured(&self) -> bool {
        self.key.is_some()
            || self.cert.is_some()
            || self.ca.is_some()
            || self.ca_path.is_some()
            || self.cipher.is_some()
    }

    /// Borrowed view handed to the transport
    pub fn params(&self) -> TlsParams<'_> {
        TlsParams {
            key: self.key.as_deref(),
            cert: self.cert.as_deref(),
            ca: self.ca.as_deref(),
            ca_path: self.ca_path.as_deref(),
            cipher: self.cipher.as_deref(),
        }
    }
}

/// Connection options
///
/// Use `ConnectOptions::builder()` for fluent construction, or
/// [`ConnectOptions::from_json`] to load them from a configuration file.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectOptions {
    /// Host name or address
    pub host: Option<String>,
    /// User name
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Default database
    pub dbname: Option<String>,
    /// Unix socket path
    pub unix_socket: Option<String>,
    /// Option file to read
    pub default_file: Option<String>,
    /// Option-file group to read
    pub groups: Option<String>,
    /// TLS material
    pub tls: TlsOptions,
}

impl ConnectOptions {
    /// Create options with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder
    ///
    /// # Examples
    ///
    /// ```
    /// use mariadb_session::ConnectOptions;
    ///
    /// let options = ConnectOptions::builder()
    ///     .host("db.internal")
    ///     .user("app")
    ///     .password("secret")
    ///     .dbname("inventory")
    ///     .ssl_ca("/etc/ssl/ca.pem")
    ///     .build();
    ///
    /// assert!(options.tls.is_configured());
    /// ```
    pub fn builder() -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::default()
    }

    /// Parse options from JSON
    ///
    /// Missing fields stay unset; unknown fields are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply the options to a fresh transport's pending configuration.
    ///
    /// Always enables local-file ingest and sets the `utf8mb4` character set,
    /// then applies the default group, the default file and, if any TLS
    /// field is present, the TLS bundle. Performs no network I/O.
    pub fn configure<T: Transport>(&self, transport: &mut T) -> Result<()> {
        apply(transport, ClientOption::LocalInfile(true))?;
        apply(transport, ClientOption::Charset(DEFAULT_CHARSET))?;

        if let Some(groups) = self.groups.as_deref() {
            apply(transport, ClientOption::ReadDefaultGroup(groups))?;
        }
        if let Some(file) = self.default_file.as_deref() {
            apply(transport, ClientOption::ReadDefaultFile(file))?;
        }

        if self.tls.is_configured() {
            transport
                .set_tls(&self.tls.params())
                .map_err(|e| Error::Connection(format!("failed to configure TLS: {}", e)))?;
        }
        Ok(())
    }

    /// Handshake parameters for these options
    pub fn handshake_params(&self, port: u16, client_flags: ClientFlags) -> HandshakeParams<'_> {
        HandshakeParams {
            host: self.host.as_deref(),
            user: self.user.as_deref(),
            password: self.password.as_deref(),
            dbname: self.dbname.as_deref(),
            port,
            unix_socket: self.unix_socket.as_deref(),
            client_flags,
        }
    }
}

fn apply<T: Transport>(transport: &mut T, option: ClientOption<'_>) -> Result<()> {
    transport
        .set_option(option)
        .map_err(|e| Error::Connection(format!("failed to set {}: {}", option.name(), e)))
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("dbname", &self.dbname)
            .field("unix_socket", &self.unix_socket)
            .field("default_file", &self.default_file)
            .field("groups", &self.groups)
            .field("tls", &self.tls)
            .finish()
    }
}

/// Builder for [`ConnectOptions`]
#[derive(Debug, Clone, Default)]
pub struct ConnectOptionsBuilder {
    options: ConnectOptions,
}

impl ConnectOptionsBuilder {
    /// Set the host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = Some(host.into());
        self
    }

    /// Set the user
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.options.user = Some(user.into());
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.options.password = Some(password.into());
        self
    }

    /// Set the default database
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.options.dbname = Some(dbname.into());
        self
    }

    /// Set the Unix socket path
    pub fn unix_socket(mut self, path: impl Into<String>) -> Self {
        self.options.unix_socket = Some(path.into());
        self
    }

    /// Set the option file to read
    pub fn default_file(mut self, path: impl Into<String>) -> Self {
        self.options.default_file = Some(path.into());
        self
    }

    /// Set the option-file group to read
    pub fn groups(mut self, groups: impl Into<String>) -> Self {
        self.options.groups = Some(groups.into());
        self
    }

    /// Set the client private key path
    pub fn ssl_key(mut self, path: impl Into<String>) -> Self {
        self.options.tls.key = Some(path.into());
        self
    }

    /// Set the client certificate path
    pub fn ssl_cert(mut self, path: impl Into<String>) -> Self {
        self.options.tls.cert = Some(path.into());
        self
    }

    /// Set the CA certificate path
    pub fn ssl_ca(mut self, path: impl Into<String>) -> Self {
        self.options.tls.ca = Some(path.into());
        self
    }

    /// Set the CA certificate directory
    pub fn ssl_capath(mut self, path: impl Into<String>) -> Self {
        self.options.tls.ca_path = Some(path.into());
        self
    }

    /// Set the permitted cipher list
    pub fn ssl_cipher(mut self, cipher: impl Into<String>) -> Self {
        self.options.tls.cipher = Some(cipher.into());
        self
    }

    /// Build the options
    pub fn build(self) -> ConnectOptions {
        self.options
    }
}
