//! Connection options and the fluent [`ConnectionBuilder`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use k4link_client::ConnectionBuilder;
//!
//! let options = ConnectionBuilder::new("192.168.1.50")
//!     .password("hunter2")
//!     .auth_timeout(Duration::from_secs(3))
//!     .options();
//!
//! assert_eq!(options.port, 9205);
//! assert_eq!(options.auth_timeout, Duration::from_secs(3));
//! ```

use std::fmt;
use std::time::Duration;

use k4link_core::{Error, Result};

use crate::connection::ConnectionManager;

/// Plaintext (SHA-384 password) port.
pub const DEFAULT_PORT: u16 = 9205;

/// TLS-PSK port.
pub const DEFAULT_TLS_PORT: u16 = 9204;

/// TCP connect and TLS handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed between sending credentials and the first packet.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Keep-alive period once connected.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Sent every keep-alive period.
pub const DEFAULT_KEEPALIVE_COMMAND: &str = "PING;";

/// Sent once on the first packet: ready, K4 extended syntax, error reporting.
pub const DEFAULT_INIT_COMMANDS: [&str; 3] = ["RDY;", "K41;", "ER1;"];

/// Sent best-effort before a graceful disconnect.
pub const DEFAULT_DISCONNECT_COMMAND: &str = "RRN;";

/// How the client proves itself to the radio.
#[derive(Clone, PartialEq, Eq)]
pub enum Security {
    /// Plain TCP; the SHA-384 of the password is sent right after connect.
    Plaintext { password: String },
    /// TLS 1.2 with a pre-shared key. Requires the `tls` feature.
    TlsPsk { identity: String, key: Vec<u8> },
}

impl Security {
    /// The radio's default port for this mode.
    pub fn default_port(&self) -> u16 {
        match self {
            Security::Plaintext { .. } => DEFAULT_PORT,
            Security::TlsPsk { .. } => DEFAULT_TLS_PORT,
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Security::Plaintext { .. } => f
                .debug_struct("Plaintext")
                .field("password", &"<redacted>")
                .finish(),
            Security::TlsPsk { identity, .. } => f
                .debug_struct("TlsPsk")
                .field("identity", identity)
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}

impl Default for Security {
    fn default() -> Self {
        Security::Plaintext {
            password: String::new(),
        }
    }
}

/// Everything a [`ConnectionManager`] needs to reach and hold a radio.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Radio hostname or IP address.
    pub host: String,
    pub port: u16,
    pub security: Security,
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    /// `None` disables keep-alive.
    pub keepalive_interval: Option<Duration>,
    pub keepalive_command: String,
    /// Sent, in order, once the first packet arrives.
    pub init_commands: Vec<String>,
    /// `None` closes the socket without a farewell command.
    pub disconnect_command: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            host: String::new(),
            port: DEFAULT_PORT,
            security: Security::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
            keepalive_command: DEFAULT_KEEPALIVE_COMMAND.to_string(),
            init_commands: DEFAULT_INIT_COMMANDS.iter().map(|c| c.to_string()).collect(),
            disconnect_command: Some(DEFAULT_DISCONNECT_COMMAND.to_string()),
        }
    }
}

impl ConnectionOptions {
    /// `host:port` for socket connection.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the options before connecting.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidParameter("host must not be empty".into()));
        }
        if self.auth_timeout.is_zero() {
            return Err(Error::InvalidParameter("auth timeout must be non-zero".into()));
        }
        if self.keepalive_interval.is_some_and(|d| d.is_zero()) {
            return Err(Error::InvalidParameter(
                "keep-alive interval must be non-zero".into(),
            ));
        }
        if let Security::TlsPsk { identity, key } = &self.security {
            if identity.is_empty() || key.is_empty() {
                return Err(Error::InvalidParameter(
                    "TLS-PSK identity and key must not be empty".into(),
                ));
            }
            if !cfg!(feature = "tls") {
                return Err(Error::Unsupported(
                    "TLS-PSK requires the `tls` feature".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`ConnectionOptions`] and [`ConnectionManager`].
///
/// The port follows the security mode (9205 plaintext, 9204 TLS) unless
/// set explicitly.
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    options: ConnectionOptions,
    port: Option<u16>,
}

impl ConnectionBuilder {
    pub fn new(host: &str) -> Self {
        ConnectionBuilder {
            options: ConnectionOptions {
                host: host.to_string(),
                ..ConnectionOptions::default()
            },
            port: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Plaintext authentication with this password.
    pub fn password(mut self, password: &str) -> Self {
        self.options.security = Security::Plaintext {
            password: password.to_string(),
        };
        self
    }

    /// TLS-PSK authentication.
    pub fn tls_psk(mut self, identity: &str, key: &[u8]) -> Self {
        self.options.security = Security::TlsPsk {
            identity: identity.to_string(),
            key: key.to_vec(),
        };
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.options.auth_timeout = timeout;
        self
    }

    /// Keep-alive period; `None` disables keep-alive.
    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.options.keepalive_interval = interval;
        self
    }

    pub fn keepalive_command(mut self, cmd: &str) -> Self {
        self.options.keepalive_command = cmd.to_string();
        self
    }

    /// Replace the commands sent on the first packet.
    pub fn init_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.init_commands = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn disconnect_command(mut self, cmd: Option<&str>) -> Self {
        self.options.disconnect_command = cmd.map(str::to_string);
        self
    }

    /// The resolved options.
    pub fn options(&self) -> ConnectionOptions {
        let mut options = self.options.clone();
        options.port = self
            .port
            .unwrap_or_else(|| options.security.default_port());
        options
    }

    /// Validate and create a (disconnected) manager.
    pub fn build(self) -> Result<ConnectionManager> {
        ConnectionManager::new(self.options())
    }
}
