//! k4link-client: network session for the Elecraft K4 remote protocol.
//!
//! - [`ConnectionManager`] owns the socket: it authenticates (SHA-384
//!   password hash, or TLS-PSK with the `tls` feature), runs the read loop,
//!   sends keep-alives and publishes lifecycle [`ConnectionEvent`]s.
//!   Decoded packets are delivered in arrival order on a channel of their
//!   own.
//! - [`K4Radio`] pairs a connection with a
//!   [`RadioStateModel`](k4link_state::RadioStateModel) and exposes typed
//!   setters, state snapshots and audio / panadapter streams.
//!
//! [`ConnectionEvent`]: k4link_core::ConnectionEvent

pub mod auth;
pub mod connection;
pub mod options;
pub mod radio;
#[cfg(feature = "tls")]
pub mod tls;

pub use connection::ConnectionManager;
pub use options::{
    ConnectionBuilder, ConnectionOptions, DEFAULT_AUTH_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_DISCONNECT_COMMAND, DEFAULT_INIT_COMMANDS, DEFAULT_KEEPALIVE_COMMAND,
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_PORT, DEFAULT_TLS_PORT, Security,
};
pub use radio::{K4Radio, K4RadioBuilder};
