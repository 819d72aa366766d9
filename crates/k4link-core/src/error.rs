//! Error types for k4link.
//!
//! Only the connection layer returns errors. The packet framer and the
//! radio state model absorb malformed input locally, so nothing in those
//! crates produces an [`Error`].

/// The error type for all k4link operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (TCP socket, address resolution).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (unexpected data from the radio).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for the radio.
    #[error("timeout waiting for response")]
    Timeout,

    /// The radio did not accept our credentials.
    ///
    /// Raised for a bad password, a rejected TLS-PSK handshake, and for any
    /// socket failure before the first packet proves the channel works.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The requested operation is not available in this build.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// An invalid parameter was passed to a command builder or option.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the radio has been established.
    #[error("not connected")]
    NotConnected,

    /// `connect()` was called while a connection attempt is already live.
    #[error("already connected")]
    AlreadyConnected,

    /// The connection to the radio was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("connection refused".into());
        assert_eq!(e.to_string(), "transport error: connection refused");
    }

    #[test]
    fn error_display_authentication_failed() {
        let e = Error::AuthenticationFailed("timed out".into());
        assert_eq!(e.to_string(), "authentication failed: timed out");
    }

    #[test]
    fn error_display_tls() {
        let e = Error::Tls("handshake failure".into());
        assert_eq!(e.to_string(), "TLS error: handshake failure");
    }

    #[test]
    fn error_display_unit_variants() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
        assert_eq!(Error::NotConnected.to_string(), "not connected");
        assert_eq!(Error::AlreadyConnected.to_string(), "already connected");
        assert_eq!(Error::ConnectionLost.to_string(), "connection lost");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
