//! Connection lifecycle events.
//!
//! Events are emitted by the connection manager through a
//! [`tokio::sync::broadcast`] channel. Decoded packets travel separately on
//! an ordered channel so that slow lifecycle subscribers never reorder or
//! drop radio data.

use crate::types::ConnectionState;

/// An event emitted by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The lifecycle state changed.
    StateChanged {
        /// The new state.
        state: ConnectionState,
    },

    /// The radio could not be reached or did not accept our credentials.
    ///
    /// Fired at most once per connection attempt, always before the
    /// transition back to `Disconnected`.
    AuthenticationFailed {
        /// Human-readable cause (timeout, peer closed, handshake error).
        reason: String,
    },

    /// A socket error after the channel was established.
    ErrorOccurred {
        /// The underlying error string.
        message: String,
    },
}
