//! # k4link -- Remote control of the Elecraft K4
//!
//! `k4link` is an asynchronous Rust library for the K4's native remote
//! protocol: framed packets over TCP (port 9205, SHA-384 password) or
//! TLS-PSK (port 9204). It decodes CAT text, Opus/PCM audio and panadapter
//! lines, and keeps a typed cache of everything the radio reports.
//!
//! ## Quick Start
//!
//! ```no_run
//! use k4link::{K4RadioBuilder, Mode, ReceiverId};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let radio = K4RadioBuilder::new("192.168.1.50")
//!         .password("hunter2")
//!         .connect()
//!         .await?;
//!
//!     radio.set_mode(ReceiverId::VFO_A, Mode::Cw).await?;
//!     let state = radio.state().await;
//!     println!("VFO-A: {:?} Hz", state.main.frequency_hz);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                         |
//! |-----------------------|-------------------------------------------------|
//! | `k4link-core`         | Types, errors, connection events                |
//! | `k4link-protocol`     | Packet framing and payload codec                |
//! | `k4link-state`        | CAT dispatcher and the radio state model        |
//! | `k4link-client`       | Connection manager and [`K4Radio`] session      |
//! | **`k4link`**          | This facade crate -- re-exports everything      |
//!
//! The codec and the state model do no I/O; they can be driven from a
//! capture file or a test just as well as from a live socket.
//!
//! ## Feature Flags
//!
//! | Feature  | Enables                                   | Default |
//! |----------|-------------------------------------------|---------|
//! | `client` | [`client`] module (tokio networking)      | yes     |
//! | `tls`    | TLS-PSK transport via OpenSSL             | no      |
//! | `full`   | Everything                                | no      |
//!
//! ## Watching the radio
//!
//! ```no_run
//! use k4link::ModelEvent;
//! # async fn example(radio: &k4link::K4Radio) {
//! let mut events = radio.subscribe_state().await;
//! while let Ok(event) = events.recv().await {
//!     if let ModelEvent::FieldChanged(change) = event {
//!         println!("{:?} = {:?}", change.field, change.value);
//!     }
//! }
//! # }
//! ```

pub use k4link_core::*;

pub use k4link_state::{
    AgcSpeed, Field, FieldChange, FieldValue, ModelEvent, OptionModules, RadioState,
    RadioStateModel, ReceiverState,
};

/// Packet framing and payload codec.
///
/// [`PacketFramer`](protocol::PacketFramer) splits a byte stream into
/// [`Packet`](protocol::Packet)s; the `build_*` functions produce frames.
pub mod protocol {
    pub use k4link_protocol::*;
}

/// CAT dispatcher, command builders and the radio state model.
pub mod state {
    pub use k4link_state::*;
}

/// Network session.
///
/// Provides [`ConnectionManager`](client::ConnectionManager) for raw
/// packet access and [`K4Radio`](client::K4Radio) for a session backed by
/// the state model.
#[cfg(feature = "client")]
pub mod client {
    pub use k4link_client::*;
}

#[cfg(feature = "client")]
pub use k4link_client::{ConnectionBuilder, K4Radio, K4RadioBuilder};
