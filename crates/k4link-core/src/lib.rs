//! k4link-core: shared types, errors and events for k4link.
//!
//! The packet codec, the radio state model and the connection manager all
//! build on these definitions without depending on each other.
//!
//! # Key types
//!
//! - [`ReceiverId`], [`Mode`], [`ModeClass`] -- radio vocabulary
//! - [`ConnectionState`] / [`ConnectionEvent`] -- connection lifecycle
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod helpers;
pub mod types;

pub use error::{Error, Result};
pub use events::ConnectionEvent;
pub use helpers::{format_freq_mhz, format_s_units, s_units_from_bars};
pub use types::*;
