//! k4link-state: CAT-driven radio state for the Elecraft K4.
//!
//! [`RadioStateModel`] consumes CAT lines in arrival order and keeps a
//! typed [`RadioState`]. Each field that takes a new value is reported as a
//! [`FieldChange`] (returned from `apply` and published to subscribers);
//! identical values are silent and unknown commands are ignored.
//!
//! The [`commands`] module holds the matching CAT command builders, so a
//! caller can send a command and apply the same value optimistically.

pub mod change;
pub mod commands;
mod dispatch;
pub mod model;
pub mod state;

pub use change::{Field, FieldChange, FieldValue, ModelEvent};
pub use model::RadioStateModel;
pub use state::{AgcSpeed, OptionModules, RadioState, ReceiverState};
