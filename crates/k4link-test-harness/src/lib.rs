//! k4link-test-harness: a scripted mock K4 for testing clients without a
//! radio on the network.
//!
//! [`MockK4Server`] speaks the framed protocol on a random localhost port
//! and returns a [`MockReport`] of everything the client sent.

pub mod mock_k4;

pub use mock_k4::{MockK4Server, MockReport};
