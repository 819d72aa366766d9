//! Packet codec for the Elecraft K4 remote protocol.
//!
//! - **Packets** ([`packet`]) -- the [`Packet`] value types and the
//!   `build_*` encoders that mirror the decoder field for field.
//! - **Framer** ([`framer`]) -- [`PacketFramer`] turns arbitrarily
//!   fragmented socket reads into whole packets, resynchronizing on the
//!   next start marker after corruption.
//! - **CAT text** ([`cat`]) -- command encoding and splitting of
//!   `;`-terminated CAT text.
//!
//! Nothing here performs I/O or returns errors: corrupt or truncated input
//! is dropped with a `tracing` diagnostic.

pub mod cat;
pub mod framer;
pub mod packet;

pub use framer::{MAX_BUFFER_SIZE, PacketFramer};
pub use packet::{
    AudioFrame, MiniSpectrumFrame, Packet, PacketType, SpectrumFrame, build_audio_packet,
    build_cat_packet, build_mini_spectrum_packet, build_packet, build_spectrum_packet,
    decode_payload,
};
