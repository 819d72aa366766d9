//! Packet value types and their wire encoding.
//!
//! Every packet on the K4 remote link is framed as:
//!
//! ```text
//! [FE FD FC FB] [length: u32 BE] [payload: length bytes] [FB FC FD FE]
//! ```
//!
//! The first payload byte is the type tag. Multi-byte fields inside the
//! payload are little-endian; only the outer length is big-endian.
//!
//! | Tag  | Type         | Header                                                     |
//! |------|--------------|------------------------------------------------------------|
//! | 0x00 | CAT          | `[0x00][0x00][0x00]` then ASCII                             |
//! | 0x01 | Audio        | `[0x01][ver][seq][mode][frame_size:u16][rate]` then data    |
//! | 0x02 | Spectrum     | `[0x02][ver][seq][rx][center:i64][tier:i32][noise:i32]`     |
//! | 0x03 | MiniSpectrum | `[0x03][ver][seq][rx]` then bins                            |

use bytes::{BufMut, BytesMut};

/// Frame start marker.
pub const START_MARKER: [u8; 4] = [0xFE, 0xFD, 0xFC, 0xFB];

/// Frame end marker.
pub const END_MARKER: [u8; 4] = [0xFB, 0xFC, 0xFD, 0xFE];

/// Start marker plus the big-endian length field.
pub const FRAME_HEADER_LEN: usize = 8;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_LEN + END_MARKER.len();

/// CAT payload header: type tag and two reserved bytes.
pub const CAT_HEADER_LEN: usize = 3;

/// Audio payload header length.
pub const AUDIO_HEADER_LEN: usize = 7;

/// Full spectrum payload header length.
pub const SPECTRUM_HEADER_LEN: usize = 20;

/// Mini spectrum payload header length.
pub const MINI_SPECTRUM_HEADER_LEN: usize = 4;

/// Audio header version written by [`build_audio_packet`].
pub const AUDIO_VERSION: u8 = 0x01;

/// Samples per audio frame written by [`build_audio_packet`].
pub const DEFAULT_AUDIO_FRAME_SIZE: u16 = 240;

/// Sample-rate code written by [`build_audio_packet`].
pub const DEFAULT_SAMPLE_RATE_CODE: u8 = 0x00;

/// Audio encode mode: raw 32-bit float PCM.
pub const ENCODE_RAW_F32: u8 = 0x00;

/// Audio encode mode: raw 16-bit signed PCM.
pub const ENCODE_RAW_S16: u8 = 0x01;

/// Audio encode mode: Opus.
pub const ENCODE_OPUS: u8 = 0x02;

/// Offset subtracted from a full-spectrum bin byte to give dB.
const SPECTRUM_BIN_OFFSET_DB: i16 = 160;

/// Offset subtracted from a scaled mini-spectrum bin to give dB.
const MINI_SPECTRUM_BIN_OFFSET_DB: i16 = 160;

/// Scale applied to a mini-spectrum bin byte before the offset.
const MINI_SPECTRUM_BIN_SCALE: i16 = 10;

/// Payload type, identified by the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// CAT command text.
    Cat,
    /// Encoded audio.
    Audio,
    /// Full-resolution panadapter data.
    Spectrum,
    /// Coarse panadapter data for the mini-pan display.
    MiniSpectrum,
}

impl PacketType {
    /// Map a type tag to a packet type.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(PacketType::Cat),
            0x01 => Some(PacketType::Audio),
            0x02 => Some(PacketType::Spectrum),
            0x03 => Some(PacketType::MiniSpectrum),
            _ => None,
        }
    }

    /// The wire tag for this packet type.
    pub fn tag(&self) -> u8 {
        match self {
            PacketType::Cat => 0x00,
            PacketType::Audio => 0x01,
            PacketType::Spectrum => 0x02,
            PacketType::MiniSpectrum => 0x03,
        }
    }
}

/// One audio frame as carried by an audio packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Header version byte.
    pub version: u8,
    /// Rolling 8-bit sequence number.
    pub sequence: u8,
    /// Encoding of `data` (see the `ENCODE_*` constants).
    pub encode_mode: u8,
    /// Samples per channel in this frame.
    pub frame_size: u16,
    /// Sample-rate code as sent by the radio.
    pub sample_rate_code: u8,
    /// Encoded audio bytes (Opus or PCM).
    pub data: Vec<u8>,
}

/// One full-resolution panadapter line.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Header version byte.
    pub version: u8,
    /// Rolling 8-bit sequence number.
    pub sequence: u8,
    /// Receiver the line belongs to (0 main, 1 sub).
    pub receiver: u8,
    /// Center frequency of the line in hertz.
    pub center_freq_hz: i64,
    /// Sample-rate tier, which fixes the displayed span.
    pub sample_rate_tier: i32,
    /// Noise floor in dB (wire value is dB x 10).
    pub noise_floor_db: f32,
    /// Compressed bins, one byte each.
    pub bins: Vec<u8>,
}

impl SpectrumFrame {
    /// Decompress the bins to dB (`byte - 160`).
    pub fn bins_db(&self) -> Vec<f32> {
        self.bins
            .iter()
            .map(|&b| (b as i16 - SPECTRUM_BIN_OFFSET_DB) as f32)
            .collect()
    }

    /// The displayed span for this line's sample-rate tier.
    ///
    /// Tiers 0 through 5 double from 6 kHz up to 192 kHz.
    pub fn span_hz(&self) -> Option<u32> {
        match self.sample_rate_tier {
            tier @ 0..=5 => Some(6_000 << tier),
            _ => None,
        }
    }
}

/// One coarse panadapter line for the mini-pan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiniSpectrumFrame {
    /// Header version byte.
    pub version: u8,
    /// Rolling 8-bit sequence number.
    pub sequence: u8,
    /// Receiver the line belongs to (0 main, 1 sub).
    pub receiver: u8,
    /// Compressed bins, one byte each.
    pub bins: Vec<u8>,
}

impl MiniSpectrumFrame {
    /// Decompress the bins to dB (`byte * 10 - 160`).
    ///
    /// Kept separate from [`SpectrumFrame::bins_db`]: the two compressions
    /// use different constants.
    pub fn bins_db(&self) -> Vec<f32> {
        self.bins
            .iter()
            .map(|&b| (b as i16 * MINI_SPECTRUM_BIN_SCALE - MINI_SPECTRUM_BIN_OFFSET_DB) as f32)
            .collect()
    }
}

/// A decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// CAT text, possibly several `;`-terminated commands.
    Cat(String),
    /// Audio frame.
    Audio(AudioFrame),
    /// Full panadapter line.
    Spectrum(SpectrumFrame),
    /// Mini panadapter line.
    MiniSpectrum(MiniSpectrumFrame),
}

impl Packet {
    /// The payload type of this packet.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Cat(_) => PacketType::Cat,
            Packet::Audio(_) => PacketType::Audio,
            Packet::Spectrum(_) => PacketType::Spectrum,
            Packet::MiniSpectrum(_) => PacketType::MiniSpectrum,
        }
    }

    /// Encode this packet's payload (unframed).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::Cat(text) => encode_cat_payload(text),
            Packet::Audio(frame) => encode_audio_payload(frame),
            Packet::Spectrum(frame) => encode_spectrum_payload(frame),
            Packet::MiniSpectrum(frame) => encode_mini_spectrum_payload(frame),
        }
    }
}

// ---------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------

/// Decode a payload (the bytes between the length field and the end
/// marker).
///
/// Returns `None` for unknown type tags and for payloads too short for
/// their header; neither is treated as an error.
pub fn decode_payload(payload: &[u8]) -> Option<Packet> {
    let tag = *payload.first()?;
    let packet_type = match PacketType::from_tag(tag) {
        Some(t) => t,
        None => {
            tracing::debug!(tag, len = payload.len(), "Dropping payload with unknown type");
            return None;
        }
    };

    let packet = match packet_type {
        PacketType::Cat => decode_cat(payload),
        PacketType::Audio => decode_audio(payload),
        PacketType::Spectrum => decode_spectrum(payload),
        PacketType::MiniSpectrum => decode_mini_spectrum(payload),
    };

    if packet.is_none() {
        tracing::trace!(
            ?packet_type,
            len = payload.len(),
            "Dropping payload shorter than its header"
        );
    }
    packet
}

fn decode_cat(payload: &[u8]) -> Option<Packet> {
    if payload.len() <= CAT_HEADER_LEN {
        return None;
    }
    let text = String::from_utf8_lossy(&payload[CAT_HEADER_LEN..]).into_owned();
    Some(Packet::Cat(text))
}

fn decode_audio(payload: &[u8]) -> Option<Packet> {
    if payload.len() <= AUDIO_HEADER_LEN {
        return None;
    }
    Some(Packet::Audio(AudioFrame {
        version: payload[1],
        sequence: payload[2],
        encode_mode: payload[3],
        frame_size: u16::from_le_bytes([payload[4], payload[5]]),
        sample_rate_code: payload[6],
        data: payload[AUDIO_HEADER_LEN..].to_vec(),
    }))
}

fn decode_spectrum(payload: &[u8]) -> Option<Packet> {
    if payload.len() < SPECTRUM_HEADER_LEN {
        return None;
    }
    let center_freq_hz = i64::from_le_bytes(payload[4..12].try_into().ok()?);
    let sample_rate_tier = i32::from_le_bytes(payload[12..16].try_into().ok()?);
    let noise_raw = i32::from_le_bytes(payload[16..20].try_into().ok()?);

    Some(Packet::Spectrum(SpectrumFrame {
        version: payload[1],
        sequence: payload[2],
        receiver: payload[3],
        center_freq_hz,
        sample_rate_tier,
        noise_floor_db: noise_raw as f32 / 10.0,
        bins: payload[SPECTRUM_HEADER_LEN..].to_vec(),
    }))
}

fn decode_mini_spectrum(payload: &[u8]) -> Option<Packet> {
    if payload.len() < MINI_SPECTRUM_HEADER_LEN {
        return None;
    }
    Some(Packet::MiniSpectrum(MiniSpectrumFrame {
        version: payload[1],
        sequence: payload[2],
        receiver: payload[3],
        bins: payload[MINI_SPECTRUM_HEADER_LEN..].to_vec(),
    }))
}

// ---------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------

/// Wrap a payload in start marker, big-endian length and end marker.
///
/// # Example
///
/// ```
/// use k4link_protocol::packet::build_packet;
///
/// let frame = build_packet(&[0x00, 0x00, 0x00, b'M', b'D', b'3']);
/// assert_eq!(&frame[..4], &[0xFE, 0xFD, 0xFC, 0xFB]);
/// assert_eq!(&frame[4..8], &[0x00, 0x00, 0x00, 0x06]);
/// assert_eq!(&frame[frame.len() - 4..], &[0xFB, 0xFC, 0xFD, 0xFE]);
/// ```
pub fn build_packet(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
    buf.put_slice(&START_MARKER);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.put_slice(&END_MARKER);
    buf.to_vec()
}

/// Build a framed CAT packet carrying `cmd` verbatim.
pub fn build_cat_packet(cmd: &str) -> Vec<u8> {
    build_packet(&encode_cat_payload(cmd))
}

/// Build a framed audio packet with the default header fields.
pub fn build_audio_packet(data: &[u8], sequence: u8, encode_mode: u8) -> Vec<u8> {
    build_packet(&encode_audio_payload(&AudioFrame {
        version: AUDIO_VERSION,
        sequence,
        encode_mode,
        frame_size: DEFAULT_AUDIO_FRAME_SIZE,
        sample_rate_code: DEFAULT_SAMPLE_RATE_CODE,
        data: data.to_vec(),
    }))
}

/// Build a framed full-spectrum packet.
pub fn build_spectrum_packet(frame: &SpectrumFrame) -> Vec<u8> {
    build_packet(&encode_spectrum_payload(frame))
}

/// Build a framed mini-spectrum packet.
pub fn build_mini_spectrum_packet(frame: &MiniSpectrumFrame) -> Vec<u8> {
    build_packet(&encode_mini_spectrum_payload(frame))
}

fn encode_cat_payload(text: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(CAT_HEADER_LEN + text.len());
    buf.put_u8(PacketType::Cat.tag());
    buf.put_u8(0x00);
    buf.put_u8(0x00);
    buf.put_slice(text.as_bytes());
    buf.to_vec()
}

fn encode_audio_payload(frame: &AudioFrame) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(AUDIO_HEADER_LEN + frame.data.len());
    buf.put_u8(PacketType::Audio.tag());
    buf.put_u8(frame.version);
    buf.put_u8(frame.sequence);
    buf.put_u8(frame.encode_mode);
    buf.put_u16_le(frame.frame_size);
    buf.put_u8(frame.sample_rate_code);
    buf.put_slice(&frame.data);
    buf.to_vec()
}

fn encode_spectrum_payload(frame: &SpectrumFrame) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(SPECTRUM_HEADER_LEN + frame.bins.len());
    buf.put_u8(PacketType::Spectrum.tag());
    buf.put_u8(frame.version);
    buf.put_u8(frame.sequence);
    buf.put_u8(frame.receiver);
    buf.put_i64_le(frame.center_freq_hz);
    buf.put_i32_le(frame.sample_rate_tier);
    buf.put_i32_le((frame.noise_floor_db * 10.0).round() as i32);
    buf.put_slice(&frame.bins);
    buf.to_vec()
}

fn encode_mini_spectrum_payload(frame: &MiniSpectrumFrame) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(MINI_SPECTRUM_HEADER_LEN + frame.bins.len());
    buf.put_u8(PacketType::MiniSpectrum.tag());
    buf.put_u8(frame.version);
    buf.put_u8(frame.sequence);
    buf.put_u8(frame.receiver);
    buf.put_slice(&frame.bins);
    buf.to_vec()
}
