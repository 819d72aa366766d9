//! Reassembly of framed packets from a TCP byte stream.
//!
//! [`PacketFramer`] keeps one growable buffer across calls, so a frame may
//! be split at any byte boundary, including inside a marker or the length
//! field. Corrupt framing is recovered locally by rescanning for the next
//! start marker; the caller only ever sees fully decoded packets.

use bytes::{Buf, BytesMut};

use crate::packet::{END_MARKER, FRAME_HEADER_LEN, Packet, START_MARKER, decode_payload};

/// Hard ceiling on buffered bytes without a complete frame.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Initial buffer capacity.
const INITIAL_CAPACITY: usize = 16 * 1024;

/// Incremental decoder for the framed K4 byte stream.
///
/// # Example
///
/// ```
/// use k4link_protocol::{Packet, PacketFramer, build_cat_packet};
///
/// let frame = build_cat_packet("FA00014074000;");
/// let mut framer = PacketFramer::new();
///
/// assert!(framer.feed(&frame[..5]).is_empty());
/// let packets = framer.feed(&frame[5..]);
/// assert_eq!(packets, vec![Packet::Cat("FA00014074000;".into())]);
/// ```
#[derive(Debug)]
pub struct PacketFramer {
    buffer: BytesMut,
}

impl PacketFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        PacketFramer {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append `data` and return every packet that is now complete, in
    /// stream order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Packet> {
        self.buffer.extend_from_slice(data);
        let mut packets = Vec::new();

        loop {
            let Some(start) = find_start_marker(&self.buffer) else {
                // A marker may be forming across the next read.
                let keep = self.buffer.len().min(START_MARKER.len() - 1);
                let discard = self.buffer.len() - keep;
                if discard > 0 {
                    tracing::trace!(discarded = discard, "No start marker, discarding bytes");
                    self.buffer.advance(discard);
                }
                break;
            };

            if start > 0 {
                tracing::debug!(discarded = start, "Resynchronizing on start marker");
                self.buffer.advance(start);
            }

            if self.buffer.len() < FRAME_HEADER_LEN {
                break;
            }

            let length = u32::from_be_bytes([
                self.buffer[4],
                self.buffer[5],
                self.buffer[6],
                self.buffer[7],
            ]) as usize;
            let total = FRAME_HEADER_LEN
                .saturating_add(length)
                .saturating_add(END_MARKER.len());

            if self.buffer.len() < total {
                break;
            }

            if self.buffer[total - END_MARKER.len()..total] != END_MARKER {
                tracing::warn!(length, "Bad end marker, skipping start marker");
                self.buffer.advance(START_MARKER.len());
                continue;
            }

            let frame = self.buffer.split_to(total);
            let payload = &frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + length];
            if let Some(packet) = decode_payload(payload) {
                tracing::trace!(packet_type = ?packet.packet_type(), length, "Decoded packet");
                packets.push(packet);
            }
        }

        if self.buffer.len() > MAX_BUFFER_SIZE {
            tracing::warn!(
                buffered = self.buffer.len(),
                limit = MAX_BUFFER_SIZE,
                "No complete packet within buffer limit, clearing"
            );
            self.buffer.clear();
        }

        packets
    }

    /// Discard everything buffered.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Bytes currently held waiting for the rest of a frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

fn find_start_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(START_MARKER.len())
        .position(|window| window == START_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{
        AudioFrame, ENCODE_OPUS, MiniSpectrumFrame, SpectrumFrame, build_audio_packet,
        build_cat_packet, build_packet,
    };

    fn all_packets() -> Vec<Packet> {
        vec![
            Packet::Cat("FA00014074000;MD2;".into()),
            Packet::Audio(AudioFrame {
                version: 1,
                sequence: 200,
                encode_mode: ENCODE_OPUS,
                frame_size: 480,
                sample_rate_code: 1,
                data: vec![0x11, 0x22, 0x33, 0x44],
            }),
            Packet::Spectrum(SpectrumFrame {
                version: 1,
                sequence: 3,
                receiver: 0,
                center_freq_hz: 7_030_000,
                sample_rate_tier: 1,
                noise_floor_db: -121.0,
                bins: (0u8..=255).collect(),
            }),
            Packet::MiniSpectrum(MiniSpectrumFrame {
                version: 1,
                sequence: 4,
                receiver: 1,
                bins: vec![1, 2, 3, 4, 5],
            }),
        ]
    }

    #[test]
    fn round_trip_every_packet_type() {
        let mut framer = PacketFramer::new();
        for packet in all_packets() {
            let frame = build_packet(&packet.encode());
            assert_eq!(framer.feed(&frame), vec![packet]);
        }
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn reassembles_split_at_every_offset() {
        let frame = build_cat_packet("BW$0050;");
        let expected = vec![Packet::Cat("BW$0050;".into())];

        for split in 0..=frame.len() {
            let mut framer = PacketFramer::new();
            let mut packets = framer.feed(&frame[..split]);
            packets.extend(framer.feed(&frame[split..]));
            assert_eq!(packets, expected, "split at {split}");
        }
    }

    #[test]
    fn reassembles_byte_by_byte() {
        let frame = build_audio_packet(&[9, 8, 7, 6], 12, ENCODE_OPUS);
        let mut framer = PacketFramer::new();
        let mut packets = Vec::new();
        for byte in &frame {
            packets.extend(framer.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_type(), crate::PacketType::Audio);
    }

    #[test]
    fn multiple_packets_in_one_read() {
        let mut bytes = build_cat_packet("FA00007030000;");
        bytes.extend(build_cat_packet("MD3;"));
        bytes.extend(build_cat_packet("KS025;"));

        let mut framer = PacketFramer::new();
        let packets = framer.feed(&bytes);
        assert_eq!(
            packets,
            vec![
                Packet::Cat("FA00007030000;".into()),
                Packet::Cat("MD3;".into()),
                Packet::Cat("KS025;".into()),
            ]
        );
    }

    #[test]
    fn garbage_before_marker_is_discarded() {
        let mut bytes = vec![0x01, 0x02, 0xFE, 0xFD, 0x99];
        bytes.extend(build_cat_packet("TQ0;"));
        let mut framer = PacketFramer::new();
        assert_eq!(framer.feed(&bytes), vec![Packet::Cat("TQ0;".into())]);
    }

    #[test]
    fn corrupt_end_marker_resynchronizes_to_next_packet() {
        let mut corrupt = build_cat_packet("FA00014000000;");
        let len = corrupt.len();
        corrupt[len - 1] = 0x00;

        let mut bytes = corrupt;
        bytes.extend(build_cat_packet("FB00007000000;"));

        let mut framer = PacketFramer::new();
        let packets = framer.feed(&bytes);
        assert_eq!(packets, vec![Packet::Cat("FB00007000000;".into())]);
    }

    #[test]
    fn corrupt_packet_then_valid_packet_in_separate_reads() {
        let mut corrupt = build_cat_packet("MD2;");
        let len = corrupt.len();
        corrupt[len - 2] = 0x55;

        let mut framer = PacketFramer::new();
        assert!(framer.feed(&corrupt).is_empty());
        assert_eq!(
            framer.feed(&build_cat_packet("MD3;")),
            vec![Packet::Cat("MD3;".into())]
        );
    }

    #[test]
    fn split_start_marker_is_retained() {
        let frame = build_cat_packet("SM0012;");
        let mut framer = PacketFramer::new();

        let mut first = vec![0x42; 100];
        first.extend_from_slice(&frame[..3]);
        assert!(framer.feed(&first).is_empty());
        assert_eq!(framer.buffered_len(), 3);

        assert_eq!(framer.feed(&frame[3..]), vec![Packet::Cat("SM0012;".into())]);
    }

    #[test]
    fn unknown_type_is_dropped_without_losing_sync() {
        let mut bytes = build_packet(&[0x09, 1, 2, 3, 4]);
        bytes.extend(build_cat_packet("ID017;"));
        let mut framer = PacketFramer::new();
        assert_eq!(framer.feed(&bytes), vec![Packet::Cat("ID017;".into())]);
    }

    #[test]
    fn truncated_payload_is_dropped() {
        let mut bytes = build_packet(&[0x00, 0x00, 0x00]);
        bytes.extend(build_packet(&[0x01, 1, 2, 3]));
        bytes.extend(build_cat_packet("RT1;"));
        let mut framer = PacketFramer::new();
        assert_eq!(framer.feed(&bytes), vec![Packet::Cat("RT1;".into())]);
    }

    #[test]
    fn unmatched_garbage_never_grows_buffer() {
        let mut framer = PacketFramer::new();
        let garbage = vec![0xAA; MAX_BUFFER_SIZE + 4096];
        assert!(framer.feed(&garbage).is_empty());
        assert!(framer.buffered_len() <= 3);

        assert_eq!(
            framer.feed(&build_cat_packet("FT1;")),
            vec![Packet::Cat("FT1;".into())]
        );
    }

    #[test]
    fn overflow_clears_buffer_and_recovers() {
        let mut framer = PacketFramer::new();

        // A start marker promising a frame larger than the ceiling.
        let mut header = START_MARKER.to_vec();
        header.extend_from_slice(&0x7FFF_FFFFu32.to_be_bytes());
        assert!(framer.feed(&header).is_empty());

        let filler = vec![0x00; MAX_BUFFER_SIZE];
        assert!(framer.feed(&filler).is_empty());
        assert_eq!(framer.buffered_len(), 0);

        assert_eq!(
            framer.feed(&build_cat_packet("MD1;")),
            vec![Packet::Cat("MD1;".into())]
        );
    }

    #[test]
    fn reset_discards_partial_frame() {
        let frame = build_cat_packet("FA00014074000;");
        let mut framer = PacketFramer::new();
        assert!(framer.feed(&frame[..10]).is_empty());
        framer.reset();
        assert_eq!(framer.buffered_len(), 0);
        assert!(framer.feed(&frame[10..]).is_empty());
    }
}
