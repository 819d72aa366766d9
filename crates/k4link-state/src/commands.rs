//! K4 CAT command builders and mode code mapping.
//!
//! Builders return the complete command text including the `;` terminator,
//! ready to hand to the connection's `send_cat`. Values are given in natural
//! units (hertz, words per minute, dB) and converted to the radio's units
//! here, so the optimistic update in the model and the command on the wire
//! always agree.

use k4link_core::{Mode, ReceiverId};
use k4link_protocol::cat::encode_command;

// ---------------------------------------------------------------
// Mode code mapping
// ---------------------------------------------------------------

/// Map a K4 `MD` digit to a [`Mode`].
///
/// Codes the radio does not define (0 and 8) fall back to USB.
pub fn mode_from_cat(code: u8) -> Mode {
    match code {
        1 => Mode::Lsb,
        2 => Mode::Usb,
        3 => Mode::Cw,
        4 => Mode::Fm,
        5 => Mode::Am,
        6 => Mode::Data,
        7 => Mode::CwR,
        9 => Mode::DataR,
        _ => Mode::Usb,
    }
}

/// Map a [`Mode`] to its K4 `MD` digit.
pub fn mode_to_cat(mode: Mode) -> u8 {
    match mode {
        Mode::Lsb => 1,
        Mode::Usb => 2,
        Mode::Cw => 3,
        Mode::Fm => 4,
        Mode::Am => 5,
        Mode::Data => 6,
        Mode::CwR => 7,
        Mode::DataR => 9,
    }
}

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// `FA`/`FB` with an 11-digit frequency in hertz.
pub fn cmd_set_frequency(rx: ReceiverId, freq_hz: u64) -> String {
    let prefix = if rx.is_sub() { "FB" } else { "FA" };
    encode_command(prefix, &format!("{freq_hz:011}"))
}

/// `MD`/`MD$` with the mode digit.
pub fn cmd_set_mode(rx: ReceiverId, mode: Mode) -> String {
    let prefix = format!("MD{}", rx.cat_suffix());
    encode_command(&prefix, &mode_to_cat(mode).to_string())
}

/// `BW`/`BW$`. The radio takes bandwidth in 10 Hz units, so the value is
/// rounded down to a multiple of 10 Hz.
pub fn cmd_set_filter_bandwidth(rx: ReceiverId, bandwidth_hz: u32) -> String {
    let prefix = format!("BW{}", rx.cat_suffix());
    encode_command(&prefix, &format!("{:04}", bandwidth_hz / 10))
}

/// `KS` keyer speed in words per minute.
pub fn cmd_set_keyer_speed(wpm: u32) -> String {
    encode_command("KS", &format!("{wpm:03}"))
}

/// `#SPN`/`#SPN$` panadapter span in hertz.
pub fn cmd_set_span(rx: ReceiverId, span_hz: u32) -> String {
    let prefix = format!("#SPN{}", rx.cat_suffix());
    encode_command(&prefix, &span_hz.to_string())
}

/// `#REF`/`#REF$` panadapter reference level in dB.
pub fn cmd_set_ref_level(rx: ReceiverId, ref_level_db: i32) -> String {
    let prefix = format!("#REF{}", rx.cat_suffix());
    encode_command(&prefix, &ref_level_db.to_string())
}

/// `FT1;` / `FT0;`.
pub fn cmd_set_split(on: bool) -> String {
    encode_command("FT", if on { "1" } else { "0" })
}

/// `TX;` keys the transmitter, `RX;` returns to receive.
pub fn cmd_set_transmit(on: bool) -> String {
    encode_command(if on { "TX" } else { "RX" }, "")
}

/// Query a command's current value (`<prefix>;`).
pub fn cmd_query(prefix: &str) -> String {
    encode_command(prefix, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_codes_round_trip() {
        for code in [1u8, 2, 3, 4, 5, 6, 7, 9] {
            assert_eq!(mode_to_cat(mode_from_cat(code)), code);
        }
    }

    #[test]
    fn unmapped_mode_codes_default_to_usb() {
        assert_eq!(mode_from_cat(0), Mode::Usb);
        assert_eq!(mode_from_cat(8), Mode::Usb);
    }

    #[test]
    fn frequency_command() {
        assert_eq!(
            cmd_set_frequency(ReceiverId::VFO_A, 14_074_000),
            "FA00014074000;"
        );
        assert_eq!(
            cmd_set_frequency(ReceiverId::VFO_B, 7_030_000),
            "FB00007030000;"
        );
    }

    #[test]
    fn sub_receiver_suffix() {
        assert_eq!(cmd_set_mode(ReceiverId::VFO_B, Mode::CwR), "MD$7;");
        assert_eq!(cmd_set_filter_bandwidth(ReceiverId::VFO_B, 2405), "BW$0240;");
        assert_eq!(cmd_set_span(ReceiverId::VFO_B, 24_000), "#SPN$24000;");
        assert_eq!(cmd_set_ref_level(ReceiverId::VFO_A, -110), "#REF-110;");
    }

    #[test]
    fn transmit_and_split() {
        assert_eq!(cmd_set_keyer_speed(28), "KS028;");
        assert_eq!(cmd_set_split(true), "FT1;");
        assert_eq!(cmd_set_transmit(true), "TX;");
        assert_eq!(cmd_set_transmit(false), "RX;");
        assert_eq!(cmd_query("OM"), "OM;");
    }
}
