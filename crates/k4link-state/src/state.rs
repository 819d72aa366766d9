//! Snapshot of transceiver state.
//!
//! Every field starts as `None`, meaning the radio has not reported it yet.
//! The first real value therefore always differs from what is stored and
//! always notifies.

use std::collections::BTreeMap;
use std::fmt;

use k4link_core::{Mode, ModeClass, ReceiverId};

/// AGC time constant (`GT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgcSpeed {
    Off,
    Slow,
    Fast,
}

impl AgcSpeed {
    /// Decode the `GT` digit.
    pub fn from_cat(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(AgcSpeed::Off),
            1 => Some(AgcSpeed::Slow),
            2 => Some(AgcSpeed::Fast),
            _ => None,
        }
    }

    /// Encode as the `GT` digit.
    pub fn to_cat(&self) -> u8 {
        match self {
            AgcSpeed::Off => 0,
            AgcSpeed::Slow => 1,
            AgcSpeed::Fast => 2,
        }
    }
}

impl fmt::Display for AgcSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgcSpeed::Off => write!(f, "AGC-OFF"),
            AgcSpeed::Slow => write!(f, "AGC-S"),
            AgcSpeed::Fast => write!(f, "AGC-F"),
        }
    }
}

/// Installed option modules, decoded from the `OM` response.
///
/// The radio reports one character per option slot: a letter when the
/// option is installed and `-` when it is not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionModules {
    /// The raw option string as sent by the radio.
    pub raw: String,
    /// Internal automatic antenna tuner (`A`).
    pub atu: bool,
    /// 100 W power amplifier (`P`).
    pub power_amplifier: bool,
    /// Second receiver (`S`).
    pub sub_receiver: bool,
    /// High-dynamic-range receive module (`H`).
    pub hdr_module: bool,
    /// Transverter interface (`X`).
    pub transverter: bool,
    /// Diversity-capable second receiver (`D`).
    pub diversity: bool,
}

impl OptionModules {
    /// Decode an `OM` option string.
    pub fn decode(raw: &str) -> Self {
        let raw = raw.trim();
        let has = |c: char| raw.contains(c);
        OptionModules {
            raw: raw.to_string(),
            atu: has('A'),
            power_amplifier: has('P'),
            sub_receiver: has('S'),
            hdr_module: has('H'),
            transverter: has('X'),
            diversity: has('D'),
        }
    }
}

/// State of one receiver (main or sub).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverState {
    pub frequency_hz: Option<u64>,
    pub mode: Option<Mode>,
    /// Filter bandwidth in hertz.
    pub filter_bandwidth_hz: Option<i32>,
    /// IF shift in hertz.
    pub if_shift_hz: Option<i32>,
    /// S-meter reading in S-units (above 9 is S9 plus tenths).
    pub s_meter: Option<f32>,
    pub agc_speed: Option<AgcSpeed>,
    pub preamp: Option<i32>,
    pub attenuator_db: Option<i32>,
    pub attenuator_on: Option<bool>,
    pub noise_blanker_level: Option<i32>,
    pub noise_blanker_on: Option<bool>,
    pub noise_blanker_filter: Option<i32>,
    pub noise_reduction_level: Option<i32>,
    pub noise_reduction_on: Option<bool>,
    pub auto_notch: Option<bool>,
    pub auto_notch_speed: Option<i32>,
    pub manual_notch_pitch_hz: Option<i32>,
    pub manual_notch_on: Option<bool>,
    pub data_sub_mode: Option<i32>,
    pub af_gain: Option<i32>,
    pub rf_gain: Option<i32>,
    pub squelch: Option<i32>,
    pub rx_antenna: Option<i32>,
    /// Panadapter reference level in dB.
    pub ref_level_db: Option<i32>,
    /// Panadapter span in hertz.
    pub span_hz: Option<i32>,
    /// Panadapter cursor mode for this VFO.
    pub cursor_mode: Option<i32>,
}

/// Complete cached state of the radio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadioState {
    /// VFO A / main receiver.
    pub main: ReceiverState,
    /// VFO B / sub receiver.
    pub sub: ReceiverState,

    /// Transmit power in watts.
    pub power_watts: Option<f32>,
    /// `true` when the power setting is in the QRP (tenths of a watt) range.
    pub qrp: Option<bool>,
    pub transmitting: Option<bool>,
    pub split: Option<bool>,
    pub alc: Option<i32>,
    pub compression_db: Option<i32>,
    /// Forward power meter in watts.
    pub forward_power_w: Option<f32>,
    pub swr: Option<f32>,
    pub mic_gain: Option<i32>,
    pub compression_level: Option<i32>,

    pub rit_on: Option<bool>,
    pub xit_on: Option<bool>,
    /// Shared RIT/XIT offset in hertz.
    pub rit_xit_offset_hz: Option<i32>,

    /// QSK/VOX delay per mode class, indexed by [`ModeClass::slot`], in
    /// 10 ms units.
    pub delay: [Option<i32>; 3],
    /// VOX enable per mode class, indexed by [`ModeClass::slot`].
    pub vox: [Option<bool>; 3],

    pub keyer_speed_wpm: Option<i32>,
    pub cw_pitch_hz: Option<i32>,
    pub message_bank: Option<i32>,

    pub tx_antenna: Option<i32>,
    /// Antenna names keyed by antenna number.
    pub antenna_names: BTreeMap<u8, String>,
    pub sub_receiver_on: Option<bool>,
    pub diversity_on: Option<bool>,

    pub averaging: Option<i32>,
    pub peak_mode: Option<bool>,
    pub waterfall_color: Option<i32>,

    pub radio_id: Option<String>,
    pub option_modules: Option<OptionModules>,
    /// Firmware version per component tag.
    pub firmware_versions: BTreeMap<String, String>,
}

impl RadioState {
    /// The state of one receiver.
    pub fn receiver(&self, id: ReceiverId) -> &ReceiverState {
        if id.is_sub() { &self.sub } else { &self.main }
    }

    /// Mutable state of one receiver.
    pub fn receiver_mut(&mut self, id: ReceiverId) -> &mut ReceiverState {
        if id.is_sub() {
            &mut self.sub
        } else {
            &mut self.main
        }
    }

    /// Class of the live operating mode (VFO A), if known.
    pub fn current_mode_class(&self) -> Option<ModeClass> {
        self.main.mode.map(|m| m.class())
    }

    /// Delay stored for the class of the live mode.
    pub fn delay_for_current_mode(&self) -> Option<i32> {
        self.current_mode_class()
            .and_then(|class| self.delay[class.slot()])
    }

    /// VOX enable stored for the class of the live mode.
    pub fn vox_for_current_mode(&self) -> Option<bool> {
        self.current_mode_class()
            .and_then(|class| self.vox[class.slot()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_state_default_is_unset() {
        let state = RadioState::default();
        assert_eq!(state.main.frequency_hz, None);
        assert_eq!(state.sub.mode, None);
        assert_eq!(state.power_watts, None);
        assert!(state.antenna_names.is_empty());
        assert_eq!(state.delay, [None, None, None]);
    }

    #[test]
    fn receiver_selection() {
        let mut state = RadioState::default();
        state.receiver_mut(ReceiverId::VFO_B).frequency_hz = Some(7_030_000);
        assert_eq!(state.sub.frequency_hz, Some(7_030_000));
        assert_eq!(state.receiver(ReceiverId::VFO_A).frequency_hz, None);
    }

    #[test]
    fn current_mode_projection() {
        let mut state = RadioState::default();
        state.delay = [Some(50), Some(100), Some(20)];
        state.vox = [Some(false), Some(true), None];
        assert_eq!(state.delay_for_current_mode(), None);

        state.main.mode = Some(Mode::CwR);
        assert_eq!(state.delay_for_current_mode(), Some(50));
        assert_eq!(state.vox_for_current_mode(), Some(false));

        state.main.mode = Some(Mode::Data);
        assert_eq!(state.delay_for_current_mode(), Some(20));
        assert_eq!(state.vox_for_current_mode(), None);
    }

    #[test]
    fn option_modules_decode() {
        let opts = OptionModules::decode(" AP-S-H--");
        assert!(opts.atu);
        assert!(opts.power_amplifier);
        assert!(opts.sub_receiver);
        assert!(opts.hdr_module);
        assert!(!opts.transverter);
        assert!(!opts.diversity);
        assert_eq!(opts.raw, "AP-S-H--");
    }

    #[test]
    fn agc_codes() {
        assert_eq!(AgcSpeed::from_cat(2), Some(AgcSpeed::Fast));
        assert_eq!(AgcSpeed::from_cat(3), None);
        assert_eq!(AgcSpeed::Slow.to_cat(), 1);
    }
}
