//! Core types shared by every k4link crate.

use std::fmt;
use std::str::FromStr;

/// Opaque receiver identifier.
///
/// The K4 has a main receiver (VFO A) and an optional sub receiver
/// (VFO B). CAT commands address the sub receiver with a `$` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverId(u8);

impl ReceiverId {
    /// VFO A, the main receiver.
    pub const VFO_A: ReceiverId = ReceiverId(0);

    /// VFO B, the sub receiver.
    pub const VFO_B: ReceiverId = ReceiverId(1);

    /// Create a `ReceiverId` from a raw index.
    ///
    /// Indices above 1 are folded onto VFO B, the K4 has no third receiver.
    pub fn from_index(index: u8) -> Self {
        ReceiverId(index.min(1))
    }

    /// Return the raw numeric index of this receiver.
    pub fn index(&self) -> u8 {
        self.0
    }

    /// `true` for the sub receiver.
    pub fn is_sub(&self) -> bool {
        self.0 == 1
    }

    /// CAT suffix addressing this receiver: `""` for main, `"$"` for sub.
    pub fn cat_suffix(&self) -> &'static str {
        if self.is_sub() { "$" } else { "" }
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "VFO-A"),
            _ => write!(f, "VFO-B"),
        }
    }
}

/// Operating mode of the transceiver.
///
/// Matches the K4 `MD` mode set one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Lower sideband voice.
    Lsb,
    /// Upper sideband voice.
    Usb,
    /// CW on the upper sideband.
    Cw,
    /// Frequency modulation.
    Fm,
    /// Amplitude modulation.
    Am,
    /// Data (AFSK/FSK/PSK sub-modes, see `DT`).
    Data,
    /// CW on the lower sideband.
    CwR,
    /// Data on the reverse sideband.
    DataR,
}

impl Mode {
    /// The mode class used to select per-mode settings (delay, VOX).
    pub fn class(&self) -> ModeClass {
        match self {
            Mode::Cw | Mode::CwR => ModeClass::Cw,
            Mode::Data | Mode::DataR => ModeClass::Data,
            Mode::Lsb | Mode::Usb | Mode::Fm | Mode::Am => ModeClass::Voice,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Lsb => "LSB",
            Mode::Usb => "USB",
            Mode::Cw => "CW",
            Mode::Fm => "FM",
            Mode::Am => "AM",
            Mode::Data => "DATA",
            Mode::CwR => "CW-R",
            Mode::DataR => "DATA-R",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a string cannot be parsed into a [`Mode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mode: {}", self.0)
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LSB" => Ok(Mode::Lsb),
            "USB" => Ok(Mode::Usb),
            "CW" => Ok(Mode::Cw),
            "FM" => Ok(Mode::Fm),
            "AM" => Ok(Mode::Am),
            "DATA" => Ok(Mode::Data),
            "CW-R" | "CWR" => Ok(Mode::CwR),
            "DATA-R" | "DATAR" => Ok(Mode::DataR),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Coarse mode grouping for settings the radio stores per class.
///
/// QSK/VOX delay and VOX enable live in three independent slots; CAT
/// addresses them with the letters `C`, `V` and `D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeClass {
    /// CW and CW-R.
    Cw,
    /// SSB, AM and FM.
    Voice,
    /// DATA and DATA-R.
    Data,
}

impl ModeClass {
    /// All classes in slot order.
    pub const ALL: [ModeClass; 3] = [ModeClass::Cw, ModeClass::Voice, ModeClass::Data];

    /// Parse the CAT class letter (`C`, `V`, `D`).
    pub fn from_cat_letter(c: char) -> Option<Self> {
        match c {
            'C' => Some(ModeClass::Cw),
            'V' => Some(ModeClass::Voice),
            'D' => Some(ModeClass::Data),
            _ => None,
        }
    }

    /// The CAT class letter.
    pub fn cat_letter(&self) -> char {
        match self {
            ModeClass::Cw => 'C',
            ModeClass::Voice => 'V',
            ModeClass::Data => 'D',
        }
    }

    /// Storage slot index (0..3).
    pub fn slot(&self) -> usize {
        match self {
            ModeClass::Cw => 0,
            ModeClass::Voice => 1,
            ModeClass::Data => 2,
        }
    }
}

impl fmt::Display for ModeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeClass::Cw => write!(f, "CW"),
            ModeClass::Voice => write!(f, "Voice"),
            ModeClass::Data => write!(f, "Data"),
        }
    }
}

/// Lifecycle of a single connection to the radio.
///
/// Moves forward one step at a time and can fall back to `Disconnected`
/// from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Disconnected,
    /// TCP connect or TLS handshake in progress.
    Connecting,
    /// Credentials sent, waiting for the first packet from the radio.
    Authenticating,
    /// At least one packet decoded; the channel is live.
    Connected,
}

impl ConnectionState {
    /// `true` before the channel has been proven to work.
    pub fn is_pre_connected(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Authenticating
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Authenticating => "Authenticating",
            ConnectionState::Connected => "Connected",
        };
        write!(f, "{s}")
    }
}
