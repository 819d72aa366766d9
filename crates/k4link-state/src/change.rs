//! Field identifiers, values and change notifications.

use k4link_core::{Mode, ModeClass, ReceiverId};

use crate::state::{AgcSpeed, OptionModules};

/// Names one field of [`RadioState`](crate::RadioState).
///
/// Per-receiver fields carry the [`ReceiverId`] they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    // -- per receiver --
    Frequency(ReceiverId),
    Mode(ReceiverId),
    FilterBandwidth(ReceiverId),
    IfShift(ReceiverId),
    SMeter(ReceiverId),
    AgcSpeed(ReceiverId),
    Preamp(ReceiverId),
    AttenuatorLevel(ReceiverId),
    AttenuatorEnabled(ReceiverId),
    NoiseBlankerLevel(ReceiverId),
    NoiseBlankerEnabled(ReceiverId),
    NoiseBlankerFilter(ReceiverId),
    NoiseReductionLevel(ReceiverId),
    NoiseReductionEnabled(ReceiverId),
    AutoNotch(ReceiverId),
    AutoNotchSpeed(ReceiverId),
    ManualNotchPitch(ReceiverId),
    ManualNotchEnabled(ReceiverId),
    DataSubMode(ReceiverId),
    AfGain(ReceiverId),
    RfGain(ReceiverId),
    Squelch(ReceiverId),
    RxAntenna(ReceiverId),
    RefLevel(ReceiverId),
    Span(ReceiverId),
    CursorMode(ReceiverId),

    // -- transmit and meters --
    Power,
    QrpMode,
    Transmitting,
    Split,
    AlcMeter,
    CompressionMeter,
    ForwardPower,
    Swr,
    MicGain,
    CompressionLevel,

    // -- RIT / XIT --
    RitEnabled,
    XitEnabled,
    RitXitOffset,

    // -- per-mode-class settings --
    /// Stored delay for one mode class. Readable, never notified.
    Delay(ModeClass),
    /// Stored VOX enable for one mode class. Readable, never notified.
    Vox(ModeClass),
    /// Delay for the class of the live mode.
    CurrentDelay,
    /// VOX enable for the class of the live mode.
    CurrentVox,

    // -- keyer --
    KeyerSpeed,
    CwPitch,
    MessageBank,

    // -- antennas and receivers --
    TxAntenna,
    AntennaName(u8),
    SubReceiver,
    Diversity,

    // -- panadapter --
    Averaging,
    PeakMode,
    WaterfallColor,

    // -- identity --
    RadioId,
    OptionModules,
    FirmwareVersion(String),
}

/// A field's value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f32),
    Bool(bool),
    Text(String),
    Mode(Mode),
    Agc(AgcSpeed),
    Options(OptionModules),
}

impl FieldValue {
    /// The value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a float; integers are widened.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// The value as a flag, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a mode, if it is one.
    pub fn as_mode(&self) -> Option<Mode> {
        match self {
            FieldValue::Mode(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Mode> for FieldValue {
    fn from(v: Mode) -> Self {
        FieldValue::Mode(v)
    }
}

impl From<AgcSpeed> for FieldValue {
    fn from(v: AgcSpeed) -> Self {
        FieldValue::Agc(v)
    }
}

impl From<OptionModules> for FieldValue {
    fn from(v: OptionModules) -> Self {
        FieldValue::Options(v)
    }
}

/// A field took a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// The field that changed.
    pub field: Field,
    /// Its new value.
    pub value: FieldValue,
}

impl FieldChange {
    pub fn new(field: Field, value: impl Into<FieldValue>) -> Self {
        FieldChange {
            field,
            value: value.into(),
        }
    }
}

/// Event published to model subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// One field changed value.
    FieldChanged(FieldChange),
    /// A CAT line (or local setter) was processed, whether or not any field
    /// changed. Sent after that line's `FieldChanged` events.
    StateUpdated,
}

/// Store `value` into `slot` and record a change if it differs.
pub(crate) fn update<T>(
    slot: &mut Option<T>,
    value: T,
    field: Field,
    changes: &mut Vec<FieldChange>,
) where
    T: PartialEq + Clone + Into<FieldValue>,
{
    if slot.as_ref() == Some(&value) {
        return;
    }
    *slot = Some(value.clone());
    changes.push(FieldChange::new(field, value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_notifies_only_on_change() {
        let mut slot = None;
        let mut changes = Vec::new();

        update(&mut slot, 7_074_000u64, Field::Frequency(ReceiverId::VFO_A), &mut changes);
        update(&mut slot, 7_074_000u64, Field::Frequency(ReceiverId::VFO_A), &mut changes);
        assert_eq!(slot, Some(7_074_000));
        assert_eq!(changes.len(), 1);

        update(&mut slot, 7_075_000u64, Field::Frequency(ReceiverId::VFO_A), &mut changes);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].value, FieldValue::Int(7_075_000));
    }

    #[test]
    fn field_value_accessors() {
        assert_eq!(FieldValue::Int(5).as_float(), Some(5.0));
        assert_eq!(FieldValue::Bool(true).as_bool(), Some(true));
        assert_eq!(FieldValue::Text("ID017".into()).as_text(), Some("ID017"));
        assert_eq!(FieldValue::Mode(Mode::Cw).as_mode(), Some(Mode::Cw));
        assert_eq!(FieldValue::Float(1.5).as_int(), None);
    }
}
