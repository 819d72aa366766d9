//! The radio state model.

use tokio::sync::broadcast;

use k4link_core::{Mode, ReceiverId};
use k4link_protocol::cat::{split_commands, strip_terminator};

use crate::change::{Field, FieldChange, FieldValue, ModelEvent, update};
use crate::dispatch::{Dispatcher, apply_mode};
use crate::state::RadioState;

/// Capacity of the model event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Cached radio state, updated from CAT lines and local setters.
///
/// Every update goes through the same compare-then-notify path: a field
/// that takes a new value publishes [`ModelEvent::FieldChanged`], an
/// identical value is silent, and each recognized line (or setter call)
/// ends with one [`ModelEvent::StateUpdated`].
///
/// Calls must be serialized by the owner; the model is not internally
/// synchronized.
///
/// # Example
///
/// ```
/// use k4link_core::{Mode, ReceiverId};
/// use k4link_state::{Field, RadioStateModel};
///
/// let mut model = RadioStateModel::new();
/// assert_eq!(model.apply("MD3;").len(), 1);
/// assert!(model.apply("MD3;").is_empty());
///
/// let mode = model.get_field(&Field::Mode(ReceiverId::VFO_A));
/// assert_eq!(mode.and_then(|v| v.as_mode()), Some(Mode::Cw));
/// ```
pub struct RadioStateModel {
    state: RadioState,
    dispatcher: Dispatcher,
    event_tx: broadcast::Sender<ModelEvent>,
}

impl RadioStateModel {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        RadioStateModel {
            state: RadioState::default(),
            dispatcher: Dispatcher::new(),
            event_tx,
        }
    }

    /// Apply one CAT line. A trailing `;` is accepted and ignored.
    ///
    /// Returns the fields that changed. Unrecognized or malformed lines
    /// return an empty list and publish nothing.
    pub fn apply(&mut self, line: &str) -> Vec<FieldChange> {
        let line = strip_terminator(line);
        let mut changes = Vec::new();
        if !self.dispatcher.dispatch(&mut self.state, line, &mut changes) {
            tracing::trace!(line, "Ignoring unrecognized CAT line");
            return changes;
        }
        self.publish(&changes);
        changes
    }

    /// Apply every command in a multi-command CAT payload, in order.
    pub fn apply_text(&mut self, text: &str) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        for cmd in split_commands(text) {
            changes.extend(self.apply(cmd));
        }
        changes
    }

    /// Current value of one field, or `None` if the radio has not reported
    /// it yet.
    pub fn get_field(&self, field: &Field) -> Option<FieldValue> {
        let s = &self.state;
        match field {
            Field::Frequency(rx) => s.receiver(*rx).frequency_hz.map(FieldValue::from),
            Field::Mode(rx) => s.receiver(*rx).mode.map(FieldValue::from),
            Field::FilterBandwidth(rx) => s.receiver(*rx).filter_bandwidth_hz.map(FieldValue::from),
            Field::IfShift(rx) => s.receiver(*rx).if_shift_hz.map(FieldValue::from),
            Field::SMeter(rx) => s.receiver(*rx).s_meter.map(FieldValue::from),
            Field::AgcSpeed(rx) => s.receiver(*rx).agc_speed.map(FieldValue::from),
            Field::Preamp(rx) => s.receiver(*rx).preamp.map(FieldValue::from),
            Field::AttenuatorLevel(rx) => s.receiver(*rx).attenuator_db.map(FieldValue::from),
            Field::AttenuatorEnabled(rx) => s.receiver(*rx).attenuator_on.map(FieldValue::from),
            Field::NoiseBlankerLevel(rx) => {
                s.receiver(*rx).noise_blanker_level.map(FieldValue::from)
            }
            Field::NoiseBlankerEnabled(rx) => {
                s.receiver(*rx).noise_blanker_on.map(FieldValue::from)
            }
            Field::NoiseBlankerFilter(rx) => {
                s.receiver(*rx).noise_blanker_filter.map(FieldValue::from)
            }
            Field::NoiseReductionLevel(rx) => {
                s.receiver(*rx).noise_reduction_level.map(FieldValue::from)
            }
            Field::NoiseReductionEnabled(rx) => {
                s.receiver(*rx).noise_reduction_on.map(FieldValue::from)
            }
            Field::AutoNotch(rx) => s.receiver(*rx).auto_notch.map(FieldValue::from),
            Field::AutoNotchSpeed(rx) => {
                s.receiver(*rx).auto_notch_speed.map(FieldValue::from)
            }
            Field::ManualNotchPitch(rx) => {
                s.receiver(*rx).manual_notch_pitch_hz.map(FieldValue::from)
            }
            Field::ManualNotchEnabled(rx) => s.receiver(*rx).manual_notch_on.map(FieldValue::from),
            Field::DataSubMode(rx) => s.receiver(*rx).data_sub_mode.map(FieldValue::from),
            Field::AfGain(rx) => s.receiver(*rx).af_gain.map(FieldValue::from),
            Field::RfGain(rx) => s.receiver(*rx).rf_gain.map(FieldValue::from),
            Field::Squelch(rx) => s.receiver(*rx).squelch.map(FieldValue::from),
            Field::RxAntenna(rx) => s.receiver(*rx).rx_antenna.map(FieldValue::from),
            Field::RefLevel(rx) => s.receiver(*rx).ref_level_db.map(FieldValue::from),
            Field::Span(rx) => s.receiver(*rx).span_hz.map(FieldValue::from),
            Field::CursorMode(rx) => s.receiver(*rx).cursor_mode.map(FieldValue::from),

            Field::Power => s.power_watts.map(FieldValue::from),
            Field::QrpMode => s.qrp.map(FieldValue::from),
            Field::Transmitting => s.transmitting.map(FieldValue::from),
            Field::Split => s.split.map(FieldValue::from),
            Field::AlcMeter => s.alc.map(FieldValue::from),
            Field::CompressionMeter => s.compression_db.map(FieldValue::from),
            Field::ForwardPower => s.forward_power_w.map(FieldValue::from),
            Field::Swr => s.swr.map(FieldValue::from),
            Field::MicGain => s.mic_gain.map(FieldValue::from),
            Field::CompressionLevel => s.compression_level.map(FieldValue::from),

            Field::RitEnabled => s.rit_on.map(FieldValue::from),
            Field::XitEnabled => s.xit_on.map(FieldValue::from),
            Field::RitXitOffset => s.rit_xit_offset_hz.map(FieldValue::from),

            Field::Delay(class) => s.delay[class.slot()].map(FieldValue::from),
            Field::Vox(class) => s.vox[class.slot()].map(FieldValue::from),
            Field::CurrentDelay => s.delay_for_current_mode().map(FieldValue::from),
            Field::CurrentVox => s.vox_for_current_mode().map(FieldValue::from),

            Field::KeyerSpeed => s.keyer_speed_wpm.map(FieldValue::from),
            Field::CwPitch => s.cw_pitch_hz.map(FieldValue::from),
            Field::MessageBank => s.message_bank.map(FieldValue::from),

            Field::TxAntenna => s.tx_antenna.map(FieldValue::from),
            Field::AntennaName(n) => s.antenna_names.get(n).cloned().map(FieldValue::from),
            Field::SubReceiver => s.sub_receiver_on.map(FieldValue::from),
            Field::Diversity => s.diversity_on.map(FieldValue::from),

            Field::Averaging => s.averaging.map(FieldValue::from),
            Field::PeakMode => s.peak_mode.map(FieldValue::from),
            Field::WaterfallColor => s.waterfall_color.map(FieldValue::from),

            Field::RadioId => s.radio_id.clone().map(FieldValue::from),
            Field::OptionModules => s.option_modules.clone().map(FieldValue::from),
            Field::FirmwareVersion(tag) => {
                s.firmware_versions.get(tag).cloned().map(FieldValue::from)
            }
        }
    }

    /// Subscribe to change notifications.
    ///
    /// Slow subscribers that fall more than the channel capacity behind
    /// receive `RecvError::Lagged` and miss the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.event_tx.subscribe()
    }

    /// Borrow the current state.
    pub fn state(&self) -> &RadioState {
        &self.state
    }

    /// Clone the current state.
    pub fn snapshot(&self) -> RadioState {
        self.state.clone()
    }

    /// Forget everything, as before the first CAT line. Publishes nothing.
    pub fn reset(&mut self) {
        self.state = RadioState::default();
    }

    // -----------------------------------------------------------------
    // Optimistic setters
    // -----------------------------------------------------------------

    pub fn set_frequency(&mut self, rx: ReceiverId, freq_hz: u64) -> Vec<FieldChange> {
        self.local(|s, c| {
            update(&mut s.receiver_mut(rx).frequency_hz, freq_hz, Field::Frequency(rx), c)
        })
    }

    /// Shares the `MD` path, including delay/VOX re-projection.
    pub fn set_mode(&mut self, rx: ReceiverId, mode: Mode) -> Vec<FieldChange> {
        self.local(|s, c| apply_mode(s, rx, mode, c))
    }

    /// Bandwidth in hertz, stored as the radio will report it back (10 Hz
    /// resolution). Values outside `i32` change nothing.
    pub fn set_filter_bandwidth(&mut self, rx: ReceiverId, bandwidth_hz: u32) -> Vec<FieldChange> {
        let Ok(bw) = i32::try_from(bandwidth_hz / 10 * 10) else {
            return Vec::new();
        };
        self.local(|s, c| {
            update(&mut s.receiver_mut(rx).filter_bandwidth_hz, bw, Field::FilterBandwidth(rx), c)
        })
    }

    pub fn set_keyer_speed(&mut self, wpm: u32) -> Vec<FieldChange> {
        let Ok(wpm) = i32::try_from(wpm) else {
            return Vec::new();
        };
        self.local(|s, c| update(&mut s.keyer_speed_wpm, wpm, Field::KeyerSpeed, c))
    }

    pub fn set_span(&mut self, rx: ReceiverId, span_hz: u32) -> Vec<FieldChange> {
        let Ok(span) = i32::try_from(span_hz) else {
            return Vec::new();
        };
        self.local(|s, c| update(&mut s.receiver_mut(rx).span_hz, span, Field::Span(rx), c))
    }

    pub fn set_ref_level(&mut self, rx: ReceiverId, ref_level_db: i32) -> Vec<FieldChange> {
        self.local(|s, c| {
            update(&mut s.receiver_mut(rx).ref_level_db, ref_level_db, Field::RefLevel(rx), c)
        })
    }

    pub fn set_split(&mut self, on: bool) -> Vec<FieldChange> {
        self.local(|s, c| update(&mut s.split, on, Field::Split, c))
    }

    pub fn set_transmitting(&mut self, on: bool) -> Vec<FieldChange> {
        self.local(|s, c| update(&mut s.transmitting, on, Field::Transmitting, c))
    }

    fn local<F>(&mut self, f: F) -> Vec<FieldChange>
    where
        F: FnOnce(&mut RadioState, &mut Vec<FieldChange>),
    {
        let mut changes = Vec::new();
        f(&mut self.state, &mut changes);
        self.publish(&changes);
        changes
    }

    fn publish(&self, changes: &[FieldChange]) {
        // No subscribers is not an error.
        for change in changes {
            let _ = self.event_tx.send(ModelEvent::FieldChanged(change.clone()));
        }
        let _ = self.event_tx.send(ModelEvent::StateUpdated);
    }
}

impl Default for RadioStateModel {
    fn default() -> Self {
        Self::new()
    }
}
