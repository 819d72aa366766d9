//! Prefix-table dispatch of CAT lines to field parsers.
//!
//! Many K4 commands share a prefix with a longer one: `BW` and `BW$`,
//! `#REF` and `#REF$`, `NA` and `NA$`. The table is sorted by descending
//! prefix length when the dispatcher is built and the first `starts_with`
//! match wins, so a longer prefix is always tried before any shorter prefix
//! it extends.

use k4link_core::{Mode, ModeClass, ReceiverId, s_units_from_bars};

use crate::change::{Field, FieldChange, update};
use crate::commands::mode_from_cat;
use crate::state::{AgcSpeed, OptionModules, RadioState};

/// Parse the arguments of one command into `state`, recording changes.
///
/// Returns `false` when the arguments are malformed, in which case the
/// line counts as unrecognized.
pub(crate) type Handler = fn(&mut RadioState, ReceiverId, &str, &mut Vec<FieldChange>) -> bool;

/// One row of the dispatch table.
pub(crate) struct CommandEntry {
    pub prefix: &'static str,
    /// Receiver the command addresses (only used by per-receiver handlers).
    pub receiver: ReceiverId,
    pub handler: Handler,
}

const A: ReceiverId = ReceiverId::VFO_A;
const B: ReceiverId = ReceiverId::VFO_B;

macro_rules! cmd {
    ($prefix:literal, $rx:expr, $handler:expr) => {
        CommandEntry {
            prefix: $prefix,
            receiver: $rx,
            handler: $handler,
        }
    };
    ($prefix:literal, $handler:expr) => {
        cmd!($prefix, A, $handler)
    };
}

static COMMANDS: &[CommandEntry] = &[
    // VFOs
    cmd!("FA", A, handle_frequency),
    cmd!("FB", B, handle_frequency),
    cmd!("MD", A, handle_mode),
    cmd!("MD$", B, handle_mode),
    // Receiver
    cmd!("BW", A, handle_bandwidth),
    cmd!("BW$", B, handle_bandwidth),
    cmd!("IS", A, handle_if_shift),
    cmd!("IS$", B, handle_if_shift),
    cmd!("SM", A, handle_s_meter),
    cmd!("SM$", B, handle_s_meter),
    cmd!("GT", A, handle_agc),
    cmd!("GT$", B, handle_agc),
    cmd!("PA", A, handle_preamp),
    cmd!("PA$", B, handle_preamp),
    cmd!("RA", A, handle_attenuator),
    cmd!("RA$", B, handle_attenuator),
    cmd!("NB", A, handle_noise_blanker),
    cmd!("NB$", B, handle_noise_blanker),
    cmd!("NR", A, handle_noise_reduction),
    cmd!("NR$", B, handle_noise_reduction),
    cmd!("NA", A, handle_auto_notch),
    cmd!("NA$", B, handle_auto_notch),
    cmd!("NM", A, handle_manual_notch),
    cmd!("NM$", B, handle_manual_notch),
    cmd!("DT", A, handle_data_sub_mode),
    cmd!("DT$", B, handle_data_sub_mode),
    cmd!("AG", A, handle_af_gain),
    cmd!("AG$", B, handle_af_gain),
    cmd!("RG", A, handle_rf_gain),
    cmd!("RG$", B, handle_rf_gain),
    cmd!("SQ", A, handle_squelch),
    cmd!("SQ$", B, handle_squelch),
    cmd!("AR", A, handle_rx_antenna),
    cmd!("AR$", B, handle_rx_antenna),
    // Transmit and meters
    cmd!("PC", handle_power),
    cmd!("TM", handle_tx_meters),
    cmd!("TQ", handle_transmitting),
    cmd!("FT", handle_split),
    cmd!("MG", handle_mic_gain),
    cmd!("CP", handle_compression),
    // RIT / XIT
    cmd!("RT", handle_rit),
    cmd!("XT", handle_xit),
    cmd!("RO", handle_rit_xit_offset),
    // Per-mode delay and VOX
    cmd!("SD", handle_delay),
    cmd!("VX", handle_vox),
    // Keyer
    cmd!("KS", handle_keyer_speed),
    cmd!("CW", handle_cw_pitch),
    cmd!("MB", handle_message_bank),
    // Antennas and receivers
    cmd!("AN", handle_tx_antenna),
    cmd!("ACN", handle_antenna_name),
    cmd!("SB", handle_sub_receiver),
    cmd!("DV", handle_diversity),
    // Compound status
    cmd!("SIFP", handle_status_flags),
    // Panadapter
    cmd!("#REF", A, handle_ref_level),
    cmd!("#REF$", B, handle_ref_level),
    cmd!("#SPN", A, handle_span),
    cmd!("#SPN$", B, handle_span),
    cmd!("#AVG", handle_averaging),
    cmd!("#PKM", handle_peak_mode),
    cmd!("#WFC", handle_waterfall_color),
    cmd!("#VFA", A, handle_cursor_mode),
    cmd!("#VFB", B, handle_cursor_mode),
    // Identity
    cmd!("ID", handle_radio_id),
    cmd!("OM", handle_option_modules),
    cmd!("RV", handle_firmware_version),
];

/// Routes CAT lines to their handlers, longest prefix first.
pub(crate) struct Dispatcher {
    entries: Vec<&'static CommandEntry>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        let mut entries: Vec<&'static CommandEntry> = COMMANDS.iter().collect();
        // Stable sort: equal-length prefixes keep table order.
        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Dispatcher { entries }
    }

    /// Apply one CAT line (terminator stripped). Returns `true` if the line
    /// was recognized and parsed.
    pub(crate) fn dispatch(
        &self,
        state: &mut RadioState,
        line: &str,
        changes: &mut Vec<FieldChange>,
    ) -> bool {
        let Some(entry) = self.entries.iter().find(|e| line.starts_with(e.prefix)) else {
            return false;
        };
        let args = &line[entry.prefix.len()..];
        let ok = (entry.handler)(state, entry.receiver, args, changes);
        if !ok {
            tracing::trace!(prefix = entry.prefix, args, "Malformed CAT arguments");
        }
        ok
    }

    #[cfg(test)]
    fn prefixes(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.prefix).collect()
    }
}

// ---------------------------------------------------------------
// Argument parsing helpers
// ---------------------------------------------------------------

fn int(s: &str) -> Option<i32> {
    s.trim().parse().ok()
}

fn digit_at(s: &str, index: usize) -> Option<u8> {
    let b = *s.as_bytes().get(index)?;
    b.is_ascii_digit().then(|| b - b'0')
}

fn flag_at(s: &str, index: usize) -> Option<bool> {
    match s.as_bytes().get(index)? {
        b'0' => Some(false),
        b'1' => Some(true),
        _ => None,
    }
}

/// A value sent in 10 Hz units, scaled to hertz.
fn tens(s: &str) -> Option<i32> {
    int(s)?.checked_mul(10)
}

fn int_range(s: &str, start: usize, end: usize) -> Option<i32> {
    let field = s.get(start..end)?;
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

// ---------------------------------------------------------------
// Shared transitions
// ---------------------------------------------------------------

/// Set a receiver's mode. A change of VFO A's mode class re-projects the
/// current delay and VOX settings.
pub(crate) fn apply_mode(
    state: &mut RadioState,
    rx: ReceiverId,
    mode: Mode,
    changes: &mut Vec<FieldChange>,
) {
    let old_delay = state.delay_for_current_mode();
    let old_vox = state.vox_for_current_mode();
    let old_class = state.current_mode_class();

    update(&mut state.receiver_mut(rx).mode, mode, Field::Mode(rx), changes);

    if rx.is_sub() || old_class == Some(mode.class()) {
        return;
    }
    if let Some(delay) = state.delay_for_current_mode() {
        if old_delay != Some(delay) {
            changes.push(FieldChange::new(Field::CurrentDelay, delay));
        }
    }
    if let Some(vox) = state.vox_for_current_mode() {
        if old_vox != Some(vox) {
            changes.push(FieldChange::new(Field::CurrentVox, vox));
        }
    }
}

// ---------------------------------------------------------------
// Handlers: VFOs and receivers
// ---------------------------------------------------------------

fn handle_frequency(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Ok(freq) = args.trim().parse::<u64>() else {
        return false;
    };
    update(&mut s.receiver_mut(rx).frequency_hz, freq, Field::Frequency(rx), c);
    true
}

fn handle_mode(s: &mut RadioState, rx: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(code) = digit_at(args, 0) else {
        return false;
    };
    apply_mode(s, rx, mode_from_cat(code), c);
    true
}

fn handle_bandwidth(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = tens(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).filter_bandwidth_hz, v, Field::FilterBandwidth(rx), c);
    true
}

fn handle_if_shift(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = tens(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).if_shift_hz, v, Field::IfShift(rx), c);
    true
}

fn handle_s_meter(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Ok(bars) = args.trim().parse::<u32>() else {
        return false;
    };
    update(&mut s.receiver_mut(rx).s_meter, s_units_from_bars(bars), Field::SMeter(rx), c);
    true
}

fn handle_agc(s: &mut RadioState, rx: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(agc) = digit_at(args, 0).and_then(AgcSpeed::from_cat) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).agc_speed, agc, Field::AgcSpeed(rx), c);
    true
}

fn handle_preamp(s: &mut RadioState, rx: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(level) = digit_at(args, 0) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).preamp, level as i32, Field::Preamp(rx), c);
    true
}

/// `RAnnm`: attenuation in dB, on/off.
fn handle_attenuator(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let (Some(level), Some(on)) = (int_range(args, 0, 2), flag_at(args, 2)) else {
        return false;
    };
    let r = s.receiver_mut(rx);
    update(&mut r.attenuator_db, level, Field::AttenuatorLevel(rx), c);
    update(&mut r.attenuator_on, on, Field::AttenuatorEnabled(rx), c);
    true
}

/// `NBnnmf`: level, on/off, filter.
fn handle_noise_blanker(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let (Some(level), Some(on), Some(filter)) =
        (int_range(args, 0, 2), flag_at(args, 2), digit_at(args, 3))
    else {
        return false;
    };
    let r = s.receiver_mut(rx);
    update(&mut r.noise_blanker_level, level, Field::NoiseBlankerLevel(rx), c);
    update(&mut r.noise_blanker_on, on, Field::NoiseBlankerEnabled(rx), c);
    update(&mut r.noise_blanker_filter, filter as i32, Field::NoiseBlankerFilter(rx), c);
    true
}

/// `NRnnm`: level, on/off.
fn handle_noise_reduction(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let (Some(level), Some(on)) = (int_range(args, 0, 2), flag_at(args, 2)) else {
        return false;
    };
    let r = s.receiver_mut(rx);
    update(&mut r.noise_reduction_level, level, Field::NoiseReductionLevel(rx), c);
    update(&mut r.noise_reduction_on, on, Field::NoiseReductionEnabled(rx), c);
    true
}

/// `NAms`: on/off, tracking speed.
fn handle_auto_notch(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let (Some(on), Some(speed)) = (flag_at(args, 0), digit_at(args, 1)) else {
        return false;
    };
    let r = s.receiver_mut(rx);
    update(&mut r.auto_notch, on, Field::AutoNotch(rx), c);
    update(&mut r.auto_notch_speed, speed as i32, Field::AutoNotchSpeed(rx), c);
    true
}

/// `NMnnnnm`: pitch in hertz, on/off.
fn handle_manual_notch(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let (Some(pitch), Some(on)) = (int_range(args, 0, 4), flag_at(args, 4)) else {
        return false;
    };
    let r = s.receiver_mut(rx);
    update(&mut r.manual_notch_pitch_hz, pitch, Field::ManualNotchPitch(rx), c);
    update(&mut r.manual_notch_on, on, Field::ManualNotchEnabled(rx), c);
    true
}

fn handle_data_sub_mode(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).data_sub_mode, v, Field::DataSubMode(rx), c);
    true
}

fn handle_af_gain(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).af_gain, v, Field::AfGain(rx), c);
    true
}

fn handle_rf_gain(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).rf_gain, v, Field::RfGain(rx), c);
    true
}

fn handle_squelch(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).squelch, v, Field::Squelch(rx), c);
    true
}

fn handle_rx_antenna(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).rx_antenna, v, Field::RxAntenna(rx), c);
    true
}

// ---------------------------------------------------------------
// Handlers: transmit
// ---------------------------------------------------------------

/// `PCnnn[L|H]`: `L` is tenths of a watt (QRP range), `H` whole watts.
fn handle_power(s: &mut RadioState, _: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let args = args.trim();
    let (digits, range) = match args.as_bytes().last() {
        Some(b'L') => (&args[..args.len() - 1], Some(true)),
        Some(b'H') => (&args[..args.len() - 1], Some(false)),
        _ => (args, None),
    };
    let Ok(raw) = digits.parse::<u32>() else {
        return false;
    };
    let watts = if range == Some(true) {
        raw as f32 / 10.0
    } else {
        raw as f32
    };
    update(&mut s.power_watts, watts, Field::Power, c);
    if let Some(qrp) = range {
        update(&mut s.qrp, qrp, Field::QrpMode, c);
    }
    true
}

/// `TMaaabbbcccddd`: ALC, compression (dB), forward power, SWR in tenths.
fn handle_tx_meters(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let (Some(alc), Some(cmp), Some(fwd), Some(swr)) = (
        int_range(args, 0, 3),
        int_range(args, 3, 6),
        int_range(args, 6, 9),
        int_range(args, 9, 12),
    ) else {
        return false;
    };
    let forward = if s.qrp == Some(true) {
        fwd as f32 / 10.0
    } else {
        fwd as f32
    };
    update(&mut s.alc, alc, Field::AlcMeter, c);
    update(&mut s.compression_db, cmp, Field::CompressionMeter, c);
    update(&mut s.forward_power_w, forward, Field::ForwardPower, c);
    update(&mut s.swr, swr as f32 / 10.0, Field::Swr, c);
    true
}

fn handle_transmitting(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(on) = flag_at(args, 0) else {
        return false;
    };
    update(&mut s.transmitting, on, Field::Transmitting, c);
    true
}

fn handle_split(s: &mut RadioState, _: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(on) = flag_at(args, 0) else {
        return false;
    };
    update(&mut s.split, on, Field::Split, c);
    true
}

fn handle_mic_gain(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.mic_gain, v, Field::MicGain, c);
    true
}

fn handle_compression(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.compression_level, v, Field::CompressionLevel, c);
    true
}

fn handle_rit(s: &mut RadioState, _: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(on) = flag_at(args, 0) else {
        return false;
    };
    update(&mut s.rit_on, on, Field::RitEnabled, c);
    true
}

fn handle_xit(s: &mut RadioState, _: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(on) = flag_at(args, 0) else {
        return false;
    };
    update(&mut s.xit_on, on, Field::XitEnabled, c);
    true
}

fn handle_rit_xit_offset(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.rit_xit_offset_hz, v, Field::RitXitOffset, c);
    true
}

// ---------------------------------------------------------------
// Handlers: per-mode delay and VOX
// ---------------------------------------------------------------

/// `SDxMnnn`: leading digit ignored, mode-class letter, delay.
///
/// All three slots are stored; only the slot of the live mode class
/// notifies, as [`Field::CurrentDelay`].
fn handle_delay(s: &mut RadioState, _: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(class) = args.chars().nth(1).and_then(ModeClass::from_cat_letter) else {
        return false;
    };
    let Some(delay) = args.get(2..).and_then(int) else {
        return false;
    };
    let slot = &mut s.delay[class.slot()];
    let changed = *slot != Some(delay);
    *slot = Some(delay);
    if changed && s.current_mode_class() == Some(class) {
        c.push(FieldChange::new(Field::CurrentDelay, delay));
    }
    true
}

/// `VXMn`: mode-class letter, on/off. Notifies like [`handle_delay`].
fn handle_vox(s: &mut RadioState, _: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(class) = args.chars().next().and_then(ModeClass::from_cat_letter) else {
        return false;
    };
    let Some(on) = flag_at(args, 1) else {
        return false;
    };
    let slot = &mut s.vox[class.slot()];
    let changed = *slot != Some(on);
    *slot = Some(on);
    if changed && s.current_mode_class() == Some(class) {
        c.push(FieldChange::new(Field::CurrentVox, on));
    }
    true
}

// ---------------------------------------------------------------
// Handlers: keyer, antennas, status
// ---------------------------------------------------------------

fn handle_keyer_speed(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.keyer_speed_wpm, v, Field::KeyerSpeed, c);
    true
}

/// `CWnn`: sidetone pitch in 10 Hz units.
fn handle_cw_pitch(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = tens(args) else {
        return false;
    };
    update(&mut s.cw_pitch_hz, v, Field::CwPitch, c);
    true
}

fn handle_message_bank(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.message_bank, v, Field::MessageBank, c);
    true
}

fn handle_tx_antenna(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.tx_antenna, v, Field::TxAntenna, c);
    true
}

/// `ACNnname`: antenna number then its display name.
fn handle_antenna_name(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(number) = digit_at(args, 0) else {
        return false;
    };
    let name = args[1..].trim().to_string();
    if s.antenna_names.get(&number) != Some(&name) {
        s.antenna_names.insert(number, name.clone());
        c.push(FieldChange::new(Field::AntennaName(number), name));
    }
    true
}

fn handle_sub_receiver(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(on) = flag_at(args, 0) else {
        return false;
    };
    update(&mut s.sub_receiver_on, on, Field::SubReceiver, c);
    true
}

fn handle_diversity(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(on) = flag_at(args, 0) else {
        return false;
    };
    update(&mut s.diversity_on, on, Field::Diversity, c);
    true
}

/// `SIFPtsrxbd`: transmit, split, RIT, XIT, sub receiver, diversity.
fn handle_status_flags(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let mut flags = [false; 6];
    for (i, flag) in flags.iter_mut().enumerate() {
        let Some(on) = flag_at(args, i) else {
            return false;
        };
        *flag = on;
    }
    let [tx, split, rit, xit, sub, diversity] = flags;
    update(&mut s.transmitting, tx, Field::Transmitting, c);
    update(&mut s.split, split, Field::Split, c);
    update(&mut s.rit_on, rit, Field::RitEnabled, c);
    update(&mut s.xit_on, xit, Field::XitEnabled, c);
    update(&mut s.sub_receiver_on, sub, Field::SubReceiver, c);
    update(&mut s.diversity_on, diversity, Field::Diversity, c);
    true
}

// ---------------------------------------------------------------
// Handlers: panadapter
// ---------------------------------------------------------------

fn handle_ref_level(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).ref_level_db, v, Field::RefLevel(rx), c);
    true
}

fn handle_span(s: &mut RadioState, rx: ReceiverId, args: &str, c: &mut Vec<FieldChange>) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).span_hz, v, Field::Span(rx), c);
    true
}

fn handle_averaging(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.averaging, v, Field::Averaging, c);
    true
}

fn handle_peak_mode(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(on) = flag_at(args, 0) else {
        return false;
    };
    update(&mut s.peak_mode, on, Field::PeakMode, c);
    true
}

fn handle_waterfall_color(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.waterfall_color, v, Field::WaterfallColor, c);
    true
}

fn handle_cursor_mode(
    s: &mut RadioState,
    rx: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let Some(v) = int(args) else {
        return false;
    };
    update(&mut s.receiver_mut(rx).cursor_mode, v, Field::CursorMode(rx), c);
    true
}

// ---------------------------------------------------------------
// Handlers: identity
// ---------------------------------------------------------------

fn handle_radio_id(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let id = args.trim();
    if id.is_empty() {
        return false;
    }
    update(&mut s.radio_id, id.to_string(), Field::RadioId, c);
    true
}

fn handle_option_modules(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    if args.trim().is_empty() {
        return false;
    }
    update(&mut s.option_modules, OptionModules::decode(args), Field::OptionModules, c);
    true
}

/// `RVtversion`: one-character component tag, then its version string.
fn handle_firmware_version(
    s: &mut RadioState,
    _: ReceiverId,
    args: &str,
    c: &mut Vec<FieldChange>,
) -> bool {
    let mut chars = args.chars();
    let Some(tag) = chars.next() else {
        return false;
    };
    let tag = tag.to_string();
    let version = chars.as_str().trim().to_string();
    if s.firmware_versions.get(&tag) != Some(&version) {
        s.firmware_versions.insert(tag.clone(), version.clone());
        c.push(FieldChange::new(Field::FirmwareVersion(tag), version));
    }
    true
}
