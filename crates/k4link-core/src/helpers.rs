//! Formatting and conversion helpers.

/// Format a frequency in hertz as a human-readable MHz string.
///
/// # Example
///
/// ```
/// use k4link_core::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(14_074_000), "14.074000 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: u64) -> String {
    let mhz = freq_hz as f64 / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

/// Convert a K4 S-meter bar count to S-units.
///
/// Up to 18 bars each bar is half an S-unit. Above S9 each bar is 3 dB,
/// shown as tenths of an S-unit, so 21 bars reads 9.9.
///
/// ```
/// use k4link_core::s_units_from_bars;
///
/// assert_eq!(s_units_from_bars(0), 0.0);
/// assert_eq!(s_units_from_bars(18), 9.0);
/// assert!((s_units_from_bars(21) - 9.9).abs() < 1e-5);
/// ```
pub fn s_units_from_bars(bars: u32) -> f32 {
    if bars <= 18 {
        bars as f32 / 2.0
    } else {
        9.0 + ((bars - 18) * 3) as f32 / 10.0
    }
}

/// Render an S-unit reading as `"S7"` or `"S9+20 dB"`.
pub fn format_s_units(s_units: f32) -> String {
    if s_units > 9.0 {
        let over_db = ((s_units - 9.0) * 10.0).round() as i32;
        format!("S9+{over_db} dB")
    } else {
        format!("S{}", s_units.floor() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_freq_mhz_hf() {
        assert_eq!(format_freq_mhz(7_074_000), "7.074000 MHz");
        assert_eq!(format_freq_mhz(50_313_000), "50.313000 MHz");
    }

    #[test]
    fn s_meter_bar_mapping() {
        assert_eq!(s_units_from_bars(0), 0.0);
        assert_eq!(s_units_from_bars(1), 0.5);
        assert_eq!(s_units_from_bars(10), 5.0);
        assert_eq!(s_units_from_bars(18), 9.0);
        assert!((s_units_from_bars(21) - 9.9).abs() < 1e-5);
        assert!((s_units_from_bars(28) - 12.0).abs() < 1e-5);
    }

    #[test]
    fn s_unit_formatting() {
        assert_eq!(format_s_units(7.5), "S7");
        assert_eq!(format_s_units(9.0), "S9");
        assert_eq!(format_s_units(11.0), "S9+20 dB");
    }
}
