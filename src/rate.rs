// Counter deltas to rates, and rate formatting for display.

const BYTE_UNITS: [&str; 5] = ["B/s", "KB/s", "MB/s", "GB/s", "TB/s"];
const BIT_UNITS: [&str; 5] = ["b/s", "Kb/s", "Mb/s", "Gb/s", "Tb/s"];

/// Per-second rate between two cumulative counter readings.
///
/// Returns 0 when there is no previous reading (cold start), when the interval
/// is not positive, or when the counter went backwards (reset, wraparound,
/// replaced adapter). Never negative.
pub fn rate(current: u64, previous: Option<u64>, delta_secs: f64) -> f64 {
    let Some(previous) = previous else {
        return 0.0;
    };
    if delta_secs.is_nan() || delta_secs <= 0.0 {
        return 0.0;
    }
    let delta = current.saturating_sub(previous);
    delta as f64 / delta_secs
}

/// Formats a bytes/s rate, optionally as bits/s. Decimal (1000) scaling.
pub fn format_rate(bytes_per_sec: f64, use_bits: bool) -> String {
    let value = bytes_per_sec.max(0.0);
    if use_bits {
        scale(value * 8.0, &BIT_UNITS)
    } else {
        scale(value, &BYTE_UNITS)
    }
}

/// Formats a link speed given in bits/s; "—" when unknown.
pub fn format_link_speed(bps: Option<u64>, use_bits: bool) -> String {
    match bps {
        None => crate::models::UNAVAILABLE.to_string(),
        Some(bps) if use_bits => scale(bps as f64, &BIT_UNITS),
        Some(bps) => scale(bps as f64 / 8.0, &BYTE_UNITS),
    }
}

/// Formats a Wi-Fi negotiated rate in Mbit/s.
pub fn format_mbps(mbps: Option<f64>) -> String {
    match mbps {
        None => crate::models::UNAVAILABLE.to_string(),
        Some(v) if v >= 1000.0 => format!("{:.1} Gb/s", v / 1000.0),
        Some(v) => format!("{:.0} Mb/s", v),
    }
}

fn scale(value: f64, units: &[&str]) -> String {
    let mut adjusted = if value.is_finite() { value } else { 0.0 };
    let mut unit = 0;
    while adjusted >= 1000.0 && unit < units.len() - 1 {
        adjusted /= 1000.0;
        unit += 1;
    }
    if adjusted < 10.0 {
        format!("{:.2} {}", adjusted, units[unit])
    } else if adjusted < 100.0 {
        format!("{:.1} {}", adjusted, units[unit])
    } else {
        format!("{:.0} {}", adjusted, units[unit])
    }
}
