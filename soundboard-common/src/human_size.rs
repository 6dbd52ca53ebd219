//! Human-readable byte size formatting
//!
//! Binary (1024-based) units with short labels: B, KB, MB, GB, TB.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const STEP: f64 = 1024.0;

/// Format a byte count as a human-readable size.
///
/// Values are rounded to at most two decimal places with trailing zeros removed.
/// Plain bytes are always whole numbers.
///
/// # Examples
///
/// ```
/// use soundboard_common::human_size::format_human_size;
///
/// assert_eq!(format_human_size(0), "0 B");
/// assert_eq!(format_human_size(512), "512 B");
/// assert_eq!(format_human_size(1024), "1 KB");
/// assert_eq!(format_human_size(1536), "1.5 KB");
/// assert_eq!(format_human_size(5 * 1024 * 1024), "5 MB");
/// ```
pub fn format_human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= STEP && unit < UNITS.len() - 1 {
        value /= STEP;
        unit += 1;
    }

    let mut rounded = (value * 100.0).round() / 100.0;

    // 1023.999 KB rounds up to 1024 KB; show it as 1 MB instead
    if rounded >= STEP && unit < UNITS.len() - 1 {
        rounded = ((rounded / STEP) * 100.0).round() / 100.0;
        unit += 1;
    }

    format!("{} {}", trim_decimals(rounded), UNITS[unit])
}

/// Two decimal places, trailing zeros and dangling point removed
fn trim_decimals(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
