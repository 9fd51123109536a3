/// Formats a signal strength for terminal output.
pub(crate) fn format_dbm(signal: i16) -> String {
    format!("{signal} dBm")
}

/// Formats an optional battery level for terminal output.
pub(crate) fn format_battery(level: Option<u8>) -> String {
    match level {
        Some(value) => format!("{value}%"),
        None => "-".to_string(),
    }
}

/// Formats a unit-interval value as a percentage with one decimal.
pub(crate) fn format_ratio(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub(crate) fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
