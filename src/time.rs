use chrono::{DateTime, Local, Utc};

/// Formats a number of seconds as zero-padded `HH:MM:SS`. Hours are not
/// wrapped, so a 100 hour session prints as `100:00:00`.
pub fn format_time(total_secs: u64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Local `HH:MM` used in the history table.
pub fn format_time_short(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

/// Whole seconds between `from` and `to`, floored and clamped at zero.
pub fn elapsed_secs(from: &DateTime<Utc>, to: &DateTime<Utc>) -> u64 {
    (*to - *from).num_seconds().max(0) as u64
}

/// Seconds left until `deadline`, rounded up so a countdown that started at
/// `n` seconds reads `n` until a full second has passed.
pub fn remaining_secs(now: &DateTime<Utc>, deadline: &DateTime<Utc>) -> u64 {
    let millis = (*deadline - *now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis as u64).div_ceil(1000)
    }
}
