//! Duration strings as they appear in deployment files.
//!
//! The grammar is a sequence of `<integer><unit>` segments with units
//! `ms`, `s`, `m` and `h` (`"500ms"`, `"10s"`, `"1m30s"`). A bare integer
//! is taken as seconds and the empty string is zero.

use std::time::Duration;

/// Parse a duration string like "5s", "500ms", "1m30s".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Some(Duration::ZERO);
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<u64>().ok().map(Duration::from_secs);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
        let segment = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "h" => Duration::from_secs(value.checked_mul(3600)?),
            _ => return None,
        };
        rest = &rest[unit_len..];
        total = total.checked_add(segment)?;
    }
    Some(total)
}

/// Render a duration in the same grammar, e.g. `1m30s` or `250ms`.
/// Anything under a millisecond is shown in `µs`.
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    let millis = d.subsec_millis();
    let secs = d.as_secs();
    let mut out = String::new();
    if secs >= 3600 {
        out.push_str(&format!("{}h", secs / 3600));
    }
    if secs % 3600 >= 60 {
        out.push_str(&format!("{}m", (secs % 3600) / 60));
    }
    if secs % 60 > 0 {
        out.push_str(&format!("{}s", secs % 60));
    }
    if millis > 0 {
        out.push_str(&format!("{millis}ms"));
    }
    if out.is_empty() {
        out.push_str(&format!("{}µs", d.subsec_micros()));
    }
    out
}
