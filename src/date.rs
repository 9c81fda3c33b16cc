//! Date parsing, token-based formatting and relative time.
//!
//! Formats use the `YYYY-MM-DD HH:mm:ss.SSS A` family of tokens. The format
//! string is scanned left to right taking the longest token at each position,
//! so output from one token is never re-read as another (`MM` is never seen
//! as two `M`s). Text inside `[...]` is copied verbatim.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde_json::Value;

const TOKENS: &[&str] = &[
    "YYYY", "MMMM", "dddd", "SSS", "MMM", "ddd", "YY", "MM", "DD", "HH", "hh", "mm", "ss", "ZZ",
    "M", "D", "H", "h", "m", "s", "A", "a", "Z", "X", "x",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] =
    ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

/// Reads a date from a value: epoch milliseconds (number or digit string),
/// RFC 3339, `YYYY-MM-DD[ HH:MM:SS]` or the word `now`. Naive times are UTC.
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_f64()? as i64).single(),
        Value::String(s) => parse_datetime_str(s.trim()),
        _ => None,
    }
}

fn parse_datetime_str(s: &str) -> Option<DateTime<Utc>> {
    if s.eq_ignore_ascii_case("now") {
        return Some(Utc::now());
    }
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        return Utc.timestamp_millis_opt(s.parse().ok()?).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Formats a date with the token mini-format.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use stencil::date::format_datetime;
///
/// let dt = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
/// assert_eq!(format_datetime(&dt, "YYYY-MM-DD hh:mm A"), "2024-03-05 02:07 PM");
/// ```
pub fn format_datetime(dt: &DateTime<Utc>, format: &str) -> String {
    let mut out = String::new();
    let mut rest = format;

    while !rest.is_empty() {
        if let Some(literal) = rest.strip_prefix('[') {
            if let Some(end) = literal.find(']') {
                out.push_str(&literal[..end]);
                rest = &literal[end + 1..];
                continue;
            }
        }
        match TOKENS.iter().find(|token| rest.starts_with(**token)) {
            Some(token) => {
                out.push_str(&render_token(dt, token));
                rest = &rest[token.len()..];
            }
            None => {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    out.push(c);
                }
                rest = chars.as_str();
            }
        }
    }
    out
}

fn render_token(dt: &DateTime<Utc>, token: &str) -> String {
    let hour12 = match dt.hour() % 12 {
        0 => 12,
        h => h,
    };
    let meridiem = if dt.hour() < 12 { "AM" } else { "PM" };
    match token {
        "YYYY" => format!("{:04}", dt.year()),
        "YY" => format!("{:02}", dt.year().rem_euclid(100)),
        "MMMM" => MONTHS[dt.month0() as usize].to_string(),
        "MMM" => MONTHS[dt.month0() as usize][..3].to_string(),
        "MM" => format!("{:02}", dt.month()),
        "M" => dt.month().to_string(),
        "DD" => format!("{:02}", dt.day()),
        "D" => dt.day().to_string(),
        "dddd" => WEEKDAYS[dt.weekday().num_days_from_monday() as usize].to_string(),
        "ddd" => WEEKDAYS[dt.weekday().num_days_from_monday() as usize][..3].to_string(),
        "HH" => format!("{:02}", dt.hour()),
        "H" => dt.hour().to_string(),
        "hh" => format!("{hour12:02}"),
        "h" => hour12.to_string(),
        "mm" => format!("{:02}", dt.minute()),
        "m" => dt.minute().to_string(),
        "ss" => format!("{:02}", dt.second()),
        "s" => dt.second().to_string(),
        "SSS" => format!("{:03}", dt.timestamp_subsec_millis()),
        "A" => meridiem.to_string(),
        "a" => meridiem.to_lowercase(),
        "ZZ" => "+0000".to_string(),
        "Z" => "+00:00".to_string(),
        "X" => dt.timestamp().to_string(),
        "x" => dt.timestamp_millis().to_string(),
        other => other.to_string(),
    }
}

/// Describes `dt` relative to `now`: `just now`, `5 minutes ago`, `in 2 days`.
pub fn relative_time(dt: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let seconds = (now.timestamp_millis() - dt.timestamp_millis()) / 1000;
    let past = seconds >= 0;
    let seconds = seconds.unsigned_abs();

    if seconds < 45 {
        return "just now".to_string();
    }

    let (amount, unit) = match seconds {
        s if s < 90 => (1, "minute"),
        s if s < 45 * 60 => ((s + 30) / 60, "minute"),
        s if s < 90 * 60 => (1, "hour"),
        s if s < 22 * 3600 => ((s + 1800) / 3600, "hour"),
        s if s < 36 * 3600 => (1, "day"),
        s if s < 26 * 86_400 => ((s + 43_200) / 86_400, "day"),
        s if s < 45 * 86_400 => (1, "month"),
        s if s < 320 * 86_400 => ((s + 15 * 86_400) / (30 * 86_400), "month"),
        s if s < 548 * 86_400 => (1, "year"),
        s => ((s + 182 * 86_400) / (365 * 86_400), "year"),
    };
    let plural = if amount == 1 { "" } else { "s" };
    if past {
        format!("{amount} {unit}{plural} ago")
    } else {
        format!("in {amount} {unit}{plural}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn sample() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 9, 0, 5, 3).unwrap()
            + Duration::milliseconds(42)
    }

    #[test]
    fn longest_token_wins() {
        let dt = sample();
        assert_eq!(format_datetime(&dt, "YYYY-MM-DD HH:mm:ss.SSS"), "2024-01-09 00:05:03.042");
        assert_eq!(format_datetime(&dt, "M/D/YY h:m:s a"), "1/9/24 12:5:3 am");
        assert_eq!(format_datetime(&dt, "MMMM MMM dddd ddd"), "January Jan Tuesday Tue");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        // "May" would read as a month token plus a meridiem if it were rescanned.
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap();
        assert_eq!(format_datetime(&dt, "MMMM"), "May");
        assert_eq!(format_datetime(&dt, "[Month:] MM"), "Month: 05");
    }

    #[test]
    fn parses_common_inputs() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        assert_eq!(parse_datetime(&json!("2024-01-09")), Some(expected));
        assert_eq!(parse_datetime(&json!("2024-01-09T00:00:00Z")), Some(expected));
        assert_eq!(parse_datetime(&json!("2024-01-09 00:00:00")), Some(expected));
        assert_eq!(parse_datetime(&json!(expected.timestamp_millis())), Some(expected));
        assert_eq!(parse_datetime(&json!("not a date")), None);
        assert_eq!(parse_datetime(&json!(true)), None);
    }

    #[test]
    fn relative_phrases() {
        let now = sample();
        assert_eq!(relative_time(&(now - Duration::seconds(10)), &now), "just now");
        assert_eq!(relative_time(&(now - Duration::minutes(5)), &now), "5 minutes ago");
        assert_eq!(relative_time(&(now - Duration::hours(1)), &now), "1 hour ago");
        assert_eq!(relative_time(&(now + Duration::days(3)), &now), "in 3 days");
        assert_eq!(relative_time(&(now - Duration::days(400)), &now), "1 year ago");
    }
}
