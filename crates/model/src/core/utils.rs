use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses timestamp text the way the warehouse hands it back: RFC-3339,
/// naive ISO-8601 (`T` or space separated), a bare date (midnight), a bare
/// time (on the Unix epoch date) or epoch seconds such as `1.4887E9`.
pub fn parse_datetime_text(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    if let Some(time) = parse_time_text(raw) {
        return NaiveDate::from_ymd_opt(1970, 1, 1).map(|epoch| epoch.and_time(time));
    }

    parse_epoch_seconds(raw)
}

pub fn parse_time_text(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn parse_epoch_seconds(raw: &str) -> Option<NaiveDateTime> {
    let seconds = raw.parse::<f64>().ok()?;
    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).map(|dt| dt.naive_utc())
}

/// Checks ISO-8601 duration text (`PnYnMnDTnHnMnS`, `PnW`).
pub fn is_iso_duration(raw: &str) -> bool {
    let Some(body) = raw.strip_prefix('P') else {
        return false;
    };
    if body.is_empty() {
        return false;
    }

    let (date_part, time_part) = match body.split_once('T') {
        Some((_, "")) => return false,
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };

    designators_valid(date_part, &['Y', 'M', 'W', 'D'])
        && time_part.is_none_or(|time| designators_valid(time, &['H', 'M', 'S']))
}

fn designators_valid(part: &str, order: &[char]) -> bool {
    let mut next = 0;
    let mut digits = String::new();

    for ch in part.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            digits.push(ch);
            continue;
        }

        let Some(position) = order[next..].iter().position(|d| *d == ch) else {
            return false;
        };
        if digits.is_empty() || digits.parse::<f64>().is_err() {
            return false;
        }
        digits.clear();
        next += position + 1;
    }

    digits.is_empty()
}
