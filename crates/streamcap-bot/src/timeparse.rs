//! Free-text time-of-day parsing.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};

use streamcap_types::Error;

/// Accepted time-of-day grammars, 24-hour first. AM/PM forms accept a
/// missing space before the meridiem.
const FORMATS: &[&str] = &[
    "%H:%M:%S",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
    "%I:%M:%S%p",
    "%I:%M%p",
    "%I %p",
    "%I%p",
];

/// Parse a free-text time string into an instant on `date` in the fixed
/// reference timezone `tz`.
///
/// Fails with [`Error::InvalidTimeFormat`]; the caller surfaces that
/// verbatim and never retries.
pub fn parse_time_of_day(
    input: &str,
    tz: FixedOffset,
    date: NaiveDate,
) -> Result<DateTime<FixedOffset>, Error> {
    let normalized = input.trim().to_uppercase();

    for format in FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(&normalized, format) {
            return tz
                .from_local_datetime(&date.and_time(time))
                .single()
                .ok_or_else(|| Error::InvalidTimeFormat(input.to_string()));
        }
    }

    Err(Error::InvalidTimeFormat(input.to_string()))
}
