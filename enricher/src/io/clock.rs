//! The single instant a pass stamps everywhere.

use chrono::{Local, SecondsFormat, Utc};

/// ISO-8601 timestamp with microseconds and an explicit offset, e.g.
/// `2026-10-19T09:30:00.123456-04:00`.
pub fn now_timestamp(utc: bool) -> String {
    if utc {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
    } else {
        Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn timestamps_parse_back_with_offset() {
        for utc in [true, false] {
            let stamp = now_timestamp(utc);
            DateTime::parse_from_rfc3339(&stamp).expect("rfc3339");
            let fraction = stamp.split('.').nth(1).expect("fractional seconds");
            assert!(fraction[..6].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn utc_uses_numeric_offset() {
        assert!(now_timestamp(true).ends_with("+00:00"));
    }
}
