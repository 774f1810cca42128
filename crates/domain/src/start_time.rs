//! Report start times (`Start Time: Mon, 2 Sep 2024 10:20:30 IDT`).
//!
//! The zone token printed by the tool decides the instant. Tokens that are
//! neither UTC aliases, numeric offsets, RFC 2822 US zones nor IANA names
//! (for example `IDT`) are interpreted in the caller's fallback zone.

use crate::report::ReportError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const LOCAL_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Parse a report start time into a UTC instant.
pub fn parse_start_time(raw: &str, fallback_zone: Tz) -> Result<DateTime<Utc>, ReportError> {
    let trimmed = raw.trim();
    let invalid = || ReportError::InvalidStartTime {
        value: trimmed.to_string(),
    };

    let (local, zone) = trimmed.rsplit_once(' ').ok_or_else(invalid)?;
    let naive = NaiveDateTime::parse_from_str(local.trim(), LOCAL_FORMAT).map_err(|_| invalid())?;

    let resolved = match resolve_zone(zone) {
        Some(ZoneToken::Fixed(offset)) => offset
            .from_local_datetime(&naive)
            .single()
            .map(|instant| instant.with_timezone(&Utc)),
        Some(ZoneToken::Named(tz)) => local_in(tz, &naive),
        None => local_in(fallback_zone, &naive),
    };
    resolved.ok_or_else(invalid)
}

enum ZoneToken {
    Fixed(FixedOffset),
    Named(Tz),
}

fn resolve_zone(token: &str) -> Option<ZoneToken> {
    const HOUR: i32 = 3_600;
    let fixed = |hours: i32| FixedOffset::east_opt(hours * HOUR).map(ZoneToken::Fixed);
    match token {
        "UTC" | "GMT" | "UT" | "Z" => return fixed(0),
        "EST" => return fixed(-5),
        "EDT" => return fixed(-4),
        "CST" => return fixed(-6),
        "CDT" => return fixed(-5),
        "MST" => return fixed(-7),
        "MDT" => return fixed(-6),
        "PST" => return fixed(-8),
        "PDT" => return fixed(-7),
        _ => {},
    }
    if token.starts_with(['+', '-']) {
        return parse_numeric_offset(token).map(ZoneToken::Fixed);
    }
    token.parse::<Tz>().ok().map(ZoneToken::Named)
}

fn parse_numeric_offset(token: &str) -> Option<FixedOffset> {
    let (sign, digits) = token.split_at(1);
    let digits: String = digits.chars().filter(|ch| *ch != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits.get(..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..)?.parse().ok()?;
    let seconds = hours * 3_600 + minutes * 60;
    FixedOffset::east_opt(if sign == "-" { -seconds } else { seconds })
}

fn local_in(tz: Tz, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(naive)
        .earliest()
        .map(|instant| instant.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(raw: &str, fallback: Tz) -> Option<i64> {
        parse_start_time(raw, fallback)
            .ok()
            .map(|instant| instant.timestamp_millis())
    }

    #[test]
    fn utc_token_is_honored() {
        assert_eq!(
            millis("Mon, 2 Sep 2024 10:20:30 UTC", chrono_tz::Asia::Jerusalem),
            Some(1_725_272_430_000)
        );
    }

    #[test]
    fn two_digit_day_and_gmt() {
        assert_eq!(
            millis("Mon, 02 Sep 2024 10:20:30 GMT", chrono_tz::UTC),
            Some(1_725_272_430_000)
        );
    }

    #[test]
    fn numeric_offsets_are_applied() {
        assert_eq!(
            millis("Mon, 2 Sep 2024 13:20:30 +0300", chrono_tz::UTC),
            Some(1_725_272_430_000)
        );
        assert_eq!(
            millis("Mon, 2 Sep 2024 13:20:30 +03:00", chrono_tz::UTC),
            Some(1_725_272_430_000)
        );
    }

    #[test]
    fn unknown_abbreviation_uses_fallback_zone() {
        // Jerusalem is UTC+3 in September (daylight time).
        assert_eq!(
            millis("Mon, 2 Sep 2024 13:20:30 IDT", chrono_tz::Asia::Jerusalem),
            Some(1_725_272_430_000)
        );
        assert_eq!(
            millis("Mon, 2 Sep 2024 10:20:30 IDT", chrono_tz::UTC),
            Some(1_725_272_430_000)
        );
    }

    #[test]
    fn iana_zone_names_are_accepted() {
        assert_eq!(
            millis("Mon, 2 Sep 2024 12:20:30 Europe/Berlin", chrono_tz::UTC),
            Some(1_725_272_430_000)
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        for raw in ["", "yesterday", "2024-09-02T10:20:30Z", "Mon, 2 Sep 2024 UTC"] {
            assert!(
                matches!(
                    parse_start_time(raw, chrono_tz::UTC),
                    Err(ReportError::InvalidStartTime { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }
}
