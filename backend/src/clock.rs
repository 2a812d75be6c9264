use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::DateRange;

/// Current calendar date in the application's zone.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Monday-to-Sunday week containing `day`, as a half-open range.
pub fn week_of(day: NaiveDate) -> DateRange {
    let monday = day - Days::new(u64::from(day.weekday().num_days_from_monday()));
    DateRange {
        start: monday,
        end: monday + Days::new(7),
    }
}

/// RFC 3339 rendering of a wall-clock instant in `tz`.
///
/// Instants that fall in a DST gap have no offset and are rendered without one.
pub fn render_local(tz: Tz, instant: NaiveDateTime) -> String {
    match tz.from_local_datetime(&instant).earliest() {
        Some(local) => local.to_rfc3339_opts(SecondsFormat::Secs, false),
        None => instant.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        // 2025-06-10 is a Tuesday.
        let week = week_of(date("2025-06-10"));
        assert_eq!(week.start, date("2025-06-09"));
        assert_eq!(week.end, date("2025-06-16"));
        assert_eq!(week_of(date("2025-06-15")), week);
        assert_eq!(week_of(date("2025-06-09")), week);
    }

    #[test]
    fn renders_with_zone_offset() {
        let instant = date("2025-06-01").and_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(
            render_local(chrono_tz::Europe::Madrid, instant),
            "2025-06-01T09:30:00+02:00"
        );
        let winter = date("2025-01-15").and_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(
            render_local(chrono_tz::Europe::Madrid, winter),
            "2025-01-15T09:30:00+01:00"
        );
    }

    #[test]
    fn dst_gap_renders_without_offset() {
        let gap = date("2025-03-30").and_time(NaiveTime::from_hms_opt(2, 30, 0).unwrap());
        assert_eq!(render_local(chrono_tz::Europe::Madrid, gap), "2025-03-30T02:30:00");
    }
}
