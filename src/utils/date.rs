use chrono::{Datelike, Duration, NaiveDate};

/// Parse ett datum från en sträng (flexibelt format)
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // Försök olika format
    let formats = [
        "%Y-%m-%d",    // 2024-01-15
        "%Y/%m/%d",    // 2024/01/15
        "%d-%m-%Y",    // 15-01-2024
        "%d/%m/%Y",    // 15/01/2024
        "%Y%m%d",      // 20240115
    ];

    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    None
}

/// Formatera ett datum för visning och lagring
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Tolka ett lagrat datum (YYYY-MM-DD)
pub fn from_db(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Måndagen i veckan som datumet tillhör
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as i64;
    date - Duration::days(offset)
}

/// Vardagarna (mån-fre) i veckan som börjar på `monday`
pub fn weekdays_of(monday: NaiveDate) -> [NaiveDate; 5] {
    let monday = week_start(monday);
    [0, 1, 2, 3, 4].map(|i| monday + Duration::days(i))
}

/// Antal dagar i intervallet, båda ändar inräknade
pub fn days_inclusive(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-15"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("15/01/2024"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("invalid"), None);
    }

    #[test]
    fn test_week_start() {
        // 2024-03-14 är en torsdag
        assert_eq!(week_start(d(2024, 3, 14)), d(2024, 3, 11));
        assert_eq!(week_start(d(2024, 3, 11)), d(2024, 3, 11));
        assert_eq!(week_start(d(2024, 3, 17)), d(2024, 3, 11));
    }

    #[test]
    fn test_weekdays_of() {
        let days = weekdays_of(d(2024, 3, 13));
        assert_eq!(days[0], d(2024, 3, 11));
        assert_eq!(days[4], d(2024, 3, 15));
        assert!(days
            .iter()
            .all(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn test_days_inclusive() {
        assert_eq!(days_inclusive(d(2024, 1, 1), d(2024, 1, 31)), 31);
        assert_eq!(days_inclusive(d(2024, 2, 1), d(2024, 2, 1)), 1);
    }
}
