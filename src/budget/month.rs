// src/budget/month.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::coerce::clean_str;

/// `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD`, optionally followed by a time.
static YMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:[T ].*)?$").expect("valid YMD regex")
});
/// `MM/DD/YYYY` (month first) or `DD.MM.YYYY`.
static MDY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})([/.])(\d{1,2})[/.](\d{4})$").expect("valid MDY regex"));
/// `YYYY-MM`, `YYYY/MM`, `YYYY.MM`.
static YM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})$").expect("valid YM regex"));
/// `YYYYMM`.
static YM_COMPACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})$").expect("valid YYYYMM regex"));
/// `MM/YYYY`.
static MY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{4})$").expect("valid MM/YYYY regex"));
/// `Apr-2025`, `Apr 2025`, `April 2025`, `Apr-25`, optionally with a leading day (`15-Apr-2025`).
static NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d{1,2})[-\s])?([A-Za-z]+)\.?[-\s,]+(\d{4}|\d{2})$").expect("valid named regex")
});
/// `Apr 15, 2025`, `April 15 2025`, `Apr-15-2025`.
static NAMED_DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+)\.?[-\s]+(\d{1,2})(?:st|nd|rd|th)?,?[-\s]+(\d{4})$")
        .expect("valid named day regex")
});
/// `2025-Apr`, `2025 April`, `2025-Apr-15`.
static YEAR_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-\s/.]+([A-Za-z]+)\.?(?:[-\s/.]+(\d{1,2}))?$")
        .expect("valid year-named regex")
});

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parse a month-column header and return it in canonical `YYYY-MM` form.
///
/// The day (and any time of day) is ignored. Returns `None` if the header
/// doesn't look like any supported date.
pub fn parse_month(header: &str) -> Option<String> {
    parse_month_start(header).map(|d| d.format("%Y-%m").to_string())
}

/// Like [`parse_month`], but returns the first day of the month.
pub fn parse_month_start(header: &str) -> Option<NaiveDate> {
    let s = clean_str(header);
    if s.is_empty() {
        return None;
    }

    if let Some(c) = YMD.captures(s) {
        let (y, m, d) = (num(&c[1])?, num(&c[2])?, num(&c[3])?);
        return first_of_month_checked(y as i32, m, d);
    }
    if let Some(c) = MDY.captures(s) {
        let (a, b, y) = (num(&c[1])?, num(&c[3])?, num(&c[4])? as i32);
        // "/" is month-first, "." is day-first
        let (m, d) = if &c[2] == "/" { (a, b) } else { (b, a) };
        return first_of_month_checked(y, m, d);
    }
    if let Some(c) = YM.captures(s).or_else(|| YM_COMPACT.captures(s)) {
        return NaiveDate::from_ymd_opt(num(&c[1])? as i32, num(&c[2])?, 1);
    }
    if let Some(c) = MY.captures(s) {
        return NaiveDate::from_ymd_opt(num(&c[2])? as i32, num(&c[1])?, 1);
    }
    if let Some(c) = NAMED.captures(s) {
        let m = month_from_name(&c[2])?;
        let y = match c[3].len() {
            2 => 2000 + num(&c[3])? as i32,
            _ => num(&c[3])? as i32,
        };
        return match c.get(1) {
            Some(day) => first_of_month_checked(y, m, num(day.as_str())?),
            None => NaiveDate::from_ymd_opt(y, m, 1),
        };
    }
    if let Some(c) = NAMED_DAY_FIRST.captures(s) {
        let m = month_from_name(&c[1])?;
        return first_of_month_checked(num(&c[3])? as i32, m, num(&c[2])?);
    }
    if let Some(c) = YEAR_NAMED.captures(s) {
        let (y, m) = (num(&c[1])? as i32, month_from_name(&c[2])?);
        return match c.get(3) {
            Some(day) => first_of_month_checked(y, m, num(day.as_str())?),
            None => NaiveDate::from_ymd_opt(y, m, 1),
        };
    }
    None
}

fn num(s: &str) -> Option<u32> {
    s.parse().ok()
}

/// The day is discarded, but it still has to exist in that month.
fn first_of_month_checked(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)?;
    NaiveDate::from_ymd_opt(y, m, 1)
}

/// Full name, three-letter abbreviation, or "Sept".
fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    MONTH_NAMES
        .iter()
        .position(|full| {
            *full == lower || (lower.len() == 3 && full.starts_with(&lower)) || (lower == "sept" && *full == "september")
        })
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_forms_collapse_to_same_month() {
        for header in [
            "2025-04-15",
            "Apr-2025",
            "2025-04",
            "2025/04/01",
            "2025-04-01 00:00:00",
            "2025-04-01T00:00:00",
            "04/15/2025",
            "15.04.2025",
            "April 2025",
            "Apr 2025",
            "apr-25",
            "15-Apr-2025",
            "202504",
            "04/2025",
            "Apr 15, 2025",
            "April 15, 2025",
            "Apr-15-2025",
            "April 1st, 2025",
            "2025-Apr",
            "2025 April",
            "2025-Apr-15",
            "\"2025-04\"",
            "  2025-04-30  ",
        ] {
            assert_eq!(parse_month(header).as_deref(), Some("2025-04"), "{header}");
        }
    }

    #[test]
    fn test_september_spellings() {
        assert_eq!(parse_month("Sep-2025").as_deref(), Some("2025-09"));
        assert_eq!(parse_month("Sept 2025").as_deref(), Some("2025-09"));
        assert_eq!(parse_month("September 2025").as_deref(), Some("2025-09"));
    }

    #[test]
    fn test_rejects_non_dates() {
        for header in [
            "not-a-date",
            "",
            "Total",
            "2025-13",
            "2025-02-30",
            "Foo 2025",
            "Ap 2025",
            "Apr 31, 2025",
            "2025-Foo",
            "12345",
        ] {
            assert_eq!(parse_month(header), None, "{header}");
        }
    }

    #[test]
    fn test_month_start() {
        assert_eq!(
            parse_month_start("2025-12-31"),
            NaiveDate::from_ymd_opt(2025, 12, 1)
        );
    }
}
