//! Date helper functions

use chrono::{DateTime, FixedOffset, Locale, TimeZone};

/// Parse a CMS timestamp
///
/// Prismic sends `2021-03-25T19:25:28+0000`, which is not strict RFC 3339,
/// so the colon-less offset is accepted too.
pub fn parse_cms_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}

/// Format a date using a Moment.js-compatible format string in the given locale
///
/// Unknown locales fall back to POSIX.
///
/// # Examples
/// ```ignore
/// format_date(&date, "DD MMM YYYY", "pt_BR") // -> "25 mar 2021"
/// ```
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>, format: &str, locale: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let locale = Locale::try_from(locale).unwrap_or(Locale::POSIX);
    let chrono_format = moment_to_chrono_format(format);
    date.format_localized(&chrono_format, locale).to_string()
}

/// Format an optional CMS timestamp for display; missing or unparsable dates
/// render as an empty string
pub fn display_date(value: Option<&str>, format: &str, locale: &str) -> String {
    value
        .and_then(parse_cms_date)
        .map(|d| format_date(&d, format, locale))
        .unwrap_or_default()
}

/// Format a date in ISO 8601 / XML format, for `<time datetime="...">`
pub fn date_xml<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Convert Moment.js format to chrono format
fn moment_to_chrono_format(format: &str) -> String {
    let replacements = [
        // Year
        ("YYYY", "%Y"),
        ("YY", "%y"),
        // Month
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        // Day of month
        ("DD", "%d"),
        // Time
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
        // Day of week
        ("dddd", "%A"),
        ("ddd", "%a"),
    ];

    let mut result = format.to_string();

    for (from, to) in replacements {
        result = result.replace(from, to);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_cms_date() {
        let date = parse_cms_date("2021-03-25T19:25:28+0000").unwrap();
        assert_eq!(date_xml(&date), "2021-03-25T19:25:28+00:00");

        let date = parse_cms_date("2021-03-25T19:25:28+00:00").unwrap();
        assert_eq!(date_xml(&date), "2021-03-25T19:25:28+00:00");

        assert!(parse_cms_date("yesterday").is_none());
    }

    #[test]
    fn test_format_date_pt_br() {
        let date = Utc.with_ymd_and_hms(2021, 3, 25, 19, 25, 28).unwrap();
        assert_eq!(format_date(&date, "DD MMM YYYY", "pt_BR"), "25 mar 2021");

        let date = Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(format_date(&date, "DD MMM YYYY", "pt_BR"), "01 fev 2021");
    }

    #[test]
    fn test_format_date_unknown_locale() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_date(&date, "YYYY-MM-DD", "xx_XX"), "2024-01-15");
    }

    #[test]
    fn test_display_date() {
        assert_eq!(
            display_date(Some("2021-04-19T12:00:00+0000"), "DD MMM YYYY", "pt_BR"),
            "19 abr 2021"
        );
        assert_eq!(display_date(None, "DD MMM YYYY", "pt_BR"), "");
    }

    #[test]
    fn test_moment_to_chrono() {
        assert_eq!(moment_to_chrono_format("DD MMM YYYY"), "%d %b %Y");
        assert_eq!(moment_to_chrono_format("HH:mm:ss"), "%H:%M:%S");
    }
}
