use std::sync::OnceLock;

use chrono::{Datelike, Days, Duration, Months, NaiveDate, Weekday};
use regex::Regex;

/// A date phrase found in a request. `date` is `None` when the wording was
/// recognised but does not name a real day (e.g. `02/30/2026`).
#[derive(Debug, Clone, PartialEq)]
pub struct DateMatch {
    pub date: Option<NaiveDate>,
    pub text: String,
}

impl DateMatch {
    fn resolved(date: NaiveDate, text: &str) -> Self {
        Self {
            date: Some(date),
            text: text.to_string(),
        }
    }
}

fn weekday_regex() -> &'static Regex {
    static WEEKDAY_RE: OnceLock<Regex> = OnceLock::new();
    WEEKDAY_RE.get_or_init(|| {
        Regex::new(r"\b(?:(?:next|this)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
            .expect("weekday regex must compile")
    })
}

fn us_date_regex() -> &'static Regex {
    static US_DATE_RE: OnceLock<Regex> = OnceLock::new();
    US_DATE_RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").expect("us date regex must compile")
    })
}

fn iso_date_regex() -> &'static Regex {
    static ISO_DATE_RE: OnceLock<Regex> = OnceLock::new();
    ISO_DATE_RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("iso date regex must compile"))
}

fn relative_regex() -> &'static Regex {
    static RELATIVE_RE: OnceLock<Regex> = OnceLock::new();
    RELATIVE_RE.get_or_init(|| {
        Regex::new(r"\bin\s+(\d+)\s+(day|week|month)s?\b").expect("relative date regex must compile")
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whole-word match of `phrase` in `text`, the same boundary rule as `\b`.
pub(crate) fn contains_phrase(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    text.match_indices(phrase).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + phrase.len()..].chars().next();
        let opens = phrase.starts_with(is_word_char);
        let closes = phrase.ends_with(is_word_char);
        before.map_or(true, |c| is_word_char(c) != opens) && after.map_or(true, |c| is_word_char(c) != closes)
    })
}

fn weekday_named(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Days from `today` to the next `target`, in `1..=7`.
///
/// Naming today's weekday means a week from now; "this" and "next" roll the
/// same way.
pub fn days_until(target: Weekday, today: Weekday) -> i64 {
    let ahead = target.num_days_from_sunday() as i64 - today.num_days_from_sunday() as i64;
    if ahead <= 0 {
        ahead + 7
    } else {
        ahead
    }
}

/// First date phrase in lowercase `text`, resolved against `today`.
pub fn resolve_date(text: &str, today: NaiveDate) -> Option<DateMatch> {
    // Longest phrase first so "day after tomorrow" is not read as "tomorrow"
    if contains_phrase(text, "day after tomorrow") {
        return Some(DateMatch::resolved(today + Duration::days(2), "day after tomorrow"));
    }
    if contains_phrase(text, "today") {
        return Some(DateMatch::resolved(today, "today"));
    }
    if contains_phrase(text, "tomorrow") {
        return Some(DateMatch::resolved(today + Duration::days(1), "tomorrow"));
    }
    if contains_phrase(text, "next week") {
        return Some(DateMatch::resolved(today + Duration::weeks(1), "next week"));
    }
    if contains_phrase(text, "this week") {
        return Some(DateMatch::resolved(today, "this week"));
    }

    if let Some(caps) = weekday_regex().captures(text) {
        if let Some(target) = weekday_named(&caps[1]) {
            let date = today + Duration::days(days_until(target, today.weekday()));
            return Some(DateMatch::resolved(date, &caps[0]));
        }
    }

    if let Some(caps) = iso_date_regex().captures(text) {
        let date = calendar_date(&caps[1], &caps[2], &caps[3]);
        return Some(DateMatch {
            date,
            text: caps[0].to_string(),
        });
    }
    if let Some(caps) = us_date_regex().captures(text) {
        let date = calendar_date(&caps[3], &caps[1], &caps[2]);
        return Some(DateMatch {
            date,
            text: caps[0].to_string(),
        });
    }

    if let Some(caps) = relative_regex().captures(text) {
        let date = caps[1].parse::<u32>().ok().and_then(|amount| match &caps[2] {
            "day" => today.checked_add_days(Days::new(amount as u64)),
            "week" => today.checked_add_days(Days::new(amount as u64 * 7)),
            _ => today.checked_add_months(Months::new(amount)),
        });
        return Some(DateMatch {
            date,
            text: caps[0].to_string(),
        });
    }

    None
}

fn calendar_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}
