//! Rule-based extraction over a lowercased request.
//!
//! Every function here is pure; looking names up in the store and logging
//! the attempt happen in [`crate::services::scheduler`].

use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;

use shared_models::scheduling::Intent;

use crate::models::{ParsedEntities, ParserConfig, TimeOfDay};
use crate::services::dates::contains_phrase;

struct IntentRule {
    intent: Intent,
    patterns: &'static [&'static str],
}

// First matching rule wins
const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Schedule,
        patterns: &[
            r"\b(schedule|book|make|create|set up|arrange)\b.*\b(appointment|session|meeting)\b",
            r"\b(appointment|session|meeting)\b.*\b(with|for)\b",
        ],
    },
    IntentRule {
        intent: Intent::Reschedule,
        patterns: &[
            r"\b(reschedule|move|change|shift)\b.*\b(appointment|session|meeting)\b",
            r"\b(change|move)\b.*\b(time|date)\b",
        ],
    },
    IntentRule {
        intent: Intent::Cancel,
        patterns: &[r"\b(cancel|delete|remove)\b.*\b(appointment|session|meeting)\b"],
    },
    IntentRule {
        intent: Intent::FindSlot,
        patterns: &[
            r"\b(find|show|get|give me)\b.*\b(available|open|free|slot|time)\b",
            r"\b(when|what time)\b.*\b(available|free|open)\b",
        ],
    },
    IntentRule {
        intent: Intent::CheckAvailability,
        patterns: &[
            r"\b(check|see|view)\b.*\b(availability|schedule|calendar)\b",
            r"\b(is|are)\b.*\b(available|free|open)\b",
        ],
    },
];

fn intent_regexes() -> &'static Vec<(Intent, Regex)> {
    static INTENT_RES: OnceLock<Vec<(Intent, Regex)>> = OnceLock::new();
    INTENT_RES.get_or_init(|| {
        INTENT_RULES
            .iter()
            .flat_map(|rule| {
                rule.patterns
                    .iter()
                    .map(move |p| (rule.intent, Regex::new(p).expect("intent regex must compile")))
            })
            .collect()
    })
}

fn doctor_regex() -> &'static Regex {
    static DOCTOR_RE: OnceLock<Regex> = OnceLock::new();
    DOCTOR_RE.get_or_init(|| {
        Regex::new(r"\b(?:dr\.?|doctor)\s+([a-z]+(?:\s+[a-z]+)?)\b").expect("doctor regex must compile")
    })
}

fn with_regex() -> &'static Regex {
    static WITH_RE: OnceLock<Regex> = OnceLock::new();
    WITH_RE.get_or_init(|| Regex::new(r"\bwith\s+([a-z]+(?:\s+[a-z]+)?)\b").expect("with regex must compile"))
}

fn for_regex() -> &'static Regex {
    static FOR_RE: OnceLock<Regex> = OnceLock::new();
    FOR_RE.get_or_init(|| Regex::new(r"\bfor\s+([a-z]+(?:\s+[a-z]+)?)\b").expect("for regex must compile"))
}

fn meridiem_time_regex() -> &'static Regex {
    static MERIDIEM_RE: OnceLock<Regex> = OnceLock::new();
    MERIDIEM_RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\b").expect("meridiem time regex must compile")
    })
}

fn clock_time_regex() -> &'static Regex {
    static CLOCK_RE: OnceLock<Regex> = OnceLock::new();
    CLOCK_RE.get_or_init(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("clock time regex must compile"))
}

fn at_hour_regex() -> &'static Regex {
    static AT_HOUR_RE: OnceLock<Regex> = OnceLock::new();
    AT_HOUR_RE.get_or_init(|| Regex::new(r"\bat\s+(\d{1,2})\b").expect("at-hour regex must compile"))
}

fn duration_regex() -> &'static Regex {
    static DURATION_RE: OnceLock<Regex> = OnceLock::new();
    DURATION_RE.get_or_init(|| {
        Regex::new(r"\b(\d+)\s*(minute|min|hour|hr)s?\b").expect("duration regex must compile")
    })
}

fn flexibility_regex() -> &'static Regex {
    static FLEXIBILITY_RE: OnceLock<Regex> = OnceLock::new();
    FLEXIBILITY_RE.get_or_init(|| {
        Regex::new(r"\b(?:within|in the next|up to)\s+(\d+)\s+days?\b").expect("flexibility regex must compile")
    })
}

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn extract_intent(text: &str) -> Option<Intent> {
    intent_regexes()
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(intent, _)| *intent)
}

/// Name fragments to look a provider up by, most specific first.
///
/// "Dr. X" wins over "with X"; within one phrase the two-word capture is
/// tried before each word on its own.
pub fn provider_name_candidates(text: &str, config: &ParserConfig) -> Vec<String> {
    let mut candidates = Vec::new();
    for re in [doctor_regex(), with_regex()] {
        if let Some(caps) = re.captures(text) {
            candidates.extend(name_fragments(&caps[1], config));
        }
    }
    candidates.dedup();
    candidates
}

/// Name fragments following "for", unless the first word is on the stoplist.
pub fn client_name_candidates(text: &str, config: &ParserConfig) -> Vec<String> {
    let Some(caps) = for_regex().captures(text) else {
        return Vec::new();
    };
    let phrase = &caps[1];
    let first = phrase.split_whitespace().next().unwrap_or_default();
    if config.client_stoplist.iter().any(|w| w == first || w == phrase) {
        return Vec::new();
    }
    name_fragments(phrase, config)
}

fn name_fragments(phrase: &str, config: &ParserConfig) -> Vec<String> {
    let words: Vec<&str> = phrase
        .split_whitespace()
        .take_while(|w| !config.name_stopwords.iter().any(|s| s == w))
        .collect();
    let mut fragments = Vec::new();
    if words.len() > 1 {
        fragments.push(words.join(" "));
    }
    fragments.extend(words.iter().filter(|w| w.len() > 1).map(|w| w.to_string()));
    fragments
}

/// Explicit time, or failing that a part of the day.
///
/// An hour from 1 to 7 with no am/pm is read as afternoon.
pub fn extract_time(text: &str) -> (Option<NaiveTime>, Option<TimeOfDay>) {
    if let Some(caps) = meridiem_time_regex().captures(text) {
        let hour: u32 = caps[1].parse().unwrap_or(99);
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok()).unwrap_or(99);
        let hour = match (&caps[3], hour) {
            ("p", h) if h < 12 => h + 12,
            ("a", 12) => 0,
            (_, h) => h,
        };
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            return (Some(time), None);
        }
    }

    let bare = clock_time_regex()
        .captures(text)
        .and_then(|caps| Some((caps[1].parse::<u32>().ok()?, caps[2].parse::<u32>().ok()?)))
        .or_else(|| {
            at_hour_regex()
                .captures(text)
                .and_then(|caps| Some((caps[1].parse::<u32>().ok()?, 0)))
        });
    if let Some((hour, minute)) = bare {
        let hour = if (1..=7).contains(&hour) { hour + 12 } else { hour };
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            return (Some(time), None);
        }
    }

    let time_of_day = if contains_phrase(text, "morning") {
        Some(TimeOfDay::Morning)
    } else if contains_phrase(text, "afternoon") {
        Some(TimeOfDay::Afternoon)
    } else if contains_phrase(text, "evening") {
        Some(TimeOfDay::Evening)
    } else {
        None
    };
    (None, time_of_day)
}

pub fn extract_duration(text: &str) -> Option<i32> {
    let caps = duration_regex().captures(text)?;
    let amount: i32 = caps[1].parse().ok()?;
    let minutes = match &caps[2] {
        "hour" | "hr" => amount.checked_mul(60)?,
        _ => amount,
    };
    (minutes > 0).then_some(minutes)
}

/// Keyword as named in the request, first letter capitalised.
pub fn extract_appointment_type(text: &str, config: &ParserConfig) -> Option<String> {
    let keyword = config
        .appointment_type_keywords
        .iter()
        .find(|keyword| contains_phrase(text, keyword))?;
    let mut chars = keyword.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

pub fn extract_flexibility(text: &str, config: &ParserConfig) -> Option<i64> {
    if let Some(caps) = flexibility_regex().captures(text) {
        return caps[1].parse().ok();
    }
    contains_phrase(text, "flexible").then_some(config.default_flexibility_days)
}

/// Weighted share of the evidence that was found, in `[0, 1]`.
pub fn confidence(entities: &ParsedEntities, config: &ParserConfig) -> f64 {
    let w = &config.weights;
    let mut score = 0.0;
    if entities.intent.is_some() {
        score += w.intent;
    }
    if entities.date.is_some() {
        score += w.date;
    } else if entities.date_text.is_some() {
        score += w.date_text_only;
    }
    if entities.time.is_some() {
        score += w.time;
    } else if entities.time_of_day.is_some() {
        score += w.time_of_day_only;
    }
    if entities.provider_id.is_some() {
        score += w.provider;
    }
    if entities.client_id.is_some() {
        score += w.client;
    }
    if entities.duration_minutes.is_some() {
        score += w.duration;
    }
    if entities.appointment_type.is_some() {
        score += w.appointment_type;
    }

    let max = w.intent + w.date + w.time + w.provider + w.client + w.duration + w.appointment_type;
    if max <= 0.0 {
        return 0.0;
    }
    (score / max).clamp(0.0, 1.0)
}

pub fn clarification_for(entities: &ParsedEntities) -> Option<String> {
    let Some(intent) = entities.intent else {
        return Some(
            "I could not determine what you want to do. Please specify if you want to schedule, \
             reschedule, cancel, or check availability."
                .to_string(),
        );
    };

    let mut missing = Vec::new();
    if matches!(intent, Intent::Schedule | Intent::FindSlot) {
        if entities.date.is_none() && entities.date_text.is_none() {
            missing.push("date");
        }
        if entities.time.is_none() && entities.time_of_day.is_none() {
            missing.push("time");
        }
    }
    if missing.is_empty() {
        return None;
    }
    Some(format!("Please specify the {} for the appointment.", missing.join(" and ")))
}
