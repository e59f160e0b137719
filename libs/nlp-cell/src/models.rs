use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scheduling_cell::GeneratedSuggestions;
use shared_models::scheduling::{Appointment, Intent, SchedulingSuggestion};
use shared_models::time_format;

/// Share of the confidence score each extracted field contributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub intent: f64,
    pub date: f64,
    /// Date wording was found but could not be turned into a date.
    pub date_text_only: f64,
    pub time: f64,
    pub time_of_day_only: f64,
    pub provider: f64,
    pub client: f64,
    pub duration: f64,
    pub appointment_type: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            intent: 0.40,
            date: 0.25,
            date_text_only: 0.15,
            time: 0.15,
            time_of_day_only: 0.10,
            provider: 0.10,
            client: 0.05,
            duration: 0.03,
            appointment_type: 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    pub weights: ConfidenceWeights,
    pub success_threshold: f64,
    pub max_request_chars: usize,
    /// Words after "for" that never name a client.
    pub client_stoplist: Vec<String>,
    /// Words that never start a provider or client name.
    pub name_stopwords: Vec<String>,
    /// Checked in order; the first keyword present wins.
    pub appointment_type_keywords: Vec<String>,
    pub default_flexibility_days: i64,
    #[serde(with = "time_format")]
    pub morning_start: NaiveTime,
    #[serde(with = "time_format")]
    pub afternoon_start: NaiveTime,
    #[serde(with = "time_format")]
    pub evening_start: NaiveTime,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn on_the_hour(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
            success_threshold: 0.5,
            max_request_chars: 500,
            client_stoplist: words(&["me", "myself", "client", "patient", "session", "appointment"]),
            name_stopwords: words(&[
                "dr", "doctor", "the", "a", "an", "my", "me", "at", "on", "in", "for", "today",
                "tomorrow", "next", "this", "morning", "afternoon", "evening",
            ]),
            appointment_type_keywords: words(&[
                "initial",
                "intake",
                "follow-up",
                "followup",
                "consultation",
                "therapy",
                "evaluation",
                "assessment",
                "check-in",
            ]),
            default_flexibility_days: 7,
            morning_start: on_the_hour(9),
            afternoon_start: on_the_hour(13),
            evening_start: on_the_hour(17),
        }
    }
}

impl ParserConfig {
    pub fn start_of(&self, time_of_day: TimeOfDay) -> NaiveTime {
        match time_of_day {
            TimeOfDay::Morning => self.morning_start,
            TimeOfDay::Afternoon => self.afternoon_start,
            TimeOfDay::Evening => self.evening_start,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "MORNING",
            TimeOfDay::Afternoon => "AFTERNOON",
            TimeOfDay::Evening => "EVENING",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParsedEntities {
    pub intent: Option<Intent>,
    pub provider_name: Option<String>,
    pub provider_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub client_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    /// The wording the date came from, kept even when it did not resolve.
    pub date_text: Option<String>,
    #[serde(with = "time_format::option", default)]
    pub time: Option<NaiveTime>,
    pub time_of_day: Option<TimeOfDay>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<String>,
    pub flexibility_days: Option<i64>,
}

impl ParsedEntities {
    /// Explicit time, else the start of the named part of the day.
    pub fn preferred_time(&self, config: &ParserConfig) -> Option<NaiveTime> {
        self.time.or_else(|| self.time_of_day.map(|t| config.start_of(t)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseResult {
    pub success: bool,
    pub confidence: f64,
    pub intent: Option<Intent>,
    pub entities: ParsedEntities,
    pub clarification_needed: Option<String>,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NlpRequest {
    pub request_text: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The top suggestion was accepted and booked.
    Booked {
        message: String,
        appointment: Appointment,
        suggestion: SchedulingSuggestion,
    },
    NoSlots {
        message: String,
    },
    SlotsFound {
        suggestions: GeneratedSuggestions,
    },
    Availability {
        provider_id: Uuid,
        date: NaiveDate,
        available: bool,
        appointments: Vec<Appointment>,
    },
}
