use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::scheduling::{Appointment, SchedulingSuggestion};
use shared_models::time_format;
use shared_utils::fanout::TaskFailure;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionWeights {
    pub compatibility: f64,
    pub load_balance: f64,
    pub efficiency: f64,
}

impl Default for SuggestionWeights {
    fn default() -> Self {
        Self {
            compatibility: 0.4,
            load_balance: 0.3,
            efficiency: 0.3,
        }
    }
}

/// Score applied while the count/gap is at or below `up_to`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreStep {
    pub up_to: i64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    pub weights: SuggestionWeights,
    pub slot_step_minutes: i64,
    pub max_alternatives: usize,
    pub global_top_n: usize,
    pub default_flexibility_days: i64,
    pub max_flexibility_days: i64,
    /// Same-day appointment count -> load score, ascending.
    pub day_load_steps: Vec<ScoreStep>,
    pub busiest_day_score: f64,
    /// Minutes to the nearest neighbouring appointment -> efficiency, ascending.
    pub gap_steps: Vec<ScoreStep>,
    pub wide_gap_score: f64,
    pub empty_day_efficiency: f64,
    pub high_confidence: f64,
    pub medium_confidence: f64,
    pub reasoning_threshold: f64,
    pub experienced_years: i32,
    /// Multiply overall scores by the provider's load-balancing adjustment.
    pub apply_load_adjustment: bool,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            weights: SuggestionWeights::default(),
            slot_step_minutes: 15,
            max_alternatives: 5,
            global_top_n: 5,
            default_flexibility_days: 7,
            max_flexibility_days: 30,
            day_load_steps: vec![
                ScoreStep { up_to: 0, score: 1.0 },
                ScoreStep { up_to: 2, score: 0.9 },
                ScoreStep { up_to: 4, score: 0.7 },
                ScoreStep { up_to: 6, score: 0.5 },
            ],
            busiest_day_score: 0.3,
            gap_steps: vec![
                ScoreStep { up_to: 15, score: 1.0 },
                ScoreStep { up_to: 30, score: 0.9 },
                ScoreStep { up_to: 60, score: 0.7 },
            ],
            wide_gap_score: 0.5,
            empty_day_efficiency: 0.8,
            high_confidence: 0.8,
            medium_confidence: 0.6,
            reasoning_threshold: 0.8,
            experienced_years: 5,
            apply_load_adjustment: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingRequest {
    pub client_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub appointment_type_id: Uuid,
    pub requested_date: Option<NaiveDate>,
    #[serde(with = "time_format::option", default)]
    pub requested_time: Option<NaiveTime>,
    pub flexibility_days: Option<i64>,
    pub duration_minutes: Option<i32>,
}

impl SchedulingRequest {
    pub fn new(client_id: Uuid, appointment_type_id: Uuid) -> Self {
        Self {
            client_id,
            provider_id: None,
            appointment_type_id,
            requested_date: None,
            requested_time: None,
            flexibility_days: None,
            duration_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSuggestions {
    pub request_id: Uuid,
    /// Best first.
    pub suggestions: Vec<SchedulingSuggestion>,
    /// Providers skipped because their evaluation failed.
    pub failures: Vec<TaskFailure>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptSuggestionRequest {
    pub accepted_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedSuggestion {
    pub suggestion: SchedulingSuggestion,
    pub appointment: Appointment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionHistory {
    pub suggestions: Vec<SchedulingSuggestion>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSuggestionCount {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionStats {
    pub total_suggestions: usize,
    pub accepted_suggestions: usize,
    pub acceptance_rate: f64,
    pub average_overall_score: f64,
    pub top_providers: Vec<ProviderSuggestionCount>,
}
