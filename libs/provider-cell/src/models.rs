use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::scheduling::Severity;
use shared_utils::fanout::TaskFailure;

// ==============================================================================
// COMPATIBILITY CONFIGURATION
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityWeights {
    pub specialty: f64,
    pub availability: f64,
    pub experience: f64,
    pub insurance: f64,
    pub location: f64,
    pub style: f64,
}

impl Default for CompatibilityWeights {
    fn default() -> Self {
        Self {
            specialty: 0.30,
            availability: 0.20,
            experience: 0.15,
            insurance: 0.15,
            location: 0.10,
            style: 0.10,
        }
    }
}

/// ICD-10 category (first three characters) and the specialty keywords that
/// cover it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialtyMapping {
    pub category: String,
    pub keywords: Vec<String>,
}

impl SpecialtyMapping {
    fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Experience step: `score` applies from `min_years` upward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExperienceStep {
    pub min_years: i32,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    pub weights: CompatibilityWeights,
    pub specialty_table: Vec<SpecialtyMapping>,
    pub no_diagnosis_score: f64,
    pub no_specialty_score: f64,
    /// Highest threshold first.
    pub experience_steps: Vec<ExperienceStep>,
    pub experience_floor: f64,
    pub not_schedulable_score: f64,
    pub not_accepting_score: f64,
    pub no_windows_score: f64,
    pub full_availability_score: f64,
    // Placeholders until insurance networks, office distance and
    // therapy-style preferences are captured.
    pub insurance_score: f64,
    pub location_score: f64,
    pub style_score: f64,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        let substance = ["substance", "addiction", "chemical dependency", "recovery"];
        let mut specialty_table = vec![
            SpecialtyMapping::new("F32", &["depression", "mood", "affective"]),
            SpecialtyMapping::new("F33", &["depression", "mood", "affective"]),
            SpecialtyMapping::new("F41", &["anxiety", "panic"]),
            SpecialtyMapping::new("F40", &["anxiety", "phobia"]),
            SpecialtyMapping::new("F43", &["trauma", "ptsd", "stress", "adjustment"]),
            SpecialtyMapping::new("F42", &["ocd", "obsessive"]),
            SpecialtyMapping::new("F31", &["bipolar", "mood"]),
            SpecialtyMapping::new("F90", &["adhd", "attention"]),
            SpecialtyMapping::new("F50", &["eating"]),
            SpecialtyMapping::new("F60", &["personality", "dbt"]),
            SpecialtyMapping::new("F20", &["psychosis", "schizophrenia"]),
            SpecialtyMapping::new("F84", &["autism", "developmental"]),
        ];
        for n in 10..=19 {
            specialty_table.push(SpecialtyMapping::new(&format!("F{}", n), &substance));
        }

        Self {
            weights: CompatibilityWeights::default(),
            specialty_table,
            no_diagnosis_score: 0.7,
            no_specialty_score: 0.5,
            experience_steps: vec![
                ExperienceStep { min_years: 10, score: 1.0 },
                ExperienceStep { min_years: 5, score: 0.9 },
                ExperienceStep { min_years: 3, score: 0.8 },
                ExperienceStep { min_years: 1, score: 0.7 },
            ],
            experience_floor: 0.6,
            not_schedulable_score: 0.0,
            not_accepting_score: 0.3,
            no_windows_score: 0.5,
            full_availability_score: 1.0,
            insurance_score: 0.8,
            location_score: 0.9,
            style_score: 0.8,
        }
    }
}

// ==============================================================================
// COMPATIBILITY RESULTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityDetails {
    pub diagnosis_categories: Vec<String>,
    pub matched_categories: Vec<String>,
    pub provider_specialties: Vec<String>,
    pub years_of_experience: Option<i32>,
    pub availability_windows: usize,
    pub total_appointments: i32,
    pub no_show_count: i32,
    pub cancellation_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub provider_id: Uuid,
    pub client_id: Uuid,
    pub overall_score: f64,
    pub specialty_match: f64,
    pub availability_match: f64,
    pub experience_match: f64,
    pub insurance_match: f64,
    pub location_match: f64,
    pub style_match: f64,
    pub details: CompatibilityDetails,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedProvider {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub compatibility: CompatibilityResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCompatibleProviders {
    pub client_id: Uuid,
    pub providers: Vec<RankedProvider>,
    pub failures: Vec<TaskFailure>,
}

// ==============================================================================
// LOAD BALANCING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancingConfig {
    pub underutilized_below: f64,
    pub overloaded_from: f64,
    pub critical_from: f64,
    pub current_week_weight: f64,
    pub next_week_weight: f64,
    /// Assumed weekly capacity when a provider has no windows.
    pub standard_week_minutes: i64,
    pub balance_dispersion_factor: f64,
    pub trend_increase_ratio: f64,
    pub trend_decrease_ratio: f64,
    pub trend_decrease_min_appointments: usize,
    pub high_variance_std_dev: f64,
    pub hire_staff_average_load: f64,
    pub poor_balance_score: f64,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self {
            underutilized_below: 40.0,
            overloaded_from: 80.0,
            critical_from: 95.0,
            current_week_weight: 0.6,
            next_week_weight: 0.4,
            standard_week_minutes: 2400,
            balance_dispersion_factor: 3.333,
            trend_increase_ratio: 1.5,
            trend_decrease_ratio: 0.5,
            trend_decrease_min_appointments: 5,
            high_variance_std_dev: 25.0,
            hire_staff_average_load: 85.0,
            poor_balance_score: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatus {
    Underutilized,
    Balanced,
    Overloaded,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekLoad {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_appointments: usize,
    pub booked_minutes: i64,
    pub available_minutes: i64,
    pub utilization_rate: f64,
    pub average_appointments_per_day: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderLoadMetrics {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub current_week: WeekLoad,
    pub next_week: WeekLoad,
    pub load_score: f64,
    pub status: LoadStatus,
    pub available_capacity: f64,
    pub trend: LoadTrend,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMetrics {
    pub total_providers: usize,
    pub active_providers: usize,
    pub average_load: f64,
    pub standard_deviation: f64,
    pub balance_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadImbalances {
    pub overloaded: Vec<Uuid>,
    pub underutilized: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamLoadDistribution {
    pub team_metrics: TeamMetrics,
    pub providers: Vec<ProviderLoadMetrics>,
    pub imbalances: LoadImbalances,
    pub recommendations: Vec<String>,
    /// Providers whose metrics could not be computed.
    pub failures: Vec<TaskFailure>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    Redistribute,
    IncreaseAvailability,
    HireStaff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancingRecommendation {
    pub recommendation_type: RecommendationType,
    pub severity: Severity,
    pub affected_providers: Vec<Uuid>,
    pub description: String,
    pub estimated_impact: String,
    pub action_items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapacity {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub available_capacity: f64,
    pub load_score: f64,
    pub status: LoadStatus,
}
