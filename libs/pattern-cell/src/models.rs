use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shared_models::scheduling::{PatternCategory, SchedulingPattern, Severity};
use shared_utils::fanout::TaskFailure;

/// `severity` applies once the measured value reaches `at_least`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeverityStep {
    pub at_least: f64,
    pub severity: Severity,
}

impl SeverityStep {
    const fn new(at_least: f64, severity: Severity) -> Self {
        Self { at_least, severity }
    }
}

/// First step (highest threshold first) the value reaches, else `floor`.
pub fn severity_for(steps: &[SeverityStep], value: f64, floor: Severity) -> Severity {
    steps
        .iter()
        .find(|step| value >= step.at_least)
        .map_or(floor, |step| step.severity)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetectionConfig {
    pub analysis_period_days: i64,

    // No-show clusters (rates are fractions)
    pub no_show_rate_threshold: f64,
    pub no_show_min_appointments: usize,
    pub no_show_provider_steps: Vec<SeverityStep>,
    pub no_show_day_steps: Vec<SeverityStep>,
    /// Severity of a flagged cluster below every step.
    pub no_show_floor: Severity,

    // Underutilization (fractions); a flagged provider at or above every
    // step is LOW
    pub underutilization_threshold: f64,
    /// Lowest ceiling first: utilization below `at_least` gets the severity.
    pub underutilization_steps: Vec<SeverityStep>,

    // Gap time
    pub gap_threshold_minutes: i64,
    pub gap_flag_average_minutes: f64,
    pub gap_flag_large_share: f64,
    pub gap_high_average_minutes: f64,
    pub gap_high_large_share: f64,
    pub gap_medium_average_minutes: f64,
    pub gap_medium_large_share: f64,
    pub gap_fill_session_minutes: i64,

    // Preference mismatch (compatibility on a 0-100 scale)
    pub mismatch_min_completed: usize,
    pub mismatch_score_below: f64,
    pub mismatch_min_clients: usize,
    pub mismatch_high_below: f64,
    pub mismatch_medium_below: f64,
}

impl Default for PatternDetectionConfig {
    fn default() -> Self {
        Self {
            analysis_period_days: 30,
            no_show_rate_threshold: 0.25,
            no_show_min_appointments: 5,
            no_show_provider_steps: vec![
                SeverityStep::new(0.40, Severity::Critical),
                SeverityStep::new(0.35, Severity::High),
                SeverityStep::new(0.30, Severity::Medium),
            ],
            no_show_day_steps: vec![
                SeverityStep::new(0.40, Severity::High),
                SeverityStep::new(0.30, Severity::Medium),
            ],
            no_show_floor: Severity::Medium,
            underutilization_threshold: 0.30,
            underutilization_steps: vec![
                SeverityStep::new(0.15, Severity::Critical),
                SeverityStep::new(0.20, Severity::High),
                SeverityStep::new(0.25, Severity::Medium),
            ],
            gap_threshold_minutes: 60,
            gap_flag_average_minutes: 60.0,
            gap_flag_large_share: 0.30,
            gap_high_average_minutes: 120.0,
            gap_high_large_share: 0.50,
            gap_medium_average_minutes: 90.0,
            gap_medium_large_share: 0.40,
            gap_fill_session_minutes: 45,
            mismatch_min_completed: 3,
            mismatch_score_below: 60.0,
            mismatch_min_clients: 2,
            mismatch_high_below: 40.0,
            mismatch_medium_below: 50.0,
        }
    }
}

impl PatternDetectionConfig {
    pub fn underutilization_severity(&self, utilization: f64) -> Severity {
        self.underutilization_steps
            .iter()
            .find(|step| utilization < step.at_least)
            .map_or(Severity::Low, |step| step.severity)
    }

    pub fn gap_severity(&self, average_gap: f64, large_share: f64) -> Severity {
        if average_gap >= self.gap_high_average_minutes || large_share >= self.gap_high_large_share {
            Severity::High
        } else if average_gap >= self.gap_medium_average_minutes
            || large_share >= self.gap_medium_large_share
        {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn mismatch_severity(&self, average_score: f64) -> Severity {
        if average_score < self.mismatch_high_below {
            Severity::High
        } else if average_score < self.mismatch_medium_below {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRun {
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    /// Patterns that were detected and stored.
    pub patterns: Vec<SchedulingPattern>,
    /// Detectors, providers or pairs that could not be analysed, and
    /// patterns that could not be stored.
    pub failures: Vec<TaskFailure>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionRequest {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivePatternQuery {
    pub severity: Option<Severity>,
    pub category: Option<PatternCategory>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternStatistics {
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
    pub ignored: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_show_provider_severity_table() {
        let config = PatternDetectionConfig::default();
        let severity = |rate| severity_for(&config.no_show_provider_steps, rate, config.no_show_floor);
        assert_eq!(severity(0.45), Severity::Critical);
        assert_eq!(severity(0.40), Severity::Critical);
        assert_eq!(severity(0.36), Severity::High);
        assert_eq!(severity(0.30), Severity::Medium);
        assert_eq!(severity(0.25), Severity::Medium);
    }

    #[test]
    fn day_of_week_caps_at_high() {
        let config = PatternDetectionConfig::default();
        assert_eq!(
            severity_for(&config.no_show_day_steps, 0.9, config.no_show_floor),
            Severity::High
        );
    }

    #[test]
    fn underutilization_and_gap_tables() {
        let config = PatternDetectionConfig::default();
        assert_eq!(config.underutilization_severity(0.10), Severity::Critical);
        assert_eq!(config.underutilization_severity(0.15), Severity::High);
        assert_eq!(config.underutilization_severity(0.22), Severity::Medium);
        assert_eq!(config.underutilization_severity(0.28), Severity::Low);

        assert_eq!(config.gap_severity(130.0, 0.1), Severity::High);
        assert_eq!(config.gap_severity(60.0, 0.5), Severity::High);
        assert_eq!(config.gap_severity(95.0, 0.1), Severity::Medium);
        assert_eq!(config.gap_severity(40.0, 0.3), Severity::Low);

        assert_eq!(config.mismatch_severity(35.0), Severity::High);
        assert_eq!(config.mismatch_severity(45.0), Severity::Medium);
        assert_eq!(config.mismatch_severity(55.0), Severity::Low);
    }
}
