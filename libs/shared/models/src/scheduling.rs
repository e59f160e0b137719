use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time_format;

// ==============================================================================
// PROVIDERS & CLIENTS (read-only to the engines)
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderRole {
    Clinician,
    Supervisor,
    Administrator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub roles: Vec<ProviderRole>,
    pub is_active: bool,
    pub available_for_scheduling: bool,
    pub accepts_new_clients: bool,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub years_of_experience: Option<i32>,
}

impl Provider {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_any_role(&self, roles: &[ProviderRole]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }

    /// Active, open for scheduling and taking new clients.
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.available_for_scheduling && self.accepts_new_clients
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientStatus {
    Active,
    Inactive,
    Discharged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub status: ClientStatus,
    #[serde(default)]
    pub insurance_ids: Vec<String>,
    /// Active ICD-10 diagnosis codes, e.g. `F32.1`.
    #[serde(default)]
    pub diagnosis_codes: Vec<String>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ==============================================================================
// CALENDAR
// ==============================================================================

/// A recurring weekly window in which a provider sees clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub provider_id: Uuid,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u32,
    #[serde(with = "time_format")]
    pub start_time: NaiveTime,
    #[serde(with = "time_format")]
    pub end_time: NaiveTime,
    pub effective_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub max_appointments_per_day: Option<i32>,
    #[serde(default)]
    pub is_telehealth: bool,
    pub office_location_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl AvailabilityWindow {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes().max(0)
    }

    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_date.map_or(true, |d| d <= date)
            && self.expiry_date.map_or(true, |d| d >= date)
    }

    /// True when the window's effective range intersects `[start, end]`.
    pub fn overlaps_range(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.is_active
            && self.effective_date.map_or(true, |d| d <= end)
            && self.expiry_date.map_or(true, |d| d >= start)
    }

    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.day_of_week == date.weekday().num_days_from_sunday() && self.is_effective_on(date)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    InSession,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
        AppointmentStatus::InSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
            AppointmentStatus::InSession => "IN_SESSION",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "time_format")]
    pub start_time: NaiveTime,
    #[serde(with = "time_format")]
    pub end_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub appointment_type_id: Option<Uuid>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open interval overlap on the same date.
    pub fn overlaps(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.appointment_date == date && start < self.end_time && self.start_time < end
    }
}

/// Fields needed to book an appointment; the store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "time_format")]
    pub start_time: NaiveTime,
    #[serde(with = "time_format")]
    pub end_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub appointment_type_id: Option<Uuid>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentType {
    pub id: Uuid,
    pub type_name: String,
    pub default_duration_minutes: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeOffStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOffRequest {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: TimeOffStatus,
}

impl TimeOffRequest {
    pub fn blocks(&self, date: NaiveDate) -> bool {
        self.status == TimeOffStatus::Approved && self.start_date <= date && date <= self.end_date
    }
}

// ==============================================================================
// COMPATIBILITY
// ==============================================================================

/// Cached provider/client match; at most one row per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityScore {
    pub provider_id: Uuid,
    pub client_id: Uuid,
    pub overall_score: f64,
    pub specialty_match: f64,
    pub availability_match: f64,
    pub experience_match: f64,
    pub insurance_match: f64,
    pub location_match: f64,
    pub style_match: f64,
    pub total_appointments: i32,
    pub no_show_count: i32,
    pub cancellation_count: i32,
    pub factors: serde_json::Value,
    pub last_calculated: DateTime<Utc>,
}

// ==============================================================================
// SUGGESTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionType {
    OptimalSlot,
    AlternativeProvider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub date: NaiveDate,
    #[serde(with = "time_format")]
    pub start_time: NaiveTime,
    #[serde(with = "time_format")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingSuggestion {
    pub id: Uuid,
    pub request_id: Uuid,
    pub suggestion_type: SuggestionType,
    pub client_id: Uuid,
    pub requested_provider_id: Option<Uuid>,
    pub appointment_type_id: Uuid,
    pub requested_date: Option<NaiveDate>,
    #[serde(with = "time_format::option", default)]
    pub requested_time: Option<NaiveTime>,
    pub flexibility_days: i64,
    pub suggested_provider_id: Uuid,
    pub provider_name: String,
    pub suggested_date: NaiveDate,
    #[serde(with = "time_format")]
    pub suggested_time: NaiveTime,
    pub suggested_duration: i32,
    #[serde(default)]
    pub alternative_slots: Vec<TimeSlot>,
    pub compatibility_score: f64,
    pub load_balance_score: f64,
    pub efficiency_score: f64,
    pub overall_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub reasoning: String,
    pub was_accepted: bool,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<String>,
    pub created_appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Result of the store's atomic accept operation.
#[derive(Debug, Clone)]
pub enum AcceptOutcome {
    Accepted {
        suggestion: SchedulingSuggestion,
        appointment: Appointment,
    },
    AlreadyAccepted,
    NotFound,
}

// ==============================================================================
// PATTERNS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    Inefficiency,
    Optimization,
    Trend,
    Anomaly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternCategory {
    NoShowCluster,
    Underutilization,
    Overbooking,
    GapTime,
    PreferenceMismatch,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::NoShowCluster => "NO_SHOW_CLUSTER",
            PatternCategory::Underutilization => "UNDERUTILIZATION",
            PatternCategory::Overbooking => "OVERBOOKING",
            PatternCategory::GapTime => "GAP_TIME",
            PatternCategory::PreferenceMismatch => "PREFERENCE_MISMATCH",
        }
    }
}

/// Ordered so that `Critical` sorts highest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternStatus {
    Active,
    Resolved,
    Ignored,
}

impl PatternStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternStatus::Active => "ACTIVE",
            PatternStatus::Resolved => "RESOLVED",
            PatternStatus::Ignored => "IGNORED",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffectedEntities {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub client_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingPattern {
    pub id: Uuid,
    pub pattern_type: PatternType,
    pub category: PatternCategory,
    pub severity: Severity,
    pub affected_entities: AffectedEntities,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    pub description: String,
    pub recommendations: Vec<String>,
    pub estimated_impact: String,
    pub metrics: serde_json::Value,
    pub status: PatternStatus,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

/// Result of the store's conditional ACTIVE -> RESOLVED/IGNORED update.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Updated(SchedulingPattern),
    NotActive(PatternStatus),
    NotFound,
}

// ==============================================================================
// NATURAL LANGUAGE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Schedule,
    Reschedule,
    Cancel,
    FindSlot,
    CheckAvailability,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Schedule => "SCHEDULE",
            Intent::Reschedule => "RESCHEDULE",
            Intent::Cancel => "CANCEL",
            Intent::FindSlot => "FIND_SLOT",
            Intent::CheckAvailability => "CHECK_AVAILABILITY",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit row, one per parse attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseLog {
    pub id: Uuid,
    pub user_id: String,
    pub request_text: String,
    pub parsed_intent: Option<Intent>,
    pub parsed_entities: serde_json::Value,
    pub confidence: f64,
    pub parsing_success: bool,
    pub clarification_needed: Option<String>,
    pub parse_latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(day: u32) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            expiry_date: NaiveDate::from_ymd_opt(2026, 6, 30),
            max_appointments_per_day: None,
            is_telehealth: false,
            office_location_id: None,
            is_active: true,
        }
    }

    #[test]
    fn window_applies_on_matching_weekday_inside_range() {
        // 2026-03-02 is a Monday
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(window(1).applies_to(monday));
        assert!(!window(2).applies_to(monday));
        let after_expiry = NaiveDate::from_ymd_opt(2026, 7, 6).unwrap();
        assert!(!window(1).applies_to(after_expiry));
        assert_eq!(window(1).duration_minutes(), 180);
    }

    #[test]
    fn severity_orders_critical_highest() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn statuses_use_screaming_case_on_the_wire() {
        let json = serde_json::to_string(&AppointmentStatus::NoShow).unwrap();
        assert_eq!(json, "\"NO_SHOW\"");
        let parsed: Intent = serde_json::from_str("\"FIND_SLOT\"").unwrap();
        assert_eq!(parsed, Intent::FindSlot);
    }
}
