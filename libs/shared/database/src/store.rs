use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use shared_models::scheduling::{
    AcceptOutcome, Appointment, AppointmentStatus, AppointmentType, AvailabilityWindow, Client,
    CompatibilityScore, NewAppointment, ParseLog, PatternCategory, PatternStatus, Provider,
    ProviderRole, SchedulingPattern, SchedulingSuggestion, Severity, TimeOffRequest,
    TransitionOutcome,
};

/// Provider listing filter. `None`/empty means "don't filter on this".
#[derive(Debug, Clone, Default)]
pub struct ProviderFilter {
    pub roles: Vec<ProviderRole>,
    pub active_only: bool,
    pub schedulable_only: bool,
    pub accepting_new_clients_only: bool,
    /// Case-insensitive substring match on first or last name.
    pub name_contains: Option<String>,
}

impl ProviderFilter {
    pub fn active_with_roles(roles: &[ProviderRole]) -> Self {
        Self {
            roles: roles.to_vec(),
            active_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, provider: &Provider) -> bool {
        if !self.roles.is_empty() && !provider.has_any_role(&self.roles) {
            return false;
        }
        if self.active_only && !provider.is_active {
            return false;
        }
        if self.schedulable_only && !provider.available_for_scheduling {
            return false;
        }
        if self.accepting_new_clients_only && !provider.accepts_new_clients {
            return false;
        }
        if let Some(ref fragment) = self.name_contains {
            let fragment = fragment.to_lowercase();
            return provider.first_name.to_lowercase().contains(&fragment)
                || provider.last_name.to_lowercase().contains(&fragment);
        }
        true
    }
}

/// Appointment listing filter; dates are inclusive.
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub provider_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub statuses: Option<Vec<AppointmentStatus>>,
}

impl AppointmentQuery {
    pub fn for_provider(provider_id: Uuid, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            provider_id: Some(provider_id),
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }

    pub fn in_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[AppointmentStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.provider_id.map_or(true, |id| appointment.provider_id == id)
            && self.client_id.map_or(true, |id| appointment.client_id == id)
            && self.start_date.map_or(true, |d| appointment.appointment_date >= d)
            && self.end_date.map_or(true, |d| appointment.appointment_date <= d)
            && self
                .statuses
                .as_ref()
                .map_or(true, |s| s.contains(&appointment.status))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionQuery {
    pub client_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PatternQuery {
    pub status: Option<PatternStatus>,
    pub severity: Option<Severity>,
    pub category: Option<PatternCategory>,
}

impl PatternQuery {
    pub fn matches(&self, pattern: &SchedulingPattern) -> bool {
        self.status.map_or(true, |s| pattern.status == s)
            && self.severity.map_or(true, |s| pattern.severity == s)
            && self.category.map_or(true, |c| pattern.category == c)
    }
}

/// Read/write contract the engines need from the practice's calendar store.
///
/// Lists come back unordered unless stated; callers sort what they rely on.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>>;
    async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Provider>>;

    async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>>;
    /// Active clients whose first or last name contains `fragment` (case-insensitive).
    async fn find_active_clients_by_name(&self, fragment: &str) -> Result<Vec<Client>>;

    async fn list_availability(&self, provider_id: Uuid) -> Result<Vec<AvailabilityWindow>>;
    async fn list_time_off(
        &self,
        provider_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimeOffRequest>>;

    /// Ordered by date then start time.
    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>>;
    async fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment>;

    async fn get_appointment_type(&self, type_id: Uuid) -> Result<Option<AppointmentType>>;
    async fn list_active_appointment_types(&self) -> Result<Vec<AppointmentType>>;

    async fn get_compatibility(
        &self,
        provider_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<CompatibilityScore>>;
    /// Insert or overwrite the row for `(provider_id, client_id)`.
    async fn upsert_compatibility(&self, score: CompatibilityScore) -> Result<CompatibilityScore>;

    async fn insert_suggestion(&self, suggestion: SchedulingSuggestion) -> Result<SchedulingSuggestion>;
    async fn get_suggestion(&self, suggestion_id: Uuid) -> Result<Option<SchedulingSuggestion>>;
    /// Newest first.
    async fn list_suggestions(&self, query: &SuggestionQuery) -> Result<Vec<SchedulingSuggestion>>;
    async fn count_suggestions(&self, client_id: Option<Uuid>) -> Result<usize>;
    /// Create the appointment and flag the suggestion accepted as one unit.
    /// Only a suggestion that is not yet accepted may transition.
    async fn accept_suggestion(
        &self,
        suggestion_id: Uuid,
        appointment: NewAppointment,
        accepted_by: &str,
        accepted_at: DateTime<Utc>,
    ) -> Result<AcceptOutcome>;

    async fn insert_pattern(&self, pattern: SchedulingPattern) -> Result<SchedulingPattern>;
    async fn get_pattern(&self, pattern_id: Uuid) -> Result<Option<SchedulingPattern>>;
    async fn list_patterns(&self, query: &PatternQuery) -> Result<Vec<SchedulingPattern>>;
    /// Conditional update: only an ACTIVE pattern moves to `status`.
    async fn transition_pattern(
        &self,
        pattern_id: Uuid,
        status: PatternStatus,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    async fn insert_parse_log(&self, log: ParseLog) -> Result<()>;
}
