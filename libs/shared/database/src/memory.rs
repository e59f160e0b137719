use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use shared_models::scheduling::{
    AcceptOutcome, Appointment, AppointmentType, AvailabilityWindow, Client, ClientStatus,
    CompatibilityScore, NewAppointment, ParseLog, PatternStatus, Provider, SchedulingPattern,
    SchedulingSuggestion, TimeOffRequest, TransitionOutcome,
};

use crate::store::{
    AppointmentQuery, PatternQuery, ProviderFilter, SchedulingStore, SuggestionQuery,
};

/// Store operations that can be forced to fail, for exercising the
/// partial-failure paths of the engines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    AvailabilityFor(Uuid),
    CompatibilityLookup,
    PatternInsert,
    ParseLogInsert,
}

#[derive(Default)]
struct Inner {
    providers: HashMap<Uuid, Provider>,
    clients: HashMap<Uuid, Client>,
    availability: Vec<AvailabilityWindow>,
    time_off: Vec<TimeOffRequest>,
    appointments: Vec<Appointment>,
    appointment_types: Vec<AppointmentType>,
    compatibility: HashMap<(Uuid, Uuid), CompatibilityScore>,
    suggestions: Vec<SchedulingSuggestion>,
    patterns: Vec<SchedulingPattern>,
    parse_logs: Vec<ParseLog>,
    failures: HashSet<FailurePoint>,
}

/// Process-local store. Every operation runs under one lock, so the
/// conditional updates are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_provider(&self, provider: Provider) {
        self.state().providers.insert(provider.id, provider);
    }

    pub fn add_client(&self, client: Client) {
        self.state().clients.insert(client.id, client);
    }

    pub fn add_availability(&self, window: AvailabilityWindow) {
        self.state().availability.push(window);
    }

    pub fn add_time_off(&self, request: TimeOffRequest) {
        self.state().time_off.push(request);
    }

    pub fn add_appointment(&self, appointment: Appointment) {
        self.state().appointments.push(appointment);
    }

    pub fn add_appointment_type(&self, appointment_type: AppointmentType) {
        self.state().appointment_types.push(appointment_type);
    }

    pub fn put_compatibility(&self, score: CompatibilityScore) {
        self.state()
            .compatibility
            .insert((score.provider_id, score.client_id), score);
    }

    pub fn inject_failure(&self, point: FailurePoint) {
        self.state().failures.insert(point);
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.state().appointments.clone()
    }

    pub fn suggestions(&self) -> Vec<SchedulingSuggestion> {
        self.state().suggestions.clone()
    }

    pub fn patterns(&self) -> Vec<SchedulingPattern> {
        self.state().patterns.clone()
    }

    pub fn parse_logs(&self) -> Vec<ParseLog> {
        self.state().parse_logs.clone()
    }

    pub fn compatibility_rows(&self) -> Vec<CompatibilityScore> {
        self.state().compatibility.values().cloned().collect()
    }
}

fn appointment_from(new: NewAppointment, now: DateTime<Utc>) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        client_id: new.client_id,
        provider_id: new.provider_id,
        appointment_date: new.appointment_date,
        start_time: new.start_time,
        end_time: new.end_time,
        duration_minutes: new.duration_minutes,
        status: new.status,
        appointment_type_id: new.appointment_type_id,
        created_by: new.created_by,
        created_at: now,
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>> {
        Ok(self.state().providers.get(&provider_id).cloned())
    }

    async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Provider>> {
        let mut providers: Vec<Provider> = self
            .state()
            .providers
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        providers.sort_by(|a, b| (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id)));
        Ok(providers)
    }

    async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>> {
        Ok(self.state().clients.get(&client_id).cloned())
    }

    async fn find_active_clients_by_name(&self, fragment: &str) -> Result<Vec<Client>> {
        let fragment = fragment.to_lowercase();
        let mut clients: Vec<Client> = self
            .state()
            .clients
            .values()
            .filter(|c| c.status == ClientStatus::Active)
            .filter(|c| {
                c.first_name.to_lowercase().contains(&fragment)
                    || c.last_name.to_lowercase().contains(&fragment)
            })
            .cloned()
            .collect();
        clients.sort_by(|a, b| (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id)));
        Ok(clients)
    }

    async fn list_availability(&self, provider_id: Uuid) -> Result<Vec<AvailabilityWindow>> {
        let state = self.state();
        if state.failures.contains(&FailurePoint::AvailabilityFor(provider_id)) {
            return Err(anyhow!("availability lookup failed for provider {}", provider_id));
        }
        Ok(state
            .availability
            .iter()
            .filter(|w| w.provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn list_time_off(
        &self,
        provider_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimeOffRequest>> {
        Ok(self
            .state()
            .time_off
            .iter()
            .filter(|t| t.provider_id == provider_id && t.start_date <= end && t.end_date >= start)
            .cloned()
            .collect())
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = self
            .state()
            .appointments
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        appointments.sort_by_key(|a| (a.appointment_date, a.start_time));
        Ok(appointments)
    }

    async fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment> {
        let created = appointment_from(appointment, Utc::now());
        self.state().appointments.push(created.clone());
        Ok(created)
    }

    async fn get_appointment_type(&self, type_id: Uuid) -> Result<Option<AppointmentType>> {
        Ok(self
            .state()
            .appointment_types
            .iter()
            .find(|t| t.id == type_id)
            .cloned())
    }

    async fn list_active_appointment_types(&self) -> Result<Vec<AppointmentType>> {
        Ok(self
            .state()
            .appointment_types
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn get_compatibility(
        &self,
        provider_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<CompatibilityScore>> {
        let state = self.state();
        if state.failures.contains(&FailurePoint::CompatibilityLookup) {
            return Err(anyhow!("compatibility lookup failed"));
        }
        Ok(state.compatibility.get(&(provider_id, client_id)).cloned())
    }

    async fn upsert_compatibility(&self, score: CompatibilityScore) -> Result<CompatibilityScore> {
        self.state()
            .compatibility
            .insert((score.provider_id, score.client_id), score.clone());
        Ok(score)
    }

    async fn insert_suggestion(&self, suggestion: SchedulingSuggestion) -> Result<SchedulingSuggestion> {
        self.state().suggestions.push(suggestion.clone());
        Ok(suggestion)
    }

    async fn get_suggestion(&self, suggestion_id: Uuid) -> Result<Option<SchedulingSuggestion>> {
        Ok(self
            .state()
            .suggestions
            .iter()
            .find(|s| s.id == suggestion_id)
            .cloned())
    }

    async fn list_suggestions(&self, query: &SuggestionQuery) -> Result<Vec<SchedulingSuggestion>> {
        let mut suggestions: Vec<SchedulingSuggestion> = self
            .state()
            .suggestions
            .iter()
            .filter(|s| query.client_id.map_or(true, |id| s.client_id == id))
            .cloned()
            .collect();
        suggestions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(suggestions.into_iter().skip(query.offset).take(limit).collect())
    }

    async fn count_suggestions(&self, client_id: Option<Uuid>) -> Result<usize> {
        Ok(self
            .state()
            .suggestions
            .iter()
            .filter(|s| client_id.map_or(true, |id| s.client_id == id))
            .count())
    }

    async fn accept_suggestion(
        &self,
        suggestion_id: Uuid,
        appointment: NewAppointment,
        accepted_by: &str,
        accepted_at: DateTime<Utc>,
    ) -> Result<AcceptOutcome> {
        let mut state = self.state();
        let Some(index) = state.suggestions.iter().position(|s| s.id == suggestion_id) else {
            return Ok(AcceptOutcome::NotFound);
        };
        if state.suggestions[index].was_accepted {
            return Ok(AcceptOutcome::AlreadyAccepted);
        }

        let created = appointment_from(appointment, accepted_at);
        state.appointments.push(created.clone());

        let suggestion = &mut state.suggestions[index];
        suggestion.was_accepted = true;
        suggestion.accepted_at = Some(accepted_at);
        suggestion.accepted_by = Some(accepted_by.to_string());
        suggestion.created_appointment_id = Some(created.id);

        Ok(AcceptOutcome::Accepted {
            suggestion: suggestion.clone(),
            appointment: created,
        })
    }

    async fn insert_pattern(&self, pattern: SchedulingPattern) -> Result<SchedulingPattern> {
        let mut state = self.state();
        if state.failures.contains(&FailurePoint::PatternInsert) {
            return Err(anyhow!("pattern insert failed"));
        }
        state.patterns.push(pattern.clone());
        Ok(pattern)
    }

    async fn get_pattern(&self, pattern_id: Uuid) -> Result<Option<SchedulingPattern>> {
        Ok(self
            .state()
            .patterns
            .iter()
            .find(|p| p.id == pattern_id)
            .cloned())
    }

    async fn list_patterns(&self, query: &PatternQuery) -> Result<Vec<SchedulingPattern>> {
        Ok(self
            .state()
            .patterns
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect())
    }

    async fn transition_pattern(
        &self,
        pattern_id: Uuid,
        status: PatternStatus,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state();
        let Some(pattern) = state.patterns.iter_mut().find(|p| p.id == pattern_id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if pattern.status != PatternStatus::Active {
            return Ok(TransitionOutcome::NotActive(pattern.status));
        }
        pattern.status = status;
        pattern.resolution_note = note;
        if status == PatternStatus::Resolved {
            pattern.resolved_at = Some(at);
        }
        Ok(TransitionOutcome::Updated(pattern.clone()))
    }

    async fn insert_parse_log(&self, log: ParseLog) -> Result<()> {
        let mut state = self.state();
        if state.failures.contains(&FailurePoint::ParseLogInsert) {
            return Err(anyhow!("parse log insert failed"));
        }
        state.parse_logs.push(log);
        Ok(())
    }
}
