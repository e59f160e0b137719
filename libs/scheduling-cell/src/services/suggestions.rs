use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use provider_cell::{CompatibilityService, LoadBalancingService};
use shared_database::{AppointmentQuery, ProviderFilter, SchedulingStore, SuggestionQuery};
use shared_models::error::SchedulingError;
use shared_models::scheduling::{
    AcceptOutcome, AppointmentStatus, ClientStatus, NewAppointment, Provider, ProviderRole,
    SchedulingSuggestion, SuggestionType, TimeSlot,
};
use shared_utils::{fanout::gather_partial, time::add_minutes, AppState, Clock};

use crate::models::{
    AcceptedSuggestion, GeneratedSuggestions, ProviderSuggestionCount, SchedulingRequest,
    SuggestionConfig, SuggestionHistory, SuggestionStats,
};
use crate::services::slots::{
    confidence_for, day_load_score, efficiency_score, find_available_slots, occupies_calendar,
    reasoning, SlotSearch,
};

const TOP_SUGGESTED_PROVIDERS: usize = 5;

/// Inputs shared by every provider evaluated for one request.
#[derive(Debug, Clone)]
struct SearchWindow {
    client_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    duration_minutes: i32,
    preferred_time: Option<NaiveTime>,
}

/// A provider's best slot with its scores, before it is persisted.
#[derive(Debug, Clone)]
struct Candidate {
    provider_id: Uuid,
    provider_name: String,
    slot: TimeSlot,
    alternatives: Vec<TimeSlot>,
    compatibility: f64,
    load_balance: f64,
    efficiency: f64,
    overall: f64,
    reasoning: String,
}

pub struct SuggestionService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    config: SuggestionConfig,
    compatibility: CompatibilityService,
    load_balancing: LoadBalancingService,
}

impl SuggestionService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        clock: Arc<dyn Clock>,
        config: SuggestionConfig,
        compatibility: CompatibilityService,
        load_balancing: LoadBalancingService,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            compatibility,
            load_balancing,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::with_config(state, SuggestionConfig::default())
    }

    pub fn with_config(state: &AppState, config: SuggestionConfig) -> Self {
        Self::new(
            state.store.clone(),
            state.clock.clone(),
            config,
            CompatibilityService::from_state(state),
            LoadBalancingService::from_state(state),
        )
    }

    /// Rank open slots for the request and persist every suggestion returned.
    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn generate(&self, request: &SchedulingRequest) -> Result<GeneratedSuggestions, SchedulingError> {
        let window = self.validate(request).await?;

        let (candidates, failures) = match request.provider_id {
            Some(provider_id) => {
                let provider = self.requested_provider(provider_id).await?;
                let candidate = self.evaluate_provider(&provider, &window).await?;
                (candidate.into_iter().collect::<Vec<_>>(), Vec::new())
            }
            None => {
                let filter = ProviderFilter {
                    roles: vec![ProviderRole::Clinician, ProviderRole::Supervisor],
                    active_only: true,
                    schedulable_only: true,
                    accepting_new_clients_only: true,
                    name_contains: None,
                };
                let providers = self.store.list_providers(&filter).await?;
                debug!("Evaluating {} providers", providers.len());

                let results = gather_partial(providers.iter().map(|p| p.id), |provider_id| {
                    let provider = providers.iter().find(|p| p.id == provider_id);
                    let window = &window;
                    async move {
                        match provider {
                            Some(provider) => self.evaluate_provider(provider, window).await,
                            None => Err(SchedulingError::not_found("Provider", provider_id)),
                        }
                    }
                })
                .await;

                let mut candidates: Vec<Candidate> = results.succeeded.into_iter().flatten().collect();
                candidates.sort_by(|a, b| {
                    b.overall
                        .total_cmp(&a.overall)
                        .then_with(|| a.provider_id.cmp(&b.provider_id))
                });
                candidates.truncate(self.config.global_top_n);
                (candidates, results.failures)
            }
        };

        let request_id = Uuid::new_v4();
        let mut suggestions = Vec::with_capacity(candidates.len());
        for (rank, candidate) in candidates.into_iter().enumerate() {
            let suggestion_type = if rank == 0 {
                SuggestionType::OptimalSlot
            } else {
                SuggestionType::AlternativeProvider
            };
            let row = self.to_suggestion(request, &window, request_id, suggestion_type, candidate);
            suggestions.push(self.store.insert_suggestion(row).await?);
        }

        info!(
            "Generated {} suggestions for client {} (request {})",
            suggestions.len(),
            request.client_id,
            request_id
        );

        Ok(GeneratedSuggestions {
            request_id,
            suggestions,
            failures,
        })
    }

    async fn validate(&self, request: &SchedulingRequest) -> Result<SearchWindow, SchedulingError> {
        let flexibility = request
            .flexibility_days
            .unwrap_or(self.config.default_flexibility_days);
        if !(0..=self.config.max_flexibility_days).contains(&flexibility) {
            return Err(SchedulingError::InvalidRequest(format!(
                "flexibility_days must be between 0 and {}",
                self.config.max_flexibility_days
            )));
        }
        if let Some(minutes) = request.duration_minutes {
            if minutes <= 0 {
                return Err(SchedulingError::InvalidRequest(
                    "duration_minutes must be positive".to_string(),
                ));
            }
        }

        let appointment_type = self
            .store
            .get_appointment_type(request.appointment_type_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Appointment type", request.appointment_type_id))?;
        if !appointment_type.is_active {
            return Err(SchedulingError::InvalidRequest(format!(
                "Appointment type {} is not active",
                appointment_type.type_name
            )));
        }

        let client = self
            .store
            .get_client(request.client_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Client", request.client_id))?;
        if client.status != ClientStatus::Active {
            return Err(SchedulingError::InvalidRequest(format!(
                "Client {} is not active",
                client.full_name()
            )));
        }

        let today = self.clock.today();
        let start = request.requested_date.unwrap_or(today);
        if start < today {
            return Err(SchedulingError::InvalidRequest(format!(
                "Requested date {} is in the past",
                start
            )));
        }

        let duration_minutes = request
            .duration_minutes
            .unwrap_or(appointment_type.default_duration_minutes);
        if duration_minutes <= 0 {
            return Err(SchedulingError::InvalidRequest(format!(
                "Appointment type {} has no usable duration",
                appointment_type.type_name
            )));
        }

        let end = start.checked_add_days(Days::new(flexibility as u64)).ok_or_else(|| {
            SchedulingError::InvalidRequest(format!("Requested date {} is out of range", start))
        })?;

        Ok(SearchWindow {
            client_id: client.id,
            start,
            end,
            duration_minutes,
            preferred_time: request.requested_time,
        })
    }

    async fn requested_provider(&self, provider_id: Uuid) -> Result<Provider, SchedulingError> {
        let provider = self
            .store
            .get_provider(provider_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Provider", provider_id))?;
        if !provider.is_active || !provider.available_for_scheduling {
            return Err(SchedulingError::InvalidRequest(format!(
                "Provider {} is not available for scheduling",
                provider.full_name()
            )));
        }
        Ok(provider)
    }

    async fn evaluate_provider(
        &self,
        provider: &Provider,
        window: &SearchWindow,
    ) -> Result<Option<Candidate>, SchedulingError> {
        let windows = self.store.list_availability(provider.id).await?;
        let time_off = self
            .store
            .list_time_off(provider.id, window.start, window.end)
            .await?;
        let appointments = self
            .store
            .list_appointments(&AppointmentQuery::for_provider(provider.id, window.start, window.end))
            .await?;

        let slots = find_available_slots(&SlotSearch {
            provider,
            windows: &windows,
            time_off: &time_off,
            appointments: &appointments,
            start: window.start,
            end: window.end,
            duration_minutes: window.duration_minutes as i64,
            step_minutes: self.config.slot_step_minutes,
            preferred_time: window.preferred_time,
        });

        let Some(best) = slots.first().cloned() else {
            debug!("No open slots for provider {}", provider.id);
            return Ok(None);
        };
        let alternatives: Vec<TimeSlot> = slots
            .iter()
            .skip(1)
            .take(self.config.max_alternatives)
            .cloned()
            .collect();

        let compatibility = self
            .compatibility
            .score(provider.id, window.client_id)
            .await?
            .overall_score;

        let same_day = appointments
            .iter()
            .filter(|a| a.appointment_date == best.date && occupies_calendar(a))
            .count();
        let load_balance = day_load_score(&self.config, same_day);
        let efficiency = efficiency_score(&self.config, &best, &appointments);

        let weights = &self.config.weights;
        let mut overall = compatibility * weights.compatibility
            + load_balance * weights.load_balance
            + efficiency * weights.efficiency;
        if self.config.apply_load_adjustment {
            let multiplier = self.load_balancing.load_balancing_adjustment(provider.id).await;
            overall = (overall * multiplier).clamp(0.0, 1.0);
        }

        debug!(
            "Provider {} best slot {} {}: overall {:.3}",
            provider.id, best.date, best.start_time, overall
        );

        Ok(Some(Candidate {
            provider_id: provider.id,
            provider_name: provider.full_name(),
            reasoning: reasoning(&self.config, provider, compatibility, load_balance, efficiency),
            slot: best,
            alternatives,
            compatibility,
            load_balance,
            efficiency,
            overall,
        }))
    }

    fn to_suggestion(
        &self,
        request: &SchedulingRequest,
        window: &SearchWindow,
        request_id: Uuid,
        suggestion_type: SuggestionType,
        candidate: Candidate,
    ) -> SchedulingSuggestion {
        SchedulingSuggestion {
            id: Uuid::new_v4(),
            request_id,
            suggestion_type,
            client_id: request.client_id,
            requested_provider_id: request.provider_id,
            appointment_type_id: request.appointment_type_id,
            requested_date: request.requested_date,
            requested_time: request.requested_time,
            flexibility_days: (window.end - window.start).num_days(),
            suggested_provider_id: candidate.provider_id,
            provider_name: candidate.provider_name,
            suggested_date: candidate.slot.date,
            suggested_time: candidate.slot.start_time,
            suggested_duration: window.duration_minutes,
            alternative_slots: candidate.alternatives,
            compatibility_score: candidate.compatibility,
            load_balance_score: candidate.load_balance,
            efficiency_score: candidate.efficiency,
            overall_score: candidate.overall,
            confidence_level: confidence_for(&self.config, candidate.overall),
            reasoning: candidate.reasoning,
            was_accepted: false,
            accepted_at: None,
            accepted_by: None,
            created_appointment_id: None,
            created_at: self.clock.now(),
        }
    }

    /// Book the suggested slot. A suggestion can be accepted once.
    #[instrument(skip(self))]
    pub async fn accept(&self, suggestion_id: Uuid, accepted_by: &str) -> Result<AcceptedSuggestion, SchedulingError> {
        let suggestion = self
            .store
            .get_suggestion(suggestion_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Suggestion", suggestion_id))?;
        if suggestion.was_accepted {
            return Err(already_accepted(suggestion_id));
        }

        let end_time = add_minutes(suggestion.suggested_time, suggestion.suggested_duration as i64)
            .ok_or_else(|| {
                SchedulingError::InvalidRequest(format!(
                    "Suggestion {} would end after midnight",
                    suggestion_id
                ))
            })?;

        let appointment = NewAppointment {
            client_id: suggestion.client_id,
            provider_id: suggestion.suggested_provider_id,
            appointment_date: suggestion.suggested_date,
            start_time: suggestion.suggested_time,
            end_time,
            duration_minutes: suggestion.suggested_duration,
            status: AppointmentStatus::Scheduled,
            appointment_type_id: Some(suggestion.appointment_type_id),
            created_by: Some(accepted_by.to_string()),
        };

        match self
            .store
            .accept_suggestion(suggestion_id, appointment, accepted_by, self.clock.now())
            .await?
        {
            AcceptOutcome::Accepted { suggestion, appointment } => {
                info!(
                    "Suggestion {} accepted by {}: appointment {}",
                    suggestion_id, accepted_by, appointment.id
                );
                Ok(AcceptedSuggestion { suggestion, appointment })
            }
            AcceptOutcome::AlreadyAccepted => {
                warn!("Suggestion {} was accepted concurrently", suggestion_id);
                Err(already_accepted(suggestion_id))
            }
            AcceptOutcome::NotFound => Err(SchedulingError::not_found("Suggestion", suggestion_id)),
        }
    }

    pub async fn get_suggestion(&self, suggestion_id: Uuid) -> Result<SchedulingSuggestion, SchedulingError> {
        self.store
            .get_suggestion(suggestion_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Suggestion", suggestion_id))
    }

    /// Client's suggestions, newest first.
    pub async fn history(
        &self,
        client_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<SuggestionHistory, SchedulingError> {
        let query = SuggestionQuery {
            client_id: Some(client_id),
            limit: Some(limit),
            offset,
        };
        let suggestions = self.store.list_suggestions(&query).await?;
        let total = self.store.count_suggestions(Some(client_id)).await?;

        Ok(SuggestionHistory {
            suggestions,
            total,
            limit,
            offset,
        })
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<SuggestionStats, SchedulingError> {
        let suggestions = self.store.list_suggestions(&SuggestionQuery::default()).await?;

        let total_suggestions = suggestions.len();
        let accepted_suggestions = suggestions.iter().filter(|s| s.was_accepted).count();
        let (acceptance_rate, average_overall_score) = if total_suggestions == 0 {
            (0.0, 0.0)
        } else {
            let total = total_suggestions as f64;
            let score_sum: f64 = suggestions.iter().map(|s| s.overall_score).sum();
            (accepted_suggestions as f64 / total * 100.0, score_sum / total)
        };

        let mut by_provider: HashMap<Uuid, ProviderSuggestionCount> = HashMap::new();
        for suggestion in &suggestions {
            by_provider
                .entry(suggestion.suggested_provider_id)
                .or_insert_with(|| ProviderSuggestionCount {
                    provider_id: suggestion.suggested_provider_id,
                    provider_name: suggestion.provider_name.clone(),
                    count: 0,
                })
                .count += 1;
        }
        let mut top_providers: Vec<ProviderSuggestionCount> = by_provider.into_values().collect();
        top_providers.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.provider_name.cmp(&b.provider_name))
        });
        top_providers.truncate(TOP_SUGGESTED_PROVIDERS);

        Ok(SuggestionStats {
            total_suggestions,
            accepted_suggestions,
            acceptance_rate,
            average_overall_score,
            top_providers,
        })
    }
}

fn already_accepted(suggestion_id: Uuid) -> SchedulingError {
    SchedulingError::InvalidRequest(format!("Suggestion {} has already been accepted", suggestion_id))
}
