use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use scheduling_cell::{SchedulingRequest, SuggestionService};
use shared_database::{AppointmentQuery, ProviderFilter, SchedulingStore};
use shared_models::error::SchedulingError;
use shared_models::scheduling::{AppointmentStatus, Client, Intent, ParseLog, Provider, ProviderRole};
use shared_models::time_format::format_hhmm;
use shared_utils::{AppState, Clock};

use crate::models::{ExecutionOutcome, ParseResult, ParsedEntities, ParserConfig};
use crate::services::dates::resolve_date;
use crate::services::parser::{
    clarification_for, client_name_candidates, confidence, extract_appointment_type, extract_duration,
    extract_flexibility, extract_intent, extract_time, normalize, provider_name_candidates,
};

pub struct NlpSchedulingService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    config: ParserConfig,
    suggestions: SuggestionService,
}

impl NlpSchedulingService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        clock: Arc<dyn Clock>,
        config: ParserConfig,
        suggestions: SuggestionService,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            suggestions,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.clock.clone(),
            ParserConfig::default(),
            SuggestionService::from_state(state),
        )
    }

    /// Turn free text into an intent plus entities and log the attempt.
    #[instrument(skip(self, text))]
    pub async fn parse(&self, text: &str, user_id: &str) -> Result<ParseResult, SchedulingError> {
        if text.trim().is_empty() {
            return Err(SchedulingError::InvalidRequest("request_text is required".to_string()));
        }
        if text.chars().count() > self.config.max_request_chars {
            return Err(SchedulingError::InvalidRequest(format!(
                "Request text must be {} characters or less",
                self.config.max_request_chars
            )));
        }

        let started = Instant::now();
        let normalized = normalize(text);
        let mut reasoning = Vec::new();
        let mut entities = ParsedEntities {
            intent: extract_intent(&normalized),
            ..Default::default()
        };

        match entities.intent {
            Some(intent) => reasoning.push(format!("Detected intent: {}", intent)),
            None => reasoning.push("Could not determine intent from request".to_string()),
        }

        if let Some(provider) = self.find_provider(&normalized).await? {
            reasoning.push(format!("Identified provider: {}", provider.full_name()));
            entities.provider_name = Some(provider.full_name());
            entities.provider_id = Some(provider.id);
        }

        if let Some(client) = self.find_client(&normalized).await? {
            reasoning.push(format!("Identified client: {}", client.full_name()));
            entities.client_name = Some(client.full_name());
            entities.client_id = Some(client.id);
        }

        if let Some(found) = resolve_date(&normalized, self.clock.today()) {
            match found.date {
                Some(date) => reasoning.push(format!("Parsed date: {} → {}", found.text, date)),
                None => reasoning.push(format!("Found date '{}' but it is not a valid day", found.text)),
            }
            entities.date = found.date;
            entities.date_text = Some(found.text);
        }

        let (time, time_of_day) = extract_time(&normalized);
        if let Some(time) = time {
            reasoning.push(format!("Parsed time: {}", format_hhmm(time)));
            entities.time = Some(time);
        } else if let Some(part) = time_of_day {
            reasoning.push(format!("Identified time of day: {}", part.as_str()));
            entities.time_of_day = Some(part);
        }

        if let Some(minutes) = extract_duration(&normalized) {
            reasoning.push(format!("Extracted duration: {} minutes", minutes));
            entities.duration_minutes = Some(minutes);
        }

        if let Some(type_name) = extract_appointment_type(&normalized, &self.config) {
            reasoning.push(format!("Identified appointment type: {}", type_name));
            entities.appointment_type = Some(type_name);
        }

        if let Some(days) = extract_flexibility(&normalized, &self.config) {
            reasoning.push(format!("Extracted flexibility: {} days", days));
            entities.flexibility_days = Some(days);
        }

        let confidence = confidence(&entities, &self.config);
        let clarification_needed = clarification_for(&entities);
        let success = confidence >= self.config.success_threshold && clarification_needed.is_none();

        let result = ParseResult {
            success,
            confidence,
            intent: entities.intent,
            entities,
            clarification_needed,
            reasoning,
        };
        self.log_attempt(user_id, text, &result, started).await;

        info!(
            "Parsed request from {}: intent {:?}, confidence {:.2}, success {}",
            user_id, result.intent, result.confidence, result.success
        );
        Ok(result)
    }

    async fn find_provider(&self, text: &str) -> Result<Option<Provider>, SchedulingError> {
        for fragment in provider_name_candidates(text, &self.config) {
            let filter = ProviderFilter {
                name_contains: Some(fragment.clone()),
                ..ProviderFilter::active_with_roles(&[ProviderRole::Clinician, ProviderRole::Supervisor])
            };
            if let Some(provider) = self.store.list_providers(&filter).await?.into_iter().next() {
                return Ok(Some(provider));
            }
            debug!("No provider matches '{}'", fragment);
        }
        Ok(None)
    }

    async fn find_client(&self, text: &str) -> Result<Option<Client>, SchedulingError> {
        for fragment in client_name_candidates(text, &self.config) {
            if let Some(client) = self.store.find_active_clients_by_name(&fragment).await?.into_iter().next() {
                return Ok(Some(client));
            }
            debug!("No active client matches '{}'", fragment);
        }
        Ok(None)
    }

    async fn log_attempt(&self, user_id: &str, text: &str, result: &ParseResult, started: Instant) {
        let log = ParseLog {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            request_text: text.to_string(),
            parsed_intent: result.intent,
            parsed_entities: serde_json::to_value(&result.entities).unwrap_or_default(),
            confidence: result.confidence,
            parsing_success: result.success,
            clarification_needed: result.clarification_needed.clone(),
            parse_latency_ms: started.elapsed().as_millis() as u64,
            created_at: self.clock.now(),
        };
        if let Err(err) = self.store.insert_parse_log(log).await {
            warn!("Failed to record parse attempt for {}: {}", user_id, err);
        }
    }

    /// Act on a successful parse.
    ///
    /// A SCHEDULE intent books the top-ranked suggestion straight away, with
    /// no confirmation step.
    #[instrument(skip(self, parsed), fields(intent = ?parsed.intent))]
    pub async fn execute(&self, parsed: &ParseResult, user_id: &str) -> Result<ExecutionOutcome, SchedulingError> {
        let intent = match parsed.intent {
            Some(intent) if parsed.success => intent,
            _ => {
                return Err(SchedulingError::InvalidRequest(
                    parsed
                        .clarification_needed
                        .clone()
                        .unwrap_or_else(|| "Could not parse scheduling request".to_string()),
                ))
            }
        };
        let entities = &parsed.entities;

        match intent {
            Intent::Schedule => {
                let request = self.scheduling_request(entities).await?;
                let generated = self.suggestions.generate(&request).await?;
                let Some(best) = generated.suggestions.first() else {
                    return Ok(ExecutionOutcome::NoSlots {
                        message: "No available time slots found for the requested parameters".to_string(),
                    });
                };

                let accepted = self.suggestions.accept(best.id, user_id).await?;
                info!(
                    "Booked appointment {} from suggestion {} for {}",
                    accepted.appointment.id, accepted.suggestion.id, user_id
                );
                Ok(ExecutionOutcome::Booked {
                    message: "Appointment created successfully".to_string(),
                    appointment: accepted.appointment,
                    suggestion: accepted.suggestion,
                })
            }
            Intent::FindSlot => {
                let request = self.scheduling_request(entities).await?;
                let suggestions = self.suggestions.generate(&request).await?;
                Ok(ExecutionOutcome::SlotsFound { suggestions })
            }
            Intent::CheckAvailability => {
                let provider_id = entities.provider_id.ok_or_else(|| {
                    SchedulingError::InvalidRequest("Name a provider to check availability".to_string())
                })?;
                let date = entities.date.unwrap_or_else(|| self.clock.today());
                let query = AppointmentQuery::for_provider(provider_id, date, date)
                    .with_statuses(&[AppointmentStatus::Scheduled, AppointmentStatus::Confirmed]);
                let appointments = self.store.list_appointments(&query).await?;
                Ok(ExecutionOutcome::Availability {
                    provider_id,
                    date,
                    available: appointments.is_empty(),
                    appointments,
                })
            }
            Intent::Reschedule | Intent::Cancel => Err(SchedulingError::Unsupported(format!(
                "Intent {} not yet implemented",
                intent
            ))),
        }
    }

    async fn scheduling_request(&self, entities: &ParsedEntities) -> Result<SchedulingRequest, SchedulingError> {
        let client_id = entities.client_id.ok_or_else(|| {
            SchedulingError::InvalidRequest("Could not identify a client in the request".to_string())
        })?;
        let appointment_type_id = self
            .resolve_appointment_type(entities.appointment_type.as_deref())
            .await?;

        Ok(SchedulingRequest {
            client_id,
            provider_id: entities.provider_id,
            appointment_type_id,
            requested_date: entities.date,
            requested_time: entities.preferred_time(&self.config),
            flexibility_days: Some(
                entities
                    .flexibility_days
                    .unwrap_or(self.config.default_flexibility_days),
            ),
            duration_minutes: entities.duration_minutes,
        })
    }

    /// Active type whose name contains the keyword, else the first active type.
    async fn resolve_appointment_type(&self, keyword: Option<&str>) -> Result<Uuid, SchedulingError> {
        let types = self.store.list_active_appointment_types().await?;
        if let Some(keyword) = keyword.map(str::to_lowercase) {
            if let Some(found) = types
                .iter()
                .find(|t| t.type_name.to_lowercase().contains(&keyword))
            {
                return Ok(found.id);
            }
        }
        types
            .first()
            .map(|t| t.id)
            .ok_or_else(|| SchedulingError::InvalidRequest("No active appointment types found".to_string()))
    }
}
