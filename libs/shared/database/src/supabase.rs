use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::scheduling::{
    AcceptOutcome, Appointment, AppointmentType, AvailabilityWindow, Client as PracticeClient,
    CompatibilityScore, NewAppointment, ParseLog, PatternStatus, Provider, ProviderRole,
    SchedulingPattern, SchedulingSuggestion, TimeOffRequest, TransitionOutcome,
};

use crate::store::{
    AppointmentQuery, PatternQuery, ProviderFilter, SchedulingStore, SuggestionQuery,
};

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))?,
        );

        if let Some(prefer) = prefer {
            headers.insert("Prefer", HeaderValue::from_str(prefer)?);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(method, path, body, None).await
    }

    /// Write request asking PostgREST to echo the affected rows back.
    pub async fn request_returning<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(method, path, body, Some(prefer)).await
    }

    async fn send<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let headers = self.get_headers(prefer)?;

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_REPRESENTATION: &str = "resolution=merge-duplicates,return=representation";

fn role_name(role: &ProviderRole) -> &'static str {
    match role {
        ProviderRole::Clinician => "CLINICIAN",
        ProviderRole::Supervisor => "SUPERVISOR",
        ProviderRole::Administrator => "ADMINISTRATOR",
    }
}

fn first_row<T>(rows: Vec<T>) -> Option<T> {
    rows.into_iter().next()
}

#[derive(Debug, Deserialize)]
struct AcceptRpcResponse {
    outcome: String,
    suggestion: Option<SchedulingSuggestion>,
    appointment: Option<Appointment>,
}

/// `SchedulingStore` over the practice database's PostgREST API.
///
/// Acceptance goes through the `accept_scheduling_suggestion` database
/// function (see `migrations/`) so the insert and the flag flip share one
/// transaction.
pub struct SupabaseSchedulingStore {
    supabase: SupabaseClient,
}

impl SupabaseSchedulingStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn appointment_path(query: &AppointmentQuery) -> String {
        let mut query_parts = Vec::new();

        if let Some(provider_id) = query.provider_id {
            query_parts.push(format!("provider_id=eq.{}", provider_id));
        }
        if let Some(client_id) = query.client_id {
            query_parts.push(format!("client_id=eq.{}", client_id));
        }
        if let Some(start) = query.start_date {
            query_parts.push(format!("appointment_date=gte.{}", start));
        }
        if let Some(end) = query.end_date {
            query_parts.push(format!("appointment_date=lte.{}", end));
        }
        if let Some(ref statuses) = query.statuses {
            let list: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
            query_parts.push(format!("status=in.({})", list.join(",")));
        }
        query_parts.push("order=appointment_date.asc,start_time.asc".to_string());

        format!("/rest/v1/appointments?{}", query_parts.join("&"))
    }
}

#[async_trait]
impl SchedulingStore for SupabaseSchedulingStore {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let rows: Vec<Provider> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(first_row(rows))
    }

    async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Provider>> {
        let mut query_parts = Vec::new();

        if !filter.roles.is_empty() {
            let roles: Vec<&str> = filter.roles.iter().map(role_name).collect();
            query_parts.push(format!("roles=ov.{{{}}}", roles.join(",")));
        }
        if filter.active_only {
            query_parts.push("is_active=eq.true".to_string());
        }
        if filter.schedulable_only {
            query_parts.push("available_for_scheduling=eq.true".to_string());
        }
        if filter.accepting_new_clients_only {
            query_parts.push("accepts_new_clients=eq.true".to_string());
        }
        if let Some(ref fragment) = filter.name_contains {
            let encoded = urlencoding::encode(fragment);
            query_parts.push(format!(
                "or=(first_name.ilike.*{0}*,last_name.ilike.*{0}*)",
                encoded
            ));
        }
        query_parts.push("order=last_name.asc,first_name.asc".to_string());

        let path = format!("/rest/v1/providers?{}", query_parts.join("&"));
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn get_client(&self, client_id: Uuid) -> Result<Option<PracticeClient>> {
        let path = format!("/rest/v1/clients?id=eq.{}", client_id);
        let rows: Vec<PracticeClient> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(first_row(rows))
    }

    async fn find_active_clients_by_name(&self, fragment: &str) -> Result<Vec<PracticeClient>> {
        let encoded = urlencoding::encode(fragment);
        let path = format!(
            "/rest/v1/clients?status=eq.ACTIVE&or=(first_name.ilike.*{0}*,last_name.ilike.*{0}*)&order=last_name.asc",
            encoded
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn list_availability(&self, provider_id: Uuid) -> Result<Vec<AvailabilityWindow>> {
        let path = format!(
            "/rest/v1/provider_availability?provider_id=eq.{}&order=day_of_week.asc,start_time.asc",
            provider_id
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn list_time_off(
        &self,
        provider_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimeOffRequest>> {
        let path = format!(
            "/rest/v1/time_off_requests?provider_id=eq.{}&start_date=lte.{}&end_date=gte.{}",
            provider_id, end, start
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>> {
        let path = Self::appointment_path(query);
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment> {
        let rows: Vec<Appointment> = self.supabase.request_returning(
            Method::POST,
            "/rest/v1/appointments",
            Some(serde_json::to_value(&appointment)?),
            RETURN_REPRESENTATION,
        ).await?;
        first_row(rows).ok_or_else(|| anyhow!("appointment insert returned no rows"))
    }

    async fn get_appointment_type(&self, type_id: Uuid) -> Result<Option<AppointmentType>> {
        let path = format!("/rest/v1/appointment_types?id=eq.{}", type_id);
        let rows: Vec<AppointmentType> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(first_row(rows))
    }

    async fn list_active_appointment_types(&self) -> Result<Vec<AppointmentType>> {
        self.supabase.request(
            Method::GET,
            "/rest/v1/appointment_types?is_active=eq.true&order=type_name.asc",
            None,
        ).await
    }

    async fn get_compatibility(
        &self,
        provider_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<CompatibilityScore>> {
        let path = format!(
            "/rest/v1/provider_client_compatibility?provider_id=eq.{}&client_id=eq.{}",
            provider_id, client_id
        );
        let rows: Vec<CompatibilityScore> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(first_row(rows))
    }

    async fn upsert_compatibility(&self, score: CompatibilityScore) -> Result<CompatibilityScore> {
        let rows: Vec<CompatibilityScore> = self.supabase.request_returning(
            Method::POST,
            "/rest/v1/provider_client_compatibility?on_conflict=provider_id,client_id",
            Some(serde_json::to_value(&score)?),
            UPSERT_REPRESENTATION,
        ).await?;
        first_row(rows).ok_or_else(|| anyhow!("compatibility upsert returned no rows"))
    }

    async fn insert_suggestion(&self, suggestion: SchedulingSuggestion) -> Result<SchedulingSuggestion> {
        let rows: Vec<SchedulingSuggestion> = self.supabase.request_returning(
            Method::POST,
            "/rest/v1/scheduling_suggestions",
            Some(serde_json::to_value(&suggestion)?),
            RETURN_REPRESENTATION,
        ).await?;
        first_row(rows).ok_or_else(|| anyhow!("suggestion insert returned no rows"))
    }

    async fn get_suggestion(&self, suggestion_id: Uuid) -> Result<Option<SchedulingSuggestion>> {
        let path = format!("/rest/v1/scheduling_suggestions?id=eq.{}", suggestion_id);
        let rows: Vec<SchedulingSuggestion> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(first_row(rows))
    }

    async fn list_suggestions(&self, query: &SuggestionQuery) -> Result<Vec<SchedulingSuggestion>> {
        let mut query_parts = Vec::new();
        if let Some(client_id) = query.client_id {
            query_parts.push(format!("client_id=eq.{}", client_id));
        }
        query_parts.push("order=created_at.desc".to_string());
        if let Some(limit) = query.limit {
            query_parts.push(format!("limit={}", limit));
        }
        if query.offset > 0 {
            query_parts.push(format!("offset={}", query.offset));
        }

        let path = format!("/rest/v1/scheduling_suggestions?{}", query_parts.join("&"));
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn count_suggestions(&self, client_id: Option<Uuid>) -> Result<usize> {
        let path = match client_id {
            Some(id) => format!("/rest/v1/scheduling_suggestions?select=id&client_id=eq.{}", id),
            None => "/rest/v1/scheduling_suggestions?select=id".to_string(),
        };
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.len())
    }

    async fn accept_suggestion(
        &self,
        suggestion_id: Uuid,
        appointment: NewAppointment,
        accepted_by: &str,
        accepted_at: DateTime<Utc>,
    ) -> Result<AcceptOutcome> {
        let body = json!({
            "p_suggestion_id": suggestion_id,
            "p_appointment": appointment,
            "p_accepted_by": accepted_by,
            "p_accepted_at": accepted_at,
        });

        let response: AcceptRpcResponse = self.supabase.request(
            Method::POST,
            "/rest/v1/rpc/accept_scheduling_suggestion",
            Some(body),
        ).await?;

        match response.outcome.as_str() {
            "accepted" => match (response.suggestion, response.appointment) {
                (Some(suggestion), Some(appointment)) => Ok(AcceptOutcome::Accepted {
                    suggestion,
                    appointment,
                }),
                _ => Err(anyhow!("accept_scheduling_suggestion returned an incomplete result")),
            },
            "already_accepted" => Ok(AcceptOutcome::AlreadyAccepted),
            "not_found" => Ok(AcceptOutcome::NotFound),
            other => Err(anyhow!("unexpected accept outcome '{}'", other)),
        }
    }

    async fn insert_pattern(&self, pattern: SchedulingPattern) -> Result<SchedulingPattern> {
        let rows: Vec<SchedulingPattern> = self.supabase.request_returning(
            Method::POST,
            "/rest/v1/scheduling_patterns",
            Some(serde_json::to_value(&pattern)?),
            RETURN_REPRESENTATION,
        ).await?;
        first_row(rows).ok_or_else(|| anyhow!("pattern insert returned no rows"))
    }

    async fn get_pattern(&self, pattern_id: Uuid) -> Result<Option<SchedulingPattern>> {
        let path = format!("/rest/v1/scheduling_patterns?id=eq.{}", pattern_id);
        let rows: Vec<SchedulingPattern> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(first_row(rows))
    }

    async fn list_patterns(&self, query: &PatternQuery) -> Result<Vec<SchedulingPattern>> {
        let mut query_parts = Vec::new();
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status.as_str()));
        }
        if let Some(severity) = query.severity {
            query_parts.push(format!("severity=eq.{}", severity.as_str()));
        }
        if let Some(category) = query.category {
            query_parts.push(format!("category=eq.{}", category.as_str()));
        }
        query_parts.push("order=detected_at.desc".to_string());

        let path = format!("/rest/v1/scheduling_patterns?{}", query_parts.join("&"));
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn transition_pattern(
        &self,
        pattern_id: Uuid,
        status: PatternStatus,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut patch = json!({
            "status": status,
            "resolution_note": note,
        });
        if status == PatternStatus::Resolved {
            patch["resolved_at"] = json!(at);
        }

        // The status filter makes this a conditional update.
        let path = format!(
            "/rest/v1/scheduling_patterns?id=eq.{}&status=eq.ACTIVE",
            pattern_id
        );
        let rows: Vec<SchedulingPattern> = self.supabase.request_returning(
            Method::PATCH,
            &path,
            Some(patch),
            RETURN_REPRESENTATION,
        ).await?;

        if let Some(updated) = first_row(rows) {
            return Ok(TransitionOutcome::Updated(updated));
        }

        match self.get_pattern(pattern_id).await? {
            Some(existing) => Ok(TransitionOutcome::NotActive(existing.status)),
            None => Ok(TransitionOutcome::NotFound),
        }
    }

    async fn insert_parse_log(&self, log: ParseLog) -> Result<()> {
        let _: Value = self.supabase.request_returning(
            Method::POST,
            "/rest/v1/natural_language_scheduling_logs",
            Some(serde_json::to_value(&log)?),
            RETURN_REPRESENTATION,
        ).await?;
        Ok(())
    }
}
