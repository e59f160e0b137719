use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::{AppointmentQuery, ProviderFilter, SchedulingStore};
use shared_models::error::SchedulingError;
use shared_models::scheduling::{
    AppointmentStatus, AvailabilityWindow, Client, CompatibilityScore, Provider, ProviderRole,
};
use shared_utils::{fanout::gather_partial, AppState, Clock};

use crate::models::{
    CompatibilityConfig, CompatibilityDetails, CompatibilityResult, RankedProvider,
    TopCompatibleProviders,
};

pub struct CompatibilityService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    config: CompatibilityConfig,
}

impl CompatibilityService {
    pub fn new(store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>, config: CompatibilityConfig) -> Self {
        Self { store, clock, config }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.clock.clone(), CompatibilityConfig::default())
    }

    /// Score one provider/client pair and refresh the cached row.
    #[instrument(skip(self))]
    pub async fn score(&self, provider_id: Uuid, client_id: Uuid) -> Result<CompatibilityResult, SchedulingError> {
        let provider = self.store.get_provider(provider_id).await?
            .ok_or_else(|| SchedulingError::not_found("Provider", provider_id))?;
        let client = self.store.get_client(client_id).await?
            .ok_or_else(|| SchedulingError::not_found("Client", client_id))?;

        let windows = self.store.list_availability(provider_id).await?;
        let history = self.store.list_appointments(&AppointmentQuery {
            provider_id: Some(provider_id),
            client_id: Some(client_id),
            ..Default::default()
        }).await?;

        let (specialty_match, diagnosis_categories, matched_categories) =
            self.specialty_match(&provider, &client);
        let availability_match = self.availability_match(&provider, &windows);
        let experience_match = self.experience_match(provider.years_of_experience);
        let insurance_match = self.config.insurance_score;
        let location_match = self.config.location_score;
        let style_match = self.config.style_score;

        let weights = &self.config.weights;
        let overall_score = (specialty_match * weights.specialty
            + availability_match * weights.availability
            + experience_match * weights.experience
            + insurance_match * weights.insurance
            + location_match * weights.location
            + style_match * weights.style)
            .clamp(0.0, 1.0);

        let count = |status: AppointmentStatus| history.iter().filter(|a| a.status == status).count() as i32;
        let details = CompatibilityDetails {
            diagnosis_categories,
            matched_categories,
            provider_specialties: provider.specialties.clone(),
            years_of_experience: provider.years_of_experience,
            availability_windows: windows.iter().filter(|w| w.is_active).count(),
            total_appointments: count(AppointmentStatus::Completed),
            no_show_count: count(AppointmentStatus::NoShow),
            cancellation_count: count(AppointmentStatus::Cancelled),
        };

        let calculated_at = self.clock.now();
        let result = CompatibilityResult {
            provider_id,
            client_id,
            overall_score,
            specialty_match,
            availability_match,
            experience_match,
            insurance_match,
            location_match,
            style_match,
            details,
            calculated_at,
        };

        self.store.upsert_compatibility(to_score_row(&result)).await?;

        info!(
            "Compatibility {} / {}: {:.3}",
            provider_id, client_id, result.overall_score
        );

        Ok(result)
    }

    /// Last stored score for the pair, without recomputing.
    pub async fn cached_score(
        &self,
        provider_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<CompatibilityScore>, SchedulingError> {
        Ok(self.store.get_compatibility(provider_id, client_id).await?)
    }

    /// Score the client against every bookable clinician/supervisor.
    #[instrument(skip(self))]
    pub async fn top_compatible_providers(
        &self,
        client_id: Uuid,
        limit: usize,
    ) -> Result<TopCompatibleProviders, SchedulingError> {
        if self.store.get_client(client_id).await?.is_none() {
            return Err(SchedulingError::not_found("Client", client_id));
        }

        let filter = ProviderFilter {
            roles: vec![ProviderRole::Clinician, ProviderRole::Supervisor],
            active_only: true,
            schedulable_only: true,
            accepting_new_clients_only: true,
            name_contains: None,
        };
        let providers = self.store.list_providers(&filter).await?;
        debug!("Scoring client {} against {} providers", client_id, providers.len());

        let names: Vec<(Uuid, String)> = providers.iter().map(|p| (p.id, p.full_name())).collect();
        let results = gather_partial(providers.iter().map(|p| p.id), |provider_id| async move {
            self.score(provider_id, client_id).await
        })
        .await;

        let mut ranked: Vec<RankedProvider> = results
            .succeeded
            .into_iter()
            .map(|compatibility| {
                let provider_name = names
                    .iter()
                    .find(|(id, _)| *id == compatibility.provider_id)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_default();
                RankedProvider {
                    provider_id: compatibility.provider_id,
                    provider_name,
                    compatibility,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.compatibility
                .overall_score
                .total_cmp(&a.compatibility.overall_score)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        ranked.truncate(limit);

        Ok(TopCompatibleProviders {
            client_id,
            providers: ranked,
            failures: results.failures,
        })
    }

    /// Fraction of the client's diagnosis categories covered by the
    /// provider's specialties.
    pub fn specialty_match(&self, provider: &Provider, client: &Client) -> (f64, Vec<String>, Vec<String>) {
        let categories: BTreeSet<String> = client
            .diagnosis_codes
            .iter()
            .filter_map(|code| code.get(..3))
            .map(|prefix| prefix.to_uppercase())
            .collect();
        let categories: Vec<String> = categories.into_iter().collect();

        if categories.is_empty() {
            return (self.config.no_diagnosis_score, categories, Vec::new());
        }
        if provider.specialties.is_empty() {
            return (self.config.no_specialty_score, categories, Vec::new());
        }

        let specialties: Vec<String> = provider.specialties.iter().map(|s| s.to_lowercase()).collect();
        let matched: Vec<String> = categories
            .iter()
            .filter(|category| {
                self.config
                    .specialty_table
                    .iter()
                    .find(|m| &m.category == *category)
                    .map_or(false, |m| {
                        m.keywords
                            .iter()
                            .any(|k| specialties.iter().any(|s| s.contains(k.as_str())))
                    })
            })
            .cloned()
            .collect();

        let score = matched.len() as f64 / categories.len() as f64;
        (score, categories, matched)
    }

    pub fn availability_match(&self, provider: &Provider, windows: &[AvailabilityWindow]) -> f64 {
        if !provider.is_active || !provider.available_for_scheduling {
            return self.config.not_schedulable_score;
        }
        if !provider.accepts_new_clients {
            return self.config.not_accepting_score;
        }
        if !windows.iter().any(|w| w.is_active) {
            return self.config.no_windows_score;
        }
        self.config.full_availability_score
    }

    pub fn experience_match(&self, years: Option<i32>) -> f64 {
        let years = years.unwrap_or(0);
        self.config
            .experience_steps
            .iter()
            .find(|step| years >= step.min_years)
            .map_or(self.config.experience_floor, |step| step.score)
    }
}

fn to_score_row(result: &CompatibilityResult) -> CompatibilityScore {
    CompatibilityScore {
        provider_id: result.provider_id,
        client_id: result.client_id,
        overall_score: result.overall_score,
        specialty_match: result.specialty_match,
        availability_match: result.availability_match,
        experience_match: result.experience_match,
        insurance_match: result.insurance_match,
        location_match: result.location_match,
        style_match: result.style_match,
        total_appointments: result.details.total_appointments,
        no_show_count: result.details.no_show_count,
        cancellation_count: result.details.cancellation_count,
        factors: json!({
            "diagnosisCategories": result.details.diagnosis_categories,
            "matchedCategories": result.details.matched_categories,
            "specialties": result.details.provider_specialties,
            "yearsOfExperience": result.details.years_of_experience,
            "availabilityWindows": result.details.availability_windows,
        }),
        last_calculated: result.calculated_at,
    }
}
