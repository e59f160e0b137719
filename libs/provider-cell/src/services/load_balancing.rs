use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppointmentQuery, ProviderFilter, SchedulingStore};
use shared_models::error::SchedulingError;
use shared_models::scheduling::{Appointment, AppointmentStatus, AvailabilityWindow, ProviderRole, Severity};
use shared_utils::fanout::gather_partial;
use shared_utils::time::{round2, week_bounds};
use shared_utils::{AppState, Clock};

use crate::models::{
    LoadBalancingConfig, LoadBalancingRecommendation, LoadImbalances, LoadStatus, LoadTrend,
    ProviderCapacity, ProviderLoadMetrics, RecommendationType, TeamLoadDistribution, TeamMetrics,
    WeekLoad,
};

pub struct LoadBalancingService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    config: LoadBalancingConfig,
}

impl LoadBalancingService {
    pub fn new(store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>, config: LoadBalancingConfig) -> Self {
        Self { store, clock, config }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.clock.clone(), LoadBalancingConfig::default())
    }

    /// Utilization for the current and next Monday-Sunday weeks.
    #[instrument(skip(self))]
    pub async fn provider_load(&self, provider_id: Uuid) -> Result<ProviderLoadMetrics, SchedulingError> {
        let provider = self.store.get_provider(provider_id).await?
            .ok_or_else(|| SchedulingError::not_found("Provider", provider_id))?;

        let (current_start, current_end) = week_bounds(self.clock.today());
        let next_start = current_end + Duration::days(1);
        let next_end = next_start + Duration::days(6);

        let windows = self.store.list_availability(provider_id).await?;
        let appointments: Vec<Appointment> = self
            .store
            .list_appointments(&AppointmentQuery::for_provider(provider_id, current_start, next_end))
            .await?
            .into_iter()
            .filter(|a| !matches!(a.status, AppointmentStatus::Cancelled | AppointmentStatus::NoShow))
            .collect();

        let current_week = self.week_load(current_start, current_end, &appointments, &windows);
        let next_week = self.week_load(next_start, next_end, &appointments, &windows);

        let load_score = current_week.utilization_rate * self.config.current_week_weight
            + next_week.utilization_rate * self.config.next_week_weight;
        let status = self.classify(load_score);
        let available_capacity = (100.0 - load_score).max(0.0);
        let trend = self.trend(current_week.total_appointments, next_week.total_appointments);

        debug!(
            "Provider {} load {:.2} (current {:.2}%, next {:.2}%)",
            provider_id, load_score, current_week.utilization_rate, next_week.utilization_rate
        );

        Ok(ProviderLoadMetrics {
            provider_id,
            provider_name: provider.full_name(),
            current_week,
            next_week,
            load_score: round2(load_score),
            status,
            available_capacity: round2(available_capacity),
            trend,
            recommendations: provider_recommendations(status, trend, provider.available_for_scheduling),
        })
    }

    fn week_load(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        appointments: &[Appointment],
        windows: &[AvailabilityWindow],
    ) -> WeekLoad {
        let in_week: Vec<&Appointment> = appointments
            .iter()
            .filter(|a| a.appointment_date >= start && a.appointment_date <= end)
            .collect();
        let booked_minutes: i64 = in_week.iter().map(|a| a.duration_minutes as i64).sum();

        let live: Vec<&AvailabilityWindow> = windows.iter().filter(|w| w.overlaps_range(start, end)).collect();
        let available_minutes = if live.is_empty() {
            self.config.standard_week_minutes
        } else {
            live.iter().map(|w| w.duration_minutes()).sum()
        };

        let utilization = if available_minutes > 0 {
            booked_minutes as f64 / available_minutes as f64 * 100.0
        } else {
            0.0
        };

        WeekLoad {
            week_start: start,
            week_end: end,
            total_appointments: in_week.len(),
            booked_minutes,
            available_minutes,
            utilization_rate: round2(utilization),
            average_appointments_per_day: round2(in_week.len() as f64 / 7.0),
        }
    }

    pub fn classify(&self, load_score: f64) -> LoadStatus {
        if load_score >= self.config.critical_from {
            LoadStatus::Critical
        } else if load_score >= self.config.overloaded_from {
            LoadStatus::Overloaded
        } else if load_score < self.config.underutilized_below {
            LoadStatus::Underutilized
        } else {
            LoadStatus::Balanced
        }
    }

    fn trend(&self, current: usize, next: usize) -> LoadTrend {
        let (current_f, next_f) = (current as f64, next as f64);
        if next_f > current_f * self.config.trend_increase_ratio {
            LoadTrend::Increasing
        } else if next_f < current_f * self.config.trend_decrease_ratio
            && current > self.config.trend_decrease_min_appointments
        {
            LoadTrend::Decreasing
        } else {
            LoadTrend::Stable
        }
    }

    /// Piecewise-linear ranking multiplier in `[0.5, 1.5]`, non-increasing in load.
    pub fn adjustment_for(&self, load_score: f64) -> f64 {
        let c = &self.config;
        let multiplier = if load_score >= c.critical_from {
            0.5
        } else if load_score >= c.overloaded_from {
            0.7 - (load_score - c.overloaded_from) / (c.critical_from - c.overloaded_from) * 0.2
        } else if load_score < c.underutilized_below {
            1.5 - load_score.max(0.0) / c.underutilized_below * 0.2
        } else {
            1.1 - (load_score - c.underutilized_below) / (c.overloaded_from - c.underutilized_below) * 0.2
        };
        multiplier.clamp(0.5, 1.5)
    }

    /// Never fails: a provider whose load can't be computed gets 1.0.
    pub async fn load_balancing_adjustment(&self, provider_id: Uuid) -> f64 {
        match self.provider_load(provider_id).await {
            Ok(metrics) => self.adjustment_for(metrics.load_score),
            Err(e) => {
                warn!("Load adjustment for {} defaulted to neutral: {}", provider_id, e);
                1.0
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn team_distribution(&self) -> Result<TeamLoadDistribution, SchedulingError> {
        let providers = self
            .store
            .list_providers(&ProviderFilter::active_with_roles(&[
                ProviderRole::Clinician,
                ProviderRole::Administrator,
            ]))
            .await?;

        if providers.is_empty() {
            return Err(SchedulingError::not_found("Active provider", "team"));
        }

        let results = gather_partial(providers.iter().map(|p| p.id), |provider_id| async move {
            self.provider_load(provider_id).await
        })
        .await;

        if results.succeeded.is_empty() {
            return Err(SchedulingError::Internal(format!(
                "load metrics failed for all {} providers",
                providers.len()
            )));
        }

        let scores: Vec<f64> = results.succeeded.iter().map(|m| m.load_score).collect();
        let (average_load, standard_deviation) = mean_and_std_dev(&scores);
        let balance_score = self.balance_score(standard_deviation);

        let imbalances = LoadImbalances {
            overloaded: results
                .succeeded
                .iter()
                .filter(|m| matches!(m.status, LoadStatus::Overloaded | LoadStatus::Critical))
                .map(|m| m.provider_id)
                .collect(),
            underutilized: results
                .succeeded
                .iter()
                .filter(|m| m.status == LoadStatus::Underutilized)
                .map(|m| m.provider_id)
                .collect(),
        };

        let active_providers = results
            .succeeded
            .iter()
            .filter(|m| m.load_score > 0.0 || m.current_week.total_appointments > 0)
            .count();

        let recommendations = self.team_recommendations(
            balance_score,
            standard_deviation,
            imbalances.overloaded.len(),
            imbalances.underutilized.len(),
            providers.len(),
        );

        info!(
            "Team load: {} providers, average {:.2}, balance {:.2}",
            providers.len(), average_load, balance_score
        );

        Ok(TeamLoadDistribution {
            team_metrics: TeamMetrics {
                total_providers: providers.len(),
                active_providers,
                average_load: round2(average_load),
                standard_deviation: round2(standard_deviation),
                balance_score: round2(balance_score),
            },
            providers: results.succeeded,
            imbalances,
            recommendations,
            failures: results.failures,
        })
    }

    pub fn balance_score(&self, standard_deviation: f64) -> f64 {
        (100.0 - standard_deviation * self.config.balance_dispersion_factor).clamp(0.0, 100.0)
    }

    fn team_recommendations(
        &self,
        balance_score: f64,
        standard_deviation: f64,
        overloaded: usize,
        underutilized: usize,
        total: usize,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        recommendations.push(
            if balance_score >= 80.0 {
                "Excellent team load balance - maintain current distribution"
            } else if balance_score >= 60.0 {
                "Good team load balance with minor adjustments needed"
            } else if balance_score >= 40.0 {
                "Moderate load imbalance - consider redistributing appointments"
            } else {
                "Significant load imbalance - immediate action required"
            }
            .to_string(),
        );

        if overloaded > 0 {
            recommendations.push(format!(
                "{} provider(s) overloaded - redistribute workload immediately",
                overloaded
            ));
        }

        if underutilized > 0 && overloaded > 0 {
            recommendations.push(format!(
                "Redistribute appointments from {} overloaded to {} underutilized providers",
                overloaded, underutilized
            ));
        } else if underutilized as f64 > total as f64 * 0.3 {
            recommendations.push(format!(
                "{} providers underutilized - increase marketing or reduce staff",
                underutilized
            ));
        }

        if standard_deviation > self.config.high_variance_std_dev {
            recommendations.push("High workload variance detected - implement load balancing policies".to_string());
        }

        recommendations
    }

    /// Typed actions derived from the team distribution.
    pub async fn recommendations(&self) -> Result<Vec<LoadBalancingRecommendation>, SchedulingError> {
        let distribution = self.team_distribution().await?;
        Ok(self.recommendations_for(&distribution))
    }

    pub fn recommendations_for(&self, distribution: &TeamLoadDistribution) -> Vec<LoadBalancingRecommendation> {
        let mut recommendations = Vec::new();
        let with_status = |status: LoadStatus| -> Vec<Uuid> {
            distribution
                .providers
                .iter()
                .filter(|m| m.status == status)
                .map(|m| m.provider_id)
                .collect()
        };

        let critical = with_status(LoadStatus::Critical);
        let overloaded = with_status(LoadStatus::Overloaded);

        if !critical.is_empty() {
            recommendations.push(LoadBalancingRecommendation {
                recommendation_type: RecommendationType::Redistribute,
                severity: Severity::Critical,
                description: format!(
                    "{} provider(s) are critically overloaded and require immediate workload reduction",
                    critical.len()
                ),
                affected_providers: critical,
                estimated_impact: "Prevents provider burnout and maintains service quality".to_string(),
                action_items: strings(&[
                    "Stop accepting new appointments for these providers",
                    "Contact affected providers to discuss workload",
                    "Redistribute scheduled appointments where possible",
                    "Increase availability of underutilized providers",
                ]),
            });
        } else if !overloaded.is_empty() {
            recommendations.push(LoadBalancingRecommendation {
                recommendation_type: RecommendationType::Redistribute,
                severity: Severity::High,
                description: format!(
                    "{} provider(s) are overloaded and nearing capacity",
                    overloaded.len()
                ),
                affected_providers: overloaded,
                estimated_impact: "Prevents escalation to critical overload".to_string(),
                action_items: strings(&[
                    "Reduce new appointment bookings for these providers",
                    "Offer waitlist clients to underutilized providers",
                    "Consider extending availability if providers agree",
                    "Monitor workload closely",
                ]),
            });
        }

        let imbalances = &distribution.imbalances;
        if !imbalances.underutilized.is_empty() {
            recommendations.push(LoadBalancingRecommendation {
                recommendation_type: RecommendationType::IncreaseAvailability,
                severity: if imbalances.overloaded.is_empty() { Severity::Medium } else { Severity::High },
                affected_providers: imbalances.underutilized.clone(),
                description: format!(
                    "{} provider(s) are underutilized and have available capacity",
                    imbalances.underutilized.len()
                ),
                estimated_impact: "Improves resource utilization and reduces wait times".to_string(),
                action_items: strings(&[
                    "Prioritize these providers for new appointment bookings",
                    "Assign waitlist clients to these providers",
                    "Review if providers want additional availability hours",
                    "Consider marketing to increase client volume",
                ]),
            });
        }

        if distribution.team_metrics.balance_score < self.config.poor_balance_score {
            recommendations.push(LoadBalancingRecommendation {
                recommendation_type: RecommendationType::Redistribute,
                severity: Severity::Medium,
                affected_providers: imbalances
                    .overloaded
                    .iter()
                    .chain(imbalances.underutilized.iter())
                    .copied()
                    .collect(),
                description: "Team workload distribution is significantly imbalanced".to_string(),
                estimated_impact: "Improves team morale and service consistency".to_string(),
                action_items: strings(&[
                    "Implement automated load balancing in scheduling algorithm",
                    "Review and update provider availability schedules",
                    "Consider team-based scheduling policies",
                    "Monitor load distribution weekly",
                ]),
            });
        }

        if distribution.team_metrics.average_load > self.config.hire_staff_average_load {
            recommendations.push(LoadBalancingRecommendation {
                recommendation_type: RecommendationType::HireStaff,
                severity: Severity::High,
                affected_providers: Vec::new(),
                description: "Team-wide utilization is very high - additional staff may be needed".to_string(),
                estimated_impact: "Reduces wait times and prevents provider burnout".to_string(),
                action_items: strings(&[
                    "Analyze hiring needs and budget",
                    "Consider hiring additional clinicians",
                    "Explore part-time or contract providers",
                    "Review waitlist size and growth trends",
                ]),
            });
        }

        recommendations
    }

    /// Providers with spare capacity, most capacity first.
    pub async fn providers_by_capacity(&self, limit: usize) -> Result<Vec<ProviderCapacity>, SchedulingError> {
        let distribution = self.team_distribution().await?;

        let mut providers: Vec<ProviderCapacity> = distribution
            .providers
            .into_iter()
            .filter(|m| m.available_capacity > 0.0)
            .map(|m| ProviderCapacity {
                provider_id: m.provider_id,
                provider_name: m.provider_name,
                available_capacity: m.available_capacity,
                load_score: m.load_score,
                status: m.status,
            })
            .collect();

        providers.sort_by(|a, b| {
            b.available_capacity
                .total_cmp(&a.available_capacity)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        providers.truncate(limit);

        Ok(providers)
    }
}

/// Population mean and standard deviation.
pub fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn provider_recommendations(status: LoadStatus, trend: LoadTrend, schedulable: bool) -> Vec<String> {
    let mut recommendations: Vec<&str> = match status {
        LoadStatus::Critical => vec![
            "CRITICAL: Provider is severely overloaded and may experience burnout",
            "Immediately stop accepting new appointments",
            "Consider redistributing existing appointments to other providers",
            "Schedule a workload review meeting",
        ],
        LoadStatus::Overloaded => vec![
            "Provider is overloaded and nearing capacity",
            "Temporarily reduce new appointment bookings",
            "Redistribute some waitlist clients to other providers",
            "Consider extending availability hours if provider agrees",
        ],
        LoadStatus::Underutilized if !schedulable => vec![
            "Provider is marked as unavailable for scheduling",
            "Consider enabling scheduling if provider has capacity",
        ],
        LoadStatus::Underutilized => vec![
            "Provider has significant available capacity",
            "Prioritize this provider for new appointment bookings",
            "Consider assigning waitlist clients to this provider",
            "Review if provider wants more availability hours",
        ],
        LoadStatus::Balanced => vec![
            "Provider workload is well-balanced",
            "Continue current scheduling patterns",
            "Monitor for changes in next week",
        ],
    };

    match trend {
        LoadTrend::Increasing => {
            recommendations.push("Significant increase in appointments next week - monitor closely")
        }
        LoadTrend::Decreasing => {
            recommendations.push("Sharp decrease in appointments next week - consider filling gaps")
        }
        LoadTrend::Stable => {}
    }

    strings(&recommendations)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
