use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppointmentQuery, PatternQuery, ProviderFilter, SchedulingStore};
use shared_models::error::SchedulingError;
use shared_models::scheduling::{
    AffectedEntities, AppointmentStatus, PatternCategory, PatternStatus, PatternType, Provider,
    ProviderRole, SchedulingPattern, Severity, TransitionOutcome,
};
use shared_utils::fanout::{gather_partial, PartialResults, TaskFailure};
use shared_utils::time::days_inclusive;
use shared_utils::{AppState, Clock};

use crate::models::{severity_for, DetectionRun, PatternDetectionConfig, PatternStatistics};

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const NO_SHOW_BASIS: [AppointmentStatus; 5] = [
    AppointmentStatus::NoShow,
    AppointmentStatus::Cancelled,
    AppointmentStatus::Scheduled,
    AppointmentStatus::Confirmed,
    AppointmentStatus::Completed,
];

const BOOKED: [AppointmentStatus; 4] = [
    AppointmentStatus::Scheduled,
    AppointmentStatus::Confirmed,
    AppointmentStatus::Completed,
    AppointmentStatus::InSession,
];

const GAP_BASIS: [AppointmentStatus; 3] = [
    AppointmentStatus::Scheduled,
    AppointmentStatus::Confirmed,
    AppointmentStatus::Completed,
];

type Detected = PartialResults<SchedulingPattern>;

/// Everything a detector decides about a pattern; the service stamps the rest.
struct Finding {
    pattern_type: PatternType,
    category: PatternCategory,
    severity: Severity,
    affected_entities: AffectedEntities,
    description: String,
    recommendations: Vec<String>,
    estimated_impact: String,
    metrics: Value,
}

#[derive(Debug, Clone, Copy)]
struct PairKey {
    client_id: Uuid,
    provider_id: Uuid,
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.client_id, self.provider_id)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub struct PatternService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    config: PatternDetectionConfig,
}

impl PatternService {
    pub fn new(store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>, config: PatternDetectionConfig) -> Self {
        Self { store, clock, config }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.clock.clone(), PatternDetectionConfig::default())
    }

    /// Analyse the trailing period ending today.
    pub async fn detect_recent(&self) -> Result<DetectionRun, SchedulingError> {
        self.detect(None, None).await
    }

    /// Missing bounds default to today and the analysis period before the end.
    pub async fn detect(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<DetectionRun, SchedulingError> {
        let end = end.unwrap_or_else(|| self.clock.today());
        let start = start.unwrap_or(end - Duration::days(self.config.analysis_period_days));
        self.detect_all(start, end).await
    }

    /// Run every detector over `[start, end]` and store what they find.
    #[instrument(skip(self))]
    pub async fn detect_all(&self, start: NaiveDate, end: NaiveDate) -> Result<DetectionRun, SchedulingError> {
        if start > end {
            return Err(SchedulingError::InvalidRequest(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        let (no_shows, underused, gaps, mismatches) = tokio::join!(
            self.detect_no_show_clusters(start, end),
            self.detect_underutilization(start, end),
            self.detect_gap_time(start, end),
            self.detect_preference_mismatches(start, end),
        );

        let mut detected = Vec::new();
        let mut failures: Vec<TaskFailure> = Vec::new();
        for (detector, outcome) in [
            ("no_show_clusters", no_shows),
            ("underutilization", underused),
            ("gap_time", gaps),
            ("preference_mismatch", mismatches),
        ] {
            match outcome {
                Ok(results) => {
                    debug!("{} found {} patterns", detector, results.succeeded.len());
                    detected.extend(results.succeeded);
                    failures.extend(results.failures);
                }
                Err(e) => {
                    warn!("Detector {} failed: {}", detector, e);
                    failures.push(TaskFailure {
                        key: detector.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut patterns = Vec::with_capacity(detected.len());
        for pattern in detected {
            let pattern_id = pattern.id;
            let category = pattern.category;
            match self.store.insert_pattern(pattern).await {
                Ok(stored) => patterns.push(stored),
                Err(e) => {
                    warn!("Could not store {} pattern {}: {}", category.as_str(), pattern_id, e);
                    failures.push(TaskFailure {
                        key: pattern_id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Pattern detection {}..{}: {} stored, {} failures",
            start,
            end,
            patterns.len(),
            failures.len()
        );

        Ok(DetectionRun {
            date_range_start: start,
            date_range_end: end,
            patterns,
            failures,
        })
    }

    fn stamp(&self, start: NaiveDate, end: NaiveDate, finding: Finding) -> SchedulingPattern {
        SchedulingPattern {
            id: Uuid::new_v4(),
            pattern_type: finding.pattern_type,
            category: finding.category,
            severity: finding.severity,
            affected_entities: finding.affected_entities,
            date_range_start: start,
            date_range_end: end,
            description: finding.description,
            recommendations: finding.recommendations,
            estimated_impact: finding.estimated_impact,
            metrics: finding.metrics,
            status: PatternStatus::Active,
            detected_at: self.clock.now(),
            resolved_at: None,
            resolution_note: None,
        }
    }

    async fn provider_names(&self) -> Result<HashMap<Uuid, String>, SchedulingError> {
        let providers = self.store.list_providers(&ProviderFilter::default()).await?;
        Ok(providers.into_iter().map(|p| (p.id, p.full_name())).collect())
    }

    async fn analysed_providers(&self) -> Result<Vec<Provider>, SchedulingError> {
        Ok(self
            .store
            .list_providers(&ProviderFilter::active_with_roles(&[
                ProviderRole::Administrator,
                ProviderRole::Clinician,
            ]))
            .await?)
    }

    // ==========================================================================
    // NO-SHOW CLUSTERS
    // ==========================================================================

    pub async fn detect_no_show_clusters(&self, start: NaiveDate, end: NaiveDate) -> Result<Detected, SchedulingError> {
        let appointments = self
            .store
            .list_appointments(&AppointmentQuery::in_range(start, end).with_statuses(&NO_SHOW_BASIS))
            .await?;

        let mut detected = Detected::default();
        let min_sample = self.config.no_show_min_appointments;
        if appointments.len() < min_sample {
            return Ok(detected);
        }

        let names = self.provider_names().await?;

        let mut by_provider: BTreeMap<Uuid, (usize, usize)> = BTreeMap::new();
        let mut by_day = [(0usize, 0usize); 7];
        for appointment in &appointments {
            let no_show = appointment.status == AppointmentStatus::NoShow;

            let provider = by_provider.entry(appointment.provider_id).or_default();
            provider.0 += 1;
            provider.1 += no_show as usize;

            let day = &mut by_day[appointment.appointment_date.weekday().num_days_from_sunday() as usize];
            day.0 += 1;
            day.1 += no_show as usize;
        }

        for (provider_id, (total, no_shows)) in by_provider {
            if total < min_sample {
                continue;
            }
            let rate = no_shows as f64 / total as f64;
            if rate < self.config.no_show_rate_threshold {
                continue;
            }

            let provider_name = names
                .get(&provider_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            let finding = Finding {
                pattern_type: PatternType::Inefficiency,
                category: PatternCategory::NoShowCluster,
                severity: severity_for(&self.config.no_show_provider_steps, rate, self.config.no_show_floor),
                affected_entities: AffectedEntities {
                    provider_ids: vec![provider_id],
                    ..Default::default()
                },
                description: format!(
                    "High no-show rate detected for {}: {:.1}% ({}/{} appointments)",
                    provider_name,
                    rate * 100.0,
                    no_shows,
                    total
                ),
                recommendations: strings(&[
                    "Implement reminder system (SMS/email) 24 hours before appointment",
                    "Consider requiring deposit or cancellation policy",
                    "Review scheduling practices and client communication",
                    "Offer telehealth options to reduce no-shows",
                    "Identify clients with repeat no-shows for follow-up",
                ]),
                estimated_impact: format!(
                    "Potential revenue loss: {} missed appointments. Average session value may be significant.",
                    no_shows
                ),
                metrics: json!({
                    "no_show_rate": rate,
                    "total_appointments": total,
                    "no_show_count": no_shows,
                }),
            };
            detected.succeeded.push(self.stamp(start, end, finding));
        }

        for (day, (total, no_shows)) in by_day.into_iter().enumerate() {
            if total < min_sample {
                continue;
            }
            let rate = no_shows as f64 / total as f64;
            if rate < self.config.no_show_rate_threshold {
                continue;
            }

            let day_name = DAY_NAMES[day];
            let finding = Finding {
                pattern_type: PatternType::Trend,
                category: PatternCategory::NoShowCluster,
                severity: severity_for(&self.config.no_show_day_steps, rate, self.config.no_show_floor),
                affected_entities: AffectedEntities {
                    days_of_week: vec![day as u32],
                    ..Default::default()
                },
                description: format!(
                    "Elevated no-show rate on {}s: {:.1}% ({}/{} appointments)",
                    day_name,
                    rate * 100.0,
                    no_shows,
                    total
                ),
                recommendations: vec![
                    format!("Send extra reminders for {} appointments", day_name),
                    format!("Consider overbooking slightly on {}s to compensate", day_name),
                    "Analyze if certain time slots on this day are more problematic".to_string(),
                    "Review if this day has specific scheduling challenges".to_string(),
                ],
                estimated_impact: format!(
                    "{} no-shows on {}s could be reduced with targeted interventions",
                    no_shows, day_name
                ),
                metrics: json!({
                    "day_of_week": day,
                    "day_name": day_name,
                    "no_show_rate": rate,
                    "total_appointments": total,
                    "no_show_count": no_shows,
                }),
            };
            detected.succeeded.push(self.stamp(start, end, finding));
        }

        Ok(detected)
    }

    // ==========================================================================
    // UNDERUTILIZATION
    // ==========================================================================

    pub async fn detect_underutilization(&self, start: NaiveDate, end: NaiveDate) -> Result<Detected, SchedulingError> {
        let providers = self.analysed_providers().await?;

        let results = gather_partial(providers.iter().map(|p| p.id), |provider_id| {
            let provider = providers.iter().find(|p| p.id == provider_id);
            async move {
                match provider {
                    Some(provider) => self.provider_utilization(provider, start, end).await,
                    None => Err(SchedulingError::not_found("Provider", provider_id)),
                }
            }
        })
        .await;

        Ok(Detected {
            succeeded: results.succeeded.into_iter().flatten().collect(),
            failures: results.failures,
        })
    }

    async fn provider_utilization(
        &self,
        provider: &Provider,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<SchedulingPattern>, SchedulingError> {
        let windows: Vec<_> = self
            .store
            .list_availability(provider.id)
            .await?
            .into_iter()
            .filter(|w| w.overlaps_range(start, end))
            .collect();
        if windows.is_empty() {
            return Ok(None);
        }

        let weeks = days_inclusive(start, end) as f64 / 7.0;
        let weekly_minutes: i64 = windows.iter().map(|w| w.duration_minutes()).sum();
        let available_minutes = weekly_minutes as f64 * weeks;

        let appointments = self
            .store
            .list_appointments(&AppointmentQuery::for_provider(provider.id, start, end).with_statuses(&BOOKED))
            .await?;
        let scheduled_minutes: f64 = appointments.iter().map(|a| a.duration_minutes as f64).sum();

        let utilization = if available_minutes > 0.0 {
            scheduled_minutes / available_minutes
        } else {
            0.0
        };
        debug!("Provider {} utilization {:.3}", provider.id, utilization);

        if utilization >= self.config.underutilization_threshold || !provider.available_for_scheduling {
            return Ok(None);
        }

        let unused_minutes = available_minutes - scheduled_minutes;
        let finding = Finding {
            pattern_type: PatternType::Inefficiency,
            category: PatternCategory::Underutilization,
            severity: self.config.underutilization_severity(utilization),
            affected_entities: AffectedEntities {
                provider_ids: vec![provider.id],
                ..Default::default()
            },
            description: format!(
                "Provider {} is significantly underutilized: {:.1}% utilization ({} appointments)",
                provider.full_name(),
                utilization * 100.0,
                appointments.len()
            ),
            recommendations: strings(&[
                "Review provider availability schedule - may be too optimistic",
                "Increase marketing efforts to fill provider schedule",
                "Consider reassigning clients from overbooked providers",
                "Review if provider specialties match client needs",
                "Evaluate if provider should reduce available hours",
            ]),
            estimated_impact: format!(
                "{:.0}% of available time is unused. Potential for {} additional hours of billable appointments.",
                (1.0 - utilization) * 100.0,
                (unused_minutes / 60.0).floor() as i64
            ),
            metrics: json!({
                "utilization_rate": utilization,
                "total_appointments": appointments.len(),
                "available_hours": (available_minutes / 60.0).round(),
                "scheduled_hours": (scheduled_minutes / 60.0).round(),
                "unused_hours": (unused_minutes / 60.0).round(),
            }),
        };

        Ok(Some(self.stamp(start, end, finding)))
    }

    // ==========================================================================
    // GAP TIME
    // ==========================================================================

    pub async fn detect_gap_time(&self, start: NaiveDate, end: NaiveDate) -> Result<Detected, SchedulingError> {
        let providers = self.analysed_providers().await?;

        let results = gather_partial(providers.iter().map(|p| p.id), |provider_id| {
            let provider = providers.iter().find(|p| p.id == provider_id);
            async move {
                match provider {
                    Some(provider) => self.provider_gaps(provider, start, end).await,
                    None => Err(SchedulingError::not_found("Provider", provider_id)),
                }
            }
        })
        .await;

        Ok(Detected {
            succeeded: results.succeeded.into_iter().flatten().collect(),
            failures: results.failures,
        })
    }

    async fn provider_gaps(
        &self,
        provider: &Provider,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<SchedulingPattern>, SchedulingError> {
        let appointments = self
            .store
            .list_appointments(&AppointmentQuery::for_provider(provider.id, start, end).with_statuses(&GAP_BASIS))
            .await?;
        if appointments.len() < 2 {
            return Ok(None);
        }

        let mut gaps_by_day: BTreeMap<NaiveDate, Vec<i64>> = BTreeMap::new();
        for pair in appointments.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            if current.appointment_date != next.appointment_date {
                continue;
            }
            let gap = (next.start_time - current.end_time).num_minutes();
            if gap > 0 {
                gaps_by_day.entry(current.appointment_date).or_default().push(gap);
            }
        }

        let gaps: Vec<i64> = gaps_by_day.values().flatten().copied().collect();
        if gaps.is_empty() {
            return Ok(None);
        }

        let total_gap_minutes: i64 = gaps.iter().sum();
        let average_gap = total_gap_minutes as f64 / gaps.len() as f64;
        let large_gaps = gaps
            .iter()
            .filter(|g| **g >= self.config.gap_threshold_minutes)
            .count();
        let large_share = large_gaps as f64 / gaps.len() as f64;

        if average_gap < self.config.gap_flag_average_minutes && large_share < self.config.gap_flag_large_share {
            return Ok(None);
        }

        let finding = Finding {
            pattern_type: PatternType::Inefficiency,
            category: PatternCategory::GapTime,
            severity: self.config.gap_severity(average_gap, large_share),
            affected_entities: AffectedEntities {
                provider_ids: vec![provider.id],
                ..Default::default()
            },
            description: format!(
                "Inefficient scheduling gaps detected for {}: {} min average gap, {} gaps over {} minutes",
                provider.full_name(),
                average_gap.round(),
                large_gaps,
                self.config.gap_threshold_minutes
            ),
            recommendations: strings(&[
                "Optimize appointment scheduling to reduce gaps",
                "Consider offering shorter appointment slots to fill gaps",
                "Use gap times for administrative tasks or breaks (if intentional)",
                "Enable online booking to help fill unexpected gaps",
                "Review appointment duration settings - may be too long",
            ]),
            estimated_impact: format!(
                "{} hours of potential appointment time lost to gaps. Could accommodate {} additional {}-minute sessions.",
                (total_gap_minutes as f64 / 60.0).round(),
                total_gap_minutes / self.config.gap_fill_session_minutes,
                self.config.gap_fill_session_minutes
            ),
            metrics: json!({
                "average_gap_minutes": average_gap.round(),
                "total_gap_hours": (total_gap_minutes as f64 / 60.0).round(),
                "large_gap_count": large_gaps,
                "large_gap_percentage": (large_share * 1000.0).round() / 10.0,
                "days_analyzed": gaps_by_day.len(),
            }),
        };

        Ok(Some(self.stamp(start, end, finding)))
    }

    // ==========================================================================
    // PREFERENCE MISMATCH
    // ==========================================================================

    pub async fn detect_preference_mismatches(&self, start: NaiveDate, end: NaiveDate) -> Result<Detected, SchedulingError> {
        let completed = self
            .store
            .list_appointments(
                &AppointmentQuery::in_range(start, end).with_statuses(&[AppointmentStatus::Completed]),
            )
            .await?;

        let mut pair_counts: BTreeMap<(Uuid, Uuid), usize> = BTreeMap::new();
        for appointment in &completed {
            *pair_counts
                .entry((appointment.client_id, appointment.provider_id))
                .or_default() += 1;
        }

        let repeat_pairs: Vec<PairKey> = pair_counts
            .iter()
            .filter(|(_, count)| **count >= self.config.mismatch_min_completed)
            .map(|((client_id, provider_id), _)| PairKey {
                client_id: *client_id,
                provider_id: *provider_id,
            })
            .collect();
        if repeat_pairs.is_empty() {
            return Ok(Detected::default());
        }

        let lookups = gather_partial(repeat_pairs, |pair| async move {
            let score = self
                .store
                .get_compatibility(pair.provider_id, pair.client_id)
                .await?
                .map(|row| row.overall_score * 100.0);
            Ok::<_, SchedulingError>((pair, score))
        })
        .await;

        let mut by_provider: BTreeMap<Uuid, Vec<(Uuid, usize, f64)>> = BTreeMap::new();
        for (pair, score) in lookups.succeeded {
            let Some(score) = score else { continue };
            if score >= self.config.mismatch_score_below {
                continue;
            }
            let count = pair_counts
                .get(&(pair.client_id, pair.provider_id))
                .copied()
                .unwrap_or_default();
            by_provider
                .entry(pair.provider_id)
                .or_default()
                .push((pair.client_id, count, score));
        }

        let mut detected = Detected {
            succeeded: Vec::new(),
            failures: lookups.failures,
        };
        if by_provider.is_empty() {
            return Ok(detected);
        }

        let names = self.provider_names().await?;
        for (provider_id, mismatches) in by_provider {
            if mismatches.len() < self.config.mismatch_min_clients {
                continue;
            }

            let total_appointments: usize = mismatches.iter().map(|(_, count, _)| count).sum();
            let average_score =
                mismatches.iter().map(|(_, _, score)| score).sum::<f64>() / mismatches.len() as f64;
            let provider_name = names
                .get(&provider_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());

            let finding = Finding {
                pattern_type: PatternType::Inefficiency,
                category: PatternCategory::PreferenceMismatch,
                severity: self.config.mismatch_severity(average_score),
                affected_entities: AffectedEntities {
                    provider_ids: vec![provider_id],
                    client_ids: mismatches.iter().map(|(client_id, _, _)| *client_id).collect(),
                    ..Default::default()
                },
                description: format!(
                    "{} clients have low compatibility with {} (avg score: {:.1}) despite {} completed appointments",
                    mismatches.len(),
                    provider_name,
                    average_score,
                    total_appointments
                ),
                recommendations: strings(&[
                    "Review client assignments and consider alternative providers",
                    "Consult with clients about provider preferences",
                    "Analyze what factors are causing low compatibility scores",
                    "Consider transitioning clients to better-matched providers",
                    "Review provider specialties and client needs alignment",
                ]),
                estimated_impact: format!(
                    "Improved client-provider matching could increase satisfaction and reduce cancellations/no-shows. {} appointments may benefit from provider reassignment.",
                    total_appointments
                ),
                metrics: json!({
                    "mismatched_clients": mismatches.len(),
                    "total_affected_appointments": total_appointments,
                    "average_compatibility": (average_score * 10.0).round() / 10.0,
                    "clients": mismatches
                        .iter()
                        .map(|(client_id, count, score)| json!({
                            "client_id": client_id,
                            "appointments": count,
                            "score": score,
                        }))
                        .collect::<Vec<_>>(),
                }),
            };
            detected.succeeded.push(self.stamp(start, end, finding));
        }

        Ok(detected)
    }

    // ==========================================================================
    // LIFECYCLE & QUERIES
    // ==========================================================================

    pub async fn resolve(&self, pattern_id: Uuid, note: Option<String>) -> Result<SchedulingPattern, SchedulingError> {
        self.transition(pattern_id, PatternStatus::Resolved, note).await
    }

    pub async fn ignore(&self, pattern_id: Uuid, note: Option<String>) -> Result<SchedulingPattern, SchedulingError> {
        self.transition(pattern_id, PatternStatus::Ignored, note).await
    }

    #[instrument(skip(self, note))]
    async fn transition(
        &self,
        pattern_id: Uuid,
        status: PatternStatus,
        note: Option<String>,
    ) -> Result<SchedulingPattern, SchedulingError> {
        match self
            .store
            .transition_pattern(pattern_id, status, note, self.clock.now())
            .await?
        {
            TransitionOutcome::Updated(pattern) => {
                info!("Pattern {} marked {}", pattern_id, status.as_str());
                Ok(pattern)
            }
            TransitionOutcome::NotActive(current) => Err(SchedulingError::InvalidRequest(format!(
                "Pattern {} is already {}",
                pattern_id,
                current.as_str()
            ))),
            TransitionOutcome::NotFound => Err(SchedulingError::not_found("Pattern", pattern_id)),
        }
    }

    pub async fn get_pattern(&self, pattern_id: Uuid) -> Result<SchedulingPattern, SchedulingError> {
        self.store
            .get_pattern(pattern_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Pattern", pattern_id))
    }

    /// Active patterns, most severe first, then most recently detected.
    pub async fn active_patterns(
        &self,
        severity: Option<Severity>,
        category: Option<PatternCategory>,
    ) -> Result<Vec<SchedulingPattern>, SchedulingError> {
        let mut patterns = self
            .store
            .list_patterns(&PatternQuery {
                status: Some(PatternStatus::Active),
                severity,
                category,
            })
            .await?;
        patterns.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.detected_at.cmp(&a.detected_at))
        });
        Ok(patterns)
    }

    pub async fn statistics(&self) -> Result<PatternStatistics, SchedulingError> {
        let patterns = self.store.list_patterns(&PatternQuery::default()).await?;

        let mut stats = PatternStatistics {
            total: patterns.len(),
            ..Default::default()
        };
        for pattern in &patterns {
            match pattern.status {
                PatternStatus::Active => stats.active += 1,
                PatternStatus::Resolved => stats.resolved += 1,
                PatternStatus::Ignored => stats.ignored += 1,
            }
            *stats
                .by_severity
                .entry(pattern.severity.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_category
                .entry(pattern.category.as_str().to_string())
                .or_default() += 1;
        }

        Ok(stats)
    }
}
