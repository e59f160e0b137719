//! Fixture builders shared by the cells' test suites.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::InMemoryStore;
use shared_models::scheduling::*;
use shared_models::time_format::parse_hhmm;

use crate::clock::FixedClock;
use crate::state::AppState;
use crate::time::add_minutes;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig::for_store(self.supabase_url.clone(), self.supabase_service_key.clone())
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

pub fn hhmm(value: &str) -> NaiveTime {
    parse_hhmm(value).expect("valid HH:mm test time")
}

pub fn clinician(first_name: &str, last_name: &str) -> Provider {
    Provider {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        roles: vec![ProviderRole::Clinician],
        is_active: true,
        available_for_scheduling: true,
        accepts_new_clients: true,
        specialties: vec![],
        years_of_experience: Some(5),
    }
}

pub fn active_client(first_name: &str, last_name: &str) -> Client {
    Client {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        status: ClientStatus::Active,
        insurance_ids: vec![],
        diagnosis_codes: vec![],
    }
}

/// Open-ended weekly window; `day_of_week` is 0 = Sunday.
pub fn weekly_window(provider_id: Uuid, day_of_week: u32, start: &str, end: &str) -> AvailabilityWindow {
    AvailabilityWindow {
        id: Uuid::new_v4(),
        provider_id,
        day_of_week,
        start_time: hhmm(start),
        end_time: hhmm(end),
        effective_date: None,
        expiry_date: None,
        max_appointments_per_day: None,
        is_telehealth: false,
        office_location_id: None,
        is_active: true,
    }
}

pub fn booked(
    provider_id: Uuid,
    client_id: Uuid,
    date: NaiveDate,
    start: &str,
    minutes: i32,
    status: AppointmentStatus,
) -> Appointment {
    let start_time = hhmm(start);
    Appointment {
        id: Uuid::new_v4(),
        client_id,
        provider_id,
        appointment_date: date,
        start_time,
        end_time: add_minutes(start_time, minutes as i64).expect("test appointment ends same day"),
        duration_minutes: minutes,
        status,
        appointment_type_id: None,
        created_by: Some("test".to_string()),
        created_at: Utc::now(),
    }
}

pub fn appointment_type(type_name: &str, minutes: i32) -> AppointmentType {
    AppointmentType {
        id: Uuid::new_v4(),
        type_name: type_name.to_string(),
        default_duration_minutes: minutes,
        is_active: true,
    }
}

pub fn cached_compatibility(provider_id: Uuid, client_id: Uuid, overall_score: f64) -> CompatibilityScore {
    CompatibilityScore {
        provider_id,
        client_id,
        overall_score,
        specialty_match: overall_score,
        availability_match: overall_score,
        experience_match: overall_score,
        insurance_match: 0.8,
        location_match: 0.9,
        style_match: 0.8,
        total_appointments: 0,
        no_show_count: 0,
        cancellation_count: 0,
        factors: json!({}),
        last_calculated: Utc::now(),
    }
}

/// In-memory practice with a pinned clock.
pub struct TestPractice {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub config: Arc<AppConfig>,
}

impl TestPractice {
    /// Practice whose "today" is `today`, at 08:00 UTC.
    pub fn on(today: NaiveDate) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            clock: Arc::new(FixedClock::on(today, hhmm("08:00"))),
            config: TestConfig::default().to_arc(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.config.clone(), self.store.clone(), self.clock.clone())
    }

    /// Seed an active clinician with the given weekly windows.
    pub fn add_clinician(&self, first_name: &str, last_name: &str, windows: &[(u32, &str, &str)]) -> Provider {
        let provider = clinician(first_name, last_name);
        self.store.add_provider(provider.clone());
        for (day, start, end) in windows {
            self.store.add_availability(weekly_window(provider.id, *day, start, end));
        }
        provider
    }

    pub fn add_client(&self, first_name: &str, last_name: &str) -> Client {
        let client = active_client(first_name, last_name);
        self.store.add_client(client.clone());
        client
    }

    pub fn add_type(&self, type_name: &str, minutes: i32) -> AppointmentType {
        let appointment_type = appointment_type(type_name, minutes);
        self.store.add_appointment_type(appointment_type.clone());
        appointment_type
    }

    pub fn book(
        &self,
        provider_id: Uuid,
        client_id: Uuid,
        date: NaiveDate,
        start: &str,
        minutes: i32,
        status: AppointmentStatus,
    ) -> Appointment {
        let appointment = booked(provider_id, client_id, date, start, minutes, status);
        self.store.add_appointment(appointment.clone());
        appointment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use shared_database::SchedulingStore;

    #[test]
    fn test_config_creation() {
        let app_config = TestConfig::default().to_app_config();
        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert!(app_config.is_configured());
    }

    #[tokio::test]
    async fn practice_seeds_store() {
        let practice = TestPractice::on(ymd(2026, 3, 2));
        let provider = practice.add_clinician("Sam", "Smith", &[(1, "09:00", "12:00")]);
        let client = practice.add_client("Jo", "Lee");
        let appointment = practice.book(
            provider.id,
            client.id,
            ymd(2026, 3, 2),
            "09:00",
            50,
            AppointmentStatus::Scheduled,
        );

        assert_eq!(appointment.end_time, hhmm("09:50"));
        let windows = practice.store.list_availability(provider.id).await.unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(practice.state().clock.today(), ymd(2026, 3, 2));
    }
}
