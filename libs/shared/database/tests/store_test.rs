use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::{body_partial_json, header, method, path, query_param}};

use shared_config::AppConfig;
use shared_database::{
    AppointmentQuery, FailurePoint, InMemoryStore, PatternQuery, ProviderFilter, SchedulingStore,
    SupabaseSchedulingStore,
};
use shared_models::scheduling::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn provider(last_name: &str, roles: Vec<ProviderRole>) -> Provider {
    Provider {
        id: Uuid::new_v4(),
        first_name: "Alex".to_string(),
        last_name: last_name.to_string(),
        roles,
        is_active: true,
        available_for_scheduling: true,
        accepts_new_clients: true,
        specialties: vec![],
        years_of_experience: Some(4),
    }
}

fn new_appointment(provider_id: Uuid, client_id: Uuid) -> NewAppointment {
    NewAppointment {
        client_id,
        provider_id,
        appointment_date: date(2026, 3, 2),
        start_time: time(9, 0),
        end_time: time(10, 0),
        duration_minutes: 60,
        status: AppointmentStatus::Scheduled,
        appointment_type_id: None,
        created_by: Some("front-desk".to_string()),
    }
}

fn suggestion(client_id: Uuid, provider_id: Uuid) -> SchedulingSuggestion {
    SchedulingSuggestion {
        id: Uuid::new_v4(),
        request_id: Uuid::new_v4(),
        suggestion_type: SuggestionType::OptimalSlot,
        client_id,
        requested_provider_id: None,
        appointment_type_id: Uuid::new_v4(),
        requested_date: None,
        requested_time: None,
        flexibility_days: 7,
        suggested_provider_id: provider_id,
        provider_name: "Alex Rivera".to_string(),
        suggested_date: date(2026, 3, 2),
        suggested_time: time(9, 0),
        suggested_duration: 60,
        alternative_slots: vec![],
        compatibility_score: 0.8,
        load_balance_score: 0.7,
        efficiency_score: 0.8,
        overall_score: 0.77,
        confidence_level: ConfidenceLevel::Medium,
        reasoning: "Available slot matching requested criteria.".to_string(),
        was_accepted: false,
        accepted_at: None,
        accepted_by: None,
        created_appointment_id: None,
        created_at: Utc::now(),
    }
}

fn pattern() -> SchedulingPattern {
    SchedulingPattern {
        id: Uuid::new_v4(),
        pattern_type: PatternType::Inefficiency,
        category: PatternCategory::GapTime,
        severity: Severity::Medium,
        affected_entities: AffectedEntities::default(),
        date_range_start: date(2026, 2, 1),
        date_range_end: date(2026, 3, 1),
        description: "Gaps".to_string(),
        recommendations: vec![],
        estimated_impact: "Some".to_string(),
        metrics: json!({}),
        status: PatternStatus::Active,
        detected_at: Utc::now(),
        resolved_at: None,
        resolution_note: None,
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[tokio::test]
async fn accept_books_once_and_rejects_second_accept() {
    let store = InMemoryStore::new();
    let client_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();
    let stored = suggestion(client_id, provider_id);
    store.insert_suggestion(stored.clone()).await.unwrap();

    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let first = store
        .accept_suggestion(stored.id, new_appointment(provider_id, client_id), "front-desk", at)
        .await
        .unwrap();

    let appointment_id = assert_matches!(first, AcceptOutcome::Accepted { suggestion, appointment } => {
        assert!(suggestion.was_accepted);
        assert_eq!(suggestion.accepted_by.as_deref(), Some("front-desk"));
        assert_eq!(suggestion.created_appointment_id, Some(appointment.id));
        appointment.id
    });

    let second = store
        .accept_suggestion(stored.id, new_appointment(provider_id, client_id), "someone-else", at)
        .await
        .unwrap();
    assert_matches!(second, AcceptOutcome::AlreadyAccepted);

    let appointments = store.appointments();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].id, appointment_id);
}

#[tokio::test]
async fn accept_unknown_suggestion_is_not_found() {
    let store = InMemoryStore::new();
    let outcome = store
        .accept_suggestion(Uuid::new_v4(), new_appointment(Uuid::new_v4(), Uuid::new_v4()), "x", Utc::now())
        .await
        .unwrap();
    assert_matches!(outcome, AcceptOutcome::NotFound);
    assert!(store.appointments().is_empty());
}

#[tokio::test]
async fn pattern_transition_only_moves_active_patterns() {
    let store = InMemoryStore::new();
    let stored = store.insert_pattern(pattern()).await.unwrap();

    let resolved = store
        .transition_pattern(stored.id, PatternStatus::Resolved, Some("rebalanced".to_string()), Utc::now())
        .await
        .unwrap();
    assert_matches!(resolved, TransitionOutcome::Updated(p) => {
        assert_eq!(p.status, PatternStatus::Resolved);
        assert!(p.resolved_at.is_some());
        assert_eq!(p.resolution_note.as_deref(), Some("rebalanced"));
    });

    let again = store
        .transition_pattern(stored.id, PatternStatus::Ignored, None, Utc::now())
        .await
        .unwrap();
    assert_matches!(again, TransitionOutcome::NotActive(PatternStatus::Resolved));

    let active = store
        .list_patterns(&PatternQuery { status: Some(PatternStatus::Active), ..Default::default() })
        .await
        .unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn provider_filter_applies_roles_and_flags() {
    let store = InMemoryStore::new();
    let clinician = provider("Rivera", vec![ProviderRole::Clinician]);
    let mut inactive = provider("Chen", vec![ProviderRole::Clinician]);
    inactive.is_active = false;
    let admin = provider("Okafor", vec![ProviderRole::Administrator]);
    store.add_provider(clinician.clone());
    store.add_provider(inactive);
    store.add_provider(admin);

    let found = store
        .list_providers(&ProviderFilter::active_with_roles(&[ProviderRole::Clinician, ProviderRole::Supervisor]))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, clinician.id);
}

#[tokio::test]
async fn appointment_listing_is_filtered_and_ordered() {
    let store = InMemoryStore::new();
    let provider_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();

    for (day, hour, status) in [
        (3, 9, AppointmentStatus::Scheduled),
        (2, 14, AppointmentStatus::Completed),
        (2, 9, AppointmentStatus::Cancelled),
        (9, 9, AppointmentStatus::Scheduled),
    ] {
        let mut new = new_appointment(provider_id, client_id);
        new.appointment_date = date(2026, 3, day);
        new.start_time = time(hour, 0);
        new.end_time = time(hour + 1, 0);
        new.status = status;
        store.create_appointment(new).await.unwrap();
    }

    let listed = store
        .list_appointments(
            &AppointmentQuery::for_provider(provider_id, date(2026, 3, 1), date(2026, 3, 7))
                .with_statuses(&[AppointmentStatus::Scheduled, AppointmentStatus::Completed]),
        )
        .await
        .unwrap();

    let keys: Vec<(u32, u32)> = listed
        .iter()
        .map(|a| (chrono::Datelike::day(&a.appointment_date), chrono::Timelike::hour(&a.start_time)))
        .collect();
    assert_eq!(keys, vec![(2, 14), (3, 9)]);
}

#[tokio::test]
async fn injected_failures_surface_as_errors() {
    let store = InMemoryStore::new();
    let provider_id = Uuid::new_v4();
    store.inject_failure(FailurePoint::AvailabilityFor(provider_id));

    assert!(store.list_availability(provider_id).await.is_err());
    assert!(store.list_availability(Uuid::new_v4()).await.is_ok());
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

async fn supabase_store() -> (MockServer, SupabaseSchedulingStore) {
    let mock_server = MockServer::start().await;
    let config = AppConfig::for_store(mock_server.uri(), "service-key");
    let store = SupabaseSchedulingStore::new(&config);
    (mock_server, store)
}

#[tokio::test]
async fn supabase_lists_providers_with_role_filter() {
    let (mock_server, store) = supabase_store().await;
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("roles", "ov.{CLINICIAN}"))
        .and(query_param("is_active", "eq.true"))
        .and(header("apikey", "service-key"))
        .and(header("Authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": provider_id,
            "first_name": "Sam",
            "last_name": "Smith",
            "roles": ["CLINICIAN"],
            "is_active": true,
            "available_for_scheduling": true,
            "accepts_new_clients": true,
            "specialties": ["Anxiety"],
            "years_of_experience": 6
        }])))
        .mount(&mock_server)
        .await;

    let providers = store
        .list_providers(&ProviderFilter::active_with_roles(&[ProviderRole::Clinician]))
        .await
        .unwrap();

    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].id, provider_id);
    assert_eq!(providers[0].specialties, vec!["Anxiety".to_string()]);
}

#[tokio::test]
async fn supabase_parses_hhmmss_availability_times() {
    let (mock_server, store) = supabase_store().await;
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/provider_availability"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "day_of_week": 1,
            "start_time": "09:00:00",
            "end_time": "12:30:00",
            "effective_date": null,
            "expiry_date": null,
            "max_appointments_per_day": 4,
            "is_telehealth": false,
            "office_location_id": null
        }])))
        .mount(&mock_server)
        .await;

    let windows = store.list_availability(provider_id).await.unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].end_time, time(12, 30));
    assert!(windows[0].is_active);
}

#[tokio::test]
async fn supabase_accept_maps_rpc_outcome() {
    let (mock_server, store) = supabase_store().await;
    let suggestion_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/accept_scheduling_suggestion"))
        .and(body_partial_json(json!({ "p_suggestion_id": suggestion_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "outcome": "already_accepted"
        })))
        .mount(&mock_server)
        .await;

    let outcome = store
        .accept_suggestion(suggestion_id, new_appointment(Uuid::new_v4(), Uuid::new_v4()), "x", Utc::now())
        .await
        .unwrap();
    assert_matches!(outcome, AcceptOutcome::AlreadyAccepted);
}

#[tokio::test]
async fn supabase_transition_reports_non_active_pattern() {
    let (mock_server, store) = supabase_store().await;
    let mut existing = pattern();
    existing.status = PatternStatus::Ignored;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/scheduling_patterns"))
        .and(query_param("status", "eq.ACTIVE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scheduling_patterns"))
        .and(query_param("id", format!("eq.{}", existing.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&mock_server)
        .await;

    let outcome = store
        .transition_pattern(existing.id, PatternStatus::Resolved, None, Utc::now())
        .await
        .unwrap();
    assert_matches!(outcome, TransitionOutcome::NotActive(PatternStatus::Ignored));
}

#[tokio::test]
async fn supabase_errors_propagate() {
    let (mock_server, store) = supabase_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let err = store.get_client(Uuid::new_v4()).await.unwrap_err();
    assert!(err.to_string().contains("500"));
}
