use assert_matches::assert_matches;
use chrono::NaiveDate;
use uuid::Uuid;

use scheduling_cell::models::{SchedulingRequest, SuggestionConfig};
use scheduling_cell::SuggestionService;
use shared_database::FailurePoint;
use shared_models::error::SchedulingError;
use shared_models::scheduling::{
    AppointmentStatus, ConfidenceLevel, SuggestionType, TimeOffRequest, TimeOffStatus,
};
use shared_utils::test_utils::{hhmm, ymd, TestPractice};

// 2026-03-04 is a Wednesday; 03-05 Thursday (4), 03-06 Friday (5)
fn practice() -> TestPractice {
    TestPractice::on(ymd(2026, 3, 4))
}

fn thursday_request(client_id: Uuid, type_id: Uuid, provider_id: Option<Uuid>) -> SchedulingRequest {
    SchedulingRequest {
        provider_id,
        requested_date: Some(ymd(2026, 3, 5)),
        flexibility_days: Some(0),
        ..SchedulingRequest::new(client_id, type_id)
    }
}

#[tokio::test]
async fn requested_provider_gets_conflict_free_best_slot_and_alternatives() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    let other = practice.add_client("Al", "Kim");
    let intake = practice.add_type("Intake", 60);

    let existing = practice.book(provider.id, other.id, ymd(2026, 3, 5), "09:00", 60, AppointmentStatus::Scheduled);
    practice.book(provider.id, other.id, ymd(2026, 3, 5), "10:30", 60, AppointmentStatus::Cancelled);

    let service = SuggestionService::from_state(&practice.state());
    let generated = service
        .generate(&thursday_request(client.id, intake.id, Some(provider.id)))
        .await
        .unwrap();

    assert_eq!(generated.suggestions.len(), 1);
    let suggestion = &generated.suggestions[0];
    assert_eq!(suggestion.suggestion_type, SuggestionType::OptimalSlot);
    assert_eq!(suggestion.suggested_provider_id, provider.id);
    assert_eq!(suggestion.provider_name, "Sam Smith");
    assert_eq!(suggestion.suggested_time, hhmm("10:00"));
    assert_eq!(suggestion.suggested_duration, 60);

    let alternative_starts: Vec<_> = suggestion.alternative_slots.iter().map(|s| s.start_time).collect();
    assert_eq!(
        alternative_starts,
        vec![hhmm("10:15"), hhmm("10:30"), hhmm("10:45"), hhmm("11:00")]
    );
    for slot in &suggestion.alternative_slots {
        assert!(!existing.overlaps(slot.date, slot.start_time, slot.end_time));
    }

    // One same-day booking and a back-to-back slot
    assert_eq!(suggestion.load_balance_score, 0.9);
    assert_eq!(suggestion.efficiency_score, 1.0);
    let expected = suggestion.compatibility_score * 0.4 + 0.9 * 0.3 + 1.0 * 0.3;
    assert!((suggestion.overall_score - expected).abs() < 1e-9);
    assert_eq!(suggestion.confidence_level, ConfidenceLevel::High);

    assert_eq!(practice.store.suggestions().len(), 1);
    assert_eq!(practice.store.compatibility_rows().len(), 1);
}

#[tokio::test]
async fn preferred_time_wins_when_open() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);

    let mut request = thursday_request(client.id, session.id, Some(provider.id));
    request.requested_time = Some(hhmm("11:00"));

    let service = SuggestionService::from_state(&practice.state());
    let generated = service.generate(&request).await.unwrap();

    assert_eq!(generated.suggestions[0].suggested_time, hhmm("11:00"));
    assert_eq!(generated.suggestions[0].alternative_slots[0].start_time, hhmm("09:00"));
}

#[tokio::test]
async fn accepted_suggestion_books_matching_appointment_once() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "13:00", "17:00")]);
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);

    let service = SuggestionService::from_state(&practice.state());
    let generated = service
        .generate(&thursday_request(client.id, session.id, Some(provider.id)))
        .await
        .unwrap();
    let suggestion = generated.suggestions[0].clone();

    let accepted = service.accept(suggestion.id, "front-desk").await.unwrap();
    let appointment = &accepted.appointment;
    assert_eq!(appointment.provider_id, suggestion.suggested_provider_id);
    assert_eq!(appointment.client_id, suggestion.client_id);
    assert_eq!(appointment.appointment_date, suggestion.suggested_date);
    assert_eq!(appointment.start_time, suggestion.suggested_time);
    assert_eq!(appointment.duration_minutes, suggestion.suggested_duration);
    assert_eq!(appointment.end_time, hhmm("13:50"));
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.appointment_type_id, Some(session.id));

    assert!(accepted.suggestion.was_accepted);
    assert_eq!(accepted.suggestion.created_appointment_id, Some(appointment.id));
    assert_eq!(accepted.suggestion.accepted_by.as_deref(), Some("front-desk"));

    let err = service.accept(suggestion.id, "front-desk").await.unwrap_err();
    assert_matches!(err, SchedulingError::InvalidRequest(_));
    assert_eq!(practice.store.appointments().len(), 1);

    let err = service.accept(Uuid::new_v4(), "front-desk").await.unwrap_err();
    assert_matches!(err, SchedulingError::NotFound { entity: "Suggestion", .. });
}

#[tokio::test]
async fn booked_slot_is_not_suggested_again() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "10:00")]);
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 60);
    let service = SuggestionService::from_state(&practice.state());
    let request = thursday_request(client.id, session.id, Some(provider.id));

    let first = service.generate(&request).await.unwrap();
    service.accept(first.suggestions[0].id, "front-desk").await.unwrap();

    let second = service.generate(&request).await.unwrap();
    assert!(second.suggestions.is_empty());
}

#[tokio::test]
async fn approved_time_off_pushes_to_next_open_day() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00"), (5, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);
    practice.store.add_time_off(TimeOffRequest {
        id: Uuid::new_v4(),
        provider_id: provider.id,
        start_date: ymd(2026, 3, 5),
        end_date: ymd(2026, 3, 5),
        status: TimeOffStatus::Approved,
    });

    let mut request = thursday_request(client.id, session.id, Some(provider.id));
    request.flexibility_days = Some(1);

    let service = SuggestionService::from_state(&practice.state());
    let generated = service.generate(&request).await.unwrap();

    let suggestion = &generated.suggestions[0];
    assert_eq!(suggestion.suggested_date, ymd(2026, 3, 6));
    assert!(suggestion
        .alternative_slots
        .iter()
        .all(|s| s.date == ymd(2026, 3, 6)));
}

#[tokio::test]
async fn open_request_ranks_global_top_five() {
    let practice = practice();
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);
    let providers: Vec<_> = (0..7)
        .map(|n| practice.add_clinician("Clinician", &format!("No{}", n), &[(4, "09:00", "12:00")]))
        .collect();

    // A fully booked morning leaves one provider without an open slot
    let busy = providers[0].id;
    practice.book(busy, client.id, ymd(2026, 3, 5), "09:00", 50, AppointmentStatus::Confirmed);
    practice.book(busy, client.id, ymd(2026, 3, 5), "10:00", 50, AppointmentStatus::Confirmed);
    practice.book(busy, client.id, ymd(2026, 3, 5), "11:00", 50, AppointmentStatus::Confirmed);

    let service = SuggestionService::from_state(&practice.state());
    let generated = service
        .generate(&thursday_request(client.id, session.id, None))
        .await
        .unwrap();

    assert!(generated.failures.is_empty());
    assert_eq!(generated.suggestions.len(), 5);
    assert_eq!(generated.suggestions[0].suggestion_type, SuggestionType::OptimalSlot);
    assert!(generated.suggestions[1..]
        .iter()
        .all(|s| s.suggestion_type == SuggestionType::AlternativeProvider));
    assert!(generated
        .suggestions
        .iter()
        .all(|s| s.request_id == generated.request_id));
    assert!(generated
        .suggestions
        .windows(2)
        .all(|pair| pair[0].overall_score >= pair[1].overall_score));
    assert!(generated.suggestions.iter().all(|s| s.suggested_provider_id != busy));
    assert_eq!(practice.store.suggestions().len(), 5);
}

#[tokio::test]
async fn failing_provider_is_reported_not_fatal() {
    let practice = practice();
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);
    let healthy = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let broken = practice.add_clinician("Pat", "Jones", &[(4, "09:00", "12:00")]);
    practice.store.inject_failure(FailurePoint::AvailabilityFor(broken.id));

    let service = SuggestionService::from_state(&practice.state());
    let generated = service
        .generate(&thursday_request(client.id, session.id, None))
        .await
        .unwrap();

    assert_eq!(generated.suggestions.len(), 1);
    assert_eq!(generated.suggestions[0].suggested_provider_id, healthy.id);
    assert_eq!(generated.failures.len(), 1);
    assert_eq!(generated.failures[0].key, broken.id.to_string());
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);
    let service = SuggestionService::from_state(&practice.state());

    let err = service
        .generate(&thursday_request(client.id, Uuid::new_v4(), None))
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::NotFound { entity: "Appointment type", .. });

    let err = service
        .generate(&thursday_request(Uuid::new_v4(), session.id, None))
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::NotFound { entity: "Client", .. });

    let err = service
        .generate(&thursday_request(client.id, session.id, Some(Uuid::new_v4())))
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::NotFound { entity: "Provider", .. });

    let mut too_flexible = thursday_request(client.id, session.id, None);
    too_flexible.flexibility_days = Some(31);
    assert_matches!(
        service.generate(&too_flexible).await,
        Err(SchedulingError::InvalidRequest(_))
    );

    let mut zero_minutes = thursday_request(client.id, session.id, None);
    zero_minutes.duration_minutes = Some(0);
    assert_matches!(
        service.generate(&zero_minutes).await,
        Err(SchedulingError::InvalidRequest(_))
    );

    let mut yesterday = thursday_request(client.id, session.id, None);
    yesterday.requested_date = Some(ymd(2026, 3, 3));
    assert_matches!(
        service.generate(&yesterday).await,
        Err(SchedulingError::InvalidRequest(_))
    );

    let mut far_future = thursday_request(client.id, session.id, None);
    far_future.requested_date = Some(NaiveDate::MAX);
    far_future.flexibility_days = Some(1);
    assert_matches!(
        service.generate(&far_future).await,
        Err(SchedulingError::InvalidRequest(msg)) if msg.contains("out of range")
    );

    let mut paused = provider.clone();
    paused.available_for_scheduling = false;
    practice.store.add_provider(paused);
    assert_matches!(
        service
            .generate(&thursday_request(client.id, session.id, Some(provider.id)))
            .await,
        Err(SchedulingError::InvalidRequest(_))
    );

    assert!(practice.store.suggestions().is_empty());
}

#[tokio::test]
async fn load_adjustment_is_optional() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);
    let request = thursday_request(client.id, session.id, Some(provider.id));

    let plain = SuggestionService::from_state(&practice.state())
        .generate(&request)
        .await
        .unwrap();

    let config = SuggestionConfig {
        apply_load_adjustment: true,
        ..SuggestionConfig::default()
    };
    let adjusted = SuggestionService::with_config(&practice.state(), config)
        .generate(&request)
        .await
        .unwrap();

    // An idle provider is boosted, capped at 1.0
    let plain_score = plain.suggestions[0].overall_score;
    let adjusted_score = adjusted.suggestions[0].overall_score;
    assert!(adjusted_score > plain_score);
    assert!(adjusted_score <= 1.0);
}

#[tokio::test]
async fn history_and_stats_summarise_suggestions() {
    let practice = practice();
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);
    practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    practice.add_clinician("Pat", "Jones", &[(4, "09:00", "12:00")]);

    let service = SuggestionService::from_state(&practice.state());
    let generated = service
        .generate(&thursday_request(client.id, session.id, None))
        .await
        .unwrap();
    assert_eq!(generated.suggestions.len(), 2);
    service.accept(generated.suggestions[0].id, "front-desk").await.unwrap();

    let history = service.history(client.id, 1, 0).await.unwrap();
    assert_eq!(history.total, 2);
    assert_eq!(history.suggestions.len(), 1);
    assert_eq!(history.limit, 1);

    let empty = service.history(Uuid::new_v4(), 20, 0).await.unwrap();
    assert_eq!(empty.total, 0);

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total_suggestions, 2);
    assert_eq!(stats.accepted_suggestions, 1);
    assert_eq!(stats.acceptance_rate, 50.0);
    assert!(stats.average_overall_score > 0.0);
    assert_eq!(stats.top_providers.len(), 2);
    assert!(stats.top_providers.iter().all(|p| p.count == 1));
}
