use assert_matches::assert_matches;

use nlp_cell::models::{ExecutionOutcome, TimeOfDay};
use nlp_cell::NlpSchedulingService;
use shared_database::FailurePoint;
use shared_models::error::SchedulingError;
use shared_models::scheduling::{AppointmentStatus, Intent};
use shared_utils::test_utils::{hhmm, ymd, TestPractice};

// 2026-03-04 is a Wednesday; "tomorrow" is Thursday (day 4)
fn practice() -> TestPractice {
    TestPractice::on(ymd(2026, 3, 4))
}

#[tokio::test]
async fn doctor_request_resolves_provider_date_and_time() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "17:00")]);
    practice.add_clinician("Ana", "Ortiz", &[(4, "09:00", "17:00")]);

    let service = NlpSchedulingService::from_state(&practice.state());
    let parsed = service
        .parse("Schedule an appointment with Dr. Smith tomorrow at 2pm", "front-desk")
        .await
        .unwrap();

    assert!(parsed.success);
    assert_eq!(parsed.intent, Some(Intent::Schedule));
    assert_eq!(parsed.entities.date, Some(ymd(2026, 3, 5)));
    assert_eq!(parsed.entities.time, Some(hhmm("14:00")));
    assert_eq!(parsed.entities.provider_id, Some(provider.id));
    assert_eq!(parsed.entities.provider_name.as_deref(), Some("Sam Smith"));
    assert!(parsed.confidence >= 0.5);
    assert!((parsed.confidence - 0.90).abs() < 1e-9);
    assert_eq!(parsed.clarification_needed, None);
    assert_eq!(parsed.reasoning[0], "Detected intent: SCHEDULE");
    assert!(parsed.reasoning.contains(&"Parsed time: 14:00".to_string()));

    let logs = practice.store.parse_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].user_id, "front-desk");
    assert_eq!(logs[0].parsed_intent, Some(Intent::Schedule));
    assert!(logs[0].parsing_success);
    assert_eq!(logs[0].parsed_entities["time"], "14:00");
}

#[tokio::test]
async fn unrecognised_text_asks_for_clarification() {
    let practice = practice();
    let service = NlpSchedulingService::from_state(&practice.state());

    let parsed = service.parse("hello", "front-desk").await.unwrap();
    assert!(!parsed.success);
    assert_eq!(parsed.intent, None);
    assert_eq!(parsed.confidence, 0.0);
    assert!(!parsed.clarification_needed.unwrap().is_empty());

    let logs = practice.store.parse_logs();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].parsing_success);
    assert!(logs[0].clarification_needed.is_some());
}

#[tokio::test]
async fn missing_time_is_named_in_the_clarification() {
    let practice = practice();
    let client = practice.add_client("Jo", "Lee");
    let service = NlpSchedulingService::from_state(&practice.state());

    let parsed = service.parse("Book a session for Jo tomorrow", "front-desk").await.unwrap();
    assert_eq!(parsed.intent, Some(Intent::Schedule));
    assert_eq!(parsed.entities.client_id, Some(client.id));
    assert!((parsed.confidence - 0.70).abs() < 1e-9);
    assert!(!parsed.success);
    assert_eq!(
        parsed.clarification_needed.as_deref(),
        Some("Please specify the time for the appointment.")
    );
}

#[tokio::test]
async fn parse_log_failure_does_not_fail_the_parse() {
    let practice = practice();
    practice.store.inject_failure(FailurePoint::ParseLogInsert);
    let service = NlpSchedulingService::from_state(&practice.state());

    let parsed = service.parse("cancel my appointment today", "front-desk").await.unwrap();
    assert_eq!(parsed.intent, Some(Intent::Cancel));
    assert!(practice.store.parse_logs().is_empty());
}

#[tokio::test]
async fn blank_or_oversized_text_is_rejected() {
    let practice = practice();
    let service = NlpSchedulingService::from_state(&practice.state());

    assert_matches!(
        service.parse("   ", "front-desk").await,
        Err(SchedulingError::InvalidRequest(_))
    );
    let long = "book ".repeat(101);
    assert_matches!(
        service.parse(&long, "front-desk").await,
        Err(SchedulingError::InvalidRequest(msg)) if msg.contains("500 characters")
    );
    assert!(practice.store.parse_logs().is_empty());
}

#[tokio::test]
async fn schedule_intent_books_the_top_suggestion_without_confirmation() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    practice.add_type("Consultation", 30);
    let intake = practice.add_type("Intake", 60);

    let service = NlpSchedulingService::from_state(&practice.state());
    let parsed = service
        .parse("Schedule an intake appointment with Dr. Smith for Jo tomorrow at 10am", "front-desk")
        .await
        .unwrap();
    assert!(parsed.success);
    assert_eq!(parsed.entities.appointment_type.as_deref(), Some("Intake"));

    let outcome = service.execute(&parsed, "front-desk").await.unwrap();
    let (appointment, suggestion) = assert_matches!(
        outcome,
        ExecutionOutcome::Booked { appointment, suggestion, .. } => (appointment, suggestion)
    );
    assert_eq!(appointment.provider_id, provider.id);
    assert_eq!(appointment.client_id, client.id);
    assert_eq!(appointment.appointment_date, ymd(2026, 3, 5));
    assert_eq!(appointment.start_time, hhmm("10:00"));
    assert_eq!(appointment.end_time, hhmm("11:00"));
    assert_eq!(appointment.appointment_type_id, Some(intake.id));
    assert_eq!(appointment.created_by.as_deref(), Some("front-desk"));
    assert!(suggestion.was_accepted);
    assert_eq!(suggestion.created_appointment_id, Some(appointment.id));

    assert_eq!(practice.store.appointments().len(), 1);
}

#[tokio::test]
async fn schedule_with_no_open_slot_books_nothing() {
    let practice = practice();
    // Mondays only
    practice.add_clinician("Sam", "Smith", &[(1, "09:00", "12:00")]);
    practice.add_client("Jo", "Lee");
    practice.add_type("Intake", 60);

    let service = NlpSchedulingService::from_state(&practice.state());
    let parsed = service
        .parse("Book an appointment with Dr. Smith for Jo tomorrow at 10am within 0 days", "front-desk")
        .await
        .unwrap();
    assert_eq!(parsed.entities.flexibility_days, Some(0));

    let outcome = service.execute(&parsed, "front-desk").await.unwrap();
    assert_matches!(outcome, ExecutionOutcome::NoSlots { .. });
    assert!(practice.store.appointments().is_empty());
}

#[tokio::test]
async fn find_slot_suggests_without_booking() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "08:00", "12:00")]);
    practice.add_client("Jo", "Lee");
    practice.add_type("Session", 50);

    let service = NlpSchedulingService::from_state(&practice.state());
    let parsed = service
        .parse("Find an open slot with Dr. Smith for Jo tomorrow morning", "front-desk")
        .await
        .unwrap();
    assert_eq!(parsed.intent, Some(Intent::FindSlot));
    assert_eq!(parsed.entities.time_of_day, Some(TimeOfDay::Morning));
    assert!(parsed.success);

    let outcome = service.execute(&parsed, "front-desk").await.unwrap();
    let generated = assert_matches!(outcome, ExecutionOutcome::SlotsFound { suggestions } => suggestions);
    // Morning maps to a 09:00 preference
    assert_eq!(generated.suggestions[0].suggested_provider_id, provider.id);
    assert_eq!(generated.suggestions[0].suggested_time, hhmm("09:00"));
    assert!(!generated.suggestions[0].was_accepted);
    assert!(practice.store.appointments().is_empty());
}

#[tokio::test]
async fn check_availability_lists_live_appointments() {
    let practice = practice();
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    let booked = practice.book(provider.id, client.id, ymd(2026, 3, 5), "09:00", 50, AppointmentStatus::Scheduled);
    practice.book(provider.id, client.id, ymd(2026, 3, 5), "11:00", 50, AppointmentStatus::Cancelled);

    let service = NlpSchedulingService::from_state(&practice.state());

    let parsed = service.parse("Is Dr. Smith available on 03/05/2026?", "front-desk").await.unwrap();
    assert_eq!(parsed.intent, Some(Intent::CheckAvailability));
    assert!(parsed.success);
    let outcome = service.execute(&parsed, "front-desk").await.unwrap();
    assert_matches!(
        outcome,
        ExecutionOutcome::Availability { available: false, ref appointments, .. }
            if appointments.len() == 1 && appointments[0].id == booked.id
    );

    let parsed = service.parse("Is Dr. Smith free on 03/06/2026?", "front-desk").await.unwrap();
    let outcome = service.execute(&parsed, "front-desk").await.unwrap();
    assert_matches!(outcome, ExecutionOutcome::Availability { available: true, .. });
}

#[tokio::test]
async fn reschedule_and_cancel_are_not_supported() {
    let practice = practice();
    let service = NlpSchedulingService::from_state(&practice.state());

    for text in ["Cancel my appointment tomorrow", "Reschedule my appointment to friday"] {
        let parsed = service.parse(text, "front-desk").await.unwrap();
        assert!(parsed.success, "{}", text);
        assert_matches!(
            service.execute(&parsed, "front-desk").await,
            Err(SchedulingError::Unsupported(msg)) if msg.contains("not yet implemented")
        );
    }
}

#[tokio::test]
async fn execute_refuses_incomplete_requests() {
    let practice = practice();
    practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    practice.add_type("Intake", 60);
    let service = NlpSchedulingService::from_state(&practice.state());

    let unclear = service.parse("hello", "front-desk").await.unwrap();
    assert_matches!(
        service.execute(&unclear, "front-desk").await,
        Err(SchedulingError::InvalidRequest(msg)) if msg.starts_with("I could not determine")
    );

    let no_client = service
        .parse("Schedule an appointment with Dr. Smith tomorrow at 2pm", "front-desk")
        .await
        .unwrap();
    assert!(no_client.success);
    assert_matches!(
        service.execute(&no_client, "front-desk").await,
        Err(SchedulingError::InvalidRequest(msg)) if msg.contains("client")
    );
    assert!(practice.store.appointments().is_empty());
}
