use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use provider_cell::router::{compatibility_routes, load_routes};
use shared_models::scheduling::AppointmentStatus;
use shared_utils::test_utils::{ymd, TestPractice};

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn provider_load_endpoint_returns_metrics() {
    let practice = TestPractice::on(ymd(2026, 3, 4));
    let client = practice.add_client("Jo", "Lee");
    let provider = practice.add_clinician("Sam", "Smith", &[(1, "09:00", "17:00")]);
    practice.book(provider.id, client.id, ymd(2026, 3, 2), "09:00", 240, AppointmentStatus::Scheduled);

    let app = load_routes(practice.state());
    let (status, body) = get(app, &format!("/providers/{}", provider.id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider_name"], "Sam Smith");
    assert_eq!(body["current_week"]["utilization_rate"], 50.0);
    assert_eq!(body["status"], "UNDERUTILIZED");
}

#[tokio::test]
async fn unknown_provider_maps_to_404_and_neutral_adjustment() {
    let practice = TestPractice::on(ymd(2026, 3, 4));
    let unknown = Uuid::new_v4();

    let (status, body) = get(load_routes(practice.state()), &format!("/providers/{}", unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Provider not found"));

    let (status, body) = get(load_routes(practice.state()), &format!("/providers/{}/adjustment", unknown)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["multiplier"], 1.0);
}

#[tokio::test]
async fn compatibility_endpoints_score_then_serve_cache() {
    let practice = TestPractice::on(ymd(2026, 3, 4));
    let client = practice.add_client("Jo", "Lee");
    let provider = practice.add_clinician("Sam", "Smith", &[(1, "09:00", "17:00")]);
    let cached_uri = format!("/{}/{}/cached", provider.id, client.id);

    let (status, _) = get(compatibility_routes(practice.state()), &cached_uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(
        compatibility_routes(practice.state()),
        &format!("/{}/{}", provider.id, client.id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let overall = body["overall_score"].as_f64().unwrap();
    assert!(overall > 0.0 && overall <= 1.0);

    let (status, body) = get(compatibility_routes(practice.state()), &cached_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overall_score"].as_f64().unwrap(), overall);

    let (status, body) = get(
        compatibility_routes(practice.state()),
        &format!("/top/{}?limit=3", client.id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providers"].as_array().unwrap().len(), 1);
}
