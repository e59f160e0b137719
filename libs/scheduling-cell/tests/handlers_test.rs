use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use scheduling_cell::router::suggestion_routes;
use shared_utils::test_utils::{ymd, TestPractice};

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn generate_fetch_and_accept_over_http() {
    let practice = TestPractice::on(ymd(2026, 3, 4));
    let provider = practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);

    let request = json!({
        "client_id": client.id,
        "provider_id": provider.id,
        "appointment_type_id": session.id,
        "requested_date": "2026-03-05",
        "requested_time": "10:00",
        "flexibility_days": 0
    });
    let (status, body) = send(suggestion_routes(practice.state()), "POST", "/", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suggestions"][0]["suggested_time"], "10:00");
    assert_eq!(body["suggestions"][0]["suggestion_type"], "OPTIMAL_SLOT");

    let id = body["suggestions"][0]["id"].as_str().unwrap().to_string();
    let (status, body) = send(suggestion_routes(practice.state()), "GET", &format!("/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider_name"], "Sam Smith");
    assert_eq!(body["was_accepted"], false);

    let accept = json!({ "accepted_by": "front-desk" });
    let uri = format!("/{}/accept", id);
    let (status, body) = send(suggestion_routes(practice.state()), "POST", &uri, Some(accept.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["start_time"], "10:00");
    assert_eq!(body["appointment"]["end_time"], "10:50");
    assert_eq!(body["suggestion"]["was_accepted"], true);

    let (status, body) = send(suggestion_routes(practice.state()), "POST", &uri, Some(accept)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already been accepted"));
}

#[tokio::test]
async fn missing_records_map_to_404() {
    let practice = TestPractice::on(ymd(2026, 3, 4));
    let client = practice.add_client("Jo", "Lee");

    let request = json!({
        "client_id": client.id,
        "appointment_type_id": Uuid::new_v4()
    });
    let (status, _) = send(suggestion_routes(practice.state()), "POST", "/", Some(request)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(suggestion_routes(practice.state()), "GET", &format!("/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_and_stats_endpoints() {
    let practice = TestPractice::on(ymd(2026, 3, 4));
    practice.add_clinician("Sam", "Smith", &[(4, "09:00", "12:00")]);
    let client = practice.add_client("Jo", "Lee");
    let session = practice.add_type("Session", 50);

    let request = json!({
        "client_id": client.id,
        "appointment_type_id": session.id,
        "requested_date": "2026-03-05",
        "flexibility_days": 0
    });
    let (status, _) = send(suggestion_routes(practice.state()), "POST", "/", Some(request)).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/clients/{}/history?limit=10", client.id);
    let (status, body) = send(suggestion_routes(practice.state()), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["offset"], 0);

    let (status, body) = send(suggestion_routes(practice.state()), "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_suggestions"], 1);
    assert_eq!(body["accepted_suggestions"], 0);
    assert_eq!(body["top_providers"][0]["provider_name"], "Sam Smith");
}
