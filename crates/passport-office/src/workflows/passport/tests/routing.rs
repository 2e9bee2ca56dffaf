use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::passport::config::LifecycleConfig;
use crate::workflows::passport::memory::InMemoryPassportRepository;
use crate::workflows::passport::router::create_handler;
use crate::workflows::passport::PassportApplicationService;

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn create_handler_returns_service_unavailable_on_outage() {
    let service = Arc::new(PassportApplicationService::new(
        Arc::new(UnavailableRepository),
        Arc::new(InMemoryPassportRepository::new()),
        LifecycleConfig::default(),
    ));

    let response = create_handler::<UnavailableRepository, InMemoryPassportRepository>(
        State(service),
        axum::Json(submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn create_route_returns_status_view() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/passport/applications",
            serde_json::to_value(submission()).expect("serializable"),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "submitted");
    assert_eq!(body["applicant_name"], "Anika Rao");
    assert_eq!(
        body["outstanding_requirements"]
            .as_array()
            .expect("array")
            .len(),
        4
    );
}

#[tokio::test]
async fn document_route_maps_errors() {
    let (service, _, _) = build_service();
    let record = service.create(submission()).expect("created");
    let router = router_with_service(service);
    let uri = format!("/api/v1/passport/applications/{}/documents", record.id);

    let unknown = router
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            json!({ "requirement": "Visa Stamp", "reference": "uploads/visa.png", "size_bytes": 10 }),
        ))
        .await
        .expect("response");
    assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let oversized = router
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            json!({
                "requirement": "ID Proof",
                "reference": "uploads/id.pdf",
                "size_bytes": 6 * 1024 * 1024
            }),
        ))
        .await
        .expect("response");
    assert_eq!(oversized.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let accepted = router
        .oneshot(json_request(
            "POST",
            &uri,
            json!({ "requirement": "ID Proof", "reference": "uploads/id.pdf", "size_bytes": 2048 }),
        ))
        .await
        .expect("response");
    assert_eq!(accepted.status(), StatusCode::OK);
    let body = read_json_body(accepted).await;
    let entry = body["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .find(|entry| entry["requirement"] == "ID Proof")
        .cloned()
        .expect("id proof entry");
    assert_eq!(entry["outcome"], "submitted");
    assert_eq!(entry["document_reference"], "uploads/id.pdf");
}

#[tokio::test]
async fn issuance_before_verification_conflicts() {
    let (service, _, _) = build_service();
    let record = service.create(submission()).expect("created");
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/passport/applications/{}/issuance", record.id),
            json!({ "issuing_authority": "Central Authority" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("message")
        .contains("only verified applications can be issued"));
}

#[tokio::test]
async fn issuance_and_lookup_round_trip() {
    let (service, _, _) = build_service();
    let id = verified_application(&service);
    let router = router_with_service(service);

    let issued = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/passport/applications/{id}/issuance"),
            json!({ "issuing_authority": "Central Authority" }),
        ))
        .await
        .expect("response");
    assert_eq!(issued.status(), StatusCode::CREATED);
    let passport = read_json_body(issued).await;
    let number = passport["passport_number"].as_str().expect("number");

    let fetched = router
        .clone()
        .oneshot(get_request(&format!("/api/v1/passport/passports/{number}")))
        .await
        .expect("response");
    assert_eq!(fetched.status(), StatusCode::OK);
    let body = read_json_body(fetched).await;
    assert_eq!(body["dispatch_status"], "pending");
    assert_eq!(body["expiry_date"], "2035-04-15");

    let missing_address = router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/passport/applications/{id}/dispatch"),
            json!({ "delivery_address": "" }),
        ))
        .await
        .expect("response");
    assert_eq!(missing_address.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn list_rejects_unknown_status() {
    let (service, _, _) = build_service();
    service.create(submission()).expect("created");
    let router = router_with_service(service);

    let bad = router
        .clone()
        .oneshot(get_request("/api/v1/passport/applications?status=approved"))
        .await
        .expect("response");
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let good = router
        .oneshot(get_request(
            "/api/v1/passport/applications?status=Under%20Verification",
        ))
        .await
        .expect("response");
    assert_eq!(good.status(), StatusCode::OK);
    let body = read_json_body(good).await;
    assert_eq!(body.as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn unknown_application_is_not_found() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(get_request("/api/v1/passport/applications/nope/checklist"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn decision_import_applies_rows() {
    let (service, _, _) = build_service();
    let record = service.create(submission()).expect("created");
    submit_all(&service, &record.id);
    let router = router_with_service(service);

    let sheet = format!(
        "Application ID,Requirement,Outcome\n{id},ID Proof,verified\n{id},Visa Stamp,verified\n",
        id = record.id
    );
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/passport/decisions/import")
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from(sheet))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let summary = read_json_body(response).await;
    assert_eq!(summary["applied"], 1);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["rows"][0]["result"], "applied");
    assert_eq!(summary["rows"][0]["status"], "under_verification");

    let malformed = router
        .oneshot(
            Request::post("/api/v1/passport/decisions/import")
                .body(Body::from("Application ID,Requirement,Outcome\nx,ID Proof,perhaps\n"))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_csv_is_served_as_text() {
    let (service, _, _) = build_service();
    service.create(submission()).expect("created");
    let router = router_with_service(service);

    let response = router
        .oneshot(get_request("/api/v1/passport/report.csv"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body");
    let text = String::from_utf8(body.to_vec()).expect("utf8");
    assert_eq!(text.lines().count(), 2);
}
