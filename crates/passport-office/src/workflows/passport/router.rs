use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::checklist::ChecklistError;
use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, BiometricKind, DocumentDecision,
    DocumentRef, PassportNumber, RequirementKind,
};
use super::import::DecisionImporter;
use super::report::write_csv;
use super::repository::{ApplicationRepository, PassportRepository, RepositoryError};
use super::service::{ApplicationServiceError, PassportApplicationService};

type SharedService<R, P> = Arc<PassportApplicationService<R, P>>;

/// Router exposing the application lifecycle over HTTP.
pub fn application_router<R, P>(service: SharedService<R, P>) -> Router
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/passport/applications",
            post(create_handler::<R, P>).get(list_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/applications/:application_id",
            get(status_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/applications/:application_id/checklist",
            get(checklist_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/applications/:application_id/documents",
            post(document_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/applications/:application_id/decisions",
            post(decision_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/applications/:application_id/biometrics",
            post(biometric_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/applications/:application_id/rejection",
            post(rejection_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/applications/:application_id/issuance",
            post(issuance_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/applications/:application_id/dispatch",
            post(dispatch_handler::<R, P>),
        )
        .route(
            "/api/v1/passport/passports/:passport_number",
            get(passport_handler::<R, P>),
        )
        .route("/api/v1/passport/report", get(report_handler::<R, P>))
        .route("/api/v1/passport/report.csv", get(report_csv_handler::<R, P>))
        .route(
            "/api/v1/passport/decisions/import",
            post(import_handler::<R, P>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentRequest {
    requirement: String,
    #[serde(flatten)]
    document: DocumentRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    requirement: String,
    decision: DocumentDecision,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BiometricRequest {
    kind: BiometricKind,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectionRequest {
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssuanceRequest {
    issuing_authority: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DispatchRequest {
    delivery_address: String,
    #[serde(default)]
    tracking_number: Option<String>,
}

pub(crate) async fn create_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Json(submission): Json<ApplicationSubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.create(submission) {
        Ok(record) => (StatusCode::CREATED, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    let status = match query.status.as_deref().map(str::parse::<ApplicationStatus>) {
        None => None,
        Some(Ok(status)) => Some(status),
        Some(Err(err)) => {
            let payload = json!({ "error": err.to_string() });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    match service.list_applications(status) {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.status_view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn checklist_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record.checklist_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn document_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(application_id): Path<String>,
    Json(request): Json<DocumentRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    let id = ApplicationId(application_id);
    let kind = RequirementKind::new(request.requirement);
    match service.submit_document(&id, &kind, request.document) {
        Ok(record) => (StatusCode::OK, Json(record.checklist_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn decision_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(application_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    let id = ApplicationId(application_id);
    let kind = RequirementKind::new(request.requirement);
    match service.decide_document(&id, &kind, request.decision) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn biometric_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(application_id): Path<String>,
    Json(request): Json<BiometricRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.biometric_capture(&ApplicationId(application_id), request.kind) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn rejection_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(application_id): Path<String>,
    Json(request): Json<RejectionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.reject(&ApplicationId(application_id), &request.reason) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn issuance_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(application_id): Path<String>,
    Json(request): Json<IssuanceRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.issue(&ApplicationId(application_id), &request.issuing_authority) {
        Ok(passport) => (StatusCode::CREATED, Json(passport)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dispatch_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(application_id): Path<String>,
    Json(request): Json<DispatchRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.dispatch(
        &ApplicationId(application_id),
        &request.delivery_address,
        request.tracking_number,
    ) {
        Ok(passport) => (StatusCode::OK, Json(passport)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn passport_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(passport_number): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.get_passport(&PassportNumber(passport_number)) {
        Ok(passport) => (StatusCode::OK, Json(passport)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn report_handler<R, P>(State(service): State<SharedService<R, P>>) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match service.report() {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn report_csv_handler<R, P>(
    State(service): State<SharedService<R, P>>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    let records = match service.list_applications(None) {
        Ok(records) => records,
        Err(err) => return error_response(err),
    };

    let mut buffer = Vec::new();
    if let Err(err) = write_csv(&records, &mut buffer) {
        let payload = json!({ "error": err.to_string() });
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        buffer,
    )
        .into_response()
}

pub(crate) async fn import_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    body: String,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    match DecisionImporter::from_reader(Cursor::new(body.into_bytes()), service.as_ref()) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
    }
}

pub(crate) fn status_for(err: &ApplicationServiceError) -> StatusCode {
    match err {
        ApplicationServiceError::Checklist {
            source: ChecklistError::UnknownRequirement { .. },
            ..
        } => StatusCode::UNPROCESSABLE_ENTITY,
        ApplicationServiceError::Checklist {
            source: ChecklistError::InvalidTransition { .. },
            ..
        } => StatusCode::CONFLICT,
        ApplicationServiceError::Lifecycle(_)
        | ApplicationServiceError::NotEligible { .. }
        | ApplicationServiceError::Contention { .. } => StatusCode::CONFLICT,
        ApplicationServiceError::EmptyDocument { .. }
        | ApplicationServiceError::MissingAddress { .. }
        | ApplicationServiceError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ApplicationServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ApplicationServiceError::NotFound(_) | ApplicationServiceError::PassportNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ApplicationServiceError::PassportNumberCollision { .. }
        | ApplicationServiceError::NoRequiredDocuments => StatusCode::INTERNAL_SERVER_ERROR,
        ApplicationServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ApplicationServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ApplicationServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ApplicationServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: ApplicationServiceError) -> Response {
    let status = status_for(&err);
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
