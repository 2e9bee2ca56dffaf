use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use passport_office::workflows::passport::{
    application_router, ApplicationRepository, PassportApplicationService, PassportRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_application_routes<R, P>(
    service: Arc<PassportApplicationService<R, P>>,
) -> axum::Router
where
    R: ApplicationRepository + 'static,
    P: PassportRepository + 'static,
{
    application_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use passport_office::workflows::passport::{
        InMemoryApplicationRepository, InMemoryPassportRepository, LifecycleConfig,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let service = Arc::new(PassportApplicationService::new(
            Arc::new(InMemoryApplicationRepository::new()),
            Arc::new(InMemoryPassportRepository::new()),
            LifecycleConfig::default(),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        state.readiness.store(ready, Ordering::Release);
        with_application_routes(service).layer(Extension(state))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let starting = app(false)
            .oneshot(get("/ready"))
            .await
            .expect("response");
        assert_eq!(starting.status(), StatusCode::SERVICE_UNAVAILABLE);

        let ready = app(true).oneshot(get("/ready")).await.expect("response");
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn service_routes_are_mounted_alongside_health() {
        let router = app(true);

        let health = router
            .clone()
            .oneshot(get("/health"))
            .await
            .expect("response");
        assert_eq!(health.status(), StatusCode::OK);

        let listing = router
            .clone()
            .oneshot(get("/api/v1/passport/applications"))
            .await
            .expect("response");
        assert_eq!(listing.status(), StatusCode::OK);

        let metrics = router.oneshot(get("/metrics")).await.expect("response");
        assert_eq!(
            metrics.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }
}
