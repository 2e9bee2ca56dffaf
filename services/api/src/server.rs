use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use passport_office::config::AppConfig;
use passport_office::error::AppError;
use passport_office::telemetry;
use passport_office::workflows::passport::{
    InMemoryApplicationRepository, InMemoryPassportRepository, PassportApplicationService,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let required_documents = config.lifecycle.checklist_kinds().len();
    let application_service = Arc::new(PassportApplicationService::new(
        Arc::new(InMemoryApplicationRepository::new()),
        Arc::new(InMemoryPassportRepository::new()),
        config.lifecycle.clone(),
    ));

    let app = with_application_routes(application_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        required_documents,
        "passport office ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
