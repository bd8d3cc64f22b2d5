use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use enrollments::config::AppConfig;
use enrollments::error::AppError;
use enrollments::remote::http_facade;
use enrollments::telemetry;
use enrollments::workflows::enrollment::{
    EnrollmentService, MemoryEnrollmentRepository, MemoryRequirementRepository,
};
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let remote = http_facade(&config.remote)?;
    let service = Arc::new(EnrollmentService::new(
        Arc::new(MemoryEnrollmentRepository::default()),
        Arc::new(MemoryRequirementRepository::default()),
        remote,
    ));

    let app = with_enrollment_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        courses = %config.remote.courses_uri,
        history = %config.remote.history_uri,
        calendar = %config.remote.calendar_uri,
        timeout_ms = config.remote.timeout_ms,
        "enrollment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
