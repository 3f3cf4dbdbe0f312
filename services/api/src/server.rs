use crate::cli::ServeArgs;
use crate::infra::{AppState, LoggingNotifier};
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use campus_core::config::AppConfig;
use campus_core::error::AppError;
use campus_core::telemetry;
use campus_core::workflows::enrollment::{EnrollmentService, InMemoryLedger, UserId};
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

    let service = EnrollmentService::new(
        Arc::new(InMemoryLedger::new()),
        Arc::new(LoggingNotifier),
        config.lifecycle,
    );
    let admin = service.bootstrap_admin(UserId::new(config.admin.id.clone()), &config.admin.email)?;
    info!(admin_id = %admin.id, "administrator account ready");

    let app = with_enrollment_routes(Arc::new(service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_course_applications_per_institution = config.lifecycle.max_course_applications_per_institution,
        job_capacity = ?config.lifecycle.job_capacity,
        reviewer_approval = ?config.lifecycle.reviewer_approval,
        "campus service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
