use crate::cli::ServeArgs;
use crate::infra::{build_compliance_stack, AppState};
use crate::routes::with_compliance_routes;
use crate::scheduler::spawn_recompute_schedule;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use product_compliance::config::AppConfig;
use product_compliance::error::AppError;
use product_compliance::telemetry;
use product_compliance::workflows::compliance::PeriodicReevaluator;
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
    if let Some(secs) = args.recompute_interval_secs.take() {
        config.schedule.recompute_interval_secs = secs;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let stack = build_compliance_stack(&config.notifications);
    let schedule = spawn_recompute_schedule(
        PeriodicReevaluator::new(Arc::clone(&stack.service)),
        config.schedule.interval(),
    );

    let app = with_compliance_routes(stack.service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        recompute_interval_secs = config.schedule.recompute_interval_secs,
        "product compliance service ready"
    );

    let served = axum::serve(listener, app).await;
    schedule.abort();
    served?;
    Ok(())
}
