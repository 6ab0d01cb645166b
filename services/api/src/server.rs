use crate::cli::ServeArgs;
use crate::infra::{load_engine, AppState, InMemorySessionRepository};
use crate::routes::with_award_routes;
use award_assist::config::AppConfig;
use award_assist::error::AppError;
use award_assist::telemetry;
use award_assist::workflows::award::{
    AcknowledgingResponder, AwardWorkflowService, FileSessionRepository, PlainTextExtractor,
    ScoringEngine, SessionRepository,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(directory) = args.session_dir.take() {
        config.sessions.directory = Some(directory);
    }

    telemetry::init(&config.telemetry)?;
    let engine = load_engine(&config.scoring)?;

    match config.sessions.directory.clone() {
        Some(directory) => {
            let repository = FileSessionRepository::open(directory)?;
            info!(directory = %repository.root().display(), "sessions persisted to disk");
            serve(config, Arc::new(repository), engine).await
        }
        None => {
            info!("sessions held in memory");
            serve(config, Arc::new(InMemorySessionRepository::default()), engine).await
        }
    }
}

async fn serve<R>(config: AppConfig, repository: Arc<R>, engine: ScoringEngine) -> Result<(), AppError>
where
    R: SessionRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(AwardWorkflowService::new(
        repository,
        Arc::new(AcknowledgingResponder),
        Arc::new(PlainTextExtractor),
        engine,
    ));
    spawn_session_purge(service.clone(), config.sessions.max_age());

    let app = with_award_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "award assist ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_session_purge<R>(
    service: Arc<AwardWorkflowService<R, AcknowledgingResponder>>,
    max_age: chrono::Duration,
) where
    R: SessionRepository + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let sweep = service.clone();
            match tokio::task::spawn_blocking(move || sweep.purge_expired(max_age)).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "session purge failed"),
                Err(err) => warn!(error = %err, "session purge task failed"),
            }
        }
    });
}
