use qf_api::{config::ApiConfig, state::ApiState, usage::UsageLogger};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env()?;

    qf_api::tracing::init_tracing(&config.env);
    let metrics_handle = qf_api::metrics::init_metrics()?;

    let pool = qf_db::create_pool(&config.database_url, config.database_max_connections).await?;
    qf_db::ensure_db_and_migrate(&config.database_url, &pool).await?;

    let (usage, usage_rx) = UsageLogger::new(config.usage_log_capacity);
    let state = ApiState::new(&config, pool, usage)?.with_metrics(metrics_handle);

    let _job_handles = qf_api::jobs::start_background_jobs(&state, usage_rx);
    tracing::info!("Background jobs started (usage log writer, idle session cleanup)");

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let app = qf_api::router::router()
        .with_state(state)
        .layer(trace_layer)
        .layer(CorsLayer::very_permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, environment = ?config.env, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
