use live_agent::config::{CONFIG, Config};
use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg: &Config = &CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        openai_model = %cfg.openai_model,
        livekit_url = %cfg.livekit_url,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.loglevel,
        auth = !cfg.service_key.is_empty(),
        "configuration loaded"
    );
    if cfg.openai_api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; chat and ingestion will fail upstream");
    }
    if cfg.simli_api_key.is_empty() || cfg.simli_face_id.is_empty() {
        warn!("SIMLI_API_KEY / SIMLI_FACE_ID not set; dispatched avatar agents cannot render");
    }

    let state = live_agent::LiveAgentState::from_config(Arc::new(Config::clone(cfg))).await?;
    let app = live_agent::live_agent_router(state);

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
