mod activity_log;
mod classifier;
mod config;
mod crm;
mod errors;
mod llm_client;
mod orchestrator;
mod routes;
mod state;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::activity_log::ActivityLog;
use crate::classifier::{Classifier, ConfidencePolicy};
use crate::config::Config;
use crate::crm::{CrmApi, HubSpotClient, PersonaCache};
use crate::llm_client::LlmClient;
use crate::orchestrator::{scheduler, Orchestrator, RunRegistry, RunTrigger};
use crate::routes::build_router;
use crate::state::AppState;

/// Number of finished runs kept for `/api/runs`.
const RUN_HISTORY: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing API keys)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Persona API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize CRM client
    let crm: Arc<dyn CrmApi> = Arc::new(HubSpotClient::new(
        config.hubspot_base_url.clone(),
        config.hubspot_api_key.clone(),
    )?);
    info!("HubSpot client initialized ({})", config.hubspot_base_url);

    // Initialize LLM client
    let llm = LlmClient::new(config.openai_base_url.clone(), config.openai_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let confidence = config
        .fixed_confidence
        .map_or_else(ConfidencePolicy::default, ConfidencePolicy::Fixed);

    let log = ActivityLog::new(config.log_capacity);
    let personas = PersonaCache::default();
    let orchestrator = Orchestrator::new(
        crm.clone(),
        Classifier::new(Arc::new(llm), confidence),
        personas.clone(),
        log.clone(),
        RunRegistry::new(RUN_HISTORY),
        config.batch_limit,
    );

    // Initial pass, then the fixed-interval timer
    if let Ok(run_id) = orchestrator.spawn_run(RunTrigger::Startup) {
        info!("Startup run {run_id} started");
    }
    tokio::spawn(scheduler::run_schedule(
        orchestrator.clone(),
        config.run_interval,
    ));

    // Build app state
    let state = AppState {
        crm,
        orchestrator,
        personas,
        log,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
