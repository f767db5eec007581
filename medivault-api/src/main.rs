use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use medivault_api::{app, AppState, Metrics};
use medivault_core::{InteractionLookup, PrescriptionStore};
use medivault_interactions::{
    CircuitBreaker, GuardedLookup, KnowledgeBaseLookup, KnowledgeBaseSettings, Url,
};
use medivault_store::app_config::{Config, InteractionsConfig, StorageBackend};
use medivault_store::{DbClient, MemoryPrescriptionStore, PgPrescriptionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn PrescriptionStore>> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Ok(Arc::new(PgPrescriptionStore::new(db.pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory prescription store; data will not survive a restart");
            Ok(Arc::new(MemoryPrescriptionStore::new()))
        }
    }
}

fn build_lookup(config: &InteractionsConfig) -> anyhow::Result<Arc<dyn InteractionLookup>> {
    let endpoint = config
        .endpoint
        .as_deref()
        .map(Url::parse)
        .transpose()
        .context("Invalid interactions.endpoint")?;

    let knowledge_base = KnowledgeBaseLookup::new(KnowledgeBaseSettings {
        endpoint,
        knowledge_base_id: config.knowledge_base_id.clone(),
        api_key: config.api_key.clone(),
        timeout: Duration::from_millis(config.timeout_ms),
        max_results: config.max_results,
    })
    .context("Failed to build knowledge-base client")?;

    if !knowledge_base.is_configured() {
        tracing::warn!("Knowledge base not configured; interaction checks will report unknown");
    }

    let breaker = Arc::new(CircuitBreaker::new(
        "knowledge-base",
        config.breaker_failure_threshold,
        Duration::from_secs(config.breaker_reset_secs),
    ));
    Ok(Arc::new(GuardedLookup::new(knowledge_base, breaker)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medivault_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting MediVault API on port {}", config.server.port);

    let store = build_store(&config).await?;
    let lookup = build_lookup(&config.interactions)?;
    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

    let app_state = AppState::new(
        store,
        lookup,
        config.interactions.max_concurrent_lookups,
        metrics,
        config.cors.clone(),
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
