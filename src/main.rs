//! Service entry point.
//!
//! Loads configuration from the environment, initializes the embedding model
//! once at startup, wires the pipeline, and serves the HTTP surface. A
//! background task snapshots the verdict store on an interval.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use claimspotter::admission::{AdmissionController, InMemoryCounterStore};
use claimspotter::aggregate::VerdictAggregator;
use claimspotter::auth::ApiKeyAuthorizer;
use claimspotter::config::Config;
use claimspotter::embedder::{DisabledEmbedder, FastembedEmbedder, TextEmbedder};
use claimspotter::fetch::PageFetcher;
use claimspotter::interceptor::{AdmissionInterceptor, InterceptorChain, TimingInterceptor};
use claimspotter::pipeline::Pipeline;
use claimspotter::server::{run_server, AppState};
use claimspotter::sources::{
    EvidenceSource, FactCheckDbSource, ModelVerifierSource, OllamaProvider, WebSearchSource,
};
use claimspotter::store::VerdictStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    config.weights.validate()?;

    // The model either loads once here or the service runs degraded for its
    // whole lifetime. No retry path.
    let embedder: Arc<dyn TextEmbedder> =
        match tokio::task::spawn_blocking(FastembedEmbedder::init).await? {
            Ok(embedder) => Arc::new(embedder),
            Err(e) => {
                warn!(error = %e, "embedding model failed to load; similarity cache disabled");
                Arc::new(DisabledEmbedder::new(e.to_string()))
            }
        };

    let store = Arc::new(match &config.store_path {
        Some(path) => VerdictStore::open(path, config.similarity_threshold)?,
        None => VerdictStore::new(config.similarity_threshold),
    });
    info!(cached = store.len().await, "verdict store ready");

    let provider = Arc::new(OllamaProvider::new(
        config.ollama_host.clone(),
        config.ollama_port,
    ));
    let sources: Vec<Arc<dyn EvidenceSource>> = vec![
        Arc::new(FactCheckDbSource::new(config.factcheck_api_key.clone())),
        Arc::new(ModelVerifierSource::new(
            provider,
            config.verifier_model.clone(),
        )),
        Arc::new(WebSearchSource::new(config.serper_api_key.clone())),
    ];

    let admission = AdmissionController::new(
        Box::new(InMemoryCounterStore::new()),
        config.max_requests,
        config.window,
        config.admission_policy,
    );
    let interceptors = InterceptorChain::new()
        .with(Arc::new(AdmissionInterceptor::new(admission)))
        .with(Arc::new(TimingInterceptor));

    let pipeline = Arc::new(Pipeline::new(
        embedder,
        Arc::clone(&store),
        sources,
        VerdictAggregator::new(config.weights),
        interceptors,
        config.source_timeout,
    ));

    if config.store_path.is_some() {
        let store = Arc::clone(&store);
        let interval = config.persist_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                if let Err(e) = store.persist().await {
                    error!(error = %e, "verdict store snapshot failed");
                }
            }
        });
    }

    let state = AppState {
        pipeline,
        fetcher: Arc::new(PageFetcher::new()?),
        authorizer: Arc::new(ApiKeyAuthorizer::new(&config.api_keys)),
    };
    run_server(state, &config.bind_addr).await?;

    // Final snapshot after graceful shutdown.
    if config.store_path.is_some() {
        store.persist().await?;
        info!("verdict store persisted");
    }
    Ok(())
}
