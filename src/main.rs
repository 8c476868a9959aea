use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use potato_disease_service::{
    build_router,
    classifier::Classifier,
    config::Config,
    model::{ModelHandle, ModelSource},
    solution::{RemoteSolutions, SolutionProvider, StaticSolutions},
    utils::ensure_model_exists,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("potato_disease_service=debug,tower_http=info")),
        )
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Starting potato disease service...");
    let config = Config::from_env()?;

    if let Err(e) = ensure_model_exists(
        &config.model_paths,
        config.model_url.as_deref(),
        config.model_download_token.as_deref(),
    )
    .await
    {
        tracing::error!("Could not fetch model artifact: {:#}", e);
    }

    let model = ModelHandle::new(model_source(&config)?);
    if config.eager_load {
        // The first classify request retries a failed load.
        if let Err(e) = model.get().await {
            tracing::warn!("Model not loaded at startup: {}", e);
        }
    }

    let solutions: Arc<dyn SolutionProvider> = match config.remote_solutions.clone() {
        Some(remote) => Arc::new(RemoteSolutions::new(remote)),
        None => {
            tracing::info!("OpenAI API key not found, using fallback solutions");
            Arc::new(StaticSolutions)
        }
    };
    tracing::info!("Solution provider: {}", solutions.name());

    let state = Arc::new(AppState {
        classifier: Classifier::new(model, config.preprocess),
        solutions,
        upload_dir: config.upload_dir.clone(),
        body_limit_bytes: config.body_limit_bytes,
    });
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "tensorflow")]
fn model_source(config: &Config) -> anyhow::Result<Arc<dyn ModelSource>> {
    use potato_disease_service::model::FrozenGraphSource;

    Ok(Arc::new(FrozenGraphSource {
        candidates: config.model_paths.clone(),
        input_op: config.model_input_op.clone(),
        output_op: config.model_output_op.clone(),
    }))
}

#[cfg(not(feature = "tensorflow"))]
fn model_source(_config: &Config) -> anyhow::Result<Arc<dyn ModelSource>> {
    anyhow::bail!("built without the `tensorflow` feature; no model backend available")
}
