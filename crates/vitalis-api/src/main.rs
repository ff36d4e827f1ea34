use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vitalis_api::{build_router, config::Config, state::AppState};
use vitalis_llm::GatewayClient;
use vitalis_persist::{BackendConfig, RestIdentityResolver, RestStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Vitalis API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    tracing::info!("Initializing gateway client at {}", config.llm.base_url);
    let llm_client: Arc<dyn vitalis_llm::ChatClient> = Arc::new(
        GatewayClient::new(config.gateway_api_key.clone())?.with_base_url(config.llm.base_url.clone()),
    );

    let backend = BackendConfig::new(config.backend_url.clone(), config.backend_service_key.clone())
        .timeout(Duration::from_millis(config.backend.timeout_ms));
    let store: Arc<dyn vitalis_persist::WellnessStore> = Arc::new(RestStore::new(&backend)?);
    let identity: Arc<dyn vitalis_persist::IdentityResolver> =
        Arc::new(RestIdentityResolver::new(&backend)?);

    tracing::info!(
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Rate limiting authenticated callers"
    );

    let state = Arc::new(AppState::new(config.clone(), llm_client, identity, store)?);

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
