use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use share_core::GatewayService;
use share_core::config::{config_from_env, usize_from_env_value};
use share_files::StagingService;

const DEFAULT_REST_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
const STALE_UPLOAD_AGE: Duration = Duration::from_secs(60 * 60);

/// Main entry point for the share gateway
///
/// Resolves the configuration once, prepares the staging area, and serves the REST API with
/// OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `GATEWAY_REST_ADDR`: REST server address (default: "0.0.0.0:3001")
/// - `GATEWAY_MAX_UPLOAD_BYTES`: upload body limit (default: 512 MiB)
/// - `SHARE_*` / `GATEWAY_*`: share and storage settings read by `share_core::config_from_env`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - a configuration variable is malformed,
/// - the staging directory cannot be created,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("share_gateway=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("share_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(config_from_env()?);
    let rest_addr =
        std::env::var("GATEWAY_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let max_upload_bytes = usize_from_env_value(
        "GATEWAY_MAX_UPLOAD_BYTES",
        std::env::var("GATEWAY_MAX_UPLOAD_BYTES").ok(),
        DEFAULT_MAX_UPLOAD_BYTES,
    )?;

    let staging = StagingService::new(cfg.staging_dir())?;
    let purged = staging.purge_stale(STALE_UPLOAD_AGE).await?;
    if purged > 0 {
        tracing::info!("-- Purged {} stale staged uploads", purged);
    }

    tracing::info!(
        share = %cfg.share().host(),
        auth_mode = ?cfg.auth_mode(),
        data_dir = %cfg.data_dir().display(),
        "++ Share gateway configured"
    );
    tracing::info!("++ Starting share gateway REST on {}", rest_addr);

    let state = AppState {
        gateway: Arc::new(GatewayService::new(cfg)),
        staging,
    };
    let app = router(state, max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
