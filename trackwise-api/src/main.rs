//! Trackwise API server entry point.

use trackwise_api::{create_router, telemetry::init_tracing, ApiError, ApiResult, AppConfig, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format)?;

    let state = AppState::from_config(&config).await?;
    let app = create_router(state);

    let addr = config.bind_addr()?;
    tracing::info!(%addr, "Starting Trackwise API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
