//! replate REST API — entry point.
//!
//! Wires the core lifecycle engine to an Axum router over a SQLite pool.
//! There is no in-process scheduler: the nightly metrics rollup is an
//! endpoint (`POST /metrics/rollup`) for an external timer to hit.

mod api;
mod config;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use replate_core::{db, EngineConfig, PinPolicy};

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    config.validate()?;

    let pool = db::init_pool(&config.database_url).await?;
    if config.seed_demo {
        db::seed_demo(&pool).await?;
    }

    let pin_policy = if config.pin_max_attempts > 0 {
        PinPolicy::limited(config.pin_max_attempts, config.pin_window_secs)
    } else {
        PinPolicy::disabled()
    };
    let engine = EngineConfig {
        avg_speed_kmh: config.avg_speed_kmh,
        pin_policy,
    };

    let state = Arc::new(api::ApiState { pool, engine });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/packages", post(api::create_package))
        .route("/packages/available", get(api::available_packages))
        .route("/packages/mine", get(api::my_packages))
        .route(
            "/packages/:id",
            get(api::get_package).delete(api::cancel_package),
        )
        .route("/packages/:id/claim", post(api::claim_package))
        .route("/packages/:id/pickup", post(api::confirm_pickup))
        .route("/packages/:id/deliver", post(api::confirm_delivery))
        .route("/actors/:id/balance", get(api::balance))
        .route("/actors/:id/ledger", get(api::ledger_history))
        .route("/rewards", get(api::list_rewards))
        .route("/rewards/:id/redeem", post(api::redeem_reward))
        .route("/volunteers/leaderboard", get(api::leaderboard))
        .route("/volunteers/stats", get(api::volunteer_stats))
        .route("/metrics/rollup", post(api::metrics_rollup))
        .route("/metrics/daily", get(api::metrics_daily))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
