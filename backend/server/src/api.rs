//! Axum REST API handlers.
//!
//! The caller is identified by an `x-actor-id` header (token issuance is an
//! external concern); role enforcement happens inside the core operations.
//! Core failures map onto distinct status codes here and nowhere else.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use replate_core::{
    identity, ledger, lifecycle, metrics, stats, Actor, AvailableQuery, EngineConfig, Error,
    NewPackage, Point,
};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub engine: EngineConfig,
}

// ─────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Wrapper giving every core error a status code and a JSON body.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::InvalidState(_) => StatusCode::CONFLICT,
            Error::InvalidCredential => StatusCode::UNAUTHORIZED,
            Error::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            Error::InsufficientBalance { .. } => StatusCode::CONFLICT,
            Error::Database(_) | Error::Migrate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Resolve the calling actor from the `x-actor-id` header.
async fn current_actor(state: &ApiState, headers: &HeaderMap) -> Result<Actor, ApiError> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| {
            ApiError(Error::Validation(
                "missing or malformed x-actor-id header".into(),
            ))
        })?;
    Ok(identity::load_actor(&state.pool, id).await?)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AvailableParams {
    lat: Option<f64>,
    lng: Option<f64>,
    max_distance_km: Option<f64>,
    category: Option<String>,
    min_points: Option<i64>,
}

#[derive(Deserialize)]
pub struct ClaimBody {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
pub struct PinBody {
    pin: String,
}

#[derive(Deserialize)]
pub struct LeaderboardParams {
    sort_by: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct DateParam {
    date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct CreatedPackageResponse {
    /// Handed to the creating store only; the store relays it to the
    /// volunteer at pickup and it travels with the package to delivery.
    pub pickup_pin: String,
    pub package: replate_core::Package,
}

#[derive(Serialize)]
pub struct PackagesResponse {
    pub count: usize,
    pub packages: Vec<replate_core::Package>,
}

#[derive(Serialize)]
pub struct AvailableResponse {
    pub count: usize,
    pub packages: Vec<replate_core::AvailablePackage>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub actor_id: i64,
    pub name: String,
    pub points: i64,
    pub total_hours: f64,
}

#[derive(Serialize)]
pub struct LedgerResponse {
    pub actor_id: i64,
    pub count: usize,
    pub entries: Vec<replate_core::LedgerEntry>,
}

#[derive(Serialize)]
pub struct RewardsResponse {
    pub count: usize,
    pub rewards: Vec<replate_core::Reward>,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /packages` — log a surplus package (store only).
pub async fn create_package(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<NewPackage>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    let package = lifecycle::create_package(&state.pool, &actor, body).await?;
    let pickup_pin = package.pickup_pin.clone();
    Ok((
        StatusCode::CREATED,
        Json(CreatedPackageResponse { pickup_pin, package }),
    ))
}

/// `GET /packages/available`
pub async fn available_packages(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<AvailableParams>,
) -> Result<Json<AvailableResponse>, ApiError> {
    let near = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => Some(Point { lat, lng }),
        _ => None,
    };
    let mut query = AvailableQuery {
        near,
        category: params.category,
        min_points: params.min_points,
        ..AvailableQuery::default()
    };
    if let Some(max) = params.max_distance_km {
        query.max_distance_km = max;
    }

    let packages = lifecycle::list_available(&state.pool, &state.engine, &query).await?;
    Ok(Json(AvailableResponse {
        count: packages.len(),
        packages,
    }))
}

/// `GET /packages/:id`
pub async fn get_package(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<replate_core::Package>, ApiError> {
    Ok(Json(lifecycle::get_package(&state.pool, id).await?))
}

/// `GET /packages/mine` — the caller's packages, resolved per role.
pub async fn my_packages(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<PackagesResponse>, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    let packages = lifecycle::packages_for_actor(&state.pool, &actor).await?;
    Ok(Json(PackagesResponse {
        count: packages.len(),
        packages,
    }))
}

/// `POST /packages/:id/claim` — reserve a pending package (volunteer only).
pub async fn claim_package(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ClaimBody>,
) -> Result<Json<replate_core::Package>, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    let location = Point {
        lat: body.lat,
        lng: body.lng,
    };
    let package =
        lifecycle::claim_package(&state.pool, &state.engine, &actor, id, location).await?;
    Ok(Json(package))
}

/// `POST /packages/:id/pickup` — PIN-verified handoff at the store.
pub async fn confirm_pickup(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<PinBody>,
) -> Result<Json<replate_core::Package>, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    let package =
        lifecycle::confirm_pickup(&state.pool, &state.engine, &actor, id, &body.pin).await?;
    Ok(Json(package))
}

/// `POST /packages/:id/deliver` — PIN-verified handoff at the food bank.
pub async fn confirm_delivery(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<PinBody>,
) -> Result<Json<replate_core::DeliveryReceipt>, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    let receipt =
        lifecycle::confirm_delivery(&state.pool, &state.engine, &actor, id, &body.pin).await?;
    Ok(Json(receipt))
}

/// `DELETE /packages/:id` — withdraw a pending package (owning store only).
pub async fn cancel_package(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<replate_core::Package>, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    Ok(Json(
        lifecycle::cancel_package(&state.pool, &actor, id).await?,
    ))
}

/// `GET /actors/:id/balance`
pub async fn balance(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let actor = identity::load_actor(&state.pool, id).await?;
    Ok(Json(BalanceResponse {
        actor_id: actor.id,
        name: actor.name,
        points: actor.points,
        total_hours: actor.total_hours,
    }))
}

/// `GET /actors/:id/ledger`
pub async fn ledger_history(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<LedgerResponse>, ApiError> {
    identity::load_actor(&state.pool, id).await?;
    let entries = ledger::history(&state.pool, id).await?;
    Ok(Json(LedgerResponse {
        actor_id: id,
        count: entries.len(),
        entries,
    }))
}

/// `GET /rewards`
pub async fn list_rewards(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<RewardsResponse>, ApiError> {
    let rewards = ledger::active_rewards(&state.pool).await?;
    Ok(Json(RewardsResponse {
        count: rewards.len(),
        rewards,
    }))
}

/// `POST /rewards/:id/redeem` (volunteer only)
pub async fn redeem_reward(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<replate_core::RedemptionReceipt>, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    Ok(Json(ledger::redeem_reward(&state.pool, &actor, id).await?))
}

/// `GET /volunteers/leaderboard`
pub async fn leaderboard(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Vec<stats::LeaderboardEntry>>, ApiError> {
    let sort = stats::LeaderboardSort::parse(params.sort_by.as_deref().unwrap_or("points"));
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    Ok(Json(stats::leaderboard(&state.pool, sort, limit).await?))
}

/// `GET /volunteers/stats` (volunteer only)
pub async fn volunteer_stats(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<stats::VolunteerStats>, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    Ok(Json(stats::volunteer_stats(&state.pool, &actor).await?))
}

/// `POST /metrics/rollup` — externally-timed batch; defaults to yesterday.
pub async fn metrics_rollup(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<DateParam>,
) -> Result<impl IntoResponse, ApiError> {
    let date = params.date.unwrap_or_else(yesterday);
    let rows = metrics::materialize_daily(&state.pool, date).await?;
    Ok(Json(serde_json::json!({ "date": date, "rows": rows })))
}

/// `GET /metrics/daily`
pub async fn metrics_daily(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<DateParam>,
) -> Result<impl IntoResponse, ApiError> {
    let date = params.date.unwrap_or_else(yesterday);
    let rows = metrics::daily_metrics(&state.pool, date).await?;
    Ok(Json(serde_json::json!({
        "date": date,
        "count": rows.len(),
        "metrics": rows,
    })))
}

fn yesterday() -> NaiveDate {
    Utc::now().date_naive() - Duration::days(1)
}
