//! Database layer — pool setup, migrations, and demo seeding.

use std::str::FromStr;

use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;
use crate::geo::Point;
use crate::identity::{self, Role};
use crate::ledger;
use crate::lifecycle;
use crate::types::NewPackage;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");
    Ok(pool)
}

/// Seed a demo store/volunteer/food-bank trio, a reward catalog, and a few
/// pending packages. No-op when any actor already exists.
pub async fn seed_demo(pool: &SqlitePool) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM actors")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let grocery = identity::create_actor(
        pool,
        "Demo Grocery Store",
        Role::Store,
        Some(Point { lat: 42.3601, lng: -71.0589 }),
    )
    .await?;
    let market = identity::create_actor(
        pool,
        "Central Square Market",
        Role::Store,
        Some(Point { lat: 42.3656, lng: -71.1036 }),
    )
    .await?;
    identity::create_actor(pool, "Demo Volunteer", Role::Volunteer, None).await?;
    identity::create_actor(pool, "Community Food Bank", Role::FoodBank, None).await?;

    ledger::insert_reward(
        pool,
        "Free Coffee",
        50,
        Some("Demo Grocery Store"),
        Some("One free coffee at the counter"),
    )
    .await?;
    ledger::insert_reward(
        pool,
        "Grocery Voucher",
        200,
        Some("Central Square Market"),
        Some("$10 off your next purchase"),
    )
    .await?;

    let window_start = Utc::now();
    let window_end = window_start + Duration::hours(4);
    for (store, weight_kg, category) in [
        (&grocery, 5.0, "produce"),
        (&grocery, 2.5, "bakery"),
        (&market, 8.0, "dairy"),
    ] {
        lifecycle::create_package(
            pool,
            store,
            NewPackage {
                weight_kg,
                category: category.to_string(),
                window_start,
                window_end,
                instructions: None,
            },
        )
        .await?;
    }

    info!("seeded demo data");
    Ok(())
}
