//! Shared fixtures for the integration-style tests.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::geo::Point;
use crate::identity::{self, Actor, Role};
use crate::lifecycle;
use crate::types::{NewPackage, Package};

/// Fresh in-memory database with all migrations applied.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

pub async fn store_at(pool: &SqlitePool, name: &str, lat: f64, lng: f64) -> Actor {
    identity::create_actor(pool, name, Role::Store, Some(Point { lat, lng }))
        .await
        .expect("create store")
}

pub async fn volunteer(pool: &SqlitePool, name: &str) -> Actor {
    identity::create_actor(pool, name, Role::Volunteer, None)
        .await
        .expect("create volunteer")
}

pub async fn food_bank(pool: &SqlitePool, name: &str) -> Actor {
    identity::create_actor(pool, name, Role::FoodBank, None)
        .await
        .expect("create food bank")
}

pub fn four_hour_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc::now();
    (start, start + Duration::hours(4))
}

pub fn new_package(weight_kg: f64, category: &str) -> NewPackage {
    let (window_start, window_end) = four_hour_window();
    NewPackage {
        weight_kg,
        category: category.to_string(),
        window_start,
        window_end,
        instructions: None,
    }
}

pub async fn pending_package(pool: &SqlitePool, store: &Actor) -> Package {
    lifecycle::create_package(pool, store, new_package(5.0, "produce"))
        .await
        .expect("create package")
}

/// A PIN guaranteed not to match `correct`.
pub fn wrong_pin(correct: &str) -> String {
    if correct == "1000" {
        "1001".to_string()
    } else {
        "1000".to_string()
    }
}
