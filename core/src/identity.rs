//! Actors and role gating.
//!
//! Every operation in the lifecycle engine and the ledger is restricted to a
//! role; [`require_role`] is the stateless gate placed in front of each one.
//! Roles form a closed set and are resolved by pattern match, never by string
//! interpolation, and a role is immutable once the actor exists (there is no
//! update path).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::geo::Point;

/// The three kinds of actor in the redistribution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    /// Logs surplus packages and hands them to volunteers.
    Store,
    /// Claims, transports, and earns points for packages.
    Volunteer,
    /// Confirms deliveries at the receiving end.
    FoodBank,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Store => "store",
            Role::Volunteer => "volunteer",
            Role::FoodBank => "food_bank",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A store, volunteer, or food-bank operator.
///
/// `points` is a cached view of the ledger; only [`crate::ledger`] writes it.
/// `lat`/`lng` are set for stores (volunteers supply their location per
/// request instead).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub role: Role,
    pub points: i64,
    pub total_hours: f64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// The store-specific view of an actor: a store always has a fixed location.
#[derive(Debug, Clone, Serialize)]
pub struct StoreProfile {
    pub id: i64,
    pub name: String,
    pub location: Point,
}

impl Actor {
    pub fn location(&self) -> Option<Point> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Point { lat, lng }),
            _ => None,
        }
    }

    /// Resolve this actor as a store, or fail.
    ///
    /// `Forbidden` when the role is wrong; `Validation` when the store record
    /// is missing its location (distance scoring needs it).
    pub fn as_store(&self) -> Result<StoreProfile> {
        match self.role {
            Role::Store => {
                let location = self
                    .location()
                    .ok_or_else(|| Error::Validation("store has no location on record".into()))?;
                Ok(StoreProfile {
                    id: self.id,
                    name: self.name.clone(),
                    location,
                })
            }
            _ => Err(Error::Forbidden(format!("{} is not a store", self.name))),
        }
    }
}

/// Require `actor` to hold `role`; pass the actor through on success.
pub fn require_role(actor: &Actor, role: Role) -> Result<&Actor> {
    if actor.role == role {
        Ok(actor)
    } else {
        Err(Error::Forbidden(format!("operation requires the {role} role")))
    }
}

/// Load an actor by id.
pub async fn load_actor(pool: &SqlitePool, id: i64) -> Result<Actor> {
    sqlx::query_as::<_, Actor>("SELECT * FROM actors WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("actor"))
}

/// Insert a new actor. Role is fixed for the lifetime of the record.
pub async fn create_actor(
    pool: &SqlitePool,
    name: &str,
    role: Role,
    location: Option<Point>,
) -> Result<Actor> {
    if name.trim().is_empty() {
        return Err(Error::Validation("actor name must not be empty".into()));
    }

    let now = Utc::now();
    let res = sqlx::query(
        "INSERT INTO actors (name, role, lat, lng, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(name)
    .bind(role)
    .bind(location.map(|p| p.lat))
    .bind(location.map(|p| p.lng))
    .bind(now)
    .execute(pool)
    .await?;

    load_actor(pool, res.last_insert_rowid()).await
}
