//! The package lifecycle engine.
//!
//! | Phase      | Operation                                   |
//! |------------|---------------------------------------------|
//! | Logging    | [`create_package`], [`cancel_package`]      |
//! | Discovery  | [`list_available`], [`get_package`]         |
//! | Claim      | [`claim_package`]                           |
//! | Handoff    | [`confirm_pickup`], [`confirm_delivery`]    |
//!
//! Every state-changing operation performs its status flip as a single
//! conditional `UPDATE … WHERE status = <expected>`. SQLite executes each
//! statement atomically, so when two callers race (two volunteers claiming
//! the same package, two delivery confirmations for one package) exactly one
//! write lands and the loser sees zero rows affected, surfaced as
//! `InvalidState`. Delivery additionally settles the volunteer's points and
//! hours inside the same transaction as the status flip, so a package that
//! completes once credits exactly once.

use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{Error, Result};
use crate::geo::{self, Point};
use crate::identity::{self, Actor, Role};
use crate::ledger;
use crate::types::{
    AvailablePackage, DeliveryReceipt, LedgerKind, NewPackage, Package, PackageStatus,
};

/// Limit on failed PIN entries per package per actor inside a sliding window.
///
/// Disabled by default, which matches the historical contract of unlimited
/// guesses; enforcement can be switched on without touching the state
/// machine. Failed attempts are recorded either way.
#[derive(Debug, Clone, Copy)]
pub struct PinPolicy {
    pub max_attempts: u32,
    pub window_secs: i64,
}

impl PinPolicy {
    pub fn disabled() -> Self {
        Self { max_attempts: 0, window_secs: 0 }
    }

    pub fn limited(max_attempts: u32, window_secs: i64) -> Self {
        Self { max_attempts, window_secs }
    }

    fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }
}

/// Tunables the engine needs beyond the database handle. No shared state;
/// callers construct one and pass it explicitly.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub avg_speed_kmh: f64,
    pub pin_policy: PinPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            avg_speed_kmh: geo::DEFAULT_AVG_SPEED_KMH,
            pin_policy: PinPolicy::disabled(),
        }
    }
}

/// Filters for [`list_available`].
#[derive(Debug, Clone)]
pub struct AvailableQuery {
    /// Querying volunteer's location; distance scoring is skipped without it.
    pub near: Option<Point>,
    pub max_distance_km: f64,
    pub category: Option<String>,
    pub min_points: Option<i64>,
}

impl Default for AvailableQuery {
    fn default() -> Self {
        Self {
            near: None,
            max_distance_km: 10.0,
            category: None,
            min_points: None,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Creation and discovery
// ─────────────────────────────────────────────────────────

/// Log a new surplus package (store only). Generates the package's PIN and
/// persists it as `pending`, which makes it visible to availability queries.
pub async fn create_package(pool: &SqlitePool, store: &Actor, req: NewPackage) -> Result<Package> {
    identity::require_role(store, Role::Store)?;
    // Claim-time scoring needs the store's fixed location; reject up front
    // rather than strand a package nobody can claim.
    store.as_store()?;

    if !(req.weight_kg > 0.0) {
        return Err(Error::Validation("weight_kg must be positive".into()));
    }
    if req.category.trim().is_empty() {
        return Err(Error::Validation("category must not be empty".into()));
    }
    if req.window_start >= req.window_end {
        return Err(Error::Validation(
            "pickup window start must precede its end".into(),
        ));
    }

    let now = Utc::now();
    let res = sqlx::query(
        r#"
        INSERT INTO packages
            (store_id, status, pickup_pin, weight_kg, category,
             window_start, window_end, instructions, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(store.id)
    .bind(PackageStatus::Pending)
    .bind(generate_pin())
    .bind(req.weight_kg)
    .bind(&req.category)
    .bind(req.window_start)
    .bind(req.window_end)
    .bind(&req.instructions)
    .bind(now)
    .execute(pool)
    .await?;

    let id = res.last_insert_rowid();
    info!(package_id = id, store_id = store.id, "package created");
    get_package(pool, id).await
}

/// Fetch a package by id.
pub async fn get_package(pool: &SqlitePool, id: i64) -> Result<Package> {
    sqlx::query_as::<_, Package>("SELECT * FROM packages WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("package"))
}

/// All pending packages, with advisory distance/points/hours against the
/// querying location when one is given. Nothing computed here is persisted;
/// the numbers that stick are recomputed at claim time from the actual
/// claimant's location.
pub async fn list_available(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    query: &AvailableQuery,
) -> Result<Vec<AvailablePackage>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        id: i64,
        store_id: i64,
        store_name: String,
        store_lat: Option<f64>,
        store_lng: Option<f64>,
        weight_kg: f64,
        category: String,
        window_start: chrono::DateTime<Utc>,
        window_end: chrono::DateTime<Utc>,
        instructions: Option<String>,
        created_at: chrono::DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, Row>(
        r#"
        SELECT p.id, p.store_id, a.name AS store_name, a.lat AS store_lat,
               a.lng AS store_lng, p.weight_kg, p.category, p.window_start,
               p.window_end, p.instructions, p.created_at
        FROM   packages p
        JOIN   actors a ON a.id = p.store_id
        WHERE  p.status = ?1
        ORDER  BY p.created_at ASC, p.id ASC
        "#,
    )
    .bind(PackageStatus::Pending)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::new();
    for row in rows {
        if let Some(wanted) = &query.category {
            if &row.category != wanted {
                continue;
            }
        }

        let store_loc = match (row.store_lat, row.store_lng) {
            (Some(lat), Some(lng)) => Some(Point { lat, lng }),
            _ => None,
        };

        let (distance_km, points, estimated_hours) = match (query.near, store_loc) {
            (Some(here), Some(store)) => {
                let km = geo::distance_km(here, store);
                if km > query.max_distance_km {
                    continue;
                }
                let points = geo::points_for_distance(km);
                if let Some(min) = query.min_points {
                    if points < min {
                        continue;
                    }
                }
                (
                    Some((km * 100.0).round() / 100.0),
                    Some(points),
                    Some(geo::estimated_hours(km, cfg.avg_speed_kmh)),
                )
            }
            _ => (None, None, None),
        };

        out.push(AvailablePackage {
            package_id: row.id,
            store_id: row.store_id,
            store_name: row.store_name,
            category: row.category,
            weight_kg: row.weight_kg,
            window_start: row.window_start,
            window_end: row.window_end,
            instructions: row.instructions,
            distance_km,
            points,
            estimated_hours,
            created_at: row.created_at,
        });
    }

    Ok(out)
}

/// Packages relevant to the calling actor, resolved per role.
pub async fn packages_for_actor(pool: &SqlitePool, actor: &Actor) -> Result<Vec<Package>> {
    let rows = match actor.role {
        Role::Store => {
            sqlx::query_as::<_, Package>(
                "SELECT * FROM packages WHERE store_id = ?1 ORDER BY created_at DESC",
            )
            .bind(actor.id)
            .fetch_all(pool)
            .await?
        }
        Role::Volunteer => {
            sqlx::query_as::<_, Package>(
                "SELECT * FROM packages WHERE volunteer_id = ?1 ORDER BY created_at DESC",
            )
            .bind(actor.id)
            .fetch_all(pool)
            .await?
        }
        // Operators see the inbound queue plus what they have confirmed.
        Role::FoodBank => {
            sqlx::query_as::<_, Package>(
                "SELECT * FROM packages WHERE status IN (?1, ?2) ORDER BY created_at DESC",
            )
            .bind(PackageStatus::PickedUp)
            .bind(PackageStatus::Completed)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Transitions
// ─────────────────────────────────────────────────────────

/// Atomically reserve a pending package for `volunteer` (volunteer only).
///
/// Distance, points, and estimated hours are computed here, from the
/// claimant's supplied location to the owning store, and persisted with the
/// status flip. The flip only succeeds if the package is still `pending`;
/// a concurrent claimant that loses the race gets `InvalidState`.
pub async fn claim_package(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    volunteer: &Actor,
    package_id: i64,
    location: Point,
) -> Result<Package> {
    identity::require_role(volunteer, Role::Volunteer)?;

    let pkg = get_package(pool, package_id).await?;
    if pkg.status != PackageStatus::Pending {
        return Err(Error::InvalidState(format!(
            "package is {} and cannot be claimed",
            pkg.status
        )));
    }

    let store = identity::load_actor(pool, pkg.store_id).await?.as_store()?;
    let km = geo::distance_km(location, store.location);
    let points = geo::points_for_distance(km);
    let hours = geo::estimated_hours(km, cfg.avg_speed_kmh);

    let res = sqlx::query(
        r#"
        UPDATE packages
        SET    status = ?1, volunteer_id = ?2, points_value = ?3,
               estimated_hours = ?4, claimed_at = ?5
        WHERE  id = ?6 AND status = ?7
        "#,
    )
    .bind(PackageStatus::Assigned)
    .bind(volunteer.id)
    .bind(points)
    .bind(hours)
    .bind(Utc::now())
    .bind(package_id)
    .bind(PackageStatus::Pending)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        // Someone else flipped the status between our read and our write.
        return Err(Error::InvalidState("package is no longer pending".into()));
    }

    info!(
        package_id,
        volunteer_id = volunteer.id,
        points,
        "package claimed"
    );
    get_package(pool, package_id).await
}

/// Confirm physical pickup at the store (assigned volunteer only, PIN gated).
pub async fn confirm_pickup(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    volunteer: &Actor,
    package_id: i64,
    entered_pin: &str,
) -> Result<Package> {
    identity::require_role(volunteer, Role::Volunteer)?;

    let pkg = get_package(pool, package_id).await?;
    if let Some(assigned) = pkg.volunteer_id {
        if assigned != volunteer.id {
            return Err(Error::Forbidden(
                "package is assigned to a different volunteer".into(),
            ));
        }
    }
    if pkg.status != PackageStatus::Assigned {
        return Err(Error::InvalidState(format!(
            "package is {}, pickup requires assigned",
            pkg.status
        )));
    }

    check_pin(pool, &cfg.pin_policy, &pkg, volunteer, entered_pin).await?;

    let res = sqlx::query(
        "UPDATE packages SET status = ?1, picked_up_at = ?2
         WHERE id = ?3 AND status = ?4 AND volunteer_id = ?5",
    )
    .bind(PackageStatus::PickedUp)
    .bind(Utc::now())
    .bind(package_id)
    .bind(PackageStatus::Assigned)
    .bind(volunteer.id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(Error::InvalidState("package is no longer assigned".into()));
    }

    info!(package_id, volunteer_id = volunteer.id, "pickup confirmed");
    get_package(pool, package_id).await
}

/// Confirm delivery at the food bank (operator only, PIN gated).
///
/// The status flip and the volunteer's settlement (ledger credit of
/// `points_value`, hours accrual) commit in one transaction. A package can
/// only pass `picked_up → completed` once, so the credit cannot double.
pub async fn confirm_delivery(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    operator: &Actor,
    package_id: i64,
    entered_pin: &str,
) -> Result<DeliveryReceipt> {
    identity::require_role(operator, Role::FoodBank)?;

    let pkg = get_package(pool, package_id).await?;
    if pkg.status != PackageStatus::PickedUp {
        return Err(Error::InvalidState(format!(
            "package is {}, delivery requires picked_up",
            pkg.status
        )));
    }

    check_pin(pool, &cfg.pin_policy, &pkg, operator, entered_pin).await?;

    let volunteer_id = pkg
        .volunteer_id
        .ok_or_else(|| Error::InvalidState("picked-up package has no volunteer".into()))?;

    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "UPDATE packages SET status = ?1, delivered_at = ?2, food_bank_id = ?3
         WHERE id = ?4 AND status = ?5",
    )
    .bind(PackageStatus::Completed)
    .bind(Utc::now())
    .bind(operator.id)
    .bind(package_id)
    .bind(PackageStatus::PickedUp)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        // Lost the race to another confirmation; dropping tx rolls back.
        return Err(Error::InvalidState(
            "package is no longer picked_up".into(),
        ));
    }

    ledger::append_credit(
        &mut tx,
        volunteer_id,
        pkg.points_value,
        LedgerKind::Delivery,
        &format!("Delivered package {package_id}"),
        Some(package_id),
    )
    .await?;

    sqlx::query("UPDATE actors SET total_hours = total_hours + ?1 WHERE id = ?2")
        .bind(pkg.estimated_hours)
        .bind(volunteer_id)
        .execute(&mut *tx)
        .await?;

    let new_balance: i64 = sqlx::query_scalar("SELECT points FROM actors WHERE id = ?1")
        .bind(volunteer_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        package_id,
        volunteer_id,
        points = pkg.points_value,
        "delivery confirmed"
    );

    let package = get_package(pool, package_id).await?;
    Ok(DeliveryReceipt {
        package,
        volunteer_id,
        points_awarded: pkg.points_value,
        hours_logged: pkg.estimated_hours,
        volunteer_new_balance: new_balance,
    })
}

/// Withdraw a pending package (owning store only).
///
/// Anything past `pending` has a volunteer en route or done and cannot be
/// cancelled.
pub async fn cancel_package(pool: &SqlitePool, store: &Actor, package_id: i64) -> Result<Package> {
    identity::require_role(store, Role::Store)?;

    let pkg = get_package(pool, package_id).await?;
    if pkg.store_id != store.id {
        return Err(Error::Forbidden(
            "package belongs to a different store".into(),
        ));
    }
    if pkg.status != PackageStatus::Pending {
        return Err(Error::InvalidState(format!(
            "cannot cancel a package that is {}",
            pkg.status
        )));
    }

    let res = sqlx::query("UPDATE packages SET status = ?1 WHERE id = ?2 AND status = ?3")
        .bind(PackageStatus::Cancelled)
        .bind(package_id)
        .bind(PackageStatus::Pending)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(Error::InvalidState("package is no longer pending".into()));
    }

    info!(package_id, store_id = store.id, "package cancelled");
    get_package(pool, package_id).await
}

// ─────────────────────────────────────────────────────────
// PIN handling
// ─────────────────────────────────────────────────────────

/// Uniform over 1000–9999. Scoped per package; cross-package collisions are
/// tolerated.
fn generate_pin() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Enforce the attempt policy, then compare the PIN. Failed attempts are
/// recorded regardless of whether the policy is enabled.
async fn check_pin(
    pool: &SqlitePool,
    policy: &PinPolicy,
    pkg: &Package,
    actor: &Actor,
    entered: &str,
) -> Result<()> {
    if policy.is_enabled() {
        let cutoff = Utc::now() - Duration::seconds(policy.window_secs);
        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pin_attempts
             WHERE package_id = ?1 AND actor_id = ?2 AND attempted_at >= ?3",
        )
        .bind(pkg.id)
        .bind(actor.id)
        .bind(cutoff)
        .fetch_one(pool)
        .await?;

        if recent >= i64::from(policy.max_attempts) {
            return Err(Error::TooManyAttempts);
        }
    }

    if entered != pkg.pickup_pin {
        sqlx::query(
            "INSERT INTO pin_attempts (package_id, actor_id, attempted_at) VALUES (?1, ?2, ?3)",
        )
        .bind(pkg.id)
        .bind(actor.id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        return Err(Error::InvalidCredential);
    }

    Ok(())
}
