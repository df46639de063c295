//! The incentive ledger: append-only point balance changes.
//!
//! The `points` column on an actor is a cached view of this ledger, bumped in
//! the same transaction as every entry append. [`reconciled_balance`] re-sums
//! the entries; the two must always agree.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::error::{Error, Result};
use crate::identity::{self, Actor, Role};
use crate::types::{LedgerEntry, LedgerKind, RedemptionReceipt, Reward};

/// Append a positive entry and bump the cached balance, in one transaction.
pub async fn credit(
    pool: &SqlitePool,
    actor_id: i64,
    points: i64,
    kind: LedgerKind,
    reason: &str,
    package_id: Option<i64>,
) -> Result<LedgerEntry> {
    let mut tx = pool.begin().await?;
    let entry = append_credit(&mut tx, actor_id, points, kind, reason, package_id).await?;
    tx.commit().await?;
    Ok(entry)
}

/// Transaction-scoped credit, used by the lifecycle engine to settle a
/// delivery atomically with its status flip.
pub(crate) async fn append_credit(
    tx: &mut Transaction<'_, Sqlite>,
    actor_id: i64,
    points: i64,
    kind: LedgerKind,
    reason: &str,
    package_id: Option<i64>,
) -> Result<LedgerEntry> {
    if points <= 0 {
        return Err(Error::Validation("credit must be positive".into()));
    }

    let now = Utc::now();
    let res = sqlx::query(
        "INSERT INTO ledger_entries (actor_id, package_id, points_change, kind, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(actor_id)
    .bind(package_id)
    .bind(points)
    .bind(kind)
    .bind(reason)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let updated = sqlx::query("UPDATE actors SET points = points + ?1 WHERE id = ?2")
        .bind(points)
        .bind(actor_id)
        .execute(&mut **tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(Error::NotFound("actor"));
    }

    Ok(LedgerEntry {
        id: res.last_insert_rowid(),
        actor_id,
        package_id,
        points_change: points,
        kind,
        reason: Some(reason.to_string()),
        created_at: now,
    })
}

/// Append a negative entry, failing with `InsufficientBalance` rather than
/// driving the balance below zero. The balance check and the deduction are a
/// single conditional `UPDATE`, so concurrent debits cannot overdraw.
pub async fn debit(
    pool: &SqlitePool,
    actor_id: i64,
    points: i64,
    kind: LedgerKind,
    reason: &str,
) -> Result<LedgerEntry> {
    if points <= 0 {
        return Err(Error::Validation("debit must be positive".into()));
    }

    let mut tx = pool.begin().await?;

    let res = sqlx::query("UPDATE actors SET points = points - ?1 WHERE id = ?2 AND points >= ?1")
        .bind(points)
        .bind(actor_id)
        .execute(&mut *tx)
        .await?;

    if res.rows_affected() == 0 {
        let available: Option<i64> = sqlx::query_scalar("SELECT points FROM actors WHERE id = ?1")
            .bind(actor_id)
            .fetch_optional(&mut *tx)
            .await?;
        return match available {
            None => Err(Error::NotFound("actor")),
            Some(available) => Err(Error::InsufficientBalance {
                needed: points,
                available,
            }),
        };
    }

    let now = Utc::now();
    let inserted = sqlx::query(
        "INSERT INTO ledger_entries (actor_id, package_id, points_change, kind, reason, created_at)
         VALUES (?1, NULL, ?2, ?3, ?4, ?5)",
    )
    .bind(actor_id)
    .bind(-points)
    .bind(kind)
    .bind(reason)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(LedgerEntry {
        id: inserted.last_insert_rowid(),
        actor_id,
        package_id: None,
        points_change: -points,
        kind,
        reason: Some(reason.to_string()),
        created_at: now,
    })
}

/// The cached balance from the actor record.
pub async fn balance(pool: &SqlitePool, actor_id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT points FROM actors WHERE id = ?1")
        .bind(actor_id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("actor"))
}

/// The balance recomputed by summing every ledger entry for the actor.
pub async fn reconciled_balance(pool: &SqlitePool, actor_id: i64) -> Result<i64> {
    let sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(points_change), 0) FROM ledger_entries WHERE actor_id = ?1",
    )
    .bind(actor_id)
    .fetch_one(pool)
    .await?;
    Ok(sum)
}

/// An actor's entries, newest first.
pub async fn history(pool: &SqlitePool, actor_id: i64) -> Result<Vec<LedgerEntry>> {
    let rows = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger_entries WHERE actor_id = ?1 ORDER BY created_at DESC, id DESC",
    )
    .bind(actor_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Rewards
// ─────────────────────────────────────────────────────────

/// Active catalog entries.
pub async fn active_rewards(pool: &SqlitePool) -> Result<Vec<Reward>> {
    let rows =
        sqlx::query_as::<_, Reward>("SELECT * FROM rewards WHERE is_active = 1 ORDER BY points_cost")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

/// Add a catalog entry.
pub async fn insert_reward(
    pool: &SqlitePool,
    name: &str,
    points_cost: i64,
    sponsor: Option<&str>,
    description: Option<&str>,
) -> Result<Reward> {
    if points_cost <= 0 {
        return Err(Error::Validation("points_cost must be positive".into()));
    }

    let res = sqlx::query(
        "INSERT INTO rewards (name, points_cost, sponsor, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(name)
    .bind(points_cost)
    .bind(sponsor)
    .bind(description)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    sqlx::query_as::<_, Reward>("SELECT * FROM rewards WHERE id = ?1")
        .bind(res.last_insert_rowid())
        .fetch_one(pool)
        .await
        .map_err(Error::from)
}

/// Spend points on a reward (volunteer only).
pub async fn redeem_reward(
    pool: &SqlitePool,
    volunteer: &Actor,
    reward_id: i64,
) -> Result<RedemptionReceipt> {
    identity::require_role(volunteer, Role::Volunteer)?;

    let reward = sqlx::query_as::<_, Reward>(
        "SELECT * FROM rewards WHERE id = ?1 AND is_active = 1",
    )
    .bind(reward_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("reward"))?;

    let entry = debit(
        pool,
        volunteer.id,
        reward.points_cost,
        LedgerKind::Redemption,
        &format!("Redeemed reward: {}", reward.name),
    )
    .await?;

    let remaining = balance(pool, volunteer.id).await?;
    info!(
        volunteer_id = volunteer.id,
        reward_id,
        points = reward.points_cost,
        "reward redeemed"
    );

    Ok(RedemptionReceipt {
        reward_id: reward.id,
        reward_name: reward.name,
        points_spent: -entry.points_change,
        remaining_points: remaining,
    })
}
