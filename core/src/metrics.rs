//! Daily per-store, per-category rollups of lifecycle activity.
//!
//! [`materialize_daily`] is a plain batch function over `(pool, date)`; the
//! "periodic" aspect is an external invocation contract (a timer hits the
//! server's rollup endpoint once a night). Re-running a date recomputes it
//! from the raw package rows and upserts, so the call is idempotent.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;
use crate::types::PackageStatus;

/// One materialized rollup row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyMetric {
    pub id: i64,
    pub date: NaiveDate,
    pub store_id: i64,
    pub category: String,
    /// Weight of packages logged (created) that day, delivered or not.
    pub kg_logged: f64,
    /// Weight of packages whose delivery completed that day.
    pub kg_delivered: f64,
    pub points_awarded: i64,
    pub packages_completed: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Rollup {
    kg_logged: f64,
    kg_delivered: f64,
    points_awarded: i64,
    packages_completed: i64,
}

/// Fold one day of package activity into `metrics_daily`. Returns the number
/// of store/category rows written.
pub async fn materialize_daily(pool: &SqlitePool, date: NaiveDate) -> Result<usize> {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1);

    #[derive(sqlx::FromRow)]
    struct Logged {
        store_id: i64,
        category: String,
        kg: f64,
    }

    let logged = sqlx::query_as::<_, Logged>(
        r#"
        SELECT store_id, category, SUM(weight_kg) AS kg
        FROM   packages
        WHERE  created_at >= ?1 AND created_at < ?2
        GROUP  BY store_id, category
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    #[derive(sqlx::FromRow)]
    struct Delivered {
        store_id: i64,
        category: String,
        kg: f64,
        points: i64,
        completed: i64,
    }

    let delivered = sqlx::query_as::<_, Delivered>(
        r#"
        SELECT store_id, category, SUM(weight_kg) AS kg,
               SUM(points_value) AS points, COUNT(*) AS completed
        FROM   packages
        WHERE  status = ?1 AND delivered_at >= ?2 AND delivered_at < ?3
        GROUP  BY store_id, category
        "#,
    )
    .bind(PackageStatus::Completed)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut rollups: HashMap<(i64, String), Rollup> = HashMap::new();
    for row in logged {
        rollups
            .entry((row.store_id, row.category))
            .or_default()
            .kg_logged += row.kg;
    }
    for row in delivered {
        let entry = rollups.entry((row.store_id, row.category)).or_default();
        entry.kg_delivered += row.kg;
        entry.points_awarded += row.points;
        entry.packages_completed += row.completed;
    }

    let now = Utc::now();
    for ((store_id, category), rollup) in &rollups {
        sqlx::query(
            r#"
            INSERT INTO metrics_daily
                (date, store_id, category, kg_logged, kg_delivered,
                 points_awarded, packages_completed, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (date, store_id, category) DO UPDATE SET
                kg_logged          = excluded.kg_logged,
                kg_delivered       = excluded.kg_delivered,
                points_awarded     = excluded.points_awarded,
                packages_completed = excluded.packages_completed
            "#,
        )
        .bind(date)
        .bind(*store_id)
        .bind(category.as_str())
        .bind(rollup.kg_logged)
        .bind(rollup.kg_delivered)
        .bind(rollup.points_awarded)
        .bind(rollup.packages_completed)
        .bind(now)
        .execute(pool)
        .await?;
    }

    info!(%date, rows = rollups.len(), "daily metrics materialized");
    Ok(rollups.len())
}

/// Read back the rollups for a date.
pub async fn daily_metrics(pool: &SqlitePool, date: NaiveDate) -> Result<Vec<DailyMetric>> {
    let rows = sqlx::query_as::<_, DailyMetric>(
        "SELECT * FROM metrics_daily WHERE date = ?1 ORDER BY store_id, category",
    )
    .bind(date)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
