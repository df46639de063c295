//! Volunteer-facing statistics: the leaderboard and per-volunteer summaries.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::identity::{self, Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardSort {
    Points,
    Deliveries,
    Hours,
}

impl LeaderboardSort {
    /// Lenient parse; anything unrecognized falls back to points.
    pub fn parse(s: &str) -> Self {
        match s {
            "deliveries" => LeaderboardSort::Deliveries,
            "hours" => LeaderboardSort::Hours,
            _ => LeaderboardSort::Points,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub actor_id: i64,
    pub name: String,
    pub points: i64,
    pub total_hours: f64,
    pub deliveries_completed: i64,
    pub rank: i64,
}

/// Top volunteers by the chosen criterion.
pub async fn leaderboard(
    pool: &SqlitePool,
    sort: LeaderboardSort,
    limit: i64,
) -> Result<Vec<LeaderboardEntry>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        actor_id: i64,
        name: String,
        points: i64,
        total_hours: f64,
        deliveries_completed: i64,
    }

    // Closed set of ORDER BY clauses; nothing user-supplied reaches the SQL.
    let order = match sort {
        LeaderboardSort::Points => "a.points DESC",
        LeaderboardSort::Deliveries => "deliveries_completed DESC",
        LeaderboardSort::Hours => "a.total_hours DESC",
    };

    let sql = format!(
        r#"
        SELECT a.id AS actor_id, a.name, a.points, a.total_hours,
               (SELECT COUNT(*) FROM packages p
                WHERE p.volunteer_id = a.id AND p.status = 'completed')
               AS deliveries_completed
        FROM   actors a
        WHERE  a.role = 'volunteer'
        ORDER  BY {order}, a.id ASC
        LIMIT  ?1
        "#
    );

    let rows = sqlx::query_as::<_, Row>(&sql)
        .bind(limit.max(1))
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            actor_id: row.actor_id,
            name: row.name,
            points: row.points,
            total_hours: row.total_hours,
            deliveries_completed: row.deliveries_completed,
            rank: i as i64 + 1,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct VolunteerStats {
    pub actor_id: i64,
    pub name: String,
    pub points: i64,
    pub total_hours: f64,
    pub packages_claimed: i64,
    pub packages_picked_up: i64,
    pub packages_delivered: i64,
    pub average_points_per_delivery: f64,
}

/// Lifetime summary for one volunteer.
pub async fn volunteer_stats(pool: &SqlitePool, volunteer: &Actor) -> Result<VolunteerStats> {
    identity::require_role(volunteer, Role::Volunteer)?;

    let (claimed, picked_up, delivered): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status IN ('assigned', 'picked_up', 'completed')),
            COUNT(*) FILTER (WHERE status IN ('picked_up', 'completed')),
            COUNT(*) FILTER (WHERE status = 'completed')
        FROM packages
        WHERE volunteer_id = ?1
        "#,
    )
    .bind(volunteer.id)
    .fetch_one(pool)
    .await?;

    let average = if delivered > 0 {
        let avg = volunteer.points as f64 / delivered as f64;
        (avg * 100.0).round() / 100.0
    } else {
        0.0
    };

    Ok(VolunteerStats {
        actor_id: volunteer.id,
        name: volunteer.name.clone(),
        points: volunteer.points,
        total_hours: volunteer.total_hours,
        packages_claimed: claimed,
        packages_picked_up: picked_up,
        packages_delivered: delivered,
        average_points_per_delivery: average,
    })
}
