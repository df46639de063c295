//! Shared data structures for the package lifecycle and the incentive ledger.
//!
//! ## Status as a finite-state machine
//!
//! [`PackageStatus`] enforces a strict forward-only lifecycle:
//!
//! ```text
//! pending ──► assigned ──► picked_up ──► completed
//!     └──► cancelled
//! ```
//!
//! No transition skips a step and none moves backward; `cancelled` is
//! reachable only from `pending`. Each transition is a single conditional
//! `UPDATE` against the previous status, so a lost race surfaces as
//! `InvalidState` rather than a double write.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PackageStatus {
    /// Visible to availability queries; claimable.
    Pending,
    /// Reserved by exactly one volunteer.
    Assigned,
    /// Physically collected at the store (PIN verified).
    PickedUp,
    /// Delivered to a food bank (PIN verified); points settled.
    Completed,
    /// Withdrawn by the store before anyone claimed it. Terminal.
    Cancelled,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pending => "pending",
            PackageStatus::Assigned => "assigned",
            PackageStatus::PickedUp => "picked_up",
            PackageStatus::Completed => "completed",
            PackageStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of surplus food flowing through the redistribution pipeline.
///
/// The PIN is generated at creation, never changes, and is the sole
/// credential for both handoff confirmations. It is excluded from
/// serialized responses; the create endpoint hands it to the owning store
/// explicitly and nobody else ever sees it over the wire.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Package {
    pub id: i64,
    pub store_id: i64,
    /// Non-null exactly while status is assigned, picked_up, or completed.
    pub volunteer_id: Option<i64>,
    /// Set when a food-bank operator confirms delivery.
    pub food_bank_id: Option<i64>,
    pub status: PackageStatus,
    #[serde(skip_serializing)]
    pub pickup_pin: String,
    pub weight_kg: f64,
    pub category: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub instructions: Option<String>,
    /// Persisted at claim time, from the claiming volunteer's location.
    pub points_value: i64,
    pub estimated_hours: f64,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Input for creating a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPackage {
    pub weight_kg: f64,
    pub category: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub instructions: Option<String>,
}

/// A pending package as seen by a browsing volunteer.
///
/// `distance_km`, `points`, and `estimated_hours` are advisory: they are
/// computed against the querying location and persisted only at claim time,
/// when the actual claimant's location is known. Without a query location
/// they are absent.
#[derive(Debug, Clone, Serialize)]
pub struct AvailablePackage {
    pub package_id: i64,
    pub store_id: i64,
    pub store_name: String,
    pub category: String,
    pub weight_kg: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub instructions: Option<String>,
    pub distance_km: Option<f64>,
    pub points: Option<i64>,
    pub estimated_hours: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Kinds of point balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Credit for a confirmed delivery.
    Delivery,
    /// Debit for a reward redemption.
    Redemption,
    /// Manual adjustment.
    Bonus,
}

/// An immutable record of one point balance change.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub actor_id: i64,
    pub package_id: Option<i64>,
    pub points_change: i64,
    pub kind: LedgerKind,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A redeemable catalog item with a fixed point cost.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Reward {
    pub id: i64,
    pub name: String,
    pub points_cost: i64,
    pub sponsor: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a confirmed delivery: the final package plus the settlement.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    pub package: Package,
    pub volunteer_id: i64,
    pub points_awarded: i64,
    pub hours_logged: f64,
    pub volunteer_new_balance: i64,
}

/// Outcome of a reward redemption.
#[derive(Debug, Clone, Serialize)]
pub struct RedemptionReceipt {
    pub reward_id: i64,
    pub reward_name: String,
    pub points_spent: i64,
    pub remaining_points: i64,
}
