//! # replate-core
//!
//! Core of the replate food-waste redistribution platform: stores log surplus
//! food packages, volunteers claim and transport them, food banks confirm
//! delivery, and volunteers earn redeemable points for the trip.
//!
//! | Concern            | Module          |
//! |--------------------|-----------------|
//! | Distance & scoring | [`geo`]         |
//! | Actors & roles     | [`identity`]    |
//! | Package lifecycle  | [`lifecycle`]   |
//! | Point ledger       | [`ledger`]      |
//! | Daily rollups      | [`metrics`]     |
//! | Leaderboard/stats  | [`stats`]       |
//! | Pool & seeding     | [`db`]          |
//!
//! ## Lifecycle
//!
//! ```text
//! pending ──► assigned ──► picked_up ──► completed
//!     └──► cancelled
//! ```
//!
//! A package advances only through [`lifecycle`]'s operations. Both physical
//! handoffs (store → volunteer, volunteer → food bank) are verified with the
//! package's 4-digit PIN, and the delivery confirmation settles the
//! volunteer's points through [`ledger`] in the same transaction as the final
//! status flip.

pub mod db;
pub mod error;
pub mod geo;
pub mod identity;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod stats;
pub mod types;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod test_metrics;
#[cfg(test)]
mod test_stats;

pub use error::{Error, Result};
pub use geo::Point;
pub use identity::{Actor, Role};
pub use lifecycle::{AvailableQuery, EngineConfig, PinPolicy};
pub use types::{
    AvailablePackage, DeliveryReceipt, LedgerEntry, LedgerKind, NewPackage, Package,
    PackageStatus, RedemptionReceipt, Reward,
};
