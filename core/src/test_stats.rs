//! Leaderboard and volunteer-summary tests.

use crate::error::Error;
use crate::ledger;
use crate::lifecycle::{self, EngineConfig};
use crate::stats::{self, LeaderboardSort};
use crate::test_support::*;
use crate::types::LedgerKind;
use crate::Point;

#[tokio::test]
async fn leaderboard_ranks_by_the_chosen_criterion() {
    let pool = test_pool().await;
    let slow = volunteer(&pool, "Slow").await;
    let fast = volunteer(&pool, "Fast").await;
    store_at(&pool, "Shop", 0.0, 0.0).await; // stores never appear

    ledger::credit(&pool, slow.id, 10, LedgerKind::Bonus, "bonus", None)
        .await
        .unwrap();
    ledger::credit(&pool, fast.id, 90, LedgerKind::Bonus, "bonus", None)
        .await
        .unwrap();

    let board = stats::leaderboard(&pool, LeaderboardSort::Points, 10)
        .await
        .unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].name, "Fast");
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[1].name, "Slow");
    assert_eq!(board[1].rank, 2);

    let top_one = stats::leaderboard(&pool, LeaderboardSort::Points, 1)
        .await
        .unwrap();
    assert_eq!(top_one.len(), 1);
    assert_eq!(top_one[0].name, "Fast");
}

#[tokio::test]
async fn leaderboard_counts_completed_deliveries() {
    let pool = test_pool().await;
    let cfg = EngineConfig::default();
    let store = store_at(&pool, "Shop", 0.0, 0.1).await;
    let bank = food_bank(&pool, "Bank").await;
    let runner = volunteer(&pool, "Runner").await;
    volunteer(&pool, "Idle").await;

    let pkg = pending_package(&pool, &store).await;
    lifecycle::claim_package(&pool, &cfg, &runner, pkg.id, Point { lat: 0.0, lng: 0.0 })
        .await
        .unwrap();
    lifecycle::confirm_pickup(&pool, &cfg, &runner, pkg.id, &pkg.pickup_pin)
        .await
        .unwrap();
    lifecycle::confirm_delivery(&pool, &cfg, &bank, pkg.id, &pkg.pickup_pin)
        .await
        .unwrap();

    let board = stats::leaderboard(&pool, LeaderboardSort::Deliveries, 10)
        .await
        .unwrap();
    assert_eq!(board[0].name, "Runner");
    assert_eq!(board[0].deliveries_completed, 1);
    assert_eq!(board[1].deliveries_completed, 0);
}

#[tokio::test]
async fn volunteer_stats_track_the_pipeline_counts() {
    let pool = test_pool().await;
    let cfg = EngineConfig::default();
    let store = store_at(&pool, "Shop", 0.0, 0.1).await;
    let bank = food_bank(&pool, "Bank").await;
    let vol = volunteer(&pool, "Vol").await;
    let origin = Point { lat: 0.0, lng: 0.0 };

    // One delivered, one stuck at assigned.
    let done = pending_package(&pool, &store).await;
    let parked = pending_package(&pool, &store).await;
    lifecycle::claim_package(&pool, &cfg, &vol, done.id, origin).await.unwrap();
    lifecycle::claim_package(&pool, &cfg, &vol, parked.id, origin).await.unwrap();
    lifecycle::confirm_pickup(&pool, &cfg, &vol, done.id, &done.pickup_pin)
        .await
        .unwrap();
    lifecycle::confirm_delivery(&pool, &cfg, &bank, done.id, &done.pickup_pin)
        .await
        .unwrap();

    let vol = crate::identity::load_actor(&pool, vol.id).await.unwrap();
    let summary = stats::volunteer_stats(&pool, &vol).await.unwrap();
    assert_eq!(summary.packages_claimed, 2);
    assert_eq!(summary.packages_picked_up, 1);
    assert_eq!(summary.packages_delivered, 1);
    assert_eq!(summary.points, 111);
    assert_eq!(summary.average_points_per_delivery, 111.0);
}

#[tokio::test]
async fn stats_are_volunteer_only() {
    let pool = test_pool().await;
    let store = store_at(&pool, "Shop", 0.0, 0.0).await;
    let err = stats::volunteer_stats(&pool, &store).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn sort_parsing_falls_back_to_points() {
    assert_eq!(LeaderboardSort::parse("deliveries"), LeaderboardSort::Deliveries);
    assert_eq!(LeaderboardSort::parse("hours"), LeaderboardSort::Hours);
    assert_eq!(LeaderboardSort::parse("points"), LeaderboardSort::Points);
    assert_eq!(LeaderboardSort::parse("garbage"), LeaderboardSort::Points);
}
