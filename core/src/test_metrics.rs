//! Rollup tests: one day of activity folds into stable, re-runnable rows.

use crate::lifecycle::{self, EngineConfig};
use crate::metrics;
use crate::test_support::*;
use crate::types::PackageStatus;
use crate::Point;

#[tokio::test]
async fn daily_rollup_folds_logged_and_delivered_weight() {
    let pool = test_pool().await;
    let cfg = EngineConfig::default();
    let store = store_at(&pool, "Shop", 0.0, 0.1).await;
    let vol = volunteer(&pool, "Vol").await;
    let bank = food_bank(&pool, "Bank").await;

    // Two produce packages logged today; only one travels the full pipeline.
    let delivered = lifecycle::create_package(&pool, &store, new_package(5.0, "produce"))
        .await
        .unwrap();
    lifecycle::create_package(&pool, &store, new_package(3.0, "produce"))
        .await
        .unwrap();
    lifecycle::create_package(&pool, &store, new_package(2.0, "bakery"))
        .await
        .unwrap();

    let claimed = lifecycle::claim_package(
        &pool,
        &cfg,
        &vol,
        delivered.id,
        Point { lat: 0.0, lng: 0.0 },
    )
    .await
    .unwrap();
    lifecycle::confirm_pickup(&pool, &cfg, &vol, delivered.id, &delivered.pickup_pin)
        .await
        .unwrap();
    let receipt = lifecycle::confirm_delivery(&pool, &cfg, &bank, delivered.id, &delivered.pickup_pin)
        .await
        .unwrap();
    assert_eq!(receipt.package.status, PackageStatus::Completed);

    let date = receipt
        .package
        .delivered_at
        .expect("delivered_at set")
        .date_naive();
    let rows_written = metrics::materialize_daily(&pool, date).await.unwrap();
    assert_eq!(rows_written, 2);

    let rows = metrics::daily_metrics(&pool, date).await.unwrap();
    assert_eq!(rows.len(), 2);

    let produce = rows.iter().find(|r| r.category == "produce").unwrap();
    assert_eq!(produce.store_id, store.id);
    assert!((produce.kg_logged - 8.0).abs() < 1e-9);
    assert!((produce.kg_delivered - 5.0).abs() < 1e-9);
    assert_eq!(produce.points_awarded, claimed.points_value);
    assert_eq!(produce.packages_completed, 1);

    let bakery = rows.iter().find(|r| r.category == "bakery").unwrap();
    assert!((bakery.kg_logged - 2.0).abs() < 1e-9);
    assert_eq!(bakery.kg_delivered, 0.0);
    assert_eq!(bakery.packages_completed, 0);
}

#[tokio::test]
async fn rerunning_a_rollup_is_idempotent() {
    let pool = test_pool().await;
    let cfg = EngineConfig::default();
    let store = store_at(&pool, "Shop", 0.0, 0.1).await;
    let vol = volunteer(&pool, "Vol").await;
    let bank = food_bank(&pool, "Bank").await;

    let pkg = pending_package(&pool, &store).await;
    lifecycle::claim_package(&pool, &cfg, &vol, pkg.id, Point { lat: 0.0, lng: 0.0 })
        .await
        .unwrap();
    lifecycle::confirm_pickup(&pool, &cfg, &vol, pkg.id, &pkg.pickup_pin)
        .await
        .unwrap();
    let receipt = lifecycle::confirm_delivery(&pool, &cfg, &bank, pkg.id, &pkg.pickup_pin)
        .await
        .unwrap();

    let date = receipt.package.delivered_at.unwrap().date_naive();
    metrics::materialize_daily(&pool, date).await.unwrap();
    let first = metrics::daily_metrics(&pool, date).await.unwrap();

    metrics::materialize_daily(&pool, date).await.unwrap();
    let second = metrics::daily_metrics(&pool, date).await.unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.kg_logged, b.kg_logged);
        assert_eq!(a.kg_delivered, b.kg_delivered);
        assert_eq!(a.points_awarded, b.points_awarded);
        assert_eq!(a.packages_completed, b.packages_completed);
    }
}

#[tokio::test]
async fn empty_days_roll_up_to_nothing() {
    let pool = test_pool().await;
    let date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    assert_eq!(metrics::materialize_daily(&pool, date).await.unwrap(), 0);
    assert!(metrics::daily_metrics(&pool, date).await.unwrap().is_empty());
}
