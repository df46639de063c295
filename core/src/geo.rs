//! Great-circle distance and the scoring derived from it.
//!
//! Distance feeds two policies:
//!
//! * [`points_for_distance`] — `max(5, floor(10 × km))`. Every delivery nets
//!   at least the 5-point floor; farther trips earn proportionally more.
//! * [`estimated_hours`] — `km / avg_speed_kmh`, rounded to 2 decimals.
//!   The default speed assumes a volunteer on a bike or in slow city traffic.

use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default average travel speed for hour estimates.
pub const DEFAULT_AVG_SPEED_KMH: f64 = 15.0;

/// A (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

/// Haversine distance between two points, in kilometers.
///
/// Identical points yield exactly 0.
pub fn distance_km(a: Point, b: Point) -> f64 {
    let (lat1, lng1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lng2) = (b.lat.to_radians(), b.lng.to_radians());

    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);

    // sqrt(h) can drift a hair above 1.0 for antipodal pairs; clamp before asin.
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Reward points for a delivery over `km`: `max(5, floor(10 × km))`.
///
/// Monotonically non-decreasing in distance.
pub fn points_for_distance(km: f64) -> i64 {
    ((10.0 * km).floor() as i64).max(5)
}

/// Estimated travel time in hours at `avg_speed_kmh`, rounded to 2 decimals.
pub fn estimated_hours(km: f64, avg_speed_kmh: f64) -> f64 {
    ((km / avg_speed_kmh) * 100.0).round() / 100.0
}
