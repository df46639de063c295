//! Application configuration loaded from environment variables.

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path or URL of the SQLite database file.
    pub database_url: String,
    /// Port for the REST API server.
    pub api_port: u16,
    /// Average travel speed used for hour estimates.
    pub avg_speed_kmh: f64,
    /// Failed PIN entries tolerated per package per actor; 0 disables the limit.
    pub pin_max_attempts: u32,
    /// Sliding window for the PIN attempt limit, in seconds.
    pub pin_window_secs: i64,
    /// Seed demo actors, rewards, and packages on startup.
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_or("DATABASE_URL", "sqlite:./replate.db"),
            api_port: env_or("API_PORT", "3000")
                .parse()
                .context("invalid API_PORT")?,
            avg_speed_kmh: env_or("AVG_SPEED_KMH", "15")
                .parse()
                .context("invalid AVG_SPEED_KMH")?,
            pin_max_attempts: env_or("PIN_MAX_ATTEMPTS", "0")
                .parse()
                .context("invalid PIN_MAX_ATTEMPTS")?,
            pin_window_secs: env_or("PIN_ATTEMPT_WINDOW_SECS", "300")
                .parse()
                .context("invalid PIN_ATTEMPT_WINDOW_SECS")?,
            seed_demo: env_or("SEED_DEMO", "0") == "1",
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.avg_speed_kmh <= 0.0 {
            return Err(anyhow!("AVG_SPEED_KMH must be positive"));
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
