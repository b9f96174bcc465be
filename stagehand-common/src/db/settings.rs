//! Runtime settings stored in the `settings` table
//!
//! Database-first: values missing from the table are initialized with the
//! built-in defaults on startup and read back from there.

use crate::{Error, Result};
use rand::Rng;
use sqlx::SqlitePool;
use tracing::info;

/// Key of the generated JWT signing secret
pub const JWT_SECRET_KEY: &str = "jwt_secret";

/// Days ahead an unbounded recurring event is checked for conflicts
pub const SCHEDULE_HORIZON_DAYS_KEY: &str = "schedule_horizon_days";

/// Longest allowed single occurrence, in hours
pub const MAX_EVENT_HOURS_KEY: &str = "max_event_hours";

/// Widest calendar/analytics window, in days
pub const MAX_WINDOW_DAYS_KEY: &str = "max_window_days";

/// Seed default settings (existing values are kept)
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, SCHEDULE_HORIZON_DAYS_KEY, "366").await?;
    ensure_setting(pool, MAX_EVENT_HOURS_KEY, "24").await?;
    ensure_setting(pool, MAX_WINDOW_DAYS_KEY, "366").await?;
    Ok(())
}

/// Insert a setting only if absent
pub async fn ensure_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Read an integer setting, falling back to `default` when missing
pub async fn get_i64_setting(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    match get_setting(pool, key).await? {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::Config(format!("Setting '{}' is not an integer: {}", key, e))),
        None => Ok(default),
    }
}

/// Load the JWT signing secret, generating and storing one on first use
pub async fn load_or_init_jwt_secret(pool: &SqlitePool) -> Result<String> {
    if let Some(secret) = get_setting(pool, JWT_SECRET_KEY).await? {
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    let bytes: [u8; 32] = rand::thread_rng().gen();
    let secret = hex::encode(bytes);

    // INSERT OR IGNORE so a concurrent first start keeps a single secret
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(JWT_SECRET_KEY)
        .bind(&secret)
        .execute(pool)
        .await?;

    info!("Generated new JWT signing secret");

    get_setting(pool, JWT_SECRET_KEY)
        .await?
        .ok_or_else(|| Error::Internal("JWT secret missing after initialization".to_string()))
}

/// Runtime settings used by the scheduling module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub schedule_horizon_days: i64,
    pub max_event_hours: i64,
    pub max_window_days: i64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            schedule_horizon_days: 366,
            max_event_hours: 24,
            max_window_days: 366,
        }
    }
}

impl RuntimeSettings {
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            schedule_horizon_days: get_i64_setting(
                pool,
                SCHEDULE_HORIZON_DAYS_KEY,
                defaults.schedule_horizon_days,
            )
            .await?,
            max_event_hours: get_i64_setting(pool, MAX_EVENT_HOURS_KEY, defaults.max_event_hours)
                .await?,
            max_window_days: get_i64_setting(pool, MAX_WINDOW_DAYS_KEY, defaults.max_window_days)
                .await?,
        };

        if settings.schedule_horizon_days <= 0
            || settings.max_event_hours <= 0
            || settings.max_window_days <= 0
        {
            return Err(Error::Config(format!(
                "Scheduling settings must be positive: {:?}",
                settings
            )));
        }

        info!("Loaded runtime settings from database: {:?}", settings);
        Ok(settings)
    }
}
