//! Database schema migrations
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS` in [`super::init`];
//! anything that changes an existing database goes here as a numbered,
//! idempotent migration tracked in `schema_version`.
//!
//! Never modify an existing migration. Add a new one and bump
//! [`CURRENT_SCHEMA_VERSION`].

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database (0 when never migrated)
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: lookup indexes and per-theater uniqueness
///
/// Partial unique indexes ignore soft-deleted rows, so a deleted venue's name
/// can be reused.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: indexes");

    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_users_theater ON users(theater_id)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_venues_name ON venues(theater_id, name) WHERE deleted_at IS NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_departments_code ON departments(theater_id, code) WHERE deleted_at IS NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_items_number ON inventory_items(theater_id, inventory_number) WHERE deleted_at IS NULL",
        "CREATE INDEX IF NOT EXISTS idx_items_status ON inventory_items(theater_id, status)",
        "CREATE INDEX IF NOT EXISTS idx_movements_item ON inventory_movements(item_id, created_at)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_number ON documents(theater_id, number) WHERE number IS NOT NULL AND deleted_at IS NULL",
        "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(theater_id, status)",
        "CREATE INDEX IF NOT EXISTS idx_history_document ON document_history(document_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_attachments_owner ON attachments(owner_type, owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_events_venue ON schedule_events(venue_id, starts_at)",
        "CREATE INDEX IF NOT EXISTS idx_events_theater ON schedule_events(theater_id, starts_at)",
        "CREATE INDEX IF NOT EXISTS idx_participants_user ON schedule_event_participants(user_id)",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}

/// Migration v2: add `last_login_at` to users
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Add last_login_at column to users");

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('users') WHERE name = 'last_login_at'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  last_login_at column already exists - skipping");
        return Ok(());
    }

    sqlx::query("ALTER TABLE users ADD COLUMN last_login_at TEXT")
        .execute(pool)
        .await?;

    info!("  ✓ Added last_login_at column to users table");
    Ok(())
}
