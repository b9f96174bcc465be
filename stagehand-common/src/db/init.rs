//! Database initialization
//!
//! Opens (or creates) the SQLite database, creates every table idempotently,
//! runs versioned migrations and seeds default settings. Safe to call on
//! every start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Per-connection pragmas
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    crate::db::migrations::run_migrations(&pool).await?;

    crate::db::settings::init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_theaters_table(pool).await?;
    create_users_table(pool).await?;
    create_venues_table(pool).await?;
    create_departments_table(pool).await?;

    // Inventory
    create_inventory_categories_table(pool).await?;
    create_inventory_items_table(pool).await?;

    // Performances must exist before movements/documents reference them
    create_performances_table(pool).await?;
    create_performance_staff_table(pool).await?;
    create_performance_items_table(pool).await?;
    create_readiness_tasks_table(pool).await?;
    create_inventory_movements_table(pool).await?;

    // Documents
    create_documents_table(pool).await?;
    create_document_history_table(pool).await?;
    create_attachments_table(pool).await?;

    // Scheduling
    create_schedule_events_table(pool).await?;
    create_schedule_event_participants_table(pool).await?;
    create_schedule_exceptions_table(pool).await?;

    Ok(())
}

async fn execute(pool: &SqlitePool, sql: &str) -> Result<()> {
    sqlx::query(sql).execute(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await
}

async fn create_theaters_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS theaters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            city TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            username TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            email TEXT,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('ADMIN', 'MANAGER', 'STAFF', 'VIEWER')),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .await
}

async fn create_venues_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS venues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            name TEXT NOT NULL,
            venue_type TEXT NOT NULL,
            capacity INTEGER NOT NULL DEFAULT 0 CHECK (capacity >= 0),
            address TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .await
}

async fn create_departments_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            head_user_id INTEGER REFERENCES users(id),
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .await
}

async fn create_inventory_categories_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS inventory_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES inventory_categories(id),
            created_at TEXT NOT NULL,
            UNIQUE (theater_id, name)
        )
        "#,
    )
    .await
}

async fn create_inventory_items_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS inventory_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            inventory_number TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            category_id INTEGER REFERENCES inventory_categories(id),
            department_id INTEGER REFERENCES departments(id),
            venue_id INTEGER REFERENCES venues(id),
            quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 0),
            unit TEXT NOT NULL DEFAULT 'pcs',
            unit_cost REAL NOT NULL DEFAULT 0 CHECK (unit_cost >= 0),
            status TEXT NOT NULL DEFAULT 'AVAILABLE',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .await
}

async fn create_inventory_movements_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS inventory_movements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL REFERENCES inventory_items(id),
            movement_type TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            from_venue_id INTEGER REFERENCES venues(id),
            to_venue_id INTEGER REFERENCES venues(id),
            from_status TEXT NOT NULL,
            to_status TEXT NOT NULL,
            performance_id INTEGER REFERENCES performances(id),
            comment TEXT,
            created_by INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .await
}

async fn create_performances_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS performances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            title TEXT NOT NULL,
            subtitle TEXT,
            author TEXT,
            director TEXT,
            genre TEXT,
            age_rating TEXT,
            duration_minutes INTEGER,
            intermissions INTEGER NOT NULL DEFAULT 0,
            premiere_date TEXT,
            status TEXT NOT NULL DEFAULT 'PREPARATION',
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .await
}

async fn create_performance_staff_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS performance_staff (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            performance_id INTEGER NOT NULL REFERENCES performances(id) ON DELETE CASCADE,
            user_id INTEGER REFERENCES users(id),
            person_name TEXT NOT NULL,
            kind TEXT NOT NULL,
            role_name TEXT NOT NULL,
            department_id INTEGER REFERENCES departments(id),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .await
}

async fn create_performance_items_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS performance_items (
            performance_id INTEGER NOT NULL REFERENCES performances(id) ON DELETE CASCADE,
            item_id INTEGER NOT NULL REFERENCES inventory_items(id),
            quantity INTEGER NOT NULL CHECK (quantity >= 1),
            note TEXT,
            PRIMARY KEY (performance_id, item_id)
        )
        "#,
    )
    .await
}

async fn create_readiness_tasks_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS readiness_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            performance_id INTEGER NOT NULL REFERENCES performances(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            department_id INTEGER REFERENCES departments(id),
            due_date TEXT,
            is_done INTEGER NOT NULL DEFAULT 0,
            done_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .await
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            title TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            number TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            author_id INTEGER NOT NULL REFERENCES users(id),
            department_id INTEGER REFERENCES departments(id),
            performance_id INTEGER REFERENCES performances(id),
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .await
}

async fn create_document_history_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS document_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id INTEGER NOT NULL REFERENCES documents(id),
            from_status TEXT,
            to_status TEXT NOT NULL,
            actor_id INTEGER NOT NULL REFERENCES users(id),
            comment TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .await
}

async fn create_attachments_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS attachments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            owner_type TEXT NOT NULL,
            owner_id INTEGER NOT NULL,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            sha256 TEXT NOT NULL,
            storage_key TEXT NOT NULL UNIQUE,
            uploaded_by INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .await
}

async fn create_schedule_events_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS schedule_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            theater_id INTEGER NOT NULL REFERENCES theaters(id),
            title TEXT NOT NULL,
            event_type TEXT NOT NULL,
            venue_id INTEGER NOT NULL REFERENCES venues(id),
            performance_id INTEGER REFERENCES performances(id),
            starts_at TEXT NOT NULL,
            ends_at TEXT NOT NULL,
            recurrence_rule TEXT,
            status TEXT NOT NULL DEFAULT 'PLANNED',
            notes TEXT,
            created_by INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .await
}

async fn create_schedule_event_participants_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS schedule_event_participants (
            event_id INTEGER NOT NULL REFERENCES schedule_events(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id),
            PRIMARY KEY (event_id, user_id)
        )
        "#,
    )
    .await
}

async fn create_schedule_exceptions_table(pool: &SqlitePool) -> Result<()> {
    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS schedule_exceptions (
            event_id INTEGER NOT NULL REFERENCES schedule_events(id) ON DELETE CASCADE,
            occurrence_start TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (event_id, occurrence_start)
        )
        "#,
    )
    .await
}
