//! Shadow-state database initialization
//!
//! Creates the state database on first run and brings an existing one up
//! to the current schema. All statements are idempotent so the function
//! is safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version
const SCHEMA_VERSION: i64 = 1;

/// Initialize the shadow-state database connection and create tables if needed
pub async fn init_state_db(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new state database: {}", db_path.display());
    } else {
        info!("Opened existing state database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL keeps the incremental per-commit writes cheap
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all shadow-state tables (idempotent, also used by tests
/// against in-memory databases)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS libraries (
            library_id INTEGER PRIMARY KEY AUTOINCREMENT,
            library_name TEXT NOT NULL UNIQUE,
            library_uuid TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ownership (
            library_id INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('artist', 'album', 'track')),
            inferred_rating REAL,
            classification TEXT NOT NULL
                CHECK (classification IN ('never', 'inferred', 'manual')),
            twin_group TEXT,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (library_id, item_id),
            FOREIGN KEY (library_id) REFERENCES libraries(library_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            library_id INTEGER NOT NULL,
            phase TEXT NOT NULL,
            last_key TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (library_id, phase),
            FOREIGN KEY (library_id) REFERENCES libraries(library_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Stamp the schema version on first creation
    let existing: Option<i64> = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
        .fetch_optional(pool)
        .await?;
    if existing.is_none() {
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(SCHEMA_VERSION)
            .execute(pool)
            .await?;
    }

    Ok(())
}
