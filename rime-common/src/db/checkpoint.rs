//! Per-phase run checkpoints
//!
//! A checkpoint is the ordering key of the last fully committed item in
//! a phase. It only advances after the corresponding external write (or
//! write-suppression decision) is confirmed, so resume never replays a
//! committed item.

use crate::Result;
use sqlx::SqlitePool;

/// Read the last committed ordering key for a phase, if any.
pub async fn last_key(pool: &SqlitePool, library_id: i64, phase: &str) -> Result<Option<String>> {
    let key: Option<String> = sqlx::query_scalar(
        "SELECT last_key FROM checkpoints WHERE library_id = ? AND phase = ?",
    )
    .bind(library_id)
    .bind(phase)
    .fetch_optional(pool)
    .await?;
    Ok(key)
}

/// Advance the checkpoint to a newly committed key.
pub async fn advance(pool: &SqlitePool, library_id: i64, phase: &str, key: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO checkpoints (library_id, phase, last_key)
        VALUES (?, ?, ?)
        ON CONFLICT(library_id, phase) DO UPDATE SET
            last_key = excluded.last_key,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(library_id)
    .bind(phase)
    .bind(key)
    .execute(pool)
    .await?;
    Ok(())
}

/// Clear a phase's checkpoint on completion.
pub async fn clear(pool: &SqlitePool, library_id: i64, phase: &str) -> Result<()> {
    sqlx::query("DELETE FROM checkpoints WHERE library_id = ? AND phase = ?")
        .bind(library_id)
        .bind(phase)
        .execute(pool)
        .await?;
    Ok(())
}
