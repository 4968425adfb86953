//! Ownership record persistence
//!
//! One row per item the engine has touched or classified. Rows are read
//! in full at phase start and written incrementally as items commit.

use crate::db::models::{Classification, ItemKind, OwnershipRecord};
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

/// Load every ownership record for a library, keyed by item id.
pub async fn load_all(
    pool: &SqlitePool,
    library_id: i64,
) -> Result<HashMap<String, OwnershipRecord>> {
    let rows = sqlx::query_as::<_, (String, String, Option<f32>, String, Option<String>)>(
        r#"
        SELECT item_id, kind, inferred_rating, classification, twin_group
        FROM ownership
        WHERE library_id = ?
        "#,
    )
    .bind(library_id)
    .fetch_all(pool)
    .await?;

    let mut records = HashMap::with_capacity(rows.len());
    for (item_id, kind, inferred_rating, classification, twin_group) in rows {
        let kind = ItemKind::parse(&kind)
            .ok_or_else(|| Error::Internal(format!("unknown item kind in state: {kind}")))?;
        let classification = Classification::parse(&classification).ok_or_else(|| {
            Error::Internal(format!("unknown classification in state: {classification}"))
        })?;
        let twin_group = match twin_group {
            Some(s) => Some(
                Uuid::parse_str(&s)
                    .map_err(|e| Error::Internal(format!("bad twin group id in state: {e}")))?,
            ),
            None => None,
        };
        records.insert(
            item_id.clone(),
            OwnershipRecord {
                item_id,
                kind,
                inferred_rating,
                classification,
                twin_group,
            },
        );
    }
    Ok(records)
}

/// Record an inferred value the engine just wrote.
pub async fn record_inferred(
    pool: &SqlitePool,
    library_id: i64,
    item_id: &str,
    kind: ItemKind,
    value: f32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ownership (library_id, item_id, kind, inferred_rating, classification)
        VALUES (?, ?, ?, ?, 'inferred')
        ON CONFLICT(library_id, item_id) DO UPDATE SET
            kind = excluded.kind,
            inferred_rating = excluded.inferred_rating,
            classification = 'inferred',
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(library_id)
    .bind(item_id)
    .bind(kind.as_str())
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Classify an item as manually rated. The last inferred value, if any,
/// is kept for audit; the classification is what blocks future writes.
pub async fn mark_manual(
    pool: &SqlitePool,
    library_id: i64,
    item_id: &str,
    kind: ItemKind,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ownership (library_id, item_id, kind, inferred_rating, classification)
        VALUES (?, ?, ?, NULL, 'manual')
        ON CONFLICT(library_id, item_id) DO UPDATE SET
            kind = excluded.kind,
            classification = 'manual',
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(library_id)
    .bind(item_id)
    .bind(kind.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove an item's record entirely, returning it to never-touched.
pub async fn reset(pool: &SqlitePool, library_id: i64, item_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM ownership WHERE library_id = ? AND item_id = ?")
        .bind(library_id)
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Tag an item with its twin group for this run.
pub async fn set_twin_group(
    pool: &SqlitePool,
    library_id: i64,
    item_id: &str,
    kind: ItemKind,
    group: Uuid,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ownership (library_id, item_id, kind, inferred_rating, classification, twin_group)
        VALUES (?, ?, ?, NULL, 'never', ?)
        ON CONFLICT(library_id, item_id) DO UPDATE SET
            twin_group = excluded.twin_group,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(library_id)
    .bind(item_id)
    .bind(kind.as_str())
    .bind(group.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop all twin group tags. Twin groups are ephemeral per run; stale
/// membership from a previous catalog state must not survive.
pub async fn clear_twin_groups(pool: &SqlitePool, library_id: i64) -> Result<()> {
    sqlx::query("UPDATE ownership SET twin_group = NULL WHERE library_id = ?")
        .bind(library_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Coverage counts for reporting: (inferred, manual, twin-linked).
pub async fn coverage_counts(pool: &SqlitePool, library_id: i64) -> Result<(i64, i64, i64)> {
    let inferred: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ownership WHERE library_id = ? AND classification = 'inferred'",
    )
    .bind(library_id)
    .fetch_one(pool)
    .await?;

    let manual: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ownership WHERE library_id = ? AND classification = 'manual'",
    )
    .bind(library_id)
    .fetch_one(pool)
    .await?;

    let twin_linked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ownership WHERE library_id = ? AND twin_group IS NOT NULL",
    )
    .bind(library_id)
    .fetch_one(pool)
    .await?;

    Ok((inferred, manual, twin_linked))
}
