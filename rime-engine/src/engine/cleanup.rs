//! Cleanup / undo
//!
//! Reverts the engine's effects on the catalog. Every shadow record
//! whose live value still matches what the engine wrote gets its rating
//! cleared and its marker tag removed; items a human has since taken
//! over are left alone. A second sweep then walks everything still
//! bearing the marker tag and clears stragglers whose rating is not on
//! the manual half-star grid (inferred values almost never are).

use crate::catalog::{write_with_retry, CatalogReader, CatalogWriter, WriteOp};
use crate::config::EngineConfig;
use crate::Result;
use rime_common::db::{ownership, ItemKind};
use rime_common::ratings::on_half_star_grid;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Values within this distance of the stored inferred value are still
/// considered the engine's own write. Tighter than the run-time epsilon
/// on purpose: undo must not delete a rating a human has nudged.
const UNDO_TOLERANCE: f32 = 0.02;

/// Outcome of a cleanup pass
#[derive(Debug, Default)]
pub struct CleanupSummary {
    pub reverted: usize,
    pub kept_manual: usize,
    pub swept_tags: usize,
    pub interrupted: bool,
}

pub async fn cleanup(
    reader: &dyn CatalogReader,
    writer: &dyn CatalogWriter,
    pool: &SqlitePool,
    config: &EngineConfig,
    library_id: i64,
    interrupt: Arc<AtomicBool>,
) -> Result<CleanupSummary> {
    let catalog = reader.fetch_catalog().await?;
    let state = ownership::load_all(pool, library_id).await?;
    let retries = config.catalog.write_retries;

    let mut summary = CleanupSummary::default();
    let mut batch: u32 = 0;

    // Deterministic order keeps repeated partial undo runs convergent
    let mut records: Vec<_> = state.values().collect();
    records.sort_by(|a, b| a.item_id.cmp(&b.item_id));

    info!(records = records.len(), "Undoing engine writes via shadow state");

    for record in records {
        let Some(stored) = record.inferred_rating else {
            // Manual-only records carry no engine write to undo
            if !config.dry_run {
                ownership::reset(pool, library_id, &record.item_id).await?;
            }
            continue;
        };

        let current = match record.kind {
            ItemKind::Artist => catalog.artist(&record.item_id).and_then(|a| a.rating),
            ItemKind::Album => catalog.album(&record.item_id).and_then(|a| a.rating),
            ItemKind::Track => catalog.track(&record.item_id).and_then(|t| t.rating),
        };

        let Some(current) = current else {
            // Rating already gone; just drop the record
            if !config.dry_run {
                ownership::reset(pool, library_id, &record.item_id).await?;
            }
            continue;
        };

        if (current - stored).abs() >= UNDO_TOLERANCE {
            debug!(id = %record.item_id, "Value no longer ours; keeping");
            summary.kept_manual += 1;
            continue;
        }

        if config.dry_run {
            info!(id = %record.item_id, "[dry run] would clear rating");
        } else {
            let id = record.item_id.as_str();
            write_with_retry(writer, retries, WriteOp::ClearRating { id, kind: record.kind })
                .await?;
            if let Some(tag) = config.marker() {
                write_with_retry(
                    writer,
                    retries,
                    WriteOp::RemoveTag { id, kind: record.kind, tag },
                )
                .await?;
            }
            ownership::reset(pool, library_id, id).await?;
        }
        summary.reverted += 1;

        batch += 1;
        if batch >= config.pacing.batch_size {
            tokio::time::sleep(Duration::from_secs(config.pacing.pause_seconds)).await;
            batch = 0;
        }

        if interrupt.load(Ordering::Relaxed) {
            warn!("Interrupt honored during undo; remaining records untouched");
            summary.interrupted = true;
            return Ok(summary);
        }
    }

    // Safety sweep: the shadow state may have missed items (e.g. after
    // a partial reconstruction), but the marker tag does not lie.
    if let Some(tag) = config.marker() {
        info!(tag, "Safety sweep for remaining marker tags");
        for kind in [ItemKind::Artist, ItemKind::Album, ItemKind::Track] {
            let tagged = reader.fetch_tagged(kind, tag).await?;
            for item in tagged {
                if config.dry_run {
                    info!(id = %item.id, "[dry run] would sweep marker tag");
                    summary.swept_tags += 1;
                    continue;
                }
                let off_grid = item.rating.map(|r| !on_half_star_grid(r)).unwrap_or(false);
                if off_grid {
                    write_with_retry(
                        writer,
                        retries,
                        WriteOp::ClearRating { id: &item.id, kind },
                    )
                    .await?;
                }
                write_with_retry(
                    writer,
                    retries,
                    WriteOp::RemoveTag { id: &item.id, kind, tag },
                )
                .await?;
                summary.swept_tags += 1;

                batch += 1;
                if batch >= config.pacing.batch_size {
                    tokio::time::sleep(Duration::from_secs(config.pacing.pause_seconds)).await;
                    batch = 0;
                }

                if interrupt.load(Ordering::Relaxed) {
                    warn!("Interrupt honored during safety sweep");
                    summary.interrupted = true;
                    return Ok(summary);
                }
            }
        }
    }

    info!(
        reverted = summary.reverted,
        kept_manual = summary.kept_manual,
        swept_tags = summary.swept_tags,
        "Cleanup finished"
    );
    Ok(summary)
}
