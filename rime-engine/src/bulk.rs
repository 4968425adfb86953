//! Bulk rating import/export
//!
//! CSV rows of `(item_id, rating, classification)` per item kind. This
//! is the explicit override path around the ownership gate: a manual
//! row claims the rating for the human unconditionally, an inferred row
//! hands the item back to the engine for fresh recomputation. Malformed
//! rows are reported and skipped; the rest of the batch continues.

use crate::catalog::{write_with_retry, Catalog, CatalogWriter, WriteOp};
use crate::config::EngineConfig;
use crate::engine::engine_owns;
use crate::Result;
use rime_common::db::{ownership, Classification, ItemKind, OwnershipRecord};
use rime_common::ratings::{RATING_MAX, RATING_MIN};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// One exchange row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRow {
    pub item_id: String,
    pub rating: f32,
    pub classification: Classification,
}

/// A rejected row with the reason it was skipped
#[derive(Debug)]
pub struct RowRejection {
    pub line: u64,
    pub reason: String,
}

/// Outcome of a bulk import
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub applied: usize,
    pub reset: usize,
    pub rejected: Vec<RowRejection>,
}

/// Import rows for one item kind.
pub async fn import(
    path: &Path,
    kind: ItemKind,
    catalog: &Catalog,
    writer: &dyn CatalogWriter,
    pool: &SqlitePool,
    config: &EngineConfig,
    library_id: i64,
) -> Result<ImportSummary> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut summary = ImportSummary::default();
    let retries = config.catalog.write_retries;
    let headers = reader.headers()?.clone();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                summary.rejected.push(RowRejection {
                    line,
                    reason: format!("malformed row: {e}"),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: BulkRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                summary.rejected.push(RowRejection {
                    line,
                    reason: format!("malformed row: {e}"),
                });
                continue;
            }
        };

        if !(RATING_MIN..=RATING_MAX).contains(&row.rating) || !row.rating.is_finite() {
            summary.rejected.push(RowRejection {
                line,
                reason: format!("rating {} outside valid range", row.rating),
            });
            continue;
        }

        let exists = match kind {
            ItemKind::Artist => catalog.artist(&row.item_id).is_some(),
            ItemKind::Album => catalog.album(&row.item_id).is_some(),
            ItemKind::Track => catalog.track(&row.item_id).is_some(),
        };
        if !exists {
            summary.rejected.push(RowRejection {
                line,
                reason: format!("identifier not found: {}", row.item_id),
            });
            continue;
        }

        match row.classification {
            Classification::Manual => {
                // Explicit human claim: write the value and pin the
                // classification, bypassing the epsilon gate entirely.
                if !config.dry_run {
                    write_with_retry(
                        writer,
                        retries,
                        WriteOp::Rating { id: &row.item_id, kind, value: row.rating },
                    )
                    .await?;
                    if let Some(tag) = config.marker() {
                        write_with_retry(
                            writer,
                            retries,
                            WriteOp::RemoveTag { id: &row.item_id, kind, tag },
                        )
                        .await?;
                    }
                    ownership::mark_manual(pool, library_id, &row.item_id, kind).await?;
                }
                summary.applied += 1;
            }
            Classification::Inferred => {
                // Hand the item back to the engine: forget any manual
                // claim so the next run recomputes it fresh.
                if !config.dry_run {
                    ownership::reset(pool, library_id, &row.item_id).await?;
                }
                summary.reset += 1;
            }
            Classification::NeverTouched => {
                summary.rejected.push(RowRejection {
                    line,
                    reason: "classification must be 'manual' or 'inferred'".to_string(),
                });
            }
        }
    }

    for rejection in &summary.rejected {
        warn!(line = rejection.line, reason = %rejection.reason, "Bulk row rejected");
    }
    info!(
        kind = kind.as_str(),
        applied = summary.applied,
        reset = summary.reset,
        rejected = summary.rejected.len(),
        dry_run = config.dry_run,
        "Bulk import finished"
    );
    Ok(summary)
}

/// Export every rated item of one kind with its ownership classification.
pub async fn export(
    path: &Path,
    kind: ItemKind,
    catalog: &Catalog,
    state: &HashMap<String, OwnershipRecord>,
) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0usize;

    let rows: Vec<(&str, f32)> = match kind {
        ItemKind::Artist => catalog
            .artists()
            .iter()
            .filter_map(|a| a.rating.filter(|r| *r > 0.0).map(|r| (a.id.as_str(), r)))
            .collect(),
        ItemKind::Album => catalog
            .albums()
            .iter()
            .filter_map(|a| a.rating.filter(|r| *r > 0.0).map(|r| (a.id.as_str(), r)))
            .collect(),
        ItemKind::Track => catalog
            .tracks()
            .iter()
            .filter_map(|t| t.rating.filter(|r| *r > 0.0).map(|r| (t.id.as_str(), r)))
            .collect(),
    };

    for (id, rating) in rows {
        let classification = if engine_owns(state.get(id)) {
            Classification::Inferred
        } else {
            Classification::Manual
        };
        writer.serialize(BulkRow {
            item_id: id.to_string(),
            rating,
            classification,
        })?;
        count += 1;
    }
    writer.flush()?;

    info!(kind = kind.as_str(), rows = count, path = %path.display(), "Bulk export finished");
    Ok(count)
}
