//! State verification
//!
//! Compares every shadow record against the live catalog and reports
//! where reality has diverged: overrides (a human changed a value the
//! engine wrote) and orphans (the item no longer exists). Read-only;
//! classification updates happen in the next processing run.

use crate::catalog::CatalogReader;
use crate::engine::ownership::MANUAL_NOISE_FLOOR;
use crate::Result;
use rime_common::db::{ownership, Classification, ItemKind};
use sqlx::SqlitePool;
use tracing::info;

/// Outcome of a verification pass
#[derive(Debug, Default)]
pub struct VerifySummary {
    pub checked: usize,
    pub overrides: usize,
    pub orphaned: usize,
}

pub async fn verify(
    reader: &dyn CatalogReader,
    pool: &SqlitePool,
    library_id: i64,
) -> Result<VerifySummary> {
    let catalog = reader.fetch_catalog().await?;
    let state = ownership::load_all(pool, library_id).await?;

    let mut summary = VerifySummary::default();

    for record in state.values() {
        let Some(stored) = record.inferred_rating else { continue };
        if record.classification != Classification::Inferred {
            continue;
        }
        summary.checked += 1;

        let current = match record.kind {
            ItemKind::Artist => catalog.artist(&record.item_id).map(|a| a.rating),
            ItemKind::Album => catalog.album(&record.item_id).map(|a| a.rating),
            ItemKind::Track => catalog.track(&record.item_id).map(|t| t.rating),
        };

        match current {
            None => {
                info!(id = %record.item_id, "Orphaned state record: item missing from catalog");
                summary.orphaned += 1;
            }
            Some(current) => {
                let current = current.unwrap_or(0.0);
                if (current - stored).abs() > MANUAL_NOISE_FLOOR {
                    info!(
                        id = %record.item_id,
                        expected = stored,
                        found = current,
                        "Override: catalog value differs from last inferred write"
                    );
                    summary.overrides += 1;
                }
            }
        }
    }

    info!(
        checked = summary.checked,
        overrides = summary.overrides,
        orphaned = summary.orphaned,
        "Verification finished"
    );
    Ok(summary)
}
