//! Shadow-state reconstruction
//!
//! When the state database is lost, the marker tags the engine left on
//! every item it rated allow an approximate rebuild: any tagged item
//! still carrying a rating is assumed to hold the engine's last write.
//! Manual edits made after the last tagged write cannot be recovered -
//! that accuracy loss is documented behavior, not an error.

use crate::catalog::CatalogReader;
use crate::{EngineError, Result};
use rime_common::db::{ownership, ItemKind};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{info, warn};

/// Outcome of a reconstruction pass
#[derive(Debug, Default)]
pub struct RecoverySummary {
    pub restored: usize,
    pub already_known: usize,
}

/// Rebuild ownership records from marker tags.
///
/// Requires tagging to have been enabled in the runs that produced the
/// ratings; with no marker tag configured there is nothing to scan.
pub async fn reconstruct(
    reader: &dyn CatalogReader,
    pool: &SqlitePool,
    library_id: i64,
    marker: Option<&str>,
    dry_run: bool,
) -> Result<RecoverySummary> {
    let Some(tag) = marker else {
        return Err(EngineError::config(
            "state reconstruction requires a marker tag; none is configured",
        ));
    };

    warn!(
        "Reconstructing shadow state from marker tags; manual edits made \
         after the last tagged write will be misclassified as inferred"
    );

    let existing = ownership::load_all(pool, library_id).await?;
    let mut summary = RecoverySummary::default();

    for kind in [ItemKind::Artist, ItemKind::Album, ItemKind::Track] {
        let tagged = reader.fetch_tagged(kind, tag).await?;
        info!(kind = kind.as_str(), count = tagged.len(), "Scanned tagged items");

        for item in tagged {
            let Some(rating) = item.rating.filter(|r| *r > 0.0) else {
                continue;
            };
            if existing.contains_key(&item.id) {
                summary.already_known += 1;
                continue;
            }
            if !dry_run {
                ownership::record_inferred(pool, library_id, &item.id, kind, rating).await?;
            }
            summary.restored += 1;
        }
    }

    info!(
        restored = summary.restored,
        already_known = summary.already_known,
        dry_run,
        "Reconstruction finished"
    );
    Ok(summary)
}

/// True when the shadow state holds no records for this library -
/// the trigger for offering the recovery path.
pub async fn state_is_empty(pool: &SqlitePool, library_id: i64) -> Result<bool> {
    let state: HashMap<_, _> = ownership::load_all(pool, library_id).await?;
    Ok(state.is_empty())
}
