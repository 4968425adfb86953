//! Catalog reader/writer contracts
//!
//! The engine never talks to the external store directly; it computes
//! and reconciles ratings behind these two narrow traits. Production
//! runs use the HTTP implementation; tests run against an in-memory
//! catalog.

use crate::catalog::Catalog;
use crate::{EngineError, Result};
use async_trait::async_trait;
use rime_common::db::ItemKind;
use std::time::Duration;
use tracing::warn;

/// Stable identity of one library in the external store.
///
/// The stamp is the consistency anchor for the shadow state: a state
/// database built against one library must not be replayed against
/// another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryIdentity {
    pub name: String,
    pub stamp: String,
}

/// A tagged item as returned by marker-tag scans (state reconstruction
/// and the cleanup safety sweep).
#[derive(Debug, Clone)]
pub struct TaggedItem {
    pub id: String,
    pub kind: ItemKind,
    pub rating: Option<f32>,
}

/// Read access to one library of the external catalog
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// The library's stable identity stamp
    async fn library_identity(&self) -> Result<LibraryIdentity>;

    /// Full snapshot of the library: artists, albums, tracks with
    /// current ratings, durations, critic ratings, and tags
    async fn fetch_catalog(&self) -> Result<Catalog>;

    /// All items of one kind bearing a marker tag
    async fn fetch_tagged(&self, kind: ItemKind, tag: &str) -> Result<Vec<TaggedItem>>;
}

/// Write access to the external catalog.
///
/// Implementations must be idempotent under retry of the same value;
/// the engine will re-send a write after a transient failure.
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    async fn write_rating(&self, id: &str, kind: ItemKind, value: f32) -> Result<()>;

    async fn clear_rating(&self, id: &str, kind: ItemKind) -> Result<()>;

    async fn add_tag(&self, id: &str, kind: ItemKind, tag: &str) -> Result<()>;

    async fn remove_tag(&self, id: &str, kind: ItemKind, tag: &str) -> Result<()>;
}

/// Pause between retry attempts of a failed write
const RETRY_PAUSE: Duration = Duration::from_secs(2);

/// One pending write operation, retried as a unit
#[derive(Debug, Clone, Copy)]
pub enum WriteOp<'a> {
    Rating { id: &'a str, kind: ItemKind, value: f32 },
    ClearRating { id: &'a str, kind: ItemKind },
    AddTag { id: &'a str, kind: ItemKind, tag: &'a str },
    RemoveTag { id: &'a str, kind: ItemKind, tag: &'a str },
}

/// Execute a single write with bounded retries.
///
/// Transient store failures retry up to `attempts` times; after that
/// the error escalates and the caller aborts the run, leaving the
/// checkpoint at the last successful commit.
pub async fn write_with_retry(
    writer: &dyn CatalogWriter,
    attempts: u32,
    op: WriteOp<'_>,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match op {
            WriteOp::Rating { id, kind, value } => writer.write_rating(id, kind, value).await,
            WriteOp::ClearRating { id, kind } => writer.clear_rating(id, kind).await,
            WriteOp::AddTag { id, kind, tag } => writer.add_tag(id, kind, tag).await,
            WriteOp::RemoveTag { id, kind, tag } => writer.remove_tag(id, kind, tag).await,
        };
        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                warn!(attempt, error = %e, "Catalog write failed, retrying");
                tokio::time::sleep(RETRY_PAUSE).await;
            }
            Err(e) => {
                return Err(EngineError::CatalogWrite {
                    attempts: attempt,
                    message: e.to_string(),
                })
            }
        }
    }
}
