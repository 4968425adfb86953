//! Library registration and identity stamp validation
//!
//! The shadow state is only meaningful against the library it was built
//! from. Every run checks the catalog's identity stamp against the one
//! stored here; a mismatch is a warning plus an explicit confirmation
//! gate, not a hard lock.

use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Look up or register a library, validating its identity stamp.
///
/// Returns the local library id. When the stored stamp differs from the
/// one the catalog reports, the caller must have passed
/// `accept_mismatch` (the operator confirmed they really are pointing at
/// a different library); the stored stamp is then updated.
pub async fn ensure_library(
    pool: &SqlitePool,
    name: &str,
    identity_stamp: &str,
    accept_mismatch: bool,
) -> Result<i64> {
    let row = sqlx::query_as::<_, (i64, String)>(
        "SELECT library_id, library_uuid FROM libraries WHERE library_name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    match row {
        None => {
            info!(library = name, "Registering library in state database");
            let result = sqlx::query(
                "INSERT INTO libraries (library_name, library_uuid) VALUES (?, ?)",
            )
            .bind(name)
            .bind(identity_stamp)
            .execute(pool)
            .await?;
            Ok(result.last_insert_rowid())
        }
        Some((library_id, stored_stamp)) => {
            if stored_stamp != identity_stamp {
                warn!(
                    library = name,
                    stored = %stored_stamp,
                    found = %identity_stamp,
                    "Library identity stamp mismatch"
                );
                if !accept_mismatch {
                    return Err(Error::IdentityMismatch {
                        stored: stored_stamp,
                        found: identity_stamp.to_string(),
                    });
                }
                warn!("Mismatch accepted; updating stored library identity");
                sqlx::query("UPDATE libraries SET library_uuid = ? WHERE library_id = ?")
                    .bind(identity_stamp)
                    .bind(library_id)
                    .execute(pool)
                    .await?;
            }
            Ok(library_id)
        }
    }
}
