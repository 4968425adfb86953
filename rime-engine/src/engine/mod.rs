//! Rating inference engine
//!
//! The five processing phases and their supporting machinery: bottom-up
//! Bayesian aggregation, top-down inheritance, twin resolution, the
//! ownership gate, and the checkpointed phase runner.

pub mod aggregate;
pub mod cleanup;
pub mod inherit;
pub mod ownership;
pub mod phase;
pub mod prior;
pub mod recovery;
pub mod twins;
pub mod verify;

use rime_common::db::{Classification, OwnershipRecord};

/// True when the engine authored the item's current rating.
///
/// Anything else - no record, a manual classification, or a record that
/// only carries a twin tag - means the rating (if any) belongs to a
/// human and may feed aggregation.
pub fn engine_owns(record: Option<&OwnershipRecord>) -> bool {
    matches!(record, Some(r) if r.classification == Classification::Inferred)
}
