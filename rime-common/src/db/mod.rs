//! Shadow-state database access
//!
//! The shadow state is the engine's own record of every inferred rating
//! it has written, plus the per-phase checkpoints and the identity stamp
//! of the library the state belongs to. It is the only entity that
//! persists across runs.

pub mod checkpoint;
pub mod init;
pub mod libraries;
pub mod models;
pub mod ownership;

pub use init::init_state_db;
pub use models::{Classification, ItemKind, OwnershipRecord};
