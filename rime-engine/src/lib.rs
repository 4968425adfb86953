//! rime-engine - Rating Inference Engine
//!
//! Propagates sparse per-item quality ratings across the track → album →
//! artist hierarchy of a music catalog. Unrated items receive
//! statistically inferred ratings; human-entered ratings are never
//! overwritten. The engine keeps its own shadow record of everything it
//! writes so that human overrides can be detected without any
//! change-timestamp support from the catalog.

pub mod bulk;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;

pub use error::{EngineError, Result};
