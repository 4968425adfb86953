//! Shadow-state record types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog item kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Artist,
    Album,
    Track,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Artist => "artist",
            ItemKind::Album => "album",
            ItemKind::Track => "track",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "artist" => Some(ItemKind::Artist),
            "album" => Some(ItemKind::Album),
            "track" => Some(ItemKind::Track),
            _ => None,
        }
    }
}

/// Ownership classification of an item's current rating.
///
/// `Manual` is sticky: once a human edit is detected the engine never
/// reclassifies the item on its own. Only an explicit bulk-import
/// override resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    #[serde(rename = "never")]
    NeverTouched,
    Inferred,
    Manual,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::NeverTouched => "never",
            Classification::Inferred => "inferred",
            Classification::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "never" => Some(Classification::NeverTouched),
            "inferred" => Some(Classification::Inferred),
            "manual" => Some(Classification::Manual),
            _ => None,
        }
    }
}

/// One shadow-state record: what the engine last wrote for an item and
/// how the item's current rating is classified.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipRecord {
    pub item_id: String,
    pub kind: ItemKind,
    /// Last inferred value the engine wrote, absent if never written
    pub inferred_rating: Option<f32>,
    pub classification: Classification,
    /// Twin group membership, refreshed each run (discoverability only)
    pub twin_group: Option<Uuid>,
}

impl OwnershipRecord {
    pub fn is_manual(&self) -> bool {
        self.classification == Classification::Manual
    }
}
