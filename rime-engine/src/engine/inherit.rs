//! Top-down gravity-weighted inheritance
//!
//! Unrated children borrow their parent's rating. A manual parent
//! rating is raw human opinion, so it is pulled toward the global prior
//! by the per-level gravity coefficient. An inferred parent rating
//! already contains shrinkage from aggregation; applying gravity again
//! would double-discount, so it is copied as-is.

use rime_common::ratings::clamp_rating;

/// Inherited rating for an unrated child.
///
/// `gravity` is the regression strength toward the prior: 0 copies the
/// parent exactly, 1 ignores the parent entirely.
pub fn inherited_rating(
    parent_rating: f32,
    parent_is_inferred: bool,
    gravity: f32,
    prior: f32,
) -> f32 {
    if parent_is_inferred {
        clamp_rating(parent_rating)
    } else {
        clamp_rating((1.0 - gravity) * parent_rating + gravity * prior)
    }
}
