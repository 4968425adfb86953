//! Ownership classification and the dynamic-precision gate
//!
//! The external store has no modified-timestamp the engine can trust,
//! so "did a human change this?" is re-derived every run by comparing
//! the store's current value against the last value the engine wrote.
//! The same comparison doubles as the write-suppression lever: a
//! candidate that lands within epsilon of what is already there is not
//! worth a slow external write.

use rime_common::db::{Classification, OwnershipRecord};

/// Float-comparison floor for manual-change detection. Ratings round-
/// trip through the external store as floats; without a floor every
/// run would misread representation jitter as a human edit.
pub const MANUAL_NOISE_FLOOR: f32 = 0.01;

/// Epsilon anchor points: (catalog size, threshold in rating-points)
const EPSILON_LOW_ANCHOR: (f32, f32) = (50_000.0, 0.13);
const EPSILON_HIGH_ANCHOR: (f32, f32) = (300_000.0, 0.17);

/// Tightest threshold, applied to small libraries
const EPSILON_MIN: f32 = 0.02;

/// Size-dependent write-suppression threshold.
///
/// Log-linear between the anchor points, clamped at both ends:
/// small libraries get tight precision, large libraries trade accuracy
/// for reduced write volume. Disabled gating forces zero - any
/// difference is written.
pub fn dynamic_epsilon(catalog_size: usize, enabled: bool) -> f32 {
    if !enabled {
        return 0.0;
    }
    let n = (catalog_size.max(1)) as f32;
    let (n_lo, eps_lo) = EPSILON_LOW_ANCHOR;
    let (n_hi, eps_hi) = EPSILON_HIGH_ANCHOR;
    let slope = (eps_hi - eps_lo) / (n_hi.log10() - n_lo.log10());
    let eps = eps_lo + slope * (n.log10() - n_lo.log10());
    eps.clamp(EPSILON_MIN, eps_hi)
}

/// Outcome of running one item through the ownership gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Write the candidate and record it as inferred
    Write(f32),
    /// Candidate is close enough to the current value; skip the
    /// external write entirely
    Suppress,
    /// Item was already classified manual; never write
    ManualSkip,
    /// A human rating exists where the engine holds no stake; classify
    /// manual and never write
    NewlyManual,
    /// The engine owned this item but the store's value moved away from
    /// what was written: a human took over. Classify manual, drop the
    /// marker.
    Hijacked,
    /// Nothing was computed for this item (e.g. unrated parent)
    NoCandidate,
}

/// Classify an item and decide whether a computed value may be written.
///
/// `record` is the shadow record (if any), `current` the store's
/// current rating, `candidate` the freshly computed value.
pub fn gate(
    record: Option<&OwnershipRecord>,
    current: Option<f32>,
    candidate: Option<f32>,
    epsilon: f32,
) -> GateDecision {
    // A missing or cleared rating is writable regardless of history: a
    // human clearing a rating withdraws it, returning the item to the
    // engine's care.
    let Some(current) = current.filter(|r| *r > 0.0) else {
        return match candidate {
            Some(c) => GateDecision::Write(c),
            None => GateDecision::NoCandidate,
        };
    };

    let Some(record) = record else {
        return GateDecision::NewlyManual;
    };

    match record.classification {
        Classification::Manual => GateDecision::ManualSkip,
        // A record that only carries a twin tag: the rating is human
        Classification::NeverTouched => GateDecision::NewlyManual,
        Classification::Inferred => {
            let stored = match record.inferred_rating {
                Some(v) => v,
                // Inferred without a value cannot happen through the
                // write path; treat the rating as human to stay safe
                None => return GateDecision::NewlyManual,
            };

            if (current - stored).abs() > epsilon.max(MANUAL_NOISE_FLOOR) {
                return GateDecision::Hijacked;
            }

            match candidate {
                None => GateDecision::NoCandidate,
                Some(cand) => {
                    let suppress_within = if epsilon > 0.0 { epsilon } else { 1e-4 };
                    if (cand - current).abs() < suppress_within {
                        GateDecision::Suppress
                    } else {
                        GateDecision::Write(cand)
                    }
                }
            }
        }
    }
}
