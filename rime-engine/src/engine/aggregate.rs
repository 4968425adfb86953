//! Bottom-up Bayesian aggregation
//!
//! A parent's posterior is its children's rating evidence shrunk toward
//! a prior: `(C*P + sum(r)) / (C + n)`. The confidence constant C acts
//! as C virtual children rated exactly at the prior, so sparse evidence
//! regresses to the mean and abundant evidence dominates it. With no
//! evidence at all the posterior IS the prior - an item with zero
//! signal gets the baseline guess, never zero.

use crate::config::InferenceConfig;
use rime_common::ratings::{clamp_rating, normalize_critic};

/// Core Bayesian blend of child ratings against a prior.
pub fn bayesian_posterior(child_ratings: &[f32], prior: f32, confidence_c: f32) -> f32 {
    let n = child_ratings.len() as f32;
    let sum: f32 = child_ratings.iter().sum();
    clamp_rating((confidence_c * prior + sum) / (confidence_c + n))
}

/// Prior for one album: the global prior, pulled toward the critic's
/// opinion when one exists.
///
/// The critic rating is biased, normalized to the star scale, then
/// combined with the global prior as a weighted sum. It enters as a
/// reshaped prior, not as one more rated child, so critic influence is
/// independent of how many tracks are rated.
pub fn informed_prior(
    global_prior: f32,
    critic_rating: Option<f32>,
    config: &InferenceConfig,
) -> f32 {
    match critic_rating {
        Some(rc) if config.critic_weight > 0.0 => {
            let critic = normalize_critic(rc, config.critic_bias);
            (global_prior * config.global_weight + critic * config.critic_weight)
                / (config.global_weight + config.critic_weight)
        }
        _ => global_prior,
    }
}

/// Posterior for an album from its non-noise, non-engine-owned track
/// ratings plus an optional critic rating.
pub fn album_posterior(
    child_ratings: &[f32],
    critic_rating: Option<f32>,
    global_prior: f32,
    config: &InferenceConfig,
) -> f32 {
    let prior = informed_prior(global_prior, critic_rating, config);
    bayesian_posterior(child_ratings, prior, config.confidence_c)
}

/// Posterior for an artist from its album ratings. Artists have no
/// critic ratings; the global prior is used directly.
pub fn artist_posterior(
    child_ratings: &[f32],
    global_prior: f32,
    config: &InferenceConfig,
) -> f32 {
    bayesian_posterior(child_ratings, global_prior, config.confidence_c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> InferenceConfig {
        InferenceConfig::default()
    }

    #[test]
    fn zero_evidence_regresses_fully_to_prior() {
        assert_eq!(bayesian_posterior(&[], 3.2, 3.0), 3.2);
        assert_eq!(artist_posterior(&[], 3.2, &config()), 3.2);
        assert_eq!(album_posterior(&[], None, 3.2, &config()), 3.2);
    }

    #[test]
    fn worked_example() {
        // Tracks rated {5, 5}, two unrated, C = 3, P = 3.2:
        // (3 * 3.2 + 10) / (3 + 2) = 3.92
        let posterior = bayesian_posterior(&[5.0, 5.0], 3.2, 3.0);
        assert!((posterior - 3.92).abs() < 1e-6);
    }

    #[test]
    fn posterior_stays_in_bounds() {
        assert!(bayesian_posterior(&[5.0; 50], 5.0, 0.5) <= 5.0);
        assert!(bayesian_posterior(&[0.0; 50], 0.0, 0.5) >= 0.0);
    }

    #[test]
    fn critic_reshapes_the_prior() {
        let cfg = config();
        // Perfect critic score drags the empty-album posterior above
        // the global prior
        let with_critic = album_posterior(&[], Some(10.0), 3.0, &cfg);
        assert!(with_critic > 3.0);
        // (3.0 * 1 + 5.0 * 3) / 4 = 4.5
        assert!((with_critic - 4.5).abs() < 1e-6);

        // Zero critic weight means the critic is ignored
        let mut no_critic_cfg = config();
        no_critic_cfg.critic_weight = 0.0;
        assert_eq!(album_posterior(&[], Some(10.0), 3.0, &no_critic_cfg), 3.0);
    }

    #[test]
    fn all_children_excluded_behaves_as_zero_evidence() {
        // The caller passes an empty slice when every child was noise;
        // the contract is identical to n = 0
        let posterior = album_posterior(&[], None, 2.8, &config());
        assert_eq!(posterior, 2.8);
    }
}
