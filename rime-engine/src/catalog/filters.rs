//! Noise and twin-candidacy exclusion policies
//!
//! Noise tracks (intros, skits, applause) carry ratings like any other
//! track but must never count toward a parent's posterior. Alt-version
//! tracks (live cuts, demos, remixes) are real recordings but must never
//! be merged with their studio twin.

use crate::catalog::{Album, Track};
use crate::config::{NoiseConfig, TwinConfig};

/// Lowercased, whitespace-trimmed title used for twin bucketing and
/// keyword matching.
pub fn normalized_title(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Policy deciding which tracks are aggregation noise
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    min_duration_ms: u64,
    keywords: Vec<String>,
}

impl NoiseFilter {
    pub fn from_config(config: &NoiseConfig) -> Self {
        Self {
            min_duration_ms: config.min_duration_ms,
            keywords: config.keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// True when the track must not count toward its parents' posteriors
    pub fn is_noise(&self, track: &Track) -> bool {
        if track.duration_ms < self.min_duration_ms {
            return true;
        }
        let title = normalized_title(&track.name);
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }
}

/// Policy deciding which tracks may enter twin candidacy
#[derive(Debug, Clone)]
pub struct TwinFilter {
    duration_tolerance_ms: u64,
    exclude_keywords: Vec<String>,
    exclude_parenthetical: bool,
    exclude_live_albums: bool,
}

impl TwinFilter {
    pub fn from_config(config: &TwinConfig) -> Self {
        Self {
            duration_tolerance_ms: config.duration_tolerance_ms,
            exclude_keywords: config
                .exclude_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            exclude_parenthetical: config.exclude_parenthetical,
            exclude_live_albums: config.exclude_live_albums,
        }
    }

    /// True when the track (in the context of its album) may not join a
    /// twin group.
    pub fn is_alt_version(&self, track: &Track, album: Option<&Album>) -> bool {
        if let Some(album) = album {
            if self.exclude_live_albums && album.live {
                return true;
            }
            if self.matches_keyword(&album.name) {
                return true;
            }
        }
        if self.matches_keyword(&track.name) {
            return true;
        }
        if self.exclude_parenthetical && has_parenthetical(&track.name) {
            return true;
        }
        false
    }

    /// True when two durations are close enough to be the same recording
    pub fn durations_match(&self, a_ms: u64, b_ms: u64) -> bool {
        a_ms.abs_diff(b_ms) <= self.duration_tolerance_ms
    }

    fn matches_keyword(&self, name: &str) -> bool {
        let title = normalized_title(name);
        self.exclude_keywords.iter().any(|k| title.contains(k.as_str()))
    }
}

fn has_parenthetical(name: &str) -> bool {
    name.contains('(') || name.contains('[')
}
