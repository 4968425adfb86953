//! Engine configuration
//!
//! Loaded from a TOML file. Resolution order: explicit `--config` path,
//! then the platform config directory (`~/.config/rime/config.toml` on
//! Linux). Every recognized option has a default; validation runs once
//! at startup and fails fast before any phase starts.

use crate::{EngineError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Compute and classify, but skip all external writes and shadow
    /// mutations
    pub dry_run: bool,
    /// Marker tag added to every item the engine rates. Empty disables
    /// tagging, and with it the state-reconstruction path.
    pub marker_tag: String,
    pub catalog: CatalogConfig,
    pub inference: InferenceConfig,
    pub pacing: PacingConfig,
    pub noise: NoiseConfig,
    pub twins: TwinConfig,
    pub bulk: BulkConfig,
    pub state: StateConfig,
}

/// External catalog connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub url: String,
    pub token: String,
    pub library: String,
    pub timeout_seconds: u64,
    /// Bounded retries for a single pending write before the run aborts
    pub write_retries: u32,
}

/// Statistical model parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Virtual average-rated children blended into every posterior
    pub confidence_c: f32,
    /// Additive bias applied to critic ratings before normalization
    pub critic_bias: f32,
    pub critic_weight: f32,
    pub global_weight: f32,
    /// Regression toward the global mean for artist → album inheritance
    pub album_gravity: f32,
    /// Regression toward the global mean for album → track inheritance
    pub track_gravity: f32,
    /// Size-dependent write-suppression threshold; disabling forces
    /// epsilon to zero (always write on any difference)
    pub dynamic_precision: bool,
}

/// Write pacing toward the external store
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    /// External writes per burst before pausing
    pub batch_size: u32,
    /// Pause between bursts, in seconds
    pub pause_seconds: u64,
}

/// Noise-track exclusion policy (intros, skits, applause...)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseConfig {
    /// Tracks shorter than this never count toward aggregation
    pub min_duration_ms: u64,
    /// Case-insensitive title keywords excluded from aggregation
    pub keywords: Vec<String>,
}

/// Twin (duplicate recording) matching policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TwinConfig {
    /// Maximum duration difference between twin candidates
    pub duration_tolerance_ms: u64,
    /// Keywords in track title or album title that disqualify a candidate
    pub exclude_keywords: Vec<String>,
    /// Disqualify titles carrying parenthetical qualifiers
    pub exclude_parenthetical: bool,
    /// Disqualify tracks on albums the catalog flags as live
    pub exclude_live_albums: bool,
}

/// Bulk rating exchange file locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BulkConfig {
    pub artists: PathBuf,
    pub albums: PathBuf,
    pub tracks: PathBuf,
}

/// Shadow-state storage
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    /// Override for the state database path; default lives under the
    /// platform data directory
    pub database: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            marker_tag: "Rating_Inferred".to_string(),
            catalog: CatalogConfig::default(),
            inference: InferenceConfig::default(),
            pacing: PacingConfig::default(),
            noise: NoiseConfig::default(),
            twins: TwinConfig::default(),
            bulk: BulkConfig::default(),
            state: StateConfig::default(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:32400".to_string(),
            token: String::new(),
            library: "Music".to_string(),
            timeout_seconds: 15,
            write_retries: 3,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            confidence_c: 3.0,
            critic_bias: 1.5,
            critic_weight: 3.0,
            global_weight: 1.0,
            album_gravity: 0.2,
            track_gravity: 0.3,
            dynamic_precision: true,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            pause_seconds: 5,
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 60_000,
            keywords: ["intro", "outro", "skit", "interlude", "applause", "spoken word"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            duration_tolerance_ms: 5_000,
            exclude_keywords: ["live", "demo", "remix", "unplugged", "acoustic", "edit"]
                .into_iter()
                .map(String::from)
                .collect(),
            exclude_parenthetical: true,
            exclude_live_albums: true,
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            artists: PathBuf::from("./artist_ratings.csv"),
            albums: PathBuf::from("./album_ratings.csv"),
            tracks: PathBuf::from("./track_ratings.csv"),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { database: None }
    }
}

impl EngineConfig {
    /// Load configuration from an explicit path or the platform default
    /// location. A missing file yields the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let config = match path {
            Some(ref p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text)
                    .map_err(|e| EngineError::config(format!("{}: {e}", p.display())))?
            }
            Some(ref p) if explicit.is_some() => {
                return Err(EngineError::config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            _ => EngineConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate every recognized option. Called before any phase starts.
    pub fn validate(&self) -> Result<()> {
        let inf = &self.inference;
        if inf.confidence_c <= 0.0 || !inf.confidence_c.is_finite() {
            return Err(EngineError::config("confidence_c must be a positive number"));
        }
        for (name, g) in [
            ("album_gravity", inf.album_gravity),
            ("track_gravity", inf.track_gravity),
        ] {
            if !(0.0..=1.0).contains(&g) || !g.is_finite() {
                return Err(EngineError::config(format!("{name} must be within [0, 1]")));
            }
        }
        if inf.critic_weight < 0.0 || inf.global_weight < 0.0 {
            return Err(EngineError::config("blend weights must not be negative"));
        }
        if inf.global_weight == 0.0 && inf.critic_weight == 0.0 {
            return Err(EngineError::config("at least one blend weight must be positive"));
        }
        if !inf.critic_bias.is_finite() || inf.critic_bias < 0.0 {
            return Err(EngineError::config("critic_bias must be zero or positive"));
        }
        if self.pacing.batch_size == 0 {
            return Err(EngineError::config("pacing batch_size must be at least 1"));
        }
        if self.catalog.write_retries == 0 {
            return Err(EngineError::config("write_retries must be at least 1"));
        }
        Ok(())
    }

    /// Resolved state database path.
    pub fn state_db_path(&self) -> PathBuf {
        if let Some(ref p) = self.state.database {
            return p.clone();
        }
        dirs::data_local_dir()
            .map(|d| d.join("rime"))
            .unwrap_or_else(|| PathBuf::from("./rime_data"))
            .join("rime_state.db")
    }

    /// Marker tag, or `None` when tagging is disabled.
    pub fn marker(&self) -> Option<&str> {
        let tag = self.marker_tag.trim();
        if tag.is_empty() {
            None
        } else {
            Some(tag)
        }
    }
}

/// Platform default config file path (`~/.config/rime/config.toml` or
/// the OS equivalent), if a config directory exists at all.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rime").join("config.toml"))
}
