//! Checkpointed phase runner
//!
//! Sequences the processing phases over the catalog in a deterministic
//! order, one item at a time. A write (or its suppression decision) and
//! the checkpoint advance form one commit unit; resume after a crash or
//! interrupt continues strictly after the last committed ordering key,
//! so no item is ever written twice within one run-to-completion.
//!
//! The runner is deliberately single-threaded: the external store is
//! the bottleneck and is not safely concurrent, and the shadow state
//! depends on writes landing in order.

use crate::catalog::{
    write_with_retry, Catalog, CatalogReader, CatalogWriter, NoiseFilter, TwinFilter, WriteOp,
};
use crate::config::EngineConfig;
use crate::engine::ownership::{dynamic_epsilon, gate, GateDecision};
use crate::engine::{aggregate, engine_owns, inherit, prior, twins};
use crate::Result;
use rime_common::db::{checkpoint, ownership, Classification, ItemKind, OwnershipRecord};
use rime_common::sort_key::{composite_key, sort_key};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The processing phases, in canonical run order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Track ratings -> album posteriors
    AlbumUp,
    /// Album ratings -> artist posteriors
    ArtistUp,
    /// Artist ratings -> unrated albums
    AlbumDown,
    /// Album ratings -> unrated tracks
    TrackDown,
    /// Duplicate-recording synchronization
    TwinSync,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::AlbumUp,
        Phase::ArtistUp,
        Phase::AlbumDown,
        Phase::TrackDown,
        Phase::TwinSync,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::AlbumUp => "album-up",
            Phase::ArtistUp => "artist-up",
            Phase::AlbumDown => "album-down",
            Phase::TrackDown => "track-down",
            Phase::TwinSync => "twin-sync",
        }
    }

    pub fn parse(s: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| p.name() == s)
    }
}

/// Per-phase lifecycle. `Interrupted` keeps the checkpoint; `Completed`
/// clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    NotStarted,
    Running,
    Interrupted,
    Completed,
}

/// Outcome counters for one pass
#[derive(Debug, Default, Clone)]
pub struct PassCounts {
    pub updated: u32,
    pub suppressed: u32,
    pub hijacked: u32,
    pub manual: u32,
}

/// Result of one phase pass
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub counts: PassCounts,
}

/// Result of a full engine run
#[derive(Debug)]
pub struct RunSummary {
    pub passes: Vec<PassSummary>,
    pub prior_start: f32,
    pub prior_end: f32,
    pub interrupted: bool,
}

/// One unit of phase work, in ordering-key sequence
struct WorkItem {
    key: String,
    id: String,
    kind: ItemKind,
    current: Option<f32>,
    has_marker: bool,
}

/// Drives the phases against one library
pub struct PhaseRunner<'a> {
    reader: &'a dyn CatalogReader,
    writer: &'a dyn CatalogWriter,
    pool: &'a SqlitePool,
    config: &'a EngineConfig,
    library_id: i64,
    interrupt: Arc<AtomicBool>,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(
        reader: &'a dyn CatalogReader,
        writer: &'a dyn CatalogWriter,
        pool: &'a SqlitePool,
        config: &'a EngineConfig,
        library_id: i64,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reader,
            writer,
            pool,
            config,
            library_id,
            interrupt,
        }
    }

    /// Run the given phases in order. Stops at the first interrupted
    /// phase, leaving its checkpoint intact for a later resume.
    pub async fn run(&self, phases: &[Phase]) -> Result<RunSummary> {
        let noise = NoiseFilter::from_config(&self.config.noise);

        // Prior and precision threshold are fixed for the whole
        // invocation, so results are reproducible even though each
        // phase re-reads the catalog.
        let snapshot = self.reader.fetch_catalog().await?;
        let state = ownership::load_all(self.pool, self.library_id).await?;
        let epsilon = dynamic_epsilon(
            snapshot.total_items(),
            self.config.inference.dynamic_precision,
        );
        let (prior_start, _) = prior::global_prior(&snapshot, &state, &noise);
        info!(epsilon, prior = prior_start, "Run parameters established");
        drop(snapshot);
        drop(state);

        let mut passes = Vec::new();
        let mut interrupted = false;
        for &phase in phases {
            let summary = self.run_phase(phase, prior_start, epsilon, &noise).await?;
            let stop = summary.status == PhaseStatus::Interrupted;
            passes.push(summary);
            if stop {
                interrupted = true;
                break;
            }
        }

        let snapshot = self.reader.fetch_catalog().await?;
        let state = ownership::load_all(self.pool, self.library_id).await?;
        let (prior_end, _) = prior::global_prior(&snapshot, &state, &noise);

        Ok(RunSummary {
            passes,
            prior_start,
            prior_end,
            interrupted,
        })
    }

    /// Run a single phase to completion or interruption.
    pub async fn run_phase(
        &self,
        phase: Phase,
        global_prior: f32,
        epsilon: f32,
        noise: &NoiseFilter,
    ) -> Result<PassSummary> {
        let catalog = self.reader.fetch_catalog().await?;
        let mut state = ownership::load_all(self.pool, self.library_id).await?;

        let resume_after = checkpoint::last_key(self.pool, self.library_id, phase.name()).await?;
        match resume_after {
            Some(ref key) => info!(phase = phase.name(), after = %key, "Phase resuming"),
            None => info!(phase = phase.name(), "Phase starting"),
        }

        let summary = if phase == Phase::TwinSync {
            self.run_twin_sync(&catalog, &mut state, resume_after, epsilon)
                .await?
        } else {
            self.run_hierarchy_phase(
                phase,
                &catalog,
                &mut state,
                resume_after,
                global_prior,
                epsilon,
                noise,
            )
            .await?
        };

        if summary.status == PhaseStatus::Completed && !self.config.dry_run {
            checkpoint::clear(self.pool, self.library_id, phase.name()).await?;
        }

        let c = &summary.counts;
        info!(
            phase = phase.name(),
            updated = c.updated,
            suppressed = c.suppressed,
            hijacked = c.hijacked,
            manual = c.manual,
            interrupted = summary.status == PhaseStatus::Interrupted,
            "Phase finished"
        );
        Ok(summary)
    }

    async fn run_hierarchy_phase(
        &self,
        phase: Phase,
        catalog: &Catalog,
        state: &mut HashMap<String, OwnershipRecord>,
        resume_after: Option<String>,
        global_prior: f32,
        epsilon: f32,
        noise: &NoiseFilter,
    ) -> Result<PassSummary> {
        let work = build_worklist(phase, catalog, self.config.marker());
        let mut counts = PassCounts::default();
        let mut batch: u32 = 0;

        for item in work {
            if let Some(ref resume_key) = resume_after {
                if item.key.as_str() <= resume_key.as_str() {
                    continue;
                }
            }

            let candidate = compute_candidate(
                phase,
                &item.id,
                catalog,
                state,
                global_prior,
                noise,
                self.config,
            );
            let decision = gate(state.get(&item.id), item.current, candidate, epsilon);
            let wrote = self
                .apply_decision(&item.id, item.kind, item.has_marker, decision, state, &mut counts)
                .await?;

            if !self.config.dry_run {
                checkpoint::advance(self.pool, self.library_id, phase.name(), &item.key).await?;
            }

            if wrote {
                batch += 1;
                if batch >= self.config.pacing.batch_size {
                    debug!(
                        seconds = self.config.pacing.pause_seconds,
                        "Cooldown pause between write bursts"
                    );
                    tokio::time::sleep(Duration::from_secs(self.config.pacing.pause_seconds)).await;
                    batch = 0;
                }
            }

            if self.interrupt.load(Ordering::Relaxed) {
                warn!(phase = phase.name(), "Interrupt honored at commit boundary");
                return Ok(PassSummary {
                    phase,
                    status: PhaseStatus::Interrupted,
                    counts,
                });
            }
        }

        Ok(PassSummary {
            phase,
            status: PhaseStatus::Completed,
            counts,
        })
    }

    async fn run_twin_sync(
        &self,
        catalog: &Catalog,
        state: &mut HashMap<String, OwnershipRecord>,
        resume_after: Option<String>,
        epsilon: f32,
    ) -> Result<PassSummary> {
        let phase = Phase::TwinSync;
        let filter = TwinFilter::from_config(&self.config.twins);
        let groups = twins::find_twin_groups(catalog, state, &filter);
        info!(groups = groups.len(), "Twin groups resolved for this run");

        // Membership is recomputed from scratch; stale groups from a
        // previous catalog state must not linger. Only safe on a fresh
        // start - a resume keeps the groups tagged so far.
        if resume_after.is_none() && !self.config.dry_run {
            ownership::clear_twin_groups(self.pool, self.library_id).await?;
        }

        let mut counts = PassCounts::default();
        let mut batch: u32 = 0;

        for group in groups {
            if let Some(ref resume_key) = resume_after {
                if group.key.as_str() <= resume_key.as_str() {
                    continue;
                }
            }

            // Only groups with a manual consensus are tagged: the tag
            // marks "this track's value is twin-governed", which the
            // inheritance pass uses to stand aside. No-consensus groups
            // keep inheriting normally.
            if !self.config.dry_run && group.agreed_rating.is_some() {
                for id in &group.member_ids {
                    ownership::set_twin_group(
                        self.pool,
                        self.library_id,
                        id,
                        ItemKind::Track,
                        group.id,
                    )
                    .await?;
                }
            }

            if let Some(agreed) = group.agreed_rating {
                for id in &group.member_ids {
                    let Some(track) = catalog.track(id) else { continue };
                    let has_marker = has_tag(&track.tags, self.config.marker());
                    let decision = gate(state.get(id), track.rating, Some(agreed), epsilon);
                    let wrote = self
                        .apply_decision(id, ItemKind::Track, has_marker, decision, state, &mut counts)
                        .await?;
                    if wrote {
                        batch += 1;
                        if batch >= self.config.pacing.batch_size {
                            tokio::time::sleep(Duration::from_secs(
                                self.config.pacing.pause_seconds,
                            ))
                            .await;
                            batch = 0;
                        }
                    }
                }
            }

            // The whole group is one commit unit
            if !self.config.dry_run {
                checkpoint::advance(self.pool, self.library_id, phase.name(), &group.key).await?;
            }

            if self.interrupt.load(Ordering::Relaxed) {
                warn!(phase = phase.name(), "Interrupt honored at commit boundary");
                return Ok(PassSummary {
                    phase,
                    status: PhaseStatus::Interrupted,
                    counts,
                });
            }
        }

        Ok(PassSummary {
            phase,
            status: PhaseStatus::Completed,
            counts,
        })
    }

    /// Act on a gate decision. Returns true when an external write
    /// actually happened (drives cooldown pacing).
    async fn apply_decision(
        &self,
        id: &str,
        kind: ItemKind,
        has_marker: bool,
        decision: GateDecision,
        state: &mut HashMap<String, OwnershipRecord>,
        counts: &mut PassCounts,
    ) -> Result<bool> {
        let retries = self.config.catalog.write_retries;
        match decision {
            GateDecision::Write(value) => {
                counts.updated += 1;
                if self.config.dry_run {
                    info!(id, kind = kind.as_str(), value, "[dry run] would write rating");
                    return Ok(false);
                }
                write_with_retry(self.writer, retries, WriteOp::Rating { id, kind, value })
                    .await?;
                if let Some(tag) = self.config.marker() {
                    if !has_marker {
                        write_with_retry(self.writer, retries, WriteOp::AddTag { id, kind, tag })
                            .await?;
                    }
                }
                ownership::record_inferred(self.pool, self.library_id, id, kind, value).await?;
                let twin_group = state.get(id).and_then(|r| r.twin_group);
                state.insert(
                    id.to_string(),
                    OwnershipRecord {
                        item_id: id.to_string(),
                        kind,
                        inferred_rating: Some(value),
                        classification: Classification::Inferred,
                        twin_group,
                    },
                );
                Ok(true)
            }
            GateDecision::Suppress => {
                counts.suppressed += 1;
                Ok(false)
            }
            GateDecision::ManualSkip => {
                counts.manual += 1;
                Ok(false)
            }
            GateDecision::NewlyManual => {
                counts.manual += 1;
                if self.config.dry_run {
                    return Ok(false);
                }
                ownership::mark_manual(self.pool, self.library_id, id, kind).await?;
                let previous = state.get(id).cloned();
                state.insert(
                    id.to_string(),
                    OwnershipRecord {
                        item_id: id.to_string(),
                        kind,
                        inferred_rating: previous.as_ref().and_then(|r| r.inferred_rating),
                        classification: Classification::Manual,
                        twin_group: previous.and_then(|r| r.twin_group),
                    },
                );
                Ok(false)
            }
            GateDecision::Hijacked => {
                counts.hijacked += 1;
                warn!(id, kind = kind.as_str(), "Manual override detected, ceding ownership");
                if self.config.dry_run {
                    return Ok(false);
                }
                ownership::mark_manual(self.pool, self.library_id, id, kind).await?;
                let mut wrote = false;
                if let Some(tag) = self.config.marker() {
                    if has_marker {
                        write_with_retry(
                            self.writer,
                            retries,
                            WriteOp::RemoveTag { id, kind, tag },
                        )
                        .await?;
                        wrote = true;
                    }
                }
                let previous = state.get(id).cloned();
                state.insert(
                    id.to_string(),
                    OwnershipRecord {
                        item_id: id.to_string(),
                        kind,
                        inferred_rating: previous.as_ref().and_then(|r| r.inferred_rating),
                        classification: Classification::Manual,
                        twin_group: previous.and_then(|r| r.twin_group),
                    },
                );
                Ok(wrote)
            }
            GateDecision::NoCandidate => Ok(false),
        }
    }
}

/// True when the item already carries the marker tag
fn has_tag(tags: &[String], marker: Option<&str>) -> bool {
    match marker {
        Some(tag) => tags.iter().any(|t| t == tag),
        None => false,
    }
}

/// Build the ordered worklist for a hierarchy phase.
///
/// Albums order by (artist, album); tracks by (artist, album, title);
/// artists by name. Every key ends with the item id so keys are unique
/// and the checkpoint can resume exactly.
fn build_worklist(phase: Phase, catalog: &Catalog, marker: Option<&str>) -> Vec<WorkItem> {
    let mut work: Vec<WorkItem> = match phase {
        Phase::AlbumUp | Phase::AlbumDown => catalog
            .albums()
            .iter()
            .map(|album| {
                let artist_key = sort_key(catalog.artist_name(&album.artist_id));
                WorkItem {
                    key: composite_key(&[&artist_key, &album.sort_key(), &album.id]),
                    id: album.id.clone(),
                    kind: ItemKind::Album,
                    current: album.rating,
                    has_marker: has_tag(&album.tags, marker),
                }
            })
            .collect(),
        Phase::ArtistUp => catalog
            .artists()
            .iter()
            .map(|artist| WorkItem {
                key: composite_key(&[&artist.sort_key(), &artist.id]),
                id: artist.id.clone(),
                kind: ItemKind::Artist,
                current: artist.rating,
                has_marker: has_tag(&artist.tags, marker),
            })
            .collect(),
        Phase::TrackDown => catalog
            .tracks()
            .iter()
            .map(|track| {
                let artist_key = sort_key(catalog.artist_name(&track.artist_id));
                let album_key = catalog
                    .album(&track.album_id)
                    .map(|a| a.sort_key())
                    .unwrap_or_default();
                WorkItem {
                    key: composite_key(&[&artist_key, &album_key, &track.sort_key(), &track.id]),
                    id: track.id.clone(),
                    kind: ItemKind::Track,
                    current: track.rating,
                    has_marker: has_tag(&track.tags, marker),
                }
            })
            .collect(),
        Phase::TwinSync => Vec::new(),
    };
    work.sort_by(|a, b| a.key.cmp(&b.key));
    work
}

/// Human evidence available to an album's posterior: manual ratings on
/// non-noise tracks, plus the critic rating if any.
fn album_evidence(
    album: &crate::catalog::Album,
    catalog: &Catalog,
    state: &HashMap<String, OwnershipRecord>,
    noise: &NoiseFilter,
) -> (Vec<f32>, bool) {
    // Only human evidence feeds the posterior: counting our own
    // inferred track ratings would create a feedback loop.
    let ratings: Vec<f32> = catalog
        .tracks_of(&album.id)
        .filter(|t| !noise.is_noise(t))
        .filter(|t| !engine_owns(state.get(&t.id)))
        .filter_map(|t| t.rating.filter(|r| *r > 0.0))
        .collect();
    let has_critic = album.critic_rating.is_some();
    (ratings, has_critic)
}

/// Compute the candidate rating for one item under the given phase.
///
/// `None` means the phase has nothing to propose - policy, not an
/// error. Two rules keep repeated runs convergent:
/// - an up-pass with zero evidence only fills a genuinely unrated slot
///   with the prior; it never overwrites a value (typically one the
///   down-pass inherited) with a weaker guess
/// - the down-pass only targets children with no evidence of their own,
///   so aggregation always beats inheritance for the same item
fn compute_candidate(
    phase: Phase,
    id: &str,
    catalog: &Catalog,
    state: &HashMap<String, OwnershipRecord>,
    global_prior: f32,
    noise: &NoiseFilter,
    config: &EngineConfig,
) -> Option<f32> {
    let inference = &config.inference;
    match phase {
        Phase::AlbumUp => {
            let album = catalog.album(id)?;
            let (ratings, has_critic) = album_evidence(album, catalog, state, noise);
            let already_rated = album.rating.is_some_and(|r| r > 0.0);
            if ratings.is_empty() && !has_critic && already_rated {
                return None;
            }
            Some(aggregate::album_posterior(
                &ratings,
                album.critic_rating,
                global_prior,
                inference,
            ))
        }
        Phase::ArtistUp => {
            let artist = catalog.artist(id)?;
            let ratings: Vec<f32> = catalog
                .albums_of(&artist.id)
                .filter(|a| !engine_owns(state.get(&a.id)))
                .filter_map(|a| a.rating.filter(|r| *r > 0.0))
                .collect();
            if ratings.is_empty() && artist.rating.is_some_and(|r| r > 0.0) {
                return None;
            }
            Some(aggregate::artist_posterior(&ratings, global_prior, inference))
        }
        Phase::AlbumDown => {
            let album = catalog.album(id)?;
            let (ratings, has_critic) = album_evidence(album, catalog, state, noise);
            if !ratings.is_empty() || has_critic {
                // The up-pass posterior stands; inheritance is only for
                // albums with nothing of their own
                return None;
            }
            let artist = catalog.artist(&album.artist_id)?;
            let parent_rating = artist.rating.filter(|r| *r > 0.0)?;
            Some(inherit::inherited_rating(
                parent_rating,
                engine_owns(state.get(&artist.id)),
                inference.album_gravity,
                global_prior,
            ))
        }
        Phase::TrackDown => {
            let track = catalog.track(id)?;
            // Twin-governed tracks take their value from the twin
            // resolver, not from inheritance
            if state.get(id).is_some_and(|r| r.twin_group.is_some()) {
                return None;
            }
            let album = catalog.album(&track.album_id)?;
            let parent_rating = album.rating.filter(|r| *r > 0.0)?;
            Some(inherit::inherited_rating(
                parent_rating,
                engine_owns(state.get(&album.id)),
                inference.track_gravity,
                global_prior,
            ))
        }
        Phase::TwinSync => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Album, Artist, Track};

    #[test]
    fn phase_names_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(Phase::parse(phase.name()), Some(phase));
        }
        assert_eq!(Phase::parse("sideways"), None);
    }

    #[test]
    fn worklist_orders_albums_by_artist_then_title() {
        let artists = vec![
            Artist { id: "a2".into(), name: "Zebra".into(), rating: None, tags: vec![] },
            Artist { id: "a1".into(), name: "Aardvark".into(), rating: None, tags: vec![] },
        ];
        let albums = vec![
            Album {
                id: "al1".into(),
                artist_id: "a2".into(),
                name: "Alpha".into(),
                rating: None,
                critic_rating: None,
                live: false,
                tags: vec![],
            },
            Album {
                id: "al2".into(),
                artist_id: "a1".into(),
                name: "Beta".into(),
                rating: None,
                critic_rating: None,
                live: false,
                tags: vec![],
            },
        ];
        let catalog = Catalog::new(artists, albums, vec![]);

        let work = build_worklist(Phase::AlbumUp, &catalog, None);
        // Aardvark's album first despite the later title
        assert_eq!(work[0].id, "al2");
        assert_eq!(work[1].id, "al1");
    }

    #[test]
    fn track_keys_include_album_context() {
        let artists = vec![Artist { id: "a1".into(), name: "Solo".into(), rating: None, tags: vec![] }];
        let albums = vec![
            Album {
                id: "al1".into(),
                artist_id: "a1".into(),
                name: "Early".into(),
                rating: None,
                critic_rating: None,
                live: false,
                tags: vec![],
            },
            Album {
                id: "al2".into(),
                artist_id: "a1".into(),
                name: "Late".into(),
                rating: None,
                critic_rating: None,
                live: false,
                tags: vec![],
            },
        ];
        let tracks = vec![
            Track {
                id: "t1".into(),
                album_id: "al2".into(),
                artist_id: "a1".into(),
                name: "Aaa".into(),
                duration_ms: 100_000,
                rating: None,
                tags: vec![],
            },
            Track {
                id: "t2".into(),
                album_id: "al1".into(),
                artist_id: "a1".into(),
                name: "Zzz".into(),
                duration_ms: 100_000,
                rating: None,
                tags: vec![],
            },
        ];
        let catalog = Catalog::new(artists, albums, tracks);

        let work = build_worklist(Phase::TrackDown, &catalog, None);
        // Album "Early" sorts before "Late", overriding track titles
        assert_eq!(work[0].id, "t2");
        assert_eq!(work[1].id, "t1");
    }
}
