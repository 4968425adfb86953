//! Shared test helpers: an in-memory catalog implementing the reader
//! and writer contracts, plus library/scenario builders.

// Not every integration binary uses every helper
#![allow(dead_code)]

use async_trait::async_trait;
use rime_common::db::{init::create_schema, libraries, ItemKind};
use rime_engine::catalog::{
    Album, Artist, Catalog, CatalogReader, CatalogWriter, LibraryIdentity, TaggedItem, Track,
};
use rime_engine::config::EngineConfig;
use rime_engine::{EngineError, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory catalog standing in for the external store.
///
/// Writes mutate the shared item set, so a later `fetch_catalog` sees
/// them, exactly like re-reading the real store between phases.
pub struct MemoryCatalog {
    identity: LibraryIdentity,
    inner: Mutex<Inner>,
}

struct Inner {
    artists: Vec<Artist>,
    albums: Vec<Album>,
    tracks: Vec<Track>,
    /// Every rating write that reached the store, in order
    write_log: Vec<(String, f32)>,
    /// Fail the next N rating writes with a transient error
    fail_next_writes: u32,
    /// Trip the flag once this many rating writes have landed
    interrupt_after: Option<(usize, Arc<AtomicBool>)>,
}

impl MemoryCatalog {
    pub fn new(artists: Vec<Artist>, albums: Vec<Album>, tracks: Vec<Track>) -> Self {
        Self {
            identity: LibraryIdentity {
                name: "Music".to_string(),
                stamp: "lib-uuid-1".to_string(),
            },
            inner: Mutex::new(Inner {
                artists,
                albums,
                tracks,
                write_log: Vec::new(),
                fail_next_writes: 0,
                interrupt_after: None,
            }),
        }
    }

    /// Simulate a human edit: set a rating without logging a write
    pub fn human_rate(&self, id: &str, rating: Option<f32>) {
        let mut inner = self.inner.lock().unwrap();
        inner.set_rating(id, rating).expect("item exists");
    }

    pub fn rating_of(&self, id: &str) -> Option<f32> {
        let inner = self.inner.lock().unwrap();
        inner.rating(id)
    }

    pub fn tags_of(&self, id: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.tags(id).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().write_log.len()
    }

    pub fn writes_for(&self, id: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.write_log.iter().filter(|(wid, _)| wid == id).count()
    }

    pub fn fail_next_writes(&self, n: u32) {
        self.inner.lock().unwrap().fail_next_writes = n;
    }

    pub fn interrupt_after_writes(&self, n: usize, flag: Arc<AtomicBool>) {
        self.inner.lock().unwrap().interrupt_after = Some((n, flag));
    }
}

impl Inner {
    fn set_rating(&mut self, id: &str, rating: Option<f32>) -> std::result::Result<(), ()> {
        if let Some(a) = self.artists.iter_mut().find(|a| a.id == id) {
            a.rating = rating;
            return Ok(());
        }
        if let Some(a) = self.albums.iter_mut().find(|a| a.id == id) {
            a.rating = rating;
            return Ok(());
        }
        if let Some(t) = self.tracks.iter_mut().find(|t| t.id == id) {
            t.rating = rating;
            return Ok(());
        }
        Err(())
    }

    fn rating(&self, id: &str) -> Option<f32> {
        self.artists
            .iter()
            .find(|a| a.id == id)
            .and_then(|a| a.rating)
            .or_else(|| self.albums.iter().find(|a| a.id == id).and_then(|a| a.rating))
            .or_else(|| self.tracks.iter().find(|t| t.id == id).and_then(|t| t.rating))
    }

    fn tags(&self, id: &str) -> Option<Vec<String>> {
        if let Some(a) = self.artists.iter().find(|a| a.id == id) {
            return Some(a.tags.clone());
        }
        if let Some(a) = self.albums.iter().find(|a| a.id == id) {
            return Some(a.tags.clone());
        }
        self.tracks.iter().find(|t| t.id == id).map(|t| t.tags.clone())
    }

    fn tags_mut(&mut self, id: &str) -> Option<&mut Vec<String>> {
        if let Some(a) = self.artists.iter_mut().find(|a| a.id == id) {
            return Some(&mut a.tags);
        }
        if let Some(a) = self.albums.iter_mut().find(|a| a.id == id) {
            return Some(&mut a.tags);
        }
        self.tracks.iter_mut().find(|t| t.id == id).map(|t| &mut t.tags)
    }
}

#[async_trait]
impl CatalogReader for MemoryCatalog {
    async fn library_identity(&self) -> Result<LibraryIdentity> {
        Ok(self.identity.clone())
    }

    async fn fetch_catalog(&self) -> Result<Catalog> {
        let inner = self.inner.lock().unwrap();
        Ok(Catalog::new(
            inner.artists.clone(),
            inner.albums.clone(),
            inner.tracks.clone(),
        ))
    }

    async fn fetch_tagged(&self, kind: ItemKind, tag: &str) -> Result<Vec<TaggedItem>> {
        let inner = self.inner.lock().unwrap();
        let items = match kind {
            ItemKind::Artist => inner
                .artists
                .iter()
                .filter(|a| a.tags.iter().any(|t| t == tag))
                .map(|a| TaggedItem { id: a.id.clone(), kind, rating: a.rating })
                .collect(),
            ItemKind::Album => inner
                .albums
                .iter()
                .filter(|a| a.tags.iter().any(|t| t == tag))
                .map(|a| TaggedItem { id: a.id.clone(), kind, rating: a.rating })
                .collect(),
            ItemKind::Track => inner
                .tracks
                .iter()
                .filter(|t| t.tags.iter().any(|x| x == tag))
                .map(|t| TaggedItem { id: t.id.clone(), kind, rating: t.rating })
                .collect(),
        };
        Ok(items)
    }
}

#[async_trait]
impl CatalogWriter for MemoryCatalog {
    async fn write_rating(&self, id: &str, _kind: ItemKind, value: f32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next_writes > 0 {
            inner.fail_next_writes -= 1;
            return Err(EngineError::Catalog("store temporarily unreachable".into()));
        }
        inner
            .set_rating(id, Some(value))
            .map_err(|_| EngineError::Catalog(format!("no such item: {id}")))?;
        inner.write_log.push((id.to_string(), value));

        if let Some((threshold, ref flag)) = inner.interrupt_after {
            if inner.write_log.len() >= threshold {
                flag.store(true, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    async fn clear_rating(&self, id: &str, _kind: ItemKind) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .set_rating(id, None)
            .map_err(|_| EngineError::Catalog(format!("no such item: {id}")))
    }

    async fn add_tag(&self, id: &str, _kind: ItemKind, tag: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let tags = inner
            .tags_mut(id)
            .ok_or_else(|| EngineError::Catalog(format!("no such item: {id}")))?;
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
        Ok(())
    }

    async fn remove_tag(&self, id: &str, _kind: ItemKind, tag: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let tags = inner
            .tags_mut(id)
            .ok_or_else(|| EngineError::Catalog(format!("no such item: {id}")))?;
        tags.retain(|t| t != tag);
        Ok(())
    }
}

/// Engine configuration tuned for tests: live writes, no pacing pauses.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.dry_run = false;
    config.pacing.pause_seconds = 0;
    config.pacing.batch_size = 1000;
    config
}

/// Fresh in-memory state database registered for the memory catalog's
/// library identity.
pub async fn test_state() -> (SqlitePool, i64) {
    // One connection: an in-memory SQLite database is per-connection
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory state database");
    create_schema(&pool).await.expect("schema");
    let library_id = libraries::ensure_library(&pool, "Music", "lib-uuid-1", false)
        .await
        .expect("library registration");
    (pool, library_id)
}

pub fn artist(id: &str, name: &str, rating: Option<f32>) -> Artist {
    Artist {
        id: id.to_string(),
        name: name.to_string(),
        rating,
        tags: vec![],
    }
}

pub fn album(id: &str, artist_id: &str, name: &str, rating: Option<f32>) -> Album {
    Album {
        id: id.to_string(),
        artist_id: artist_id.to_string(),
        name: name.to_string(),
        rating,
        critic_rating: None,
        live: false,
        tags: vec![],
    }
}

pub fn track(id: &str, album_id: &str, artist_id: &str, name: &str, rating: Option<f32>) -> Track {
    Track {
        id: id.to_string(),
        album_id: album_id.to_string(),
        artist_id: artist_id.to_string(),
        name: name.to_string(),
        duration_ms: 210_000,
        rating,
        tags: vec![],
    }
}

/// A small two-artist library used across the integration tests.
///
/// Manual track ratings: t1 = 5.0, t2 = 5.0 (album al1), t5 = 2.0
/// (album al2). Global prior = mean(5, 5, 2) = 4.0.
pub fn standard_library() -> MemoryCatalog {
    let artists = vec![artist("ar1", "Alpha", None), artist("ar2", "Beta", None)];
    let albums = vec![
        album("al1", "ar1", "First Light", None),
        album("al2", "ar1", "Second Wind", None),
        album("al3", "ar2", "Third Rail", None),
    ];
    let tracks = vec![
        track("t1", "al1", "ar1", "Overture", Some(5.0)),
        track("t2", "al1", "ar1", "Undertow", Some(5.0)),
        track("t3", "al1", "ar1", "Waterline", None),
        track("t4", "al1", "ar1", "Ebb", None),
        track("t5", "al2", "ar1", "Gale", Some(2.0)),
        track("t6", "al2", "ar1", "Doldrums", None),
        track("t7", "al3", "ar2", "Sparks", None),
        track("t8", "al3", "ar2", "Grounded", None),
    ];
    MemoryCatalog::new(artists, albums, tracks)
}
