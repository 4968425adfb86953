//! Catalog model
//!
//! Typed in-memory snapshot of one music library as read from the
//! external store: artists, albums, and tracks with their current
//! ratings, durations, critic ratings, and tag sets. Items reference
//! their parents by identifier; the snapshot owns nothing in the
//! external store and is rebuilt at every phase start.

pub mod client;
pub mod filters;
pub mod http;

pub use client::{
    write_with_retry, CatalogReader, CatalogWriter, LibraryIdentity, TaggedItem, WriteOp,
};
pub use filters::{normalized_title, NoiseFilter, TwinFilter};

use rime_common::sort_key::sort_key;
use std::collections::HashMap;

/// One artist in the catalog snapshot
#[derive(Debug, Clone)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub rating: Option<f32>,
    pub tags: Vec<String>,
}

/// One album in the catalog snapshot
#[derive(Debug, Clone)]
pub struct Album {
    pub id: String,
    pub artist_id: String,
    pub name: String,
    pub rating: Option<f32>,
    /// Critic rating on the 0-10 scale, when the catalog has one
    pub critic_rating: Option<f32>,
    /// Live album flag from catalog metadata
    pub live: bool,
    pub tags: Vec<String>,
}

/// One track in the catalog snapshot
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub album_id: String,
    pub artist_id: String,
    pub name: String,
    pub duration_ms: u64,
    pub rating: Option<f32>,
    pub tags: Vec<String>,
}

/// Full library snapshot with parent/child indexes
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    artists: Vec<Artist>,
    albums: Vec<Album>,
    tracks: Vec<Track>,
    artist_by_id: HashMap<String, usize>,
    album_by_id: HashMap<String, usize>,
    track_by_id: HashMap<String, usize>,
    albums_by_artist: HashMap<String, Vec<usize>>,
    tracks_by_album: HashMap<String, Vec<usize>>,
}

impl Catalog {
    pub fn new(artists: Vec<Artist>, albums: Vec<Album>, tracks: Vec<Track>) -> Self {
        let mut catalog = Catalog {
            artists,
            albums,
            tracks,
            ..Default::default()
        };

        for (i, artist) in catalog.artists.iter().enumerate() {
            catalog.artist_by_id.insert(artist.id.clone(), i);
        }
        for (i, album) in catalog.albums.iter().enumerate() {
            catalog.album_by_id.insert(album.id.clone(), i);
            catalog
                .albums_by_artist
                .entry(album.artist_id.clone())
                .or_default()
                .push(i);
        }
        for (i, track) in catalog.tracks.iter().enumerate() {
            catalog.track_by_id.insert(track.id.clone(), i);
            catalog
                .tracks_by_album
                .entry(track.album_id.clone())
                .or_default()
                .push(i);
        }

        catalog
    }

    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn artist(&self, id: &str) -> Option<&Artist> {
        self.artist_by_id.get(id).map(|&i| &self.artists[i])
    }

    pub fn album(&self, id: &str) -> Option<&Album> {
        self.album_by_id.get(id).map(|&i| &self.albums[i])
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.track_by_id.get(id).map(|&i| &self.tracks[i])
    }

    /// Albums belonging to an artist
    pub fn albums_of(&self, artist_id: &str) -> impl Iterator<Item = &Album> {
        self.albums_by_artist
            .get(artist_id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.albums[i])
    }

    /// Tracks belonging to an album
    pub fn tracks_of(&self, album_id: &str) -> impl Iterator<Item = &Track> {
        self.tracks_by_album
            .get(album_id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.tracks[i])
    }

    /// Total item count across all three levels. This is the N that
    /// drives the dynamic-precision threshold.
    pub fn total_items(&self) -> usize {
        self.artists.len() + self.albums.len() + self.tracks.len()
    }

    /// Display name of an artist, for progress logging
    pub fn artist_name(&self, artist_id: &str) -> &str {
        self.artist(artist_id).map(|a| a.name.as_str()).unwrap_or("Unknown")
    }
}

impl Artist {
    pub fn sort_key(&self) -> String {
        sort_key(&self.name)
    }
}

impl Album {
    pub fn sort_key(&self) -> String {
        sort_key(&self.name)
    }
}

impl Track {
    pub fn sort_key(&self) -> String {
        sort_key(&self.name)
    }
}
