//! HTTP catalog client
//!
//! Talks to the media server's REST surface with a token header and
//! JSON payloads. The connect step resolves the configured library name
//! to its section id and identity stamp once; everything else addresses
//! items directly.

use crate::catalog::client::{CatalogReader, CatalogWriter, LibraryIdentity, TaggedItem};
use crate::catalog::{Album, Artist, Catalog, Track};
use crate::config::CatalogConfig;
use crate::{EngineError, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use rime_common::db::ItemKind;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Token header expected by the media server
const TOKEN_HEADER: &str = "X-Catalog-Token";

/// HTTP implementation of the catalog contracts
pub struct HttpCatalog {
    http: Client,
    base_url: String,
    section_id: String,
    identity: LibraryIdentity,
}

#[derive(Debug, Deserialize)]
struct SectionResponse {
    id: String,
    uuid: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    id: String,
    title: String,
    user_rating: Option<f32>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumItem {
    id: String,
    artist_id: String,
    title: String,
    user_rating: Option<f32>,
    critic_rating: Option<f32>,
    #[serde(default)]
    live: bool,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    id: String,
    album_id: String,
    artist_id: String,
    title: String,
    #[serde(default)]
    duration_ms: u64,
    user_rating: Option<f32>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TaggedItemResponse {
    id: String,
    user_rating: Option<f32>,
}

impl HttpCatalog {
    /// Connect to the media server and resolve the configured library.
    pub async fn connect(config: &CatalogConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            TOKEN_HEADER,
            header::HeaderValue::from_str(&config.token)
                .map_err(|_| EngineError::Catalog("catalog token is not a valid header value".into()))?,
        );

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()?;

        let base_url = config.url.trim_end_matches('/').to_string();
        let url = format!("{}/library/sections/{}", base_url, config.library);
        let response = http.get(&url).send().await?;
        let section: SectionResponse = Self::parse(response, "library section").await?;

        info!(library = %section.title, stamp = %section.uuid, "Connected to catalog");

        Ok(Self {
            http,
            base_url,
            section_id: section.id,
            identity: LibraryIdentity {
                name: section.title,
                stamp: section.uuid,
            },
        })
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Catalog(format!(
                "{what} request returned {status}: {body}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| EngineError::Catalog(format!("failed to parse {what} response: {e}")))
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() || status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(EngineError::Catalog(format!(
            "{what} request returned {status}: {body}"
        )))
    }

    fn section_url(&self, tail: &str) -> String {
        format!("{}/library/sections/{}/{}", self.base_url, self.section_id, tail)
    }

    fn item_url(&self, id: &str, tail: &str) -> String {
        format!("{}/library/items/{}/{}", self.base_url, id, tail)
    }
}

#[async_trait]
impl CatalogReader for HttpCatalog {
    async fn library_identity(&self) -> Result<LibraryIdentity> {
        Ok(self.identity.clone())
    }

    async fn fetch_catalog(&self) -> Result<Catalog> {
        debug!("Fetching artists");
        let artists: ItemsResponse<ArtistItem> = Self::parse(
            self.http.get(self.section_url("all?type=artist")).send().await?,
            "artist listing",
        )
        .await?;

        debug!("Fetching albums");
        let albums: ItemsResponse<AlbumItem> = Self::parse(
            self.http.get(self.section_url("all?type=album")).send().await?,
            "album listing",
        )
        .await?;

        debug!("Fetching tracks");
        let tracks: ItemsResponse<TrackItem> = Self::parse(
            self.http.get(self.section_url("all?type=track")).send().await?,
            "track listing",
        )
        .await?;

        let artists = artists
            .items
            .into_iter()
            .map(|a| Artist {
                id: a.id,
                name: a.title,
                rating: a.user_rating,
                tags: a.tags,
            })
            .collect();
        let albums = albums
            .items
            .into_iter()
            .map(|a| Album {
                id: a.id,
                artist_id: a.artist_id,
                name: a.title,
                rating: a.user_rating,
                critic_rating: a.critic_rating,
                live: a.live,
                tags: a.tags,
            })
            .collect();
        let tracks = tracks
            .items
            .into_iter()
            .map(|t| Track {
                id: t.id,
                album_id: t.album_id,
                artist_id: t.artist_id,
                name: t.title,
                duration_ms: t.duration_ms,
                rating: t.user_rating,
                tags: t.tags,
            })
            .collect();

        let catalog = Catalog::new(artists, albums, tracks);
        info!(
            artists = catalog.artists().len(),
            albums = catalog.albums().len(),
            tracks = catalog.tracks().len(),
            "Catalog snapshot loaded"
        );
        Ok(catalog)
    }

    async fn fetch_tagged(&self, kind: ItemKind, tag: &str) -> Result<Vec<TaggedItem>> {
        let url = self.section_url(&format!("tagged?type={}&tag={}", kind.as_str(), tag));
        let items: ItemsResponse<TaggedItemResponse> =
            Self::parse(self.http.get(url).send().await?, "tagged listing").await?;
        Ok(items
            .items
            .into_iter()
            .map(|i| TaggedItem {
                id: i.id,
                kind,
                rating: i.user_rating,
            })
            .collect())
    }
}

#[async_trait]
impl CatalogWriter for HttpCatalog {
    async fn write_rating(&self, id: &str, kind: ItemKind, value: f32) -> Result<()> {
        debug!(id, kind = kind.as_str(), value, "Writing rating");
        let response = self
            .http
            .put(self.item_url(id, "rating"))
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await?;
        Self::check(response, "rating write").await
    }

    async fn clear_rating(&self, id: &str, kind: ItemKind) -> Result<()> {
        debug!(id, kind = kind.as_str(), "Clearing rating");
        let response = self.http.delete(self.item_url(id, "rating")).send().await?;
        Self::check(response, "rating clear").await
    }

    async fn add_tag(&self, id: &str, kind: ItemKind, tag: &str) -> Result<()> {
        debug!(id, kind = kind.as_str(), tag, "Adding tag");
        let response = self
            .http
            .put(self.item_url(id, &format!("tags/{tag}")))
            .send()
            .await?;
        Self::check(response, "tag add").await
    }

    async fn remove_tag(&self, id: &str, kind: ItemKind, tag: &str) -> Result<()> {
        debug!(id, kind = kind.as_str(), tag, "Removing tag");
        let response = self
            .http
            .delete(self.item_url(id, &format!("tags/{tag}")))
            .send()
            .await?;
        Self::check(response, "tag remove").await
    }
}
