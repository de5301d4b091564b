//! Spotify Web API access: client-credentials token, track search, and raw
//! downloads of the preview clip and cover image.

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Credentials, SpotifyConfig};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no tracks matched \"{0}\"")]
    NoResults(String),
    #[error("client id and secret are not configured")]
    MissingCredentials,
}

/// First search hit, flattened to what the card shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    /// Empty when the catalog has no preview for this track.
    pub preview_url: String,
    pub cover_url: Option<String>,
}

pub trait CatalogApi {
    fn fetch_token(&self, credentials: &Credentials) -> Result<String, CatalogError>;
    fn search_first(&self, token: &str, query: &str) -> Result<TrackInfo, CatalogError>;
    fn download(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
    fn fetch_cover(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}

pub struct SpotifyClient {
    http: Client,
    token_url: String,
    api_base: String,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, timeout: Option<Duration>) -> Result<Self, CatalogError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            token_url: config.token_url.clone(),
            api_base: config.api_base.clone(),
        })
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let response = checked(self.http.get(url).send()?)?;
        Ok(response.bytes()?.to_vec())
    }
}

fn checked(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(CatalogError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

impl CatalogApi for SpotifyClient {
    fn fetch_token(&self, credentials: &Credentials) -> Result<String, CatalogError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;
        let token: TokenResponse = checked(response)?.json()?;
        Ok(token.access_token)
    }

    fn search_first(&self, token: &str, query: &str) -> Result<TrackInfo, CatalogError> {
        let response = self
            .http
            .get(format!("{}/search", self.api_base))
            .bearer_auth(token)
            .query(&[("q", query), ("type", "track"), ("limit", "1")])
            .send()?;
        let page: SearchResponse = checked(response)?.json()?;
        page.first_track()
            .ok_or_else(|| CatalogError::NoResults(query.to_string()))
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        self.get_bytes(url)
    }

    fn fetch_cover(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        self.get_bytes(url)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    name: String,
    #[serde(default)]
    artists: Vec<NamedRef>,
    album: Option<AlbumRef>,
    #[serde(default)]
    duration_ms: u64,
    preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    name: String,
    #[serde(default)]
    images: Vec<ImageRef>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    url: String,
    width: Option<u32>,
}

impl SearchResponse {
    fn first_track(self) -> Option<TrackInfo> {
        let item = self.tracks.items.into_iter().next()?;
        let artist = item
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let (album, cover_url) = match item.album {
            Some(album) => {
                let cover = album
                    .images
                    .into_iter()
                    .max_by_key(|img| img.width.unwrap_or(0))
                    .map(|img| img.url);
                (album.name, cover)
            }
            None => (String::new(), None),
        };

        Some(TrackInfo {
            title: item.name,
            artist,
            album,
            duration_ms: item.duration_ms,
            preview_url: item.preview_url.unwrap_or_default(),
            cover_url,
        })
    }
}
