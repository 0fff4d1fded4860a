//! Spotify Web API calls used by the poll loop.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::Config;
use crate::error::SyncError;
use crate::types::{ActiveTrack, PollResult};

/// Remote player endpoints. The poll loop only sees this trait so it can be
/// driven by a scripted fake in tests.
#[async_trait]
pub trait PlaybackApi: Send + Sync {
    /// One "currently playing" request. Never fails: every error is folded into
    /// [`PollResult::TransportError`].
    async fn currently_playing(&self, token: &str) -> PollResult;

    /// Whether the user's player has a device that is not playing.
    async fn needs_resume(&self, token: &str) -> Result<bool, SyncError>;

    /// Send the play command to the user's active device.
    async fn resume_playback(&self, token: &str) -> Result<(), SyncError>;
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlayingResponse {
    #[serde(default)]
    item: Option<Item>,
    #[serde(default)]
    progress_ms: Option<u64>,
    #[serde(default)]
    is_playing: bool,
}

#[derive(Debug, Deserialize)]
struct Item {
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
    #[serde(default)]
    album: Option<Album>,
    #[serde(default)]
    duration_ms: u64,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    images: Vec<AlbumImage>,
}

#[derive(Debug, Deserialize)]
struct AlbumImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PlayerState {
    #[serde(default)]
    is_playing: bool,
}

/// Classify a "currently playing" response: status first, then payload.
pub fn classify(status: StatusCode, body: &[u8]) -> Result<PollResult, SyncError> {
    match status {
        StatusCode::NO_CONTENT => return Ok(PollResult::Empty),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Ok(PollResult::Unauthorized),
        s if !s.is_success() => return Err(SyncError::UnexpectedStatus(s.as_u16())),
        _ => {}
    }

    let response: CurrentlyPlayingResponse = serde_json::from_slice(body)?;
    let Some(item) = response.item else {
        return Ok(PollResult::Empty);
    };

    // Spotify lists album images largest first
    let album_art_url = item
        .album
        .and_then(|album| album.images.into_iter().next())
        .map(|image| image.url)
        .unwrap_or_default();

    Ok(PollResult::Active(ActiveTrack {
        title: item.name,
        artists: item.artists.into_iter().map(|a| a.name).collect(),
        album_art_url,
        progress_ms: response.progress_ms.unwrap_or(0),
        duration_ms: item.duration_ms,
        is_playing: response.is_playing,
    }))
}

/// Decide from a player state response whether a play command is due.
/// 204 means there is no active device, so nothing to resume.
pub fn needs_resume_from(status: StatusCode, body: &[u8]) -> Result<bool, SyncError> {
    match status {
        StatusCode::NO_CONTENT => return Ok(false),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(SyncError::AuthExpired(status.as_u16()))
        }
        s if !s.is_success() => return Err(SyncError::UnexpectedStatus(s.as_u16())),
        _ => {}
    }

    let player: PlayerState = serde_json::from_slice(body)?;
    Ok(!player.is_playing)
}

pub fn check_play_status(status: StatusCode) -> Result<(), SyncError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(SyncError::AuthExpired(status.as_u16()))
        }
        s => Err(SyncError::UnexpectedStatus(s.as_u16())),
    }
}

/// reqwest-backed client for the Spotify Web API.
pub struct SpotifyApi {
    http: reqwest::Client,
    base_url: String,
}

impl SpotifyApi {
    pub fn new(config: &Config) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("spotify-widget/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_currently_playing(&self, token: &str) -> Result<PollResult, SyncError> {
        let response = self
            .http
            .get(self.url("/me/player/currently-playing"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        classify(status, &body)
    }
}

#[async_trait]
impl PlaybackApi for SpotifyApi {
    async fn currently_playing(&self, token: &str) -> PollResult {
        match self.fetch_currently_playing(token).await {
            Ok(result) => result,
            Err(e) => PollResult::TransportError(e.to_string()),
        }
    }

    async fn needs_resume(&self, token: &str) -> Result<bool, SyncError> {
        let response = self
            .http
            .get(self.url("/me/player"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        needs_resume_from(status, &body)
    }

    async fn resume_playback(&self, token: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .put(self.url("/me/player/play"))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;

        check_play_status(response.status())
    }
}
