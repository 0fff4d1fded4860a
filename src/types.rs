use serde::{Deserialize, Serialize};

/// Title shown while the service reports nothing and no track was ever cached.
pub const NOTHING_PLAYING_TITLE: &str = "No song playing";

/// Title shown while there is no session.
pub const NOT_LOGGED_IN_TITLE: &str = "Not logged in";

/// Last track observed on the remote, kept as a fallback for "nothing playing" gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTrack {
    pub title: String,
    pub artists: Vec<String>,
    pub duration_ms: u64,
}

/// A track the remote reports as currently loaded in the user's player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTrack {
    pub title: String,
    pub artists: Vec<String>,
    pub album_art_url: String,
    pub progress_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
}

impl ActiveTrack {
    pub fn to_cached(&self) -> CachedTrack {
        CachedTrack {
            title: self.title.clone(),
            artists: self.artists.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Outcome of one "currently playing" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Active(ActiveTrack),
    /// No active playback session on the service (204 or a body without `item`)
    Empty,
    /// The token was rejected (401/403)
    Unauthorized,
    /// Network failure, timeout, unexpected status or malformed payload
    TransportError(String),
}

/// The single view of "what is playing" handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub title: String,
    pub artist: String,
    pub album_art_url: String,
    pub progress_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
}

impl PlaybackSnapshot {
    fn placeholder(title: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: String::new(),
            album_art_url: String::new(),
            progress_ms: 0,
            duration_ms: 0,
            is_playing: false,
        }
    }

    pub fn not_logged_in() -> Self {
        Self::placeholder(NOT_LOGGED_IN_TITLE)
    }

    pub fn nothing_playing() -> Self {
        Self::placeholder(NOTHING_PLAYING_TITLE)
    }

    /// Build a snapshot from a live track, clamping progress into `[0, duration]`.
    pub fn from_active(track: &ActiveTrack) -> Self {
        let progress_ms = if track.duration_ms > 0 {
            track.progress_ms.min(track.duration_ms)
        } else {
            track.progress_ms
        };

        Self {
            title: track.title.clone(),
            artist: join_artists(&track.artists),
            album_art_url: track.album_art_url.clone(),
            progress_ms,
            duration_ms: track.duration_ms,
            is_playing: track.is_playing,
        }
    }

    /// Stale view of a cached track: no artwork, progress rewound, paused.
    pub fn from_cached(track: &CachedTrack) -> Self {
        Self {
            title: track.title.clone(),
            artist: join_artists(&track.artists),
            album_art_url: String::new(),
            progress_ms: 0,
            duration_ms: track.duration_ms,
            is_playing: false,
        }
    }

    /// Progress as a percentage of the duration, 0 when the duration is unknown.
    pub fn progress_percentage(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.progress_ms as f64 / self.duration_ms as f64 * 100.0
    }
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self::not_logged_in()
    }
}

/// Login state of the session lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
}

pub fn join_artists(artists: &[String]) -> String {
    artists.join(", ")
}
