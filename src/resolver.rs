//! Merges a poll result with the cached track and session presence into the
//! snapshot shown to the user.
//!
//! Pure: the caller applies the returned cache update and session
//! invalidation, in that order, before publishing the snapshot.

use crate::types::{CachedTrack, PlaybackSnapshot, PollResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub snapshot: PlaybackSnapshot,
    /// Track to write to the cache before the snapshot is published
    pub cache_update: Option<CachedTrack>,
    /// The token was rejected and the session has to be torn down
    pub invalidate_session: bool,
}

impl Resolution {
    fn show(snapshot: PlaybackSnapshot) -> Self {
        Self {
            snapshot,
            cache_update: None,
            invalidate_session: false,
        }
    }
}

/// `poll` is `None` when the poller was not invoked for this tick.
pub fn resolve(
    poll: Option<&PollResult>,
    cached: Option<&CachedTrack>,
    session_present: bool,
    previous: &PlaybackSnapshot,
) -> Resolution {
    if !session_present {
        return Resolution::show(PlaybackSnapshot::not_logged_in());
    }

    match poll {
        None => Resolution::show(previous.clone()),
        Some(PollResult::Active(track)) => Resolution {
            snapshot: PlaybackSnapshot::from_active(track),
            cache_update: Some(track.to_cached()),
            invalidate_session: false,
        },
        Some(PollResult::Empty) => Resolution::show(fallback(cached)),
        Some(PollResult::Unauthorized) => Resolution {
            snapshot: PlaybackSnapshot::not_logged_in(),
            cache_update: None,
            invalidate_session: true,
        },
        // Stale but valid: keep showing what we had until a tick succeeds
        Some(PollResult::TransportError(_)) => Resolution::show(previous.clone()),
    }
}

/// What to show while the service reports nothing playing.
pub fn fallback(cached: Option<&CachedTrack>) -> PlaybackSnapshot {
    match cached {
        Some(track) => PlaybackSnapshot::from_cached(track),
        None => PlaybackSnapshot::nothing_playing(),
    }
}
