//! Playback state synchronizer for the Spotify now-playing widget.
//!
//! [`Synchronizer`] owns the implicit-grant session, polls the "currently
//! playing" endpoint and publishes a [`PlaybackSnapshot`] to a
//! [`SnapshotSink`] whenever the view changes.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod poller;
pub mod resolver;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;

pub use api::{PlaybackApi, SpotifyApi};
pub use config::Config;
pub use error::SyncError;
pub use lifecycle::{SnapshotSink, Synchronizer};
pub use storage::Storage;
pub use types::{CachedTrack, PlaybackSnapshot, PollResult, SessionState};
