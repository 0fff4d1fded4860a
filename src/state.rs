use parking_lot::RwLock;
use std::sync::Arc;

use crate::types::{PlaybackSnapshot, SessionState};

#[derive(Debug, Clone)]
pub struct AppState {
    pub session_state: SessionState,
    pub current: PlaybackSnapshot,
    /// Bumped on every login/logout; a poll started under an older value is discarded
    pub generation: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            session_state: SessionState::LoggedOut,
            current: PlaybackSnapshot::not_logged_in(),
            generation: 0,
        }
    }
}

pub type SharedState = Arc<RwLock<AppState>>;

pub fn create_state() -> SharedState {
    Arc::new(RwLock::new(AppState::default()))
}
