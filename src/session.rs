use std::sync::Arc;

use crate::storage::Storage;

/// Owns the single access token. Cloning shares the same backing storage.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub fn get(&self) -> Option<String> {
        self.storage.access_token()
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }

    /// Store `token`, replacing any previous one. Blank tokens are rejected.
    /// Returns whether the token was accepted.
    pub fn set(&self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            log::warn!("Rejected empty access token");
            return false;
        }

        if let Err(e) = self.storage.set_access_token(Some(token.to_string())) {
            // The session still works for this run, it just won't survive a restart
            log::error!("Failed to persist access token: {:#}", e);
        }
        true
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.set_access_token(None) {
            log::error!("Failed to clear persisted access token: {:#}", e);
        }
    }
}
