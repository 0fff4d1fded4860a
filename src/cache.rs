use std::sync::Arc;

use crate::storage::Storage;
use crate::types::CachedTrack;

/// Single-slot, last-write-wins cache of the last observed track.
#[derive(Clone)]
pub struct TrackCache {
    storage: Arc<Storage>,
}

impl TrackCache {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Update the cached track in memory. Returns whether [`TrackCache::flush`]
    /// has anything to write.
    pub fn stage(&self, track: CachedTrack) -> bool {
        let title = track.title.clone();
        let changed = self.storage.stage_last_track(track);
        if changed {
            log::debug!("Caching last track: {}", title);
        }
        changed
    }

    pub fn flush(&self) {
        if let Err(e) = self.storage.flush() {
            log::error!("Failed to persist last track: {:#}", e);
        }
    }

    pub fn load(&self) -> Option<CachedTrack> {
        self.storage.last_track()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str) -> CachedTrack {
        CachedTrack {
            title: title.to_string(),
            artists: vec!["X".to_string()],
            duration_ms: 1000,
        }
    }

    #[test]
    fn empty_until_first_save() {
        let cache = TrackCache::new(Arc::new(Storage::in_memory()));
        assert_eq!(cache.load(), None);
    }

    #[test]
    fn last_write_wins() {
        let cache = TrackCache::new(Arc::new(Storage::in_memory()));
        cache.stage(track("one"));
        cache.stage(track("two"));
        assert_eq!(cache.load(), Some(track("two")));
    }

    #[test]
    fn staging_is_visible_before_flush() {
        let cache = TrackCache::new(Arc::new(Storage::in_memory()));
        assert!(cache.stage(track("one")));
        assert_eq!(cache.load(), Some(track("one")));
        assert!(!cache.stage(track("one")));
        cache.flush();
        assert_eq!(cache.load(), Some(track("one")));
    }
}
