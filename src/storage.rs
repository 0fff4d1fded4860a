use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::CachedTrack;

/// Everything the widget keeps across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub last_track: Option<CachedTrack>,
}

/// Persisted key-value state backing the session store and track cache.
///
/// The document is kept in memory and rewritten as a whole on every change.
/// Without a path (tests) nothing touches the disk.
pub struct Storage {
    path: Option<PathBuf>,
    data: Mutex<PersistedState>,
}

impl Storage {
    /// Open the state file, treating a missing or corrupt file as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match read_state(&path) {
            Ok(Some(state)) => {
                log::info!("Loaded persisted state from {}", path.display());
                state
            }
            Ok(None) => PersistedState::default(),
            Err(e) => {
                log::error!("Ignoring unreadable state file: {:#}", e);
                PersistedState::default()
            }
        };

        Self {
            path: Some(path),
            data: Mutex::new(data),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(PersistedState::default()),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.data.lock().access_token.clone()
    }

    pub fn set_access_token(&self, token: Option<String>) -> Result<()> {
        self.update(|state| state.access_token = token)
    }

    pub fn last_track(&self) -> Option<CachedTrack> {
        self.data.lock().last_track.clone()
    }

    /// Replace the last track in memory only. Returns whether it changed;
    /// [`Storage::flush`] writes it out.
    pub fn stage_last_track(&self, track: CachedTrack) -> bool {
        let mut guard = self.data.lock();
        if guard.last_track.as_ref() == Some(&track) {
            return false;
        }
        guard.last_track = Some(track);
        true
    }

    /// Write the current document to disk.
    pub fn flush(&self) -> Result<()> {
        let guard = self.data.lock();
        match &self.path {
            Some(path) => write_state(path, &guard),
            None => Ok(()),
        }
    }

    /// Apply `change` in memory, then flush. The in-memory value stays updated
    /// even when the flush fails.
    fn update(&self, change: impl FnOnce(&mut PersistedState)) -> Result<()> {
        let mut guard = self.data.lock();
        change(&mut guard);

        match &self.path {
            Some(path) => write_state(path, &guard),
            None => Ok(()),
        }
    }
}

fn read_state(path: &Path) -> Result<Option<PersistedState>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let state = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(state))
}

fn write_state(path: &Path, state: &PersistedState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // Write next to the target and rename so a crash never leaves half a file
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
    std::fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
