use anyhow::Result;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use url::form_urlencoded;

use crate::api::PlaybackApi;
use crate::cache::TrackCache;
use crate::config::{Config, SCOPES};
use crate::error::SyncError;
use crate::poller::PollLoop;
use crate::resolver;
use crate::session::SessionStore;
use crate::state::{self, AppState, SharedState};
use crate::storage::Storage;
use crate::types::{PlaybackSnapshot, PollResult, SessionState};

/// Receives every snapshot that differs from the previous one.
///
/// Called while the state lock is held so publications arrive in order;
/// implementations must not block.
pub trait SnapshotSink: Send + Sync {
    fn on_snapshot_updated(&self, snapshot: &PlaybackSnapshot);
}

/// Session lifecycle controller and owner of the poll loop.
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    session: SessionStore,
    cache: TrackCache,
    api: Arc<dyn PlaybackApi>,
    sink: Arc<dyn SnapshotSink>,
    state: SharedState,
    poll_loop: PollLoop,
    resume_pending: Arc<AtomicBool>,
    runtime: Handle,
}

/// Clears the resume flag when the resume task ends, however it ends.
struct ResumePending(Arc<AtomicBool>);

impl Drop for ResumePending {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.poll_loop.stop();
    }
}

impl Synchronizer {
    pub fn new(
        config: Config,
        storage: Arc<Storage>,
        api: Arc<dyn PlaybackApi>,
        sink: Arc<dyn SnapshotSink>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                session: SessionStore::new(storage.clone()),
                cache: TrackCache::new(storage),
                api,
                sink,
                state: state::create_state(),
                poll_loop: PollLoop::new(),
                resume_pending: Arc::new(AtomicBool::new(false)),
                runtime,
            }),
        }
    }

    /// Pick up a token persisted by a previous run. Returns whether a session
    /// was restored.
    pub fn restore(&self) -> bool {
        if !self.inner.session.is_present() {
            log::info!("No persisted session, waiting for login");
            return false;
        }
        log::info!("Restoring persisted session");
        self.enter_logged_in();
        true
    }

    /// Authorization URL to navigate to, or `None` when already logged in.
    pub fn login(&self) -> Result<Option<String>> {
        if self.is_logged_in() {
            log::debug!("Login requested while already logged in, ignoring");
            return Ok(None);
        }
        self.inner.config.validate_for_login()?;
        log::info!("Starting authorization");
        Ok(Some(authorization_url(&self.inner.config)))
    }

    /// Handle the authorization callback. Returns `true` when the URL carried
    /// a token, in which case the caller should clear the fragment from the
    /// visible address.
    pub fn handle_redirect(&self, url: &str) -> bool {
        let Some(token) = token_from_fragment(url) else {
            return false;
        };
        if !self.inner.session.set(&token) {
            return false;
        }
        log::info!("Received access token from authorization redirect");
        self.enter_logged_in();
        true
    }

    pub fn logout(&self) {
        log::info!("Logging out");
        let mut state = self.inner.state.write();
        self.invalidate_session(&mut state);
    }

    /// Stop polling without touching the session, for app exit.
    pub fn shutdown(&self) {
        if self.inner.poll_loop.stop() {
            log::info!("Poll loop cancelled for shutdown");
        }
        self.inner.state.write().generation += 1;
    }

    pub fn is_logged_in(&self) -> bool {
        self.session_state() == SessionState::LoggedIn
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.state.read().session_state
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.inner.state.read().current.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.poll_loop.is_running()
    }

    fn enter_logged_in(&self) {
        let mut state = self.inner.state.write();
        if state.session_state == SessionState::LoggedOut {
            state.session_state = SessionState::LoggedIn;
            state.generation += 1;
            // Show the last known track straight away instead of waiting a tick
            let snapshot = resolver::fallback(self.inner.cache.load().as_ref());
            self.publish(&mut state, snapshot);
        }
        // Under the lock so a logout can't slip in before the loop exists
        self.start_polling(state.generation);
    }

    /// Logout transition. Runs under the state lock so a tick in flight can't
    /// publish after it.
    fn invalidate_session(&self, state: &mut AppState) {
        self.inner.poll_loop.stop();
        self.inner.session.clear();
        state.session_state = SessionState::LoggedOut;
        state.generation += 1;
        self.publish(state, PlaybackSnapshot::not_logged_in());
    }

    fn start_polling(&self, generation: u64) {
        let interval = self.inner.config.poll_interval();
        let runtime = &self.inner.runtime;
        let weak = Arc::downgrade(&self.inner);

        let started = self.inner.poll_loop.start(runtime, generation, interval, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => Synchronizer { inner }.tick(generation).await,
                    None => ControlFlow::Break(()),
                }
            }
        });

        if started {
            log::info!("Polling currently playing every {}ms", interval.as_millis());
        }
    }

    async fn tick(&self, generation: u64) -> ControlFlow<()> {
        // Read the token fresh so a re-login mid-session is picked up
        let Some(token) = self.inner.session.get() else {
            let mut state = self.inner.state.write();
            if state.generation == generation {
                log::warn!("Access token disappeared, logging out");
                self.invalidate_session(&mut state);
            }
            return ControlFlow::Break(());
        };

        let poll = self.inner.api.currently_playing(&token).await;
        self.apply(generation, &token, poll)
    }

    fn apply(&self, generation: u64, token: &str, poll: PollResult) -> ControlFlow<()> {
        match &poll {
            PollResult::Active(track) => log::debug!(
                "Now playing: {} ({}/{}ms, playing={})",
                track.title,
                track.progress_ms,
                track.duration_ms,
                track.is_playing
            ),
            PollResult::Empty => log::debug!("Nothing playing on the service"),
            PollResult::Unauthorized => log::warn!("Access token rejected by the service"),
            PollResult::TransportError(e) => {
                log::warn!("Poll failed, keeping last snapshot: {}", e)
            }
        }

        let cached = self.inner.cache.load();
        let mut state = self.inner.state.write();

        if state.generation != generation || state.session_state != SessionState::LoggedIn {
            log::debug!("Discarding poll result from a stopped session");
            return ControlFlow::Break(());
        }

        let resolution = resolver::resolve(Some(&poll), cached.as_ref(), true, &state.current);

        if resolution.invalidate_session {
            self.invalidate_session(&mut state);
            return ControlFlow::Break(());
        }

        let cache_dirty = resolution
            .cache_update
            .is_some_and(|track| self.inner.cache.stage(track));
        self.publish(&mut state, resolution.snapshot);
        drop(state);

        if cache_dirty {
            self.inner.cache.flush();
        }

        if let PollResult::Active(track) = &poll {
            if !track.is_playing && self.inner.config.resume_when_paused {
                self.spawn_resume(token.to_string());
            }
        }

        ControlFlow::Continue(())
    }

    fn publish(&self, state: &mut AppState, snapshot: PlaybackSnapshot) {
        if state.current == snapshot {
            return;
        }
        state.current = snapshot;
        self.inner.sink.on_snapshot_updated(&state.current);
    }

    /// Fire-and-forget resume of the user's player. At most one runs at a
    /// time and it dies with the poll loop, so nothing is sent after logout.
    fn spawn_resume(&self, token: String) {
        let Some(cancel) = self.inner.poll_loop.child_token() else {
            return;
        };
        if self.inner.resume_pending.swap(true, Ordering::AcqRel) {
            log::debug!("Resume already in flight, skipping");
            return;
        }
        let pending = ResumePending(self.inner.resume_pending.clone());
        let api = self.inner.api.clone();

        self.inner.runtime.spawn(async move {
            let _pending = pending;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("Resume abandoned, session ended");
                    return;
                }
                result = resume(api.as_ref(), &token, &cancel) => result,
            };

            match result {
                Ok(true) => log::info!("Resumed playback"),
                Ok(false) => log::debug!("Nothing to resume"),
                Err(e) if e.is_auth_expired() => {
                    log::warn!("Resume rejected, token will be dropped on the next poll: {}", e)
                }
                Err(e) => log::warn!("Failed to resume playback: {}", e),
            }
        });
    }
}

async fn resume(
    api: &dyn PlaybackApi,
    token: &str,
    cancel: &CancellationToken,
) -> Result<bool, SyncError> {
    if !api.needs_resume(token).await? || cancel.is_cancelled() {
        return Ok(false);
    }
    api.resume_playback(token).await?;
    Ok(true)
}

/// Implicit-grant authorization URL for `config`.
pub fn authorization_url(config: &Config) -> String {
    let encode = |value: &str| form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>();

    format!(
        "{}?client_id={}&response_type=token&redirect_uri={}&scope={}",
        config.authorize_url,
        encode(&config.client_id),
        encode(&config.redirect_uri),
        SCOPES.join("%20"),
    )
}

/// Extract `access_token` from the URL fragment. The query string is ignored.
pub fn token_from_fragment(url: &str) -> Option<String> {
    let (_, fragment) = url.split_once('#')?;
    let mut token = None;

    for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" => token = Some(value.into_owned()),
            "expires_in" => log::info!("Access token expires in {}s", value),
            "error" => log::warn!("Authorization was not granted: {}", value),
            _ => {}
        }
    }

    token.filter(|t| !t.trim().is_empty())
}
