//! Glue between the synchronizer and the Tauri window.

use anyhow::{Context, Result};
use serde::Serialize;
use tauri::{
    AppHandle, Emitter, Manager, Runtime, State, Url, WebviewUrl, WebviewWindowBuilder, Window,
    WindowEvent,
};

use spotify_widget::{Config, PlaybackSnapshot, SnapshotSink, Synchronizer};

pub const MAIN_WINDOW: &str = "main";
pub const SNAPSHOT_EVENT: &str = "snapshot-updated";

/// Address of the widget page, used to come back from the authorization pages.
struct HomeUrl(Url);

/// What the page receives: the snapshot plus the derived progress bar width.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    #[serde(flatten)]
    snapshot: PlaybackSnapshot,
    progress_percentage: f64,
}

impl From<&PlaybackSnapshot> for SnapshotView {
    fn from(snapshot: &PlaybackSnapshot) -> Self {
        Self {
            snapshot: snapshot.clone(),
            progress_percentage: snapshot.progress_percentage(),
        }
    }
}

/// Pushes snapshots to the page as `snapshot-updated` events.
pub struct EventSink<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> EventSink<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> SnapshotSink for EventSink<R> {
    fn on_snapshot_updated(&self, snapshot: &PlaybackSnapshot) {
        if let Err(e) = self.app.emit(SNAPSHOT_EVENT, SnapshotView::from(snapshot)) {
            log::error!("Failed to emit snapshot: {}", e);
        }
    }
}

/// Create the widget window. Navigations to the redirect URI never load: the
/// fragment token goes to the synchronizer and the window returns to the widget.
pub fn create_main_window<R: Runtime>(
    app: &tauri::App<R>,
    config: &Config,
    sync: Synchronizer,
) -> Result<()> {
    let redirect_uri = config.redirect_uri.clone();
    let handle = app.handle().clone();

    let builder = WebviewWindowBuilder::new(app, MAIN_WINDOW, WebviewUrl::App("index.html".into()))
        .title("Spotify Widget")
        .inner_size(400.0, 200.0)
        .resizable(false)
        .decorations(false)
        .always_on_top(true)
        .skip_taskbar(true)
        .on_navigation(move |url| {
            if !url.as_str().starts_with(&redirect_uri) {
                return true;
            }
            if !sync.handle_redirect(url.as_str()) {
                log::warn!("Authorization redirect did not carry an access token");
            }
            navigate_home(&handle);
            false
        });

    #[cfg(not(target_os = "macos"))]
    let builder = builder.transparent(true);

    let window = builder.build().context("Failed to create main window")?;
    let home = window.url().context("Failed to read main window URL")?;
    app.manage(HomeUrl(home));

    Ok(())
}

/// Leave whatever page the window is on (authorization, redirect) for the widget.
fn navigate_home<R: Runtime>(app: &AppHandle<R>) {
    let app_clone = app.clone();
    // Must run on main thread, the navigation handler is still on the stack
    let _ = app.run_on_main_thread(move || {
        let (Some(window), Some(home)) = (
            app_clone.get_webview_window(MAIN_WINDOW),
            app_clone.try_state::<HomeUrl>(),
        ) else {
            return;
        };
        if let Err(e) = window.navigate(home.0.clone()) {
            log::error!("Failed to return to widget page: {}", e);
        }
    });
}

pub fn show_main_window<R: Runtime>(app: &AppHandle<R>) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        if let Err(e) = window.show().and_then(|_| window.set_focus()) {
            log::error!("Failed to show main window: {}", e);
        }
    }
}

/// Closing the widget only hides it; Quit lives in the tray.
pub fn handle_window_event<R: Runtime>(window: &Window<R>, event: &WindowEvent) {
    if let WindowEvent::CloseRequested { api, .. } = event {
        api.prevent_close();
        if let Err(e) = window.hide() {
            log::error!("Failed to hide window: {}", e);
        }
    }
}

#[tauri::command]
pub fn is_logged_in(sync: State<'_, Synchronizer>) -> bool {
    sync.is_logged_in()
}

#[tauri::command]
pub fn current_snapshot(sync: State<'_, Synchronizer>) -> SnapshotView {
    SnapshotView::from(&sync.snapshot())
}

#[tauri::command]
pub fn login(app: AppHandle, sync: State<'_, Synchronizer>) -> Result<(), String> {
    let Some(auth_url) = sync.login().map_err(|e| format!("{:#}", e))? else {
        return Ok(());
    };
    let url: Url = auth_url.parse().map_err(|e| format!("Invalid authorization URL: {}", e))?;

    let window = app
        .get_webview_window(MAIN_WINDOW)
        .ok_or_else(|| "Main window not found".to_string())?;
    window.navigate(url).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn logout(sync: State<'_, Synchronizer>) {
    sync.logout();
}
