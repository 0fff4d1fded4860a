// Prevents additional console window on Windows in release
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod autostart;
mod shell;
mod tray;

use std::sync::Arc;
use tauri::Manager;
use tokio::runtime::Handle;

use spotify_widget::{Config, SpotifyApi, Storage, Synchronizer};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Spotify widget");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load config, using defaults: {:#}", e);
            Config::default()
        }
    };

    // One runtime shared by Tauri and the poll loop
    let runtime = tokio::runtime::Runtime::new().expect("failed to start async runtime");
    tauri::async_runtime::set(runtime.handle().clone());
    let runtime_handle = runtime.handle().clone();

    tauri::Builder::default()
        .invoke_handler(tauri::generate_handler![
            shell::is_logged_in,
            shell::current_snapshot,
            shell::login,
            shell::logout,
        ])
        .on_window_event(shell::handle_window_event)
        .setup(move |app| setup_app(app, config, runtime_handle))
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(run_handler);
}

fn setup_app(
    app: &mut tauri::App,
    config: Config,
    runtime: Handle,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Setting up application");

    // Menu bar / tray only, no dock icon
    #[cfg(target_os = "macos")]
    app.set_activation_policy(tauri::ActivationPolicy::Accessory);

    let storage = Arc::new(Storage::open(config.state_path()));
    let api = Arc::new(SpotifyApi::new(&config)?);
    let sink = Arc::new(shell::EventSink::new(app.handle().clone()));
    let sync = Synchronizer::new(config.clone(), storage, api, sink, runtime);

    shell::create_main_window(app, &config, sync.clone())?;
    tray::setup(app.handle(), sync.clone())?;
    log::info!("System tray initialized");

    if config.launch_at_login {
        if let Err(e) = autostart::ensure_enabled() {
            log::warn!("Failed to register launch at login: {:#}", e);
        }
    }

    sync.restore();
    app.manage(sync);

    Ok(())
}

fn run_handler(app_handle: &tauri::AppHandle, event: tauri::RunEvent) {
    match event {
        tauri::RunEvent::ExitRequested { .. } | tauri::RunEvent::Exit => {
            if let Some(sync) = app_handle.try_state::<Synchronizer>() {
                sync.shutdown();
            }
        }
        _ => {}
    }
}
