use anyhow::{Context, Result};
use tauri::{
    menu::{CheckMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem},
    tray::{MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent},
    AppHandle, Manager, Runtime,
};

use spotify_widget::Synchronizer;

use crate::autostart;
use crate::shell;

/// Create the tray icon and store it as app state
pub fn setup<R: Runtime>(app: &AppHandle<R>, sync: Synchronizer) -> Result<()> {
    let menu = build_menu(app)?;

    let mut builder = TrayIconBuilder::new()
        .tooltip("Spotify Widget")
        .menu(&menu)
        .on_menu_event(move |app, event| handle_menu_event(app, event, &sync))
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                shell::show_main_window(tray.app_handle());
            }
        });

    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone().to_owned());
    }

    let tray = builder.build(app).context("Failed to build tray icon")?;
    app.manage(tray);

    Ok(())
}

fn build_menu<R: Runtime>(app: &AppHandle<R>) -> Result<Menu<R>> {
    let menu = Menu::new(app)?;

    let show = MenuItem::with_id(app, "show", "Show", true, None::<&str>)?;
    menu.append(&show)?;

    let logout = MenuItem::with_id(app, "logout", "Log out", true, None::<&str>)?;
    menu.append(&logout)?;

    let separator = PredefinedMenuItem::separator(app)?;
    menu.append(&separator)?;

    let launch_at_login = CheckMenuItem::with_id(
        app,
        "launch_at_login",
        "Launch at Login",
        true,
        autostart::is_enabled(),
        None::<&str>,
    )?;
    menu.append(&launch_at_login)?;

    let quit_item = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
    menu.append(&quit_item)?;

    Ok(menu)
}

fn handle_menu_event<R: Runtime>(app: &AppHandle<R>, event: MenuEvent, sync: &Synchronizer) {
    match event.id().as_ref() {
        "show" => shell::show_main_window(app),
        "logout" => sync.logout(),
        "launch_at_login" => match autostart::toggle() {
            Ok(_) => {
                // Rebuild so the checkbox reflects the registered state
                if let Err(e) = rebuild_menu(app) {
                    log::error!("Failed to rebuild menu after toggle: {}", e);
                }
            }
            Err(e) => log::error!("Failed to toggle launch at login: {}", e),
        },
        "quit" => {
            sync.shutdown();
            app.exit(0);
        }
        other => log::debug!("Unhandled tray menu item: {}", other),
    }
}

fn rebuild_menu<R: Runtime>(app: &AppHandle<R>) -> Result<()> {
    let new_menu = build_menu(app)?;

    if let Some(tray) = app.try_state::<TrayIcon<R>>() {
        tray.set_menu(Some(new_menu))?;
    }

    Ok(())
}
