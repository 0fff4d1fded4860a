use anyhow::{Context, Result};
use auto_launch::AutoLaunchBuilder;

const APP_NAME: &str = "SpotifyWidget";

fn get_auto_launch() -> Result<auto_launch::AutoLaunch> {
    let current_exe = std::env::current_exe().context("Failed to get current executable path")?;

    // Register the .app bundle on macOS, not the binary inside it
    let app_path = match current_exe.to_string_lossy().find(".app/Contents/MacOS") {
        Some(idx) if cfg!(target_os = "macos") => {
            current_exe.to_string_lossy()[..idx + 4].to_string()
        }
        _ => current_exe.to_string_lossy().to_string(),
    };

    let mut builder = AutoLaunchBuilder::new();
    builder.set_app_name(APP_NAME).set_app_path(&app_path);

    #[cfg(target_os = "macos")]
    builder.set_macos_launch_mode(auto_launch::MacOSLaunchMode::LaunchAgent);

    builder.build().context("Failed to create AutoLaunch instance")
}

pub fn is_enabled() -> bool {
    match get_auto_launch() {
        Ok(auto_launch) => auto_launch.is_enabled().unwrap_or(false),
        Err(e) => {
            log::warn!("Failed to check auto-launch status: {}", e);
            false
        }
    }
}

/// Register for launch at login unless the user already has it.
pub fn ensure_enabled() -> Result<()> {
    let auto_launch = get_auto_launch()?;
    if auto_launch.is_enabled().unwrap_or(false) {
        return Ok(());
    }
    auto_launch.enable().context("Failed to enable auto-launch")?;
    log::info!("Registered {} to launch at login", APP_NAME);
    Ok(())
}

/// Flip launch at login from the tray and return the new state.
pub fn toggle() -> Result<bool> {
    let auto_launch = get_auto_launch()?;
    let enable = !auto_launch.is_enabled().unwrap_or(false);

    if enable {
        auto_launch.enable().context("Failed to enable auto-launch")?;
    } else {
        auto_launch.disable().context("Failed to disable auto-launch")?;
    }
    log::info!("Launch at login {}", if enable { "enabled" } else { "disabled" });
    Ok(enable)
}
