//! Check system capabilities.

use anyhow::Context;
use snapreel_capture_engine::audio::AudioBackend;
use snapreel_capture_engine::platform::{check_capabilities, display_server, resolve_monitors};
use snapreel_common::config::{config_file_path, AppConfig};
use snapreel_platform_core::capability::{all_required_available, format_capability_report};
use snapreel_platform_core::DisplayServer;

pub fn run(config: &AppConfig, write_config: bool) -> anyhow::Result<()> {
    println!("Snapreel System Check");
    println!("{}", "=".repeat(50));

    match display_server() {
        DisplayServer::Unknown => println!("[WARN] Display server: Unknown"),
        DisplayServer::Wayland => {
            println!("[WARN] Display server: Wayland (capture goes through XWayland)")
        }
        other => println!("[OK] Display server: {other:?}"),
    }

    match resolve_monitors() {
        Ok(monitors) => {
            println!("[OK] Monitors detected: {}", monitors.len());
            for m in &monitors {
                println!(
                    "     {} {}x{} (scale: {}x) {}",
                    m.name,
                    m.width,
                    m.height,
                    m.scaling,
                    if m.primary { "(primary)" } else { "" }
                );
            }
        }
        Err(e) => println!("[WARN] Monitors: {e} (a 1920x1080 fallback will be used)"),
    }

    println!("[OK] Audio backend: {:?}", AudioBackend::detect());
    let config_path = config_file_path();
    if write_config {
        config
            .save()
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("[OK] Config written: {}", config_path.display());
    } else if config_path.exists() {
        println!("[OK] Config file: {}", config_path.display());
    } else {
        println!("[INFO] No config file at {} (defaults in use)", config_path.display());
    }

    let capabilities = check_capabilities(&config.recording.encoder);
    println!();
    print!("{}", format_capability_report(&capabilities));

    println!();
    if all_required_available(&capabilities) {
        println!("All required capabilities are available. Snapreel is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
