//! Show resolved monitor geometry.

use snapreel_capture_engine::platform::resolve_monitors;
use snapreel_platform_core::{fallback_monitor, virtual_desktop_bounds};

pub fn run(json: bool) -> anyhow::Result<()> {
    let (monitors, fallback) = match resolve_monitors() {
        Ok(monitors) => (monitors, false),
        Err(e) => {
            tracing::warn!(error = %e, "Using fallback geometry");
            (vec![fallback_monitor()], true)
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&monitors)?);
        return Ok(());
    }

    if fallback {
        println!("Monitor geometry unavailable; showing the fallback monitor.");
    }
    println!("Monitors: {}", monitors.len());
    for (i, m) in monitors.iter().enumerate() {
        println!(
            "  [{i}] {:<12} {}x{} at ({}, {})  scale {:.2}x  logical {}x{}{}",
            m.name,
            m.width,
            m.height,
            m.x,
            m.y,
            m.scaling,
            m.logical_width(),
            m.logical_height(),
            if m.primary { "  (primary)" } else { "" }
        );
    }
    let (vx, vy, vw, vh) = virtual_desktop_bounds(&monitors);
    println!("Virtual desktop: {vw}x{vh} at ({vx}, {vy})");
    Ok(())
}
