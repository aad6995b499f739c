//! Snapreel Linux Platform Integration
//!
//! - **Display Detection:** xrandr monitor enumeration and DPI handling
//! - **Permissions:** Capability detection and user guidance

pub mod display;
pub mod permissions;

pub use display::*;
