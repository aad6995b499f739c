//! System capability reporting shared by the OS crates.

use std::process::{Command, Stdio};

use snapreel_common::config::EncoderCommand;

/// A system capability that Snapreel may need.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

impl Capability {
    pub fn new(name: &str, description: &str, available: bool, required: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            available,
            required,
            fix_instructions: None,
        }
    }

    /// Attach fix instructions, shown only when the capability is missing.
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        if !self.available {
            self.fix_instructions = Some(fix.into());
        }
        self
    }

    fn status_label(&self) -> &'static str {
        if self.available {
            "[OK]"
        } else if self.required {
            "[MISSING - REQUIRED]"
        } else {
            "[MISSING - OPTIONAL]"
        }
    }
}

/// Check that the configured encoder can be launched.
pub fn check_encoder(encoder: &EncoderCommand) -> Capability {
    let available = Command::new(&encoder.program)
        .args(&encoder.pre_args)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    Capability::new(
        "Encoder",
        &format!("{} for screen capture and audio merge", encoder.display_name()),
        available,
        true,
    )
    .with_fix("Install ffmpeg and make sure it is on PATH, or set recording.encoder in config.json")
}

/// Whether an executable answers at all (exit status is ignored).
pub fn command_exists(program: &str, probe_arg: &str) -> bool {
    Command::new(program)
        .arg(probe_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Render a user-friendly capability report.
pub fn format_capability_report(capabilities: &[Capability]) -> String {
    let mut out = String::from("Snapreel System Capabilities:\n");
    out.push_str(&"-".repeat(60));
    out.push('\n');

    for cap in capabilities {
        out.push_str(&format!(
            "  {} {}: {}\n",
            cap.status_label(),
            cap.name,
            cap.description
        ));
        if let Some(ref fix) = cap.fix_instructions {
            out.push_str(&format!("    Fix: {fix}\n"));
        }
    }
    out
}

/// True when every required capability is available.
pub fn all_required_available(capabilities: &[Capability]) -> bool {
    capabilities.iter().all(|c| c.available || !c.required)
}
