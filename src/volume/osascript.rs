// macOS output volume through `osascript`
//
// Each call starts a child process, so this backend only ever runs on the
// mixer thread of a `DeferredVolume`.

use std::process::Command;

use crate::error::VolumeControlError;
use crate::volume::deferred::MixerBackend;
use crate::volume::to_percent;

fn run(program: &str, args: &[&str]) -> Result<String, VolumeControlError> {
    let command = format!("{} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| VolumeControlError::Unavailable {
            reason: format!("{}: {}", program, e),
        })?;

    if !output.status.success() {
        return Err(VolumeControlError::CommandFailed {
            command,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `output volume of (get volume settings)` reply as a level in [0, 1]
pub fn parse_osascript_level(output: &str) -> Result<f64, VolumeControlError> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| (v / 100.0).clamp(0.0, 1.0))
        .ok_or_else(|| VolumeControlError::ParseFailed {
            output: output.trim().to_string(),
        })
}

/// AppleScript `volume settings`
#[derive(Debug, Clone, Copy, Default)]
pub struct Osascript;

impl MixerBackend for Osascript {
    fn apply(&mut self, level: f64) -> Result<(), VolumeControlError> {
        let script = format!("set volume output volume {}", to_percent(level));
        run("osascript", &["-e", &script])?;
        Ok(())
    }

    fn read(&mut self) -> Result<f64, VolumeControlError> {
        let output = run("osascript", &["-e", "output volume of (get volume settings)"])?;
        parse_osascript_level(&output)
    }
}
