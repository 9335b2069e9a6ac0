// Volume module - output volume strategies
//
// One implementation per platform, chosen once by `platform_default()` and
// injected into the supervisor. System mixers sit behind `DeferredVolume`
// so the capture thread never waits on them.

#[cfg(all(target_os = "linux", feature = "alsa-mixer"))]
pub mod alsa_mixer;
pub mod deferred;
pub mod osascript;
pub mod software;

#[cfg(all(target_os = "linux", feature = "alsa-mixer"))]
pub use alsa_mixer::AlsaMixer;
pub use deferred::{DeferredVolume, MixerBackend};
pub use osascript::Osascript;
pub use software::{SoftwareVolume, SoftwareVolumeHandle};

use crate::error::VolumeControlError;

/// Capability for reading and writing the output volume
///
/// Levels are in [0, 1]; implementations clamp before use.
pub trait VolumeController: Send {
    fn set_volume(&mut self, level: f64) -> Result<(), VolumeControlError>;

    fn get_volume(&mut self) -> Result<f64, VolumeControlError>;

    /// Re-acquire the underlying mixer after a failure
    fn reinitialize(&mut self) -> Result<(), VolumeControlError> {
        Ok(())
    }

    fn name(&self) -> &str;
}

impl<T: VolumeController + ?Sized> VolumeController for Box<T> {
    fn set_volume(&mut self, level: f64) -> Result<(), VolumeControlError> {
        (**self).set_volume(level)
    }

    fn get_volume(&mut self) -> Result<f64, VolumeControlError> {
        (**self).get_volume()
    }

    fn reinitialize(&mut self) -> Result<(), VolumeControlError> {
        (**self).reinitialize()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Integer percentage for mixer commands
pub(crate) fn to_percent(level: f64) -> u32 {
    if !level.is_finite() {
        return 0;
    }
    (level.clamp(0.0, 1.0) * 100.0).round() as u32
}

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "linux", feature = "alsa-mixer"))] {
        /// The system mixer strategy for this platform
        pub fn platform_default() -> Result<Box<dyn VolumeController>, VolumeControlError> {
            Ok(Box::new(DeferredVolume::spawn("alsa", AlsaMixer::open_default)?))
        }
    } else if #[cfg(target_os = "macos")] {
        /// The system mixer strategy for this platform
        pub fn platform_default() -> Result<Box<dyn VolumeController>, VolumeControlError> {
            Ok(Box::new(DeferredVolume::spawn("osascript", || Ok(Osascript))?))
        }
    } else if #[cfg(target_os = "linux")] {
        /// Linux needs the `alsa-mixer` feature for a system mixer
        pub fn platform_default() -> Result<Box<dyn VolumeController>, VolumeControlError> {
            Err(VolumeControlError::UnsupportedPlatform {
                platform: "linux (built without the `alsa-mixer` feature)".to_string(),
            })
        }
    } else {
        /// No system mixer strategy exists for this platform
        pub fn platform_default() -> Result<Box<dyn VolumeController>, VolumeControlError> {
            Err(VolumeControlError::UnsupportedPlatform {
                platform: std::env::consts::OS.to_string(),
            })
        }
    }
}
