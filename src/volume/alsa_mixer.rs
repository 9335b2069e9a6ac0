// ALSA simple-mixer control, opened once and kept in process
//
// Raw control values are mapped linearly onto [0, 1] using the control's
// own playback range.

use alsa::mixer::{Mixer, Selem, SelemChannelId, SelemId};

use crate::error::VolumeControlError;
use crate::volume::deferred::MixerBackend;

pub const DEFAULT_CARD: &str = "default";
pub const DEFAULT_CONTROL: &str = "Master";

/// Level in [0, 1] to a raw value in `min..=max`
pub fn level_to_raw(level: f64, (min, max): (i64, i64)) -> i64 {
    let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
    min + ((max - min) as f64 * level).round() as i64
}

/// Raw control value to a level in [0, 1]
pub fn raw_to_level(raw: i64, (min, max): (i64, i64)) -> f64 {
    if max <= min {
        return 0.0;
    }
    ((raw - min) as f64 / (max - min) as f64).clamp(0.0, 1.0)
}

/// One playback control on one card
pub struct AlsaMixer {
    mixer: Mixer,
    card: String,
    control: String,
}

impl AlsaMixer {
    pub fn open(card: &str, control: &str) -> Result<Self, VolumeControlError> {
        let mixer = Mixer::new(card, false).map_err(|e| VolumeControlError::Unavailable {
            reason: format!("ALSA mixer '{}': {}", card, e),
        })?;
        let opened = Self {
            mixer,
            card: card.to_string(),
            control: control.to_string(),
        };
        opened.selem()?;
        tracing::info!("[AlsaMixer] Opened control '{}' on '{}'", control, card);
        Ok(opened)
    }

    pub fn open_default() -> Result<Self, VolumeControlError> {
        Self::open(DEFAULT_CARD, DEFAULT_CONTROL)
    }

    fn selem(&self) -> Result<Selem<'_>, VolumeControlError> {
        self.mixer
            .find_selem(&SelemId::new(&self.control, 0))
            .ok_or_else(|| VolumeControlError::Unavailable {
                reason: format!("no '{}' control on '{}'", self.control, self.card),
            })
    }

    fn alsa_failure(&self, action: &str, err: alsa::Error) -> VolumeControlError {
        VolumeControlError::CommandFailed {
            command: format!("{} {}:{}", action, self.card, self.control),
            reason: err.to_string(),
        }
    }
}

impl MixerBackend for AlsaMixer {
    fn apply(&mut self, level: f64) -> Result<(), VolumeControlError> {
        let selem = self.selem()?;
        let raw = level_to_raw(level, selem.get_playback_volume_range());
        selem
            .set_playback_volume_all(raw)
            .map_err(|e| self.alsa_failure("set", e))
    }

    fn read(&mut self) -> Result<f64, VolumeControlError> {
        // Pick up changes made by other programs
        let _ = self.mixer.handle_events();
        let selem = self.selem()?;
        let raw = selem
            .get_playback_volume(SelemChannelId::mono())
            .map_err(|e| self.alsa_failure("get", e))?;
        Ok(raw_to_level(raw, selem.get_playback_volume_range()))
    }
}
