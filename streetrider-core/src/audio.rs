//! Engine and horn feedback levels. Playback belongs to the frontend; this
//! module only decides what should be heard for a given motion state.

use crate::dynamics::STOP_SPEED_THRESHOLD;

pub const AMBIENT_VOLUME_RATIO: f64 = 0.4;
pub const ENGINE_FADE_OUT_MILLIS: u32 = 500;
const ENGINE_IDLE_RATE: f64 = 0.8;
const ENGINE_RATE_SPAN: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMix {
    pub engine: f64,
    pub horn: f64,
    pub ambient: f64,
}

impl AudioMix {
    pub fn from_volume(volume: f64) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        Self {
            engine: volume,
            horn: volume,
            ambient: volume * AMBIENT_VOLUME_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCue {
    Playing { rate: f64, volume: f64 },
    FadeOut { millis: u32 },
}

impl EngineCue {
    /// Engine loop playback rate spans 0.8 at rest to 2.0 at top speed and
    /// swells from half to full volume.
    pub fn for_speed(speed: f64, max_speed: f64, volume: f64) -> Self {
        let magnitude = speed.abs();
        if magnitude <= STOP_SPEED_THRESHOLD || max_speed <= 0.0 {
            return EngineCue::FadeOut {
                millis: ENGINE_FADE_OUT_MILLIS,
            };
        }

        let ratio = (magnitude / max_speed).min(1.0);
        EngineCue::Playing {
            rate: ENGINE_IDLE_RATE + ratio * ENGINE_RATE_SPAN,
            volume: volume.clamp(0.0, 1.0) * (0.5 + ratio * 0.5),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, EngineCue::Playing { .. })
    }
}
