//! Input volume metering for the presentation layer.

/// Default weight given to the newest sample.
pub const DEFAULT_SMOOTHING: f32 = 0.3;

/// Clamps a recognizer volume reading into `[0, 1]`; NaN reads as silence.
pub fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

/// Exponentially smoothed input level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeMeter {
    level: f32,
    smoothing: f32,
}

impl Default for VolumeMeter {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}

impl VolumeMeter {
    pub fn new(smoothing: f32) -> Self {
        Self {
            level: 0.0,
            smoothing: clamp_level(smoothing),
        }
    }

    pub fn update(&mut self, reading: f32) -> f32 {
        let reading = clamp_level(reading);
        self.level += (reading - self.level) * self.smoothing;
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }

    pub fn level(&self) -> f32 {
        self.level
    }
}
