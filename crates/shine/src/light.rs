//! Turns raw gravity samples or an external pointer position into the per-frame light vector.
//!
//! Two sources are mutually exclusive: whenever an external position is present it wins and is
//! passed through untouched. Otherwise gravity samples first build a baseline over
//! [`CALIBRATION_SAMPLES`] readings, after which each sample's deviation from that baseline is
//! rotated into screen space, exponentially smoothed, scaled and clamped.

use glam::{Vec2, Vec3};

use crate::vector::LightVector;

pub const CALIBRATION_SAMPLES: u32 = 40;
pub const SMOOTHING_ALPHA: f32 = 0.15;
pub const OUTPUT_SCALE: f32 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationState {
    Uncalibrated { sum: Vec3, count: u32 },
    Calibrated { initial_gravity: Vec3 },
}

impl Default for CalibrationState {
    fn default() -> Self {
        CalibrationState::Uncalibrated {
            sum: Vec3::ZERO,
            count: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LightResolver {
    state: CalibrationState,
    landscape: bool,
    previous: Vec3,
}

impl LightResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self.state, CalibrationState::Calibrated { .. })
    }

    pub fn landscape(&self) -> bool {
        self.landscape
    }

    pub fn set_landscape(&mut self, landscape: bool) {
        if self.landscape != landscape {
            tracing::debug!(landscape, "orientation changed");
        }
        self.landscape = landscape;
    }

    /// Drops the gravity baseline so the next samples rebuild it.
    pub fn recalibrate(&mut self) {
        self.state = CalibrationState::default();
        self.previous = Vec3::ZERO;
    }

    /// Produces the light vector for this frame.
    ///
    /// `external` is an externally owned 2D position; `sample` is the latest gravity reading,
    /// where `None` is treated as a zero reading.
    pub fn resolve(&mut self, external: Option<Vec2>, sample: Option<Vec3>) -> LightVector {
        if let Some(position) = external {
            let light = LightVector::from_position(position);
            self.previous = light.0;
            return light;
        }

        let gravity = sample.unwrap_or(Vec3::ZERO);
        match self.state {
            CalibrationState::Uncalibrated { sum, count } => {
                let sum = sum + gravity;
                let count = count + 1;
                self.state = if count >= CALIBRATION_SAMPLES {
                    let initial_gravity = sum / count as f32;
                    tracing::debug!(?initial_gravity, "gravity baseline calibrated");
                    CalibrationState::Calibrated { initial_gravity }
                } else {
                    CalibrationState::Uncalibrated { sum, count }
                };
                self.previous = Vec3::ZERO;
                LightVector::ZERO
            }
            CalibrationState::Calibrated { initial_gravity } => {
                let delta = gravity - initial_gravity;
                let output = self.smooth(delta);
                self.previous = output;
                LightVector(output)
            }
        }
    }

    fn smooth(&self, delta: Vec3) -> Vec3 {
        let landscape = f32::from(u8::from(self.landscape));
        let rotation = Vec2::from_angle((-90.0 * landscape).to_radians());
        let rotated = rotation.rotate(delta.truncate());
        let screen = Vec2::new(rotated.x, -rotated.y);

        let offset = (screen * SMOOTHING_ALPHA).extend(delta.z * SMOOTHING_ALPHA);
        let smoothed = (self.previous * (1.0 - SMOOTHING_ALPHA) + offset) * OUTPUT_SCALE;

        let oriented = if self.landscape {
            Vec3::new(smoothed.y, -smoothed.x, smoothed.z)
        } else {
            smoothed
        };
        oriented.clamp(Vec3::splat(-1.0), Vec3::ONE)
    }
}
