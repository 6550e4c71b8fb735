use glam::{Vec2, Vec3};

use crate::error::ShineError;

/// Light or touch direction shared by every radial effect.
///
/// Sensor-driven vectors are clamped to `[-1, 1]` per axis by the resolver; externally supplied
/// positions are passed through as-is.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LightVector(pub Vec3);

impl LightVector {
    pub const ZERO: Self = Self(Vec3::ZERO);

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }

    /// Builds a vector from 2 or 3 components; missing `z` becomes zero.
    ///
    /// Four components are accepted for parity with the generic constructor and the `w` lane
    /// is dropped.
    pub fn from_slice(components: &[f32]) -> Result<Self, ShineError> {
        let values = components_from_slice(components)?;
        Ok(Self(Vec3::new(values[0], values[1], values[2])))
    }

    pub fn from_position(position: Vec2) -> Self {
        Self(position.extend(0.0))
    }

    pub fn xy(&self) -> Vec2 {
        self.0.truncate()
    }

    pub fn clamped(self) -> Self {
        Self(self.0.clamp(Vec3::splat(-1.0), Vec3::ONE))
    }

    /// Layout written into the shared uniform block.
    pub fn to_uniform(self) -> [f32; 4] {
        self.0.extend(0.0).to_array()
    }
}

impl From<Vec3> for LightVector {
    fn from(value: Vec3) -> Self {
        Self(value)
    }
}

/// Validates a 2 to 4 component vector and zero-pads it to four lanes.
pub fn components_from_slice(components: &[f32]) -> Result<[f32; 4], ShineError> {
    if !(2..=4).contains(&components.len()) {
        return Err(ShineError::VectorArity(components.len()));
    }
    let mut padded = [0.0; 4];
    padded[..components.len()].copy_from_slice(components);
    Ok(padded)
}
