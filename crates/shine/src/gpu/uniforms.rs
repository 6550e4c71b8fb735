//! `#[repr(C)]` mirrors of the WGSL uniform blocks. Every struct is a multiple of 16 bytes and
//! matches the field order of its WGSL counterpart.

use bytemuck::{Pod, Zeroable};

use crate::effects::{
    BufferSlot, ChannelWeights, EffectOptions, GlareFlareOptions, GlareOptions, HoloOptions,
};
use crate::mask::{ColorMaskDescriptor, ColorMaskSet, MAX_MASKS};
use crate::types::{BlurOptions, TiltOptions};
use crate::vector::LightVector;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct FrameUniform {
    pub light: [f32; 4],
    pub tilt: [f32; 4],
    pub view: [f32; 4],
    pub resolution: [f32; 4],
}

impl FrameUniform {
    pub fn new(
        light: LightVector,
        tilt: &TiltOptions,
        target: (u32, u32),
        image: (u32, u32),
    ) -> Self {
        let view = match tilt.view {
            Some(view) => {
                let (rotate_x, rotate_y) = view.angles(light.xy());
                [
                    rotate_x.to_radians(),
                    rotate_y.to_radians(),
                    view.perspective,
                    1.0,
                ]
            }
            None => [0.0; 4],
        };
        Self {
            light: light.to_uniform(),
            tilt: [
                if tilt.enabled { 1.0 } else { 0.0 },
                tilt.max_angle_degrees.to_radians(),
                tilt.perspective,
                tilt.z_offset,
            ],
            view,
            resolution: [
                target.0 as f32,
                target.1 as f32,
                image.0 as f32,
                image.1 as f32,
            ],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct GlareUniform {
    pub glow_power: f32,
    pub glare_intensity: f32,
    pub light_intensity: f32,
    pub hue_blend_power: f32,
    pub hue_shift_angle_min: f32,
    pub hue_shift_angle_max: f32,
    pub _pad: [f32; 2],
}

impl From<&GlareOptions> for GlareUniform {
    fn from(options: &GlareOptions) -> Self {
        Self {
            glow_power: options.glow_power,
            glare_intensity: options.glare_intensity,
            light_intensity: options.light_intensity,
            hue_blend_power: options.glare_color.hue_blend_power,
            hue_shift_angle_min: options.glare_color.hue_shift_angle_min,
            hue_shift_angle_max: options.glare_color.hue_shift_angle_max,
            _pad: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct ChannelWeightsUniform {
    pub rgb: [f32; 4],
    pub hsv: [f32; 4],
}

impl From<&ChannelWeights> for ChannelWeightsUniform {
    fn from(weights: &ChannelWeights) -> Self {
        let [red, green, blue] = weights.rgb();
        let [hue, saturation, value] = weights.hsv();
        Self {
            rgb: [red, green, blue, 0.0],
            hsv: [hue, saturation, value, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct HoloUniform {
    pub direction_degree: f32,
    pub shift: f32,
    pub rotation_shift_power: f32,
    pub holo_size: f32,
    pub holo_multiplier: f32,
    pub holo_ease_size: f32,
    pub holo_visibility: f32,
    pub holo_saturation: f32,
}

impl From<&HoloOptions> for HoloUniform {
    fn from(options: &HoloOptions) -> Self {
        Self {
            direction_degree: options.direction_degree,
            shift: options.shift,
            rotation_shift_power: options.rotation_shift_power,
            holo_size: options.holo_size,
            holo_multiplier: options.holo_multiplier,
            holo_ease_size: options.holo_ease_size,
            holo_visibility: options.holo_visibility,
            holo_saturation: options.holo_saturation,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct GlareFlareUniform {
    pub flare_intensity: f32,
    pub spot_intensity: f32,
    pub ring_intensity: f32,
    pub ray_intensity: f32,
    pub falloff: f32,
    pub ray_count: f32,
    pub _pad: [f32; 2],
}

impl From<&GlareFlareOptions> for GlareFlareUniform {
    fn from(options: &GlareFlareOptions) -> Self {
        Self {
            flare_intensity: options.flare_intensity,
            spot_intensity: options.spot_intensity,
            ring_intensity: options.ring_intensity,
            ray_intensity: options.ray_intensity,
            falloff: options.falloff,
            ray_count: options.ray_count,
            _pad: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct ColorMaskUniform {
    pub base_color: [f32; 4],
    pub upper: [f32; 4],
    pub lower: [f32; 4],
    pub hue_start: f32,
    pub hue_range: f32,
    pub use_hsv: u32,
    pub debug_mode: u32,
    /// saturation min, lightness min, saturation max, lightness max
    pub limits: [f32; 4],
}

impl From<&ColorMaskDescriptor> for ColorMaskUniform {
    fn from(mask: &ColorMaskDescriptor) -> Self {
        let base = crate::mask::normalize(mask.base_color);
        let upper = crate::mask::normalize(mask.tolerance.upper);
        let lower = crate::mask::normalize(mask.tolerance.lower);
        let window = &mask.window;
        Self {
            base_color: base.extend(1.0).to_array(),
            upper: upper.extend(0.0).to_array(),
            lower: lower.extend(0.0).to_array(),
            hue_start: window.hue_min,
            hue_range: window.hue_range(),
            use_hsv: u32::from(mask.use_hsv),
            debug_mode: u32::from(mask.debug),
            limits: [
                window.saturation_min,
                window.lightness_min,
                window.saturation_max,
                window.lightness_max,
            ],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct ColorMaskSetUniform {
    pub masks: [ColorMaskUniform; MAX_MASKS],
    pub used_count: u32,
    pub reverse_highlight: u32,
    pub _pad: [u32; 2],
}

impl From<&ColorMaskSet> for ColorMaskSetUniform {
    /// Unused slots stay zeroed; the shader never reads past `used_count`.
    fn from(set: &ColorMaskSet) -> Self {
        let mut uniform = Self::zeroed();
        for (slot, mask) in uniform.masks.iter_mut().zip(set.masks()) {
            *slot = ColorMaskUniform::from(mask);
        }
        uniform.used_count = set.used_count() as u32;
        uniform.reverse_highlight = u32::from(set.reverse_highlight);
        uniform
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct BlurUniform {
    pub direction: [f32; 2],
    pub radius: f32,
    pub sigma: f32,
}

impl BlurUniform {
    pub fn new(options: &BlurOptions, direction: [f32; 2]) -> Self {
        let options = options.clamped();
        Self {
            direction,
            radius: options.radius as f32,
            sigma: options.sigma,
        }
    }
}

impl EffectOptions {
    /// Bytes backing `slot` for these options, or `None` when the effect does not bind it.
    pub(crate) fn slot_bytes(&self, slot: BufferSlot) -> Option<Vec<u8>> {
        let bytes = match (self, slot) {
            (EffectOptions::Glare(options), BufferSlot::Glare) => {
                bytemuck::bytes_of(&GlareUniform::from(options)).to_vec()
            }
            (EffectOptions::ReverseHolo(options), BufferSlot::Glare) => {
                bytemuck::bytes_of(&GlareUniform::from(&options.glare)).to_vec()
            }
            (EffectOptions::ReverseHolo(options), BufferSlot::ChannelWeights) => {
                bytemuck::bytes_of(&ChannelWeightsUniform::from(&options.channels)).to_vec()
            }
            (EffectOptions::Holo(options) | EffectOptions::DoubleHolo(options), BufferSlot::Holo) => {
                bytemuck::bytes_of(&HoloUniform::from(options)).to_vec()
            }
            (EffectOptions::GlareFlare(options), BufferSlot::GlareFlare) => {
                bytemuck::bytes_of(&GlareFlareUniform::from(options)).to_vec()
            }
            _ => return None,
        };
        Some(bytes)
    }
}
