//! Typed option blocks for each effect and their partial overrides.
//!
//! Overrides carry `Option` fields; `merge` copies every field that is set onto a complete
//! options value. Nested blocks merge field-wise, scalars are replaced.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlareColor {
    pub hue_blend_power: f32,
    pub hue_shift_angle_min: f32,
    pub hue_shift_angle_max: f32,
}

impl Default for GlareColor {
    fn default() -> Self {
        Self {
            hue_blend_power: 1.0,
            hue_shift_angle_min: -30.0,
            hue_shift_angle_max: 30.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlareColorOverride {
    pub hue_blend_power: Option<f32>,
    pub hue_shift_angle_min: Option<f32>,
    pub hue_shift_angle_max: Option<f32>,
}

impl GlareColor {
    pub fn merge(&mut self, over: &GlareColorOverride) {
        merge_field(&mut self.hue_blend_power, over.hue_blend_power);
        merge_field(&mut self.hue_shift_angle_min, over.hue_shift_angle_min);
        merge_field(&mut self.hue_shift_angle_max, over.hue_shift_angle_max);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlareOptions {
    pub glow_power: f32,
    pub glare_intensity: f32,
    pub light_intensity: f32,
    pub glare_color: GlareColor,
}

impl Default for GlareOptions {
    fn default() -> Self {
        Self {
            glow_power: 0.5,
            glare_intensity: 0.4,
            light_intensity: 1.1,
            glare_color: GlareColor::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlareOverride {
    pub glow_power: Option<f32>,
    pub glare_intensity: Option<f32>,
    pub light_intensity: Option<f32>,
    pub glare_color: Option<GlareColorOverride>,
}

impl GlareOptions {
    pub fn merge(&mut self, over: &GlareOverride) {
        merge_field(&mut self.glow_power, over.glow_power);
        merge_field(&mut self.glare_intensity, over.glare_intensity);
        merge_field(&mut self.light_intensity, over.light_intensity);
        if let Some(color) = &over.glare_color {
            self.glare_color.merge(color);
        }
    }
}

/// Weights applied to the mask texture when gating the reverse-holo shine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelWeights {
    pub red_channel: f32,
    pub green_channel: f32,
    pub blue_channel: f32,
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
}

impl Default for ChannelWeights {
    fn default() -> Self {
        Self {
            red_channel: 1.0,
            green_channel: 0.0,
            blue_channel: 0.0,
            hue: 0.0,
            saturation: 0.0,
            value: 0.0,
        }
    }
}

impl ChannelWeights {
    pub fn rgb(&self) -> [f32; 3] {
        [self.red_channel, self.green_channel, self.blue_channel]
    }

    pub fn hsv(&self) -> [f32; 3] {
        [self.hue, self.saturation, self.value]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseHoloOptions {
    pub glare: GlareOptions,
    pub channels: ChannelWeights,
}

/// Reverse-holo overrides accept the glare fields and the channel weights side by side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReverseHoloOverride {
    pub glow_power: Option<f32>,
    pub glare_intensity: Option<f32>,
    pub light_intensity: Option<f32>,
    pub glare_color: Option<GlareColorOverride>,
    pub red_channel: Option<f32>,
    pub green_channel: Option<f32>,
    pub blue_channel: Option<f32>,
    pub hue: Option<f32>,
    pub saturation: Option<f32>,
    pub value: Option<f32>,
}

impl ReverseHoloOverride {
    pub fn glare(&self) -> GlareOverride {
        GlareOverride {
            glow_power: self.glow_power,
            glare_intensity: self.glare_intensity,
            light_intensity: self.light_intensity,
            glare_color: self.glare_color,
        }
    }
}

impl ReverseHoloOptions {
    pub fn merge(&mut self, over: &ReverseHoloOverride) {
        self.glare.merge(&over.glare());
        let channels = &mut self.channels;
        merge_field(&mut channels.red_channel, over.red_channel);
        merge_field(&mut channels.green_channel, over.green_channel);
        merge_field(&mut channels.blue_channel, over.blue_channel);
        merge_field(&mut channels.hue, over.hue);
        merge_field(&mut channels.saturation, over.saturation);
        merge_field(&mut channels.value, over.value);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoloOptions {
    pub direction_degree: f32,
    pub shift: f32,
    pub rotation_shift_power: f32,
    pub holo_size: f32,
    pub holo_multiplier: f32,
    pub holo_ease_size: f32,
    pub holo_visibility: f32,
    pub holo_saturation: f32,
}

impl Default for HoloOptions {
    fn default() -> Self {
        Self {
            direction_degree: 45.0,
            shift: 0.1,
            rotation_shift_power: 0.6,
            holo_size: 0.12,
            holo_multiplier: 2.5,
            holo_ease_size: 0.2,
            holo_visibility: 0.88,
            holo_saturation: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HoloOverride {
    pub direction_degree: Option<f32>,
    pub shift: Option<f32>,
    pub rotation_shift_power: Option<f32>,
    pub holo_size: Option<f32>,
    pub holo_multiplier: Option<f32>,
    pub holo_ease_size: Option<f32>,
    pub holo_visibility: Option<f32>,
    pub holo_saturation: Option<f32>,
}

impl HoloOptions {
    pub fn merge(&mut self, over: &HoloOverride) {
        merge_field(&mut self.direction_degree, over.direction_degree);
        merge_field(&mut self.shift, over.shift);
        merge_field(&mut self.rotation_shift_power, over.rotation_shift_power);
        merge_field(&mut self.holo_size, over.holo_size);
        merge_field(&mut self.holo_multiplier, over.holo_multiplier);
        merge_field(&mut self.holo_ease_size, over.holo_ease_size);
        merge_field(&mut self.holo_visibility, over.holo_visibility);
        merge_field(&mut self.holo_saturation, over.holo_saturation);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlareFlareOptions {
    pub flare_intensity: f32,
    pub spot_intensity: f32,
    pub ring_intensity: f32,
    pub ray_intensity: f32,
    pub falloff: f32,
    pub ray_count: f32,
}

impl Default for GlareFlareOptions {
    fn default() -> Self {
        Self {
            flare_intensity: 0.8,
            spot_intensity: 0.02,
            ring_intensity: 0.02,
            ray_intensity: 0.05,
            falloff: 3.0,
            ray_count: 8.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlareFlareOverride {
    pub flare_intensity: Option<f32>,
    pub spot_intensity: Option<f32>,
    pub ring_intensity: Option<f32>,
    pub ray_intensity: Option<f32>,
    pub falloff: Option<f32>,
    pub ray_count: Option<f32>,
}

impl GlareFlareOptions {
    pub fn merge(&mut self, over: &GlareFlareOverride) {
        merge_field(&mut self.flare_intensity, over.flare_intensity);
        merge_field(&mut self.spot_intensity, over.spot_intensity);
        merge_field(&mut self.ring_intensity, over.ring_intensity);
        merge_field(&mut self.ray_intensity, over.ray_intensity);
        merge_field(&mut self.falloff, over.falloff);
        merge_field(&mut self.ray_count, over.ray_count);
    }
}

fn merge_field<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_glare_color_merges_field_wise() {
        let mut options = GlareOptions::default();
        options.merge(&GlareOverride {
            glow_power: Some(0.9),
            glare_color: Some(GlareColorOverride {
                hue_shift_angle_max: Some(60.0),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(options.glow_power, 0.9);
        assert_eq!(options.glare_intensity, 0.4);
        assert_eq!(options.glare_color.hue_shift_angle_max, 60.0);
        assert_eq!(options.glare_color.hue_shift_angle_min, -30.0);
        assert_eq!(options.glare_color.hue_blend_power, 1.0);
    }

    #[test]
    fn empty_override_keeps_defaults() {
        let mut holo = HoloOptions::default();
        holo.merge(&HoloOverride::default());
        assert_eq!(holo, HoloOptions::default());
    }

    #[test]
    fn reverse_holo_merges_both_blocks() {
        let mut options = ReverseHoloOptions::default();
        options.merge(&ReverseHoloOverride {
            light_intensity: Some(3.0),
            red_channel: Some(0.0),
            value: Some(1.0),
            ..Default::default()
        });
        assert_eq!(options.glare.light_intensity, 3.0);
        assert_eq!(options.channels.rgb(), [0.0, 0.0, 0.0]);
        assert_eq!(options.channels.hsv(), [0.0, 0.0, 1.0]);
    }
}
