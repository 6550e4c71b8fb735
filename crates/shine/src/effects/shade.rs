//! CPU evaluation of the per-pixel effect math.
//!
//! Each function mirrors the fragment entry point of the same name in `shaders/`; the software
//! compositor calls them directly and the tests pin their numeric behaviour.

use std::f32::consts::PI;

use glam::{Vec2, Vec3, Vec4};

use crate::color::{
    boost_saturation, fract, hsl_to_rgb, hsv_to_rgb, hue_shift, mix, overlay_channels,
    rgb_to_hsl, rgb_to_hsv, safe_denominator, smoothstep,
};

use super::options::{GlareFlareOptions, GlareOptions, HoloOptions, ReverseHoloOptions};

/// Inputs available to one pixel of one pass.
#[derive(Clone, Copy, Debug)]
pub struct Fragment {
    /// Texture coordinate with the origin at the top-left of the image.
    pub uv: Vec2,
    /// Base image sample at `uv`.
    pub color: Vec4,
    /// Mask image sample at `uv`, when the scene has one.
    pub mask: Option<Vec4>,
    /// Light vector for this frame.
    pub light: Vec3,
}

impl Fragment {
    /// `uv` remapped to `[-1, 1]`.
    pub fn centered(&self) -> Vec2 {
        self.uv * 2.0 - 1.0
    }

    pub fn center(&self) -> Vec2 {
        self.light.truncate()
    }
}

/// Per-pixel hash in `[0, 1)`.
pub fn hash(uv: Vec2) -> f32 {
    fract((uv.dot(Vec2::new(12.9898, 78.233))).sin() * 43_758.547)
}

struct Glow {
    scaled_radial: f32,
    glow_mask: f32,
}

fn radial_glow(fragment: &Fragment, glare: &GlareOptions) -> Glow {
    let dist = fragment.centered().distance(fragment.center());
    let scaled_radial = (-dist).exp() * (1.0 + glare.glare_intensity.max(0.0));
    let influence = smoothstep(0.0, 1.0, scaled_radial);
    let glow_mask = influence.powf(1.0 / glare.glow_power.clamp(0.05, 64.0));
    Glow {
        scaled_radial,
        glow_mask,
    }
}

pub fn glare(fragment: &Fragment, options: &GlareOptions) -> Vec4 {
    let rgb = fragment.color.truncate();
    let glow = radial_glow(fragment, options);
    let masked_glow = glow.glow_mask * fragment.color.w;

    let color = &options.glare_color;
    let boosted = boost_saturation(rgb, masked_glow);
    let angle = mix(color.hue_shift_angle_min, color.hue_shift_angle_max, masked_glow);
    let shifted = hue_shift(boosted, angle);
    let hue_mix = (color.hue_blend_power / 5.0 * masked_glow).clamp(0.0, 1.0);
    let chroma = rgb.lerp(shifted, hue_mix);

    let layer = Vec3::splat(masked_glow * options.light_intensity.clamp(0.0, 100.0));
    let overlaid = overlay_channels(chroma, layer);
    let out = chroma.lerp(overlaid, masked_glow);
    out.clamp(Vec3::ZERO, Vec3::ONE).extend(fragment.color.w)
}

/// Shine gated by the mask texture. Without a mask the pixel contributes nothing.
pub fn reverse_holo(fragment: &Fragment, options: &ReverseHoloOptions) -> Vec4 {
    let Some(mask) = fragment.mask else {
        return Vec4::new(0.0, 0.0, 0.0, 1.0);
    };
    let rgb = fragment.color.truncate();
    let glow = radial_glow(fragment, &options.glare);

    let mask_rgb = mask.truncate();
    let factor = mask_rgb.dot(Vec3::from(options.channels.rgb()))
        + rgb_to_hsv(mask_rgb).dot(Vec3::from(options.channels.hsv()));
    let holo_factor = (1.0 - factor) * mask.w * glow.scaled_radial.powf(1.5);
    let masked_glow = (glow.glow_mask * holo_factor).powi(2).clamp(0.0, 1.0);

    let color = &options.glare.glare_color;
    let angle = mix(color.hue_shift_angle_min, color.hue_shift_angle_max, masked_glow);
    let sparkle = hue_shift(rgb, angle);
    let shine = 1.5 * options.glare.light_intensity.clamp(1.0, 100.0) * masked_glow;
    let hue_mix = (color.hue_blend_power / 5.0 * masked_glow).clamp(0.0, 1.0);
    let chroma = rgb.lerp(sparkle, hue_mix);

    (chroma * shine).extend(1.0 - masked_glow)
}

/// Offsets applied to the holo options for the second layer of a double holo.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoloLayer {
    pub direction_offset: f32,
    pub shift_offset: f32,
    pub rotation_polarity: f32,
}

impl HoloLayer {
    pub const PRIMARY: Self = Self {
        direction_offset: 0.0,
        shift_offset: 0.0,
        rotation_polarity: 1.0,
    };
    pub const MIRRORED: Self = Self {
        direction_offset: 178.0,
        shift_offset: 0.59,
        rotation_polarity: -1.0,
    };
}

/// One diffraction band layer. Alpha is the share of the destination kept; exactly 1 means the
/// pixel sits fully outside the band.
pub fn holo_layer(fragment: &Fragment, options: &HoloOptions, layer: HoloLayer) -> Vec4 {
    let uv = fragment.uv;
    let direction = options.direction_degree + layer.direction_offset;
    let shift = options.shift + layer.shift_offset;
    let rotation_power = options.rotation_shift_power * layer.rotation_polarity;

    let angle = direction.to_radians();
    let y_weight = angle.cos().abs();
    let x_weight = angle.sin().abs();
    let range = x_weight + y_weight;
    let interval = range / safe_denominator(options.holo_multiplier);

    let x = uv.x * x_weight + uv.y * y_weight + shift + 1.0;
    let light = fragment.light;
    let rotation_shift = light.x * x_weight + light.y * y_weight;
    let offset = rotation_shift * rotation_power + shift;
    let wrapped = (x + offset) % safe_denominator(interval);

    let band = options.holo_size * interval;
    let ease = band * options.holo_ease_size;
    let start = ease;
    let end = band + start;

    let t = (wrapped - start) / safe_denominator(end - start);
    let flipped = if direction > 179.0 { PI } else { 0.0 };
    let eased = (1.0 - (PI * t - flipped).cos()) / 2.0;
    let hue = -0.06 + eased * 0.85 + (hash(uv) - 0.5) / 180.0 * 40.0;
    let hue = if hue > 0.0 { hue } else { hue + 1.0 };

    let outside = wrapped < start || wrapped > end;
    let edge = if wrapped > start {
        wrapped - end
    } else {
        start - wrapped
    };
    let edge = edge / safe_denominator(ease);
    let visibility = mix(
        options.holo_visibility,
        1.0,
        edge * edge * f32::from(u8::from(outside)),
    )
    .clamp(0.0, 1.0);

    let rgb = hsv_to_rgb(Vec3::new(hue, options.holo_saturation, 1.0));
    rgb.extend(visibility * fragment.color.w)
}

pub fn holo(fragment: &Fragment, options: &HoloOptions) -> Vec4 {
    holo_layer(fragment, options, HoloLayer::PRIMARY)
}

/// Two opposing holo layers overlaid. Where one layer has no band the other is used as is.
pub fn double_holo(fragment: &Fragment, options: &HoloOptions) -> Vec4 {
    let first = holo_layer(fragment, options, HoloLayer::PRIMARY);
    let second = holo_layer(fragment, options, HoloLayer::MIRRORED);

    let first_band = first.w != 1.0;
    let second_band = second.w != 1.0;
    if first_band && second_band {
        let visibility = (first.w + second.w - 1.0).clamp(0.9, 1.0);
        overlay_channels(first.truncate(), second.truncate()).extend(visibility)
    } else if second_band {
        second
    } else {
        first
    }
}

pub fn glare_flare(fragment: &Fragment, options: &GlareFlareOptions) -> Vec4 {
    let light = fragment.light;
    let dist = fragment
        .centered()
        .distance(fragment.center())
        .clamp(0.0, 1.0);

    // Rays are laid out in the quad's own orientation (origin bottom-left).
    let quad = Vec2::new(fragment.uv.x, 1.0 - fragment.uv.y) * 2.0 - 1.0;
    let angle = (light.y + quad.y).atan2(light.x - quad.x);

    let falloff = options.falloff;
    let spot = options.spot_intensity / (dist * falloff + 0.1);
    let ring1 = (dist * 10.0).sin() * options.ring_intensity / (dist * falloff + 0.5);
    let ring2 = (dist * 20.0).sin() * options.ring_intensity / (dist * falloff + 0.3);

    let noise = light.x.sin().abs() + light.y.cos().abs();
    let ray_angle = angle * options.ray_count + noise;
    let ray_length = 0.25 + 0.95 * (angle * 3.0 * noise).sin().abs() * noise;
    let ray_size = 0.05 + 1.15 * (angle * 13.0 * noise).cos().abs() + noise;
    let ray = ray_angle.sin().abs().powf(15.0 * ray_size)
        * options.ray_intensity
        * (1.0 - dist * ray_length)
        * noise;

    let flare = (spot + ring1 + ring2 + ray) * (1.0 - dist);
    let flare = (flare * options.flare_intensity).clamp(0.0, 1.0);

    let hsl = rgb_to_hsl(fragment.color.truncate());
    let lightness = (hsl.z + flare).clamp(0.0, 1.0);
    hsl_to_rgb(Vec3::new(hsl.x, hsl.y, lightness)).extend(fragment.color.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(uv: Vec2, color: Vec4, light: Vec3) -> Fragment {
        Fragment {
            uv,
            color,
            mask: None,
            light,
        }
    }

    fn grid() -> impl Iterator<Item = Vec2> {
        (0..16).flat_map(|y| (0..16).map(move |x| Vec2::new(x as f32 + 0.5, y as f32 + 0.5) / 16.0))
    }

    #[test]
    fn glare_peaks_under_the_light() {
        let options = GlareOptions::default();
        let grey = Vec4::new(0.5, 0.5, 0.5, 1.0);
        let lit = glare(&fragment(Vec2::splat(0.5), grey, Vec3::ZERO), &options);
        let far = glare(&fragment(Vec2::new(0.0, 0.0), grey, Vec3::new(1.0, 1.0, 0.0)), &options);
        assert!(lit.x > far.x, "{lit:?} vs {far:?}");
        assert_eq!(lit.w, 1.0);
    }

    #[test]
    fn glare_stays_in_unit_range() {
        let options = GlareOptions {
            light_intensity: 100.0,
            glare_intensity: 10.0,
            ..GlareOptions::default()
        };
        for uv in grid() {
            let out = glare(&fragment(uv, Vec4::new(0.9, 0.1, 0.4, 1.0), Vec3::ZERO), &options);
            assert!(out.cmpge(Vec4::ZERO).all() && out.cmple(Vec4::ONE).all(), "{out:?}");
        }
    }

    #[test]
    fn transparent_pixels_get_no_glare() {
        let color = Vec4::new(0.2, 0.4, 0.6, 0.0);
        let out = glare(&fragment(Vec2::splat(0.5), color, Vec3::ZERO), &GlareOptions::default());
        assert!((out.truncate() - color.truncate()).length() < 1e-5);
    }

    #[test]
    fn reverse_holo_without_mask_keeps_destination() {
        let out = reverse_holo(
            &fragment(Vec2::splat(0.5), Vec4::ONE, Vec3::ZERO),
            &ReverseHoloOptions::default(),
        );
        assert_eq!(out, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn reverse_holo_shines_where_the_weighted_mask_is_dark() {
        let options = ReverseHoloOptions::default();
        let mut dark = fragment(Vec2::splat(0.5), Vec4::splat(0.5), Vec3::ZERO);
        dark.mask = Some(Vec4::new(0.0, 0.0, 0.0, 1.0));
        let mut red = dark;
        red.mask = Some(Vec4::new(1.0, 0.0, 0.0, 1.0));

        let shine = reverse_holo(&dark, &options);
        let none = reverse_holo(&red, &options);
        assert!(shine.w < 1.0 && shine.x > 0.0);
        assert_eq!(none.w, 1.0);
        assert_eq!(none.truncate(), Vec3::ZERO);
    }

    #[test]
    fn holo_alpha_is_bounded_and_hue_is_wrapped() {
        let options = HoloOptions::default();
        for uv in grid() {
            for light in [Vec3::ZERO, Vec3::new(-1.0, 1.0, 0.0), Vec3::new(0.7, -0.3, 0.0)] {
                let out = holo(&fragment(uv, Vec4::ONE, light), &options);
                assert!((0.0..=1.0).contains(&out.w), "{out:?}");
                assert!(out.truncate().cmpge(Vec3::ZERO).all(), "{out:?}");
            }
        }
    }

    #[test]
    fn holo_band_uses_configured_visibility() {
        let options = HoloOptions::default();
        let band = grid()
            .map(|uv| holo(&fragment(uv, Vec4::ONE, Vec3::ZERO), &options))
            .any(|out| (out.w - options.holo_visibility).abs() < 1e-6);
        assert!(band);
    }

    #[test]
    fn double_holo_alpha_stays_in_unit_range() {
        let options = HoloOptions {
            holo_visibility: 0.0,
            ..HoloOptions::default()
        };
        for uv in grid() {
            for alpha in [0.0, 0.5, 1.0] {
                let out = double_holo(&fragment(uv, Vec4::new(1.0, 1.0, 1.0, alpha), Vec3::ZERO), &options);
                assert!((0.0..=1.0).contains(&out.w), "{out:?}");
            }
        }
    }

    #[test]
    fn double_holo_without_bands_passes_first_layer() {
        // full visibility turns every pixel into the "no band" sentinel
        let options = HoloOptions {
            holo_visibility: 1.0,
            ..HoloOptions::default()
        };
        let frag = fragment(Vec2::new(0.3, 0.7), Vec4::ONE, Vec3::ZERO);
        let first = holo_layer(&frag, &options, HoloLayer::PRIMARY);
        assert_eq!(first.w, 1.0);
        assert_eq!(double_holo(&frag, &options), first);
    }

    #[test]
    fn double_holo_uses_the_banded_layer_when_only_one_has_a_band() {
        let options = HoloOptions::default();
        let dense = (0..64)
            .flat_map(|y| (0..64).map(move |x| Vec2::new(x as f32 + 0.5, y as f32 + 0.5) / 64.0));
        let (mut primary_only, mut mirrored_only) = (0, 0);
        for uv in dense {
            let frag = fragment(uv, Vec4::ONE, Vec3::ZERO);
            let first = holo_layer(&frag, &options, HoloLayer::PRIMARY);
            let second = holo_layer(&frag, &options, HoloLayer::MIRRORED);
            let out = double_holo(&frag, &options);
            if first.w == 1.0 && second.w != 1.0 {
                assert_eq!(out, second, "uv {uv:?}");
                mirrored_only += 1;
            } else if second.w == 1.0 && first.w != 1.0 {
                assert_eq!(out, first, "uv {uv:?}");
                primary_only += 1;
            }
        }
        assert!(mirrored_only > 0 && primary_only > 0);
    }

    #[test]
    fn glare_flare_brightens_towards_light() {
        let options = GlareFlareOptions::default();
        let grey = Vec4::new(0.4, 0.4, 0.4, 1.0);
        let near = glare_flare(&fragment(Vec2::splat(0.5), grey, Vec3::ZERO), &options);
        let edge = glare_flare(&fragment(Vec2::new(0.0, 0.5), grey, Vec3::ZERO), &options);
        assert!(near.x >= edge.x);
        assert!(near.x >= grey.x);
        assert_eq!(near.w, 1.0);
        assert!(near.truncate().cmple(Vec3::ONE).all());
    }

    #[test]
    fn hash_is_unit_interval() {
        for uv in grid() {
            let value = hash(uv);
            assert!((0.0..1.0).contains(&value));
        }
    }
}
