//! Color-space helpers shared by the CPU compositor and mirrored in `shaders/common.wgsl`.
//!
//! Every conversion is written without data-dependent branches so the WGSL and Rust versions
//! stay line-for-line comparable. Zero denominators are replaced by `1.0` after the zero case has
//! been recorded as a float mask, which keeps NaN out of the final color.

use glam::{Vec3, Vec4};

/// Replaces a zero denominator with `1.0`, leaving every other value untouched.
#[inline]
pub fn safe_denominator(value: f32) -> f32 {
    value + f32::from(value == 0.0)
}

#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn step(edge: f32, value: f32) -> f32 {
    f32::from(value >= edge)
}

/// Hermite smoothstep matching the WGSL builtin.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, value: f32) -> f32 {
    let t = ((value - edge0) / safe_denominator(edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn fract(value: f32) -> f32 {
    value - value.floor()
}

/// Converts linear RGB in `[0, 1]` to `(hue degrees, saturation, lightness)`.
pub fn rgb_to_hsl(rgb: Vec3) -> Vec3 {
    let max = rgb.max_element();
    let min = rgb.min_element();
    let chroma = max - min;
    let lightness = (max + min) * 0.5;

    let chroma_is_zero = f32::from(chroma == 0.0);
    let safe_chroma = chroma + chroma_is_zero;
    let saturation = chroma / safe_denominator(1.0 - (2.0 * lightness - 1.0).abs());

    let hue_red = ((rgb.y - rgb.z) / safe_chroma) % 6.0;
    let hue_green = (rgb.z - rgb.x) / safe_chroma + 2.0;
    let hue_blue = (rgb.x - rgb.y) / safe_chroma + 4.0;

    let is_green = f32::from(max == rgb.y);
    let is_blue = f32::from(max == rgb.z);
    let mut hue_prime = mix(hue_red, hue_green, is_green);
    hue_prime = mix(hue_prime, hue_blue, is_blue);
    hue_prime += 6.0 * f32::from(hue_prime < 0.0);

    let hue = hue_prime * 60.0 * (1.0 - chroma_is_zero);
    Vec3::new(hue, saturation, lightness)
}

/// Converts `(hue degrees, saturation, lightness)` back to RGB.
pub fn hsl_to_rgb(hsl: Vec3) -> Vec3 {
    let (hue, saturation, lightness) = (hsl.x, hsl.y, hsl.z);
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    // rem_euclid can round tiny negative hues up to exactly 6.0
    let hue_prime = (hue / 60.0).rem_euclid(6.0).min(6.0 - 6.0 * f32::EPSILON);
    let x = chroma * (1.0 - ((hue_prime % 2.0) - 1.0).abs());
    let sector = hue_prime.floor();

    let sectors = [
        Vec3::new(chroma, x, 0.0),
        Vec3::new(x, chroma, 0.0),
        Vec3::new(0.0, chroma, x),
        Vec3::new(0.0, x, chroma),
        Vec3::new(x, 0.0, chroma),
        Vec3::new(chroma, 0.0, x),
    ];
    let rgb_prime = sectors
        .iter()
        .enumerate()
        .fold(Vec3::ZERO, |acc, (index, candidate)| {
            acc + *candidate * f32::from(sector == index as f32)
        });

    rgb_prime + Vec3::splat(lightness - chroma * 0.5)
}

/// Converts RGB to HSV with the hue expressed as a fraction of a full turn.
pub fn rgb_to_hsv(rgb: Vec3) -> Vec3 {
    const K: Vec4 = Vec4::new(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    let p = mix_vec4(
        Vec4::new(rgb.z, rgb.y, K.w, K.z),
        Vec4::new(rgb.y, rgb.z, K.x, K.y),
        step(rgb.z, rgb.y),
    );
    let q = mix_vec4(
        Vec4::new(p.x, p.y, p.w, rgb.x),
        Vec4::new(rgb.x, p.y, p.z, p.x),
        step(p.x, rgb.x),
    );
    let d = q.x - q.w.min(q.y);
    let e = 1.0e-10;
    Vec3::new(
        (q.z + (q.w - q.y) / (6.0 * d + e)).abs(),
        d / (q.x + e),
        q.x,
    )
}

/// Converts HSV (hue as a fraction of a full turn) to RGB.
pub fn hsv_to_rgb(hsv: Vec3) -> Vec3 {
    let k = Vec3::new(1.0, 2.0 / 3.0, 1.0 / 3.0);
    let p = (Vec3::splat(hsv.x) + k)
        .map(fract)
        .mul_add(Vec3::splat(6.0), Vec3::splat(-3.0))
        .abs();
    let ramp = (p - Vec3::ONE).clamp(Vec3::ZERO, Vec3::ONE);
    hsv.z * Vec3::ONE.lerp(ramp, hsv.y)
}

/// Rotates the hue of `rgb` by `angle_degrees` through an HSV round trip.
pub fn hue_shift(rgb: Vec3, angle_degrees: f32) -> Vec3 {
    let mut hsv = rgb_to_hsv(rgb);
    hsv.x = fract(hsv.x + angle_degrees / 360.0);
    hsv_to_rgb(hsv)
}

/// Rotates the hue of `rgb` by `angle_degrees` in YIQ space.
pub fn hue_shift_yiq(rgb: Vec3, angle_degrees: f32) -> Vec3 {
    let y = rgb.dot(Vec3::new(0.299, 0.587, 0.114));
    let i = rgb.dot(Vec3::new(0.596, -0.274, -0.322));
    let q = rgb.dot(Vec3::new(0.211, -0.523, 0.311));

    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let i_rot = i * cos - q * sin;
    let q_rot = i * sin + q * cos;

    Vec3::new(
        y + 0.956 * i_rot + 0.621 * q_rot,
        y - 0.272 * i_rot - 0.647 * q_rot,
        y - 1.105 * i_rot + 1.702 * q_rot,
    )
}

/// Photoshop-style overlay of a single channel.
#[inline]
pub fn overlay_channel(base: f32, blend: f32) -> f32 {
    let multiply = 2.0 * base * blend;
    let screen = 1.0 - 2.0 * (1.0 - base) * (1.0 - blend);
    mix(multiply, screen, step(0.5, base))
}

pub fn overlay_channels(base: Vec3, blend: Vec3) -> Vec3 {
    Vec3::new(
        overlay_channel(base.x, blend.x),
        overlay_channel(base.y, blend.y),
        overlay_channel(base.z, blend.z),
    )
}

/// Pushes the non-dominant channels away from the brightest one, keeping the peak intact.
pub fn boost_saturation(rgb: Vec3, amount: f32) -> Vec3 {
    let peak = Vec3::splat(rgb.max_element());
    (peak - (peak - rgb) * (1.0 + amount.max(0.0))).clamp(Vec3::ZERO, Vec3::ONE)
}

fn mix_vec4(a: Vec4, b: Vec4, t: f32) -> Vec4 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3, eps: f32) -> bool {
        (a - b).abs().max_element() < eps
    }

    #[test]
    fn hsl_round_trip_away_from_singularities() {
        for &(h, s, l) in &[
            (0.0, 0.5, 0.5),
            (45.0, 0.8, 0.3),
            (120.0, 0.25, 0.6),
            (200.0, 1.0, 0.5),
            (300.0, 0.6, 0.75),
            (359.0, 0.4, 0.4),
        ] {
            let hsl = Vec3::new(h, s, l);
            let back = rgb_to_hsl(hsl_to_rgb(hsl));
            assert!((back.x - h).abs() < 1e-2, "hue {h} -> {}", back.x);
            assert!((back.y - s).abs() < 1e-4, "saturation {s} -> {}", back.y);
            assert!((back.z - l).abs() < 1e-4, "lightness {l} -> {}", back.z);
        }
    }

    #[test]
    fn grey_has_zero_hue_and_saturation() {
        let hsl = rgb_to_hsl(Vec3::splat(0.4));
        assert_eq!(hsl.x, 0.0);
        assert_eq!(hsl.y, 0.0);
        assert!((hsl.z - 0.4).abs() < 1e-6);
    }

    #[test]
    fn white_and_black_stay_finite() {
        for rgb in [Vec3::ONE, Vec3::ZERO] {
            let hsl = rgb_to_hsl(rgb);
            assert!(hsl.is_finite());
            assert!(hsv_to_rgb(rgb_to_hsv(rgb)).is_finite());
        }
    }

    #[test]
    fn primary_hues() {
        assert!((rgb_to_hsl(Vec3::X).x - 0.0).abs() < 1e-4);
        assert!((rgb_to_hsl(Vec3::Y).x - 120.0).abs() < 1e-4);
        assert!((rgb_to_hsl(Vec3::Z).x - 240.0).abs() < 1e-4);
        assert!((rgb_to_hsl(Vec3::new(1.0, 0.0, 1.0)).x - 300.0).abs() < 1e-4);
    }

    #[test]
    fn tiny_negative_hue_wraps_to_red() {
        assert!(approx(hsl_to_rgb(Vec3::new(-1e-6, 1.0, 0.5)), Vec3::X, 1e-4));
        assert!(approx(hsl_to_rgb(Vec3::new(-360.0, 1.0, 0.5)), Vec3::X, 1e-4));
        assert!(approx(hsl_to_rgb(Vec3::new(-120.0, 1.0, 0.5)), Vec3::Z, 1e-4));
    }

    #[test]
    fn hsv_round_trip() {
        let rgb = Vec3::new(0.2, 0.7, 0.4);
        assert!(approx(hsv_to_rgb(rgb_to_hsv(rgb)), rgb, 1e-5));
    }

    #[test]
    fn hue_shift_full_turn_is_identity() {
        let rgb = Vec3::new(0.9, 0.3, 0.1);
        assert!(approx(hue_shift(rgb, 360.0), rgb, 1e-4));
        assert!(approx(hue_shift(rgb, 0.0), rgb, 1e-5));
    }

    #[test]
    fn hue_shift_moves_red_to_green() {
        let shifted = hue_shift(Vec3::X, 120.0);
        assert!(approx(shifted, Vec3::Y, 1e-4));
    }

    #[test]
    fn yiq_shift_preserves_luma() {
        let rgb = Vec3::new(0.6, 0.4, 0.2);
        let luma = |c: Vec3| c.dot(Vec3::new(0.299, 0.587, 0.114));
        let shifted = hue_shift_yiq(rgb, 90.0);
        assert!((luma(shifted) - luma(rgb)).abs() < 1e-2);
        assert!(approx(hue_shift_yiq(rgb, 0.0), rgb, 1e-2));
    }

    #[test]
    fn overlay_matches_piecewise_definition() {
        assert!((overlay_channel(0.25, 0.5) - 0.25).abs() < 1e-6);
        assert!((overlay_channel(0.75, 0.5) - 0.75).abs() < 1e-6);
        assert!((overlay_channel(0.5, 1.0) - 1.0).abs() < 1e-6);
        assert_eq!(overlay_channel(0.0, 0.9), 0.0);
    }

    #[test]
    fn boost_keeps_peak_channel() {
        let rgb = Vec3::new(0.8, 0.5, 0.4);
        let boosted = boost_saturation(rgb, 0.5);
        assert!((boosted.x - 0.8).abs() < 1e-6);
        assert!(boosted.y < rgb.y);
        assert!(rgb_to_hsl(boosted).y > rgb_to_hsl(rgb).y);
    }

    #[test]
    fn safe_denominator_only_touches_zero() {
        assert_eq!(safe_denominator(0.0), 1.0);
        assert_eq!(safe_denominator(0.25), 0.25);
    }
}
