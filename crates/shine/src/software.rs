//! CPU compositor producing the same layering as the GPU passes.
//!
//! Holo and double holo use a `sin`-based per-pixel hash whose precision differs between CPU and
//! GPU, so their noise is only approximately reproduced here.
//!
//! Used for headless export where no adapter is available, and as the reference the effect
//! math is tested against. Tilt and view transforms are not applied; the image always fills the
//! output.

use glam::{Vec2, Vec4};
use image::RgbaImage;

use crate::effects::{BlendMode, EffectDescriptor, EffectOptions, EffectRegistry, Fragment};
use crate::error::ShineError;
use crate::scene::Scene;
use crate::types::{Bitmap, BlurOptions};
use crate::vector::LightVector;

/// Renders `scene` at `size` for one light position.
pub fn composite(
    scene: &Scene,
    light: LightVector,
    size: (u32, u32),
) -> Result<RgbaImage, ShineError> {
    let registry = EffectRegistry::with_builtin();
    let (width, height) = (size.0.max(1), size.1.max(1));

    let blurred = match (&scene.mask, scene.blur) {
        (Some(mask), Some(blur)) => Some(blur_bitmap(mask, &blur)?),
        (None, Some(_)) => {
            tracing::warn!("blur requested without a mask image; skipping");
            None
        }
        _ => None,
    };
    let effect_mask = blurred.as_ref().or(scene.mask.as_ref());

    let mut layers: Vec<(&'static EffectDescriptor, EffectOptions)> = Vec::new();
    for request in &scene.effects {
        let descriptor = registry.get(request.kind)?;
        if descriptor.requires_mask && effect_mask.is_none() {
            tracing::warn!(effect = %request.kind, "effect needs a mask texture; skipping");
            continue;
        }
        layers.push((descriptor, registry.resolve(request.kind, request.over.as_ref())?));
    }
    let mask_pass = match (&scene.mask, scene.mask_pass) {
        (Some(mask), true) => Some(mask),
        (None, true) => {
            tracing::warn!("mask pass requested without a mask image; skipping");
            None
        }
        _ => None,
    };

    let mut output = RgbaImage::new(width, height);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let uv = Vec2::new(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        );
        let color = scene.base.sample(uv);
        let mut out = color;

        if let Some(mask) = mask_pass {
            if mask.sample(uv).truncate() != glam::Vec3::ZERO {
                out = BlendMode::AlphaOver.apply(color, out);
            }
        }

        let fragment = Fragment {
            uv,
            color,
            mask: effect_mask.map(|mask| mask.sample(uv)),
            light: light.0,
        };
        for (descriptor, options) in &layers {
            let src = (descriptor.shade)(&fragment, options)
                .ok_or(ShineError::OptionMismatch(descriptor.kind))?;
            out = descriptor.blend.apply(src, out);
        }

        if let Some(masks) = &scene.color_masks {
            out = BlendMode::AlphaOver.apply(masks.apply(color), out);
        }
        pixel.0 = to_rgba8(out);
    }

    tracing::debug!(
        width,
        height,
        effects = layers.len(),
        color_masks = scene.color_masks.is_some(),
        "software composite finished"
    );
    Ok(output)
}

fn to_rgba8(color: Vec4) -> [u8; 4] {
    let scaled = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    [
        scaled.x as u8,
        scaled.y as u8,
        scaled.z as u8,
        scaled.w as u8,
    ]
}

/// Separable gaussian over texel centres with clamp-to-edge addressing, quantized to 8 bits
/// between passes like the storage textures on the GPU.
pub fn blur_bitmap(bitmap: &Bitmap, options: &BlurOptions) -> Result<Bitmap, ShineError> {
    let kernel = options.kernel();
    let radius = (kernel.len() / 2) as i64;
    let horizontal = convolve(bitmap, &kernel, radius, (1, 0))?;
    convolve(&horizontal, &kernel, radius, (0, 1))
}

fn convolve(
    bitmap: &Bitmap,
    kernel: &[f32],
    radius: i64,
    direction: (i64, i64),
) -> Result<Bitmap, ShineError> {
    let (width, height) = bitmap.size();
    let clamp = |value: i64, limit: u32| value.clamp(0, i64::from(limit) - 1) as u32;
    let mut pixels = Vec::with_capacity(bitmap.pixels().len());
    for y in 0..height {
        for x in 0..width {
            let total: Vec4 = kernel
                .iter()
                .enumerate()
                .map(|(index, weight)| {
                    let offset = index as i64 - radius;
                    let sx = clamp(i64::from(x) + offset * direction.0, width);
                    let sy = clamp(i64::from(y) + offset * direction.1, height);
                    bitmap.texel(sx, sy) * *weight
                })
                .sum();
            pixels.extend_from_slice(&to_rgba8(total));
        }
    }
    Bitmap::new(width, height, pixels)
}
