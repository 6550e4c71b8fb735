use std::path::Path;

use anyhow::{Context, Result};
use glam::{Vec2, Vec4};

use crate::error::ShineError;

/// Decoded RGBA8 image, row 0 at the top.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ShineError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(ShineError::BitmapSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Single translucent white texel used when an image cannot be loaded.
    pub fn placeholder() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255, 255, 255, 25],
        }
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, ShineError> {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open image at {}", path.display()))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self::new(width, height, image.into_raw())?)
    }

    pub fn from_image(image: image::RgbaImage) -> Result<Self, ShineError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let offset = (y * self.width as usize + x) * 4;
        let bytes = &self.pixels[offset..offset + 4];
        Vec4::new(
            f32::from(bytes[0]),
            f32::from(bytes[1]),
            f32::from(bytes[2]),
            f32::from(bytes[3]),
        ) / 255.0
    }

    /// Bilinear sample at a texture coordinate with clamp-to-edge addressing, matching the
    /// sampler bound on the GPU.
    pub fn sample(&self, coord: Vec2) -> Vec4 {
        let x = coord.x * self.width as f32 - 0.5;
        let y = coord.y * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let clamp_x = |value: f32| value.clamp(0.0, (self.width - 1) as f32) as u32;
        let clamp_y = |value: f32| value.clamp(0.0, (self.height - 1) as f32) as u32;
        let (left, right) = (clamp_x(x0), clamp_x(x0 + 1.0));
        let (top, bottom) = (clamp_y(y0), clamp_y(y0 + 1.0));

        let upper = self.texel(left, top).lerp(self.texel(right, top), fx);
        let lower = self.texel(left, bottom).lerp(self.texel(right, bottom), fx);
        upper.lerp(lower, fy)
    }
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Effects compute in gamma space; prefer a non-sRGB surface.
    #[default]
    Auto,
    Gamma,
    /// Use an sRGB surface and let the hardware encode.
    Linear,
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    #[default]
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// Host-side 3D view transform: the whole quad is rotated by the light vector times
/// `intensity` degrees and seen through a `perspective` pixel camera distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTilt {
    pub perspective: f32,
    pub intensity: f32,
}

impl Default for ViewTilt {
    fn default() -> Self {
        Self {
            perspective: 300.0,
            intensity: 10.0,
        }
    }
}

impl ViewTilt {
    /// `(rotate_x, rotate_y)` in degrees for a light position.
    pub fn angles(&self, light: Vec2) -> (f32, f32) {
        (-light.y * self.intensity, light.x * self.intensity)
    }
}

/// Perspective tilt of the quad around the light position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltOptions {
    pub enabled: bool,
    pub max_angle_degrees: f32,
    pub perspective: f32,
    pub z_offset: f32,
    pub view: Option<ViewTilt>,
}

impl Default for TiltOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_angle_degrees: 25.0,
            perspective: 100.0,
            z_offset: 2.5,
            view: None,
        }
    }
}

/// Gaussian blur applied to the mask texture before reverse holo samples it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurOptions {
    pub radius: u32,
    pub sigma: f32,
}

/// Largest radius the blur kernel loop covers.
pub const MAX_BLUR_RADIUS: u32 = 32;

impl Default for BlurOptions {
    fn default() -> Self {
        Self {
            radius: 8,
            sigma: 4.0,
        }
    }
}

impl BlurOptions {
    pub fn clamped(self) -> Self {
        Self {
            radius: self.radius.min(MAX_BLUR_RADIUS),
            sigma: self.sigma.max(0.01),
        }
    }

    /// Normalised 1D kernel, index 0 is offset `-radius`.
    pub fn kernel(&self) -> Vec<f32> {
        let clamped = self.clamped();
        let radius = clamped.radius as i32;
        let two_sigma_sq = 2.0 * clamped.sigma * clamped.sigma;
        let weights: Vec<f32> = (-radius..=radius)
            .map(|offset| {
                let offset = offset as f32;
                (-(offset * offset) / two_sigma_sq).exp()
            })
            .collect();
        let total: f32 = weights.iter().sum();
        weights.into_iter().map(|weight| weight / total).collect()
    }
}

/// Runtime knobs for the windowed preview.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Window or surface size in physical pixels.
    pub surface_size: (u32, u32),
    pub antialiasing: Antialiasing,
    pub color_space: ColorSpaceMode,
    /// Desired swapchain latency, clamped to 1..=3.
    pub gpu_latency: u32,
    pub tilt: TiltOptions,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (800, 800),
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
            gpu_latency: 2,
            tilt: TiltOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_rejects_mismatched_buffers() {
        assert!(matches!(
            Bitmap::new(2, 2, vec![0; 15]),
            Err(ShineError::BitmapSize {
                expected: 16,
                actual: 15,
                ..
            })
        ));
        assert!(Bitmap::new(0, 4, Vec::new()).is_err());
        assert!(Bitmap::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn sample_hits_texel_centres_exactly() {
        let mut pixels = vec![0u8; 8];
        pixels[4..8].copy_from_slice(&[255, 255, 255, 255]);
        let bitmap = Bitmap::new(2, 1, pixels).unwrap();
        assert_eq!(bitmap.sample(Vec2::new(0.25, 0.5)), Vec4::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(bitmap.sample(Vec2::new(0.75, 0.5)), Vec4::ONE);
        let mid = bitmap.sample(Vec2::new(0.5, 0.5));
        assert!((mid.x - 0.5).abs() < 1e-6);
        // clamp to edge
        assert_eq!(bitmap.sample(Vec2::new(-1.0, 0.5)), Vec4::ZERO);
    }

    #[test]
    fn blur_kernel_is_normalised_and_symmetric() {
        let kernel = BlurOptions { radius: 3, sigma: 1.5 }.kernel();
        assert_eq!(kernel.len(), 7);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[6]).abs() < 1e-7);
        assert!(kernel[3] > kernel[2]);
        assert_eq!(BlurOptions { radius: 99, sigma: 1.0 }.kernel().len(), 65);
    }

    #[test]
    fn view_tilt_scales_light_into_degrees() {
        let (rotate_x, rotate_y) = ViewTilt::default().angles(Vec2::new(0.5, -1.0));
        assert_eq!(rotate_x, 10.0);
        assert_eq!(rotate_y, 5.0);
    }
}
