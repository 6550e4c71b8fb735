//! Color mask engine.
//!
//! A [`ColorMaskSet`] is an ordered list of up to [`MAX_MASKS`] descriptors. Each descriptor
//! matches a pixel either by an RGB box around a base color or by an HSL window; the set
//! OR-combines the active descriptors and optionally inverts the verdict. Masked pixels are hidden
//! (alpha zero) unless a debug descriptor is active, in which case they are painted opaque red.
//!
//! The same evaluation runs in `shaders/color_mask.wgsl` (inline) and
//! `shaders/color_mask_prepass.wgsl` (compute); [`ColorMaskSet::evaluate`] is the CPU reference
//! used by the software compositor and the tests.

use glam::{Vec3, Vec4};

use crate::color::rgb_to_hsl;
use crate::error::ShineError;

/// Upper bound on descriptors per set; the uniform array is sized to match.
pub const MAX_MASKS: usize = 16;

/// Color written for masked pixels while debugging.
pub const DEBUG_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

/// Hue width swept from `hue_min` to `hue_max`, wrapping through 360.
///
/// A zero-width result only stands when both bounds are equal; otherwise it is the full circle
/// (e.g. `0..360`).
pub fn hue_range(hue_min: f32, hue_max: f32) -> f32 {
    let range = (hue_max - hue_min + 360.0).rem_euclid(360.0);
    if range == 0.0 && hue_min != hue_max {
        360.0
    } else {
        range
    }
}

/// Per-channel tolerance in `0..=255` units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgbTolerance {
    pub upper: [u8; 3],
    pub lower: [u8; 3],
}

impl RgbTolerance {
    pub const fn uniform(value: u8) -> Self {
        Self {
            upper: [value; 3],
            lower: [value; 3],
        }
    }
}

impl Default for RgbTolerance {
    fn default() -> Self {
        Self::uniform(20)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HslWindow {
    pub hue_min: f32,
    pub hue_max: f32,
    pub saturation_min: f32,
    pub saturation_max: f32,
    pub lightness_min: f32,
    pub lightness_max: f32,
}

impl HslWindow {
    pub fn hue(hue_min: f32, hue_max: f32) -> Self {
        Self {
            hue_min,
            hue_max,
            ..Self::default()
        }
    }

    pub fn hue_range(&self) -> f32 {
        hue_range(self.hue_min, self.hue_max)
    }

    /// True when `hsl` (hue in degrees) falls inside the window.
    pub fn contains(&self, hsl: Vec3) -> bool {
        let distance = (hsl.x - self.hue_min + 360.0).rem_euclid(360.0);
        let hue_ok = distance <= self.hue_range();
        let saturation_ok = (self.saturation_min..=self.saturation_max).contains(&hsl.y);
        let lightness_ok = (self.lightness_min..=self.lightness_max).contains(&hsl.z);
        hue_ok && saturation_ok && lightness_ok
    }
}

impl Default for HslWindow {
    fn default() -> Self {
        Self {
            hue_min: 0.0,
            hue_max: 360.0,
            saturation_min: 0.2,
            saturation_max: 1.0,
            lightness_min: 0.3,
            lightness_max: 0.9,
        }
    }
}

/// One entry of a [`ColorMaskSet`].
///
/// Both rule forms are stored so the GPU layout stays fixed; `use_hsv` selects which one is
/// evaluated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorMaskDescriptor {
    pub base_color: [u8; 3],
    pub tolerance: RgbTolerance,
    pub window: HslWindow,
    pub use_hsv: bool,
    pub debug: bool,
}

impl Default for ColorMaskDescriptor {
    fn default() -> Self {
        Self {
            base_color: [0, 0, 0],
            tolerance: RgbTolerance::default(),
            window: HslWindow::default(),
            use_hsv: false,
            debug: false,
        }
    }
}

impl ColorMaskDescriptor {
    pub fn rgb(base_color: [u8; 3], tolerance: RgbTolerance) -> Self {
        Self {
            base_color,
            tolerance,
            ..Self::default()
        }
    }

    pub fn hsl(window: HslWindow) -> Self {
        Self {
            window,
            use_hsv: true,
            ..Self::default()
        }
    }

    /// Hue-window mask centred on the hue of `base_color`, `tolerance` degrees either side.
    pub fn highlight(base_color: [u8; 3], tolerance: f32) -> Self {
        let hue = rgb_to_hsl(normalize(base_color)).x;
        Self {
            base_color,
            window: HslWindow::hue(
                (hue - tolerance).rem_euclid(360.0),
                (hue + tolerance).rem_euclid(360.0),
            ),
            use_hsv: true,
            ..Self::default()
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Inclusive RGB bounds normalized to `[0, 1]`.
    pub fn rgb_bounds(&self) -> (Vec3, Vec3) {
        let base = normalize(self.base_color);
        (
            base - normalize(self.tolerance.lower),
            base + normalize(self.tolerance.upper),
        )
    }

    pub fn matches_rgb(&self, rgb: Vec3) -> bool {
        let (lower, upper) = self.rgb_bounds();
        rgb.cmple(upper).all() && rgb.cmpge(lower).all()
    }

    /// Evaluates the selected rule; `hsl` must be the HSL form of `rgb`.
    pub fn matches(&self, rgb: Vec3, hsl: Vec3) -> bool {
        if self.use_hsv {
            self.window.contains(hsl)
        } else {
            self.matches_rgb(rgb)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaskVerdict {
    pub any_match: bool,
    pub masked: bool,
    pub debug: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorMaskSet {
    masks: Vec<ColorMaskDescriptor>,
    pub reverse_highlight: bool,
}

impl ColorMaskSet {
    pub fn new(reverse_highlight: bool) -> Self {
        Self {
            masks: Vec::new(),
            reverse_highlight,
        }
    }

    pub fn from_masks(
        masks: impl IntoIterator<Item = ColorMaskDescriptor>,
        reverse_highlight: bool,
    ) -> Result<Self, ShineError> {
        let mut set = Self::new(reverse_highlight);
        for mask in masks {
            set.push(mask)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, mask: ColorMaskDescriptor) -> Result<(), ShineError> {
        if self.masks.len() >= MAX_MASKS {
            return Err(ShineError::TooManyMasks { max: MAX_MASKS });
        }
        self.masks.push(mask);
        Ok(())
    }

    pub fn masks(&self) -> &[ColorMaskDescriptor] {
        &self.masks
    }

    pub fn used_count(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn evaluate(&self, rgb: Vec3) -> MaskVerdict {
        let hsl = rgb_to_hsl(rgb);
        let any_match = self.masks.iter().any(|mask| mask.matches(rgb, hsl));
        let debug = self.masks.iter().any(|mask| mask.debug);
        let masked = if self.reverse_highlight {
            !any_match
        } else {
            any_match
        };
        MaskVerdict {
            any_match,
            masked,
            debug,
        }
    }

    /// Applies the verdict to a sampled pixel.
    pub fn apply(&self, rgba: Vec4) -> Vec4 {
        let verdict = self.evaluate(rgba.truncate());
        match (verdict.masked, verdict.debug) {
            (false, _) => rgba,
            (true, false) => rgba.truncate().extend(0.0),
            (true, true) => DEBUG_COLOR,
        }
    }
}

pub(crate) fn normalize(channels: [u8; 3]) -> Vec3 {
    Vec3::new(
        f32::from(channels[0]),
        f32::from(channels[1]),
        f32::from(channels[2]),
    ) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hue_range_cases() {
        assert_eq!(hue_range(30.0, 30.0), 0.0);
        assert_eq!(hue_range(350.0, 10.0), 20.0);
        assert_eq!(hue_range(10.0, 350.0), 340.0);
        assert_eq!(hue_range(0.0, 360.0), 360.0);
        assert_eq!(hue_range(10.0, 10.0), 0.0);
    }

    #[test]
    fn base_color_always_in_range() {
        for base in [[0, 0, 0], [255, 255, 255], [12, 200, 99], [128, 64, 32]] {
            for tolerance in [RgbTolerance::uniform(0), RgbTolerance::default()] {
                let mask = ColorMaskDescriptor::rgb(base, tolerance);
                assert!(mask.matches_rgb(normalize(base)), "{base:?} {tolerance:?}");
            }
        }
    }

    #[test]
    fn rgb_box_respects_asymmetric_tolerance() {
        let mask = ColorMaskDescriptor::rgb(
            [100, 100, 100],
            RgbTolerance {
                upper: [10, 10, 10],
                lower: [0, 0, 0],
            },
        );
        assert!(mask.matches_rgb(normalize([105, 110, 100])));
        assert!(!mask.matches_rgb(normalize([99, 100, 100])));
        assert!(!mask.matches_rgb(normalize([100, 111, 100])));
    }

    #[test]
    fn hsl_window_wraps_through_red() {
        let mask = ColorMaskDescriptor::hsl(HslWindow {
            saturation_min: 0.0,
            lightness_min: 0.0,
            lightness_max: 1.0,
            ..HslWindow::hue(350.0, 10.0)
        });
        let red = Vec3::new(1.0, 0.0, 0.0);
        let green = Vec3::new(0.0, 1.0, 0.0);
        assert!(mask.matches(red, rgb_to_hsl(red)));
        assert!(!mask.matches(green, rgb_to_hsl(green)));
    }

    #[test]
    fn empty_set_never_masks() {
        let set = ColorMaskSet::default();
        for rgb in [Vec3::ZERO, Vec3::ONE, Vec3::new(0.3, 0.6, 0.9)] {
            let pixel = rgb.extend(1.0);
            assert!(!set.evaluate(rgb).masked);
            assert_eq!(set.apply(pixel), pixel);
        }
    }

    #[test]
    fn reverse_highlight_inverts() {
        let mut set = ColorMaskSet::new(true);
        set.push(ColorMaskDescriptor::rgb([0, 0, 0], RgbTolerance::uniform(5)))
            .unwrap();
        assert!(!set.evaluate(Vec3::ZERO).masked);
        assert!(set.evaluate(Vec3::ONE).masked);
        assert_eq!(set.apply(Vec4::ONE).w, 0.0);
    }

    #[test]
    fn any_mask_matching_is_enough() {
        let set = ColorMaskSet::from_masks(
            [
                ColorMaskDescriptor::rgb([255, 0, 0], RgbTolerance::uniform(0)),
                ColorMaskDescriptor::rgb([0, 0, 255], RgbTolerance::uniform(0)),
            ],
            false,
        )
        .unwrap();
        assert!(set.evaluate(Vec3::Z).masked);
        assert!(!set.evaluate(Vec3::Y).masked);
    }

    #[test]
    fn debug_paints_masked_pixels_red() {
        let set = ColorMaskSet::from_masks(
            [ColorMaskDescriptor::rgb([0, 0, 0], RgbTolerance::uniform(10)).with_debug(true)],
            false,
        )
        .unwrap();
        assert_eq!(set.apply(Vec4::new(0.0, 0.0, 0.0, 1.0)), DEBUG_COLOR);
        let untouched = Vec4::new(0.5, 0.5, 0.5, 1.0);
        assert_eq!(set.apply(untouched), untouched);
    }

    #[test]
    fn highlight_centres_window_on_hue() {
        let mask = ColorMaskDescriptor::highlight([255, 0, 0], 15.0);
        assert_eq!(mask.window.hue_min, 345.0);
        assert_eq!(mask.window.hue_max, 15.0);
        assert_eq!(mask.window.hue_range(), 30.0);
    }

    #[test]
    fn set_is_bounded() {
        let mut set = ColorMaskSet::default();
        for _ in 0..MAX_MASKS {
            set.push(ColorMaskDescriptor::default()).unwrap();
        }
        assert!(matches!(
            set.push(ColorMaskDescriptor::default()),
            Err(ShineError::TooManyMasks { .. })
        ));
    }
}
