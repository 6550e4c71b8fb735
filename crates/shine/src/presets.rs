//! Named colors and hue windows for building masks.

use crate::mask::{ColorMaskDescriptor, HslWindow};

/// Hue tolerance, in degrees either side, used by [`highlight`].
pub const HIGHLIGHT_HUE_TOLERANCE: f32 = 15.0;

pub const RGB_PRESETS: &[(&str, [u8; 3])] = &[
    ("RED", [255, 0, 0]),
    ("GREEN", [0, 255, 0]),
    ("BLUE", [0, 0, 255]),
    ("YELLOW", [255, 255, 0]),
    ("CYAN", [0, 255, 255]),
    ("MAGENTA", [255, 0, 255]),
    ("WHITE", [255, 255, 255]),
    ("BLACK", [0, 0, 0]),
    ("GRAY", [128, 128, 128]),
    ("LIGHT_GRAY", [211, 211, 211]),
    ("DARK_GRAY", [105, 105, 105]),
    ("ORANGE", [255, 165, 0]),
    ("PURPLE", [128, 0, 128]),
    ("BROWN", [165, 42, 42]),
    ("PINK", [255, 192, 203]),
    ("LIME_GREEN", [50, 205, 50]),
    ("FOREST_GREEN", [34, 139, 34]),
    ("OLIVE", [128, 128, 0]),
    ("TEAL", [0, 128, 128]),
    ("NAVY", [0, 0, 128]),
    ("ROYAL_BLUE", [65, 105, 225]),
    ("SKY_BLUE", [135, 206, 235]),
    ("INDIGO", [75, 0, 130]),
    ("VIOLET", [238, 130, 238]),
    ("MAROON", [128, 0, 0]),
    ("GOLD", [255, 215, 0]),
    ("TOMATO", [255, 99, 71]),
    ("SALMON", [250, 128, 114]),
    ("BEIGE", [245, 245, 220]),
    ("POTATO", [222, 184, 135]),
];

const fn hue(hue_min: f32, hue_max: f32) -> HslWindow {
    HslWindow {
        hue_min,
        hue_max,
        saturation_min: 0.2,
        saturation_max: 1.0,
        lightness_min: 0.3,
        lightness_max: 0.9,
    }
}

const fn window(
    hue_min: f32,
    hue_max: f32,
    saturation: (f32, f32),
    lightness: (f32, f32),
) -> HslWindow {
    HslWindow {
        hue_min,
        hue_max,
        saturation_min: saturation.0,
        saturation_max: saturation.1,
        lightness_min: lightness.0,
        lightness_max: lightness.1,
    }
}

pub const HSL_PRESETS: &[(&str, HslWindow)] = &[
    ("RED", hue(330.0, 15.0)),
    ("ORANGE", hue(15.0, 45.0)),
    ("YELLOW", hue(45.0, 75.0)),
    ("GREEN", hue(75.0, 165.0)),
    ("BLUE", hue(165.0, 255.0)),
    ("VIOLET", hue(255.0, 285.0)),
    ("MAGENTA", hue(285.0, 330.0)),
    ("TRUE_RED", hue(345.0, 15.0)),
    ("CRIMSON", hue(330.0, 350.0)),
    ("ROSE", hue(315.0, 335.0)),
    ("PINK", hue(300.0, 330.0)),
    ("CORAL", hue(10.0, 30.0)),
    ("TRUE_ORANGE", hue(20.0, 45.0)),
    ("AMBER", hue(35.0, 50.0)),
    ("TRUE_YELLOW", hue(45.0, 65.0)),
    ("GOLD", hue(40.0, 55.0)),
    ("LIME", hue(65.0, 90.0)),
    ("CHARTREUSE", hue(70.0, 100.0)),
    ("TRUE_GREEN", hue(90.0, 140.0)),
    ("EMERALD", hue(130.0, 160.0)),
    ("MINT", hue(140.0, 170.0)),
    ("TEAL", hue(160.0, 180.0)),
    ("CYAN", hue(170.0, 195.0)),
    ("TURQUOISE", hue(165.0, 190.0)),
    ("AZURE", hue(190.0, 215.0)),
    ("TRUE_BLUE", hue(210.0, 240.0)),
    ("ROYAL_BLUE", hue(225.0, 250.0)),
    ("INDIGO", hue(240.0, 260.0)),
    ("TRUE_VIOLET", hue(250.0, 280.0)),
    ("PURPLE", hue(260.0, 290.0)),
    ("TRUE_MAGENTA", hue(285.0, 315.0)),
    ("FUCHSIA", hue(295.0, 325.0)),
    ("GRAY", window(0.0, 360.0, (0.0, 0.2), (0.3, 0.9))),
    ("BEIGE", window(330.0, 300.0, (0.0, 0.3), (0.4, 0.95))),
    ("WHITE", window(0.0, 360.0, (0.0, 1.0), (0.9, 1.0))),
    ("BLACK", window(0.0, 360.0, (0.0, 1.0), (0.0, 0.2))),
];

/// Looks up an RGB preset by name, ignoring ASCII case and treating `-` as `_`.
pub fn rgb(name: &str) -> Option<[u8; 3]> {
    lookup(RGB_PRESETS, name)
}

pub fn hsl(name: &str) -> Option<HslWindow> {
    lookup(HSL_PRESETS, name)
}

/// Hue-window mask around a named RGB preset.
pub fn highlight(name: &str) -> Option<ColorMaskDescriptor> {
    rgb(name).map(|color| ColorMaskDescriptor::highlight(color, HIGHLIGHT_HUE_TOLERANCE))
}

fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    let wanted = name.trim().replace('-', "_");
    table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(&wanted))
        .map(|(_, value)| *value)
}
