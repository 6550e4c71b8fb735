use std::path::PathBuf;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use shine::effects::EffectKind;
use shine::mask::{ColorMaskDescriptor, ColorMaskSet, HslWindow, RgbTolerance, MAX_MASKS};
use shine::{
    presets, Antialiasing, Bitmap, BlurOptions, ColorSpaceMode, EffectOverride, EffectRequest,
    RendererConfig, Scene, TiltOptions, ViewTilt,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    pub version: u32,
    /// Base image, relative paths resolve against the config file's directory.
    pub image: PathBuf,
    pub mask: Option<PathBuf>,
    #[serde(default)]
    pub size: Option<[u32; 2]>,
    #[serde(default)]
    pub mask_pass: bool,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<Antialiasing>,
    #[serde(default)]
    pub color_space: Option<ColorSpaceSetting>,
    #[serde(default)]
    pub light: LightConfig,
    #[serde(default)]
    pub tilt: Option<TiltConfig>,
    #[serde(default)]
    pub blur: Option<BlurConfig>,
    #[serde(default)]
    pub masks: Option<MaskListConfig>,
    #[serde(default)]
    pub effects: Vec<EffectEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpaceSetting {
    Auto,
    Gamma,
    Linear,
}

impl From<ColorSpaceSetting> for ColorSpaceMode {
    fn from(setting: ColorSpaceSetting) -> Self {
        match setting {
            ColorSpaceSetting::Auto => ColorSpaceMode::Auto,
            ColorSpaceSetting::Gamma => ColorSpaceMode::Gamma,
            ColorSpaceSetting::Linear => ColorSpaceMode::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightSourceKind {
    #[default]
    Pointer,
    Sensor,
    Fixed,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LightConfig {
    #[serde(default)]
    pub source: LightSourceKind,
    /// Position for `fixed`, in `[-1, 1]` screen space with y down.
    pub position: Option<[f32; 2]>,
    /// Gravity samples replayed in a loop for `sensor`.
    #[serde(default)]
    pub samples: Vec<[f32; 3]>,
}

/// Resolved light input for the preview.
#[derive(Debug, Clone, PartialEq)]
pub enum LightSource {
    Pointer,
    Sensor(Vec<[f32; 3]>),
    Fixed([f32; 2]),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TiltConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub max_angle: Option<f32>,
    pub perspective: Option<f32>,
    pub z_offset: Option<f32>,
    pub view: Option<ViewTiltConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewTiltConfig {
    pub perspective: Option<f32>,
    pub intensity: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlurConfig {
    pub radius: Option<u32>,
    pub sigma: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaskListConfig {
    #[serde(default)]
    pub reverse_highlight: bool,
    #[serde(default)]
    pub items: Vec<MaskEntry>,
}

/// One color mask. Exactly one of `preset`, `rgb` or an HSL window (`hsl` preset and/or
/// `hue`/`saturation`/`lightness`) selects the rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaskEntry {
    /// Highlight mask around a named RGB preset.
    pub preset: Option<String>,
    pub rgb: Option<[u16; 3]>,
    pub tolerance: Option<u16>,
    pub upper: Option<[u16; 3]>,
    pub lower: Option<[u16; 3]>,
    pub hsl: Option<String>,
    pub hue: Option<[f32; 2]>,
    pub saturation: Option<[f32; 2]>,
    pub lightness: Option<[f32; 2]>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectEntry {
    pub name: String,
    /// Per-effect overrides, keys as in the effect's option names (`glowPower`, `holoSize`, ...).
    #[serde(default)]
    pub options: Option<toml::Table>,
}

fn default_true() -> bool {
    true
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<Antialiasing>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    match helper {
        None => Ok(None),
        Some(Helper::Str(raw)) => parse_antialias(&raw).map(Some).map_err(de::Error::custom),
        Some(Helper::Num(value)) if value < 0 => {
            Err(de::Error::custom("antialias value must be non-negative"))
        }
        Some(Helper::Num(value)) => parse_antialias(&value.to_string())
            .map(Some)
            .map_err(de::Error::custom),
    }
}

fn parse_antialias(raw: &str) -> Result<Antialiasing, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(Antialiasing::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(Antialiasing::Off),
        "2" | "4" | "8" | "16" => normalized
            .parse()
            .map(Antialiasing::Samples)
            .map_err(|err| format!("invalid antialias setting '{normalized}': {err}")),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }
        if self.image.as_os_str().is_empty() {
            return Err(invalid("image path may not be empty"));
        }
        if self.mask.as_ref().is_some_and(|mask| mask.as_os_str().is_empty()) {
            return Err(invalid("mask path may not be empty"));
        }
        if let Some([width, height]) = self.size {
            if width == 0 || height == 0 {
                return Err(invalid("size must be greater than zero"));
            }
        }

        self.effect_requests()?;
        self.color_mask_set()?;
        self.light_source()?;

        if let Some(blur) = &self.blur {
            if blur.sigma.is_some_and(|sigma| sigma <= 0.0) {
                return Err(invalid("blur.sigma must be > 0"));
            }
        }
        if let Some(tilt) = &self.tilt {
            if tilt.max_angle.is_some_and(|angle| !(0.0..=90.0).contains(&angle)) {
                return Err(invalid("tilt.max_angle must be within [0, 90]"));
            }
            if tilt.perspective.is_some_and(|value| value <= 0.0) {
                return Err(invalid("tilt.perspective must be > 0"));
            }
            if let Some(view) = &tilt.view {
                if view.perspective.is_some_and(|value| value <= 0.0) {
                    return Err(invalid("tilt.view.perspective must be > 0"));
                }
            }
        }
        Ok(())
    }

    /// Effects in draw order with their parsed overrides.
    pub fn effect_requests(&self) -> Result<Vec<EffectRequest>, ConfigError> {
        self.effects
            .iter()
            .map(|entry| {
                let kind: EffectKind = entry
                    .name
                    .parse()
                    .map_err(|err| invalid(format!("{err}")))?;
                let over = entry
                    .options
                    .as_ref()
                    .map(|table| {
                        EffectOverride::deserialize_for(kind, toml::Value::Table(table.clone()))
                            .map_err(|err| invalid(format!("options for '{kind}': {err}")))
                    })
                    .transpose()?;
                Ok(EffectRequest { kind, over })
            })
            .collect()
    }

    pub fn color_mask_set(&self) -> Result<Option<ColorMaskSet>, ConfigError> {
        let Some(list) = &self.masks else {
            return Ok(None);
        };
        if list.items.len() > MAX_MASKS {
            return Err(invalid(format!(
                "{} color masks configured; at most {MAX_MASKS} are supported",
                list.items.len()
            )));
        }
        let descriptors = list
            .items
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .descriptor()
                    .map_err(|err| invalid(format!("masks.items[{index}]: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        ColorMaskSet::from_masks(descriptors, list.reverse_highlight)
            .map(Some)
            .map_err(|err| invalid(err.to_string()))
    }

    pub fn light_source(&self) -> Result<LightSource, ConfigError> {
        match self.light.source {
            LightSourceKind::Pointer => Ok(LightSource::Pointer),
            LightSourceKind::Sensor => Ok(LightSource::Sensor(self.light.samples.clone())),
            LightSourceKind::Fixed => self
                .light
                .position
                .map(LightSource::Fixed)
                .ok_or_else(|| invalid("light.position is required for a fixed light")),
        }
    }

    pub fn tilt_options(&self) -> TiltOptions {
        let defaults = TiltOptions::default();
        let Some(tilt) = &self.tilt else {
            return defaults;
        };
        TiltOptions {
            enabled: tilt.enabled,
            max_angle_degrees: tilt.max_angle.unwrap_or(defaults.max_angle_degrees),
            perspective: tilt.perspective.unwrap_or(defaults.perspective),
            z_offset: tilt.z_offset.unwrap_or(defaults.z_offset),
            view: tilt.view.as_ref().map(|view| {
                let base = ViewTilt::default();
                ViewTilt {
                    perspective: view.perspective.unwrap_or(base.perspective),
                    intensity: view.intensity.unwrap_or(base.intensity),
                }
            }),
        }
    }

    pub fn blur_options(&self) -> Option<BlurOptions> {
        self.blur.as_ref().map(|blur| {
            let defaults = BlurOptions::default();
            BlurOptions {
                radius: blur.radius.unwrap_or(defaults.radius),
                sigma: blur.sigma.unwrap_or(defaults.sigma),
            }
        })
    }

    pub fn renderer_config(&self) -> RendererConfig {
        let defaults = RendererConfig::default();
        RendererConfig {
            surface_size: self
                .size
                .map(|[width, height]| (width, height))
                .unwrap_or(defaults.surface_size),
            antialiasing: self.antialias.unwrap_or(defaults.antialiasing),
            color_space: self
                .color_space
                .map(ColorSpaceMode::from)
                .unwrap_or(defaults.color_space),
            tilt: self.tilt_options(),
            ..defaults
        }
    }

    /// Assembles a scene around already decoded images.
    pub fn build_scene(&self, base: Bitmap, mask: Option<Bitmap>) -> Result<Scene, ConfigError> {
        let mut scene = Scene::new(base);
        scene.mask = mask;
        scene.effects = self.effect_requests()?;
        scene.color_masks = self.color_mask_set()?;
        scene.blur = self.blur_options();
        scene.mask_pass = self.mask_pass;
        scene.tilt = self.tilt_options();
        Ok(scene)
    }
}

impl MaskEntry {
    fn descriptor(&self) -> Result<ColorMaskDescriptor, String> {
        let has_window = self.hsl.is_some()
            || self.hue.is_some()
            || self.saturation.is_some()
            || self.lightness.is_some();
        let forms = [self.preset.is_some(), self.rgb.is_some(), has_window]
            .into_iter()
            .filter(|set| *set)
            .count();
        if forms != 1 {
            return Err("set exactly one of preset, rgb or an hsl window".into());
        }

        let descriptor = if let Some(name) = &self.preset {
            presets::highlight(name).ok_or_else(|| format!("unknown color preset '{name}'"))?
        } else if let Some(rgb) = self.rgb {
            let mut tolerance = RgbTolerance::uniform(channel(self.tolerance.unwrap_or(20), "tolerance")?);
            if let Some(upper) = self.upper {
                tolerance.upper = channels(upper, "upper")?;
            }
            if let Some(lower) = self.lower {
                tolerance.lower = channels(lower, "lower")?;
            }
            ColorMaskDescriptor::rgb(channels(rgb, "rgb")?, tolerance)
        } else {
            ColorMaskDescriptor::hsl(self.window()?)
        };
        Ok(descriptor.with_debug(self.debug))
    }

    fn window(&self) -> Result<HslWindow, String> {
        let mut window = match &self.hsl {
            Some(name) => presets::hsl(name).ok_or_else(|| format!("unknown hsl preset '{name}'"))?,
            None => HslWindow::default(),
        };
        if let Some([min, max]) = self.hue {
            if !(0.0..=360.0).contains(&min) || !(0.0..=360.0).contains(&max) {
                return Err(format!("hue bounds {min}..{max} must be within [0, 360]"));
            }
            window.hue_min = min;
            window.hue_max = max;
        }
        if let Some([min, max]) = self.saturation {
            unit_range(min, max, "saturation")?;
            window.saturation_min = min;
            window.saturation_max = max;
        }
        if let Some([min, max]) = self.lightness {
            unit_range(min, max, "lightness")?;
            window.lightness_min = min;
            window.lightness_max = max;
        }
        Ok(window)
    }
}

fn channel(value: u16, field: &str) -> Result<u8, String> {
    u8::try_from(value).map_err(|_| format!("{field} value {value} exceeds 255"))
}

fn channels(values: [u16; 3], field: &str) -> Result<[u8; 3], String> {
    Ok([
        channel(values[0], field)?,
        channel(values[1], field)?,
        channel(values[2], field)?,
    ])
}

fn unit_range(min: f32, max: f32, field: &str) -> Result<(), String> {
    if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
        return Err(format!("{field} bounds {min}..{max} must be ordered within [0, 1]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shine::effects::{EffectOptions, EffectRegistry};

    const SAMPLE: &str = r#"
version = 1
image = "card.png"
mask = "card-mask.png"
size = [640, 480]
antialias = 4
color_space = "linear"

[light]
source = "fixed"
position = [0.25, -0.5]

[tilt]
max_angle = 15

[tilt.view]
intensity = 6

[blur]
radius = 4

[masks]
reverse_highlight = true

[[masks.items]]
preset = "red"

[[masks.items]]
rgb = [10, 20, 30]
tolerance = 5
upper = [0, 0, 40]

[[masks.items]]
hsl = "BLUE"
lightness = [0.1, 0.8]
debug = true

[[effects]]
name = "holo"

[effects.options]
holoSize = 0.3

[[effects]]
name = "reverseHolo"

[effects.options]
glowPower = 0.9
redChannel = 0.5
"#;

    #[test]
    fn parses_sample_config() {
        let config = SceneConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.version, 1);
        assert_eq!(config.light_source().unwrap(), LightSource::Fixed([0.25, -0.5]));

        let renderer = config.renderer_config();
        assert_eq!(renderer.surface_size, (640, 480));
        assert_eq!(renderer.antialiasing, Antialiasing::Samples(4));
        assert_eq!(renderer.color_space, ColorSpaceMode::Linear);

        let tilt = config.tilt_options();
        assert!(tilt.enabled);
        assert_eq!(tilt.max_angle_degrees, 15.0);
        assert_eq!(tilt.perspective, 100.0);
        assert_eq!(tilt.view.unwrap().intensity, 6.0);
        assert_eq!(tilt.view.unwrap().perspective, 300.0);

        assert_eq!(config.blur_options().unwrap().radius, 4);
        assert_eq!(config.blur_options().unwrap().sigma, 4.0);
    }

    #[test]
    fn effect_options_reach_the_registry() {
        let config = SceneConfig::from_toml_str(SAMPLE).unwrap();
        let requests = config.effect_requests().unwrap();
        assert_eq!(
            requests.iter().map(|request| request.kind).collect::<Vec<_>>(),
            [EffectKind::Holo, EffectKind::ReverseHolo]
        );

        let registry = EffectRegistry::with_builtin();
        let Ok(EffectOptions::Holo(holo)) =
            registry.resolve(requests[0].kind, requests[0].over.as_ref())
        else {
            panic!("holo options");
        };
        assert_eq!(holo.holo_size, 0.3);
        assert_eq!(holo.direction_degree, 45.0);

        let Ok(EffectOptions::ReverseHolo(reverse)) =
            registry.resolve(requests[1].kind, requests[1].over.as_ref())
        else {
            panic!("reverse holo options");
        };
        assert_eq!(reverse.glare.glow_power, 0.9);
        assert_eq!(reverse.channels.red_channel, 0.5);
    }

    #[test]
    fn masks_resolve_every_form() {
        let config = SceneConfig::from_toml_str(SAMPLE).unwrap();
        let set = config.color_mask_set().unwrap().unwrap();
        assert!(set.reverse_highlight);
        let masks = set.masks();
        assert_eq!(masks.len(), 3);

        assert!(masks[0].use_hsv);
        assert_eq!(masks[0].base_color, [255, 0, 0]);

        assert!(!masks[1].use_hsv);
        assert_eq!(masks[1].tolerance.upper, [0, 0, 40]);
        assert_eq!(masks[1].tolerance.lower, [5, 5, 5]);

        assert!(masks[2].debug);
        assert_eq!(masks[2].window.hue_min, 165.0);
        assert_eq!(masks[2].window.lightness_min, 0.1);
    }

    fn with_body(body: &str) -> String {
        format!("version = 1\nimage = \"a.png\"\n{body}")
    }

    #[test]
    fn rejects_unknown_effect() {
        let err = SceneConfig::from_toml_str(&with_body("[[effects]]\nname = \"sparkle\"\n"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("sparkle")));
    }

    #[test]
    fn rejects_options_of_the_wrong_shape() {
        let err = SceneConfig::from_toml_str(&with_body(
            "[[effects]]\nname = \"glare\"\n[effects.options]\nholoSize = 0.2\n",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_masks() {
        for item in [
            "rgb = [300, 0, 0]",
            "hue = [0, 400]",
            "saturation = [0.5, 1.5]",
            "preset = \"RED\"\nrgb = [1, 2, 3]",
            "preset = \"NOT_A_COLOR\"",
        ] {
            let body = format!("[masks]\n[[masks.items]]\n{item}\n");
            let err = SceneConfig::from_toml_str(&with_body(&body)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{item}");
        }
    }

    #[test]
    fn rejects_too_many_masks() {
        let items = "[[masks.items]]\npreset = \"RED\"\n".repeat(MAX_MASKS + 1);
        let err = SceneConfig::from_toml_str(&with_body(&format!("[masks]\n{items}")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("at most")));
    }

    #[test]
    fn rejects_bad_version_and_paths() {
        let err = SceneConfig::from_toml_str("version = 2\nimage = \"a.png\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = SceneConfig::from_toml_str("version = 1\nimage = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = SceneConfig::from_toml_str("version = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn fixed_light_needs_a_position() {
        let err = SceneConfig::from_toml_str(&with_body("[light]\nsource = \"fixed\"\n")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn defaults_when_sections_are_missing() {
        let config = SceneConfig::from_toml_str(&with_body("")).unwrap();
        assert_eq!(config.light_source().unwrap(), LightSource::Pointer);
        assert!(config.color_mask_set().unwrap().is_none());
        assert!(config.blur_options().is_none());
        assert!(!config.tilt_options().enabled);
        assert_eq!(config.renderer_config().surface_size, (800, 800));
    }

    #[test]
    fn scene_carries_every_section() {
        let config = SceneConfig::from_toml_str(SAMPLE).unwrap();
        let base = Bitmap::solid(2, 2, [0, 0, 0, 255]).unwrap();
        let scene = config.build_scene(base, None).unwrap();
        assert_eq!(scene.effects.len(), 2);
        assert!(scene.color_masks.is_some());
        assert_eq!(scene.blur.map(|blur| blur.radius), Some(4));
        assert_eq!(scene.tilt.max_angle_degrees, 15.0);
    }
}
