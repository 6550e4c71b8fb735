//! Subcommand implementations: scene loading, preview, still export and the effect catalog.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use serde::Serialize;
use shine::effects::{BlendMode, EffectKind, EffectOptions};
use shine::sensor::ScriptedMotion;
use shine::{
    software, Bitmap, EffectRegistry, HeadlessGpu, LightInput, LightVector, RenderTarget, Scene,
};
use shineconfig::{LightSource, SceneConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{EffectsArgs, ExportArgs, PreviewArgs};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

struct LoadedScene {
    config: SceneConfig,
    scene: Scene,
}

fn load_scene(path: &Path) -> Result<LoadedScene> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene config {}", path.display()))?;
    let config = SceneConfig::from_toml_str(&raw)
        .with_context(|| format!("failed to load scene config {}", path.display()))?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));

    let base = load_bitmap(&resolve_path(root, &config.image));
    let mask = config
        .mask
        .as_ref()
        .map(|mask| load_bitmap(&resolve_path(root, mask)));
    let scene = config.build_scene(base, mask)?;
    tracing::debug!(
        config = %path.display(),
        effects = scene.effects.len(),
        has_mask = scene.mask.is_some(),
        "scene loaded"
    );
    Ok(LoadedScene { config, scene })
}

fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Unreadable images fall back to a translucent placeholder so the scene still renders.
fn load_bitmap(path: &Path) -> Bitmap {
    match Bitmap::open(path) {
        Ok(bitmap) => bitmap,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "using placeholder texture");
            Bitmap::placeholder()
        }
    }
}

pub fn preview(args: PreviewArgs) -> Result<()> {
    let LoadedScene { config, scene } = load_scene(&args.config)?;
    let mut renderer = config.renderer_config();
    if let Some(size) = args.size {
        renderer.surface_size = size;
    }

    let light = match config.light_source()? {
        LightSource::Pointer => LightInput::Pointer,
        LightSource::Fixed([x, y]) => LightInput::Fixed(Vec2::new(x, y)),
        LightSource::Sensor(samples) => {
            if samples.is_empty() {
                tracing::warn!("sensor light configured without samples; light stays centred");
            }
            let samples = samples.into_iter().map(Vec3::from_array).collect();
            LightInput::Motion(Box::new(ScriptedMotion::new(samples)))
        }
    };
    shine::run_preview(scene, renderer, light)
}

pub fn export(args: ExportArgs) -> Result<()> {
    let LoadedScene { config, scene } = load_scene(&args.config)?;
    let size = args
        .size
        .or(config.size.map(|[width, height]| (width, height)))
        .unwrap_or_else(|| scene.base.size());
    let light = match (args.light, config.light_source()?) {
        (Some([x, y]), _) | (None, LightSource::Fixed([x, y])) => LightVector::new(x, y, 0.0),
        (None, _) => LightVector::ZERO,
    };

    let image = if args.gpu {
        let gpu = HeadlessGpu::new()?;
        let mut manager = scene.build_manager(&gpu.device, &gpu.queue, RenderTarget::offscreen())?;
        manager.render_to_image(light, &scene.tilt, size)?
    } else {
        software::composite(&scene, light, size)?
    };

    image
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(
        path = %args.output.display(),
        width = size.0,
        height = size.1,
        gpu = args.gpu,
        "still frame exported"
    );
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EffectSummary {
    name: EffectKind,
    blend: BlendMode,
    requires_mask: bool,
    buffers: Vec<&'static str>,
    defaults: EffectOptions,
}

fn catalog(registry: &EffectRegistry) -> Vec<EffectSummary> {
    registry
        .iter()
        .map(|descriptor| EffectSummary {
            name: descriptor.kind,
            blend: descriptor.blend,
            requires_mask: descriptor.requires_mask,
            buffers: descriptor.buffers.iter().map(|slot| slot.label()).collect(),
            defaults: (descriptor.defaults)(),
        })
        .collect()
}

pub fn effects(args: EffectsArgs) -> Result<()> {
    let summaries = catalog(&EffectRegistry::with_builtin());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    for summary in &summaries {
        println!(
            "{:<12} blend={:<13} mask={:<3} buffers={}",
            summary.name.name(),
            format!("{:?}", summary.blend),
            if summary.requires_mask { "yes" } else { "no" },
            summary.buffers.join(",")
        );
    }
    Ok(())
}
