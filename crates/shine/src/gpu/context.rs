use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use wgpu::TextureFormatFeatureFlags;

use crate::types::{Antialiasing, ColorSpaceMode, RendererConfig};

use super::manager::RenderTarget;

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

/// Logs the adapter and reports whether it is a CPU rasterizer.
fn describe_adapter(adapter: &wgpu::Adapter) -> bool {
    let info = adapter.get_info();
    let is_software = info.device_type == wgpu::DeviceType::Cpu;
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        driver = %info.driver,
        is_software,
        "selected GPU adapter"
    );
    is_software
}

/// Device and presentation surface for a window.
pub struct GpuContext {
    _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub sample_count: u32,
}

impl GpuContext {
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        size: (u32, u32),
        renderer: &RendererConfig,
    ) -> Result<Self> {
        let instance = create_instance();
        let surface = instance
            .create_surface(target)
            .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;
        let is_software = describe_adapter(&adapter);

        let limits = adapter.limits();
        let max_dimension = limits.max_texture_dimension_2d;
        let (width, height) = (size.0.max(1), size.1.max(1));
        if width > max_dimension || height > max_dimension {
            bail!("GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}");
        }

        let caps = surface.get_capabilities(&adapter);
        let format = pick_surface_format(&caps.formats, renderer.color_space)
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;

        let features = adapter.get_texture_format_features(format);
        let mut sample_count = pick_sample_count(
            renderer.antialiasing,
            features.flags.supported_sample_counts(),
        );
        if sample_count > 1 && !features.flags.contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE) {
            tracing::warn!(?format, "surface format does not support MSAA resolve; disabling MSAA");
            sample_count = 1;
        }
        if is_software && sample_count > 1 {
            tracing::warn!(sample_count, "software rasterizer detected; disabling MSAA");
            sample_count = 1;
        }

        let mut required_features = wgpu::Features::empty();
        if sample_count > 4 {
            required_features |= wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        }
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("shine device"),
            required_features,
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let latency = renderer.gpu_latency.clamp(1, 3);
        if latency != renderer.gpu_latency {
            tracing::warn!(
                requested = renderer.gpu_latency,
                clamped = latency,
                "GPU frame latency clamped to valid range (1-3)"
            );
        }

        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .or_else(|| caps.present_modes.first().copied())
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?format, ?present_mode, sample_count, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: latency,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            sample_count,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn render_target(&self) -> RenderTarget {
        RenderTarget {
            format: self.config.format,
            sample_count: self.sample_count,
        }
    }

    /// Ignores zero-sized requests, which minimized windows report.
    pub fn resize(&mut self, size: (u32, u32)) {
        if size.0 == 0 || size.1 == 0 {
            return;
        }
        self.config.width = size.0;
        self.config.height = size.1;
        self.reconfigure();
    }

    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Gamma mode keeps shader output as written, linear mode lets the surface encode sRGB.
fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
    mode: ColorSpaceMode,
) -> Option<wgpu::TextureFormat> {
    let want_srgb = matches!(mode, ColorSpaceMode::Linear);
    let fallback = *formats.first()?;
    let format = formats
        .iter()
        .copied()
        .find(|format| format.is_srgb() == want_srgb)
        .unwrap_or_else(|| {
            tracing::warn!(
                ?fallback,
                ?mode,
                "no surface format matches the requested color space; falling back"
            );
            fallback
        });
    Some(format)
}

fn pick_sample_count(antialiasing: Antialiasing, mut supported: Vec<u32>) -> u32 {
    if !supported.contains(&1) {
        supported.push(1);
    }
    supported.sort_unstable();
    supported.dedup();

    match antialiasing {
        Antialiasing::Off => 1,
        Antialiasing::Auto => supported.last().copied().unwrap_or(1),
        Antialiasing::Samples(requested) if supported.contains(&requested) => requested,
        Antialiasing::Samples(requested) => {
            let fallback = supported
                .iter()
                .copied()
                .filter(|&count| count <= requested)
                .max()
                .unwrap_or(1);
            tracing::warn!(
                requested,
                fallback,
                ?supported,
                "requested MSAA sample count not supported; falling back"
            );
            fallback
        }
    }
}

/// Surfaceless device used for offscreen export and tests.
pub struct HeadlessGpu {
    _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl HeadlessGpu {
    pub fn new() -> Result<Self> {
        let instance = create_instance();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("no GPU adapter available for offscreen rendering")?;
        describe_adapter(&adapter);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("shine headless device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create headless GPU device")?;

        Ok(Self {
            _instance: instance,
            device,
            queue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat::{Bgra8Unorm, Bgra8UnormSrgb, Rgba8Unorm};

    #[test]
    fn surface_format_follows_color_space() {
        let formats = [Bgra8UnormSrgb, Bgra8Unorm];
        assert_eq!(pick_surface_format(&formats, ColorSpaceMode::Gamma), Some(Bgra8Unorm));
        assert_eq!(pick_surface_format(&formats, ColorSpaceMode::Auto), Some(Bgra8Unorm));
        assert_eq!(pick_surface_format(&formats, ColorSpaceMode::Linear), Some(Bgra8UnormSrgb));
        assert_eq!(pick_surface_format(&[Rgba8Unorm], ColorSpaceMode::Linear), Some(Rgba8Unorm));
        assert_eq!(pick_surface_format(&[], ColorSpaceMode::Gamma), None);
    }

    #[test]
    fn sample_count_falls_back_to_nearest_lower() {
        let supported = || vec![1, 4];
        assert_eq!(pick_sample_count(Antialiasing::Off, supported()), 1);
        assert_eq!(pick_sample_count(Antialiasing::Auto, supported()), 4);
        assert_eq!(pick_sample_count(Antialiasing::Samples(4), supported()), 4);
        assert_eq!(pick_sample_count(Antialiasing::Samples(8), supported()), 4);
        assert_eq!(pick_sample_count(Antialiasing::Samples(2), supported()), 1);
        assert_eq!(pick_sample_count(Antialiasing::Auto, vec![]), 1);
    }
}
