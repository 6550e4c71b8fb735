//! Pipeline cache and compositor for one scene.
//!
//! Passes are kept in insertion order. The base pass is created with the manager and always
//! comes first; it clears the target, every later pass loads and blends on top. Effect passes
//! are created lazily by [`PipelineManager::ensure_pipeline`] and reused afterwards: asking for
//! a cached effect again only rewrites its uniform buffers.

use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, ensure};
use wgpu::util::DeviceExt;

use crate::compile::{compile_render_module, BASE_WGSL, COLOR_MASK_WGSL, MASK_WGSL};
use crate::effects::{BlendMode, EffectKind, EffectOptions, EffectOverride, EffectRegistry};
use crate::error::ShineError;
use crate::mask::ColorMaskSet;
use crate::types::{Bitmap, BlurOptions, TiltOptions};
use crate::vector::LightVector;

use super::buffers::{BufferKey, BufferMap};
use super::pipeline::{build_render_pipeline, texture_bind_group, PipelineLayouts, RenderPipelineSpec};
use super::prepass::{PrepassKind, Prepasses};
use super::readback::read_rgba8;
use super::textures::{SceneTextures, IMAGE_FORMAT};
use super::uniforms::FrameUniform;

/// Every pass draws the same two-triangle quad.
pub(crate) const QUAD_VERTEX_COUNT: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKey {
    Base,
    Mask,
    Effect(EffectKind),
    ColorMask,
}

impl fmt::Display for PassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKey::Base => f.write_str("base"),
            PassKey::Mask => f.write_str("mask"),
            PassKey::Effect(kind) => write!(f, "{kind}"),
            PassKey::ColorMask => f.write_str("color mask"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineHandle {
    pub key: PassKey,
    /// Position in the render order.
    pub index: usize,
}

/// Format and sample count of whatever the passes draw into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
}

impl RenderTarget {
    /// Single-sample RGBA8 target used for offscreen renders.
    pub fn offscreen() -> Self {
        Self {
            format: IMAGE_FORMAT,
            sample_count: 1,
        }
    }
}

/// Which scene texture a pass binds after its option buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextureInput {
    None,
    Mask,
    /// Blurred mask when the blur prepass ran, the mask image otherwise.
    EffectMask,
    ColorMask,
}

struct CachedPass {
    pipeline: wgpu::RenderPipeline,
    options_group: Option<wgpu::BindGroup>,
    texture_group: Option<wgpu::BindGroup>,
    input: TextureInput,
    options: Option<EffectOptions>,
    last_override: Option<EffectOverride>,
}

/// Insertion-ordered cache keyed by pass identity.
pub(crate) struct PassCache<P> {
    entries: Vec<(PassKey, P)>,
}

impl<P> Default for PassCache<P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<P> PassCache<P> {
    pub fn index_of(&self, key: PassKey) -> Option<usize> {
        self.entries.iter().position(|(entry, _)| *entry == key)
    }

    pub fn get(&self, key: PassKey) -> Option<&P> {
        self.index_of(key).map(|index| &self.entries[index].1)
    }

    pub fn get_mut(&mut self, key: PassKey) -> Option<(usize, &mut P)> {
        let index = self.index_of(key)?;
        Some((index, &mut self.entries[index].1))
    }

    /// Appends `pass`; the caller checks for an existing entry first.
    pub fn insert(&mut self, key: PassKey, pass: P) -> usize {
        self.entries.push((key, pass));
        self.entries.len() - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, PassKey, &P)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (key, pass))| (index, *key, pass))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut P> {
        self.entries.iter_mut().map(|(_, pass)| pass)
    }

    pub fn keys(&self) -> Vec<PassKey> {
        self.entries.iter().map(|(key, _)| *key).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The first pass clears, later passes accumulate.
pub(crate) fn load_op(index: usize) -> wgpu::LoadOp<wgpu::Color> {
    if index == 0 {
        wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
    } else {
        wgpu::LoadOp::Load
    }
}

pub struct PipelineManager {
    device: wgpu::Device,
    queue: wgpu::Queue,
    registry: EffectRegistry,
    layouts: PipelineLayouts,
    target: RenderTarget,
    textures: SceneTextures,
    frame_buffer: wgpu::Buffer,
    shared_group: wgpu::BindGroup,
    buffers: BufferMap,
    modules: HashMap<&'static str, wgpu::ShaderModule>,
    passes: PassCache<CachedPass>,
    prepasses: Prepasses,
    color_masks: Option<ColorMaskSet>,
    blur: BlurOptions,
    completed_prepasses: Vec<PrepassKind>,
    multisample: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl PipelineManager {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: RenderTarget,
        base: &Bitmap,
        mask: Option<&Bitmap>,
    ) -> Result<Self, ShineError> {
        check_texture_limits(device, base)?;
        if let Some(mask) = mask {
            check_texture_limits(device, mask)?;
        }

        let layouts = PipelineLayouts::new(device);
        let textures = SceneTextures::new(device, queue, base, mask);
        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame uniform"),
            contents: bytemuck::bytes_of(&FrameUniform::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let shared_group = shared_bind_group(device, &layouts, &textures, &frame_buffer);

        let mut manager = Self {
            device: device.clone(),
            queue: queue.clone(),
            registry: EffectRegistry::with_builtin(),
            layouts,
            target,
            textures,
            frame_buffer,
            shared_group,
            buffers: BufferMap::default(),
            modules: HashMap::new(),
            passes: PassCache::default(),
            prepasses: Prepasses::default(),
            color_masks: None,
            blur: BlurOptions::default(),
            completed_prepasses: Vec::new(),
            multisample: None,
        };
        manager.ensure_fixed_pass(
            PassKey::Base,
            BASE_WGSL,
            "fs_base",
            BlendMode::Replace,
            TextureInput::None,
        );
        Ok(manager)
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn image_size(&self) -> (u32, u32) {
        self.textures.base.size
    }

    pub fn has_mask(&self) -> bool {
        self.textures.mask.is_some()
    }

    /// Pass identities in render order.
    pub fn pass_keys(&self) -> Vec<PassKey> {
        self.passes.keys()
    }

    /// Number of effect uniform buffers allocated so far.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Options currently written to `kind`'s buffers, if the effect is cached.
    pub fn options(&self, kind: EffectKind) -> Option<EffectOptions> {
        self.passes
            .get(PassKey::Effect(kind))
            .and_then(|pass| pass.options)
    }

    pub fn set_color_masks(&mut self, masks: ColorMaskSet) {
        self.color_masks = Some(masks);
    }

    pub fn set_blur(&mut self, options: BlurOptions) {
        self.blur = options;
    }

    /// Resolves `kind`'s options, syncs its buffers and returns its cached pipeline.
    ///
    /// Effects that need a mask are skipped with a warning when the scene has none.
    pub fn ensure_pipeline(
        &mut self,
        kind: EffectKind,
        over: Option<&EffectOverride>,
    ) -> Result<Option<PipelineHandle>, ShineError> {
        let descriptor = self.registry.get(kind)?;
        if descriptor.requires_mask && self.textures.effect_mask().is_none() {
            tracing::warn!(effect = %kind, "effect needs a mask texture; skipping");
            return Ok(None);
        }

        let options = self.registry.resolve(kind, over)?;
        let mut buffers = Vec::with_capacity(descriptor.buffers.len());
        for &slot in descriptor.buffers {
            let bytes = options
                .slot_bytes(slot)
                .ok_or(ShineError::OptionMismatch(kind))?;
            let key = BufferKey { effect: kind, slot };
            buffers.push(
                self.buffers
                    .sync_bytes(&self.device, &self.queue, key, &bytes)
                    .clone(),
            );
        }

        let key = PassKey::Effect(kind);
        if let Some((index, pass)) = self.passes.get_mut(key) {
            pass.options = Some(options);
            pass.last_override = over.copied();
            tracing::trace!(effect = %kind, index, "reusing cached pipeline");
            return Ok(Some(PipelineHandle { key, index }));
        }

        let options_group = self.layouts.uniforms_for(buffers.len()).map(|layout| {
            let entries: Vec<_> = buffers
                .iter()
                .enumerate()
                .map(|(binding, buffer)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: buffer.as_entire_binding(),
                })
                .collect();
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(kind.name()),
                layout,
                entries: &entries,
            });
            (layout.clone(), group)
        });
        let input = if descriptor.requires_mask {
            TextureInput::EffectMask
        } else {
            TextureInput::None
        };

        let mut pass = self.build_pass(
            key,
            descriptor.shader,
            descriptor.entry_point,
            descriptor.blend,
            options_group,
            input,
        );
        pass.options = Some(options);
        pass.last_override = over.copied();
        let index = self.passes.insert(key, pass);
        tracing::debug!(effect = %kind, index, blend = ?descriptor.blend, "built effect pipeline");
        Ok(Some(PipelineHandle { key, index }))
    }

    /// Redraws the base image wherever the mask image is not black.
    pub fn ensure_mask_pass(&mut self) -> Option<PipelineHandle> {
        if self.textures.mask.is_none() {
            tracing::warn!("mask pass requested without a mask image; skipping");
            return None;
        }
        Some(self.ensure_fixed_pass(
            PassKey::Mask,
            MASK_WGSL,
            "fs_mask",
            BlendMode::AlphaOver,
            TextureInput::Mask,
        ))
    }

    /// Draws the precomputed color-mask texture over the effects.
    pub fn ensure_color_mask_pass(&mut self) -> Option<PipelineHandle> {
        if self.textures.color_mask.is_none() {
            tracing::warn!("color mask pass needs the color mask prepass; skipping");
            return None;
        }
        Some(self.ensure_fixed_pass(
            PassKey::ColorMask,
            COLOR_MASK_WGSL,
            "fs_color_mask",
            BlendMode::AlphaOver,
            TextureInput::ColorMask,
        ))
    }

    /// Runs a compute prepass over `size` texels and submits it. Returns whether anything ran.
    pub fn run_prepass(&mut self, kind: PrepassKind, size: (u32, u32)) -> bool {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("prepass encoder"),
            });
        let ran = match kind {
            PrepassKind::ColorMask => match &self.color_masks {
                Some(masks) => {
                    self.prepasses.color_mask(
                        &self.device,
                        &mut encoder,
                        &mut self.textures,
                        masks,
                        size,
                    );
                    true
                }
                None => {
                    tracing::warn!("color mask prepass requested without masks; skipping");
                    false
                }
            },
            PrepassKind::Blur => {
                self.prepasses
                    .blur(&self.device, &mut encoder, &mut self.textures, &self.blur, size)
            }
        };
        if ran {
            self.queue.submit(std::iter::once(encoder.finish()));
            if !self.completed_prepasses.contains(&kind) {
                self.completed_prepasses.push(kind);
            }
            self.rebind_textures();
        }
        ran
    }

    /// Uploads the per-frame uniform shared by every pass.
    pub fn write_frame(&self, light: LightVector, tilt: &TiltOptions, target: (u32, u32)) {
        let frame = FrameUniform::new(light, tilt, target, self.textures.base.size);
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));
    }

    /// Encodes every cached pass, in insertion order, into `view`.
    pub fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        size: (u32, u32),
    ) {
        let multisample = self.multisample_view(size);
        let last = self.passes.len().saturating_sub(1);
        for (index, key, pass) in self.passes.iter() {
            let (attachment, resolve_target) = match multisample.as_ref() {
                Some(msaa) => (msaa, (index == last).then_some(view)),
                None => (view, None),
            };
            let label = key.to_string();
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: load_op(index),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&pass.pipeline);
            render_pass.set_bind_group(0, &self.shared_group, &[]);
            for (group_index, group) in pass
                .options_group
                .iter()
                .chain(pass.texture_group.iter())
                .enumerate()
            {
                render_pass.set_bind_group(group_index as u32 + 1, group, &[]);
            }
            render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        }
    }

    /// Renders one frame into a fresh RGBA8 texture and reads it back.
    pub fn render_to_image(
        &mut self,
        light: LightVector,
        tilt: &TiltOptions,
        size: (u32, u32),
    ) -> anyhow::Result<image::RgbaImage> {
        ensure!(
            self.target.format == IMAGE_FORMAT,
            "offscreen render needs a {IMAGE_FORMAT:?} target, pipelines were built for {:?}",
            self.target.format
        );
        let (width, height) = (size.0.max(1), size.1.max(1));
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.write_frame(light, tilt, (width, height));
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen encoder"),
            });
        self.render(&mut encoder, &view, (width, height));
        self.queue.submit(std::iter::once(encoder.finish()));

        let pixels = read_rgba8(&self.device, &self.queue, &texture)?;
        texture.destroy();
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("readback returned the wrong number of bytes"))
    }

    /// Swaps in a new image set. Every cached pass is rebuilt in its original order and the
    /// prepasses that already ran are run again. On error the previous images and passes stay
    /// in place.
    pub fn replace_images(&mut self, base: &Bitmap, mask: Option<&Bitmap>) -> Result<(), ShineError> {
        check_texture_limits(&self.device, base)?;
        if let Some(mask) = mask {
            check_texture_limits(&self.device, mask)?;
        }

        let requests: Vec<(PassKey, Option<EffectOverride>)> = self
            .passes
            .iter()
            .map(|(_, key, pass)| (key, pass.last_override))
            .collect();
        let textures = SceneTextures::new(&self.device, &self.queue, base, mask);
        let shared_group =
            shared_bind_group(&self.device, &self.layouts, &textures, &self.frame_buffer);
        let previous_textures = std::mem::replace(&mut self.textures, textures);
        let previous_group = std::mem::replace(&mut self.shared_group, shared_group);
        let previous_passes = std::mem::take(&mut self.passes);
        let prepasses = std::mem::take(&mut self.completed_prepasses);

        if let Err(err) = self.rebuild_passes(requests, &prepasses) {
            tracing::warn!(error = %err, "image swap failed; keeping previous images");
            self.textures = previous_textures;
            self.shared_group = previous_group;
            self.passes = previous_passes;
            self.completed_prepasses = prepasses;
            return Err(err);
        }

        let size = self.textures.base.size;
        tracing::debug!(
            width = size.0,
            height = size.1,
            passes = self.passes.len(),
            "rebuilt pipelines for new images"
        );
        Ok(())
    }

    fn rebuild_passes(
        &mut self,
        requests: Vec<(PassKey, Option<EffectOverride>)>,
        prepasses: &[PrepassKind],
    ) -> Result<(), ShineError> {
        let size = self.textures.base.size;
        for &kind in prepasses {
            self.run_prepass(kind, size);
        }
        for (key, over) in requests {
            match key {
                PassKey::Base => {
                    self.ensure_fixed_pass(
                        PassKey::Base,
                        BASE_WGSL,
                        "fs_base",
                        BlendMode::Replace,
                        TextureInput::None,
                    );
                }
                PassKey::Mask => {
                    self.ensure_mask_pass();
                }
                PassKey::ColorMask => {
                    self.ensure_color_mask_pass();
                }
                PassKey::Effect(kind) => {
                    self.ensure_pipeline(kind, over.as_ref())?;
                }
            }
        }
        Ok(())
    }

    fn ensure_fixed_pass(
        &mut self,
        key: PassKey,
        body: &'static str,
        entry_point: &'static str,
        blend: BlendMode,
        input: TextureInput,
    ) -> PipelineHandle {
        if let Some(index) = self.passes.index_of(key) {
            return PipelineHandle { key, index };
        }
        let pass = self.build_pass(key, body, entry_point, blend, None, input);
        let index = self.passes.insert(key, pass);
        tracing::debug!(pass = %key, index, "built pass");
        PipelineHandle { key, index }
    }

    fn build_pass(
        &mut self,
        key: PassKey,
        body: &'static str,
        entry_point: &'static str,
        blend: BlendMode,
        options: Option<(wgpu::BindGroupLayout, wgpu::BindGroup)>,
        input: TextureInput,
    ) -> CachedPass {
        let label = key.to_string();
        let module = self
            .modules
            .entry(body)
            .or_insert_with(|| compile_render_module(&self.device, &label, body))
            .clone();
        let texture_group = self.texture_group(input);

        let mut layouts = vec![&self.layouts.shared];
        if let Some((layout, _)) = &options {
            layouts.push(layout);
        }
        if texture_group.is_some() {
            layouts.push(&self.layouts.texture);
        }
        let pipeline = build_render_pipeline(
            &self.device,
            &RenderPipelineSpec {
                label: &label,
                module: &module,
                entry_point,
                bind_group_layouts: &layouts,
                blend,
                format: self.target.format,
                sample_count: self.target.sample_count,
            },
        );

        CachedPass {
            pipeline,
            options_group: options.map(|(_, group)| group),
            texture_group,
            input,
            options: None,
            last_override: None,
        }
    }

    fn texture_group(&self, input: TextureInput) -> Option<wgpu::BindGroup> {
        let (texture, label) = match input {
            TextureInput::None => return None,
            TextureInput::Mask => (self.textures.mask.as_ref()?, "mask texture"),
            TextureInput::EffectMask => (self.textures.effect_mask()?, "effect mask texture"),
            TextureInput::ColorMask => (self.textures.color_mask.as_ref()?, "color mask texture"),
        };
        Some(texture_bind_group(
            &self.device,
            &self.layouts.texture,
            label,
            &texture.view,
            &self.textures.sampler,
        ))
    }

    /// Points cached passes at textures a prepass just produced.
    fn rebind_textures(&mut self) {
        let groups: Vec<_> = self
            .passes
            .iter()
            .map(|(_, _, pass)| self.texture_group(pass.input))
            .collect();
        for (pass, group) in self.passes.values_mut().zip(groups) {
            if group.is_some() {
                pass.texture_group = group;
            }
        }
    }

    fn multisample_view(&mut self, size: (u32, u32)) -> Option<wgpu::TextureView> {
        if self.target.sample_count <= 1 {
            return None;
        }
        let (width, height) = (size.0.max(1), size.1.max(1));
        let stale = self
            .multisample
            .as_ref()
            .is_none_or(|(texture, _)| texture.width() != width || texture.height() != height);
        if stale {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("multisample target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: self.target.sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: self.target.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.multisample = Some((texture, view));
        }
        self.multisample.as_ref().map(|(_, view)| view.clone())
    }
}

fn shared_bind_group(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    textures: &SceneTextures,
    frame_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("shared bind group"),
        layout: &layouts.shared,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&textures.base.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&textures.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: frame_buffer.as_entire_binding(),
            },
        ],
    })
}

fn check_texture_limits(device: &wgpu::Device, bitmap: &Bitmap) -> Result<(), ShineError> {
    let max = device.limits().max_texture_dimension_2d;
    let (width, height) = bitmap.size();
    if width > max || height > max {
        return Err(ShineError::TextureTooLarge { max, width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::HoloOverride;
    use crate::gpu::HeadlessGpu;

    #[test]
    fn cache_keeps_insertion_order() {
        let mut cache = PassCache::default();
        cache.insert(PassKey::Base, 'b');
        cache.insert(PassKey::Effect(EffectKind::Holo), 'h');
        cache.insert(PassKey::Effect(EffectKind::Glare), 'g');
        assert_eq!(cache.index_of(PassKey::Effect(EffectKind::Glare)), Some(2));
        assert_eq!(
            cache.iter().map(|(_, _, pass)| *pass).collect::<String>(),
            "bhg"
        );
        assert!(cache.get(PassKey::ColorMask).is_none());
    }

    #[test]
    fn only_first_pass_clears() {
        assert!(matches!(load_op(0), wgpu::LoadOp::Clear(_)));
        assert!(matches!(load_op(1), wgpu::LoadOp::Load));
        assert!(matches!(load_op(7), wgpu::LoadOp::Load));
    }

    fn gpu() -> Option<HeadlessGpu> {
        match HeadlessGpu::new() {
            Ok(gpu) => Some(gpu),
            Err(err) => {
                eprintln!("skipping GPU test: {err:#}");
                None
            }
        }
    }

    #[test]
    fn re_requesting_an_effect_reuses_pipeline_and_buffer() {
        let Some(gpu) = gpu() else { return };
        let base = Bitmap::solid(4, 4, [128, 64, 32, 255]).unwrap();
        let mut manager =
            PipelineManager::new(&gpu.device, &gpu.queue, RenderTarget::offscreen(), &base, None)
                .unwrap();

        let first = manager.ensure_pipeline(EffectKind::Holo, None).unwrap();
        let over = EffectOverride::Holo(HoloOverride {
            holo_size: Some(0.4),
            ..Default::default()
        });
        let second = manager
            .ensure_pipeline(EffectKind::Holo, Some(&over))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(manager.buffer_count(), 1);
        assert_eq!(
            manager.pass_keys(),
            [PassKey::Base, PassKey::Effect(EffectKind::Holo)]
        );
        let Some(EffectOptions::Holo(options)) = manager.options(EffectKind::Holo) else {
            panic!("holo options missing");
        };
        assert_eq!(options.holo_size, 0.4);
    }

    #[test]
    fn mask_effects_are_skipped_without_a_mask() {
        let Some(gpu) = gpu() else { return };
        let base = Bitmap::solid(2, 2, [255, 255, 255, 255]).unwrap();
        let mut manager =
            PipelineManager::new(&gpu.device, &gpu.queue, RenderTarget::offscreen(), &base, None)
                .unwrap();
        assert_eq!(manager.ensure_pipeline(EffectKind::ReverseHolo, None).unwrap(), None);
        assert!(manager.ensure_mask_pass().is_none());
        assert!(manager.ensure_color_mask_pass().is_none());
        assert_eq!(manager.pass_keys(), [PassKey::Base]);
        assert_eq!(manager.buffer_count(), 0);
    }

    #[test]
    fn base_pass_reproduces_the_image() {
        let Some(gpu) = gpu() else { return };
        let base = Bitmap::solid(4, 4, [200, 100, 50, 255]).unwrap();
        let mut manager =
            PipelineManager::new(&gpu.device, &gpu.queue, RenderTarget::offscreen(), &base, None)
                .unwrap();
        let image = manager
            .render_to_image(LightVector::ZERO, &TiltOptions::default(), (4, 4))
            .unwrap();
        assert!(image.pixels().all(|pixel| pixel.0 == [200, 100, 50, 255]));
    }

    #[test]
    fn replacing_images_rebuilds_in_order() {
        let Some(gpu) = gpu() else { return };
        let base = Bitmap::solid(4, 4, [10, 20, 30, 255]).unwrap();
        let mask = Bitmap::solid(4, 4, [0, 0, 0, 255]).unwrap();
        let mut manager = PipelineManager::new(
            &gpu.device,
            &gpu.queue,
            RenderTarget::offscreen(),
            &base,
            Some(&mask),
        )
        .unwrap();
        manager.ensure_pipeline(EffectKind::ReverseHolo, None).unwrap();
        manager.ensure_pipeline(EffectKind::Glare, None).unwrap();
        let before = manager.pass_keys();

        let bigger = Bitmap::solid(8, 8, [90, 90, 90, 255]).unwrap();
        manager.replace_images(&bigger, Some(&mask)).unwrap();
        assert_eq!(manager.pass_keys(), before);
        assert_eq!(manager.image_size(), (8, 8));

        manager.replace_images(&bigger, None).unwrap();
        assert_eq!(
            manager.pass_keys(),
            [PassKey::Base, PassKey::Effect(EffectKind::Glare)]
        );
    }

    #[test]
    fn failed_image_swap_keeps_previous_state() {
        let Some(gpu) = gpu() else { return };
        let base = Bitmap::solid(4, 4, [10, 20, 30, 255]).unwrap();
        let mut manager =
            PipelineManager::new(&gpu.device, &gpu.queue, RenderTarget::offscreen(), &base, None)
                .unwrap();
        manager.ensure_pipeline(EffectKind::Glare, None).unwrap();
        manager.ensure_pipeline(EffectKind::Holo, None).unwrap();
        let before = manager.pass_keys();

        // Rebuilding glare now fails after the base pass was already rebuilt.
        manager.registry = EffectRegistry::new();
        let bigger = Bitmap::solid(8, 8, [90, 90, 90, 255]).unwrap();
        assert!(matches!(
            manager.replace_images(&bigger, None),
            Err(ShineError::UnregisteredEffect(EffectKind::Glare))
        ));
        assert_eq!(manager.pass_keys(), before);
        assert_eq!(manager.image_size(), (4, 4));

        manager.registry = EffectRegistry::with_builtin();
        let image = manager
            .render_to_image(LightVector::ZERO, &TiltOptions::default(), (4, 4))
            .unwrap();
        assert_eq!(image.dimensions(), (4, 4));
    }
}
