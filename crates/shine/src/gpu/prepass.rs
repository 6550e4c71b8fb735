//! Compute passes that precompute textures consumed by later fragment passes.

use wgpu::util::DeviceExt;

use crate::compile::{compile_compute_module, BLUR_WGSL, COLOR_MASK_PREPASS_WGSL};
use crate::mask::ColorMaskSet;
use crate::types::BlurOptions;

use super::pipeline::{build_compute_pipeline, compute_layout};
use super::textures::{SceneTexture, SceneTextures};
use super::uniforms::{BlurUniform, ColorMaskSetUniform};

/// Workgroup edge length declared by both kernels.
pub(crate) const WORKGROUP_SIZE: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepassKind {
    /// Evaluate the color mask set over the base image.
    ColorMask,
    /// Separable gaussian blur of the mask image.
    Blur,
}

pub(crate) fn workgroup_count(size: (u32, u32)) -> (u32, u32) {
    (
        size.0.div_ceil(WORKGROUP_SIZE).max(1),
        size.1.div_ceil(WORKGROUP_SIZE).max(1),
    )
}

struct ComputeKernel {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl ComputeKernel {
    fn new(device: &wgpu::Device, label: &str, body: &str, entry_point: &str) -> Self {
        let module = compile_compute_module(device, label, body);
        let layout = compute_layout(device, label);
        let pipeline = build_compute_pipeline(device, label, &module, entry_point, &layout);
        Self { layout, pipeline }
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        source: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        params: &wgpu::Buffer,
        output: &SceneTexture,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&output.view),
                },
            ],
        });

        let (groups_x, groups_y) = workgroup_count(output.size);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }
}

/// Lazily compiled compute kernels.
#[derive(Default)]
pub(crate) struct Prepasses {
    color_mask: Option<ComputeKernel>,
    blur: Option<ComputeKernel>,
}

impl Prepasses {
    /// Writes the color-mask verdict for every base texel into `textures.color_mask`.
    pub fn color_mask(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        textures: &mut SceneTextures,
        masks: &ColorMaskSet,
        size: (u32, u32),
    ) {
        let kernel = self.color_mask.get_or_insert_with(|| {
            ComputeKernel::new(device, "color mask prepass", COLOR_MASK_PREPASS_WGSL, "cs_color_mask")
        });
        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("color mask set"),
            contents: bytemuck::bytes_of(&ColorMaskSetUniform::from(masks)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let output = reuse_or_create(device, textures.color_mask.take(), "color mask", size);
        kernel.dispatch(
            device,
            encoder,
            "color mask prepass",
            &textures.base.view,
            &textures.sampler,
            &params,
            &output,
        );
        tracing::debug!(
            masks = masks.used_count(),
            reverse = masks.reverse_highlight,
            width = output.size.0,
            height = output.size.1,
            "queued color mask prepass"
        );
        textures.color_mask = Some(output);
    }

    /// Blurs the mask image horizontally into scratch, then vertically into `blurred_mask`.
    /// Does nothing when the scene has no mask.
    pub fn blur(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        textures: &mut SceneTextures,
        options: &BlurOptions,
        size: (u32, u32),
    ) -> bool {
        let Some(mask) = textures.mask.as_ref() else {
            tracing::warn!("blur prepass requested without a mask image; skipping");
            return false;
        };
        let kernel = self
            .blur
            .get_or_insert_with(|| ComputeKernel::new(device, "blur prepass", BLUR_WGSL, "cs_blur"));

        let scratch = reuse_or_create(device, textures.blur_scratch.take(), "blur scratch", size);
        let output = reuse_or_create(device, textures.blurred_mask.take(), "blurred mask", size);

        let params = |direction: [f32; 2]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("blur params"),
                contents: bytemuck::bytes_of(&BlurUniform::new(options, direction)),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        };
        let horizontal = params([1.0, 0.0]);
        let vertical = params([0.0, 1.0]);

        kernel.dispatch(
            device,
            encoder,
            "blur horizontal",
            &mask.view,
            &textures.sampler,
            &horizontal,
            &scratch,
        );
        kernel.dispatch(
            device,
            encoder,
            "blur vertical",
            &scratch.view,
            &textures.sampler,
            &vertical,
            &output,
        );
        tracing::debug!(
            radius = options.clamped().radius,
            sigma = options.clamped().sigma,
            "queued blur prepass"
        );
        textures.blur_scratch = Some(scratch);
        textures.blurred_mask = Some(output);
        true
    }
}

fn reuse_or_create(
    device: &wgpu::Device,
    existing: Option<SceneTexture>,
    label: &str,
    size: (u32, u32),
) -> SceneTexture {
    match existing {
        Some(texture) if texture.size == size => texture,
        Some(texture) => {
            texture.texture.destroy();
            SceneTexture::storage(device, label, size)
        }
        None => SceneTexture::storage(device, label, size),
    }
}
