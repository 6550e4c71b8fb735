use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::types::Bitmap;

/// Format of every image and prepass texture. Effects work on gamma-encoded values.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) struct SceneTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

impl SceneTexture {
    /// Uploads `bitmap` as-is; row 0 is the top of the image and texture coordinates follow.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        bitmap: &Bitmap,
    ) -> Self {
        let (width, height) = bitmap.size();
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: IMAGE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            bitmap.pixels(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        tracing::debug!(label, width, height, "uploaded texture");
        Self {
            texture,
            view,
            size: (width, height),
        }
    }

    /// Compute output written with `textureStore` and sampled by later passes.
    pub fn storage(device: &wgpu::Device, label: &str, size: (u32, u32)) -> Self {
        let (width, height) = (size.0.max(1), size.1.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size: (width, height),
        }
    }
}

/// Base image, optional mask image and whatever the prepasses produced, for one scene.
///
/// Dropping the set destroys the GPU textures.
pub(crate) struct SceneTextures {
    pub base: SceneTexture,
    pub mask: Option<SceneTexture>,
    pub color_mask: Option<SceneTexture>,
    pub blurred_mask: Option<SceneTexture>,
    /// Intermediate target of the horizontal blur pass.
    pub blur_scratch: Option<SceneTexture>,
    pub sampler: wgpu::Sampler,
}

impl SceneTextures {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        base: &Bitmap,
        mask: Option<&Bitmap>,
    ) -> Self {
        Self {
            base: SceneTexture::upload(device, queue, "shine base image", base),
            mask: mask.map(|mask| SceneTexture::upload(device, queue, "shine mask image", mask)),
            color_mask: None,
            blurred_mask: None,
            blur_scratch: None,
            sampler: create_sampler(device),
        }
    }

    /// Mask view consumed by mask-dependent effects; the blurred copy wins when present.
    pub fn effect_mask(&self) -> Option<&SceneTexture> {
        self.blurred_mask.as_ref().or(self.mask.as_ref())
    }

    fn all(&self) -> impl Iterator<Item = &SceneTexture> {
        std::iter::once(&self.base)
            .chain(self.mask.as_ref())
            .chain(self.color_mask.as_ref())
            .chain(self.blurred_mask.as_ref())
            .chain(self.blur_scratch.as_ref())
    }
}

impl Drop for SceneTextures {
    fn drop(&mut self) {
        let mut count = 0;
        for texture in self.all() {
            texture.texture.destroy();
            count += 1;
        }
        tracing::debug!(count, "released scene textures");
    }
}

pub(crate) fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("shine sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}
