use anyhow::{anyhow, ensure, Context, Result};

/// Copies a single-sample RGBA8 texture back to the CPU with row padding removed.
pub(crate) fn read_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<Vec<u8>> {
    let (width, height) = (texture.width(), texture.height());
    ensure!(width > 0 && height > 0, "readback size must be positive");
    ensure!(
        texture.sample_count() == 1,
        "readback requires a single-sample texture, got {} samples",
        texture.sample_count()
    );

    let tight_bpr = width as usize * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_bpr = tight_bpr.div_ceil(align) * align;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size: (padded_bpr * height as usize) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr as u32),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .context("failed to wait for readback")?;
    receiver
        .recv()
        .map_err(|_| anyhow!("readback callback dropped"))?
        .context("failed to map readback buffer")?;

    let data = slice.get_mapped_range();
    let mut tight = vec![0u8; tight_bpr * height as usize];
    for (row, chunk) in tight.chunks_exact_mut(tight_bpr).enumerate() {
        let offset = row * padded_bpr;
        chunk.copy_from_slice(&data[offset..offset + tight_bpr]);
    }
    drop(data);
    staging.unmap();
    Ok(tight)
}
