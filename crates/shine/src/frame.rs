//! Per-frame driver: resolve the light vector, upload it, encode every pass and present.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ShineError;
use crate::gpu::{GpuContext, PipelineManager};
use crate::light::LightResolver;
use crate::sensor::{MotionCell, PositionCell};
use crate::types::TiltOptions;
use crate::vector::LightVector;

/// Frames per second over rolling one-second windows.
#[derive(Debug)]
struct FrameStats {
    frames: u32,
    total: u64,
    window_start: Instant,
    fps: f32,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            total: 0,
            window_start: now,
            fps: 0.0,
        }
    }

    /// Counts a frame and returns the new rate once a window closes.
    fn record(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        self.total += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        self.fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(self.fps)
    }
}

pub struct FrameLoop {
    resolver: LightResolver,
    position: PositionCell,
    motion: MotionCell,
    tilt: TiltOptions,
    stats: FrameStats,
    last_light: LightVector,
}

impl FrameLoop {
    pub fn new(tilt: TiltOptions) -> Self {
        Self {
            resolver: LightResolver::new(),
            position: PositionCell::new(),
            motion: MotionCell::new(),
            tilt,
            stats: FrameStats::new(Instant::now()),
            last_light: LightVector::ZERO,
        }
    }

    /// Handle for whoever owns the pointer. A stored position overrides the motion sensor.
    pub fn position_cell(&self) -> PositionCell {
        self.position.clone()
    }

    /// Handle for a [`MotionSubscription`](crate::sensor::MotionSubscription) to write into.
    pub fn motion_cell(&self) -> MotionCell {
        self.motion.clone()
    }

    pub fn resolver_mut(&mut self) -> &mut LightResolver {
        &mut self.resolver
    }

    pub fn tilt(&self) -> &TiltOptions {
        &self.tilt
    }

    pub fn last_light(&self) -> LightVector {
        self.last_light
    }

    /// Reads both inputs and advances the resolver by one frame.
    pub fn next_light(&mut self) -> LightVector {
        let light = self
            .resolver
            .resolve(self.position.load(), self.motion.load());
        self.last_light = light;
        light
    }

    /// Renders and presents one frame. Lost or outdated surfaces are reconfigured and the frame
    /// is dropped; anything else is returned.
    pub fn draw(
        &mut self,
        gpu: &GpuContext,
        manager: &mut PipelineManager,
    ) -> Result<(), ShineError> {
        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated; reconfiguring");
                gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("timed out acquiring surface texture; skipping frame");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let light = self.next_light();
        let size = gpu.size();
        manager.write_frame(light, &self.tilt, size);

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        manager.render(&mut encoder, &view, size);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        if let Some(fps) = self.stats.record(Instant::now()) {
            debug!(
                fps = fps.round(),
                frame_count = self.stats.total,
                light_x = light.0.x,
                light_y = light.0.y,
                calibrated = self.resolver.is_calibrated(),
                "render stats"
            );
        }
        Ok(())
    }
}
