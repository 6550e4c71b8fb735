//! Windowed preview: drives a [`FrameLoop`] from a winit event loop.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use tracing::{debug, error, info};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::frame::FrameLoop;
use crate::gpu::GpuContext;
use crate::scene::Scene;
use crate::sensor::{MotionSource, MotionSubscription, SAMPLE_INTERVAL};
use crate::types::RendererConfig;

/// Where the preview takes its light position from.
pub enum LightInput {
    /// Cursor position over the window; the light rests at the centre when the cursor leaves.
    Pointer,
    /// A constant position in `[-1, 1]` screen space.
    Fixed(Vec2),
    /// Gravity samples polled on a background thread.
    Motion(Box<dyn MotionSource>),
}

/// Maps a cursor position to the `[-1, 1]` space effects use, y pointing down.
pub fn pointer_to_light(position: PhysicalPosition<f64>, size: PhysicalSize<u32>) -> Vec2 {
    let width = size.width.max(1) as f32;
    let height = size.height.max(1) as f32;
    Vec2::new(
        position.x as f32 / width * 2.0 - 1.0,
        position.y as f32 / height * 2.0 - 1.0,
    )
}

/// Opens a window showing `scene` and blocks until it is closed.
///
/// Escape closes the window, `r` drops the gravity baseline so the sensor recalibrates.
pub fn run_preview(scene: Scene, config: RendererConfig, light: LightInput) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title("shine preview")
        .with_inner_size(PhysicalSize::new(config.surface_size.0, config.surface_size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let size = window.inner_size();
    let mut gpu = GpuContext::new(window.clone(), (size.width, size.height), &config)
        .context("failed to initialise GPU for preview")?;
    let mut manager = scene
        .build_manager(&gpu.device, &gpu.queue, gpu.render_target())
        .context("failed to build scene pipelines")?;

    let mut frames = FrameLoop::new(scene.tilt);
    frames.resolver_mut().set_landscape(size.width > size.height);
    let pointer = matches!(light, LightInput::Pointer);
    let _subscription = match light {
        LightInput::Pointer => None,
        LightInput::Fixed(position) => {
            frames.position_cell().store(position);
            None
        }
        LightInput::Motion(mut source) => Some(MotionSubscription::spawn(
            move || -> Option<Vec3> { source.read() },
            frames.motion_cell(),
            SAMPLE_INTERVAL,
        )?),
    };
    let position = frames.position_cell();
    info!(
        width = size.width,
        height = size.height,
        passes = manager.pass_keys().len(),
        "preview running"
    );

    let mut failure = None;
    event_loop
        .run(|event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::KeyboardInput { event, .. }
                    if event.state == ElementState::Pressed && !event.repeat =>
                {
                    match event.logical_key {
                        Key::Named(NamedKey::Escape) => elwt.exit(),
                        Key::Character(ref value) if value.as_str() == "r" => {
                            debug!("recalibrating motion baseline");
                            frames.resolver_mut().recalibrate();
                        }
                        _ => {}
                    }
                }
                WindowEvent::CursorMoved { position: cursor, .. } if pointer => {
                    position.store(pointer_to_light(cursor, window.inner_size()));
                }
                WindowEvent::CursorLeft { .. } if pointer => {
                    position.store(Vec2::ZERO);
                }
                WindowEvent::Resized(new_size) => {
                    gpu.resize((new_size.width, new_size.height));
                    frames
                        .resolver_mut()
                        .set_landscape(new_size.width > new_size.height);
                }
                WindowEvent::RedrawRequested => {
                    if let Err(err) = frames.draw(&gpu, &mut manager) {
                        error!(error = %err, "failed to render frame; exiting preview");
                        failure = Some(err);
                        elwt.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_maps_corners_and_centre() {
        let size = PhysicalSize::new(200, 100);
        assert_eq!(
            pointer_to_light(PhysicalPosition::new(0.0, 0.0), size),
            Vec2::new(-1.0, -1.0)
        );
        assert_eq!(
            pointer_to_light(PhysicalPosition::new(100.0, 50.0), size),
            Vec2::ZERO
        );
        assert_eq!(
            pointer_to_light(PhysicalPosition::new(200.0, 100.0), size),
            Vec2::ONE
        );
    }
}
