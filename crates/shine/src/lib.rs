//! Light-driven shine effects over an image, rendered with `wgpu`.
//!
//! ```text
//!   gravity samples / pointer ──▶ LightResolver ──▶ LightVector
//!                                                     │ frame uniform
//!   Scene (base, mask, effects, color masks) ──▶ PipelineManager ──▶ passes in order:
//!        base ─▶ mask ─▶ effects… ─▶ color mask
//! ```
//!
//! [`gpu::PipelineManager`] owns every GPU resource for one image set: the uniform buffers of
//! each effect, the cached render pipelines and the compute prepasses (color masks, mask blur).
//! [`software::composite`] renders the same layering on the CPU.

pub mod color;
mod compile;
pub mod effects;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod light;
pub mod mask;
pub mod presets;
pub mod scene;
pub mod sensor;
pub mod software;
pub mod types;
pub mod vector;
pub mod window;

pub use effects::{EffectKind, EffectOptions, EffectOverride, EffectRegistry};
pub use error::ShineError;
pub use frame::FrameLoop;
pub use gpu::{GpuContext, HeadlessGpu, PassKey, PipelineHandle, PipelineManager, RenderTarget};
pub use light::LightResolver;
pub use mask::{ColorMaskDescriptor, ColorMaskSet, HslWindow, RgbTolerance};
pub use scene::{EffectRequest, Scene};
pub use types::{Antialiasing, Bitmap, BlurOptions, ColorSpaceMode, RendererConfig, TiltOptions, ViewTilt};
pub use vector::LightVector;
pub use window::{run_preview, LightInput};
