//! GPU side of the engine: device setup, the pipeline cache, compute prepasses and readback.

mod buffers;
mod context;
mod manager;
mod pipeline;
mod prepass;
mod readback;
mod textures;
pub(crate) mod uniforms;

pub use context::{GpuContext, HeadlessGpu};
pub use manager::{PassKey, PipelineHandle, PipelineManager, RenderTarget};
pub use prepass::PrepassKind;
pub use textures::IMAGE_FORMAT;
