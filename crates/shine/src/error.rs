use crate::effects::EffectKind;

/// Errors surfaced by the effect engine.
///
/// GPU setup paths keep using `anyhow` with context; this enum covers the programmer errors and
/// data problems callers are expected to match on.
#[derive(Debug, thiserror::Error)]
pub enum ShineError {
    #[error("vector must have between 2 and 4 components, got {0}")]
    VectorArity(usize),
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),
    #[error("effect '{0}' is already registered")]
    DuplicateEffect(EffectKind),
    #[error("effect '{0}' is not registered")]
    UnregisteredEffect(EffectKind),
    #[error("options passed to '{0}' belong to a different effect")]
    OptionMismatch(EffectKind),
    #[error("color mask set is full ({max} masks)")]
    TooManyMasks { max: usize },
    #[error("bitmap of {width}x{height} expects {expected} bytes, got {actual}")]
    BitmapSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("GPU max texture dimension is {max}, requested {width}x{height}")]
    TextureTooLarge { max: u32, width: u32, height: u32 },
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}
