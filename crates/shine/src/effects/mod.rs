//! Effect catalog.
//!
//! Every effect is described by a static [`EffectDescriptor`]: the uniform buffers it binds, the
//! WGSL entry point that renders it, whether it consumes the mask texture, how its output blends
//! onto the frame, its default options and the CPU routine used by the software compositor.
//! [`EffectRegistry`] is the lookup table the pipeline manager resolves names through.

pub mod options;
pub mod shade;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use glam::Vec4;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ShineError;

pub use options::{
    ChannelWeights, GlareColor, GlareColorOverride, GlareFlareOptions, GlareFlareOverride,
    GlareOptions, GlareOverride, HoloOptions, HoloOverride, ReverseHoloOptions,
    ReverseHoloOverride,
};
pub use shade::Fragment;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    Glare,
    ReverseHolo,
    Holo,
    DoubleHolo,
    GlareFlare,
}

impl EffectKind {
    pub const ALL: [EffectKind; 5] = [
        EffectKind::Glare,
        EffectKind::ReverseHolo,
        EffectKind::Holo,
        EffectKind::DoubleHolo,
        EffectKind::GlareFlare,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Glare => "glare",
            EffectKind::ReverseHolo => "reverseHolo",
            EffectKind::Holo => "holo",
            EffectKind::DoubleHolo => "doubleHolo",
            EffectKind::GlareFlare => "glareFlare",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = ShineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EffectKind::ALL
            .into_iter()
            .find(|kind| kind.name() == value)
            .ok_or_else(|| ShineError::UnknownEffect(value.to_string()))
    }
}

impl Serialize for EffectKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// How a pass's output combines with what is already in the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlendMode {
    /// Output overwrites the target (first pass only).
    Replace,
    /// Standard `src * a + dst * (1 - a)`.
    AlphaOver,
    /// `src + dst * a`: the source is a light layer and alpha is how much of the target survives.
    Additive,
    /// `src * (1 - a) + dst * a`: alpha is how much of the target survives.
    InverseAlpha,
}

impl BlendMode {
    fn factors(self) -> Option<(wgpu::BlendFactor, wgpu::BlendFactor)> {
        use wgpu::BlendFactor::{One, OneMinusSrcAlpha, SrcAlpha};
        match self {
            BlendMode::Replace => None,
            BlendMode::AlphaOver => Some((SrcAlpha, OneMinusSrcAlpha)),
            BlendMode::Additive => Some((One, SrcAlpha)),
            BlendMode::InverseAlpha => Some((OneMinusSrcAlpha, SrcAlpha)),
        }
    }

    pub fn blend_state(self) -> Option<wgpu::BlendState> {
        self.factors().map(|(src_factor, dst_factor)| {
            let component = wgpu::BlendComponent {
                src_factor,
                dst_factor,
                operation: wgpu::BlendOperation::Add,
            };
            wgpu::BlendState {
                color: component,
                alpha: component,
            }
        })
    }

    /// CPU equivalent of the fixed-function blend, clamped like a unorm target.
    pub fn apply(self, src: Vec4, dst: Vec4) -> Vec4 {
        let blended = match self.factors() {
            None => src,
            Some((src_factor, dst_factor)) => {
                src * factor(src_factor, src) + dst * factor(dst_factor, src)
            }
        };
        blended.clamp(Vec4::ZERO, Vec4::ONE)
    }
}

fn factor(factor: wgpu::BlendFactor, src: Vec4) -> f32 {
    match factor {
        wgpu::BlendFactor::Zero => 0.0,
        wgpu::BlendFactor::SrcAlpha => src.w,
        wgpu::BlendFactor::OneMinusSrcAlpha => 1.0 - src.w,
        _ => 1.0,
    }
}

/// Uniform buffer bound into an effect's bind group, in binding order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferSlot {
    Glare,
    ChannelWeights,
    Holo,
    GlareFlare,
}

impl BufferSlot {
    pub fn label(self) -> &'static str {
        match self {
            BufferSlot::Glare => "glare options",
            BufferSlot::ChannelWeights => "channel weights",
            BufferSlot::Holo => "holo options",
            BufferSlot::GlareFlare => "glare flare options",
        }
    }
}

/// Fully resolved options of one effect.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EffectOptions {
    Glare(GlareOptions),
    ReverseHolo(ReverseHoloOptions),
    Holo(HoloOptions),
    DoubleHolo(HoloOptions),
    GlareFlare(GlareFlareOptions),
}

impl EffectOptions {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectOptions::Glare(_) => EffectKind::Glare,
            EffectOptions::ReverseHolo(_) => EffectKind::ReverseHolo,
            EffectOptions::Holo(_) => EffectKind::Holo,
            EffectOptions::DoubleHolo(_) => EffectKind::DoubleHolo,
            EffectOptions::GlareFlare(_) => EffectKind::GlareFlare,
        }
    }

    /// Applies `over` field by field. The override must have the shape this effect expects.
    pub fn merge(&mut self, over: &EffectOverride) -> Result<(), ShineError> {
        match (self, over) {
            (EffectOptions::Glare(options), EffectOverride::Glare(over)) => options.merge(over),
            (EffectOptions::ReverseHolo(options), EffectOverride::ReverseHolo(over)) => {
                options.merge(over)
            }
            (EffectOptions::Holo(options), EffectOverride::Holo(over))
            | (EffectOptions::DoubleHolo(options), EffectOverride::Holo(over)) => {
                options.merge(over)
            }
            (EffectOptions::GlareFlare(options), EffectOverride::GlareFlare(over)) => {
                options.merge(over)
            }
            (options, _) => return Err(ShineError::OptionMismatch(options.kind())),
        }
        Ok(())
    }
}

/// Partial options supplied by a caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectOverride {
    Glare(GlareOverride),
    ReverseHolo(ReverseHoloOverride),
    /// Shared by `holo` and `doubleHolo`.
    Holo(HoloOverride),
    GlareFlare(GlareFlareOverride),
}

impl EffectOverride {
    /// Deserializes the override shape belonging to `kind`.
    pub fn deserialize_for<'de, D>(kind: EffectKind, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match kind {
            EffectKind::Glare => EffectOverride::Glare(GlareOverride::deserialize(deserializer)?),
            EffectKind::ReverseHolo => {
                EffectOverride::ReverseHolo(ReverseHoloOverride::deserialize(deserializer)?)
            }
            EffectKind::Holo | EffectKind::DoubleHolo => {
                EffectOverride::Holo(HoloOverride::deserialize(deserializer)?)
            }
            EffectKind::GlareFlare => {
                EffectOverride::GlareFlare(GlareFlareOverride::deserialize(deserializer)?)
            }
        })
    }
}

/// CPU shading routine. `None` when handed options of another effect.
pub type ShadeFn = fn(&Fragment, &EffectOptions) -> Option<Vec4>;

pub struct EffectDescriptor {
    pub kind: EffectKind,
    /// Uniform buffers, bound at `@group(1) @binding(i)` in slice order.
    pub buffers: &'static [BufferSlot],
    pub requires_mask: bool,
    pub blend: BlendMode,
    /// WGSL module body and its fragment entry point.
    pub shader: &'static str,
    pub entry_point: &'static str,
    pub defaults: fn() -> EffectOptions,
    pub shade: ShadeFn,
}

impl fmt::Debug for EffectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDescriptor")
            .field("kind", &self.kind)
            .field("buffers", &self.buffers)
            .field("requires_mask", &self.requires_mask)
            .field("blend", &self.blend)
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

pub static BUILTIN_EFFECTS: [EffectDescriptor; 5] = [
    EffectDescriptor {
        kind: EffectKind::Glare,
        buffers: &[BufferSlot::Glare],
        requires_mask: false,
        blend: BlendMode::AlphaOver,
        shader: crate::compile::GLARE_WGSL,
        entry_point: "fs_glare",
        defaults: || EffectOptions::Glare(GlareOptions::default()),
        shade: |fragment, options| match options {
            EffectOptions::Glare(options) => Some(shade::glare(fragment, options)),
            _ => None,
        },
    },
    EffectDescriptor {
        kind: EffectKind::ReverseHolo,
        buffers: &[BufferSlot::Glare, BufferSlot::ChannelWeights],
        requires_mask: true,
        blend: BlendMode::Additive,
        shader: crate::compile::REVERSE_HOLO_WGSL,
        entry_point: "fs_reverse_holo",
        defaults: || EffectOptions::ReverseHolo(ReverseHoloOptions::default()),
        shade: |fragment, options| match options {
            EffectOptions::ReverseHolo(options) => Some(shade::reverse_holo(fragment, options)),
            _ => None,
        },
    },
    EffectDescriptor {
        kind: EffectKind::Holo,
        buffers: &[BufferSlot::Holo],
        requires_mask: false,
        blend: BlendMode::InverseAlpha,
        shader: crate::compile::HOLO_WGSL,
        entry_point: "fs_holo",
        defaults: || EffectOptions::Holo(HoloOptions::default()),
        shade: |fragment, options| match options {
            EffectOptions::Holo(options) => Some(shade::holo(fragment, options)),
            _ => None,
        },
    },
    EffectDescriptor {
        kind: EffectKind::DoubleHolo,
        buffers: &[BufferSlot::Holo],
        requires_mask: false,
        blend: BlendMode::InverseAlpha,
        shader: crate::compile::HOLO_WGSL,
        entry_point: "fs_double_holo",
        defaults: || EffectOptions::DoubleHolo(HoloOptions::default()),
        shade: |fragment, options| match options {
            EffectOptions::DoubleHolo(options) => Some(shade::double_holo(fragment, options)),
            _ => None,
        },
    },
    EffectDescriptor {
        kind: EffectKind::GlareFlare,
        buffers: &[BufferSlot::GlareFlare],
        requires_mask: false,
        blend: BlendMode::AlphaOver,
        shader: crate::compile::GLARE_FLARE_WGSL,
        entry_point: "fs_glare_flare",
        defaults: || EffectOptions::GlareFlare(GlareFlareOptions::default()),
        shade: |fragment, options| match options {
            EffectOptions::GlareFlare(options) => Some(shade::glare_flare(fragment, options)),
            _ => None,
        },
    },
];

/// Lookup table from effect kind to its descriptor.
#[derive(Debug, Default)]
pub struct EffectRegistry {
    entries: BTreeMap<EffectKind, &'static EffectDescriptor>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with [`BUILTIN_EFFECTS`].
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in &BUILTIN_EFFECTS {
            registry.entries.insert(descriptor.kind, descriptor);
        }
        registry
    }

    pub fn register(&mut self, descriptor: &'static EffectDescriptor) -> Result<(), ShineError> {
        if self.entries.contains_key(&descriptor.kind) {
            return Err(ShineError::DuplicateEffect(descriptor.kind));
        }
        tracing::debug!(effect = %descriptor.kind, "registered effect");
        self.entries.insert(descriptor.kind, descriptor);
        Ok(())
    }

    pub fn get(&self, kind: EffectKind) -> Result<&'static EffectDescriptor, ShineError> {
        self.entries
            .get(&kind)
            .copied()
            .ok_or(ShineError::UnregisteredEffect(kind))
    }

    pub fn lookup(&self, name: &str) -> Result<&'static EffectDescriptor, ShineError> {
        self.get(name.parse()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static EffectDescriptor> + '_ {
        self.entries.values().copied()
    }

    /// Defaults of `kind` with `over` merged on top.
    pub fn resolve(
        &self,
        kind: EffectKind,
        over: Option<&EffectOverride>,
    ) -> Result<EffectOptions, ShineError> {
        let mut options = (self.get(kind)?.defaults)();
        if let Some(over) = over {
            options.merge(over)?;
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_unknown_names_fail() {
        for kind in EffectKind::ALL {
            assert_eq!(kind.name().parse::<EffectKind>().unwrap(), kind);
        }
        assert!(matches!(
            "rainbowHolo".parse::<EffectKind>(),
            Err(ShineError::UnknownEffect(name)) if name == "rainbowHolo"
        ));
    }

    #[test]
    fn builtin_registry_covers_catalog() {
        let registry = EffectRegistry::with_builtin();
        for kind in EffectKind::ALL {
            let descriptor = registry.get(kind).unwrap();
            assert_eq!(descriptor.kind, kind);
            assert_eq!((descriptor.defaults)().kind(), kind);
        }
        assert!(registry.get(EffectKind::ReverseHolo).unwrap().requires_mask);
        assert_eq!(
            registry.lookup("glareFlare").unwrap().kind,
            EffectKind::GlareFlare
        );
        assert!(registry.lookup("sparkle").is_err());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = EffectRegistry::new();
        registry.register(&BUILTIN_EFFECTS[0]).unwrap();
        assert!(matches!(
            registry.register(&BUILTIN_EFFECTS[0]),
            Err(ShineError::DuplicateEffect(EffectKind::Glare))
        ));
        assert!(matches!(
            registry.get(EffectKind::Holo),
            Err(ShineError::UnregisteredEffect(EffectKind::Holo))
        ));
    }

    #[test]
    fn resolve_merges_override_onto_defaults() {
        let registry = EffectRegistry::with_builtin();
        let over = EffectOverride::Holo(HoloOverride {
            holo_size: Some(0.3),
            ..Default::default()
        });
        let EffectOptions::DoubleHolo(options) =
            registry.resolve(EffectKind::DoubleHolo, Some(&over)).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(options.holo_size, 0.3);
        assert_eq!(options.direction_degree, 45.0);
    }

    #[test]
    fn mismatched_override_is_an_error() {
        let registry = EffectRegistry::with_builtin();
        let over = EffectOverride::GlareFlare(GlareFlareOverride::default());
        assert!(matches!(
            registry.resolve(EffectKind::Glare, Some(&over)),
            Err(ShineError::OptionMismatch(EffectKind::Glare))
        ));
    }

    #[test]
    fn shade_fn_rejects_foreign_options() {
        let fragment = Fragment {
            uv: glam::Vec2::splat(0.5),
            color: Vec4::ONE,
            mask: None,
            light: glam::Vec3::ZERO,
        };
        let glare = &BUILTIN_EFFECTS[0];
        let holo = EffectOptions::Holo(HoloOptions::default());
        assert!((glare.shade)(&fragment, &holo).is_none());
        assert!((glare.shade)(&fragment, &(glare.defaults)()).is_some());
    }

    #[test]
    fn blend_modes_match_fixed_function() {
        let dst = Vec4::new(0.2, 0.4, 0.6, 1.0);
        let src = Vec4::new(1.0, 1.0, 1.0, 0.25);
        assert_eq!(BlendMode::Replace.apply(src, dst), src);
        let over = BlendMode::AlphaOver.apply(src, dst);
        assert!((over.x - (0.25 + 0.2 * 0.75)).abs() < 1e-6);
        let additive = BlendMode::Additive.apply(Vec4::new(0.1, 0.0, 0.0, 0.5), dst);
        assert!((additive.x - (0.1 + 0.2 * 0.5)).abs() < 1e-6);
        let kept = BlendMode::InverseAlpha.apply(Vec4::new(1.0, 0.0, 0.0, 1.0), dst);
        assert_eq!(kept.truncate(), dst.truncate());
        assert!(BlendMode::Replace.blend_state().is_none());
        assert!(BlendMode::Additive.blend_state().is_some());
    }
}
