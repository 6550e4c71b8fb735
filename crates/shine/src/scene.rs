//! A declarative description of what to draw, installable into a [`PipelineManager`] or
//! renderable on the CPU through [`crate::software`].

use crate::effects::{EffectKind, EffectOverride};
use crate::error::ShineError;
use crate::gpu::{PipelineHandle, PipelineManager, PrepassKind, RenderTarget};
use crate::mask::ColorMaskSet;
use crate::types::{Bitmap, BlurOptions, TiltOptions};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectRequest {
    pub kind: EffectKind,
    pub over: Option<EffectOverride>,
}

impl EffectRequest {
    pub fn new(kind: EffectKind) -> Self {
        Self { kind, over: None }
    }

    pub fn with_override(kind: EffectKind, over: EffectOverride) -> Self {
        Self {
            kind,
            over: Some(over),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Scene {
    pub base: Bitmap,
    pub mask: Option<Bitmap>,
    /// Effects in draw order, after the base and mask passes.
    pub effects: Vec<EffectRequest>,
    /// Drawn last; unmasked pixels restore the base image over the effects.
    pub color_masks: Option<ColorMaskSet>,
    /// Softens the mask before mask-consuming effects sample it.
    pub blur: Option<BlurOptions>,
    /// Redraw the base image where the mask is not black, before any effect.
    pub mask_pass: bool,
    pub tilt: TiltOptions,
}

impl Scene {
    pub fn new(base: Bitmap) -> Self {
        Self {
            base,
            mask: None,
            effects: Vec::new(),
            color_masks: None,
            blur: None,
            mask_pass: false,
            tilt: TiltOptions::default(),
        }
    }

    pub fn with_mask(mut self, mask: Bitmap) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_effect(mut self, request: EffectRequest) -> Self {
        self.effects.push(request);
        self
    }

    /// Creates a manager for this scene's images and installs every pass.
    pub fn build_manager(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: RenderTarget,
    ) -> Result<PipelineManager, ShineError> {
        let mut manager = PipelineManager::new(device, queue, target, &self.base, self.mask.as_ref())?;
        self.install(&mut manager)?;
        Ok(manager)
    }

    /// Runs the prepasses, then ensures the mask pass, the effects and the color-mask pass in
    /// that order. Passes that cannot run (a mask effect without a mask) are left out.
    pub fn install(&self, manager: &mut PipelineManager) -> Result<Vec<PipelineHandle>, ShineError> {
        let size = manager.image_size();
        if let Some(masks) = &self.color_masks {
            manager.set_color_masks(masks.clone());
            manager.run_prepass(PrepassKind::ColorMask, size);
        }
        if let Some(blur) = self.blur {
            manager.set_blur(blur);
            manager.run_prepass(PrepassKind::Blur, size);
        }

        let mut handles = Vec::new();
        if self.mask_pass {
            handles.extend(manager.ensure_mask_pass());
        }
        for request in &self.effects {
            handles.extend(manager.ensure_pipeline(request.kind, request.over.as_ref())?);
        }
        if self.color_masks.is_some() {
            handles.extend(manager.ensure_color_mask_pass());
        }
        tracing::debug!(passes = handles.len() + 1, "scene installed");
        Ok(handles)
    }
}
