use std::borrow::Cow;

use crate::mask::MAX_MASKS;

pub(crate) const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");
pub(crate) const COLOR_WGSL: &str = include_str!("shaders/color.wgsl");

pub(crate) const BASE_WGSL: &str = include_str!("shaders/base.wgsl");
pub(crate) const MASK_WGSL: &str = include_str!("shaders/mask.wgsl");
pub(crate) const GLARE_WGSL: &str = include_str!("shaders/glare.wgsl");
pub(crate) const REVERSE_HOLO_WGSL: &str = include_str!("shaders/reverse_holo.wgsl");
pub(crate) const HOLO_WGSL: &str = include_str!("shaders/holo.wgsl");
pub(crate) const GLARE_FLARE_WGSL: &str = include_str!("shaders/glare_flare.wgsl");
pub(crate) const COLOR_MASK_WGSL: &str = include_str!("shaders/color_mask.wgsl");

pub(crate) const COLOR_MASK_PREPASS_WGSL: &str = include_str!("shaders/color_mask_prepass.wgsl");
pub(crate) const BLUR_WGSL: &str = include_str!("shaders/blur.wgsl");

/// Prepends the shared frame bindings, quad vertex stage and color helpers to a fragment body.
///
/// The prelude owns `@group(0)`; bodies start their own bindings at `@group(1)`.
pub(crate) fn render_source(body: &str) -> String {
    format!("{COMMON_WGSL}\n{COLOR_WGSL}\n{body}")
}

/// Compute modules only get the color helpers and the mask-count constant; they define their
/// own `@group(0)`.
pub(crate) fn compute_source(body: &str) -> String {
    format!("const MAX_MASKS: u32 = {MAX_MASKS}u;\n\n{COLOR_WGSL}\n{body}")
}

pub(crate) fn compile_render_module(
    device: &wgpu::Device,
    label: &str,
    body: &str,
) -> wgpu::ShaderModule {
    tracing::trace!(label, "compiling render module");
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(render_source(body))),
    })
}

pub(crate) fn compile_compute_module(
    device: &wgpu::Device,
    label: &str,
    body: &str,
) -> wgpu::ShaderModule {
    tracing::trace!(label, "compiling compute module");
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(compute_source(body))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{}", err.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{err:?}"));
        module
    }

    fn entry_points(module: &naga::Module) -> Vec<&str> {
        module
            .entry_points
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    #[test]
    fn render_source_wraps_body_after_prelude() {
        let wrapped = render_source("// body marker");
        let prelude = wrapped.find("fn vs_main").unwrap();
        let helpers = wrapped.find("fn rgb_to_hsl").unwrap();
        let body = wrapped.find("// body marker").unwrap();
        assert!(prelude < helpers && helpers < body);
    }

    #[test]
    fn compute_source_declares_mask_limit() {
        let wrapped = compute_source("");
        assert!(wrapped.starts_with(&format!("const MAX_MASKS: u32 = {MAX_MASKS}u;")));
        assert!(!wrapped.contains("fn vs_main"));
    }

    #[test]
    fn render_modules_validate() {
        let cases = [
            (BASE_WGSL, &["fs_base"][..]),
            (MASK_WGSL, &["fs_mask"]),
            (GLARE_WGSL, &["fs_glare"]),
            (REVERSE_HOLO_WGSL, &["fs_reverse_holo"]),
            (HOLO_WGSL, &["fs_holo", "fs_double_holo"]),
            (GLARE_FLARE_WGSL, &["fs_glare_flare"]),
            (COLOR_MASK_WGSL, &["fs_color_mask"]),
        ];
        for (body, expected) in cases {
            let module = validate(&render_source(body));
            let names = entry_points(&module);
            assert!(names.contains(&"vs_main"));
            for name in expected {
                assert!(names.contains(name), "missing {name} in {names:?}");
            }
        }
    }

    #[test]
    fn compute_modules_validate() {
        let prepass = validate(&compute_source(COLOR_MASK_PREPASS_WGSL));
        assert_eq!(entry_points(&prepass), ["cs_color_mask"]);
        let blur = validate(&compute_source(BLUR_WGSL));
        assert_eq!(entry_points(&blur), ["cs_blur"]);
    }

    #[test]
    fn builtin_effects_point_at_existing_entry_points() {
        for descriptor in &crate::effects::BUILTIN_EFFECTS {
            assert!(
                descriptor
                    .shader
                    .contains(&format!("fn {}(", descriptor.entry_point)),
                "{}",
                descriptor.kind
            );
        }
    }
}
