//! Backend selection and helpers shared by the emitters.

pub mod glsl;
pub mod wgsl;

use alloc::{boxed::Box, format, string::String};

use glint_ir::{ast::ShaderModule, Target};

use crate::{
    error::{CodegenError, CodegenResult},
    interface::ShaderInterface,
};

/// A shading-language emitter.
pub trait ShaderBackend {
    fn target(&self) -> Target;

    /// Render `module` as shader source.
    fn emit(&self, module: &ShaderModule, iface: &ShaderInterface) -> CodegenResult<String>;
}

pub fn backend_for(target: Target) -> Box<dyn ShaderBackend> {
    match target {
        Target::WebGL1 => Box::new(glsl::GlslBackend::new(glsl::GlslDialect::Es100)),
        Target::WebGL2 => Box::new(glsl::GlslBackend::new(glsl::GlslDialect::Es300)),
        Target::WebGPU => Box::new(wgsl::WgslBackend),
    }
}

/// Emit `module` for the interface's target.
pub fn emit(module: &ShaderModule, iface: &ShaderInterface) -> CodegenResult<String> {
    log::debug!(
        "emitting {} stage for {} ({} functions, {} globals)",
        module.stage,
        iface.target,
        module.functions.len(),
        module.globals.len()
    );
    let source = backend_for(iface.target).emit(module, iface)?;
    log::trace!("{} source:\n{}", module.stage, source);
    Ok(source)
}

/// Decimal spelling of a finite float that always reads back as a float.
pub(crate) fn float_literal(value: f32, target: Target) -> CodegenResult<String> {
    if !value.is_finite() {
        return Err(CodegenError::unsupported(
            format!("non-finite float literal {}", value),
            target,
        ));
    }
    Ok(format!("{:?}", value))
}

pub(crate) fn join(parts: impl IntoIterator<Item = String>) -> String {
    let mut out = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_literals_keep_a_point() {
        assert_eq!(float_literal(1.0, Target::WebGPU).unwrap(), "1.0");
        assert_eq!(float_literal(-0.5, Target::WebGL1).unwrap(), "-0.5");
        assert!(float_literal(f32::NAN, Target::WebGL2).is_err());
    }
}
