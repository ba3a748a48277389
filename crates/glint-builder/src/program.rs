//! Whole-program builds: describe each stage, merge their resources and
//! emit the sources.

use alloc::{
    format,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};

use glint_codegen::{emit, ShaderInterface};
use glint_ir::{ast::VertexSemantic, is_compatible, LayoutKind, ShaderStage, Target};

use crate::{
    bindings::BindGroupLayout,
    builtins::BuiltinRegistry,
    ctx::{ShaderCtx, StageOutput},
    error::{BuildError, BuildResult},
    merge::{merge, MergedStage},
};

/// Largest workgroup extent per axis and in total.
const MAX_WORKGROUP: [u32; 3] = [256, 256, 64];
const MAX_INVOCATIONS: u32 = 256;

/// Settings shared by every stage of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub target: Target,
    /// Layout given to structs defined without an explicit one.
    pub layout: LayoutKind,
    pub workgroup_size: [u32; 3],
}

impl BuildOptions {
    pub fn new(target: Target) -> Self {
        BuildOptions {
            target,
            layout: LayoutKind::Default,
            workgroup_size: [1, 1, 1],
        }
    }

    pub fn with_layout(mut self, layout: LayoutKind) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_workgroup_size(mut self, size: [u32; 3]) -> Self {
        self.workgroup_size = size;
        self
    }

    pub fn validate(&self) -> BuildResult<()> {
        let [x, y, z] = self.workgroup_size;
        let in_range = self
            .workgroup_size
            .iter()
            .zip(MAX_WORKGROUP)
            .all(|(&n, max)| n > 0 && n <= max);
        let total = x.saturating_mul(y).saturating_mul(z);
        if !in_range || total > MAX_INVOCATIONS {
            return Err(BuildError::param_value(
                "workgroup_size",
                format!(
                    "({}, {}, {}) must be non-zero, at most ({}, {}, {}) and {} invocations",
                    x, y, z, MAX_WORKGROUP[0], MAX_WORKGROUP[1], MAX_WORKGROUP[2], MAX_INVOCATIONS
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RenderProgram {
    pub vertex_source: String,
    pub fragment_source: String,
    pub bind_group_layouts: Vec<BindGroupLayout>,
    /// Attribute semantics read by the vertex stage, in declaration order.
    pub vertex_attributes: Vec<VertexSemantic>,
}

#[derive(Debug, Clone)]
pub struct ComputeProgram {
    pub source: String,
    pub bind_group_layouts: Vec<BindGroupLayout>,
    pub workgroup_size: [u32; 3],
}

/// Builds render and compute programs for one target.
///
/// ```ignore
/// let mut builder = ProgramBuilder::new(BuildOptions::new(Target::WebGPU));
/// let program = builder.build_render(
///     |ctx| {
///         let pos = ctx.attribute("pos", Type::vec4f(), VertexSemantic::Position)?;
///         let out = ctx.builtin(BuiltinVar::Position)?;
///         ctx.main(|ctx| ctx.assign(&out, pos))
///     },
///     |ctx| {
///         let color = ctx.output("color", Type::vec4f())?;
///         ctx.main(|ctx| {
///             let white = ctx.construct(&Type::vec4f(), args![1.0])?;
///             ctx.assign(&color, white)
///         })
///     },
/// )?;
/// ```
pub struct ProgramBuilder {
    options: BuildOptions,
    registry: Arc<BuiltinRegistry>,
    last_error: Option<String>,
}

impl ProgramBuilder {
    pub fn new(options: BuildOptions) -> Self {
        ProgramBuilder {
            options,
            registry: Arc::new(BuiltinRegistry::standard()),
            last_error: None,
        }
    }

    /// Use a custom builtin registry instead of the standard one.
    pub fn with_registry(mut self, registry: Arc<BuiltinRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Message of the error that aborted the most recent build.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn build_render(
        &mut self,
        vertex: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
        fragment: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<RenderProgram> {
        let result = self.render(vertex, fragment);
        self.record(result)
    }

    pub fn build_compute(
        &mut self,
        compute: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<ComputeProgram> {
        let result = self.compute(compute);
        self.record(result)
    }

    fn record<T>(&mut self, result: BuildResult<T>) -> BuildResult<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(err) => {
                log::error!("{} build failed: {}", self.options.target, err);
                self.last_error = Some(err.to_string());
            }
        }
        result
    }

    fn describe(
        &self,
        stage: ShaderStage,
        describe: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<StageOutput> {
        let mut ctx = ShaderCtx::new(
            self.options.target,
            stage,
            self.options.layout,
            Arc::clone(&self.registry),
        );
        describe(&mut ctx)?;
        ctx.finish()
    }

    fn render(
        &self,
        vertex: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
        fragment: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<RenderProgram> {
        self.options.validate()?;
        let vs = self.describe(ShaderStage::Vertex, vertex)?;
        let mut fs = self.describe(ShaderStage::Fragment, fragment)?;
        link_varyings(&vs, &mut fs)?;

        let merged = merge(alloc::vec![vs, fs])?;
        let mut sources = Vec::with_capacity(2);
        for stage in &merged.stages {
            sources.push(self.emit_stage(stage)?);
        }
        let vertex_attributes = merged.stages[0]
            .output
            .module
            .inputs
            .iter()
            .filter_map(|input| input.semantic)
            .collect();
        let fragment_source = sources.pop().unwrap_or_default();
        let vertex_source = sources.pop().unwrap_or_default();
        Ok(RenderProgram {
            vertex_source,
            fragment_source,
            bind_group_layouts: merged.layouts,
            vertex_attributes,
        })
    }

    fn compute(
        &self,
        compute: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<ComputeProgram> {
        if self.options.target != Target::WebGPU {
            return Err(BuildError::unsupported("compute programs", self.options.target));
        }
        self.options.validate()?;
        let cs = self.describe(ShaderStage::Compute, compute)?;
        let merged = merge(alloc::vec![cs])?;
        let source = match merged.stages.first() {
            Some(stage) => self.emit_stage(stage)?,
            None => return Err(BuildError::internal("compute stage lost during merge")),
        };
        Ok(ComputeProgram {
            source,
            bind_group_layouts: merged.layouts,
            workgroup_size: self.options.workgroup_size,
        })
    }

    fn emit_stage(&self, stage: &MergedStage) -> BuildResult<String> {
        let output = &stage.output;
        let mut iface = ShaderInterface::new(self.options.target).with_writes(stage.writes.clone());
        iface.renames = stage.renames.clone();
        iface.comparison_textures = output.comparison_textures.clone();
        iface.extensions = output.extensions.clone();
        iface.workgroup_size = self.options.workgroup_size;
        let source = emit(&output.module, &iface)?;
        log::debug!(
            "{} stage emitted for {}: {} bytes",
            output.module.stage,
            self.options.target,
            source.len()
        );
        Ok(source)
    }
}

/// Give each fragment input the location of the vertex output it reads.
fn link_varyings(vs: &StageOutput, fs: &mut StageOutput) -> BuildResult<()> {
    for input in &mut fs.module.inputs {
        let output = vs
            .module
            .outputs
            .iter()
            .find(|o| o.name == input.name)
            .ok_or_else(|| {
                BuildError::merge(format!(
                    "fragment input {} has no matching vertex output",
                    input.name
                ))
            })?;
        if !is_compatible(&output.ty, &input.ty) {
            return Err(BuildError::merge(format!(
                "varying {} is written as {} but read as {}",
                input.name, output.ty, input.ty
            )));
        }
        input.location = output.location;
    }
    for output in &vs.module.outputs {
        if !fs.module.inputs.iter().any(|i| i.name == output.name) {
            log::warn!("vertex output {} is not read by the fragment stage", output.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_limits() {
        let opts = BuildOptions::new(Target::WebGPU);
        assert!(opts.with_workgroup_size([64, 1, 1]).validate().is_ok());
        assert!(opts.with_workgroup_size([16, 16, 1]).validate().is_ok());
        assert!(opts.with_workgroup_size([0, 1, 1]).validate().is_err());
        assert!(opts.with_workgroup_size([1, 1, 65]).validate().is_err());
        assert!(opts.with_workgroup_size([32, 16, 1]).validate().is_err());
    }

    #[test]
    fn test_compute_is_webgpu_only() {
        let mut builder = ProgramBuilder::new(BuildOptions::new(Target::WebGL2));
        let err = builder.build_compute(|ctx| ctx.main(|_| Ok(()))).unwrap_err();
        assert!(matches!(err, BuildError::Unsupported { .. }));
        assert_eq!(builder.last_error(), Some(err.to_string().as_str()));
    }

    #[test]
    fn test_unmatched_fragment_input() {
        let mut builder = ProgramBuilder::new(BuildOptions::new(Target::WebGL2));
        let result = builder.build_render(
            |ctx| ctx.main(|_| Ok(())),
            |ctx| {
                ctx.input("uv", glint_ir::Type::vec2f())?;
                ctx.main(|_| Ok(()))
            },
        );
        assert!(matches!(result, Err(BuildError::Merge(_))));
        assert!(builder.last_error().is_some());
    }
}
