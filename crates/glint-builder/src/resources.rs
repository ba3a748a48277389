//! Global declarations: resources, stage IO, builtins, constants and
//! struct types.

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use glint_ir::{
    ast::{BuiltinVar, Expr, GlobalDecl, GlobalKind, IoVar, VarKind, VertexSemantic},
    LayoutKind, ScalarKind, ShaderStage, Target, Type, TypeDesc,
};

use crate::{
    ctx::ShaderCtx,
    error::{BuildError, BuildResult},
    exp::Exp,
    scope::Symbol,
};

/// Check if values of `ty` can cross a stage boundary.
fn is_interface_type(ty: &Type) -> bool {
    ty.as_primitive()
        .is_some_and(|p| !p.is_matrix() && p.scalar != ScalarKind::Bool)
}

fn needs_flat(ty: &Type) -> bool {
    ty.scalar_kind().is_some_and(ScalarKind::is_integer)
}

impl ShaderCtx {
    fn declare_global(
        &mut self,
        name: &str,
        ty: Type,
        kind: GlobalKind,
        group: u32,
        init: Option<Expr>,
    ) -> BuildResult<Exp> {
        self.require_global("global declaration")?;
        self.check_name(name)?;
        if self.functions.iter().any(|f| f.emitted == name || f.name == name) {
            return Err(BuildError::scope(format!("{} is already a function", name)));
        }
        self.check_type(&ty)?;
        let var = self.var_ref(name, ty, VarKind::Global(kind));
        self.scopes.declare_global(name, Symbol::new(var.clone()))?;
        log::trace!("{} global {} ({:?}, group {})", self.stage(), name, kind, group);
        self.module.globals.push(GlobalDecl {
            var: var.clone(),
            kind,
            group,
            binding: None,
            init,
        });
        Ok(Exp::node(Expr::Var(var)))
    }

    fn require_webgpu(&self, what: &str) -> BuildResult<()> {
        if self.target() != Target::WebGPU {
            return Err(BuildError::unsupported(what, self.target()));
        }
        Ok(())
    }

    /// Declare a uniform in group 0. Textures and samplers become their own
    /// bindings; every other uniform is folded into a per-stage block.
    pub fn uniform(&mut self, name: &str, ty: Type) -> BuildResult<Exp> {
        self.uniform_at(0, name, ty)
    }

    pub fn uniform_at(&mut self, group: u32, name: &str, ty: Type) -> BuildResult<Exp> {
        let kind = match ty.desc() {
            TypeDesc::Texture(tex) => {
                if tex.is_storage() {
                    self.require_webgpu("storage textures")?;
                }
                GlobalKind::Texture
            }
            TypeDesc::Sampler(_) => {
                self.require_webgpu("separate samplers")?;
                GlobalKind::Sampler
            }
            _ if ty.has_runtime_tail() => {
                return Err(BuildError::param_value(
                    "uniform",
                    format!("{} has runtime size and needs a storage buffer", name),
                ))
            }
            _ if !ty.is_host_shareable() => {
                return Err(glint_ir::TypeError::NotHostShareable(ty.to_string()).into())
            }
            _ => GlobalKind::Uniform,
        };
        self.declare_global(name, ty, kind, group, None)
    }

    /// Declare a uniform buffer with its own binding in group 0.
    pub fn uniform_buffer(&mut self, name: &str, ty: Type) -> BuildResult<Exp> {
        self.uniform_buffer_at(0, name, ty)
    }

    pub fn uniform_buffer_at(&mut self, group: u32, name: &str, ty: Type) -> BuildResult<Exp> {
        if ty.as_struct().is_none() {
            return Err(BuildError::param_value(
                "uniform_buffer",
                format!("{} must have a struct type, not {}", name, ty),
            ));
        }
        if !ty.is_host_shareable() {
            return Err(glint_ir::TypeError::NotHostShareable(ty.to_string()).into());
        }
        self.declare_global(name, ty, GlobalKind::UniformBuffer, group, None)
    }

    /// Declare a storage buffer in group 0. Writability is decided from the
    /// stages' write sites when the program is merged.
    pub fn storage_buffer(&mut self, name: &str, ty: Type) -> BuildResult<Exp> {
        self.storage_buffer_at(0, name, ty)
    }

    pub fn storage_buffer_at(&mut self, group: u32, name: &str, ty: Type) -> BuildResult<Exp> {
        self.require_webgpu("storage buffers")?;
        if !ty.is_host_shareable() {
            return Err(glint_ir::TypeError::NotHostShareable(ty.to_string()).into());
        }
        self.declare_global(name, ty, GlobalKind::StorageBuffer, group, None)
    }

    /// Declare memory shared by a compute workgroup.
    pub fn workgroup(&mut self, name: &str, ty: Type) -> BuildResult<Exp> {
        self.require_webgpu("workgroup variables")?;
        if self.stage() != ShaderStage::Compute {
            return Err(BuildError::scope("workgroup variables need a compute stage"));
        }
        if ty.has_runtime_tail() {
            return Err(BuildError::param_value(
                "workgroup",
                format!("{} must have a fixed size", name),
            ));
        }
        self.declare_global(name, ty, GlobalKind::Workgroup, 0, None)
    }

    /// Declare a module-scope variable private to each invocation.
    pub fn private(&mut self, name: &str, ty: Type) -> BuildResult<Exp> {
        if matches!(
            ty.desc(),
            TypeDesc::Texture(_) | TypeDesc::Sampler(_) | TypeDesc::Atomic(_)
        ) || ty.has_runtime_tail()
        {
            return Err(BuildError::param_value(
                "private",
                format!("{} cannot hold a {}", name, ty),
            ));
        }
        self.declare_global(name, ty, GlobalKind::Private, 0, None)
    }

    /// Declare a named constant: a module constant at global scope (its value
    /// must be a constant expression) or a read-only local.
    pub fn constant(&mut self, name: &str, value: impl Into<Exp>) -> BuildResult<Exp> {
        let (value, slots) = value.into().resolve()?;
        if !self.scopes.is_global() {
            self.consume(slots);
            let ty = value.ty();
            return self.declare_local(name, ty, Some(value), true);
        }
        if !value.is_const_exp() {
            return Err(BuildError::param_value(
                "constant",
                format!("{} is not a constant expression", value),
            ));
        }
        let ty = value.ty();
        self.declare_global(name, ty, GlobalKind::Const, 0, Some(value))
    }

    /// Declare a vertex attribute bound to a fixed semantic location.
    pub fn attribute(
        &mut self,
        name: &str,
        ty: Type,
        semantic: VertexSemantic,
    ) -> BuildResult<Exp> {
        if self.stage() != ShaderStage::Vertex {
            return Err(BuildError::scope("attributes are only declared in vertex shaders"));
        }
        if !is_interface_type(&ty) {
            return Err(BuildError::param_value(
                "attribute",
                format!("{} cannot have type {}", name, ty),
            ));
        }
        if self.target() == Target::WebGL1 && ty.scalar_kind() != Some(ScalarKind::F32) {
            return Err(BuildError::unsupported(
                format!("attribute {} of type {}", name, ty),
                self.target(),
            ));
        }
        if let Some(other) = self.module.inputs.iter().find(|i| i.semantic == Some(semantic)) {
            return Err(BuildError::scope(format!(
                "{} already uses the {} semantic",
                other.name,
                semantic.name()
            )));
        }
        let exp = self.declare_io(name, ty.clone(), VarKind::Input)?;
        self.module.inputs.push(IoVar {
            name: name.to_string(),
            location: semantic.location(),
            flat: needs_flat(&ty),
            ty,
            semantic: Some(semantic),
        });
        Ok(exp)
    }

    /// Declare a fragment input, matched by name to a vertex output.
    pub fn input(&mut self, name: &str, ty: Type) -> BuildResult<Exp> {
        if self.stage() != ShaderStage::Fragment {
            return Err(BuildError::scope("inputs are only declared in fragment shaders"));
        }
        self.check_varying(name, &ty)?;
        let exp = self.declare_io(name, ty.clone(), VarKind::Input)?;
        let location = self.module.inputs.len() as u32;
        self.module.inputs.push(IoVar {
            name: name.to_string(),
            location,
            flat: needs_flat(&ty),
            ty,
            semantic: None,
        });
        Ok(exp)
    }

    /// Declare a stage output: a varying in the vertex stage, a render target
    /// in the fragment stage. Locations follow declaration order.
    pub fn output(&mut self, name: &str, ty: Type) -> BuildResult<Exp> {
        match self.stage() {
            ShaderStage::Vertex => self.check_varying(name, &ty)?,
            ShaderStage::Fragment => {
                if !is_interface_type(&ty) {
                    return Err(BuildError::param_value(
                        "output",
                        format!("{} cannot have type {}", name, ty),
                    ));
                }
                if self.target() == Target::WebGL1 && ty != Type::vec4f() {
                    return Err(BuildError::unsupported(
                        format!("fragment output {} of type {}", name, ty),
                        self.target(),
                    ));
                }
            }
            ShaderStage::Compute => {
                return Err(BuildError::scope("compute shaders have no outputs"))
            }
        }
        let exp = self.declare_io(name, ty.clone(), VarKind::Output)?;
        let location = self.module.outputs.len() as u32;
        self.module.outputs.push(IoVar {
            name: name.to_string(),
            location,
            flat: needs_flat(&ty),
            ty,
            semantic: None,
        });
        Ok(exp)
    }

    fn check_varying(&self, name: &str, ty: &Type) -> BuildResult<()> {
        if !is_interface_type(ty) {
            return Err(BuildError::param_value(
                "varying",
                format!("{} cannot have type {}", name, ty),
            ));
        }
        if self.target() == Target::WebGL1 && ty.scalar_kind() != Some(ScalarKind::F32) {
            return Err(BuildError::unsupported(
                format!("varying {} of type {}", name, ty),
                self.target(),
            ));
        }
        Ok(())
    }

    fn declare_io(&mut self, name: &str, ty: Type, kind: VarKind) -> BuildResult<Exp> {
        self.require_global("stage IO declaration")?;
        self.check_name(name)?;
        self.check_type(&ty)?;
        let var = self.var_ref(name, ty, kind);
        self.scopes.declare_global(name, Symbol::new(var.clone()))?;
        Ok(Exp::node(Expr::Var(var)))
    }

    /// Access a pipeline builtin such as the vertex position or the fragment
    /// coordinate.
    pub fn builtin(&mut self, builtin: BuiltinVar) -> BuildResult<Exp> {
        if builtin.stage() != self.stage() {
            return Err(BuildError::scope(format!(
                "builtin {} belongs to the {} stage",
                builtin.name(),
                builtin.stage()
            )));
        }
        if !builtin.is_supported(self.target()) {
            return Err(BuildError::unsupported(
                format!("builtin {}", builtin.name()),
                self.target(),
            ));
        }
        if let Some(var) = self.builtins.get(&builtin) {
            return Ok(Exp::node(Expr::Var(var.clone())));
        }
        let var = self.var_ref(builtin.name(), builtin.ty(), VarKind::Builtin(builtin));
        self.builtins.insert(builtin, var.clone());
        Ok(Exp::node(Expr::Var(var)))
    }

    /// Define a struct type with the context's default layout.
    pub fn define_struct(&mut self, name: &str, members: &[(&str, Type)]) -> BuildResult<Type> {
        let layout = self.layout();
        self.define_struct_with_layout(name, members, layout)
    }

    pub fn define_struct_with_layout(
        &mut self,
        name: &str,
        members: &[(&str, Type)],
        layout: LayoutKind,
    ) -> BuildResult<Type> {
        self.require_global("define_struct")?;
        self.check_name(name)?;
        let members: Vec<(String, Type)> = members
            .iter()
            .map(|(n, t)| (n.to_string(), t.clone()))
            .collect();
        for (member, _) in &members {
            self.check_name(member)?;
        }
        let ty = Type::structure(name, members, layout)?;
        self.check_type(&ty)?;
        let ty = self.intern(ty);
        self.structs.insert(name.to_string(), ty.clone());
        Ok(ty)
    }

    /// A struct type defined earlier in this stage.
    pub fn struct_type(&self, name: &str) -> BuildResult<Type> {
        self.structs
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::reference(format!("struct {} is not defined", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinRegistry;
    use alloc::{sync::Arc, vec};
    use glint_ir::{SampleType, TextureDim, TextureType};

    fn ctx(target: Target, stage: ShaderStage) -> ShaderCtx {
        ShaderCtx::new(
            target,
            stage,
            LayoutKind::Default,
            Arc::new(BuiltinRegistry::standard()),
        )
    }

    #[test]
    fn test_uniform_kinds() {
        let mut c = ctx(Target::WebGPU, ShaderStage::Fragment);
        c.uniform("tint", Type::vec4f()).unwrap();
        let tex = Type::texture(TextureType::sampled(TextureDim::D2, SampleType::Float)).unwrap();
        c.uniform_at(1, "albedo", tex).unwrap();
        let kinds: Vec<GlobalKind> = c.module.globals.iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec![GlobalKind::Uniform, GlobalKind::Texture]);
        assert_eq!(c.module.globals[1].group, 1);
        assert!(matches!(
            c.uniform("flag", Type::bool()),
            Err(BuildError::Type(_))
        ));
    }

    #[test]
    fn test_storage_buffers_are_webgpu_only() {
        let mut c = ctx(Target::WebGL2, ShaderStage::Fragment);
        let data = Type::runtime_array(Type::f32()).unwrap();
        assert!(matches!(
            c.storage_buffer("data", data),
            Err(BuildError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_attributes_are_vertex_only() {
        let mut c = ctx(Target::WebGL2, ShaderStage::Fragment);
        assert!(matches!(
            c.attribute("pos", Type::vec3f(), VertexSemantic::Position),
            Err(BuildError::ScopeMisuse(_))
        ));
        let mut c = ctx(Target::WebGL1, ShaderStage::Vertex);
        assert!(c.attribute("pos", Type::vec3f(), VertexSemantic::Position).is_ok());
        assert!(c
            .attribute("ids", Type::vec(ScalarKind::I32, 4), VertexSemantic::BlendIndices)
            .is_err());
        assert!(c
            .attribute("again", Type::vec3f(), VertexSemantic::Position)
            .is_err());
    }

    #[test]
    fn test_webgl1_fragment_outputs_are_vec4() {
        let mut c = ctx(Target::WebGL1, ShaderStage::Fragment);
        assert!(c.output("color", Type::vec3f()).is_err());
        assert!(c.output("color", Type::vec4f()).is_ok());
    }

    #[test]
    fn test_builtin_stage_and_target() {
        let mut c = ctx(Target::WebGL1, ShaderStage::Vertex);
        assert!(c.builtin(BuiltinVar::Position).is_ok());
        assert!(matches!(
            c.builtin(BuiltinVar::VertexIndex),
            Err(BuildError::Unsupported { .. })
        ));
        assert!(matches!(
            c.builtin(BuiltinVar::FragCoord),
            Err(BuildError::ScopeMisuse(_))
        ));
    }

    #[test]
    fn test_global_constant_needs_constant_value() {
        let mut c = ctx(Target::WebGPU, ShaderStage::Fragment);
        let ratio = c.constant("ratio", 0.5).unwrap();
        let doubled = c.mul(&ratio, 2.0).unwrap();
        assert!(c.constant("one", doubled).is_ok());
        let tint = c.uniform("tint", Type::f32()).unwrap();
        assert!(c.constant("bad", tint).is_err());
    }

    #[test]
    fn test_std140_struct_rejects_mat2() {
        let mut c = ctx(Target::WebGPU, ShaderStage::Vertex);
        let err = c
            .define_struct_with_layout("Skin", &[("m", Type::mat(2, 2))], LayoutKind::Std140)
            .unwrap_err();
        assert!(matches!(err, BuildError::Type(glint_ir::TypeError::Layout(_))));
    }
}
