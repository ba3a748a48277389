//! Per-target spelling of resolved builtin calls.

use alloc::{boxed::Box, format, string::String, vec, vec::Vec};

use glint_ir::{
    ast::{BinaryOp, Expr, GlobalDecl, GlobalKind, Literal, Member, UnaryOp, VarKind, VarRef},
    SamplerKind, ScalarKind, ShaderStage, Target, TextureDim, TextureType, Type,
};

use super::{Lowering, Overload, TextureOp};
use crate::{
    ctx::ShaderCtx,
    error::{BuildError, BuildResult},
};

const DERIVATIVES_EXT: &str = "GL_OES_standard_derivatives";
const TEXTURE_LOD_EXT: &str = "GL_EXT_shader_texture_lod";

fn call(func: impl Into<String>, args: Vec<Expr>, ty: Type, out_mask: u32) -> Expr {
    Expr::Call {
        func: func.into(),
        args,
        ty,
        out_mask,
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: Type) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        ty,
    }
}

fn to_float(value: Expr) -> Expr {
    Expr::Cast {
        ty: Type::f32(),
        value: Box::new(value),
    }
}

fn swizzle(base: Expr, letters: &str, kind: ScalarKind) -> Expr {
    let ty = match letters.len() {
        1 => Type::scalar(kind),
        n => Type::vec(kind, n as u8),
    };
    Expr::Member {
        base: Box::new(base),
        member: Member::Swizzle(String::from(letters)),
        ty,
    }
}

fn pair<T>(mut args: Vec<T>) -> BuildResult<(T, T)> {
    if args.len() != 2 {
        return Err(BuildError::internal(format!(
            "expected two operands, got {}",
            args.len()
        )));
    }
    let rhs = args.pop();
    let lhs = args.pop();
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Ok((lhs, rhs)),
        _ => Err(BuildError::internal("missing operand")),
    }
}

/// Turn a resolved overload and its typed arguments into the expression for
/// the context's target.
pub(crate) fn lower(
    ctx: &mut ShaderCtx,
    overload: &Overload,
    args: Vec<Expr>,
    out_mask: u32,
) -> BuildResult<Expr> {
    let target = ctx.target();
    let ret = overload.ret.clone();
    match &overload.lowering {
        Lowering::Call { glsl, wgsl } => {
            let name = if target.is_glsl() { glsl } else { wgsl };
            Ok(call(name.as_str(), args, ret, out_mask))
        }
        Lowering::Compare { glsl, op } => {
            if target.is_glsl() {
                Ok(call(*glsl, args, ret, out_mask))
            } else {
                let (lhs, rhs) = pair(args)?;
                Ok(binary(*op, lhs, rhs, ret))
            }
        }
        Lowering::Not => {
            if target.is_glsl() {
                Ok(call("not", args, ret, out_mask))
            } else {
                let operand = args
                    .into_iter()
                    .next()
                    .ok_or_else(|| BuildError::internal("not() without operand"))?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    ty: ret,
                })
            }
        }
        Lowering::Modulus => {
            let float = ret.scalar_kind().is_some_and(ScalarKind::is_float);
            match target {
                Target::WebGPU => {
                    let (lhs, rhs) = pair(args)?;
                    Ok(binary(BinaryOp::Rem, lhs, rhs, ret))
                }
                _ if float => Ok(call("mod", args, ret, out_mask)),
                Target::WebGL2 => {
                    let (lhs, rhs) = pair(args)?;
                    Ok(binary(BinaryOp::Rem, lhs, rhs, ret))
                }
                Target::WebGL1 => {
                    // a - b * (a / b)
                    let (lhs, rhs) = pair(args)?;
                    let quotient = binary(BinaryOp::Div, lhs.clone(), rhs.clone(), ret.clone());
                    let product = binary(BinaryOp::Mul, rhs, quotient, ret.clone());
                    Ok(binary(BinaryOp::Sub, lhs, product, ret))
                }
            }
        }
        Lowering::Derivative { glsl, wgsl } => {
            if target == Target::WebGL1 {
                ctx.extensions.insert(String::from(DERIVATIVES_EXT));
            }
            let name = if target.is_glsl() { *glsl } else { *wgsl };
            Ok(call(name, args, ret, out_mask))
        }
        Lowering::Texture(op) => lower_texture(ctx, *op, args, ret, out_mask),
    }
}

/// The texture variable a texture builtin was called on.
fn texture_var(args: &[Expr]) -> BuildResult<(VarRef, TextureType)> {
    match args.first() {
        Some(Expr::Var(var)) if var.kind == VarKind::Global(GlobalKind::Texture) => {
            let tex = var.ty.as_texture().cloned().ok_or_else(|| {
                BuildError::internal(format!("texture {} has type {}", var.name, var.ty))
            })?;
            Ok((var.clone(), tex))
        }
        Some(other) => Err(BuildError::param_value(
            "texture",
            format!("{} is not a texture resource", other),
        )),
        None => Err(BuildError::internal("texture call without arguments")),
    }
}

fn lower_texture(
    ctx: &mut ShaderCtx,
    op: TextureOp,
    args: Vec<Expr>,
    ret: Type,
    out_mask: u32,
) -> BuildResult<Expr> {
    let (var, tex) = texture_var(&args)?;
    if ctx.target() == Target::WebGPU {
        let mut args = args;
        if op.samples() {
            let kind = if op.compares() {
                SamplerKind::Comparison
            } else {
                SamplerKind::Sample
            };
            let sampler = implicit_sampler(ctx, &var, kind)?;
            args.insert(1, sampler);
        }
        return Ok(call(op.wgsl_name(), args, ret, out_mask));
    }

    if tex.depth && op != TextureOp::Dimensions {
        let usage = ctx.texture_use.entry(var.name.clone()).or_default();
        if op.compares() {
            usage.compared = true;
        } else {
            usage.sampled = true;
        }
        if usage.sampled && usage.compared {
            return Err(BuildError::unsupported(
                format!(
                    "depth texture {} read both with and without comparison",
                    var.name
                ),
                ctx.target(),
            ));
        }
    }
    GlslTexture {
        ctx,
        var,
        tex,
        op,
        ret,
    }
    .lower(args)
}

/// Find or create the sampler WGSL pairs with a texture.
fn implicit_sampler(ctx: &mut ShaderCtx, texture: &VarRef, kind: SamplerKind) -> BuildResult<Expr> {
    let name = match kind {
        SamplerKind::Sample => format!("zSampler_{}", texture.name),
        SamplerKind::Comparison => format!("zSamplerCmp_{}", texture.name),
    };
    if let Some(existing) = ctx.module.global(&name) {
        return Ok(Expr::Var(existing.var.clone()));
    }
    let position = ctx
        .module
        .globals
        .iter()
        .position(|g| g.var.id == texture.id)
        .ok_or_else(|| BuildError::internal(format!("texture {} is not a global", texture.name)))?;
    let group = ctx.module.globals[position].group;
    let paired = ctx.samplers.get(&texture.name).map_or(0, Vec::len);
    let var = ctx.var_ref(
        &name,
        Type::sampler(kind),
        VarKind::Global(GlobalKind::Sampler),
    );
    ctx.module.globals.insert(
        position + 1 + paired,
        GlobalDecl {
            var: var.clone(),
            kind: GlobalKind::Sampler,
            group,
            binding: None,
            init: None,
        },
    );
    ctx.samplers
        .entry(texture.name.clone())
        .or_default()
        .push(name);
    log::trace!("paired {} with an implicit {:?} sampler", texture.name, kind);
    Ok(Expr::Var(var))
}

struct GlslTexture<'a> {
    ctx: &'a mut ShaderCtx,
    var: VarRef,
    tex: TextureType,
    op: TextureOp,
    ret: Type,
}

impl GlslTexture<'_> {
    fn es100(&self) -> bool {
        self.ctx.target() == Target::WebGL1
    }

    fn unsupported(&self, what: &str) -> BuildError {
        BuildError::unsupported(format!("{} on {}", what, self.var.ty), self.ctx.target())
    }

    /// Fold the layer index and depth reference into the coordinate vector.
    fn float_coords(&self, coords: Expr, layer: Option<Expr>, reference: Option<Expr>) -> Expr {
        if self.tex.dim == TextureDim::D1 {
            return Expr::Construct {
                ty: Type::vec2f(),
                args: vec![coords, Expr::Literal(Literal::F32(0.5))],
            };
        }
        let mut parts = vec![coords];
        parts.extend(layer.map(to_float));
        parts.extend(reference);
        if parts.len() == 1 {
            return parts.remove(0);
        }
        let width = self.tex.dim.coords() + parts.len() as u8 - 1;
        Expr::Construct {
            ty: Type::vec(ScalarKind::F32, width),
            args: parts,
        }
    }

    fn texel_coords(&self, coords: Expr, layer: Option<Expr>) -> Expr {
        if self.tex.dim == TextureDim::D1 {
            return Expr::Construct {
                ty: Type::vec(ScalarKind::I32, 2),
                args: vec![coords, Expr::Literal(Literal::I32(0))],
            };
        }
        match layer {
            Some(layer) => Expr::Construct {
                ty: Type::vec(ScalarKind::I32, self.tex.dim.coords() + 1),
                args: vec![coords, layer],
            },
            None => coords,
        }
    }

    /// Name of a sampling function in GLSL ES 1.00.
    fn es100_name(&mut self, suffix: &str) -> BuildResult<String> {
        let base = match self.tex.dim {
            TextureDim::Cube => "textureCube",
            _ => "texture2D",
        };
        match suffix {
            "" => Ok(String::from(base)),
            "Lod" if self.ctx.stage() == ShaderStage::Vertex => Ok(format!("{}Lod", base)),
            "Grad" if self.ctx.stage() == ShaderStage::Vertex => {
                Err(self.unsupported("explicit gradients in the vertex stage"))
            }
            _ => {
                self.ctx.extensions.insert(String::from(TEXTURE_LOD_EXT));
                Ok(format!("{}{}EXT", base, suffix))
            }
        }
    }

    /// Narrow a sampled vec4 to the scalar depth value.
    fn depth_value(&self, value: Expr) -> Expr {
        if self.tex.depth && !self.op.compares() {
            swizzle(value, "x", ScalarKind::F32)
        } else {
            value
        }
    }

    fn lower(mut self, args: Vec<Expr>) -> BuildResult<Expr> {
        let mut rest = args.into_iter();
        let texture = rest
            .next()
            .ok_or_else(|| BuildError::internal("texture call without arguments"))?;
        if self.op == TextureOp::Dimensions {
            return self.dimensions(texture, rest.next());
        }
        let coords = rest
            .next()
            .ok_or_else(|| BuildError::internal("texture call without coordinates"))?;
        let layer = if self.tex.arrayed { rest.next() } else { None };
        let extra: Vec<Expr> = rest.collect();
        let sampled = Type::vec4f();

        let lowered = match self.op {
            TextureOp::Sample | TextureOp::SampleBias => {
                let coords = self.float_coords(coords, layer, None);
                let name = if self.es100() {
                    self.es100_name("")?
                } else {
                    String::from("texture")
                };
                let mut args = vec![texture, coords];
                args.extend(extra);
                self.depth_value(call(name, args, sampled, 0))
            }
            TextureOp::SampleLevel => {
                let coords = self.float_coords(coords, layer, None);
                let level = extra
                    .into_iter()
                    .next()
                    .ok_or_else(|| BuildError::internal("textureSampleLevel without level"))?;
                let level = if level.ty() == Type::f32() {
                    level
                } else {
                    to_float(level)
                };
                let name = if self.es100() {
                    self.es100_name("Lod")?
                } else {
                    String::from("textureLod")
                };
                self.depth_value(call(name, vec![texture, coords, level], sampled, 0))
            }
            TextureOp::SampleGrad => {
                let coords = self.float_coords(coords, layer, None);
                let name = if self.es100() {
                    self.es100_name("Grad")?
                } else {
                    String::from("textureGrad")
                };
                let mut args = vec![texture, coords];
                args.extend(extra);
                self.depth_value(call(name, args, sampled, 0))
            }
            TextureOp::SampleCompare | TextureOp::SampleCompareLevel => {
                let reference = extra
                    .into_iter()
                    .next()
                    .ok_or_else(|| BuildError::internal("comparison without reference"))?;
                let coords = self.float_coords(coords, layer, Some(reference));
                if self.op == TextureOp::SampleCompare {
                    call("texture", vec![texture, coords], Type::f32(), 0)
                } else {
                    let lod = Expr::Literal(Literal::F32(0.0));
                    call("textureLod", vec![texture, coords, lod], Type::f32(), 0)
                }
            }
            TextureOp::Load => {
                let coords = self.texel_coords(coords, layer);
                let level = extra
                    .into_iter()
                    .next()
                    .unwrap_or(Expr::Literal(Literal::I32(0)));
                let kind = self.ret.scalar_kind().unwrap_or(ScalarKind::F32);
                let fetched = call(
                    "texelFetch",
                    vec![texture, coords, level],
                    Type::vec(kind, 4),
                    0,
                );
                self.depth_value(fetched)
            }
            TextureOp::Store => return Err(self.unsupported("textureStore")),
            TextureOp::Dimensions => return Err(BuildError::internal("textureDimensions lowered twice")),
        };
        Ok(lowered)
    }

    /// `textureSize` returns signed extents that include the layer count;
    /// narrow and convert them to the unsigned result.
    fn dimensions(self, texture: Expr, level: Option<Expr>) -> BuildResult<Expr> {
        if self.es100() {
            return Err(self.unsupported("textureDimensions"));
        }
        let level = level.unwrap_or(Expr::Literal(Literal::I32(0)));
        let size_width = match (self.tex.dim, self.tex.arrayed) {
            (TextureDim::D3, _) | (TextureDim::D2, true) => 3,
            _ => 2,
        };
        let size = call(
            "textureSize",
            vec![texture, level],
            Type::vec(ScalarKind::I32, size_width),
            0,
        );
        let ret_width = self.ret.as_primitive().map_or(1, |p| p.rows);
        let narrowed = if ret_width == size_width {
            size
        } else {
            swizzle(size, &"xyz"[..ret_width as usize], ScalarKind::I32)
        };
        Ok(Expr::Cast {
            ty: self.ret,
            value: Box::new(narrowed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builtins::BuiltinRegistry, exp::Exp, scope::FrameKind};
    use alloc::{string::ToString, sync::Arc};
    use glint_ir::{ast::SymbolId, LayoutKind};

    fn ctx(target: Target, stage: ShaderStage) -> ShaderCtx {
        let mut ctx = ShaderCtx::new(
            target,
            stage,
            LayoutKind::Default,
            Arc::new(BuiltinRegistry::standard()),
        );
        ctx.scopes.push(FrameKind::Function);
        ctx
    }

    fn global_texture(ctx: &mut ShaderCtx, tex: TextureType) -> Exp {
        let ty = Type::texture(tex).unwrap();
        let var = VarRef {
            id: SymbolId(100),
            name: "shadow".to_string(),
            ty,
            kind: VarKind::Global(GlobalKind::Texture),
        };
        ctx.module.globals.push(GlobalDecl {
            var: var.clone(),
            kind: GlobalKind::Texture,
            group: 1,
            binding: None,
            init: None,
        });
        Exp::node(Expr::Var(var))
    }

    fn resolve_and_lower(ctx: &mut ShaderCtx, name: &str, args: Vec<Exp>) -> BuildResult<Expr> {
        let registry = ctx.registry.clone();
        let def = registry.get(name).unwrap();
        let overload = def.resolve(ctx.target(), &args).unwrap().clone();
        let typed = args
            .into_iter()
            .zip(&overload.params)
            .map(|(a, p)| match &p.kind {
                super::super::ParamKind::Exact(ty) => a.resolve_as(ty).map(|(e, _)| e),
                _ => a.resolve().map(|(e, _)| e),
            })
            .collect::<BuildResult<Vec<_>>>()?;
        lower(ctx, &overload, typed, 0)
    }

    fn uv() -> Exp {
        Exp::node(Expr::Construct {
            ty: Type::vec2f(),
            args: vec![Expr::Literal(Literal::F32(0.5)), Expr::Literal(Literal::F32(0.5))],
        })
    }

    #[test]
    fn test_wgsl_compare_inserts_comparison_sampler() {
        let mut c = ctx(Target::WebGPU, ShaderStage::Fragment);
        let tex = global_texture(&mut c, TextureType::depth(TextureDim::D2));
        let e = resolve_and_lower(
            &mut c,
            "textureSampleCompare",
            vec![tex, uv(), Exp::from(0.5)],
        )
        .unwrap();
        assert_eq!(e.to_string(), "textureSampleCompare(shadow, zSamplerCmp_shadow, vec2<f32>(0.5, 0.5), 0.5)");
        assert_eq!(c.module.globals[1].kind, GlobalKind::Sampler);
        assert_eq!(c.module.globals[1].group, 1);
        assert_eq!(c.samplers["shadow"], vec!["zSamplerCmp_shadow".to_string()]);
    }

    #[test]
    fn test_glsl_compare_folds_reference_into_coords() {
        let mut c = ctx(Target::WebGL2, ShaderStage::Fragment);
        let tex = global_texture(&mut c, TextureType::depth(TextureDim::D2));
        let e = resolve_and_lower(
            &mut c,
            "textureSampleCompare",
            vec![tex, uv(), Exp::from(0.5)],
        )
        .unwrap();
        assert_eq!(e.to_string(), "texture(shadow, vec3<f32>(vec2<f32>(0.5, 0.5), 0.5))");
        assert!(c.texture_use["shadow"].compared);
    }

    #[test]
    fn test_glsl_depth_sampled_both_ways_fails() {
        let mut c = ctx(Target::WebGL2, ShaderStage::Fragment);
        let tex = global_texture(&mut c, TextureType::depth(TextureDim::D2));
        resolve_and_lower(&mut c, "textureSample", vec![tex.clone(), uv()]).unwrap();
        let err = resolve_and_lower(
            &mut c,
            "textureSampleCompare",
            vec![tex, uv(), Exp::from(0.5)],
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Unsupported { .. }));
    }

    #[test]
    fn test_es100_fragment_lod_needs_extension() {
        let mut c = ctx(Target::WebGL1, ShaderStage::Fragment);
        let tex = global_texture(
            &mut c,
            TextureType::sampled(TextureDim::D2, glint_ir::SampleType::Float),
        );
        let e = resolve_and_lower(&mut c, "textureSampleLevel", vec![tex, uv(), Exp::from(1.0)])
            .unwrap();
        assert_eq!(e.to_string(), "texture2DLodEXT(shadow, vec2<f32>(0.5, 0.5), 1.0)");
        assert!(c.extensions.contains(TEXTURE_LOD_EXT));
    }

    #[test]
    fn test_webgl1_integer_modulus_expands() {
        let mut c = ctx(Target::WebGL1, ShaderStage::Fragment);
        let a = c.declare("a", 7).unwrap();
        let e = resolve_and_lower(&mut c, "mod", vec![a, Exp::from(3)]).unwrap();
        assert_eq!(e.to_string(), "(a - (3 * (a / 3)))");
    }

    #[test]
    fn test_dimensions_narrowed_and_converted() {
        let mut c = ctx(Target::WebGL2, ShaderStage::Fragment);
        let tex = global_texture(
            &mut c,
            TextureType::sampled(TextureDim::D2, glint_ir::SampleType::Float).array(),
        );
        let e = resolve_and_lower(&mut c, "textureDimensions", vec![tex]).unwrap();
        assert_eq!(e.to_string(), "vec2<u32>(textureSize(shadow, 0).xy)");
    }
}
