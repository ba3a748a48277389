//! Builtin function registry.
//!
//! Each builtin has an ordered list of overloads. Resolution filters the
//! overloads by target and scans them in declaration order; the first one
//! whose parameters accept the arguments wins. How a resolved call is
//! spelled on each target is described by its [`Lowering`].

mod table;
mod texture;

pub(crate) mod lower;

use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    vec::Vec,
};

use glint_ir::{
    ast::BinaryOp, is_compatible, type_name, SampleType, StageMask, Target, TargetMask,
    TextureDim, Type, TypeDesc,
};

use crate::{exp::Exp, literal::LiteralValue};

/// How a by-reference parameter uses its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefAccess {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Exact(Type),
    /// Any storage texture of this shape that can be written.
    StorageTexture {
        dim: TextureDim,
        arrayed: bool,
        sample: SampleType,
    },
    /// Any runtime-sized array.
    RuntimeArray,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub by_ref: Option<RefAccess>,
}

impl ParamSpec {
    pub fn value(ty: Type) -> Self {
        ParamSpec {
            kind: ParamKind::Exact(ty),
            by_ref: None,
        }
    }

    pub fn reference(ty: Type, access: RefAccess) -> Self {
        ParamSpec {
            kind: ParamKind::Exact(ty),
            by_ref: Some(access),
        }
    }

    pub fn pattern(kind: ParamKind, by_ref: Option<RefAccess>) -> Self {
        ParamSpec { kind, by_ref }
    }

    /// Check if `arg` can be passed for this parameter.
    pub fn accepts(&self, arg: &Exp) -> bool {
        match (&self.kind, arg.ty()) {
            (ParamKind::Exact(ty), Some(arg_ty)) => is_compatible(ty, &arg_ty),
            (ParamKind::Exact(ty), None) => match (ty.as_primitive(), arg.literal()) {
                (Some(prim), Some(value)) if prim.is_scalar() && self.by_ref.is_none() => {
                    literal_fits(value, prim.scalar)
                }
                _ => false,
            },
            (
                ParamKind::StorageTexture {
                    dim,
                    arrayed,
                    sample,
                },
                Some(arg_ty),
            ) => arg_ty.as_texture().is_some_and(|tex| {
                tex.dim == *dim
                    && tex.arrayed == *arrayed
                    && tex.sample_type == *sample
                    && tex
                        .storage
                        .is_some_and(|(_, access)| access != glint_ir::StorageAccess::Read)
            }),
            (ParamKind::RuntimeArray, Some(arg_ty)) => {
                arg_ty.as_array().is_some_and(|a| a.is_runtime())
            }
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match &self.kind {
            ParamKind::Exact(ty) => ty.to_string(),
            ParamKind::StorageTexture { dim, .. } => {
                alloc::format!("texture_storage_{}", dim.name())
            }
            ParamKind::RuntimeArray => "array<T>".to_string(),
        }
    }
}

fn literal_fits(value: LiteralValue, kind: glint_ir::ScalarKind) -> bool {
    value.classify_as(kind).is_ok()
}

/// Texture operations that need per-target argument rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureOp {
    Sample,
    SampleLevel,
    SampleBias,
    SampleGrad,
    SampleCompare,
    SampleCompareLevel,
    Load,
    Store,
    Dimensions,
}

impl TextureOp {
    pub fn wgsl_name(self) -> &'static str {
        match self {
            TextureOp::Sample => "textureSample",
            TextureOp::SampleLevel => "textureSampleLevel",
            TextureOp::SampleBias => "textureSampleBias",
            TextureOp::SampleGrad => "textureSampleGrad",
            TextureOp::SampleCompare => "textureSampleCompare",
            TextureOp::SampleCompareLevel => "textureSampleCompareLevel",
            TextureOp::Load => "textureLoad",
            TextureOp::Store => "textureStore",
            TextureOp::Dimensions => "textureDimensions",
        }
    }

    /// Check if the operation reads through a sampler.
    pub fn samples(self) -> bool {
        matches!(
            self,
            TextureOp::Sample
                | TextureOp::SampleLevel
                | TextureOp::SampleBias
                | TextureOp::SampleGrad
                | TextureOp::SampleCompare
                | TextureOp::SampleCompareLevel
        )
    }

    pub fn compares(self) -> bool {
        matches!(self, TextureOp::SampleCompare | TextureOp::SampleCompareLevel)
    }
}

/// Per-target spelling of a resolved builtin call.
#[derive(Debug, Clone, PartialEq)]
pub enum Lowering {
    /// A plain call with the same arguments everywhere.
    Call { glsl: String, wgsl: String },
    /// A GLSL relational function that is an infix operator in WGSL.
    Compare { glsl: &'static str, op: BinaryOp },
    /// `not(v)` in GLSL, `!v` in WGSL.
    Not,
    /// `%` for WGSL and integers, `mod()` for GLSL floats.
    Modulus,
    /// Fragment derivatives; GLSL ES 1.00 needs `GL_OES_standard_derivatives`.
    Derivative { glsl: &'static str, wgsl: &'static str },
    Texture(TextureOp),
}

impl Lowering {
    pub fn call(name: &str) -> Self {
        Lowering::Call {
            glsl: name.to_string(),
            wgsl: name.to_string(),
        }
    }

    pub fn renamed(glsl: &str, wgsl: &str) -> Self {
        Lowering::Call {
            glsl: glsl.to_string(),
            wgsl: wgsl.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overload {
    pub params: Vec<ParamSpec>,
    pub ret: Type,
    pub targets: TargetMask,
    pub lowering: Lowering,
}

impl Overload {
    pub fn new(params: Vec<ParamSpec>, ret: Type, lowering: Lowering) -> Self {
        Overload {
            params,
            ret,
            targets: TargetMask::ALL,
            lowering,
        }
    }

    /// Restrict the overload to `targets`.
    pub fn on(mut self, targets: TargetMask) -> Self {
        self.targets = self.targets.intersect(targets);
        self
    }

    /// Check if every argument is accepted by the matching parameter.
    pub fn matches(&self, args: &[Exp]) -> bool {
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(p, a)| p.accepts(a))
    }

    /// Drop targets on which one of the overload's types has no spelling.
    fn restrict_to_expressible(&mut self) {
        let mut types: Vec<&Type> = self
            .params
            .iter()
            .filter_map(|p| match &p.kind {
                ParamKind::Exact(ty) => Some(ty),
                _ => None,
            })
            .collect();
        if !self.ret.is_void() {
            types.push(&self.ret);
        }
        for target in Target::ALL {
            if !self.targets.contains(target) {
                continue;
            }
            let expressible = types.iter().all(|ty| match ty.desc() {
                TypeDesc::Texture(tex) if target.is_glsl() => {
                    glint_ir::types::glsl_texture_name(tex, target, false).is_ok()
                }
                _ => type_name(ty, target, "").is_ok(),
            });
            if !expressible {
                self.targets = self.targets.without(target.mask());
            }
        }
    }

    pub(crate) fn signature(&self) -> String {
        let mut out = String::from("(");
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if p.by_ref.is_some() {
                out.push('&');
            }
            out.push_str(&p.describe());
        }
        out.push_str(") -> ");
        out.push_str(&self.ret.to_string());
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinDef {
    pub name: String,
    /// Stages the builtin may be called from.
    pub stages: StageMask,
    /// Calls are kept as statements even when their value is unused.
    pub side_effects: bool,
    pub overloads: Vec<Overload>,
}

impl BuiltinDef {
    pub fn new(name: &str, overloads: Vec<Overload>) -> Self {
        BuiltinDef {
            name: name.to_string(),
            stages: StageMask::ALL,
            side_effects: false,
            overloads,
        }
    }

    pub fn stages(mut self, stages: StageMask) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_side_effects(mut self) -> Self {
        self.side_effects = true;
        self
    }

    /// Overloads usable on `target`, in declaration order.
    pub fn candidates(&self, target: Target) -> impl Iterator<Item = &Overload> {
        self.overloads
            .iter()
            .filter(move |o| o.targets.contains(target))
    }

    /// The first overload on `target` accepting `args`.
    pub fn resolve(&self, target: Target, args: &[Exp]) -> Option<&Overload> {
        let found = self.candidates(target).find(|o| o.matches(args));
        if let Some(o) = found {
            log::trace!("{} resolved to {}", self.name, o.signature());
        }
        found
    }
}

/// The set of builtin functions callable from shader code.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    defs: BTreeMap<String, BuiltinDef>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry holding every standard builtin.
    pub fn standard() -> Self {
        let mut registry = BuiltinRegistry::new();
        table::register(&mut registry);
        texture::register(&mut registry);
        log::debug!("builtin registry holds {} functions", registry.len());
        registry
    }

    /// Add or replace a builtin. Overloads whose types cannot be spelled on
    /// a target are restricted away from it.
    pub fn define(&mut self, mut def: BuiltinDef) {
        for overload in &mut def.overloads {
            overload.restrict_to_expressible();
        }
        self.defs.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinDef> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use glint_ir::ScalarKind;

    #[test]
    fn test_unsigned_overloads_skip_webgl1() {
        let mut registry = BuiltinRegistry::new();
        registry.define(BuiltinDef::new(
            "bump",
            vec![
                Overload::new(vec![ParamSpec::value(Type::u32())], Type::u32(), Lowering::call("bump")),
                Overload::new(vec![ParamSpec::value(Type::f32())], Type::f32(), Lowering::call("bump")),
            ],
        ));
        let def = registry.get("bump").unwrap();
        assert_eq!(def.candidates(Target::WebGL1).count(), 1);
        assert_eq!(def.candidates(Target::WebGPU).count(), 2);
    }

    #[test]
    fn test_first_match_wins() {
        let mut registry = BuiltinRegistry::new();
        registry.define(BuiltinDef::new(
            "pick",
            vec![
                Overload::new(vec![ParamSpec::value(Type::i32())], Type::i32(), Lowering::call("a")),
                Overload::new(vec![ParamSpec::value(Type::f32())], Type::f32(), Lowering::call("b")),
            ],
        ));
        let def = registry.get("pick").unwrap();
        let picked = def.resolve(Target::WebGPU, &[Exp::from(2)]).unwrap();
        assert_eq!(picked.ret, Type::i32());
        let picked = def.resolve(Target::WebGPU, &[Exp::from(2.5)]).unwrap();
        assert_eq!(picked.ret, Type::f32());
        assert!(def.resolve(Target::WebGPU, &[Exp::from(true)]).is_none());
    }

    #[test]
    fn test_standard_registry_is_deterministic() {
        let a = BuiltinRegistry::standard();
        let b = BuiltinRegistry::standard();
        assert!(a.contains("normalize"));
        assert!(a.contains("textureSample"));
        let args = [Exp::from(1.0), Exp::from(2.0)];
        for target in Target::ALL {
            let left = a.get("max").unwrap().resolve(target, &args);
            let right = b.get("max").unwrap().resolve(target, &args);
            assert_eq!(left, right);
        }
        let vec_u = Type::vec(ScalarKind::U32, 2);
        assert!(a
            .get("min")
            .unwrap()
            .candidates(Target::WebGL1)
            .all(|o| o.ret != vec_u));
    }
}
