//! Per-stage build context.
//!
//! A [`ShaderCtx`] is handed to each stage's describe callback. Every builder
//! operation goes through it: it owns the scope stack, the module being
//! assembled, the declared functions and the bookkeeping needed to merge the
//! stage with its sibling afterwards.

use alloc::{
    collections::{BTreeMap, BTreeSet},
    format,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};

use glint_ir::{
    ast::{BuiltinVar, CallSlot, Expr, ShaderModule, Stmt, SymbolId, VarDecl, VarKind, VarRef},
    is_identifier, parse_type, type_name, LayoutKind, ShaderStage, StageMask, Target, Type,
    TypeCache, TypeDesc,
};

use crate::{
    builtins::BuiltinRegistry,
    error::{BuildError, BuildResult},
    exp::Exp,
    scope::{ScopeStack, Symbol},
};

/// Words that can never name a user declaration on any target.
const RESERVED: &[&str] = &[
    "active", "alias", "array", "asm", "atomic", "attribute", "bitcast", "bool", "break", "buffer",
    "bvec2", "bvec3", "bvec4", "case", "cast", "centroid", "class", "common", "const", "const_assert",
    "continue", "continuing", "default", "diagnostic", "discard", "do", "double", "else", "enable",
    "enum", "extern", "external", "f16", "f32", "false", "fallthrough", "filter", "fixed", "flat",
    "float", "fn", "for", "function", "goto", "half", "highp", "i32", "if", "in", "inline",
    "inout", "input", "int", "interface", "invariant", "ivec2", "ivec3", "ivec4", "layout", "let",
    "long", "loop", "lowp", "main", "mat2", "mat2x2", "mat2x3", "mat2x4", "mat3", "mat3x2",
    "mat3x3", "mat3x4", "mat4", "mat4x2", "mat4x3", "mat4x4", "mediump", "namespace",
    "noinline", "noperspective", "out", "output", "override", "packed", "partition", "precision",
    "private", "ptr", "public", "requires", "return", "sampler", "sampler2D", "sampler3D",
    "samplerCube", "sampler_comparison", "select", "short", "sizeof", "smooth", "static",
    "storage", "struct", "superp", "switch", "template", "texture", "this", "true", "type",
    "typedef", "u32", "uint", "uniform", "union", "unsigned", "using", "uvec2", "uvec3", "uvec4",
    "var", "varying", "vec2", "vec3", "vec4", "void", "volatile", "while", "workgroup",
];

/// Which ways a texture has been read on GLSL targets, where a depth
/// texture is declared either as a shadow sampler or as a plain one.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TextureUse {
    pub sampled: bool,
    pub compared: bool,
}

/// A user function as seen by callers.
#[derive(Debug, Clone)]
pub(crate) struct FunctionSig {
    pub name: String,
    pub emitted: String,
    pub params: Vec<(Type, bool)>,
    pub ret: Type,
}

/// Everything a finished stage hands to the program builder.
#[derive(Debug)]
pub(crate) struct StageOutput {
    pub module: ShaderModule,
    pub extensions: BTreeSet<String>,
    pub comparison_textures: BTreeSet<String>,
    /// Implicit samplers synthesized per texture, in creation order.
    pub samplers: BTreeMap<String, Vec<String>>,
    pub next_symbol: u32,
}

/// The build context of one shader stage.
pub struct ShaderCtx {
    target: Target,
    stage: ShaderStage,
    layout: LayoutKind,
    pub(crate) types: TypeCache,
    pub(crate) registry: Arc<BuiltinRegistry>,
    pub(crate) scopes: ScopeStack,
    pub(crate) module: ShaderModule,
    pub(crate) functions: Vec<FunctionSig>,
    pub(crate) structs: BTreeMap<String, Type>,
    pub(crate) builtins: BTreeMap<BuiltinVar, VarRef>,
    pub(crate) readonly: BTreeSet<SymbolId>,
    pub(crate) consumed: BTreeSet<CallSlot>,
    pub(crate) samplers: BTreeMap<String, Vec<String>>,
    pub(crate) texture_use: BTreeMap<String, TextureUse>,
    pub(crate) extensions: BTreeSet<String>,
    pub(crate) in_main: bool,
    has_main: bool,
    next_symbol: u32,
    next_slot: u32,
}

impl ShaderCtx {
    pub(crate) fn new(
        target: Target,
        stage: ShaderStage,
        layout: LayoutKind,
        registry: Arc<BuiltinRegistry>,
    ) -> Self {
        ShaderCtx {
            target,
            stage,
            layout,
            types: TypeCache::new(),
            registry,
            scopes: ScopeStack::new(),
            module: ShaderModule::new(stage),
            functions: Vec::new(),
            structs: BTreeMap::new(),
            builtins: BTreeMap::new(),
            readonly: BTreeSet::new(),
            consumed: BTreeSet::new(),
            samplers: BTreeMap::new(),
            texture_use: BTreeMap::new(),
            extensions: BTreeSet::new(),
            in_main: false,
            has_main: false,
            next_symbol: 0,
            next_slot: 0,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Layout given to structs defined without an explicit one.
    pub fn layout(&self) -> LayoutKind {
        self.layout
    }

    pub fn registry(&self) -> &BuiltinRegistry {
        &self.registry
    }

    /// Parse a textual type descriptor, e.g. `texture_depth_2d` or
    /// `array<vec4<f32>,8>`, and intern it.
    pub fn parse_type(&mut self, text: &str) -> BuildResult<Type> {
        let ty = parse_type(text)?;
        Ok(self.types.intern(ty))
    }

    pub(crate) fn intern(&mut self, ty: Type) -> Type {
        self.types.intern(ty)
    }

    pub(crate) fn fresh_symbol(&mut self) -> SymbolId {
        let id = SymbolId(self.next_symbol);
        self.next_symbol += 1;
        id
    }

    pub(crate) fn fresh_slot(&mut self) -> CallSlot {
        let slot = CallSlot(self.next_slot);
        self.next_slot += 1;
        slot
    }

    pub(crate) fn var_ref(&mut self, name: &str, ty: Type, kind: VarKind) -> VarRef {
        let ty = self.intern(ty);
        VarRef {
            id: self.fresh_symbol(),
            name: name.to_string(),
            ty,
            kind,
        }
    }

    /// Mark the calls inside a value as used, so their standalone call
    /// statements are dropped and the calls render nested instead.
    pub(crate) fn consume(&mut self, slots: Vec<CallSlot>) {
        self.consumed.extend(slots);
    }

    pub(crate) fn push_stmt(&mut self, stmt: Stmt) -> BuildResult<()> {
        self.scopes.push_stmt(stmt)
    }

    pub(crate) fn require_function(&self, op: &str) -> BuildResult<()> {
        if self.scopes.is_global() {
            return Err(BuildError::scope(format!(
                "{} is only allowed inside a function",
                op
            )));
        }
        Ok(())
    }

    pub(crate) fn require_global(&self, op: &str) -> BuildResult<()> {
        if !self.scopes.is_global() {
            return Err(BuildError::scope(format!(
                "{} is only allowed at global scope",
                op
            )));
        }
        Ok(())
    }

    pub(crate) fn require_stage(&self, op: &str, stages: StageMask) -> BuildResult<()> {
        if !stages.contains(self.stage) {
            return Err(BuildError::scope(format!(
                "{} is not available in the {} stage",
                op, self.stage
            )));
        }
        Ok(())
    }

    /// Check that `ty` has a spelling on the target.
    pub(crate) fn check_type(&self, ty: &Type) -> BuildResult<()> {
        type_name(ty, self.target, "")?;
        Ok(())
    }

    /// Reject names that are malformed or collide with generated or
    /// reserved identifiers.
    pub(crate) fn check_name(&self, name: &str) -> BuildResult<()> {
        let reserved = |why: &str| {
            Err(BuildError::param_value(
                "identifier",
                format!("{} {}", name, why),
            ))
        };
        if !is_identifier(name) {
            return reserved("is not a valid identifier");
        }
        if name.starts_with("gl_") {
            return reserved("uses the reserved gl_ prefix");
        }
        if name.contains("__") {
            return reserved("contains a double underscore");
        }
        let mut chars = name.chars();
        if chars.next() == Some('z') && chars.next().is_some_and(|c| c.is_ascii_uppercase()) {
            return reserved("collides with generated names");
        }
        if RESERVED.contains(&name) {
            return reserved("is a reserved word");
        }
        if self.structs.contains_key(name) {
            return reserved("is already a struct name");
        }
        Ok(())
    }

    /// Look up a declared name.
    pub fn get(&self, name: &str) -> BuildResult<Exp> {
        self.scopes
            .lookup(name)
            .map(|symbol| Exp::node(symbol.access.clone()))
            .ok_or_else(|| BuildError::reference(format!("{} is not declared", name)))
    }

    /// Declare a local initialized with `value`, typed after the value.
    pub fn declare(&mut self, name: &str, value: impl Into<Exp>) -> BuildResult<Exp> {
        self.require_function("declare")?;
        let (init, slots) = value.into().resolve()?;
        self.consume(slots);
        let ty = init.ty();
        self.declare_local(name, ty, Some(init), false)
    }

    /// Declare a local of type `ty`, optionally initialized.
    pub fn declare_typed(
        &mut self,
        name: &str,
        ty: Type,
        init: Option<Exp>,
    ) -> BuildResult<Exp> {
        self.require_function("declare")?;
        let init = match init {
            Some(value) => {
                let (init, slots) = value.resolve_as(&ty)?;
                self.consume(slots);
                Some(init)
            }
            None => None,
        };
        self.declare_local(name, ty, init, false)
    }

    pub(crate) fn declare_local(
        &mut self,
        name: &str,
        ty: Type,
        init: Option<Expr>,
        constant: bool,
    ) -> BuildResult<Exp> {
        self.check_name(name)?;
        let storable = match ty.desc() {
            TypeDesc::Void | TypeDesc::Any | TypeDesc::Function(_) => false,
            TypeDesc::Texture(_) | TypeDesc::Sampler(_) | TypeDesc::Atomic(_) => false,
            TypeDesc::Array(arr) => !arr.is_runtime(),
            _ => true,
        };
        if !storable {
            return Err(BuildError::param_value(
                "declare",
                format!("a local cannot hold a value of type {}", ty),
            ));
        }
        self.check_type(&ty)?;
        let var = self.var_ref(name, ty, VarKind::Local);
        if constant {
            self.readonly.insert(var.id);
        }
        self.scopes.declare(name, Symbol::new(var.clone()))?;
        self.push_stmt(Stmt::Declare(VarDecl {
            var: var.clone(),
            init,
            constant,
        }))?;
        Ok(Exp::node(Expr::Var(var)))
    }

    /// Assign to `name` if it is declared, otherwise declare it.
    pub fn set(&mut self, name: &str, value: impl Into<Exp>) -> BuildResult<Exp> {
        self.require_function("set")?;
        match self.scopes.lookup(name) {
            Some(symbol) => {
                let target = Exp::node(symbol.access.clone());
                self.assign(&target, value)?;
                Ok(target)
            }
            None => self.declare(name, value),
        }
    }

    /// Store `value` through `target`.
    pub fn assign(&mut self, target: &Exp, value: impl Into<Exp>) -> BuildResult<()> {
        self.require_function("assign")?;
        let lhs = target
            .expr()
            .ok_or_else(|| BuildError::reference(format!("cannot assign to literal {}", target)))?;
        if !lhs.is_assignable() {
            return Err(BuildError::reference(format!("{} is not assignable", lhs)));
        }
        if let Some(root) = lhs.root_symbol() {
            if self.readonly.contains(&root.id) {
                return Err(BuildError::reference(format!(
                    "{} is read-only",
                    root.name
                )));
            }
        }
        let lhs = lhs.clone();
        let (value, slots) = value.into().resolve_as(&lhs.ty())?;
        self.consume(target.slots.clone());
        self.consume(slots);
        self.push_stmt(Stmt::Assign { target: lhs, value })
    }

    /// Take the address of a reference expression (WGSL only).
    pub fn address_of(&mut self, value: &Exp) -> BuildResult<Exp> {
        if self.target != Target::WebGPU {
            return Err(BuildError::unsupported("pointers", self.target));
        }
        let inner = value
            .expr()
            .ok_or_else(|| BuildError::reference(format!("cannot take the address of {}", value)))?;
        if !inner.is_reference() || inner.contains_swizzle() {
            return Err(BuildError::reference(format!(
                "cannot take the address of {}",
                inner
            )));
        }
        let space = inner
            .address_space()
            .ok_or_else(|| BuildError::reference(format!("{} has no address", inner)))?;
        let ty = self.intern(Type::pointer(inner.ty(), space));
        Ok(Exp::with_slots(
            Expr::AddressOf {
                inner: alloc::boxed::Box::new(inner.clone()),
                ty,
            },
            value.slots.clone(),
        ))
    }

    /// Read through a pointer.
    pub fn deref(&mut self, pointer: &Exp) -> BuildResult<Exp> {
        let inner = pointer
            .expr()
            .ok_or_else(|| BuildError::reference(format!("{} is not a pointer", pointer)))?;
        let ty = inner.ty();
        let target = ty
            .as_pointer()
            .ok_or_else(|| BuildError::reference(format!("{} of type {} is not a pointer", inner, ty)))?;
        Ok(Exp::with_slots(
            Expr::Deref {
                inner: alloc::boxed::Box::new(inner.clone()),
                ty: target.pointee.clone(),
            },
            pointer.slots.clone(),
        ))
    }

    pub(crate) fn mark_main(&mut self) -> BuildResult<()> {
        if self.has_main {
            return Err(BuildError::scope("main is already defined"));
        }
        self.has_main = true;
        Ok(())
    }

    /// Close the stage: check it is complete and drop call statements whose
    /// values were consumed elsewhere.
    pub(crate) fn finish(mut self) -> BuildResult<StageOutput> {
        if !self.scopes.is_global() {
            return Err(BuildError::internal(format!(
                "{} scope frames left open",
                self.scopes.depth() - 1
            )));
        }
        if !self.has_main {
            return Err(BuildError::scope(format!(
                "the {} stage defines no main function",
                self.stage
            )));
        }
        let consumed = core::mem::take(&mut self.consumed);
        for func in &mut self.module.functions {
            func.body.retain_calls(&|slot| consumed.contains(&slot));
        }
        let mut comparison_textures = BTreeSet::new();
        for (name, usage) in &self.texture_use {
            if usage.sampled && usage.compared {
                return Err(BuildError::unsupported(
                    format!("depth texture {} read both with and without comparison", name),
                    self.target,
                ));
            }
            if usage.compared {
                comparison_textures.insert(name.clone());
            }
        }
        log::debug!(
            "{} stage described: {} functions, {} globals, {} types",
            self.stage,
            self.module.functions.len(),
            self.module.globals.len(),
            self.types.len()
        );
        Ok(StageOutput {
            module: self.module,
            extensions: self.extensions,
            comparison_textures,
            samplers: self.samplers,
            next_symbol: self.next_symbol,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::FrameKind;

    fn ctx(target: Target) -> ShaderCtx {
        ShaderCtx::new(
            target,
            ShaderStage::Fragment,
            LayoutKind::Default,
            Arc::new(BuiltinRegistry::new()),
        )
    }

    #[test]
    fn test_reserved_names() {
        let c = ctx(Target::WebGPU);
        assert!(c.check_name("color").is_ok());
        assert!(c.check_name("gl_Color").is_err());
        assert!(c.check_name("a__b").is_err());
        assert!(c.check_name("zVarying_x").is_err());
        assert!(c.check_name("zoom").is_ok());
        assert!(c.check_name("texture").is_err());
        assert!(c.check_name("9lives").is_err());
    }

    #[test]
    fn test_set_declares_then_assigns() {
        let mut c = ctx(Target::WebGPU);
        c.scopes.push(FrameKind::Function);
        c.set("x", 1.5).unwrap();
        c.set("x", true).unwrap_err();
        c.set("x", 2.0).unwrap();
        let frame = c.scopes.current_mut();
        assert!(matches!(frame.stmts[0], Stmt::Declare(_)));
        assert!(matches!(frame.stmts[1], Stmt::Assign { .. }));
        assert_eq!(frame.stmts.len(), 2);
    }

    #[test]
    fn test_constants_are_read_only() {
        let mut c = ctx(Target::WebGL2);
        c.scopes.push(FrameKind::Function);
        let k = c
            .declare_local("k", Type::f32(), Some(Expr::Literal(glint_ir::ast::Literal::F32(1.0))), true)
            .unwrap();
        assert!(matches!(c.assign(&k, 2.0), Err(BuildError::Reference(_))));
    }

    #[test]
    fn test_declarations_need_a_function() {
        let mut c = ctx(Target::WebGL1);
        assert!(matches!(c.declare("x", 1.0), Err(BuildError::ScopeMisuse(_))));
    }

    #[test]
    fn test_pointers_are_webgpu_only() {
        let mut c = ctx(Target::WebGL2);
        c.scopes.push(FrameKind::Function);
        let x = c.declare("x", 1.0).unwrap();
        assert!(matches!(c.address_of(&x), Err(BuildError::Unsupported { .. })));

        let mut c = ctx(Target::WebGPU);
        c.scopes.push(FrameKind::Function);
        let x = c.declare("x", 1.0).unwrap();
        let p = c.address_of(&x).unwrap();
        assert_eq!(p.ty().unwrap().to_string(), "ptr<function,f32>");
        assert_eq!(c.deref(&p).unwrap().ty(), Some(Type::f32()));
    }
}
