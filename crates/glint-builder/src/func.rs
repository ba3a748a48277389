//! User functions, the stage entry point and calls.

use alloc::{
    boxed::Box,
    format,
    string::{String, ToString},
    vec::Vec,
};

use glint_ir::{
    ast::{Block, Expr, FunctionDef, ParamDecl, Stmt, VarKind},
    is_compatible, AddressSpace, Target, Type,
};

use crate::{
    builtins::{lower::lower, ParamKind, RefAccess},
    ctx::{FunctionSig, ShaderCtx},
    error::{BuildError, BuildResult},
    exp::{render_arg_types, render_args, Exp},
    scope::{FrameKind, Symbol},
};

/// A parameter of a user function.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    ty: Type,
    by_ref: bool,
}

impl Param {
    pub fn new(name: &str, ty: Type) -> Self {
        Param {
            name: name.to_string(),
            ty,
            by_ref: false,
        }
    }

    /// A parameter the callee can write back through (`inout` in GLSL, a
    /// function-space pointer in WGSL).
    pub fn by_ref(name: &str, ty: Type) -> Self {
        Param {
            name: name.to_string(),
            ty,
            by_ref: true,
        }
    }
}

/// Check if every path through `block` ends in a return.
fn always_returns(block: &Block) -> bool {
    match block.stmts.last() {
        Some(Stmt::Return(_)) => true,
        Some(Stmt::If {
            branches,
            otherwise: Some(otherwise),
        }) => branches.iter().all(|(_, b)| always_returns(b)) && always_returns(otherwise),
        Some(Stmt::Scope(inner)) => always_returns(inner),
        _ => false,
    }
}

impl FunctionSig {
    fn accepts(&self, args: &[Exp]) -> bool {
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|((ty, by_ref), arg)| {
                match (arg.ty(), arg.literal()) {
                    (Some(arg_ty), _) => is_compatible(ty, &arg_ty),
                    (None, Some(value)) if !by_ref => ty
                        .as_primitive()
                        .is_some_and(|p| p.is_scalar() && value.classify_as(p.scalar).is_ok()),
                    _ => false,
                }
            })
    }
}

impl ShaderCtx {
    /// Define a helper function. The body receives one handle per parameter;
    /// the return type is inferred from its `ret` statements.
    pub fn function(
        &mut self,
        name: &str,
        params: Vec<Param>,
        body: impl FnOnce(&mut ShaderCtx, &[Exp]) -> BuildResult<()>,
    ) -> BuildResult<()> {
        self.require_global("function")?;
        self.check_name(name)?;
        if self.registry.contains(name) {
            return Err(BuildError::param_value(
                "function",
                format!("{} would shadow a builtin", name),
            ));
        }
        let param_types: Vec<(Type, bool)> = params
            .iter()
            .map(|p| (self.types.intern(p.ty.clone()), p.by_ref))
            .collect();
        if self
            .functions
            .iter()
            .any(|f| f.name == name && f.params == param_types)
        {
            return Err(BuildError::scope(format!(
                "{} is already defined with these parameters",
                name
            )));
        }
        if self.module.global(name).is_some() {
            return Err(BuildError::scope(format!("{} is already a global", name)));
        }
        let emitted = self.overload_name(name);

        let mut decls = Vec::with_capacity(params.len());
        let mut handles = Vec::with_capacity(params.len());
        let mut symbols = Vec::with_capacity(params.len());
        for p in &params {
            self.check_name(&p.name)?;
            self.check_type(&p.ty)?;
            if p.ty.is_void() || p.ty.has_runtime_tail() {
                return Err(BuildError::param_value(
                    name,
                    format!("parameter {} cannot have type {}", p.name, p.ty),
                ));
            }
            let (var, access) = if p.by_ref && self.target() == Target::WebGPU {
                let ptr = Type::pointer(p.ty.clone(), AddressSpace::Function);
                let var = self.var_ref(&p.name, ptr, VarKind::RefParam);
                let access = Expr::Deref {
                    inner: Box::new(Expr::Var(var.clone())),
                    ty: p.ty.clone(),
                };
                (var, access)
            } else {
                let kind = if p.by_ref {
                    VarKind::RefParam
                } else {
                    VarKind::Param
                };
                let var = self.var_ref(&p.name, p.ty.clone(), kind);
                (var.clone(), Expr::Var(var))
            };
            handles.push(Exp::node(access.clone()));
            symbols.push((p.name.clone(), Symbol { access }));
            decls.push(ParamDecl {
                var,
                by_ref: p.by_ref,
            });
        }

        self.scopes.push(FrameKind::Function);
        let mut result = Ok(());
        for (param_name, symbol) in symbols {
            result = result.and_then(|_| self.scopes.declare(&param_name, symbol));
        }
        let result = result.and_then(|_| body(self, &handles));
        let frame = self.scopes.pop(FrameKind::Function)?;
        result?;

        let ret = frame.ret.unwrap_or_else(Type::void);
        let body = Block::new(frame.stmts);
        if !ret.is_void() && !always_returns(&body) {
            return Err(BuildError::scope(format!(
                "{} may finish without returning a {}",
                name, ret
            )));
        }
        log::trace!("defined {} as {}", name, emitted);
        self.module.functions.push(FunctionDef {
            name: emitted.clone(),
            params: decls,
            ret: ret.clone(),
            body,
            entry: false,
        });
        self.functions.push(FunctionSig {
            name: name.to_string(),
            emitted,
            params: param_types,
            ret,
        });
        Ok(())
    }

    /// WGSL has no overloading, so later overloads get a numeric suffix.
    fn overload_name(&self, name: &str) -> String {
        if self.target() != Target::WebGPU {
            return name.to_string();
        }
        let taken = |candidate: &str| {
            self.functions.iter().any(|f| f.emitted == candidate)
                || self.module.global(candidate).is_some()
        };
        if !taken(name) {
            return name.to_string();
        }
        let mut n = self.functions.iter().filter(|f| f.name == name).count();
        loop {
            let candidate = format!("{}_{}", name, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Define the stage entry point.
    pub fn main(&mut self, body: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>) -> BuildResult<()> {
        self.require_global("main")?;
        self.mark_main()?;
        self.scopes.push(FrameKind::Function);
        self.in_main = true;
        let result = body(self);
        self.in_main = false;
        let frame = self.scopes.pop(FrameKind::Function)?;
        result?;
        self.module.functions.push(FunctionDef {
            name: "main".to_string(),
            params: Vec::new(),
            ret: Type::void(),
            body: Block::new(frame.stmts),
            entry: true,
        });
        Ok(())
    }

    /// Call a user function or a builtin. User overloads are tried first, in
    /// definition order.
    pub fn call(&mut self, name: &str, args: impl IntoIterator<Item = Exp>) -> BuildResult<Exp> {
        self.require_function("call")?;
        let args: Vec<Exp> = args.into_iter().collect();
        let user = self
            .functions
            .iter()
            .find(|f| f.name == name && f.accepts(&args))
            .cloned();
        if let Some(sig) = user {
            return self.call_user(&sig, args);
        }
        if self.functions.iter().any(|f| f.name == name) && !self.registry.contains(name) {
            return Err(self.no_overload(name, &args));
        }
        self.call_builtin(name, args)
    }

    fn no_overload(&self, name: &str, args: &[Exp]) -> BuildError {
        BuildError::NoOverload {
            function: name.to_string(),
            args: render_arg_types(args),
            call: format!("{}({})", name, render_args(args)),
        }
    }

    /// Pass `arg` by reference. On WGSL this takes its address in `space`,
    /// or in the argument's own space when `space` is `None`.
    fn pass_by_ref(
        &self,
        arg: Exp,
        access: RefAccess,
        space: Option<AddressSpace>,
    ) -> BuildResult<(Expr, Vec<glint_ir::ast::CallSlot>)> {
        let (expr, slots) = arg.resolve()?;
        let ok = match access {
            RefAccess::Write => expr.is_assignable(),
            RefAccess::Read => expr.is_reference(),
        };
        if !ok {
            return Err(BuildError::reference(format!(
                "{} cannot be passed by reference",
                expr
            )));
        }
        if let Some(root) = expr.root_symbol() {
            if access == RefAccess::Write && self.readonly.contains(&root.id) {
                return Err(BuildError::reference(format!("{} is read-only", root.name)));
            }
        }
        if self.target() != Target::WebGPU {
            return Ok((expr, slots));
        }
        let own = expr.address_space();
        let space = match (space, own) {
            (Some(wanted), Some(own)) if wanted == own => wanted,
            (None, Some(own)) => own,
            _ => {
                return Err(BuildError::reference(format!(
                    "{} is not in the {} address space",
                    expr,
                    space.map_or("required", AddressSpace::name)
                )))
            }
        };
        if expr.contains_swizzle() {
            return Err(BuildError::reference(format!(
                "cannot take the address of swizzle {}",
                expr
            )));
        }
        let ty = Type::pointer(expr.ty(), space);
        Ok((
            Expr::AddressOf {
                inner: Box::new(expr),
                ty,
            },
            slots,
        ))
    }

    fn call_user(&mut self, sig: &FunctionSig, args: Vec<Exp>) -> BuildResult<Exp> {
        let mut typed = Vec::with_capacity(args.len());
        let mut out_mask = 0u32;
        for (i, (arg, (ty, by_ref))) in args.into_iter().zip(&sig.params).enumerate() {
            let (expr, slots) = if *by_ref {
                out_mask |= 1 << i;
                self.pass_by_ref(arg, RefAccess::Write, Some(AddressSpace::Function))?
            } else {
                arg.resolve_as(ty)?
            };
            self.consume(slots);
            typed.push(expr);
        }
        let call = Expr::Call {
            func: sig.emitted.clone(),
            args: typed,
            ty: sig.ret.clone(),
            out_mask,
        };
        self.emit_call(call)
    }

    fn call_builtin(&mut self, name: &str, args: Vec<Exp>) -> BuildResult<Exp> {
        let registry = self.registry.clone();
        let def = registry
            .get(name)
            .ok_or_else(|| BuildError::reference(format!("{} is not a function", name)))?;
        self.require_stage(name, def.stages)?;
        if def.candidates(self.target()).next().is_none() {
            return Err(BuildError::unsupported(name, self.target()));
        }
        let overload = def
            .resolve(self.target(), &args)
            .ok_or_else(|| self.no_overload(name, &args))?;

        let mut typed = Vec::with_capacity(args.len());
        let mut out_mask = 0u32;
        for (i, (arg, param)) in args.into_iter().zip(&overload.params).enumerate() {
            let (expr, slots) = match (param.by_ref, &param.kind) {
                (Some(access), _) => {
                    if access == RefAccess::Write {
                        out_mask |= 1 << i;
                    }
                    self.pass_by_ref(arg, access, None)?
                }
                (None, ParamKind::Exact(ty)) => arg.resolve_as(ty)?,
                (None, _) => arg.resolve()?,
            };
            self.consume(slots);
            typed.push(expr);
        }
        let call = lower(self, overload, typed, out_mask)?;
        if def.side_effects {
            self.emit_call(call)
        } else {
            Ok(Exp::node(call))
        }
    }

    /// Record a call as a statement. A value-returning call is tagged with a
    /// slot so it can be moved into the expression that consumes it.
    fn emit_call(&mut self, call: Expr) -> BuildResult<Exp> {
        if call.ty().is_void() {
            self.push_stmt(Stmt::Call { slot: None, call })?;
            return Ok(Exp::node(Expr::Construct {
                ty: Type::void(),
                args: Vec::new(),
            }));
        }
        let slot = self.fresh_slot();
        self.push_stmt(Stmt::Call {
            slot: Some(slot),
            call: call.clone(),
        })?;
        Ok(Exp::with_slots(call, Vec::from([slot])))
    }
}
