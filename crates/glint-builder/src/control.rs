//! Structured control flow.

use alloc::{format, string::ToString, vec};

use glint_ir::{
    ast::{Block, Expr, Stmt, VarKind},
    ScalarKind, ShaderStage, Target, Type,
};

use crate::{
    ctx::ShaderCtx,
    error::{BuildError, BuildResult},
    exp::Exp,
    scope::{FrameKind, Symbol},
};

/// Continuation of an `if` statement for adding `else if` and `else`
/// branches.
#[derive(Debug, Clone, Copy)]
pub struct IfChain {
    depth: usize,
}

impl IfChain {
    pub fn else_if(
        self,
        ctx: &mut ShaderCtx,
        cond: impl Into<Exp>,
        body: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<IfChain> {
        let (cond, slots) = ctx.condition(cond.into())?;
        let block = ctx.nested(FrameKind::If, body)?;
        self.extend(ctx, &slots, |branches, _| branches.push((cond, block)))?;
        Ok(self)
    }

    pub fn else_(
        self,
        ctx: &mut ShaderCtx,
        body: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<()> {
        let block = ctx.nested(FrameKind::If, body)?;
        self.extend(ctx, &[], |_, otherwise| *otherwise = Some(block))
    }

    /// Find the `if` this chain continues. Only the call statements hoisted
    /// out of the new condition may follow it.
    fn extend(
        self,
        ctx: &mut ShaderCtx,
        cond_slots: &[glint_ir::ast::CallSlot],
        add: impl FnOnce(&mut alloc::vec::Vec<(Expr, Block)>, &mut Option<Block>),
    ) -> BuildResult<()> {
        if ctx.scopes.depth() != self.depth {
            return Err(BuildError::scope("else branch added from a different scope"));
        }
        let stmts = &mut ctx.scopes.current_mut().stmts;
        let position = stmts.iter().rposition(|stmt| match stmt {
            Stmt::Call {
                slot: Some(slot), ..
            } => !cond_slots.contains(slot),
            _ => true,
        });
        match position.map(|i| &mut stmts[i]) {
            Some(Stmt::If {
                branches,
                otherwise: otherwise @ None,
            }) => {
                add(branches, otherwise);
                Ok(())
            }
            Some(Stmt::If { .. }) => Err(BuildError::scope("if statement already has an else branch")),
            _ => Err(BuildError::scope("else branch without a preceding if")),
        }
    }
}

impl ShaderCtx {
    fn condition(&mut self, cond: Exp) -> BuildResult<(Expr, alloc::vec::Vec<glint_ir::ast::CallSlot>)> {
        let (cond, slots) = cond.resolve_kind(ScalarKind::Bool)?;
        if cond.ty() != Type::bool() {
            return Err(BuildError::type_cast(
                format!("{}: {}", cond, cond.ty()),
                "bool",
            ));
        }
        self.consume(slots.clone());
        Ok((cond, slots))
    }

    /// Run `body` in a fresh frame and collect its statements. The frame is
    /// popped even if `body` fails.
    pub(crate) fn nested(
        &mut self,
        kind: FrameKind,
        body: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<Block> {
        self.require_function("control flow")?;
        self.scopes.push(kind);
        let result = body(self);
        let frame = self.scopes.pop(kind)?;
        result?;
        Ok(Block::new(frame.stmts))
    }

    pub fn if_(
        &mut self,
        cond: impl Into<Exp>,
        body: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<IfChain> {
        self.require_function("if")?;
        let (cond, _) = self.condition(cond.into())?;
        let block = self.nested(FrameKind::If, body)?;
        self.push_stmt(Stmt::If {
            branches: vec![(cond, block)],
            otherwise: None,
        })?;
        Ok(IfChain {
            depth: self.scopes.depth(),
        })
    }

    /// Counted loop over `start..end`. The loop variable is read-only inside
    /// the body.
    pub fn for_range(
        &mut self,
        name: &str,
        start: impl Into<Exp>,
        end: impl Into<Exp>,
        body: impl FnOnce(&mut ShaderCtx, Exp) -> BuildResult<()>,
    ) -> BuildResult<()> {
        self.require_function("for")?;
        self.check_name(name)?;
        let (start, end) = (start.into(), end.into());
        let kind = match (start.ty(), end.ty()) {
            (Some(ty), _) | (None, Some(ty)) => ty.scalar_kind().unwrap_or(ScalarKind::I32),
            (None, None) => ScalarKind::I32,
        };
        let (start, ss) = start.resolve_kind(kind)?;
        let (end, es) = end.resolve_kind(kind)?;
        let ty = start.ty();
        if ty != end.ty() || !ty.is_scalar() || !ty.scalar_kind().is_some_and(ScalarKind::is_integer) {
            return Err(BuildError::type_cast(
                format!("{}..{}", start, end),
                "an i32 or u32 range",
            ));
        }
        if self.target() == Target::WebGL1 && !(start.is_const_exp() && end.is_const_exp()) {
            return Err(BuildError::unsupported(
                "loop bounds that are not constant expressions",
                self.target(),
            ));
        }
        self.consume(ss);
        self.consume(es);

        let var = self.var_ref(name, ty, VarKind::Local);
        self.readonly.insert(var.id);
        self.scopes.push(FrameKind::For);
        let result = self
            .scopes
            .declare(name, Symbol::new(var.clone()))
            .and_then(|_| body(self, Exp::node(Expr::Var(var.clone()))));
        let frame = self.scopes.pop(FrameKind::For)?;
        result?;
        self.push_stmt(Stmt::For {
            var,
            start,
            end,
            body: Block::new(frame.stmts),
        })
    }

    pub fn while_(
        &mut self,
        cond: impl Into<Exp>,
        body: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> BuildResult<()> {
        self.require_function("while")?;
        let (cond, _) = self.condition(cond.into())?;
        let body = self.nested(FrameKind::While, body)?;
        self.push_stmt(Stmt::While { cond, body })
    }

    /// Loop that tests `cond` after each pass. The condition is built after
    /// the body, outside the body's scope.
    pub fn do_while(
        &mut self,
        body: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
        cond: impl FnOnce(&mut ShaderCtx) -> BuildResult<Exp>,
    ) -> BuildResult<()> {
        self.require_function("do-while")?;
        let body = self.nested(FrameKind::DoWhile, body)?;
        let cond = cond(self)?;
        let (cond, _) = self.condition(cond)?;
        self.push_stmt(Stmt::DoWhile { body, cond })
    }

    /// A bare block with its own scope.
    pub fn scope(&mut self, body: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>) -> BuildResult<()> {
        let block = self.nested(FrameKind::Naked, body)?;
        self.push_stmt(Stmt::Scope(block))
    }

    /// Return `value` from the current function. The first return fixes the
    /// function's result type; later ones must agree.
    pub fn ret(&mut self, value: impl Into<Exp>) -> BuildResult<()> {
        self.require_function("return")?;
        if self.in_main {
            return Err(BuildError::scope("main cannot return a value"));
        }
        let value = value.into();
        let declared = self
            .scopes
            .function_frame_mut()
            .ok_or_else(|| BuildError::internal("return outside a function frame"))?
            .ret
            .clone();
        let (value, slots) = match &declared {
            Some(ty) if ty.is_void() => {
                return Err(BuildError::scope(
                    "function returns a value after returning nothing",
                ))
            }
            Some(ty) => value.resolve_as(ty)?,
            None => value.resolve()?,
        };
        let ty = value.ty();
        if ty.is_void() {
            return Err(BuildError::type_cast(value.to_string(), "a returnable value"));
        }
        self.check_type(&ty)?;
        self.consume(slots);
        if let Some(frame) = self.scopes.function_frame_mut() {
            frame.ret = Some(ty);
        }
        self.push_stmt(Stmt::Return(Some(value)))
    }

    pub fn ret_void(&mut self) -> BuildResult<()> {
        self.require_function("return")?;
        let frame = self
            .scopes
            .function_frame_mut()
            .ok_or_else(|| BuildError::internal("return outside a function frame"))?;
        match &frame.ret {
            Some(ty) if !ty.is_void() => {
                return Err(BuildError::scope(format!(
                    "function returning {} cannot return nothing",
                    ty
                )))
            }
            _ => frame.ret = Some(Type::void()),
        }
        self.push_stmt(Stmt::Return(None))
    }

    pub fn break_(&mut self) -> BuildResult<()> {
        if !self.scopes.in_loop() {
            return Err(BuildError::scope("break outside a loop"));
        }
        self.push_stmt(Stmt::Break)
    }

    pub fn continue_(&mut self) -> BuildResult<()> {
        if !self.scopes.in_loop() {
            return Err(BuildError::scope("continue outside a loop"));
        }
        self.push_stmt(Stmt::Continue)
    }

    pub fn discard(&mut self) -> BuildResult<()> {
        self.require_function("discard")?;
        if self.stage() != ShaderStage::Fragment {
            return Err(BuildError::scope("discard is only allowed in fragment shaders"));
        }
        self.push_stmt(Stmt::Discard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinRegistry;
    use alloc::sync::Arc;
    use glint_ir::LayoutKind;

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

    #[test]
    fn test_if_else_chain() {
        let mut c = ctx(Target::WebGPU, ShaderStage::Fragment);
        let x = c.declare("x", 1.0).unwrap();
        let big = c.gt(&x, 2.0).unwrap();
        let small = c.lt(&x, 0.0).unwrap();
        c.if_(big, |c| c.assign(&x, 2.0))
            .unwrap()
            .else_if(&mut c, small, |c| c.assign(&x, 0.0))
            .unwrap()
            .else_(&mut c, |c| c.discard())
            .unwrap();
        match c.scopes.current_mut().stmts.last() {
            Some(Stmt::If {
                branches,
                otherwise: Some(_),
            }) => assert_eq!(branches.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_loop_variable_is_read_only() {
        let mut c = ctx(Target::WebGL2, ShaderStage::Vertex);
        let err = c
            .for_range("i", 0, 4, |c, i| c.assign(&i, 1))
            .unwrap_err();
        assert!(matches!(err, BuildError::Reference(_)));
        assert_eq!(c.scopes.depth(), 2);
    }

    #[test]
    fn test_webgl1_needs_constant_bounds() {
        let mut c = ctx(Target::WebGL1, ShaderStage::Vertex);
        let n = c.declare("n", 4).unwrap();
        assert!(matches!(
            c.for_range("i", 0, &n, |_, _| Ok(())),
            Err(BuildError::Unsupported { .. })
        ));
        assert!(c.for_range("i", 0, 4, |_, _| Ok(())).is_ok());
    }

    #[test]
    fn test_break_outside_loop() {
        let mut c = ctx(Target::WebGPU, ShaderStage::Compute);
        assert!(matches!(c.break_(), Err(BuildError::ScopeMisuse(_))));
        c.while_(true, |c| c.break_()).unwrap();
    }

    #[test]
    fn test_return_types_agree() {
        let mut c = ctx(Target::WebGPU, ShaderStage::Fragment);
        c.ret(1.0).unwrap();
        assert!(c.ret(true).is_err());
        assert!(c.ret_void().is_err());
    }

    #[test]
    fn test_discard_is_fragment_only() {
        let mut c = ctx(Target::WebGL2, ShaderStage::Vertex);
        assert!(matches!(c.discard(), Err(BuildError::ScopeMisuse(_))));
    }
}
