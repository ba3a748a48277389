//! Which variables are ever written.
//!
//! Backends use this to pick `const`/`let` over `var`, to decide whether a
//! storage buffer is `read` or `read_write`, and to copy by-value parameters
//! that are assigned in the body.

use alloc::{collections::BTreeSet, vec::Vec};

use crate::ast::{Block, Expr, ShaderModule, Stmt, SymbolId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    written: BTreeSet<SymbolId>,
}

impl WriteSet {
    /// Collect writes across every function of the module. Writes through a
    /// pointer count as writes to the pointed-to variable; pointer aliases
    /// are followed to a fixed point.
    pub fn collect(module: &ShaderModule) -> Self {
        let mut set = WriteSet::default();
        let mut aliases = Vec::new();
        for func in &module.functions {
            set.scan(&func.body, &mut aliases);
        }
        loop {
            let mut changed = false;
            for (pointer, target) in &aliases {
                if set.written.contains(pointer) && set.written.insert(*target) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        log::trace!(
            "write set for {} stage: {} symbols",
            module.stage,
            set.written.len()
        );
        set
    }

    fn scan(&mut self, block: &Block, aliases: &mut Vec<(SymbolId, SymbolId)>) {
        block.visit_stmts(&mut |stmt| match stmt {
            Stmt::Assign { target, .. } => {
                if let Some(root) = target.root_symbol() {
                    self.written.insert(root.id);
                }
            }
            Stmt::For { var, .. } => {
                self.written.insert(var.id);
            }
            Stmt::Declare(decl) => {
                if let Some(Expr::AddressOf { inner, .. }) = &decl.init {
                    if let Some(root) = inner.root_symbol() {
                        aliases.push((decl.var.id, root.id));
                    }
                }
            }
            _ => {}
        });
        block.visit_exprs(&mut |expr| {
            if let Expr::Call { args, out_mask, .. } = expr {
                for (i, arg) in args.iter().enumerate() {
                    if i < 32 && out_mask & (1 << i) != 0 {
                        if let Some(root) = arg.root_symbol() {
                            self.written.insert(root.id);
                        }
                    }
                }
            }
        });
    }

    pub fn is_written(&self, id: SymbolId) -> bool {
        self.written.contains(&id)
    }

    pub fn mark(&mut self, id: SymbolId) {
        self.written.insert(id);
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.written.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{FunctionDef, VarDecl, VarKind, VarRef},
        target::ShaderStage,
        types::{AddressSpace, Type},
    };
    use alloc::{boxed::Box, string::ToString, vec};

    fn var(id: u32, ty: Type) -> VarRef {
        VarRef {
            id: SymbolId(id),
            name: alloc::format!("v{}", id),
            ty,
            kind: VarKind::Local,
        }
    }

    fn module(body: Vec<Stmt>) -> ShaderModule {
        let mut m = ShaderModule::new(ShaderStage::Fragment);
        m.functions.push(FunctionDef {
            name: "main".to_string(),
            params: vec![],
            ret: Type::void(),
            body: Block::new(body),
            entry: true,
        });
        m
    }

    #[test]
    fn test_pointer_alias_chain() {
        let x = var(0, Type::f32());
        let ptr_ty = Type::pointer(Type::f32(), AddressSpace::Function);
        let p1 = var(1, ptr_ty.clone());
        let p2 = var(2, ptr_ty.clone());
        let body = vec![
            Stmt::Declare(VarDecl {
                var: x.clone(),
                init: None,
                constant: false,
            }),
            Stmt::Declare(VarDecl {
                var: p1.clone(),
                init: Some(Expr::AddressOf {
                    inner: Box::new(Expr::Var(x.clone())),
                    ty: ptr_ty.clone(),
                }),
                constant: false,
            }),
            Stmt::Declare(VarDecl {
                var: p2.clone(),
                init: Some(Expr::AddressOf {
                    inner: Box::new(Expr::Deref {
                        inner: Box::new(Expr::Var(p1.clone())),
                        ty: Type::f32(),
                    }),
                    ty: ptr_ty,
                }),
                constant: false,
            }),
            Stmt::Assign {
                target: Expr::Deref {
                    inner: Box::new(Expr::Var(p2.clone())),
                    ty: Type::f32(),
                },
                value: Expr::Literal(crate::ast::Literal::F32(1.0)),
            },
        ];
        let writes = WriteSet::collect(&module(body));
        assert!(writes.is_written(x.id));
        assert!(writes.is_written(p1.id));
        assert!(writes.is_written(p2.id));
    }

    #[test]
    fn test_out_arguments_are_writes() {
        let a = var(0, Type::f32());
        let b = var(1, Type::f32());
        let call = Expr::Call {
            func: "update".to_string(),
            args: vec![Expr::Var(a.clone()), Expr::Var(b.clone())],
            ty: Type::void(),
            out_mask: 0b10,
        };
        let writes = WriteSet::collect(&module(vec![Stmt::Call { slot: None, call }]));
        assert!(!writes.is_written(a.id));
        assert!(writes.is_written(b.id));
    }
}
