//! Statements and blocks.

use alloc::vec::Vec;

use super::{CallSlot, Expr, VarRef};

/// Local variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub var: VarRef,
    pub init: Option<Expr>,
    /// Declared through the constant API; must never be written.
    pub constant: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Declare(VarDecl),
    Assign {
        target: Expr,
        value: Expr,
    },
    /// A call evaluated for its side effects. Calls carrying a slot are
    /// dropped when their value is consumed by another expression.
    Call {
        slot: Option<CallSlot>,
        call: Expr,
    },
    If {
        branches: Vec<(Expr, Block)>,
        otherwise: Option<Block>,
    },
    /// Counting loop `for (var = start; var < end; var++)`.
    For {
        var: VarRef,
        start: Expr,
        end: Expr,
        body: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    DoWhile {
        body: Block,
        cond: Expr,
    },
    Scope(Block),
    Return(Option<Expr>),
    Break,
    Continue,
    Discard,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Check if control cannot fall off the end of the block.
    pub fn ends_in_return(&self) -> bool {
        matches!(self.stmts.last(), Some(Stmt::Return(_)))
    }

    /// Visit every statement, descending into nested blocks.
    pub fn visit_stmts(&self, f: &mut impl FnMut(&Stmt)) {
        for stmt in &self.stmts {
            f(stmt);
            match stmt {
                Stmt::If {
                    branches,
                    otherwise,
                } => {
                    for (_, block) in branches {
                        block.visit_stmts(f);
                    }
                    if let Some(block) = otherwise {
                        block.visit_stmts(f);
                    }
                }
                Stmt::For { body, .. }
                | Stmt::While { body, .. }
                | Stmt::DoWhile { body, .. }
                | Stmt::Scope(body) => body.visit_stmts(f),
                _ => {}
            }
        }
    }

    /// Visit every top-level expression of every statement.
    pub fn visit_exprs(&self, f: &mut impl FnMut(&Expr)) {
        self.visit_stmts(&mut |stmt| match stmt {
            Stmt::Declare(decl) => {
                if let Some(init) = &decl.init {
                    init.visit(f);
                }
            }
            Stmt::Assign { target, value } => {
                target.visit(f);
                value.visit(f);
            }
            Stmt::Call { call, .. } => call.visit(f),
            Stmt::If { branches, .. } => {
                for (cond, _) in branches {
                    cond.visit(f);
                }
            }
            Stmt::For { start, end, .. } => {
                start.visit(f);
                end.visit(f);
            }
            Stmt::While { cond, .. } | Stmt::DoWhile { cond, .. } => cond.visit(f),
            Stmt::Return(Some(value)) => value.visit(f),
            _ => {}
        });
    }

    /// Remove call statements whose slot satisfies `consumed`.
    pub fn retain_calls(&mut self, consumed: &impl Fn(CallSlot) -> bool) {
        self.stmts.retain(|stmt| match stmt {
            Stmt::Call {
                slot: Some(slot), ..
            } => !consumed(*slot),
            _ => true,
        });
        for stmt in &mut self.stmts {
            match stmt {
                Stmt::If {
                    branches,
                    otherwise,
                } => {
                    for (_, block) in branches.iter_mut() {
                        block.retain_calls(consumed);
                    }
                    if let Some(block) = otherwise {
                        block.retain_calls(consumed);
                    }
                }
                Stmt::For { body, .. }
                | Stmt::While { body, .. }
                | Stmt::DoWhile { body, .. }
                | Stmt::Scope(body) => body.retain_calls(consumed),
                _ => {}
            }
        }
    }
}
