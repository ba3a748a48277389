//! Scope frames for the program being described.
//!
//! The bottom frame is the module's global scope. Each function body, branch,
//! loop body and naked block pushes a frame that owns its statements and the
//! names declared in it.

use alloc::{collections::BTreeMap, format, string::String, vec::Vec};

use glint_ir::{
    ast::{Expr, Stmt, VarRef},
    Type,
};

use crate::error::{BuildError, BuildResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Global,
    Function,
    If,
    For,
    While,
    DoWhile,
    Naked,
}

impl FrameKind {
    fn is_loop(self) -> bool {
        matches!(self, FrameKind::For | FrameKind::While | FrameKind::DoWhile)
    }
}

/// A declared name.
#[derive(Debug, Clone)]
pub(crate) struct Symbol {
    /// Expression handed out when the name is looked up. Differs from a
    /// plain variable read for by-reference parameters on WGSL.
    pub access: Expr,
}

impl Symbol {
    pub fn new(var: VarRef) -> Self {
        Symbol {
            access: Expr::Var(var),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub kind: FrameKind,
    pub stmts: Vec<Stmt>,
    symbols: BTreeMap<String, Symbol>,
    /// Return type inferred from `ret` statements (function frames only).
    pub ret: Option<Type>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Frame {
            kind,
            stmts: Vec::new(),
            symbols: BTreeMap::new(),
            ret: None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            frames: Vec::from([Frame::new(FrameKind::Global)]),
        }
    }

    pub fn push(&mut self, kind: FrameKind) {
        self.frames.push(Frame::new(kind));
    }

    /// Pop the innermost frame, which must be of `kind`.
    pub fn pop(&mut self, kind: FrameKind) -> BuildResult<Frame> {
        match self.frames.last() {
            Some(frame) if frame.kind == kind && kind != FrameKind::Global => {}
            Some(frame) => {
                return Err(BuildError::internal(format!(
                    "expected to close a {:?} frame, found {:?}",
                    kind, frame.kind
                )))
            }
            None => return Err(BuildError::internal("scope stack is empty")),
        }
        self.frames
            .pop()
            .ok_or_else(|| BuildError::internal("scope stack is empty"))
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        // The global frame is never popped.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn is_global(&self) -> bool {
        self.frames.len() == 1
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frames from the innermost out to the enclosing function frame.
    fn function_frames(&self) -> impl Iterator<Item = &Frame> {
        let start = self
            .frames
            .iter()
            .rposition(|f| f.kind == FrameKind::Function)
            .unwrap_or(self.frames.len());
        self.frames[start..].iter().rev()
    }

    pub fn in_loop(&self) -> bool {
        self.function_frames().any(|f| f.kind.is_loop())
    }

    pub fn function_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames
            .iter_mut()
            .rev()
            .find(|f| f.kind == FrameKind::Function)
    }

    /// Resolve a name against the enclosing function's frames, then the
    /// global frame.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.function_frames()
            .find_map(|f| f.symbols.get(name))
            .or_else(|| self.frames[0].symbols.get(name))
    }

    /// Declare `symbol` in the innermost frame.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> BuildResult<()> {
        let frame = self.current_mut();
        if frame.symbols.contains_key(name) {
            return Err(BuildError::scope(format!(
                "{} is already declared in this scope",
                name
            )));
        }
        frame.symbols.insert(String::from(name), symbol);
        Ok(())
    }

    /// Declare `symbol` in the global frame regardless of the current depth.
    pub fn declare_global(&mut self, name: &str, symbol: Symbol) -> BuildResult<()> {
        let global = &mut self.frames[0];
        if global.symbols.contains_key(name) {
            return Err(BuildError::scope(format!(
                "{} is already declared at global scope",
                name
            )));
        }
        global.symbols.insert(String::from(name), symbol);
        Ok(())
    }

    pub fn push_stmt(&mut self, stmt: Stmt) -> BuildResult<()> {
        if self.is_global() {
            return Err(BuildError::scope(
                "statements can only be added inside a function",
            ));
        }
        self.current_mut().stmts.push(stmt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use glint_ir::ast::{SymbolId, VarKind};

    fn symbol(id: u32, name: &str) -> Symbol {
        Symbol::new(VarRef {
            id: SymbolId(id),
            name: name.to_string(),
            ty: Type::f32(),
            kind: VarKind::Local,
        })
    }

    fn id_of(scopes: &ScopeStack, name: &str) -> Option<SymbolId> {
        match &scopes.lookup(name)?.access {
            Expr::Var(var) => Some(var.id),
            _ => None,
        }
    }

    #[test]
    fn test_lookup_skips_outer_functions() {
        let mut scopes = ScopeStack::new();
        scopes.declare("g", symbol(1, "g")).unwrap();
        scopes.push(FrameKind::Function);
        scopes.declare("a", symbol(2, "a")).unwrap();
        scopes.push(FrameKind::If);
        assert_eq!(id_of(&scopes, "a"), Some(SymbolId(2)));
        assert_eq!(id_of(&scopes, "g"), Some(SymbolId(1)));
        scopes.push(FrameKind::Function);
        assert!(scopes.lookup("a").is_none());
        assert!(scopes.lookup("g").is_some());
    }

    #[test]
    fn test_redeclare_in_same_frame_fails() {
        let mut scopes = ScopeStack::new();
        scopes.push(FrameKind::Function);
        scopes.declare("x", symbol(1, "x")).unwrap();
        assert!(scopes.declare("x", symbol(2, "x")).is_err());
        scopes.push(FrameKind::Naked);
        scopes.declare("x", symbol(3, "x")).unwrap();
        assert_eq!(id_of(&scopes, "x"), Some(SymbolId(3)));
    }

    #[test]
    fn test_loop_detection_stops_at_function() {
        let mut scopes = ScopeStack::new();
        scopes.push(FrameKind::Function);
        assert!(!scopes.in_loop());
        scopes.push(FrameKind::While);
        scopes.push(FrameKind::If);
        assert!(scopes.in_loop());
        assert!(scopes.pop(FrameKind::While).is_err());
        scopes.pop(FrameKind::If).unwrap();
        scopes.pop(FrameKind::While).unwrap();
        assert!(!scopes.in_loop());
    }

    #[test]
    fn test_statements_need_a_function() {
        let mut scopes = ScopeStack::new();
        assert!(scopes.push_stmt(Stmt::Break).is_err());
        scopes.push(FrameKind::Function);
        scopes.push_stmt(Stmt::Break).unwrap();
        assert_eq!(scopes.current_mut().stmts.len(), 1);
    }
}
