//! Typed shader AST.
//!
//! The builder produces one [`ShaderModule`] per stage. Expressions carry
//! their result type; variables are referenced through [`VarRef`]s that carry
//! a stage-unique [`SymbolId`].

mod builtin;
mod expr;
mod module;
mod stmt;

pub use builtin::{BuiltinVar, VertexSemantic};
pub use expr::{BinaryOp, Expr, Literal, Member, UnaryOp};
pub use module::{FunctionDef, GlobalDecl, GlobalKind, IoVar, ParamDecl, ShaderModule};
pub use stmt::{Block, Stmt, VarDecl};

use alloc::string::String;

use crate::types::{AddressSpace, Type};

/// Stage-unique identity of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Identity of a call whose result may be consumed by another expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSlot(pub u32);

/// How a variable was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Local,
    Param,
    /// Parameter passed by reference (`inout` in GLSL, `ptr<function, T>` in WGSL).
    RefParam,
    Global(GlobalKind),
    /// Vertex attribute or fragment varying.
    Input,
    /// Vertex varying or fragment color output.
    Output,
    Builtin(BuiltinVar),
}

impl VarKind {
    /// Address space of the storage backing the variable. Pipeline inputs and
    /// outputs have none.
    pub fn address_space(self) -> Option<AddressSpace> {
        match self {
            VarKind::Local | VarKind::Param | VarKind::RefParam => Some(AddressSpace::Function),
            VarKind::Global(kind) => kind.address_space(),
            VarKind::Input | VarKind::Output | VarKind::Builtin(_) => None,
        }
    }

    /// Check if writes through this variable are permitted.
    pub fn is_writable(self) -> bool {
        match self {
            VarKind::Local | VarKind::Param | VarKind::RefParam | VarKind::Output => true,
            VarKind::Global(kind) => kind.is_writable(),
            VarKind::Input => false,
            VarKind::Builtin(b) => b.is_output(),
        }
    }
}

/// Reference to a declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    pub id: SymbolId,
    pub name: String,
    pub ty: Type,
    pub kind: VarKind,
}
