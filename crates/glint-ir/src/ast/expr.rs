//! Expressions.

use alloc::{boxed::Box, string::String, vec::Vec};
use core::fmt;

use super::{GlobalKind, VarKind, VarRef};
use crate::types::{AddressSpace, Type};

/// Typed literal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    F32(f32),
    I32(i32),
    U32(u32),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Bool(_) => Type::bool(),
            Literal::F32(_) => Type::f32(),
            Literal::I32(_) => Type::i32(),
            Literal::U32(_) => Type::u32(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "{}", v),
            Literal::F32(v) => write!(f, "{:?}", v),
            Literal::I32(v) => write!(f, "{}", v),
            Literal::U32(v) => write!(f, "{}u", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }
}

/// Struct field or vector swizzle access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Field(String),
    Swizzle(String),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Field(s) | Member::Swizzle(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(VarRef),
    Literal(Literal),
    /// Value constructor: `vec3<f32>(a, b, c)`, `Light(color, power)`.
    Construct {
        ty: Type,
        args: Vec<Expr>,
    },
    Member {
        base: Box<Expr>,
        member: Member,
        ty: Type,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        ty: Type,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        ty: Type,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: Type,
    },
    /// Value conversion to another scalar kind of the same shape.
    Cast {
        ty: Type,
        value: Box<Expr>,
    },
    AddressOf {
        inner: Box<Expr>,
        ty: Type,
    },
    Deref {
        inner: Box<Expr>,
        ty: Type,
    },
    /// Call by emitted name. Bit `i` of `out_mask` marks argument `i` as
    /// written through by the callee.
    Call {
        func: String,
        args: Vec<Expr>,
        ty: Type,
        out_mask: u32,
    },
    Select {
        cond: Box<Expr>,
        accept: Box<Expr>,
        reject: Box<Expr>,
        ty: Type,
    },
}

impl Expr {
    pub fn var(var: VarRef) -> Self {
        Expr::Var(var)
    }

    pub fn ty(&self) -> Type {
        match self {
            Expr::Var(v) => v.ty.clone(),
            Expr::Literal(l) => l.ty(),
            Expr::Construct { ty, .. }
            | Expr::Member { ty, .. }
            | Expr::Index { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Cast { ty, .. }
            | Expr::AddressOf { ty, .. }
            | Expr::Deref { ty, .. }
            | Expr::Call { ty, .. }
            | Expr::Select { ty, .. } => ty.clone(),
        }
    }

    /// Check if the expression denotes a memory location.
    pub fn is_reference(&self) -> bool {
        match self {
            Expr::Var(v) => !matches!(
                v.kind,
                VarKind::Global(GlobalKind::Const | GlobalKind::Texture | GlobalKind::Sampler)
            ),
            Expr::Member { base, .. } | Expr::Index { base, .. } => base.is_reference(),
            Expr::Deref { .. } => true,
            _ => false,
        }
    }

    /// Check if the expression can appear on the left of an assignment.
    pub fn is_assignable(&self) -> bool {
        if !self.is_reference() {
            return false;
        }
        if self.has_repeated_swizzle() {
            return false;
        }
        self.root_symbol().is_some_and(|root| root.kind.is_writable())
    }

    fn has_repeated_swizzle(&self) -> bool {
        match self {
            Expr::Member {
                base,
                member: Member::Swizzle(s),
                ..
            } => {
                let bytes = s.as_bytes();
                let repeated = bytes
                    .iter()
                    .enumerate()
                    .any(|(i, c)| bytes[..i].contains(c));
                repeated || base.has_repeated_swizzle()
            }
            Expr::Member { base, .. } | Expr::Index { base, .. } => base.has_repeated_swizzle(),
            _ => false,
        }
    }

    /// Check if the expression is built solely from literals and constants.
    pub fn is_const_exp(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::Var(v) => v.kind == VarKind::Global(GlobalKind::Const),
            Expr::Construct { args, .. } => !args.is_empty() && args.iter().all(Expr::is_const_exp),
            Expr::Member { base, .. } => base.is_const_exp(),
            Expr::Index { base, index, .. } => base.is_const_exp() && index.is_const_exp(),
            Expr::Unary { operand, .. } => operand.is_const_exp(),
            Expr::Binary { lhs, rhs, .. } => lhs.is_const_exp() && rhs.is_const_exp(),
            Expr::Cast { value, .. } => value.is_const_exp(),
            Expr::Select {
                cond,
                accept,
                reject,
                ..
            } => cond.is_const_exp() && accept.is_const_exp() && reject.is_const_exp(),
            Expr::AddressOf { .. } | Expr::Deref { .. } | Expr::Call { .. } => false,
        }
    }

    /// The variable at the root of an access chain.
    pub fn root_symbol(&self) -> Option<&VarRef> {
        match self {
            Expr::Var(v) => Some(v),
            Expr::Member { base, .. } | Expr::Index { base, .. } => base.root_symbol(),
            Expr::AddressOf { inner, .. } | Expr::Deref { inner, .. } => inner.root_symbol(),
            _ => None,
        }
    }

    /// Address space of the referenced memory.
    pub fn address_space(&self) -> Option<AddressSpace> {
        match self {
            Expr::Deref { inner, .. } => inner.ty().as_pointer().map(|p| p.space),
            Expr::Member { base, .. } | Expr::Index { base, .. } => base.address_space(),
            Expr::Var(v) => match v.ty.as_pointer() {
                Some(_) if v.kind == VarKind::RefParam => Some(AddressSpace::Function),
                _ => v.kind.address_space(),
            },
            _ => None,
        }
    }

    /// Check if a swizzle occurs anywhere in the access chain.
    pub fn contains_swizzle(&self) -> bool {
        match self {
            Expr::Member {
                member: Member::Swizzle(_),
                ..
            } => true,
            Expr::Member { base, .. } | Expr::Index { base, .. } => base.contains_swizzle(),
            _ => false,
        }
    }

    /// Visit this expression and every sub-expression in pre-order.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Var(_) | Expr::Literal(_) => {}
            Expr::Construct { args, .. } | Expr::Call { args, .. } => {
                for a in args {
                    a.visit(f);
                }
            }
            Expr::Member { base, .. } => base.visit(f),
            Expr::Index { base, index, .. } => {
                base.visit(f);
                index.visit(f);
            }
            Expr::Unary { operand, .. } => operand.visit(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Cast { value, .. } => value.visit(f),
            Expr::AddressOf { inner, .. } | Expr::Deref { inner, .. } => inner.visit(f),
            Expr::Select {
                cond,
                accept,
                reject,
                ..
            } => {
                cond.visit(f);
                accept.visit(f);
                reject.visit(f);
            }
        }
    }
}

/// Neutral rendering used in diagnostics.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", a)?;
            }
            Ok(())
        }
        match self {
            Expr::Var(v) => match v.kind {
                VarKind::Builtin(b) => write!(f, "builtin.{}", b.name()),
                _ => f.write_str(&v.name),
            },
            Expr::Literal(l) => write!(f, "{}", l),
            Expr::Construct { ty, args } => {
                write!(f, "{}(", ty)?;
                list(f, args)?;
                f.write_str(")")
            }
            Expr::Member { base, member, .. } => write!(f, "{}.{}", base, member.name()),
            Expr::Index { base, index, .. } => write!(f, "{}[{}]", base, index),
            Expr::Unary { op, operand, .. } => write!(f, "{}{}", op.symbol(), operand),
            Expr::Binary { op, lhs, rhs, .. } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Cast { ty, value } => write!(f, "{}({})", ty, value),
            Expr::AddressOf { inner, .. } => write!(f, "&{}", inner),
            Expr::Deref { inner, .. } => write!(f, "*{}", inner),
            Expr::Call { func, args, .. } => {
                write!(f, "{}(", func)?;
                list(f, args)?;
                f.write_str(")")
            }
            Expr::Select {
                cond,
                accept,
                reject,
                ..
            } => write!(f, "({} ? {} : {})", cond, accept, reject),
        }
    }
}
