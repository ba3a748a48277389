//! The user-facing expression handle.

use alloc::{
    boxed::Box,
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::fmt;

use glint_ir::{
    ast::{CallSlot, Expr, Literal, Member},
    ScalarKind, Type, TypeDesc,
};

use crate::{
    error::{BuildError, BuildResult},
    literal::LiteralValue,
};

/// A value in the shader.
///
/// Handles are either typed expression trees or bare host literals whose
/// type is decided by the context they are used in. Handles also remember
/// which side-effecting calls they contain so those calls can be moved
/// inline once the value is consumed.
#[derive(Debug, Clone)]
pub struct Exp {
    pub(crate) repr: Repr,
    pub(crate) slots: Vec<CallSlot>,
}

#[derive(Debug, Clone)]
pub(crate) enum Repr {
    Node(Expr),
    Bare(LiteralValue),
}

impl Exp {
    pub(crate) fn node(expr: Expr) -> Self {
        Exp {
            repr: Repr::Node(expr),
            slots: Vec::new(),
        }
    }

    pub(crate) fn with_slots(expr: Expr, slots: Vec<CallSlot>) -> Self {
        Exp {
            repr: Repr::Node(expr),
            slots,
        }
    }

    /// The value's type, or `None` for a literal that has not been typed yet.
    pub fn ty(&self) -> Option<Type> {
        match &self.repr {
            Repr::Node(expr) => Some(expr.ty()),
            Repr::Bare(_) => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.repr, Repr::Bare(_))
    }

    pub fn expr(&self) -> Option<&Expr> {
        match &self.repr {
            Repr::Node(expr) => Some(expr),
            Repr::Bare(_) => None,
        }
    }

    pub(crate) fn literal(&self) -> Option<LiteralValue> {
        match self.repr {
            Repr::Bare(value) => Some(value),
            Repr::Node(_) => None,
        }
    }

    /// Type the value without outside constraints.
    pub(crate) fn resolve(self) -> BuildResult<(Expr, Vec<CallSlot>)> {
        match self.repr {
            Repr::Node(expr) => Ok((expr, self.slots)),
            Repr::Bare(value) => Ok((Expr::Literal(value.natural()?), self.slots)),
        }
    }

    /// Type the value as `ty`. Literals are classified as the scalar kind of
    /// a scalar `ty`; typed values must already be compatible.
    pub(crate) fn resolve_as(self, ty: &Type) -> BuildResult<(Expr, Vec<CallSlot>)> {
        match self.repr {
            Repr::Bare(value) => match ty.as_primitive() {
                Some(prim) if prim.is_scalar() => {
                    Ok((Expr::Literal(value.classify_as(prim.scalar)?), self.slots))
                }
                _ => Err(BuildError::type_cast(value.to_string(), ty.to_string())),
            },
            Repr::Node(expr) => {
                if glint_ir::is_compatible(&expr.ty(), ty) {
                    Ok((expr, self.slots))
                } else {
                    Err(BuildError::type_cast(
                        format!("{}: {}", expr, expr.ty()),
                        ty.to_string(),
                    ))
                }
            }
        }
    }

    /// Type the value as a scalar of `kind`, leaving vectors and other
    /// typed values untouched.
    pub(crate) fn resolve_kind(self, kind: ScalarKind) -> BuildResult<(Expr, Vec<CallSlot>)> {
        match self.repr {
            Repr::Bare(value) => Ok((Expr::Literal(value.classify_as(kind)?), self.slots)),
            Repr::Node(expr) => Ok((expr, self.slots)),
        }
    }

    fn typed(&self, op: &str) -> BuildResult<&Expr> {
        match &self.repr {
            Repr::Node(expr) => Ok(expr),
            Repr::Bare(value) => Err(BuildError::param_value(
                op,
                format!("literal {} has no members", value),
            )),
        }
    }

    /// Access a struct member.
    pub fn field(&self, name: &str) -> BuildResult<Exp> {
        let base = self.typed("field")?;
        let base_ty = base.ty();
        let s = base_ty.as_struct().ok_or_else(|| {
            BuildError::param_value("field", format!("{} of type {} is not a struct", base, base_ty))
        })?;
        let member = s.member(name).ok_or_else(|| {
            BuildError::param_value("field", format!("struct {} has no member {}", s.name, name))
        })?;
        Ok(Exp::with_slots(
            Expr::Member {
                base: Box::new(base.clone()),
                member: Member::Field(name.to_string()),
                ty: member.ty.clone(),
            },
            self.slots.clone(),
        ))
    }

    /// Select vector components, e.g. `xy` or `bgra`.
    pub fn swizzle(&self, letters: &str) -> BuildResult<Exp> {
        let base = self.typed("swizzle")?;
        let base_ty = base.ty();
        let prim = base_ty
            .as_primitive()
            .filter(|p| p.is_vector())
            .ok_or_else(|| {
                BuildError::param_value("swizzle", format!("{} of type {} is not a vector", base, base_ty))
            })?;
        let len = letters.len();
        if !(1..=4).contains(&len) {
            return Err(BuildError::param_value(
                "swizzle",
                format!("`{}` must select one to four components", letters),
            ));
        }
        let index = |set: &str| -> Option<Vec<usize>> {
            letters.chars().map(|c| set.find(c)).collect()
        };
        let picks = index("xyzw")
            .or_else(|| index("rgba"))
            .ok_or_else(|| {
                BuildError::param_value("swizzle", format!("`{}` mixes or misspells component sets", letters))
            })?;
        if picks.iter().any(|&i| i as u8 >= prim.rows) {
            return Err(BuildError::param_value(
                "swizzle",
                format!("`{}` reaches past the {} components of {}", letters, prim.rows, base_ty),
            ));
        }
        let ty = if len == 1 {
            Type::scalar(prim.scalar)
        } else {
            Type::vec(prim.scalar, len as u8)
        };
        Ok(Exp::with_slots(
            Expr::Member {
                base: Box::new(base.clone()),
                member: Member::Swizzle(letters.to_string()),
                ty,
            },
            self.slots.clone(),
        ))
    }

    /// Index an array, a matrix column or a vector component.
    pub fn at(&self, index: impl Into<Exp>) -> BuildResult<Exp> {
        let base = self.typed("at")?;
        let base_ty = base.ty();
        let (element, len) = match base_ty.desc() {
            TypeDesc::Array(arr) => (arr.element.clone(), arr.len),
            TypeDesc::Primitive(p) if p.is_matrix() => {
                (Type::primitive(p.column())?, p.cols as u32)
            }
            TypeDesc::Primitive(p) if p.is_vector() => (Type::scalar(p.scalar), p.rows as u32),
            _ => {
                return Err(BuildError::param_value(
                    "at",
                    format!("{} of type {} cannot be indexed", base, base_ty),
                ))
            }
        };

        let index = index.into();
        let mut slots = self.slots.clone();
        let (index, index_slots) = match index.literal() {
            Some(value) => index.resolve_kind(match value.natural_kind()? {
                ScalarKind::U32 => ScalarKind::U32,
                _ => ScalarKind::I32,
            })?,
            None => index.resolve()?,
        };
        slots.extend(index_slots);
        let index_ty = index.ty();
        if !index_ty.scalar_kind().is_some_and(|k| k.is_integer()) || !index_ty.is_scalar() {
            return Err(BuildError::type_cast(
                format!("{}: {}", index, index_ty),
                "integer index",
            ));
        }
        let constant = match index {
            Expr::Literal(Literal::I32(i)) => Some(i as i64),
            Expr::Literal(Literal::U32(i)) => Some(i as i64),
            _ => None,
        };
        if let Some(i) = constant {
            if i < 0 || (len > 0 && i >= len as i64) {
                return Err(BuildError::param_value(
                    "at",
                    format!("index {} is out of bounds for {}", i, base_ty),
                ));
            }
        }
        Ok(Exp::with_slots(
            Expr::Index {
                base: Box::new(base.clone()),
                index: Box::new(index),
                ty: element,
            },
            slots,
        ))
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Node(expr) => write!(f, "{}", expr),
            Repr::Bare(value) => write!(f, "{}", value),
        }
    }
}

/// Render an argument list for error messages.
pub(crate) fn render_args(args: &[Exp]) -> String {
    let mut out = String::new();
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&a.to_string());
    }
    out
}

/// Render the argument types of a call for error messages.
pub(crate) fn render_arg_types(args: &[Exp]) -> String {
    let mut out = String::new();
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match a.ty() {
            Some(ty) => out.push_str(&ty.to_string()),
            None => out.push_str("literal"),
        }
    }
    out
}

impl From<&Exp> for Exp {
    fn from(exp: &Exp) -> Self {
        exp.clone()
    }
}

impl From<LiteralValue> for Exp {
    fn from(value: LiteralValue) -> Self {
        Exp {
            repr: Repr::Bare(value),
            slots: Vec::new(),
        }
    }
}

macro_rules! from_host {
    ($($t:ty),*) => {
        $(impl From<$t> for Exp {
            fn from(v: $t) -> Self {
                Exp::from(LiteralValue::from(v))
            }
        })*
    };
}

from_host!(bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

/// Build an argument array from a mix of handles and host literals.
///
/// ```ignore
/// ctx.call("clamp", args![x, 0.0, 1.0])?;
/// ```
#[macro_export]
macro_rules! args {
    ($($e:expr),* $(,)?) => {
        [$($crate::Exp::from($e)),*]
    };
}
