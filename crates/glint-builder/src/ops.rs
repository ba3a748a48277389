//! Operators, conversions and constructors on expression handles.

use alloc::{boxed::Box, format, string::ToString, vec::Vec};

use glint_ir::{
    ast::{BinaryOp, CallSlot, Expr, UnaryOp},
    ScalarKind, Target, Type, TypeDesc,
};

use crate::{
    ctx::ShaderCtx,
    error::{BuildError, BuildResult},
    exp::{render_arg_types, Exp},
    literal::LiteralValue,
};

type Typed = (Expr, Vec<CallSlot>);

fn no_overload(function: &str, args: &[Exp], call: impl Into<alloc::string::String>) -> BuildError {
    BuildError::NoOverload {
        function: function.to_string(),
        args: render_arg_types(args),
        call: call.into(),
    }
}

/// Scalar kind two bare literals share.
fn shared_kind(a: LiteralValue, b: LiteralValue) -> BuildResult<ScalarKind> {
    let (ka, kb) = (a.natural_kind()?, b.natural_kind()?);
    Ok(match (ka, kb) {
        _ if ka == kb => ka,
        (ScalarKind::Bool, _) | (_, ScalarKind::Bool) => {
            return Err(BuildError::type_cast(b.to_string(), ka.name(false)))
        }
        (ScalarKind::F32, _) | (_, ScalarKind::F32) => ScalarKind::F32,
        _ => ScalarKind::U32,
    })
}

/// Type two operands against each other; a bare literal adopts the scalar
/// kind of the typed operand.
fn unify(a: Exp, b: Exp) -> BuildResult<(Typed, Typed)> {
    match (a.literal(), b.literal(), a.ty(), b.ty()) {
        (Some(x), Some(y), _, _) => {
            let kind = shared_kind(x, y)?;
            Ok((a.resolve_kind(kind)?, b.resolve_kind(kind)?))
        }
        (Some(_), None, _, Some(ty)) => {
            let b = b.resolve()?;
            let a = match ty.scalar_kind() {
                Some(kind) => a.resolve_kind(kind)?,
                None => a.resolve()?,
            };
            Ok((a, b))
        }
        (None, Some(_), Some(ty), _) => {
            let a = a.resolve()?;
            let b = match ty.scalar_kind() {
                Some(kind) => b.resolve_kind(kind)?,
                None => b.resolve()?,
            };
            Ok((a, b))
        }
        _ => Ok((a.resolve()?, b.resolve()?)),
    }
}

fn merged(mut a: Vec<CallSlot>, b: Vec<CallSlot>) -> Vec<CallSlot> {
    a.extend(b);
    a
}

/// Result type of an arithmetic operator, or `None` if the operand types do
/// not combine.
fn arith_type(op: BinaryOp, a: &Type, b: &Type) -> Option<Type> {
    let (pa, pb) = (a.as_primitive()?, b.as_primitive()?);
    if pa.scalar != pb.scalar || !pa.scalar.is_numeric() {
        return None;
    }
    if op == BinaryOp::Mul {
        match (pa.is_matrix(), pb.is_matrix()) {
            (true, true) if pa.cols == pb.rows => return Some(Type::mat(pb.cols, pa.rows)),
            (true, false) if pb.is_vector() && pa.cols == pb.rows => {
                return Some(Type::vec(pa.scalar, pa.rows))
            }
            (false, true) if pa.is_vector() && pa.rows == pb.rows => {
                return Some(Type::vec(pa.scalar, pb.cols))
            }
            (true, false) if pb.is_scalar() => return Some(a.clone()),
            (false, true) if pa.is_scalar() => return Some(b.clone()),
            _ => {}
        }
    }
    if pa.is_matrix() || pb.is_matrix() {
        return match op {
            BinaryOp::Add | BinaryOp::Sub if a == b => Some(a.clone()),
            _ => None,
        };
    }
    if a == b {
        Some(a.clone())
    } else if pa.is_scalar() && pb.is_vector() {
        Some(b.clone())
    } else if pa.is_vector() && pb.is_scalar() {
        Some(a.clone())
    } else {
        None
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: Type) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        ty,
    }
}

impl ShaderCtx {
    fn arith(&self, op: BinaryOp, a: Exp, b: Exp) -> BuildResult<Exp> {
        let call = format!("{} {} {}", a, op.symbol(), b);
        let originals = [a.clone(), b.clone()];
        let ((lhs, ls), (rhs, rs)) = unify(a, b)?;
        let ty = arith_type(op, &lhs.ty(), &rhs.ty())
            .ok_or_else(|| no_overload(op.symbol(), &originals, call))?;
        self.check_type(&ty)?;
        Ok(Exp::with_slots(binary(op, lhs, rhs, ty), merged(ls, rs)))
    }

    pub fn add(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.arith(BinaryOp::Add, a.into(), b.into())
    }

    pub fn sub(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.arith(BinaryOp::Sub, a.into(), b.into())
    }

    /// Multiply, including the linear-algebra products of matrices and
    /// vectors.
    pub fn mul(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.arith(BinaryOp::Mul, a.into(), b.into())
    }

    pub fn div(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.arith(BinaryOp::Div, a.into(), b.into())
    }

    /// Remainder, spelled per target by the `mod` builtin.
    pub fn modulo(&mut self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.call("mod", [a.into(), b.into()])
    }

    pub fn neg(&self, value: impl Into<Exp>) -> BuildResult<Exp> {
        let value = value.into();
        match value.literal() {
            Some(LiteralValue::Number(n)) => return Ok(Exp::from(LiteralValue::Number(-n))),
            Some(LiteralValue::Float(n)) => return Ok(Exp::from(LiteralValue::Float(-n))),
            _ => {}
        }
        let call = format!("-{}", value);
        let (operand, slots) = value.clone().resolve()?;
        let ty = operand.ty();
        let ok = ty
            .as_primitive()
            .is_some_and(|p| !p.is_matrix() && (p.scalar.is_float() || p.scalar.is_signed_int()));
        if !ok {
            return Err(no_overload("-", &[value], call));
        }
        Ok(Exp::with_slots(
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
                ty,
            },
            slots,
        ))
    }

    /// Logical negation of a scalar bool. Use the `not` builtin for vectors.
    pub fn not(&self, value: impl Into<Exp>) -> BuildResult<Exp> {
        let value = value.into();
        if let Some(LiteralValue::Bool(b)) = value.literal() {
            return Ok(Exp::from(!b));
        }
        let call = format!("!{}", value);
        let (operand, slots) = value.clone().resolve()?;
        if operand.ty() != Type::bool() {
            return Err(no_overload("!", &[value], call));
        }
        Ok(Exp::with_slots(
            Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                ty: Type::bool(),
            },
            slots,
        ))
    }

    fn logical(&self, op: BinaryOp, a: Exp, b: Exp) -> BuildResult<Exp> {
        let call = format!("{} {} {}", a, op.symbol(), b);
        let originals = [a.clone(), b.clone()];
        let (lhs, ls) = a.resolve_kind(ScalarKind::Bool)?;
        let (rhs, rs) = b.resolve_kind(ScalarKind::Bool)?;
        if lhs.ty() != Type::bool() || rhs.ty() != Type::bool() {
            return Err(no_overload(op.symbol(), &originals, call));
        }
        Ok(Exp::with_slots(
            binary(op, lhs, rhs, Type::bool()),
            merged(ls, rs),
        ))
    }

    pub fn and(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.logical(BinaryOp::And, a.into(), b.into())
    }

    pub fn or(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.logical(BinaryOp::Or, a.into(), b.into())
    }

    fn require_bit_ops(&self) -> BuildResult<()> {
        if self.target() == Target::WebGL1 {
            return Err(BuildError::unsupported("bitwise operators", self.target()));
        }
        Ok(())
    }

    fn bitwise(&self, op: BinaryOp, a: Exp, b: Exp) -> BuildResult<Exp> {
        self.require_bit_ops()?;
        let call = format!("{} {} {}", a, op.symbol(), b);
        let originals = [a.clone(), b.clone()];
        let ((lhs, ls), (rhs, rs)) = unify(a, b)?;
        let ty = lhs.ty();
        if ty != rhs.ty() || !ty.scalar_kind().is_some_and(ScalarKind::is_integer) || ty.is_matrix()
        {
            return Err(no_overload(op.symbol(), &originals, call));
        }
        Ok(Exp::with_slots(binary(op, lhs, rhs, ty), merged(ls, rs)))
    }

    pub fn bit_and(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.bitwise(BinaryOp::BitAnd, a.into(), b.into())
    }

    pub fn bit_or(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.bitwise(BinaryOp::BitOr, a.into(), b.into())
    }

    pub fn bit_xor(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.bitwise(BinaryOp::BitXor, a.into(), b.into())
    }

    pub fn bit_not(&self, value: impl Into<Exp>) -> BuildResult<Exp> {
        self.require_bit_ops()?;
        let value = value.into();
        let call = format!("~{}", value);
        let (operand, slots) = value.clone().resolve()?;
        let ty = operand.ty();
        if !ty.scalar_kind().is_some_and(ScalarKind::is_integer) || ty.is_matrix() {
            return Err(no_overload("~", &[value], call));
        }
        Ok(Exp::with_slots(
            Expr::Unary {
                op: UnaryOp::BitNot,
                operand: Box::new(operand),
                ty,
            },
            slots,
        ))
    }

    /// Shift `value` by `amount` bits. WGSL requires the amount to be
    /// unsigned with the same width as the value.
    fn shift(&self, op: BinaryOp, value: Exp, amount: Exp) -> BuildResult<Exp> {
        self.require_bit_ops()?;
        let call = format!("{} {} {}", value, op.symbol(), amount);
        let originals = [value.clone(), amount.clone()];
        let (lhs, ls) = match value.literal() {
            Some(_) => value.resolve_kind(ScalarKind::I32)?,
            None => value.resolve()?,
        };
        let ty = lhs.ty();
        let Some(prim) = ty.as_primitive().filter(|p| p.scalar.is_integer() && !p.is_matrix())
        else {
            return Err(no_overload(op.symbol(), &originals, call));
        };
        let amount_kind = if self.target() == Target::WebGPU {
            ScalarKind::U32
        } else {
            prim.scalar
        };
        let (rhs, rs) = amount.resolve_kind(amount_kind)?;
        let rhs_ty = rhs.ty();
        let ok = match rhs_ty.as_primitive() {
            Some(rp) if self.target() == Target::WebGPU => {
                rp.scalar == ScalarKind::U32 && rp.rows == prim.rows && !rp.is_matrix()
            }
            Some(rp) => rp.scalar.is_integer() && (rp.is_scalar() || rp.rows == prim.rows),
            None => false,
        };
        if !ok {
            return Err(no_overload(op.symbol(), &originals, call));
        }
        Ok(Exp::with_slots(binary(op, lhs, rhs, ty), merged(ls, rs)))
    }

    pub fn shl(&self, value: impl Into<Exp>, amount: impl Into<Exp>) -> BuildResult<Exp> {
        self.shift(BinaryOp::Shl, value.into(), amount.into())
    }

    pub fn shr(&self, value: impl Into<Exp>, amount: impl Into<Exp>) -> BuildResult<Exp> {
        self.shift(BinaryOp::Shr, value.into(), amount.into())
    }

    fn compare(&self, op: BinaryOp, a: Exp, b: Exp) -> BuildResult<Exp> {
        let call = format!("{} {} {}", a, op.symbol(), b);
        let originals = [a.clone(), b.clone()];
        let ((lhs, ls), (rhs, rs)) = unify(a, b)?;
        let ty = lhs.ty();
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
        let ok = ty == rhs.ty()
            && ty.is_scalar()
            && (equality || ty.scalar_kind().is_some_and(ScalarKind::is_numeric));
        if !ok {
            return Err(no_overload(op.symbol(), &originals, call));
        }
        Ok(Exp::with_slots(
            binary(op, lhs, rhs, Type::bool()),
            merged(ls, rs),
        ))
    }

    pub fn eq(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.compare(BinaryOp::Eq, a.into(), b.into())
    }

    pub fn ne(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.compare(BinaryOp::Ne, a.into(), b.into())
    }

    pub fn lt(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.compare(BinaryOp::Lt, a.into(), b.into())
    }

    pub fn le(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.compare(BinaryOp::Le, a.into(), b.into())
    }

    pub fn gt(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.compare(BinaryOp::Gt, a.into(), b.into())
    }

    pub fn ge(&self, a: impl Into<Exp>, b: impl Into<Exp>) -> BuildResult<Exp> {
        self.compare(BinaryOp::Ge, a.into(), b.into())
    }

    /// Convert a scalar, vector or matrix to another element kind of the
    /// same shape.
    pub fn cast(&self, ty: &Type, value: impl Into<Exp>) -> BuildResult<Exp> {
        let value = value.into();
        let target = ty
            .as_primitive()
            .ok_or_else(|| BuildError::type_cast(value.to_string(), ty.to_string()))?;
        self.check_type(ty)?;
        if let Some(literal) = value.literal() {
            if target.is_scalar() {
                if let Ok(lit) = literal.classify_as(target.scalar) {
                    return Ok(Exp::node(Expr::Literal(lit)));
                }
            }
        }
        let (inner, slots) = value.clone().resolve()?;
        let from = inner.ty();
        let same_shape = from
            .as_primitive()
            .is_some_and(|p| p.rows == target.rows && p.cols == target.cols);
        if !same_shape {
            return Err(BuildError::type_cast(
                format!("{}: {}", inner, from),
                ty.to_string(),
            ));
        }
        if from == *ty {
            return Ok(Exp::with_slots(inner, slots));
        }
        Ok(Exp::with_slots(
            Expr::Cast {
                ty: ty.clone(),
                value: Box::new(inner),
            },
            slots,
        ))
    }

    /// Build a value of `ty` from parts: vector components, matrix columns,
    /// struct members or array elements. With no arguments a primitive is
    /// zero-initialized; one scalar splats across a vector.
    pub fn construct(
        &self,
        ty: &Type,
        args: impl IntoIterator<Item = Exp>,
    ) -> BuildResult<Exp> {
        let args: Vec<Exp> = args.into_iter().collect();
        let name = ty.to_string();
        self.check_type(ty)?;
        let mut slots = Vec::new();
        let mut parts = Vec::with_capacity(args.len());
        match ty.desc() {
            TypeDesc::Primitive(_) if args.is_empty() => {}
            TypeDesc::Primitive(prim) if prim.is_scalar() => {
                if args.len() != 1 {
                    return Err(BuildError::ParamLength {
                        function: name,
                        expected: 1,
                        got: args.len(),
                    });
                }
                return args
                    .into_iter()
                    .next()
                    .map(|a| self.cast(ty, a))
                    .unwrap_or_else(|| Err(BuildError::internal("missing argument")));
            }
            TypeDesc::Primitive(prim) => {
                let component = Type::scalar(prim.scalar);
                let (unit, expected) = if prim.is_matrix() {
                    (prim.rows as u32, prim.cols as u32 * prim.rows as u32)
                } else {
                    (1, prim.rows as u32)
                };
                let splat = !prim.is_matrix() && args.len() == 1;
                let mut filled = 0;
                for (index, arg) in args.into_iter().enumerate() {
                    let (expr, s) = arg.resolve_kind(prim.scalar)?;
                    let got = expr.ty();
                    let width = match got.as_primitive() {
                        Some(p) if p.scalar == prim.scalar && !p.is_matrix() => {
                            if p.is_scalar() || !prim.is_matrix() || p.rows as u32 == unit {
                                p.rows as u32
                            } else {
                                0
                            }
                        }
                        _ => 0,
                    };
                    if width == 0 {
                        return Err(BuildError::ParamType {
                            function: name,
                            index,
                            expected: component.to_string(),
                            got: got.to_string(),
                        });
                    }
                    filled += width;
                    slots.extend(s);
                    parts.push(expr);
                }
                if !(splat && filled == 1) && filled != expected {
                    return Err(BuildError::param_value(
                        name,
                        format!("{} components given, {} needed", filled, expected),
                    ));
                }
                if prim.is_matrix() && parts.len() == 1 {
                    return Err(BuildError::param_value(name, "a matrix cannot be built from one value"));
                }
            }
            TypeDesc::Struct(s) => {
                if args.len() != s.members.len() {
                    return Err(BuildError::ParamLength {
                        function: name,
                        expected: s.members.len(),
                        got: args.len(),
                    });
                }
                for (arg, member) in args.into_iter().zip(&s.members) {
                    let (expr, s) = arg.resolve_as(&member.ty)?;
                    slots.extend(s);
                    parts.push(expr);
                }
            }
            TypeDesc::Array(arr) if !arr.is_runtime() => {
                if self.target() == Target::WebGL1 {
                    return Err(BuildError::unsupported("array constructors", self.target()));
                }
                if args.len() != arr.len as usize {
                    return Err(BuildError::ParamLength {
                        function: name,
                        expected: arr.len as usize,
                        got: args.len(),
                    });
                }
                for arg in args {
                    let (expr, s) = arg.resolve_as(&arr.element)?;
                    slots.extend(s);
                    parts.push(expr);
                }
            }
            _ => {
                return Err(BuildError::param_value(
                    name,
                    "values of this type cannot be constructed",
                ))
            }
        }
        if parts.is_empty() && ty.as_primitive().is_none() {
            return Err(BuildError::ParamLength {
                function: name,
                expected: 1,
                got: 0,
            });
        }
        Ok(Exp::with_slots(
            Expr::Construct {
                ty: ty.clone(),
                args: parts,
            },
            slots,
        ))
    }

    /// `cond ? accept : reject`.
    pub fn select(
        &self,
        cond: impl Into<Exp>,
        accept: impl Into<Exp>,
        reject: impl Into<Exp>,
    ) -> BuildResult<Exp> {
        let (cond, cs) = cond.into().resolve_kind(ScalarKind::Bool)?;
        if cond.ty() != Type::bool() {
            return Err(BuildError::type_cast(
                format!("{}: {}", cond, cond.ty()),
                "bool",
            ));
        }
        let (accept, reject) = (accept.into(), reject.into());
        let call = format!("{} ? {} : {}", cond, accept, reject);
        let originals = [accept.clone(), reject.clone()];
        let ((accept, as_), (reject, rs)) = unify(accept, reject)?;
        let ty = accept.ty();
        if ty != reject.ty() {
            return Err(no_overload("select", &originals, call));
        }
        Ok(Exp::with_slots(
            Expr::Select {
                cond: Box::new(cond),
                accept: Box::new(accept),
                reject: Box::new(reject),
                ty,
            },
            merged(merged(cs, as_), rs),
        ))
    }
}
