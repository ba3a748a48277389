//! Bare literals and their classification into shader scalar kinds.

use alloc::string::ToString;
use core::fmt;

use glint_ir::{ast::Literal, ScalarKind};

use crate::error::{BuildError, BuildResult};

/// A host value that has not been given a shader type yet.
///
/// Integers are classified by value (`1` is `i32`, `3000000000` is `u32`);
/// host floats always become `f32`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralValue {
    Bool(bool),
    Number(f64),
    Float(f64),
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && (n as i64) as f64 == n
}

impl LiteralValue {
    /// The kind the value takes when nothing else constrains it.
    pub fn natural_kind(&self) -> BuildResult<ScalarKind> {
        Ok(match *self {
            LiteralValue::Bool(_) => ScalarKind::Bool,
            LiteralValue::Float(_) => ScalarKind::F32,
            LiteralValue::Number(n) if !is_integral(n) => ScalarKind::F32,
            LiteralValue::Number(n) if n >= i32::MIN as f64 && n <= i32::MAX as f64 => {
                ScalarKind::I32
            }
            LiteralValue::Number(n) if n > 0.0 && n <= u32::MAX as f64 => ScalarKind::U32,
            LiteralValue::Number(_) => {
                return Err(BuildError::type_cast(self.to_string(), "i32 or u32"))
            }
        })
    }

    /// Classify with no constraint from context.
    pub fn natural(&self) -> BuildResult<Literal> {
        self.classify_as(self.natural_kind()?)
    }

    /// Classify as `kind`, failing if the value does not fit.
    pub fn classify_as(&self, kind: ScalarKind) -> BuildResult<Literal> {
        let fail = || BuildError::type_cast(self.to_string(), kind.name(false));
        match (*self, kind) {
            (LiteralValue::Bool(b), ScalarKind::Bool) => Ok(Literal::Bool(b)),
            (LiteralValue::Bool(_), _) | (_, ScalarKind::Bool) => Err(fail()),
            (LiteralValue::Number(n) | LiteralValue::Float(n), ScalarKind::F32) => {
                Ok(Literal::F32(n as f32))
            }
            (LiteralValue::Float(_), _) => Err(fail()),
            (LiteralValue::Number(n), ScalarKind::I32)
                if is_integral(n) && n >= i32::MIN as f64 && n <= i32::MAX as f64 =>
            {
                Ok(Literal::I32(n as i32))
            }
            (LiteralValue::Number(n), ScalarKind::U32)
                if is_integral(n) && n >= 0.0 && n <= u32::MAX as f64 =>
            {
                Ok(Literal::U32(n as u32))
            }
            _ => Err(fail()),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LiteralValue::Bool(b) => write!(f, "{}", b),
            LiteralValue::Number(n) if is_integral(n) => write!(f, "{}", n as i64),
            LiteralValue::Number(n) | LiteralValue::Float(n) => write!(f, "{:?}", n),
        }
    }
}

macro_rules! from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for LiteralValue {
            fn from(v: $t) -> Self {
                LiteralValue::Number(v as f64)
            }
        })*
    };
}

from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<bool> for LiteralValue {
    fn from(v: bool) -> Self {
        LiteralValue::Bool(v)
    }
}

impl From<f32> for LiteralValue {
    fn from(v: f32) -> Self {
        LiteralValue::Float(v as f64)
    }
}

impl From<f64> for LiteralValue {
    fn from(v: f64) -> Self {
        LiteralValue::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_classification() {
        assert_eq!(LiteralValue::from(true).natural().unwrap(), Literal::Bool(true));
        assert_eq!(LiteralValue::from(7).natural().unwrap(), Literal::I32(7));
        assert_eq!(LiteralValue::from(-7).natural().unwrap(), Literal::I32(-7));
        assert_eq!(
            LiteralValue::from(3_000_000_000u32).natural().unwrap(),
            Literal::U32(3_000_000_000)
        );
        assert_eq!(LiteralValue::from(1.5).natural().unwrap(), Literal::F32(1.5));
        assert_eq!(LiteralValue::from(2.0f32).natural().unwrap(), Literal::F32(2.0));
        assert!(LiteralValue::from(4_294_967_296u64).natural().is_err());
        assert!(LiteralValue::from(-3_000_000_000i64).natural().is_err());
    }

    #[test]
    fn test_classify_as_u32_bounds() {
        let max = LiteralValue::from(4_294_967_295u64);
        assert_eq!(max.classify_as(ScalarKind::U32).unwrap(), Literal::U32(u32::MAX));
        let over = LiteralValue::from(4_294_967_296u64);
        assert!(matches!(
            over.classify_as(ScalarKind::U32),
            Err(BuildError::TypeCast { .. })
        ));
        assert!(LiteralValue::from(-1).classify_as(ScalarKind::U32).is_err());
    }

    #[test]
    fn test_classify_as_rejects_fractions_and_bools() {
        assert!(LiteralValue::Number(1.5).classify_as(ScalarKind::I32).is_err());
        assert!(LiteralValue::from(1.0f32).classify_as(ScalarKind::I32).is_err());
        assert!(LiteralValue::from(true).classify_as(ScalarKind::F32).is_err());
        assert!(LiteralValue::from(1).classify_as(ScalarKind::Bool).is_err());
        assert_eq!(
            LiteralValue::from(3).classify_as(ScalarKind::F32).unwrap(),
            Literal::F32(3.0)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(LiteralValue::from(42).to_string(), "42");
        assert_eq!(LiteralValue::from(0.25).to_string(), "0.25");
    }
}
