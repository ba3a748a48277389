//! Leaf parsers: identifiers, counts, scalar names.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::one_of,
    combinator::{map, map_res, recognize},
    sequence::pair,
    IResult,
};

use crate::types::ScalarKind;

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

pub(crate) fn count(input: &str) -> IResult<&str, u32> {
    map_res(take_while1(|c: char| c.is_ascii_digit()), |s: &str| s.parse::<u32>())(input)
}

/// Vector or matrix dimension, 2 to 4.
pub(crate) fn dim(input: &str) -> IResult<&str, u8> {
    map(one_of("234"), |c| c as u8 - b'0')(input)
}

/// Scalar spelling, returning the kind and the normalized flag.
pub(crate) fn scalar(input: &str) -> IResult<&str, (ScalarKind, bool)> {
    alt((
        map(tag("bool"), |_| (ScalarKind::Bool, false)),
        map(tag("f16"), |_| (ScalarKind::F16, false)),
        map(tag("f32"), |_| (ScalarKind::F32, false)),
        map(tag("i8"), |_| (ScalarKind::I8, false)),
        map(tag("i16"), |_| (ScalarKind::I16, false)),
        map(tag("i32"), |_| (ScalarKind::I32, false)),
        map(tag("u8"), |_| (ScalarKind::U8, false)),
        map(tag("u16"), |_| (ScalarKind::U16, false)),
        map(tag("u32"), |_| (ScalarKind::U32, false)),
        map(tag("unorm8"), |_| (ScalarKind::U8, true)),
        map(tag("unorm16"), |_| (ScalarKind::U16, true)),
        map(tag("snorm8"), |_| (ScalarKind::I8, true)),
        map(tag("snorm16"), |_| (ScalarKind::I16, true)),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("Light{"), Ok(("{", "Light")));
        assert_eq!(identifier("_a1 b"), Ok((" b", "_a1")));
        assert!(identifier("1a").is_err());
    }

    #[test]
    fn test_scalar() {
        assert_eq!(scalar("u16>"), Ok((">", (ScalarKind::U16, false))));
        assert_eq!(scalar("unorm8"), Ok(("", (ScalarKind::U8, true))));
        assert!(scalar("f64").is_err());
    }
}
