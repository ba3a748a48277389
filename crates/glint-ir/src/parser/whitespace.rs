//! Whitespace handling.

use nom::{character::complete::multispace0, combinator::map, IResult};

/// Skip optional whitespace.
pub(crate) fn blank(input: &str) -> IResult<&str, ()> {
    map(multispace0, |_| ())(input)
}

/// Match `token` surrounded by optional whitespace.
pub(crate) fn sep<'a>(token: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (input, _) = blank(input)?;
        let (input, matched) = nom::bytes::complete::tag(token)(input)?;
        let (input, _) = blank(input)?;
        Ok((input, matched))
    }
}
