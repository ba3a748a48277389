//! Grammar of canonical type identifiers.

use alloc::{string::ToString, vec::Vec};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, map_opt, map_res, opt},
    multi::separated_list1,
    sequence::{preceded, separated_pair, terminated, tuple},
    IResult,
};

use super::{
    primitives::{count, dim, identifier, scalar},
    whitespace::{blank, sep},
};
use crate::types::{
    AddressSpace, LayoutKind, PrimitiveType, SampleType, SamplerKind, StorageAccess, TexelFormat,
    TextureDim, TextureType, Type,
};

pub(crate) fn ty(input: &str) -> IResult<&str, Type> {
    alt((
        structure,
        array,
        pointer,
        atomic,
        texture,
        sampler,
        matrix,
        vector,
        map(tag("void"), |_| Type::void()),
        map(tag("any"), |_| Type::any()),
        scalar_type,
    ))(input)
}

fn scalar_type(input: &str) -> IResult<&str, Type> {
    map_res(scalar, |(kind, normalized)| {
        Type::primitive(PrimitiveType {
            normalized,
            ..PrimitiveType::scalar(kind)
        })
    })(input)
}

fn vector(input: &str) -> IResult<&str, Type> {
    map_res(
        tuple((preceded(tag("vec"), dim), sep("<"), scalar, sep(">"))),
        |(n, _, (kind, normalized), _)| {
            Type::primitive(PrimitiveType {
                normalized,
                ..PrimitiveType::vector(kind, n)
            })
        },
    )(input)
}

fn matrix(input: &str) -> IResult<&str, Type> {
    map_res(
        tuple((
            preceded(tag("mat"), separated_pair(dim, char('x'), dim)),
            sep("<"),
            scalar,
            sep(">"),
        )),
        |((cols, rows), _, (kind, normalized), _)| {
            Type::primitive(PrimitiveType {
                normalized,
                ..PrimitiveType::matrix(kind, cols, rows)
            })
        },
    )(input)
}

fn array(input: &str) -> IResult<&str, Type> {
    map_res(
        tuple((
            tag("array"),
            sep("<"),
            ty,
            opt(preceded(sep(","), count)),
            sep(">"),
        )),
        |(_, _, element, len, _)| Type::array(element, len.unwrap_or(0)),
    )(input)
}

fn pointer(input: &str) -> IResult<&str, Type> {
    map(
        tuple((
            tag("ptr"),
            sep("<"),
            map_opt(identifier, AddressSpace::from_name),
            sep(","),
            ty,
            sep(">"),
        )),
        |(_, _, space, _, pointee, _)| Type::pointer(pointee, space),
    )(input)
}

fn atomic(input: &str) -> IResult<&str, Type> {
    map_res(
        tuple((tag("atomic"), sep("<"), scalar, sep(">"))),
        |(_, _, (kind, _), _)| Type::atomic(kind),
    )(input)
}

fn sampler(input: &str) -> IResult<&str, Type> {
    alt((
        map(tag("sampler_comparison"), |_| Type::sampler(SamplerKind::Comparison)),
        map(tag("sampler"), |_| Type::sampler(SamplerKind::Sample)),
    ))(input)
}

fn sample_type(input: &str) -> IResult<&str, SampleType> {
    alt((
        map(tag("f32"), |_| SampleType::Float),
        map(tag("i32"), |_| SampleType::Sint),
        map(tag("u32"), |_| SampleType::Uint),
    ))(input)
}

fn sampled_dim(input: &str) -> IResult<&str, (TextureDim, bool)> {
    alt((
        map(tag("1d"), |_| (TextureDim::D1, false)),
        map(tag("2d_array"), |_| (TextureDim::D2, true)),
        map(tag("2d"), |_| (TextureDim::D2, false)),
        map(tag("3d"), |_| (TextureDim::D3, false)),
        map(tag("cube_array"), |_| (TextureDim::Cube, true)),
        map(tag("cube"), |_| (TextureDim::Cube, false)),
    ))(input)
}

fn access(input: &str) -> IResult<&str, StorageAccess> {
    alt((
        map(tag("read_write"), |_| StorageAccess::ReadWrite),
        map(tag("read"), |_| StorageAccess::Read),
        map(tag("write"), |_| StorageAccess::Write),
    ))(input)
}

fn with_array(tex: TextureType, arrayed: bool) -> TextureType {
    if arrayed {
        tex.array()
    } else {
        tex
    }
}

fn texture(input: &str) -> IResult<&str, Type> {
    map_res(
        alt((
            map(tag("texture_external"), |_| TextureType::external()),
            map(
                tuple((
                    preceded(tag("texture_storage_"), sampled_dim),
                    sep("<"),
                    map_opt(identifier, TexelFormat::from_name),
                    sep(","),
                    access,
                    sep(">"),
                )),
                |((dim, arrayed), _, format, _, access, _)| {
                    with_array(TextureType::storage(dim, format, access), arrayed)
                },
            ),
            map(tag("texture_depth_multisampled_2d"), |_| TextureType {
                multisampled: true,
                ..TextureType::depth(TextureDim::D2)
            }),
            map(preceded(tag("texture_depth_"), sampled_dim), |(dim, arrayed)| {
                with_array(TextureType::depth(dim), arrayed)
            }),
            map(
                tuple((
                    tag("texture_multisampled_2d"),
                    sep("<"),
                    sample_type,
                    sep(">"),
                )),
                |(_, _, st, _)| TextureType::multisampled(st),
            ),
            map(
                tuple((
                    preceded(tag("texture_"), sampled_dim),
                    sep("<"),
                    sample_type,
                    sep(">"),
                )),
                |((dim, arrayed), _, st, _)| with_array(TextureType::sampled(dim, st), arrayed),
            ),
        )),
        Type::texture,
    )(input)
}

fn member(input: &str) -> IResult<&str, (alloc::string::String, Type)> {
    map(separated_pair(identifier, sep(":"), ty), |(name, ty)| {
        (name.to_string(), ty)
    })(input)
}

fn structure(input: &str) -> IResult<&str, Type> {
    map_res(
        tuple((
            terminated(tag("struct"), blank),
            identifier,
            sep("{"),
            separated_list1(sep(","), member),
            sep("}"),
            opt(preceded(char('@'), map_opt(identifier, LayoutKind::from_name))),
        )),
        |(_, name, _, members, _, layout): (_, &str, _, Vec<_>, _, _)| {
            Type::structure(name, members, layout.unwrap_or_default())
        },
    )(input)
}
