//! Parser for canonical type identifiers.
//!
//! Accepts the strings produced by [`Type::id`](crate::Type::id), with
//! optional whitespace after separators, e.g. `vec3<f32>`,
//! `array<mat4x4<f32>, 2>`, `ptr<function,u32>` or
//! `struct Light{color:vec3<f32>,power:f32}@std140`.

mod primitives;
mod types;
mod whitespace;

use alloc::format;

use crate::{
    error::{TypeError, TypeResult},
    types::Type,
};

/// Parse a canonical type identifier.
pub fn parse_type(input: &str) -> TypeResult<Type> {
    let trimmed = input.trim();
    match types::ty(trimmed) {
        Ok(("", ty)) => Ok(ty),
        Ok((remaining, _)) => Err(parse_error(
            trimmed,
            remaining,
            format!("unexpected input remaining: {}", remaining),
        )),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(parse_error(
            trimmed,
            e.input,
            format!("expected a type, found '{}'", e.input),
        )),
        Err(nom::Err::Incomplete(_)) => Err(parse_error(trimmed, "", "incomplete type".into())),
    }
}

fn parse_error(original: &str, remaining: &str, message: alloc::string::String) -> TypeError {
    TypeError::Parse {
        message,
        position: original.len() - remaining.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LayoutKind, TypeDesc};

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_type("f32").unwrap(), Type::f32());
        assert_eq!(parse_type(" vec3<f32> ").unwrap(), Type::vec3f());
        assert_eq!(parse_type("mat4x4<f32>").unwrap(), Type::mat(4, 4));
        assert_eq!(parse_type("unorm8").unwrap().id(), "unorm8");
        assert_eq!(parse_type("vec2<snorm16>").unwrap().id(), "vec2<snorm16>");
    }

    #[test]
    fn test_parse_compound() {
        let arr = parse_type("array<vec4<f32>, 8>").unwrap();
        assert_eq!(arr.id(), "array<vec4<f32>,8>");
        let rt = parse_type("array<u32>").unwrap();
        assert!(rt.as_array().unwrap().is_runtime());
        let ptr = parse_type("ptr<function, i32>").unwrap();
        assert_eq!(ptr.id(), "ptr<function,i32>");
        assert_eq!(parse_type("atomic<u32>").unwrap().id(), "atomic<u32>");
    }

    #[test]
    fn test_parse_resources() {
        assert_eq!(parse_type("sampler").unwrap().id(), "sampler");
        assert_eq!(
            parse_type("sampler_comparison").unwrap().id(),
            "sampler_comparison"
        );
        for id in [
            "texture_2d<f32>",
            "texture_2d_array<i32>",
            "texture_cube_array<f32>",
            "texture_3d<u32>",
            "texture_1d<f32>",
            "texture_depth_2d",
            "texture_depth_cube_array",
            "texture_depth_multisampled_2d",
            "texture_multisampled_2d<f32>",
            "texture_external",
            "texture_storage_2d<rgba8unorm,write>",
            "texture_storage_2d_array<r32float,read_write>",
        ] {
            assert_eq!(parse_type(id).unwrap().id(), id);
        }
    }

    #[test]
    fn test_parse_struct() {
        let id = "struct Light{color:vec3<f32>,power:f32}@std140";
        let ty = parse_type(id).unwrap();
        assert_eq!(ty.id(), id);
        match ty.desc() {
            TypeDesc::Struct(s) => {
                assert_eq!(s.layout, LayoutKind::Std140);
                assert_eq!(s.members.len(), 2);
            }
            _ => panic!("expected struct"),
        }
        let plain = parse_type("struct P { a: f32, b: array<f32, 2> }").unwrap();
        assert_eq!(plain.id(), "struct P{a:f32,b:array<f32,2>}");
    }

    #[test]
    fn test_every_id_round_trips() {
        for id in [
            "bool",
            "vec4<u32>",
            "mat3x2<f32>",
            "array<array<f32,2>,3>",
            "ptr<storage,array<u32>>",
            "struct Outer{inner:struct Inner{x:f32}@std430,n:u32}@std430",
        ] {
            assert_eq!(parse_type(id).unwrap().id(), id);
        }
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_type("vec5<f32>").unwrap_err();
        assert!(matches!(err, TypeError::Parse { .. }));
        let err = parse_type("vec3<f32> trailing").unwrap_err();
        match err {
            TypeError::Parse { position, .. } => assert_eq!(position, 10),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(parse_type("atomic<f32>").is_err());
        assert!(parse_type("array<f32,4").is_err());
    }
}
