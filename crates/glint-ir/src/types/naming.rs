//! Target spellings of types.

use alloc::{
    format,
    string::{String, ToString},
};

use crate::{
    error::{TypeError, TypeResult},
    target::Target,
};

use super::{
    AddressSpace, PrimitiveType, SampleType, SamplerKind, ScalarKind, TextureDim, TextureType,
    Type, TypeDesc,
};

/// Spell `ty` for `target`. With a non-empty `var_name` the result is a
/// declaration: `float name[4]` in GLSL, `name: array<f32, 4>` in WGSL.
pub fn type_name(ty: &Type, target: Target, var_name: &str) -> TypeResult<String> {
    if target.is_glsl() {
        glsl_name(ty, target, var_name)
    } else {
        let name = wgsl_name(ty)?;
        Ok(if var_name.is_empty() {
            name
        } else {
            format!("{}: {}", var_name, name)
        })
    }
}

fn with_var(name: String, var_name: &str) -> String {
    if var_name.is_empty() {
        name
    } else {
        format!("{} {}", name, var_name)
    }
}

fn glsl_name(ty: &Type, target: Target, var_name: &str) -> TypeResult<String> {
    let unsupported = || TypeError::unsupported(ty.id(), target);
    match ty.desc() {
        TypeDesc::Void if var_name.is_empty() => Ok("void".to_string()),
        TypeDesc::Primitive(p) => Ok(with_var(glsl_primitive(p, target).ok_or_else(unsupported)?, var_name)),
        TypeDesc::Struct(s) => Ok(with_var(s.name.clone(), var_name)),
        TypeDesc::Array(arr) => {
            if arr.is_runtime() || arr.element.as_array().is_some() {
                return Err(unsupported());
            }
            let element = glsl_name(&arr.element, target, "")?;
            Ok(if var_name.is_empty() {
                format!("{}[{}]", element, arr.len)
            } else {
                format!("{} {}[{}]", element, var_name, arr.len)
            })
        }
        TypeDesc::Texture(tex) => Ok(with_var(glsl_texture_name(tex, target, false)?, var_name)),
        _ => Err(unsupported()),
    }
}

fn glsl_primitive(p: &PrimitiveType, target: Target) -> Option<String> {
    if p.is_matrix() {
        if p.scalar != ScalarKind::F32 {
            return None;
        }
        if p.cols == p.rows {
            return Some(format!("mat{}", p.cols));
        }
        if target == Target::WebGL1 {
            return None;
        }
        return Some(format!("mat{}x{}", p.cols, p.rows));
    }
    let (scalar, prefix) = match p.scalar {
        ScalarKind::Bool => ("bool", "b"),
        ScalarKind::F32 => ("float", ""),
        ScalarKind::I32 => ("int", "i"),
        ScalarKind::U32 if target != Target::WebGL1 => ("uint", "u"),
        _ => return None,
    };
    if p.normalized {
        return None;
    }
    Some(if p.is_scalar() {
        scalar.to_string()
    } else {
        format!("{}vec{}", prefix, p.rows)
    })
}

/// GLSL sampler type for a texture. `shadow` selects the comparison variant
/// of depth textures.
pub fn glsl_texture_name(tex: &TextureType, target: Target, shadow: bool) -> TypeResult<String> {
    let unsupported = || TypeError::unsupported(tex.id(), target);
    if tex.is_storage() || tex.multisampled {
        return Err(unsupported());
    }
    if tex.external {
        return Ok("sampler2D".to_string());
    }
    if target == Target::WebGL1 {
        if tex.arrayed || tex.sample_type != SampleType::Float || shadow {
            return Err(unsupported());
        }
        return match (tex.dim, tex.depth) {
            (TextureDim::D1 | TextureDim::D2, _) => Ok("sampler2D".to_string()),
            (TextureDim::Cube, false) => Ok("samplerCube".to_string()),
            _ => Err(unsupported()),
        };
    }
    let prefix = match tex.sample_type {
        _ if tex.depth => "",
        SampleType::Float => "",
        SampleType::Sint => "i",
        SampleType::Uint => "u",
    };
    let dim = match (tex.dim, tex.arrayed) {
        (TextureDim::D1 | TextureDim::D2, false) => "2D",
        (TextureDim::D2, true) => "2DArray",
        (TextureDim::D3, false) => "3D",
        (TextureDim::Cube, false) => "Cube",
        _ => return Err(unsupported()),
    };
    let suffix = if tex.depth && shadow { "Shadow" } else { "" };
    Ok(format!("{}sampler{}{}", prefix, dim, suffix))
}

fn wgsl_name(ty: &Type) -> TypeResult<String> {
    let unsupported = || TypeError::unsupported(ty.id(), Target::WebGPU);
    match ty.desc() {
        TypeDesc::Primitive(p) => {
            if matches!(p.scalar.byte_size(), 1 | 2) {
                return Err(unsupported());
            }
            Ok(ty.id().to_string())
        }
        TypeDesc::Struct(s) => Ok(s.name.clone()),
        TypeDesc::Array(arr) => {
            let element = wgsl_name(&arr.element)?;
            Ok(if arr.is_runtime() {
                format!("array<{}>", element)
            } else {
                format!("array<{}, {}>", element, arr.len)
            })
        }
        TypeDesc::Pointer(ptr) => {
            let pointee = wgsl_name(&ptr.pointee)?;
            match ptr.space {
                AddressSpace::Handle => Err(unsupported()),
                AddressSpace::Storage => Ok(format!("ptr<storage, {}, read_write>", pointee)),
                space => Ok(format!("ptr<{}, {}>", space.name(), pointee)),
            }
        }
        TypeDesc::Atomic(k) => Ok(format!("atomic<{}>", k.name(false))),
        TypeDesc::Sampler(SamplerKind::Sample) => Ok("sampler".to_string()),
        TypeDesc::Sampler(SamplerKind::Comparison) => Ok("sampler_comparison".to_string()),
        TypeDesc::Texture(tex) => Ok(tex.id().replace(',', ", ")),
        TypeDesc::Void | TypeDesc::Any | TypeDesc::Function(_) => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LayoutKind, StorageAccess, TexelFormat};
    use alloc::vec;

    #[test]
    fn test_glsl_primitives() {
        assert_eq!(type_name(&Type::f32(), Target::WebGL1, "").unwrap(), "float");
        assert_eq!(type_name(&Type::vec3f(), Target::WebGL2, "n").unwrap(), "vec3 n");
        assert_eq!(
            type_name(&Type::vec(ScalarKind::Bool, 2), Target::WebGL1, "").unwrap(),
            "bvec2"
        );
        assert_eq!(type_name(&Type::mat(4, 4), Target::WebGL1, "").unwrap(), "mat4");
        assert_eq!(type_name(&Type::mat(4, 3), Target::WebGL2, "").unwrap(), "mat4x3");
        assert!(type_name(&Type::mat(4, 3), Target::WebGL1, "").is_err());
        assert_eq!(type_name(&Type::u32(), Target::WebGL2, "").unwrap(), "uint");
        let err = type_name(&Type::u32(), Target::WebGL1, "").unwrap_err();
        assert!(matches!(err, TypeError::UnsupportedType { .. }));
    }

    #[test]
    fn test_array_declarations() {
        let arr = Type::array(Type::f32(), 4).unwrap();
        assert_eq!(type_name(&arr, Target::WebGL2, "name").unwrap(), "float name[4]");
        assert_eq!(type_name(&arr, Target::WebGL2, "").unwrap(), "float[4]");
        assert_eq!(type_name(&arr, Target::WebGPU, "name").unwrap(), "name: array<f32, 4>");
        let rt = Type::runtime_array(Type::u32()).unwrap();
        assert_eq!(type_name(&rt, Target::WebGPU, "").unwrap(), "array<u32>");
        assert!(type_name(&rt, Target::WebGL2, "").is_err());
        let nested = Type::array(arr, 2).unwrap();
        assert!(type_name(&nested, Target::WebGL2, "x").is_err());
        assert_eq!(
            type_name(&nested, Target::WebGPU, "").unwrap(),
            "array<array<f32, 4>, 2>"
        );
    }

    #[test]
    fn test_wgsl_names() {
        assert_eq!(type_name(&Type::vec4f(), Target::WebGPU, "").unwrap(), "vec4<f32>");
        assert!(type_name(&Type::f16(), Target::WebGPU, "").is_err());
        assert!(type_name(&Type::void(), Target::WebGPU, "").is_err());
        let p = Type::pointer(Type::f32(), AddressSpace::Function);
        assert_eq!(type_name(&p, Target::WebGPU, "").unwrap(), "ptr<function, f32>");
        assert!(type_name(&p, Target::WebGL2, "").is_err());
        let s = Type::structure(
            "Light",
            vec![("power".into(), Type::f32())],
            LayoutKind::Default,
        )
        .unwrap();
        assert_eq!(type_name(&s, Target::WebGPU, "l").unwrap(), "l: Light");
        assert_eq!(type_name(&s, Target::WebGL1, "l").unwrap(), "Light l");
    }

    #[test]
    fn test_texture_names() {
        let t2d = Type::texture(TextureType::sampled(TextureDim::D2, SampleType::Float)).unwrap();
        assert_eq!(type_name(&t2d, Target::WebGL1, "").unwrap(), "sampler2D");
        assert_eq!(type_name(&t2d, Target::WebGPU, "").unwrap(), "texture_2d<f32>");
        let t1d = TextureType::sampled(TextureDim::D1, SampleType::Float);
        assert_eq!(glsl_texture_name(&t1d, Target::WebGL2, false).unwrap(), "sampler2D");
        let isampler = TextureType::sampled(TextureDim::D3, SampleType::Sint);
        assert_eq!(glsl_texture_name(&isampler, Target::WebGL2, false).unwrap(), "isampler3D");
        assert!(glsl_texture_name(&isampler, Target::WebGL1, false).is_err());
        let depth = TextureType::depth(TextureDim::D2);
        assert_eq!(glsl_texture_name(&depth, Target::WebGL2, true).unwrap(), "sampler2DShadow");
        assert_eq!(glsl_texture_name(&depth, Target::WebGL2, false).unwrap(), "sampler2D");
        assert_eq!(glsl_texture_name(&depth, Target::WebGL1, false).unwrap(), "sampler2D");
        let storage = TextureType::storage(TextureDim::D2, TexelFormat::Rgba8Unorm, StorageAccess::Write);
        assert!(glsl_texture_name(&storage, Target::WebGL2, false).is_err());
        let st = Type::texture(storage).unwrap();
        assert_eq!(
            type_name(&st, Target::WebGPU, "").unwrap(),
            "texture_storage_2d<rgba8unorm, write>"
        );
        let ext = Type::texture(TextureType::external()).unwrap();
        assert_eq!(type_name(&ext, Target::WebGL2, "").unwrap(), "sampler2D");
        assert_eq!(type_name(&ext, Target::WebGPU, "").unwrap(), "texture_external");
    }
}
