//! Host-visible memory layout rules.
//!
//! Four layouts are supported:
//! - `Default`: WGSL natural layout (vec3 aligns like vec4, arrays keep the
//!   element alignment).
//! - `Std140`: GLSL uniform-block rules; arrays and structs align to 16 and
//!   array strides must be multiples of 16.
//! - `Std430`: identical to `Default`.
//! - `Packed`: byte-tight, alignment 1.

use alloc::{boxed::Box, format, string::String, vec::Vec};

use crate::error::{TypeError, TypeResult};

use super::{MemberLayout, PrimitiveType, ScalarKind, Type, TypeDesc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LayoutKind {
    #[default]
    Default,
    Std140,
    Std430,
    Packed,
}

impl LayoutKind {
    pub fn name(self) -> &'static str {
        match self {
            LayoutKind::Default => "default",
            LayoutKind::Std140 => "std140",
            LayoutKind::Std430 => "std430",
            LayoutKind::Packed => "packed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "default" => LayoutKind::Default,
            "std140" => LayoutKind::Std140,
            "std430" => LayoutKind::Std430,
            "packed" => LayoutKind::Packed,
            _ => return None,
        })
    }
}

/// Round `n` up to the next multiple of `align`.
pub fn round_up(align: u32, n: u32) -> u32 {
    if align <= 1 {
        n
    } else {
        n.div_ceil(align) * align
    }
}

/// Required alignment of `ty` in bytes under `layout`.
pub fn alignment(ty: &Type, layout: LayoutKind) -> TypeResult<u32> {
    align_and_size(ty, layout).map(|(align, _)| align)
}

/// Size of `ty` in bytes under `layout`. Runtime-sized arrays report 0.
pub fn size(ty: &Type, layout: LayoutKind) -> TypeResult<u32> {
    align_and_size(ty, layout).map(|(_, size)| size)
}

/// Distance in bytes between consecutive elements of an array of `element`.
pub fn array_stride(element: &Type, layout: LayoutKind) -> TypeResult<u32> {
    let (align, size) = align_and_size(element, layout)?;
    if layout == LayoutKind::Packed {
        return Ok(size);
    }
    let stride = round_up(align, size);
    if layout == LayoutKind::Std140 && stride % 16 != 0 {
        return Err(TypeError::layout(format!(
            "std140 array stride {} of {} is not a multiple of 16",
            stride, element
        )));
    }
    Ok(stride)
}

fn align_and_size(ty: &Type, layout: LayoutKind) -> TypeResult<(u32, u32)> {
    match ty.desc() {
        TypeDesc::Primitive(p) => primitive(p, ty, layout),
        TypeDesc::Atomic(_) => Ok(if layout == LayoutKind::Packed {
            (1, 4)
        } else {
            (4, 4)
        }),
        TypeDesc::Array(arr) => {
            let (elem_align, _) = align_and_size(&arr.element, layout)?;
            let stride = array_stride(&arr.element, layout)?;
            let align = match layout {
                LayoutKind::Packed => 1,
                LayoutKind::Std140 => round_up(16, elem_align),
                LayoutKind::Default | LayoutKind::Std430 => elem_align,
            };
            Ok((align, stride * arr.len))
        }
        TypeDesc::Struct(s) => {
            let members: Vec<(String, Type)> = s
                .members
                .iter()
                .map(|m| (m.name.clone(), m.ty.clone()))
                .collect();
            let (_, align, size) = place_members(&members, layout)?;
            Ok((align, size))
        }
        _ => Err(TypeError::NotHostShareable(String::from(ty.id()))),
    }
}

fn primitive(p: &PrimitiveType, ty: &Type, layout: LayoutKind) -> TypeResult<(u32, u32)> {
    if p.scalar == ScalarKind::Bool {
        return Err(TypeError::NotHostShareable(String::from(ty.id())));
    }
    let s = p.scalar.byte_size();
    if layout == LayoutKind::Packed {
        return Ok((1, p.components() * s));
    }
    let rows = p.rows as u32;
    let vec_align = if rows == 3 { 4 * s } else { rows * s };
    if !p.is_matrix() {
        return Ok((vec_align, rows * s));
    }
    let col_stride = round_up(vec_align, rows * s);
    if layout == LayoutKind::Std140 {
        if p.cols == 2 {
            return Err(TypeError::layout(format!(
                "{} has two columns, which std140 cannot represent portably",
                ty
            )));
        }
        if col_stride % 16 != 0 {
            return Err(TypeError::layout(format!(
                "std140 column stride {} of {} is not a multiple of 16",
                col_stride, ty
            )));
        }
    }
    Ok((vec_align, p.cols as u32 * col_stride))
}

/// Place struct members in declaration order. Returns the member placements
/// and the struct's alignment and size.
pub(crate) fn place_members(
    members: &[(String, Type)],
    layout: LayoutKind,
) -> TypeResult<(Vec<MemberLayout>, u32, u32)> {
    let mut placed = Vec::with_capacity(members.len());
    let mut offset = 0u32;
    let mut max_align = 1u32;
    for (i, (name, ty)) in members.iter().enumerate() {
        if ty.has_runtime_tail() && i + 1 != members.len() {
            return Err(TypeError::layout(format!(
                "runtime-sized member '{}' must come last",
                name
            )));
        }
        let (align, size) = align_and_size(ty, layout)?;
        offset = round_up(align, offset);
        placed.push(MemberLayout {
            offset,
            align,
            size,
        });
        offset += size;
        max_align = max_align.max(align);
    }
    let align = match layout {
        LayoutKind::Packed => 1,
        LayoutKind::Std140 => round_up(16, max_align),
        LayoutKind::Default | LayoutKind::Std430 => max_align,
    };
    Ok((placed, align, round_up(align, offset)))
}

/// Host-side description of a buffer's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLayout {
    pub byte_size: u32,
    pub entries: Vec<BufferLayoutEntry>,
}

/// One named field of a [`BufferLayout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLayoutEntry {
    pub name: String,
    pub offset: u32,
    pub byte_size: u32,
    pub ty: Type,
    /// Element stride for array fields, 0 otherwise.
    pub array_stride: u32,
    /// Element count for array fields, 0 for non-arrays and runtime arrays.
    pub array_len: u32,
    /// Nested layout for struct fields and arrays of structs.
    pub sub_layout: Option<Box<BufferLayout>>,
}

impl BufferLayout {
    pub fn entry(&self, name: &str) -> Option<&BufferLayoutEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Absolute offset of a dotted field path such as `light.color`.
    pub fn offset_of(&self, path: &str) -> Option<u32> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let entry = self.entry(head)?;
        match rest {
            None => Some(entry.offset),
            Some(rest) => Some(entry.offset + entry.sub_layout.as_ref()?.offset_of(rest)?),
        }
    }
}

/// Describe how a struct (or array) type is laid out in host memory.
///
/// A non-struct type yields a single entry with an empty name.
pub fn buffer_layout(ty: &Type, layout: LayoutKind) -> TypeResult<BufferLayout> {
    let byte_size = size(ty, layout)?;
    let entries = match ty.desc() {
        TypeDesc::Struct(s) => {
            let members: Vec<(String, Type)> = s
                .members
                .iter()
                .map(|m| (m.name.clone(), m.ty.clone()))
                .collect();
            let (placed, _, _) = place_members(&members, layout)?;
            members
                .into_iter()
                .zip(placed)
                .map(|((name, ty), place)| entry(name, ty, place.offset, place.size, layout))
                .collect::<TypeResult<Vec<_>>>()?
        }
        _ => alloc::vec![entry(String::new(), ty.clone(), 0, byte_size, layout)?],
    };
    Ok(BufferLayout { byte_size, entries })
}

fn entry(
    name: String,
    ty: Type,
    offset: u32,
    byte_size: u32,
    layout: LayoutKind,
) -> TypeResult<BufferLayoutEntry> {
    let (array_stride, array_len, nested) = match ty.desc() {
        TypeDesc::Array(arr) => (
            self::array_stride(&arr.element, layout)?,
            arr.len,
            arr.element.as_struct().map(|_| arr.element.clone()),
        ),
        TypeDesc::Struct(_) => (0, 0, Some(ty.clone())),
        _ => (0, 0, None),
    };
    let sub_layout = match nested {
        Some(inner) => Some(Box::new(buffer_layout(&inner, layout)?)),
        None => None,
    };
    Ok(BufferLayoutEntry {
        name,
        offset,
        byte_size,
        ty,
        array_stride,
        array_len,
        sub_layout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn st(name: &str, layout: LayoutKind, members: &[(&str, Type)]) -> Type {
        Type::structure(
            name,
            members.iter().map(|(n, t)| (n.to_string(), t.clone())).collect(),
            layout,
        )
        .unwrap()
    }

    #[test]
    fn test_vector_alignment() {
        assert_eq!(alignment(&Type::vec2f(), LayoutKind::Default).unwrap(), 8);
        assert_eq!(alignment(&Type::vec3f(), LayoutKind::Default).unwrap(), 16);
        assert_eq!(size(&Type::vec3f(), LayoutKind::Default).unwrap(), 12);
        assert_eq!(alignment(&Type::vec4f(), LayoutKind::Std140).unwrap(), 16);
        assert_eq!(alignment(&Type::vec3f(), LayoutKind::Packed).unwrap(), 1);
        assert_eq!(size(&Type::vec3f(), LayoutKind::Packed).unwrap(), 12);
    }

    #[test]
    fn test_matrix_layouts() {
        assert_eq!(size(&Type::mat(4, 4), LayoutKind::Std140).unwrap(), 64);
        assert_eq!(size(&Type::mat(3, 3), LayoutKind::Default).unwrap(), 48);
        assert_eq!(alignment(&Type::mat(3, 3), LayoutKind::Default).unwrap(), 16);
        assert_eq!(size(&Type::mat(2, 2), LayoutKind::Default).unwrap(), 16);
        assert!(matches!(
            size(&Type::mat(2, 4), LayoutKind::Std140),
            Err(TypeError::Layout(_))
        ));
    }

    #[test]
    fn test_std140_array_stride() {
        let floats = Type::array(Type::f32(), 4).unwrap();
        assert!(matches!(
            size(&floats, LayoutKind::Std140),
            Err(TypeError::Layout(_))
        ));
        assert_eq!(size(&floats, LayoutKind::Std430).unwrap(), 16);
        let vecs = Type::array(Type::vec4f(), 4).unwrap();
        assert_eq!(size(&vecs, LayoutKind::Std140).unwrap(), 64);
        assert_eq!(array_stride(&Type::vec3f(), LayoutKind::Default).unwrap(), 16);
    }

    #[test]
    fn test_std140_struct_rounds_to_16() {
        let s = st("S", LayoutKind::Std140, &[("a", Type::f32())]);
        assert_eq!(alignment(&s, LayoutKind::Std140).unwrap(), 16);
        assert_eq!(size(&s, LayoutKind::Std140).unwrap(), 16);
        assert_eq!(size(&s, LayoutKind::Default).unwrap(), 4);
    }

    #[test]
    fn test_packed_layout() {
        let s = st(
            "P",
            LayoutKind::Packed,
            &[("a", Type::f32()), ("b", Type::vec3f()), ("c", Type::u32())],
        );
        let placed = s.as_struct().unwrap();
        assert_eq!(placed.members[1].layout.unwrap().offset, 4);
        assert_eq!(placed.members[2].layout.unwrap().offset, 16);
        assert_eq!(placed.size, Some(20));
        assert_eq!(placed.align, Some(1));
    }

    #[test]
    fn test_runtime_array_size_is_zero() {
        let rt = Type::runtime_array(Type::vec4f()).unwrap();
        assert_eq!(size(&rt, LayoutKind::Std430).unwrap(), 0);
        let s = st(
            "Particles",
            LayoutKind::Std430,
            &[("count", Type::u32()), ("items", rt)],
        );
        assert_eq!(s.as_struct().unwrap().members[1].layout.unwrap().offset, 16);
        assert_eq!(s.as_struct().unwrap().size, Some(16));
    }

    #[test]
    fn test_non_host_shareable() {
        assert!(matches!(
            size(&Type::bool(), LayoutKind::Default),
            Err(TypeError::NotHostShareable(_))
        ));
        assert!(size(&Type::sampler(super::super::SamplerKind::Sample), LayoutKind::Default).is_err());
    }

    #[test]
    fn test_struct_wrapped_size_is_multiple_of_align() {
        let prims = [
            Type::f32(),
            Type::vec2f(),
            Type::vec3f(),
            Type::vec4f(),
            Type::i32(),
            Type::vec(ScalarKind::U32, 3),
            Type::mat(3, 3),
            Type::mat(4, 3),
            Type::mat(2, 2),
        ];
        for layout in [LayoutKind::Default, LayoutKind::Std430, LayoutKind::Packed] {
            for p in &prims {
                let s = st("W", layout, &[("v", p.clone())]);
                let a = alignment(&s, layout).unwrap();
                let n = size(&s, layout).unwrap();
                assert_eq!(n % a, 0, "{} under {:?}", p, layout);
            }
        }
    }

    #[test]
    fn test_buffer_layout_nested() {
        let light = st(
            "Light",
            LayoutKind::Std140,
            &[("color", Type::vec3f()), ("power", Type::f32())],
        );
        let outer = st(
            "Scene",
            LayoutKind::Std140,
            &[
                ("time", Type::f32()),
                ("light", light.clone()),
                ("lights", Type::array(light, 2).unwrap()),
            ],
        );
        let layout = buffer_layout(&outer, LayoutKind::Std140).unwrap();
        assert_eq!(layout.byte_size, 64);
        assert_eq!(layout.offset_of("light"), Some(16));
        assert_eq!(layout.offset_of("light.power"), Some(28));
        let lights = layout.entry("lights").unwrap();
        assert_eq!(lights.offset, 32);
        assert_eq!(lights.array_stride, 16);
        assert_eq!(lights.array_len, 2);
        assert!(lights.sub_layout.is_some());
    }
}
