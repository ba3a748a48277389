//! Shader type system.
//!
//! A [`Type`] is an immutable, cheaply clonable handle around a [`TypeDesc`].
//! Every type carries a canonical identifier string; two types are equal
//! exactly when their identifiers are equal.

mod cache;
mod layout;
mod naming;
mod texture;

pub use cache::TypeCache;
pub use layout::{
    alignment, array_stride, buffer_layout, size, BufferLayout, BufferLayoutEntry, LayoutKind,
};
pub use naming::{glsl_texture_name, type_name};
pub use texture::{SampleType, StorageAccess, TexelFormat, TextureDim, TextureType};

use alloc::{
    format,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use core::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::error::{TypeError, TypeResult};

/// Scalar element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    F16,
    F32,
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
}

impl ScalarKind {
    /// Size of one element in host memory. Bools have no host representation
    /// but are four bytes wide on every target for local storage.
    pub fn byte_size(self) -> u32 {
        match self {
            ScalarKind::I8 | ScalarKind::U8 => 1,
            ScalarKind::F16 | ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::Bool | ScalarKind::F32 | ScalarKind::I32 | ScalarKind::U32 => 4,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::F16 | ScalarKind::F32)
    }

    pub fn is_signed_int(self) -> bool {
        matches!(self, ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32)
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(self, ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_numeric(self) -> bool {
        self != ScalarKind::Bool
    }

    /// Canonical spelling of the scalar, honoring the normalized flag for
    /// 8- and 16-bit integers.
    pub fn name(self, normalized: bool) -> &'static str {
        match (self, normalized) {
            (ScalarKind::Bool, _) => "bool",
            (ScalarKind::F16, _) => "f16",
            (ScalarKind::F32, _) => "f32",
            (ScalarKind::I8, false) => "i8",
            (ScalarKind::I8, true) => "snorm8",
            (ScalarKind::I16, false) => "i16",
            (ScalarKind::I16, true) => "snorm16",
            (ScalarKind::I32, _) => "i32",
            (ScalarKind::U8, false) => "u8",
            (ScalarKind::U8, true) => "unorm8",
            (ScalarKind::U16, false) => "u16",
            (ScalarKind::U16, true) => "unorm16",
            (ScalarKind::U32, _) => "u32",
        }
    }
}

/// Scalars, vectors and matrices.
///
/// Vectors use `rows = N, cols = 1`; matrices use `cols = C, rows = R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveType {
    pub scalar: ScalarKind,
    pub rows: u8,
    pub cols: u8,
    pub normalized: bool,
}

impl PrimitiveType {
    pub fn new(scalar: ScalarKind, rows: u8, cols: u8, normalized: bool) -> TypeResult<Self> {
        let prim = PrimitiveType {
            scalar,
            rows,
            cols,
            normalized,
        };
        prim.validate()?;
        Ok(prim)
    }

    pub const fn scalar(scalar: ScalarKind) -> Self {
        PrimitiveType {
            scalar,
            rows: 1,
            cols: 1,
            normalized: false,
        }
    }

    pub const fn vector(scalar: ScalarKind, n: u8) -> Self {
        PrimitiveType {
            scalar,
            rows: n,
            cols: 1,
            normalized: false,
        }
    }

    pub const fn matrix(scalar: ScalarKind, cols: u8, rows: u8) -> Self {
        PrimitiveType {
            scalar,
            rows,
            cols,
            normalized: false,
        }
    }

    fn validate(&self) -> TypeResult<()> {
        if !(1..=4).contains(&self.rows) || !(1..=4).contains(&self.cols) {
            return Err(TypeError::invalid(format!(
                "primitive dimensions {}x{} out of range",
                self.cols, self.rows
            )));
        }
        if self.cols > 1 {
            if self.rows < 2 {
                return Err(TypeError::invalid("matrices need at least two rows"));
            }
            if !self.scalar.is_float() {
                return Err(TypeError::invalid("matrices must have a float element type"));
            }
        }
        if self.normalized && !matches!(self.scalar.byte_size(), 1 | 2) {
            return Err(TypeError::invalid(
                "only 8- and 16-bit integers can be normalized",
            ));
        }
        if self.normalized && !self.scalar.is_integer() {
            return Err(TypeError::invalid("only integers can be normalized"));
        }
        Ok(())
    }

    pub fn is_scalar(&self) -> bool {
        self.rows == 1 && self.cols == 1
    }

    pub fn is_vector(&self) -> bool {
        self.rows > 1 && self.cols == 1
    }

    pub fn is_matrix(&self) -> bool {
        self.cols > 1
    }

    pub fn components(&self) -> u32 {
        self.rows as u32 * self.cols as u32
    }

    /// The column type of a matrix, or the type itself otherwise.
    pub fn column(&self) -> PrimitiveType {
        PrimitiveType {
            cols: 1,
            ..*self
        }
    }

    /// The scalar element of this primitive.
    pub fn element(&self) -> PrimitiveType {
        PrimitiveType {
            rows: 1,
            cols: 1,
            ..*self
        }
    }

    fn id(&self) -> String {
        let scalar = self.scalar.name(self.normalized);
        if self.is_scalar() {
            scalar.to_string()
        } else if self.is_vector() {
            format!("vec{}<{}>", self.rows, scalar)
        } else {
            format!("mat{}x{}<{}>", self.cols, self.rows, scalar)
        }
    }
}

/// Computed placement of a struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLayout {
    pub offset: u32,
    pub align: u32,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub struct StructMember {
    pub name: String,
    pub ty: Type,
    /// Placement under the struct's own layout; `None` when the struct is not
    /// host-shareable.
    pub layout: Option<MemberLayout>,
    /// Alignment and size under the default layout, used to decide whether
    /// WGSL needs explicit `@align`/`@size` attributes.
    pub default_align: Option<u32>,
    pub default_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    pub members: Vec<StructMember>,
    pub layout: LayoutKind,
    pub align: Option<u32>,
    pub size: Option<u32>,
}

impl StructType {
    pub fn new(name: &str, members: Vec<(String, Type)>, layout: LayoutKind) -> TypeResult<Self> {
        if !is_identifier(name) {
            return Err(TypeError::invalid(format!("invalid struct name '{}'", name)));
        }
        if members.is_empty() {
            return Err(TypeError::invalid(format!("struct {} has no members", name)));
        }
        for (i, (member, ty)) in members.iter().enumerate() {
            if !is_identifier(member) {
                return Err(TypeError::invalid(format!(
                    "invalid member name '{}' in struct {}",
                    member, name
                )));
            }
            if members[..i].iter().any(|(other, _)| other == member) {
                return Err(TypeError::invalid(format!(
                    "duplicate member '{}' in struct {}",
                    member, name
                )));
            }
            match ty.desc() {
                TypeDesc::Void
                | TypeDesc::Any
                | TypeDesc::Function(_)
                | TypeDesc::Pointer(_)
                | TypeDesc::Sampler(_)
                | TypeDesc::Texture(_) => {
                    return Err(TypeError::invalid(format!(
                        "member '{}' of struct {} cannot have type {}",
                        member, name, ty
                    )))
                }
                _ if ty.has_runtime_tail() && i + 1 != members.len() => {
                    return Err(TypeError::layout(format!(
                        "runtime-sized array '{}' must be the last member of struct {}",
                        member, name
                    )))
                }
                _ => {}
            }
        }

        let placed = match layout::place_members(&members, layout) {
            Ok(placed) => Some(placed),
            Err(TypeError::NotHostShareable(_)) if layout == LayoutKind::Default => None,
            Err(err) => return Err(err),
        };

        let (member_layouts, align, size) = match placed {
            Some((m, a, s)) => (m.into_iter().map(Some).collect(), Some(a), Some(s)),
            None => (members.iter().map(|_| None).collect::<Vec<_>>(), None, None),
        };

        let members = members
            .into_iter()
            .zip(member_layouts)
            .map(|((name, ty), layout)| StructMember {
                default_align: alignment(&ty, LayoutKind::Default).ok(),
                default_size: self::size(&ty, LayoutKind::Default).ok(),
                name,
                ty,
                layout,
            })
            .collect();

        Ok(StructType {
            name: name.to_string(),
            members,
            layout,
            align,
            size,
        })
    }

    pub fn member(&self, name: &str) -> Option<&StructMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    pub fn is_host_shareable(&self) -> bool {
        self.size.is_some()
    }

    fn id(&self) -> String {
        let mut id = format!("struct {}{{", self.name);
        for (i, m) in self.members.iter().enumerate() {
            if i > 0 {
                id.push(',');
            }
            id.push_str(&m.name);
            id.push(':');
            id.push_str(m.ty.id());
        }
        id.push('}');
        if self.layout != LayoutKind::Default {
            id.push('@');
            id.push_str(self.layout.name());
        }
        id
    }
}

/// Fixed or runtime-sized array. `len == 0` means runtime-sized.
#[derive(Debug, Clone)]
pub struct ArrayType {
    pub element: Type,
    pub len: u32,
}

impl ArrayType {
    pub fn is_runtime(&self) -> bool {
        self.len == 0
    }
}

/// Memory regions a pointer can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressSpace {
    Function,
    Private,
    Workgroup,
    Uniform,
    Storage,
    Handle,
}

impl AddressSpace {
    pub fn name(self) -> &'static str {
        match self {
            AddressSpace::Function => "function",
            AddressSpace::Private => "private",
            AddressSpace::Workgroup => "workgroup",
            AddressSpace::Uniform => "uniform",
            AddressSpace::Storage => "storage",
            AddressSpace::Handle => "handle",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "function" => AddressSpace::Function,
            "private" => AddressSpace::Private,
            "workgroup" => AddressSpace::Workgroup,
            "uniform" => AddressSpace::Uniform,
            "storage" => AddressSpace::Storage,
            "handle" => AddressSpace::Handle,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PointerType {
    pub pointee: Type,
    pub space: AddressSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SamplerKind {
    Sample,
    Comparison,
}

#[derive(Debug, Clone)]
pub struct FunctionParam {
    pub name: String,
    pub ty: Type,
    pub by_ref: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionType {
    pub name: String,
    pub params: Vec<FunctionParam>,
    pub ret: Type,
}

/// The shape of a type.
#[derive(Debug, Clone)]
pub enum TypeDesc {
    Void,
    /// Wildcard that is compatible with every type.
    Any,
    Primitive(PrimitiveType),
    Struct(StructType),
    Array(ArrayType),
    Pointer(PointerType),
    Atomic(ScalarKind),
    Sampler(SamplerKind),
    Texture(TextureType),
    Function(FunctionType),
}

#[derive(Debug)]
struct TypeInner {
    id: String,
    desc: TypeDesc,
}

/// Shared handle to an immutable type description.
#[derive(Clone)]
pub struct Type(Arc<TypeInner>);

impl Type {
    pub fn new(desc: TypeDesc) -> Self {
        let id = describe(&desc);
        Type(Arc::new(TypeInner { id, desc }))
    }

    pub fn desc(&self) -> &TypeDesc {
        &self.0.desc
    }

    /// Canonical identifier, e.g. `vec3<f32>` or `array<mat4x4<f32>,2>`.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn void() -> Self {
        Type::new(TypeDesc::Void)
    }

    pub fn any() -> Self {
        Type::new(TypeDesc::Any)
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Type::new(TypeDesc::Primitive(PrimitiveType::scalar(kind)))
    }

    pub fn bool() -> Self {
        Type::scalar(ScalarKind::Bool)
    }

    pub fn f32() -> Self {
        Type::scalar(ScalarKind::F32)
    }

    pub fn f16() -> Self {
        Type::scalar(ScalarKind::F16)
    }

    pub fn i32() -> Self {
        Type::scalar(ScalarKind::I32)
    }

    pub fn u32() -> Self {
        Type::scalar(ScalarKind::U32)
    }

    /// Vector of `n` (2..=4) elements.
    pub fn vec(kind: ScalarKind, n: u8) -> Self {
        Type::new(TypeDesc::Primitive(PrimitiveType::vector(kind, n)))
    }

    pub fn vec2f() -> Self {
        Type::vec(ScalarKind::F32, 2)
    }

    pub fn vec3f() -> Self {
        Type::vec(ScalarKind::F32, 3)
    }

    pub fn vec4f() -> Self {
        Type::vec(ScalarKind::F32, 4)
    }

    /// `f32` matrix with `cols` columns of `rows` elements.
    pub fn mat(cols: u8, rows: u8) -> Self {
        Type::new(TypeDesc::Primitive(PrimitiveType::matrix(
            ScalarKind::F32,
            cols,
            rows,
        )))
    }

    pub fn primitive(prim: PrimitiveType) -> TypeResult<Self> {
        prim.validate()?;
        Ok(Type::new(TypeDesc::Primitive(prim)))
    }

    pub fn array(element: Type, len: u32) -> TypeResult<Self> {
        match element.desc() {
            TypeDesc::Void
            | TypeDesc::Any
            | TypeDesc::Function(_)
            | TypeDesc::Pointer(_)
            | TypeDesc::Sampler(_)
            | TypeDesc::Texture(_) => {
                return Err(TypeError::invalid(format!(
                    "arrays of {} are not allowed",
                    element
                )))
            }
            TypeDesc::Array(inner) if inner.is_runtime() => {
                return Err(TypeError::layout(
                    "runtime-sized arrays cannot be array elements",
                ))
            }
            TypeDesc::Struct(s) if ends_with_runtime_array(s) => {
                return Err(TypeError::layout(format!(
                    "struct {} ends in a runtime-sized array and cannot be an array element",
                    s.name
                )))
            }
            _ => {}
        }
        Ok(Type::new(TypeDesc::Array(ArrayType { element, len })))
    }

    pub fn runtime_array(element: Type) -> TypeResult<Self> {
        Type::array(element, 0)
    }

    pub fn pointer(pointee: Type, space: AddressSpace) -> Self {
        Type::new(TypeDesc::Pointer(PointerType { pointee, space }))
    }

    pub fn atomic(kind: ScalarKind) -> TypeResult<Self> {
        if !matches!(kind, ScalarKind::I32 | ScalarKind::U32) {
            return Err(TypeError::invalid(format!(
                "atomic<{}> is not allowed",
                kind.name(false)
            )));
        }
        Ok(Type::new(TypeDesc::Atomic(kind)))
    }

    pub fn sampler(kind: SamplerKind) -> Self {
        Type::new(TypeDesc::Sampler(kind))
    }

    pub fn texture(tex: TextureType) -> TypeResult<Self> {
        tex.validate()?;
        Ok(Type::new(TypeDesc::Texture(tex)))
    }

    /// Struct type with computed member placement under `layout`.
    pub fn structure(name: &str, members: Vec<(String, Type)>, layout: LayoutKind) -> TypeResult<Self> {
        Ok(Type::new(TypeDesc::Struct(StructType::new(
            name, members, layout,
        )?)))
    }

    pub fn function(func: FunctionType) -> Self {
        Type::new(TypeDesc::Function(func))
    }

    pub fn is_void(&self) -> bool {
        matches!(self.desc(), TypeDesc::Void)
    }

    pub fn is_any(&self) -> bool {
        matches!(self.desc(), TypeDesc::Any)
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveType> {
        match self.desc() {
            TypeDesc::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self.desc() {
            TypeDesc::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self.desc() {
            TypeDesc::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerType> {
        match self.desc() {
            TypeDesc::Pointer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureType> {
        match self.desc() {
            TypeDesc::Texture(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_sampler(&self) -> Option<SamplerKind> {
        match self.desc() {
            TypeDesc::Sampler(k) => Some(*k),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.as_primitive().is_some_and(|p| p.is_scalar())
    }

    pub fn is_vector(&self) -> bool {
        self.as_primitive().is_some_and(|p| p.is_vector())
    }

    pub fn is_matrix(&self) -> bool {
        self.as_primitive().is_some_and(|p| p.is_matrix())
    }

    /// Scalar element kind of a primitive or atomic.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.desc() {
            TypeDesc::Primitive(p) => Some(p.scalar),
            TypeDesc::Atomic(k) => Some(*k),
            _ => None,
        }
    }

    /// Strip one level of pointer indirection.
    pub fn deref(&self) -> &Type {
        match self.desc() {
            TypeDesc::Pointer(p) => &p.pointee,
            _ => self,
        }
    }

    /// Check if any bool is reachable from this type.
    pub fn contains_bool(&self) -> bool {
        match self.desc() {
            TypeDesc::Primitive(p) => p.scalar == ScalarKind::Bool,
            TypeDesc::Struct(s) => s.members.iter().any(|m| m.ty.contains_bool()),
            TypeDesc::Array(a) => a.element.contains_bool(),
            _ => false,
        }
    }

    /// Check if values of this type may live in uniform or storage memory.
    pub fn is_host_shareable(&self) -> bool {
        match self.desc() {
            TypeDesc::Primitive(p) => p.scalar != ScalarKind::Bool,
            TypeDesc::Atomic(_) => true,
            TypeDesc::Array(a) => a.element.is_host_shareable(),
            TypeDesc::Struct(s) => s.members.iter().all(|m| m.ty.is_host_shareable()),
            _ => false,
        }
    }

    /// Check if this type is a struct whose last member is runtime-sized.
    pub fn has_runtime_tail(&self) -> bool {
        match self.desc() {
            TypeDesc::Array(a) => a.is_runtime(),
            TypeDesc::Struct(s) => ends_with_runtime_array(s),
            _ => false,
        }
    }
}

fn ends_with_runtime_array(s: &StructType) -> bool {
    s.members.last().is_some_and(|m| m.ty.has_runtime_tail())
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.id() == other.id()
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.id())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Check whether a value of type `b` may be used where `a` is expected.
///
/// `any` matches everything; pointers must agree on address space; structs
/// match on their ordered member names and types, whatever they are called;
/// otherwise the canonical identifiers must match.
pub fn is_compatible(a: &Type, b: &Type) -> bool {
    if a.is_any() || b.is_any() {
        return true;
    }
    match (a.desc(), b.desc()) {
        (TypeDesc::Pointer(pa), TypeDesc::Pointer(pb)) => {
            pa.space == pb.space && is_compatible(&pa.pointee, &pb.pointee)
        }
        (TypeDesc::Array(aa), TypeDesc::Array(ab)) => {
            aa.len == ab.len && is_compatible(&aa.element, &ab.element)
        }
        (TypeDesc::Struct(sa), TypeDesc::Struct(sb)) => {
            sa.members.len() == sb.members.len()
                && sa
                    .members
                    .iter()
                    .zip(&sb.members)
                    .all(|(ma, mb)| ma.name == mb.name && is_compatible(&ma.ty, &mb.ty))
        }
        _ => a == b,
    }
}

/// Check if `name` is a plain `[A-Za-z_][A-Za-z0-9_]*` identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn describe(desc: &TypeDesc) -> String {
    match desc {
        TypeDesc::Void => "void".to_string(),
        TypeDesc::Any => "any".to_string(),
        TypeDesc::Primitive(p) => p.id(),
        TypeDesc::Struct(s) => s.id(),
        TypeDesc::Array(a) if a.is_runtime() => format!("array<{}>", a.element.id()),
        TypeDesc::Array(a) => format!("array<{},{}>", a.element.id(), a.len),
        TypeDesc::Pointer(p) => format!("ptr<{},{}>", p.space.name(), p.pointee.id()),
        TypeDesc::Atomic(k) => format!("atomic<{}>", k.name(false)),
        TypeDesc::Sampler(SamplerKind::Sample) => "sampler".to_string(),
        TypeDesc::Sampler(SamplerKind::Comparison) => "sampler_comparison".to_string(),
        TypeDesc::Texture(t) => t.id(),
        TypeDesc::Function(f) => {
            let params: Vec<String> = f
                .params
                .iter()
                .map(|p| {
                    if p.by_ref {
                        format!("inout {}", p.ty.id())
                    } else {
                        p.ty.id().to_string()
                    }
                })
                .collect();
            format!("fn {}({})->{}", f.name, params.join(","), f.ret.id())
        }
    }
}
