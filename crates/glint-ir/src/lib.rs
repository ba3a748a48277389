//! Shader intermediate representation for the glint cross-compiler.
//!
//! This crate defines the target-neutral pieces shared by every backend:
//! - Targets and shader stages
//! - The shader type system (scalars, vectors, matrices, structs, arrays,
//!   pointers, samplers, textures, function signatures)
//! - Host-visible buffer layouts (default, std140, std430, packed)
//! - A text parser for canonical type identifiers
//! - The typed shader AST produced by the builder
//! - Whole-module analyses (write sets, references)

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod analysis;
pub mod ast;
mod error;
mod parser;
mod target;
pub mod types;

pub use analysis::{References, WriteSet};
pub use error::{TypeError, TypeResult};
pub use parser::parse_type;
pub use target::{ShaderStage, StageMask, Target, TargetMask};
pub use types::{
    buffer_layout, is_compatible, is_identifier, type_name, AddressSpace, ArrayType, BufferLayout,
    BufferLayoutEntry, FunctionParam, FunctionType, LayoutKind, MemberLayout, PointerType,
    PrimitiveType, SampleType, SamplerKind, ScalarKind, StorageAccess, StructMember, StructType,
    TexelFormat, TextureDim, TextureType, Type, TypeCache, TypeDesc,
};
