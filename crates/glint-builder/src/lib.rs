//! Shader program builder for the glint cross-compiler.
//!
//! Shaders are described by Rust closures that call into a per-stage
//! [`ShaderCtx`]: declare resources and stage IO, define functions, build
//! expressions through [`Exp`] handles and drive control flow. The
//! [`ProgramBuilder`] runs those descriptions, merges the stages' resources
//! into bind group layouts and emits GLSL ES 1.00, GLSL ES 3.00 or WGSL.

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod bindings;
mod builtins;
mod control;
mod ctx;
mod error;
mod exp;
mod func;
mod literal;
mod merge;
mod ops;
mod program;
mod resources;
mod scope;

pub use bindings::{BindGroupLayout, BindingEntry, BufferBinding, ResourceKind, TextureBinding};
pub use builtins::{
    BuiltinDef, BuiltinRegistry, Lowering, Overload, ParamKind, ParamSpec, RefAccess, TextureOp,
};
pub use control::IfChain;
pub use ctx::ShaderCtx;
pub use error::{BuildError, BuildResult};
pub use exp::Exp;
pub use func::Param;
pub use literal::LiteralValue;
pub use program::{BuildOptions, ComputeProgram, ProgramBuilder, RenderProgram};

pub use glint_ir::{
    ast::{BuiltinVar, VertexSemantic},
    LayoutKind, SampleType, SamplerKind, ScalarKind, ShaderStage, StageMask, StorageAccess,
    TexelFormat, TextureDim, TextureType, Target, Type,
};
