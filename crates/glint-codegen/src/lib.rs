//! Source emitters for the glint shader IR.
//!
//! Three backends turn a [`ShaderModule`](glint_ir::ast::ShaderModule) into
//! shader text:
//! - GLSL ES 1.00 (WebGL1)
//! - GLSL ES 3.00 (WebGL2)
//! - WGSL (WebGPU)
//!
//! Backends are purely syntactic: builtin lowering, overload resolution and
//! resource binding all happen before emission. What the emitters still
//! decide is declaration form (`const`/`let`/`var`), stage IO plumbing and
//! dialect-specific loop shapes.

#![no_std]

extern crate alloc;

mod backend;
mod error;
mod interface;
mod writer;

pub use backend::{backend_for, emit, glsl::GlslBackend, glsl::GlslDialect, wgsl::WgslBackend, ShaderBackend};
pub use error::{CodegenError, CodegenResult};
pub use interface::ShaderInterface;
pub use writer::SourceWriter;
