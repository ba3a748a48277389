//! Whole-module analyses used by the backends.

mod refs;
mod writes;

pub use refs::References;
pub use writes::WriteSet;
