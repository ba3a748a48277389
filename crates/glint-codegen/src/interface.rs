//! Facts about a stage that the emitters need beyond the module itself.

use alloc::{
    collections::{BTreeMap, BTreeSet},
    string::String,
};

use glint_ir::{Target, WriteSet};

#[derive(Debug, Clone)]
pub struct ShaderInterface {
    pub target: Target,
    pub writes: WriteSet,
    /// Global name to emitted access path, e.g. `mvp` to
    /// `vertexUniformBlock0.mvp` for uniforms folded into a block.
    pub renames: BTreeMap<String, String>,
    /// Depth textures read through a comparison sampler.
    pub comparison_textures: BTreeSet<String>,
    /// GLSL extensions to enable.
    pub extensions: BTreeSet<String>,
    pub workgroup_size: [u32; 3],
}

impl ShaderInterface {
    pub fn new(target: Target) -> Self {
        ShaderInterface {
            target,
            writes: WriteSet::default(),
            renames: BTreeMap::new(),
            comparison_textures: BTreeSet::new(),
            extensions: BTreeSet::new(),
            workgroup_size: [1, 1, 1],
        }
    }

    pub fn with_writes(mut self, writes: WriteSet) -> Self {
        self.writes = writes;
        self
    }

    pub fn rename(&self, name: &str) -> Option<&str> {
        self.renames.get(name).map(String::as_str)
    }
}
