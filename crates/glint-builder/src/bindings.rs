//! Host-facing description of the resources a program binds.

use alloc::{string::String, vec::Vec};

use glint_ir::{
    BufferLayout, LayoutKind, SampleType, SamplerKind, StageMask, StorageAccess, TexelFormat,
    TextureDim, TextureType, Type,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    UniformBuffer,
    StorageBuffer,
    Texture,
    Sampler,
    StorageTexture,
    ExternalTexture,
}

impl ResourceKind {
    pub fn of_texture(tex: &TextureType) -> Self {
        if tex.is_storage() {
            ResourceKind::StorageTexture
        } else if tex.external {
            ResourceKind::ExternalTexture
        } else {
            ResourceKind::Texture
        }
    }
}

/// Buffer contents as the host must lay them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferBinding {
    pub ty: Type,
    pub layout: LayoutKind,
    pub byte_layout: BufferLayout,
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub sample_type: SampleType,
    pub dim: TextureDim,
    pub arrayed: bool,
    pub multisampled: bool,
    pub depth: bool,
    pub storage: Option<(TexelFormat, StorageAccess)>,
}

impl From<&TextureType> for TextureBinding {
    fn from(tex: &TextureType) -> Self {
        TextureBinding {
            sample_type: tex.sample_type,
            dim: tex.dim,
            arrayed: tex.arrayed,
            multisampled: tex.multisampled,
            depth: tex.depth,
            storage: tex.storage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    pub binding: u32,
    pub name: String,
    pub kind: ResourceKind,
    pub visibility: StageMask,
    /// Set for samplers the builder created to pair with a texture.
    pub auto_sampler: bool,
    pub buffer: Option<BufferBinding>,
    pub texture: Option<TextureBinding>,
    pub sampler: Option<SamplerKind>,
}

/// All bindings of one group, ordered by binding index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindGroupLayout {
    pub group: u32,
    pub entries: Vec<BindingEntry>,
}

impl BindGroupLayout {
    pub fn entry(&self, name: &str) -> Option<&BindingEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
