//! Texture type descriptions and storage texel formats.

use alloc::{format, string::String};

use crate::error::{TypeError, TypeResult};

use super::ScalarKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureDim {
    D1,
    D2,
    D3,
    Cube,
}

impl TextureDim {
    pub fn name(self) -> &'static str {
        match self {
            TextureDim::D1 => "1d",
            TextureDim::D2 => "2d",
            TextureDim::D3 => "3d",
            TextureDim::Cube => "cube",
        }
    }

    /// Number of coordinate components used to address the texture.
    pub fn coords(self) -> u8 {
        match self {
            TextureDim::D1 => 1,
            TextureDim::D2 => 2,
            TextureDim::D3 | TextureDim::Cube => 3,
        }
    }
}

/// Component type read out of a sampled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SampleType {
    Float,
    Sint,
    Uint,
}

impl SampleType {
    pub fn scalar(self) -> ScalarKind {
        match self {
            SampleType::Float => ScalarKind::F32,
            SampleType::Sint => ScalarKind::I32,
            SampleType::Uint => ScalarKind::U32,
        }
    }

    fn wgsl(self) -> &'static str {
        self.scalar().name(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageAccess {
    Read,
    Write,
    ReadWrite,
}

impl StorageAccess {
    pub fn name(self) -> &'static str {
        match self {
            StorageAccess::Read => "read",
            StorageAccess::Write => "write",
            StorageAccess::ReadWrite => "read_write",
        }
    }
}

/// Texel formats usable with storage textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TexelFormat {
    Rgba8Unorm,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    R32Uint,
    R32Sint,
    R32Float,
    Rg32Uint,
    Rg32Sint,
    Rg32Float,
    Rgba32Uint,
    Rgba32Sint,
    Rgba32Float,
    Bgra8Unorm,
}

impl TexelFormat {
    pub const ALL: [TexelFormat; 17] = [
        TexelFormat::Rgba8Unorm,
        TexelFormat::Rgba8Snorm,
        TexelFormat::Rgba8Uint,
        TexelFormat::Rgba8Sint,
        TexelFormat::Rgba16Uint,
        TexelFormat::Rgba16Sint,
        TexelFormat::Rgba16Float,
        TexelFormat::R32Uint,
        TexelFormat::R32Sint,
        TexelFormat::R32Float,
        TexelFormat::Rg32Uint,
        TexelFormat::Rg32Sint,
        TexelFormat::Rg32Float,
        TexelFormat::Rgba32Uint,
        TexelFormat::Rgba32Sint,
        TexelFormat::Rgba32Float,
        TexelFormat::Bgra8Unorm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TexelFormat::Rgba8Unorm => "rgba8unorm",
            TexelFormat::Rgba8Snorm => "rgba8snorm",
            TexelFormat::Rgba8Uint => "rgba8uint",
            TexelFormat::Rgba8Sint => "rgba8sint",
            TexelFormat::Rgba16Uint => "rgba16uint",
            TexelFormat::Rgba16Sint => "rgba16sint",
            TexelFormat::Rgba16Float => "rgba16float",
            TexelFormat::R32Uint => "r32uint",
            TexelFormat::R32Sint => "r32sint",
            TexelFormat::R32Float => "r32float",
            TexelFormat::Rg32Uint => "rg32uint",
            TexelFormat::Rg32Sint => "rg32sint",
            TexelFormat::Rg32Float => "rg32float",
            TexelFormat::Rgba32Uint => "rgba32uint",
            TexelFormat::Rgba32Sint => "rgba32sint",
            TexelFormat::Rgba32Float => "rgba32float",
            TexelFormat::Bgra8Unorm => "bgra8unorm",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Component type seen by shader code reading or writing this format.
    pub fn sample_type(self) -> SampleType {
        match self {
            TexelFormat::Rgba8Uint
            | TexelFormat::Rgba16Uint
            | TexelFormat::R32Uint
            | TexelFormat::Rg32Uint
            | TexelFormat::Rgba32Uint => SampleType::Uint,
            TexelFormat::Rgba8Sint
            | TexelFormat::Rgba16Sint
            | TexelFormat::R32Sint
            | TexelFormat::Rg32Sint
            | TexelFormat::Rgba32Sint => SampleType::Sint,
            _ => SampleType::Float,
        }
    }
}

/// A texture binding's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureType {
    pub dim: TextureDim,
    pub arrayed: bool,
    pub multisampled: bool,
    pub depth: bool,
    pub external: bool,
    pub sample_type: SampleType,
    pub storage: Option<(TexelFormat, StorageAccess)>,
}

impl TextureType {
    /// Sampled (filterable or loadable) texture.
    pub fn sampled(dim: TextureDim, sample_type: SampleType) -> Self {
        TextureType {
            dim,
            arrayed: false,
            multisampled: false,
            depth: false,
            external: false,
            sample_type,
            storage: None,
        }
    }

    pub fn depth(dim: TextureDim) -> Self {
        TextureType {
            depth: true,
            ..TextureType::sampled(dim, SampleType::Float)
        }
    }

    pub fn multisampled(sample_type: SampleType) -> Self {
        TextureType {
            multisampled: true,
            ..TextureType::sampled(TextureDim::D2, sample_type)
        }
    }

    pub fn storage(dim: TextureDim, format: TexelFormat, access: StorageAccess) -> Self {
        TextureType {
            storage: Some((format, access)),
            ..TextureType::sampled(dim, format.sample_type())
        }
    }

    pub fn external() -> Self {
        TextureType {
            external: true,
            ..TextureType::sampled(TextureDim::D2, SampleType::Float)
        }
    }

    /// The arrayed variant of this texture.
    pub fn array(self) -> Self {
        TextureType {
            arrayed: true,
            ..self
        }
    }

    pub fn is_storage(&self) -> bool {
        self.storage.is_some()
    }

    /// Check if the texture can be read through a sampler.
    pub fn is_sampleable(&self) -> bool {
        !self.is_storage() && !self.multisampled
    }

    pub(crate) fn validate(&self) -> TypeResult<()> {
        let invalid = |what: &str| Err(TypeError::invalid(format!("{}: {}", self.id(), what)));
        if self.external {
            if self.arrayed || self.multisampled || self.depth || self.is_storage() {
                return invalid("external textures take no other flags");
            }
            return Ok(());
        }
        if self.arrayed && !matches!(self.dim, TextureDim::D2 | TextureDim::Cube) {
            return invalid("only 2d and cube textures can be arrayed");
        }
        if self.multisampled && (self.dim != TextureDim::D2 || self.arrayed) {
            return invalid("multisampled textures must be non-arrayed 2d");
        }
        if self.depth && !matches!(self.dim, TextureDim::D2 | TextureDim::Cube) {
            return invalid("depth textures must be 2d or cube");
        }
        if self.depth && self.multisampled && self.dim != TextureDim::D2 {
            return invalid("multisampled depth textures must be 2d");
        }
        if let Some((format, _)) = self.storage {
            if self.multisampled || self.depth || self.dim == TextureDim::Cube {
                return invalid("storage textures must be plain 1d, 2d or 3d");
            }
            if format.sample_type() != self.sample_type {
                return invalid("storage texel format disagrees with sample type");
            }
        }
        Ok(())
    }

    pub(crate) fn id(&self) -> String {
        let array = if self.arrayed { "_array" } else { "" };
        if self.external {
            return String::from("texture_external");
        }
        if let Some((format, access)) = self.storage {
            return format!(
                "texture_storage_{}{}<{},{}>",
                self.dim.name(),
                array,
                format.name(),
                access.name()
            );
        }
        if self.depth {
            let ms = if self.multisampled { "multisampled_" } else { "" };
            return format!("texture_depth_{}{}{}", ms, self.dim.name(), array);
        }
        if self.multisampled {
            return format!("texture_multisampled_2d<{}>", self.sample_type.wgsl());
        }
        format!(
            "texture_{}{}<{}>",
            self.dim.name(),
            array,
            self.sample_type.wgsl()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_ids() {
        let t = TextureType::sampled(TextureDim::D2, SampleType::Float);
        assert_eq!(t.id(), "texture_2d<f32>");
        assert_eq!(t.array().id(), "texture_2d_array<f32>");
        assert_eq!(TextureType::depth(TextureDim::Cube).id(), "texture_depth_cube");
        assert_eq!(
            TextureType::storage(TextureDim::D2, TexelFormat::Rgba8Unorm, StorageAccess::Write).id(),
            "texture_storage_2d<rgba8unorm,write>"
        );
        assert_eq!(
            TextureType::multisampled(SampleType::Uint).id(),
            "texture_multisampled_2d<u32>"
        );
        assert_eq!(TextureType::external().id(), "texture_external");
    }

    #[test]
    fn test_texture_validation() {
        assert!(TextureType::sampled(TextureDim::D3, SampleType::Float)
            .array()
            .validate()
            .is_err());
        assert!(TextureType::depth(TextureDim::D3).validate().is_err());
        assert!(TextureType::storage(TextureDim::Cube, TexelFormat::R32Float, StorageAccess::Read)
            .validate()
            .is_err());
        assert!(TextureType::depth(TextureDim::Cube).array().validate().is_ok());
    }

    #[test]
    fn test_format_lookup() {
        assert_eq!(TexelFormat::from_name("rg32sint"), Some(TexelFormat::Rg32Sint));
        assert_eq!(TexelFormat::from_name("rgb8"), None);
        assert_eq!(TexelFormat::R32Uint.sample_type(), SampleType::Uint);
    }
}
