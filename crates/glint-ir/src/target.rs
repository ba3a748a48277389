//! Compilation targets and shader stages.

use alloc::vec::Vec;
use core::{fmt, ops::BitOr};

/// A shading-language target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    /// GLSL ES 1.00
    WebGL1,
    /// GLSL ES 3.00
    WebGL2,
    /// WGSL
    WebGPU,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::WebGL1, Target::WebGL2, Target::WebGPU];

    /// The single-bit mask for this target.
    pub fn mask(self) -> TargetMask {
        match self {
            Target::WebGL1 => TargetMask::WEBGL1,
            Target::WebGL2 => TargetMask::WEBGL2,
            Target::WebGPU => TargetMask::WEBGPU,
        }
    }

    /// Check if this target emits one of the GLSL dialects.
    pub fn is_glsl(self) -> bool {
        matches!(self, Target::WebGL1 | Target::WebGL2)
    }

    pub fn name(self) -> &'static str {
        match self {
            Target::WebGL1 => "webgl1",
            Target::WebGL2 => "webgl2",
            Target::WebGPU => "webgpu",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of targets, used to restrict builtin overloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetMask(u8);

impl TargetMask {
    pub const NONE: TargetMask = TargetMask(0);
    pub const WEBGL1: TargetMask = TargetMask(1);
    pub const WEBGL2: TargetMask = TargetMask(2);
    pub const WEBGPU: TargetMask = TargetMask(4);
    /// Both GLSL dialects.
    pub const GLSL: TargetMask = TargetMask(3);
    /// GLSL ES 3.00 and WGSL.
    pub const WEBGL2_UP: TargetMask = TargetMask(6);
    pub const ALL: TargetMask = TargetMask(7);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: TargetMask) -> TargetMask {
        TargetMask(self.0 | other.0)
    }

    pub const fn intersect(self, other: TargetMask) -> TargetMask {
        TargetMask(self.0 & other.0)
    }

    pub const fn without(self, other: TargetMask) -> TargetMask {
        TargetMask(self.0 & !other.0)
    }

    pub fn contains(self, target: Target) -> bool {
        self.0 & target.mask().0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TargetMask {
    type Output = TargetMask;

    fn bitor(self, rhs: TargetMask) -> TargetMask {
        self.union(rhs)
    }
}

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub fn mask(self) -> StageMask {
        match self {
            ShaderStage::Vertex => StageMask::VERTEX,
            ShaderStage::Fragment => StageMask::FRAGMENT,
            ShaderStage::Compute => StageMask::COMPUTE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of shader stages (resource visibility, builtin availability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StageMask(u8);

impl StageMask {
    pub const NONE: StageMask = StageMask(0);
    pub const VERTEX: StageMask = StageMask(1);
    pub const FRAGMENT: StageMask = StageMask(2);
    pub const COMPUTE: StageMask = StageMask(4);
    pub const ALL: StageMask = StageMask(7);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: StageMask) -> StageMask {
        StageMask(self.0 | other.0)
    }

    pub fn contains(self, stage: ShaderStage) -> bool {
        self.0 & stage.mask().0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Stages in the mask, in pipeline order.
    pub fn stages(self) -> Vec<ShaderStage> {
        [ShaderStage::Vertex, ShaderStage::Fragment, ShaderStage::Compute]
            .into_iter()
            .filter(|s| self.contains(*s))
            .collect()
    }

    /// The only stage in the mask, if it holds exactly one.
    pub fn single(self) -> Option<ShaderStage> {
        match self.0 {
            1 => Some(ShaderStage::Vertex),
            2 => Some(ShaderStage::Fragment),
            4 => Some(ShaderStage::Compute),
            _ => None,
        }
    }
}

impl BitOr for StageMask {
    type Output = StageMask;

    fn bitor(self, rhs: StageMask) -> StageMask {
        self.union(rhs)
    }
}

impl From<ShaderStage> for StageMask {
    fn from(stage: ShaderStage) -> Self {
        stage.mask()
    }
}

impl fmt::Display for StageMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, stage) in self.stages().into_iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(stage.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_target_masks() {
        assert!(TargetMask::GLSL.contains(Target::WebGL1));
        assert!(TargetMask::GLSL.contains(Target::WebGL2));
        assert!(!TargetMask::GLSL.contains(Target::WebGPU));
        assert!(TargetMask::WEBGL2_UP.contains(Target::WebGPU));
        assert!(!TargetMask::WEBGL2_UP.contains(Target::WebGL1));
        assert_eq!(TargetMask::WEBGL1 | TargetMask::WEBGL2, TargetMask::GLSL);
        assert_eq!(TargetMask::ALL.without(TargetMask::WEBGL1), TargetMask::WEBGL2_UP);
    }

    #[test]
    fn test_stage_mask_display() {
        let mask = StageMask::VERTEX | StageMask::FRAGMENT;
        assert_eq!(mask.to_string(), "vertex|fragment");
        assert_eq!(mask.single(), None);
        assert_eq!(StageMask::COMPUTE.single(), Some(ShaderStage::Compute));
        assert_eq!(StageMask::NONE.to_string(), "none");
    }
}
