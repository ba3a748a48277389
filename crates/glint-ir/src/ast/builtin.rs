//! Stage builtin variables and vertex attribute semantics.

use crate::{
    target::{ShaderStage, Target},
    types::{ScalarKind, Type},
};

/// Values provided by, or handed back to, the fixed-function pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinVar {
    Position,
    PointSize,
    VertexIndex,
    InstanceIndex,
    FragCoord,
    FrontFacing,
    FragDepth,
    GlobalInvocationId,
    LocalInvocationId,
    LocalInvocationIndex,
    WorkgroupId,
    NumWorkgroups,
}

impl BuiltinVar {
    pub const ALL: [BuiltinVar; 12] = [
        BuiltinVar::Position,
        BuiltinVar::PointSize,
        BuiltinVar::VertexIndex,
        BuiltinVar::InstanceIndex,
        BuiltinVar::FragCoord,
        BuiltinVar::FrontFacing,
        BuiltinVar::FragDepth,
        BuiltinVar::GlobalInvocationId,
        BuiltinVar::LocalInvocationId,
        BuiltinVar::LocalInvocationIndex,
        BuiltinVar::WorkgroupId,
        BuiltinVar::NumWorkgroups,
    ];

    /// Builder-facing name.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinVar::Position => "position",
            BuiltinVar::PointSize => "pointSize",
            BuiltinVar::VertexIndex => "vertexIndex",
            BuiltinVar::InstanceIndex => "instanceIndex",
            BuiltinVar::FragCoord => "fragCoord",
            BuiltinVar::FrontFacing => "frontFacing",
            BuiltinVar::FragDepth => "fragDepth",
            BuiltinVar::GlobalInvocationId => "globalInvocationId",
            BuiltinVar::LocalInvocationId => "localInvocationId",
            BuiltinVar::LocalInvocationIndex => "localInvocationIndex",
            BuiltinVar::WorkgroupId => "workgroupId",
            BuiltinVar::NumWorkgroups => "numWorkgroups",
        }
    }

    pub fn stage(self) -> ShaderStage {
        match self {
            BuiltinVar::Position
            | BuiltinVar::PointSize
            | BuiltinVar::VertexIndex
            | BuiltinVar::InstanceIndex => ShaderStage::Vertex,
            BuiltinVar::FragCoord | BuiltinVar::FrontFacing | BuiltinVar::FragDepth => {
                ShaderStage::Fragment
            }
            _ => ShaderStage::Compute,
        }
    }

    /// Check if the shader writes this value rather than reads it.
    pub fn is_output(self) -> bool {
        matches!(
            self,
            BuiltinVar::Position | BuiltinVar::PointSize | BuiltinVar::FragDepth
        )
    }

    pub fn ty(self) -> Type {
        match self {
            BuiltinVar::Position | BuiltinVar::FragCoord => Type::vec4f(),
            BuiltinVar::PointSize | BuiltinVar::FragDepth => Type::f32(),
            BuiltinVar::VertexIndex
            | BuiltinVar::InstanceIndex
            | BuiltinVar::LocalInvocationIndex => Type::u32(),
            BuiltinVar::FrontFacing => Type::bool(),
            BuiltinVar::GlobalInvocationId
            | BuiltinVar::LocalInvocationId
            | BuiltinVar::WorkgroupId
            | BuiltinVar::NumWorkgroups => Type::vec(ScalarKind::U32, 3),
        }
    }

    /// Check if the builtin exists on `target`.
    pub fn is_supported(self, target: Target) -> bool {
        match target {
            Target::WebGL1 => matches!(
                self,
                BuiltinVar::Position
                    | BuiltinVar::PointSize
                    | BuiltinVar::FragCoord
                    | BuiltinVar::FrontFacing
                    | BuiltinVar::FragDepth
            ),
            Target::WebGL2 => self.stage() != ShaderStage::Compute,
            Target::WebGPU => self != BuiltinVar::PointSize,
        }
    }

    /// WGSL `@builtin(...)` name.
    pub fn wgsl_name(self) -> Option<&'static str> {
        Some(match self {
            BuiltinVar::Position | BuiltinVar::FragCoord => "position",
            BuiltinVar::PointSize => return None,
            BuiltinVar::VertexIndex => "vertex_index",
            BuiltinVar::InstanceIndex => "instance_index",
            BuiltinVar::FrontFacing => "front_facing",
            BuiltinVar::FragDepth => "frag_depth",
            BuiltinVar::GlobalInvocationId => "global_invocation_id",
            BuiltinVar::LocalInvocationId => "local_invocation_id",
            BuiltinVar::LocalInvocationIndex => "local_invocation_index",
            BuiltinVar::WorkgroupId => "workgroup_id",
            BuiltinVar::NumWorkgroups => "num_workgroups",
        })
    }

    /// GLSL spelling of a read or write of the builtin.
    pub fn glsl_name(self, target: Target) -> Option<&'static str> {
        if !self.is_supported(target) {
            return None;
        }
        Some(match self {
            BuiltinVar::Position => "gl_Position",
            BuiltinVar::PointSize => "gl_PointSize",
            BuiltinVar::VertexIndex => "uint(gl_VertexID)",
            BuiltinVar::InstanceIndex => "uint(gl_InstanceID)",
            BuiltinVar::FragCoord => "gl_FragCoord",
            BuiltinVar::FrontFacing => "gl_FrontFacing",
            BuiltinVar::FragDepth if target == Target::WebGL1 => "gl_FragDepthEXT",
            BuiltinVar::FragDepth => "gl_FragDepth",
            _ => return None,
        })
    }
}

/// Vertex attribute semantics with fixed attribute locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexSemantic {
    Position,
    Normal,
    Diffuse,
    Tangent,
    TexCoord0,
    TexCoord1,
    TexCoord2,
    TexCoord3,
    TexCoord4,
    TexCoord5,
    TexCoord6,
    TexCoord7,
    BlendIndices,
    BlendWeights,
}

impl VertexSemantic {
    pub fn location(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            VertexSemantic::Position => "position",
            VertexSemantic::Normal => "normal",
            VertexSemantic::Diffuse => "diffuse",
            VertexSemantic::Tangent => "tangent",
            VertexSemantic::TexCoord0 => "texCoord0",
            VertexSemantic::TexCoord1 => "texCoord1",
            VertexSemantic::TexCoord2 => "texCoord2",
            VertexSemantic::TexCoord3 => "texCoord3",
            VertexSemantic::TexCoord4 => "texCoord4",
            VertexSemantic::TexCoord5 => "texCoord5",
            VertexSemantic::TexCoord6 => "texCoord6",
            VertexSemantic::TexCoord7 => "texCoord7",
            VertexSemantic::BlendIndices => "blendIndices",
            VertexSemantic::BlendWeights => "blendWeights",
        }
    }

    /// Attribute name used in GLSL so hosts can bind locations by name.
    pub fn glsl_attribute(self) -> alloc::string::String {
        alloc::format!("zAttrib_{}", self.name())
    }
}
