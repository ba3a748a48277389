//! Render programs built end to end on every target.

mod common;

use common::{assert_valid, builder, filecheck};
use glint_builder::{
    args, BuildError, BuildResult, BuiltinVar, Exp, ResourceKind, SampleType, SamplerKind, ShaderCtx, StageMask,
    Target, TextureDim, TextureType, Type, VertexSemantic,
};

const TARGETS: [Target; 3] = [Target::WebGL1, Target::WebGL2, Target::WebGPU];

fn textured_vertex(ctx: &mut ShaderCtx) -> BuildResult<()> {
    let pos = ctx.attribute("pos", Type::vec3f(), VertexSemantic::Position)?;
    let tex_coord = ctx.attribute("texCoord", Type::vec2f(), VertexSemantic::TexCoord0)?;
    let mvp = ctx.uniform("mvp", Type::mat(4, 4))?;
    let uv = ctx.output("uv", Type::vec2f())?;
    let position = ctx.builtin(BuiltinVar::Position)?;
    ctx.main(|ctx| {
        let world = ctx.construct(&Type::vec4f(), args![&pos, 1.0])?;
        let clip = ctx.mul(&mvp, world)?;
        ctx.assign(&position, clip)?;
        ctx.assign(&uv, &tex_coord)
    })
}

fn textured_fragment(ctx: &mut ShaderCtx) -> BuildResult<()> {
    let albedo = Type::texture(TextureType::sampled(TextureDim::D2, SampleType::Float))?;
    let albedo = ctx.uniform("albedo", albedo)?;
    let tint = ctx.uniform("tint", Type::vec4f())?;
    let uv = ctx.input("uv", Type::vec2f())?;
    let color = ctx.output("color", Type::vec4f())?;
    ctx.main(|ctx| {
        let texel = ctx.call("textureSample", args![&albedo, &uv])?;
        let shaded = ctx.mul(texel, &tint)?;
        ctx.assign(&color, shaded)
    })
}

#[test]
fn test_textured_quad_on_every_target() {
    for target in TARGETS {
        let program = builder(target)
            .build_render(textured_vertex, textured_fragment)
            .unwrap_or_else(|e| panic!("{}: {}", target, e));
        assert_valid(target, &program.vertex_source);
        assert_valid(target, &program.fragment_source);
        assert_eq!(
            program.vertex_attributes,
            [VertexSemantic::Position, VertexSemantic::TexCoord0]
        );
    }
}

#[test]
fn test_textured_quad_webgl2_source() {
    let program = builder(Target::WebGL2)
        .build_render(textured_vertex, textured_fragment)
        .unwrap();
    filecheck(
        &program.vertex_source,
        "
        check: #version 300 es
        check: layout(std140) uniform zBlock_vertexUniformBlock0 {
        nextln: mat4 mvp;
        nextln: } vertexUniformBlock0;
        check: layout(location = 0) in vec3 zAttrib_position;
        check: layout(location = 4) in vec2 zAttrib_texCoord0;
        check: out vec2 zVarying_uv;
        check: void main() {
        check: gl_Position = (vertexUniformBlock0.mvp * vec4(zAttrib_position, 1.0));
        check: zVarying_uv = zAttrib_texCoord0;
        ",
    );
    filecheck(
        &program.fragment_source,
        "
        check: } fragmentUniformBlock0;
        check: uniform sampler2D albedo;
        check: in vec2 zVarying_uv;
        check: layout(location = 0) out vec4 zFragOut_color;
        check: zFragOut_color = (texture(albedo, zVarying_uv) * fragmentUniformBlock0.tint);
        ",
    );
}

#[test]
fn test_textured_quad_webgl1_source() {
    let program = builder(Target::WebGL1)
        .build_render(textured_vertex, textured_fragment)
        .unwrap();
    filecheck(
        &program.vertex_source,
        "
        not: #version
        check: struct zVertexUniformBlock0 {
        check: uniform zVertexUniformBlock0 vertexUniformBlock0;
        check: attribute vec3 zAttrib_position;
        check: varying vec2 zVarying_uv;
        ",
    );
    filecheck(
        &program.fragment_source,
        "
        check: uniform sampler2D albedo;
        check: varying vec2 zVarying_uv;
        check: gl_FragColor = (texture2D(albedo, zVarying_uv) * fragmentUniformBlock0.tint);
        ",
    );
}

#[test]
fn test_textured_quad_webgpu_bindings() {
    let program = builder(Target::WebGPU)
        .build_render(textured_vertex, textured_fragment)
        .unwrap();
    filecheck(
        &program.vertex_source,
        "
        check: struct zVertexUniformBlock0 {
        check: @group(0) @binding(0) var<uniform> vertexUniformBlock0: zVertexUniformBlock0;
        check: @vertex
        check: zOutput.zBuiltin_position = (vertexUniformBlock0.mvp * vec4<f32>(zInput.pos, 1.0));
        ",
    );
    filecheck(
        &program.fragment_source,
        "
        check: @group(0) @binding(1) var<uniform> fragmentUniformBlock0: zFragmentUniformBlock0;
        check: @group(0) @binding(2) var albedo: texture_2d<f32>;
        check: @group(0) @binding(3) var zSampler_albedo: sampler;
        check: @fragment
        check: textureSample(albedo, zSampler_albedo, zInput.uv)
        ",
    );

    assert_eq!(program.bind_group_layouts.len(), 1);
    let entries = &program.bind_group_layouts[0].entries;
    let summary: Vec<(u32, &str, ResourceKind, StageMask)> = entries
        .iter()
        .map(|e| (e.binding, e.name.as_str(), e.kind, e.visibility))
        .collect();
    assert_eq!(
        summary,
        [
            (0, "vertexUniformBlock0", ResourceKind::UniformBuffer, StageMask::VERTEX),
            (1, "fragmentUniformBlock0", ResourceKind::UniformBuffer, StageMask::FRAGMENT),
            (2, "albedo", ResourceKind::Texture, StageMask::FRAGMENT),
            (3, "zSampler_albedo", ResourceKind::Sampler, StageMask::FRAGMENT),
        ]
    );
    assert!(entries[3].auto_sampler);
    assert_eq!(entries[3].sampler, Some(SamplerKind::Sample));
    let mvp = entries[0].buffer.as_ref().unwrap();
    assert_eq!(mvp.byte_layout.byte_size, 64);
    assert!(mvp.read_only);
}

#[test]
fn test_vertex_only_mvp_has_one_entry() {
    let program = builder(Target::WebGPU)
        .build_render(textured_vertex, |ctx| {
            let uv = ctx.input("uv", Type::vec2f())?;
            let color = ctx.output("color", Type::vec4f())?;
            ctx.main(|ctx| {
                let value = ctx.construct(&Type::vec4f(), args![&uv, 0.0, 1.0])?;
                ctx.assign(&color, value)
            })
        })
        .unwrap();
    let layouts = &program.bind_group_layouts;
    assert_eq!(layouts.len(), 1);
    assert_eq!(layouts[0].entries.len(), 1);
    let entry = &layouts[0].entries[0];
    assert_eq!(entry.kind, ResourceKind::UniformBuffer);
    assert_eq!(entry.visibility, StageMask::VERTEX);
}

fn shared_time_vertex(ctx: &mut ShaderCtx) -> BuildResult<()> {
    let params = ctx.define_struct("Wave", &[("amplitude", Type::f32()), ("phase", Type::f32())])?;
    let pos = ctx.attribute("pos", Type::vec4f(), VertexSemantic::Position)?;
    let wave = ctx.uniform("wave", params)?;
    let time = ctx.uniform("time", Type::f32())?;
    let position = ctx.builtin(BuiltinVar::Position)?;
    ctx.main(|ctx| {
        let angle = ctx.add(&time, wave.field("phase")?)?;
        let offset = ctx.call("sin", args![angle])?;
        let lift = ctx.mul(offset, wave.field("amplitude")?)?;
        let moved = ctx.add(pos.swizzle("y")?, lift)?;
        let out = ctx.construct(&Type::vec4f(), args![pos.swizzle("x")?, moved, pos.swizzle("zw")?])?;
        ctx.assign(&position, out)
    })
}

fn shared_time_fragment(ctx: &mut ShaderCtx) -> BuildResult<()> {
    wave_fragment(ctx, "Wave", "phase")
}

fn wave_fragment(ctx: &mut ShaderCtx, struct_name: &str, phase: &str) -> BuildResult<()> {
    let params = ctx.define_struct(struct_name, &[("amplitude", Type::f32()), (phase, Type::f32())])?;
    let wave = ctx.uniform("wave", params)?;
    let time = ctx.uniform("time", Type::f32())?;
    let color = ctx.output("color", Type::vec4f())?;
    ctx.main(|ctx| {
        let pulse = ctx.call("fract", args![&time])?;
        let level = ctx.mul(pulse, wave.field("amplitude")?)?;
        let value = ctx.construct(&Type::vec4f(), args![level, 0.0, 0.0, 1.0])?;
        ctx.assign(&color, value)
    })
}

#[test]
fn test_identical_structs_share_one_block() {
    for target in TARGETS {
        let program = builder(target)
            .build_render(shared_time_vertex, shared_time_fragment)
            .unwrap_or_else(|e| panic!("{}: {}", target, e));
        assert_valid(target, &program.vertex_source);
        assert_valid(target, &program.fragment_source);

        let entries = &program.bind_group_layouts[0].entries;
        assert_eq!(entries.len(), 1, "{}", target);
        assert_eq!(entries[0].name, "sharedUniformBlock0");
        assert_eq!(entries[0].visibility, StageMask::VERTEX | StageMask::FRAGMENT);
        let layout = &entries[0].buffer.as_ref().unwrap().byte_layout;
        assert_eq!(layout.offset_of("wave.phase"), Some(4));
        assert_eq!(layout.offset_of("time"), Some(16));
    }
}

#[test]
fn test_struct_names_do_not_matter_for_sharing() {
    for target in TARGETS {
        let program = builder(target)
            .build_render(shared_time_vertex, |ctx| wave_fragment(ctx, "Ripple", "phase"))
            .unwrap_or_else(|e| panic!("{}: {}", target, e));
        assert_valid(target, &program.vertex_source);
        assert_valid(target, &program.fragment_source);
        let entries = &program.bind_group_layouts[0].entries;
        assert_eq!(entries.len(), 1, "{}", target);
        assert_eq!(entries[0].name, "sharedUniformBlock0");
        assert_eq!(entries[0].visibility, StageMask::VERTEX | StageMask::FRAGMENT);
    }
}

#[test]
fn test_struct_member_names_must_agree() {
    for target in TARGETS {
        let err = builder(target)
            .build_render(shared_time_vertex, |ctx| wave_fragment(ctx, "Wave", "offset"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Merge(_)), "{}: {}", target, err);
    }
}

#[test]
fn test_depth_comparison_adds_one_comparison_sampler() {
    let program = builder(Target::WebGPU)
        .build_render(
            |ctx| {
                let pos = ctx.attribute("pos", Type::vec4f(), VertexSemantic::Position)?;
                let position = ctx.builtin(BuiltinVar::Position)?;
                let shadow_uv = ctx.output("shadowUv", Type::vec3f())?;
                ctx.main(|ctx| {
                    ctx.assign(&position, &pos)?;
                    ctx.assign(&shadow_uv, pos.swizzle("xyz")?)
                })
            },
            |ctx| {
                let shadow = ctx.uniform("shadowMap", Type::texture(TextureType::depth(TextureDim::D2))?)?;
                let shadow_uv = ctx.input("shadowUv", Type::vec3f())?;
                let color = ctx.output("color", Type::vec4f())?;
                ctx.main(|ctx| {
                    let lit = ctx.call(
                        "textureSampleCompare",
                        args![&shadow, shadow_uv.swizzle("xy")?, shadow_uv.swizzle("z")?],
                    )?;
                    let value = ctx.construct(&Type::vec4f(), args![lit])?;
                    ctx.assign(&color, value)
                })
            },
        )
        .unwrap();
    assert_valid(Target::WebGPU, &program.fragment_source);
    let entries = &program.bind_group_layouts[0].entries;
    let comparison: Vec<&str> = entries
        .iter()
        .filter(|e| e.sampler == Some(SamplerKind::Comparison))
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(comparison, ["zSamplerCmp_shadowMap"]);
    assert!(entries.iter().all(|e| e.sampler != Some(SamplerKind::Sample)));
    let shadow = program.bind_group_layouts[0].entry("shadowMap").unwrap();
    assert!(shadow.texture.unwrap().depth);
}

#[test]
fn test_depth_sampling_on_webgl1_needs_no_shadow_sampler() {
    let program = builder(Target::WebGL1)
        .build_render(
            |ctx| {
                let pos = ctx.attribute("pos", Type::vec4f(), VertexSemantic::Position)?;
                let position = ctx.builtin(BuiltinVar::Position)?;
                let uv = ctx.output("uv", Type::vec2f())?;
                ctx.main(|ctx| {
                    ctx.assign(&position, &pos)?;
                    ctx.assign(&uv, pos.swizzle("xy")?)
                })
            },
            |ctx| {
                let depth = ctx.uniform("depth", Type::texture(TextureType::depth(TextureDim::D2))?)?;
                let uv = ctx.input("uv", Type::vec2f())?;
                let color = ctx.output("color", Type::vec4f())?;
                ctx.main(|ctx| {
                    let d = ctx.call("textureSample", args![&depth, &uv])?;
                    let value = ctx.construct(&Type::vec4f(), args![d])?;
                    ctx.assign(&color, value)
                })
            },
        )
        .unwrap();
    assert_valid(Target::WebGL1, &program.fragment_source);
    filecheck(
        &program.fragment_source,
        "
        not: sampler2DShadow
        check: uniform sampler2D depth;
        check: texture2D(depth, zVarying_uv).x
        ",
    );
    let entries = &program.bind_group_layouts[0].entries;
    assert!(entries.iter().all(|e| e.kind != ResourceKind::Sampler));
}

#[test]
fn test_helper_functions_and_control_flow() {
    for target in TARGETS {
        let program = builder(target)
            .build_render(
                |ctx| {
                    let pos = ctx.attribute("pos", Type::vec4f(), VertexSemantic::Position)?;
                    let position = ctx.builtin(BuiltinVar::Position)?;
                    let level = ctx.output("level", Type::f32())?;
                    ctx.main(|ctx| {
                        ctx.assign(&position, &pos)?;
                        let x = pos.swizzle("x")?;
                        ctx.assign(&level, ctx.mul(x, 0.5)?)
                    })
                },
                |ctx| {
                    use glint_builder::Param;
                    let level = ctx.input("level", Type::f32())?;
                    let color = ctx.output("color", Type::vec4f())?;
                    ctx.function(
                        "band",
                        vec![Param::new("v", Type::f32()), Param::new("steps", Type::f32())],
                        |ctx, p| {
                            let scaled = ctx.mul(&p[0], &p[1])?;
                            let stepped = ctx.call("floor", args![scaled])?;
                            let result = ctx.div(stepped, &p[1])?;
                            ctx.ret(result)
                        },
                    )?;
                    ctx.main(|ctx| {
                        let acc = ctx.declare_typed("acc", Type::f32(), Some(Exp::from(0.0)))?;
                        ctx.for_range("i", 0, 4, |ctx, i| {
                            let step = ctx.cast(&Type::f32(), i)?;
                            let weight = ctx.mul(step, 0.25)?;
                            let banded = ctx.call("band", args![&level, 4.0])?;
                            let sum = ctx.add(&acc, ctx.mul(banded, weight)?)?;
                            ctx.assign(&acc, sum)
                        })?;
                        let bright = ctx.gt(&acc, 1.0)?;
                        ctx.if_(bright, |ctx| ctx.assign(&acc, 1.0))?
                            .else_(ctx, |ctx| {
                                let half = ctx.mul(&acc, 0.5)?;
                                ctx.assign(&acc, half)
                            })?;
                        let value = ctx.construct(&Type::vec4f(), args![&acc])?;
                        ctx.assign(&color, value)
                    })
                },
            )
            .unwrap_or_else(|e| panic!("{}: {}", target, e));
        assert_valid(target, &program.vertex_source);
        assert_valid(target, &program.fragment_source);
        assert!(program.bind_group_layouts.is_empty());
    }
}
