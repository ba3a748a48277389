//! Builds that must fail, and how the failure is reported.

mod common;

use common::builder;
use glint_builder::{
    args, BuildError, BuildResult, BuiltinVar, Exp, LayoutKind, ShaderCtx, Target, Type,
    VertexSemantic,
};

fn passthrough_vertex(ctx: &mut ShaderCtx) -> BuildResult<()> {
    let pos = ctx.attribute("pos", Type::vec4f(), VertexSemantic::Position)?;
    let position = ctx.builtin(BuiltinVar::Position)?;
    ctx.main(|ctx| ctx.assign(&position, &pos))
}

fn solid_fragment(ctx: &mut ShaderCtx) -> BuildResult<()> {
    let color = ctx.output("color", Type::vec4f())?;
    ctx.main(|ctx| {
        let white = ctx.construct(&Type::vec4f(), args![1.0])?;
        ctx.assign(&color, white)
    })
}

#[test]
fn test_mat2_in_std140_struct_fails_without_source() {
    let mut builder = builder(Target::WebGPU);
    let err = builder
        .build_render(
            |ctx| {
                ctx.define_struct_with_layout(
                    "Skin",
                    &[("bone", Type::mat(2, 2))],
                    LayoutKind::Std140,
                )?;
                passthrough_vertex(ctx)
            },
            solid_fragment,
        )
        .unwrap_err();
    assert!(matches!(err, BuildError::Type(_)));
    assert!(builder.last_error().unwrap().contains("mat2x2"));
}

#[test]
fn test_loose_mat2_uniform_cannot_join_a_block() {
    let err = builder(Target::WebGL2)
        .build_render(
            |ctx| {
                ctx.uniform("rotation", Type::mat(2, 2))?;
                passthrough_vertex(ctx)
            },
            solid_fragment,
        )
        .unwrap_err();
    assert!(matches!(err, BuildError::Type(_)));
}

#[test]
fn test_u32_literal_range() {
    let build = |value: u64| {
        builder(Target::WebGPU).build_render(passthrough_vertex, move |ctx| {
            let color = ctx.output("color", Type::vec4f())?;
            ctx.main(|ctx| {
                let n = ctx.declare_typed("n", Type::u32(), Some(Exp::from(value)))?;
                let f = ctx.cast(&Type::f32(), &n)?;
                let value = ctx.construct(&Type::vec4f(), args![f])?;
                ctx.assign(&color, value)
            })
        })
    };
    assert!(build(4294967295).is_ok());
    assert!(matches!(
        build(4294967296),
        Err(BuildError::TypeCast { .. })
    ));
}

#[test]
fn test_writable_storage_in_vertex_stage() {
    let err = builder(Target::WebGPU)
        .build_render(
            |ctx| {
                let hits = ctx.storage_buffer("hits", Type::runtime_array(Type::u32())?)?;
                let pos = ctx.attribute("pos", Type::vec4f(), VertexSemantic::Position)?;
                let position = ctx.builtin(BuiltinVar::Position)?;
                ctx.main(|ctx| {
                    ctx.assign(&hits.at(0)?, 1u32)?;
                    ctx.assign(&position, &pos)
                })
            },
            solid_fragment,
        )
        .unwrap_err();
    assert!(matches!(err, BuildError::Merge(_)));
}

#[test]
fn test_storage_buffers_need_webgpu() {
    let err = builder(Target::WebGL2)
        .build_render(
            |ctx| {
                ctx.storage_buffer("data", Type::runtime_array(Type::f32())?)?;
                passthrough_vertex(ctx)
            },
            solid_fragment,
        )
        .unwrap_err();
    assert!(matches!(err, BuildError::Unsupported { .. }));
}

#[test]
fn test_varying_type_mismatch() {
    let err = builder(Target::WebGL2)
        .build_render(
            |ctx| {
                let uv = ctx.output("uv", Type::vec2f())?;
                let pos = ctx.attribute("pos", Type::vec4f(), VertexSemantic::Position)?;
                let position = ctx.builtin(BuiltinVar::Position)?;
                ctx.main(|ctx| {
                    ctx.assign(&uv, pos.swizzle("xy")?)?;
                    ctx.assign(&position, &pos)
                })
            },
            |ctx| {
                ctx.input("uv", Type::vec3f())?;
                solid_fragment(ctx)
            },
        )
        .unwrap_err();
    assert!(matches!(err, BuildError::Merge(_)));
}

#[test]
fn test_discard_outside_fragment() {
    let err = builder(Target::WebGL2)
        .build_render(
            |ctx| {
                let position = ctx.builtin(BuiltinVar::Position)?;
                ctx.main(|ctx| {
                    ctx.discard()?;
                    let origin = ctx.construct(&Type::vec4f(), Vec::<Exp>::new())?;
                    ctx.assign(&position, origin)
                })
            },
            solid_fragment,
        )
        .unwrap_err();
    assert!(matches!(err, BuildError::ScopeMisuse(_)));
}

#[test]
fn test_no_overload_reports_the_call() {
    let mut builder = builder(Target::WebGL2);
    let err = builder
        .build_render(passthrough_vertex, |ctx| {
            let color = ctx.output("color", Type::vec4f())?;
            ctx.main(|ctx| {
                let n = ctx.call("normalize", args![true])?;
                ctx.assign(&color, n)
            })
        })
        .unwrap_err();
    match err {
        BuildError::NoOverload { function, call, .. } => {
            assert_eq!(function, "normalize");
            assert!(call.contains("normalize(true)"), "{}", call);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(builder.last_error().unwrap().contains("normalize"));
}

#[test]
fn test_missing_main() {
    let err = builder(Target::WebGPU)
        .build_render(passthrough_vertex, |ctx| {
            ctx.output("color", Type::vec4f())?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, BuildError::ScopeMisuse(_)));
}

#[test]
fn test_failed_build_does_not_stick() {
    let mut builder = builder(Target::WebGPU);
    assert!(builder
        .build_render(passthrough_vertex, |_| Ok(()))
        .is_err());
    assert!(builder.last_error().is_some());
    assert!(builder
        .build_render(passthrough_vertex, solid_fragment)
        .is_ok());
    assert!(builder.last_error().is_none());
}
