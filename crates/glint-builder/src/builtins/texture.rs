//! Texture sampling, loading, storing and size queries.

use alloc::{vec, vec::Vec};

use glint_ir::{
    SampleType, ScalarKind, StageMask, TargetMask, TextureDim, TextureType, Type,
};

use super::{BuiltinDef, BuiltinRegistry, Lowering, Overload, ParamKind, ParamSpec, TextureOp};

/// Dimension and arrayed flag of every sampled shape.
const COLOR_SHAPES: [(TextureDim, bool); 6] = [
    (TextureDim::D1, false),
    (TextureDim::D2, false),
    (TextureDim::D2, true),
    (TextureDim::D3, false),
    (TextureDim::Cube, false),
    (TextureDim::Cube, true),
];

const DEPTH_SHAPES: [(TextureDim, bool); 4] = [
    (TextureDim::D2, false),
    (TextureDim::D2, true),
    (TextureDim::Cube, false),
    (TextureDim::Cube, true),
];

/// Shapes addressable by integer texel coordinates.
const TEXEL_SHAPES: [(TextureDim, bool); 4] = [
    (TextureDim::D1, false),
    (TextureDim::D2, false),
    (TextureDim::D2, true),
    (TextureDim::D3, false),
];

const SAMPLE_TYPES: [SampleType; 3] = [SampleType::Float, SampleType::Sint, SampleType::Uint];

fn shaped(tex: TextureType, arrayed: bool) -> Option<Type> {
    let tex = if arrayed { tex.array() } else { tex };
    Type::texture(tex).ok()
}

fn coords(dim: TextureDim, kind: ScalarKind) -> Type {
    match dim.coords() {
        1 => Type::scalar(kind),
        n => Type::vec(kind, n),
    }
}

/// Size query result: one unsigned component per non-layer dimension.
fn extent(dim: TextureDim) -> Type {
    match dim {
        TextureDim::D1 => Type::u32(),
        TextureDim::D2 | TextureDim::Cube => Type::vec(ScalarKind::U32, 2),
        TextureDim::D3 => Type::vec(ScalarKind::U32, 3),
    }
}

/// `texture, coords[, layer]`
fn addressing(tex: Type, dim: TextureDim, arrayed: bool, kind: ScalarKind) -> Vec<ParamSpec> {
    let mut params = vec![ParamSpec::value(tex), ParamSpec::value(coords(dim, kind))];
    if arrayed {
        params.push(ParamSpec::value(Type::i32()));
    }
    params
}

fn overload(mut params: Vec<ParamSpec>, extra: &[Type], ret: Type, op: TextureOp) -> Overload {
    params.extend(extra.iter().cloned().map(ParamSpec::value));
    Overload::new(params, ret, Lowering::Texture(op))
}

fn sampling(op: TextureOp, skip_1d: bool, extra: impl Fn(TextureDim) -> Vec<Type>) -> Vec<Overload> {
    let mut overloads = Vec::new();
    for (dim, arrayed) in COLOR_SHAPES {
        if skip_1d && dim == TextureDim::D1 {
            continue;
        }
        let Some(tex) = shaped(TextureType::sampled(dim, SampleType::Float), arrayed) else {
            continue;
        };
        overloads.push(overload(
            addressing(tex, dim, arrayed, ScalarKind::F32),
            &extra(dim),
            Type::vec4f(),
            op,
        ));
    }
    overloads
}

fn depth_sampling(op: TextureOp, extra: &[Type], targets: impl Fn(TextureDim, bool) -> TargetMask) -> Vec<Overload> {
    let mut overloads = Vec::new();
    for (dim, arrayed) in DEPTH_SHAPES {
        let Some(tex) = shaped(TextureType::depth(dim), arrayed) else {
            continue;
        };
        overloads.push(
            overload(addressing(tex, dim, arrayed, ScalarKind::F32), extra, Type::f32(), op)
                .on(targets(dim, arrayed)),
        );
    }
    overloads
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    let all = |_: TextureDim, _: bool| TargetMask::ALL;

    let mut sample = sampling(TextureOp::Sample, false, |_| Vec::new());
    sample.extend(depth_sampling(TextureOp::Sample, &[], all));
    registry.define(BuiltinDef::new("textureSample", sample).stages(StageMask::FRAGMENT));

    let mut level = sampling(TextureOp::SampleLevel, false, |_| vec![Type::f32()]);
    level.extend(depth_sampling(TextureOp::SampleLevel, &[Type::i32()], all));
    registry.define(BuiltinDef::new("textureSampleLevel", level));

    registry.define(
        BuiltinDef::new(
            "textureSampleBias",
            sampling(TextureOp::SampleBias, true, |_| vec![Type::f32()]),
        )
        .stages(StageMask::FRAGMENT),
    );

    registry.define(BuiltinDef::new(
        "textureSampleGrad",
        sampling(TextureOp::SampleGrad, true, |dim| {
            let d = coords(dim, ScalarKind::F32);
            vec![d.clone(), d]
        }),
    ));

    registry.define(
        BuiltinDef::new(
            "textureSampleCompare",
            depth_sampling(TextureOp::SampleCompare, &[Type::f32()], |_, _| {
                TargetMask::WEBGL2_UP
            }),
        )
        .stages(StageMask::FRAGMENT),
    );
    registry.define(BuiltinDef::new(
        "textureSampleCompareLevel",
        depth_sampling(
            TextureOp::SampleCompareLevel,
            &[Type::f32()],
            |dim, arrayed| match (dim, arrayed) {
                (TextureDim::D2, false) => TargetMask::WEBGL2_UP,
                _ => TargetMask::WEBGPU,
            },
        ),
    ));

    registry.define(BuiltinDef::new("textureLoad", loads()));
    registry.define(BuiltinDef::new("textureStore", stores()).with_side_effects());
    registry.define(BuiltinDef::new("textureDimensions", dimensions()));
}

fn loads() -> Vec<Overload> {
    let mut overloads = Vec::new();
    for sample in SAMPLE_TYPES {
        let kind = sample.scalar();
        for (dim, arrayed) in TEXEL_SHAPES {
            let Some(tex) = shaped(TextureType::sampled(dim, sample), arrayed) else {
                continue;
            };
            overloads.push(
                overload(
                    addressing(tex, dim, arrayed, ScalarKind::I32),
                    &[Type::i32()],
                    Type::vec(kind, 4),
                    TextureOp::Load,
                )
                .on(TargetMask::WEBGL2_UP),
            );
        }
        if let Some(tex) = shaped(TextureType::multisampled(sample), false) {
            overloads.push(
                overload(
                    addressing(tex, TextureDim::D2, false, ScalarKind::I32),
                    &[Type::i32()],
                    Type::vec(kind, 4),
                    TextureOp::Load,
                )
                .on(TargetMask::WEBGL2_UP),
            );
        }
    }
    for arrayed in [false, true] {
        if let Some(tex) = shaped(TextureType::depth(TextureDim::D2), arrayed) {
            overloads.push(
                overload(
                    addressing(tex, TextureDim::D2, arrayed, ScalarKind::I32),
                    &[Type::i32()],
                    Type::f32(),
                    TextureOp::Load,
                )
                .on(TargetMask::WEBGL2_UP),
            );
        }
    }
    if let Some(tex) = shaped(TextureType::external(), false) {
        overloads.push(
            overload(
                addressing(tex, TextureDim::D2, false, ScalarKind::I32),
                &[],
                Type::vec4f(),
                TextureOp::Load,
            )
            .on(TargetMask::WEBGL2_UP),
        );
    }
    overloads
}

fn stores() -> Vec<Overload> {
    let mut overloads = Vec::new();
    for sample in SAMPLE_TYPES {
        for (dim, arrayed) in TEXEL_SHAPES {
            let mut params = vec![
                ParamSpec::pattern(
                    ParamKind::StorageTexture {
                        dim,
                        arrayed,
                        sample,
                    },
                    None,
                ),
                ParamSpec::value(coords(dim, ScalarKind::I32)),
            ];
            if arrayed {
                params.push(ParamSpec::value(Type::i32()));
            }
            params.push(ParamSpec::value(Type::vec(sample.scalar(), 4)));
            overloads.push(
                Overload::new(params, Type::void(), Lowering::Texture(TextureOp::Store))
                    .on(TargetMask::WEBGPU),
            );
        }
    }
    overloads
}

fn dimensions() -> Vec<Overload> {
    let mut overloads = Vec::new();
    let mut add = |tex: Option<Type>, dim: TextureDim, with_level: bool| {
        let Some(tex) = tex else { return };
        let op = TextureOp::Dimensions;
        overloads.push(
            overload(vec![ParamSpec::value(tex.clone())], &[], extent(dim), op)
                .on(TargetMask::WEBGL2_UP),
        );
        if with_level {
            overloads.push(
                overload(vec![ParamSpec::value(tex)], &[Type::i32()], extent(dim), op)
                    .on(TargetMask::WEBGL2_UP),
            );
        }
    };
    for sample in SAMPLE_TYPES {
        for (dim, arrayed) in COLOR_SHAPES {
            add(shaped(TextureType::sampled(dim, sample), arrayed), dim, true);
        }
        add(shaped(TextureType::multisampled(sample), false), TextureDim::D2, false);
    }
    for (dim, arrayed) in DEPTH_SHAPES {
        add(shaped(TextureType::depth(dim), arrayed), dim, true);
    }
    add(shaped(TextureType::external(), false), TextureDim::D2, false);
    for sample in SAMPLE_TYPES {
        for (dim, arrayed) in TEXEL_SHAPES {
            overloads.push(
                Overload::new(
                    vec![ParamSpec::pattern(
                        ParamKind::StorageTexture {
                            dim,
                            arrayed,
                            sample,
                        },
                        None,
                    )],
                    extent(dim),
                    Lowering::Texture(TextureOp::Dimensions),
                )
                .on(TargetMask::WEBGPU),
            );
        }
    }
    overloads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exp::Exp;
    use glint_ir::{
        ast::{Expr, GlobalKind, SymbolId, VarKind, VarRef},
        Target,
    };

    fn texture(tex: TextureType) -> Exp {
        let ty = Type::texture(tex).unwrap();
        Exp::node(Expr::Var(VarRef {
            id: SymbolId(1),
            name: "tex".into(),
            ty,
            kind: VarKind::Global(GlobalKind::Texture),
        }))
    }

    fn registry() -> BuiltinRegistry {
        let mut registry = BuiltinRegistry::new();
        register(&mut registry);
        registry
    }

    fn uv() -> Exp {
        Exp::node(Expr::Construct {
            ty: Type::vec2f(),
            args: Vec::new(),
        })
    }

    #[test]
    fn test_depth_sampling_returns_scalar() {
        let registry = registry();
        let sample = registry.get("textureSample").unwrap();
        let depth = texture(TextureType::depth(TextureDim::D2));
        let resolved = sample.resolve(Target::WebGL1, &[depth, uv()]).unwrap();
        assert_eq!(resolved.ret, Type::f32());
    }

    #[test]
    fn test_comparison_needs_webgl2() {
        let registry = registry();
        let compare = registry.get("textureSampleCompare").unwrap();
        let args = [texture(TextureType::depth(TextureDim::D2)), uv(), Exp::from(0.5)];
        assert!(compare.resolve(Target::WebGL1, &args).is_none());
        assert!(compare.resolve(Target::WebGL2, &args).is_some());
        assert!(compare.resolve(Target::WebGPU, &args).is_some());
    }

    #[test]
    fn test_array_textures_skip_webgl1() {
        let registry = registry();
        let sample = registry.get("textureSample").unwrap();
        let arrayed = texture(TextureType::sampled(TextureDim::D2, SampleType::Float).array());
        let args = [arrayed, uv(), Exp::from(1)];
        assert!(sample.resolve(Target::WebGL1, &args).is_none());
        assert_eq!(sample.resolve(Target::WebGL2, &args).unwrap().ret, Type::vec4f());
    }
}
