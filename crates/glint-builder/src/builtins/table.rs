//! Math, relational, bit, atomic and synchronization builtins.

use alloc::{format, vec, vec::Vec};

use glint_ir::{ast::BinaryOp, ScalarKind, StageMask, TargetMask, Type};

use super::{BuiltinDef, BuiltinRegistry, Lowering, Overload, ParamKind, ParamSpec, RefAccess};

fn gen(kind: ScalarKind) -> [Type; 4] {
    [
        Type::scalar(kind),
        Type::vec(kind, 2),
        Type::vec(kind, 3),
        Type::vec(kind, 4),
    ]
}

fn vecs(kind: ScalarKind) -> [Type; 3] {
    [Type::vec(kind, 2), Type::vec(kind, 3), Type::vec(kind, 4)]
}

/// The same type for every parameter and the result.
fn uniform_sig(ty: &Type, arity: usize, lowering: &Lowering) -> Overload {
    Overload::new(
        vec![ParamSpec::value(ty.clone()); arity],
        ty.clone(),
        lowering.clone(),
    )
}

fn family(types: &[Type], arity: usize, lowering: Lowering, targets: TargetMask) -> Vec<Overload> {
    types
        .iter()
        .map(|ty| uniform_sig(ty, arity, &lowering).on(targets))
        .collect()
}

fn define(registry: &mut BuiltinRegistry, name: &str, overloads: Vec<Overload>) {
    registry.define(BuiltinDef::new(name, overloads));
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    let floats = gen(ScalarKind::F32);
    let ints = gen(ScalarKind::I32);
    let uints = gen(ScalarKind::U32);

    for name in [
        "radians", "degrees", "sin", "cos", "tan", "asin", "acos", "atan", "exp", "log", "exp2",
        "log2", "sqrt", "floor", "ceil", "fract",
    ] {
        define(registry, name, family(&floats, 1, Lowering::call(name), TargetMask::ALL));
    }
    define(
        registry,
        "inverseSqrt",
        family(&floats, 1, Lowering::renamed("inversesqrt", "inverseSqrt"), TargetMask::ALL),
    );
    for name in ["sinh", "cosh", "tanh", "asinh", "acosh", "atanh", "trunc", "round"] {
        define(registry, name, family(&floats, 1, Lowering::call(name), TargetMask::WEBGL2_UP));
    }

    define(
        registry,
        "atan2",
        family(&floats, 2, Lowering::renamed("atan", "atan2"), TargetMask::ALL),
    );
    define(registry, "pow", family(&floats, 2, Lowering::call("pow"), TargetMask::ALL));
    define(registry, "step", family(&floats, 2, Lowering::call("step"), TargetMask::ALL));

    for name in ["min", "max"] {
        let mut overloads = family(&floats, 2, Lowering::call(name), TargetMask::ALL);
        overloads.extend(family(&ints, 2, Lowering::call(name), TargetMask::WEBGL2_UP));
        overloads.extend(family(&uints, 2, Lowering::call(name), TargetMask::WEBGL2_UP));
        define(registry, name, overloads);
    }
    {
        let mut overloads = family(&floats, 3, Lowering::call("clamp"), TargetMask::ALL);
        overloads.extend(family(&ints, 3, Lowering::call("clamp"), TargetMask::WEBGL2_UP));
        overloads.extend(family(&uints, 3, Lowering::call("clamp"), TargetMask::WEBGL2_UP));
        define(registry, "clamp", overloads);
    }
    for name in ["abs", "sign"] {
        let mut overloads = family(&floats, 1, Lowering::call(name), TargetMask::ALL);
        overloads.extend(family(&ints, 1, Lowering::call(name), TargetMask::WEBGL2_UP));
        define(registry, name, overloads);
    }

    {
        let mut overloads = family(&floats, 3, Lowering::call("mix"), TargetMask::ALL);
        for v in vecs(ScalarKind::F32) {
            overloads.push(Overload::new(
                vec![
                    ParamSpec::value(v.clone()),
                    ParamSpec::value(v.clone()),
                    ParamSpec::value(Type::f32()),
                ],
                v,
                Lowering::call("mix"),
            ));
        }
        define(registry, "mix", overloads);
    }
    define(
        registry,
        "smoothstep",
        family(&floats, 3, Lowering::call("smoothstep"), TargetMask::ALL),
    );

    {
        let mut overloads = family(&floats, 2, Lowering::Modulus, TargetMask::ALL);
        overloads.extend(family(&ints, 2, Lowering::Modulus, TargetMask::ALL));
        overloads.extend(family(&uints, 2, Lowering::Modulus, TargetMask::ALL));
        define(registry, "mod", overloads);
    }

    register_geometric(registry);
    register_matrix(registry);
    register_relational(registry);
    register_derivatives(registry);
    register_bits(registry);
    register_atomics(registry);
    register_sync(registry);
}

fn register_geometric(registry: &mut BuiltinRegistry) {
    let floats = gen(ScalarKind::F32);
    let vectors = vecs(ScalarKind::F32);
    let to_f32 = |ty: &Type, arity: usize, name: &str| {
        Overload::new(
            vec![ParamSpec::value(ty.clone()); arity],
            Type::f32(),
            Lowering::call(name),
        )
    };
    define(
        registry,
        "length",
        floats.iter().map(|t| to_f32(t, 1, "length")).collect(),
    );
    define(
        registry,
        "distance",
        floats.iter().map(|t| to_f32(t, 2, "distance")).collect(),
    );
    define(
        registry,
        "dot",
        vectors.iter().map(|t| to_f32(t, 2, "dot")).collect(),
    );
    define(
        registry,
        "normalize",
        family(&vectors, 1, Lowering::call("normalize"), TargetMask::ALL),
    );
    define(
        registry,
        "reflect",
        family(&vectors, 2, Lowering::call("reflect"), TargetMask::ALL),
    );
    define(
        registry,
        "faceForward",
        family(&vectors, 3, Lowering::renamed("faceforward", "faceForward"), TargetMask::ALL),
    );
    define(
        registry,
        "cross",
        vec![uniform_sig(&Type::vec3f(), 2, &Lowering::call("cross"))],
    );
    define(
        registry,
        "refract",
        vectors
            .iter()
            .map(|v| {
                Overload::new(
                    vec![
                        ParamSpec::value(v.clone()),
                        ParamSpec::value(v.clone()),
                        ParamSpec::value(Type::f32()),
                    ],
                    v.clone(),
                    Lowering::call("refract"),
                )
            })
            .collect(),
    );
}

fn register_matrix(registry: &mut BuiltinRegistry) {
    let mut transpose = Vec::new();
    let mut comp_mult = Vec::new();
    for cols in 2..=4u8 {
        for rows in 2..=4u8 {
            let m = Type::mat(cols, rows);
            transpose.push(
                Overload::new(
                    vec![ParamSpec::value(m.clone())],
                    Type::mat(rows, cols),
                    Lowering::call("transpose"),
                )
                .on(TargetMask::WEBGL2_UP),
            );
            comp_mult.push(uniform_sig(&m, 2, &Lowering::call("matrixCompMult")).on(TargetMask::GLSL));
        }
    }
    define(registry, "transpose", transpose);
    define(registry, "matrixCompMult", comp_mult);

    let square: Vec<Type> = (2..=4u8).map(|n| Type::mat(n, n)).collect();
    define(
        registry,
        "determinant",
        square
            .iter()
            .map(|m| {
                Overload::new(
                    vec![ParamSpec::value(m.clone())],
                    Type::f32(),
                    Lowering::call("determinant"),
                )
                .on(TargetMask::WEBGL2_UP)
            })
            .collect(),
    );
    define(
        registry,
        "inverse",
        family(&square, 1, Lowering::call("inverse"), TargetMask::WEBGL2),
    );
}

fn register_relational(registry: &mut BuiltinRegistry) {
    let ordered = [
        ("lessThan", BinaryOp::Lt),
        ("lessThanEqual", BinaryOp::Le),
        ("greaterThan", BinaryOp::Gt),
        ("greaterThanEqual", BinaryOp::Ge),
        ("equal", BinaryOp::Eq),
        ("notEqual", BinaryOp::Ne),
    ];
    for (name, op) in ordered {
        let mut overloads = Vec::new();
        let mut kinds = vec![ScalarKind::F32, ScalarKind::I32, ScalarKind::U32];
        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            kinds.push(ScalarKind::Bool);
        }
        for kind in kinds {
            for n in 2..=4u8 {
                overloads.push(Overload::new(
                    vec![ParamSpec::value(Type::vec(kind, n)); 2],
                    Type::vec(ScalarKind::Bool, n),
                    Lowering::Compare { glsl: name, op },
                ));
            }
        }
        define(registry, name, overloads);
    }

    let bools = vecs(ScalarKind::Bool);
    for name in ["any", "all"] {
        define(
            registry,
            name,
            bools
                .iter()
                .map(|b| Overload::new(vec![ParamSpec::value(b.clone())], Type::bool(), Lowering::call(name)))
                .collect(),
        );
    }
    define(registry, "not", family(&bools, 1, Lowering::Not, TargetMask::ALL));
}

fn register_derivatives(registry: &mut BuiltinRegistry) {
    let floats = gen(ScalarKind::F32);
    for (name, glsl) in [("dpdx", "dFdx"), ("dpdy", "dFdy"), ("fwidth", "fwidth")] {
        registry.define(
            BuiltinDef::new(
                name,
                family(
                    &floats,
                    1,
                    Lowering::Derivative { glsl, wgsl: name },
                    TargetMask::ALL,
                ),
            )
            .stages(StageMask::FRAGMENT),
        );
    }
}

fn register_bits(registry: &mut BuiltinRegistry) {
    let casts = [
        ("floatBitsToInt", ScalarKind::F32, ScalarKind::I32),
        ("floatBitsToUint", ScalarKind::F32, ScalarKind::U32),
        ("intBitsToFloat", ScalarKind::I32, ScalarKind::F32),
        ("uintBitsToFloat", ScalarKind::U32, ScalarKind::F32),
    ];
    for (name, from, to) in casts {
        let overloads = gen(from)
            .into_iter()
            .zip(gen(to))
            .map(|(src, dst)| {
                let wgsl = format!("bitcast<{}>", dst);
                Overload::new(
                    vec![ParamSpec::value(src)],
                    dst,
                    Lowering::Call {
                        glsl: name.into(),
                        wgsl,
                    },
                )
                .on(TargetMask::WEBGL2_UP)
            })
            .collect();
        define(registry, name, overloads);
    }

    let packs = [
        ("pack2x16snorm", "packSnorm2x16", 2, TargetMask::WEBGL2_UP),
        ("pack2x16unorm", "packUnorm2x16", 2, TargetMask::WEBGL2_UP),
        ("pack2x16float", "packHalf2x16", 2, TargetMask::WEBGL2_UP),
        ("pack4x8snorm", "", 4, TargetMask::WEBGPU),
        ("pack4x8unorm", "", 4, TargetMask::WEBGPU),
    ];
    for (name, glsl, n, targets) in packs {
        define(
            registry,
            name,
            vec![Overload::new(
                vec![ParamSpec::value(Type::vec(ScalarKind::F32, n))],
                Type::u32(),
                Lowering::renamed(glsl, name),
            )
            .on(targets)],
        );
        let unpack = name.replacen("pack", "unpack", 1);
        let glsl_unpack = glsl.replacen("pack", "unpack", 1);
        define(
            registry,
            &unpack,
            vec![Overload::new(
                vec![ParamSpec::value(Type::u32())],
                Type::vec(ScalarKind::F32, n),
                Lowering::renamed(&glsl_unpack, &unpack),
            )
            .on(targets)],
        );
    }
}

fn register_atomics(registry: &mut BuiltinRegistry) {
    let kinds = [ScalarKind::I32, ScalarKind::U32];
    let atomic = |kind| Type::atomic(kind);
    let mut load = Vec::new();
    let mut store = Vec::new();
    for kind in kinds {
        let Ok(ty) = atomic(kind) else { continue };
        load.push(Overload::new(
            vec![ParamSpec::reference(ty.clone(), RefAccess::Read)],
            Type::scalar(kind),
            Lowering::call("atomicLoad"),
        ));
        store.push(Overload::new(
            vec![
                ParamSpec::reference(ty, RefAccess::Write),
                ParamSpec::value(Type::scalar(kind)),
            ],
            Type::void(),
            Lowering::call("atomicStore"),
        ));
    }
    define(registry, "atomicLoad", load);
    registry.define(BuiltinDef::new("atomicStore", store).with_side_effects());

    for name in [
        "atomicAdd",
        "atomicSub",
        "atomicMax",
        "atomicMin",
        "atomicAnd",
        "atomicOr",
        "atomicXor",
        "atomicExchange",
    ] {
        let mut overloads = Vec::new();
        for kind in kinds {
            let Ok(ty) = atomic(kind) else { continue };
            overloads.push(Overload::new(
                vec![
                    ParamSpec::reference(ty, RefAccess::Write),
                    ParamSpec::value(Type::scalar(kind)),
                ],
                Type::scalar(kind),
                Lowering::call(name),
            ));
        }
        registry.define(BuiltinDef::new(name, overloads).with_side_effects());
    }
}

fn register_sync(registry: &mut BuiltinRegistry) {
    for name in ["workgroupBarrier", "storageBarrier"] {
        registry.define(
            BuiltinDef::new(
                name,
                vec![Overload::new(Vec::new(), Type::void(), Lowering::call(name)).on(TargetMask::WEBGPU)],
            )
            .stages(StageMask::COMPUTE)
            .with_side_effects(),
        );
    }
    define(
        registry,
        "arrayLength",
        vec![Overload::new(
            vec![ParamSpec::pattern(ParamKind::RuntimeArray, Some(RefAccess::Read))],
            Type::u32(),
            Lowering::call("arrayLength"),
        )
        .on(TargetMask::WEBGPU)],
    );
}
