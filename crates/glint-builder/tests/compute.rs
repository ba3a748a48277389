//! Compute programs: storage buffers, workgroup memory and atomics.

mod common;

use common::{assert_wgsl_valid, filecheck, init_logging};
use glint_builder::{
    args, BuildError, BuildOptions, BuiltinVar, Exp, ProgramBuilder, ResourceKind, ScalarKind,
    StageMask, Target, Type,
};

fn compute_builder(size: [u32; 3]) -> ProgramBuilder {
    init_logging();
    ProgramBuilder::new(BuildOptions::new(Target::WebGPU).with_workgroup_size(size))
}

#[test]
fn test_double_in_place() {
    let program = compute_builder([64, 1, 1])
        .build_compute(|ctx| {
            let data = ctx.storage_buffer("data", Type::runtime_array(Type::f32())?)?;
            let gid = ctx.builtin(BuiltinVar::GlobalInvocationId)?;
            ctx.main(|ctx| {
                let i = ctx.declare("i", gid.swizzle("x")?)?;
                let len = ctx.call("arrayLength", args![&data])?;
                let inside = ctx.lt(&i, len)?;
                ctx.if_(inside, |ctx| {
                    let cell = data.at(&i)?;
                    let doubled = ctx.mul(&cell, 2.0)?;
                    ctx.assign(&cell, doubled)
                })?;
                Ok(())
            })
        })
        .unwrap();
    assert_wgsl_valid(&program.source);
    filecheck(
        &program.source,
        "
        check: @group(0) @binding(0) var<storage, read_write> data: array<f32>;
        check: @compute @workgroup_size(64, 1, 1)
        check: arrayLength((&data))
        check: data[i] = (data[i] * 2.0);
        ",
    );
    assert_eq!(program.workgroup_size, [64, 1, 1]);
    let entry = &program.bind_group_layouts[0].entries[0];
    assert_eq!(entry.kind, ResourceKind::StorageBuffer);
    assert_eq!(entry.visibility, StageMask::COMPUTE);
    assert!(!entry.buffer.as_ref().unwrap().read_only);
}

#[test]
fn test_read_only_storage() {
    let program = compute_builder([8, 8, 1])
        .build_compute(|ctx| {
            let input = ctx.storage_buffer("src", Type::runtime_array(Type::f32())?)?;
            let output = ctx.storage_buffer_at(1, "dst", Type::runtime_array(Type::f32())?)?;
            let gid = ctx.builtin(BuiltinVar::GlobalInvocationId)?;
            ctx.main(|ctx| {
                let i = ctx.declare("i", gid.swizzle("x")?)?;
                ctx.assign(&output.at(&i)?, input.at(&i)?)
            })
        })
        .unwrap();
    assert_wgsl_valid(&program.source);
    filecheck(
        &program.source,
        "
        check: @group(0) @binding(0) var<storage, read> src: array<f32>;
        check: @group(1) @binding(0) var<storage, read_write> dst: array<f32>;
        ",
    );
    let groups: Vec<u32> = program.bind_group_layouts.iter().map(|l| l.group).collect();
    assert_eq!(groups, [0, 1]);
    assert!(program.bind_group_layouts[0].entries[0]
        .buffer
        .as_ref()
        .unwrap()
        .read_only);
}

#[test]
fn test_workgroup_memory_and_atomics() {
    let program = compute_builder([64, 1, 1])
        .build_compute(|ctx| {
            let counter = ctx.define_struct("Counter", &[("hits", Type::atomic(ScalarKind::U32)?)])?;
            let counter = ctx.storage_buffer("counter", counter)?;
            let tile = ctx.workgroup("tile", Type::array(Type::f32(), 64)?)?;
            let lid = ctx.builtin(BuiltinVar::LocalInvocationIndex)?;
            ctx.main(|ctx| {
                ctx.assign(&tile.at(&lid)?, 1.0)?;
                ctx.call("workgroupBarrier", Vec::<Exp>::new())?;
                ctx.call("atomicAdd", args![counter.field("hits")?, 1u32])?;
                Ok(())
            })
        })
        .unwrap();
    assert_wgsl_valid(&program.source);
    filecheck(
        &program.source,
        "
        check: struct Counter {
        nextln: hits: atomic<u32>,
        check: var<storage, read_write> counter: Counter;
        check: var<workgroup> tile: array<f32, 64>;
        check: tile[zInput.zBuiltin_localInvocationIndex] = 1.0;
        nextln: workgroupBarrier();
        nextln: _ = atomicAdd((&counter.hits), 1u);
        ",
    );
}

#[test]
fn test_uniform_block_in_compute() {
    let program = compute_builder([1, 1, 1])
        .build_compute(|ctx| {
            let scale = ctx.uniform("scale", Type::f32())?;
            let data = ctx.storage_buffer("data", Type::runtime_array(Type::f32())?)?;
            ctx.main(|ctx| {
                let first = data.at(0)?;
                let scaled = ctx.mul(&first, &scale)?;
                ctx.assign(&first, scaled)
            })
        })
        .unwrap();
    assert_wgsl_valid(&program.source);
    let entries = &program.bind_group_layouts[0].entries;
    assert_eq!(entries[0].name, "computeUniformBlock0");
    assert_eq!(entries[1].name, "data");
    filecheck(
        &program.source,
        "
        check: var<uniform> computeUniformBlock0: zComputeUniformBlock0;
        check: (data[0i] * computeUniformBlock0.scale)
        ",
    );
}

#[test]
fn test_compute_rejects_bad_workgroup_size() {
    let mut builder = compute_builder([16, 16, 2]);
    let err = builder
        .build_compute(|ctx| ctx.main(|_| Ok(())))
        .unwrap_err();
    assert!(matches!(err, BuildError::ParamValue { .. }));
    assert!(builder.last_error().unwrap().contains("workgroup_size"));
}

#[test]
fn test_compute_needs_webgpu() {
    init_logging();
    for target in [Target::WebGL1, Target::WebGL2] {
        let mut builder = ProgramBuilder::new(BuildOptions::new(target));
        let err = builder
            .build_compute(|ctx| ctx.main(|_| Ok(())))
            .unwrap_err();
        assert!(matches!(err, BuildError::Unsupported { .. }));
    }
}
