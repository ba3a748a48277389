//! Reconcile the globals of a program's stages: fold loose uniforms into
//! blocks, assign bindings and derive the bind group layouts.

use alloc::{
    collections::BTreeMap,
    format,
    string::{String, ToString},
    vec::Vec,
};

use glint_ir::{
    ast::{GlobalDecl, GlobalKind, SymbolId, VarKind, VarRef},
    buffer_layout, is_compatible, LayoutKind, ShaderStage, StageMask, StorageAccess, Type,
    TypeDesc, WriteSet,
};

use crate::{
    bindings::{BindGroupLayout, BindingEntry, BufferBinding, ResourceKind, TextureBinding},
    ctx::StageOutput,
    error::{BuildError, BuildResult},
};

/// A stage after merging, ready for emission.
pub(crate) struct MergedStage {
    pub output: StageOutput,
    pub renames: BTreeMap<String, String>,
    pub writes: WriteSet,
}

pub(crate) struct Merged {
    pub stages: Vec<MergedStage>,
    pub layouts: Vec<BindGroupLayout>,
}

/// Which block a loose uniform lands in. The order is the binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BlockOwner {
    Vertex,
    Fragment,
    Shared,
    Compute,
}

impl BlockOwner {
    fn of(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => BlockOwner::Vertex,
            ShaderStage::Fragment => BlockOwner::Fragment,
            ShaderStage::Compute => BlockOwner::Compute,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            BlockOwner::Vertex => "vertex",
            BlockOwner::Fragment => "fragment",
            BlockOwner::Shared => "shared",
            BlockOwner::Compute => "compute",
        }
    }

    fn type_prefix(self) -> &'static str {
        match self {
            BlockOwner::Vertex => "Vertex",
            BlockOwner::Fragment => "Fragment",
            BlockOwner::Shared => "Shared",
            BlockOwner::Compute => "Compute",
        }
    }
}

struct LooseUniform {
    name: String,
    ty: Type,
    group: u32,
    stages: StageMask,
}

struct Block {
    owner: BlockOwner,
    group: u32,
    name: String,
    ty: Type,
    members: Vec<String>,
    visibility: StageMask,
    binding: u32,
}

/// A resource binding shared by every stage declaring a global of that name.
struct Resource {
    name: String,
    kind: GlobalKind,
    ty: Type,
    group: u32,
    binding: u32,
    visibility: StageMask,
    written: bool,
}

pub(crate) fn merge(stages: Vec<StageOutput>) -> BuildResult<Merged> {
    let writes: Vec<WriteSet> = stages.iter().map(|s| WriteSet::collect(&s.module)).collect();

    for stage in &stages {
        for global in &stage.module.globals {
            match global.kind {
                GlobalKind::UniformBuffer => check_uniform_buffer(&global.var)?,
                GlobalKind::StorageBuffer => check_storage_buffer(&global.var)?,
                _ => {}
            }
        }
    }

    let loose = collect_loose(&stages)?;
    let mut next_binding: BTreeMap<u32, u32> = BTreeMap::new();
    let blocks = build_blocks(&loose, &mut next_binding)?;
    for block in &blocks {
        let clash = stages
            .iter()
            .flat_map(|s| s.module.globals.iter())
            .any(|g| g.var.name == block.name);
        if clash {
            return Err(BuildError::merge(format!(
                "{} is reserved for the synthesized uniform block",
                block.name
            )));
        }
    }
    let resources = collect_resources(&stages, &writes, &mut next_binding)?;
    let layouts = bind_group_layouts(&stages, &blocks, &resources)?;

    let merged = stages
        .into_iter()
        .zip(writes)
        .map(|(output, writes)| rewrite_stage(output, writes, &blocks, &resources))
        .collect::<BuildResult<Vec<_>>>()?;
    Ok(Merged {
        stages: merged,
        layouts,
    })
}

fn contains_packed(ty: &Type) -> bool {
    match ty.desc() {
        TypeDesc::Struct(s) => {
            s.layout == LayoutKind::Packed || s.members.iter().any(|m| contains_packed(&m.ty))
        }
        TypeDesc::Array(a) => contains_packed(&a.element),
        _ => false,
    }
}

fn check_shareable(var: &VarRef) -> BuildResult<()> {
    if contains_packed(&var.ty) {
        return Err(BuildError::merge(format!(
            "{} uses a packed struct, which cannot back a GPU buffer",
            var.name
        )));
    }
    if !var.ty.is_host_shareable() {
        return Err(glint_ir::TypeError::NotHostShareable(var.ty.to_string()).into());
    }
    Ok(())
}

/// Explicit uniform buffers are shared with the host as-is, so their own
/// layout must agree with std140.
fn check_uniform_buffer(var: &VarRef) -> BuildResult<()> {
    check_shareable(var)?;
    let s = var.ty.as_struct().ok_or_else(|| {
        BuildError::internal(format!("uniform buffer {} is not a struct", var.name))
    })?;
    let std140 = buffer_layout(&var.ty, LayoutKind::Std140)?;
    for (member, entry) in s.members.iter().zip(&std140.entries) {
        let placed = member.layout.ok_or_else(|| {
            BuildError::internal(format!("{}.{} has no layout", s.name, member.name))
        })?;
        if placed.offset != entry.offset || placed.size != entry.byte_size {
            return Err(BuildError::merge(format!(
                "{}.{} is at offset {} (size {}) but std140 needs offset {} (size {})",
                s.name, member.name, placed.offset, placed.size, entry.offset, entry.byte_size
            )));
        }
    }
    Ok(())
}

fn check_storage_buffer(var: &VarRef) -> BuildResult<()> {
    check_shareable(var)?;
    buffer_layout(&var.ty, storage_layout(&var.ty))?;
    Ok(())
}

fn storage_layout(ty: &Type) -> LayoutKind {
    ty.as_struct().map_or(LayoutKind::Default, |s| s.layout)
}

fn collect_loose(stages: &[StageOutput]) -> BuildResult<Vec<LooseUniform>> {
    let mut loose: Vec<LooseUniform> = Vec::new();
    for stage in stages {
        let mask = stage.module.stage.mask();
        for global in &stage.module.globals {
            if global.kind != GlobalKind::Uniform {
                continue;
            }
            let var = &global.var;
            match loose.iter_mut().find(|u| u.name == var.name) {
                Some(u) => {
                    if u.group != global.group {
                        return Err(BuildError::merge(format!(
                            "uniform {} is in group {} and group {}",
                            var.name, u.group, global.group
                        )));
                    }
                    if !is_compatible(&u.ty, &var.ty) {
                        return Err(BuildError::merge(format!(
                            "uniform {} is declared as {} and {}",
                            var.name, u.ty, var.ty
                        )));
                    }
                    u.stages = u.stages | mask;
                }
                None => loose.push(LooseUniform {
                    name: var.name.clone(),
                    ty: var.ty.clone(),
                    group: global.group,
                    stages: mask,
                }),
            }
        }
    }
    Ok(loose)
}

fn build_blocks(
    loose: &[LooseUniform],
    next_binding: &mut BTreeMap<u32, u32>,
) -> BuildResult<Vec<Block>> {
    let mut grouped: BTreeMap<(u32, BlockOwner), Vec<&LooseUniform>> = BTreeMap::new();
    for u in loose {
        let owner = match u.stages.single() {
            Some(stage) => BlockOwner::of(stage),
            None => BlockOwner::Shared,
        };
        grouped.entry((u.group, owner)).or_default().push(u);
    }
    let mut blocks = Vec::new();
    for ((group, owner), members) in grouped {
        let name = format!("{}UniformBlock{}", owner.prefix(), group);
        let type_name = format!("z{}UniformBlock{}", owner.type_prefix(), group);
        let fields = members
            .iter()
            .map(|u| (u.name.clone(), u.ty.clone()))
            .collect();
        let ty = Type::structure(&type_name, fields, LayoutKind::Std140)?;
        let binding = next_binding.entry(group).or_insert(0);
        log::trace!("{} -> group {} binding {}", name, group, binding);
        blocks.push(Block {
            owner,
            group,
            name,
            ty,
            members: members.iter().map(|u| u.name.clone()).collect(),
            visibility: members
                .iter()
                .fold(StageMask::NONE, |mask, u| mask | u.stages),
            binding: *binding,
        });
        *binding += 1;
    }
    Ok(blocks)
}

fn resource_mismatch(name: &str, what: &str) -> BuildError {
    BuildError::merge(format!("{} is declared with different {} in each stage", name, what))
}

fn collect_resources(
    stages: &[StageOutput],
    writes: &[WriteSet],
    next_binding: &mut BTreeMap<u32, u32>,
) -> BuildResult<Vec<Resource>> {
    let mut resources: Vec<Resource> = Vec::new();
    for (stage, writes) in stages.iter().zip(writes) {
        let mask = stage.module.stage.mask();
        for global in &stage.module.globals {
            let bound = matches!(
                global.kind,
                GlobalKind::UniformBuffer
                    | GlobalKind::StorageBuffer
                    | GlobalKind::Texture
                    | GlobalKind::Sampler
            );
            if !bound {
                continue;
            }
            let var = &global.var;
            let written = writes.is_written(var.id);
            match resources.iter_mut().find(|r| r.name == var.name) {
                Some(r) => {
                    if r.kind != global.kind {
                        return Err(resource_mismatch(&var.name, "kinds"));
                    }
                    if r.group != global.group {
                        return Err(resource_mismatch(&var.name, "groups"));
                    }
                    if !is_compatible(&r.ty, &var.ty) {
                        return Err(resource_mismatch(&var.name, "types"));
                    }
                    r.visibility = r.visibility | mask;
                    r.written |= written;
                }
                None => {
                    let binding = next_binding.entry(global.group).or_insert(0);
                    log::trace!("{} -> group {} binding {}", var.name, global.group, binding);
                    resources.push(Resource {
                        name: var.name.clone(),
                        kind: global.kind,
                        ty: var.ty.clone(),
                        group: global.group,
                        binding: *binding,
                        visibility: mask,
                        written,
                    });
                    *binding += 1;
                }
            }
        }
    }
    for r in &resources {
        if !r.visibility.contains(ShaderStage::Vertex) {
            continue;
        }
        let writable_texture = r
            .ty
            .as_texture()
            .and_then(|t| t.storage)
            .is_some_and(|(_, access)| access != StorageAccess::Read);
        if (r.kind == GlobalKind::StorageBuffer && r.written) || writable_texture {
            return Err(BuildError::merge(format!(
                "{} is writable storage visible to the vertex stage",
                r.name
            )));
        }
    }
    Ok(resources)
}

fn resource_entry(r: &Resource, auto_sampler: bool) -> BuildResult<BindingEntry> {
    let mut entry = BindingEntry {
        binding: r.binding,
        name: r.name.clone(),
        kind: ResourceKind::UniformBuffer,
        visibility: r.visibility,
        auto_sampler: false,
        buffer: None,
        texture: None,
        sampler: None,
    };
    match (r.kind, r.ty.desc()) {
        (GlobalKind::UniformBuffer, _) => {
            entry.buffer = Some(BufferBinding {
                ty: r.ty.clone(),
                layout: LayoutKind::Std140,
                byte_layout: buffer_layout(&r.ty, LayoutKind::Std140)?,
                read_only: true,
            });
        }
        (GlobalKind::StorageBuffer, _) => {
            let layout = storage_layout(&r.ty);
            entry.kind = ResourceKind::StorageBuffer;
            entry.buffer = Some(BufferBinding {
                ty: r.ty.clone(),
                layout,
                byte_layout: buffer_layout(&r.ty, layout)?,
                read_only: !r.written,
            });
        }
        (GlobalKind::Texture, TypeDesc::Texture(tex)) => {
            entry.kind = ResourceKind::of_texture(tex);
            entry.texture = Some(TextureBinding::from(tex));
        }
        (GlobalKind::Sampler, TypeDesc::Sampler(kind)) => {
            entry.kind = ResourceKind::Sampler;
            entry.sampler = Some(*kind);
            entry.auto_sampler = auto_sampler;
        }
        _ => {
            return Err(BuildError::internal(format!(
                "{} of type {} cannot be bound as {:?}",
                r.name, r.ty, r.kind
            )))
        }
    }
    Ok(entry)
}

fn bind_group_layouts(
    stages: &[StageOutput],
    blocks: &[Block],
    resources: &[Resource],
) -> BuildResult<Vec<BindGroupLayout>> {
    let max_group = blocks
        .iter()
        .map(|b| b.group)
        .chain(resources.iter().map(|r| r.group))
        .max();
    let Some(max_group) = max_group else {
        return Ok(Vec::new());
    };
    let mut layouts: Vec<BindGroupLayout> = (0..=max_group)
        .map(|group| BindGroupLayout {
            group,
            entries: Vec::new(),
        })
        .collect();
    for block in blocks {
        layouts[block.group as usize].entries.push(BindingEntry {
            binding: block.binding,
            name: block.name.clone(),
            kind: ResourceKind::UniformBuffer,
            visibility: block.visibility,
            auto_sampler: false,
            buffer: Some(BufferBinding {
                ty: block.ty.clone(),
                layout: LayoutKind::Std140,
                byte_layout: buffer_layout(&block.ty, LayoutKind::Std140)?,
                read_only: true,
            }),
            texture: None,
            sampler: None,
        });
    }
    for r in resources {
        let auto_sampler = stages
            .iter()
            .flat_map(|s| s.samplers.values())
            .any(|names| names.contains(&r.name));
        layouts[r.group as usize]
            .entries
            .push(resource_entry(r, auto_sampler)?);
    }
    for layout in &mut layouts {
        layout.entries.sort_by_key(|e| e.binding);
    }
    Ok(layouts)
}

fn rewrite_stage(
    mut output: StageOutput,
    writes: WriteSet,
    blocks: &[Block],
    resources: &[Resource],
) -> BuildResult<MergedStage> {
    let stage = output.module.stage;
    let mut renames = BTreeMap::new();
    let mut block_globals = Vec::new();
    for block in blocks.iter().filter(|b| b.visibility.contains(stage)) {
        let used_here = output
            .module
            .globals
            .iter()
            .any(|g| g.kind == GlobalKind::Uniform && block.members.contains(&g.var.name));
        if !used_here {
            continue;
        }
        for member in &block.members {
            renames.insert(member.clone(), format!("{}.{}", block.name, member));
        }
        let ty = stage_block_type(&output, block)?;
        let id = SymbolId(output.next_symbol);
        output.next_symbol += 1;
        block_globals.push(GlobalDecl {
            var: VarRef {
                id,
                name: block.name.clone(),
                ty,
                kind: VarKind::Global(GlobalKind::UniformBuffer),
            },
            kind: GlobalKind::UniformBuffer,
            group: block.group,
            binding: Some(block.binding),
            init: None,
        });
        log::trace!("{} stage folds {} uniforms into {:?} block", stage, block.members.len(), block.owner);
    }
    let globals = core::mem::take(&mut output.module.globals);
    output.module.globals = block_globals;
    for mut global in globals {
        if global.kind == GlobalKind::Uniform {
            continue;
        }
        if let Some(r) = resources.iter().find(|r| r.name == global.var.name) {
            global.binding = Some(r.binding);
        }
        output.module.globals.push(global);
    }
    Ok(MergedStage {
        output,
        renames,
        writes,
    })
}

/// The block as one stage sees it. Members keep the struct types that stage
/// declared, so differently named but compatible structs stay consistent
/// with the stage's own expressions.
fn stage_block_type(output: &StageOutput, block: &Block) -> BuildResult<Type> {
    let TypeDesc::Struct(merged) = block.ty.desc() else {
        return Err(BuildError::internal(format!("{} is not a struct", block.name)));
    };
    let fields = merged
        .members
        .iter()
        .map(|m| {
            let own = output
                .module
                .globals
                .iter()
                .find(|g| g.kind == GlobalKind::Uniform && g.var.name == m.name);
            let ty = own.map_or_else(|| m.ty.clone(), |g| g.var.ty.clone());
            (m.name.clone(), ty)
        })
        .collect();
    Ok(Type::structure(&merged.name, fields, LayoutKind::Std140)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinRegistry;
    use crate::ctx::ShaderCtx;
    use alloc::sync::Arc;
    use glint_ir::{SampleType, SamplerKind, Target, TextureDim, TextureType};

    fn stage(
        stage: ShaderStage,
        describe: impl FnOnce(&mut ShaderCtx) -> BuildResult<()>,
    ) -> StageOutput {
        let mut ctx = ShaderCtx::new(
            Target::WebGPU,
            stage,
            LayoutKind::Default,
            Arc::new(BuiltinRegistry::standard()),
        );
        describe(&mut ctx).unwrap();
        ctx.main(|_| Ok(())).unwrap();
        ctx.finish().unwrap()
    }

    #[test]
    fn test_vertex_only_uniform_gets_one_block() {
        let vs = stage(ShaderStage::Vertex, |c| {
            c.uniform("mvp", Type::mat(4, 4)).map(|_| ())
        });
        let fs = stage(ShaderStage::Fragment, |_| Ok(()));
        let merged = merge(alloc::vec![vs, fs]).unwrap();
        assert_eq!(merged.layouts.len(), 1);
        let entries = &merged.layouts[0].entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "vertexUniformBlock0");
        assert_eq!(entries[0].kind, ResourceKind::UniformBuffer);
        assert_eq!(entries[0].visibility, StageMask::VERTEX);
        assert_eq!(
            merged.stages[0].renames.get("mvp").map(String::as_str),
            Some("vertexUniformBlock0.mvp")
        );
        assert!(merged.stages[1].renames.is_empty());
    }

    #[test]
    fn test_shared_uniform_block() {
        let vs = stage(ShaderStage::Vertex, |c| {
            c.uniform("time", Type::f32())?;
            c.uniform("mvp", Type::mat(4, 4)).map(|_| ())
        });
        let fs = stage(ShaderStage::Fragment, |c| {
            c.uniform("time", Type::f32()).map(|_| ())
        });
        let merged = merge(alloc::vec![vs, fs]).unwrap();
        let names: Vec<&str> = merged.layouts[0]
            .entries
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, ["vertexUniformBlock0", "sharedUniformBlock0"]);
        let shared = merged.layouts[0].entry("sharedUniformBlock0").unwrap();
        assert_eq!(shared.binding, 1);
        assert_eq!(shared.visibility, StageMask::VERTEX | StageMask::FRAGMENT);
        assert_eq!(
            merged.stages[1].renames.get("time").map(String::as_str),
            Some("sharedUniformBlock0.time")
        );
        assert_eq!(merged.stages[1].output.module.globals.len(), 1);
    }

    #[test]
    fn test_conflicting_uniform_types() {
        let vs = stage(ShaderStage::Vertex, |c| c.uniform("k", Type::f32()).map(|_| ()));
        let fs = stage(ShaderStage::Fragment, |c| {
            c.uniform("k", Type::vec2f()).map(|_| ())
        });
        assert!(matches!(
            merge(alloc::vec![vs, fs]),
            Err(BuildError::Merge(_))
        ));
    }

    #[test]
    fn test_textures_follow_blocks_and_share_bindings() {
        let tex = Type::texture(TextureType::sampled(TextureDim::D2, SampleType::Float)).unwrap();
        let vs = stage(ShaderStage::Vertex, |c| {
            c.uniform("height", tex.clone())?;
            c.uniform("scale", Type::f32()).map(|_| ())
        });
        let fs = stage(ShaderStage::Fragment, |c| {
            c.uniform("height", tex.clone())?;
            c.uniform("linear", Type::sampler(SamplerKind::Sample)).map(|_| ())
        });
        let merged = merge(alloc::vec![vs, fs]).unwrap();
        let layout = &merged.layouts[0];
        let height = layout.entry("height").unwrap();
        assert_eq!(height.binding, 1);
        assert_eq!(height.visibility, StageMask::VERTEX | StageMask::FRAGMENT);
        let linear = layout.entry("linear").unwrap();
        assert_eq!(linear.binding, 2);
        assert!(!linear.auto_sampler);
    }

    #[test]
    fn test_groups_without_entries_are_listed() {
        let vs = stage(ShaderStage::Vertex, |c| {
            c.uniform_at(2, "scale", Type::f32()).map(|_| ())
        });
        let fs = stage(ShaderStage::Fragment, |_| Ok(()));
        let merged = merge(alloc::vec![vs, fs]).unwrap();
        let groups: Vec<u32> = merged.layouts.iter().map(|l| l.group).collect();
        assert_eq!(groups, [0, 1, 2]);
        assert!(merged.layouts[0].is_empty());
    }

    #[test]
    fn test_uniform_buffer_must_match_std140() {
        let vs = stage(ShaderStage::Vertex, |c| {
            let light = c.define_struct(
                "Light",
                &[("dir", Type::vec3f()), ("intensity", Type::f32())],
            )?;
            c.uniform_buffer("light", light).map(|_| ())
        });
        let fs = stage(ShaderStage::Fragment, |_| Ok(()));
        assert!(merge(alloc::vec![vs, fs]).is_ok());

        let vs = stage(ShaderStage::Vertex, |c| {
            let packed = c.define_struct_with_layout(
                "Packed",
                &[("a", Type::f32()), ("b", Type::vec3f())],
                LayoutKind::Packed,
            )?;
            c.uniform_buffer("tight", packed).map(|_| ())
        });
        let fs = stage(ShaderStage::Fragment, |_| Ok(()));
        assert!(matches!(
            merge(alloc::vec![vs, fs]),
            Err(BuildError::Merge(_))
        ));
    }
}
