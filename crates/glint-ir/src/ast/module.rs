//! Whole-stage modules: globals, functions and pipeline IO.

use alloc::{collections::BTreeSet, string::String, vec::Vec};

use super::{Block, Expr, Stmt, VarRef, VertexSemantic};
use crate::{
    target::ShaderStage,
    types::{AddressSpace, Type, TypeDesc},
};

/// Storage class of a module-scope variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GlobalKind {
    Private,
    Const,
    /// Loose uniform, folded into a uniform block before emission.
    Uniform,
    UniformBuffer,
    StorageBuffer,
    Workgroup,
    Texture,
    Sampler,
}

impl GlobalKind {
    pub fn address_space(self) -> Option<AddressSpace> {
        match self {
            GlobalKind::Private => Some(AddressSpace::Private),
            GlobalKind::Const => None,
            GlobalKind::Uniform | GlobalKind::UniformBuffer => Some(AddressSpace::Uniform),
            GlobalKind::StorageBuffer => Some(AddressSpace::Storage),
            GlobalKind::Workgroup => Some(AddressSpace::Workgroup),
            GlobalKind::Texture | GlobalKind::Sampler => Some(AddressSpace::Handle),
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            GlobalKind::Private | GlobalKind::StorageBuffer | GlobalKind::Workgroup
        )
    }

    /// Check if the global occupies a bind-group slot.
    pub fn is_resource(self) -> bool {
        matches!(
            self,
            GlobalKind::Uniform
                | GlobalKind::UniformBuffer
                | GlobalKind::StorageBuffer
                | GlobalKind::Texture
                | GlobalKind::Sampler
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    pub var: VarRef,
    pub kind: GlobalKind,
    pub group: u32,
    /// Assigned while merging stage resources.
    pub binding: Option<u32>,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub var: VarRef,
    pub by_ref: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Emitted name; overloads are already disambiguated where required.
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub ret: Type,
    pub body: Block,
    pub entry: bool,
}

/// Pipeline input or output slot.
#[derive(Debug, Clone, PartialEq)]
pub struct IoVar {
    pub name: String,
    pub ty: Type,
    pub location: u32,
    /// Integer varyings must not be interpolated.
    pub flat: bool,
    /// Set for vertex attributes.
    pub semantic: Option<VertexSemantic>,
}

#[derive(Debug, Clone)]
pub struct ShaderModule {
    pub stage: ShaderStage,
    pub globals: Vec<GlobalDecl>,
    pub functions: Vec<FunctionDef>,
    pub inputs: Vec<IoVar>,
    pub outputs: Vec<IoVar>,
}

impl ShaderModule {
    pub fn new(stage: ShaderStage) -> Self {
        ShaderModule {
            stage,
            globals: Vec::new(),
            functions: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn entry(&self) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.entry)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalDecl> {
        self.globals.iter().find(|g| g.var.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&IoVar> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Struct types reachable from the module, each after the structs it
    /// contains. With `skip_block_types`, the outermost type of uniform
    /// buffers is left out (GLSL ES 3.00 spells those as interface blocks).
    pub fn struct_types(&self, skip_block_types: bool) -> Vec<Type> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for global in &self.globals {
            match (global.kind, global.var.ty.as_struct()) {
                (GlobalKind::UniformBuffer, Some(s)) if skip_block_types => {
                    for m in &s.members {
                        collect_structs(&m.ty, &mut seen, &mut out);
                    }
                }
                _ => collect_structs(&global.var.ty, &mut seen, &mut out),
            }
        }
        for io in self.inputs.iter().chain(self.outputs.iter()) {
            collect_structs(&io.ty, &mut seen, &mut out);
        }
        for func in &self.functions {
            collect_structs(&func.ret, &mut seen, &mut out);
            for p in &func.params {
                collect_structs(&p.var.ty, &mut seen, &mut out);
            }
            func.body.visit_stmts(&mut |stmt| match stmt {
                Stmt::Declare(decl) => collect_structs(&decl.var.ty, &mut seen, &mut out),
                Stmt::For { var, .. } => collect_structs(&var.ty, &mut seen, &mut out),
                _ => {}
            });
            func.body
                .visit_exprs(&mut |expr| collect_structs(&expr.ty(), &mut seen, &mut out));
        }
        out
    }
}

fn collect_structs(ty: &Type, seen: &mut BTreeSet<String>, out: &mut Vec<Type>) {
    match ty.desc() {
        TypeDesc::Struct(s) => {
            if seen.contains(ty.id()) {
                return;
            }
            for m in &s.members {
                collect_structs(&m.ty, seen, out);
            }
            if seen.insert(String::from(ty.id())) {
                out.push(ty.clone());
            }
        }
        TypeDesc::Array(a) => collect_structs(&a.element, seen, out),
        TypeDesc::Pointer(p) => collect_structs(&p.pointee, seen, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{SymbolId, VarKind},
        types::LayoutKind,
    };
    use alloc::{string::ToString, vec};

    #[test]
    fn test_struct_types_in_dependency_order() {
        let inner = Type::structure("Inner", vec![("x".to_string(), Type::f32())], LayoutKind::Default)
            .unwrap();
        let outer = Type::structure(
            "Outer",
            vec![
                ("a".to_string(), inner.clone()),
                ("b".to_string(), Type::array(inner.clone(), 2).unwrap()),
            ],
            LayoutKind::Default,
        )
        .unwrap();
        let mut module = ShaderModule::new(ShaderStage::Fragment);
        module.globals.push(GlobalDecl {
            var: VarRef {
                id: SymbolId(0),
                name: "o".to_string(),
                ty: outer,
                kind: VarKind::Global(GlobalKind::Private),
            },
            kind: GlobalKind::Private,
            group: 0,
            binding: None,
            init: None,
        });
        let names: Vec<String> = module
            .struct_types(false)
            .iter()
            .map(|t| t.as_struct().unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["Inner".to_string(), "Outer".to_string()]);
    }
}
