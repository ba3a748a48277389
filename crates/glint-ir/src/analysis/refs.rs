//! Which pipeline inputs, outputs and builtins a function touches.

use alloc::{collections::BTreeSet, string::String};

use crate::ast::{BuiltinVar, Expr, FunctionDef, ShaderModule, Stmt, SymbolId, VarKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub symbols: BTreeSet<SymbolId>,
    pub builtins: BTreeSet<BuiltinVar>,
    pub inputs: BTreeSet<String>,
    pub outputs: BTreeSet<String>,
}

impl References {
    pub fn of_function(func: &FunctionDef) -> Self {
        let mut refs = References::default();
        func.body.visit_exprs(&mut |expr| refs.note(expr));
        func.body.visit_stmts(&mut |stmt| {
            if let Stmt::For { var, .. } = stmt {
                refs.symbols.insert(var.id);
            }
        });
        refs
    }

    pub fn of_module(module: &ShaderModule) -> Self {
        let mut refs = References::default();
        for func in &module.functions {
            refs.merge(References::of_function(func));
        }
        refs
    }

    fn note(&mut self, expr: &Expr) {
        if let Expr::Var(v) = expr {
            self.symbols.insert(v.id);
            match v.kind {
                VarKind::Builtin(b) => {
                    self.builtins.insert(b);
                }
                VarKind::Input => {
                    self.inputs.insert(v.name.clone());
                }
                VarKind::Output => {
                    self.outputs.insert(v.name.clone());
                }
                _ => {}
            }
        }
    }

    pub fn merge(&mut self, other: References) {
        self.symbols.extend(other.symbols);
        self.builtins.extend(other.builtins);
        self.inputs.extend(other.inputs);
        self.outputs.extend(other.outputs);
    }

    /// Check if any stage input (attribute, varying or input builtin) is read.
    pub fn reads_stage_inputs(&self) -> bool {
        !self.inputs.is_empty() || self.builtins.iter().any(|b| !b.is_output())
    }
}
