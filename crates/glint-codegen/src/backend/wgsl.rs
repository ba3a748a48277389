//! WGSL emission.
//!
//! Stage IO is routed through generated structs: the entry point receives a
//! `zInput` parameter, writes outputs into a private `zOutput` value and
//! returns it. Helper functions that read stage inputs see a private copy
//! taken at the top of the entry point.

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use glint_ir::{
    ast::{
        BuiltinVar, Expr, FunctionDef, GlobalDecl, GlobalKind, IoVar, Literal, ShaderModule, Stmt,
        VarDecl, VarKind, VarRef,
    },
    type_name, LayoutKind, References, ShaderStage, Target, Type,
};

use super::{float_literal, join, ShaderBackend};
use crate::{
    error::{CodegenError, CodegenResult},
    interface::ShaderInterface,
    writer::SourceWriter,
};

const TARGET: Target = Target::WebGPU;

#[derive(Debug, Clone, Copy, Default)]
pub struct WgslBackend;

impl ShaderBackend for WgslBackend {
    fn target(&self) -> Target {
        TARGET
    }

    fn emit(&self, module: &ShaderModule, iface: &ShaderInterface) -> CodegenResult<String> {
        let refs = References::of_module(module);
        let input_builtins: Vec<BuiltinVar> = refs
            .builtins
            .iter()
            .copied()
            .filter(|b| !b.is_output())
            .collect();
        let mut output_builtins = Vec::new();
        if module.stage == ShaderStage::Vertex {
            output_builtins.push(BuiltinVar::Position);
        }
        if refs.builtins.contains(&BuiltinVar::FragDepth) {
            output_builtins.push(BuiltinVar::FragDepth);
        }
        if refs.builtins.contains(&BuiltinVar::PointSize) {
            return Err(CodegenError::unsupported("point size", TARGET));
        }
        let has_input = !module.inputs.is_empty() || !input_builtins.is_empty();
        let has_output = !module.outputs.is_empty() || !output_builtins.is_empty();
        let copy_input = has_input
            && module
                .functions
                .iter()
                .filter(|f| !f.entry)
                .any(|f| References::of_function(f).reads_stage_inputs());

        let mut emitter = WgslEmitter {
            module,
            iface,
            w: SourceWriter::new(),
            input_builtins,
            output_builtins,
            has_input,
            has_output,
            copy_input,
            in_entry: false,
        };
        emitter.emit_module()?;
        Ok(emitter.w.finish())
    }
}

struct WgslEmitter<'a> {
    module: &'a ShaderModule,
    iface: &'a ShaderInterface,
    w: SourceWriter,
    input_builtins: Vec<BuiltinVar>,
    output_builtins: Vec<BuiltinVar>,
    has_input: bool,
    has_output: bool,
    copy_input: bool,
    in_entry: bool,
}

fn stage_struct_names(stage: ShaderStage) -> (&'static str, &'static str) {
    match stage {
        ShaderStage::Vertex => ("zVertexInput", "zVertexOutput"),
        ShaderStage::Fragment => ("zFragmentInput", "zFragmentOutput"),
        ShaderStage::Compute => ("zComputeInput", "zComputeOutput"),
    }
}

fn builtin_field(b: BuiltinVar) -> String {
    format!("zBuiltin_{}", b.name())
}

impl WgslEmitter<'_> {
    fn ty(&self, ty: &Type) -> CodegenResult<String> {
        Ok(type_name(ty, TARGET, "")?)
    }

    fn emit_module(&mut self) -> CodegenResult<()> {
        let module = self.module;
        for ty in module.struct_types(false) {
            self.emit_struct(&ty)?;
        }
        self.emit_io_structs()?;
        for global in &module.globals {
            self.emit_global(global)?;
        }
        let (input, output) = stage_struct_names(module.stage);
        if self.has_output {
            self.w.line(format!("var<private> zOutput: {};", output));
        }
        if self.copy_input {
            self.w.line(format!("var<private> zInputCopy: {};", input));
        }
        for func in &module.functions {
            self.w.blank();
            self.emit_function(func)?;
        }
        Ok(())
    }

    fn emit_struct(&mut self, ty: &Type) -> CodegenResult<()> {
        let Some(s) = ty.as_struct() else {
            return Ok(());
        };
        if s.layout == LayoutKind::Packed {
            return Err(CodegenError::unsupported(
                format!("packed layout of struct {}", s.name),
                TARGET,
            ));
        }
        let explicit = s.layout != LayoutKind::Default && s.size.is_some();
        self.w.line(format!("struct {} {{", s.name));
        self.w.indent();
        let last = s.members.len().saturating_sub(1);
        for (i, m) in s.members.iter().enumerate() {
            let mut attrs = String::new();
            if let (true, Some(place)) = (explicit, m.layout) {
                if Some(place.align) != m.default_align {
                    attrs.push_str(&format!("@align({}) ", place.align));
                }
                let runtime = m.ty.as_array().is_some_and(|a| a.is_runtime());
                let size = match (i == last, s.size) {
                    (true, Some(total)) => total - place.offset,
                    _ => place.size,
                };
                if !runtime && Some(size) != m.default_size {
                    attrs.push_str(&format!("@size({}) ", size));
                }
            }
            let ty = self.ty(&m.ty)?;
            self.w.line(format!("{}{}: {},", attrs, m.name, ty));
        }
        self.w.dedent();
        self.w.line("}");
        self.w.blank();
        Ok(())
    }

    fn io_field(&self, io: &IoVar) -> CodegenResult<String> {
        let interpolate = if io.flat { "@interpolate(flat) " } else { "" };
        let location = io.semantic.map_or(io.location, |s| s.location());
        Ok(format!(
            "@location({}) {}{}: {},",
            location,
            interpolate,
            io.name,
            self.ty(&io.ty)?
        ))
    }

    fn builtin_field_decl(&self, b: BuiltinVar) -> CodegenResult<String> {
        let name = b
            .wgsl_name()
            .ok_or_else(|| CodegenError::unsupported(format!("builtin {}", b.name()), TARGET))?;
        Ok(format!(
            "@builtin({}) {}: {},",
            name,
            builtin_field(b),
            self.ty(&b.ty())?
        ))
    }

    fn emit_io_structs(&mut self) -> CodegenResult<()> {
        let module = self.module;
        let (input, output) = stage_struct_names(module.stage);
        if self.has_input {
            let mut fields = Vec::new();
            for b in &self.input_builtins {
                fields.push(self.builtin_field_decl(*b)?);
            }
            for io in &module.inputs {
                fields.push(self.io_field(io)?);
            }
            self.emit_plain_struct(input, fields);
        }
        if self.has_output {
            let mut fields = Vec::new();
            for b in &self.output_builtins {
                fields.push(self.builtin_field_decl(*b)?);
            }
            for io in &module.outputs {
                fields.push(self.io_field(io)?);
            }
            self.emit_plain_struct(output, fields);
        }
        Ok(())
    }

    fn emit_plain_struct(&mut self, name: &str, fields: Vec<String>) {
        self.w.line(format!("struct {} {{", name));
        self.w.indent();
        for field in fields {
            self.w.line(field);
        }
        self.w.dedent();
        self.w.line("}");
        self.w.blank();
    }

    fn binding(&self, global: &GlobalDecl) -> CodegenResult<String> {
        let binding = global.binding.ok_or_else(|| {
            CodegenError::internal(format!("resource {} has no binding", global.var.name))
        })?;
        Ok(format!("@group({}) @binding({})", global.group, binding))
    }

    fn emit_global(&mut self, global: &GlobalDecl) -> CodegenResult<()> {
        let name = &global.var.name;
        let ty = self.ty(&global.var.ty)?;
        let line = match global.kind {
            GlobalKind::Private => match &global.init {
                Some(init) => format!("var<private> {}: {} = {};", name, ty, self.expr(init)?),
                None => format!("var<private> {}: {};", name, ty),
            },
            GlobalKind::Const => {
                let init = global.init.as_ref().ok_or_else(|| {
                    CodegenError::internal(format!("constant {} has no value", name))
                })?;
                format!("const {}: {} = {};", name, ty, self.expr(init)?)
            }
            GlobalKind::Uniform | GlobalKind::UniformBuffer => {
                format!("{} var<uniform> {}: {};", self.binding(global)?, name, ty)
            }
            GlobalKind::StorageBuffer => {
                let access = if self.iface.writes.is_written(global.var.id) {
                    "read_write"
                } else {
                    "read"
                };
                format!(
                    "{} var<storage, {}> {}: {};",
                    self.binding(global)?,
                    access,
                    name,
                    ty
                )
            }
            GlobalKind::Workgroup => format!("var<workgroup> {}: {};", name, ty),
            GlobalKind::Texture | GlobalKind::Sampler => {
                format!("{} var {}: {};", self.binding(global)?, name, ty)
            }
        };
        self.w.line(line);
        Ok(())
    }

    fn emit_function(&mut self, func: &FunctionDef) -> CodegenResult<()> {
        self.in_entry = func.entry;
        if func.entry {
            return self.emit_entry(func);
        }
        let mut params = Vec::new();
        let mut prologue = Vec::new();
        for p in &func.params {
            let ty = self.ty(&p.var.ty)?;
            if !p.by_ref && self.iface.writes.is_written(p.var.id) {
                params.push(format!("zParam_{}: {}", p.var.name, ty));
                prologue.push(format!("var {n}: {} = zParam_{n};", ty, n = p.var.name));
            } else {
                params.push(format!("{}: {}", p.var.name, ty));
            }
        }
        let ret = if func.ret.is_void() {
            String::new()
        } else {
            format!(" -> {}", self.ty(&func.ret)?)
        };
        self.w
            .line(format!("fn {}({}){} {{", func.name, join(params), ret));
        self.w.indent();
        for line in prologue {
            self.w.line(line);
        }
        for stmt in &func.body.stmts {
            self.emit_stmt(stmt)?;
        }
        self.w.dedent();
        self.w.line("}");
        Ok(())
    }

    fn emit_entry(&mut self, func: &FunctionDef) -> CodegenResult<()> {
        let stage = self.module.stage;
        let (input, output) = stage_struct_names(stage);
        match stage {
            ShaderStage::Vertex => self.w.line("@vertex"),
            ShaderStage::Fragment => self.w.line("@fragment"),
            ShaderStage::Compute => {
                let [x, y, z] = self.iface.workgroup_size;
                self.w
                    .line(format!("@compute @workgroup_size({}, {}, {})", x, y, z));
            }
        }
        let params = if self.has_input {
            format!("zInput: {}", input)
        } else {
            String::new()
        };
        let ret = if self.has_output {
            format!(" -> {}", output)
        } else {
            String::new()
        };
        self.w.line(format!("fn {}({}){} {{", func.name, params, ret));
        self.w.indent();
        if self.copy_input {
            self.w.line("zInputCopy = zInput;");
        }
        for stmt in &func.body.stmts {
            self.emit_stmt(stmt)?;
        }
        if self.has_output && !func.body.ends_in_return() {
            self.w.line("return zOutput;");
        }
        self.w.dedent();
        self.w.line("}");
        Ok(())
    }

    fn emit_block(&mut self, stmts: &[Stmt]) -> CodegenResult<()> {
        self.w.indent();
        for stmt in stmts {
            self.emit_stmt(stmt)?;
        }
        self.w.dedent();
        Ok(())
    }

    fn emit_decl(&mut self, decl: &VarDecl) -> CodegenResult<()> {
        let var = &decl.var;
        let ty = self.ty(&var.ty)?;
        let written = self.iface.writes.is_written(var.id);
        let line = match &decl.init {
            Some(init) => {
                let keyword = if var.ty.as_pointer().is_some() {
                    "let"
                } else if written {
                    "var"
                } else if init.is_const_exp() {
                    "const"
                } else {
                    "let"
                };
                format!("{} {}: {} = {};", keyword, var.name, ty, self.expr(init)?)
            }
            None => format!("var {}: {};", var.name, ty),
        };
        self.w.line(line);
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        match stmt {
            Stmt::Declare(decl) => self.emit_decl(decl)?,
            Stmt::Assign { target, value } => {
                let line = format!("{} = {};", self.expr(target)?, self.expr(value)?);
                self.w.line(line);
            }
            Stmt::Call { call, .. } => {
                let text = self.expr(call)?;
                if call.ty().is_void() {
                    self.w.line(format!("{};", text));
                } else {
                    self.w.line(format!("_ = {};", text));
                }
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (i, (cond, block)) in branches.iter().enumerate() {
                    let cond = self.expr(cond)?;
                    if i == 0 {
                        self.w.line(format!("if ({}) {{", cond));
                    } else {
                        self.w.line(format!("}} else if ({}) {{", cond));
                    }
                    self.emit_block(&block.stmts)?;
                }
                if let Some(block) = otherwise {
                    self.w.line("} else {");
                    self.emit_block(&block.stmts)?;
                }
                self.w.line("}");
            }
            Stmt::For {
                var,
                start,
                end,
                body,
            } => {
                let line = format!(
                    "for (var {n}: {} = {}; {n} < {}; {n}++) {{",
                    self.ty(&var.ty)?,
                    self.expr(start)?,
                    self.expr(end)?,
                    n = var.name
                );
                self.w.line(line);
                self.emit_block(&body.stmts)?;
                self.w.line("}");
            }
            Stmt::While { cond, body } => {
                let line = format!("while ({}) {{", self.expr(cond)?);
                self.w.line(line);
                self.emit_block(&body.stmts)?;
                self.w.line("}");
            }
            Stmt::DoWhile { body, cond } => {
                let cond = self.expr(cond)?;
                self.w.line("loop {");
                self.emit_block(&body.stmts)?;
                self.w.indent();
                self.w.line("continuing {");
                self.w.indent();
                self.w.line(format!("break if !({});", cond));
                self.w.dedent();
                self.w.line("}");
                self.w.dedent();
                self.w.line("}");
            }
            Stmt::Scope(block) => {
                self.w.line("{");
                self.emit_block(&block.stmts)?;
                self.w.line("}");
            }
            Stmt::Return(Some(value)) => {
                let line = format!("return {};", self.expr(value)?);
                self.w.line(line);
            }
            Stmt::Return(None) if self.in_entry && self.has_output => {
                self.w.line("return zOutput;")
            }
            Stmt::Return(None) => self.w.line("return;"),
            Stmt::Break => self.w.line("break;"),
            Stmt::Continue => self.w.line("continue;"),
            Stmt::Discard => self.w.line("discard;"),
        }
        Ok(())
    }

    fn input_root(&self) -> &'static str {
        if self.in_entry {
            "zInput"
        } else {
            "zInputCopy"
        }
    }

    fn var_name(&self, var: &VarRef) -> CodegenResult<String> {
        Ok(match var.kind {
            VarKind::Local | VarKind::Param | VarKind::RefParam => var.name.clone(),
            VarKind::Global(_) => self
                .iface
                .rename(&var.name)
                .unwrap_or(var.name.as_str())
                .to_string(),
            VarKind::Input => format!("{}.{}", self.input_root(), var.name),
            VarKind::Output => format!("zOutput.{}", var.name),
            VarKind::Builtin(b) if b.is_output() => format!("zOutput.{}", builtin_field(b)),
            VarKind::Builtin(b) => format!("{}.{}", self.input_root(), builtin_field(b)),
        })
    }

    fn literal(&self, lit: &Literal) -> CodegenResult<String> {
        Ok(match *lit {
            Literal::Bool(v) => v.to_string(),
            Literal::F32(v) => float_literal(v, TARGET)?,
            Literal::I32(i32::MIN) => "i32(-2147483648)".to_string(),
            Literal::I32(v) => format!("{}i", v),
            Literal::U32(v) => format!("{}u", v),
        })
    }

    fn args(&self, args: &[Expr]) -> CodegenResult<String> {
        Ok(join(
            args.iter()
                .map(|a| self.expr(a))
                .collect::<CodegenResult<Vec<_>>>()?,
        ))
    }

    fn expr(&self, expr: &Expr) -> CodegenResult<String> {
        Ok(match expr {
            Expr::Var(v) => self.var_name(v)?,
            Expr::Literal(lit) => self.literal(lit)?,
            Expr::Construct { ty, args } => format!("{}({})", self.ty(ty)?, self.args(args)?),
            Expr::Member { base, member, .. } => {
                format!("{}.{}", self.expr(base)?, member.name())
            }
            Expr::Index { base, index, .. } => {
                format!("{}[{}]", self.expr(base)?, self.expr(index)?)
            }
            Expr::Unary { op, operand, .. } => {
                format!("({}{})", op.symbol(), self.expr(operand)?)
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                format!("({} {} {})", self.expr(lhs)?, op.symbol(), self.expr(rhs)?)
            }
            Expr::Cast { ty, value } => format!("{}({})", self.ty(ty)?, self.expr(value)?),
            Expr::AddressOf { inner, .. } => format!("(&{})", self.expr(inner)?),
            Expr::Deref { inner, .. } => format!("(*{})", self.expr(inner)?),
            Expr::Call { func, args, .. } => format!("{}({})", func, self.args(args)?),
            Expr::Select {
                cond,
                accept,
                reject,
                ..
            } => format!(
                "select({}, {}, {})",
                self.expr(reject)?,
                self.expr(accept)?,
                self.expr(cond)?
            ),
        })
    }
}
