//! GLSL ES 1.00 and GLSL ES 3.00 emission.

use alloc::{
    collections::BTreeSet,
    format,
    string::{String, ToString},
    vec::Vec,
};

use glint_ir::{
    ast::{
        BuiltinVar, Expr, FunctionDef, GlobalDecl, GlobalKind, Literal, ShaderModule, Stmt, VarDecl,
        VarKind, VarRef,
    },
    types::glsl_texture_name,
    type_name, References, ScalarKind, ShaderStage, Target, Type, TypeDesc,
};

use super::{float_literal, join, ShaderBackend};
use crate::{
    error::{CodegenError, CodegenResult},
    interface::ShaderInterface,
    writer::SourceWriter,
};

/// Iteration cap of the `for` loops standing in for `while` on GLSL ES 1.00,
/// which only has counted loops.
const EMULATED_LOOP_LIMIT: u32 = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslDialect {
    Es100,
    Es300,
}

#[derive(Debug, Clone, Copy)]
pub struct GlslBackend {
    dialect: GlslDialect,
}

impl GlslBackend {
    pub fn new(dialect: GlslDialect) -> Self {
        GlslBackend { dialect }
    }
}

impl ShaderBackend for GlslBackend {
    fn target(&self) -> Target {
        match self.dialect {
            GlslDialect::Es100 => Target::WebGL1,
            GlslDialect::Es300 => Target::WebGL2,
        }
    }

    fn emit(&self, module: &ShaderModule, iface: &ShaderInterface) -> CodegenResult<String> {
        if module.stage == ShaderStage::Compute {
            return Err(CodegenError::unsupported("compute shaders", self.target()));
        }
        let mut emitter = GlslEmitter {
            module,
            iface,
            dialect: self.dialect,
            target: self.target(),
            w: SourceWriter::new(),
            loop_depth: 0,
        };
        emitter.emit_module()?;
        Ok(emitter.w.finish())
    }
}

struct GlslEmitter<'a> {
    module: &'a ShaderModule,
    iface: &'a ShaderInterface,
    dialect: GlslDialect,
    target: Target,
    w: SourceWriter,
    loop_depth: u32,
}

impl GlslEmitter<'_> {
    fn es100(&self) -> bool {
        self.dialect == GlslDialect::Es100
    }

    fn unsupported(&self, what: impl Into<String>) -> CodegenError {
        CodegenError::unsupported(what, self.target)
    }

    fn ty(&self, ty: &Type, var_name: &str) -> CodegenResult<String> {
        Ok(type_name(ty, self.target, var_name)?)
    }

    fn emit_module(&mut self) -> CodegenResult<()> {
        if !self.es100() {
            self.w.line("#version 300 es");
        }
        for ext in self.extensions() {
            let behavior = if ext == "GL_EXT_draw_buffers" {
                "require"
            } else {
                "enable"
            };
            self.w.line(format!("#extension {} : {}", ext, behavior));
        }
        self.w.line("precision highp float;");
        self.w.line("precision highp int;");
        for sampler in self.sampler_precisions()? {
            self.w.line(format!("precision highp {};", sampler));
        }
        self.w.blank();

        let module = self.module;
        for ty in module.struct_types(!self.es100()) {
            self.emit_struct(&ty)?;
        }
        for global in &module.globals {
            self.emit_global(global)?;
        }
        self.emit_io()?;

        for func in &module.functions {
            self.w.blank();
            self.emit_function(func)?;
        }
        Ok(())
    }

    fn extensions(&self) -> BTreeSet<String> {
        let mut exts = self.iface.extensions.clone();
        if self.es100() {
            let refs = References::of_module(self.module);
            if refs.builtins.contains(&BuiltinVar::FragDepth) {
                exts.insert("GL_EXT_frag_depth".to_string());
            }
            if self.module.stage == ShaderStage::Fragment && self.module.outputs.len() > 1 {
                exts.insert("GL_EXT_draw_buffers".to_string());
            }
        }
        exts
    }

    /// ES 3.00 only predeclares precision for `sampler2D` and `samplerCube`.
    fn sampler_precisions(&self) -> CodegenResult<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        if self.es100() {
            return Ok(out);
        }
        for global in &self.module.globals {
            if let Some(name) = self.sampler_type(global)? {
                if name != "sampler2D" && name != "samplerCube" {
                    out.insert(name);
                }
            }
        }
        Ok(out)
    }

    fn sampler_type(&self, global: &GlobalDecl) -> CodegenResult<Option<String>> {
        match global.var.ty.as_texture() {
            Some(tex) => {
                let shadow = self.iface.comparison_textures.contains(&global.var.name);
                Ok(Some(glsl_texture_name(tex, self.target, shadow)?))
            }
            None => Ok(None),
        }
    }

    fn emit_struct(&mut self, ty: &Type) -> CodegenResult<()> {
        let Some(s) = ty.as_struct() else {
            return Ok(());
        };
        self.w.line(format!("struct {} {{", s.name));
        self.w.indent();
        for m in &s.members {
            let decl = self.ty(&m.ty, &m.name)?;
            self.w.line(format!("{};", decl));
        }
        self.w.dedent();
        self.w.line("};");
        self.w.blank();
        Ok(())
    }

    fn emit_global(&mut self, global: &GlobalDecl) -> CodegenResult<()> {
        let name = &global.var.name;
        match global.kind {
            GlobalKind::Private => {
                let decl = self.ty(&global.var.ty, name)?;
                match &global.init {
                    Some(init) => {
                        let init = self.expr(init)?;
                        self.w.line(format!("{} = {};", decl, init));
                    }
                    None => self.w.line(format!("{};", decl)),
                }
            }
            GlobalKind::Const => {
                let decl = self.ty(&global.var.ty, name)?;
                let init = global
                    .init
                    .as_ref()
                    .ok_or_else(|| CodegenError::internal(format!("constant {} has no value", name)))?;
                let init = self.expr(init)?;
                self.w.line(format!("const {} = {};", decl, init));
            }
            GlobalKind::Uniform => {
                let decl = self.ty(&global.var.ty, name)?;
                self.w.line(format!("uniform {};", decl));
            }
            GlobalKind::UniformBuffer if self.es100() => {
                let decl = self.ty(&global.var.ty, name)?;
                self.w.line(format!("uniform {};", decl));
            }
            GlobalKind::UniformBuffer => {
                let s = global.var.ty.as_struct().ok_or_else(|| {
                    CodegenError::internal(format!("uniform block {} is not a struct", name))
                })?;
                self.w
                    .line(format!("layout(std140) uniform zBlock_{} {{", name));
                self.w.indent();
                for m in &s.members {
                    let decl = self.ty(&m.ty, &m.name)?;
                    self.w.line(format!("{};", decl));
                }
                self.w.dedent();
                self.w.line(format!("}} {};", name));
            }
            GlobalKind::Texture => {
                let sampler = self.sampler_type(global)?.unwrap_or_default();
                self.w.line(format!("uniform {} {};", sampler, name));
            }
            GlobalKind::StorageBuffer => return Err(self.unsupported("storage buffers")),
            GlobalKind::Workgroup => return Err(self.unsupported("workgroup variables")),
            GlobalKind::Sampler => return Err(self.unsupported("separate samplers")),
        }
        Ok(())
    }

    fn emit_io(&mut self) -> CodegenResult<()> {
        let module = self.module;
        let stage = module.stage;
        for input in &module.inputs {
            let flat = if input.flat && !self.es100() { "flat " } else { "" };
            match (stage, self.dialect) {
                (ShaderStage::Vertex, _) => {
                    let semantic = input.semantic.ok_or_else(|| {
                        CodegenError::internal(format!("attribute {} has no semantic", input.name))
                    })?;
                    let decl = self.ty(&input.ty, &semantic.glsl_attribute())?;
                    if self.es100() {
                        self.w.line(format!("attribute {};", decl));
                    } else {
                        self.w.line(format!(
                            "layout(location = {}) in {};",
                            semantic.location(),
                            decl
                        ));
                    }
                }
                (_, GlslDialect::Es100) => {
                    let decl = self.ty(&input.ty, &varying(&input.name))?;
                    self.w.line(format!("varying {};", decl));
                }
                (_, GlslDialect::Es300) => {
                    let decl = self.ty(&input.ty, &varying(&input.name))?;
                    self.w.line(format!("{}in {};", flat, decl));
                }
            }
        }
        for output in &module.outputs {
            let flat = if output.flat && !self.es100() { "flat " } else { "" };
            match (stage, self.dialect) {
                (ShaderStage::Vertex, GlslDialect::Es100) => {
                    let decl = self.ty(&output.ty, &varying(&output.name))?;
                    self.w.line(format!("varying {};", decl));
                }
                (ShaderStage::Vertex, GlslDialect::Es300) => {
                    let decl = self.ty(&output.ty, &varying(&output.name))?;
                    self.w.line(format!("{}out {};", flat, decl));
                }
                (_, GlslDialect::Es300) => {
                    let decl = self.ty(&output.ty, &format!("zFragOut_{}", output.name))?;
                    self.w.line(format!(
                        "layout(location = {}) out {};",
                        output.location, decl
                    ));
                }
                (_, GlslDialect::Es100) => {}
            }
        }
        Ok(())
    }

    fn emit_function(&mut self, func: &FunctionDef) -> CodegenResult<()> {
        let ret = if func.ret.is_void() {
            "void".to_string()
        } else {
            self.ty(&func.ret, "")?
        };
        let params = func
            .params
            .iter()
            .map(|p| {
                let decl = self.ty(&p.var.ty, &p.var.name)?;
                Ok(if p.by_ref {
                    format!("inout {}", decl)
                } else {
                    decl
                })
            })
            .collect::<CodegenResult<Vec<_>>>()?;
        self.w
            .line(format!("{} {}({}) {{", ret, func.name, join(params)));
        self.w.indent();
        for stmt in &func.body.stmts {
            self.emit_stmt(stmt)?;
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
        let text = self.ty(&var.ty, &var.name)?;
        match &decl.init {
            Some(init) => {
                let is_const = init.is_const_exp()
                    && !self.iface.writes.is_written(var.id)
                    && !(self.es100() && var.ty.as_array().is_some());
                let value = self.expr(init)?;
                let prefix = if is_const { "const " } else { "" };
                self.w.line(format!("{}{} = {};", prefix, text, value));
            }
            None => self.w.line(format!("{};", text)),
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        match stmt {
            Stmt::Declare(decl) => self.emit_decl(decl)?,
            Stmt::Assign { target, value } => {
                let target = self.expr(target)?;
                let value = self.expr(value)?;
                self.w.line(format!("{} = {};", target, value));
            }
            Stmt::Call { call, .. } => {
                let call = self.expr(call)?;
                self.w.line(format!("{};", call));
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
                let ty = self.ty(&var.ty, "")?;
                let start = self.expr(start)?;
                let end = self.expr(end)?;
                self.w.line(format!(
                    "for ({} {n} = {}; {n} < {}; {n}++) {{",
                    ty,
                    start,
                    end,
                    n = var.name
                ));
                self.loop_depth += 1;
                self.emit_block(&body.stmts)?;
                self.loop_depth -= 1;
                self.w.line("}");
            }
            Stmt::While { cond, body } => {
                let cond = self.expr(cond)?;
                if self.es100() {
                    self.open_emulated_loop();
                    self.w.indent();
                    self.w.line(format!("if (!({})) {{", cond));
                    self.w.indent();
                    self.w.line("break;");
                    self.w.dedent();
                    self.w.line("}");
                    self.w.dedent();
                    self.emit_block(&body.stmts)?;
                    self.close_emulated_loop();
                } else {
                    self.w.line(format!("while ({}) {{", cond));
                    self.loop_depth += 1;
                    self.emit_block(&body.stmts)?;
                    self.loop_depth -= 1;
                    self.w.line("}");
                }
            }
            Stmt::DoWhile { body, cond } => {
                let cond = self.expr(cond)?;
                if self.es100() {
                    let counter = self.open_emulated_loop();
                    self.w.indent();
                    self.w
                        .line(format!("if ({} > 0 && !({})) {{", counter, cond));
                    self.w.indent();
                    self.w.line("break;");
                    self.w.dedent();
                    self.w.line("}");
                    self.w.dedent();
                    self.emit_block(&body.stmts)?;
                    self.close_emulated_loop();
                } else {
                    self.w.line("do {");
                    self.loop_depth += 1;
                    self.emit_block(&body.stmts)?;
                    self.loop_depth -= 1;
                    self.w.line(format!("}} while ({});", cond));
                }
            }
            Stmt::Scope(block) => {
                self.w.line("{");
                self.emit_block(&block.stmts)?;
                self.w.line("}");
            }
            Stmt::Return(Some(value)) => {
                let value = self.expr(value)?;
                self.w.line(format!("return {};", value));
            }
            Stmt::Return(None) => self.w.line("return;"),
            Stmt::Break => self.w.line("break;"),
            Stmt::Continue => self.w.line("continue;"),
            Stmt::Discard => self.w.line("discard;"),
        }
        Ok(())
    }

    fn open_emulated_loop(&mut self) -> String {
        let counter = format!("zLoop{}", self.loop_depth);
        self.w.line(format!(
            "for (int {c} = 0; {c} < {}; {c}++) {{",
            EMULATED_LOOP_LIMIT,
            c = counter
        ));
        self.loop_depth += 1;
        counter
    }

    fn close_emulated_loop(&mut self) {
        self.loop_depth -= 1;
        self.w.line("}");
    }

    fn var_name(&self, var: &VarRef) -> CodegenResult<String> {
        let stage = self.module.stage;
        Ok(match var.kind {
            VarKind::Local | VarKind::Param | VarKind::RefParam => var.name.clone(),
            VarKind::Global(_) => self
                .iface
                .rename(&var.name)
                .unwrap_or(var.name.as_str())
                .to_string(),
            VarKind::Input if stage == ShaderStage::Vertex => {
                let input = self
                    .module
                    .inputs
                    .iter()
                    .find(|i| i.name == var.name)
                    .and_then(|i| i.semantic)
                    .ok_or_else(|| {
                        CodegenError::internal(format!("unknown attribute {}", var.name))
                    })?;
                input.glsl_attribute()
            }
            VarKind::Input => varying(&var.name),
            VarKind::Output if stage == ShaderStage::Vertex => varying(&var.name),
            VarKind::Output if self.es100() => {
                let output = self.module.output(&var.name).ok_or_else(|| {
                    CodegenError::internal(format!("unknown output {}", var.name))
                })?;
                if self.module.outputs.len() == 1 {
                    "gl_FragColor".to_string()
                } else {
                    format!("gl_FragData[{}]", output.location)
                }
            }
            VarKind::Output => format!("zFragOut_{}", var.name),
            VarKind::Builtin(b) => b
                .glsl_name(self.target)
                .ok_or_else(|| self.unsupported(format!("builtin {}", b.name())))?
                .to_string(),
        })
    }

    fn literal(&self, lit: &Literal) -> CodegenResult<String> {
        Ok(match *lit {
            Literal::Bool(v) => v.to_string(),
            Literal::F32(v) => float_literal(v, self.target)?,
            Literal::I32(i32::MIN) => "(-2147483647 - 1)".to_string(),
            Literal::I32(v) => v.to_string(),
            Literal::U32(_) if self.es100() => return Err(self.unsupported("unsigned integers")),
            Literal::U32(v) => format!("{}u", v),
        })
    }

    fn zero_value(&self, ty: &Type) -> CodegenResult<String> {
        let prim = ty
            .as_primitive()
            .ok_or_else(|| self.unsupported(format!("zero-value constructor of {}", ty)))?;
        let zero = match prim.scalar {
            ScalarKind::Bool => Literal::Bool(false),
            ScalarKind::F32 => Literal::F32(0.0),
            ScalarKind::I32 => Literal::I32(0),
            ScalarKind::U32 => Literal::U32(0),
            _ => return Err(self.unsupported(format!("zero-value constructor of {}", ty))),
        };
        let zero = self.literal(&zero)?;
        if prim.is_scalar() {
            Ok(zero)
        } else {
            Ok(format!("{}({})", self.ty(ty, "")?, zero))
        }
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
            Expr::Construct { ty, args } if args.is_empty() => self.zero_value(ty)?,
            Expr::Construct { ty, args } => {
                if self.es100() && matches!(ty.desc(), TypeDesc::Array(_)) {
                    return Err(self.unsupported("array constructors"));
                }
                format!("{}({})", self.ty(ty, "")?, self.args(args)?)
            }
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
                if self.es100() && op.is_bitwise() {
                    return Err(self.unsupported(format!("operator {}", op.symbol())));
                }
                format!("({} {} {})", self.expr(lhs)?, op.symbol(), self.expr(rhs)?)
            }
            Expr::Cast { ty, value } => format!("{}({})", self.ty(ty, "")?, self.expr(value)?),
            Expr::AddressOf { .. } | Expr::Deref { .. } => {
                return Err(self.unsupported("pointers"))
            }
            Expr::Call { func, args, .. } => format!("{}({})", func, self.args(args)?),
            Expr::Select {
                cond,
                accept,
                reject,
                ..
            } => format!(
                "({} ? {} : {})",
                self.expr(cond)?,
                self.expr(accept)?,
                self.expr(reject)?
            ),
        })
    }
}

fn varying(name: &str) -> String {
    format!("zVarying_{}", name)
}
