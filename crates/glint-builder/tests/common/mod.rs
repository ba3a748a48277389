//! Helpers shared by the builder's integration tests.

#![allow(dead_code)]

use filecheck::{Checker, CheckerBuilder, NO_VARIABLES};
use glint_builder::{BuildOptions, ProgramBuilder, Target};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn builder(target: Target) -> ProgramBuilder {
    init_logging();
    ProgramBuilder::new(BuildOptions::new(target))
}

fn build_filechecker(directives: &str) -> Checker {
    let mut builder = CheckerBuilder::new();
    for line in directives.lines().map(str::trim).filter(|l| !l.is_empty()) {
        builder
            .directive(line)
            .unwrap_or_else(|e| panic!("bad filecheck directive '{}': {}", line, e));
    }
    builder.finish()
}

/// Match generated source against `check:`/`nextln:`/`not:` directives.
pub fn filecheck(actual: &str, directives: &str) {
    let checker = build_filechecker(directives);
    if !checker.check(actual, NO_VARIABLES).expect("filecheck error") {
        let (_, explain) = checker
            .explain(actual, NO_VARIABLES)
            .expect("filecheck explain");
        panic!("filecheck failed:\n{}\n--- source ---\n{}", explain, actual);
    }
}

/// Parse GLSL ES source with the `glsl` crate.
pub fn assert_glsl_parses(source: &str) {
    use glsl::parser::Parse;
    if let Err(err) = glsl::syntax::TranslationUnit::parse(source) {
        panic!("generated GLSL does not parse: {}\n--- source ---\n{}", err, source);
    }
}

/// Parse and validate WGSL source with naga.
pub fn assert_wgsl_valid(source: &str) {
    let module = match naga::front::wgsl::parse_str(source) {
        Ok(module) => module,
        Err(err) => panic!(
            "generated WGSL does not parse: {}\n--- source ---\n{}",
            err.emit_to_string(source),
            source
        ),
    };
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    if let Err(err) = validator.validate(&module) {
        panic!("generated WGSL is invalid: {:?}\n--- source ---\n{}", err, source);
    }
}

/// Check a source with the parser or validator matching its target.
pub fn assert_valid(target: Target, source: &str) {
    match target {
        Target::WebGPU => assert_wgsl_valid(source),
        Target::WebGL1 | Target::WebGL2 => assert_glsl_parses(source),
    }
}
