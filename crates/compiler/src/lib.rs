//! nanocc compiler library.
//!
//! Compiles a single translation unit of a C subset (int/long arithmetic,
//! control flow, functions, static storage) to x86-64 System V assembly,
//! then hands assembling and linking to `gcc`.
//!
//! The pipeline is a straight line of pure tree transformations:
//!
//! ```text
//! source --lex--> tokens --parse--> AST --resolve/typecheck/label--> AST
//!        --irgen--> IR --optimize--> IR --codegen--> assembly tree
//!        --pseudo->stack / fixup--> assembly tree --emit--> .s text
//! ```
//!
//! Each stage either returns its value or fails the whole compilation
//! with a pass-specific error; there is no recovery. The driver entry
//! point is [`compile_file`], which also shells out to the external
//! preprocessor, assembler, and linker. [`compile_to_assembly`] and
//! [`compile_to_ir`] run the core pipeline in memory and exist mainly
//! for tests and tooling.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod ir;
pub mod irgen;
pub mod lexer;
pub mod loops;
pub mod optimizer;
pub mod parser;
pub mod resolver;
pub mod typechecker;

pub use config::{CompilerConfig, Stage};
pub use error::{CompileError, DriverError};
pub use optimizer::OptimizationSet;

use crate::irgen::IrGenerator;
use crate::lexer::Token;
use crate::loops::LoopLabeler;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::typechecker::TypeChecker;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// What a stage-limited run produced, for the driver to report.
#[derive(Debug)]
pub enum StageOutput {
    Tokens(Vec<Token>),
    Ast(ast::Program),
    ValidatedAst(ast::Program),
    Ir(ir::Program),
    Codegen(codegen::AsmProgram),
    Assembly(PathBuf),
    Object(PathBuf),
    Executable(PathBuf),
}

/// Compile `source_path` according to `config`, producing whatever the
/// configured stage asks for. Intermediate files are cleaned up as the
/// pipeline moves past them.
pub fn compile_file(
    source_path: &Path,
    config: &CompilerConfig,
) -> Result<StageOutput, CompileError> {
    if source_path.extension().and_then(|e| e.to_str()) != Some("c") {
        return Err(DriverError::BadExtension(source_path.display().to_string()).into());
    }
    let preprocessed_path = source_path.with_extension("i");
    let assembly_path = source_path.with_extension("s");
    let object_path = source_path.with_extension("o");
    let executable_path = source_path.with_extension("");

    preprocess(source_path, &preprocessed_path)?;
    let source = fs::read_to_string(&preprocessed_path).map_err(|e| {
        DriverError::Io(format!(
            "failed to read {}: {}",
            preprocessed_path.display(),
            e
        ))
    })?;
    let _ = fs::remove_file(&preprocessed_path);

    // Lex.
    let tokens = lexer::tokenize(&source)?;
    if config.stage == Stage::Lex {
        return Ok(StageOutput::Tokens(tokens));
    }

    // Parse.
    let program = Parser::new(tokens).parse()?;
    if config.stage == Stage::Parse {
        return Ok(StageOutput::Ast(program));
    }

    // Semantic analysis: resolve, type check, label loops.
    let (program, counter) = Resolver::new().resolve(program)?;
    let (program, symbols) = TypeChecker::new().check(program)?;
    let program = LoopLabeler::new().label(program)?;
    if config.stage == Stage::Validate {
        return Ok(StageOutput::ValidatedAst(program));
    }

    // IR generation and optional optimization.
    let (ir_program, temp_types) = IrGenerator::new(&symbols, counter).generate(program);
    let ir_program = optimizer::optimize(ir_program, config.optimizations, &symbols);
    if config.stage == Stage::Ir {
        return Ok(StageOutput::Ir(ir_program));
    }

    // Assembly generation: lower, pseudo->stack, fixup.
    let asm_program = codegen::generate(ir_program, &symbols, &temp_types);
    if config.stage == Stage::Codegen {
        return Ok(StageOutput::Codegen(asm_program));
    }

    // Emission.
    let text = codegen::emit_program(&asm_program)
        .map_err(|e| DriverError::Io(format!("failed to render assembly: {}", e)))?;
    fs::write(&assembly_path, text).map_err(|e| {
        DriverError::Io(format!(
            "failed to write {}: {}",
            assembly_path.display(),
            e
        ))
    })?;
    if config.stage == Stage::Assembly {
        return Ok(StageOutput::Assembly(assembly_path));
    }

    // Assemble, then link.
    assemble(&assembly_path, &object_path)?;
    let _ = fs::remove_file(&assembly_path);
    if config.stage == Stage::Object {
        return Ok(StageOutput::Object(object_path));
    }

    link(&object_path, &executable_path)?;
    let _ = fs::remove_file(&object_path);
    Ok(StageOutput::Executable(executable_path))
}

/// Run the core pipeline on a source string and return the optimized IR.
pub fn compile_to_ir(
    source: &str,
    config: &CompilerConfig,
) -> Result<ir::Program, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let program = Parser::new(tokens).parse()?;
    let (program, counter) = Resolver::new().resolve(program)?;
    let (program, symbols) = TypeChecker::new().check(program)?;
    let program = LoopLabeler::new().label(program)?;
    let (ir_program, _) = IrGenerator::new(&symbols, counter).generate(program);
    Ok(optimizer::optimize(ir_program, config.optimizations, &symbols))
}

/// Run the core pipeline on a source string and return assembly text.
pub fn compile_to_assembly(
    source: &str,
    config: &CompilerConfig,
) -> Result<String, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let program = Parser::new(tokens).parse()?;
    let (program, counter) = Resolver::new().resolve(program)?;
    let (program, symbols) = TypeChecker::new().check(program)?;
    let program = LoopLabeler::new().label(program)?;
    let (ir_program, temp_types) = IrGenerator::new(&symbols, counter).generate(program);
    let ir_program = optimizer::optimize(ir_program, config.optimizations, &symbols);
    let asm_program = codegen::generate(ir_program, &symbols, &temp_types);
    codegen::emit_program(&asm_program)
        .map_err(|e| DriverError::Io(format!("failed to render assembly: {}", e)).into())
}

// ----------------------------------------------------------------------
// External tools
// ----------------------------------------------------------------------

fn run_tool(mut command: Command) -> Result<(), DriverError> {
    let rendered = format!("{:?}", command);
    let output = command
        .output()
        .map_err(|e| DriverError::ToolFailed(format!("failed to run {}: {}", rendered, e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DriverError::ToolFailed(format!(
            "{} failed:\n{}",
            rendered, stderr
        )));
    }
    Ok(())
}

fn preprocess(input: &Path, output: &Path) -> Result<(), DriverError> {
    let mut command = Command::new("gcc");
    command.arg("-E").arg("-P").arg(input).arg("-o").arg(output);
    run_tool(command)
}

fn assemble(assembly: &Path, object: &Path) -> Result<(), DriverError> {
    let mut command = Command::new("gcc");
    command.arg("-c").arg(assembly).arg("-o").arg(object);
    run_tool(command)
}

fn link(object: &Path, executable: &Path) -> Result<(), DriverError> {
    let mut command = Command::new("gcc");
    command.arg(object).arg("-o").arg(executable).arg("-lc");
    run_tool(command)
}
