//! nanocc command-line driver.
//!
//! `nanocc [FLAGS] <source.c>` — compiles one translation unit. Stage
//! flags stop the pipeline early (the earliest requested stage wins);
//! optimization flags enable individual IR passes. With no stage flag the
//! driver produces an executable next to the source file.

use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{Shell, generate};
use nanocc::{CompilerConfig, OptimizationSet, Stage, StageOutput};
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "nanocc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile a C subset to x86-64 System V assembly", long_about = None)]
struct Cli {
    /// Input .c source file
    input: Option<PathBuf>,

    /// Run the lexer, then stop
    #[arg(long)]
    lex: bool,

    /// Run through the parser, then stop
    #[arg(long)]
    parse: bool,

    /// Run through semantic analysis, then stop
    #[arg(long)]
    validate: bool,

    /// Run through IR generation (and requested optimizations), then stop
    #[arg(long)]
    tacky: bool,

    /// Run through assembly generation, but emit nothing
    #[arg(long)]
    codegen: bool,

    /// Emit the assembly file, do not assemble
    #[arg(short = 'S', short_alias = 's')]
    emit_assembly: bool,

    /// Produce an object file, do not link
    #[arg(short = 'c')]
    no_link: bool,

    /// Enable constant folding
    #[arg(long)]
    fold_constants: bool,

    /// Enable copy propagation
    #[arg(long)]
    propagate_copies: bool,

    /// Enable unreachable-code elimination
    #[arg(long)]
    eliminate_unreachable_code: bool,

    /// Enable dead-store elimination
    #[arg(long)]
    eliminate_dead_stores: bool,

    /// Enable all four optimizations
    #[arg(long)]
    optimize: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

impl Cli {
    fn stage(&self) -> Stage {
        if self.lex {
            Stage::Lex
        } else if self.parse {
            Stage::Parse
        } else if self.validate {
            Stage::Validate
        } else if self.tacky {
            Stage::Ir
        } else if self.codegen {
            Stage::Codegen
        } else if self.emit_assembly {
            Stage::Assembly
        } else if self.no_link {
            Stage::Object
        } else {
            Stage::Executable
        }
    }

    fn optimizations(&self) -> OptimizationSet {
        if self.optimize {
            return OptimizationSet::all();
        }
        OptimizationSet {
            fold_constants: self.fold_constants,
            propagate_copies: self.propagate_copies,
            eliminate_unreachable_code: self.eliminate_unreachable_code,
            eliminate_dead_stores: self.eliminate_dead_stores,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "nanocc", &mut io::stdout());
        return;
    }

    let Some(input) = cli.input.as_deref() else {
        eprintln!("Error: no source file given");
        process::exit(1);
    };

    // File-based defaults first, command-line flags OR-ed on top.
    let mut config = match CompilerConfig::load_defaults(std::path::Path::new(".")) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {}", message);
            process::exit(1);
        }
    };
    config.stage = cli.stage();
    config.enable_optimizations(cli.optimizations());

    match nanocc::compile_file(input, &config) {
        Ok(output) => report(output),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn report(output: StageOutput) {
    match output {
        StageOutput::Tokens(tokens) => {
            for token in &tokens {
                println!("{:?}: {}", token.kind, token.lexeme);
            }
            println!("Lexical tokenization completed.");
        }
        StageOutput::Ast(program) => {
            print!("{}", program);
            println!("Parsing completed.");
        }
        StageOutput::ValidatedAst(program) => {
            print!("{}", program);
            println!("Semantic analysis completed.");
        }
        StageOutput::Ir(program) => {
            print!("{}", program);
            println!("IR generation completed.");
        }
        StageOutput::Codegen(_) => {
            println!("Code generation completed.");
        }
        StageOutput::Assembly(path) => {
            println!("Code emission completed. Assembly file: {}", path.display());
        }
        StageOutput::Object(path) => {
            println!("Compilation completed. Object file: {}", path.display());
        }
        StageOutput::Executable(path) => {
            println!(
                "Compilation completed. Executable file: {}",
                path.display()
            );
        }
    }
}
