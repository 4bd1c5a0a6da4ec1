//! x86-64 backend.
//!
//! Four stages over the abstract assembly tree in `asm`:
//!
//! - `lower`: IR to assembly with `Pseudo` operands, including the
//!   System V call sequence
//! - `stack`: pseudo operands to stack slots or `Data` references
//! - `fixup`: frame allocation plus operand-form legalization
//! - `emit`: AT&T text rendering with the platform switches
//!
//! `generate` runs the first three; the emitter is separate because the
//! `--codegen` stage stops before text is produced.

pub mod asm;
pub mod emit;
pub mod fixup;
pub mod lower;
pub mod stack;

pub use asm::AsmProgram;
pub use emit::emit_program;
pub use lower::CodeGenerator;

use crate::ir;
use crate::irgen::TempTypes;
use crate::typechecker::SymbolTable;

/// Lower IR all the way to legalized assembly, ready for emission.
pub fn generate(
    program: ir::Program,
    symbols: &SymbolTable,
    temp_types: &TempTypes,
) -> AsmProgram {
    let mut asm_program = CodeGenerator::new(symbols, temp_types).generate(program);
    stack::replace_pseudos(&mut asm_program, symbols);
    fixup::fixup(&mut asm_program);
    asm_program
}


#[cfg(test)]
mod tests {
    use super::asm::{AsmInstruction, AsmTopLevel, Operand};
    use crate::irgen::lower_source;

    #[test]
    fn test_generate_produces_legal_pseudo_free_assembly() {
        let (ir, temp_types, symbols) = lower_source(
            "static long g = 4294967400l; \
             int f(int a, int b, int c, int d, int e, int x, int y) { return a + y; } \
             int main(void) { long v = g * 2l; return f(1, 2, 3, 4, 5, 6, (int) v); }",
        );
        let program = super::generate(ir, &symbols, &temp_types);
        for top_level in &program.top_levels {
            if let AsmTopLevel::Function(fun) = top_level {
                for instruction in &fun.instructions {
                    let operands: Vec<&Operand> = match instruction {
                        AsmInstruction::Mov { src, dst, .. }
                        | AsmInstruction::Movsx { src, dst }
                        | AsmInstruction::Binary { src, dst, .. }
                        | AsmInstruction::Cmp { src, dst, .. } => vec![src, dst],
                        AsmInstruction::Unary { operand, .. }
                        | AsmInstruction::Idiv { operand, .. }
                        | AsmInstruction::SetCC { operand, .. }
                        | AsmInstruction::Push(operand) => vec![operand],
                        _ => vec![],
                    };
                    for op in operands {
                        assert!(
                            !matches!(op, Operand::Pseudo(_)),
                            "pseudo survived in {:?}",
                            instruction
                        );
                    }
                }
            }
        }
    }
}
