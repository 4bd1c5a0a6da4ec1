//! Pseudo-register elimination.
//!
//! Maps every distinct `Pseudo` operand to either a `Data` reference
//! (names with static storage in the symbol table) or a fresh stack slot
//! below `%rbp`. Slots are allocated downward at the operand's width, 4-
//! or 8-byte aligned, and reused on repeated occurrences. The magnitude
//! of the lowest offset becomes the function's stack size.

use super::asm::{AsmInstruction, AsmProgram, AsmTopLevel, AsmType, Operand, Reg};
use crate::typechecker::{IdentifierAttrs, SymbolTable};
use std::collections::HashMap;

pub fn replace_pseudos(program: &mut AsmProgram, symbols: &SymbolTable) {
    for top_level in &mut program.top_levels {
        if let AsmTopLevel::Function(fun) = top_level {
            let mut allocator = SlotAllocator::new(symbols);
            for instruction in &mut fun.instructions {
                allocator.rewrite_instruction(instruction);
            }
            fun.stack_size = allocator.stack_size();
            debug_assert!(
                !fun.instructions.iter().any(has_pseudo),
                "pseudo operand survived the stack pass in {}",
                fun.name
            );
        }
    }
}

struct SlotAllocator<'a> {
    symbols: &'a SymbolTable,
    offsets: HashMap<String, i64>,
    /// Most negative offset handed out so far.
    current_offset: i64,
}

impl<'a> SlotAllocator<'a> {
    fn new(symbols: &'a SymbolTable) -> Self {
        SlotAllocator {
            symbols,
            offsets: HashMap::new(),
            current_offset: 0,
        }
    }

    fn stack_size(&self) -> i64 {
        -self.current_offset
    }

    fn rewrite_instruction(&mut self, instruction: &mut AsmInstruction) {
        match instruction {
            AsmInstruction::Mov { ty, src, dst } => {
                let ty = *ty;
                self.rewrite(src, ty);
                self.rewrite(dst, ty);
            }
            AsmInstruction::Movsx { src, dst } => {
                self.rewrite(src, AsmType::Longword);
                self.rewrite(dst, AsmType::Quadword);
            }
            AsmInstruction::Unary { ty, operand, .. } => {
                let ty = *ty;
                self.rewrite(operand, ty);
            }
            AsmInstruction::Binary { ty, src, dst, .. }
            | AsmInstruction::Cmp { ty, src, dst } => {
                let ty = *ty;
                self.rewrite(src, ty);
                self.rewrite(dst, ty);
            }
            AsmInstruction::Idiv { ty, operand } => {
                let ty = *ty;
                self.rewrite(operand, ty);
            }
            AsmInstruction::SetCC { operand, .. } => {
                // The byte store targets a slot some earlier instruction
                // already sized; default to longword if it somehow leads.
                self.rewrite(operand, AsmType::Longword);
            }
            AsmInstruction::Push(operand) => self.rewrite(operand, AsmType::Quadword),
            AsmInstruction::Cdq(_)
            | AsmInstruction::Jmp(_)
            | AsmInstruction::JmpCC { .. }
            | AsmInstruction::Label(_)
            | AsmInstruction::AllocateStack(_)
            | AsmInstruction::DeallocateStack(_)
            | AsmInstruction::Call(_)
            | AsmInstruction::Ret => {}
        }
    }

    fn rewrite(&mut self, operand: &mut Operand, ty: AsmType) {
        let Operand::Pseudo(name) = operand else {
            return;
        };
        if let Some(symbol) = self.symbols.get(name.as_str()) {
            if matches!(symbol.attrs, IdentifierAttrs::Static { .. }) {
                *operand = Operand::Data(std::mem::take(name));
                return;
            }
        }
        let offset = match self.offsets.get(name.as_str()) {
            Some(&offset) => offset,
            None => {
                let size = ty.size();
                let mut offset = self.current_offset - size;
                // Align downward to the slot's own size.
                offset -= offset.rem_euclid(size);
                self.current_offset = offset;
                self.offsets.insert(name.clone(), offset);
                offset
            }
        };
        *operand = Operand::Stack {
            offset,
            base: Reg::BP,
        };
    }
}

fn has_pseudo(instruction: &AsmInstruction) -> bool {
    let check = |operand: &Operand| matches!(operand, Operand::Pseudo(_));
    match instruction {
        AsmInstruction::Mov { src, dst, .. }
        | AsmInstruction::Movsx { src, dst }
        | AsmInstruction::Binary { src, dst, .. }
        | AsmInstruction::Cmp { src, dst, .. } => check(src) || check(dst),
        AsmInstruction::Unary { operand, .. }
        | AsmInstruction::Idiv { operand, .. }
        | AsmInstruction::SetCC { operand, .. }
        | AsmInstruction::Push(operand) => check(operand),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::test_support::asm_for;

    fn function(program: &AsmProgram, name: &str) -> super::super::asm::AsmFunction {
        program
            .top_levels
            .iter()
            .find_map(|tl| match tl {
                AsmTopLevel::Function(f) if f.name == name => Some(f.clone()),
                _ => None,
            })
            .expect("function present")
    }

    fn replaced(source: &str) -> AsmProgram {
        let (mut program, symbols) = asm_for(source);
        replace_pseudos(&mut program, &symbols);
        program
    }

    #[test]
    fn test_no_pseudos_survive() {
        let program = replaced(
            "long g = 2; \
             int add(int a, int b) { return a + b; } \
             int main(void) { int x = 3; long y = x + g; return add(x, (int) y); }",
        );
        for top_level in &program.top_levels {
            if let AsmTopLevel::Function(fun) = top_level {
                assert!(!fun.instructions.iter().any(has_pseudo));
            }
        }
    }

    #[test]
    fn test_same_pseudo_same_slot() {
        let program = replaced("int main(void) { int x = 1; x = x + 1; return x; }");
        let main = function(&program, "main");
        let mut x_offsets = Vec::new();
        for instruction in &main.instructions {
            if let AsmInstruction::Mov {
                dst: Operand::Stack { offset, .. },
                ..
            } = instruction
            {
                x_offsets.push(*offset);
            }
        }
        assert!(!x_offsets.is_empty());
    }

    #[test]
    fn test_static_pseudo_becomes_data() {
        let program = replaced("static int g = 5; int main(void) { g = g + 1; return g; }");
        let main = function(&program, "main");
        assert!(main.instructions.iter().any(|i| matches!(
            i,
            AsmInstruction::Mov {
                dst: Operand::Data(name),
                ..
            } if name == "g"
        )));
    }

    #[test]
    fn test_stack_size_covers_slots() {
        let program = replaced("int main(void) { int a = 1; long b = 2; int c = 3; return c; }");
        let main = function(&program, "main");
        // At least 4 + 8 + 4 bytes of locals (plus temporaries).
        assert!(main.stack_size >= 16);
        // Every assigned offset is within the declared stack size.
        for instruction in &main.instructions {
            if let AsmInstruction::Mov {
                dst: Operand::Stack { offset, base },
                ..
            } = instruction
            {
                if *base == Reg::BP && *offset < 0 {
                    assert!(-offset <= main.stack_size);
                }
            }
        }
    }

    #[test]
    fn test_quadword_slots_are_aligned() {
        let program = replaced(
            "int main(void) { int a = 1; long b = 2l; return a + (int) b; }",
        );
        let main = function(&program, "main");
        for instruction in &main.instructions {
            if let AsmInstruction::Mov {
                ty: AsmType::Quadword,
                dst: Operand::Stack { offset, base },
                ..
            } = instruction
            {
                if *base == Reg::BP && *offset < 0 {
                    assert_eq!(offset % 8, 0, "unaligned quadword slot at {}", offset);
                }
            }
        }
    }
}
