//! Instruction legalization.
//!
//! Two jobs: prepend the stack-frame allocation (the function's stack
//! size rounded up to 16 bytes, so `%rsp` stays 16-byte aligned across
//! calls), and rewrite every instruction whose operand combination the
//! ISA rejects. `%r10` is the scratch register for source fix-ups,
//! `%r11` for destination and second-operand fix-ups; neither ever
//! carries a value across instruction boundaries.

use super::asm::{
    AsmBinaryOp, AsmFunction, AsmInstruction, AsmProgram, AsmTopLevel, AsmType, Operand, Reg,
};

pub fn fixup(program: &mut AsmProgram) {
    for top_level in &mut program.top_levels {
        if let AsmTopLevel::Function(fun) = top_level {
            fixup_function(fun);
        }
    }
}

fn fixup_function(fun: &mut AsmFunction) {
    let mut fixed = Vec::with_capacity(fun.instructions.len() + 1);
    let frame_size = round_up_to_16(fun.stack_size);
    if frame_size > 0 {
        fixed.push(AsmInstruction::Binary {
            op: AsmBinaryOp::Sub,
            ty: AsmType::Quadword,
            src: Operand::Imm(frame_size),
            dst: Operand::Reg(Reg::SP),
        });
    }
    for instruction in fun.instructions.drain(..) {
        rewrite(instruction, &mut fixed);
    }
    fun.instructions = fixed;
}

fn round_up_to_16(size: i64) -> i64 {
    (size + 15) & !15
}

fn r10() -> Operand {
    Operand::Reg(Reg::R10)
}

fn r11() -> Operand {
    Operand::Reg(Reg::R11)
}

fn rewrite(instruction: AsmInstruction, out: &mut Vec<AsmInstruction>) {
    match instruction {
        AsmInstruction::Mov { ty, src, dst } => rewrite_mov(ty, src, dst, out),
        AsmInstruction::Movsx { src, dst } => rewrite_movsx(src, dst, out),
        AsmInstruction::Binary { op, ty, src, dst } => rewrite_binary(op, ty, src, dst, out),
        AsmInstruction::Cmp { ty, src, dst } => rewrite_cmp(ty, src, dst, out),
        AsmInstruction::Idiv { ty, operand } => {
            // idiv rejects immediates outright.
            if operand.is_immediate() {
                out.push(AsmInstruction::Mov {
                    ty,
                    src: operand,
                    dst: r10(),
                });
                out.push(AsmInstruction::Idiv { ty, operand: r10() });
            } else {
                out.push(AsmInstruction::Idiv { ty, operand });
            }
        }
        AsmInstruction::Push(operand) => {
            if operand.is_wide_immediate() {
                out.push(AsmInstruction::Mov {
                    ty: AsmType::Quadword,
                    src: operand,
                    dst: r10(),
                });
                out.push(AsmInstruction::Push(r10()));
            } else {
                out.push(AsmInstruction::Push(operand));
            }
        }
        other => out.push(other),
    }
}

fn rewrite_mov(ty: AsmType, mut src: Operand, dst: Operand, out: &mut Vec<AsmInstruction>) {
    // A longword move simply truncates an over-wide immediate.
    if ty == AsmType::Longword {
        if let Operand::Imm(v) = src {
            if v > i64::from(u32::MAX) || v < i64::from(i32::MIN) {
                src = Operand::Imm(i64::from(v as i32));
            }
        }
    }
    // A quadword immediate past imm32 only fits via movabsq into a register.
    if ty == AsmType::Quadword && src.is_wide_immediate() && dst.is_memory() {
        out.push(AsmInstruction::Mov {
            ty,
            src,
            dst: r10(),
        });
        out.push(AsmInstruction::Mov {
            ty,
            src: r10(),
            dst,
        });
        return;
    }
    if src.is_memory() && dst.is_memory() {
        out.push(AsmInstruction::Mov {
            ty,
            src,
            dst: r10(),
        });
        out.push(AsmInstruction::Mov {
            ty,
            src: r10(),
            dst,
        });
        return;
    }
    out.push(AsmInstruction::Mov { ty, src, dst });
}

fn rewrite_movsx(src: Operand, dst: Operand, out: &mut Vec<AsmInstruction>) {
    let bad_src = src.is_immediate();
    let bad_dst = dst.is_memory();
    match (bad_src, bad_dst) {
        (true, true) => {
            out.push(AsmInstruction::Mov {
                ty: AsmType::Longword,
                src,
                dst: r10(),
            });
            out.push(AsmInstruction::Movsx {
                src: r10(),
                dst: r11(),
            });
            out.push(AsmInstruction::Mov {
                ty: AsmType::Quadword,
                src: r11(),
                dst,
            });
        }
        (true, false) => {
            out.push(AsmInstruction::Mov {
                ty: AsmType::Longword,
                src,
                dst: r10(),
            });
            out.push(AsmInstruction::Movsx { src: r10(), dst });
        }
        (false, true) => {
            out.push(AsmInstruction::Movsx {
                src,
                dst: r11(),
            });
            out.push(AsmInstruction::Mov {
                ty: AsmType::Quadword,
                src: r11(),
                dst,
            });
        }
        (false, false) => out.push(AsmInstruction::Movsx { src, dst }),
    }
}

fn rewrite_binary(
    op: AsmBinaryOp,
    ty: AsmType,
    mut src: Operand,
    dst: Operand,
    out: &mut Vec<AsmInstruction>,
) {
    // Quadword immediates past imm32 go through %r10 first.
    if ty == AsmType::Quadword && src.is_wide_immediate() {
        out.push(AsmInstruction::Mov {
            ty,
            src,
            dst: r10(),
        });
        src = r10();
    }
    match op {
        AsmBinaryOp::Add | AsmBinaryOp::Sub => {
            if src.is_memory() && dst.is_memory() {
                out.push(AsmInstruction::Mov {
                    ty,
                    src,
                    dst: r10(),
                });
                out.push(AsmInstruction::Binary {
                    op,
                    ty,
                    src: r10(),
                    dst,
                });
            } else {
                out.push(AsmInstruction::Binary { op, ty, src, dst });
            }
        }
        AsmBinaryOp::Mult => {
            // imul cannot write to memory.
            if dst.is_memory() {
                out.push(AsmInstruction::Mov {
                    ty,
                    src: dst.clone(),
                    dst: r11(),
                });
                out.push(AsmInstruction::Binary {
                    op,
                    ty,
                    src,
                    dst: r11(),
                });
                out.push(AsmInstruction::Mov {
                    ty,
                    src: r11(),
                    dst,
                });
            } else {
                out.push(AsmInstruction::Binary { op, ty, src, dst });
            }
        }
    }
}

fn rewrite_cmp(ty: AsmType, mut src: Operand, dst: Operand, out: &mut Vec<AsmInstruction>) {
    if ty == AsmType::Quadword && src.is_wide_immediate() {
        out.push(AsmInstruction::Mov {
            ty,
            src,
            dst: r10(),
        });
        src = r10();
    }
    if src.is_memory() && dst.is_memory() {
        out.push(AsmInstruction::Mov {
            ty,
            src,
            dst: r10(),
        });
        out.push(AsmInstruction::Cmp {
            ty,
            src: r10(),
            dst,
        });
        return;
    }
    // The second operand of cmp cannot be an immediate.
    if dst.is_immediate() {
        out.push(AsmInstruction::Mov {
            ty,
            src: dst,
            dst: r11(),
        });
        out.push(AsmInstruction::Cmp {
            ty,
            src,
            dst: r11(),
        });
        return;
    }
    out.push(AsmInstruction::Cmp { ty, src, dst });
}
