//! AT&T-syntax assembly text emission.
//!
//! Walks the legalized assembly tree and renders GNU-as-compatible text.
//! Platform differences are confined to this module: macOS prefixes
//! global symbols with `_`, Linux suffixes call targets with `@PLT` and
//! appends the GNU-stack note section, and the alignment directive is
//! `.align` on Linux but `.balign` on macOS. References to static
//! storage are RIP-relative. Local labels get a `.L` prefix, which keeps
//! them out of the object file's symbol table.

use super::asm::{
    AsmBinaryOp, AsmFunction, AsmInstruction, AsmProgram, AsmStaticVariable, AsmTopLevel, AsmType,
    CondCode, Operand, Reg,
};
use crate::typechecker::StaticInit;
use std::fmt::{self, Write};

/// Render a whole program to assembly text.
pub fn emit_program(program: &AsmProgram) -> Result<String, fmt::Error> {
    let mut text = String::new();
    for top_level in &program.top_levels {
        match top_level {
            AsmTopLevel::Function(fun) => emit_function(&mut text, fun)?,
            AsmTopLevel::StaticVariable(var) => emit_static_variable(&mut text, var)?,
        }
    }
    if cfg!(target_os = "linux") {
        writeln!(text, "    .section .note.GNU-stack,\"\",@progbits")?;
    }
    Ok(text)
}

/// Mangle a symbol with external naming conventions.
fn symbol(name: &str) -> String {
    if cfg!(target_os = "macos") {
        format!("_{}", name)
    } else {
        name.to_string()
    }
}

fn call_target(name: &str) -> String {
    if cfg!(target_os = "macos") {
        format!("_{}", name)
    } else {
        format!("{}@PLT", name)
    }
}

fn local_label(name: &str) -> String {
    format!(".L{}", name)
}

fn align_directive() -> &'static str {
    if cfg!(target_os = "macos") {
        ".balign"
    } else {
        ".align"
    }
}

fn emit_function(text: &mut String, fun: &AsmFunction) -> fmt::Result {
    let name = symbol(&fun.name);
    if fun.global {
        writeln!(text, "    .globl {}", name)?;
    }
    writeln!(text, "    .text")?;
    writeln!(text, "{}:", name)?;
    writeln!(text, "    pushq %rbp")?;
    writeln!(text, "    movq %rsp, %rbp")?;
    for instruction in &fun.instructions {
        emit_instruction(text, instruction)?;
    }
    Ok(())
}

fn emit_static_variable(text: &mut String, var: &AsmStaticVariable) -> fmt::Result {
    let name = symbol(&var.name);
    if var.global {
        writeln!(text, "    .globl {}", name)?;
    }
    if var.init.is_zero() {
        writeln!(text, "    .bss")?;
        writeln!(text, "    {} {}", align_directive(), var.alignment)?;
        writeln!(text, "{}:", name)?;
        writeln!(text, "    .zero {}", var.alignment)?;
    } else {
        writeln!(text, "    .data")?;
        writeln!(text, "    {} {}", align_directive(), var.alignment)?;
        writeln!(text, "{}:", name)?;
        match var.init {
            StaticInit::Int(v) => writeln!(text, "    .long {}", v)?,
            StaticInit::Long(v) => writeln!(text, "    .quad {}", v)?,
        }
    }
    Ok(())
}

fn emit_instruction(text: &mut String, instruction: &AsmInstruction) -> fmt::Result {
    match instruction {
        AsmInstruction::Mov { ty, src, dst } => {
            writeln!(
                text,
                "    mov{} {}, {}",
                suffix(*ty),
                operand(src, *ty),
                operand(dst, *ty)
            )
        }
        AsmInstruction::Movsx { src, dst } => {
            writeln!(
                text,
                "    movslq {}, {}",
                operand(src, AsmType::Longword),
                operand(dst, AsmType::Quadword)
            )
        }
        AsmInstruction::Unary { op, ty, operand: o } => {
            let mnemonic = match op {
                super::asm::AsmUnaryOp::Neg => "neg",
                super::asm::AsmUnaryOp::Not => "not",
            };
            writeln!(text, "    {}{} {}", mnemonic, suffix(*ty), operand(o, *ty))
        }
        AsmInstruction::Binary { op, ty, src, dst } => {
            let mnemonic = match op {
                AsmBinaryOp::Add => "add",
                AsmBinaryOp::Sub => "sub",
                AsmBinaryOp::Mult => "imul",
            };
            writeln!(
                text,
                "    {}{} {}, {}",
                mnemonic,
                suffix(*ty),
                operand(src, *ty),
                operand(dst, *ty)
            )
        }
        AsmInstruction::Cmp { ty, src, dst } => {
            writeln!(
                text,
                "    cmp{} {}, {}",
                suffix(*ty),
                operand(src, *ty),
                operand(dst, *ty)
            )
        }
        AsmInstruction::Idiv { ty, operand: o } => {
            writeln!(text, "    idiv{} {}", suffix(*ty), operand(o, *ty))
        }
        AsmInstruction::Cdq(ty) => match ty {
            AsmType::Longword => writeln!(text, "    cdq"),
            AsmType::Quadword => writeln!(text, "    cqo"),
        },
        AsmInstruction::Jmp(target) => writeln!(text, "    jmp {}", local_label(target)),
        AsmInstruction::JmpCC { cc, target } => {
            writeln!(text, "    j{} {}", cond_suffix(*cc), local_label(target))
        }
        AsmInstruction::SetCC { cc, operand: o } => {
            writeln!(text, "    set{} {}", cond_suffix(*cc), byte_operand(o))
        }
        AsmInstruction::Label(name) => writeln!(text, "{}:", local_label(name)),
        AsmInstruction::AllocateStack(n) => writeln!(text, "    subq ${}, %rsp", n),
        AsmInstruction::DeallocateStack(n) => writeln!(text, "    addq ${}, %rsp", n),
        AsmInstruction::Push(o) => {
            writeln!(text, "    pushq {}", operand(o, AsmType::Quadword))
        }
        AsmInstruction::Call(name) => writeln!(text, "    call {}", call_target(name)),
        AsmInstruction::Ret => {
            writeln!(text, "    movq %rbp, %rsp")?;
            writeln!(text, "    popq %rbp")?;
            writeln!(text, "    ret")
        }
    }
}

fn suffix(ty: AsmType) -> char {
    match ty {
        AsmType::Longword => 'l',
        AsmType::Quadword => 'q',
    }
}

fn cond_suffix(cc: CondCode) -> &'static str {
    match cc {
        CondCode::E => "e",
        CondCode::NE => "ne",
        CondCode::G => "g",
        CondCode::GE => "ge",
        CondCode::L => "l",
        CondCode::LE => "le",
    }
}

fn operand(operand: &Operand, ty: AsmType) -> String {
    match operand {
        Operand::Imm(v) => format!("${}", v),
        Operand::Reg(reg) => register(*reg, ty).to_string(),
        Operand::Stack { offset, base } => match base {
            Reg::BP => format!("{}(%rbp)", offset),
            Reg::SP => format!("{}(%rsp)", offset),
            _ => unreachable!("stack operands are rbp- or rsp-based"),
        },
        Operand::Data(name) => format!("{}(%rip)", symbol(name)),
        Operand::Pseudo(name) => {
            unreachable!("pseudo operand '{}' reached the emitter", name)
        }
    }
}

fn byte_operand(o: &Operand) -> String {
    match o {
        Operand::Reg(reg) => byte_register(*reg).to_string(),
        other => operand(other, AsmType::Longword),
    }
}

fn register(reg: Reg, ty: AsmType) -> &'static str {
    match ty {
        AsmType::Longword => match reg {
            Reg::AX => "%eax",
            Reg::CX => "%ecx",
            Reg::DX => "%edx",
            Reg::DI => "%edi",
            Reg::SI => "%esi",
            Reg::R8 => "%r8d",
            Reg::R9 => "%r9d",
            Reg::R10 => "%r10d",
            Reg::R11 => "%r11d",
            Reg::SP => "%esp",
            Reg::BP => "%ebp",
        },
        AsmType::Quadword => match reg {
            Reg::AX => "%rax",
            Reg::CX => "%rcx",
            Reg::DX => "%rdx",
            Reg::DI => "%rdi",
            Reg::SI => "%rsi",
            Reg::R8 => "%r8",
            Reg::R9 => "%r9",
            Reg::R10 => "%r10",
            Reg::R11 => "%r11",
            Reg::SP => "%rsp",
            Reg::BP => "%rbp",
        },
    }
}

fn byte_register(reg: Reg) -> &'static str {
    match reg {
        Reg::AX => "%al",
        Reg::CX => "%cl",
        Reg::DX => "%dl",
        Reg::DI => "%dil",
        Reg::SI => "%sil",
        Reg::R8 => "%r8b",
        Reg::R9 => "%r9b",
        Reg::R10 => "%r10b",
        Reg::R11 => "%r11b",
        Reg::SP | Reg::BP => unreachable!("no byte view of the stack registers"),
    }
}
