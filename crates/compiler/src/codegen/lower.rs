//! Lowering from IR to pseudo-register assembly.
//!
//! Every IR `Var` becomes a `Pseudo` operand; operand widths are looked
//! up in the frontend symbol table or, for `tmp.<n>` temporaries, in the
//! IR generator's side table. Calls follow the System V convention: the
//! first six arguments go in registers, the rest are pushed right to
//! left with the stack kept 16-byte aligned across the `call`.

use super::asm::{
    ARG_REGISTERS, AsmBinaryOp, AsmFunction, AsmInstruction, AsmProgram, AsmStaticVariable,
    AsmTopLevel, AsmType, AsmUnaryOp, CondCode, Operand, Reg,
};
use crate::ir::{BinaryOp, Function, Instruction, Program, UnaryOp, Value};
use crate::irgen::TempTypes;
use crate::typechecker::SymbolTable;

pub struct CodeGenerator<'a> {
    symbols: &'a SymbolTable,
    temp_types: &'a TempTypes,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(symbols: &'a SymbolTable, temp_types: &'a TempTypes) -> Self {
        CodeGenerator {
            symbols,
            temp_types,
        }
    }

    pub fn generate(&self, program: Program) -> AsmProgram {
        let top_levels = program
            .top_levels
            .into_iter()
            .map(|top_level| match top_level {
                crate::ir::TopLevel::Function(fun) => {
                    AsmTopLevel::Function(self.lower_function(fun))
                }
                crate::ir::TopLevel::StaticVariable(var) => {
                    AsmTopLevel::StaticVariable(AsmStaticVariable {
                        name: var.name,
                        global: var.global,
                        alignment: var.ty.size(),
                        init: var.init,
                    })
                }
            })
            .collect();
        AsmProgram { top_levels }
    }

    fn lower_function(&self, fun: Function) -> AsmFunction {
        let mut instructions = Vec::new();

        // Move parameters out of their ABI positions into pseudos.
        for (index, param) in fun.params.iter().enumerate() {
            let ty = self.name_type(param);
            let dst = Operand::Pseudo(param.clone());
            if index < ARG_REGISTERS.len() {
                instructions.push(AsmInstruction::Mov {
                    ty,
                    src: Operand::Reg(ARG_REGISTERS[index]),
                    dst,
                });
            } else {
                // 16(%rbp) holds the seventh argument: 8 for the pushed
                // %rbp, 8 for the return address.
                let offset = 8 * (index as i64 - 6 + 2);
                instructions.push(AsmInstruction::Mov {
                    ty,
                    src: Operand::Stack {
                        offset,
                        base: Reg::BP,
                    },
                    dst,
                });
            }
        }

        for instruction in fun.body {
            self.lower_instruction(instruction, &mut instructions);
        }
        AsmFunction {
            name: fun.name,
            global: fun.global,
            instructions,
            stack_size: 0,
        }
    }

    fn lower_instruction(&self, instruction: Instruction, out: &mut Vec<AsmInstruction>) {
        match instruction {
            Instruction::Return(value) => {
                let ty = self.value_type(&value);
                out.push(AsmInstruction::Mov {
                    ty,
                    src: self.operand(value),
                    dst: Operand::Reg(Reg::AX),
                });
                out.push(AsmInstruction::Ret);
            }
            Instruction::SignExtend { src, dst } => {
                out.push(AsmInstruction::Movsx {
                    src: self.operand(src),
                    dst: self.operand(dst),
                });
            }
            Instruction::Truncate { src, dst } => {
                out.push(AsmInstruction::Mov {
                    ty: AsmType::Longword,
                    src: self.operand(src),
                    dst: self.operand(dst),
                });
            }
            Instruction::Unary {
                op: UnaryOp::Not,
                src,
                dst,
            } => {
                let src_ty = self.value_type(&src);
                let dst_ty = self.value_type(&dst);
                let dst = self.operand(dst);
                out.push(AsmInstruction::Cmp {
                    ty: src_ty,
                    src: Operand::Imm(0),
                    dst: self.operand(src),
                });
                out.push(AsmInstruction::Mov {
                    ty: dst_ty,
                    src: Operand::Imm(0),
                    dst: dst.clone(),
                });
                out.push(AsmInstruction::SetCC {
                    cc: CondCode::E,
                    operand: dst,
                });
            }
            Instruction::Unary { op, src, dst } => {
                let ty = self.value_type(&src);
                let dst = self.operand(dst);
                out.push(AsmInstruction::Mov {
                    ty,
                    src: self.operand(src),
                    dst: dst.clone(),
                });
                let op = match op {
                    UnaryOp::Negate => AsmUnaryOp::Neg,
                    UnaryOp::Complement => AsmUnaryOp::Not,
                    UnaryOp::Not => unreachable!("handled above"),
                };
                out.push(AsmInstruction::Unary {
                    op,
                    ty,
                    operand: dst,
                });
            }
            Instruction::Binary {
                op,
                src1,
                src2,
                dst,
            } => self.lower_binary(op, src1, src2, dst, out),
            Instruction::Copy { src, dst } => {
                let ty = self.value_type(&src);
                out.push(AsmInstruction::Mov {
                    ty,
                    src: self.operand(src),
                    dst: self.operand(dst),
                });
            }
            Instruction::Jump(target) => out.push(AsmInstruction::Jmp(target)),
            Instruction::JumpIfZero { cond, target } => {
                let ty = self.value_type(&cond);
                out.push(AsmInstruction::Cmp {
                    ty,
                    src: Operand::Imm(0),
                    dst: self.operand(cond),
                });
                out.push(AsmInstruction::JmpCC {
                    cc: CondCode::E,
                    target,
                });
            }
            Instruction::JumpIfNotZero { cond, target } => {
                let ty = self.value_type(&cond);
                out.push(AsmInstruction::Cmp {
                    ty,
                    src: Operand::Imm(0),
                    dst: self.operand(cond),
                });
                out.push(AsmInstruction::JmpCC {
                    cc: CondCode::NE,
                    target,
                });
            }
            Instruction::Label(name) => out.push(AsmInstruction::Label(name)),
            Instruction::FunCall { name, args, dst } => self.lower_call(name, args, dst, out),
        }
    }

    fn lower_binary(
        &self,
        op: BinaryOp,
        src1: Value,
        src2: Value,
        dst: Value,
        out: &mut Vec<AsmInstruction>,
    ) {
        let ty = self.value_type(&src1);
        match op {
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply => {
                let dst = self.operand(dst);
                out.push(AsmInstruction::Mov {
                    ty,
                    src: self.operand(src1),
                    dst: dst.clone(),
                });
                let op = match op {
                    BinaryOp::Add => AsmBinaryOp::Add,
                    BinaryOp::Subtract => AsmBinaryOp::Sub,
                    BinaryOp::Multiply => AsmBinaryOp::Mult,
                    _ => unreachable!(),
                };
                out.push(AsmInstruction::Binary {
                    op,
                    ty,
                    src: self.operand(src2),
                    dst,
                });
            }
            BinaryOp::Divide | BinaryOp::Remainder => {
                let result_reg = if op == BinaryOp::Divide {
                    Reg::AX
                } else {
                    Reg::DX
                };
                out.push(AsmInstruction::Mov {
                    ty,
                    src: self.operand(src1),
                    dst: Operand::Reg(Reg::AX),
                });
                out.push(AsmInstruction::Cdq(ty));
                out.push(AsmInstruction::Idiv {
                    ty,
                    operand: self.operand(src2),
                });
                out.push(AsmInstruction::Mov {
                    ty,
                    src: Operand::Reg(result_reg),
                    dst: self.operand(dst),
                });
            }
            comparison => {
                let code = match comparison {
                    BinaryOp::Equal => CondCode::E,
                    BinaryOp::NotEqual => CondCode::NE,
                    BinaryOp::LessThan => CondCode::L,
                    BinaryOp::LessOrEqual => CondCode::LE,
                    BinaryOp::GreaterThan => CondCode::G,
                    BinaryOp::GreaterOrEqual => CondCode::GE,
                    _ => unreachable!("arithmetic handled above"),
                };
                let dst_ty = self.value_type(&dst);
                let dst = self.operand(dst);
                out.push(AsmInstruction::Cmp {
                    ty,
                    src: self.operand(src2),
                    dst: self.operand(src1),
                });
                out.push(AsmInstruction::Mov {
                    ty: dst_ty,
                    src: Operand::Imm(0),
                    dst: dst.clone(),
                });
                out.push(AsmInstruction::SetCC {
                    cc: code,
                    operand: dst,
                });
            }
        }
    }

    fn lower_call(&self, name: String, args: Vec<Value>, dst: Value, out: &mut Vec<AsmInstruction>) {
        let register_count = args.len().min(ARG_REGISTERS.len());
        let (register_args, stack_args) = args.split_at(register_count);

        // Keep %rsp 16-byte aligned across the call: each stack argument
        // is 8 bytes, so an odd count needs 8 bytes of padding.
        let padding = if stack_args.len() % 2 != 0 { 8 } else { 0 };
        if padding != 0 {
            out.push(AsmInstruction::AllocateStack(padding));
        }

        for (arg, reg) in register_args.iter().zip(ARG_REGISTERS) {
            out.push(AsmInstruction::Mov {
                ty: self.value_type(arg),
                src: self.operand(arg.clone()),
                dst: Operand::Reg(reg),
            });
        }

        for arg in stack_args.iter().rev() {
            let operand = self.operand(arg.clone());
            match operand {
                Operand::Imm(_) | Operand::Reg(_) => out.push(AsmInstruction::Push(operand)),
                _ => {
                    // `push` with a memory operand would read 8 bytes; go
                    // through AX at the argument's own width instead.
                    out.push(AsmInstruction::Mov {
                        ty: self.value_type(arg),
                        src: operand,
                        dst: Operand::Reg(Reg::AX),
                    });
                    out.push(AsmInstruction::Push(Operand::Reg(Reg::AX)));
                }
            }
        }

        out.push(AsmInstruction::Call(name));

        let to_pop = 8 * stack_args.len() as i64 + padding;
        if to_pop != 0 {
            out.push(AsmInstruction::DeallocateStack(to_pop));
        }

        let dst_ty = self.value_type(&dst);
        out.push(AsmInstruction::Mov {
            ty: dst_ty,
            src: Operand::Reg(Reg::AX),
            dst: self.operand(dst),
        });
    }

    fn operand(&self, value: Value) -> Operand {
        match value {
            Value::Constant(c) => Operand::Imm(c.as_i64()),
            Value::Var(name) => Operand::Pseudo(name),
        }
    }

    fn value_type(&self, value: &Value) -> AsmType {
        match value {
            Value::Constant(c) => AsmType::of(&c.ty()),
            Value::Var(name) => self.name_type(name),
        }
    }

    fn name_type(&self, name: &str) -> AsmType {
        if let Some(symbol) = self.symbols.get(name) {
            return AsmType::of(&symbol.ty);
        }
        let ty = self
            .temp_types
            .get(name)
            .expect("IR variable neither in symbol table nor a known temporary");
        AsmType::of(ty)
    }
}
