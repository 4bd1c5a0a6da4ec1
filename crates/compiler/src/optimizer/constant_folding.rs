//! Constant folding.
//!
//! Instructions whose non-destination operands are all constants collapse
//! to a `Copy` of the computed value. Conditional jumps on constants
//! become unconditional jumps or disappear. Division and remainder by
//! zero are left alone so the program keeps its runtime behavior.
//!
//! Width rule: an operation is done in 64 bits when either operand is
//! long and the result is long; otherwise the result wraps to 32 bits and
//! stays int. Comparisons and `!` always produce an int 0 or 1.

use crate::ast::Constant;
use crate::ir::{BinaryOp, Instruction, UnaryOp, Value};

/// A constant operand unpacked for arithmetic.
#[derive(Debug, Clone, Copy)]
struct ConstValue {
    is_long: bool,
    value: i64,
}

fn const_value(value: &Value) -> Option<ConstValue> {
    match value {
        Value::Constant(Constant::Int(v)) => Some(ConstValue {
            is_long: false,
            value: i64::from(*v),
        }),
        Value::Constant(Constant::Long(v)) => Some(ConstValue {
            is_long: true,
            value: *v,
        }),
        Value::Var(_) => None,
    }
}

fn make_constant(c: ConstValue) -> Value {
    if c.is_long {
        Value::Constant(Constant::Long(c.value))
    } else {
        Value::Constant(Constant::Int(c.value as i32))
    }
}

fn fold_unary(op: UnaryOp, src: ConstValue) -> ConstValue {
    match op {
        UnaryOp::Negate => ConstValue {
            is_long: src.is_long,
            value: clamp(src.value.wrapping_neg(), src.is_long),
        },
        UnaryOp::Complement => ConstValue {
            is_long: src.is_long,
            value: clamp(!src.value, src.is_long),
        },
        UnaryOp::Not => ConstValue {
            is_long: false,
            value: i64::from(src.value == 0),
        },
    }
}

fn fold_binary(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> Option<ConstValue> {
    let is_long = lhs.is_long || rhs.is_long;
    let arithmetic = |value: i64| {
        Some(ConstValue {
            is_long,
            value: clamp(value, is_long),
        })
    };
    let comparison = |truth: bool| {
        Some(ConstValue {
            is_long: false,
            value: i64::from(truth),
        })
    };
    match op {
        BinaryOp::Add => arithmetic(lhs.value.wrapping_add(rhs.value)),
        BinaryOp::Subtract => arithmetic(lhs.value.wrapping_sub(rhs.value)),
        BinaryOp::Multiply => arithmetic(lhs.value.wrapping_mul(rhs.value)),
        BinaryOp::Divide => {
            if rhs.value == 0 {
                return None;
            }
            arithmetic(lhs.value.wrapping_div(rhs.value))
        }
        BinaryOp::Remainder => {
            if rhs.value == 0 {
                return None;
            }
            arithmetic(lhs.value.wrapping_rem(rhs.value))
        }
        BinaryOp::Equal => comparison(lhs.value == rhs.value),
        BinaryOp::NotEqual => comparison(lhs.value != rhs.value),
        BinaryOp::LessThan => comparison(lhs.value < rhs.value),
        BinaryOp::LessOrEqual => comparison(lhs.value <= rhs.value),
        BinaryOp::GreaterThan => comparison(lhs.value > rhs.value),
        BinaryOp::GreaterOrEqual => comparison(lhs.value >= rhs.value),
    }
}

/// Wrap an int-typed result back into 32 bits.
fn clamp(value: i64, is_long: bool) -> i64 {
    if is_long { value } else { i64::from(value as i32) }
}

pub fn fold_constants(instructions: Vec<Instruction>) -> Vec<Instruction> {
    let mut folded = Vec::with_capacity(instructions.len());
    for instruction in instructions {
        match &instruction {
            Instruction::Unary { op, src, dst } => {
                if let Some(src) = const_value(src) {
                    folded.push(Instruction::Copy {
                        src: make_constant(fold_unary(*op, src)),
                        dst: dst.clone(),
                    });
                    continue;
                }
            }
            Instruction::Binary {
                op,
                src1,
                src2,
                dst,
            } => {
                if let (Some(lhs), Some(rhs)) = (const_value(src1), const_value(src2)) {
                    if let Some(result) = fold_binary(*op, lhs, rhs) {
                        folded.push(Instruction::Copy {
                            src: make_constant(result),
                            dst: dst.clone(),
                        });
                        continue;
                    }
                }
            }
            Instruction::SignExtend { src, dst } => {
                if let Some(src) = const_value(src) {
                    folded.push(Instruction::Copy {
                        src: Value::Constant(Constant::Long(src.value)),
                        dst: dst.clone(),
                    });
                    continue;
                }
            }
            Instruction::Truncate { src, dst } => {
                if let Some(src) = const_value(src) {
                    folded.push(Instruction::Copy {
                        src: Value::Constant(Constant::Int(src.value as i32)),
                        dst: dst.clone(),
                    });
                    continue;
                }
            }
            Instruction::JumpIfZero { cond, target } => {
                if let Some(cond) = const_value(cond) {
                    if cond.value == 0 {
                        folded.push(Instruction::Jump(target.clone()));
                    }
                    continue;
                }
            }
            Instruction::JumpIfNotZero { cond, target } => {
                if let Some(cond) = const_value(cond) {
                    if cond.value != 0 {
                        folded.push(Instruction::Jump(target.clone()));
                    }
                    continue;
                }
            }
            _ => {}
        }
        folded.push(instruction);
    }
    folded
}
