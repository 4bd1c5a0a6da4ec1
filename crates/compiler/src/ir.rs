//! Three-address intermediate representation.
//!
//! Function bodies are flat instruction sequences over `Value`s; control
//! flow is explicit jumps and labels. Each instruction writes at most one
//! destination and reads at most two sources, which keeps the optimizer's
//! dataflow bookkeeping trivial.
//!
//! The `Display` impls print one instruction per line, used by the driver
//! for the `--tacky` stage dump and by tests.

use crate::ast::Constant;
use crate::typechecker::StaticInit;
use std::fmt;

/// An operand: a constant or a named variable/temporary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Constant(Constant),
    Var(String),
}

impl Value {
    /// The variable name, if this is one.
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Value::Var(name) => Some(name),
            Value::Constant(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Constant(c) => write!(f, "{}", c),
            Value::Var(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Complement,
    Negate,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Complement => write!(f, "~"),
            UnaryOp::Negate => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterOrEqual
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterOrEqual => ">=",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Return(Value),
    /// Widen a 32-bit value to 64 bits.
    SignExtend { src: Value, dst: Value },
    /// Drop the upper 32 bits of a 64-bit value.
    Truncate { src: Value, dst: Value },
    Unary {
        op: UnaryOp,
        src: Value,
        dst: Value,
    },
    Binary {
        op: BinaryOp,
        src1: Value,
        src2: Value,
        dst: Value,
    },
    Copy { src: Value, dst: Value },
    Jump(String),
    JumpIfZero { cond: Value, target: String },
    JumpIfNotZero { cond: Value, target: String },
    Label(String),
    FunCall {
        name: String,
        args: Vec<Value>,
        dst: Value,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Return(v) => write!(f, "return {}", v),
            Instruction::SignExtend { src, dst } => write!(f, "{} = sign_extend {}", dst, src),
            Instruction::Truncate { src, dst } => write!(f, "{} = truncate {}", dst, src),
            Instruction::Unary { op, src, dst } => write!(f, "{} = {}{}", dst, op, src),
            Instruction::Binary {
                op,
                src1,
                src2,
                dst,
            } => write!(f, "{} = {} {} {}", dst, src1, op, src2),
            Instruction::Copy { src, dst } => write!(f, "{} = {}", dst, src),
            Instruction::Jump(target) => write!(f, "jump {}", target),
            Instruction::JumpIfZero { cond, target } => {
                write!(f, "jump_if_zero {} -> {}", cond, target)
            }
            Instruction::JumpIfNotZero { cond, target } => {
                write!(f, "jump_if_not_zero {} -> {}", cond, target)
            }
            Instruction::Label(name) => write!(f, "{}:", name),
            Instruction::FunCall { name, args, dst } => {
                write!(f, "{} = {}(", dst, name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A function lowered to straight-line code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub global: bool,
    pub params: Vec<String>,
    pub body: Vec<Instruction>,
}

/// A variable with static storage duration, global or function-local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticVariable {
    pub name: String,
    pub global: bool,
    pub ty: crate::ast::Type,
    pub init: StaticInit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopLevel {
    Function(Function),
    StaticVariable(StaticVariable),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub top_levels: Vec<TopLevel>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for top_level in &self.top_levels {
            match top_level {
                TopLevel::Function(fun) => {
                    let linkage = if fun.global { "global " } else { "" };
                    write!(f, "{}{}(", linkage, fun.name)?;
                    for (i, param) in fun.params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", param)?;
                    }
                    writeln!(f, "):")?;
                    for instruction in &fun.body {
                        match instruction {
                            Instruction::Label(_) => writeln!(f, "  {}", instruction)?,
                            _ => writeln!(f, "    {}", instruction)?,
                        }
                    }
                }
                TopLevel::StaticVariable(var) => {
                    let linkage = if var.global { "global " } else { "" };
                    writeln!(
                        f,
                        "{}static {} {} = {}",
                        linkage,
                        var.ty,
                        var.name,
                        var.init.as_i64()
                    )?;
                }
            }
        }
        Ok(())
    }
}
