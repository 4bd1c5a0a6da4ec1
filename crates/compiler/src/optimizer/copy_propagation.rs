//! Copy propagation.
//!
//! Within a basic block, `Copy(src, dst)` makes later uses of `dst`
//! replaceable by `src` until either side is redefined. Facts also flow
//! into a block with exactly one (already-processed) predecessor — the
//! dominating-copy extension — which covers the straight-line chains left
//! behind by branch folding. Blocks with several predecessors start
//! empty, so no join merging is ever needed. Function calls invalidate
//! every fact involving a variable with static storage, since the callee
//! may read or write it.

use super::cfg::Cfg;
use crate::ir::{Instruction, Value};
use std::collections::{HashMap, HashSet};

type CopyFacts = HashMap<String, Value>;

pub fn propagate_copies(
    instructions: Vec<Instruction>,
    statics: &HashSet<String>,
) -> Vec<Instruction> {
    let mut cfg = Cfg::build(instructions);
    let mut exit_facts: Vec<Option<CopyFacts>> = vec![None; cfg.blocks.len()];

    for id in 0..cfg.blocks.len() {
        // Inherit facts only from a unique forward predecessor; a back
        // edge or a join point resets to nothing known.
        let mut facts = match cfg.blocks[id].predecessors.as_slice() {
            [single] if *single < id => exit_facts[*single].clone().unwrap_or_default(),
            _ => CopyFacts::new(),
        };
        propagate_in_block(&mut cfg.blocks[id].instructions, &mut facts, statics);
        exit_facts[id] = Some(facts);
    }
    cfg.into_instructions()
}

fn propagate_in_block(
    instructions: &mut [Instruction],
    copies: &mut CopyFacts,
    statics: &HashSet<String>,
) {
    for instruction in instructions.iter_mut() {
        rewrite_sources(instruction, copies);
        match instruction {
            Instruction::Copy {
                src,
                dst: Value::Var(dst),
            } => {
                kill(copies, dst);
                // A self-copy teaches us nothing.
                if src.var_name() != Some(dst.as_str()) {
                    copies.insert(dst.clone(), src.clone());
                }
            }
            Instruction::Unary {
                dst: Value::Var(dst),
                ..
            }
            | Instruction::Binary {
                dst: Value::Var(dst),
                ..
            }
            | Instruction::SignExtend {
                dst: Value::Var(dst),
                ..
            }
            | Instruction::Truncate {
                dst: Value::Var(dst),
                ..
            } => kill(copies, dst),
            Instruction::FunCall { dst, .. } => {
                if let Value::Var(dst) = dst {
                    kill(copies, dst);
                }
                // The callee may write any static variable.
                copies.retain(|dst, src| {
                    !statics.contains(dst.as_str())
                        && src.var_name().is_none_or(|name| !statics.contains(name))
                });
            }
            _ => {}
        }
    }
}

/// Drop every fact about `name`, as a destination or as a source.
fn kill(copies: &mut CopyFacts, name: &str) {
    copies.retain(|dst, src| dst != name && src.var_name() != Some(name));
}

fn rewrite_sources(instruction: &mut Instruction, copies: &CopyFacts) {
    let rewrite = |value: &mut Value| {
        if let Value::Var(name) = value {
            if let Some(known) = copies.get(name.as_str()) {
                *value = known.clone();
            }
        }
    };
    match instruction {
        Instruction::Return(v) => rewrite(v),
        Instruction::SignExtend { src, .. }
        | Instruction::Truncate { src, .. }
        | Instruction::Unary { src, .. }
        | Instruction::Copy { src, .. } => rewrite(src),
        Instruction::Binary { src1, src2, .. } => {
            rewrite(src1);
            rewrite(src2);
        }
        Instruction::JumpIfZero { cond, .. } | Instruction::JumpIfNotZero { cond, .. } => {
            rewrite(cond)
        }
        Instruction::FunCall { args, .. } => {
            for arg in args {
                rewrite(arg);
            }
        }
        Instruction::Jump(_) | Instruction::Label(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Constant;
    use crate::ir::BinaryOp;

    fn int(v: i32) -> Value {
        Value::Constant(Constant::Int(v))
    }

    fn var(name: &str) -> Value {
        Value::Var(name.to_string())
    }

    fn no_statics() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_constant_copy_propagates_to_return() {
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: int(14),
                    dst: var("t"),
                },
                Instruction::Return(var("t")),
            ],
            &no_statics(),
        );
        assert_eq!(result[1], Instruction::Return(int(14)));
    }

    #[test]
    fn test_propagation_stops_at_redefinition() {
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: int(1),
                    dst: var("t"),
                },
                Instruction::Copy {
                    src: int(2),
                    dst: var("t"),
                },
                Instruction::Return(var("t")),
            ],
            &no_statics(),
        );
        assert_eq!(result[2], Instruction::Return(int(2)));
    }

    #[test]
    fn test_copy_killed_by_source_redefinition() {
        // t = x; x = 5; return t  -- t must NOT become x (or 5).
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: var("x"),
                    dst: var("t"),
                },
                Instruction::Copy {
                    src: int(5),
                    dst: var("x"),
                },
                Instruction::Return(var("t")),
            ],
            &no_statics(),
        );
        assert_eq!(result[2], Instruction::Return(var("t")));
    }

    #[test]
    fn test_variable_copy_propagates_into_binary() {
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: var("x"),
                    dst: var("t"),
                },
                Instruction::Binary {
                    op: BinaryOp::Add,
                    src1: var("t"),
                    src2: var("t"),
                    dst: var("u"),
                },
            ],
            &no_statics(),
        );
        assert_eq!(
            result[1],
            Instruction::Binary {
                op: BinaryOp::Add,
                src1: var("x"),
                src2: var("x"),
                dst: var("u"),
            }
        );
    }

    #[test]
    fn test_facts_flow_into_single_predecessor_block() {
        // A label reached only by fall-through keeps the facts alive.
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: int(1),
                    dst: var("t"),
                },
                Instruction::Label("chain".to_string()),
                Instruction::Return(var("t")),
            ],
            &no_statics(),
        );
        assert_eq!(result[2], Instruction::Return(int(1)));
    }

    #[test]
    fn test_facts_cleared_at_join_points() {
        // `join` is reachable both by the branch and by fall-through, so
        // nothing is known inside it.
        let result = propagate_copies(
            vec![
                Instruction::JumpIfZero {
                    cond: var("c"),
                    target: "join".to_string(),
                },
                Instruction::Copy {
                    src: int(1),
                    dst: var("t"),
                },
                Instruction::Label("join".to_string()),
                Instruction::Return(var("t")),
            ],
            &no_statics(),
        );
        assert_eq!(result[3], Instruction::Return(var("t")));
    }

    #[test]
    fn test_loop_header_inherits_nothing() {
        // The back edge makes `top` a two-predecessor block.
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: int(3),
                    dst: var("i"),
                },
                Instruction::Label("top".to_string()),
                Instruction::JumpIfZero {
                    cond: var("i"),
                    target: "out".to_string(),
                },
                Instruction::Binary {
                    op: BinaryOp::Subtract,
                    src1: var("i"),
                    src2: int(1),
                    dst: var("i"),
                },
                Instruction::Jump("top".to_string()),
                Instruction::Label("out".to_string()),
                Instruction::Return(var("i")),
            ],
            &no_statics(),
        );
        let Instruction::JumpIfZero { cond, .. } = &result[2] else {
            panic!("expected conditional jump");
        };
        assert_eq!(*cond, var("i"));
    }

    #[test]
    fn test_call_invalidates_static_facts() {
        let statics: HashSet<String> = ["g".to_string()].into_iter().collect();
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: var("g"),
                    dst: var("t"),
                },
                Instruction::FunCall {
                    name: "f".to_string(),
                    args: vec![],
                    dst: var("r"),
                },
                Instruction::Return(var("t")),
            ],
            &statics,
        );
        assert_eq!(result[2], Instruction::Return(var("t")));
    }

    #[test]
    fn test_call_keeps_non_static_facts() {
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: int(3),
                    dst: var("t"),
                },
                Instruction::FunCall {
                    name: "f".to_string(),
                    args: vec![],
                    dst: var("r"),
                },
                Instruction::Return(var("t")),
            ],
            &no_statics(),
        );
        assert_eq!(result[2], Instruction::Return(int(3)));
    }

    #[test]
    fn test_call_result_killed() {
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: int(3),
                    dst: var("r"),
                },
                Instruction::FunCall {
                    name: "f".to_string(),
                    args: vec![],
                    dst: var("r"),
                },
                Instruction::Return(var("r")),
            ],
            &no_statics(),
        );
        assert_eq!(result[2], Instruction::Return(var("r")));
    }

    #[test]
    fn test_arguments_rewritten() {
        let result = propagate_copies(
            vec![
                Instruction::Copy {
                    src: int(7),
                    dst: var("t"),
                },
                Instruction::FunCall {
                    name: "f".to_string(),
                    args: vec![var("t")],
                    dst: var("r"),
                },
            ],
            &no_statics(),
        );
        let Instruction::FunCall { args, .. } = &result[1] else {
            panic!("expected call");
        };
        assert_eq!(args[0], int(7));
    }
}
