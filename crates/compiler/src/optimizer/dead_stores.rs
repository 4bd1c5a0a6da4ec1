//! Dead-store elimination.
//!
//! Backward liveness over the control-flow graph, iterated to fixpoint.
//! A `Copy`, `Unary`, `Binary`, `SignExtend`, or `Truncate` whose
//! destination is dead afterwards is removed. Variables with static
//! storage are never dead: they are live at every function call (the
//! callee may read them) and at function exit. Function calls are never
//! removed regardless of their destination.

use super::cfg::Cfg;
use crate::ir::{Instruction, Value};
use std::collections::HashSet;

pub fn eliminate_dead_stores(
    instructions: Vec<Instruction>,
    statics: &HashSet<String>,
) -> Vec<Instruction> {
    let cfg = Cfg::build(instructions);
    if cfg.blocks.is_empty() {
        return Vec::new();
    }
    let block_count = cfg.blocks.len();
    let mut live_in: Vec<HashSet<String>> = vec![HashSet::new(); block_count];
    let mut live_out: Vec<HashSet<String>> = vec![HashSet::new(); block_count];

    loop {
        let mut changed = false;
        for id in (0..block_count).rev() {
            let out = block_live_out(&cfg, id, &live_in, statics);
            let mut live = out.clone();
            for instruction in cfg.blocks[id].instructions.iter().rev() {
                transfer(instruction, &mut live, statics);
            }
            if out != live_out[id] {
                live_out[id] = out;
                changed = true;
            }
            if live != live_in[id] {
                live_in[id] = live;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut result_blocks = Vec::with_capacity(block_count);
    for (id, block) in cfg.blocks.into_iter().enumerate() {
        let mut live = live_out[id].clone();
        let mut kept = Vec::with_capacity(block.instructions.len());
        for instruction in block.instructions.into_iter().rev() {
            if is_dead_store(&instruction, &live, statics) {
                // A removed store contributes neither uses nor a def.
                continue;
            }
            transfer(&instruction, &mut live, statics);
            kept.push(instruction);
        }
        kept.reverse();
        result_blocks.push(kept);
    }
    result_blocks.into_iter().flatten().collect()
}

fn block_live_out(
    cfg: &Cfg,
    id: usize,
    live_in: &[HashSet<String>],
    statics: &HashSet<String>,
) -> HashSet<String> {
    let block = &cfg.blocks[id];
    if block.successors.is_empty() {
        // Function exit: writes to static storage remain observable.
        return statics.clone();
    }
    let mut out = HashSet::new();
    for &succ in &block.successors {
        out.extend(live_in[succ].iter().cloned());
    }
    out
}

fn is_dead_store(
    instruction: &Instruction,
    live: &HashSet<String>,
    statics: &HashSet<String>,
) -> bool {
    let dst = match instruction {
        Instruction::Copy { dst, .. }
        | Instruction::Unary { dst, .. }
        | Instruction::Binary { dst, .. }
        | Instruction::SignExtend { dst, .. }
        | Instruction::Truncate { dst, .. } => dst,
        _ => return false,
    };
    match dst {
        Value::Var(name) => !live.contains(name) && !statics.contains(name),
        Value::Constant(_) => false,
    }
}

/// live := (live - def) ∪ uses
fn transfer(instruction: &Instruction, live: &mut HashSet<String>, statics: &HashSet<String>) {
    match instruction {
        Instruction::Copy { dst, .. }
        | Instruction::Unary { dst, .. }
        | Instruction::Binary { dst, .. }
        | Instruction::SignExtend { dst, .. }
        | Instruction::Truncate { dst, .. }
        | Instruction::FunCall { dst, .. } => {
            if let Value::Var(name) = dst {
                live.remove(name);
            }
        }
        _ => {}
    }
    let mut use_value = |value: &Value| {
        if let Value::Var(name) = value {
            live.insert(name.clone());
        }
    };
    match instruction {
        Instruction::Return(v) => use_value(v),
        Instruction::SignExtend { src, .. }
        | Instruction::Truncate { src, .. }
        | Instruction::Unary { src, .. }
        | Instruction::Copy { src, .. } => use_value(src),
        Instruction::Binary { src1, src2, .. } => {
            use_value(src1);
            use_value(src2);
        }
        Instruction::JumpIfZero { cond, .. } | Instruction::JumpIfNotZero { cond, .. } => {
            use_value(cond)
        }
        Instruction::FunCall { args, .. } => {
            for arg in args {
                use_value(arg);
            }
            // The callee may read any static.
            live.extend(statics.iter().cloned());
        }
        Instruction::Jump(_) | Instruction::Label(_) => {}
    }
}
