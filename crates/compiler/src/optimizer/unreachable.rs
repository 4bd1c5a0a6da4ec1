//! Unreachable-code elimination.
//!
//! Three steps over the control-flow graph:
//!
//! 1. drop every block not reachable from the entry block;
//! 2. drop jumps whose target is the block that follows anyway;
//! 3. drop labels that no surviving jump references.
//!
//! A label is only kept while some reachable jump targets it, so no
//! dangling references can result.

use super::cfg::Cfg;
use crate::ir::Instruction;
use std::collections::HashSet;

pub fn eliminate_unreachable_code(instructions: Vec<Instruction>) -> Vec<Instruction> {
    let cfg = Cfg::build(instructions);
    let reachable = cfg.reachable();
    let blocks: Vec<Vec<Instruction>> = cfg
        .blocks
        .into_iter()
        .zip(reachable)
        .filter(|(_, live)| *live)
        .map(|(block, _)| block.instructions)
        .collect();
    let without_jumps = remove_redundant_jumps(blocks);
    remove_unreferenced_labels(without_jumps)
}

/// Drop a trailing jump that targets the label opening the next block.
fn remove_redundant_jumps(mut blocks: Vec<Vec<Instruction>>) -> Vec<Instruction> {
    for id in 0..blocks.len() {
        let next_label = match blocks.get(id + 1).and_then(|b| b.first()) {
            Some(Instruction::Label(name)) => Some(name.clone()),
            _ => None,
        };
        let Some(next_label) = next_label else {
            continue;
        };
        let redundant = matches!(
            blocks[id].last(),
            Some(Instruction::Jump(target)) if *target == next_label
        );
        if redundant {
            blocks[id].pop();
        }
    }
    blocks.into_iter().flatten().collect()
}

fn remove_unreferenced_labels(instructions: Vec<Instruction>) -> Vec<Instruction> {
    let mut referenced: HashSet<&str> = HashSet::new();
    for instruction in &instructions {
        match instruction {
            Instruction::Jump(target)
            | Instruction::JumpIfZero { target, .. }
            | Instruction::JumpIfNotZero { target, .. } => {
                referenced.insert(target.as_str());
            }
            _ => {}
        }
    }
    let referenced: HashSet<String> = referenced.into_iter().map(str::to_string).collect();
    instructions
        .into_iter()
        .filter(|instruction| match instruction {
            Instruction::Label(name) => referenced.contains(name),
            _ => true,
        })
        .collect()
}
