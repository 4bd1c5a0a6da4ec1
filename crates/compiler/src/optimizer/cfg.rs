//! Basic-block control-flow graph over IR instruction sequences.
//!
//! Block leaders are the first instruction, every label, and every
//! instruction following a jump or return. Edges: fall-through from a
//! block whose last instruction keeps going, the jump target of `Jump`,
//! both the target and the fall-through of the conditional jumps, and
//! nothing after `Return`.

use crate::ir::Instruction;
use std::collections::HashMap;

#[derive(Debug)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
    pub successors: Vec<usize>,
    pub predecessors: Vec<usize>,
}

#[derive(Debug)]
pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    pub fn build(instructions: Vec<Instruction>) -> Cfg {
        let mut blocks: Vec<BasicBlock> = Vec::new();
        let mut current: Vec<Instruction> = Vec::new();

        let finish =
            |blocks: &mut Vec<BasicBlock>, current: &mut Vec<Instruction>| {
                if !current.is_empty() {
                    blocks.push(BasicBlock {
                        instructions: std::mem::take(current),
                        successors: Vec::new(),
                        predecessors: Vec::new(),
                    });
                }
            };

        for instruction in instructions {
            match &instruction {
                Instruction::Label(_) => {
                    finish(&mut blocks, &mut current);
                    current.push(instruction);
                }
                Instruction::Jump(_)
                | Instruction::JumpIfZero { .. }
                | Instruction::JumpIfNotZero { .. }
                | Instruction::Return(_) => {
                    current.push(instruction);
                    finish(&mut blocks, &mut current);
                }
                _ => current.push(instruction),
            }
        }
        finish(&mut blocks, &mut current);

        // Map labels to the block that starts with them.
        let mut label_blocks: HashMap<&str, usize> = HashMap::new();
        for (id, block) in blocks.iter().enumerate() {
            if let Some(Instruction::Label(name)) = block.instructions.first() {
                label_blocks.insert(name.as_str(), id);
            }
        }

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for (id, block) in blocks.iter().enumerate() {
            match block.instructions.last() {
                Some(Instruction::Return(_)) => {}
                Some(Instruction::Jump(target)) => {
                    if let Some(&to) = label_blocks.get(target.as_str()) {
                        edges.push((id, to));
                    }
                }
                Some(Instruction::JumpIfZero { target, .. })
                | Some(Instruction::JumpIfNotZero { target, .. }) => {
                    if let Some(&to) = label_blocks.get(target.as_str()) {
                        edges.push((id, to));
                    }
                    if id + 1 < blocks.len() {
                        edges.push((id, id + 1));
                    }
                }
                _ => {
                    if id + 1 < blocks.len() {
                        edges.push((id, id + 1));
                    }
                }
            }
        }
        let mut cfg = Cfg { blocks };
        for (from, to) in edges {
            cfg.blocks[from].successors.push(to);
            cfg.blocks[to].predecessors.push(from);
        }
        cfg
    }

    /// Which blocks are reachable from the entry block.
    pub fn reachable(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.blocks.len()];
        if self.blocks.is_empty() {
            return reachable;
        }
        let mut worklist = vec![0];
        reachable[0] = true;
        while let Some(id) = worklist.pop() {
            for &succ in &self.blocks[id].successors {
                if !reachable[succ] {
                    reachable[succ] = true;
                    worklist.push(succ);
                }
            }
        }
        reachable
    }

    /// Flatten back to a single instruction sequence in block order.
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.blocks
            .into_iter()
            .flat_map(|b| b.instructions)
            .collect()
    }
}
