//! IR-level optimization passes.
//!
//! Four independent passes over per-function instruction sequences, each
//! behind its own flag:
//!
//! - constant folding (`constant_folding`)
//! - unreachable-code elimination (`unreachable`)
//! - copy propagation (`copy_propagation`)
//! - dead-store elimination (`dead_stores`)
//!
//! The driver runs the enabled passes in that order and repeats the round
//! until an iteration changes nothing, so e.g. folding `3 * 4` exposes a
//! copy that propagation feeds into `2 + 12`, which the next round folds
//! to `14`. Observable behavior is preserved: the sequence of calls and
//! returns, and every write to a variable with static storage, survive
//! every pass.

mod cfg;
mod constant_folding;
mod copy_propagation;
mod dead_stores;
mod unreachable;

use crate::ir::{Program, TopLevel};
use crate::typechecker::{IdentifierAttrs, SymbolTable};
use std::collections::HashSet;

/// Which optimization passes to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizationSet {
    pub fold_constants: bool,
    pub propagate_copies: bool,
    pub eliminate_unreachable_code: bool,
    pub eliminate_dead_stores: bool,
}

impl OptimizationSet {
    pub fn all() -> Self {
        OptimizationSet {
            fold_constants: true,
            propagate_copies: true,
            eliminate_unreachable_code: true,
            eliminate_dead_stores: true,
        }
    }

    pub fn any(&self) -> bool {
        self.fold_constants
            || self.propagate_copies
            || self.eliminate_unreachable_code
            || self.eliminate_dead_stores
    }
}

/// Safety cap on fixpoint iteration; real programs settle in two or three
/// rounds.
const MAX_ROUNDS: usize = 16;

pub fn optimize(program: Program, opts: OptimizationSet, symbols: &SymbolTable) -> Program {
    if !opts.any() {
        return program;
    }
    let statics: HashSet<String> = symbols
        .iter()
        .filter(|(_, symbol)| matches!(symbol.attrs, IdentifierAttrs::Static { .. }))
        .map(|(name, _)| name.clone())
        .collect();

    let top_levels = program
        .top_levels
        .into_iter()
        .map(|top_level| match top_level {
            TopLevel::Function(mut fun) => {
                fun.body = optimize_body(fun.body, opts, &statics);
                TopLevel::Function(fun)
            }
            other => other,
        })
        .collect();
    Program { top_levels }
}

fn optimize_body(
    mut body: Vec<crate::ir::Instruction>,
    opts: OptimizationSet,
    statics: &HashSet<String>,
) -> Vec<crate::ir::Instruction> {
    for _ in 0..MAX_ROUNDS {
        let before = body.clone();
        if opts.fold_constants {
            body = constant_folding::fold_constants(body);
        }
        if opts.eliminate_unreachable_code {
            body = unreachable::eliminate_unreachable_code(body);
        }
        if opts.propagate_copies {
            body = copy_propagation::propagate_copies(body, statics);
        }
        if opts.eliminate_dead_stores {
            body = dead_stores::eliminate_dead_stores(body, statics);
        }
        if body == before {
            break;
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Constant;
    use crate::ir::{Function, Instruction, Value};
    use crate::irgen::lower_source;

    fn optimized(source: &str, opts: OptimizationSet) -> Program {
        let (ir, _, symbols) = lower_source(source);
        optimize(ir, opts, &symbols)
    }

    fn main_function(program: &Program) -> &Function {
        program
            .top_levels
            .iter()
            .find_map(|tl| match tl {
                TopLevel::Function(f) if f.name == "main" => Some(f),
                _ => None,
            })
            .expect("main present")
    }

    #[test]
    fn test_disabled_passes_are_identity() {
        let (ir, _, symbols) = lower_source("int main(void) { return 2 + 3; }");
        let untouched = optimize(ir.clone(), OptimizationSet::default(), &symbols);
        assert_eq!(ir, untouched);
    }

    #[test]
    fn test_full_pipeline_collapses_constant_expression() {
        // 2 + 3 * 4 must end up as a bare `return 14`.
        let program = optimized(
            "int main(void) { return 2 + 3 * 4; }",
            OptimizationSet::all(),
        );
        let main = main_function(&program);
        assert_eq!(
            main.body[0],
            Instruction::Return(Value::Constant(Constant::Int(14)))
        );
    }

    #[test]
    fn test_constant_branch_pruned() {
        let program = optimized(
            "int main(void) { if (0) return 1; return 2; }",
            OptimizationSet::all(),
        );
        let main = main_function(&program);
        // The `return 1` arm is gone entirely.
        assert!(!main
            .body
            .iter()
            .any(|i| *i == Instruction::Return(Value::Constant(Constant::Int(1)))));
        assert!(main
            .body
            .iter()
            .any(|i| *i == Instruction::Return(Value::Constant(Constant::Int(2)))));
    }

    #[test]
    fn test_short_circuit_folds_to_constant() {
        let program = optimized(
            "int main(void) { return 1 && 0; }",
            OptimizationSet::all(),
        );
        let main = main_function(&program);
        assert_eq!(
            main.body[0],
            Instruction::Return(Value::Constant(Constant::Int(0)))
        );
    }

    #[test]
    fn test_static_writes_survive() {
        let program = optimized(
            "static int g = 5; int main(void) { g = g + 1; return g; }",
            OptimizationSet::all(),
        );
        let main = main_function(&program);
        assert!(main.body.iter().any(|i| matches!(
            i,
            Instruction::Copy {
                dst: Value::Var(name),
                ..
            } if name == "g"
        )));
    }

    #[test]
    fn test_calls_survive() {
        let program = optimized(
            "int f(void) { return 1; } int main(void) { f(); return 0; }",
            OptimizationSet::all(),
        );
        let main = main_function(&program);
        assert!(main
            .body
            .iter()
            .any(|i| matches!(i, Instruction::FunCall { .. })));
    }

    #[test]
    fn test_loop_computation_survives() {
        let program = optimized(
            "int main(void) { int s = 0; for (int i = 1; i <= 4; i = i + 1) s = s + i; return s; }",
            OptimizationSet::all(),
        );
        let main = main_function(&program);
        // The loop cannot be folded away; the adds remain.
        assert!(main
            .body
            .iter()
            .any(|i| matches!(i, Instruction::Binary { .. })));
    }
}
