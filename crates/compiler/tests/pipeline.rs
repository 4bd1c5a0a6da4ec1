//! End-to-end pipeline tests.
//!
//! The external assembler and linker are not run here; instead the
//! optimized and unoptimized IR are executed by a small evaluator and
//! checked against the expected process exit values, and the emitted
//! assembly text is checked structurally.

use nanocc::ir::{BinaryOp, Function, Instruction, Program, TopLevel, UnaryOp, Value};
use nanocc::{CompilerConfig, OptimizationSet, compile_to_assembly, compile_to_ir};
use std::collections::HashMap;

// ----------------------------------------------------------------------
// IR evaluator
// ----------------------------------------------------------------------

struct Evaluator<'a> {
    functions: HashMap<&'a str, &'a Function>,
    statics: HashMap<String, i64>,
}

impl<'a> Evaluator<'a> {
    fn new(program: &'a Program) -> Self {
        let mut functions = HashMap::new();
        let mut statics = HashMap::new();
        for top_level in &program.top_levels {
            match top_level {
                TopLevel::Function(f) => {
                    functions.insert(f.name.as_str(), f);
                }
                TopLevel::StaticVariable(v) => {
                    statics.insert(v.name.clone(), v.init.as_i64());
                }
            }
        }
        Evaluator { functions, statics }
    }

    fn run_main(&mut self) -> i64 {
        self.call("main", &[])
    }

    fn call(&mut self, name: &str, args: &[i64]) -> i64 {
        let function = self.functions[name];
        let mut locals: HashMap<String, i64> = HashMap::new();
        for (param, value) in function.params.iter().zip(args) {
            locals.insert(param.clone(), *value);
        }
        let labels: HashMap<&str, usize> = function
            .body
            .iter()
            .enumerate()
            .filter_map(|(i, instr)| match instr {
                Instruction::Label(l) => Some((l.as_str(), i)),
                _ => None,
            })
            .collect();

        let mut pc = 0usize;
        loop {
            assert!(pc < function.body.len(), "fell off the end of {}", name);
            match &function.body[pc] {
                Instruction::Return(v) => return self.get(&locals, v),
                Instruction::SignExtend { src, dst } => {
                    let v = self.get(&locals, src);
                    self.set(&mut locals, dst, v);
                }
                Instruction::Truncate { src, dst } => {
                    let v = self.get(&locals, src) as i32;
                    self.set(&mut locals, dst, i64::from(v));
                }
                Instruction::Unary { op, src, dst } => {
                    let v = self.get(&locals, src);
                    let result = match op {
                        UnaryOp::Negate => v.wrapping_neg(),
                        UnaryOp::Complement => !v,
                        UnaryOp::Not => i64::from(v == 0),
                    };
                    self.set(&mut locals, dst, result);
                }
                Instruction::Binary {
                    op,
                    src1,
                    src2,
                    dst,
                } => {
                    let a = self.get(&locals, src1);
                    let b = self.get(&locals, src2);
                    let result = match op {
                        BinaryOp::Add => a.wrapping_add(b),
                        BinaryOp::Subtract => a.wrapping_sub(b),
                        BinaryOp::Multiply => a.wrapping_mul(b),
                        BinaryOp::Divide => a.wrapping_div(b),
                        BinaryOp::Remainder => a.wrapping_rem(b),
                        BinaryOp::Equal => i64::from(a == b),
                        BinaryOp::NotEqual => i64::from(a != b),
                        BinaryOp::LessThan => i64::from(a < b),
                        BinaryOp::LessOrEqual => i64::from(a <= b),
                        BinaryOp::GreaterThan => i64::from(a > b),
                        BinaryOp::GreaterOrEqual => i64::from(a >= b),
                    };
                    self.set(&mut locals, dst, result);
                }
                Instruction::Copy { src, dst } => {
                    let v = self.get(&locals, src);
                    self.set(&mut locals, dst, v);
                }
                Instruction::Jump(target) => {
                    pc = labels[target.as_str()];
                    continue;
                }
                Instruction::JumpIfZero { cond, target } => {
                    if self.get(&locals, cond) == 0 {
                        pc = labels[target.as_str()];
                        continue;
                    }
                }
                Instruction::JumpIfNotZero { cond, target } => {
                    if self.get(&locals, cond) != 0 {
                        pc = labels[target.as_str()];
                        continue;
                    }
                }
                Instruction::Label(_) => {}
                Instruction::FunCall { name, args, dst } => {
                    let values: Vec<i64> = args.iter().map(|a| self.get(&locals, a)).collect();
                    let result = self.call(&name.clone(), &values);
                    self.set(&mut locals, dst, result);
                }
            }
            pc += 1;
        }
    }

    fn get(&self, locals: &HashMap<String, i64>, value: &Value) -> i64 {
        match value {
            Value::Constant(c) => c.as_i64(),
            Value::Var(name) => match locals.get(name) {
                Some(v) => *v,
                None => self.statics[name],
            },
        }
    }

    fn set(&mut self, locals: &mut HashMap<String, i64>, dst: &Value, value: i64) {
        let Value::Var(name) = dst else {
            panic!("constant destination");
        };
        if locals.contains_key(name) || !self.statics.contains_key(name) {
            locals.insert(name.clone(), value);
        } else {
            self.statics.insert(name.clone(), value);
        }
    }
}

/// Evaluate `main` both without and with every optimization enabled and
/// require the same exit value from both.
fn exit_value(source: &str) -> i64 {
    let unoptimized = compile_to_ir(source, &CompilerConfig::new()).expect("must compile");
    let plain = Evaluator::new(&unoptimized).run_main();

    let mut config = CompilerConfig::new();
    config.optimizations = OptimizationSet::all();
    let optimized = compile_to_ir(source, &config).expect("must compile optimized");
    let fast = Evaluator::new(&optimized).run_main();

    assert_eq!(plain, fast, "optimization changed behavior of: {}", source);
    plain
}

// ----------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------

#[test]
fn test_return_zero() {
    assert_eq!(exit_value("int main(void) { return 0; }"), 0);
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(exit_value("int main(void) { return 2 + 3 * 4; }"), 14);
}

#[test]
fn test_function_arguments() {
    assert_eq!(
        exit_value("int f(int x, int y) { return x - y; } int main(void) { return f(10, 3); }"),
        7
    );
}

#[test]
fn test_for_loop_sum() {
    assert_eq!(
        exit_value(
            "int main(void) { int s = 0; for (int i = 1; i <= 4; i = i + 1) s = s + i; return s; }"
        ),
        10
    );
}

#[test]
fn test_static_variable_increment() {
    assert_eq!(
        exit_value("static int g = 5; int main(void) { g = g + 1; return g; }"),
        6
    );
}

#[test]
fn test_long_arithmetic_with_cast() {
    assert_eq!(
        exit_value(
            "long big(long n) { return n * 2l; } int main(void) { return (int) big(21l); }"
        ),
        42
    );
}

// ----------------------------------------------------------------------
// Additional behavioral checks
// ----------------------------------------------------------------------

#[test]
fn test_short_circuit_side_effects() {
    assert_eq!(
        exit_value(
            "int g(void); static int calls = 0; \
             int g(void) { calls = calls + 1; return 1; } \
             int main(void) { 0 && g(); 1 || g(); return calls; }"
        ),
        0
    );
}

#[test]
fn test_dangling_else_runtime() {
    assert_eq!(
        exit_value(
            "int main(void) { int a = 1; int b = 0; \
             if (a) if (b) return 10; else return 20; return 30; }"
        ),
        20
    );
}

#[test]
fn test_do_while_and_break() {
    assert_eq!(
        exit_value(
            "int main(void) { int i = 0; \
             do { i = i + 1; if (i == 3) break; } while (i < 100); return i; }"
        ),
        3
    );
}

#[test]
fn test_seven_arguments_through_stack() {
    assert_eq!(
        exit_value(
            "int sum(int a, int b, int c, int d, int e, int f, int g) \
             { return a + b + c + d + e + f + g; } \
             int main(void) { return sum(1, 2, 3, 4, 5, 6, 7); }"
        ),
        28
    );
}

#[test]
fn test_truncation_wraps() {
    assert_eq!(
        exit_value("int main(void) { long v = 4294967296l + 5l; return (int) v; }"),
        5
    );
}

#[test]
fn test_ternary_and_comparisons() {
    assert_eq!(
        exit_value("int main(void) { int x = 4; return x > 3 ? x == 4 : 9; }"),
        1
    );
}

#[test]
fn test_tentative_static_defaults_to_zero() {
    assert_eq!(
        exit_value("int g; int main(void) { return g; }"),
        0
    );
}

// ----------------------------------------------------------------------
// Emitted text
// ----------------------------------------------------------------------

#[test]
fn test_assembly_text_shape() {
    let text = compile_to_assembly(
        "int f(int x, int y) { return x - y; } int main(void) { return f(10, 3); }",
        &CompilerConfig::new(),
    )
    .unwrap();
    let main = if cfg!(target_os = "macos") { "_main" } else { "main" };
    assert!(text.contains(&format!("    .globl {}", main)));
    assert!(text.contains("    pushq %rbp"));
    // Both argument registers are loaded before the call.
    assert!(text.contains("%edi"));
    assert!(text.contains("%esi"));
    assert!(text.contains("    call "));
}

#[test]
fn test_optimized_constant_surfaces_in_assembly() {
    let mut config = CompilerConfig::new();
    config.optimizations = OptimizationSet::all();
    let text = compile_to_assembly("int main(void) { return 2 + 3 * 4; }", &config).unwrap();
    assert!(text.contains("movl $14, %eax"));
}

#[test]
fn test_stack_allocation_is_aligned() {
    let text = compile_to_assembly(
        "int main(void) { int a = 1; int b = 2; long c = 3; return a + b + (int) c; }",
        &CompilerConfig::new(),
    )
    .unwrap();
    let allocation = text
        .lines()
        .find_map(|line| {
            line.trim()
                .strip_prefix("subq $")
                .and_then(|rest| rest.strip_suffix(", %rsp"))
        })
        .expect("frame allocation present");
    let bytes: i64 = allocation.parse().unwrap();
    assert_eq!(bytes % 16, 0);
}
