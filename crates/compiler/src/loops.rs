//! Loop labeling.
//!
//! Walks every function body carrying the label of the innermost enclosing
//! loop. Each loop gets a fresh `loop<n>` label; `break` and `continue`
//! inherit the current one or fail if there is none. IR generation later
//! derives the `start_`, `continue_`, and `break_` jump targets from these
//! labels.

use crate::ast::{Block, BlockItem, Declaration, Program, Statement};
use crate::error::LabelError;

pub struct LoopLabeler {
    counter: usize,
}

impl LoopLabeler {
    pub fn new() -> Self {
        LoopLabeler { counter: 0 }
    }

    pub fn label(mut self, program: Program) -> Result<Program, LabelError> {
        let mut declarations = Vec::with_capacity(program.declarations.len());
        for declaration in program.declarations {
            let labeled = match declaration {
                Declaration::Function(mut fun) => {
                    fun.body = match fun.body {
                        Some(block) => Some(self.label_block(block, None)?),
                        None => None,
                    };
                    Declaration::Function(fun)
                }
                other => other,
            };
            declarations.push(labeled);
        }
        Ok(Program { declarations })
    }

    fn fresh_label(&mut self) -> String {
        let label = format!("loop{}", self.counter);
        self.counter += 1;
        label
    }

    fn label_block(
        &mut self,
        block: Block,
        current: Option<&String>,
    ) -> Result<Block, LabelError> {
        let mut items = Vec::with_capacity(block.items.len());
        for item in block.items {
            let labeled = match item {
                BlockItem::Statement(stmt) => {
                    BlockItem::Statement(self.label_statement(stmt, current)?)
                }
                declaration => declaration,
            };
            items.push(labeled);
        }
        Ok(Block { items })
    }

    fn label_statement(
        &mut self,
        stmt: Statement,
        current: Option<&String>,
    ) -> Result<Statement, LabelError> {
        match stmt {
            Statement::Break { .. } => match current {
                Some(label) => Ok(Statement::Break {
                    label: Some(label.clone()),
                }),
                None => Err(LabelError::BreakOutsideLoop),
            },
            Statement::Continue { .. } => match current {
                Some(label) => Ok(Statement::Continue {
                    label: Some(label.clone()),
                }),
                None => Err(LabelError::ContinueOutsideLoop),
            },
            Statement::While { cond, body, .. } => {
                let label = self.fresh_label();
                let body = Box::new(self.label_statement(*body, Some(&label))?);
                Ok(Statement::While {
                    cond,
                    body,
                    label: Some(label),
                })
            }
            Statement::DoWhile { body, cond, .. } => {
                let label = self.fresh_label();
                let body = Box::new(self.label_statement(*body, Some(&label))?);
                Ok(Statement::DoWhile {
                    body,
                    cond,
                    label: Some(label),
                })
            }
            Statement::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                let label = self.fresh_label();
                let body = Box::new(self.label_statement(*body, Some(&label))?);
                Ok(Statement::For {
                    init,
                    cond,
                    post,
                    body,
                    label: Some(label),
                })
            }
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => Ok(Statement::If {
                cond,
                then_branch: Box::new(self.label_statement(*then_branch, current)?),
                else_branch: match else_branch {
                    Some(stmt) => Some(Box::new(self.label_statement(*stmt, current)?)),
                    None => None,
                },
            }),
            Statement::Compound(block) => {
                Ok(Statement::Compound(self.label_block(block, current)?))
            }
            other => Ok(other),
        }
    }
}

impl Default for LoopLabeler {
    fn default() -> Self {
        LoopLabeler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn label_source(source: &str) -> Result<Program, LabelError> {
        let tokens = tokenize(source).expect("test source must lex");
        let program = Parser::new(tokens).parse().expect("test source must parse");
        LoopLabeler::new().label(program)
    }

    fn first_body(program: &Program) -> &Block {
        match &program.declarations[0] {
            Declaration::Function(f) => f.body.as_ref().expect("function has a body"),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_loops_get_distinct_labels() {
        let program = label_source(
            "int main(void) { while (1) break; do break; while (1); return 0; }",
        )
        .unwrap();
        let body = first_body(&program);
        let BlockItem::Statement(Statement::While { label: first, .. }) = &body.items[0] else {
            panic!("expected while");
        };
        let BlockItem::Statement(Statement::DoWhile { label: second, .. }) = &body.items[1]
        else {
            panic!("expected do-while");
        };
        assert!(first.is_some());
        assert!(second.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn test_break_gets_innermost_label() {
        let program = label_source(
            "int main(void) { while (1) { while (1) break; continue; } return 0; }",
        )
        .unwrap();
        let body = first_body(&program);
        let BlockItem::Statement(Statement::While {
            label: outer, body, ..
        }) = &body.items[0]
        else {
            panic!("expected while");
        };
        let Statement::Compound(inner_block) = &**body else {
            panic!("expected compound body");
        };
        let BlockItem::Statement(Statement::While {
            label: inner,
            body: inner_body,
            ..
        }) = &inner_block.items[0]
        else {
            panic!("expected inner while");
        };
        let Statement::Break { label: break_label } = &**inner_body else {
            panic!("expected break");
        };
        assert_eq!(break_label, inner);
        let BlockItem::Statement(Statement::Continue { label: cont_label }) =
            &inner_block.items[1]
        else {
            panic!("expected continue");
        };
        assert_eq!(cont_label, outer);
        assert_ne!(inner, outer);
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(
            label_source("int main(void) { break; return 0; }"),
            Err(LabelError::BreakOutsideLoop)
        );
    }

    #[test]
    fn test_continue_outside_loop() {
        assert_eq!(
            label_source("int main(void) { if (1) continue; return 0; }"),
            Err(LabelError::ContinueOutsideLoop)
        );
    }

    #[test]
    fn test_if_propagates_label() {
        let program = label_source(
            "int main(void) { for (;;) { if (1) break; else continue; } return 0; }",
        );
        assert!(program.is_ok());
    }
}
