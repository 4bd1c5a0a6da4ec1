//! Identifier resolution: alpha-renaming with lexical scope.
//!
//! Every local variable is renamed to a globally unique `name.<counter>`;
//! identifiers with linkage (file-scope variables, functions, block-scope
//! `extern`s) keep their original name. The per-scope map records, for each
//! visible identifier, its new name, whether it was declared in the current
//! scope, and whether it has linkage. Entering a nested scope clones the
//! map and clears every `from_current_scope` flag, so shadowing is legal
//! but redeclaration in the same scope is not.
//!
//! The final counter value is returned so the IR generator can seed its
//! temporary counter past it, keeping renamed identifiers and `tmp.<n>`
//! names in disjoint namespaces.

use crate::ast::{
    Block, BlockItem, Declaration, Expression, ExpressionKind, ForInit, FunctionDeclaration,
    Program, Statement, StorageClass, VariableDeclaration,
};
use crate::error::ResolutionError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct MapEntry {
    new_name: String,
    from_current_scope: bool,
    has_linkage: bool,
}

type IdentifierMap = HashMap<String, MapEntry>;

pub struct Resolver {
    counter: usize,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver { counter: 0 }
    }

    /// Resolve a whole program, returning the renamed tree and the final
    /// value of the unique-name counter.
    pub fn resolve(mut self, program: Program) -> Result<(Program, usize), ResolutionError> {
        let mut map = IdentifierMap::new();
        let mut declarations = Vec::with_capacity(program.declarations.len());
        for declaration in program.declarations {
            match declaration {
                Declaration::Function(fun) => {
                    let resolved = self.resolve_function_declaration(fun, &mut map, true)?;
                    declarations.push(Declaration::Function(resolved));
                }
                Declaration::Variable(var) => {
                    // File-scope variables keep their name and have linkage.
                    map.insert(
                        var.name.clone(),
                        MapEntry {
                            new_name: var.name.clone(),
                            from_current_scope: true,
                            has_linkage: true,
                        },
                    );
                    declarations.push(Declaration::Variable(var));
                }
            }
        }
        Ok((Program { declarations }, self.counter))
    }

    fn make_unique(&mut self, name: &str) -> String {
        let unique = format!("{}.{}", name, self.counter);
        self.counter += 1;
        unique
    }

    fn resolve_function_declaration(
        &mut self,
        decl: FunctionDeclaration,
        map: &mut IdentifierMap,
        at_file_scope: bool,
    ) -> Result<FunctionDeclaration, ResolutionError> {
        if !at_file_scope {
            if decl.body.is_some() {
                return Err(ResolutionError::NestedFunctionDefinition(decl.name));
            }
            if decl.storage_class == Some(StorageClass::Static) {
                return Err(ResolutionError::StaticOnNestedFunction(decl.name));
            }
        }
        if let Some(previous) = map.get(&decl.name) {
            if previous.from_current_scope && !previous.has_linkage {
                return Err(ResolutionError::ConflictingDeclaration(decl.name));
            }
        }
        map.insert(
            decl.name.clone(),
            MapEntry {
                new_name: decl.name.clone(),
                from_current_scope: true,
                has_linkage: true,
            },
        );

        let mut inner_map = enter_scope(map);
        let mut params = Vec::with_capacity(decl.params.len());
        for param in decl.params {
            params.push(self.resolve_parameter(param, &mut inner_map)?);
        }
        let body = match decl.body {
            Some(block) => Some(self.resolve_block(block, &mut inner_map)?),
            None => None,
        };
        Ok(FunctionDeclaration {
            name: decl.name,
            params,
            fun_type: decl.fun_type,
            body,
            storage_class: decl.storage_class,
        })
    }

    fn resolve_parameter(
        &mut self,
        param: String,
        map: &mut IdentifierMap,
    ) -> Result<String, ResolutionError> {
        if let Some(previous) = map.get(&param) {
            if previous.from_current_scope {
                return Err(ResolutionError::DuplicateParameter(param));
            }
        }
        let unique = self.make_unique(&param);
        map.insert(
            param,
            MapEntry {
                new_name: unique.clone(),
                from_current_scope: true,
                has_linkage: false,
            },
        );
        Ok(unique)
    }

    fn resolve_local_variable_declaration(
        &mut self,
        decl: VariableDeclaration,
        map: &mut IdentifierMap,
    ) -> Result<VariableDeclaration, ResolutionError> {
        if let Some(previous) = map.get(&decl.name) {
            let extern_over_linked =
                previous.has_linkage && decl.storage_class == Some(StorageClass::Extern);
            if previous.from_current_scope && !extern_over_linked {
                return Err(ResolutionError::ConflictingDeclaration(decl.name));
            }
        }
        if decl.storage_class == Some(StorageClass::Extern) {
            // Block-scope extern refers to the file-scope entity; no rename.
            map.insert(
                decl.name.clone(),
                MapEntry {
                    new_name: decl.name.clone(),
                    from_current_scope: true,
                    has_linkage: true,
                },
            );
            return Ok(decl);
        }
        let unique = self.make_unique(&decl.name);
        map.insert(
            decl.name,
            MapEntry {
                new_name: unique.clone(),
                from_current_scope: true,
                has_linkage: false,
            },
        );
        let init = match decl.init {
            Some(expr) => Some(self.resolve_expression(expr, map)?),
            None => None,
        };
        Ok(VariableDeclaration {
            name: unique,
            var_type: decl.var_type,
            init,
            storage_class: decl.storage_class,
        })
    }

    fn resolve_block(
        &mut self,
        block: Block,
        map: &mut IdentifierMap,
    ) -> Result<Block, ResolutionError> {
        let mut items = Vec::with_capacity(block.items.len());
        for item in block.items {
            let resolved = match item {
                BlockItem::Declaration(Declaration::Variable(var)) => BlockItem::Declaration(
                    Declaration::Variable(self.resolve_local_variable_declaration(var, map)?),
                ),
                BlockItem::Declaration(Declaration::Function(fun)) => BlockItem::Declaration(
                    Declaration::Function(self.resolve_function_declaration(fun, map, false)?),
                ),
                BlockItem::Statement(stmt) => {
                    BlockItem::Statement(self.resolve_statement(stmt, map)?)
                }
            };
            items.push(resolved);
        }
        Ok(Block { items })
    }

    fn resolve_statement(
        &mut self,
        stmt: Statement,
        map: &mut IdentifierMap,
    ) -> Result<Statement, ResolutionError> {
        match stmt {
            Statement::Return(expr) => Ok(Statement::Return(self.resolve_expression(expr, map)?)),
            Statement::Expression(expr) => {
                Ok(Statement::Expression(self.resolve_expression(expr, map)?))
            }
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.resolve_expression(cond, map)?;
                let then_branch = Box::new(self.resolve_statement(*then_branch, map)?);
                let else_branch = match else_branch {
                    Some(stmt) => Some(Box::new(self.resolve_statement(*stmt, map)?)),
                    None => None,
                };
                Ok(Statement::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            Statement::Compound(block) => {
                let mut inner_map = enter_scope(map);
                Ok(Statement::Compound(
                    self.resolve_block(block, &mut inner_map)?,
                ))
            }
            Statement::While { cond, body, label } => Ok(Statement::While {
                cond: self.resolve_expression(cond, map)?,
                body: Box::new(self.resolve_statement(*body, map)?),
                label,
            }),
            Statement::DoWhile { body, cond, label } => Ok(Statement::DoWhile {
                body: Box::new(self.resolve_statement(*body, map)?),
                cond: self.resolve_expression(cond, map)?,
                label,
            }),
            Statement::For {
                init,
                cond,
                post,
                body,
                label,
            } => {
                // The for header opens its own scope.
                let mut inner_map = enter_scope(map);
                let init = match init {
                    ForInit::Declaration(decl) => ForInit::Declaration(
                        self.resolve_local_variable_declaration(decl, &mut inner_map)?,
                    ),
                    ForInit::Expression(Some(expr)) => {
                        ForInit::Expression(Some(self.resolve_expression(expr, &mut inner_map)?))
                    }
                    ForInit::Expression(None) => ForInit::Expression(None),
                };
                let cond = match cond {
                    Some(expr) => Some(self.resolve_expression(expr, &mut inner_map)?),
                    None => None,
                };
                let post = match post {
                    Some(expr) => Some(self.resolve_expression(expr, &mut inner_map)?),
                    None => None,
                };
                let body = Box::new(self.resolve_statement(*body, &mut inner_map)?);
                Ok(Statement::For {
                    init,
                    cond,
                    post,
                    body,
                    label,
                })
            }
            Statement::Break { .. } | Statement::Continue { .. } | Statement::Null => Ok(stmt),
        }
    }

    fn resolve_expression(
        &mut self,
        expr: Expression,
        map: &mut IdentifierMap,
    ) -> Result<Expression, ResolutionError> {
        let kind = match expr.kind {
            ExpressionKind::Constant(c) => ExpressionKind::Constant(c),
            ExpressionKind::Var(name) => match map.get(&name) {
                Some(entry) => ExpressionKind::Var(entry.new_name.clone()),
                None => return Err(ResolutionError::UndeclaredIdentifier(name)),
            },
            ExpressionKind::Cast { target, inner } => ExpressionKind::Cast {
                target,
                inner: Box::new(self.resolve_expression(*inner, map)?),
            },
            ExpressionKind::Unary { op, inner } => ExpressionKind::Unary {
                op,
                inner: Box::new(self.resolve_expression(*inner, map)?),
            },
            ExpressionKind::Binary { op, lhs, rhs } => ExpressionKind::Binary {
                op,
                lhs: Box::new(self.resolve_expression(*lhs, map)?),
                rhs: Box::new(self.resolve_expression(*rhs, map)?),
            },
            ExpressionKind::Assignment { lhs, rhs } => ExpressionKind::Assignment {
                lhs: Box::new(self.resolve_expression(*lhs, map)?),
                rhs: Box::new(self.resolve_expression(*rhs, map)?),
            },
            ExpressionKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => ExpressionKind::Conditional {
                cond: Box::new(self.resolve_expression(*cond, map)?),
                then_branch: Box::new(self.resolve_expression(*then_branch, map)?),
                else_branch: Box::new(self.resolve_expression(*else_branch, map)?),
            },
            ExpressionKind::FunctionCall { name, args } => {
                let new_name = match map.get(&name) {
                    Some(entry) => entry.new_name.clone(),
                    None => return Err(ResolutionError::UndeclaredIdentifier(name)),
                };
                let mut resolved_args = Vec::with_capacity(args.len());
                for arg in args {
                    resolved_args.push(self.resolve_expression(arg, map)?);
                }
                ExpressionKind::FunctionCall {
                    name: new_name,
                    args: resolved_args,
                }
            }
        };
        Ok(Expression { kind, ty: expr.ty })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}

/// Clone the map for a nested scope: everything stays visible but nothing
/// counts as declared in the new scope yet.
fn enter_scope(map: &IdentifierMap) -> IdentifierMap {
    map.iter()
        .map(|(name, entry)| {
            (
                name.clone(),
                MapEntry {
                    new_name: entry.new_name.clone(),
                    from_current_scope: false,
                    has_linkage: entry.has_linkage,
                },
            )
        })
        .collect()
}
