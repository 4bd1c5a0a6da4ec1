//! Type checking and symbol table construction.
//!
//! A single walk over the resolved AST that
//!
//!   - fills the inferred-type slot of every expression,
//!   - materializes the usual int/long conversions as explicit `Cast`
//!     nodes (so IR lowering only ever sees casts, never implicit
//!     conversions),
//!   - builds the symbol table: type plus identifier attribute (function
//!     defined/global, static with initial value, or plain local).
//!
//! Tentative definitions follow C's file-scope rules: a tentative becomes
//! an explicit definition if any declaration of the same name carries an
//! initializer, two explicit initializers conflict, and `extern` defers to
//! the linkage of whatever came before.

use crate::ast::{
    Block, BlockItem, Constant, Declaration, Expression, ExpressionKind, ForInit,
    FunctionDeclaration, Program, Statement, StorageClass, Type, UnaryOperator,
    VariableDeclaration,
};
use crate::error::TypeError;
use std::collections::HashMap;

/// A constant initializer for storage with static duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticInit {
    Int(i32),
    Long(i64),
}

impl StaticInit {
    pub fn as_i64(&self) -> i64 {
        match self {
            StaticInit::Int(v) => i64::from(*v),
            StaticInit::Long(v) => *v,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_i64() == 0
    }
}

/// How a static-storage variable gets its initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialValue {
    /// Declared without initializer; becomes zero if nothing else does.
    Tentative,
    Initial(StaticInit),
    /// `extern` with no initializer: defined elsewhere.
    NoInitializer,
}

/// What kind of entity an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierAttrs {
    Fun { defined: bool, global: bool },
    Static { init: InitialValue, global: bool },
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub ty: Type,
    pub attrs: IdentifierAttrs,
}

pub type SymbolTable = HashMap<String, Symbol>;

pub struct TypeChecker {
    symbols: SymbolTable,
    /// Return type of the function body being checked.
    current_return_type: Option<Type>,
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker {
            symbols: SymbolTable::new(),
            current_return_type: None,
        }
    }

    /// Check a whole program, returning the typed tree and the symbol table.
    pub fn check(mut self, program: Program) -> Result<(Program, SymbolTable), TypeError> {
        let mut declarations = Vec::with_capacity(program.declarations.len());
        for declaration in program.declarations {
            let checked = match declaration {
                Declaration::Function(fun) => {
                    Declaration::Function(self.check_function_declaration(fun)?)
                }
                Declaration::Variable(var) => {
                    Declaration::Variable(self.check_file_scope_variable(var)?)
                }
            };
            declarations.push(checked);
        }
        Ok((Program { declarations }, self.symbols))
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn check_function_declaration(
        &mut self,
        decl: FunctionDeclaration,
    ) -> Result<FunctionDeclaration, TypeError> {
        let FunctionDeclaration {
            name,
            params,
            fun_type,
            body,
            storage_class,
        } = decl;
        let has_body = body.is_some();
        let mut already_defined = false;
        let mut global = storage_class != Some(StorageClass::Static);

        if let Some(old) = self.symbols.get(&name) {
            let Type::Function(old_fun) = &old.ty else {
                return Err(TypeError::IncompatibleRedeclaration(name));
            };
            if *old_fun != fun_type {
                return Err(TypeError::IncompatibleRedeclaration(name));
            }
            let IdentifierAttrs::Fun {
                defined,
                global: old_global,
            } = old.attrs
            else {
                return Err(TypeError::IncompatibleRedeclaration(name));
            };
            already_defined = defined;
            if already_defined && has_body {
                return Err(TypeError::FunctionRedefined(name));
            }
            // `static` after a declaration with external linkage conflicts;
            // the reverse inherits the earlier internal linkage.
            if old_global && storage_class == Some(StorageClass::Static) {
                return Err(TypeError::LinkageConflict(name));
            }
            global = old_global;
        }

        self.symbols.insert(
            name.clone(),
            Symbol {
                ty: Type::Function(fun_type.clone()),
                attrs: IdentifierAttrs::Fun {
                    defined: already_defined || has_body,
                    global,
                },
            },
        );

        let body = match body {
            Some(block) => {
                for (param, param_type) in params.iter().zip(&fun_type.params) {
                    self.symbols.insert(
                        param.clone(),
                        Symbol {
                            ty: param_type.clone(),
                            attrs: IdentifierAttrs::Local,
                        },
                    );
                }
                self.current_return_type = Some((*fun_type.ret).clone());
                let checked = self.check_block(block)?;
                self.current_return_type = None;
                Some(checked)
            }
            None => None,
        };
        Ok(FunctionDeclaration {
            name,
            params,
            fun_type,
            body,
            storage_class,
        })
    }

    fn check_file_scope_variable(
        &mut self,
        decl: VariableDeclaration,
    ) -> Result<VariableDeclaration, TypeError> {
        let VariableDeclaration {
            name,
            var_type,
            init,
            storage_class,
        } = decl;
        let mut initial = match (&init, storage_class) {
            (Some(expr), _) => match constant_of(expr) {
                Some(c) => InitialValue::Initial(to_static_init(c, &var_type)),
                None => return Err(TypeError::NonConstantStaticInit(name)),
            },
            (None, Some(StorageClass::Extern)) => InitialValue::NoInitializer,
            (None, _) => InitialValue::Tentative,
        };
        let mut global = storage_class != Some(StorageClass::Static);

        if let Some(old) = self.symbols.get(&name) {
            if old.ty != var_type {
                return Err(TypeError::IncompatibleRedeclaration(name));
            }
            let IdentifierAttrs::Static {
                init: old_init,
                global: old_global,
            } = old.attrs
            else {
                return Err(TypeError::IncompatibleRedeclaration(name));
            };
            if storage_class == Some(StorageClass::Extern) {
                global = old_global;
            } else if old_global != global {
                return Err(TypeError::LinkageConflict(name));
            }
            initial = match (old_init, initial) {
                (InitialValue::Initial(_), InitialValue::Initial(_)) => {
                    return Err(TypeError::ConflictingInitializer(name));
                }
                (InitialValue::Initial(existing), _) => InitialValue::Initial(existing),
                (InitialValue::Tentative, InitialValue::Initial(new)) => {
                    InitialValue::Initial(new)
                }
                (InitialValue::Tentative, _) => InitialValue::Tentative,
                (InitialValue::NoInitializer, new) => new,
            };
        }

        self.symbols.insert(
            name.clone(),
            Symbol {
                ty: var_type.clone(),
                attrs: IdentifierAttrs::Static {
                    init: initial,
                    global,
                },
            },
        );
        // Type the initializer expression for the expType invariant; the
        // value itself has already been captured in the symbol table.
        let init = match init {
            Some(expr) => Some(self.check_expression(expr)?),
            None => None,
        };
        Ok(VariableDeclaration {
            name,
            var_type,
            init,
            storage_class,
        })
    }

    fn check_local_variable(
        &mut self,
        decl: VariableDeclaration,
    ) -> Result<VariableDeclaration, TypeError> {
        match decl.storage_class {
            Some(StorageClass::Extern) => {
                if decl.init.is_some() {
                    return Err(TypeError::ExternLocalInitializer(decl.name));
                }
                if let Some(old) = self.symbols.get(&decl.name) {
                    if old.ty != decl.var_type {
                        return Err(TypeError::IncompatibleRedeclaration(decl.name));
                    }
                } else {
                    self.symbols.insert(
                        decl.name.clone(),
                        Symbol {
                            ty: decl.var_type.clone(),
                            attrs: IdentifierAttrs::Static {
                                init: InitialValue::NoInitializer,
                                global: true,
                            },
                        },
                    );
                }
                Ok(decl)
            }
            Some(StorageClass::Static) => {
                let initial = match &decl.init {
                    Some(expr) => match constant_of(expr) {
                        Some(c) => to_static_init(c, &decl.var_type),
                        None => return Err(TypeError::NonConstantStaticInit(decl.name)),
                    },
                    None => zero_init(&decl.var_type),
                };
                self.symbols.insert(
                    decl.name.clone(),
                    Symbol {
                        ty: decl.var_type.clone(),
                        attrs: IdentifierAttrs::Static {
                            init: InitialValue::Initial(initial),
                            global: false,
                        },
                    },
                );
                let init = match decl.init {
                    Some(expr) => Some(self.check_expression(expr)?),
                    None => None,
                };
                Ok(VariableDeclaration {
                    name: decl.name,
                    var_type: decl.var_type,
                    init,
                    storage_class: decl.storage_class,
                })
            }
            None => {
                self.symbols.insert(
                    decl.name.clone(),
                    Symbol {
                        ty: decl.var_type.clone(),
                        attrs: IdentifierAttrs::Local,
                    },
                );
                let init = match decl.init {
                    Some(expr) => {
                        let checked = self.check_expression(expr)?;
                        Some(convert_to(checked, &decl.var_type))
                    }
                    None => None,
                };
                Ok(VariableDeclaration {
                    name: decl.name,
                    var_type: decl.var_type,
                    init,
                    storage_class: decl.storage_class,
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn check_block(&mut self, block: Block) -> Result<Block, TypeError> {
        let mut items = Vec::with_capacity(block.items.len());
        for item in block.items {
            let checked = match item {
                BlockItem::Declaration(Declaration::Variable(var)) => {
                    BlockItem::Declaration(Declaration::Variable(self.check_local_variable(var)?))
                }
                BlockItem::Declaration(Declaration::Function(fun)) => BlockItem::Declaration(
                    Declaration::Function(self.check_function_declaration(fun)?),
                ),
                BlockItem::Statement(stmt) => BlockItem::Statement(self.check_statement(stmt)?),
            };
            items.push(checked);
        }
        Ok(Block { items })
    }

    fn check_statement(&mut self, stmt: Statement) -> Result<Statement, TypeError> {
        match stmt {
            Statement::Return(expr) => {
                let checked = self.check_expression(expr)?;
                let return_type = self
                    .current_return_type
                    .clone()
                    .expect("return statement outside a function body");
                Ok(Statement::Return(convert_to(checked, &return_type)))
            }
            Statement::Expression(expr) => {
                Ok(Statement::Expression(self.check_expression(expr)?))
            }
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => Ok(Statement::If {
                cond: self.check_expression(cond)?,
                then_branch: Box::new(self.check_statement(*then_branch)?),
                else_branch: match else_branch {
                    Some(stmt) => Some(Box::new(self.check_statement(*stmt)?)),
                    None => None,
                },
            }),
            Statement::Compound(block) => Ok(Statement::Compound(self.check_block(block)?)),
            Statement::While { cond, body, label } => Ok(Statement::While {
                cond: self.check_expression(cond)?,
                body: Box::new(self.check_statement(*body)?),
                label,
            }),
            Statement::DoWhile { body, cond, label } => Ok(Statement::DoWhile {
                body: Box::new(self.check_statement(*body)?),
                cond: self.check_expression(cond)?,
                label,
            }),
            Statement::For {
                init,
                cond,
                post,
                body,
                label,
            } => {
                let init = match init {
                    ForInit::Declaration(decl) => {
                        if decl.storage_class.is_some() {
                            return Err(TypeError::StorageClassInForInit(decl.name));
                        }
                        ForInit::Declaration(self.check_local_variable(decl)?)
                    }
                    ForInit::Expression(Some(expr)) => {
                        ForInit::Expression(Some(self.check_expression(expr)?))
                    }
                    ForInit::Expression(None) => ForInit::Expression(None),
                };
                Ok(Statement::For {
                    init,
                    cond: match cond {
                        Some(expr) => Some(self.check_expression(expr)?),
                        None => None,
                    },
                    post: match post {
                        Some(expr) => Some(self.check_expression(expr)?),
                        None => None,
                    },
                    body: Box::new(self.check_statement(*body)?),
                    label,
                })
            }
            Statement::Break { .. } | Statement::Continue { .. } | Statement::Null => Ok(stmt),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn check_expression(&mut self, expr: Expression) -> Result<Expression, TypeError> {
        match expr.kind {
            ExpressionKind::Constant(c) => {
                let ty = c.ty();
                Ok(Expression::typed(ExpressionKind::Constant(c), ty))
            }
            ExpressionKind::Var(name) => {
                let symbol = self
                    .symbols
                    .get(&name)
                    .expect("resolved identifier missing from symbol table");
                if matches!(symbol.ty, Type::Function(_)) {
                    return Err(TypeError::FunctionUsedAsVariable(name));
                }
                let ty = symbol.ty.clone();
                Ok(Expression::typed(ExpressionKind::Var(name), ty))
            }
            ExpressionKind::Cast { target, inner } => {
                let inner = self.check_expression(*inner)?;
                Ok(Expression::typed(
                    ExpressionKind::Cast {
                        target: target.clone(),
                        inner: Box::new(inner),
                    },
                    target,
                ))
            }
            ExpressionKind::Unary { op, inner } => {
                let inner = self.check_expression(*inner)?;
                let ty = match op {
                    UnaryOperator::Not => Type::Int,
                    UnaryOperator::Negate | UnaryOperator::Complement => {
                        inner.expr_type().clone()
                    }
                };
                Ok(Expression::typed(
                    ExpressionKind::Unary {
                        op,
                        inner: Box::new(inner),
                    },
                    ty,
                ))
            }
            ExpressionKind::Binary { op, lhs, rhs } => {
                let lhs = self.check_expression(*lhs)?;
                let rhs = self.check_expression(*rhs)?;
                use crate::ast::BinaryOperator::{And, Or};
                if matches!(op, And | Or) {
                    // Logical operators work on truth values; no conversion.
                    return Ok(Expression::typed(
                        ExpressionKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        Type::Int,
                    ));
                }
                let common = common_type(lhs.expr_type(), rhs.expr_type());
                let result = if op.is_comparison() {
                    Type::Int
                } else {
                    common.clone()
                };
                Ok(Expression::typed(
                    ExpressionKind::Binary {
                        op,
                        lhs: Box::new(convert_to(lhs, &common)),
                        rhs: Box::new(convert_to(rhs, &common)),
                    },
                    result,
                ))
            }
            ExpressionKind::Assignment { lhs, rhs } => {
                let lhs = self.check_expression(*lhs)?;
                let rhs = self.check_expression(*rhs)?;
                let target = lhs.expr_type().clone();
                Ok(Expression::typed(
                    ExpressionKind::Assignment {
                        lhs: Box::new(lhs),
                        rhs: Box::new(convert_to(rhs, &target)),
                    },
                    target,
                ))
            }
            ExpressionKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.check_expression(*cond)?;
                let then_branch = self.check_expression(*then_branch)?;
                let else_branch = self.check_expression(*else_branch)?;
                let common = common_type(then_branch.expr_type(), else_branch.expr_type());
                Ok(Expression::typed(
                    ExpressionKind::Conditional {
                        cond: Box::new(cond),
                        then_branch: Box::new(convert_to(then_branch, &common)),
                        else_branch: Box::new(convert_to(else_branch, &common)),
                    },
                    common,
                ))
            }
            ExpressionKind::FunctionCall { name, args } => {
                let symbol = self
                    .symbols
                    .get(&name)
                    .expect("resolved identifier missing from symbol table");
                let Type::Function(fun_type) = symbol.ty.clone() else {
                    return Err(TypeError::VariableUsedAsFunction(name));
                };
                if fun_type.params.len() != args.len() {
                    return Err(TypeError::BadArgumentCount {
                        name,
                        expected: fun_type.params.len(),
                        got: args.len(),
                    });
                }
                let mut checked_args = Vec::with_capacity(args.len());
                for (arg, param_type) in args.into_iter().zip(&fun_type.params) {
                    let checked = self.check_expression(arg)?;
                    checked_args.push(convert_to(checked, param_type));
                }
                Ok(Expression::typed(
                    ExpressionKind::FunctionCall {
                        name,
                        args: checked_args,
                    },
                    (*fun_type.ret).clone(),
                ))
            }
        }
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        TypeChecker::new()
    }
}

/// The common type of two integer types: `long` wins.
fn common_type(a: &Type, b: &Type) -> Type {
    if a == b { a.clone() } else { Type::Long }
}

/// Wrap `expr` in a cast when its type differs from `target`.
fn convert_to(expr: Expression, target: &Type) -> Expression {
    if expr.expr_type() == target {
        return expr;
    }
    Expression::typed(
        ExpressionKind::Cast {
            target: target.clone(),
            inner: Box::new(expr),
        },
        target.clone(),
    )
}

fn constant_of(expr: &Expression) -> Option<Constant> {
    match &expr.kind {
        ExpressionKind::Constant(c) => Some(*c),
        _ => None,
    }
}

/// Convert an initializer constant to the declared type of the variable.
fn to_static_init(c: Constant, ty: &Type) -> StaticInit {
    match ty {
        Type::Int => StaticInit::Int(c.as_i64() as i32),
        Type::Long => StaticInit::Long(c.as_i64()),
        Type::Function(_) => unreachable!("variables cannot have function type"),
    }
}

fn zero_init(ty: &Type) -> StaticInit {
    match ty {
        Type::Int => StaticInit::Int(0),
        Type::Long => StaticInit::Long(0),
        Type::Function(_) => unreachable!("variables cannot have function type"),
    }
}

/// Collect a type-checked program from source. Test helper used by the
/// later pipeline stages' unit tests as well.
#[cfg(test)]
pub(crate) fn check_source(source: &str) -> Result<(Program, SymbolTable), TypeError> {
    use crate::lexer::tokenize;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    let tokens = tokenize(source).expect("test source must lex");
    let program = Parser::new(tokens).parse().expect("test source must parse");
    let (program, _) = Resolver::new()
        .resolve(program)
        .expect("test source must resolve");
    TypeChecker::new().check(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_expression_typed(stmt: &Statement) -> bool {
        fn expr_ok(expr: &Expression) -> bool {
            let children: Vec<&Expression> = match &expr.kind {
                ExpressionKind::Constant(_) | ExpressionKind::Var(_) => vec![],
                ExpressionKind::Cast { inner, .. } | ExpressionKind::Unary { inner, .. } => {
                    vec![inner]
                }
                ExpressionKind::Binary { lhs, rhs, .. }
                | ExpressionKind::Assignment { lhs, rhs } => vec![lhs, rhs],
                ExpressionKind::Conditional {
                    cond,
                    then_branch,
                    else_branch,
                } => vec![cond, then_branch, else_branch],
                ExpressionKind::FunctionCall { args, .. } => args.iter().collect(),
            };
            expr.ty.is_some() && children.into_iter().all(expr_ok)
        }
        match stmt {
            Statement::Return(e) | Statement::Expression(e) => expr_ok(e),
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                expr_ok(cond)
                    && every_expression_typed(then_branch)
                    && else_branch
                        .as_deref()
                        .map(every_expression_typed)
                        .unwrap_or(true)
            }
            Statement::Compound(block) => block.items.iter().all(|item| match item {
                BlockItem::Statement(s) => every_expression_typed(s),
                BlockItem::Declaration(_) => true,
            }),
            Statement::While { cond, body, .. } | Statement::DoWhile { body, cond, .. } => {
                expr_ok(cond) && every_expression_typed(body)
            }
            Statement::For {
                cond, post, body, ..
            } => {
                cond.as_ref().map(expr_ok).unwrap_or(true)
                    && post.as_ref().map(expr_ok).unwrap_or(true)
                    && every_expression_typed(body)
            }
            _ => true,
        }
    }

    #[test]
    fn test_every_expression_gets_a_type() {
        let (program, _) = check_source(
            "long g(int a, long b) { return a + b; } \
             int main(void) { int x = 3; return x < 4 ? g(x, 5l) : !x; }",
        )
        .unwrap();
        for decl in &program.declarations {
            if let Declaration::Function(f) = decl {
                if let Some(body) = &f.body {
                    for item in &body.items {
                        if let BlockItem::Statement(stmt) = item {
                            assert!(every_expression_typed(stmt));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_int_plus_long_widens() {
        let (program, _) =
            check_source("int main(void) { int a = 1; return (int) (a + 2l); }").unwrap();
        let Declaration::Function(main) = &program.declarations[0] else {
            panic!("expected function");
        };
        let BlockItem::Statement(Statement::Return(ret)) = &main.body.as_ref().unwrap().items[1]
        else {
            panic!("expected return");
        };
        // (int) cast of a long addition whose left side was sign-extended.
        let ExpressionKind::Cast { inner, .. } = &ret.kind else {
            panic!("expected cast");
        };
        assert_eq!(inner.expr_type(), &Type::Long);
        let ExpressionKind::Binary { lhs, .. } = &inner.kind else {
            panic!("expected binary");
        };
        assert!(matches!(lhs.kind, ExpressionKind::Cast { .. }));
    }

    #[test]
    fn test_comparison_yields_int() {
        let (program, _) = check_source("int main(void) { return 1l < 2l; }").unwrap();
        let Declaration::Function(main) = &program.declarations[0] else {
            panic!("expected function");
        };
        let BlockItem::Statement(Statement::Return(ret)) = &main.body.as_ref().unwrap().items[0]
        else {
            panic!("expected return");
        };
        assert_eq!(ret.expr_type(), &Type::Int);
    }

    #[test]
    fn test_static_then_extern_keeps_internal_linkage() {
        let (_, symbols) = check_source("static int x = 1; extern int x;").unwrap();
        let symbol = &symbols["x"];
        assert_eq!(
            symbol.attrs,
            IdentifierAttrs::Static {
                init: InitialValue::Initial(StaticInit::Int(1)),
                global: false,
            }
        );
    }

    #[test]
    fn test_static_then_plain_is_linkage_conflict() {
        assert!(matches!(
            check_source("static int x = 1; int x;"),
            Err(TypeError::LinkageConflict(_))
        ));
    }

    #[test]
    fn test_tentative_definitions_merge() {
        let (_, symbols) = check_source("int x; int x; int main(void) { return x; }").unwrap();
        assert_eq!(
            symbols["x"].attrs,
            IdentifierAttrs::Static {
                init: InitialValue::Tentative,
                global: true,
            }
        );

        let (_, symbols) = check_source("int x; int x = 4;").unwrap();
        assert_eq!(
            symbols["x"].attrs,
            IdentifierAttrs::Static {
                init: InitialValue::Initial(StaticInit::Int(4)),
                global: true,
            }
        );
    }

    #[test]
    fn test_conflicting_initializers() {
        assert!(matches!(
            check_source("int x = 1; int x = 2;"),
            Err(TypeError::ConflictingInitializer(_))
        ));
    }

    #[test]
    fn test_function_redefinition() {
        assert!(matches!(
            check_source("int f(void) { return 1; } int f(void) { return 2; }"),
            Err(TypeError::FunctionRedefined(_))
        ));
    }

    #[test]
    fn test_incompatible_function_redeclaration() {
        assert!(matches!(
            check_source("int f(int a); int f(long a);"),
            Err(TypeError::IncompatibleRedeclaration(_))
        ));
        assert!(matches!(
            check_source("int f(void); int f(int a);"),
            Err(TypeError::IncompatibleRedeclaration(_))
        ));
    }

    #[test]
    fn test_variable_function_clashes() {
        assert!(matches!(
            check_source("int f(void); int main(void) { return f; }"),
            Err(TypeError::FunctionUsedAsVariable(_))
        ));
        assert!(matches!(
            check_source("int main(void) { int x = 1; return x(); }"),
            Err(TypeError::VariableUsedAsFunction(_))
        ));
    }

    #[test]
    fn test_bad_argument_count() {
        assert!(matches!(
            check_source("int f(int a) { return a; } int main(void) { return f(1, 2); }"),
            Err(TypeError::BadArgumentCount { .. })
        ));
    }

    #[test]
    fn test_call_arguments_convert_to_parameter_types() {
        let (program, _) = check_source(
            "long f(long a) { return a; } int main(void) { return (int) f(3); }",
        )
        .unwrap();
        let Declaration::Function(main) = &program.declarations[1] else {
            panic!("expected function");
        };
        let BlockItem::Statement(Statement::Return(ret)) = &main.body.as_ref().unwrap().items[0]
        else {
            panic!("expected return");
        };
        let ExpressionKind::Cast { inner, .. } = &ret.kind else {
            panic!("expected cast");
        };
        let ExpressionKind::FunctionCall { args, .. } = &inner.kind else {
            panic!("expected call");
        };
        // The int argument 3 was wrapped in a cast to long.
        assert!(matches!(args[0].kind, ExpressionKind::Cast { .. }));
        assert_eq!(args[0].expr_type(), &Type::Long);
    }

    #[test]
    fn test_local_static_default_zero() {
        let (_, symbols) =
            check_source("int main(void) { static long n; return (int) n; }").unwrap();
        let static_symbol = symbols
            .iter()
            .find(|(name, _)| name.starts_with("n."))
            .map(|(_, s)| s)
            .expect("renamed static local present");
        assert_eq!(
            static_symbol.attrs,
            IdentifierAttrs::Static {
                init: InitialValue::Initial(StaticInit::Long(0)),
                global: false,
            }
        );
    }

    #[test]
    fn test_extern_local_initializer_rejected() {
        assert!(matches!(
            check_source("int main(void) { extern int x = 3; return x; }"),
            Err(TypeError::ExternLocalInitializer(_))
        ));
    }

    #[test]
    fn test_non_constant_static_init() {
        assert!(matches!(
            check_source("int main(void) { static int x = 1 + 2; return x; }"),
            Err(TypeError::NonConstantStaticInit(_))
        ));
        assert!(matches!(
            check_source("int y = 1; int x = y;"),
            Err(TypeError::NonConstantStaticInit(_))
        ));
    }

    #[test]
    fn test_storage_class_in_for_init() {
        assert!(matches!(
            check_source("int main(void) { for (static int i = 0; i < 3; i = i + 1) ; return 0; }"),
            Err(TypeError::StorageClassInForInit(_))
        ));
    }

    #[test]
    fn test_static_init_converts_to_declared_type() {
        let (_, symbols) = check_source("int x = 5l; long y = 7;").unwrap();
        assert_eq!(
            symbols["x"].attrs,
            IdentifierAttrs::Static {
                init: InitialValue::Initial(StaticInit::Int(5)),
                global: true,
            }
        );
        assert_eq!(
            symbols["y"].attrs,
            IdentifierAttrs::Static {
                init: InitialValue::Initial(StaticInit::Long(7)),
                global: true,
            }
        );
    }
}
