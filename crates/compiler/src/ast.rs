//! Abstract syntax tree for the supported C subset.
//!
//! One enum per tree kind (declarations, statements, expressions) with
//! exhaustive matching everywhere downstream. Expressions carry an optional
//! inferred-type slot that the type checker fills in; the parser leaves it
//! empty.
//!
//! The `Display` impls re-print a tree as C source. Compound expressions
//! are printed fully parenthesized so that re-lexing and re-parsing the
//! output reproduces the same tree.

use std::fmt;

/// A type in the source language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// Function type with full arity and parameter types.
    Function(FunType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

impl Type {
    /// Size of a value of this type in bytes. Not defined for functions.
    pub fn size(&self) -> i64 {
        match self {
            Type::Int => 4,
            Type::Long => 8,
            Type::Function(_) => unreachable!("function types have no object size"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Function(fun) => {
                write!(f, "{}(", fun.ret)?;
                for (i, param) in fun.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A compile-time integer constant, tagged with its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Int(i32),
    Long(i64),
}

impl Constant {
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int(_) => Type::Int,
            Constant::Long(_) => Type::Long,
        }
    }

    /// The value widened to 64 bits.
    pub fn as_i64(&self) -> i64 {
        match self {
            Constant::Int(v) => i64::from(*v),
            Constant::Long(v) => *v,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_i64() == 0
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Long(v) => write!(f, "{}l", v),
        }
    }
}

/// Storage-class specifier on a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Static,
    Extern,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageClass::Static => write!(f, "static"),
            StorageClass::Extern => write!(f, "extern"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Arithmetic negation `-`.
    Negate,
    /// Bitwise complement `~`.
    Complement,
    /// Logical not `!`.
    Not,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Complement => write!(f, "~"),
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl BinaryOperator {
    /// Comparison operators always produce an `int` 0/1.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterOrEqual
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterOrEqual => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// An expression plus the type the checker inferred for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Filled in by the type checker; `None` straight out of the parser.
    pub ty: Option<Type>,
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Expression { kind, ty: None }
    }

    pub fn typed(kind: ExpressionKind, ty: Type) -> Self {
        Expression { kind, ty: Some(ty) }
    }

    /// The inferred type. Only valid after type checking.
    pub fn expr_type(&self) -> &Type {
        self.ty
            .as_ref()
            .expect("expression type queried before type checking")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Constant(Constant),
    Var(String),
    Cast {
        target: Type,
        inner: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        inner: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Assignment {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Conditional {
        cond: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Return(Expression),
    Expression(Expression),
    If {
        cond: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    Compound(Block),
    Break {
        /// Loop label attached by the loop-labeling pass.
        label: Option<String>,
    },
    Continue {
        label: Option<String>,
    },
    While {
        cond: Expression,
        body: Box<Statement>,
        label: Option<String>,
    },
    DoWhile {
        body: Box<Statement>,
        cond: Expression,
        label: Option<String>,
    },
    For {
        init: ForInit,
        cond: Option<Expression>,
        post: Option<Expression>,
        body: Box<Statement>,
        label: Option<String>,
    },
    Null,
}

/// The init part of a for-loop header.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Declaration(VariableDeclaration),
    Expression(Option<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub items: Vec<BlockItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Declaration(Declaration),
    Statement(Statement),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Function(FunctionDeclaration),
    Variable(VariableDeclaration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    /// Parameter names, parallel to `fun_type.params`.
    pub params: Vec<String>,
    pub fun_type: FunType,
    /// A body makes this a definition; `None` is a prototype.
    pub body: Option<Block>,
    pub storage_class: Option<StorageClass>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub var_type: Type,
    pub init: Option<Expression>,
    pub storage_class: Option<StorageClass>,
}

/// Root of a translation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}

// ============================================================================
//                          C-source printing
// ============================================================================

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::Constant(c) => write!(f, "{}", c),
            ExpressionKind::Var(name) => write!(f, "{}", name),
            ExpressionKind::Cast { target, inner } => write!(f, "(({}) {})", target, inner),
            ExpressionKind::Unary { op, inner } => write!(f, "({}{})", op, inner),
            ExpressionKind::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            ExpressionKind::Assignment { lhs, rhs } => write!(f, "({} = {})", lhs, rhs),
            ExpressionKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "({} ? {} : {})", cond, then_branch, else_branch),
            ExpressionKind::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
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

fn write_indent(f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    for _ in 0..indent {
        write!(f, "    ")?;
    }
    Ok(())
}

fn write_variable_declaration(
    f: &mut fmt::Formatter<'_>,
    decl: &VariableDeclaration,
) -> fmt::Result {
    if let Some(sc) = decl.storage_class {
        write!(f, "{} ", sc)?;
    }
    write!(f, "{} {}", decl.var_type, decl.name)?;
    if let Some(init) = &decl.init {
        write!(f, " = {}", init)?;
    }
    write!(f, ";")
}

fn write_statement(f: &mut fmt::Formatter<'_>, stmt: &Statement, indent: usize) -> fmt::Result {
    match stmt {
        Statement::Return(expr) => {
            write_indent(f, indent)?;
            writeln!(f, "return {};", expr)
        }
        Statement::Expression(expr) => {
            write_indent(f, indent)?;
            writeln!(f, "{};", expr)
        }
        Statement::If {
            cond,
            then_branch,
            else_branch,
        } => {
            write_indent(f, indent)?;
            writeln!(f, "if ({})", cond)?;
            write_statement(f, then_branch, indent + 1)?;
            if let Some(else_branch) = else_branch {
                write_indent(f, indent)?;
                writeln!(f, "else")?;
                write_statement(f, else_branch, indent + 1)?;
            }
            Ok(())
        }
        Statement::Compound(block) => {
            write_indent(f, indent)?;
            writeln!(f, "{{")?;
            write_block_items(f, block, indent + 1)?;
            write_indent(f, indent)?;
            writeln!(f, "}}")
        }
        Statement::Break { .. } => {
            write_indent(f, indent)?;
            writeln!(f, "break;")
        }
        Statement::Continue { .. } => {
            write_indent(f, indent)?;
            writeln!(f, "continue;")
        }
        Statement::While { cond, body, .. } => {
            write_indent(f, indent)?;
            writeln!(f, "while ({})", cond)?;
            write_statement(f, body, indent + 1)
        }
        Statement::DoWhile { body, cond, .. } => {
            write_indent(f, indent)?;
            writeln!(f, "do")?;
            write_statement(f, body, indent + 1)?;
            write_indent(f, indent)?;
            writeln!(f, "while ({});", cond)
        }
        Statement::For {
            init,
            cond,
            post,
            body,
            ..
        } => {
            write_indent(f, indent)?;
            write!(f, "for (")?;
            match init {
                ForInit::Declaration(decl) => write_variable_declaration(f, decl)?,
                ForInit::Expression(Some(expr)) => write!(f, "{};", expr)?,
                ForInit::Expression(None) => write!(f, ";")?,
            }
            match cond {
                Some(cond) => write!(f, " {};", cond)?,
                None => write!(f, ";")?,
            }
            if let Some(post) = post {
                write!(f, " {}", post)?;
            }
            writeln!(f, ")")?;
            write_statement(f, body, indent + 1)
        }
        Statement::Null => {
            write_indent(f, indent)?;
            writeln!(f, ";")
        }
    }
}

fn write_block_items(f: &mut fmt::Formatter<'_>, block: &Block, indent: usize) -> fmt::Result {
    for item in &block.items {
        match item {
            BlockItem::Declaration(decl) => write_declaration(f, decl, indent)?,
            BlockItem::Statement(stmt) => write_statement(f, stmt, indent)?,
        }
    }
    Ok(())
}

fn write_declaration(f: &mut fmt::Formatter<'_>, decl: &Declaration, indent: usize) -> fmt::Result {
    match decl {
        Declaration::Variable(var) => {
            write_indent(f, indent)?;
            write_variable_declaration(f, var)?;
            writeln!(f)
        }
        Declaration::Function(fun) => {
            write_indent(f, indent)?;
            if let Some(sc) = fun.storage_class {
                write!(f, "{} ", sc)?;
            }
            write!(f, "{} {}(", fun.fun_type.ret, fun.name)?;
            if fun.params.is_empty() {
                write!(f, "void")?;
            } else {
                for (i, (name, ty)) in fun.params.iter().zip(&fun.fun_type.params).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", ty, name)?;
                }
            }
            write!(f, ")")?;
            match &fun.body {
                Some(body) => {
                    writeln!(f, " {{")?;
                    write_block_items(f, body, indent + 1)?;
                    write_indent(f, indent)?;
                    writeln!(f, "}}")
                }
                None => writeln!(f, ";"),
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for decl in &self.declarations {
            write_declaration(f, decl, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_types() {
        assert_eq!(Constant::Int(3).ty(), Type::Int);
        assert_eq!(Constant::Long(3).ty(), Type::Long);
        assert_eq!(Constant::Int(-1).as_i64(), -1);
        assert!(Constant::Long(0).is_zero());
    }

    #[test]
    fn test_expression_printing_parenthesizes() {
        let expr = Expression::new(ExpressionKind::Binary {
            op: BinaryOperator::Add,
            lhs: Box::new(Expression::new(ExpressionKind::Constant(Constant::Int(2)))),
            rhs: Box::new(Expression::new(ExpressionKind::Binary {
                op: BinaryOperator::Multiply,
                lhs: Box::new(Expression::new(ExpressionKind::Constant(Constant::Int(3)))),
                rhs: Box::new(Expression::new(ExpressionKind::Constant(Constant::Int(4)))),
            })),
        });
        assert_eq!(expr.to_string(), "(2 + (3 * 4))");
    }

    #[test]
    fn test_cast_printing() {
        let expr = Expression::new(ExpressionKind::Cast {
            target: Type::Long,
            inner: Box::new(Expression::new(ExpressionKind::Unary {
                op: UnaryOperator::Negate,
                inner: Box::new(Expression::new(ExpressionKind::Constant(Constant::Int(1)))),
            })),
        });
        assert_eq!(expr.to_string(), "((long) (-1))");
    }

    #[test]
    fn test_function_printing() {
        let program = Program {
            declarations: vec![Declaration::Function(FunctionDeclaration {
                name: "main".to_string(),
                params: vec![],
                fun_type: FunType {
                    params: vec![],
                    ret: Box::new(Type::Int),
                },
                body: Some(Block {
                    items: vec![BlockItem::Statement(Statement::Return(Expression::new(
                        ExpressionKind::Constant(Constant::Int(0)),
                    )))],
                }),
                storage_class: None,
            })],
        };
        let printed = program.to_string();
        assert!(printed.contains("int main(void) {"));
        assert!(printed.contains("return 0;"));
    }
}
