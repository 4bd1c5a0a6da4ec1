//! Recursive-descent parser with precedence-climbing expressions.
//!
//! Declarations start with a specifier list in which type specifiers and
//! storage-class specifiers may interleave (`int static x;` is valid C).
//! The list is split and validated afterwards: `{int}` is `int`, `{long}`
//! or `{int, long}` in either order is `long`, anything else is rejected,
//! and at most one storage class is permitted.
//!
//! Expressions use precedence climbing: left-associative operators recurse
//! with `prec + 1`, the right-associative ones (assignment, ternary) with
//! `prec`. The ternary middle is parsed at precedence 0 between `?` and `:`.
//! `else` binds to the nearest `if` simply because the then-branch is parsed
//! before `else` is looked for.

use crate::ast::{
    BinaryOperator, Block, BlockItem, Constant, Declaration, Expression, ExpressionKind, ForInit,
    FunType, FunctionDeclaration, Program, Statement, StorageClass, Type, UnaryOperator,
    VariableDeclaration,
};
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    /// Parse a whole translation unit.
    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut declarations = Vec::new();
        while !self.at_end() {
            declarations.push(self.parse_declaration()?);
        }
        Ok(Program { declarations })
    }

    // ------------------------------------------------------------------
    // Token-stream helpers
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        match self.peek() {
            Some(token) if token.kind == kind => Ok(self.advance().unwrap()),
            Some(token) => Err(ParseError::UnexpectedToken {
                expected: kind.describe().to_string(),
                got: token.lexeme.clone(),
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: kind.describe().to_string(),
            }),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                got: token.lexeme.clone(),
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
        }
    }

    /// Does `kind` start a declaration specifier list?
    fn is_specifier(kind: TokenKind) -> bool {
        Self::is_type_specifier(kind)
            || matches!(kind, TokenKind::Static | TokenKind::Extern)
    }

    /// `signed`/`unsigned` are recognized here and rejected by the type
    /// rule, so `unsigned int x;` fails with a specifier error rather than
    /// a generic token mismatch.
    fn is_type_specifier(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Int | TokenKind::Long | TokenKind::Signed | TokenKind::Unsigned
        )
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let specifiers = self.collect_specifiers();
        let (base_type, storage_class) = split_specifiers(&specifiers)?;
        let name = self.expect(TokenKind::Identifier)?.lexeme;

        if self.check(TokenKind::OpenParen) {
            self.parse_function_declaration(name, base_type, storage_class)
        } else {
            let init = if self.check(TokenKind::Equal) {
                self.advance();
                Some(self.parse_expression(0)?)
            } else {
                None
            };
            self.expect(TokenKind::Semicolon)?;
            Ok(Declaration::Variable(VariableDeclaration {
                name,
                var_type: base_type,
                init,
                storage_class,
            }))
        }
    }

    fn collect_specifiers(&mut self) -> Vec<Token> {
        let mut specifiers = Vec::new();
        while let Some(kind) = self.peek_kind() {
            if Self::is_specifier(kind) {
                specifiers.push(self.advance().unwrap());
            } else {
                break;
            }
        }
        specifiers
    }

    fn parse_function_declaration(
        &mut self,
        name: String,
        return_type: Type,
        storage_class: Option<StorageClass>,
    ) -> Result<Declaration, ParseError> {
        self.expect(TokenKind::OpenParen)?;
        let mut params = Vec::new();
        let mut param_types = Vec::new();

        if self.check(TokenKind::Void) {
            self.advance();
        } else if self.peek_kind().is_some_and(Self::is_type_specifier) {
            loop {
                let specifiers = self.collect_type_specifiers();
                let param_type = parse_type(&specifiers)?;
                let param_name = self.expect(TokenKind::Identifier)?.lexeme;
                params.push(param_name);
                param_types.push(param_type);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::CloseParen)?;

        let fun_type = FunType {
            params: param_types,
            ret: Box::new(return_type),
        };

        let body = if self.check(TokenKind::Semicolon) {
            self.advance();
            None
        } else {
            Some(self.parse_block()?)
        };
        Ok(Declaration::Function(FunctionDeclaration {
            name,
            params,
            fun_type,
            body,
            storage_class,
        }))
    }

    fn collect_type_specifiers(&mut self) -> Vec<Token> {
        let mut specifiers = Vec::new();
        while let Some(kind) = self.peek_kind() {
            if Self::is_type_specifier(kind) {
                specifiers.push(self.advance().unwrap());
            } else {
                break;
            }
        }
        specifiers
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(TokenKind::OpenBrace)?;
        let mut items = Vec::new();
        loop {
            if self.check(TokenKind::CloseBrace) {
                break;
            }
            if self.at_end() {
                return Err(self.unexpected("'}'"));
            }
            items.push(self.parse_block_item()?);
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Block { items })
    }

    fn parse_block_item(&mut self) -> Result<BlockItem, ParseError> {
        if self.peek_kind().is_some_and(Self::is_specifier) {
            Ok(BlockItem::Declaration(self.parse_declaration()?))
        } else {
            Ok(BlockItem::Statement(self.parse_statement()?))
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Return) => {
                self.advance();
                let expr = self.parse_expression(0)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Return(expr))
            }
            Some(TokenKind::Semicolon) => {
                self.advance();
                Ok(Statement::Null)
            }
            Some(TokenKind::If) => {
                self.advance();
                self.expect(TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(TokenKind::CloseParen)?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.check(TokenKind::Else) {
                    self.advance();
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Statement::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            Some(TokenKind::OpenBrace) => Ok(Statement::Compound(self.parse_block()?)),
            Some(TokenKind::Break) => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Break { label: None })
            }
            Some(TokenKind::Continue) => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Continue { label: None })
            }
            Some(TokenKind::While) => {
                self.advance();
                self.expect(TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(TokenKind::CloseParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::While {
                    cond,
                    body,
                    label: None,
                })
            }
            Some(TokenKind::Do) => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(TokenKind::While)?;
                self.expect(TokenKind::OpenParen)?;
                let cond = self.parse_expression(0)?;
                self.expect(TokenKind::CloseParen)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::DoWhile {
                    body,
                    cond,
                    label: None,
                })
            }
            Some(TokenKind::For) => {
                self.advance();
                self.expect(TokenKind::OpenParen)?;
                let init = self.parse_for_init()?;
                let cond = if self.check(TokenKind::Semicolon) {
                    self.advance();
                    None
                } else {
                    let cond = self.parse_expression(0)?;
                    self.expect(TokenKind::Semicolon)?;
                    Some(cond)
                };
                let post = if self.check(TokenKind::CloseParen) {
                    self.advance();
                    None
                } else {
                    let post = self.parse_expression(0)?;
                    self.expect(TokenKind::CloseParen)?;
                    Some(post)
                };
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::For {
                    init,
                    cond,
                    post,
                    body,
                    label: None,
                })
            }
            _ => {
                let expr = self.parse_expression(0)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Expression(expr))
            }
        }
    }

    fn parse_for_init(&mut self) -> Result<ForInit, ParseError> {
        if self.peek_kind().is_some_and(Self::is_specifier) {
            match self.parse_declaration()? {
                Declaration::Variable(decl) => Ok(ForInit::Declaration(decl)),
                Declaration::Function(fun) => {
                    Err(ParseError::FunctionDeclaredInForInit(fun.name))
                }
            }
        } else if self.check(TokenKind::Semicolon) {
            self.advance();
            Ok(ForInit::Expression(None))
        } else {
            let expr = self.parse_expression(0)?;
            self.expect(TokenKind::Semicolon)?;
            Ok(ForInit::Expression(Some(expr)))
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expression(&mut self, min_precedence: u8) -> Result<Expression, ParseError> {
        let mut left = self.parse_factor()?;
        while let Some(precedence) = self.peek_kind().and_then(binary_precedence) {
            if precedence < min_precedence {
                break;
            }
            match self.peek_kind() {
                Some(TokenKind::Equal) => {
                    // Right-associative; the lvalue shape is checked here
                    // rather than deferred to resolution.
                    if !matches!(left.kind, ExpressionKind::Var(_)) {
                        return Err(ParseError::InvalidLvalue);
                    }
                    self.advance();
                    let right = self.parse_expression(precedence)?;
                    left = Expression::new(ExpressionKind::Assignment {
                        lhs: Box::new(left),
                        rhs: Box::new(right),
                    });
                }
                Some(TokenKind::Question) => {
                    self.advance();
                    let middle = self.parse_expression(0)?;
                    self.expect(TokenKind::Colon)?;
                    let right = self.parse_expression(precedence)?;
                    left = Expression::new(ExpressionKind::Conditional {
                        cond: Box::new(left),
                        then_branch: Box::new(middle),
                        else_branch: Box::new(right),
                    });
                }
                Some(kind) => {
                    let op = binary_operator(kind);
                    self.advance();
                    let right = self.parse_expression(precedence + 1)?;
                    left = Expression::new(ExpressionKind::Binary {
                        op,
                        lhs: Box::new(left),
                        rhs: Box::new(right),
                    });
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expression, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::IntConstant) | Some(TokenKind::LongConstant) => {
                let constant = self.parse_constant()?;
                Ok(Expression::new(ExpressionKind::Constant(constant)))
            }
            Some(TokenKind::Identifier) => {
                let name = self.advance().unwrap().lexeme;
                if self.check(TokenKind::OpenParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::CloseParen) {
                        loop {
                            args.push(self.parse_expression(0)?);
                            if self.check(TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::CloseParen)?;
                    Ok(Expression::new(ExpressionKind::FunctionCall { name, args }))
                } else {
                    Ok(Expression::new(ExpressionKind::Var(name)))
                }
            }
            // A parenthesis followed by a type specifier is a cast.
            Some(TokenKind::OpenParen)
                if self.kind_at(1).is_some_and(Self::is_type_specifier) =>
            {
                self.advance();
                let specifiers = self.collect_type_specifiers();
                let target = parse_type(&specifiers)?;
                self.expect(TokenKind::CloseParen)?;
                let inner = self.parse_factor()?;
                Ok(Expression::new(ExpressionKind::Cast {
                    target,
                    inner: Box::new(inner),
                }))
            }
            Some(TokenKind::Tilde) => self.parse_unary(UnaryOperator::Complement),
            Some(TokenKind::Minus) => self.parse_unary(UnaryOperator::Negate),
            Some(TokenKind::Bang) => self.parse_unary(UnaryOperator::Not),
            Some(TokenKind::OpenParen) => {
                self.advance();
                let inner = self.parse_expression(0)?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_unary(&mut self, op: UnaryOperator) -> Result<Expression, ParseError> {
        self.advance();
        let inner = self.parse_factor()?;
        Ok(Expression::new(ExpressionKind::Unary {
            op,
            inner: Box::new(inner),
        }))
    }

    fn parse_constant(&mut self) -> Result<Constant, ParseError> {
        let token = self.advance().expect("constant token present");
        let digits = token.lexeme.trim_end_matches(['l', 'L']);
        // The lexer already rejected anything past i64::MAX.
        let value: i64 = digits.parse().expect("lexer validated literal range");
        match token.kind {
            TokenKind::IntConstant => Ok(Constant::Int(value as i32)),
            TokenKind::LongConstant => Ok(Constant::Long(value)),
            _ => unreachable!("parse_constant called on a non-constant token"),
        }
    }
}

/// Precedence table, lowest binding first. `None` means "not a binary
/// operator", which terminates precedence climbing.
fn binary_precedence(kind: TokenKind) -> Option<u8> {
    match kind {
        TokenKind::Equal => Some(1),
        TokenKind::Question => Some(3),
        TokenKind::PipePipe => Some(5),
        TokenKind::AmpAmp => Some(10),
        TokenKind::EqualEqual | TokenKind::BangEqual => Some(30),
        TokenKind::Less
        | TokenKind::LessEqual
        | TokenKind::Greater
        | TokenKind::GreaterEqual => Some(35),
        TokenKind::Plus | TokenKind::Minus => Some(45),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(50),
        _ => None,
    }
}

fn binary_operator(kind: TokenKind) -> BinaryOperator {
    match kind {
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Minus => BinaryOperator::Subtract,
        TokenKind::Star => BinaryOperator::Multiply,
        TokenKind::Slash => BinaryOperator::Divide,
        TokenKind::Percent => BinaryOperator::Remainder,
        TokenKind::AmpAmp => BinaryOperator::And,
        TokenKind::PipePipe => BinaryOperator::Or,
        TokenKind::EqualEqual => BinaryOperator::Equal,
        TokenKind::BangEqual => BinaryOperator::NotEqual,
        TokenKind::Less => BinaryOperator::LessThan,
        TokenKind::LessEqual => BinaryOperator::LessOrEqual,
        TokenKind::Greater => BinaryOperator::GreaterThan,
        TokenKind::GreaterEqual => BinaryOperator::GreaterOrEqual,
        _ => unreachable!("not a binary operator token"),
    }
}

/// Split a raw specifier list into a type and an optional storage class.
fn split_specifiers(
    specifiers: &[Token],
) -> Result<(Type, Option<StorageClass>), ParseError> {
    let mut types = Vec::new();
    let mut storage_classes = Vec::new();
    for token in specifiers {
        match token.kind {
            TokenKind::Static => storage_classes.push(StorageClass::Static),
            TokenKind::Extern => storage_classes.push(StorageClass::Extern),
            _ => types.push(token.clone()),
        }
    }
    if storage_classes.len() > 1 {
        return Err(ParseError::InvalidStorageClass);
    }
    let base_type = parse_type(&types)?;
    Ok((base_type, storage_classes.pop()))
}

/// Apply the type-specifier rule to an already-filtered list.
fn parse_type(specifiers: &[Token]) -> Result<Type, ParseError> {
    let kinds: Vec<TokenKind> = specifiers.iter().map(|t| t.kind).collect();
    match kinds.as_slice() {
        [TokenKind::Int] => Ok(Type::Int),
        [TokenKind::Long] => Ok(Type::Long),
        [TokenKind::Int, TokenKind::Long] | [TokenKind::Long, TokenKind::Int] => Ok(Type::Long),
        _ => {
            let joined = specifiers
                .iter()
                .map(|t| t.lexeme.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            Err(ParseError::InvalidTypeSpecifier(joined))
        }
    }
}
