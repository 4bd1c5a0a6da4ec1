//! Tokenizer for preprocessed C source.
//!
//! Longest-match lexing: every token pattern is tried at the current
//! position (after trimming whitespace) and the longest match wins, with
//! ties broken by the order of the pattern table. That order keeps keywords
//! ahead of identifiers, `==` ahead of `=`, and `--` ahead of `-`.
//!
//! Preprocessor directives (`#...` to end of line) and comments never
//! produce tokens. Integer literals are classified by value: an unsuffixed
//! literal that does not fit in an `int` becomes a long constant, and
//! anything past 2^63 - 1 is rejected.

use crate::error::LexError;
use regex::Regex;
use std::sync::OnceLock;

/// Kind of a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    IntConstant,
    LongConstant,
    // Keywords
    Int,
    Long,
    Void,
    Return,
    If,
    Else,
    Do,
    While,
    For,
    Break,
    Continue,
    Static,
    Extern,
    Signed,
    Unsigned,
    // Punctuation
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Semicolon,
    Comma,
    Question,
    Colon,
    // Operators
    Tilde,
    TwoHyphens,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AmpAmp,
    PipePipe,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
}

impl TokenKind {
    /// Human-readable name used in parse error messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Identifier => "an identifier",
            TokenKind::IntConstant => "an integer constant",
            TokenKind::LongConstant => "a long constant",
            TokenKind::Int => "'int'",
            TokenKind::Long => "'long'",
            TokenKind::Void => "'void'",
            TokenKind::Return => "'return'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::Do => "'do'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::Static => "'static'",
            TokenKind::Extern => "'extern'",
            TokenKind::Signed => "'signed'",
            TokenKind::Unsigned => "'unsigned'",
            TokenKind::OpenParen => "'('",
            TokenKind::CloseParen => "')'",
            TokenKind::OpenBrace => "'{'",
            TokenKind::CloseBrace => "'}'",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
            TokenKind::Question => "'?'",
            TokenKind::Colon => "':'",
            TokenKind::Tilde => "'~'",
            TokenKind::TwoHyphens => "'--'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Bang => "'!'",
            TokenKind::AmpAmp => "'&&'",
            TokenKind::PipePipe => "'||'",
            TokenKind::EqualEqual => "'=='",
            TokenKind::BangEqual => "'!='",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::Equal => "'='",
        }
    }
}

/// A lexed token: its kind plus the exact matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

impl Token {
    fn new(kind: TokenKind, lexeme: &str) -> Self {
        Token {
            kind,
            lexeme: lexeme.to_string(),
        }
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.lexeme == *other
    }
}

/// What matching a pattern produces.
#[derive(Debug, Clone, Copy)]
enum TokenClass {
    /// Dropped entirely (directives, comments).
    Skip,
    /// A token of a fixed kind.
    Plain(TokenKind),
    /// An unsuffixed integer literal, classified by value.
    IntLiteral,
    /// An `l`/`L`-suffixed integer literal.
    LongLiteral,
}

struct PatternSpec {
    class: TokenClass,
    regex: Regex,
}

/// The pattern table, in tie-break priority order.
fn patterns() -> &'static [PatternSpec] {
    static PATTERNS: OnceLock<Vec<PatternSpec>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let spec = |class: TokenClass, pattern: &str| PatternSpec {
            class,
            regex: Regex::new(pattern).expect("token pattern must compile"),
        };
        use TokenClass::{IntLiteral, LongLiteral, Plain, Skip};
        use TokenKind::*;
        vec![
            // Directives and comments outrank everything else so that
            // `/*` is never read as a divide followed by a multiply.
            spec(Skip, r"^#[^\n]*"),
            spec(Skip, r"^//[^\n]*"),
            spec(Skip, r"(?s)^/\*.*?\*/"),
            // Suffixed literals before plain ones.
            spec(LongLiteral, r"^[0-9]+[lL]\b"),
            spec(IntLiteral, r"^[0-9]+\b"),
            // Keywords before identifiers.
            spec(Plain(Int), r"^int\b"),
            spec(Plain(Long), r"^long\b"),
            spec(Plain(Void), r"^void\b"),
            spec(Plain(Return), r"^return\b"),
            spec(Plain(If), r"^if\b"),
            spec(Plain(Else), r"^else\b"),
            spec(Plain(Do), r"^do\b"),
            spec(Plain(While), r"^while\b"),
            spec(Plain(For), r"^for\b"),
            spec(Plain(Break), r"^break\b"),
            spec(Plain(Continue), r"^continue\b"),
            spec(Plain(Static), r"^static\b"),
            spec(Plain(Extern), r"^extern\b"),
            spec(Plain(Signed), r"^signed\b"),
            spec(Plain(Unsigned), r"^unsigned\b"),
            spec(Plain(Identifier), r"^[a-zA-Z_]\w*\b"),
            // Multi-character operators before their prefixes.
            spec(Plain(TwoHyphens), r"^--"),
            spec(Plain(EqualEqual), r"^=="),
            spec(Plain(BangEqual), r"^!="),
            spec(Plain(LessEqual), r"^<="),
            spec(Plain(GreaterEqual), r"^>="),
            spec(Plain(AmpAmp), r"^&&"),
            spec(Plain(PipePipe), r"^\|\|"),
            spec(Plain(OpenParen), r"^\("),
            spec(Plain(CloseParen), r"^\)"),
            spec(Plain(OpenBrace), r"^\{"),
            spec(Plain(CloseBrace), r"^\}"),
            spec(Plain(Semicolon), r"^;"),
            spec(Plain(Comma), r"^,"),
            spec(Plain(Question), r"^\?"),
            spec(Plain(Colon), r"^:"),
            spec(Plain(Tilde), r"^~"),
            spec(Plain(Plus), r"^\+"),
            spec(Plain(Minus), r"^-"),
            spec(Plain(Star), r"^\*"),
            spec(Plain(Slash), r"^/"),
            spec(Plain(Percent), r"^%"),
            spec(Plain(Bang), r"^!"),
            spec(Plain(Less), r"^<"),
            spec(Plain(Greater), r"^>"),
            spec(Plain(Equal), r"^="),
        ]
    })
}

/// Tokenize an entire translation unit.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let mut best: Option<(usize, &PatternSpec)> = None;
        for pattern in patterns() {
            if let Some(found) = pattern.regex.find(rest) {
                let length = found.end();
                let is_better = match best {
                    None => true,
                    // Strictly longer wins; equal length keeps the earlier
                    // (higher-priority) pattern.
                    Some((best_length, _)) => length > best_length,
                };
                if is_better {
                    best = Some((length, pattern));
                }
            }
        }

        let Some((length, pattern)) = best else {
            return Err(LexError::InvalidToken(rest.to_string()));
        };
        let lexeme = &rest[..length];
        match pattern.class {
            TokenClass::Skip => {}
            TokenClass::Plain(kind) => tokens.push(Token::new(kind, lexeme)),
            TokenClass::IntLiteral => tokens.push(classify_int_literal(lexeme)?),
            TokenClass::LongLiteral => {
                let digits = &lexeme[..lexeme.len() - 1];
                check_literal_range(digits, lexeme)?;
                tokens.push(Token::new(TokenKind::LongConstant, lexeme));
            }
        }
        rest = &rest[length..];
    }
    Ok(tokens)
}

/// An unsuffixed literal is an int if it fits in 32 bits, otherwise a long.
fn classify_int_literal(lexeme: &str) -> Result<Token, LexError> {
    let value = check_literal_range(lexeme, lexeme)?;
    if value <= i32::MAX as u64 {
        Ok(Token::new(TokenKind::IntConstant, lexeme))
    } else {
        Ok(Token::new(TokenKind::LongConstant, lexeme))
    }
}

/// Reject literals past 2^63 - 1.
fn check_literal_range(digits: &str, lexeme: &str) -> Result<u64, LexError> {
    let value: u64 = digits
        .parse()
        .map_err(|_| LexError::LiteralOverflow(lexeme.to_string()))?;
    if value > i64::MAX as u64 {
        return Err(LexError::LiteralOverflow(lexeme.to_string()));
    }
    Ok(value)
}
