//! Compilation error types.
//!
//! Each pass has its own error enum and surfaces the first failure it hits;
//! there is no recovery. `CompileError` folds all of them together so the
//! driver can report any failure uniformly. Internal invariant violations
//! (malformed IR, leftover pseudo operands) are compiler bugs and are
//! asserted, not represented here.

use std::fmt;

/// Errors raised while tokenizing preprocessed source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// No token pattern matches at the current position.
    InvalidToken(String),
    /// An integer literal exceeds 2^63 - 1.
    LiteralOverflow(String),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::InvalidToken(rest) => {
                write!(f, "invalid token at: {}", truncate_for_display(rest))
            }
            LexError::LiteralOverflow(lexeme) => {
                write!(
                    f,
                    "constant '{}' is too large to represent as an int or long",
                    lexeme
                )
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Errors raised while building the AST from the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The next token is not what the grammar requires.
    UnexpectedToken { expected: String, got: String },
    /// Ran out of tokens mid-construct.
    UnexpectedEof { expected: String },
    /// The left operand of `=` is not assignable.
    InvalidLvalue,
    /// A specifier list does not name a supported type.
    InvalidTypeSpecifier(String),
    /// More than one storage-class specifier in a declaration.
    InvalidStorageClass,
    /// A function declaration where only variables are allowed.
    FunctionDeclaredInForInit(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, got } => {
                write!(f, "expected {} but found '{}'", expected, got)
            }
            ParseError::UnexpectedEof { expected } => {
                write!(f, "expected {} but reached end of input", expected)
            }
            ParseError::InvalidLvalue => {
                write!(f, "invalid lvalue on left side of assignment")
            }
            ParseError::InvalidTypeSpecifier(specifiers) => {
                write!(f, "invalid type specifier: {}", specifiers)
            }
            ParseError::InvalidStorageClass => {
                write!(f, "at most one storage-class specifier is permitted")
            }
            ParseError::FunctionDeclaredInForInit(name) => {
                write!(
                    f,
                    "function declaration '{}' is not permitted in a for-loop header",
                    name
                )
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors raised by the identifier-resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    UndeclaredIdentifier(String),
    ConflictingDeclaration(String),
    DuplicateParameter(String),
    NestedFunctionDefinition(String),
    StaticOnNestedFunction(String),
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::UndeclaredIdentifier(name) => {
                write!(f, "use of undeclared identifier '{}'", name)
            }
            ResolutionError::ConflictingDeclaration(name) => {
                write!(f, "conflicting declaration of '{}' in the same scope", name)
            }
            ResolutionError::DuplicateParameter(name) => {
                write!(f, "duplicate parameter name '{}'", name)
            }
            ResolutionError::NestedFunctionDefinition(name) => {
                write!(f, "nested definition of function '{}' is not permitted", name)
            }
            ResolutionError::StaticOnNestedFunction(name) => {
                write!(
                    f,
                    "static storage class on block-scope function declaration '{}'",
                    name
                )
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

/// Errors raised by the type-checking pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    IncompatibleRedeclaration(String),
    FunctionRedefined(String),
    LinkageConflict(String),
    ConflictingInitializer(String),
    NonConstantStaticInit(String),
    FunctionUsedAsVariable(String),
    VariableUsedAsFunction(String),
    BadArgumentCount { name: String, expected: usize, got: usize },
    ExternLocalInitializer(String),
    StorageClassInForInit(String),
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::IncompatibleRedeclaration(name) => {
                write!(f, "redeclaration of '{}' with an incompatible type", name)
            }
            TypeError::FunctionRedefined(name) => {
                write!(f, "function '{}' is defined more than once", name)
            }
            TypeError::LinkageConflict(name) => {
                write!(f, "conflicting linkage for '{}'", name)
            }
            TypeError::ConflictingInitializer(name) => {
                write!(f, "conflicting file-scope definitions of '{}'", name)
            }
            TypeError::NonConstantStaticInit(name) => {
                write!(f, "non-constant initializer for static variable '{}'", name)
            }
            TypeError::FunctionUsedAsVariable(name) => {
                write!(f, "function name '{}' used as a variable", name)
            }
            TypeError::VariableUsedAsFunction(name) => {
                write!(f, "variable '{}' called as a function", name)
            }
            TypeError::BadArgumentCount { name, expected, got } => {
                write!(
                    f,
                    "function '{}' called with {} argument(s) but declared with {}",
                    name, got, expected
                )
            }
            TypeError::ExternLocalInitializer(name) => {
                write!(
                    f,
                    "initializer on block-scope extern declaration of '{}'",
                    name
                )
            }
            TypeError::StorageClassInForInit(name) => {
                write!(
                    f,
                    "storage class on declaration of '{}' in a for-loop header",
                    name
                )
            }
        }
    }
}

impl std::error::Error for TypeError {}

/// Errors raised by the loop-labeling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    BreakOutsideLoop,
    ContinueOutsideLoop,
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelError::BreakOutsideLoop => write!(f, "break statement outside of a loop"),
            LabelError::ContinueOutsideLoop => {
                write!(f, "continue statement outside of a loop")
            }
        }
    }
}

impl std::error::Error for LabelError {}

/// Errors raised by the driver around the core pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    MissingSourceFile,
    BadExtension(String),
    /// An external tool (preprocessor, assembler, linker) failed.
    ToolFailed(String),
    /// Filesystem I/O around the pipeline failed.
    Io(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::MissingSourceFile => write!(f, "no source file given"),
            DriverError::BadExtension(path) => {
                write!(f, "source file '{}' must have a '.c' extension", path)
            }
            DriverError::ToolFailed(message) => write!(f, "{}", message),
            DriverError::Io(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for DriverError {}

/// Any failure the compiler can report, tagged by the pass that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Resolution(ResolutionError),
    Type(TypeError),
    Label(LabelError),
    Driver(DriverError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "lexical error: {}", e),
            CompileError::Parse(e) => write!(f, "parse error: {}", e),
            CompileError::Resolution(e) => write!(f, "identifier resolution error: {}", e),
            CompileError::Type(e) => write!(f, "type error: {}", e),
            CompileError::Label(e) => write!(f, "loop labeling error: {}", e),
            CompileError::Driver(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError::Lex(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<ResolutionError> for CompileError {
    fn from(e: ResolutionError) -> Self {
        CompileError::Resolution(e)
    }
}

impl From<TypeError> for CompileError {
    fn from(e: TypeError) -> Self {
        CompileError::Type(e)
    }
}

impl From<LabelError> for CompileError {
    fn from(e: LabelError) -> Self {
        CompileError::Label(e)
    }
}

impl From<DriverError> for CompileError {
    fn from(e: DriverError) -> Self {
        CompileError::Driver(e)
    }
}

/// Clip long source tails in error messages to a single readable line.
fn truncate_for_display(rest: &str) -> String {
    let line = rest.lines().next().unwrap_or(rest);
    if line.chars().count() > 40 {
        let clipped: String = line.chars().take(40).collect();
        format!("{}...", clipped)
    } else {
        line.to_string()
    }
}
