//! # Expression Language
//!
//! A small, sandboxed expression language for designer-authored formulas:
//! requirements, cost formulas, cost conditions and effect conditions.
//!
//! ## Grammar (informal)
//!
//! - **Literals**: `12`, `0.5`, `'text'`, `"text"`, `true`, `false`, `null`, `undefined`
//! - **Arithmetic**: `+ - * / %`, unary `-` and `+`
//! - **Comparison**: `< <= > >=`, `== != === !==`
//! - **Logic**: `&& || !`, ternary `a ? b : c`
//! - **Access**: `ns.name`, `ns['name']`, calls `f(a, b)`
//!
//! ## Names
//!
//! | Name | Meaning |
//! |------|---------|
//! | `has(id)` | item is selected |
//! | `qty(id)` | selected quantity, 0 if absent |
//! | `selected.has(id)`, `selected.get(id)`, `selected.length` | selection set view |
//! | `currency.<id>` | current balance |
//! | `count.<group>`, `count.tag(t)`, `count.this_group` | summed quantities |
//! | `this_group` | summed quantity of the evaluating group, 0 if none |
//! | `Math.*` | `abs floor ceil round trunc sign sqrt pow min max PI E` |
//!
//! Nothing else is reachable. Evaluation has no loops, so cost is bounded by
//! the input size and nesting limits.

mod cache;
mod eval;
mod lexer;
mod parser;
mod value;

pub use cache::ExpressionCache;
pub use eval::{evaluate, FormulaScope};
pub use value::Value;

use thiserror::Error;

/// Maximum accepted expression size in bytes.
pub const MAX_EXPR_BYTES: usize = 16 * 1024;

/// Maximum nesting depth of brackets, calls and unary operators.
pub const MAX_EXPR_NESTING: usize = 32;

/// Errors raised while compiling or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Input was empty or whitespace.
    #[error("expression is empty")]
    EmptyInput,

    /// Input exceeded [`MAX_EXPR_BYTES`].
    #[error("expression exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length.
        actual_bytes: usize,
    },

    /// Input exceeded [`MAX_EXPR_NESTING`].
    #[error("expression nesting exceeds {max_depth} at byte {position}")]
    NestingTooDeep {
        /// Maximum allowed depth.
        max_depth: usize,
        /// Byte offset where the limit was hit.
        position: usize,
    },

    /// A token appeared where it is not allowed.
    #[error("expected {expected}, found `{found}` at byte {position}")]
    UnexpectedToken {
        /// What the parser wanted.
        expected: &'static str,
        /// What it saw.
        found: String,
        /// Byte offset.
        position: usize,
    },

    /// A string literal was not closed.
    #[error("unterminated string starting at byte {position}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },

    /// A numeric literal could not be parsed.
    #[error("invalid number `{raw}` at byte {position}")]
    InvalidNumber {
        /// Raw literal text.
        raw: String,
        /// Byte offset.
        position: usize,
    },

    /// Input continued after a complete expression.
    #[error("unexpected trailing input at byte {position}")]
    TrailingInput {
        /// Byte offset of the leftover input.
        position: usize,
    },

    /// An identifier outside the exposed context.
    #[error("`{0}` is not defined")]
    UnknownName(String),

    /// A call on something that is not a function.
    #[error("`{0}` is not a function")]
    NotCallable(String),

    /// Property access on `undefined` or `null`.
    #[error("cannot read property `{0}` of undefined")]
    PropertyOfUndefined(String),
}

/// Compiled expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// String literal.
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// `null`.
    Null,
    /// `undefined`.
    Undefined,
    /// Name lookup in the exposed context.
    Ident(String),
    /// `object.name`.
    Member(Box<Expr>, String),
    /// `object[key]`.
    Index(Box<Expr>, Box<Expr>),
    /// `callee(args...)`.
    Call(Box<Expr>, Vec<Expr>),
    /// Prefix operator.
    Unary(UnaryOp, Box<Expr>),
    /// Strict binary operator.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Short-circuit `&&` (true) or `||` (false).
    Logical(bool, Box<Expr>, Box<Expr>),
    /// `test ? then : otherwise`.
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Prefix operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
    /// `+`
    Plus,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    LooseEq,
    /// `!=`
    LooseNe,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
}

/// Compiles source text into an expression tree.
///
/// # Errors
///
/// Returns an [`ExprError`] for empty, oversized, over-nested or
/// syntactically invalid input.
pub fn compile(source: &str) -> Result<Expr, ExprError> {
    if source.len() > MAX_EXPR_BYTES {
        return Err(ExprError::InputTooLarge {
            max_bytes: MAX_EXPR_BYTES,
            actual_bytes: source.len(),
        });
    }
    let tokens = lexer::Lexer::new(source).lex()?;
    let mut parser = parser::Parser::new(tokens);
    let expr = parser.parse_expression()?;
    parser.expect_eof()?;
    Ok(expr)
}
