//! Runtime values and their coercion rules.
//!
//! Coercions follow the loose scripting conventions authors expect:
//! `true + 1 == 2`, `'3' * 2 == 6`, `undefined + 1` is not a number.

use std::fmt;

/// A value produced during evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Missing value.
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number (always `f64`).
    Number(f64),
    /// String.
    Str(String),
    /// A context object (`selected`, `currency`, `count`, `Math`).
    Namespace(Namespace),
    /// A callable exposed by the context.
    Builtin(Builtin),
}

/// Context objects reachable by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    /// `selected`
    Selected,
    /// `currency`
    Currency,
    /// `count`
    Count,
    /// `Math`
    Math,
}

/// Callables reachable through the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    /// `has(id)` / `selected.has(id)`
    Has,
    /// `qty(id)` / `selected.get(id)`
    Qty,
    /// `count.tag(tag)`
    CountTag,
    /// `Math.abs`
    Abs,
    /// `Math.floor`
    Floor,
    /// `Math.ceil`
    Ceil,
    /// `Math.round`
    Round,
    /// `Math.trunc`
    Trunc,
    /// `Math.sign`
    Sign,
    /// `Math.sqrt`
    Sqrt,
    /// `Math.pow`
    Pow,
    /// `Math.min`
    Min,
    /// `Math.max`
    Max,
}

impl Builtin {
    /// Resolves a `Math.<name>` function.
    pub(super) fn math(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "trunc" => Self::Trunc,
            "sign" => Self::Sign,
            "sqrt" => Self::Sqrt,
            "pow" => Self::Pow,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }
}

impl Value {
    /// Numeric coercion; non-numeric values give `NaN`.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Str(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Undefined | Self::Namespace(_) | Self::Builtin(_) => f64::NAN,
        }
    }

    /// Numeric result for cost arithmetic: non-finite values count as 0.
    #[must_use]
    pub fn as_amount(&self) -> f64 {
        let n = self.to_number();
        if n.is_finite() {
            n
        } else {
            0.0
        }
    }

    /// Truthiness.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(text) => !text.is_empty(),
            Self::Namespace(_) | Self::Builtin(_) => true,
        }
    }

    /// Strict equality (`===`).
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// Loose equality (`==`).
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined | Self::Null, Self::Undefined | Self::Null) => true,
            (Self::Undefined | Self::Null, _) | (_, Self::Undefined | Self::Null) => false,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Namespace(_) | Self::Builtin(_), _) | (_, Self::Namespace(_) | Self::Builtin(_)) => {
                self == other
            }
            _ => self.to_number() == other.to_number(),
        }
    }

    /// Whether this is a string (drives `+` concatenation).
    #[must_use]
    pub fn is_str(&self) -> bool {
        matches!(self, Self::Str(_))
    }
}

/// Formats a number the way authors see it printed (`3`, not `3.0`).
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = n as i64;
        whole.to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Str(text) => f.write_str(text),
            Self::Namespace(_) => f.write_str("[object Object]"),
            Self::Builtin(_) => f.write_str("function"),
        }
    }
}
