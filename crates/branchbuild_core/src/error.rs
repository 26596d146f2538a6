//! # Model Error Types
//!
//! All errors that can occur while loading or interpreting a project.

use thiserror::Error;

/// Errors that can occur in the configuration model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The project document is not valid JSON or does not match the schema.
    #[error("invalid project document: {0}")]
    Json(String),

    /// The project file could not be read or written.
    #[error("project file error at {path}: {reason}")]
    Io {
        /// Path that was being accessed.
        path: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// The project is structurally unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Errors raised when an effect declaration cannot be interpreted.
///
/// These never abort a recalculation; the effect is skipped with a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectParseError {
    /// The `type` tag names no known effect.
    #[error("unknown effect type `{0}`")]
    UnknownType(String),

    /// A field the effect needs is absent.
    #[error("effect `{effect_type}` is missing field `{field}`")]
    MissingField {
        /// The effect's `type` tag.
        effect_type: String,
        /// The absent field.
        field: &'static str,
    },

    /// A `modify_cost` effect names an unsupported mode.
    #[error("unknown cost modifier mode `{0}`")]
    UnknownMode(String),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
