//! # Economy Error Types
//!
//! All errors that can occur in the selection and economy engine.
//!
//! Refused selections are not errors in the usual sense: they are a normal
//! negative answer the caller must check, reported as [`SelectionRejected`].

use branchbuild_core::ModelError;
use thiserror::Error;

/// Errors that can occur in the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// The engine settings file is malformed.
    #[error("invalid engine settings: {0}")]
    InvalidSettings(String),

    /// A state snapshot could not be read or written.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    /// The project could not be loaded.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Why a select, deselect or toggle was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionRejected {
    /// No item with this id exists.
    #[error("unknown item `{0}`")]
    UnknownItem(String),

    /// The item is a display-only anchor.
    #[error("item `{0}` is not selectable")]
    NotSelectable(String),

    /// One of the item's requirements is not met.
    #[error("requirements of `{0}` are not met")]
    RequirementsUnmet(String),

    /// An incompatible item is selected.
    #[error("`{0}` is blocked by an incompatible selection")]
    Incompatible(String),

    /// The item is already at its maximum quantity.
    #[error("`{item}` is already at its maximum quantity {max}")]
    AtMaxQuantity {
        /// Item id.
        item: String,
        /// Maximum quantity.
        max: i64,
    },

    /// Selecting would exceed the group's current `max_choices`.
    #[error("group `{group}` is full ({limit} choices)")]
    GroupFull {
        /// Group id.
        group: String,
        /// Current effective limit.
        limit: i64,
    },

    /// The item is already at its minimum quantity.
    #[error("`{item}` is already at its minimum quantity {min}")]
    AtMinQuantity {
        /// Item id.
        item: String,
        /// Minimum quantity.
        min: i64,
    },
}

/// Result type for engine operations.
pub type EconomyResult<T> = Result<T, EconomyError>;

/// Result type for selection mutations: the new quantity on success.
pub type SelectionResult = Result<i64, SelectionRejected>;
