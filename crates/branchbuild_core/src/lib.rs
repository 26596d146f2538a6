//! # Branchbuild Core
//!
//! The configuration model for a "choose your options" build planner:
//! currencies, pages, groups and items, plus the lookup index the engine
//! runs against.
//!
//! ## Design Principles
//!
//! 1. **Lossless documents** - Display fields the engine ignores survive a round trip
//! 2. **Tolerant input** - Missing optional fields mean "no constraint"
//! 3. **Derived indexes** - Lookup maps are rebuilt from the project, never edited directly
//!
//! ## Example
//!
//! ```rust,ignore
//! use branchbuild_core::{Catalog, Project};
//!
//! let project = Project::from_path("projects/demo.json")?;
//! let catalog = Catalog::new(project);
//! for issue in catalog.lint() {
//!     eprintln!("{issue}");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod effect;
pub mod error;
pub mod lenient;
pub mod lint;
pub mod project;
pub mod requirement;

pub use catalog::{Catalog, GroupEntry};
pub use effect::{Effect, EffectDeclaration, ModifierMode};
pub use error::{EffectParseError, ModelError, ModelResult};
pub use lint::ConfigIssue;
pub use project::{
    Budget, CostEntry, Currency, CurrencyId, Group, GroupId, GroupRules, Item, ItemId,
    LayoutElement, Page, Project, ProjectMeta,
};
pub use requirement::RequirementRef;

/// Rounds half-way values toward positive infinity (`-2.5` becomes `-2`).
///
/// Non-finite input rounds to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn round_half_up(value: f64) -> i64 {
    if value.is_finite() {
        (value + 0.5).floor() as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.6), -3);
        assert_eq!(round_half_up(f64::NAN), 0);
    }
}
