//! # Branchbuild
//!
//! Build planner engine: load a project, pick options, read back balances.
//!
//! ## Crate Structure
//!
//! ```text
//! branchbuild
//! ├── core      -> project schema, lookup index, lint
//! ├── economy   -> rules, formulas, effects, budgets, Engine
//! └── events    -> engine events over a bounded channel
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod events;

pub use branchbuild_core as core;
pub use branchbuild_economy as economy;

pub use branchbuild_core::{Catalog, ConfigIssue, Item, Project};
pub use branchbuild_economy::{
    Engine, EngineEvent, EngineSettings, EventKind, RecalcReport, SelectionRejected, SelectionState,
    StateSnapshot,
};
pub use events::{attach, EventBus, EventReceiver, EventSender};
