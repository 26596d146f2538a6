//! # Branchbuild Economy
//!
//! The selection and economy engine: given a loaded project, it decides
//! which items may be picked, keeps the current build consistent, and
//! recomputes every balance and budget after each change.
//!
//! ## Design Principles
//!
//! 1. **One owner** - [`Engine`] holds the only mutable [`SelectionState`]
//! 2. **Full recompute** - Every mutation replays effects and re-prices from scratch
//! 3. **Fixpoint cleanup** - Invalid selections cascade out until nothing changes
//! 4. **Integer balances** - Formulas run in `f64`; results round half-up into `i64`
//!
//! ## Example
//!
//! ```rust,ignore
//! use branchbuild_economy::{Engine, EngineSettings, EventKind};
//!
//! let mut engine = Engine::from_json_str(&json, EngineSettings::default())?;
//! engine.on(EventKind::Recalculate, |event| println!("{event:?}"));
//! engine.select("fireball")?;
//! println!("points left: {:?}", engine.currency("points"));
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod budget;
pub mod dice;
pub mod effects;
pub mod engine;
pub mod error;
pub mod events;
pub mod expr;
pub mod rules;
pub mod settings;
pub mod state;

pub use budget::{apply_budgets, DeltaTable};
pub use dice::Dice;
pub use effects::{derive_effects, EffectOutputs, Forcing};
pub use engine::Engine;
pub use error::{EconomyError, EconomyResult, SelectionRejected, SelectionResult};
pub use events::{EngineEvent, EventKind, Listener, Listeners, RecalcReport};
pub use expr::{ExprError, ExpressionCache, FormulaScope, Value};
pub use rules::{CostBreakdown, CostModifier, RuleContext};
pub use settings::{EngineSettings, DEFAULT_CLEANUP_CAP};
pub use state::{BudgetSnapshot, SelectedEntries, SelectionSet, SelectionState, StateSnapshot};
