//! # Rules
//!
//! Gating (requirements, incompatibilities) and cost evaluation for one
//! item against a read-only view of the current state.
//!
//! ## Cost pipeline
//!
//! ```text
//! static value + formula + condition
//!     -> set modifiers (last wins)
//!     -> multiply modifiers (in order)
//!     -> add modifiers (in order)
//!     -> round half up
//! ```
//!
//! A failing expression contributes 0 (or false) and logs a warning; one
//! bad formula never aborts a recalculation.

use std::collections::BTreeMap;

use branchbuild_core::{round_half_up, Catalog, CostEntry, GroupEntry, Item, ModifierMode, RequirementRef};
use tracing::warn;

use crate::error::SelectionRejected;
use crate::expr::{ExpressionCache, FormulaScope, Value};
use crate::state::SelectionSet;

/// A transient cost adjustment produced by a `modify_cost` effect.
#[derive(Clone, Debug, PartialEq)]
pub struct CostModifier {
    /// Only items carrying this tag.
    pub tag: Option<String>,
    /// Only items in this group.
    pub group_id: Option<String>,
    /// Only costs in this currency.
    pub currency: Option<String>,
    /// Combination mode.
    pub mode: ModifierMode,
    /// Magnitude.
    pub value: f64,
}

impl CostModifier {
    /// Whether every declared filter matches.
    ///
    /// A group filter never matches a standalone item.
    #[must_use]
    pub fn applies_to(&self, cost: &CostEntry, item: &Item, group: Option<&GroupEntry>) -> bool {
        if self.currency.as_deref().is_some_and(|c| c != cost.currency) {
            return false;
        }
        if let Some(wanted) = self.group_id.as_deref() {
            if group.map_or(true, |g| g.id != wanted) {
                return false;
            }
        }
        if let Some(tag) = self.tag.as_deref() {
            if !item.has_tag(tag) {
                return false;
            }
        }
        true
    }

    fn label(&self) -> String {
        match self.mode {
            ModifierMode::Set => format!("= {}", Value::Number(self.value)),
            ModifierMode::Multiply => {
                let percent = round_half_up((1.0 - self.value) * 100.0);
                if percent > 0 {
                    format!("-{percent}%")
                } else {
                    format!("+{}%", percent.abs())
                }
            }
            ModifierMode::Add => {
                let sign = if self.value > 0.0 { "+" } else { "" };
                format!("{sign}{}", Value::Number(self.value))
            }
        }
    }
}

/// A priced cost entry with the modifier labels applied to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CostBreakdown {
    /// Currency priced.
    pub currency: String,
    /// Rounded unit value.
    pub value: i64,
    /// Display labels for applied modifiers (`"= 0"`, `"-50%"`, `"+5"`).
    pub modifiers: Vec<String>,
}

/// Formula scope over live state, built fresh for each evaluation.
struct Scope<'a> {
    catalog: &'a Catalog,
    selected: &'a SelectionSet,
    currencies: &'a BTreeMap<String, i64>,
    group: Option<&'a GroupEntry>,
}

impl Scope<'_> {
    fn sum_members(&self, group: &GroupEntry) -> i64 {
        group.members.iter().map(|id| self.selected.get(id)).sum()
    }
}

impl FormulaScope for Scope<'_> {
    fn quantity(&self, item_id: &str) -> i64 {
        self.selected.get(item_id)
    }

    fn is_selected(&self, item_id: &str) -> bool {
        self.selected.contains(item_id)
    }

    fn selected_len(&self) -> usize {
        self.selected.len()
    }

    #[allow(clippy::cast_precision_loss)]
    fn currency(&self, currency_id: &str) -> Option<f64> {
        self.currencies.get(currency_id).map(|&v| v as f64)
    }

    fn group_count(&self, group_id: &str) -> Option<i64> {
        self.catalog.group(group_id).map(|g| self.sum_members(g))
    }

    fn tag_count(&self, tag: &str) -> i64 {
        self.selected
            .iter()
            .filter(|(id, _)| self.catalog.item(id).is_some_and(|item| item.has_tag(tag)))
            .map(|(_, quantity)| quantity)
            .sum()
    }

    fn this_group(&self) -> Option<i64> {
        self.group.map(|g| self.sum_members(g))
    }
}

/// Read-only view of everything rule evaluation needs.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    /// Indexed project.
    pub catalog: &'a Catalog,
    /// Current selection.
    pub selected: &'a SelectionSet,
    /// Current balances.
    pub currencies: &'a BTreeMap<String, i64>,
    /// Active cost modifiers.
    pub modifiers: &'a [CostModifier],
    /// Compiled-expression cache.
    pub cache: &'a ExpressionCache,
}

impl<'a> RuleContext<'a> {
    fn scope(&self, group: Option<&'a GroupEntry>) -> Scope<'a> {
        Scope {
            catalog: self.catalog,
            selected: self.selected,
            currencies: self.currencies,
            group,
        }
    }

    fn evaluate(&self, source: &str, item: &Item, group: Option<&'a GroupEntry>) -> Value {
        match self.cache.evaluate(source, &self.scope(group)) {
            Ok(value) => value,
            Err(err) => {
                warn!(item = %item.id, formula = source, error = %err, "formula failed, treating as 0");
                Value::Undefined
            }
        }
    }

    /// Evaluates an expression as a boolean; failures are false.
    #[must_use]
    pub fn evaluate_condition(&self, source: &str, item: &Item, group: Option<&'a GroupEntry>) -> bool {
        self.evaluate(source, item, group).truthy()
    }

    /// Evaluates an expression as an amount; failures and non-finite results are 0.
    #[must_use]
    pub fn evaluate_amount(&self, source: &str, item: &Item, group: Option<&'a GroupEntry>) -> f64 {
        self.evaluate(source, item, group).as_amount()
    }

    /// Whether a single requirement string holds.
    #[must_use]
    pub fn check_requirement(&self, requirement: &str, item: &Item) -> bool {
        match RequirementRef::parse(requirement) {
            RequirementRef::Formula(source) => self.evaluate_condition(source, item, None),
            RequirementRef::Selected(id) => self.selected.contains(id),
            RequirementRef::NotSelected(id) => !self.selected.contains(id),
        }
    }

    /// True iff every requirement of the item holds.
    #[must_use]
    pub fn check_requirements(&self, item: &Item) -> bool {
        item.requirements.iter().all(|req| self.check_requirement(req, item))
    }

    /// False iff an item listed in `incompatible` has positive quantity.
    #[must_use]
    pub fn check_incompatible(&self, item: &Item) -> bool {
        !item.incompatible.iter().any(|id| self.selected.get(id) > 0)
    }

    /// The item's own gating.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule.
    pub fn can_select(&self, item: &Item) -> Result<(), SelectionRejected> {
        if !self.check_requirements(item) {
            return Err(SelectionRejected::RequirementsUnmet(item.id.clone()));
        }
        if !self.check_incompatible(item) {
            return Err(SelectionRejected::Incompatible(item.id.clone()));
        }
        Ok(())
    }

    /// Unit price of one cost entry.
    #[must_use]
    pub fn evaluate_cost(&self, cost: &CostEntry, item: &Item, group: Option<&'a GroupEntry>) -> i64 {
        self.cost_breakdown(cost, item, group).value
    }

    /// Unit price of one cost entry with display labels.
    #[must_use]
    pub fn cost_breakdown(&self, cost: &CostEntry, item: &Item, group: Option<&'a GroupEntry>) -> CostBreakdown {
        let mut value = cost.static_value();
        if let Some(formula) = cost.formula.as_deref() {
            value += self.evaluate_amount(formula, item, group);
        }
        if let Some(condition) = cost.condition.as_deref() {
            value += self.evaluate_amount(condition, item, group);
        }

        let applicable: Vec<&CostModifier> = self
            .modifiers
            .iter()
            .filter(|m| m.applies_to(cost, item, group))
            .collect();
        let mut labels = Vec::new();

        if let Some(last_set) = applicable.iter().rev().find(|m| m.mode == ModifierMode::Set) {
            value = last_set.value;
            labels.push(last_set.label());
        }
        for modifier in applicable.iter().filter(|m| m.mode == ModifierMode::Multiply) {
            value *= modifier.value;
            labels.push(modifier.label());
        }
        for modifier in applicable.iter().filter(|m| m.mode == ModifierMode::Add) {
            value += modifier.value;
            labels.push(modifier.label());
        }

        CostBreakdown {
            currency: cost.currency.clone(),
            value: round_half_up(value),
            modifiers: labels,
        }
    }
}
