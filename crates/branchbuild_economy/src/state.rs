//! # Selection State
//!
//! The single owned value the engine mutates: selected quantities (in
//! selection order), live currency balances, budget snapshots and
//! persisted dice rolls. Quantity-0 entries are never stored.
//!
//! [`StateSnapshot`] is the persistence form:
//!
//! ```json
//! {
//!   "selected": [["sword", 1], ["potion", 3]],
//!   "currencies": {"pts": 12},
//!   "budgets": {"magic": {"total": 20, "used": 15, "remaining": 5}},
//!   "rolls": {"lucky_coin": 4},
//!   "timestamp": "2024-05-01T12:00:00Z"
//! }
//! ```
//!
//! Older saves stored `selected` as a plain id list; those load with
//! quantity 1 each.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// Selected quantities, iterated in the order items were first selected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionSet {
    order: Vec<String>,
    quantities: HashMap<String, i64>,
}

impl SelectionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity of an item, 0 if absent.
    #[must_use]
    pub fn get(&self, id: &str) -> i64 {
        self.quantities.get(id).copied().unwrap_or(0)
    }

    /// Whether the item has a stored entry.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.quantities.contains_key(id)
    }

    /// Sets a quantity; 0 removes the entry. New entries go to the end.
    pub fn set(&mut self, id: &str, quantity: i64) {
        if quantity == 0 {
            self.remove(id);
            return;
        }
        if self.quantities.insert(id.to_string(), quantity).is_none() {
            self.order.push(id.to_string());
        }
    }

    /// Removes an entry, returning its quantity.
    pub fn remove(&mut self, id: &str) -> Option<i64> {
        let quantity = self.quantities.remove(id)?;
        self.order.retain(|entry| entry != id);
        Some(quantity)
    }

    /// Number of distinct selected items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.order
            .iter()
            .map(|id| (id.as_str(), self.quantities.get(id).copied().unwrap_or(0)))
    }

    /// The entry at a position in selection order.
    #[must_use]
    pub fn entry_at(&self, index: usize) -> Option<(&str, i64)> {
        let id = self.order.get(index)?;
        Some((id.as_str(), self.get(id)))
    }

    /// Item ids in selection order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.order.clear();
        self.quantities.clear();
    }
}

impl FromIterator<(String, i64)> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (id, quantity) in iter {
            set.set(&id, quantity);
        }
        set
    }
}

/// Allowance accounting for one budgeted group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    /// Configured allowance.
    pub total: i64,
    /// Spend absorbed this pass.
    pub used: i64,
    /// Allowance left (`total - used`).
    pub remaining: i64,
}

/// Everything the engine tracks about the current build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionState {
    /// Selected quantities.
    pub selected: SelectionSet,
    /// Live balances by currency id.
    pub currencies: BTreeMap<String, i64>,
    /// Budget accounting keyed by the group that declares the budget.
    pub budgets: BTreeMap<String, BudgetSnapshot>,
    /// Persisted die results keyed by item id.
    pub rolls: BTreeMap<String, i64>,
}

impl SelectionState {
    /// Balance of a currency, 0 if unknown.
    #[must_use]
    pub fn currency(&self, id: &str) -> i64 {
        self.currencies.get(id).copied().unwrap_or(0)
    }

    /// Builds the persistence form, stamped with the current time.
    #[must_use]
    pub fn export(&self) -> StateSnapshot {
        StateSnapshot {
            selected: SelectedEntries::Quantities(
                self.selected.iter().map(|(id, q)| (id.to_string(), q)).collect(),
            ),
            currencies: self.currencies.clone(),
            budgets: self.budgets.clone(),
            rolls: self.rolls.clone(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Replaces this state with a snapshot's contents.
    pub fn import(&mut self, snapshot: StateSnapshot) {
        self.selected = snapshot.selected.into_set();
        self.currencies = snapshot.currencies;
        self.budgets = snapshot.budgets;
        self.rolls = snapshot.rolls;
    }
}

/// Saved `selected` list, current or legacy shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectedEntries {
    /// `[[id, quantity], ...]`
    Quantities(Vec<(String, i64)>),
    /// `[id, ...]`, one unit each.
    Legacy(Vec<String>),
}

impl Default for SelectedEntries {
    fn default() -> Self {
        Self::Quantities(Vec::new())
    }
}

impl SelectedEntries {
    /// Converts to a selection set, dropping zero quantities.
    #[must_use]
    pub fn into_set(self) -> SelectionSet {
        match self {
            Self::Quantities(entries) => entries.into_iter().collect(),
            Self::Legacy(ids) => ids.into_iter().map(|id| (id, 1)).collect(),
        }
    }
}

/// Persistable copy of a [`SelectionState`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Selected items with quantities.
    #[serde(default)]
    pub selected: SelectedEntries,
    /// Currency balances.
    #[serde(default)]
    pub currencies: BTreeMap<String, i64>,
    /// Budget accounting.
    #[serde(default)]
    pub budgets: BTreeMap<String, BudgetSnapshot>,
    /// Persisted die results.
    #[serde(default)]
    pub rolls: BTreeMap<String, i64>,
    /// When the snapshot was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl StateSnapshot {
    /// Parses a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Snapshot`] if the JSON is malformed.
    pub fn from_json_str(json: &str) -> EconomyResult<Self> {
        serde_json::from_str(json).map_err(|e| EconomyError::Snapshot(e.to_string()))
    }

    /// Serializes the snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Snapshot`] if serialization fails.
    pub fn to_json(&self) -> EconomyResult<String> {
        serde_json::to_string(self).map_err(|e| EconomyError::Snapshot(e.to_string()))
    }
}
