//! # Budgets
//!
//! Priced selections accumulate into a [`DeltaTable`] keyed by group id
//! (or the standalone bucket) and currency. Each budgeted group then
//! absorbs spend across itself and its `applies_to` siblings:
//!
//! ```text
//! total_spent = Σ |negative delta| over target groups
//! covered     = min(total_spent, amount)
//! pay down target groups greedily, in listed order, until covered is used
//! ```

use std::collections::BTreeMap;

use branchbuild_core::Catalog;
use tracing::trace;

use crate::state::BudgetSnapshot;

/// Per-group, per-currency net deltas for one recalculation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaTable {
    deltas: BTreeMap<String, BTreeMap<String, i64>>,
}

impl DeltaTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to a bucket, saturating at the `i64` bounds.
    pub fn add(&mut self, bucket: &str, currency: &str, amount: i64) {
        let delta = self
            .deltas
            .entry(bucket.to_string())
            .or_default()
            .entry(currency.to_string())
            .or_insert(0);
        *delta = delta.saturating_add(amount);
    }

    /// Current delta of a bucket, 0 if absent.
    #[must_use]
    pub fn get(&self, bucket: &str, currency: &str) -> i64 {
        self.deltas
            .get(bucket)
            .and_then(|c| c.get(currency))
            .copied()
            .unwrap_or(0)
    }

    /// Net delta per currency across every bucket.
    #[must_use]
    pub fn totals(&self) -> BTreeMap<String, i64> {
        let mut totals: BTreeMap<String, i64> = BTreeMap::new();
        for currencies in self.deltas.values() {
            for (currency, amount) in currencies {
                let total = totals.entry(currency.clone()).or_insert(0);
                *total = total.saturating_add(*amount);
            }
        }
        totals
    }
}

/// Applies every group budget to `table` in group declaration order.
///
/// Returns the budget accounting keyed by the group declaring each budget.
pub fn apply_budgets(catalog: &Catalog, table: &mut DeltaTable) -> BTreeMap<String, BudgetSnapshot> {
    let mut snapshots = BTreeMap::new();

    for group in catalog.groups() {
        let Some(budget) = group.rules.as_ref().and_then(|r| r.budget.as_ref()) else {
            continue;
        };

        let mut targets: Vec<&str> = vec![group.id.as_str()];
        for sibling in &budget.applies_to {
            if !targets.contains(&sibling.as_str()) {
                targets.push(sibling);
            }
        }

        let total_spent: i64 = targets
            .iter()
            .map(|gid| table.get(gid, &budget.currency))
            .filter(|&delta| delta < 0)
            .fold(0_i64, |spent, delta| spent.saturating_add(delta.saturating_neg()));
        let covered = total_spent.min(budget.amount.max(0));

        let mut remaining = covered;
        for gid in &targets {
            if remaining <= 0 {
                break;
            }
            let delta = table.get(gid, &budget.currency);
            if delta < 0 {
                let pay = delta.saturating_neg().min(remaining);
                table.add(gid, &budget.currency, pay);
                remaining -= pay;
            }
        }

        trace!(group = %group.id, spent = total_spent, covered, "budget applied");
        snapshots.insert(
            group.id.clone(),
            BudgetSnapshot {
                total: budget.amount,
                used: covered,
                remaining: budget.amount - covered,
            },
        );
    }

    snapshots
}
